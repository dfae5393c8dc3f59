// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.
use std::sync::Arc;

use arrow_array::builder::Float64Builder;
use arrow_schema::DataType;
use datafusion_common::error::Result;
use datafusion_expr::{scalar_doc_sections::DOC_SECTION_OTHER, ColumnarValue, Documentation, Volatility};
use skydb_expr::matchers::ArgMatcher;
use skydb_expr::scalar_udf::{SkydbScalarKernel, SkydbScalarUDF};
use skydb_geometry::sphere::{SphericalCoord, Vec3};

use crate::executor::{float_arrays, float_row, ColumnarExecutor};

/// angSep() scalar UDF implementation
///
/// Returns the angular separation in degrees between two positions on the
/// unit sphere. Positions may be specified either as two spherical
/// coordinate pairs (4 arguments, degrees) or as two 3-vectors of arbitrary
/// norm (6 arguments).
pub fn ang_sep_udf() -> SkydbScalarUDF {
    SkydbScalarUDF::new(
        "angSep",
        vec![Arc::new(AngSepCoords {}), Arc::new(AngSepVectors {})],
        Volatility::Immutable,
        Some(ang_sep_doc()),
    )
}

fn ang_sep_doc() -> Documentation {
    Documentation::builder(
        DOC_SECTION_OTHER,
        "Return the angular separation in degrees between two positions",
        "angSep(lon1, lat1, lon2, lat2)",
    )
    .with_argument("lon1", "double: Longitude angle of the first position, degrees")
    .with_argument("lat1", "double: Latitude angle of the first position, degrees")
    .with_argument("lon2", "double: Longitude angle of the second position, degrees")
    .with_argument("lat2", "double: Latitude angle of the second position, degrees")
    .with_sql_example("SELECT angSep(0.0, 0.0, 0.0, 1.0)")
    .build()
}

#[derive(Debug)]
struct AngSepCoords {}

impl SkydbScalarKernel for AngSepCoords {
    fn return_type(&self, args: &[DataType]) -> Result<Option<DataType>> {
        let matcher = ArgMatcher::new(
            vec![
                ArgMatcher::is_numeric(),
                ArgMatcher::is_numeric(),
                ArgMatcher::is_numeric(),
                ArgMatcher::is_numeric(),
            ],
            DataType::Float64,
        );
        matcher.match_args(args)
    }

    fn invoke_batch(
        &self,
        _arg_types: &[DataType],
        args: &[ColumnarValue],
    ) -> Result<ColumnarValue> {
        let executor = ColumnarExecutor::new(args);
        let n = executor.num_iterations();
        let columns = float_arrays(args, n)?;
        let mut builder = Float64Builder::with_capacity(n);
        for i in 0..n {
            match float_row(&columns, i) {
                Some(v) => match (
                    SphericalCoord::try_new(v[0], v[1]),
                    SphericalCoord::try_new(v[2], v[3]),
                ) {
                    (Ok(p1), Ok(p2)) => builder.append_value(p1.separation(&p2)),
                    _ => builder.append_null(),
                },
                None => builder.append_null(),
            }
        }
        executor.finish(Arc::new(builder.finish()))
    }
}

#[derive(Debug)]
struct AngSepVectors {}

impl SkydbScalarKernel for AngSepVectors {
    fn return_type(&self, args: &[DataType]) -> Result<Option<DataType>> {
        let matcher = ArgMatcher::new(
            vec![ArgMatcher::is_numeric(); 6],
            DataType::Float64,
        );
        matcher.match_args(args)
    }

    fn invoke_batch(
        &self,
        _arg_types: &[DataType],
        args: &[ColumnarValue],
    ) -> Result<ColumnarValue> {
        let executor = ColumnarExecutor::new(args);
        let n = executor.num_iterations();
        let columns = float_arrays(args, n)?;
        let mut builder = Float64Builder::with_capacity(n);
        for i in 0..n {
            match float_row(&columns, i) {
                Some(v) => match (
                    Vec3::try_new(v[0], v[1], v[2]),
                    Vec3::try_new(v[3], v[4], v[5]),
                ) {
                    (Ok(v1), Ok(v2)) => builder.append_value(v1.separation(&v2)),
                    _ => builder.append_null(),
                },
                None => builder.append_null(),
            }
        }
        executor.finish(Arc::new(builder.finish()))
    }
}
