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

use arrow_array::builder::BooleanBuilder;
use arrow_schema::DataType;
use datafusion_common::error::Result;
use datafusion_expr::{scalar_doc_sections::DOC_SECTION_OTHER, ColumnarValue, Documentation, Volatility};
use skydb_expr::matchers::ArgMatcher;
use skydb_expr::scalar_udf::{SkydbScalarKernel, SkydbScalarUDF};
use skydb_geometry::regions::SphericalBox;
use skydb_geometry::sphere::SphericalCoord;

use crate::executor::{float_arrays, float_row, ColumnarExecutor};

/// s2PtInBox() scalar UDF implementation
///
/// Returns true if the point (lon, lat) lies inside the given
/// longitude/latitude angle box. `lonMax < lonMin` denotes a box wrapping
/// across the 0/360 longitude discontinuity when both bounds lie in
/// [0, 360]; a latitude or malformed-bound violation yields null.
pub fn pt_in_box_udf() -> SkydbScalarUDF {
    SkydbScalarUDF::new(
        "s2PtInBox",
        vec![Arc::new(PtInBox {})],
        Volatility::Immutable,
        Some(pt_in_box_doc()),
    )
}

fn pt_in_box_doc() -> Documentation {
    Documentation::builder(
        DOC_SECTION_OTHER,
        "Return true if the point (lon, lat) lies inside the given longitude/latitude angle box",
        "s2PtInBox(lon, lat, lonMin, latMin, lonMax, latMax)",
    )
    .with_argument("lon", "double: Longitude angle of the point to test, degrees")
    .with_argument("lat", "double: Latitude angle of the point to test, degrees")
    .with_argument("lonMin", "double: Minimum longitude angle of the box, degrees")
    .with_argument("latMin", "double: Minimum latitude angle of the box, degrees")
    .with_argument("lonMax", "double: Maximum longitude angle of the box, degrees")
    .with_argument("latMax", "double: Maximum latitude angle of the box, degrees")
    .with_sql_example("SELECT s2PtInBox(ra, decl, 350.0, -10.0, 10.0, 10.0) FROM Object")
    .build()
}

#[derive(Debug)]
struct PtInBox {}

impl SkydbScalarKernel for PtInBox {
    fn return_type(&self, args: &[DataType]) -> Result<Option<DataType>> {
        let matcher = ArgMatcher::new(vec![ArgMatcher::is_numeric(); 6], DataType::Boolean);
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
        let mut builder = BooleanBuilder::with_capacity(n);
        for i in 0..n {
            match float_row(&columns, i) {
                Some(v) => match invoke_scalar(&v) {
                    Some(inside) => builder.append_value(inside),
                    None => builder.append_null(),
                },
                None => builder.append_null(),
            }
        }
        executor.finish(Arc::new(builder.finish()))
    }
}

fn invoke_scalar(v: &[f64]) -> Option<bool> {
    let p = SphericalCoord::try_new(v[0], v[1]).ok()?;
    let min = SphericalCoord::try_new(v[2], v[3]).ok()?;
    let max = SphericalCoord::try_new(v[4], v[5]).ok()?;
    let b = SphericalBox::try_new(min, max).ok()?;
    Some(b.contains(&p))
}
