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
use skydb_geometry::regions::SphericalCircle;
use skydb_geometry::sphere::SphericalCoord;

use crate::executor::{float_arrays, float_row, ColumnarExecutor};

/// s2PtInCircle() scalar UDF implementation
///
/// Returns true if the point (lon, lat) lies inside the circle with the
/// given center and angular radius. Points on the circle boundary (within
/// the classification tolerance) test as outside.
pub fn pt_in_circle_udf() -> SkydbScalarUDF {
    SkydbScalarUDF::new(
        "s2PtInCircle",
        vec![Arc::new(PtInCircle {})],
        Volatility::Immutable,
        Some(pt_in_circle_doc()),
    )
}

fn pt_in_circle_doc() -> Documentation {
    Documentation::builder(
        DOC_SECTION_OTHER,
        "Return true if the point (lon, lat) lies inside the given spherical circle",
        "s2PtInCircle(lon, lat, cenLon, cenLat, radius)",
    )
    .with_argument("lon", "double: Longitude angle of the point to test, degrees")
    .with_argument("lat", "double: Latitude angle of the point to test, degrees")
    .with_argument("cenLon", "double: Longitude angle of the circle center, degrees")
    .with_argument("cenLat", "double: Latitude angle of the circle center, degrees")
    .with_argument("radius", "double: Circle radius, degrees, in [0, 180]")
    .with_sql_example("SELECT s2PtInCircle(ra, decl, 292.95, 2.88, 0.01) FROM Object")
    .build()
}

#[derive(Debug)]
struct PtInCircle {}

impl SkydbScalarKernel for PtInCircle {
    fn return_type(&self, args: &[DataType]) -> Result<Option<DataType>> {
        let matcher = ArgMatcher::new(vec![ArgMatcher::is_numeric(); 5], DataType::Boolean);
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
    let center = SphericalCoord::try_new(v[2], v[3]).ok()?;
    let circle = SphericalCircle::try_new(center, v[4]).ok()?;
    Some(circle.contains(&p))
}
