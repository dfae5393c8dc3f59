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
use skydb_geometry::regions::SphericalEllipse;
use skydb_geometry::sphere::SphericalCoord;

use crate::executor::{float_arrays, float_row, ColumnarExecutor};

/// s2PtInEllipse() scalar UDF implementation
///
/// Returns true if the point (lon, lat) lies inside the ellipse with the
/// given center, semi-axes (arcseconds), and position angle (degrees, north
/// through east). When the ellipse parameters are constant across a batch
/// the derived trigonometric quantities are computed once.
pub fn pt_in_ellipse_udf() -> SkydbScalarUDF {
    SkydbScalarUDF::new(
        "s2PtInEllipse",
        vec![Arc::new(PtInEllipse {})],
        Volatility::Immutable,
        Some(pt_in_ellipse_doc()),
    )
}

fn pt_in_ellipse_doc() -> Documentation {
    Documentation::builder(
        DOC_SECTION_OTHER,
        "Return true if the point (lon, lat) lies inside the given spherical ellipse",
        "s2PtInEllipse(lon, lat, cenLon, cenLat, semiMajor, semiMinor, posAngle)",
    )
    .with_argument("lon", "double: Longitude angle of the point to test, degrees")
    .with_argument("lat", "double: Latitude angle of the point to test, degrees")
    .with_argument("cenLon", "double: Longitude angle of the ellipse center, degrees")
    .with_argument("cenLat", "double: Latitude angle of the ellipse center, degrees")
    .with_argument("semiMajor", "double: Semi-major axis length, arcseconds, at most 36000")
    .with_argument("semiMinor", "double: Semi-minor axis length, arcseconds")
    .with_argument("posAngle", "double: Ellipse position angle, degrees east of north")
    .with_sql_example("SELECT s2PtInEllipse(ra, decl, 0.0, 0.0, 10.0, 5.0, 45.0) FROM Object")
    .build()
}

#[derive(Debug)]
struct PtInEllipse {}

impl SkydbScalarKernel for PtInEllipse {
    fn return_type(&self, args: &[DataType]) -> Result<Option<DataType>> {
        let matcher = ArgMatcher::new(vec![ArgMatcher::is_numeric(); 7], DataType::Boolean);
        matcher.match_args(args)
    }

    fn invoke_batch(
        &self,
        _arg_types: &[DataType],
        args: &[ColumnarValue],
    ) -> Result<ColumnarValue> {
        let executor = ColumnarExecutor::new(args);
        let n = executor.num_iterations();

        // When every ellipse parameter is constant, derive the ellipse once
        // for the whole batch.
        let const_ellipse = args[2..]
            .iter()
            .all(|arg| matches!(arg, ColumnarValue::Scalar(_)));

        let columns = float_arrays(args, n)?;
        let mut cached: Option<Option<SphericalEllipse>> = None;
        let mut builder = BooleanBuilder::with_capacity(n);
        for i in 0..n {
            match float_row(&columns, i) {
                Some(v) => {
                    let ellipse = if const_ellipse {
                        cached
                            .get_or_insert_with(|| build_ellipse(&v))
                            .clone()
                    } else {
                        build_ellipse(&v)
                    };
                    match (SphericalCoord::try_new(v[0], v[1]).ok(), ellipse) {
                        (Some(p), Some(e)) => builder.append_value(e.contains(&p)),
                        _ => builder.append_null(),
                    }
                }
                None => builder.append_null(),
            }
        }
        executor.finish(Arc::new(builder.finish()))
    }
}

fn build_ellipse(v: &[f64]) -> Option<SphericalEllipse> {
    let center = SphericalCoord::try_new(v[2], v[3]).ok()?;
    SphericalEllipse::try_new(center, v[4], v[5], v[6]).ok()
}

#[cfg(test)]
mod tests {
    use arrow_array::create_array;
    use datafusion_common::ScalarValue;
    use skydb_testing::testers::ScalarUdfTester;

    use super::*;

    fn tester() -> ScalarUdfTester {
        ScalarUdfTester::new(pt_in_ellipse_udf().into(), vec![DataType::Float64; 7])
    }

    fn invoke(tester: &ScalarUdfTester, args: [Option<f64>; 7]) -> ScalarValue {
        tester
            .invoke_scalars(args.iter().map(|v| ScalarValue::Float64(*v)).collect())
            .unwrap()
    }

    #[test]
    fn udf_metadata() {
        let udf: datafusion_expr::ScalarUDF = pt_in_ellipse_udf().into();
        assert_eq!(udf.name(), "s2PtInEllipse");
        assert!(udf.documentation().is_some());
        tester().assert_return_type(DataType::Boolean);
    }

    #[test]
    fn membership() {
        let t = tester();
        // 1 degree x 0.5 degree ellipse with the major axis north-south
        let base = [Some(0.0), Some(0.0), Some(0.0), Some(0.0), Some(3600.0), Some(1800.0), Some(0.0)];
        assert_eq!(invoke(&t, base), ScalarValue::Boolean(Some(true)));

        let mut north = base;
        north[1] = Some(0.9);
        assert_eq!(invoke(&t, north), ScalarValue::Boolean(Some(true)));

        let mut east = base;
        east[0] = Some(0.9);
        assert_eq!(invoke(&t, east), ScalarValue::Boolean(Some(false)));

        // Rotating the position angle by 90 degrees swaps the axes
        let mut rotated = east;
        rotated[6] = Some(90.0);
        assert_eq!(invoke(&t, rotated), ScalarValue::Boolean(Some(true)));
    }

    #[test]
    fn null_propagation() {
        let t = tester();
        for null_pos in 0..7 {
            let mut args = [
                Some(0.0),
                Some(0.0),
                Some(0.0),
                Some(0.0),
                Some(10.0),
                Some(5.0),
                Some(0.0),
            ];
            args[null_pos] = None;
            assert_eq!(invoke(&t, args), ScalarValue::Boolean(None));
        }
    }

    #[test]
    fn invalid_parameters() {
        let t = tester();
        // Axis ordering violated
        let r = invoke(&t, [Some(0.0), Some(0.0), Some(0.0), Some(0.0), Some(5.0), Some(10.0), Some(0.0)]);
        assert_eq!(r, ScalarValue::Boolean(None));
        // Semi-major axis too large
        let r = invoke(&t, [Some(0.0), Some(0.0), Some(0.0), Some(0.0), Some(36001.0), Some(10.0), Some(0.0)]);
        assert_eq!(r, ScalarValue::Boolean(None));
        // Latitude out of range
        let r = invoke(&t, [Some(0.0), Some(91.0), Some(0.0), Some(0.0), Some(10.0), Some(5.0), Some(0.0)]);
        assert_eq!(r, ScalarValue::Boolean(None));
    }

    #[test]
    fn constant_ellipse_over_array() {
        let t = tester();
        let lats = create_array!(Float64, [Some(0.0), Some(0.9), None]);
        let mut args: Vec<ColumnarValue> = vec![
            ColumnarValue::Scalar(ScalarValue::Float64(Some(0.0))),
            ColumnarValue::Array(lats),
        ];
        for param in [0.0, 0.0, 3600.0, 1800.0, 0.0] {
            args.push(ColumnarValue::Scalar(ScalarValue::Float64(Some(param))));
        }
        let out = t.invoke(args).unwrap();
        match out {
            ColumnarValue::Array(array) => {
                let expected: arrow_array::ArrayRef =
                    create_array!(Boolean, [Some(true), Some(true), None]);
                assert_eq!(&array, &expected);
            }
            _ => panic!("Expected array output"),
        }
    }
}
