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

//! HTM indexing UDFs: point ids, id levels, and the circle/polygon range
//! computations used to turn spatial constraints into sorted integer range
//! scans.
//!
//! Range results are returned as a binary string of consecutive
//! little-endian `i64` `[min, max]` pairs; use extractInt64() to pick the
//! values apart in SQL. Ranges are over-inclusive at the requested
//! subdivision level, so the exact predicate (s2PtInCircle(),
//! s2PtInCPoly()) must be applied as a post-filter.

use std::sync::Arc;

use arrow_array::builder::{BinaryBuilder, Int64Builder};
use arrow_array::Array;
use arrow_schema::DataType;
use datafusion_common::error::{DataFusionError, Result};
use datafusion_common::exec_err;
use datafusion_expr::{scalar_doc_sections::DOC_SECTION_OTHER, ColumnarValue, Documentation, Volatility};
use skydb_expr::matchers::ArgMatcher;
use skydb_expr::scalar_udf::{SkydbScalarKernel, SkydbScalarUDF};
use skydb_geometry::htm::{circle_ranges, htm_id, htm_level, polygon_ranges, RangeList, MAX_LEVEL};
use skydb_geometry::codec::decode_polygon;
use skydb_geometry::regions::SphericalCircle;
use skydb_geometry::sphere::SphericalCoord;

use crate::executor::{binary_array, float_arrays, float_row, int_array, ColumnarExecutor};

/// s2HtmId() scalar UDF implementation
///
/// Returns the HTM ID of the point (lon, lat) at the given subdivision
/// level.
pub fn htm_id_udf() -> SkydbScalarUDF {
    SkydbScalarUDF::new(
        "s2HtmId",
        vec![Arc::new(HtmId {})],
        Volatility::Immutable,
        Some(
            Documentation::builder(
                DOC_SECTION_OTHER,
                "Return the HTM ID of the point (lon, lat) at the given subdivision level",
                "s2HtmId(lon, lat, level)",
            )
            .with_argument("lon", "double: Longitude angle of the point, degrees")
            .with_argument("lat", "double: Latitude angle of the point, degrees")
            .with_argument("level", "integer: Subdivision level, in [0, 20]")
            .with_sql_example("SELECT s2HtmId(ra, decl, 20) FROM Object")
            .build(),
        ),
    )
}

/// s2HtmLevel() scalar UDF implementation
///
/// Returns the subdivision level encoded in an HTM ID, or null if the
/// argument is not a valid HTM ID.
pub fn htm_level_udf() -> SkydbScalarUDF {
    SkydbScalarUDF::new(
        "s2HtmLevel",
        vec![Arc::new(HtmLevel {})],
        Volatility::Immutable,
        Some(
            Documentation::builder(
                DOC_SECTION_OTHER,
                "Return the subdivision level of an HTM ID",
                "s2HtmLevel(id)",
            )
            .with_argument("id", "integer: HTM ID")
            .with_sql_example("SELECT s2HtmLevel(s2HtmId(0.0, 0.0, 20))")
            .build(),
        ),
    )
}

/// s2CircleHtmRanges() scalar UDF implementation
///
/// Returns the HTM ID ranges of the triangles overlapping the given circle
/// as a binary string of little-endian i64 [min, max] pairs.
pub fn circle_htm_ranges_udf() -> SkydbScalarUDF {
    SkydbScalarUDF::new(
        "s2CircleHtmRanges",
        vec![Arc::new(CircleHtmRanges {})],
        Volatility::Immutable,
        Some(
            Documentation::builder(
                DOC_SECTION_OTHER,
                "Return the HTM ID ranges overlapping the given circle",
                "s2CircleHtmRanges(cenLon, cenLat, radius, level, maxRanges)",
            )
            .with_argument("cenLon", "double: Longitude angle of the circle center, degrees")
            .with_argument("cenLat", "double: Latitude angle of the circle center, degrees")
            .with_argument("radius", "double: Circle radius, degrees, in [0, 180]")
            .with_argument("level", "integer: Subdivision level, in [0, 20]")
            .with_argument(
                "maxRanges",
                "integer: Upper bound on the number of ranges; coarsens the subdivision \
                 level as needed. Pass 0 for no bound",
            )
            .with_sql_example("SELECT s2CircleHtmRanges(292.95, 2.88, 0.05, 20, 16)")
            .build(),
        ),
    )
}

/// s2CPolyHtmRanges() scalar UDF implementation
///
/// Returns the HTM ID ranges of the triangles overlapping the given encoded
/// polygon as a binary string of little-endian i64 [min, max] pairs.
pub fn cpoly_htm_ranges_udf() -> SkydbScalarUDF {
    SkydbScalarUDF::new(
        "s2CPolyHtmRanges",
        vec![Arc::new(CPolyHtmRanges {})],
        Volatility::Immutable,
        Some(
            Documentation::builder(
                DOC_SECTION_OTHER,
                "Return the HTM ID ranges overlapping the given convex spherical polygon",
                "s2CPolyHtmRanges(poly, level, maxRanges)",
            )
            .with_argument("poly", "binary: Polygon byte string from s2CPolyToBin()")
            .with_argument("level", "integer: Subdivision level, in [0, 20]")
            .with_argument(
                "maxRanges",
                "integer: Upper bound on the number of ranges; coarsens the subdivision \
                 level as needed. Pass 0 for no bound",
            )
            .with_sql_example(
                "SELECT s2CPolyHtmRanges(s2CPolyToBin(-10.0, -10.0, 10.0, -10.0, 0.0, 10.0), 20, 16)",
            )
            .build(),
        ),
    )
}

fn geometry_err(e: skydb_geometry::error::SkydbGeometryError) -> DataFusionError {
    DataFusionError::External(Box::new(e))
}

fn check_level_arg(level: i64) -> Result<i64> {
    if !(0..=MAX_LEVEL as i64).contains(&level) {
        return exec_err!("HTM subdivision level {level} is not in the [0, {MAX_LEVEL}] range");
    }
    Ok(level)
}

/// Interprets the maxRanges argument: values below 1 mean "no bound".
fn max_ranges_arg(max_ranges: i64) -> usize {
    if max_ranges < 1 {
        usize::MAX
    } else {
        max_ranges as usize
    }
}

/// Packs a range list into consecutive little-endian i64 [min, max] pairs.
fn ranges_to_bytes(ranges: &RangeList) -> Vec<u8> {
    let mut out = Vec::with_capacity(16 * ranges.len());
    for (min, max) in ranges.ranges() {
        out.extend_from_slice(&min.to_le_bytes());
        out.extend_from_slice(&max.to_le_bytes());
    }
    out
}

#[derive(Debug)]
struct HtmId {}

impl SkydbScalarKernel for HtmId {
    fn return_type(&self, args: &[DataType]) -> Result<Option<DataType>> {
        let matcher = ArgMatcher::new(
            vec![
                ArgMatcher::is_numeric(),
                ArgMatcher::is_numeric(),
                ArgMatcher::is_integer(),
            ],
            DataType::Int64,
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
        let coords = float_arrays(&args[..2], n)?;
        let levels = int_array(&args[2], n)?;
        let mut builder = Int64Builder::with_capacity(n);
        for i in 0..n {
            let coord_row = float_row(&coords, i);
            if levels.is_null(i) || coord_row.is_none() {
                builder.append_null();
                continue;
            }
            let level = check_level_arg(levels.value(i))?;
            let v = coord_row.unwrap();
            match SphericalCoord::try_new(v[0], v[1]) {
                Ok(p) => {
                    let id = htm_id(&p.to_vec3(), level).map_err(geometry_err)?;
                    builder.append_value(id);
                }
                Err(_) => builder.append_null(),
            }
        }
        executor.finish(Arc::new(builder.finish()))
    }
}

#[derive(Debug)]
struct HtmLevel {}

impl SkydbScalarKernel for HtmLevel {
    fn return_type(&self, args: &[DataType]) -> Result<Option<DataType>> {
        let matcher = ArgMatcher::new(vec![ArgMatcher::is_integer()], DataType::Int64);
        matcher.match_args(args)
    }

    fn invoke_batch(
        &self,
        _arg_types: &[DataType],
        args: &[ColumnarValue],
    ) -> Result<ColumnarValue> {
        let executor = ColumnarExecutor::new(args);
        let n = executor.num_iterations();
        let ids = int_array(&args[0], n)?;
        let mut builder = Int64Builder::with_capacity(n);
        for i in 0..n {
            if ids.is_null(i) {
                builder.append_null();
                continue;
            }
            match htm_level(ids.value(i)) {
                Ok(level) => builder.append_value(level as i64),
                Err(_) => builder.append_null(),
            }
        }
        executor.finish(Arc::new(builder.finish()))
    }
}

#[derive(Debug)]
struct CircleHtmRanges {}

impl SkydbScalarKernel for CircleHtmRanges {
    fn return_type(&self, args: &[DataType]) -> Result<Option<DataType>> {
        let matcher = ArgMatcher::new(
            vec![
                ArgMatcher::is_numeric(),
                ArgMatcher::is_numeric(),
                ArgMatcher::is_numeric(),
                ArgMatcher::is_integer(),
                ArgMatcher::is_integer(),
            ],
            DataType::Binary,
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
        let coords = float_arrays(&args[..3], n)?;
        let levels = int_array(&args[3], n)?;
        let max_ranges = int_array(&args[4], n)?;
        let mut builder = BinaryBuilder::new();
        for i in 0..n {
            let coord_row = float_row(&coords, i);
            if levels.is_null(i) || max_ranges.is_null(i) || coord_row.is_none() {
                builder.append_null();
                continue;
            }
            let level = check_level_arg(levels.value(i))?;
            let v = coord_row.unwrap();
            let circle = SphericalCoord::try_new(v[0], v[1])
                .and_then(|center| SphericalCircle::try_new(center, v[2]));
            match circle {
                Ok(circle) => {
                    let ranges = circle_ranges(&circle, level, max_ranges_arg(max_ranges.value(i)))
                        .map_err(geometry_err)?;
                    builder.append_value(ranges_to_bytes(&ranges));
                }
                Err(_) => builder.append_null(),
            }
        }
        executor.finish(Arc::new(builder.finish()))
    }
}

#[derive(Debug)]
struct CPolyHtmRanges {}

impl SkydbScalarKernel for CPolyHtmRanges {
    fn return_type(&self, args: &[DataType]) -> Result<Option<DataType>> {
        let matcher = ArgMatcher::new(
            vec![
                ArgMatcher::is_binary(),
                ArgMatcher::is_integer(),
                ArgMatcher::is_integer(),
            ],
            DataType::Binary,
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
        let blobs = binary_array(&args[0], n)?;
        let levels = int_array(&args[1], n)?;
        let max_ranges = int_array(&args[2], n)?;
        let mut builder = BinaryBuilder::new();
        for i in 0..n {
            if blobs.is_null(i) || levels.is_null(i) || max_ranges.is_null(i) {
                builder.append_null();
                continue;
            }
            let level = check_level_arg(levels.value(i))?;
            let poly = decode_polygon(blobs.value(i)).map_err(geometry_err)?;
            let ranges = polygon_ranges(&poly, level, max_ranges_arg(max_ranges.value(i)))
                .map_err(geometry_err)?;
            builder.append_value(ranges_to_bytes(&ranges));
        }
        executor.finish(Arc::new(builder.finish()))
    }
}

#[cfg(test)]
mod tests {
    use datafusion_common::ScalarValue;
    use skydb_testing::testers::ScalarUdfTester;

    use super::*;

    fn id_tester() -> ScalarUdfTester {
        ScalarUdfTester::new(
            htm_id_udf().into(),
            vec![DataType::Float64, DataType::Float64, DataType::Int64],
        )
    }

    fn decode_ranges(value: &ScalarValue) -> Vec<(i64, i64)> {
        let ScalarValue::Binary(Some(bytes)) = value else {
            panic!("Expected non-null binary result, got {value:?}");
        };
        assert_eq!(bytes.len() % 16, 0);
        bytes
            .chunks_exact(16)
            .map(|chunk| {
                let mut min = [0u8; 8];
                let mut max = [0u8; 8];
                min.copy_from_slice(&chunk[..8]);
                max.copy_from_slice(&chunk[8..]);
                (i64::from_le_bytes(min), i64::from_le_bytes(max))
            })
            .collect()
    }

    #[test]
    fn udf_metadata() {
        for (udf, name) in [
            (htm_id_udf(), "s2HtmId"),
            (htm_level_udf(), "s2HtmLevel"),
            (circle_htm_ranges_udf(), "s2CircleHtmRanges"),
            (cpoly_htm_ranges_udf(), "s2CPolyHtmRanges"),
        ] {
            let udf: datafusion_expr::ScalarUDF = udf.into();
            assert_eq!(udf.name(), name);
            assert!(udf.documentation().is_some());
        }
    }

    #[test]
    fn id_reference_values() {
        let t = id_tester();
        // The +x axis lands in root triangle N3
        let r = t
            .invoke_scalars(vec![
                ScalarValue::Float64(Some(0.0)),
                ScalarValue::Float64(Some(0.0)),
                ScalarValue::Int64(Some(0)),
            ])
            .unwrap();
        assert_eq!(r, ScalarValue::Int64(Some(15)));

        // ... and in its child 2 at level 1
        let r = t
            .invoke_scalars(vec![
                ScalarValue::Float64(Some(0.0)),
                ScalarValue::Float64(Some(0.0)),
                ScalarValue::Int64(Some(1)),
            ])
            .unwrap();
        assert_eq!(r, ScalarValue::Int64(Some(62)));
    }

    #[test]
    fn id_level_round_trip() {
        let id_tester = id_tester();
        let level_tester = ScalarUdfTester::new(htm_level_udf().into(), vec![DataType::Int64]);
        for level in [0i64, 1, 7, 20] {
            let id = id_tester
                .invoke_scalars(vec![
                    ScalarValue::Float64(Some(123.4)),
                    ScalarValue::Float64(Some(-56.7)),
                    ScalarValue::Int64(Some(level)),
                ])
                .unwrap();
            let ScalarValue::Int64(Some(id)) = id else {
                panic!("Expected non-null id");
            };
            assert_eq!(
                level_tester.invoke_scalar(id).unwrap(),
                ScalarValue::Int64(Some(level))
            );
        }
    }

    #[test]
    fn id_nulls_and_errors() {
        let t = id_tester();
        // Null inputs produce null
        let r = t
            .invoke_scalars(vec![
                ScalarValue::Float64(None),
                ScalarValue::Float64(Some(0.0)),
                ScalarValue::Int64(Some(5)),
            ])
            .unwrap();
        assert_eq!(r, ScalarValue::Int64(None));
        let r = t
            .invoke_scalars(vec![
                ScalarValue::Float64(Some(0.0)),
                ScalarValue::Float64(Some(0.0)),
                ScalarValue::Int64(None),
            ])
            .unwrap();
        assert_eq!(r, ScalarValue::Int64(None));

        // An out-of-range latitude is a null
        let r = t
            .invoke_scalars(vec![
                ScalarValue::Float64(Some(0.0)),
                ScalarValue::Float64(Some(90.1)),
                ScalarValue::Int64(Some(5)),
            ])
            .unwrap();
        assert_eq!(r, ScalarValue::Int64(None));

        // An out-of-range level is an error
        for level in [-1i64, 21] {
            let r = t.invoke_scalars(vec![
                ScalarValue::Float64(Some(0.0)),
                ScalarValue::Float64(Some(0.0)),
                ScalarValue::Int64(Some(level)),
            ]);
            assert!(r.is_err(), "level = {level}");
        }
    }

    #[test]
    fn level_of_invalid_id_is_null() {
        let t = ScalarUdfTester::new(htm_level_udf().into(), vec![DataType::Int64]);
        for id in [0i64, 7, 16, -1] {
            assert_eq!(t.invoke_scalar(id).unwrap(), ScalarValue::Int64(None));
        }
        assert_eq!(t.invoke_scalar(8).unwrap(), ScalarValue::Int64(Some(0)));
    }

    #[test]
    fn full_sky_circle_ranges() {
        let t = ScalarUdfTester::new(
            circle_htm_ranges_udf().into(),
            vec![
                DataType::Float64,
                DataType::Float64,
                DataType::Float64,
                DataType::Int64,
                DataType::Int64,
            ],
        );
        let r = t
            .invoke_scalars(vec![
                ScalarValue::Float64(Some(10.0)),
                ScalarValue::Float64(Some(10.0)),
                ScalarValue::Float64(Some(180.0)),
                ScalarValue::Int64(Some(3)),
                ScalarValue::Int64(Some(0)),
            ])
            .unwrap();
        assert_eq!(decode_ranges(&r), vec![(8 << 6, (16 << 6) - 1)]);
    }

    #[test]
    fn circle_ranges_nulls_and_errors() {
        let t = ScalarUdfTester::new(
            circle_htm_ranges_udf().into(),
            vec![
                DataType::Float64,
                DataType::Float64,
                DataType::Float64,
                DataType::Int64,
                DataType::Int64,
            ],
        );
        // Invalid radius is null
        let r = t
            .invoke_scalars(vec![
                ScalarValue::Float64(Some(0.0)),
                ScalarValue::Float64(Some(0.0)),
                ScalarValue::Float64(Some(-0.5)),
                ScalarValue::Int64(Some(3)),
                ScalarValue::Int64(Some(0)),
            ])
            .unwrap();
        assert_eq!(r, ScalarValue::Binary(None));

        // Null maxRanges is null
        let r = t
            .invoke_scalars(vec![
                ScalarValue::Float64(Some(0.0)),
                ScalarValue::Float64(Some(0.0)),
                ScalarValue::Float64(Some(1.0)),
                ScalarValue::Int64(Some(3)),
                ScalarValue::Int64(None),
            ])
            .unwrap();
        assert_eq!(r, ScalarValue::Binary(None));

        // Invalid level is an error
        let r = t.invoke_scalars(vec![
            ScalarValue::Float64(Some(0.0)),
            ScalarValue::Float64(Some(0.0)),
            ScalarValue::Float64(Some(1.0)),
            ScalarValue::Int64(Some(21)),
            ScalarValue::Int64(Some(0)),
        ]);
        assert!(r.is_err());
    }

    #[test]
    fn max_ranges_bound_is_honored() {
        let t = ScalarUdfTester::new(
            circle_htm_ranges_udf().into(),
            vec![
                DataType::Float64,
                DataType::Float64,
                DataType::Float64,
                DataType::Int64,
                DataType::Int64,
            ],
        );
        let r = t
            .invoke_scalars(vec![
                ScalarValue::Float64(Some(0.0)),
                ScalarValue::Float64(Some(0.0)),
                ScalarValue::Float64(Some(20.0)),
                ScalarValue::Int64(Some(10)),
                ScalarValue::Int64(Some(4)),
            ])
            .unwrap();
        assert!(decode_ranges(&r).len() <= 4);
    }

    #[test]
    fn polygon_ranges_from_blob() {
        use skydb_geometry::codec::encode_polygon;
        use skydb_geometry::polygon::SphericalConvexPolygon;
        use skydb_geometry::sphere::Vec3;

        let poly = SphericalConvexPolygon::try_new(vec![
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
        ])
        .unwrap();
        let blob = encode_polygon(&poly);

        let t = ScalarUdfTester::new(
            cpoly_htm_ranges_udf().into(),
            vec![DataType::Binary, DataType::Int64, DataType::Int64],
        );
        let r = t
            .invoke_scalars(vec![
                ScalarValue::Binary(Some(blob)),
                ScalarValue::Int64(Some(6)),
                ScalarValue::Int64(Some(0)),
            ])
            .unwrap();
        let ranges = decode_ranges(&r);
        assert!(!ranges.is_empty());

        // An interior point's id falls inside the ranges
        let p = SphericalCoord::try_new(45.0, 35.0).unwrap();
        let id = htm_id(&p.to_vec3(), 6).unwrap();
        assert!(ranges.iter().any(|(min, max)| id >= *min && id <= *max));

        // A malformed blob is an error
        let r = t.invoke_scalars(vec![
            ScalarValue::Binary(Some(vec![0, 1, 2])),
            ScalarValue::Int64(Some(6)),
            ScalarValue::Int64(Some(0)),
        ]);
        assert!(r.is_err());
    }
}
