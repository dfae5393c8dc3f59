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

//! Convex spherical polygon UDFs: the s2PtInCPoly() predicate (with its
//! variadic-coordinate and packed-binary call forms) and the s2CPolyToBin()
//! constructor that encodes a polygon once for reuse across many predicate
//! evaluations.

use std::sync::Arc;

use arrow_array::builder::{BinaryBuilder, BooleanBuilder};
use arrow_array::Array;
use arrow_schema::DataType;
use datafusion_common::error::{DataFusionError, Result};
use datafusion_expr::{scalar_doc_sections::DOC_SECTION_OTHER, ColumnarValue, Documentation, Volatility};
use skydb_expr::matchers::ArgMatcher;
use skydb_expr::scalar_udf::{SkydbScalarKernel, SkydbScalarUDF};
use skydb_geometry::codec::{decode_polygon, encode_polygon};
use skydb_geometry::polygon::{SphericalConvexPolygon, MAX_VERTICES};
use skydb_geometry::sphere::{SphericalCoord, Vec3};

use crate::executor::{binary_array, float_arrays, float_row, ColumnarExecutor};

/// s2PtInCPoly() scalar UDF implementation
///
/// Returns true if the point (lon, lat) lies inside the given convex
/// spherical polygon. The polygon may be supplied either as a binary string
/// produced by s2CPolyToBin(), or as a sequence of at least 3 and at most
/// [MAX_VERTICES] vertex coordinate pairs in either winding order.
pub fn pt_in_cpoly_udf() -> SkydbScalarUDF {
    SkydbScalarUDF::new(
        "s2PtInCPoly",
        vec![Arc::new(PtInCPolyVertices {}), Arc::new(PtInCPolyBin {})],
        Volatility::Immutable,
        Some(pt_in_cpoly_doc()),
    )
}

fn pt_in_cpoly_doc() -> Documentation {
    Documentation::builder(
        DOC_SECTION_OTHER,
        "Return true if the point (lon, lat) lies inside the given convex spherical polygon",
        "s2PtInCPoly(lon, lat, poly)",
    )
    .with_argument("lon", "double: Longitude angle of the point to test, degrees")
    .with_argument("lat", "double: Latitude angle of the point to test, degrees")
    .with_argument(
        "poly",
        "binary: Polygon byte string from s2CPolyToBin(); alternatively, pass \
         at least 3 vertex coordinate pairs as additional double arguments",
    )
    .with_sql_example(
        "SELECT s2PtInCPoly(0.0, 0.0, llcRa, llcDecl, ulcRa, ulcDecl, urcRa, urcDecl, \
         lrcRa, lrcDecl) FROM Science_Ccd_Exposure",
    )
    .build()
}

/// s2CPolyToBin() scalar UDF implementation
///
/// Packs a list of vertex coordinate pairs into the binary polygon
/// representation consumed by s2PtInCPoly() and s2CPolyHtmRanges().
pub fn cpoly_to_bin_udf() -> SkydbScalarUDF {
    SkydbScalarUDF::new(
        "s2CPolyToBin",
        vec![Arc::new(CPolyToBin {})],
        Volatility::Immutable,
        Some(cpoly_to_bin_doc()),
    )
}

fn cpoly_to_bin_doc() -> Documentation {
    Documentation::builder(
        DOC_SECTION_OTHER,
        "Encode a convex spherical polygon into a binary string",
        "s2CPolyToBin(v1Lon, v1Lat, v2Lon, v2Lat, v3Lon, v3Lat)",
    )
    .with_argument("vNLon", "double: Longitude angle of the N-th vertex, degrees")
    .with_argument("vNLat", "double: Latitude angle of the N-th vertex, degrees")
    .with_sql_example("SELECT s2CPolyToBin(-10.0, -10.0, 10.0, -10.0, 10.0, 10.0, -10.0, 10.0)")
    .build()
}

/// Checks that `args` consists of a coordinate pair followed by `3..=n`
/// vertex coordinate pairs, all numeric.
fn variadic_vertex_match(args: &[DataType], leading: usize) -> bool {
    let nvertex_args = args.len().saturating_sub(leading);
    if nvertex_args < 6 || nvertex_args % 2 != 0 || nvertex_args / 2 > MAX_VERTICES {
        return false;
    }
    args.iter()
        .all(|arg| arg.is_numeric() || *arg == DataType::Null)
}

fn geometry_err(e: skydb_geometry::error::SkydbGeometryError) -> DataFusionError {
    DataFusionError::External(Box::new(e))
}

/// Builds a polygon from a row of vertex coordinates.
///
/// A latitude outside [-90, 90] (or a non-finite coordinate) is a data fault
/// reported as `None`; a structurally invalid vertex set is an error.
fn polygon_from_row(coords: &[f64]) -> Result<Option<SphericalConvexPolygon>> {
    let mut vertices: Vec<Vec3> = Vec::with_capacity(coords.len() / 2);
    for pair in coords.chunks_exact(2) {
        match SphericalCoord::try_new(pair[0], pair[1]) {
            Ok(c) => vertices.push(c.to_vec3()),
            Err(_) => return Ok(None),
        }
    }
    SphericalConvexPolygon::try_new(vertices)
        .map(Some)
        .map_err(geometry_err)
}

#[derive(Debug)]
struct PtInCPolyVertices {}

impl SkydbScalarKernel for PtInCPolyVertices {
    fn return_type(&self, args: &[DataType]) -> Result<Option<DataType>> {
        if variadic_vertex_match(args, 2) {
            Ok(Some(DataType::Boolean))
        } else {
            Ok(None)
        }
    }

    fn invoke_batch(
        &self,
        _arg_types: &[DataType],
        args: &[ColumnarValue],
    ) -> Result<ColumnarValue> {
        let executor = ColumnarExecutor::new(args);
        let n = executor.num_iterations();
        let columns = float_arrays(args, n)?;

        // Cache the polygon across the batch when every vertex argument is
        // constant.
        let const_poly = args[2..]
            .iter()
            .all(|arg| matches!(arg, ColumnarValue::Scalar(_)));
        let mut cached: Option<Option<SphericalConvexPolygon>> = None;

        let mut builder = BooleanBuilder::with_capacity(n);
        for i in 0..n {
            match float_row(&columns, i) {
                Some(v) => {
                    let poly = if const_poly {
                        if cached.is_none() {
                            cached = Some(polygon_from_row(&v[2..])?);
                        }
                        cached.clone().unwrap()
                    } else {
                        polygon_from_row(&v[2..])?
                    };
                    match (SphericalCoord::try_new(v[0], v[1]).ok(), poly) {
                        (Some(p), Some(poly)) => builder.append_value(poly.contains_coord(&p)),
                        _ => builder.append_null(),
                    }
                }
                None => builder.append_null(),
            }
        }
        executor.finish(Arc::new(builder.finish()))
    }
}

#[derive(Debug)]
struct PtInCPolyBin {}

impl SkydbScalarKernel for PtInCPolyBin {
    fn return_type(&self, args: &[DataType]) -> Result<Option<DataType>> {
        let matcher = ArgMatcher::new(
            vec![
                ArgMatcher::is_numeric(),
                ArgMatcher::is_numeric(),
                ArgMatcher::is_binary(),
            ],
            DataType::Boolean,
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
        let blobs = binary_array(&args[2], n)?;

        // Decode once when the polygon argument is constant.
        let const_poly = matches!(&args[2], ColumnarValue::Scalar(_));
        let mut cached: Option<SphericalConvexPolygon> = None;

        let mut builder = BooleanBuilder::with_capacity(n);
        for i in 0..n {
            if blobs.is_null(i) {
                builder.append_null();
                continue;
            }
            let poly = if const_poly {
                if cached.is_none() {
                    cached = Some(decode_polygon(blobs.value(i)).map_err(geometry_err)?);
                }
                cached.clone().unwrap()
            } else {
                decode_polygon(blobs.value(i)).map_err(geometry_err)?
            };
            match float_row(&coords, i) {
                Some(v) => match SphericalCoord::try_new(v[0], v[1]) {
                    Ok(p) => builder.append_value(poly.contains_coord(&p)),
                    Err(_) => builder.append_null(),
                },
                None => builder.append_null(),
            }
        }
        executor.finish(Arc::new(builder.finish()))
    }
}

#[derive(Debug)]
struct CPolyToBin {}

impl SkydbScalarKernel for CPolyToBin {
    fn return_type(&self, args: &[DataType]) -> Result<Option<DataType>> {
        if variadic_vertex_match(args, 0) {
            Ok(Some(DataType::Binary))
        } else {
            Ok(None)
        }
    }

    fn invoke_batch(
        &self,
        _arg_types: &[DataType],
        args: &[ColumnarValue],
    ) -> Result<ColumnarValue> {
        let executor = ColumnarExecutor::new(args);
        let n = executor.num_iterations();
        let columns = float_arrays(args, n)?;
        let mut builder = BinaryBuilder::new();
        for i in 0..n {
            match float_row(&columns, i) {
                Some(v) => match polygon_from_row(&v)? {
                    Some(poly) => builder.append_value(encode_polygon(&poly)),
                    None => builder.append_null(),
                },
                None => builder.append_null(),
            }
        }
        executor.finish(Arc::new(builder.finish()))
    }
}

#[cfg(test)]
mod tests {
    use datafusion_common::ScalarValue;
    use skydb_testing::testers::ScalarUdfTester;

    use super::*;

    fn octant_coords() -> Vec<f64> {
        // The (+x, +y, +z) octant triangle
        vec![0.0, 0.0, 90.0, 0.0, 0.0, 90.0]
    }

    fn vertex_tester(nargs: usize) -> ScalarUdfTester {
        ScalarUdfTester::new(pt_in_cpoly_udf().into(), vec![DataType::Float64; nargs])
    }

    fn bin_tester() -> ScalarUdfTester {
        ScalarUdfTester::new(
            pt_in_cpoly_udf().into(),
            vec![DataType::Float64, DataType::Float64, DataType::Binary],
        )
    }

    fn encode_tester(nargs: usize) -> ScalarUdfTester {
        ScalarUdfTester::new(cpoly_to_bin_udf().into(), vec![DataType::Float64; nargs])
    }

    fn floats(values: &[f64]) -> Vec<ScalarValue> {
        values.iter().map(|v| ScalarValue::Float64(Some(*v))).collect()
    }

    #[test]
    fn udf_metadata() {
        let udf: datafusion_expr::ScalarUDF = pt_in_cpoly_udf().into();
        assert_eq!(udf.name(), "s2PtInCPoly");
        assert!(udf.documentation().is_some());

        let udf: datafusion_expr::ScalarUDF = cpoly_to_bin_udf().into();
        assert_eq!(udf.name(), "s2CPolyToBin");
        assert!(udf.documentation().is_some());
    }

    #[test]
    fn signatures() {
        vertex_tester(8).assert_return_type(DataType::Boolean);
        vertex_tester(2 + 2 * MAX_VERTICES).assert_return_type(DataType::Boolean);
        bin_tester().assert_return_type(DataType::Boolean);
        encode_tester(6).assert_return_type(DataType::Binary);
        encode_tester(2 * MAX_VERTICES).assert_return_type(DataType::Binary);

        // Odd argument counts and too-short vertex lists don't resolve
        assert!(vertex_tester(7).return_type().is_err());
        assert!(vertex_tester(6).return_type().is_err());
        assert!(encode_tester(4).return_type().is_err());
        assert!(encode_tester(2 * MAX_VERTICES + 2).return_type().is_err());
    }

    #[test]
    fn direct_vertex_membership() {
        let t = vertex_tester(8);
        let mut args = vec![45.0, 35.0];
        args.extend(octant_coords());
        assert_eq!(
            t.invoke_scalars(floats(&args)).unwrap(),
            ScalarValue::Boolean(Some(true))
        );

        let mut args = vec![225.0, -35.0];
        args.extend(octant_coords());
        assert_eq!(
            t.invoke_scalars(floats(&args)).unwrap(),
            ScalarValue::Boolean(Some(false))
        );
    }

    #[test]
    fn winding_order_is_normalized() {
        let t = vertex_tester(8);
        let mut reversed = vec![45.0, 35.0];
        for pair in octant_coords().chunks_exact(2).rev() {
            reversed.extend_from_slice(pair);
        }
        assert_eq!(
            t.invoke_scalars(floats(&reversed)).unwrap(),
            ScalarValue::Boolean(Some(true))
        );
    }

    #[test]
    fn binary_form_agrees_with_direct_form() {
        let blob = encode_tester(6)
            .invoke_scalars(floats(&octant_coords()))
            .unwrap();
        let ScalarValue::Binary(Some(blob)) = blob else {
            panic!("Expected binary result");
        };

        let t = bin_tester();
        for (lon, lat, expected) in [(45.0, 35.0, true), (225.0, -35.0, false)] {
            let result = t
                .invoke_scalars(vec![
                    ScalarValue::Float64(Some(lon)),
                    ScalarValue::Float64(Some(lat)),
                    ScalarValue::Binary(Some(blob.clone())),
                ])
                .unwrap();
            assert_eq!(result, ScalarValue::Boolean(Some(expected)));
        }
    }

    #[test]
    fn null_propagation() {
        let t = vertex_tester(8);
        let mut args = floats(&[45.0, 35.0]);
        args.extend(floats(&octant_coords()));
        for null_pos in 0..args.len() {
            let mut nulled = args.clone();
            nulled[null_pos] = ScalarValue::Float64(None);
            assert_eq!(
                t.invoke_scalars(nulled).unwrap(),
                ScalarValue::Boolean(None)
            );
        }

        let t = bin_tester();
        let result = t
            .invoke_scalars(vec![
                ScalarValue::Float64(Some(0.0)),
                ScalarValue::Float64(Some(0.0)),
                ScalarValue::Binary(None),
            ])
            .unwrap();
        assert_eq!(result, ScalarValue::Boolean(None));
    }

    #[test]
    fn invalid_point_latitude() {
        let t = vertex_tester(8);
        let mut args = vec![0.0, 91.0];
        args.extend(octant_coords());
        assert_eq!(
            t.invoke_scalars(floats(&args)).unwrap(),
            ScalarValue::Boolean(None)
        );
    }

    #[test]
    fn degenerate_polygon_is_an_error() {
        // Collinear vertices along the equator
        let t = vertex_tester(8);
        let args = vec![0.0, 10.0, 0.0, 0.0, 10.0, 0.0, 20.0, 0.0];
        assert!(t.invoke_scalars(floats(&args)).is_err());

        let t = encode_tester(6);
        let args = vec![0.0, 0.0, 10.0, 0.0, 20.0, 0.0];
        assert!(t.invoke_scalars(floats(&args)).is_err());
    }

    #[test]
    fn malformed_blob_is_an_error() {
        let t = bin_tester();
        let result = t.invoke_scalars(vec![
            ScalarValue::Float64(Some(0.0)),
            ScalarValue::Float64(Some(0.0)),
            ScalarValue::Binary(Some(vec![1, 2, 3])),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn encode_null_propagation() {
        let t = encode_tester(6);
        let mut args = floats(&octant_coords());
        args[3] = ScalarValue::Float64(None);
        assert_eq!(
            t.invoke_scalars(args).unwrap(),
            ScalarValue::Binary(None)
        );
    }

    #[test]
    fn encode_invalid_latitude_is_null() {
        let t = encode_tester(6);
        let args = vec![0.0, 0.0, 90.0, 0.0, 0.0, 90.5];
        assert_eq!(
            t.invoke_scalars(floats(&args)).unwrap(),
            ScalarValue::Binary(None)
        );
    }
}
