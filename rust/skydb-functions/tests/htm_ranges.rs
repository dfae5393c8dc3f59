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

//! End-to-end checks of the HTM range functions: ranges must never miss a
//! point accepted by the exact predicate (the ranges are an over-inclusive
//! prefilter), and the range blobs must be readable with extractInt64().

use arrow_schema::DataType;
use datafusion_common::ScalarValue;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use skydb_functions::cpoly::cpoly_to_bin_udf;
use skydb_functions::extract_int64::extract_int64_udf;
use skydb_functions::htm_functions::{circle_htm_ranges_udf, cpoly_htm_ranges_udf, htm_id_udf};
use skydb_functions::pt_in_circle::pt_in_circle_udf;
use skydb_testing::testers::ScalarUdfTester;

const LEVEL: i64 = 10;

fn random_points(n: usize, seed: u64) -> Vec<(f64, f64)> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            let lon = rng.random_range(0.0..360.0);
            let z: f64 = rng.random_range(-1.0..1.0);
            (lon, z.asin().to_degrees())
        })
        .collect()
}

fn float(value: f64) -> ScalarValue {
    ScalarValue::Float64(Some(value))
}

fn int(value: i64) -> ScalarValue {
    ScalarValue::Int64(Some(value))
}

fn unpack_ranges(value: &ScalarValue) -> Vec<(i64, i64)> {
    let ScalarValue::Binary(Some(bytes)) = value else {
        panic!("Expected a non-null range blob, got {value:?}");
    };
    assert_eq!(bytes.len() % 16, 0, "range blob length must be a multiple of 16");
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

fn covered(ranges: &[(i64, i64)], id: i64) -> bool {
    ranges.iter().any(|(min, max)| id >= *min && id <= *max)
}

fn point_id(tester: &ScalarUdfTester, lon: f64, lat: f64) -> i64 {
    let ScalarValue::Int64(Some(id)) = tester
        .invoke_scalars(vec![float(lon), float(lat), int(LEVEL)])
        .unwrap()
    else {
        panic!("Expected a non-null HTM id");
    };
    id
}

#[test]
fn circle_ranges_never_miss_predicate_matches() {
    let id_tester = ScalarUdfTester::new(
        htm_id_udf().into(),
        vec![DataType::Float64, DataType::Float64, DataType::Int64],
    );
    let circle_tester = ScalarUdfTester::new(pt_in_circle_udf().into(), vec![DataType::Float64; 5]);
    let ranges_tester = ScalarUdfTester::new(
        circle_htm_ranges_udf().into(),
        vec![
            DataType::Float64,
            DataType::Float64,
            DataType::Float64,
            DataType::Int64,
            DataType::Int64,
        ],
    );

    let circles = [(20.0, 10.0, 8.0), (200.0, -65.0, 3.0), (359.5, 0.0, 1.5)];
    let points = random_points(500, 987654321);

    for (cen_lon, cen_lat, radius) in circles {
        let ranges = unpack_ranges(
            &ranges_tester
                .invoke_scalars(vec![
                    float(cen_lon),
                    float(cen_lat),
                    float(radius),
                    int(LEVEL),
                    int(0),
                ])
                .unwrap(),
        );
        // Sorted, non-overlapping, non-adjacent
        for pair in ranges.windows(2) {
            assert!(pair[1].0 > pair[0].1 + 1);
        }

        // Concentrate test points near the circle so both sides are covered
        let local_points = points.iter().map(|(dlon, dlat)| {
            let lon = (cen_lon + dlon * radius * 3.0 / 360.0).rem_euclid(360.0);
            let lat = (cen_lat + (dlat / 90.0) * radius * 3.0).clamp(-90.0, 90.0);
            (lon, lat)
        });

        let mut inside_count = 0;
        for (lon, lat) in local_points {
            let inside = circle_tester
                .invoke_scalars(vec![
                    float(lon),
                    float(lat),
                    float(cen_lon),
                    float(cen_lat),
                    float(radius),
                ])
                .unwrap();
            if inside == ScalarValue::Boolean(Some(true)) {
                inside_count += 1;
                let id = point_id(&id_tester, lon, lat);
                assert!(
                    covered(&ranges, id),
                    "point ({lon}, {lat}) inside circle ({cen_lon}, {cen_lat}, {radius}) \
                     but its trixel is not covered"
                );
            }
        }
        assert!(inside_count > 0, "test produced no interior points");
    }
}

#[test]
fn polygon_ranges_never_miss_contained_points() {
    let id_tester = ScalarUdfTester::new(
        htm_id_udf().into(),
        vec![DataType::Float64, DataType::Float64, DataType::Int64],
    );
    let encode_tester = ScalarUdfTester::new(cpoly_to_bin_udf().into(), vec![DataType::Float64; 8]);
    let ranges_tester = ScalarUdfTester::new(
        cpoly_htm_ranges_udf().into(),
        vec![DataType::Binary, DataType::Int64, DataType::Int64],
    );

    // A quad straddling the longitude discontinuity
    let quad = [355.0, -4.0, 5.0, -4.0, 5.0, 4.0, 355.0, 4.0];
    let blob = encode_tester
        .invoke_scalars(quad.iter().map(|v| float(*v)).collect())
        .unwrap();
    let ScalarValue::Binary(Some(blob)) = blob else {
        panic!("Expected a polygon blob");
    };

    let ranges = unpack_ranges(
        &ranges_tester
            .invoke_scalars(vec![
                ScalarValue::Binary(Some(blob)),
                int(LEVEL),
                int(0),
            ])
            .unwrap(),
    );
    assert!(!ranges.is_empty());

    // Interior grid points must all be covered
    for lon in [356.0, 358.0, 0.0, 2.0, 4.0] {
        for lat in [-3.0, 0.0, 3.0] {
            let id = point_id(&id_tester, lon, lat);
            assert!(
                covered(&ranges, id),
                "interior point ({lon}, {lat}) not covered"
            );
        }
    }

    // A far-away point must not be covered
    let id = point_id(&id_tester, 180.0, 45.0);
    assert!(!covered(&ranges, id));
}

#[test]
fn range_blobs_are_readable_with_extract_int64() {
    let ranges_tester = ScalarUdfTester::new(
        circle_htm_ranges_udf().into(),
        vec![
            DataType::Float64,
            DataType::Float64,
            DataType::Float64,
            DataType::Int64,
            DataType::Int64,
        ],
    );
    let extract_tester = ScalarUdfTester::new(
        extract_int64_udf().into(),
        vec![DataType::Binary, DataType::Int64],
    );

    let blob = ranges_tester
        .invoke_scalars(vec![float(45.0), float(45.0), float(2.0), int(6), int(0)])
        .unwrap();
    let ranges = unpack_ranges(&blob);
    let ScalarValue::Binary(Some(bytes)) = blob else {
        unreachable!();
    };

    for (i, (min, max)) in ranges.iter().enumerate() {
        let extracted_min = extract_tester
            .invoke_scalars(vec![
                ScalarValue::Binary(Some(bytes.clone())),
                int(2 * i as i64),
            ])
            .unwrap();
        let extracted_max = extract_tester
            .invoke_scalars(vec![
                ScalarValue::Binary(Some(bytes.clone())),
                int(2 * i as i64 + 1),
            ])
            .unwrap();
        assert_eq!(extracted_min, ScalarValue::Int64(Some(*min)));
        assert_eq!(extracted_max, ScalarValue::Int64(Some(*max)));
    }

    // One past the end is null
    let past_end = extract_tester
        .invoke_scalars(vec![
            ScalarValue::Binary(Some(bytes)),
            int(2 * ranges.len() as i64),
        ])
        .unwrap();
    assert_eq!(past_end, ScalarValue::Int64(None));
}
