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

//! Binary serialization for convex spherical polygons.
//!
//! The blob layout is fixed and little-endian:
//!
//! ```text
//! offset  size  field
//! 0       1     format tag (FORMAT_TAG)
//! 1       1     vertex count n (3..=MAX_VERTICES)
//! 2       24*n  vertex unit vectors, (x, y, z) f64 triples
//! 2+24*n  24*n  edge plane normals, (x, y, z) f64 triples
//! ```
//!
//! Vertices round-trip bit-for-bit; the precomputed edge planes travel with
//! them so a decoded polygon is ready for containment tests without
//! recomputation.

use crate::error::SkydbGeometryError;
use crate::polygon::{SphericalConvexPolygon, MAX_VERTICES};
use crate::sphere::Vec3;

/// Leading byte of every encoded polygon; bump when the layout changes.
pub const FORMAT_TAG: u8 = 1;

const HEADER_SIZE: usize = 2;
const VEC3_SIZE: usize = 3 * size_of::<f64>();

/// Returns the encoded size in bytes of a polygon with `n` vertices.
pub fn encoded_size(n: usize) -> usize {
    HEADER_SIZE + 2 * n * VEC3_SIZE
}

fn put_vec3(out: &mut Vec<u8>, v: &Vec3) {
    out.extend_from_slice(&v.x.to_le_bytes());
    out.extend_from_slice(&v.y.to_le_bytes());
    out.extend_from_slice(&v.z.to_le_bytes());
}

fn get_f64(bytes: &[u8], offset: usize) -> f64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[offset..offset + 8]);
    f64::from_le_bytes(buf)
}

fn get_vec3(bytes: &[u8], offset: usize) -> Vec3 {
    Vec3::new(
        get_f64(bytes, offset),
        get_f64(bytes, offset + 8),
        get_f64(bytes, offset + 16),
    )
}

/// Serializes a polygon to its binary representation.
pub fn encode_polygon(polygon: &SphericalConvexPolygon) -> Vec<u8> {
    let n = polygon.vertices().len();
    let mut out = Vec::with_capacity(encoded_size(n));
    out.push(FORMAT_TAG);
    out.push(n as u8);
    for v in polygon.vertices() {
        put_vec3(&mut out, v);
    }
    for e in polygon.edges() {
        put_vec3(&mut out, e);
    }
    out
}

/// Deserializes a polygon from its binary representation.
///
/// Fails on an unknown format tag, an out-of-range vertex count, a length
/// that does not match the count, or content that does not describe a convex
/// polygon.
pub fn decode_polygon(bytes: &[u8]) -> Result<SphericalConvexPolygon, SkydbGeometryError> {
    if bytes.len() < HEADER_SIZE {
        return Err(SkydbGeometryError::invalid(
            "polygon blob is too short to contain a header",
        ));
    }
    if bytes[0] != FORMAT_TAG {
        return Err(SkydbGeometryError::invalid(format!(
            "unknown polygon blob format tag {}",
            bytes[0]
        )));
    }
    let n = bytes[1] as usize;
    if !(3..=MAX_VERTICES).contains(&n) {
        return Err(SkydbGeometryError::invalid(format!(
            "polygon blob vertex count {n} is not in [3, {MAX_VERTICES}]"
        )));
    }
    if bytes.len() != encoded_size(n) {
        return Err(SkydbGeometryError::invalid(format!(
            "polygon blob with {n} vertices must be {} bytes, got {}",
            encoded_size(n),
            bytes.len()
        )));
    }
    let mut vertices = Vec::with_capacity(n);
    let mut edges = Vec::with_capacity(n);
    for i in 0..n {
        let v = get_vec3(bytes, HEADER_SIZE + i * VEC3_SIZE);
        Vec3::try_new(v.x, v.y, v.z)?;
        vertices.push(v);
    }
    for i in 0..n {
        let e = get_vec3(bytes, HEADER_SIZE + (n + i) * VEC3_SIZE);
        Vec3::try_new(e.x, e.y, e.z)?;
        edges.push(e);
    }
    SphericalConvexPolygon::from_parts(vertices, edges)
}
