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

//! Convex polygons on the unit sphere.

use crate::error::SkydbGeometryError;
use crate::sphere::{SphericalCoord, Vec3};

/// Maximum number of polygon vertices.
///
/// Matches the widest variadic call form and bounds the work done per
/// containment test and per decoded blob.
pub const MAX_VERTICES: usize = 20;

/// Vertices whose scalar triple product is below this threshold are treated
/// as collinear.
const COLLINEAR_TOLERANCE: f64 = 1e-14;

/// Half-space slack for the convexity validation, applied to normalized edge
/// plane normals.
const CONVEXITY_TOLERANCE: f64 = 1e-12;

/// A convex polygon on the unit sphere.
///
/// Vertices are stored in counter-clockwise order (viewed from outside the
/// sphere); clockwise input is reversed on construction so callers may supply
/// either winding. Each adjacent vertex pair defines a great-circle edge whose
/// plane normal is precomputed for half-space containment tests.
#[derive(Debug, Clone, PartialEq)]
pub struct SphericalConvexPolygon {
    vertices: Vec<Vec3>,
    edges: Vec<Vec3>,
    vertex_sum: Vec3,
}

impl SphericalConvexPolygon {
    /// Builds a polygon from unit-vector vertices in either winding order.
    ///
    /// Fails if there are fewer than 3 or more than [MAX_VERTICES] vertices,
    /// if the leading vertices are collinear, if any edge is degenerate, or
    /// if the vertex set is not convex.
    pub fn try_new(mut vertices: Vec<Vec3>) -> Result<Self, SkydbGeometryError> {
        if vertices.len() < 3 || vertices.len() > MAX_VERTICES {
            return Err(SkydbGeometryError::invalid(format!(
                "a convex spherical polygon requires between 3 and {} vertices, got {}",
                MAX_VERTICES,
                vertices.len()
            )));
        }
        // Normalize the winding so edge plane normals point inward.
        let triple = vertices[0].dot(&vertices[1].cross(&vertices[2]));
        if triple.abs() <= COLLINEAR_TOLERANCE {
            return Err(SkydbGeometryError::invalid(
                "polygon vertices are collinear",
            ));
        }
        if triple < 0.0 {
            vertices.reverse();
        }
        let edges = Self::edge_planes(&vertices)?;
        Self::validate_convex(&vertices, &edges)?;
        let vertex_sum = Self::sum(&vertices);
        Ok(Self {
            vertices,
            edges,
            vertex_sum,
        })
    }

    /// Builds a polygon from longitude/latitude vertices.
    pub fn from_coords(coords: &[SphericalCoord]) -> Result<Self, SkydbGeometryError> {
        Self::try_new(coords.iter().map(|c| c.to_vec3()).collect())
    }

    /// Reassembles a polygon from previously computed parts, re-checking
    /// convexity but not recomputing the edge planes. Used by the binary
    /// codec, where the edge planes travel with the vertices.
    pub(crate) fn from_parts(
        vertices: Vec<Vec3>,
        edges: Vec<Vec3>,
    ) -> Result<Self, SkydbGeometryError> {
        if vertices.len() < 3 || vertices.len() > MAX_VERTICES || edges.len() != vertices.len() {
            return Err(SkydbGeometryError::invalid(
                "mismatched polygon vertex and edge counts",
            ));
        }
        Self::validate_convex(&vertices, &edges)?;
        let vertex_sum = Self::sum(&vertices);
        Ok(Self {
            vertices,
            edges,
            vertex_sum,
        })
    }

    fn edge_planes(vertices: &[Vec3]) -> Result<Vec<Vec3>, SkydbGeometryError> {
        let n = vertices.len();
        let mut edges = Vec::with_capacity(n);
        for i in 0..n {
            // The cross product of two consecutive vertices is parallel to
            // the edge plane normal.
            let e = vertices[i].cross(&vertices[(i + 1) % n]);
            if e.norm2() == 0.0 {
                return Err(SkydbGeometryError::invalid(
                    "degenerate polygon edge: consecutive vertices are identical or antipodal",
                ));
            }
            edges.push(e);
        }
        Ok(edges)
    }

    fn validate_convex(vertices: &[Vec3], edges: &[Vec3]) -> Result<(), SkydbGeometryError> {
        for e in edges {
            let norm = e.norm();
            if norm == 0.0 || !norm.is_finite() {
                return Err(SkydbGeometryError::invalid("degenerate polygon edge"));
            }
            for v in vertices {
                if v.dot(e) / norm < -CONVEXITY_TOLERANCE {
                    return Err(SkydbGeometryError::invalid(
                        "polygon vertices are not convex",
                    ));
                }
            }
        }
        Ok(())
    }

    fn sum(vertices: &[Vec3]) -> Vec3 {
        let mut sum = Vec3::new(0.0, 0.0, 0.0);
        for v in vertices {
            sum = sum.add(v);
        }
        sum
    }

    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    pub fn edges(&self) -> &[Vec3] {
        &self.edges
    }

    /// The (unnormalized) sum of all vertices; a strictly interior direction
    /// for any valid convex polygon.
    pub fn vertex_sum(&self) -> &Vec3 {
        &self.vertex_sum
    }

    /// Tests whether the unit vector `v` lies inside this polygon
    /// (on the interior side of every edge plane).
    pub fn contains(&self, v: &Vec3) -> bool {
        self.edges.iter().all(|e| v.dot(e) >= 0.0)
    }

    /// Tests whether the coordinate pair `p` lies inside this polygon.
    pub fn contains_coord(&self, p: &SphericalCoord) -> bool {
        self.contains(&p.to_vec3())
    }
}
