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

//! Hierarchical Triangular Mesh (HTM) indexing.
//!
//! HTM triangles are subdivided into 4 sub-triangles as follows:
//!
//! ```text
//!         v2
//!          *
//!         / \
//!        /   \
//!   sv1 *-----* sv0
//!      / \   / \
//!     /   \ /   \
//! v0 *-----*-----* v1
//!         sv2
//! ```
//!
//! - vertices are unit magnitude 3-vectors
//! - edges are great circles on the unit sphere
//! - vertices are stored in counter-clockwise order (when viewed from
//!   outside the unit sphere in a right handed coordinate system)
//! - `sv0 = (v1 + v2) / ||v1 + v2||`, and likewise for sv1, sv2
//!
//! If the triangle `(v0, v1, v2)` has index I, then:
//! - sub triangle T0 = (v0, sv2, sv1) has index I*4
//! - sub triangle T1 = (v1, sv0, sv2) has index I*4 + 1
//! - sub triangle T2 = (v2, sv1, sv0) has index I*4 + 2
//! - sub triangle T3 = (sv0, sv1, sv2) has index I*4 + 3
//!
//! All HTM triangles are obtained via subdivision of 8 initial triangles,
//! defined from 6 axis vertices; the root triangle with ordinal R has HTM
//! index R + 8, so that the number of significant bits in an index encodes
//! its subdivision level.
//!
//! This scheme is based on work by A. Szalay, T. Budavari, G. Fekete at
//! The Johns Hopkins University, and Jim Gray, Microsoft Research:
//!
//! <http://adsabs.harvard.edu/abs/2010PASP..122.1375B>

use crate::error::SkydbGeometryError;
use crate::polygon::{SphericalConvexPolygon, MAX_VERTICES};
use crate::regions::SphericalCircle;
use crate::sphere::{Vec3, RAD_PER_DEG};

/// Maximum HTM subdivision level.
pub const MAX_LEVEL: u32 = 20;

/// HTM root triangle vertices/edge plane normals, in the order
/// Z, X, Y, -X, -Y, -Z.
const AXIS: [Vec3; 6] = [
    Vec3::new(0.0, 0.0, 1.0),
    Vec3::new(1.0, 0.0, 0.0),
    Vec3::new(0.0, 1.0, 0.0),
    Vec3::new(-1.0, 0.0, 0.0),
    Vec3::new(0.0, -1.0, 0.0),
    Vec3::new(0.0, 0.0, -1.0),
];

const Z: usize = 0;
const X: usize = 1;
const Y: usize = 2;
const NX: usize = 3;
const NY: usize = 4;
const NZ: usize = 5;

/// Vertex indices (into [AXIS]) for the 3 vertices of each root triangle
/// S0-S3, N0-N3.
const ROOT_VERT: [[usize; 3]; 8] = [
    [X, NZ, Y],
    [Y, NZ, NX],
    [NX, NZ, NY],
    [NY, NZ, X],
    [X, Z, NY],
    [NY, Z, NX],
    [NX, Z, Y],
    [Y, Z, X],
];

/// Edge normal indices (into [AXIS]) for the 3 edge normals of each root
/// triangle.
const ROOT_EDGE: [[usize; 3]; 8] = [
    [Y, X, NZ],
    [NX, Y, NZ],
    [NY, NX, NZ],
    [X, NY, NZ],
    [NY, X, Z],
    [NX, NY, Z],
    [Y, NX, Z],
    [X, Y, Z],
];

/// Spatial relationship between an HTM triangle and a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Coverage {
    /// HTM triangle disjoint from region
    Disjoint,
    /// HTM triangle intersects region
    Intersect,
    /// HTM triangle completely contains region
    Contains,
    /// HTM triangle completely inside region
    Inside,
}

/// Computes the normalized midpoint of two vertices.
fn midpoint(v1: &Vec3, v2: &Vec3) -> Vec3 {
    v1.add(v2).normalized()
}

/// Returns the root triangle ordinal (0-7) for a point.
fn root_ordinal(v: &Vec3) -> usize {
    if v.z < 0.0 {
        // S0, S1, S2, S3
        if v.y > 0.0 {
            if v.x > 0.0 {
                0
            } else {
                1
            }
        } else if v.y == 0.0 {
            if v.x >= 0.0 {
                0
            } else {
                2
            }
        } else if v.x < 0.0 {
            2
        } else {
            3
        }
    } else {
        // N0, N1, N2, N3
        if v.y > 0.0 {
            if v.x > 0.0 {
                7
            } else {
                6
            }
        } else if v.y == 0.0 {
            if v.x >= 0.0 {
                7
            } else {
                5
            }
        } else if v.x < 0.0 {
            5
        } else {
            4
        }
    }
}

/// A node (triangle/trixel) on the current root-to-leaf path of a
/// depth-first HTM traversal. Edge midpoints and subdivision plane normals
/// are filled in on demand as children are produced.
#[derive(Debug, Clone, Copy)]
struct Node {
    vert: [Vec3; 3],
    edge: [Vec3; 3],
    mid_vert: [Vec3; 3],
    mid_edge: [Vec3; 3],
    id: i64,
    /// index of the next child to produce (0-3; 4 when exhausted)
    child: u8,
}

const ZERO3: [Vec3; 3] = [
    Vec3::new(0.0, 0.0, 0.0),
    Vec3::new(0.0, 0.0, 0.0),
    Vec3::new(0.0, 0.0, 0.0),
];

impl Default for Node {
    fn default() -> Self {
        Node {
            vert: ZERO3,
            edge: ZERO3,
            mid_vert: ZERO3,
            mid_edge: ZERO3,
            id: 0,
            child: 0,
        }
    }
}

impl Node {
    fn root(r: usize) -> Node {
        Node {
            vert: [
                AXIS[ROOT_VERT[r][0]],
                AXIS[ROOT_VERT[r][1]],
                AXIS[ROOT_VERT[r][2]],
            ],
            edge: [
                AXIS[ROOT_EDGE[r][0]],
                AXIS[ROOT_EDGE[r][1]],
                AXIS[ROOT_EDGE[r][2]],
            ],
            mid_vert: ZERO3,
            mid_edge: ZERO3,
            id: r as i64 + 8,
            child: 0,
        }
    }

    /// Computes quantities needed by `child0`.
    fn prep0(&mut self) {
        self.mid_vert[1] = midpoint(&self.vert[2], &self.vert[0]);
        self.mid_vert[2] = midpoint(&self.vert[0], &self.vert[1]);
        self.mid_edge[1] = self.mid_vert[2].robust_cross(&self.mid_vert[1]);
    }

    /// Produces child 0. Assumes `prep0` has been called.
    fn child0(&mut self) -> Node {
        self.child = 1;
        Node {
            vert: [self.vert[0], self.mid_vert[2], self.mid_vert[1]],
            edge: [self.edge[0], self.mid_edge[1], self.edge[2]],
            mid_vert: ZERO3,
            mid_edge: ZERO3,
            id: self.id << 2,
            child: 0,
        }
    }

    /// Computes quantities needed by `child1`. Assumes `prep0` has been
    /// called.
    fn prep1(&mut self) {
        self.mid_vert[0] = midpoint(&self.vert[1], &self.vert[2]);
        self.mid_edge[2] = self.mid_vert[0].robust_cross(&self.mid_vert[2]);
    }

    /// Produces child 1. Assumes `prep1` has been called.
    fn child1(&mut self) -> Node {
        self.child = 2;
        Node {
            vert: [self.vert[1], self.mid_vert[0], self.mid_vert[2]],
            edge: [self.edge[1], self.mid_edge[2], self.edge[0]],
            mid_vert: ZERO3,
            mid_edge: ZERO3,
            id: (self.id << 2) + 1,
            child: 0,
        }
    }

    /// Computes quantities needed by `child2`. Assumes `prep1` has been
    /// called.
    fn prep2(&mut self) {
        self.mid_edge[0] = self.mid_vert[1].robust_cross(&self.mid_vert[0]);
    }

    /// Produces child 2. Assumes `prep2` has been called.
    fn child2(&mut self) -> Node {
        self.child = 3;
        Node {
            vert: [self.vert[2], self.mid_vert[1], self.mid_vert[0]],
            edge: [self.edge[2], self.mid_edge[0], self.edge[1]],
            mid_vert: ZERO3,
            mid_edge: ZERO3,
            id: (self.id << 2) + 2,
            child: 0,
        }
    }

    /// Produces child 3 (the central triangle). Assumes `prep2` has been
    /// called.
    fn child3(&mut self) -> Node {
        self.child = 4;
        Node {
            vert: self.mid_vert,
            edge: [
                self.mid_edge[0].neg(),
                self.mid_edge[1].neg(),
                self.mid_edge[2].neg(),
            ],
            mid_vert: ZERO3,
            mid_edge: ZERO3,
            id: (self.id << 2) + 3,
            child: 0,
        }
    }
}

fn check_level(level: i64) -> Result<u32, SkydbGeometryError> {
    if !(0..=MAX_LEVEL as i64).contains(&level) {
        return Err(SkydbGeometryError::invalid(format!(
            "HTM subdivision level {level} is not in the [0, {MAX_LEVEL}] range"
        )));
    }
    Ok(level as u32)
}

/// Computes the HTM ID of `point` at the given subdivision level.
///
/// Descends from the root triangle containing the point, at each level
/// selecting the child triangle containing it via half-space tests against
/// the subdivision plane normals.
pub fn htm_id(point: &Vec3, level: i64) -> Result<i64, SkydbGeometryError> {
    let level = check_level(level)?;
    let r = root_ordinal(point);
    let mut v0 = AXIS[ROOT_VERT[r][0]];
    let mut v1 = AXIS[ROOT_VERT[r][1]];
    let mut v2 = AXIS[ROOT_VERT[r][2]];
    let mut id = r as i64 + 8;
    for _ in 0..level {
        let sv1 = midpoint(&v2, &v0);
        let sv2 = midpoint(&v0, &v1);
        let e = sv2.robust_cross(&sv1);
        if e.dot(point) >= 0.0 {
            v1 = sv2;
            v2 = sv1;
            id <<= 2;
            continue;
        }
        let sv0 = midpoint(&v1, &v2);
        let e = sv0.robust_cross(&sv2);
        if e.dot(point) >= 0.0 {
            v0 = v1;
            v1 = sv0;
            v2 = sv2;
            id = (id << 2) + 1;
            continue;
        }
        let e = sv1.robust_cross(&sv0);
        if e.dot(point) >= 0.0 {
            v0 = v2;
            v1 = sv1;
            v2 = sv0;
            id = (id << 2) + 2;
        } else {
            v0 = sv0;
            v1 = sv1;
            v2 = sv2;
            id = (id << 2) + 3;
        }
    }
    Ok(id)
}

/// Extracts the subdivision level encoded in an HTM ID.
///
/// Valid IDs carry their level in the position of their most significant
/// bit: the root triangles occupy 8-15, and each subdivision appends two
/// bits.
pub fn htm_level(id: i64) -> Result<u32, SkydbGeometryError> {
    if id < 8 {
        return Err(SkydbGeometryError::invalid(format!(
            "{id} is not a valid HTM ID"
        )));
    }
    let msb = 63 - (id as u64).leading_zeros();
    // The root IDs 8-15 put the MSB at bit 3; every level adds 2 bits.
    if msb % 2 == 0 {
        return Err(SkydbGeometryError::invalid(format!(
            "{id} is not a valid HTM ID"
        )));
    }
    let level = (msb - 3) / 2;
    if level > MAX_LEVEL {
        return Err(SkydbGeometryError::invalid(format!(
            "HTM ID {id} encodes subdivision level {level}, beyond the maximum {MAX_LEVEL}"
        )));
    }
    Ok(level)
}

/// A sorted list of non-overlapping, non-adjacent `[min, max]` HTM ID
/// ranges.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RangeList {
    ranges: Vec<(i64, i64)>,
}

impl RangeList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ranges(&self) -> &[(i64, i64)] {
        &self.ranges
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Tests whether `id` falls in any range.
    pub fn contains(&self, id: i64) -> bool {
        self.ranges
            .binary_search_by(|(min, max)| {
                if id < *min {
                    std::cmp::Ordering::Greater
                } else if id > *max {
                    std::cmp::Ordering::Less
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .is_ok()
    }

    /// Appends a range, merging it with the previous range when adjacent or
    /// overlapping. Ranges must be appended in ascending order of `min_id`.
    pub fn add(&mut self, min_id: i64, max_id: i64) {
        if let Some(last) = self.ranges.last_mut() {
            if min_id <= last.1 + 1 {
                if max_id > last.1 {
                    last.1 = max_id;
                }
                return;
            }
        }
        self.ranges.push((min_id, max_id));
    }

    /// Reduces the effective subdivision level of the list by `levels` and
    /// merges newly adjacent ranges. This typically shrinks the list, at the
    /// cost of a poorer approximation of the underlying region; with a
    /// sufficiently large `levels` any list shrinks to at most 4 ranges.
    ///
    /// A range `[min, max]` maps to `[min & !mask, max | mask]` where
    /// `mask = (1 << 2*levels) - 1`.
    pub fn simplify(&mut self, levels: u32) {
        if levels == 0 || self.ranges.is_empty() {
            return;
        }
        let mask = (1i64 << (2 * levels)) - 1;
        let ranges = std::mem::take(&mut self.ranges);
        let mut iter = ranges.into_iter();
        let first = iter.next().unwrap();
        let mut cur = (first.0 & !mask, first.1 | mask);
        for (min, max) in iter {
            let min = min & !mask;
            if min > cur.1 + 1 {
                self.ranges.push(cur);
                cur = (min, max | mask);
            } else {
                cur.1 = max | mask;
            }
        }
        self.ranges.push(cur);
    }
}

/// Returns the coverage code for an HTM triangle against a circle given as a
/// unit center vector and a squared secant (chord) distance.
fn circle_coverage(node: &Node, center: &Vec3, dist2: f64) -> Coverage {
    let i0 = center.edge_dist2(&node.vert[0], &node.vert[1], &node.edge[0]) <= dist2;
    let i1 = center.edge_dist2(&node.vert[1], &node.vert[2], &node.edge[1]) <= dist2;
    let i2 = center.edge_dist2(&node.vert[2], &node.vert[0], &node.edge[2]) <= dist2;
    if i0 != i1 || i1 != i2 {
        return Coverage::Intersect;
    }
    if i0 {
        // min distance to every edge is <= circle radius
        return Coverage::Inside;
    }
    // min distance to every edge is > circle radius - the circle is either
    // inside the triangle or disjoint from it
    if center.dot(&node.edge[0]) >= 0.0
        && center.dot(&node.edge[1]) >= 0.0
        && center.dot(&node.edge[2]) >= 0.0
    {
        return Coverage::Contains;
    }
    Coverage::Disjoint
}

/// Tests whether `poly` intersects the edge (v1, v2) with plane normal `n`.
///
/// A solution v = (x,y,z) must satisfy:
///
/// ```text
/// v . n = 0, v != 0
/// v . (n ^ v1) >= 0
/// v . (v2 ^ n) >= 0
/// v . e_i >= 0
/// ```
///
/// where e_i are the edge plane normals for the polygon, and (n ^ v1),
/// (v2 ^ n) are plane normals that bound the lune defined by n, v1, and v2.
/// Assuming nz > 0 (at least one component of n must be non-zero, and
/// negative values are handled symmetrically), the equality yields
/// `z = -(x*nx + y*ny)/nz`; substituting into the inequalities gives a
/// system `x*a_i + y*b_i >= 0`. Any positive multiple of a solution is a
/// solution, so it suffices to check y = 1, y = -1, and y = 0.
fn edge_intersects_polygon(
    v1: &Vec3,
    v2: &Vec3,
    n: &Vec3,
    poly: &SphericalConvexPolygon,
) -> bool {
    let mut ab = [0.0f64; 2 * (MAX_VERTICES + 2)];
    let c0 = n.cross(v1);
    let c1 = v2.cross(n);
    let edges = poly.edges();
    let nedges = edges.len();
    if n.z != 0.0 {
        let s = if n.z > 0.0 { 1.0 } else { -1.0 };
        ab[0] = s * (c0.x * n.z - c0.z * n.x);
        ab[1] = s * (c0.y * n.z - c0.z * n.y);
        ab[2] = s * (c1.x * n.z - c1.z * n.x);
        ab[3] = s * (c1.y * n.z - c1.z * n.y);
        for (i, e) in edges.iter().enumerate() {
            ab[2 * i + 4] = s * (e.x * n.z - e.z * n.x);
            ab[2 * i + 5] = s * (e.y * n.z - e.z * n.y);
        }
    } else if n.y != 0.0 {
        let s = if n.y > 0.0 { 1.0 } else { -1.0 };
        ab[0] = s * (c0.x * n.y - c0.y * n.x);
        ab[1] = s * (c0.z * n.y);
        ab[2] = s * (c1.x * n.y - c1.y * n.x);
        ab[3] = s * (c1.z * n.y);
        for (i, e) in edges.iter().enumerate() {
            ab[2 * i + 4] = s * (e.x * n.y - e.y * n.x);
            ab[2 * i + 5] = s * (e.z * n.y);
        }
    } else if n.x != 0.0 {
        let s = if n.x > 0.0 { 1.0 } else { -1.0 };
        ab[0] = s * (c0.y * n.x);
        ab[1] = s * (c0.z * n.x);
        ab[2] = s * (c1.y * n.x);
        ab[3] = s * (c1.z * n.x);
        for (i, e) in edges.iter().enumerate() {
            ab[2 * i + 4] = s * (e.y * n.x);
            ab[2 * i + 5] = s * (e.z * n.x);
        }
    } else {
        return false;
    }
    // Search for solutions to a*x +/- b >= 0, with constraint coefficients
    // stored in ab
    let mut min_1 = f64::NEG_INFINITY;
    let mut max_1 = f64::INFINITY;
    let mut min_m1 = f64::NEG_INFINITY;
    let mut max_m1 = f64::INFINITY;
    let mut neg = 0usize;
    let mut pos = 0usize;
    for i in 0..nedges + 2 {
        let a = ab[2 * i];
        let b = ab[2 * i + 1];
        if a == 0.0 {
            if b < 0.0 {
                min_1 = f64::INFINITY;
                max_1 = f64::NEG_INFINITY;
            } else if b > 0.0 {
                min_m1 = f64::INFINITY;
                max_m1 = f64::NEG_INFINITY;
            }
        } else if a < 0.0 {
            neg += 1;
            let d = -b / a;
            if d < max_1 {
                max_1 = d;
            }
            if -d < max_m1 {
                max_m1 = -d;
            }
        } else {
            pos += 1;
            let d = -b / a;
            if d > min_1 {
                min_1 = d;
            }
            if -d > min_m1 {
                min_m1 = -d;
            }
        }
    }
    if min_1 <= max_1 || min_m1 <= max_m1 {
        return true;
    }
    neg == 0 || pos == 0
}

/// Returns the coverage code for an HTM triangle against a convex polygon.
fn polygon_coverage(node: &Node, poly: &SphericalConvexPolygon) -> Coverage {
    let i0 = poly.contains(&node.vert[0]);
    let i1 = poly.contains(&node.vert[1]);
    let i2 = poly.contains(&node.vert[2]);
    if i0 != i1 || i1 != i2 {
        return Coverage::Intersect;
    }
    // If all triangle vertices are inside poly, then the triangle is inside
    // by convexity.
    if i0 {
        return Coverage::Inside;
    }
    if edge_intersects_polygon(&node.vert[0], &node.vert[1], &node.edge[0], poly)
        || edge_intersects_polygon(&node.vert[1], &node.vert[2], &node.edge[1], poly)
        || edge_intersects_polygon(&node.vert[2], &node.vert[0], &node.edge[2], poly)
    {
        return Coverage::Intersect;
    }
    // All triangle vertices are outside poly and there are no edge/edge
    // intersections. The polygon is either inside the triangle or disjoint
    // from it.
    let vsum = poly.vertex_sum();
    if vsum.dot(&node.edge[0]) >= 0.0
        && vsum.dot(&node.edge[1]) >= 0.0
        && vsum.dot(&node.edge[2]) >= 0.0
    {
        return Coverage::Contains;
    }
    Coverage::Disjoint
}

/// Depth-first traversal of the HTM tree shared by the circle and polygon
/// range computations. Disjoint trixels are pruned; trixels inside the
/// region (or intersecting it at the deepest level) emit the ID range of
/// their complete subtree. Whenever the list grows beyond `max_ranges` the
/// effective subdivision level is reduced and the list re-merged.
fn region_ranges<F>(classify: F, level: u32, max_ranges: usize) -> RangeList
where
    F: Fn(&Node) -> Coverage,
{
    let mut ids = RangeList::new();
    let mut stack = [Node::default(); (MAX_LEVEL + 1) as usize];
    let mut eff_level = level;

    let mut root = 0usize;
    while root < 8 {
        stack[0] = Node::root(root);
        let mut cur: i32 = 0;

        loop {
            let cov = classify(&stack[cur as usize]);
            let mut emit = false;
            match cov {
                Coverage::Contains | Coverage::Intersect => {
                    if cov == Coverage::Contains {
                        if cur == 0 {
                            // no need to consider other roots
                            root = 7;
                        } else {
                            // no need to consider other children of the parent
                            stack[(cur - 1) as usize].child = 4;
                        }
                    }
                    if (cur as u32) < eff_level {
                        // continue subdividing
                        stack[cur as usize].prep0();
                        let child = stack[cur as usize].child0();
                        cur += 1;
                        stack[cur as usize] = child;
                        continue;
                    }
                    emit = true;
                }
                Coverage::Inside => emit = true,
                Coverage::Disjoint => {}
            }
            if emit {
                // reached a leaf or fully covered HTM triangle: append the
                // ID range of its complete subtree
                let shift = 2 * (level - cur as u32);
                let id = stack[cur as usize].id << shift;
                let n = 1i64 << shift;
                ids.add(id, id + n - 1);
                while ids.len() > max_ranges && eff_level != 0 {
                    // too many ranges: reduce the effective subdivision level
                    eff_level -= 1;
                    if cur as u32 > eff_level {
                        cur = eff_level as i32;
                    }
                    ids.simplify(level - eff_level);
                }
            }
            // ascend towards the root
            cur -= 1;
            while cur >= 0 && stack[cur as usize].child == 4 {
                cur -= 1;
            }
            if cur < 0 {
                // finished with this root
                break;
            }
            let child = match stack[cur as usize].child {
                1 => {
                    stack[cur as usize].prep1();
                    stack[cur as usize].child1()
                }
                2 => {
                    stack[cur as usize].prep2();
                    stack[cur as usize].child2()
                }
                _ => stack[cur as usize].child3(),
            };
            cur += 1;
            stack[cur as usize] = child;
        }
        root += 1;
    }
    ids
}

/// Computes the sorted, coalesced HTM ID ranges of the triangles overlapping
/// the given circle at the given subdivision level.
///
/// Ranges are over-inclusive at the deepest level: trixels that merely
/// intersect the boundary are reported in full, so callers should apply the
/// exact point-in-circle test as a post-filter. `max_ranges` bounds the
/// result size through effective-level coarsening; for arbitrary geometry up
/// to 4 ranges may be produced no matter the level.
pub fn circle_ranges(
    circle: &SphericalCircle,
    level: i64,
    max_ranges: usize,
) -> Result<RangeList, SkydbGeometryError> {
    let level = check_level(level)?;
    let mut ids = RangeList::new();
    if circle.radius() >= 180.0 {
        // the entire sky
        let min_id = 8i64 << (level * 2);
        let max_id = (16i64 << (level * 2)) - 1;
        ids.add(min_id, max_id);
        return Ok(ids);
    }
    // square of the secant distance corresponding to the radius
    let d = (circle.radius() * 0.5 * RAD_PER_DEG).sin();
    let dist2 = 4.0 * d * d;
    let center = circle.center().to_vec3();
    Ok(region_ranges(
        |node| circle_coverage(node, &center, dist2),
        level,
        max_ranges,
    ))
}

/// Computes the sorted, coalesced HTM ID ranges of the triangles overlapping
/// the given convex polygon at the given subdivision level.
///
/// Over-inclusion and `max_ranges` behave as for [circle_ranges].
pub fn polygon_ranges(
    poly: &SphericalConvexPolygon,
    level: i64,
    max_ranges: usize,
) -> Result<RangeList, SkydbGeometryError> {
    let level = check_level(level)?;
    Ok(region_ranges(
        |node| polygon_coverage(node, poly),
        level,
        max_ranges,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sphere::SphericalCoord;

    fn coord(lon: f64, lat: f64) -> SphericalCoord {
        SphericalCoord::try_new(lon, lat).unwrap()
    }

    // Root ordinals + 8
    const S0: i64 = 8;
    const N0: i64 = 12;
    const N1: i64 = 13;
    const N2: i64 = 14;
    const N3: i64 = 15;

    #[test]
    fn axis_ids_level0() {
        let cases = [
            (Vec3::new(1.0, 0.0, 0.0), N3),
            (Vec3::new(0.0, 1.0, 0.0), N2),
            (Vec3::new(0.0, 0.0, 1.0), N3),
            (Vec3::new(-1.0, 0.0, 0.0), N1),
            (Vec3::new(0.0, -1.0, 0.0), N0),
            (Vec3::new(0.0, 0.0, -1.0), S0),
        ];
        for (v, expected) in cases {
            assert_eq!(htm_id(&v, 0).unwrap(), expected);
        }
    }

    #[test]
    fn axis_ids_level1() {
        let cases = [
            (Vec3::new(1.0, 0.0, 0.0), N3 * 4 + 2),
            (Vec3::new(0.0, 1.0, 0.0), N2 * 4 + 2),
            (Vec3::new(0.0, 0.0, 1.0), N3 * 4 + 1),
            (Vec3::new(-1.0, 0.0, 0.0), N1 * 4 + 2),
            (Vec3::new(0.0, -1.0, 0.0), N0 * 4 + 2),
            (Vec3::new(0.0, 0.0, -1.0), S0 * 4 + 1),
        ];
        for (v, expected) in cases {
            assert_eq!(htm_id(&v, 1).unwrap(), expected);
        }
    }

    #[test]
    fn id_level_round_trip() {
        let points = [
            coord(0.0, 0.0),
            coord(123.456, 45.0),
            coord(359.999, -89.9),
            coord(271.3, 12.8),
            coord(42.0, 90.0),
        ];
        for level in 0..=MAX_LEVEL as i64 {
            for p in &points {
                let id = htm_id(&p.to_vec3(), level).unwrap();
                assert_eq!(htm_level(id).unwrap() as i64, level);
            }
        }
    }

    #[test]
    fn invalid_levels() {
        let v = Vec3::new(1.0, 0.0, 0.0);
        assert!(htm_id(&v, -1).is_err());
        assert!(htm_id(&v, MAX_LEVEL as i64 + 1).is_err());
    }

    #[test]
    fn invalid_ids() {
        assert!(htm_level(0).is_err());
        assert!(htm_level(-1).is_err());
        assert!(htm_level(7).is_err());
        // MSB in an even position never encodes a complete level
        assert!(htm_level(16).is_err());
        assert!(htm_level(64).is_err());
        // Beyond the maximum level
        assert!(htm_level(8i64 << (2 * (MAX_LEVEL + 1))).is_err());
        // Boundary cases
        assert_eq!(htm_level(8).unwrap(), 0);
        assert_eq!(htm_level(15).unwrap(), 0);
        assert_eq!(htm_level(8 << (2 * MAX_LEVEL)).unwrap(), MAX_LEVEL);
    }

    #[test]
    fn range_list_merging() {
        let mut ids = RangeList::new();
        ids.add(0, 3);
        ids.add(4, 7);
        assert_eq!(ids.ranges(), &[(0, 7)]);
        ids.add(9, 12);
        assert_eq!(ids.ranges(), &[(0, 7), (9, 12)]);
        ids.add(10, 20);
        assert_eq!(ids.ranges(), &[(0, 7), (9, 20)]);
        assert!(ids.contains(0));
        assert!(ids.contains(15));
        assert!(!ids.contains(8));
        assert!(!ids.contains(21));
    }

    #[test]
    fn range_list_simplify() {
        let mut ids = RangeList::new();
        ids.add(32, 33);
        ids.add(35, 38);
        ids.add(60, 62);
        // Dropping one level widens each range to its parent trixel span;
        // the first two become adjacent at that granularity and merge
        ids.simplify(1);
        assert_eq!(ids.ranges(), &[(32, 39), (60, 63)]);

        // Simplifying by zero levels is a no-op
        let mut ids = RangeList::new();
        ids.add(32, 35);
        ids.add(40, 43);
        ids.simplify(0);
        assert_eq!(ids.ranges(), &[(32, 35), (40, 43)]);
    }

    #[test]
    fn full_sky_circle() {
        for level in [0i64, 1, 5, 20] {
            let circle = SphericalCircle::try_new(coord(42.0, -42.0), 180.0).unwrap();
            let ids = circle_ranges(&circle, level, usize::MAX).unwrap();
            assert_eq!(
                ids.ranges(),
                &[(8 << (2 * level), (16 << (2 * level)) - 1)]
            );
        }
    }

    #[test]
    fn zero_radius_circle() {
        let p = coord(110.0, 35.0);
        let circle = SphericalCircle::try_new(p, 0.0).unwrap();
        for level in [0i64, 4, 10] {
            let ids = circle_ranges(&circle, level, usize::MAX).unwrap();
            let id = htm_id(&p.to_vec3(), level).unwrap();
            assert!(ids.contains(id));
            // The point's own trixel chain stays minimal
            assert!(ids.len() <= 4);
        }
    }

    #[test]
    fn circle_ranges_cover_interior_points() {
        let center = coord(80.0, 20.0);
        let circle = SphericalCircle::try_new(center, 5.0).unwrap();
        let ids = circle_ranges(&circle, 8, usize::MAX).unwrap();
        // Points well inside the circle must land in the ranges
        for (dlon, dlat) in [(0.0, 0.0), (2.0, 2.0), (-3.0, 1.0), (0.0, -4.0)] {
            let p = coord(center.lon() + dlon, center.lat() + dlat);
            assert!(circle.contains(&p));
            let id = htm_id(&p.to_vec3(), 8).unwrap();
            assert!(ids.contains(id));
        }
        // A point far outside must not
        let outside = htm_id(&coord(260.0, -20.0).to_vec3(), 8).unwrap();
        assert!(!ids.contains(outside));
    }

    #[test]
    fn circle_ranges_sorted_and_disjoint() {
        let circle = SphericalCircle::try_new(coord(0.0, 0.0), 10.0).unwrap();
        let ids = circle_ranges(&circle, 6, usize::MAX).unwrap();
        assert!(!ids.is_empty());
        let ranges = ids.ranges();
        for (min, max) in ranges {
            assert!(min <= max);
        }
        for pair in ranges.windows(2) {
            // Strictly separated: adjacent ranges would have been merged
            assert!(pair[1].0 > pair[0].1 + 1);
        }
    }

    #[test]
    fn max_ranges_coarsening() {
        let circle = SphericalCircle::try_new(coord(0.0, 0.0), 30.0).unwrap();
        let unbounded = circle_ranges(&circle, 10, usize::MAX).unwrap();
        let bounded = circle_ranges(&circle, 10, 4).unwrap();
        assert!(bounded.len() <= 4);
        assert!(bounded.len() <= unbounded.len());
        // Coarsening only widens coverage
        for (min, max) in unbounded.ranges() {
            assert!(bounded.contains(*min) && bounded.contains(*max));
        }
    }

    #[test]
    fn range_count_stays_bounded() {
        // The number of ranges tracks the boundary complexity, not the
        // exponential trixel count
        let circle = SphericalCircle::try_new(coord(120.0, -30.0), 1.0).unwrap();
        let ids = circle_ranges(&circle, 10, usize::MAX).unwrap();
        assert!(ids.len() <= 256, "got {} ranges", ids.len());
    }

    #[test]
    fn polygon_ranges_cover_interior_points() {
        let poly = SphericalConvexPolygon::try_new(vec![
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
        ])
        .unwrap();
        let ids = polygon_ranges(&poly, 7, usize::MAX).unwrap();
        for (lon, lat) in [(45.0, 35.0), (10.0, 10.0), (80.0, 5.0), (45.0, 80.0)] {
            let p = coord(lon, lat);
            assert!(poly.contains_coord(&p));
            let id = htm_id(&p.to_vec3(), 7).unwrap();
            assert!(ids.contains(id));
        }
        let outside = htm_id(&coord(225.0, -45.0).to_vec3(), 7).unwrap();
        assert!(!ids.contains(outside));
    }

    #[test]
    fn polygon_ranges_small_quad() {
        let poly = SphericalConvexPolygon::from_coords(&[
            coord(10.0, -1.0),
            coord(12.0, -1.0),
            coord(12.0, 1.0),
            coord(10.0, 1.0),
        ])
        .unwrap();
        let ids = polygon_ranges(&poly, 9, usize::MAX).unwrap();
        let id = htm_id(&coord(11.0, 0.0).to_vec3(), 9).unwrap();
        assert!(ids.contains(id));
        // A quad spanning ~2 degrees is a tiny fraction of the sky
        let covered: i64 = ids.ranges().iter().map(|(min, max)| max - min + 1).sum();
        let total = 8i64 << (2 * 9);
        assert!(covered * 50 < total);
    }

    #[test]
    fn polygon_ranges_level_zero() {
        let poly = SphericalConvexPolygon::try_new(vec![
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
        ])
        .unwrap();
        let ids = polygon_ranges(&poly, 0, usize::MAX).unwrap();
        // The octant triangle is root N3; neighboring roots touch it at
        // edges and vertices
        let id = htm_id(&coord(45.0, 35.0).to_vec3(), 0).unwrap();
        assert!(ids.contains(id));
    }
}
