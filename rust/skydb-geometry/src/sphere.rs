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

//! Spherical coordinates, 3-vectors, and angular separation.
//!
//! All angles at this layer are degrees. Computations that are sensitive to
//! rounding near the poles or near antipodal configurations go through unit
//! 3-vectors and the haversine/chord formulations rather than naive
//! `acos(dot)`.

use crate::error::SkydbGeometryError;

pub const DEG_PER_RAD: f64 = 57.295_779_513_082_320_876_798_154_814_1;
pub const RAD_PER_DEG: f64 = 0.017_453_292_519_943_295_769_236_907_684_9;
pub const ARCSEC_PER_DEG: f64 = 3600.0;

/// Returns the given angle, range-reduced to lie in `[0, 360)` degrees.
pub fn reduce_angle(angle_deg: f64) -> f64 {
    let mut angle = angle_deg % 360.0;
    if angle < 0.0 {
        angle += 360.0;
        if angle == 360.0 {
            angle = 0.0;
        }
    }
    angle
}

/// Returns the given value, clamped to lie in `[min, max]`.
pub fn clamp(x: f64, min: f64, max: f64) -> f64 {
    if x < min {
        min
    } else if x > max {
        max
    } else {
        x
    }
}

/// A longitude/latitude angle pair in degrees.
///
/// Construction checks that both angles are finite and that the latitude lies
/// in `[-90, 90]`. Longitudes are unconstrained; they are reduced modulo 360
/// where an operation requires it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphericalCoord {
    lon_deg: f64,
    lat_deg: f64,
}

impl SphericalCoord {
    pub fn try_new(lon_deg: f64, lat_deg: f64) -> Result<Self, SkydbGeometryError> {
        if !lon_deg.is_finite() || !lat_deg.is_finite() {
            return Err(SkydbGeometryError::invalid(
                "spherical coordinates must be finite",
            ));
        }
        if !(-90.0..=90.0).contains(&lat_deg) {
            return Err(SkydbGeometryError::invalid(format!(
                "latitude angle {lat_deg} is not in the [-90, 90] degree range"
            )));
        }
        Ok(Self { lon_deg, lat_deg })
    }

    pub fn lon(&self) -> f64 {
        self.lon_deg
    }

    pub fn lat(&self) -> f64 {
        self.lat_deg
    }

    /// Converts this coordinate pair to a unit 3-vector.
    pub fn to_vec3(self) -> Vec3 {
        let lon = self.lon_deg * RAD_PER_DEG;
        let lat = self.lat_deg * RAD_PER_DEG;
        let cos_lat = lat.cos();
        Vec3::new(lon.cos() * cos_lat, lon.sin() * cos_lat, lat.sin())
    }

    /// Returns the square of the chord distance between the unit vectors
    /// corresponding to `self` and `other`, clamped to `[0, 4]`.
    pub fn dist2(&self, other: &SphericalCoord) -> f64 {
        let x = ((self.lon_deg - other.lon_deg) * RAD_PER_DEG * 0.5).sin();
        let y = ((self.lat_deg - other.lat_deg) * RAD_PER_DEG * 0.5).sin();
        let z = ((self.lat_deg + other.lat_deg) * RAD_PER_DEG * 0.5).cos();
        let d2 = 4.0 * ((x * x) * (z * z - y * y) + y * y);
        clamp(d2, 0.0, 4.0)
    }

    /// Returns the angular separation between `self` and `other` in degrees,
    /// in `[0, 180]`.
    ///
    /// Haversine-based: exact for coincident points (including identical
    /// poles at differing longitudes) and clamps so antipodes yield exactly
    /// 180 despite rounding.
    pub fn separation(&self, other: &SphericalCoord) -> f64 {
        let x = self.dist2(other) * 0.25;
        let angle = 2.0 * DEG_PER_RAD * x.sqrt().asin();
        if angle > 180.0 {
            180.0
        } else {
            angle
        }
    }
}

/// Cartesian coordinates for a point in R3.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn try_new(x: f64, y: f64, z: f64) -> Result<Self, SkydbGeometryError> {
        if !x.is_finite() || !y.is_finite() || !z.is_finite() {
            return Err(SkydbGeometryError::invalid(
                "vector components must be finite",
            ));
        }
        Ok(Self::new(x, y, z))
    }

    pub fn add(&self, other: &Vec3) -> Vec3 {
        Vec3::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }

    pub fn sub(&self, other: &Vec3) -> Vec3 {
        Vec3::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    pub fn neg(&self) -> Vec3 {
        Vec3::new(-self.x, -self.y, -self.z)
    }

    pub fn scale(&self, s: f64) -> Vec3 {
        Vec3::new(self.x * s, self.y * s, self.z * s)
    }

    pub fn dot(&self, other: &Vec3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn norm2(&self) -> f64 {
        self.dot(self)
    }

    pub fn norm(&self) -> f64 {
        self.norm2().sqrt()
    }

    pub fn normalized(&self) -> Vec3 {
        let norm = self.norm();
        Vec3::new(self.x / norm, self.y / norm, self.z / norm)
    }

    pub fn cross(&self, other: &Vec3) -> Vec3 {
        Vec3::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    /// Returns twice the cross product of `self` and `other`.
    ///
    /// Computed as `(other + self) x (other - self)`, which is more accurate
    /// than the direct cross product for nearly identical inputs.
    pub fn robust_cross(&self, other: &Vec3) -> Vec3 {
        let s = other.add(self);
        let d = other.sub(self);
        s.cross(&d)
    }

    /// Returns the square of the chord distance between `self` and `other`.
    pub fn dist2(&self, other: &Vec3) -> f64 {
        self.sub(other).norm2()
    }

    /// Converts this vector (any norm) to spherical coordinates.
    pub fn to_coord(&self) -> SphericalCoord {
        let d2 = self.x * self.x + self.y * self.y;
        let lon = if d2 == 0.0 {
            0.0
        } else {
            let mut lon = self.y.atan2(self.x) * DEG_PER_RAD;
            if lon < 0.0 {
                lon += 360.0;
                if lon == 360.0 {
                    lon = 0.0;
                }
            }
            lon
        };
        let lat = if self.z == 0.0 {
            0.0
        } else {
            clamp(self.z.atan2(d2.sqrt()) * DEG_PER_RAD, -90.0, 90.0)
        };
        SphericalCoord {
            lon_deg: lon,
            lat_deg: lat,
        }
    }

    /// Returns the angular separation in degrees between unit vectors `self`
    /// and `other`, in `[0, 180]`.
    pub fn separation_unit(&self, other: &Vec3) -> f64 {
        let x = clamp(self.dist2(other) * 0.25, 0.0, 1.0);
        let angle = 2.0 * DEG_PER_RAD * x.sqrt().asin();
        if angle > 180.0 {
            180.0
        } else {
            angle
        }
    }

    /// Returns the angular separation in degrees between `self` and `other`,
    /// which need not have unit norm.
    pub fn separation(&self, other: &Vec3) -> f64 {
        let n = self.cross(other);
        let ss = n.norm();
        let cs = self.dot(other);
        if cs == 0.0 && ss == 0.0 {
            return 0.0;
        }
        let angle = ss.atan2(cs) * DEG_PER_RAD;
        if angle > 180.0 {
            180.0
        } else {
            angle
        }
    }

    /// Returns the minimum square chord distance between `self` and points on
    /// the great-circle edge from `v1` to `v2`, where `e` is a vector parallel
    /// to `v1 x v2`. `self`, `v1`, and `v2` are assumed to be unit vectors;
    /// `e` need not have unit norm.
    pub fn edge_dist2(&self, v1: &Vec3, v2: &Vec3, e: &Vec3) -> f64 {
        let c = self.cross(e);
        if c.dot(v1) > 0.0 && c.dot(v2) < 0.0 {
            // The perpendicular foot lies on the edge: the minimum distance is
            // attained against the great circle through v1 and v2.
            let d = self.dot(e);
            let x = clamp(d * d / e.norm2(), 0.0, 1.0);
            // x is the squared sine of the minimum angle between self and the
            // edge plane; convert to a squared chord length.
            let y = 1.0 - (1.0 - x).sqrt();
            x + y * y
        } else {
            let d1 = self.dist2(v1);
            let d2 = self.dist2(v2);
            if d1 < d2 {
                d1
            } else {
                d2
            }
        }
    }
}
