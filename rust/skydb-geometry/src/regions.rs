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

//! Point-in-region tests for longitude/latitude boxes, circles, and
//! ellipses on the unit sphere.
//!
//! Region parameters are validated at construction time; an invalid
//! parameterization is reported as [SkydbGeometryError::Invalid] rather than
//! silently producing a region with undefined behavior.

use crate::error::SkydbGeometryError;
use crate::sphere::{reduce_angle, SphericalCoord, ARCSEC_PER_DEG, RAD_PER_DEG};

/// Classification tolerance for circle and ellipse boundaries.
///
/// Separations within this tolerance of the boundary classify as outside:
/// a point tests inside a circle only when its separation from the center is
/// less than `radius - BOUNDARY_TOLERANCE` degrees. The same constant is
/// applied to the unit quadratic form of the ellipse test.
pub const BOUNDARY_TOLERANCE: f64 = 1e-9;

/// A longitude/latitude angle box, possibly wrapping across the 0/360
/// longitude discontinuity.
///
/// When both longitude bounds lie in `[0, 360]`, `lon_max < lon_min` denotes
/// a box wrapping through 0: `lon_min = 350, lon_max = 10` covers
/// `[350, 360) ∪ [0, 10]`. Bounds outside `[0, 360]` are accepted only in
/// ascending order; bounds separated by 360 degrees or more cover every
/// longitude.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphericalBox {
    min: SphericalCoord,
    max: SphericalCoord,
}

impl SphericalBox {
    pub fn try_new(
        min: SphericalCoord,
        max: SphericalCoord,
    ) -> Result<Self, SkydbGeometryError> {
        if max.lon() < min.lon() && (max.lon() < 0.0 || min.lon() > 360.0) {
            return Err(SkydbGeometryError::invalid(
                "malformed wraparound longitude bounds: lon_max < lon_min is only \
                 valid when both bounds lie in [0, 360]",
            ));
        }
        Ok(Self { min, max })
    }

    /// Tests whether `p` lies inside this box. An empty box
    /// (`lat_min > lat_max`) contains nothing.
    pub fn contains(&self, p: &SphericalCoord) -> bool {
        if self.min.lat() > self.max.lat()
            || p.lat() < self.min.lat()
            || p.lat() > self.max.lat()
        {
            return false;
        }
        if self.max.lon() - self.min.lon() >= 360.0 {
            return true;
        }
        let lon = reduce_angle(p.lon());
        let lon_min = reduce_angle(self.min.lon());
        let lon_max = reduce_angle(self.max.lon());
        if lon_min <= lon_max {
            lon >= lon_min && lon <= lon_max
        } else {
            lon >= lon_min || lon <= lon_max
        }
    }
}

/// A circle on the unit sphere: a center and an angular radius in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphericalCircle {
    center: SphericalCoord,
    radius_deg: f64,
}

impl SphericalCircle {
    pub fn try_new(center: SphericalCoord, radius_deg: f64) -> Result<Self, SkydbGeometryError> {
        if !radius_deg.is_finite() || !(0.0..=180.0).contains(&radius_deg) {
            return Err(SkydbGeometryError::invalid(format!(
                "circle radius {radius_deg} is not in the [0, 180] degree range"
            )));
        }
        Ok(Self { center, radius_deg })
    }

    pub fn center(&self) -> &SphericalCoord {
        &self.center
    }

    pub fn radius(&self) -> f64 {
        self.radius_deg
    }

    /// Tests whether `p` lies inside this circle.
    ///
    /// Points within [BOUNDARY_TOLERANCE] of the boundary are excluded.
    pub fn contains(&self, p: &SphericalCoord) -> bool {
        // Fail fast when the latitude delta alone exceeds the radius.
        if (p.lat() - self.center.lat()).abs() > self.radius_deg {
            return false;
        }
        self.center.separation(p) < self.radius_deg - BOUNDARY_TOLERANCE
    }
}

/// An ellipse on the unit sphere: a center, semi-axis lengths in arcseconds,
/// and a position angle in degrees (north through east).
///
/// The semi-axes must satisfy `0 < semi_minor <= semi_major <= 36000` arcsec
/// (10 degrees); the small-axis limit keeps the tangent-plane test accurate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphericalEllipse {
    sin_lon: f64,
    cos_lon: f64,
    sin_lat: f64,
    cos_lat: f64,
    sin_pos_ang: f64,
    cos_pos_ang: f64,
    inv_minor2: f64,
    inv_major2: f64,
}

impl SphericalEllipse {
    pub fn try_new(
        center: SphericalCoord,
        semi_major_arcsec: f64,
        semi_minor_arcsec: f64,
        pos_angle_deg: f64,
    ) -> Result<Self, SkydbGeometryError> {
        if !pos_angle_deg.is_finite()
            || !semi_major_arcsec.is_finite()
            || !semi_minor_arcsec.is_finite()
        {
            return Err(SkydbGeometryError::invalid(
                "ellipse parameters must be finite",
            ));
        }
        if semi_minor_arcsec <= 0.0
            || semi_minor_arcsec > semi_major_arcsec
            || semi_major_arcsec > 10.0 * ARCSEC_PER_DEG
        {
            return Err(SkydbGeometryError::invalid(format!(
                "ellipse axes must satisfy 0 < semi-minor ({semi_minor_arcsec}) <= \
                 semi-major ({semi_major_arcsec}) <= 36000 arcsec"
            )));
        }
        let lon = center.lon() * RAD_PER_DEG;
        let lat = center.lat() * RAD_PER_DEG;
        let pos_ang = pos_angle_deg * RAD_PER_DEG;
        let minor = semi_minor_arcsec * RAD_PER_DEG / ARCSEC_PER_DEG;
        let major = semi_major_arcsec * RAD_PER_DEG / ARCSEC_PER_DEG;
        Ok(Self {
            sin_lon: lon.sin(),
            cos_lon: lon.cos(),
            sin_lat: lat.sin(),
            cos_lat: lat.cos(),
            sin_pos_ang: pos_ang.sin(),
            cos_pos_ang: pos_ang.cos(),
            inv_minor2: 1.0 / (minor * minor),
            inv_major2: 1.0 / (major * major),
        })
    }

    /// Tests whether `p` lies inside this ellipse.
    ///
    /// The point is projected into the (north, east) tangent-plane basis at
    /// the ellipse center, rotated by the position angle, and scaled by the
    /// inverse semi-axis lengths; the boundary band of width
    /// [BOUNDARY_TOLERANCE] in the resulting quadratic form is excluded.
    pub fn contains(&self, p: &SphericalCoord) -> bool {
        let v = p.to_vec3();
        // Coordinates of the input point in the (N, E) basis at the center
        let xne = self.cos_lat * v.z - self.sin_lat * (self.sin_lon * v.y + self.cos_lon * v.x);
        let yne = self.cos_lon * v.y - self.sin_lon * v.x;
        // Rotate by the negated position angle
        let x = self.sin_pos_ang * yne + self.cos_pos_ang * xne;
        let y = self.cos_pos_ang * yne - self.sin_pos_ang * xne;
        x * x * self.inv_major2 + y * y * self.inv_minor2 < 1.0 - BOUNDARY_TOLERANCE
    }
}
