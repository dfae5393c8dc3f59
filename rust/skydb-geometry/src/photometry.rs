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

//! Photometry conversions between raw DN values, calibrated fluxes
//! (erg/cm**2/sec/Hz), nanojansky fluxes, and AB magnitudes.

/// 2.5 / ln(10)
pub const FIVE_OVER_2LOG10: f64 = 1.085_736_204_758_129_569;

/// The flux (erg/cm**2/sec/Hz) of an object with AB magnitude zero.
pub const AB_FLUX_SCALE: f64 = 3.630_780_547_701_013_425e-20;

/// Converts a calibrated flux (erg/cm**2/sec/Hz) to an AB magnitude.
pub fn flux_to_ab_mag(flux: f64) -> f64 {
    -2.5 * flux.log10() - 48.6
}

/// Converts a calibrated flux error to an AB magnitude error.
pub fn flux_to_ab_mag_sigma(flux: f64, flux_sigma: f64) -> f64 {
    FIVE_OVER_2LOG10 * flux_sigma / flux
}

/// Converts an AB magnitude to a calibrated flux (erg/cm**2/sec/Hz).
pub fn ab_mag_to_flux(mag: f64) -> f64 {
    AB_FLUX_SCALE * 10.0f64.powf(-0.4 * mag)
}

/// Converts an AB magnitude error to a calibrated flux error.
pub fn ab_mag_to_flux_sigma(mag: f64, mag_sigma: f64) -> f64 {
    ab_mag_to_flux(mag) * mag_sigma / FIVE_OVER_2LOG10
}

/// Converts a flux in nanojansky to an AB magnitude.
pub fn nanojansky_to_ab_mag(flux: f64) -> f64 {
    31.4 - 2.5 * flux.log10()
}

/// Converts a nanojansky flux error to an AB magnitude error.
pub fn nanojansky_to_ab_mag_sigma(flux: f64, flux_sigma: f64) -> f64 {
    FIVE_OVER_2LOG10 * flux_sigma / flux
}

/// Converts an AB magnitude to a flux in nanojansky.
pub fn ab_mag_to_nanojansky(mag: f64) -> f64 {
    10.0f64.powf(-0.4 * (mag - 31.4))
}

/// Converts an AB magnitude error to a nanojansky flux error.
pub fn ab_mag_to_nanojansky_sigma(mag: f64, mag_sigma: f64) -> f64 {
    ab_mag_to_nanojansky(mag) * mag_sigma / FIVE_OVER_2LOG10
}

/// Converts a raw DN value to a calibrated flux (erg/cm**2/sec/Hz), given
/// the flux of a zero-magnitude object.
pub fn dn_to_flux(dn: f64, flux_mag0: f64) -> f64 {
    AB_FLUX_SCALE * dn / flux_mag0
}

/// Converts a raw DN error to a calibrated flux error.
pub fn dn_to_flux_sigma(dn: f64, dn_sigma: f64, flux_mag0: f64, flux_mag0_sigma: f64) -> f64 {
    let d = dn * flux_mag0_sigma / flux_mag0;
    AB_FLUX_SCALE * ((dn_sigma * dn_sigma + d * d) / (flux_mag0 * flux_mag0)).sqrt()
}

/// Converts a calibrated flux to a raw DN value.
pub fn flux_to_dn(flux: f64, flux_mag0: f64) -> f64 {
    flux * flux_mag0 / AB_FLUX_SCALE
}

/// Converts a calibrated flux error to a raw DN error.
pub fn flux_to_dn_sigma(flux: f64, flux_sigma: f64, flux_mag0: f64, flux_mag0_sigma: f64) -> f64 {
    let d = flux * flux_mag0_sigma;
    ((flux_sigma * flux_sigma * flux_mag0 * flux_mag0) + d * d).sqrt() / AB_FLUX_SCALE
}

/// Converts a raw DN value to an AB magnitude.
pub fn dn_to_ab_mag(dn: f64, flux_mag0: f64) -> f64 {
    flux_to_ab_mag(dn_to_flux(dn, flux_mag0))
}

/// Converts a raw DN error to an AB magnitude error.
pub fn dn_to_ab_mag_sigma(dn: f64, dn_sigma: f64, flux_mag0: f64, flux_mag0_sigma: f64) -> f64 {
    flux_to_ab_mag_sigma(
        dn_to_flux(dn, flux_mag0),
        dn_to_flux_sigma(dn, dn_sigma, flux_mag0, flux_mag0_sigma),
    )
}

/// Converts an AB magnitude to a raw DN value.
pub fn ab_mag_to_dn(mag: f64, flux_mag0: f64) -> f64 {
    flux_to_dn(ab_mag_to_flux(mag), flux_mag0)
}

/// Converts an AB magnitude error to a raw DN error.
pub fn ab_mag_to_dn_sigma(mag: f64, mag_sigma: f64, flux_mag0: f64, flux_mag0_sigma: f64) -> f64 {
    flux_to_dn_sigma(
        ab_mag_to_flux(mag),
        ab_mag_to_flux_sigma(mag, mag_sigma),
        flux_mag0,
        flux_mag0_sigma,
    )
}
