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

//! Photometry UDFs: conversions between raw DN values, calibrated fluxes,
//! nanojansky fluxes, and AB magnitudes, with error-propagation variants.
//!
//! All functions take double arguments, propagate nulls, and return double.
//! Values outside a conversion's mathematical domain (e.g. a non-positive
//! flux) produce the IEEE result of the underlying formula rather than an
//! error, matching the behavior of the corresponding SQL expressions.

use std::sync::Arc;

use arrow_array::builder::Float64Builder;
use arrow_schema::DataType;
use datafusion_common::error::Result;
use datafusion_expr::{scalar_doc_sections::DOC_SECTION_OTHER, ColumnarValue, Documentation, Volatility};
use skydb_expr::matchers::ArgMatcher;
use skydb_expr::scalar_udf::{SkydbScalarKernel, SkydbScalarUDF};
use skydb_geometry::photometry;

use crate::executor::{float_arrays, float_row, ColumnarExecutor};

/// Scalar kernel applying a fixed-arity double function element-wise.
#[derive(Debug)]
struct PhotometryKernel {
    arity: usize,
    fun: fn(&[f64]) -> f64,
}

impl SkydbScalarKernel for PhotometryKernel {
    fn return_type(&self, args: &[DataType]) -> Result<Option<DataType>> {
        let matcher = ArgMatcher::new(
            vec![ArgMatcher::is_numeric(); self.arity],
            DataType::Float64,
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
        let columns = float_arrays(args, n)?;
        let mut builder = Float64Builder::with_capacity(n);
        for i in 0..n {
            match float_row(&columns, i) {
                Some(v) => builder.append_value((self.fun)(&v)),
                None => builder.append_null(),
            }
        }
        executor.finish(Arc::new(builder.finish()))
    }
}

fn photometry_udf(
    name: &str,
    arity: usize,
    fun: fn(&[f64]) -> f64,
    description: &str,
    syntax: &str,
) -> SkydbScalarUDF {
    SkydbScalarUDF::new(
        name,
        vec![Arc::new(PhotometryKernel { arity, fun })],
        Volatility::Immutable,
        Some(Documentation::builder(DOC_SECTION_OTHER, description, syntax).build()),
    )
}

/// fluxToAbMag() scalar UDF implementation
pub fn flux_to_ab_mag_udf() -> SkydbScalarUDF {
    photometry_udf(
        "fluxToAbMag",
        1,
        |v| photometry::flux_to_ab_mag(v[0]),
        "Convert a calibrated flux (erg/cm**2/sec/Hz) to an AB magnitude",
        "fluxToAbMag(flux)",
    )
}

/// fluxToAbMagSigma() scalar UDF implementation
pub fn flux_to_ab_mag_sigma_udf() -> SkydbScalarUDF {
    photometry_udf(
        "fluxToAbMagSigma",
        2,
        |v| photometry::flux_to_ab_mag_sigma(v[0], v[1]),
        "Convert a calibrated flux error to an AB magnitude error",
        "fluxToAbMagSigma(flux, fluxSigma)",
    )
}

/// abMagToFlux() scalar UDF implementation
pub fn ab_mag_to_flux_udf() -> SkydbScalarUDF {
    photometry_udf(
        "abMagToFlux",
        1,
        |v| photometry::ab_mag_to_flux(v[0]),
        "Convert an AB magnitude to a calibrated flux (erg/cm**2/sec/Hz)",
        "abMagToFlux(mag)",
    )
}

/// abMagToFluxSigma() scalar UDF implementation
pub fn ab_mag_to_flux_sigma_udf() -> SkydbScalarUDF {
    photometry_udf(
        "abMagToFluxSigma",
        2,
        |v| photometry::ab_mag_to_flux_sigma(v[0], v[1]),
        "Convert an AB magnitude error to a calibrated flux error",
        "abMagToFluxSigma(mag, magSigma)",
    )
}

/// nanojanskyToAbMag() scalar UDF implementation
pub fn nanojansky_to_ab_mag_udf() -> SkydbScalarUDF {
    photometry_udf(
        "nanojanskyToAbMag",
        1,
        |v| photometry::nanojansky_to_ab_mag(v[0]),
        "Convert a flux in nanojansky to an AB magnitude",
        "nanojanskyToAbMag(flux)",
    )
}

/// nanojanskyToAbMagSigma() scalar UDF implementation
pub fn nanojansky_to_ab_mag_sigma_udf() -> SkydbScalarUDF {
    photometry_udf(
        "nanojanskyToAbMagSigma",
        2,
        |v| photometry::nanojansky_to_ab_mag_sigma(v[0], v[1]),
        "Convert a nanojansky flux error to an AB magnitude error",
        "nanojanskyToAbMagSigma(flux, fluxSigma)",
    )
}

/// abMagToNanojansky() scalar UDF implementation
pub fn ab_mag_to_nanojansky_udf() -> SkydbScalarUDF {
    photometry_udf(
        "abMagToNanojansky",
        1,
        |v| photometry::ab_mag_to_nanojansky(v[0]),
        "Convert an AB magnitude to a flux in nanojansky",
        "abMagToNanojansky(mag)",
    )
}

/// abMagToNanojanskySigma() scalar UDF implementation
pub fn ab_mag_to_nanojansky_sigma_udf() -> SkydbScalarUDF {
    photometry_udf(
        "abMagToNanojanskySigma",
        2,
        |v| photometry::ab_mag_to_nanojansky_sigma(v[0], v[1]),
        "Convert an AB magnitude error to a nanojansky flux error",
        "abMagToNanojanskySigma(mag, magSigma)",
    )
}

/// dnToFlux() scalar UDF implementation
pub fn dn_to_flux_udf() -> SkydbScalarUDF {
    photometry_udf(
        "dnToFlux",
        2,
        |v| photometry::dn_to_flux(v[0], v[1]),
        "Convert a raw DN value to a calibrated flux (erg/cm**2/sec/Hz)",
        "dnToFlux(dn, fluxMag0)",
    )
}

/// dnToFluxSigma() scalar UDF implementation
pub fn dn_to_flux_sigma_udf() -> SkydbScalarUDF {
    photometry_udf(
        "dnToFluxSigma",
        4,
        |v| photometry::dn_to_flux_sigma(v[0], v[1], v[2], v[3]),
        "Convert a raw DN error to a calibrated flux error",
        "dnToFluxSigma(dn, dnSigma, fluxMag0, fluxMag0Sigma)",
    )
}

/// fluxToDn() scalar UDF implementation
pub fn flux_to_dn_udf() -> SkydbScalarUDF {
    photometry_udf(
        "fluxToDn",
        2,
        |v| photometry::flux_to_dn(v[0], v[1]),
        "Convert a calibrated flux to a raw DN value",
        "fluxToDn(flux, fluxMag0)",
    )
}

/// fluxToDnSigma() scalar UDF implementation
pub fn flux_to_dn_sigma_udf() -> SkydbScalarUDF {
    photometry_udf(
        "fluxToDnSigma",
        4,
        |v| photometry::flux_to_dn_sigma(v[0], v[1], v[2], v[3]),
        "Convert a calibrated flux error to a raw DN error",
        "fluxToDnSigma(flux, fluxSigma, fluxMag0, fluxMag0Sigma)",
    )
}

/// dnToAbMag() scalar UDF implementation
pub fn dn_to_ab_mag_udf() -> SkydbScalarUDF {
    photometry_udf(
        "dnToAbMag",
        2,
        |v| photometry::dn_to_ab_mag(v[0], v[1]),
        "Convert a raw DN value to an AB magnitude",
        "dnToAbMag(dn, fluxMag0)",
    )
}

/// dnToAbMagSigma() scalar UDF implementation
pub fn dn_to_ab_mag_sigma_udf() -> SkydbScalarUDF {
    photometry_udf(
        "dnToAbMagSigma",
        4,
        |v| photometry::dn_to_ab_mag_sigma(v[0], v[1], v[2], v[3]),
        "Convert a raw DN error to an AB magnitude error",
        "dnToAbMagSigma(dn, dnSigma, fluxMag0, fluxMag0Sigma)",
    )
}

/// abMagToDn() scalar UDF implementation
pub fn ab_mag_to_dn_udf() -> SkydbScalarUDF {
    photometry_udf(
        "abMagToDn",
        2,
        |v| photometry::ab_mag_to_dn(v[0], v[1]),
        "Convert an AB magnitude to a raw DN value",
        "abMagToDn(mag, fluxMag0)",
    )
}

/// abMagToDnSigma() scalar UDF implementation
pub fn ab_mag_to_dn_sigma_udf() -> SkydbScalarUDF {
    photometry_udf(
        "abMagToDnSigma",
        4,
        |v| photometry::ab_mag_to_dn_sigma(v[0], v[1], v[2], v[3]),
        "Convert an AB magnitude error to a raw DN error",
        "abMagToDnSigma(mag, magSigma, fluxMag0, fluxMag0Sigma)",
    )
}
