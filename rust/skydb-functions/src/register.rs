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
use datafusion_expr::{AggregateUDFImpl, ScalarUDFImpl};
use skydb_expr::function_set::FunctionSet;

/// Naming applied to installed function names.
///
/// Deployments that install several releases side by side register each
/// function twice: once under its bare name and once under a versioned name
/// (e.g. `angSep` and `myprefix_angSep_1_0`). The naming is passed explicitly
/// wherever installed names are produced; there is no ambient configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunctionNaming {
    /// Prepended to every function name, e.g. `"myprefix_"`.
    pub prefix: String,
    /// Appended to every function name, e.g. `"_1_0"`.
    pub version_suffix: String,
}

impl FunctionNaming {
    pub fn apply(&self, name: &str) -> String {
        format!("{}{}{}", self.prefix, name, self.version_suffix)
    }
}

/// Export the set of functions defined in this crate
pub fn default_function_set() -> FunctionSet {
    function_set_with_naming(&FunctionNaming::default())
}

/// Export the set of functions defined in this crate, registered under
/// names transformed by `naming`
pub fn function_set_with_naming(naming: &FunctionNaming) -> FunctionSet {
    let mut function_set = FunctionSet::new();

    macro_rules! register_scalar_udfs {
        ($function_set:expr, $($udf:expr),* $(,)?) => {
            $(
                let udf = $udf();
                let udf = udf.with_name(&naming.apply(udf.name()));
                $function_set.insert_scalar_udf(udf);
            )*
        };
    }

    macro_rules! register_aggregate_udfs {
        ($function_set:expr, $($udf:expr),* $(,)?) => {
            $(
                let udf = $udf();
                let udf = udf.with_name(&naming.apply(udf.name()));
                $function_set.insert_aggregate_udf(udf);
            )*
        };
    }

    register_scalar_udfs!(
        function_set,
        crate::ang_sep::ang_sep_udf,
        crate::cpoly::cpoly_to_bin_udf,
        crate::cpoly::pt_in_cpoly_udf,
        crate::extract_int64::extract_int64_udf,
        crate::htm_functions::circle_htm_ranges_udf,
        crate::htm_functions::cpoly_htm_ranges_udf,
        crate::htm_functions::htm_id_udf,
        crate::htm_functions::htm_level_udf,
        crate::photometry::ab_mag_to_dn_udf,
        crate::photometry::ab_mag_to_dn_sigma_udf,
        crate::photometry::ab_mag_to_flux_udf,
        crate::photometry::ab_mag_to_flux_sigma_udf,
        crate::photometry::ab_mag_to_nanojansky_udf,
        crate::photometry::ab_mag_to_nanojansky_sigma_udf,
        crate::photometry::dn_to_ab_mag_udf,
        crate::photometry::dn_to_ab_mag_sigma_udf,
        crate::photometry::dn_to_flux_udf,
        crate::photometry::dn_to_flux_sigma_udf,
        crate::photometry::flux_to_ab_mag_udf,
        crate::photometry::flux_to_ab_mag_sigma_udf,
        crate::photometry::flux_to_dn_udf,
        crate::photometry::flux_to_dn_sigma_udf,
        crate::photometry::nanojansky_to_ab_mag_udf,
        crate::photometry::nanojansky_to_ab_mag_sigma_udf,
        crate::pt_in_box::pt_in_box_udf,
        crate::pt_in_circle::pt_in_circle_udf,
        crate::pt_in_ellipse::pt_in_ellipse_udf,
        crate::version::version_udf,
    );

    register_aggregate_udfs!(
        function_set,
        crate::median::median_udf,
        crate::percentile::percentile_udf,
    );

    function_set
}
