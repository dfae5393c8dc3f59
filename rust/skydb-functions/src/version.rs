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
use std::sync::Arc;

use arrow_schema::DataType;
use datafusion_common::ScalarValue;
use datafusion_expr::{
    scalar_doc_sections::DOC_SECTION_OTHER, ColumnarValue, Documentation, Volatility,
};
use skydb_expr::matchers::ArgMatcher;
use skydb_expr::scalar_udf::{SimpleSkydbScalarKernel, SkydbScalarUDF};

/// skydbVersion() scalar UDF implementation
///
/// Returns the version of the installed function library, so deployments can
/// verify which release a database instance is running.
pub fn version_udf() -> SkydbScalarUDF {
    let version = env!("CARGO_PKG_VERSION");
    let kernel = SimpleSkydbScalarKernel::new_ref(
        ArgMatcher::new(vec![], DataType::Utf8),
        Arc::new(move |_, _| {
            Ok(ColumnarValue::Scalar(ScalarValue::Utf8(Some(
                version.to_string(),
            ))))
        }),
    );
    SkydbScalarUDF::new(
        "skydbVersion",
        vec![kernel],
        Volatility::Immutable,
        Some(
            Documentation::builder(
                DOC_SECTION_OTHER,
                "Return the version of the installed function library",
                "skydbVersion()",
            )
            .with_sql_example("SELECT skydbVersion()")
            .build(),
        ),
    )
}
