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

use arrow_array::builder::Int64Builder;
use arrow_array::Array;
use arrow_schema::DataType;
use datafusion_common::error::Result;
use datafusion_expr::{scalar_doc_sections::DOC_SECTION_OTHER, ColumnarValue, Documentation, Volatility};
use skydb_expr::matchers::ArgMatcher;
use skydb_expr::scalar_udf::{SkydbScalarKernel, SkydbScalarUDF};

use crate::executor::{binary_array, int_array, ColumnarExecutor};

/// extractInt64() scalar UDF implementation
///
/// Extracts the i-th little-endian 64-bit integer from a binary string,
/// counting from zero. Used to pick apart the range blobs produced by
/// s2CircleHtmRanges() and s2CPolyHtmRanges(). An out-of-range index yields
/// null.
pub fn extract_int64_udf() -> SkydbScalarUDF {
    SkydbScalarUDF::new(
        "extractInt64",
        vec![Arc::new(ExtractInt64 {})],
        Volatility::Immutable,
        Some(extract_int64_doc()),
    )
}

fn extract_int64_doc() -> Documentation {
    Documentation::builder(
        DOC_SECTION_OTHER,
        "Extract the i-th 64-bit integer from a binary string",
        "extractInt64(bin, i)",
    )
    .with_argument("bin", "binary: Binary string of consecutive 64-bit integers")
    .with_argument("i", "integer: Zero-based index of the integer to extract")
    .with_sql_example("SELECT extractInt64(s2CircleHtmRanges(0.0, 0.0, 1.0, 10, 0), 0)")
    .build()
}

#[derive(Debug)]
struct ExtractInt64 {}

impl SkydbScalarKernel for ExtractInt64 {
    fn return_type(&self, args: &[DataType]) -> Result<Option<DataType>> {
        let matcher = ArgMatcher::new(
            vec![ArgMatcher::is_binary(), ArgMatcher::is_integer()],
            DataType::Int64,
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
        let blobs = binary_array(&args[0], n)?;
        let indexes = int_array(&args[1], n)?;
        let mut builder = Int64Builder::with_capacity(n);
        for i in 0..n {
            if blobs.is_null(i) || indexes.is_null(i) {
                builder.append_null();
                continue;
            }
            let bytes = blobs.value(i);
            let index = indexes.value(i);
            if index < 0 || (index as usize) >= bytes.len() / 8 {
                builder.append_null();
                continue;
            }
            let mut buf = [0u8; 8];
            let offset = index as usize * 8;
            buf.copy_from_slice(&bytes[offset..offset + 8]);
            builder.append_value(i64::from_le_bytes(buf));
        }
        executor.finish(Arc::new(builder.finish()))
    }
}
