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

//! Helpers for writing columnar kernel implementations.
//!
//! Kernel implementations must consider multiple input data types (any
//! numeric for coordinates, any integer for levels and indexes, any binary
//! for blobs) and any combination of Array or Scalar inputs. The
//! [ColumnarExecutor] wraps a set of arguments and normalizes both concerns:
//! arguments are cast to their canonical representation up front and scalar
//! arguments are broadcast, while `finish()` collapses the output back to a
//! scalar when every input was a scalar.

use std::sync::Arc;

use arrow_array::{Array, ArrayRef, BinaryArray, Float64Array, Int64Array};
use arrow_schema::DataType;
use datafusion_common::cast::{as_binary_array, as_float64_array, as_int64_array};
use datafusion_common::{Result, ScalarValue};
use datafusion_expr::ColumnarValue;

/// Wraps kernel arguments, tracking the iteration count and whether the
/// output should collapse back to a scalar.
pub struct ColumnarExecutor<'a> {
    args: &'a [ColumnarValue],
    num_iterations: usize,
}

impl<'a> ColumnarExecutor<'a> {
    /// Create a new [ColumnarExecutor]
    pub fn new(args: &'a [ColumnarValue]) -> Self {
        Self {
            args,
            num_iterations: Self::calc_num_iterations(args),
        }
    }

    /// Return the number of iterations `execute`-style loops should perform
    ///
    /// If all arguments are [ColumnarValue::Scalar]s, this is one iteration;
    /// otherwise it is the length of the first array argument.
    pub fn num_iterations(&self) -> usize {
        self.num_iterations
    }

    /// Finish an [ArrayRef] output as the appropriate [ColumnarValue]
    ///
    /// Converts the output of `finish()`ing an Arrow builder into a
    /// [ColumnarValue::Scalar] if all arguments were scalars, or a
    /// [ColumnarValue::Array] otherwise.
    pub fn finish(&self, out: ArrayRef) -> Result<ColumnarValue> {
        for arg in self.args {
            match arg {
                // If any argument was an array, we return an array
                ColumnarValue::Array(_) => {
                    return Ok(ColumnarValue::Array(out));
                }
                ColumnarValue::Scalar(_) => {}
            }
        }

        // For all scalar arguments, we return a scalar
        Ok(ColumnarValue::Scalar(ScalarValue::try_from_array(&out, 0)?))
    }

    fn calc_num_iterations(args: &[ColumnarValue]) -> usize {
        for arg in args {
            match arg {
                ColumnarValue::Array(array) => {
                    return array.len();
                }
                ColumnarValue::Scalar(_) => {}
            }
        }

        1
    }
}

/// Casts a numeric argument to a broadcast [Float64Array] of `num_rows`
/// elements.
pub fn float_array(arg: &ColumnarValue, num_rows: usize) -> Result<Float64Array> {
    let array = arg
        .cast_to(&DataType::Float64, None)?
        .to_array(num_rows)?;
    Ok(as_float64_array(&array)?.clone())
}

/// Casts every argument in `args` to a broadcast [Float64Array].
pub fn float_arrays(args: &[ColumnarValue], num_rows: usize) -> Result<Vec<Float64Array>> {
    args.iter().map(|arg| float_array(arg, num_rows)).collect()
}

/// Casts an integer argument to a broadcast [Int64Array] of `num_rows`
/// elements.
pub fn int_array(arg: &ColumnarValue, num_rows: usize) -> Result<Int64Array> {
    let array = arg.cast_to(&DataType::Int64, None)?.to_array(num_rows)?;
    Ok(as_int64_array(&array)?.clone())
}

/// Casts a binary argument to a broadcast [BinaryArray] of `num_rows`
/// elements.
pub fn binary_array(arg: &ColumnarValue, num_rows: usize) -> Result<BinaryArray> {
    let array = arg.cast_to(&DataType::Binary, None)?.to_array(num_rows)?;
    Ok(as_binary_array(&array)?.clone())
}

/// Collects row `i` of the given float columns, returning `None` if any
/// column is null at that row.
pub fn float_row(columns: &[Float64Array], i: usize) -> Option<Vec<f64>> {
    let mut out = Vec::with_capacity(columns.len());
    for column in columns {
        if column.is_null(i) {
            return None;
        }
        out.push(column.value(i));
    }
    Some(out)
}
