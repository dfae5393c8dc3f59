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
use arrow_array::ArrayRef;
use datafusion_common::ScalarValue;
use datafusion_expr::ColumnarValue;

/// Assert two [`ColumnarValue`]s are equal
///
/// Panics if the values' Scalar/Array status is different or if the content
/// is not equal, with a failure message naming the mismatching side.
pub fn assert_value_equal(actual: &ColumnarValue, expected: &ColumnarValue) {
    match (actual, expected) {
        (ColumnarValue::Array(actual_array), ColumnarValue::Array(expected_array)) => {
            assert_array_equal(actual_array, expected_array);
        }
        (ColumnarValue::Scalar(actual_scalar), ColumnarValue::Scalar(expected_scalar)) => {
            assert_scalar_equal(actual_scalar, expected_scalar);
        }
        (ColumnarValue::Array(_), ColumnarValue::Scalar(_)) => {
            panic!("ColumnarValues not equal: actual is Array, expected Scalar");
        }
        (ColumnarValue::Scalar(_), ColumnarValue::Array(_)) => {
            panic!("ColumnarValues not equal: actual is Scalar, expected Array");
        }
    }
}

/// Assert two [`ArrayRef`]s are equal
///
/// Panics if the values' length or types are different or if the content is
/// otherwise not equal.
pub fn assert_array_equal(actual: &ArrayRef, expected: &ArrayRef) {
    if actual.data_type() != expected.data_type() {
        panic!(
            "Types not equal: actual Array is {}, expected Array is {}",
            actual.data_type(),
            expected.data_type()
        );
    }
    if actual.len() != expected.len() {
        panic!(
            "Lengths not equal: actual Array has length {}, expected Array has length {}",
            actual.len(),
            expected.len()
        );
    }
    assert_eq!(actual, expected);
}

/// Assert two [`ScalarValue`]s are equal
pub fn assert_scalar_equal(actual: &ScalarValue, expected: &ScalarValue) {
    if actual.data_type() != expected.data_type() {
        panic!(
            "Types not equal: actual ScalarValue is {}, expected ScalarValue is {}",
            actual.data_type(),
            expected.data_type()
        );
    }
    assert_eq!(actual, expected);
}

/// Assert a [`ScalarValue`] is a Float64 within `tolerance` of `expected`
///
/// A `None` expectation asserts a null result.
pub fn assert_scalar_approx_equal(actual: &ScalarValue, expected: Option<f64>, tolerance: f64) {
    match (actual, expected) {
        (ScalarValue::Float64(Some(value)), Some(expected)) => {
            assert!(
                (value - expected).abs() <= tolerance,
                "actual {value} is not within {tolerance} of expected {expected}"
            );
        }
        (ScalarValue::Float64(None), None) => {}
        (ScalarValue::Float64(Some(value)), None) => {
            panic!("expected null Float64 but got {value}");
        }
        (ScalarValue::Float64(None), Some(expected)) => {
            panic!("expected {expected} but got null Float64");
        }
        (_, _) => panic!("expected a Float64 ScalarValue, got {actual}"),
    }
}
