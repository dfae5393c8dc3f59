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

//! Shared order-statistics state for the median() and percentile()
//! aggregates.

use std::sync::Arc;

use arrow_array::{Array, ArrayRef, Float64Array, ListArray};
use arrow_buffer::{OffsetBuffer, ScalarBuffer};
use arrow_schema::{DataType, Field};
use datafusion_common::cast::{as_float64_array, as_list_array};
use datafusion_common::{Result, ScalarValue};

/// A buffer of observed values from which an order statistic is computed at
/// finalization.
///
/// Null and NaN inputs are ignored. Selection runs in linear time via
/// `select_nth_unstable_by`, so no sort order is maintained while
/// accumulating.
#[derive(Debug, Default)]
pub struct ValueBuffer {
    values: Vec<f64>,
}

impl ValueBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Adds a single value; NaN values are ignored.
    pub fn push(&mut self, value: f64) {
        if !value.is_nan() {
            self.values.push(value);
        }
    }

    /// Adds the non-null values of `array`.
    pub fn extend_from_array(&mut self, array: &Float64Array) {
        for value in array.iter().flatten() {
            self.push(value);
        }
    }

    /// Computes the quantile at `fraction` in [0, 1] by linear interpolation
    /// between order statistics at rank `fraction * (n - 1)`.
    ///
    /// Returns `None` when no values were accumulated. The buffer is
    /// partially reordered in place.
    pub fn quantile(&mut self, fraction: f64) -> Option<f64> {
        let n = self.values.len();
        if n == 0 {
            return None;
        }
        if n == 1 {
            return Some(self.values[0]);
        }
        let rank = fraction * (n - 1) as f64;
        let k = rank.floor() as usize;
        let f = rank - k as f64;
        let (_, kth, upper) = self.values.select_nth_unstable_by(k, f64::total_cmp);
        let lower = *kth;
        if f == 0.0 {
            return Some(lower);
        }
        // The next order statistic is the smallest element of the upper
        // partition.
        let next = upper.iter().copied().fold(f64::INFINITY, f64::min);
        Some(lower + f * (next - lower))
    }

    /// Computes the median: the middle order statistic, or the mean of the
    /// two middle order statistics for even counts.
    pub fn median(&mut self) -> Option<f64> {
        self.quantile(0.5)
    }
}

/// The Arrow field holding serialized buffer state.
pub fn buffer_state_field(name: &str) -> Field {
    Field::new(
        name,
        DataType::List(Arc::new(Field::new_list_field(DataType::Float64, true))),
        true,
    )
}

/// Serializes the buffer contents as a single-row List scalar for
/// partial-aggregation state exchange.
pub fn buffer_state_scalar(buffer: &ValueBuffer) -> ScalarValue {
    let values = Float64Array::from(buffer.values().to_vec());
    let offsets = OffsetBuffer::new(ScalarBuffer::from(vec![0i32, values.len() as i32]));
    let list = ListArray::new(
        Arc::new(Field::new_list_field(DataType::Float64, true)),
        offsets,
        Arc::new(values),
        None,
    );
    ScalarValue::List(Arc::new(list))
}

/// Merges serialized buffer states (one list per row) into `buffer`.
pub fn merge_buffer_states(states: &ArrayRef, buffer: &mut ValueBuffer) -> Result<()> {
    let lists = as_list_array(states)?;
    for i in 0..lists.len() {
        if lists.is_valid(i) {
            let element = lists.value(i);
            buffer.extend_from_array(as_float64_array(&element)?);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer_of(values: &[f64]) -> ValueBuffer {
        let mut buffer = ValueBuffer::new();
        for v in values {
            buffer.push(*v);
        }
        buffer
    }

    #[test]
    fn median_odd_and_even() {
        assert_eq!(buffer_of(&[3.0, 1.0, 2.0]).median(), Some(2.0));
        assert_eq!(buffer_of(&[4.0, 1.0, 3.0, 2.0]).median(), Some(2.5));
        assert_eq!(buffer_of(&[5.0]).median(), Some(5.0));
        assert_eq!(buffer_of(&[]).median(), None);
    }

    #[test]
    fn median_reference_sequences() {
        let mut buffer = buffer_of(&(0..100).map(f64::from).collect::<Vec<_>>());
        assert_eq!(buffer.median(), Some(49.5));

        let mut buffer = buffer_of(&(0..10000).map(f64::from).collect::<Vec<_>>());
        assert_eq!(buffer.median(), Some(4999.5));

        // Appending one more value n shifts the median to n/2
        buffer.push(10000.0);
        assert_eq!(buffer.median(), Some(5000.0));
    }

    #[test]
    fn quantile_interpolation() {
        // 101 distinct values: rank = p/100 * 100 is exact
        let mut buffer = buffer_of(&(0..=100).map(f64::from).collect::<Vec<_>>());
        assert_eq!(buffer.quantile(0.25), Some(25.0));
        assert_eq!(buffer.quantile(0.0), Some(0.0));
        assert_eq!(buffer.quantile(1.0), Some(100.0));

        // Interpolation between order statistics
        let mut buffer = buffer_of(&[0.0, 10.0]);
        assert_eq!(buffer.quantile(0.75), Some(7.5));
    }

    #[test]
    fn identical_values() {
        let mut buffer = buffer_of(&[7.0; 32]);
        assert_eq!(buffer.median(), Some(7.0));
        assert_eq!(buffer.quantile(0.9), Some(7.0));
    }

    #[test]
    fn nan_is_ignored() {
        let mut buffer = buffer_of(&[1.0, f64::NAN, 3.0]);
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.median(), Some(2.0));
    }

    #[test]
    fn state_round_trip() {
        let buffer = buffer_of(&[1.0, 2.0, 3.0]);
        let state = buffer_state_scalar(&buffer);
        let array = state.to_array().unwrap();
        let mut merged = ValueBuffer::new();
        merge_buffer_states(&array, &mut merged).unwrap();
        assert_eq!(merged.values(), &[1.0, 2.0, 3.0]);
    }
}
