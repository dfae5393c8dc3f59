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

use arrow_array::ArrayRef;
use arrow_schema::{DataType, FieldRef};
use datafusion_common::error::Result;
use datafusion_common::ScalarValue;
use datafusion_expr::{
    scalar_doc_sections::DOC_SECTION_OTHER, Accumulator, ColumnarValue, Documentation, Volatility,
};
use skydb_expr::aggregate_udf::{SkydbAccumulator, SkydbAggregateUDF};
use skydb_expr::matchers::ArgMatcher;

use crate::order_statistics::{
    buffer_state_field, buffer_state_scalar, merge_buffer_states, ValueBuffer,
};

/// median() aggregate UDF implementation
///
/// Returns the median of the accumulated values: the middle value of the
/// sorted sequence, or the mean of the two middle values for even counts.
/// Null values are ignored; a group with no values yields null.
pub fn median_udf() -> SkydbAggregateUDF {
    SkydbAggregateUDF::new(
        "median",
        vec![Arc::new(Median {})],
        Volatility::Immutable,
        Some(median_doc()),
    )
}

fn median_doc() -> Documentation {
    Documentation::builder(
        DOC_SECTION_OTHER,
        "Return the median of a sequence of values",
        "median(value)",
    )
    .with_argument("value", "double: Value to accumulate")
    .with_sql_example("SELECT objectId, median(psfFlux) FROM Source GROUP BY objectId")
    .build()
}

#[derive(Debug)]
struct Median {}

impl SkydbAccumulator for Median {
    fn return_type(&self, args: &[DataType]) -> Result<Option<DataType>> {
        let matcher = ArgMatcher::new(vec![ArgMatcher::is_numeric()], DataType::Float64);
        matcher.match_args(args)
    }

    fn accumulator(
        &self,
        _args: &[DataType],
        _output_type: &DataType,
    ) -> Result<Box<dyn Accumulator>> {
        Ok(Box::new(MedianAccumulator {
            buffer: ValueBuffer::new(),
        }))
    }

    fn state_fields(&self, _args: &[DataType]) -> Result<Vec<FieldRef>> {
        Ok(vec![Arc::new(buffer_state_field("values"))])
    }
}

#[derive(Debug)]
struct MedianAccumulator {
    buffer: ValueBuffer,
}

impl Accumulator for MedianAccumulator {
    fn update_batch(&mut self, values: &[ArrayRef]) -> Result<()> {
        let array = ColumnarValue::Array(values[0].clone())
            .cast_to(&DataType::Float64, None)?
            .to_array(values[0].len())?;
        self.buffer
            .extend_from_array(datafusion_common::cast::as_float64_array(&array)?);
        Ok(())
    }

    fn evaluate(&mut self) -> Result<ScalarValue> {
        Ok(ScalarValue::Float64(self.buffer.median()))
    }

    fn state(&mut self) -> Result<Vec<ScalarValue>> {
        Ok(vec![buffer_state_scalar(&self.buffer)])
    }

    fn merge_batch(&mut self, states: &[ArrayRef]) -> Result<()> {
        merge_buffer_states(&states[0], &mut self.buffer)
    }

    fn size(&self) -> usize {
        size_of::<MedianAccumulator>() + self.buffer.len() * size_of::<f64>()
    }
}

#[cfg(test)]
mod tests {
    use arrow_array::{create_array, Float64Array};
    use datafusion_expr::AggregateUDF;
    use skydb_testing::testers::AggregateUdfTester;

    use super::*;

    fn tester() -> AggregateUdfTester {
        AggregateUdfTester::new(median_udf().into(), vec![DataType::Float64])
    }

    #[test]
    fn udf_metadata() {
        let udf: AggregateUDF = median_udf().into();
        assert_eq!(udf.name(), "median");
        assert!(udf.documentation().is_some());
        assert_eq!(tester().return_type().unwrap(), DataType::Float64);
    }

    #[test]
    fn median_across_batches() {
        let tester = tester();
        // 0..100 split over two partial states
        let first: ArrayRef = Arc::new(Float64Array::from((0..50).map(f64::from).collect::<Vec<_>>()));
        let second: ArrayRef = Arc::new(Float64Array::from((50..100).map(f64::from).collect::<Vec<_>>()));
        let result = tester.aggregate(vec![vec![first], vec![second]]).unwrap();
        assert_eq!(result, ScalarValue::Float64(Some(49.5)));
    }

    #[test]
    fn nulls_are_ignored() {
        let tester = tester();
        let batch: ArrayRef = create_array!(Float64, [Some(1.0), None, Some(3.0), None]);
        let result = tester.aggregate(vec![vec![batch]]).unwrap();
        assert_eq!(result, ScalarValue::Float64(Some(2.0)));
    }

    #[test]
    fn empty_input_is_null() {
        let tester = tester();
        let result = tester.aggregate(vec![]).unwrap();
        assert_eq!(result, ScalarValue::Float64(None));

        let all_null: ArrayRef = create_array!(Float64, [None, None]);
        let result = tester.aggregate(vec![vec![all_null]]).unwrap();
        assert_eq!(result, ScalarValue::Float64(None));
    }

    #[test]
    fn identical_values() {
        let tester = tester();
        let batch: ArrayRef = create_array!(Float64, [7.5, 7.5, 7.5]);
        let result = tester.aggregate(vec![vec![batch]]).unwrap();
        assert_eq!(result, ScalarValue::Float64(Some(7.5)));
    }

    #[test]
    fn single_value() {
        let tester = tester();
        let batch: ArrayRef = create_array!(Float64, [42.0]);
        let result = tester.aggregate(vec![vec![batch]]).unwrap();
        assert_eq!(result, ScalarValue::Float64(Some(42.0)));
    }
}
