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

use arrow_array::{Array, ArrayRef};
use arrow_schema::{DataType, Field, FieldRef};
use datafusion_common::cast::{as_float64_array, as_list_array};
use datafusion_common::error::Result;
use datafusion_common::{exec_err, ScalarValue};
use datafusion_expr::{
    scalar_doc_sections::DOC_SECTION_OTHER, Accumulator, ColumnarValue, Documentation, Volatility,
};
use skydb_expr::aggregate_udf::{SkydbAccumulator, SkydbAggregateUDF};
use skydb_expr::matchers::ArgMatcher;

use crate::order_statistics::{buffer_state_field, buffer_state_scalar, ValueBuffer};

/// percentile() aggregate UDF implementation
///
/// Returns the percentile of the accumulated values at the given percent in
/// [0, 100], computed by linear interpolation between order statistics at
/// rank `percent/100 * (n - 1)`. The percent is captured from the first
/// accumulated row of each group and must not vary within a group. Null and
/// NaN values are ignored; a group with no values yields null.
pub fn percentile_udf() -> SkydbAggregateUDF {
    SkydbAggregateUDF::new(
        "percentile",
        vec![Arc::new(Percentile {})],
        Volatility::Immutable,
        Some(percentile_doc()),
    )
}

fn percentile_doc() -> Documentation {
    Documentation::builder(
        DOC_SECTION_OTHER,
        "Return the percentile of a sequence of values",
        "percentile(value, percent)",
    )
    .with_argument("value", "double: Value to accumulate")
    .with_argument("percent", "double: Percent in [0, 100], constant per group")
    .with_sql_example("SELECT objectId, percentile(psfFlux, 25.0) FROM Source GROUP BY objectId")
    .build()
}

#[derive(Debug)]
struct Percentile {}

impl SkydbAccumulator for Percentile {
    fn return_type(&self, args: &[DataType]) -> Result<Option<DataType>> {
        let matcher = ArgMatcher::new(
            vec![ArgMatcher::is_numeric(), ArgMatcher::is_numeric()],
            DataType::Float64,
        );
        matcher.match_args(args)
    }

    fn accumulator(
        &self,
        _args: &[DataType],
        _output_type: &DataType,
    ) -> Result<Box<dyn Accumulator>> {
        Ok(Box::new(PercentileAccumulator {
            buffer: ValueBuffer::new(),
            fraction: None,
        }))
    }

    fn state_fields(&self, _args: &[DataType]) -> Result<Vec<FieldRef>> {
        Ok(vec![
            Arc::new(buffer_state_field("values")),
            Arc::new(Field::new("fraction", DataType::Float64, true)),
        ])
    }
}

#[derive(Debug)]
struct PercentileAccumulator {
    buffer: ValueBuffer,
    /// percent divided by 100, captured from the first accumulated row
    fraction: Option<f64>,
}

impl PercentileAccumulator {
    fn capture_fraction(&mut self, percents: &ArrayRef) -> Result<()> {
        if self.fraction.is_some() {
            return Ok(());
        }
        let percents = ColumnarValue::Array(percents.clone())
            .cast_to(&DataType::Float64, None)?
            .to_array(percents.len())?;
        if let Some(percent) = as_float64_array(&percents)?.iter().flatten().next() {
            if !percent.is_finite() || !(0.0..=100.0).contains(&percent) {
                return exec_err!("percentile() percent {percent} is not in the [0, 100] range");
            }
            self.fraction = Some(percent / 100.0);
        }
        Ok(())
    }
}

impl Accumulator for PercentileAccumulator {
    fn update_batch(&mut self, values: &[ArrayRef]) -> Result<()> {
        self.capture_fraction(&values[1])?;
        let array = ColumnarValue::Array(values[0].clone())
            .cast_to(&DataType::Float64, None)?
            .to_array(values[0].len())?;
        self.buffer.extend_from_array(as_float64_array(&array)?);
        Ok(())
    }

    fn evaluate(&mut self) -> Result<ScalarValue> {
        let result = match self.fraction {
            Some(fraction) => self.buffer.quantile(fraction),
            None => None,
        };
        Ok(ScalarValue::Float64(result))
    }

    fn state(&mut self) -> Result<Vec<ScalarValue>> {
        Ok(vec![
            buffer_state_scalar(&self.buffer),
            ScalarValue::Float64(self.fraction.map(|f| f * 100.0)),
        ])
    }

    fn merge_batch(&mut self, states: &[ArrayRef]) -> Result<()> {
        self.capture_fraction(&states[1])?;
        let lists = as_list_array(&states[0])?;
        for i in 0..lists.len() {
            if lists.is_valid(i) {
                let element = lists.value(i);
                self.buffer
                    .extend_from_array(as_float64_array(&element)?);
            }
        }
        Ok(())
    }

    fn size(&self) -> usize {
        size_of::<PercentileAccumulator>() + self.buffer.len() * size_of::<f64>()
    }
}

#[cfg(test)]
mod tests {
    use arrow_array::{create_array, Float64Array};
    use datafusion_expr::AggregateUDF;
    use skydb_testing::testers::AggregateUdfTester;

    use super::*;

    fn tester() -> AggregateUdfTester {
        AggregateUdfTester::new(
            percentile_udf().into(),
            vec![DataType::Float64, DataType::Float64],
        )
    }

    fn percent_column(percent: f64, len: usize) -> ArrayRef {
        Arc::new(Float64Array::from(vec![percent; len]))
    }

    #[test]
    fn udf_metadata() {
        let udf: AggregateUDF = percentile_udf().into();
        assert_eq!(udf.name(), "percentile");
        assert!(udf.documentation().is_some());
        assert_eq!(tester().return_type().unwrap(), DataType::Float64);
    }

    #[test]
    fn quartile_of_101_values() {
        let tester = tester();
        let values: ArrayRef =
            Arc::new(Float64Array::from((0..=100).map(f64::from).collect::<Vec<_>>()));
        let percents = percent_column(25.0, 101);
        let result = tester.aggregate(vec![vec![values, percents]]).unwrap();
        assert_eq!(result, ScalarValue::Float64(Some(25.0)));
    }

    #[test]
    fn interpolated_percentile() {
        let tester = tester();
        let values: ArrayRef = create_array!(Float64, [0.0, 10.0]);
        let percents = percent_column(75.0, 2);
        let result = tester.aggregate(vec![vec![values, percents]]).unwrap();
        assert_eq!(result, ScalarValue::Float64(Some(7.5)));
    }

    #[test]
    fn accumulation_across_batches() {
        let tester = tester();
        let first: ArrayRef =
            Arc::new(Float64Array::from((0..=50).map(f64::from).collect::<Vec<_>>()));
        let second: ArrayRef =
            Arc::new(Float64Array::from((51..=100).map(f64::from).collect::<Vec<_>>()));
        let result = tester
            .aggregate(vec![
                vec![first, percent_column(50.0, 51)],
                vec![second, percent_column(50.0, 50)],
            ])
            .unwrap();
        assert_eq!(result, ScalarValue::Float64(Some(50.0)));
    }

    #[test]
    fn empty_input_is_null() {
        let tester = tester();
        let result = tester.aggregate(vec![]).unwrap();
        assert_eq!(result, ScalarValue::Float64(None));

        let all_null: ArrayRef = create_array!(Float64, [None, None]);
        let result = tester
            .aggregate(vec![vec![all_null, percent_column(50.0, 2)]])
            .unwrap();
        assert_eq!(result, ScalarValue::Float64(None));
    }

    #[test]
    fn identical_values() {
        let tester = tester();
        let values: ArrayRef = create_array!(Float64, [3.25, 3.25, 3.25, 3.25]);
        let result = tester
            .aggregate(vec![vec![values, percent_column(90.0, 4)]])
            .unwrap();
        assert_eq!(result, ScalarValue::Float64(Some(3.25)));
    }

    #[test]
    fn out_of_range_percent_is_an_error() {
        for percent in [-1.0, 100.5, f64::NAN] {
            let tester = tester();
            let values: ArrayRef = create_array!(Float64, [1.0, 2.0]);
            let result = tester.aggregate(vec![vec![values, percent_column(percent, 2)]]);
            assert!(result.is_err(), "percent = {percent}");
        }
    }

    #[test]
    fn extreme_percents() {
        let tester = tester();
        let values: ArrayRef = create_array!(Float64, [5.0, 1.0, 3.0]);
        let result = tester
            .aggregate(vec![vec![values.clone(), percent_column(0.0, 3)]])
            .unwrap();
        assert_eq!(result, ScalarValue::Float64(Some(1.0)));

        let tester = self::tester();
        let result = tester
            .aggregate(vec![vec![values, percent_column(100.0, 3)]])
            .unwrap();
        assert_eq!(result, ScalarValue::Float64(Some(5.0)));
    }
}
