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
use std::{iter::zip, sync::Arc};

use arrow_array::{ArrayRef, RecordBatch};
use arrow_schema::{DataType, Field, FieldRef, Schema};
use datafusion_common::{config::ConfigOptions, Result, ScalarValue};
use datafusion_expr::{
    function::{AccumulatorArgs, StateFieldsArgs},
    Accumulator, AggregateUDF, ColumnarValue, Expr, Literal, ScalarFunctionArgs, ScalarUDF,
    ScalarUDFImpl,
};
use datafusion_physical_expr::{expressions::Column, PhysicalExpr};
use skydb_common::skydb_internal_err;

use crate::compare::assert_scalar_equal;

/// Low-level tester for aggregate functions
///
/// This struct provides a means by which to run a simple check of an
/// aggregate implementation by approximating one method DataFusion might use
/// to perform the aggregation. Whereas DataFusion may arrange various calls
/// to accumulate, state, and update_batch to optimize for different cases,
/// this tester always aggregates states that were in turn created by
/// accumulating one batch each.
///
/// This is not a replacement for testing at a higher level using DataFusion's
/// actual aggregate implementation but provides a useful mechanism to ensure
/// all the pieces of an accumulator are plugged in.
pub struct AggregateUdfTester {
    udf: AggregateUDF,
    arg_types: Vec<DataType>,
}

impl AggregateUdfTester {
    /// Create a new tester
    pub fn new(udf: AggregateUDF, arg_types: Vec<DataType>) -> Self {
        Self { udf, arg_types }
    }

    /// Compute the return type
    pub fn return_type(&self) -> Result<DataType> {
        let out_field = self.udf.return_field(&self.arg_fields())?;
        Ok(out_field.data_type().clone())
    }

    /// Perform a simple aggregation
    ///
    /// Each batch is a set of argument columns. Every batch is accumulated
    /// with its own accumulator and serialized into its own state, after
    /// which the states are merged in batches of one. This has the effect of
    /// exercising all the pieces of an aggregator in a predictable way.
    pub fn aggregate(&self, batches: Vec<Vec<ArrayRef>>) -> Result<ScalarValue> {
        let state_schema = Arc::new(Schema::new(self.state_fields()?));
        let mut state_accumulator = self.new_accumulator()?;

        for batch in batches {
            let mut batch_accumulator = self.new_accumulator()?;
            let columns = zip(batch, &self.arg_types)
                .map(|(array, data_type)| {
                    ColumnarValue::Array(array)
                        .cast_to(data_type, None)?
                        .to_array(0)
                })
                .collect::<Result<Vec<_>>>()?;
            batch_accumulator.update_batch(&columns)?;
            let state_batch_of_one = RecordBatch::try_new(
                state_schema.clone(),
                batch_accumulator
                    .state()?
                    .into_iter()
                    .map(|v| v.to_array())
                    .collect::<Result<Vec<_>>>()?,
            )?;
            state_accumulator.merge_batch(state_batch_of_one.columns())?;
        }

        state_accumulator.evaluate()
    }

    fn new_accumulator(&self) -> Result<Box<dyn Accumulator>> {
        let mock_schema = Schema::new(self.arg_fields());
        let exprs = (0..self.arg_types.len())
            .map(|i| -> Arc<dyn PhysicalExpr> { Arc::new(Column::new("col", i)) })
            .collect::<Vec<_>>();
        let accumulator_args = AccumulatorArgs {
            return_field: self.udf.return_field(mock_schema.fields())?,
            schema: &mock_schema,
            ignore_nulls: true,
            order_bys: &[],
            is_reversed: false,
            name: "",
            is_distinct: false,
            exprs: &exprs,
        };

        self.udf.accumulator(accumulator_args)
    }

    fn state_fields(&self) -> Result<Vec<FieldRef>> {
        let state_field_args = StateFieldsArgs {
            name: "",
            input_fields: &self.arg_fields(),
            return_field: self.udf.return_field(&self.arg_fields())?,
            ordering_fields: &[],
            is_distinct: false,
        };
        self.udf.state_fields(state_field_args)
    }

    fn arg_fields(&self) -> Vec<FieldRef> {
        self.arg_types
            .iter()
            .map(|data_type| Arc::new(Field::new("", data_type.clone(), true)))
            .collect()
    }
}

/// Low-level tester for scalar functions
///
/// This struct provides a means by which to run a simple check of a scalar
/// UDF implementation by simulating how DataFusion might call it.
///
/// Note that arguments are always cast to the types passed to [Self::new]:
/// to test different combinations of argument types, use a new tester.
pub struct ScalarUdfTester {
    udf: ScalarUDF,
    arg_types: Vec<DataType>,
}

impl ScalarUdfTester {
    /// Create a new tester
    pub fn new(udf: ScalarUDF, arg_types: Vec<DataType>) -> Self {
        Self { udf, arg_types }
    }

    /// Assert the return type of the function for the argument types used to
    /// construct this tester
    pub fn assert_return_type(&self, data_type: DataType) {
        assert_eq!(self.return_type().unwrap(), data_type);
    }

    /// Assert the result of invoking this function with all-scalar arguments
    pub fn assert_scalar_result_equals(&self, actual: ScalarValue, expected: ScalarValue) {
        assert_scalar_equal(&actual, &expected);
    }

    /// Compute the return type
    pub fn return_type(&self) -> Result<DataType> {
        self.udf.inner().return_type(&self.arg_types)
    }

    /// Invoke this function with a single scalar
    pub fn invoke_scalar(&self, arg: impl Literal) -> Result<ScalarValue> {
        let scalar_arg = Self::scalar_lit(arg, &self.arg_types[0])?;
        self.invoke_scalars(vec![scalar_arg])
    }

    /// Invoke this function with two scalars
    pub fn invoke_scalar_scalar<T0: Literal, T1: Literal>(
        &self,
        arg0: T0,
        arg1: T1,
    ) -> Result<ScalarValue> {
        let args = vec![
            Self::scalar_lit(arg0, &self.arg_types[0])?,
            Self::scalar_lit(arg1, &self.arg_types[1])?,
        ];
        self.invoke_scalars(args)
    }

    /// Invoke this function with three scalars
    pub fn invoke_scalar_scalar_scalar<T0: Literal, T1: Literal, T2: Literal>(
        &self,
        arg0: T0,
        arg1: T1,
        arg2: T2,
    ) -> Result<ScalarValue> {
        let args = vec![
            Self::scalar_lit(arg0, &self.arg_types[0])?,
            Self::scalar_lit(arg1, &self.arg_types[1])?,
            Self::scalar_lit(arg2, &self.arg_types[2])?,
        ];
        self.invoke_scalars(args)
    }

    /// Invoke this function with a row of scalar arguments
    ///
    /// Each argument is cast to the corresponding argument type of this
    /// tester; a scalar result is expected.
    pub fn invoke_scalars(&self, args: Vec<ScalarValue>) -> Result<ScalarValue> {
        let args = zip(args, &self.arg_types)
            .map(|(scalar, data_type)| Ok(ColumnarValue::Scalar(scalar.cast_to(data_type)?)))
            .collect::<Result<Vec<_>>>()?;
        if let ColumnarValue::Scalar(scalar) = self.invoke(args)? {
            Ok(scalar)
        } else {
            skydb_internal_err!("Expected scalar result from scalar invoke")
        }
    }

    /// Invoke this function with an array
    pub fn invoke_array(&self, array: ArrayRef) -> Result<ArrayRef> {
        self.invoke_arrays(vec![array])
    }

    /// Invoke a binary function with an array and a scalar
    pub fn invoke_array_scalar(&self, array: ArrayRef, arg: impl Literal) -> Result<ArrayRef> {
        let scalar = Self::scalar_lit(arg, &self.arg_types[1])?;
        let args = vec![
            ColumnarValue::Array(array).cast_to(&self.arg_types[0], None)?,
            ColumnarValue::Scalar(scalar),
        ];
        if let ColumnarValue::Array(array) = self.invoke(args)? {
            Ok(array)
        } else {
            skydb_internal_err!("Expected array result from array/scalar invoke")
        }
    }

    /// Invoke a function with a set of arrays
    pub fn invoke_arrays(&self, arrays: Vec<ArrayRef>) -> Result<ArrayRef> {
        let args = zip(arrays, &self.arg_types)
            .map(|(array, data_type)| ColumnarValue::Array(array).cast_to(data_type, None))
            .collect::<Result<_>>()?;

        if let ColumnarValue::Array(array) = self.invoke(args)? {
            Ok(array)
        } else {
            skydb_internal_err!("Expected array result from array invoke")
        }
    }

    /// Invoke this function with explicit [ColumnarValue]s
    pub fn invoke(&self, args: Vec<ColumnarValue>) -> Result<ColumnarValue> {
        assert_eq!(args.len(), self.arg_types.len(), "Unexpected arg length");

        let mut number_rows = 1;
        for arg in &args {
            match arg {
                ColumnarValue::Array(array) => {
                    number_rows = array.len();
                    break;
                }
                _ => continue,
            }
        }

        let return_type = self.return_type()?;
        let args = ScalarFunctionArgs {
            args,
            arg_fields: self.arg_fields(),
            number_rows,
            return_field: Arc::new(Field::new("", return_type, true)),
            config_options: Arc::new(ConfigOptions::default()),
        };

        self.udf.invoke_with_args(args)
    }

    fn scalar_lit(arg: impl Literal, data_type: &DataType) -> Result<ScalarValue> {
        if let Expr::Literal(scalar, _) = arg.lit() {
            scalar.cast_to(data_type)
        } else {
            skydb_internal_err!("Can't use test scalar invoke where .lit() returns non-literal")
        }
    }

    fn arg_fields(&self) -> Vec<FieldRef> {
        self.arg_types
            .iter()
            .map(|data_type| Arc::new(Field::new("", data_type.clone(), true)))
            .collect()
    }
}
