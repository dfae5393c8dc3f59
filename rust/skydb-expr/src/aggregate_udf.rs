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
use std::{any::Any, fmt::Debug, sync::Arc};

use arrow_schema::{DataType, FieldRef};
use datafusion_common::{not_impl_err, Result};
use datafusion_expr::{
    function::{AccumulatorArgs, StateFieldsArgs},
    Accumulator, AggregateUDFImpl, Documentation, Signature, Volatility,
};

use crate::matchers::ArgMatcher;

pub type SkydbAccumulatorRef = Arc<dyn SkydbAccumulator + Send + Sync>;

/// Top-level aggregate user-defined function
///
/// This struct implements datafusion's AggregateUDFImpl and implements kernel
/// dispatch such that implementations can be registered flexibly.
#[derive(Debug, Clone)]
pub struct SkydbAggregateUDF {
    name: String,
    signature: Signature,
    kernels: Vec<SkydbAccumulatorRef>,
    documentation: Option<Documentation>,
}

impl SkydbAggregateUDF {
    /// Create a new SkydbAggregateUDF
    pub fn new(
        name: &str,
        kernels: Vec<SkydbAccumulatorRef>,
        volatility: Volatility,
        documentation: Option<Documentation>,
    ) -> Self {
        let signature = Signature::user_defined(volatility);
        Self {
            name: name.to_string(),
            signature,
            kernels,
            documentation,
        }
    }

    /// Create a new stub aggregate function that calculates a return type but
    /// fails when invoked with arguments.
    pub fn new_stub(
        name: &str,
        arg_matcher: ArgMatcher,
        volatility: Volatility,
        documentation: Option<Documentation>,
    ) -> Self {
        let stub_kernel = StubAccumulator::new(name.to_string(), arg_matcher);
        Self::new(name, vec![Arc::new(stub_kernel)], volatility, documentation)
    }

    /// Return a copy of this UDF registered under a different name
    pub fn with_name(&self, name: &str) -> SkydbAggregateUDF {
        let mut out = self.clone();
        out.name = name.to_string();
        out
    }

    /// Add a new kernel to an aggregate UDF
    ///
    /// Because kernels are resolved in reverse order, the new kernel will
    /// take precedence over any previously added kernels that apply to the
    /// same types.
    pub fn add_kernel(&mut self, kernel: SkydbAccumulatorRef) {
        self.kernels.push(kernel);
    }

    /// List the current kernels
    pub fn kernels(&self) -> &[SkydbAccumulatorRef] {
        &self.kernels
    }

    fn dispatch_impl(&self, args: &[DataType]) -> Result<(&dyn SkydbAccumulator, DataType)> {
        // Resolve kernels in reverse so that more recently added ones are
        // resolved first
        for kernel in self.kernels.iter().rev() {
            if let Some(return_type) = kernel.return_type(args)? {
                return Ok((kernel.as_ref(), return_type));
            }
        }

        not_impl_err!("{}({:?}): No kernel matching arguments", self.name, args)
    }
}

impl AggregateUDFImpl for SkydbAggregateUDF {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn coerce_types(&self, arg_types: &[DataType]) -> Result<Vec<DataType>> {
        Ok(arg_types.into())
    }

    fn state_fields(&self, args: StateFieldsArgs) -> Result<Vec<FieldRef>> {
        let arg_types = args
            .input_fields
            .iter()
            .map(|field| field.data_type().clone())
            .collect::<Vec<_>>();
        let (accumulator, _) = self.dispatch_impl(&arg_types)?;
        accumulator.state_fields(&arg_types)
    }

    fn return_type(&self, arg_types: &[DataType]) -> Result<DataType> {
        let (_, out_type) = self.dispatch_impl(arg_types)?;
        Ok(out_type)
    }

    fn accumulator(&self, acc_args: AccumulatorArgs) -> Result<Box<dyn Accumulator>> {
        let arg_fields = acc_args
            .exprs
            .iter()
            .map(|expr| expr.return_field(acc_args.schema))
            .collect::<Result<Vec<_>>>()?;
        let arg_types = arg_fields
            .iter()
            .map(|field| field.data_type().clone())
            .collect::<Vec<_>>();
        let (accumulator, output_type) = self.dispatch_impl(&arg_types)?;
        accumulator.accumulator(&arg_types, &output_type)
    }

    fn documentation(&self) -> Option<&Documentation> {
        self.documentation.as_ref()
    }
}

/// Aggregate kernel implementation
pub trait SkydbAccumulator: Debug {
    /// Given input data types, calculate an output data type
    fn return_type(&self, args: &[DataType]) -> Result<Option<DataType>>;

    /// Given input data types and the previously-calculated output data type,
    /// resolve an [Accumulator] providing the underlying DataFusion
    /// implementation
    fn accumulator(&self, args: &[DataType], output_type: &DataType)
        -> Result<Box<dyn Accumulator>>;

    /// The fields representing the underlying serialized state of the
    /// accumulator
    fn state_fields(&self, args: &[DataType]) -> Result<Vec<FieldRef>>;
}

#[derive(Debug)]
struct StubAccumulator {
    name: String,
    matcher: ArgMatcher,
}

impl StubAccumulator {
    fn new(name: String, matcher: ArgMatcher) -> Self {
        Self { name, matcher }
    }
}

impl SkydbAccumulator for StubAccumulator {
    fn return_type(&self, args: &[DataType]) -> Result<Option<DataType>> {
        self.matcher.match_args(args)
    }

    fn accumulator(
        &self,
        args: &[DataType],
        _output_type: &DataType,
    ) -> Result<Box<dyn Accumulator>> {
        not_impl_err!(
            "Implementation for {}({args:?}) was not registered",
            self.name
        )
    }

    fn state_fields(&self, _args: &[DataType]) -> Result<Vec<FieldRef>> {
        Ok(vec![])
    }
}
