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

use arrow_schema::DataType;
use datafusion_common::{not_impl_err, Result};
use datafusion_expr::{
    ColumnarValue, Documentation, ScalarFunctionArgs, ScalarUDFImpl, Signature, Volatility,
};

use crate::matchers::ArgMatcher;

pub type ScalarKernelRef = Arc<dyn SkydbScalarKernel + Send + Sync>;

/// Top-level scalar user-defined function
///
/// This struct implements datafusion's ScalarUDF and implements kernel
/// dispatch: whereas a SkydbScalarUDF represents a logical operation (e.g.,
/// s2PtInCPoly()), a kernel wraps the logic for one specific set of argument
/// types (e.g., the packed-binary or the variadic-coordinate call form).
#[derive(Debug, Clone)]
pub struct SkydbScalarUDF {
    name: String,
    signature: Signature,
    kernels: Vec<ScalarKernelRef>,
    documentation: Option<Documentation>,
    aliases: Vec<String>,
}

/// User-defined function implementation
///
/// A [SkydbScalarUDF] is comprised of one or more kernels, dispatching to the
/// first whose return_type returns `Some()`.
pub trait SkydbScalarKernel: Debug {
    /// Calculate a return type given input types
    ///
    /// Returns Some(data_type) if this kernel applies to the input types or
    /// None otherwise. The [ArgMatcher] contains a set of helper functions to
    /// help implement this function.
    fn return_type(&self, args: &[DataType]) -> Result<Option<DataType>>;

    /// Compute a batch of results
    fn invoke_batch(&self, arg_types: &[DataType], args: &[ColumnarValue])
        -> Result<ColumnarValue>;
}

/// Type definition for a scalar kernel implementation function
pub type SkydbScalarKernelImpl =
    Arc<dyn Fn(&[DataType], &[ColumnarValue]) -> Result<ColumnarValue> + Send + Sync>;

/// Scalar kernel based on a function
pub struct SimpleSkydbScalarKernel {
    arg_matcher: ArgMatcher,
    fun: SkydbScalarKernelImpl,
}

impl Debug for SimpleSkydbScalarKernel {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("SimpleSkydbScalarKernel").finish()
    }
}

impl SimpleSkydbScalarKernel {
    pub fn new_ref(arg_matcher: ArgMatcher, fun: SkydbScalarKernelImpl) -> ScalarKernelRef {
        Arc::new(Self { arg_matcher, fun })
    }
}

impl SkydbScalarKernel for SimpleSkydbScalarKernel {
    fn return_type(&self, args: &[DataType]) -> Result<Option<DataType>> {
        self.arg_matcher.match_args(args)
    }

    fn invoke_batch(
        &self,
        arg_types: &[DataType],
        args: &[ColumnarValue],
    ) -> Result<ColumnarValue> {
        (self.fun)(arg_types, args)
    }
}

impl SkydbScalarUDF {
    /// Create a new SkydbScalarUDF
    pub fn new(
        name: &str,
        kernels: Vec<ScalarKernelRef>,
        volatility: Volatility,
        documentation: Option<Documentation>,
    ) -> SkydbScalarUDF {
        let signature = Signature::user_defined(volatility);
        Self {
            name: name.to_string(),
            signature,
            kernels,
            documentation,
            aliases: vec![],
        }
    }

    pub fn new_with_aliases(
        name: &str,
        kernels: Vec<ScalarKernelRef>,
        volatility: Volatility,
        documentation: Option<Documentation>,
        aliases: Vec<String>,
    ) -> SkydbScalarUDF {
        let signature = Signature::user_defined(volatility);
        Self {
            name: name.to_string(),
            signature,
            kernels,
            documentation,
            aliases,
        }
    }

    /// Create a new stub function
    ///
    /// Creates a new function that calculates a return type but fails when
    /// invoked with arguments. This is useful when the actual functionality
    /// is expected to be registered from an independent crate.
    pub fn new_stub(
        name: &str,
        arg_matcher: ArgMatcher,
        volatility: Volatility,
        documentation: Option<Documentation>,
    ) -> Self {
        let name_string = name.to_string();
        let stub_kernel = SimpleSkydbScalarKernel::new_ref(
            arg_matcher,
            Arc::new(move |arg_types, _| {
                not_impl_err!("Implementation for {name_string}({arg_types:?}) was not registered")
            }),
        );

        Self::new(name, vec![stub_kernel], volatility, documentation)
    }

    /// Create a SkydbScalarUDF from a single kernel
    ///
    /// This constructor creates a [Volatility::Immutable] function with no
    /// documentation consisting of only the implementation provided.
    pub fn from_kernel(name: &str, kernel: ScalarKernelRef) -> SkydbScalarUDF {
        Self::new(name, vec![kernel], Volatility::Immutable, None)
    }

    /// Return a copy of this UDF registered under a different name
    pub fn with_name(&self, name: &str) -> SkydbScalarUDF {
        let mut out = self.clone();
        out.name = name.to_string();
        out
    }

    /// Add a new kernel to a scalar UDF
    ///
    /// Because kernels are resolved in reverse order, the new kernel will
    /// take precedence over any previously added kernels that apply to the
    /// same types.
    pub fn add_kernel(&mut self, kernel: ScalarKernelRef) {
        self.kernels.push(kernel);
    }

    fn return_type_impl(&self, args: &[DataType]) -> Result<(&dyn SkydbScalarKernel, DataType)> {
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

impl ScalarUDFImpl for SkydbScalarUDF {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn documentation(&self) -> Option<&Documentation> {
        self.documentation.as_ref()
    }

    fn return_type(&self, arg_types: &[DataType]) -> Result<DataType> {
        let (_, out_type) = self.return_type_impl(arg_types)?;
        Ok(out_type)
    }

    fn coerce_types(&self, arg_types: &[DataType]) -> Result<Vec<DataType>> {
        Ok(arg_types.to_vec())
    }

    fn invoke_with_args(&self, args: ScalarFunctionArgs) -> Result<ColumnarValue> {
        let arg_types = args
            .arg_fields
            .iter()
            .map(|field| field.data_type().clone())
            .collect::<Vec<_>>();

        let (kernel, _) = self.return_type_impl(&arg_types)?;
        kernel.invoke_batch(&arg_types, &args.args)
    }

    fn aliases(&self) -> &[String] {
        &self.aliases
    }
}
