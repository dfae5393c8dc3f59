use crate::aggregate_udf::{SkydbAccumulatorRef, SkydbAggregateUDF};
use crate::scalar_udf::{ScalarKernelRef, SkydbScalarUDF};
use datafusion_common::{error::Result, internal_err};
use datafusion_expr::{AggregateUDFImpl, ScalarUDFImpl};
use std::collections::HashMap;

/// Helper for managing groups of functions
///
/// SkyDB coordinates the assembly of a set of scalar and aggregate functions
/// with multiple implementations (e.g., variadic-coordinate and packed-binary
/// call forms) and/or implementations that live in different crates. This
/// structure helps coordinate these implementations.
pub struct FunctionSet {
    scalar_udfs: HashMap<String, SkydbScalarUDF>,
    aggregate_udfs: HashMap<String, SkydbAggregateUDF>,
}

impl FunctionSet {
    /// Create a new, empty FunctionSet
    pub fn new() -> Self {
        Self {
            scalar_udfs: HashMap::new(),
            aggregate_udfs: HashMap::new(),
        }
    }

    /// Iterate over references to all [SkydbScalarUDF]s
    pub fn scalar_udfs(&self) -> impl Iterator<Item = &SkydbScalarUDF> + '_ {
        self.scalar_udfs.values()
    }

    /// Iterate over references to all [SkydbAggregateUDF]s
    pub fn aggregate_udfs(&self) -> impl Iterator<Item = &SkydbAggregateUDF> + '_ {
        self.aggregate_udfs.values()
    }

    /// Return a reference to the scalar function corresponding to the name
    pub fn scalar_udf(&self, name: &str) -> Option<&SkydbScalarUDF> {
        self.scalar_udfs.get(name)
    }

    /// Return a mutable reference to the scalar function corresponding to
    /// the name
    pub fn scalar_udf_mut(&mut self, name: &str) -> Option<&mut SkydbScalarUDF> {
        self.scalar_udfs.get_mut(name)
    }

    /// Return a reference to the aggregate function corresponding to the name
    pub fn aggregate_udf(&self, name: &str) -> Option<&SkydbAggregateUDF> {
        self.aggregate_udfs.get(name)
    }

    /// Return a mutable reference to the aggregate function corresponding to
    /// the name
    pub fn aggregate_udf_mut(&mut self, name: &str) -> Option<&mut SkydbAggregateUDF> {
        self.aggregate_udfs.get_mut(name)
    }

    /// Insert a new scalar UDF and return the UDF that had previously been
    /// added, if any
    pub fn insert_scalar_udf(&mut self, udf: SkydbScalarUDF) -> Option<SkydbScalarUDF> {
        self.scalar_udfs.insert(udf.name().to_string(), udf)
    }

    /// Insert a new aggregate UDF and return the UDF that had previously been
    /// added, if any
    pub fn insert_aggregate_udf(&mut self, udf: SkydbAggregateUDF) -> Option<SkydbAggregateUDF> {
        self.aggregate_udfs.insert(udf.name().to_string(), udf)
    }

    /// Consume another function set and merge its contents into this one
    pub fn merge(&mut self, other: FunctionSet) {
        for (k, v) in other.scalar_udfs.into_iter() {
            self.scalar_udfs.insert(k, v);
        }
        for (k, v) in other.aggregate_udfs.into_iter() {
            self.aggregate_udfs.insert(k, v);
        }
    }

    /// Add a kernel to a scalar function in this set
    ///
    /// This errors if a function of that name does not exist in this set. A
    /// reference to the matching function is returned.
    pub fn add_scalar_udf_kernel(
        &mut self,
        name: &str,
        kernel: ScalarKernelRef,
    ) -> Result<&SkydbScalarUDF> {
        if let Some(function) = self.scalar_udf_mut(name) {
            function.add_kernel(kernel);
            Ok(self.scalar_udf(name).unwrap())
        } else {
            internal_err!("Can't register kernel for scalar function '{}'", name)
        }
    }

    /// Add a kernel to an aggregate function in this set
    pub fn add_aggregate_udf_kernel(
        &mut self,
        name: &str,
        kernel: SkydbAccumulatorRef,
    ) -> Result<&SkydbAggregateUDF> {
        if let Some(function) = self.aggregate_udf_mut(name) {
            function.add_kernel(kernel);
            Ok(self.aggregate_udf(name).unwrap())
        } else {
            internal_err!("Can't register kernel for aggregate function '{}'", name)
        }
    }
}

impl Default for FunctionSet {
    fn default() -> Self {
        Self::new()
    }
}
