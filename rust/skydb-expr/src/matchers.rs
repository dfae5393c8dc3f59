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
use std::{fmt::Debug, sync::Arc};

use arrow_schema::DataType;
use datafusion_common::Result;

/// Helper to match arguments and compute return types
#[derive(Debug)]
pub struct ArgMatcher {
    matchers: Vec<Arc<dyn TypeMatcher + Send + Sync>>,
    out_type: DataType,
}

impl ArgMatcher {
    /// Create a new ArgMatcher
    pub fn new(matchers: Vec<Arc<dyn TypeMatcher + Send + Sync>>, out_type: DataType) -> Self {
        Self { matchers, out_type }
    }

    /// Calculate a return type given input types
    ///
    /// Returns `Some(out_type)` if this kernel applies to the input types or
    /// `None` otherwise.
    pub fn match_args(&self, args: &[DataType]) -> Result<Option<DataType>> {
        if self.matches(args) {
            Ok(Some(self.out_type.clone()))
        } else {
            Ok(None)
        }
    }

    /// Check for an input type match
    ///
    /// Returns true if args applies to the input types. An untyped null
    /// literal matches any matcher.
    pub fn matches(&self, args: &[DataType]) -> bool {
        if args.len() > self.matchers.len() {
            return false;
        }

        let matcher_iter = self.matchers.iter();
        let mut arg_iter = args.iter().peekable();

        for matcher in matcher_iter {
            if let Some(arg) = arg_iter.peek() {
                if *arg == &DataType::Null || matcher.match_type(arg) {
                    arg_iter.next(); // Consume the argument
                    continue; // Move to the next matcher
                } else if matcher.is_optional() {
                    continue; // Skip the optional matcher
                } else {
                    return false; // Non-optional matcher failed
                }
            } else if matcher.is_optional() {
                continue; // Skip remaining optional matchers
            } else {
                return false; // Non-optional matcher failed with no arguments left
            }
        }

        // Ensure all arguments are consumed
        arg_iter.next().is_none()
    }

    /// Matches any argument
    pub fn is_any() -> Arc<dyn TypeMatcher + Send + Sync> {
        Arc::new(IsAny {})
    }

    /// Matches the given Arrow type using PartialEq
    pub fn is_arrow(data_type: DataType) -> Arc<dyn TypeMatcher + Send + Sync> {
        Arc::new(IsExact {
            exact_type: data_type,
        })
    }

    /// Matches any numeric argument
    pub fn is_numeric() -> Arc<dyn TypeMatcher + Send + Sync> {
        Arc::new(IsNumeric {})
    }

    /// Matches any integer argument
    pub fn is_integer() -> Arc<dyn TypeMatcher + Send + Sync> {
        Arc::new(IsInteger {})
    }

    /// Matches any binary argument
    pub fn is_binary() -> Arc<dyn TypeMatcher + Send + Sync> {
        Arc::new(IsBinary {})
    }

    /// Matches any string argument
    pub fn is_string() -> Arc<dyn TypeMatcher + Send + Sync> {
        Arc::new(IsString {})
    }

    /// Matches any boolean argument
    pub fn is_boolean() -> Arc<dyn TypeMatcher + Send + Sync> {
        Arc::new(IsExact {
            exact_type: DataType::Boolean,
        })
    }

    /// Marks a matcher as optional: trailing arguments matched by it may be
    /// omitted
    pub fn optional(
        matcher: Arc<dyn TypeMatcher + Send + Sync>,
    ) -> Arc<dyn TypeMatcher + Send + Sync> {
        Arc::new(IsOptional { matcher })
    }
}

/// Type matcher for a single argument
pub trait TypeMatcher: Debug {
    /// Returns true if this matcher applies to the given type
    fn match_type(&self, arg: &DataType) -> bool;

    /// Returns true if this argument may be omitted
    fn is_optional(&self) -> bool {
        false
    }
}

#[derive(Debug)]
struct IsAny {}

impl TypeMatcher for IsAny {
    fn match_type(&self, _arg: &DataType) -> bool {
        true
    }
}

#[derive(Debug)]
struct IsExact {
    exact_type: DataType,
}

impl TypeMatcher for IsExact {
    fn match_type(&self, arg: &DataType) -> bool {
        *arg == self.exact_type
    }
}

#[derive(Debug)]
struct IsNumeric {}

impl TypeMatcher for IsNumeric {
    fn match_type(&self, arg: &DataType) -> bool {
        arg.is_numeric()
    }
}

#[derive(Debug)]
struct IsInteger {}

impl TypeMatcher for IsInteger {
    fn match_type(&self, arg: &DataType) -> bool {
        arg.is_integer()
    }
}

#[derive(Debug)]
struct IsBinary {}

impl TypeMatcher for IsBinary {
    fn match_type(&self, arg: &DataType) -> bool {
        matches!(
            arg,
            DataType::Binary
                | DataType::LargeBinary
                | DataType::BinaryView
                | DataType::FixedSizeBinary(_)
        )
    }
}

#[derive(Debug)]
struct IsString {}

impl TypeMatcher for IsString {
    fn match_type(&self, arg: &DataType) -> bool {
        matches!(
            arg,
            DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View
        )
    }
}

#[derive(Debug)]
struct IsOptional {
    matcher: Arc<dyn TypeMatcher + Send + Sync>,
}

impl TypeMatcher for IsOptional {
    fn match_type(&self, arg: &DataType) -> bool {
        self.matcher.match_type(arg)
    }

    fn is_optional(&self) -> bool {
        true
    }
}
