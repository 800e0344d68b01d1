// Copyright 2025 Querex Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Scalar function system
//!
//! Functions are pushed onto the VM stack as objects and invoked by the
//! `Call` operator, or called by name from the script grammar.
//!
//! - [`ScalarFunction`] - The function trait
//! - [`FunctionRegistry`] - Name lookup for built-in and user functions

pub mod builtin;
pub mod registry;

use crate::core::{DataType, Error, Result, Value};

/// Function signature information
#[derive(Debug, Clone)]
pub struct FunctionSignature {
    /// Return type, `None` when it depends on the arguments
    pub return_type: Option<DataType>,
    /// Minimum number of arguments
    pub min_args: usize,
    /// Maximum number of arguments
    pub max_args: usize,
}

impl FunctionSignature {
    /// Create a new function signature
    pub const fn new(return_type: Option<DataType>, min_args: usize, max_args: usize) -> Self {
        Self {
            return_type,
            min_args,
            max_args,
        }
    }

    /// Create a variadic function signature taking at least one argument
    pub const fn variadic(return_type: Option<DataType>) -> Self {
        Self::new(return_type, 1, usize::MAX)
    }

    pub fn is_variadic(&self) -> bool {
        self.max_args == usize::MAX
    }

    /// Validate argument count
    pub fn validate_arg_count(&self, count: usize) -> Result<()> {
        if count < self.min_args {
            return Err(Error::invalid_argument(format!(
                "expected at least {} arguments, got {}",
                self.min_args, count
            )));
        }
        if count > self.max_args {
            return Err(Error::invalid_argument(format!(
                "expected at most {} arguments, got {}",
                self.max_args, count
            )));
        }
        Ok(())
    }
}

/// Function information
#[derive(Debug, Clone)]
pub struct FunctionInfo {
    /// Function name
    pub name: String,
    /// Description
    pub description: String,
    /// Signature
    pub signature: FunctionSignature,
}

impl FunctionInfo {
    /// Create a new function info
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        signature: FunctionSignature,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            signature,
        }
    }
}

/// Trait for scalar functions
pub trait ScalarFunction: Send + Sync {
    /// Get the function name
    fn name(&self) -> &str;

    /// Get function information
    fn info(&self) -> FunctionInfo;

    /// Evaluate the function with the given arguments
    fn evaluate(&self, args: &[Value]) -> Result<Value>;

    /// Whether calls with constant arguments may be folded at compile time
    fn is_deterministic(&self) -> bool {
        true
    }
}

impl std::fmt::Debug for dyn ScalarFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ScalarFunction({})", self.name())
    }
}

pub use builtin::{
    AbsFunction, CoalesceFunction, ConcatFunction, LengthFunction, LowerFunction, UpperFunction,
};
pub use registry::FunctionRegistry;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_signature_validation() {
        let sig = FunctionSignature::new(Some(DataType::Integer), 1, 1);
        assert!(sig.validate_arg_count(1).is_ok());
        assert!(sig.validate_arg_count(0).is_err());
        assert!(sig.validate_arg_count(2).is_err());
    }

    #[test]
    fn test_variadic_signature() {
        let sig = FunctionSignature::variadic(None);
        assert!(sig.is_variadic());
        assert!(sig.validate_arg_count(1).is_ok());
        assert!(sig.validate_arg_count(10).is_ok());
        assert!(sig.validate_arg_count(0).is_err());
    }
}
