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

//! Function Registry
//!
//! Name lookup for scalar functions. Names are case-insensitive and stored
//! upper-case.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use super::builtin::{
    AbsFunction, CoalesceFunction, ConcatFunction, LengthFunction, LowerFunction, UpperFunction,
};
use super::{FunctionInfo, ScalarFunction};

/// Function registry for scalar functions
#[derive(Clone)]
pub struct FunctionRegistry {
    functions: FxHashMap<String, Arc<dyn ScalarFunction>>,
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FunctionRegistry {
    /// Create a new function registry with all built-in functions registered
    pub fn new() -> Self {
        let mut registry = Self::empty();

        registry.register(LengthFunction);
        registry.register(LowerFunction);
        registry.register(UpperFunction);
        registry.register(AbsFunction);
        registry.register(ConcatFunction);
        registry.register(CoalesceFunction);

        registry
    }

    /// Create a registry without any functions
    pub fn empty() -> Self {
        Self {
            functions: FxHashMap::default(),
        }
    }

    /// Register a function, replacing any function with the same name
    pub fn register<F: ScalarFunction + 'static>(&mut self, function: F) {
        self.register_arc(Arc::new(function));
    }

    /// Register a shared function instance
    pub fn register_arc(&mut self, function: Arc<dyn ScalarFunction>) {
        let name = function.name().to_uppercase();
        self.functions.insert(name, function);
    }

    /// Look up a function by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn ScalarFunction>> {
        // Fast path - name is already upper-case
        if let Some(f) = self.functions.get(name) {
            return Some(Arc::clone(f));
        }
        self.functions.get(&name.to_uppercase()).map(Arc::clone)
    }

    /// Check if a function exists
    pub fn exists(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Get function info by name
    pub fn get_info(&self, name: &str) -> Option<FunctionInfo> {
        self.get(name).map(|f| f.info())
    }

    /// List all function names, sorted
    pub fn list_all(&self) -> Vec<String> {
        let mut names: Vec<String> = self.functions.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Result, Value};
    use crate::functions::FunctionSignature;

    struct TwiceFunction;

    impl ScalarFunction for TwiceFunction {
        fn name(&self) -> &str {
            "twice"
        }

        fn info(&self) -> FunctionInfo {
            FunctionInfo::new("twice", "doubles", FunctionSignature::new(None, 1, 1))
        }

        fn evaluate(&self, args: &[Value]) -> Result<Value> {
            Ok(Value::Integer(args[0].as_int64().unwrap_or(0) * 2))
        }
    }

    #[test]
    fn test_registry_case_insensitive() {
        let registry = FunctionRegistry::new();
        assert!(registry.exists("upper"));
        assert!(registry.exists("UPPER"));
        assert!(registry.exists("Upper"));
        assert!(!registry.exists("nonexistent"));
    }

    #[test]
    fn test_get_function() {
        let registry = FunctionRegistry::new();
        let upper = registry.get("UPPER").unwrap();
        assert_eq!(upper.name(), "UPPER");
        assert_eq!(registry.get_info("length").unwrap().name, "LENGTH");
    }

    #[test]
    fn test_register_user_function() {
        let mut registry = FunctionRegistry::empty();
        assert!(registry.list_all().is_empty());
        registry.register(TwiceFunction);
        let f = registry.get("TWICE").unwrap();
        assert_eq!(f.evaluate(&[Value::integer(4)]).unwrap(), Value::Integer(8));
    }

    #[test]
    fn test_builtins_registered() {
        let names = FunctionRegistry::new().list_all();
        assert_eq!(
            names,
            vec!["ABS", "COALESCE", "CONCAT", "LENGTH", "LOWER", "UPPER"]
        );
    }
}
