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

//! Built-in scalar functions
//!
//! Arity is checked against each function's [`FunctionSignature`]. Text
//! functions read any scalar through its display form; a null argument
//! comes back as a null of the function's result type.

use super::{FunctionInfo, FunctionSignature, ScalarFunction};
use crate::core::{DataType, Error, Result, Value};

const LENGTH: FunctionSignature = FunctionSignature::new(Some(DataType::Integer), 1, 1);
const CASE_MAP: FunctionSignature = FunctionSignature::new(Some(DataType::Text), 1, 1);
const ABS: FunctionSignature = FunctionSignature::new(None, 1, 1);
const CONCAT: FunctionSignature = FunctionSignature::variadic(Some(DataType::Text));
const COALESCE: FunctionSignature = FunctionSignature::variadic(None);

fn arguments<'a>(
    name: &str,
    signature: &FunctionSignature,
    args: &'a [Value],
) -> Result<&'a [Value]> {
    signature
        .validate_arg_count(args.len())
        .map_err(|e| Error::invalid_argument(format!("{}(): {}", name.to_lowercase(), e)))?;
    Ok(args)
}

fn single<'a>(name: &str, signature: &FunctionSignature, args: &'a [Value]) -> Result<&'a Value> {
    Ok(&arguments(name, signature, args)?[0])
}

/// Apply `f` to the text form of `value`, or pass a typed null through
fn with_text(value: &Value, result_type: DataType, f: impl FnOnce(&str) -> Value) -> Value {
    match value {
        Value::Null(_) => Value::null(result_type),
        Value::Text(text) => f(text.as_ref()),
        other => f(&other.to_string()),
    }
}

/// `length(text)`: character count
#[derive(Default)]
pub struct LengthFunction;

impl ScalarFunction for LengthFunction {
    fn name(&self) -> &str {
        "LENGTH"
    }

    fn info(&self) -> FunctionInfo {
        FunctionInfo::new("LENGTH", "character count of a text value", LENGTH)
    }

    fn evaluate(&self, args: &[Value]) -> Result<Value> {
        let value = single(self.name(), &LENGTH, args)?;
        Ok(with_text(value, DataType::Integer, |text| {
            Value::Integer(text.chars().count() as i64)
        }))
    }
}

/// `lower(text)`
#[derive(Default)]
pub struct LowerFunction;

impl ScalarFunction for LowerFunction {
    fn name(&self) -> &str {
        "LOWER"
    }

    fn info(&self) -> FunctionInfo {
        FunctionInfo::new("LOWER", "text folded to lower case", CASE_MAP)
    }

    fn evaluate(&self, args: &[Value]) -> Result<Value> {
        let value = single(self.name(), &CASE_MAP, args)?;
        Ok(with_text(value, DataType::Text, |text| {
            Value::text(text.to_lowercase())
        }))
    }
}

/// `upper(text)`
#[derive(Default)]
pub struct UpperFunction;

impl ScalarFunction for UpperFunction {
    fn name(&self) -> &str {
        "UPPER"
    }

    fn info(&self) -> FunctionInfo {
        FunctionInfo::new("UPPER", "text folded to upper case", CASE_MAP)
    }

    fn evaluate(&self, args: &[Value]) -> Result<Value> {
        let value = single(self.name(), &CASE_MAP, args)?;
        Ok(with_text(value, DataType::Text, |text| {
            Value::text(text.to_uppercase())
        }))
    }
}

/// `abs(number)`; the result keeps the argument's numeric type
#[derive(Default)]
pub struct AbsFunction;

impl ScalarFunction for AbsFunction {
    fn name(&self) -> &str {
        "ABS"
    }

    fn info(&self) -> FunctionInfo {
        FunctionInfo::new("ABS", "magnitude of an integer or float", ABS)
    }

    fn evaluate(&self, args: &[Value]) -> Result<Value> {
        let value = single(self.name(), &ABS, args)?;
        match value {
            Value::Null(data_type) => Ok(Value::Null(*data_type)),
            Value::Integer(i) => i
                .checked_abs()
                .map(Value::Integer)
                .ok_or_else(|| {
                    Error::invalid_argument(format!("abs(): {} has no magnitude in range", i))
                }),
            Value::Float(f) => Ok(Value::Float(f.abs())),
            other => Err(Error::type_error(format!(
                "abs(): {} is not a number",
                other.data_type()
            ))),
        }
    }
}

/// `concat(value, ...)`: text forms joined; nulls contribute nothing
#[derive(Default)]
pub struct ConcatFunction;

impl ScalarFunction for ConcatFunction {
    fn name(&self) -> &str {
        "CONCAT"
    }

    fn info(&self) -> FunctionInfo {
        FunctionInfo::new("CONCAT", "text forms of all arguments, joined", CONCAT)
    }

    fn evaluate(&self, args: &[Value]) -> Result<Value> {
        let mut joined = String::new();
        for value in arguments(self.name(), &CONCAT, args)? {
            match value {
                Value::Null(_) => {}
                Value::Text(text) => joined.push_str(text),
                other => joined.push_str(&other.to_string()),
            }
        }
        Ok(Value::text(joined))
    }
}

/// `coalesce(value, ...)`: the first argument that is not null
#[derive(Default)]
pub struct CoalesceFunction;

impl ScalarFunction for CoalesceFunction {
    fn name(&self) -> &str {
        "COALESCE"
    }

    fn info(&self) -> FunctionInfo {
        FunctionInfo::new("COALESCE", "first non-null argument", COALESCE)
    }

    fn evaluate(&self, args: &[Value]) -> Result<Value> {
        let args = arguments(self.name(), &COALESCE, args)?;
        // All null: the last argument's null keeps its type
        Ok(args
            .iter()
            .find(|value| !value.is_null())
            .or_else(|| args.last())
            .cloned()
            .unwrap_or_else(Value::null_unknown))
    }
}
