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

// Expression Virtual Machine
//
// The VM executes compiled Programs against a store and a set of variable
// bindings. Every operand is evaluated: logical operators do not
// short-circuit.
// - Reusable across records (stack is cleared per execution)
// - No recursion

use std::cmp::Ordering;
use std::sync::Arc;

use regex::Regex;
use smallvec::SmallVec;

use super::ops::{Needle, Op};
use super::program::Program;
use super::variable::VariableTable;
use crate::core::{DataType, Error, ErrorKind, Result, Value};
use crate::storage::{ColumnRef, Context};

/// Stack capacity for inline storage (avoids heap allocation for simple expressions)
const STACK_INLINE_CAPACITY: usize = 16;

/// Capacity for reusable args buffer (most functions have <= 4 args)
const ARGS_BUFFER_CAPACITY: usize = 8;

/// Arithmetic operation type
#[derive(Clone, Copy)]
enum ArithmeticOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

/// Execution context for the VM
pub struct ExecuteContext<'a> {
    /// Store that column reads and run-time lookups go through
    pub store: &'a dyn Context,

    /// Variable bindings for this execution
    pub variables: Option<&'a VariableTable>,
}

impl<'a> ExecuteContext<'a> {
    /// Create a context without variables
    #[inline]
    pub fn new(store: &'a dyn Context) -> Self {
        Self {
            store,
            variables: None,
        }
    }

    /// Add variable bindings
    pub fn with_variables(mut self, variables: &'a VariableTable) -> Self {
        self.variables = Some(variables);
        self
    }

    #[inline]
    fn variable(&self, position: usize) -> Result<&'a Value> {
        let count = self.variables.map_or(0, |v| v.len());
        self.variables
            .and_then(|v| v.value_at(position))
            .ok_or(Error::VariableOutOfRange {
                offset: position,
                count,
            })
    }
}

/// Expression Virtual Machine
pub struct ExprVM {
    /// Evaluation stack (reused between executions)
    stack: SmallVec<[Value; STACK_INLINE_CAPACITY]>,

    /// Reusable buffer for function arguments
    args_buffer: SmallVec<[Value; ARGS_BUFFER_CAPACITY]>,

    /// The last text value read from a column during the latest execution
    last_text: Option<Arc<str>>,
}

impl ExprVM {
    pub fn new() -> Self {
        Self {
            stack: SmallVec::new(),
            args_buffer: SmallVec::new(),
            last_text: None,
        }
    }

    /// Text most recently read from a column
    pub fn last_text(&self) -> Option<&Arc<str>> {
        self.last_text.as_ref()
    }

    /// Forget state left over from earlier executions
    pub fn clear(&mut self) {
        self.stack.clear();
        self.args_buffer.clear();
        self.last_text = None;
    }

    /// Execute a program and return the result
    pub fn execute(&mut self, program: &Program, ctx: &ExecuteContext) -> Result<Value> {
        if self.stack.capacity() < program.max_stack_depth() {
            self.stack
                .reserve(program.max_stack_depth() - self.stack.capacity());
        }
        self.stack.clear();
        self.last_text = None;

        for op in program.ops() {
            match op {
                // =============================================================
                // LOAD OPERATIONS
                // =============================================================
                Op::LoadConst(value) => self.stack.push(value.clone()),

                Op::LoadVariable(position) => {
                    let value = ctx.variable(*position as usize)?.clone();
                    self.stack.push(value);
                }

                Op::LoadVariableColumn(position, column) => {
                    let record = ctx.variable(*position as usize)?;
                    let value = self.read_column(ctx, record, column)?;
                    self.stack.push(value);
                }

                Op::GetColumn(column) => {
                    let record = self.pop()?;
                    let value = self.read_column(ctx, &record, column)?;
                    self.stack.push(value);
                }

                Op::GetValue => {
                    let name = self.pop()?;
                    let record = self.pop()?;
                    let value = self.get_value_dynamic(ctx, &record, &name)?;
                    self.stack.push(value);
                }

                Op::Pop => {
                    self.pop()?;
                }

                Op::Call { function, argc } => {
                    let argc = *argc as usize;
                    if self.stack.len() < argc {
                        return Err(Error::expression_evaluation(format!(
                            "{} expects {} argument(s) on the stack",
                            function.name(),
                            argc
                        )));
                    }
                    self.args_buffer.clear();
                    let start = self.stack.len() - argc;
                    self.args_buffer.extend(self.stack.drain(start..));
                    let result = function.evaluate(&self.args_buffer)?;
                    self.stack.push(result);
                }

                // =============================================================
                // LOGICAL OPERATIONS
                // =============================================================
                Op::And(n) => {
                    let start = self.split_point(*n as usize)?;
                    let result = self.stack[start..].iter().all(Value::is_truthy);
                    self.stack.truncate(start);
                    self.stack.push(Value::Boolean(result));
                }

                Op::Or(n) => {
                    let start = self.split_point(*n as usize)?;
                    let result = self.stack[start..].iter().any(Value::is_truthy);
                    self.stack.truncate(start);
                    self.stack.push(Value::Boolean(result));
                }

                Op::AndNot(n) => {
                    let start = self.split_point(*n as usize)?;
                    let operands = &self.stack[start..];
                    let result =
                        operands[0].is_truthy() && !operands[1..].iter().any(Value::is_truthy);
                    self.stack.truncate(start);
                    self.stack.push(Value::Boolean(result));
                }

                Op::Not => {
                    let value = self.pop()?;
                    self.stack.push(Value::Boolean(!value.is_truthy()));
                }

                // =============================================================
                // TEXT SEARCH
                // =============================================================
                Op::Match => {
                    let keyword = self.pop()?;
                    let text = self.pop()?;
                    let result = Self::text_op(&text, &keyword, |t, k| {
                        Needle::new(k).is_found_in(t)
                    });
                    self.stack.push(result);
                }

                Op::MatchConst(needle) => {
                    let text = self.pop()?;
                    let result = match Self::as_search_text(&text) {
                        Some(t) => Value::Boolean(needle.is_found_in(&t)),
                        None => Value::Null(DataType::Boolean),
                    };
                    self.stack.push(result);
                }

                Op::Prefix => {
                    let keyword = self.pop()?;
                    let text = self.pop()?;
                    let result = Self::text_op(&text, &keyword, |t, k| t.starts_with(k));
                    self.stack.push(result);
                }

                Op::Suffix => {
                    let keyword = self.pop()?;
                    let text = self.pop()?;
                    let result = Self::text_op(&text, &keyword, |t, k| t.ends_with(k));
                    self.stack.push(result);
                }

                Op::Regexp => {
                    let pattern = self.pop()?;
                    let text = self.pop()?;
                    let result = match (Self::as_search_text(&text), pattern.as_str()) {
                        (Some(t), Some(p)) => {
                            let re = Regex::new(p).map_err(|e| {
                                Error::type_error(format!("invalid regular expression: {}", e))
                            })?;
                            Value::Boolean(re.is_match(&t))
                        }
                        _ => Value::Null(DataType::Boolean),
                    };
                    self.stack.push(result);
                }

                Op::RegexpConst(re) => {
                    let text = self.pop()?;
                    let result = match Self::as_search_text(&text) {
                        Some(t) => Value::Boolean(re.is_match(&t)),
                        None => Value::Null(DataType::Boolean),
                    };
                    self.stack.push(result);
                }

                // =============================================================
                // COMPARISON
                // =============================================================
                Op::Eq => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    self.stack.push(Self::equality(&a, &b, true));
                }

                Op::Ne => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    self.stack.push(Self::equality(&a, &b, false));
                }

                Op::Lt => self.compare_top(|o| o == Ordering::Less)?,
                Op::Gt => self.compare_top(|o| o == Ordering::Greater)?,
                Op::Le => self.compare_top(|o| o != Ordering::Greater)?,
                Op::Ge => self.compare_top(|o| o != Ordering::Less)?,

                // =============================================================
                // ARITHMETIC
                // =============================================================
                Op::Add => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    let result = match (&a, &b) {
                        (Value::Text(x), Value::Text(y)) => {
                            let mut joined = String::with_capacity(x.len() + y.len());
                            joined.push_str(x);
                            joined.push_str(y);
                            Value::text(joined)
                        }
                        _ => Self::arithmetic_op(&a, &b, ArithmeticOp::Add, |x, y| x + y)?,
                    };
                    self.stack.push(result);
                }

                Op::Sub => self.arithmetic_top(ArithmeticOp::Sub, |x, y| x - y)?,
                Op::Mul => self.arithmetic_top(ArithmeticOp::Mul, |x, y| x * y)?,
                Op::Div => self.arithmetic_top(ArithmeticOp::Div, |x, y| x / y)?,
                Op::Mod => self.arithmetic_top(ArithmeticOp::Mod, |x, y| x % y)?,

                Op::Negate => {
                    let value = self.pop()?;
                    let result = match value {
                        Value::Integer(i) => Value::Integer(i.checked_neg().ok_or_else(|| {
                            Error::type_error(format!("integer overflow negating {}", i))
                        })?),
                        Value::Float(f) => Value::Float(-f),
                        Value::Null(dt) => Value::Null(dt),
                        other => {
                            return Err(Error::type_error(format!(
                                "cannot negate {}",
                                other.data_type()
                            )))
                        }
                    };
                    self.stack.push(result);
                }
            }
        }

        Ok(self.stack.pop().unwrap_or_else(Value::null_unknown))
    }

    // =========================================================================
    // HELPER METHODS
    // =========================================================================

    #[inline]
    fn pop(&mut self) -> Result<Value> {
        self.stack
            .pop()
            .ok_or_else(|| Error::expression_evaluation("stack underflow"))
    }

    /// Index where the top `n` operands start
    #[inline]
    fn split_point(&self, n: usize) -> Result<usize> {
        if n == 0 || self.stack.len() < n {
            return Err(Error::expression_evaluation("stack underflow"));
        }
        Ok(self.stack.len() - n)
    }

    /// Read a column of a record value, remembering text for snippets
    fn read_column(
        &mut self,
        ctx: &ExecuteContext,
        record: &Value,
        column: &ColumnRef,
    ) -> Result<Value> {
        let record = match record {
            Value::Record(r) => *r,
            Value::Null(_) => return Ok(Self::null_of(column)),
            other => {
                return Err(Error::type_error(format!(
                    "cannot read {} from {}",
                    column.name,
                    other.data_type()
                )))
            }
        };
        if record.is_nil() {
            return Ok(Self::null_of(column));
        }
        if record.table != column.table {
            return Err(Error::type_error(format!(
                "column {} does not belong to table {}",
                column.name, record.table
            )));
        }

        let value = ctx
            .store
            .get_value(record, column.id)
            .map_err(|status| Error::from_status(status, ErrorKind::Runtime))?;
        if let Value::Text(text) = &value {
            self.last_text = Some(Arc::clone(text));
        }
        Ok(value)
    }

    fn get_value_dynamic(
        &mut self,
        ctx: &ExecuteContext,
        record: &Value,
        name: &Value,
    ) -> Result<Value> {
        let name = name.as_str().ok_or_else(|| {
            Error::type_error(format!("column name must be text, got {}", name.data_type()))
        })?;
        let table = match record {
            Value::Record(r) => r.table,
            Value::Null(_) => return Ok(Value::null_unknown()),
            other => {
                return Err(Error::type_error(format!(
                    "cannot read {} from {}",
                    name,
                    other.data_type()
                )))
            }
        };
        let column = ctx
            .store
            .column(table, name)
            .map_err(|status| Error::from_status(status, ErrorKind::Runtime))?;
        self.read_column(ctx, record, &column)
    }

    fn null_of(column: &ColumnRef) -> Value {
        Value::Null(column.range.data_type().unwrap_or(DataType::Null))
    }

    /// Text view of a searchable operand; numbers are searched by their
    /// display form
    #[inline]
    fn as_search_text(value: &Value) -> Option<std::borrow::Cow<'_, str>> {
        match value {
            Value::Text(s) => Some(std::borrow::Cow::Borrowed(s)),
            Value::Integer(_) | Value::Float(_) | Value::Boolean(_) => {
                Some(std::borrow::Cow::Owned(value.to_string()))
            }
            _ => None,
        }
    }

    #[inline]
    fn text_op(text: &Value, keyword: &Value, f: impl Fn(&str, &str) -> bool) -> Value {
        match (Self::as_search_text(text), Self::as_search_text(keyword)) {
            (Some(t), Some(k)) => Value::Boolean(f(&t, &k)),
            _ => Value::Null(DataType::Boolean),
        }
    }

    /// Equality; NULL on either side yields NULL, unrelated types are unequal
    #[inline]
    fn equality(a: &Value, b: &Value, want_equal: bool) -> Value {
        if a.is_null() || b.is_null() {
            return Value::Null(DataType::Boolean);
        }
        let equal = a.compare(b) == Some(Ordering::Equal);
        Value::Boolean(equal == want_equal)
    }

    #[inline]
    fn compare_top(&mut self, accept: impl Fn(Ordering) -> bool) -> Result<()> {
        let b = self.pop()?;
        let a = self.pop()?;
        self.stack.push(Self::compare_values(&a, &b, accept));
        Ok(())
    }

    #[inline]
    fn compare_values(a: &Value, b: &Value, accept: impl Fn(Ordering) -> bool) -> Value {
        match a.compare(b) {
            Some(ord) => Value::Boolean(accept(ord)),
            None => Value::Null(DataType::Boolean),
        }
    }

    #[inline]
    fn arithmetic_top<FF>(&mut self, op: ArithmeticOp, float_op: FF) -> Result<()>
    where
        FF: Fn(f64, f64) -> f64,
    {
        let b = self.pop()?;
        let a = self.pop()?;
        let result = Self::arithmetic_op(&a, &b, op, float_op)?;
        self.stack.push(result);
        Ok(())
    }

    #[inline]
    fn arithmetic_op<FF>(a: &Value, b: &Value, int_op: ArithmeticOp, float_op: FF) -> Result<Value>
    where
        FF: Fn(f64, f64) -> f64,
    {
        let divides = matches!(int_op, ArithmeticOp::Div | ArithmeticOp::Mod);
        if divides && matches!(b, Value::Integer(0)) {
            return Err(Error::DivisionByZero);
        }
        if divides && matches!(b, Value::Float(y) if *y == 0.0) {
            return Err(Error::DivisionByZero);
        }

        match (a, b) {
            (Value::Integer(x), Value::Integer(y)) => {
                let result = match int_op {
                    ArithmeticOp::Add => x.checked_add(*y),
                    ArithmeticOp::Sub => x.checked_sub(*y),
                    ArithmeticOp::Mul => x.checked_mul(*y),
                    ArithmeticOp::Div => x.checked_div(*y),
                    ArithmeticOp::Mod => x.checked_rem(*y),
                };
                match result {
                    Some(r) => Ok(Value::Integer(r)),
                    None => Err(Error::Type(format!(
                        "integer overflow in arithmetic operation: {} and {}",
                        x, y
                    ))),
                }
            }
            (Value::Float(x), Value::Float(y)) => Ok(Value::Float(float_op(*x, *y))),
            (Value::Integer(x), Value::Float(y)) => Ok(Value::Float(float_op(*x as f64, *y))),
            (Value::Float(x), Value::Integer(y)) => Ok(Value::Float(float_op(*x, *y as f64))),
            _ if a.is_null() || b.is_null() => Ok(Value::Null(DataType::Float)),
            _ => Err(Error::type_error(format!(
                "unsupported operand types {} and {}",
                a.data_type(),
                b.data_type()
            ))),
        }
    }
}

impl Default for ExprVM {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Domain;
    use crate::functions::builtin::UpperFunction;
    use crate::storage::MemoryStore;

    fn run(ops: Vec<Op>) -> Result<Value> {
        let store = MemoryStore::new();
        let mut vm = ExprVM::new();
        vm.execute(&Program::new(ops), &ExecuteContext::new(&store))
    }

    #[test]
    fn test_arithmetic() {
        let result = run(vec![
            Op::LoadConst(Value::integer(7)),
            Op::LoadConst(Value::integer(3)),
            Op::Mod,
        ]);
        assert_eq!(result.unwrap(), Value::Integer(1));

        let result = run(vec![
            Op::LoadConst(Value::integer(1)),
            Op::LoadConst(Value::float(0.5)),
            Op::Add,
        ]);
        assert_eq!(result.unwrap(), Value::Float(1.5));
    }

    #[test]
    fn test_division_by_zero() {
        let result = run(vec![
            Op::LoadConst(Value::integer(1)),
            Op::LoadConst(Value::integer(0)),
            Op::Div,
        ]);
        assert_eq!(result.unwrap_err(), Error::DivisionByZero);
    }

    #[test]
    fn test_integer_overflow() {
        let result = run(vec![
            Op::LoadConst(Value::integer(i64::MAX)),
            Op::LoadConst(Value::integer(1)),
            Op::Add,
        ]);
        assert!(matches!(result, Err(Error::Type(_))));
    }

    #[test]
    fn test_text_concat() {
        let result = run(vec![
            Op::LoadConst(Value::text("full ")),
            Op::LoadConst(Value::text("text")),
            Op::Add,
        ]);
        assert_eq!(result.unwrap(), Value::text("full text"));
    }

    #[test]
    fn test_logic_without_short_circuit() {
        let result = run(vec![
            Op::LoadConst(Value::boolean(false)),
            Op::LoadConst(Value::integer(1)),
            Op::LoadConst(Value::integer(0)),
            Op::Div,
            Op::And(2),
        ]);
        // The division still runs even though the first operand is false
        assert_eq!(result.unwrap_err(), Error::DivisionByZero);
    }

    #[test]
    fn test_and_not() {
        let result = run(vec![
            Op::LoadConst(Value::boolean(true)),
            Op::LoadConst(Value::boolean(false)),
            Op::LoadConst(Value::boolean(false)),
            Op::AndNot(3),
        ]);
        assert_eq!(result.unwrap(), Value::Boolean(true));

        let result = run(vec![
            Op::LoadConst(Value::boolean(true)),
            Op::LoadConst(Value::text("x")),
            Op::AndNot(2),
        ]);
        assert_eq!(result.unwrap(), Value::Boolean(false));
    }

    #[test]
    fn test_null_comparison() {
        let result = run(vec![
            Op::LoadConst(Value::null(DataType::Integer)),
            Op::LoadConst(Value::integer(5)),
            Op::Gt,
        ]);
        assert_eq!(result.unwrap(), Value::Null(DataType::Boolean));

        let result = run(vec![
            Op::LoadConst(Value::null(DataType::Integer)),
            Op::LoadConst(Value::integer(5)),
            Op::Eq,
        ]);
        assert!(result.unwrap().is_null());
    }

    #[test]
    fn test_text_search_ops() {
        let result = run(vec![
            Op::LoadConst(Value::text("Full Text Search")),
            Op::LoadConst(Value::text("text")),
            Op::Match,
        ]);
        assert_eq!(result.unwrap(), Value::Boolean(true));

        let result = run(vec![
            Op::LoadConst(Value::text("groonga")),
            Op::LoadConst(Value::text("Gro")),
            Op::Prefix,
        ]);
        assert_eq!(result.unwrap(), Value::Boolean(false));

        let result = run(vec![
            Op::LoadConst(Value::text("groonga")),
            Op::LoadConst(Value::text("nga")),
            Op::Suffix,
        ]);
        assert_eq!(result.unwrap(), Value::Boolean(true));

        let result = run(vec![
            Op::LoadConst(Value::text("groonga 14")),
            Op::LoadConst(Value::text(r"\d+$")),
            Op::Regexp,
        ]);
        assert_eq!(result.unwrap(), Value::Boolean(true));
    }

    #[test]
    fn test_call_function() {
        let result = run(vec![
            Op::LoadConst(Value::text("abc")),
            Op::Call {
                function: Arc::new(UpperFunction),
                argc: 1,
            },
        ]);
        assert_eq!(result.unwrap(), Value::text("ABC"));
    }

    #[test]
    fn test_column_reads_and_last_text() {
        let mut store = MemoryStore::new();
        let docs = store.create_table("Docs", None).unwrap();
        store
            .add_column(docs, "body", Domain::Scalar(DataType::Text))
            .unwrap();
        let record = store
            .insert(docs, None, &[("body", Value::text("full text search engine"))])
            .unwrap();
        let body = store.column(docs, "body").unwrap();

        let mut variables = VariableTable::new();
        variables.define(Some("record"), Domain::Table(docs));
        variables.bind(0, Value::Record(record)).unwrap();

        let program = Program::new(vec![
            Op::LoadVariable(0),
            Op::GetColumn(body),
            Op::LoadConst(Value::text("SEARCH")),
            Op::Match,
        ]);
        let mut vm = ExprVM::new();
        let ctx = ExecuteContext::new(&store).with_variables(&variables);
        assert_eq!(vm.execute(&program, &ctx).unwrap(), Value::Boolean(true));
        assert_eq!(
            vm.last_text().map(|t| t.as_ref()),
            Some("full text search engine")
        );
    }

    #[test]
    fn test_nil_record_reads_null() {
        let mut store = MemoryStore::new();
        let docs = store.create_table("Docs", None).unwrap();
        store
            .add_column(docs, "body", Domain::Scalar(DataType::Text))
            .unwrap();

        let program = Program::new(vec![
            Op::LoadConst(Value::record(docs, 0)),
            Op::LoadConst(Value::text("body")),
            Op::GetValue,
        ]);
        let mut vm = ExprVM::new();
        let result = vm.execute(&program, &ExecuteContext::new(&store)).unwrap();
        assert_eq!(result, Value::Null(DataType::Text));
    }

    #[test]
    fn test_missing_variable() {
        let err = run(vec![Op::LoadVariable(2)]).unwrap_err();
        assert!(matches!(
            err,
            Error::VariableOutOfRange {
                offset: 2,
                count: 0
            }
        ));
    }
}
