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

// Query Expressions
//
// An Expression collects operation records (appended directly or parsed
// from query text), compiles them into a stack program and evaluates that
// program once per record.
//
// Architecture:
//
//   ┌─────────────┐     ┌──────────────┐     ┌─────────────┐
//   │ Operations  │ ──► │ ExprCompiler │ ──► │   Program   │
//   │ (appended / │     │              │     │  (bytecode) │
//   │   parsed)   │     └──────────────┘     └─────────────┘
//   └─────────────┘                                 │
//                                                   ▼
//   ┌─────────────┐     ┌──────────────┐     ┌─────────────┐
//   │   Result    │ ◄── │    ExprVM    │ ◄── │  Variables  │
//   │   (Value)   │     │              │     │  + Context  │
//   └─────────────┘     └──────────────┘     └─────────────┘
//
// State machine: Building -> Compiled -> Evaluated. Appends and variable
// definitions need Building; reset() goes back to it.

pub mod builder;
mod compiler;
mod operation;
mod ops;
mod program;
mod variable;
mod vm;

pub use builder::{ColumnExpressionBuilder, Condition, RecordExpressionBuilder};
pub use compiler::{CompiledExpression, ExprCompiler};
pub use operation::{Operand, Operation};
pub use ops::{Needle, Op};
pub use program::Program;
pub use variable::{Variable, VariableHandle, VariableTable};
pub use vm::{ExecuteContext, ExprVM};


use std::fmt;
use std::sync::Arc;

use crate::core::{Domain, Error, ErrorKind, Operator, Result, Value, ValueCell};
use crate::parser::{parse_into, ParseOptions};
use crate::snippet::{Snippet, SnippetOptions, TagPair};
use crate::storage::Context;

/// Lifecycle state of an [`Expression`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpressionState {
    Building,
    Compiled,
    Evaluated,
}

impl ExpressionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpressionState::Building => "building",
            ExpressionState::Compiled => "compiled",
            ExpressionState::Evaluated => "evaluated",
        }
    }
}

impl fmt::Display for ExpressionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A variable addressed by name or by position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKey<'a> {
    Name(&'a str),
    Offset(usize),
}

impl<'a> From<&'a str> for VariableKey<'a> {
    fn from(name: &'a str) -> Self {
        VariableKey::Name(name)
    }
}

impl From<usize> for VariableKey<'_> {
    fn from(offset: usize) -> Self {
        VariableKey::Offset(offset)
    }
}

impl From<VariableHandle> for VariableKey<'_> {
    fn from(handle: VariableHandle) -> Self {
        VariableKey::Offset(handle.position())
    }
}

/// A query expression
///
/// # Example
///
/// ```
/// use querex::core::{DataType, Domain, Value};
/// use querex::expression::Expression;
/// use querex::parser::ParseOptions;
/// use querex::storage::MemoryStore;
///
/// let mut store = MemoryStore::new();
/// let docs = store.create_table("Docs", None).unwrap();
/// store.add_column(docs, "body", Domain::Scalar(DataType::Text)).unwrap();
/// let doc = store.insert(docs, None, &[("body", Value::text("I love Groonga"))]).unwrap();
///
/// let mut expr = Expression::new();
/// expr.define_variable(None, Domain::Table(docs)).unwrap();
/// expr.parse("groonga OR search", &ParseOptions::default().with_default_column("body"))
///     .unwrap();
///
/// let result = expr.execute(&store, &[Value::Record(doc)]).unwrap();
/// assert_eq!(result, Value::Boolean(true));
/// ```
pub struct Expression {
    name: Option<String>,
    state: ExpressionState,
    operations: Vec<Operation>,
    variables: VariableTable,
    compiled: Option<CompiledExpression>,
    result: ValueCell,
    vm: ExprVM,
}

impl Default for Expression {
    fn default() -> Self {
        Self::new()
    }
}

impl Expression {
    pub fn new() -> Self {
        Self {
            name: None,
            state: ExpressionState::Building,
            operations: Vec::new(),
            variables: VariableTable::new(),
            compiled: None,
            result: ValueCell::new(Domain::Any),
            vm: ExprVM::new(),
        }
    }

    /// Create a named expression; the name shows up in [`describe`](Self::describe)
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::new()
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn state(&self) -> ExpressionState {
        self.state
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn variables(&self) -> &VariableTable {
        &self.variables
    }

    /// The compiled program, once compiled
    pub fn program(&self) -> Option<&Program> {
        self.compiled.as_ref().map(|c| &c.program)
    }

    /// Domain of the values the expression produces, once compiled
    pub fn range(&self) -> Option<Domain> {
        self.compiled.as_ref().map(|c| c.range)
    }

    /// Keywords of positive search conditions, once compiled
    pub fn keywords(&self) -> &[Arc<str>] {
        self.compiled
            .as_ref()
            .map_or(&[][..], |c| c.keywords.as_slice())
    }

    /// Result of the latest execution
    pub fn result(&self) -> &Value {
        self.result.value()
    }

    fn ensure_building(&self, action: &'static str) -> Result<()> {
        if self.state == ExpressionState::Building {
            Ok(())
        } else {
            Err(Error::invalid_state(action, self.state.as_str()))
        }
    }

    // =========================================================================
    // BUILDING
    // =========================================================================

    /// Define the next variable; the first one is the record variable
    pub fn define_variable(&mut self, name: Option<&str>, domain: Domain) -> Result<VariableHandle> {
        self.ensure_building("define a variable in")?;
        Ok(self.variables.define(name, domain))
    }

    /// Push an object, then apply `operator` unless it is `Push`
    pub fn append_object(
        &mut self,
        object: impl Into<Operand>,
        operator: Operator,
        arity: i32,
    ) -> Result<()> {
        self.ensure_building("append to")?;
        self.operations
            .push(Operation::new(operator, arity, Some(object.into())));
        Ok(())
    }

    /// Push an owned literal, then apply `operator` unless it is `Push`
    pub fn append_constant(
        &mut self,
        value: impl Into<Value>,
        operator: Operator,
        arity: i32,
    ) -> Result<()> {
        self.ensure_building("append to")?;
        let cell = ValueCell::any(value.into());
        self.operations
            .push(Operation::new(operator, arity, Some(Operand::Constant(cell))));
        Ok(())
    }

    /// Apply a bare operator to the top `arity` operands
    pub fn append_operation(&mut self, operator: Operator, arity: i32) -> Result<()> {
        self.ensure_building("append to")?;
        self.operations.push(Operation::apply(operator, arity));
        Ok(())
    }

    /// Parse query text and append its operations
    ///
    /// On a parse error, clauses that parsed before the failing one stay
    /// appended.
    pub fn parse(&mut self, text: &str, options: &ParseOptions) -> Result<()> {
        self.ensure_building("parse into")?;
        options.validate()?;

        let record_variable = !self.variables.is_empty();
        let before = self.operations.len();
        match parse_into(text, options, record_variable, &mut self.operations) {
            Ok(_) => Ok(()),
            Err(err) => {
                tracing::debug!(
                    kept = self.operations.len() - before,
                    "parse failed after committed clauses"
                );
                let context = format!("{} options={}", self.describe(), describe_options(options));
                Err(Error::from(err.with_context(context)))
            }
        }
    }

    // =========================================================================
    // COMPILE / EXECUTE
    // =========================================================================

    /// Compile the operations; a no-op once compiled
    pub fn compile(&mut self, ctx: &dyn Context) -> Result<()> {
        if self.state != ExpressionState::Building {
            return Ok(());
        }

        let compiled = ExprCompiler::new(ctx, &self.variables).compile(&self.operations)?;
        if let Some(status) = ctx.last_error() {
            if !status.code.is_success() {
                return Err(Error::from_status(status, ErrorKind::Compile));
            }
        }
        self.result = ctx.open_value_buffer(compiled.range);
        self.compiled = Some(compiled);
        self.state = ExpressionState::Compiled;
        Ok(())
    }

    /// Evaluate against `ctx`; `args[i]` is bound to variable `i` first
    ///
    /// Variables without an argument keep their current value.
    pub fn execute(&mut self, ctx: &dyn Context, args: &[Value]) -> Result<Value> {
        self.compile(ctx)?;

        if args.len() > self.variables.len() {
            return Err(Error::invalid_argument(format!(
                "{} argument(s) given, expression has {} variable(s)",
                args.len(),
                self.variables.len()
            )));
        }
        // Check every argument before binding any
        let bound = args
            .iter()
            .zip(self.variables.iter())
            .map(|(arg, var)| arg.clone().coerce_to_domain(var.domain()))
            .collect::<Result<Vec<Value>>>()?;
        for (position, value) in bound.into_iter().enumerate() {
            self.variables.bind(position, value)?;
        }

        let compiled = self
            .compiled
            .as_ref()
            .ok_or_else(|| Error::invalid_state("execute", self.state.as_str()))?;
        let exec_ctx = ExecuteContext::new(ctx).with_variables(&self.variables);
        let value = self.vm.execute(&compiled.program, &exec_ctx)?;

        if let Some(status) = ctx.last_error() {
            if !status.code.is_success() {
                return Err(Error::from_status(status, ErrorKind::Runtime));
            }
        }

        self.result.set(value.clone()).map_err(|e| {
            Error::type_error(format!("result does not fit {}: {}", compiled.range, e))
        })?;
        self.state = ExpressionState::Evaluated;
        tracing::trace!(result = %value, "executed expression");
        Ok(value)
    }

    /// Value bound to a variable by the latest execution
    pub fn variable_value<'k>(&self, key: impl Into<VariableKey<'k>>) -> Result<&Value> {
        let handle = match key.into() {
            VariableKey::Name(name) => self.variables.lookup(name)?,
            VariableKey::Offset(offset) => self.variables.lookup_by_position(offset)?,
        };
        Ok(self.variables.get(handle)?.value())
    }

    // =========================================================================
    // SNIPPETS
    // =========================================================================

    /// Snippets of the text most recently read from a column
    ///
    /// Empty when the latest execution read no text or nothing matches.
    pub fn snippet(&self, tags: &[TagPair], options: &SnippetOptions) -> Result<Vec<String>> {
        let snippet = self.snippet_extractor(tags, options)?;
        Ok(self
            .vm
            .last_text()
            .map(|text| snippet.execute(text))
            .unwrap_or_default())
    }

    /// A reusable extractor for this expression's keywords
    pub fn snippet_extractor(&self, tags: &[TagPair], options: &SnippetOptions) -> Result<Snippet> {
        let compiled = self
            .compiled
            .as_ref()
            .ok_or_else(|| Error::invalid_state("extract snippets from", self.state.as_str()))?;
        Snippet::new(compiled.keywords.iter(), tags.to_vec(), options.clone())
    }

    // =========================================================================
    // INTROSPECTION
    // =========================================================================

    /// `#<Expression name vars=[...] ops=[...]>`, plus the program when compiled
    pub fn describe(&self) -> String {
        let mut out = String::from("#<Expression");
        if let Some(name) = &self.name {
            out.push(' ');
            out.push_str(name);
        }

        let vars: Vec<String> = self
            .variables
            .iter()
            .map(|var| match var.name() {
                Some(name) => format!("{}:{}", name, var.domain()),
                None => format!("${}:{}", var.position(), var.domain()),
            })
            .collect();
        let ops: Vec<String> = self.operations.iter().map(|op| op.to_string()).collect();
        out.push_str(&format!(" vars=[{}] ops=[{}]>", vars.join(", "), ops.join(", ")));

        if let Some(compiled) = &self.compiled {
            out.push('\n');
            out.push_str(&compiled.program.disassemble());
        }
        out
    }

    /// Back to building, keeping operations and variables
    pub fn reset(&mut self) {
        self.state = ExpressionState::Building;
        self.compiled = None;
        self.result = ValueCell::new(Domain::Any);
        self.vm.clear();
    }
}

impl fmt::Debug for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Expression")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("operations", &self.operations.len())
            .field("variables", &self.variables.len())
            .finish()
    }
}

fn describe_options(options: &ParseOptions) -> String {
    format!(
        "{{grammar: {}, default_column: {}, default_mode: {}, default_join_operator: {}}}",
        options.grammar,
        options.default_column.as_deref().unwrap_or("(none)"),
        options.default_mode,
        options.default_join_operator
    )
}
