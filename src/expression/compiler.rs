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

// Expression Compiler
//
// Lowers an operation sequence into a Program in a single pass that
// simulates the operand stack. Each simulated slot remembers what it holds
// (a value, a column, a table, a function), its domain, whether it is a
// constant, and the index of the first op it emitted, so later operators
// can rewrite or drop the ops of their operands.
//
// Design principles:
// 1. Resolve everything at compile time (names, columns, functions, patterns)
// 2. Pre-compute constant expressions where possible
// 3. Report errors with the index of the offending operation

use std::sync::Arc;

use regex::Regex;
use smallvec::SmallVec;

use super::operation::{Operand, Operation};
use super::ops::Op;
use super::program::Program;
use super::variable::VariableTable;
use super::vm::{ExecuteContext, ExprVM};
use crate::core::{DataType, Domain, Error, Operator, Result, TableId, Value};
use crate::functions::ScalarFunction;
use crate::storage::{ColumnRef, Context, ObjectRef, TableRef};

/// Output of a successful compile
#[derive(Debug, Clone)]
pub struct CompiledExpression {
    pub program: Program,
    /// Domain of the value the program produces
    pub range: Domain,
    /// Text constants of positive search conditions, in first-use order
    pub keywords: Vec<Arc<str>>,
}

#[derive(Clone)]
enum SlotKind {
    Value,
    /// A column object; `materialized` when its value load was emitted
    Column {
        column: ColumnRef,
        materialized: bool,
    },
    Table(TableRef),
    Function(Arc<dyn ScalarFunction>),
}

#[derive(Clone)]
struct Slot {
    kind: SlotKind,
    domain: Domain,
    constant: Option<Value>,
    keywords: SmallVec<[Arc<str>; 4]>,
    /// First op emitted for this slot
    start: usize,
}

impl Slot {
    fn value(domain: Domain, start: usize) -> Self {
        Self {
            kind: SlotKind::Value,
            domain,
            constant: None,
            keywords: SmallVec::new(),
            start,
        }
    }

    fn describe(&self) -> String {
        match &self.kind {
            SlotKind::Value => "value".to_string(),
            SlotKind::Column { column, .. } => format!("column {}", column.name),
            SlotKind::Table(table) => format!("table {}", table.name),
            SlotKind::Function(function) => format!("function {}", function.name()),
        }
    }
}

/// Single-use compiler over one operation sequence
pub struct ExprCompiler<'a> {
    ctx: &'a dyn Context,
    variables: &'a VariableTable,
    ops: Vec<Op>,
    slots: Vec<Slot>,
    folder: ExprVM,
}

impl<'a> ExprCompiler<'a> {
    pub fn new(ctx: &'a dyn Context, variables: &'a VariableTable) -> Self {
        Self {
            ctx,
            variables,
            ops: Vec::with_capacity(32),
            slots: Vec::with_capacity(8),
            folder: ExprVM::new(),
        }
    }

    /// Compile the operations into a program
    pub fn compile(mut self, operations: &[Operation]) -> Result<CompiledExpression> {
        if operations.is_empty() {
            return Err(Error::EmptyExpression);
        }

        for (index, operation) in operations.iter().enumerate() {
            self.compile_operation(index, operation)?;
        }

        let last = operations.len() - 1;
        if self.slots.len() != 1 {
            return Err(Error::UnbalancedStack {
                index: last,
                depth: self.slots.len(),
            });
        }
        let slot = self.slots.remove(0);
        let slot = self.into_value(last, slot)?;

        let mut keywords: Vec<Arc<str>> = Vec::with_capacity(slot.keywords.len());
        for keyword in slot.keywords {
            if !keywords.contains(&keyword) {
                keywords.push(keyword);
            }
        }

        let program = Program::new(self.ops);
        tracing::debug!(
            operations = operations.len(),
            ops = program.len(),
            max_stack_depth = program.max_stack_depth(),
            range = %slot.domain,
            keywords = keywords.len(),
            "compiled expression"
        );

        Ok(CompiledExpression {
            program,
            range: slot.domain,
            keywords,
        })
    }

    fn compile_operation(&mut self, index: usize, operation: &Operation) -> Result<()> {
        let operator = operation.operator;
        match &operation.operand {
            Some(operand) => {
                self.push_operand(index, operand)?;
                if operator == Operator::Push {
                    if operation.arity != 1 {
                        return Err(Error::InvalidArity {
                            index,
                            operator,
                            arity: operation.arity,
                        });
                    }
                    return Ok(());
                }
            }
            None if operator == Operator::Push => {
                return Err(Error::compile(index, "PUSH requires an operand"));
            }
            None => {}
        }

        if !operator.accepts_arity(operation.arity) {
            return Err(Error::InvalidArity {
                index,
                operator,
                arity: operation.arity,
            });
        }
        self.apply(index, operator, operation.arity as usize)
    }

    // =========================================================================
    // OPERANDS
    // =========================================================================

    fn push_operand(&mut self, index: usize, operand: &Operand) -> Result<()> {
        let start = self.ops.len();
        match operand {
            Operand::Variable(position) => {
                let domain = self
                    .variables
                    .lookup_by_position(*position)
                    .and_then(|handle| self.variables.get(handle).map(|v| v.domain()))
                    .map_err(|_| {
                        Error::compile(index, format!("no variable at position {}", position))
                    })?;
                self.ops.push(Op::LoadVariable(Self::variable_index(index, *position)?));
                self.slots.push(Slot::value(domain, start));
            }
            Operand::Constant(cell) => {
                let value = cell.value().clone();
                let domain = match (cell.domain(), &value) {
                    (Domain::Any, Value::Record(record)) => Domain::Table(record.table),
                    (Domain::Any, value) => Domain::Scalar(value.data_type()),
                    (domain, _) => domain,
                };
                self.ops.push(Op::LoadConst(value.clone()));
                let mut slot = Slot::value(domain, start);
                slot.constant = Some(value);
                self.slots.push(slot);
            }
            Operand::Object(object) => self.push_object(index, object.clone())?,
            Operand::Name(name) => {
                let object = self.ctx.resolve_object(name).map_err(|status| {
                    tracing::debug!(index, name = %name, status = %status, "unresolved name");
                    Error::UnresolvedName {
                        index,
                        name: name.to_string(),
                    }
                })?;
                self.push_object(index, object)?;
            }
        }
        Ok(())
    }

    fn push_object(&mut self, index: usize, object: ObjectRef) -> Result<()> {
        let start = self.ops.len();
        let slot = match object {
            ObjectRef::Table(table) => Slot {
                domain: Domain::Table(table.id),
                kind: SlotKind::Table(table),
                constant: None,
                keywords: SmallVec::new(),
                start,
            },
            ObjectRef::Function(function) => Slot {
                domain: function
                    .info()
                    .signature
                    .return_type
                    .map_or(Domain::Any, Domain::Scalar),
                kind: SlotKind::Function(function),
                constant: None,
                keywords: SmallVec::new(),
                start,
            },
            ObjectRef::Column(column) => {
                // A bare column reads from the record variable when one exists
                let materialized = match self.variables.value_at(0) {
                    Some(_) if self.record_variable_fits(&column) => {
                        self.ops.push(Op::LoadVariable(0));
                        self.ops.push(Op::GetColumn(column.clone()));
                        true
                    }
                    _ => false,
                };
                tracing::trace!(index, column = %column.name, materialized, "column operand");
                Slot {
                    domain: column.range,
                    kind: SlotKind::Column {
                        column,
                        materialized,
                    },
                    constant: None,
                    keywords: SmallVec::new(),
                    start,
                }
            }
        };
        self.slots.push(slot);
        Ok(())
    }

    fn record_variable_fits(&self, column: &ColumnRef) -> bool {
        match self
            .variables
            .lookup_by_position(0)
            .and_then(|handle| self.variables.get(handle))
        {
            Ok(var) => match var.domain() {
                Domain::Table(table) => table == column.table,
                Domain::Any => true,
                Domain::Scalar(_) => false,
            },
            Err(_) => false,
        }
    }

    fn variable_index(index: usize, position: usize) -> Result<u16> {
        u16::try_from(position)
            .map_err(|_| Error::compile(index, format!("variable position {} too large", position)))
    }

    /// Check that a slot can be consumed as a run-time value
    fn into_value(&self, index: usize, slot: Slot) -> Result<Slot> {
        match &slot.kind {
            SlotKind::Value => Ok(slot),
            SlotKind::Column { column, materialized } => {
                if *materialized {
                    Ok(slot)
                } else {
                    Err(Error::compile(
                        index,
                        format!(
                            "column {} needs a record variable of its table at position 0",
                            column.name
                        ),
                    ))
                }
            }
            _ => Err(Error::compile(
                index,
                format!("{} cannot be used as a value", slot.describe()),
            )),
        }
    }

    // =========================================================================
    // OPERATORS
    // =========================================================================

    fn apply(&mut self, index: usize, operator: Operator, arity: usize) -> Result<()> {
        let needed = if operator == Operator::Call {
            arity + 1
        } else {
            arity
        };
        if self.slots.len() < needed {
            return Err(Error::StackUnderflow {
                index,
                operator,
                needed,
                depth: self.slots.len(),
            });
        }
        let args = self.slots.split_off(self.slots.len() - arity);

        match operator {
            Operator::Push => Err(Error::compile(index, "PUSH requires an operand")),
            Operator::Pop => self.compile_pop(index, args),
            Operator::GetValue => self.compile_get_value(index, args),
            Operator::Call => self.compile_call(index, args),
            Operator::And | Operator::Or | Operator::AndNot => {
                self.compile_logical(index, operator, args)
            }
            Operator::Not | Operator::Negate => self.compile_unary(index, operator, args),
            _ => self.compile_binary(index, operator, args),
        }
    }

    fn compile_pop(&mut self, index: usize, mut args: Vec<Slot>) -> Result<()> {
        let slot = args.remove(0);
        match slot.kind {
            SlotKind::Table(_) | SlotKind::Function(_) => Ok(()),
            SlotKind::Column {
                materialized: false,
                ..
            } => Ok(()),
            _ if slot.constant.is_some() => {
                self.ops.truncate(slot.start);
                Ok(())
            }
            _ => {
                tracing::trace!(index, "pop");
                self.ops.push(Op::Pop);
                Ok(())
            }
        }
    }

    fn compile_get_value(&mut self, index: usize, mut args: Vec<Slot>) -> Result<()> {
        let name = args.pop().ok_or_else(|| Error::compile(index, "missing column name"))?;
        let record = args.pop().ok_or_else(|| Error::compile(index, "missing record"))?;
        let record = self.into_value(index, record)?;
        let start = record.start;

        if let Some(dt) = record.domain.data_type() {
            if dt != DataType::Record && dt != DataType::Null {
                return Err(Error::compile(
                    index,
                    format!("GET_VALUE needs a record, got {}", record.domain),
                ));
            }
        }

        let column = match (&name.kind, &name.constant, record.domain) {
            (SlotKind::Column { column, .. }, _, domain) => {
                if let Domain::Table(table) = domain {
                    if table != column.table {
                        return Err(Error::compile(
                            index,
                            format!("column {} does not belong to table {}", column.name, table),
                        ));
                    }
                }
                Some(column.clone())
            }
            (SlotKind::Value, Some(Value::Text(column_name)), Domain::Table(table)) => {
                let column = self.ctx.column(table, column_name).map_err(|status| {
                    tracing::debug!(index, column = %column_name, status = %status, "unresolved column");
                    Error::UnresolvedName {
                        index,
                        name: column_name.to_string(),
                    }
                })?;
                Some(column)
            }
            (SlotKind::Value, _, _) => None,
            _ => {
                return Err(Error::compile(
                    index,
                    format!("{} is not a column name", name.describe()),
                ))
            }
        };

        let domain = match column {
            Some(column) => {
                self.ops.truncate(name.start);
                let domain = column.range;
                self.ops.push(Op::GetColumn(column));
                domain
            }
            None => {
                self.ops.push(Op::GetValue);
                Domain::Any
            }
        };
        self.slots.push(Slot::value(domain, start));
        Ok(())
    }

    fn compile_call(&mut self, index: usize, args: Vec<Slot>) -> Result<()> {
        let target = self
            .slots
            .pop()
            .ok_or_else(|| Error::compile(index, "CALL needs a function"))?;
        let function = match &target.kind {
            SlotKind::Function(function) => Arc::clone(function),
            _ => {
                return Err(Error::compile(
                    index,
                    format!("{} is not callable", target.describe()),
                ))
            }
        };
        let info = function.info();
        info.signature
            .validate_arg_count(args.len())
            .map_err(|e| Error::compile(index, e.to_string()))?;

        let argc = u16::try_from(args.len())
            .map_err(|_| Error::compile(index, format!("{} has too many arguments", info.name)))?;
        let mut all_constant = true;
        for arg in args {
            let arg = self.into_value(index, arg)?;
            all_constant &= arg.constant.is_some();
        }

        self.ops.push(Op::Call {
            function: Arc::clone(&function),
            argc,
        });
        self.finish(
            Slot::value(target.domain, target.start),
            all_constant && function.is_deterministic(),
        );
        Ok(())
    }

    fn compile_logical(
        &mut self,
        index: usize,
        operator: Operator,
        args: Vec<Slot>,
    ) -> Result<()> {
        let n = args.len();
        let start = args[0].start;
        let mut keywords: SmallVec<[Arc<str>; 4]> = SmallVec::new();
        let mut all_constant = true;
        for (i, arg) in args.into_iter().enumerate() {
            let arg = self.into_value(index, arg)?;
            all_constant &= arg.constant.is_some();
            // Operands after the first of an AND_NOT are negated
            if operator != Operator::AndNot || i == 0 {
                keywords.extend(arg.keywords);
            }
        }
        let n = u16::try_from(n)
            .map_err(|_| Error::compile(index, format!("{} has too many operands", operator)))?;
        self.ops.push(match operator {
            Operator::And => Op::And(n),
            Operator::Or => Op::Or(n),
            _ => Op::AndNot(n),
        });
        let mut slot = Slot::value(Domain::Scalar(DataType::Boolean), start);
        slot.keywords = keywords;
        self.finish(slot, all_constant);
        Ok(())
    }

    fn compile_unary(
        &mut self,
        index: usize,
        operator: Operator,
        mut args: Vec<Slot>,
    ) -> Result<()> {
        let arg = self.into_value(index, args.remove(0))?;
        let (op, domain) = match operator {
            Operator::Not => (Op::Not, Domain::Scalar(DataType::Boolean)),
            _ => {
                if let Some(dt) = arg.domain.data_type() {
                    if !dt.is_numeric() && dt != DataType::Null {
                        return Err(Error::compile(
                            index,
                            format!("cannot negate {}", arg.domain),
                        ));
                    }
                }
                (Op::Negate, arg.domain)
            }
        };
        self.ops.push(op);
        // Keywords under negation are dropped
        self.finish(Slot::value(domain, arg.start), arg.constant.is_some());
        Ok(())
    }

    fn compile_binary(
        &mut self,
        index: usize,
        operator: Operator,
        mut args: Vec<Slot>,
    ) -> Result<()> {
        let right = self.into_value(index, args.remove(1))?;
        let mut left = self.into_value(index, args.remove(0))?;
        let mut right = right;

        // Integer constants compared against records become record references
        if operator.is_comparison() {
            if let Domain::Table(table) = left.domain {
                self.coerce_record_constant(index, &mut right, table)?;
            }
            if let Domain::Table(table) = right.domain {
                self.coerce_record_constant(index, &mut left, table)?;
            }
        }

        let all_constant = left.constant.is_some() && right.constant.is_some();
        let keyword = match (&right.constant, operator.is_text_search()) {
            (Some(Value::Text(text)), true) if !text.is_empty() => Some(Arc::clone(text)),
            _ => None,
        };

        let op = match operator {
            Operator::Regexp => match &right.constant {
                Some(Value::Text(pattern)) => {
                    let re = Regex::new(pattern).map_err(|e| {
                        Error::compile(index, format!("invalid regular expression: {}", e))
                    })?;
                    if all_constant {
                        Op::Regexp
                    } else {
                        self.ops.truncate(right.start);
                        Op::RegexpConst(Arc::new(re))
                    }
                }
                _ => Op::Regexp,
            },
            Operator::Match => Op::Match,
            Operator::Prefix => Op::Prefix,
            Operator::Suffix => Op::Suffix,
            Operator::Equal => Op::Eq,
            Operator::NotEqual => Op::Ne,
            Operator::Less => Op::Lt,
            Operator::Greater => Op::Gt,
            Operator::LessEqual => Op::Le,
            Operator::GreaterEqual => Op::Ge,
            Operator::Plus => Op::Add,
            Operator::Minus => Op::Sub,
            Operator::Star => Op::Mul,
            Operator::Slash => Op::Div,
            Operator::Mod => Op::Mod,
            other => {
                return Err(Error::compile(
                    index,
                    format!("{} is not a binary operator", other),
                ))
            }
        };
        self.ops.push(op);

        let domain = if operator.is_arithmetic() {
            Self::arithmetic_range(operator, left.domain, right.domain)
        } else {
            Domain::Scalar(DataType::Boolean)
        };
        let mut slot = Slot::value(domain, left.start);
        if let Some(keyword) = keyword {
            slot.keywords = left.keywords;
            slot.keywords.push(keyword);
        }
        self.finish(slot, all_constant);
        Ok(())
    }

    fn coerce_record_constant(
        &mut self,
        index: usize,
        slot: &mut Slot,
        table: TableId,
    ) -> Result<()> {
        if let Some(value @ Value::Integer(_)) = &slot.constant {
            let record = value
                .clone()
                .coerce_to_domain(Domain::Table(table))
                .map_err(|e| Error::compile(index, e.to_string()))?;
            self.ops[slot.start] = Op::LoadConst(record.clone());
            slot.constant = Some(record);
            slot.domain = Domain::Table(table);
        }
        Ok(())
    }

    fn arithmetic_range(operator: Operator, left: Domain, right: Domain) -> Domain {
        match (left.data_type(), right.data_type()) {
            (Some(DataType::Integer), Some(DataType::Integer)) => {
                Domain::Scalar(DataType::Integer)
            }
            (Some(DataType::Text), Some(DataType::Text)) if operator == Operator::Plus => {
                Domain::Scalar(DataType::Text)
            }
            (Some(a), Some(b)) if a.is_numeric() && b.is_numeric() => {
                Domain::Scalar(DataType::Float)
            }
            _ => Domain::Any,
        }
    }

    /// Push the result slot, folding it to a constant when possible
    fn finish(&mut self, mut slot: Slot, foldable: bool) {
        if foldable {
            let program = Program::new_unoptimized(self.ops[slot.start..].to_vec());
            match self
                .folder
                .execute(&program, &ExecuteContext::new(self.ctx))
            {
                Ok(value) => {
                    self.ops.truncate(slot.start);
                    self.ops.push(Op::LoadConst(value.clone()));
                    if slot.domain == Domain::Any {
                        slot.domain = Domain::Scalar(value.data_type());
                    }
                    slot.constant = Some(value);
                }
                // Left for the evaluator to report
                Err(e) => tracing::trace!(error = %e, "constant folding skipped"),
            }
        }
        self.slots.push(slot);
    }
}
