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

// Operation Records
//
// The raw, uncompiled form of an expression: an ordered list of
// (operator, arity, operand) records appended by callers or parsers.
// Nothing here is validated; the compiler checks arities and resolves
// operands.

use std::fmt;
use std::sync::Arc;

use super::variable::VariableHandle;
use crate::core::{Operator, Value, ValueCell};
use crate::storage::ObjectRef;

/// What an operation pushes before applying its operator
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// A variable by position
    Variable(usize),
    /// An already resolved store object
    Object(ObjectRef),
    /// A name resolved through the store at compile time
    Name(Arc<str>),
    /// An owned literal
    Constant(ValueCell),
}

impl From<VariableHandle> for Operand {
    fn from(handle: VariableHandle) -> Self {
        Operand::Variable(handle.position())
    }
}

impl From<ObjectRef> for Operand {
    fn from(object: ObjectRef) -> Self {
        Operand::Object(object)
    }
}

impl From<&str> for Operand {
    fn from(name: &str) -> Self {
        Operand::Name(Arc::from(name))
    }
}

impl From<String> for Operand {
    fn from(name: String) -> Self {
        Operand::Name(Arc::from(name))
    }
}

impl From<Value> for Operand {
    fn from(value: Value) -> Self {
        Operand::Constant(ValueCell::any(value))
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Variable(position) => write!(f, "${}", position),
            Operand::Object(object) => write!(f, "<{}>", object.name()),
            Operand::Name(name) => write!(f, "{}", name),
            Operand::Constant(cell) => match cell.value() {
                Value::Text(s) => write!(f, "{:?}", s.as_ref()),
                other => write!(f, "{}", other),
            },
        }
    }
}

/// One appended instruction
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub operator: Operator,
    /// Signed on purpose: out-of-range values are kept and rejected at compile
    pub arity: i32,
    pub operand: Option<Operand>,
}

impl Operation {
    pub fn new(operator: Operator, arity: i32, operand: Option<Operand>) -> Self {
        Self {
            operator,
            arity,
            operand,
        }
    }

    /// A plain push of an operand
    pub fn push(operand: impl Into<Operand>) -> Self {
        Self::new(Operator::Push, 1, Some(operand.into()))
    }

    /// A bare operator
    pub fn apply(operator: Operator, arity: i32) -> Self {
        Self::new(operator, arity, None)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.operand, self.operator) {
            (Some(operand), Operator::Push) => write!(f, "{}", operand),
            (Some(operand), op) => write!(f, "{} {}({})", operand, op, self.arity),
            (None, op) => write!(f, "{}({})", op, self.arity),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_display() {
        assert_eq!(Operation::push(Operand::Variable(0)).to_string(), "$0");
        assert_eq!(
            Operation::push(Value::text("groonga")).to_string(),
            "\"groonga\""
        );
        assert_eq!(
            Operation::apply(Operator::GetValue, 2).to_string(),
            "GET_VALUE(2)"
        );
        assert_eq!(
            Operation::new(Operator::Match, 2, Some(Value::text("x").into())).to_string(),
            "\"x\" MATCH(2)"
        );
    }

    #[test]
    fn test_operand_from_name() {
        assert_eq!(Operand::from("Users"), Operand::Name(Arc::from("Users")));
        assert_eq!(
            Operand::from(Value::integer(3)),
            Operand::Constant(ValueCell::any(Value::Integer(3)))
        );
    }
}
