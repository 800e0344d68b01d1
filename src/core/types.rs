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

//! Core type definitions for Querex
//!
//! This module defines the fundamental types: DataType, Domain, the object
//! identifiers handed out by a store, and the Operator set understood by the
//! expression compiler.

use std::fmt;
use std::str::FromStr;

use super::error::Error;

/// Value types understood by the expression engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum DataType {
    /// NULL data type, used for unknown/unspecified types
    #[default]
    Null = 0,

    /// Boolean true/false
    Boolean = 1,

    /// 64-bit signed integer
    Integer = 2,

    /// 64-bit floating point number
    Float = 3,

    /// UTF-8 text
    Text = 4,

    /// Reference to a record of some table
    Record = 5,
}

impl DataType {
    /// Returns true if this type is numeric (INTEGER or FLOAT)
    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Integer | DataType::Float)
    }

    /// Returns the type ID as u8
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    /// Create DataType from u8
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(DataType::Null),
            1 => Some(DataType::Boolean),
            2 => Some(DataType::Integer),
            3 => Some(DataType::Float),
            4 => Some(DataType::Text),
            5 => Some(DataType::Record),
            _ => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Null => write!(f, "NULL"),
            DataType::Boolean => write!(f, "BOOLEAN"),
            DataType::Integer => write!(f, "INTEGER"),
            DataType::Float => write!(f, "FLOAT"),
            DataType::Text => write!(f, "TEXT"),
            DataType::Record => write!(f, "RECORD"),
        }
    }
}

impl FromStr for DataType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "NULL" => Ok(DataType::Null),
            "BOOLEAN" | "BOOL" => Ok(DataType::Boolean),
            "INTEGER" | "INT" | "INT32" | "INT64" | "UINT32" => Ok(DataType::Integer),
            "FLOAT" | "DOUBLE" => Ok(DataType::Float),
            "TEXT" | "SHORTTEXT" | "LONGTEXT" | "STRING" => Ok(DataType::Text),
            "RECORD" | "REFERENCE" => Ok(DataType::Record),
            _ => Err(Error::invalid_argument(format!("unknown data type: {}", s))),
        }
    }
}

/// Identifier of a table inside a store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(pub u32);

/// Identifier of a column inside its table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColumnId(pub u32);

impl ColumnId {
    /// The `_id` pseudo column (record id)
    pub const ID: ColumnId = ColumnId(u32::MAX);
    /// The `_key` pseudo column (record key)
    pub const KEY: ColumnId = ColumnId(u32::MAX - 1);

    /// Returns true for `_id` and `_key`
    pub fn is_pseudo(&self) -> bool {
        *self == Self::ID || *self == Self::KEY
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A reference to one record. Record ids start at 1; id 0 is the nil record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordRef {
    pub table: TableId,
    pub id: u32,
}

impl RecordRef {
    /// The nil record of a table
    pub const fn nil(table: TableId) -> Self {
        Self { table, id: 0 }
    }

    pub fn is_nil(&self) -> bool {
        self.id == 0
    }
}

/// The set of values a cell, column or variable accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Domain {
    /// Anything goes
    #[default]
    Any,
    /// A scalar of the given type
    Scalar(DataType),
    /// A record of the given table
    Table(TableId),
}

impl Domain {
    /// The data type values of this domain carry, if fixed
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Domain::Any => None,
            Domain::Scalar(dt) => Some(*dt),
            Domain::Table(_) => Some(DataType::Record),
        }
    }

    /// The table of a record domain
    pub fn table(&self) -> Option<TableId> {
        match self {
            Domain::Table(table) => Some(*table),
            _ => None,
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Domain::Any => write!(f, "ANY"),
            Domain::Scalar(dt) => write!(f, "{}", dt),
            Domain::Table(table) => write!(f, "TABLE{}", table),
        }
    }
}

/// Upper bound marker for variadic operators
pub const UNBOUNDED_ARITY: i32 = i32::MAX;

/// Operators of the expression instruction set
///
/// The numeric codes are stable and can be used by embedders that pass
/// operators across an FFI or wire boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Operator {
    /// Push the operand unchanged
    Push = 0,
    /// Discard the top of stack
    Pop = 1,
    /// Read a column (by name) of a record
    GetValue = 2,
    /// Call the function below the arguments
    Call = 3,
    /// Logical AND
    And = 4,
    /// Logical OR
    Or = 5,
    /// First operand and none of the rest ("BUT")
    AndNot = 6,
    /// Logical NOT
    Not = 7,
    /// Full-text match
    Match = 8,
    /// Text prefix
    Prefix = 9,
    /// Text suffix
    Suffix = 10,
    /// Regular expression
    Regexp = 11,
    /// =
    Equal = 12,
    /// !=
    NotEqual = 13,
    /// <
    Less = 14,
    /// >
    Greater = 15,
    /// <=
    LessEqual = 16,
    /// >=
    GreaterEqual = 17,
    /// +
    Plus = 18,
    /// -
    Minus = 19,
    /// *
    Star = 20,
    /// /
    Slash = 21,
    /// %
    Mod = 22,
    /// Unary minus
    Negate = 23,
}

impl Operator {
    /// All operators, ordered by code
    pub const ALL: [Operator; 24] = [
        Operator::Push,
        Operator::Pop,
        Operator::GetValue,
        Operator::Call,
        Operator::And,
        Operator::Or,
        Operator::AndNot,
        Operator::Not,
        Operator::Match,
        Operator::Prefix,
        Operator::Suffix,
        Operator::Regexp,
        Operator::Equal,
        Operator::NotEqual,
        Operator::Less,
        Operator::Greater,
        Operator::LessEqual,
        Operator::GreaterEqual,
        Operator::Plus,
        Operator::Minus,
        Operator::Star,
        Operator::Slash,
        Operator::Mod,
        Operator::Negate,
    ];

    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }

    /// Inclusive (min, max) number of operands the operator accepts
    pub fn arity_bounds(&self) -> (i32, i32) {
        match self {
            Operator::Push | Operator::Pop => (1, 1),
            Operator::Not | Operator::Negate => (1, 1),
            Operator::Call => (0, UNBOUNDED_ARITY),
            Operator::And | Operator::Or | Operator::AndNot => (1, UNBOUNDED_ARITY),
            _ => (2, 2),
        }
    }

    /// Returns true if the arity is accepted by this operator
    pub fn accepts_arity(&self, arity: i32) -> bool {
        let (min, max) = self.arity_bounds();
        arity >= min && arity <= max
    }

    /// Operators usable as a per-term search mode
    pub fn is_mode(&self) -> bool {
        matches!(
            self,
            Operator::Match
                | Operator::Prefix
                | Operator::Suffix
                | Operator::Regexp
                | Operator::Equal
                | Operator::NotEqual
                | Operator::Less
                | Operator::Greater
                | Operator::LessEqual
                | Operator::GreaterEqual
        )
    }

    /// Operators usable to join query clauses
    pub fn is_connective(&self) -> bool {
        matches!(self, Operator::And | Operator::Or | Operator::AndNot)
    }

    /// Returns true for text search operators whose right operand is a keyword
    pub fn is_text_search(&self) -> bool {
        matches!(
            self,
            Operator::Match | Operator::Prefix | Operator::Suffix | Operator::Equal
        )
    }

    /// Returns true for ordering and equality comparisons
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            Operator::Equal
                | Operator::NotEqual
                | Operator::Less
                | Operator::Greater
                | Operator::LessEqual
                | Operator::GreaterEqual
        )
    }

    /// Returns true for binary arithmetic
    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            Operator::Plus | Operator::Minus | Operator::Star | Operator::Slash | Operator::Mod
        )
    }

    /// Canonical upper-case name
    pub fn name(&self) -> &'static str {
        match self {
            Operator::Push => "PUSH",
            Operator::Pop => "POP",
            Operator::GetValue => "GET_VALUE",
            Operator::Call => "CALL",
            Operator::And => "AND",
            Operator::Or => "OR",
            Operator::AndNot => "AND_NOT",
            Operator::Not => "NOT",
            Operator::Match => "MATCH",
            Operator::Prefix => "PREFIX",
            Operator::Suffix => "SUFFIX",
            Operator::Regexp => "REGEXP",
            Operator::Equal => "EQUAL",
            Operator::NotEqual => "NOT_EQUAL",
            Operator::Less => "LESS",
            Operator::Greater => "GREATER",
            Operator::LessEqual => "LESS_EQUAL",
            Operator::GreaterEqual => "GREATER_EQUAL",
            Operator::Plus => "PLUS",
            Operator::Minus => "MINUS",
            Operator::Star => "STAR",
            Operator::Slash => "SLASH",
            Operator::Mod => "MOD",
            Operator::Negate => "NEGATE",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Operator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase().replace('-', "_");
        match upper.as_str() {
            "BUT" | "AND_NOT" => return Ok(Operator::AndNot),
            "EQ" | "==" => return Ok(Operator::Equal),
            "NE" | "!=" => return Ok(Operator::NotEqual),
            _ => {}
        }
        Self::ALL
            .iter()
            .find(|op| op.name() == upper)
            .copied()
            .ok_or_else(|| Error::invalid_argument(format!("unknown operator: {}", s)))
    }
}
