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

//! Error types for Querex
//!
//! Every failure surfaced by the crate is an [`Error`]. Errors are grouped
//! into five kinds ([`ErrorKind`]) that match the stage that produced them.
//! Store collaborators report failures as a [`Status`], which is translated
//! into an [`Error`] by [`Error::from_status`].

use std::fmt;

use thiserror::Error;

use super::types::{DataType, Domain, Operator};
use crate::parser::ParseError;

/// Result type alias for Querex operations
pub type Result<T> = std::result::Result<T, Error>;

/// Stage an error belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Invalid object construction or option values
    Construction,
    /// Query text could not be parsed
    Parse,
    /// Operation sequence could not be compiled
    Compile,
    /// Evaluation failed
    Runtime,
    /// Bad argument passed by the caller
    Argument,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Construction => write!(f, "construction error"),
            ErrorKind::Parse => write!(f, "parse error"),
            ErrorKind::Compile => write!(f, "compile error"),
            ErrorKind::Runtime => write!(f, "runtime error"),
            ErrorKind::Argument => write!(f, "argument error"),
        }
    }
}

/// Status codes reported by a store collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    Success,
    EndOfData,
    UnknownError,
    OperationNotPermitted,
    NoSuchFileOrDirectory,
    InvalidArgument,
    NoMemoryAvailable,
    SyntaxError,
    InvalidFormat,
    ObjectCorrupt,
    FunctionNotImplemented,
}

impl StatusCode {
    pub fn is_success(&self) -> bool {
        matches!(self, StatusCode::Success)
    }

    /// Short human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            StatusCode::Success => "success",
            StatusCode::EndOfData => "end of data",
            StatusCode::UnknownError => "unknown error",
            StatusCode::OperationNotPermitted => "operation not permitted",
            StatusCode::NoSuchFileOrDirectory => "no such object",
            StatusCode::InvalidArgument => "invalid argument",
            StatusCode::NoMemoryAvailable => "no memory available",
            StatusCode::SyntaxError => "syntax error",
            StatusCode::InvalidFormat => "invalid format",
            StatusCode::ObjectCorrupt => "object corrupt",
            StatusCode::FunctionNotImplemented => "function not implemented",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A failure report from a store collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub code: StatusCode,
    pub message: String,
    pub file: &'static str,
    pub line: u32,
    pub function: &'static str,
}

impl Status {
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            file: "",
            line: 0,
            function: "",
        }
    }

    /// Attach the source location that raised the status
    pub fn at(mut self, file: &'static str, line: u32, function: &'static str) -> Self {
        self.file = file;
        self.line = line;
        self.function = function;
        self
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NoSuchFileOrDirectory, message)
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(StatusCode::InvalidArgument, message)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)?;
        if !self.file.is_empty() {
            write!(f, " ({}:{} {}())", self.file, self.line, self.function)?;
        }
        Ok(())
    }
}

/// Main error type for Querex
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    // =========================================================================
    // Construction errors
    // =========================================================================
    /// Operation not allowed in the expression's current state
    #[error("cannot {action} expression in {state} state")]
    InvalidState {
        action: &'static str,
        state: &'static str,
    },

    /// Unknown grammar selector
    #[error("unknown grammar: <{0}>: available grammars: [query, column_query, script]")]
    UnknownGrammar(String),

    /// Snippet tag list was empty
    #[error("tags must not be empty")]
    EmptyTagList,

    /// Option value is not acceptable
    #[error("invalid option {option}: <{value}>")]
    InvalidOption { option: &'static str, value: String },

    // =========================================================================
    // Parse errors
    // =========================================================================
    /// Query text could not be parsed
    #[error("{0}")]
    Parse(Box<ParseError>),

    // =========================================================================
    // Compile errors
    // =========================================================================
    /// Nothing was appended before compile
    #[error("cannot compile an empty expression")]
    EmptyExpression,

    /// Arity outside the operator's bounds
    #[error("operation #{index}: {operator} does not accept arity {arity}")]
    InvalidArity {
        index: usize,
        operator: Operator,
        arity: i32,
    },

    /// Not enough operands on the stack
    #[error("operation #{index}: {operator} needs {needed} operand(s), stack has {depth}")]
    StackUnderflow {
        index: usize,
        operator: Operator,
        needed: usize,
        depth: usize,
    },

    /// A named object could not be resolved
    #[error("operation #{index}: unresolved name '{name}'")]
    UnresolvedName { index: usize, name: String },

    /// Generic compile failure tied to an operation
    #[error("operation #{index}: {message}")]
    Compile { index: usize, message: String },

    /// The program does not leave exactly one value
    #[error("operation #{index}: expression leaves {depth} value(s) on the stack, expected 1")]
    UnbalancedStack { index: usize, depth: usize },

    // =========================================================================
    // Runtime errors
    // =========================================================================
    /// Division or modulo by zero
    #[error("division by zero")]
    DivisionByZero,

    /// Operand types not supported by an operator
    #[error("type error: {0}")]
    Type(String),

    /// Evaluation failure with a message
    #[error("expression evaluation failed: {message}")]
    ExpressionEvaluation { message: String },

    // =========================================================================
    // Argument errors
    // =========================================================================
    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Variable lookup by name failed
    #[error("variable '{0}' not found")]
    VariableNotFound(String),

    /// Variable lookup by position failed
    #[error("variable offset {offset} out of range (0..{count})")]
    VariableOutOfRange { offset: usize, count: usize },

    /// Value does not fit a domain
    #[error("value of type {got} does not fit domain {expected}")]
    DomainMismatch { expected: Domain, got: DataType },

    // =========================================================================
    // Collaborator failures
    // =========================================================================
    /// A store collaborator reported a failure
    #[error("{phase}: {status}")]
    Status { phase: ErrorKind, status: Status },
}

impl Error {
    /// Translate a collaborator status into an error for the given stage
    pub fn from_status(status: Status, phase: ErrorKind) -> Self {
        tracing::warn!(code = ?status.code, detail = %status.message, ?phase, "collaborator failure");
        Error::Status { phase, status }
    }

    /// Create an invalid-state error
    pub fn invalid_state(action: &'static str, state: &'static str) -> Self {
        Error::InvalidState { action, state }
    }

    /// Create an invalid-option error
    pub fn invalid_option(option: &'static str, value: impl fmt::Display) -> Self {
        Error::InvalidOption {
            option,
            value: value.to_string(),
        }
    }

    /// Create a compile error tied to an operation index
    pub fn compile(index: usize, message: impl Into<String>) -> Self {
        Error::Compile {
            index,
            message: message.into(),
        }
    }

    /// Create a type error
    pub fn type_error(message: impl Into<String>) -> Self {
        Error::Type(message.into())
    }

    /// Create an expression evaluation error
    pub fn expression_evaluation(message: impl Into<String>) -> Self {
        Error::ExpressionEvaluation {
            message: message.into(),
        }
    }

    /// Create an invalid argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Error::InvalidArgument(message.into())
    }

    /// Stage this error belongs to
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidState { .. }
            | Error::UnknownGrammar(_)
            | Error::EmptyTagList
            | Error::InvalidOption { .. } => ErrorKind::Construction,
            Error::Parse(_) => ErrorKind::Parse,
            Error::EmptyExpression
            | Error::InvalidArity { .. }
            | Error::StackUnderflow { .. }
            | Error::UnresolvedName { .. }
            | Error::Compile { .. }
            | Error::UnbalancedStack { .. } => ErrorKind::Compile,
            Error::DivisionByZero | Error::Type(_) | Error::ExpressionEvaluation { .. } => {
                ErrorKind::Runtime
            }
            Error::InvalidArgument(_)
            | Error::VariableNotFound(_)
            | Error::VariableOutOfRange { .. }
            | Error::DomainMismatch { .. } => ErrorKind::Argument,
            Error::Status { phase, .. } => *phase,
        }
    }

    /// Index of the offending operation for compile errors
    pub fn operation_index(&self) -> Option<usize> {
        match self {
            Error::InvalidArity { index, .. }
            | Error::StackUnderflow { index, .. }
            | Error::UnresolvedName { index, .. }
            | Error::Compile { index, .. }
            | Error::UnbalancedStack { index, .. } => Some(*index),
            _ => None,
        }
    }

    /// The parse error, if this is one
    pub fn as_parse_error(&self) -> Option<&ParseError> {
        match self {
            Error::Parse(err) => Some(err),
            _ => None,
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::VariableNotFound(_) | Error::UnresolvedName { .. } => true,
            Error::Status { status, .. } => status.code == StatusCode::NoSuchFileOrDirectory,
            _ => false,
        }
    }
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        Error::Parse(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(Error::DivisionByZero.to_string(), "division by zero");
        assert_eq!(
            Error::VariableNotFound("x".to_string()).to_string(),
            "variable 'x' not found"
        );
        assert_eq!(
            Error::invalid_state("append to", "compiled").to_string(),
            "cannot append to expression in compiled state"
        );
        assert_eq!(
            Error::UnknownGrammar("sql".to_string()).to_string(),
            "unknown grammar: <sql>: available grammars: [query, column_query, script]"
        );
    }

    #[test]
    fn test_structured_error_display() {
        let err = Error::InvalidArity {
            index: 3,
            operator: Operator::Equal,
            arity: 5,
        };
        assert_eq!(
            err.to_string(),
            "operation #3: EQUAL does not accept arity 5"
        );

        let err = Error::StackUnderflow {
            index: 1,
            operator: Operator::And,
            needed: 2,
            depth: 1,
        };
        assert_eq!(
            err.to_string(),
            "operation #1: AND needs 2 operand(s), stack has 1"
        );
    }

    #[test]
    fn test_error_classification() {
        assert_eq!(Error::EmptyTagList.kind(), ErrorKind::Construction);
        assert_eq!(Error::EmptyExpression.kind(), ErrorKind::Compile);
        assert_eq!(Error::DivisionByZero.kind(), ErrorKind::Runtime);
        assert_eq!(
            Error::invalid_argument("bad").kind(),
            ErrorKind::Argument
        );
        assert_eq!(Error::compile(4, "x").operation_index(), Some(4));
        assert_eq!(
            Error::UnbalancedStack { index: 2, depth: 3 }.operation_index(),
            Some(2)
        );
        assert_eq!(Error::DivisionByZero.operation_index(), None);
    }

    #[test]
    fn test_from_status() {
        let status = Status::not_found("no such column: Users.age").at("store.rs", 10, "column");
        let err = Error::from_status(status.clone(), ErrorKind::Compile);
        assert_eq!(err.kind(), ErrorKind::Compile);
        assert!(err.is_not_found());
        let text = err.to_string();
        assert!(text.starts_with("compile error: no such object: no such column: Users.age"));
        assert!(text.contains("store.rs:10 column()"));

        let err = Error::from_status(status, ErrorKind::Runtime);
        assert_eq!(err.kind(), ErrorKind::Runtime);
    }

    #[test]
    fn test_status_code_success() {
        assert!(StatusCode::Success.is_success());
        assert!(!StatusCode::SyntaxError.is_success());
    }
}
