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

//! Parser error types

use super::token::Position;
use std::fmt;

/// A query text parse failure
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    /// Error message
    pub message: String,
    /// Position in source
    pub position: Position,
    /// The offending piece of text
    pub fragment: String,
    /// The full query text
    pub query: String,
    /// Description of the expression and options the parse ran with
    pub context: String,
}

impl ParseError {
    /// Create a new parse error
    pub fn new(message: impl Into<String>, position: Position) -> Self {
        Self {
            message: message.into(),
            position,
            fragment: String::new(),
            query: String::new(),
            context: String::new(),
        }
    }

    pub fn with_fragment(mut self, fragment: impl Into<String>) -> Self {
        self.fragment = fragment.into();
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    /// Format the error with the offending line and a caret
    pub fn format_error(&self) -> String {
        let lines: Vec<&str> = self.query.lines().collect();
        let mut result = self.to_string();
        if self.position.line > 0 && self.position.line <= lines.len() {
            let line = lines[self.position.line - 1];
            let pointer = " ".repeat(self.position.column.saturating_sub(1)) + "^";
            result = format!("{}\n{}\n{}", result, line, pointer);
        }
        if !self.context.is_empty() {
            result.push('\n');
            result.push_str(&self.context);
        }
        result
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.message, self.position)?;
        if !self.fragment.is_empty() {
            write!(f, ": <{}>", self.fragment)?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        let err = ParseError::new("unbalanced parenthesis", Position::new(6, 1, 7))
            .with_fragment("(");
        assert_eq!(
            err.to_string(),
            "unbalanced parenthesis at line 1, column 7: <(>"
        );
    }

    #[test]
    fn test_format_error_points_at_column() {
        let err = ParseError::new("missing value", Position::new(6, 1, 7))
            .with_fragment("title:")
            .with_query("a OR title:")
            .with_context("#<Expression vars=[$0] ops=[]>");
        let formatted = err.format_error();
        let lines: Vec<&str> = formatted.lines().collect();
        assert_eq!(lines[1], "a OR title:");
        assert_eq!(lines[2], "      ^");
        assert_eq!(lines[3], "#<Expression vars=[$0] ops=[]>");
    }

    #[test]
    fn test_format_error_without_query() {
        let err = ParseError::new("empty query", Position::new(0, 1, 1));
        assert_eq!(err.format_error(), "empty query at line 1, column 1");
    }
}
