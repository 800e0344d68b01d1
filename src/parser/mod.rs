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

//! Query text parsers
//!
//! Three grammars lower text into operation records:
//!
//! - [`Grammar::Query`] - whitespace separated terms, `OR`, `+`/`-`
//!   connectives, groups, phrases and `column:value` clauses
//! - [`Grammar::ColumnQuery`] - the same term syntax, every term is matched
//!   against the default column
//! - [`Grammar::Script`] - an expression language with comparison, text
//!   search, logical and arithmetic operators, calls and dotted access
//!
//! Parsing never evaluates anything. Column references lower to
//! `Push $0, Push "name", GetValue 2` and are resolved at compile time.
//!
//! # Example
//!
//! ```
//! use querex::parser::{parse_into, ParseOptions};
//!
//! let options = ParseOptions::default().with_default_column("body");
//! let mut operations = Vec::new();
//! let clauses = parse_into("groonga OR search", &options, true, &mut operations).unwrap();
//! assert_eq!(clauses, 2);
//! ```

pub mod error;
pub mod lexer;
pub mod precedence;
pub mod query;
pub mod script;
pub mod token;

pub use error::ParseError;
pub use lexer::Lexer;
pub use query::QueryParser;
pub use script::ScriptParser;
pub use token::{Position, Token, TokenType};

use std::fmt;
use std::str::FromStr;

use crate::core::{Error, Operator, Result, Value};
use crate::expression::{Operand, Operation};

/// Grammar a text is parsed with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Grammar {
    #[default]
    Query,
    ColumnQuery,
    Script,
}

impl Grammar {
    /// Selector with the built-in default for a missing name
    pub fn from_option(name: Option<&str>) -> Result<Grammar> {
        name.map_or(Ok(Grammar::Query), str::parse)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Grammar::Query => "query",
            Grammar::ColumnQuery => "column_query",
            Grammar::Script => "script",
        }
    }
}

impl FromStr for Grammar {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "query" => Ok(Grammar::Query),
            "column_query" | "column-query" => Ok(Grammar::ColumnQuery),
            "script" => Ok(Grammar::Script),
            other => Err(Error::UnknownGrammar(other.to_string())),
        }
    }
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options a text is parsed with
#[derive(Debug, Clone, PartialEq)]
pub struct ParseOptions {
    /// Column matched by terms without an explicit column
    pub default_column: Option<String>,
    /// Operator applied to terms without an explicit one (default `Match`)
    pub default_mode: Operator,
    /// Connective between adjacent clauses (default `And`)
    pub default_join_operator: Operator,
    pub grammar: Grammar,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            default_column: None,
            default_mode: Operator::Match,
            default_join_operator: Operator::And,
            grammar: Grammar::Query,
        }
    }
}

impl ParseOptions {
    pub fn with_default_column(mut self, column: impl Into<String>) -> Self {
        self.default_column = Some(column.into());
        self
    }

    pub fn with_default_mode(mut self, mode: Operator) -> Self {
        self.default_mode = mode;
        self
    }

    pub fn with_default_join_operator(mut self, operator: Operator) -> Self {
        self.default_join_operator = operator;
        self
    }

    pub fn with_grammar(mut self, grammar: Grammar) -> Self {
        self.grammar = grammar;
        self
    }

    /// Check option values once before parsing
    pub fn validate(&self) -> Result<()> {
        if !self.default_mode.is_mode() {
            return Err(Error::invalid_option("default_mode", self.default_mode));
        }
        if !self.default_join_operator.is_connective() {
            return Err(Error::invalid_option(
                "default_join_operator",
                self.default_join_operator,
            ));
        }
        if let Some(column) = &self.default_column {
            if column.is_empty() || column.split('.').any(str::is_empty) {
                return Err(Error::invalid_option("default_column", column));
            }
        }
        Ok(())
    }
}

/// Parse `text` and append its operations to `sink`
///
/// Top-level clauses are committed one at a time: on error, `sink` keeps
/// every clause that parsed before the failing one and nothing of the
/// failing clause. Returns the number of committed clauses.
pub fn parse_into(
    text: &str,
    options: &ParseOptions,
    record_variable: bool,
    sink: &mut Vec<Operation>,
) -> std::result::Result<usize, ParseError> {
    let result = match options.grammar {
        Grammar::Query => QueryParser::new(text, options, false).parse(record_variable, sink),
        Grammar::ColumnQuery => QueryParser::new(text, options, true).parse(record_variable, sink),
        Grammar::Script => ScriptParser::new(text).parse(record_variable, sink),
    };
    match &result {
        Ok(clauses) => {
            tracing::debug!(grammar = %options.grammar, clauses, "parsed query text")
        }
        Err(err) => {
            tracing::debug!(grammar = %options.grammar, error = %err, "query text rejected")
        }
    }
    result.map_err(|err| err.with_query(text))
}

/// Append the lowering of a (possibly dotted) column path on record `$0`
pub(crate) fn push_column_path<'s>(
    out: &mut Vec<Operation>,
    path: impl IntoIterator<Item = &'s str>,
) {
    out.push(Operation::push(Operand::Variable(0)));
    for segment in path {
        out.push(Operation::push(Value::text(segment)));
        out.push(Operation::apply(Operator::GetValue, 2));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ErrorKind;

    #[test]
    fn test_grammar_selectors() {
        assert_eq!(Grammar::from_option(None).unwrap(), Grammar::Query);
        assert_eq!("query".parse::<Grammar>().unwrap(), Grammar::Query);
        assert_eq!("column-query".parse::<Grammar>().unwrap(), Grammar::ColumnQuery);
        assert_eq!("column_query".parse::<Grammar>().unwrap(), Grammar::ColumnQuery);
        assert_eq!("script".parse::<Grammar>().unwrap(), Grammar::Script);

        let err = "sql".parse::<Grammar>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Construction);
        assert_eq!(
            err.to_string(),
            "unknown grammar: <sql>: available grammars: [query, column_query, script]"
        );
    }

    #[test]
    fn test_options_defaults() {
        let options = ParseOptions::default();
        assert_eq!(options.default_mode, Operator::Match);
        assert_eq!(options.default_join_operator, Operator::And);
        assert_eq!(options.grammar, Grammar::Query);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_options_validate() {
        let bad_mode = ParseOptions::default().with_default_mode(Operator::Plus);
        assert_eq!(bad_mode.validate().unwrap_err().kind(), ErrorKind::Construction);

        let bad_join = ParseOptions::default().with_default_join_operator(Operator::Match);
        assert!(matches!(
            bad_join.validate(),
            Err(Error::InvalidOption {
                option: "default_join_operator",
                ..
            })
        ));

        let bad_column = ParseOptions::default().with_default_column("a..b");
        assert!(bad_column.validate().is_err());
    }

    #[test]
    fn test_push_column_path() {
        let mut ops = Vec::new();
        push_column_path(&mut ops, "author.name".split('.'));
        assert_eq!(ops.len(), 5);
        assert_eq!(ops[0], Operation::push(Operand::Variable(0)));
        assert_eq!(ops[4], Operation::apply(Operator::GetValue, 2));
    }

    #[test]
    fn test_parse_into_attaches_query_text() {
        let mut ops = Vec::new();
        let err = parse_into("(a", &ParseOptions::default().with_default_column("body"), true, &mut ops)
            .unwrap_err();
        assert_eq!(err.query, "(a");
        assert!(ops.is_empty());
    }
}
