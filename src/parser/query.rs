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

//! Query and column-query grammars
//!
//! ```text
//! sequence := clause (("OR")? clause)*
//! clause   := ("+" | "-")? primary
//! primary  := "(" sequence ")" | term
//! term     := word | "phrase" | column ":" op? (value | "phrase")
//! op       := "@" | "!" | "<" | ">" | "<=" | ">=" | "^" | "$" | "~"
//! ```
//!
//! Clauses fold left to right, `((c1 op c2) op c3)`. The connective before
//! a clause is `OR` when the keyword precedes it, `AND` for `+`, `AND_NOT`
//! for `-`, and the default join operator otherwise. A `-` on the first
//! clause (or right after `OR`) negates it.

use super::error::ParseError;
use super::token::Position;
use super::{push_column_path, ParseOptions};
use crate::core::{Operator, Value};
use crate::expression::Operation;

type ParseResult<T> = std::result::Result<T, ParseError>;

// ---------------------------------------------------------------------------
// Token types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum QueryTokenKind {
    Word(String),
    Phrase(String),
    LParen,
    RParen,
    Or,
    Plus,
    Minus,
}

#[derive(Debug, Clone)]
struct QueryToken {
    kind: QueryTokenKind,
    position: Position,
    /// Source text of the token
    source: String,
    /// No whitespace between this token and the previous one
    glued: bool,
}

// ---------------------------------------------------------------------------
// Tokenizer
// ---------------------------------------------------------------------------

struct QueryScanner {
    input: Vec<char>,
    index: usize,
    pos: Position,
}

impl QueryScanner {
    fn new(text: &str) -> Self {
        Self {
            input: text.chars().collect(),
            index: 0,
            pos: Position::new(0, 1, 1),
        }
    }

    fn current(&self) -> Option<char> {
        self.input.get(self.index).copied()
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.index + 1).copied()
    }

    fn advance(&mut self) {
        if let Some(c) = self.current() {
            if c == '\n' {
                self.pos.line += 1;
                self.pos.column = 1;
            } else {
                self.pos.column += 1;
            }
            self.index += 1;
            self.pos.offset = self.index;
        }
    }

    fn source_from(&self, start: usize) -> String {
        self.input[start..self.index].iter().collect()
    }

    fn tokenize(mut self) -> ParseResult<Vec<QueryToken>> {
        let mut tokens: Vec<QueryToken> = Vec::new();
        let mut glued = false;

        while let Some(c) = self.current() {
            if c.is_whitespace() {
                self.advance();
                glued = false;
                continue;
            }

            let start = self.index;
            let position = self.pos;
            let sign_allowed = !glued
                || tokens
                    .last()
                    .is_some_and(|t| t.kind == QueryTokenKind::LParen);
            let kind = match c {
                '(' => {
                    self.advance();
                    QueryTokenKind::LParen
                }
                ')' => {
                    self.advance();
                    QueryTokenKind::RParen
                }
                '"' => QueryTokenKind::Phrase(self.read_phrase(position)?),
                '+' | '-' if sign_allowed => {
                    self.advance();
                    if c == '+' {
                        QueryTokenKind::Plus
                    } else {
                        QueryTokenKind::Minus
                    }
                }
                _ => {
                    let word = self.read_word();
                    if word == "OR" {
                        QueryTokenKind::Or
                    } else {
                        QueryTokenKind::Word(word)
                    }
                }
            };

            tokens.push(QueryToken {
                kind,
                position,
                source: self.source_from(start),
                glued,
            });
            glued = true;
        }

        Ok(tokens)
    }

    fn read_word(&mut self) -> String {
        let mut word = String::new();
        while let Some(c) = self.current() {
            if c.is_whitespace() || matches!(c, '(' | ')' | '"') {
                break;
            }
            word.push(c);
            self.advance();
        }
        word
    }

    /// Read a `"quoted phrase"`; `\"` and `\\` are escapes
    fn read_phrase(&mut self, position: Position) -> ParseResult<String> {
        let start = self.index;
        self.advance(); // opening quote
        let mut phrase = String::new();

        loop {
            match self.current() {
                None => {
                    return Err(ParseError::new("unterminated quoted phrase", position)
                        .with_fragment(self.source_from(start)))
                }
                Some('"') => {
                    self.advance();
                    return Ok(phrase);
                }
                Some('\\') if matches!(self.peek(), Some('"') | Some('\\')) => {
                    self.advance();
                    if let Some(escaped) = self.current() {
                        phrase.push(escaped);
                    }
                    self.advance();
                }
                Some(c) => {
                    phrase.push(c);
                    self.advance();
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Query parser
// ---------------------------------------------------------------------------

/// Parser for the query and column-query grammars
pub struct QueryParser<'a> {
    text: &'a str,
    options: &'a ParseOptions,
    /// Column-query grammar: `name:value` is a literal term
    column_query: bool,
    tokens: Vec<QueryToken>,
    index: usize,
}

impl<'a> QueryParser<'a> {
    pub fn new(text: &'a str, options: &'a ParseOptions, column_query: bool) -> Self {
        Self {
            text,
            options,
            column_query,
            tokens: Vec::new(),
            index: 0,
        }
    }

    /// Parse the text, committing each top-level clause to `sink`
    pub fn parse(mut self, record_variable: bool, sink: &mut Vec<Operation>) -> ParseResult<usize> {
        if !record_variable {
            return Err(ParseError::new(
                "query terms need a record variable at position 0",
                Position::new(0, 1, 1),
            ));
        }

        self.tokens = QueryScanner::new(self.text).tokenize()?;
        if self.tokens.is_empty() {
            return Err(ParseError::new("empty query", Position::new(0, 1, 1)));
        }

        let clauses = self.parse_sequence(sink, None)?;
        if let Some(token) = self.peek() {
            return Err(ParseError::new("unexpected ')'", token.position)
                .with_fragment(token.source.clone()));
        }
        Ok(clauses)
    }

    fn peek(&self) -> Option<&QueryToken> {
        self.tokens.get(self.index)
    }

    fn next(&mut self) -> Option<QueryToken> {
        let token = self.tokens.get(self.index).cloned();
        if token.is_some() {
            self.index += 1;
        }
        token
    }

    fn peek_is(&self, kind: &QueryTokenKind) -> bool {
        self.peek().is_some_and(|t| &t.kind == kind)
    }

    fn end_position(&self) -> Position {
        let mut pos = Position::new(0, 1, 1);
        for c in self.text.chars() {
            if c == '\n' {
                pos.line += 1;
                pos.column = 1;
            } else {
                pos.column += 1;
            }
            pos.offset += 1;
        }
        pos
    }

    /// Parse clauses until the end of input or a closing parenthesis
    ///
    /// Each clause (with its connective) is staged and appended to `out`
    /// only after it parsed completely.
    fn parse_sequence(
        &mut self,
        out: &mut Vec<Operation>,
        group: Option<&QueryToken>,
    ) -> ParseResult<usize> {
        let mut count = 0;

        loop {
            let token = match self.peek() {
                None => break,
                Some(token) if token.kind == QueryTokenKind::RParen => {
                    if group.is_some() {
                        break;
                    }
                    return Err(ParseError::new("unexpected ')'", token.position)
                        .with_fragment(token.source.clone()));
                }
                Some(token) => token.clone(),
            };

            let mut staged = Vec::new();

            let after_or = if token.kind == QueryTokenKind::Or {
                if count == 0 {
                    return Err(ParseError::new("OR needs a left operand", token.position)
                        .with_fragment(token.source));
                }
                self.next();
                self.expect_operand(&token)?;
                true
            } else {
                false
            };

            let has_sign = matches!(
                self.peek().map(|t| &t.kind),
                Some(QueryTokenKind::Plus) | Some(QueryTokenKind::Minus)
            );
            let sign = if has_sign { self.next() } else { None };
            if let Some(sign) = &sign {
                self.expect_operand(sign)?;
            }
            let negative = sign
                .as_ref()
                .is_some_and(|s| s.kind == QueryTokenKind::Minus);

            self.parse_primary(&mut staged)?;

            let connective = if count == 0 {
                None
            } else if after_or {
                Some(Operator::Or)
            } else {
                match sign.as_ref().map(|s| &s.kind) {
                    Some(QueryTokenKind::Plus) => Some(Operator::And),
                    Some(QueryTokenKind::Minus) => Some(Operator::AndNot),
                    _ => Some(self.options.default_join_operator),
                }
            };
            if negative && (count == 0 || after_or) {
                staged.push(Operation::apply(Operator::Not, 1));
            }
            if let Some(connective) = connective {
                staged.push(Operation::apply(connective, 2));
            }

            tracing::trace!(clause = count, operations = staged.len(), "query clause");
            out.extend(staged);
            count += 1;
        }

        Ok(count)
    }

    /// A connective must be followed by a clause
    fn expect_operand(&self, connective: &QueryToken) -> ParseResult<()> {
        match self.peek().map(|t| &t.kind) {
            None | Some(QueryTokenKind::RParen) | Some(QueryTokenKind::Or) => {
                Err(ParseError::new(
                    format!("'{}' needs a right operand", connective.source),
                    connective.position,
                )
                .with_fragment(connective.source.clone()))
            }
            _ => Ok(()),
        }
    }

    fn parse_primary(&mut self, out: &mut Vec<Operation>) -> ParseResult<()> {
        let token = match self.next() {
            Some(token) => token,
            None => {
                return Err(ParseError::new("expected a query term", self.end_position()));
            }
        };

        match &token.kind {
            QueryTokenKind::LParen => {
                let mut inner = Vec::new();
                let count = self.parse_sequence(&mut inner, Some(&token))?;
                if !self.peek_is(&QueryTokenKind::RParen) {
                    return Err(ParseError::new("unbalanced parenthesis", token.position)
                        .with_fragment(token.source));
                }
                self.next();
                if count == 0 {
                    return Err(ParseError::new("empty group", token.position)
                        .with_fragment(token.source));
                }
                out.extend(inner);
                Ok(())
            }
            QueryTokenKind::Phrase(phrase) => self.default_column_term(out, &token, phrase),
            QueryTokenKind::Word(word) => {
                if !self.column_query {
                    if let Some((column, mode, value)) = split_column_clause(word) {
                        return self.column_term(out, &token, column, mode, value);
                    }
                }
                self.default_column_term(out, &token, word)
            }
            QueryTokenKind::RParen
            | QueryTokenKind::Or
            | QueryTokenKind::Plus
            | QueryTokenKind::Minus => Err(ParseError::new(
                format!("unexpected '{}'", token.source),
                token.position,
            )
            .with_fragment(token.source.clone())),
        }
    }

    /// A term matched against the default column with the default mode
    fn default_column_term(
        &self,
        out: &mut Vec<Operation>,
        token: &QueryToken,
        keyword: &str,
    ) -> ParseResult<()> {
        let column = self.options.default_column.as_deref().ok_or_else(|| {
            ParseError::new(
                format!("no column for term '{}' and no default column", keyword),
                token.position,
            )
            .with_fragment(token.source.clone())
        })?;
        push_column_path(out, column.split('.'));
        out.push(Operation::push(Value::text(keyword)));
        out.push(Operation::apply(self.options.default_mode, 2));
        Ok(())
    }

    /// A `column:value` clause
    fn column_term(
        &mut self,
        out: &mut Vec<Operation>,
        token: &QueryToken,
        column: &str,
        mode: Operator,
        value: &str,
    ) -> ParseResult<()> {
        let value = if value.is_empty() {
            match self.peek() {
                Some(QueryToken {
                    kind: QueryTokenKind::Phrase(phrase),
                    glued: true,
                    ..
                }) => {
                    let phrase = Value::text(phrase);
                    self.next();
                    phrase
                }
                _ => {
                    return Err(ParseError::new(
                        format!("missing value for column '{}'", column),
                        token.position,
                    )
                    .with_fragment(token.source.clone()))
                }
            }
        } else {
            typed_value(value)
        };

        push_column_path(out, column.split('.'));
        out.push(Operation::push(value));
        out.push(Operation::apply(mode, 2));
        Ok(())
    }
}

/// Split `column:opvalue` into its parts
fn split_column_clause(word: &str) -> Option<(&str, Operator, &str)> {
    let (column, rest) = word.split_once(':')?;
    let valid_column = !column.is_empty()
        && column
            .split('.')
            .all(|s| !s.is_empty() && s.chars().all(|c| c.is_alphanumeric() || c == '_'));
    if !valid_column {
        return None;
    }

    const MODES: &[(&str, Operator)] = &[
        ("<=", Operator::LessEqual),
        (">=", Operator::GreaterEqual),
        ("@", Operator::Match),
        ("!", Operator::NotEqual),
        ("<", Operator::Less),
        (">", Operator::Greater),
        ("^", Operator::Prefix),
        ("$", Operator::Suffix),
        ("~", Operator::Regexp),
    ];
    for (prefix, mode) in MODES {
        if let Some(value) = rest.strip_prefix(prefix) {
            return Some((column, *mode, value));
        }
    }
    Some((column, Operator::Equal, rest))
}

/// Unquoted values: integer, then float, then text
fn typed_value(text: &str) -> Value {
    if let Ok(i) = text.parse::<i64>() {
        return Value::integer(i);
    }
    let numeric = text
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
        && text.chars().any(|c| c.is_ascii_digit());
    if numeric {
        if let Ok(f) = text.parse::<f64>() {
            return Value::float(f);
        }
    }
    Value::text(text)
}
