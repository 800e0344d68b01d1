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

//! Script grammar parser
//!
//! A Pratt parser that lowers script text straight into operation records
//! in postfix order. The whole text is a single clause: nothing reaches the
//! sink unless every token parsed.

use super::error::ParseError;
use super::lexer::Lexer;
use super::precedence::{infix_operator, Precedence};
use super::token::{Token, TokenType};
use crate::core::{Operator, Value};
use crate::expression::{Operand, Operation};

type ParseResult<T> = std::result::Result<T, ParseError>;

/// Parser for the script grammar
pub struct ScriptParser {
    lexer: Lexer,
    cur_token: Token,
    peek_token: Token,
    record_variable: bool,
    ops: Vec<Operation>,
}

impl ScriptParser {
    pub fn new(text: &str) -> Self {
        let mut lexer = Lexer::new(text);
        let cur_token = lexer.next_token();
        let peek_token = lexer.next_token();
        Self {
            lexer,
            cur_token,
            peek_token,
            record_variable: false,
            ops: Vec::new(),
        }
    }

    /// Parse the text and append its operations to `sink`
    pub fn parse(mut self, record_variable: bool, sink: &mut Vec<Operation>) -> ParseResult<usize> {
        self.record_variable = record_variable;

        if self.cur_token.is_eof() {
            return Err(ParseError::new("empty script", self.cur_token.position));
        }

        self.parse_expression(Precedence::Lowest)?;

        if !self.peek_token.is_eof() {
            self.next_token();
            return Err(self.unexpected());
        }

        sink.append(&mut self.ops);
        Ok(1)
    }

    fn next_token(&mut self) {
        self.cur_token = std::mem::replace(&mut self.peek_token, self.lexer.next_token());
    }

    fn peek_precedence(&self) -> Precedence {
        match self.peek_token.token_type {
            TokenType::Operator => Precedence::for_operator(&self.peek_token.literal),
            TokenType::Punctuator if self.peek_token.literal == "." => Precedence::Dot,
            _ => Precedence::Lowest,
        }
    }

    /// Error for the current token
    fn unexpected(&self) -> ParseError {
        let token = &self.cur_token;
        let message = match token.token_type {
            TokenType::Error => token
                .error
                .clone()
                .unwrap_or_else(|| "invalid token".to_string()),
            TokenType::Eof => "unexpected end of script".to_string(),
            _ => format!("unexpected '{}'", token.literal),
        };
        ParseError::new(message, token.position).with_fragment(token.literal.clone())
    }

    fn expect_peek_punctuator(&mut self, punct: &str) -> ParseResult<()> {
        self.next_token();
        if self.cur_token.is_punctuator(punct) {
            Ok(())
        } else if self.cur_token.is_eof() {
            Err(ParseError::new(
                format!("expected '{}' before end of script", punct),
                self.cur_token.position,
            ))
        } else {
            Err(ParseError::new(
                format!("expected '{}', found '{}'", punct, self.cur_token.literal),
                self.cur_token.position,
            )
            .with_fragment(self.cur_token.literal.clone()))
        }
    }

    fn emit(&mut self, operation: Operation) {
        self.ops.push(operation);
    }

    /// Parse an expression whose operators bind tighter than `precedence`
    fn parse_expression(&mut self, precedence: Precedence) -> ParseResult<()> {
        self.parse_prefix()?;

        while !self.peek_token.is_eof() && precedence < self.peek_precedence() {
            self.next_token();
            self.parse_infix()?;
        }

        Ok(())
    }

    fn parse_prefix(&mut self) -> ParseResult<()> {
        match self.cur_token.token_type {
            TokenType::Integer => {
                let value = self.cur_token.literal.parse::<i64>().map_err(|_| {
                    ParseError::new("integer literal out of range", self.cur_token.position)
                        .with_fragment(self.cur_token.literal.clone())
                })?;
                self.emit(Operation::push(Value::integer(value)));
            }
            TokenType::Float => {
                let value = self.cur_token.literal.parse::<f64>().map_err(|_| {
                    ParseError::new("invalid float literal", self.cur_token.position)
                        .with_fragment(self.cur_token.literal.clone())
                })?;
                self.emit(Operation::push(Value::float(value)));
            }
            TokenType::String => {
                let value = Value::text(&self.cur_token.literal);
                self.emit(Operation::push(value));
            }
            TokenType::Keyword => {
                let value = match self.cur_token.literal.as_str() {
                    "true" => Value::boolean(true),
                    "false" => Value::boolean(false),
                    _ => Value::null_unknown(),
                };
                self.emit(Operation::push(value));
            }
            TokenType::Identifier => {
                if self.peek_token.is_punctuator("(") {
                    self.parse_call()?;
                } else {
                    self.parse_column()?;
                }
            }
            TokenType::Operator if self.cur_token.literal == "-" => {
                self.next_token();
                self.parse_expression(Precedence::Prefix)?;
                self.emit(Operation::apply(Operator::Negate, 1));
            }
            TokenType::Operator if self.cur_token.literal == "!" => {
                self.next_token();
                self.parse_expression(Precedence::Prefix)?;
                self.emit(Operation::apply(Operator::Not, 1));
            }
            TokenType::Punctuator if self.cur_token.literal == "(" => {
                self.next_token();
                self.parse_expression(Precedence::Lowest)?;
                self.expect_peek_punctuator(")")?;
            }
            _ => return Err(self.unexpected()),
        }
        Ok(())
    }

    /// `name(arg, ...)` lowers to `Push name, args..., CALL(argc)`
    fn parse_call(&mut self) -> ParseResult<()> {
        let name = self.cur_token.literal.clone();
        self.emit(Operation::push(Operand::from(name)));
        self.next_token(); // (

        let mut argc = 0;
        if self.peek_token.is_punctuator(")") {
            self.next_token();
        } else {
            loop {
                self.next_token();
                self.parse_expression(Precedence::Lowest)?;
                argc += 1;
                if self.peek_token.is_punctuator(",") {
                    self.next_token();
                    continue;
                }
                self.expect_peek_punctuator(")")?;
                break;
            }
        }

        self.emit(Operation::apply(Operator::Call, argc));
        Ok(())
    }

    /// A bare identifier is a column of the record in variable 0
    fn parse_column(&mut self) -> ParseResult<()> {
        if !self.record_variable {
            return Err(ParseError::new(
                "column reference needs a record variable at position 0",
                self.cur_token.position,
            )
            .with_fragment(self.cur_token.literal.clone()));
        }
        let name = Value::text(&self.cur_token.literal);
        self.emit(Operation::push(Operand::Variable(0)));
        self.emit(Operation::push(name));
        self.emit(Operation::apply(Operator::GetValue, 2));
        Ok(())
    }

    fn parse_infix(&mut self) -> ParseResult<()> {
        if self.cur_token.is_punctuator(".") {
            self.next_token();
            if self.cur_token.token_type != TokenType::Identifier {
                return Err(self.unexpected());
            }
            let name = Value::text(&self.cur_token.literal);
            self.emit(Operation::push(name));
            self.emit(Operation::apply(Operator::GetValue, 2));
            return Ok(());
        }

        let literal = self.cur_token.literal.clone();
        let operator = infix_operator(&literal).ok_or_else(|| self.unexpected())?;
        let precedence = Precedence::for_operator(&literal);
        self.next_token();
        self.parse_expression(precedence)?;
        self.emit(Operation::apply(operator, 2));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::token::Position;

    fn parse(text: &str) -> ParseResult<Vec<String>> {
        let mut ops = Vec::new();
        ScriptParser::new(text).parse(true, &mut ops)?;
        Ok(ops.iter().map(|op| op.to_string()).collect())
    }

    #[test]
    fn test_column_comparison() {
        assert_eq!(
            parse("title == \"groonga\"").unwrap(),
            vec!["$0", "\"title\"", "GET_VALUE(2)", "\"groonga\"", "EQUAL(2)"]
        );
    }

    #[test]
    fn test_precedence() {
        assert_eq!(
            parse("1 + 2 * 3").unwrap(),
            vec!["1", "2", "3", "STAR(2)", "PLUS(2)"]
        );
        assert_eq!(
            parse("(1 + 2) * 3").unwrap(),
            vec!["1", "2", "PLUS(2)", "3", "STAR(2)"]
        );
        assert_eq!(
            parse("1 - 2 - 3").unwrap(),
            vec!["1", "2", "MINUS(2)", "3", "MINUS(2)"]
        );
    }

    #[test]
    fn test_logical_and_text_search() {
        let ops = parse("body @ \"a\" || body @^ \"b\" && !flag").unwrap();
        assert_eq!(ops.last().map(String::as_str), Some("OR(2)"));
        assert!(ops.contains(&"PREFIX(2)".to_string()));
        assert!(ops.contains(&"NOT(1)".to_string()));
        assert!(ops.contains(&"AND(2)".to_string()));
    }

    #[test]
    fn test_calls() {
        assert_eq!(
            parse("upper(title, 'x')").unwrap(),
            vec!["upper", "$0", "\"title\"", "GET_VALUE(2)", "\"x\"", "CALL(2)"]
        );
        assert_eq!(parse("now()").unwrap(), vec!["now", "CALL(0)"]);
    }

    #[test]
    fn test_dotted_access() {
        assert_eq!(
            parse("author.name").unwrap(),
            vec!["$0", "\"author\"", "GET_VALUE(2)", "\"name\"", "GET_VALUE(2)"]
        );
    }

    #[test]
    fn test_literals_and_negation() {
        assert_eq!(parse("-price").unwrap().last().unwrap(), "NEGATE(1)");
        assert_eq!(parse("true").unwrap(), vec!["true"]);
        assert_eq!(parse("2.5").unwrap(), vec!["2.5"]);
    }

    #[test]
    fn test_errors() {
        let err = parse("a ==").unwrap_err();
        assert_eq!(err.message, "unexpected end of script");

        let err = parse("(a").unwrap_err();
        assert_eq!(err.message, "expected ')' before end of script");

        let err = parse("a b").unwrap_err();
        assert_eq!(err.message, "unexpected 'b'");
        assert_eq!(err.position, Position::new(2, 1, 3));

        let err = parse("a = b").unwrap_err();
        assert_eq!(err.message, "unknown operator: =");

        let err = parse("99999999999999999999").unwrap_err();
        assert_eq!(err.message, "integer literal out of range");

        let err = parse("").unwrap_err();
        assert_eq!(err.message, "empty script");
    }

    #[test]
    fn test_failed_script_commits_nothing() {
        let mut ops = vec![Operation::push(Value::integer(1))];
        assert!(ScriptParser::new("1 + ").parse(true, &mut ops).is_err());
        assert_eq!(ops.len(), 1);
    }

    #[test]
    fn test_columns_need_record_variable() {
        let mut ops = Vec::new();
        assert!(ScriptParser::new("1 + 2").parse(false, &mut ops).is_ok());
        let err = ScriptParser::new("title").parse(false, &mut ops).unwrap_err();
        assert_eq!(err.fragment, "title");
    }
}
