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

//! Script Lexer (Tokenizer)
//!
//! Splits script-grammar text into tokens. String literals accept single or
//! double quotes with backslash escapes and are stored unescaped.

use super::token::{
    is_keyword, is_operator, is_operator_char, is_punctuator, Position, Token, TokenType,
};

/// Script lexer for tokenizing input
pub struct Lexer {
    /// Input string
    input: Vec<char>,
    /// Current position in input (points to current char)
    position: usize,
    /// Current reading position in input (after current char)
    read_position: usize,
    /// Current character under examination
    ch: char,
    /// Current position tracking
    pos: Position,
}

impl Lexer {
    /// Create a new lexer for the given input
    pub fn new(input: &str) -> Self {
        let chars: Vec<char> = input.chars().collect();
        let mut lexer = Self {
            input: chars,
            position: 0,
            read_position: 0,
            ch: '\0',
            pos: Position::new(0, 1, 1),
        };
        lexer.read_char();
        lexer
    }

    /// Read the next character
    fn read_char(&mut self) {
        if self.ch == '\n' {
            self.pos.line += 1;
            self.pos.column = 1;
        } else if self.ch != '\0' {
            self.pos.column += 1;
        }

        if self.read_position >= self.input.len() {
            self.ch = '\0';
            self.position = self.input.len();
        } else {
            self.ch = self.input[self.read_position];
            self.position = self.read_position;
            self.read_position += 1;
        }

        self.pos.offset = self.position;
    }

    /// Peek at the next character without advancing
    fn peek_char(&self) -> char {
        if self.read_position >= self.input.len() {
            '\0'
        } else {
            self.input[self.read_position]
        }
    }

    fn at_end(&self) -> bool {
        self.position >= self.input.len()
    }

    /// Get the next token
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();

        let pos = self.pos;
        if self.at_end() {
            return Token::eof(pos);
        }

        match self.ch {
            '"' | '\'' => match self.read_string_literal() {
                Ok(literal) => Token::new(TokenType::String, literal, pos),
                Err(partial) => Token::error("unterminated string literal", partial, pos),
            },

            c if c.is_ascii_digit() => {
                let literal = self.read_number();
                if literal.contains('.') || literal.contains('e') || literal.contains('E') {
                    Token::new(TokenType::Float, literal, pos)
                } else {
                    Token::new(TokenType::Integer, literal, pos)
                }
            }

            c if is_punctuator(c) => {
                self.read_char();
                Token::new(TokenType::Punctuator, c.to_string(), pos)
            }

            c if is_operator_char(c) => {
                let literal = self.read_operator();
                if is_operator(&literal) {
                    Token::new(TokenType::Operator, literal, pos)
                } else {
                    Token::error(format!("unknown operator: {}", literal), literal, pos)
                }
            }

            c if c.is_alphabetic() || c == '_' => {
                let literal = self.read_identifier();
                if is_keyword(&literal) {
                    Token::new(TokenType::Keyword, literal, pos)
                } else {
                    Token::new(TokenType::Identifier, literal, pos)
                }
            }

            c => {
                self.read_char();
                Token::error(
                    format!("unrecognized character: {:?}", c),
                    c.to_string(),
                    pos,
                )
            }
        }
    }

    /// Skip whitespace characters
    fn skip_whitespace(&mut self) {
        while !self.at_end() && self.ch.is_whitespace() {
            self.read_char();
        }
    }

    /// Read an identifier
    fn read_identifier(&mut self) -> String {
        let mut result = String::new();
        result.push(self.ch);
        self.read_char();

        while !self.at_end() && (self.ch.is_alphanumeric() || self.ch == '_') {
            result.push(self.ch);
            self.read_char();
        }

        result
    }

    /// Read a number (integer or float)
    fn read_number(&mut self) -> String {
        let mut result = String::new();
        while self.ch.is_ascii_digit() {
            result.push(self.ch);
            self.read_char();
        }

        if self.ch == '.' && self.peek_char().is_ascii_digit() {
            result.push(self.ch);
            self.read_char();
            while self.ch.is_ascii_digit() {
                result.push(self.ch);
                self.read_char();
            }
        }

        if (self.ch == 'e' || self.ch == 'E')
            && (self.peek_char().is_ascii_digit() || matches!(self.peek_char(), '+' | '-'))
        {
            result.push(self.ch);
            self.read_char();
            if self.ch == '+' || self.ch == '-' {
                result.push(self.ch);
                self.read_char();
            }
            while self.ch.is_ascii_digit() {
                result.push(self.ch);
                self.read_char();
            }
        }

        result
    }

    /// Read a quoted string; `Err` carries the partial text when unterminated
    fn read_string_literal(&mut self) -> Result<String, String> {
        let quote = self.ch;
        let mut result = String::new();
        self.read_char(); // consume opening quote

        loop {
            if self.at_end() {
                return Err(format!("{}{}", quote, result));
            }
            if self.ch == quote {
                self.read_char();
                return Ok(result);
            }
            if self.ch == '\\' {
                self.read_char();
                if self.at_end() {
                    return Err(format!("{}{}", quote, result));
                }
                result.push(match self.ch {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    other => other,
                });
                self.read_char();
                continue;
            }
            result.push(self.ch);
            self.read_char();
        }
    }

    /// Read an operator, preferring two-character forms
    fn read_operator(&mut self) -> String {
        let first_char = self.ch;
        self.read_char();

        if !self.at_end() {
            let two_chars: String = [first_char, self.ch].iter().collect();
            if is_operator(&two_chars) {
                self.read_char();
                return two_chars;
            }
        }

        first_char.to_string()
    }
}

impl Iterator for Lexer {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        let token = self.next_token();
        if token.is_eof() {
            None
        } else {
            Some(token)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<(TokenType, String)> {
        Lexer::new(input)
            .map(|t| (t.token_type, t.literal))
            .collect()
    }

    #[test]
    fn test_simple_condition() {
        let tokens = kinds("title @ \"groonga\" && _id > 3");
        assert_eq!(
            tokens,
            vec![
                (TokenType::Identifier, "title".to_string()),
                (TokenType::Operator, "@".to_string()),
                (TokenType::String, "groonga".to_string()),
                (TokenType::Operator, "&&".to_string()),
                (TokenType::Identifier, "_id".to_string()),
                (TokenType::Operator, ">".to_string()),
                (TokenType::Integer, "3".to_string()),
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(kinds("42"), vec![(TokenType::Integer, "42".to_string())]);
        assert_eq!(kinds("3.25"), vec![(TokenType::Float, "3.25".to_string())]);
        assert_eq!(kinds("1e3"), vec![(TokenType::Float, "1e3".to_string())]);
    }

    #[test]
    fn test_string_literals() {
        assert_eq!(
            kinds(r#"'it\'s' "a \"b\"""#),
            vec![
                (TokenType::String, "it's".to_string()),
                (TokenType::String, "a \"b\"".to_string()),
            ]
        );

        let token = Lexer::new("\"open").next_token();
        assert!(token.is_error());
        assert_eq!(token.error.as_deref(), Some("unterminated string literal"));
    }

    #[test]
    fn test_operators() {
        let ops: Vec<String> = kinds("== != <= >= < > @^ @$ @~ @ && &! || ! + - * / %")
            .into_iter()
            .map(|(_, literal)| literal)
            .collect();
        assert_eq!(
            ops,
            vec![
                "==", "!=", "<=", ">=", "<", ">", "@^", "@$", "@~", "@", "&&", "&!", "||", "!",
                "+", "-", "*", "/", "%"
            ]
        );
    }

    #[test]
    fn test_unknown_operator() {
        let token = Lexer::new("a = b").nth(1).unwrap();
        assert!(token.is_error());
        assert_eq!(token.literal, "=");
    }

    #[test]
    fn test_positions() {
        let tokens: Vec<Token> = Lexer::new("a\n  bb").collect();
        assert_eq!(tokens[1].position, Position::new(4, 2, 3));
    }

    #[test]
    fn test_keywords_and_dots() {
        assert_eq!(
            kinds("author.name != null"),
            vec![
                (TokenType::Identifier, "author".to_string()),
                (TokenType::Punctuator, ".".to_string()),
                (TokenType::Identifier, "name".to_string()),
                (TokenType::Operator, "!=".to_string()),
                (TokenType::Keyword, "null".to_string()),
            ]
        );
    }
}
