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

//! Operator precedence levels for the Pratt parser

use crate::core::Operator;

/// Precedence levels (higher number = higher precedence)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[repr(u8)]
pub enum Precedence {
    /// Lowest precedence
    #[default]
    Lowest = 1,
    /// `||`
    Or = 2,
    /// `&&` and `&!`
    And = 3,
    /// Equality and text search (==, !=, @, @^, @$, @~)
    Equals = 4,
    /// Ordering (<, >, <=, >=)
    LessGreater = 5,
    /// Addition and subtraction (+, -)
    Sum = 6,
    /// Multiplication, division, modulo (*, /, %)
    Product = 7,
    /// Prefix operators (-, !)
    Prefix = 8,
    /// Dot notation (ref.column)
    Dot = 9,
}

impl Precedence {
    /// Get precedence for an infix operator string
    pub fn for_operator(op: &str) -> Precedence {
        match op {
            "||" => Precedence::Or,
            "&&" | "&!" => Precedence::And,
            "==" | "!=" | "@" | "@^" | "@$" | "@~" => Precedence::Equals,
            "<" | ">" | "<=" | ">=" => Precedence::LessGreater,
            "+" | "-" => Precedence::Sum,
            "*" | "/" | "%" => Precedence::Product,
            "." => Precedence::Dot,
            _ => Precedence::Lowest,
        }
    }
}

/// Instruction for an infix operator string
pub fn infix_operator(op: &str) -> Option<Operator> {
    Some(match op {
        "||" => Operator::Or,
        "&&" => Operator::And,
        "&!" => Operator::AndNot,
        "==" => Operator::Equal,
        "!=" => Operator::NotEqual,
        "@" => Operator::Match,
        "@^" => Operator::Prefix,
        "@$" => Operator::Suffix,
        "@~" => Operator::Regexp,
        "<" => Operator::Less,
        ">" => Operator::Greater,
        "<=" => Operator::LessEqual,
        ">=" => Operator::GreaterEqual,
        "+" => Operator::Plus,
        "-" => Operator::Minus,
        "*" => Operator::Star,
        "/" => Operator::Slash,
        "%" => Operator::Mod,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence_ordering() {
        assert!(Precedence::Product > Precedence::Sum);
        assert!(Precedence::Sum > Precedence::LessGreater);
        assert!(Precedence::LessGreater > Precedence::Equals);
        assert!(Precedence::And > Precedence::Or);
        assert!(Precedence::Dot > Precedence::Prefix);
    }

    #[test]
    fn test_operator_precedence() {
        assert_eq!(Precedence::for_operator("+"), Precedence::Sum);
        assert_eq!(Precedence::for_operator("*"), Precedence::Product);
        assert_eq!(Precedence::for_operator("&!"), Precedence::And);
        assert_eq!(Precedence::for_operator("@"), Precedence::Equals);
        assert_eq!(Precedence::for_operator("."), Precedence::Dot);
        assert_eq!(Precedence::for_operator(","), Precedence::Lowest);
    }

    #[test]
    fn test_infix_operator() {
        assert_eq!(infix_operator("&!"), Some(Operator::AndNot));
        assert_eq!(infix_operator("@~"), Some(Operator::Regexp));
        assert_eq!(infix_operator("!"), None);
    }
}
