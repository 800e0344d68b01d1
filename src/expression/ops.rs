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

// Compiled Expression Operations
//
// The instruction set of the expression VM. Operation records are lowered
// into these by the compiler: names and columns are resolved, constant
// patterns are precompiled, and every op pops and pushes a fixed number of
// stack values (see `stack_effect`).

use std::fmt;
use std::sync::Arc;

use memchr::memmem;
use regex::Regex;

use crate::core::Value;
use crate::functions::ScalarFunction;
use crate::storage::ColumnRef;

/// A case-folded keyword with a prebuilt substring searcher
#[derive(Clone)]
pub struct Needle {
    text: Arc<str>,
    finder: Arc<memmem::Finder<'static>>,
}

impl Needle {
    pub fn new(keyword: &str) -> Self {
        let folded = keyword.to_lowercase();
        let finder = memmem::Finder::new(folded.as_bytes()).into_owned();
        Self {
            text: Arc::from(folded),
            finder: Arc::new(finder),
        }
    }

    /// The folded keyword
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Case-insensitive containment test
    #[inline]
    pub fn is_found_in(&self, haystack: &str) -> bool {
        if haystack.is_ascii() && !haystack.bytes().any(|b| b.is_ascii_uppercase()) {
            return self.finder.find(haystack.as_bytes()).is_some();
        }
        self.finder
            .find(haystack.to_lowercase().as_bytes())
            .is_some()
    }
}

impl fmt::Debug for Needle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.text.as_ref())
    }
}

/// VM instruction
#[derive(Debug, Clone)]
pub enum Op {
    // =========================================================================
    // LOAD OPERATIONS
    // =========================================================================
    /// Push a constant
    LoadConst(Value),

    /// Push the current value of a variable
    LoadVariable(u16),

    /// Fused LoadVariable + GetColumn
    LoadVariableColumn(u16, ColumnRef),

    /// Pop a record, push one of its column values
    GetColumn(ColumnRef),

    /// Pop a column name and a record, resolve the column at run time
    GetValue,

    /// Discard the top of stack
    Pop,

    /// Pop `argc` arguments, push the function result
    Call {
        function: Arc<dyn ScalarFunction>,
        argc: u16,
    },

    // =========================================================================
    // LOGICAL OPERATIONS (no short-circuit)
    // =========================================================================
    And(u16),
    Or(u16),
    /// True when the first operand holds and none of the others do
    AndNot(u16),
    Not,

    // =========================================================================
    // TEXT SEARCH
    // =========================================================================
    /// Case-insensitive substring test
    Match,
    /// Match against a constant keyword
    MatchConst(Needle),
    Prefix,
    Suffix,
    Regexp,
    /// Regexp against a precompiled pattern
    RegexpConst(Arc<Regex>),

    // =========================================================================
    // COMPARISON
    // =========================================================================
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,

    // =========================================================================
    // ARITHMETIC
    // =========================================================================
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Negate,
}

impl Op {
    /// Net change in stack depth when this op runs
    pub fn stack_effect(&self) -> i32 {
        match self {
            Op::LoadConst(_) | Op::LoadVariable(_) | Op::LoadVariableColumn(_, _) => 1,
            Op::GetColumn(_) | Op::Not | Op::Negate => 0,
            Op::MatchConst(_) | Op::RegexpConst(_) => 0,
            Op::Pop => -1,
            Op::Call { argc, .. } => 1 - *argc as i32,
            Op::And(n) | Op::Or(n) | Op::AndNot(n) => 1 - *n as i32,
            Op::GetValue
            | Op::Match
            | Op::Prefix
            | Op::Suffix
            | Op::Regexp
            | Op::Eq
            | Op::Ne
            | Op::Lt
            | Op::Gt
            | Op::Le
            | Op::Ge
            | Op::Add
            | Op::Sub
            | Op::Mul
            | Op::Div
            | Op::Mod => -1,
        }
    }
}
