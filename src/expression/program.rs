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

// Compiled Expression Program
//
// A Program is the compiled form of an operation sequence: a linear list
// of VM ops plus the stack depth needed to run it.

use super::ops::{Needle, Op};
use crate::core::Value;

/// Compiled expression program
#[derive(Clone)]
pub struct Program {
    /// The operation sequence
    ops: Vec<Op>,

    /// Maximum stack depth needed (for pre-allocation)
    max_stack_depth: usize,
}

impl Program {
    /// Create a new program from operations.
    /// Automatically applies peephole optimizations (instruction fusion).
    pub fn new(ops: Vec<Op>) -> Self {
        let ops = Self::peephole_optimize(ops);
        let max_stack_depth = Self::compute_stack_depth(&ops);
        Self {
            ops,
            max_stack_depth,
        }
    }

    /// Create a new program without peephole optimization.
    pub fn new_unoptimized(ops: Vec<Op>) -> Self {
        let max_stack_depth = Self::compute_stack_depth(&ops);
        Self {
            ops,
            max_stack_depth,
        }
    }

    /// Get the operations
    #[inline]
    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    /// Get the maximum stack depth needed
    #[inline]
    pub fn max_stack_depth(&self) -> usize {
        self.max_stack_depth
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Compute the maximum stack depth needed for a sequence of operations
    fn compute_stack_depth(ops: &[Op]) -> usize {
        let mut depth: i32 = 0;
        let mut max_depth: i32 = 0;
        for op in ops {
            depth += op.stack_effect();
            max_depth = max_depth.max(depth);
        }
        (max_depth as usize).max(1)
    }

    /// Disassemble the program for debugging
    pub fn disassemble(&self) -> String {
        let mut result = String::new();
        for (i, op) in self.ops.iter().enumerate() {
            result.push_str(&format!("{:04}: {:?}\n", i, op));
        }
        result
    }

    /// Peephole optimizer: fuse common instruction patterns into single ops
    fn peephole_optimize(ops: Vec<Op>) -> Vec<Op> {
        if ops.len() < 2 {
            return ops;
        }

        let mut result = Vec::with_capacity(ops.len());
        let mut iter = ops.into_iter().peekable();

        while let Some(op) = iter.next() {
            let fused = match (&op, iter.peek()) {
                // Pattern 1: LoadVariable + GetColumn → LoadVariableColumn
                (Op::LoadVariable(var), Some(Op::GetColumn(column))) => {
                    Some(Op::LoadVariableColumn(*var, column.clone()))
                }
                // Pattern 2: LoadConst(text) + Match → MatchConst
                (Op::LoadConst(Value::Text(keyword)), Some(Op::Match)) => {
                    Some(Op::MatchConst(Needle::new(keyword)))
                }
                _ => None,
            };
            match fused {
                Some(fused) => {
                    result.push(fused);
                    iter.next();
                }
                None => result.push(op),
            }
        }

        result
    }
}

impl std::fmt::Debug for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Program")
            .field("ops_count", &self.ops.len())
            .field("max_stack_depth", &self.max_stack_depth)
            .finish()
    }
}
