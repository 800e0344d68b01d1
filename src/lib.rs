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

//! # Querex - query expressions for record stores
//!
//! Querex builds, compiles and evaluates search expressions against the
//! records of a store. An expression is a postfix sequence of operations that
//! can be appended by hand, parsed from query or script text, or produced by
//! the condition builders. Compiling resolves names against the store and
//! lowers the sequence to a program for a stack VM. The keywords of positive
//! search conditions are kept so matching text can be turned into tagged
//! snippets.
//!
//! ## Key Features
//!
//! - **Three grammars** - `query` (`groonga OR title:@search`), `column_query`
//!   and `script` (`title @ "groonga" && views > 10`)
//! - **Atomic clauses** - a failing parse keeps the clauses that parsed before it
//! - **Compile-time resolution** - columns, functions and regular expressions
//!   are resolved once, constants are folded
//! - **Snippets** - keyword highlighting with cycling tag pairs
//! - **Builders** - typed conditions lowered to the same operation sequences
//!
//! ## Quick Start
//!
//! ```rust
//! use querex::{DataType, Domain, Expression, MemoryStore, ParseOptions, Value};
//!
//! let mut store = MemoryStore::new();
//! let docs = store.create_table("Docs", None).unwrap();
//! store.add_column(docs, "body", Domain::Scalar(DataType::Text)).unwrap();
//! let record = store
//!     .insert(docs, None, &[("body", Value::text("Rubyでgroonga使って全文検索"))])
//!     .unwrap();
//!
//! let mut expr = Expression::new();
//! expr.define_variable(Some("doc"), Domain::Table(docs)).unwrap();
//! expr.parse("groonga OR search", &ParseOptions::default().with_default_column("body"))
//!     .unwrap();
//!
//! let matched = expr.execute(&store, &[Value::Record(record)]).unwrap();
//! assert!(matched.is_truthy());
//! ```
//!
//! ## Modules
//!
//! - [`core`] - Core types ([`Value`], [`Domain`], [`Operator`], [`Error`])
//! - [`expression`] - [`Expression`], its compiler and VM, condition builders
//! - [`parser`] - Query and script grammars ([`ParseOptions`], [`Grammar`])
//! - [`snippet`] - Keyword snippets ([`Snippet`], [`SnippetOptions`], [`TagPair`])
//! - [`storage`] - The store collaborator ([`Context`]) and [`MemoryStore`]
//! - [`functions`] - Scalar functions callable from expressions

pub mod core;
pub mod expression;
pub mod functions;
pub mod parser;
pub mod snippet;
pub mod storage;

pub use crate::core::{
    DataType, Domain, Error, ErrorKind, Operator, RecordRef, Result, Status, StatusCode, TableId,
    Value,
};
pub use expression::{
    ColumnExpressionBuilder, Condition, Expression, ExpressionState, RecordExpressionBuilder,
};
pub use functions::{FunctionRegistry, ScalarFunction};
pub use parser::{Grammar, ParseError, ParseOptions};
pub use snippet::{Snippet, SnippetOptions, TagPair};
pub use storage::{Context, MemoryStore};
