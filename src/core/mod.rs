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

//! Core types for Querex
//!
//! - [`DataType`] - Value type enumeration
//! - [`Domain`] - What a cell, column or variable accepts
//! - [`Operator`] - The expression instruction set
//! - [`Value`] - Runtime values with type information
//! - [`ValueCell`] - A value bound to a domain
//! - [`Error`] - Error types for all stages

pub mod error;
pub mod types;
pub mod value;

pub use error::{Error, ErrorKind, Result, Status, StatusCode};
pub use types::{ColumnId, DataType, Domain, Operator, RecordRef, TableId, UNBOUNDED_ARITY};
pub use value::{Value, ValueCell};
