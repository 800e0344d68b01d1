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

//! The store collaborator interface
//!
//! An expression never owns a store. Every call that needs one (compile,
//! parse, execute) takes a `&dyn Context` and resolves tables, columns,
//! functions and record values through it.

use std::fmt;
use std::sync::Arc;

use crate::core::{ColumnId, Domain, RecordRef, Status, TableId, Value, ValueCell};
use crate::functions::ScalarFunction;

/// Outcome of a collaborator call
pub type StatusResult<T> = std::result::Result<T, Status>;

/// A resolved table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub id: TableId,
    pub name: Arc<str>,
}

/// A resolved column of a table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    pub table: TableId,
    pub id: ColumnId,
    pub name: Arc<str>,
    /// Values stored in the column
    pub range: Domain,
}

/// An object a name resolves to
#[derive(Clone)]
pub enum ObjectRef {
    Table(TableRef),
    Column(ColumnRef),
    Function(Arc<dyn ScalarFunction>),
}

impl ObjectRef {
    /// The name used when describing the object
    pub fn name(&self) -> &str {
        match self {
            ObjectRef::Table(t) => &t.name,
            ObjectRef::Column(c) => &c.name,
            ObjectRef::Function(f) => f.name(),
        }
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectRef::Table(t) => f.debug_tuple("Table").field(t).finish(),
            ObjectRef::Column(c) => f.debug_tuple("Column").field(c).finish(),
            ObjectRef::Function(func) => f.debug_tuple("Function").field(&func.name()).finish(),
        }
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ObjectRef::Table(a), ObjectRef::Table(b)) => a == b,
            (ObjectRef::Column(a), ObjectRef::Column(b)) => a == b,
            (ObjectRef::Function(a), ObjectRef::Function(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// The store an expression reads from
pub trait Context {
    /// Resolve a name to a table, column (`Table.column`) or function
    fn resolve_object(&self, name: &str) -> StatusResult<ObjectRef>;

    /// Resolve a column of a table, including the `_id` and `_key` pseudo columns
    fn column(&self, table: TableId, name: &str) -> StatusResult<ColumnRef>;

    /// Read a column value of a record
    fn get_value(&self, record: RecordRef, column: ColumnId) -> StatusResult<Value>;

    /// Name of a table
    fn table_name(&self, table: TableId) -> Option<Arc<str>>;

    /// Allocate a scratch cell for a domain; dropping the cell releases it
    fn open_value_buffer(&self, domain: Domain) -> ValueCell {
        ValueCell::new(domain)
    }

    /// A failure recorded by the store outside of a return value
    fn last_error(&self) -> Option<Status> {
        None
    }
}
