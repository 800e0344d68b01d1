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

//! In-memory store
//!
//! A small table/column/record store implementing [`Context`]. Record ids
//! start at 1 and are never reused. Tables may carry a key; `_key` reads
//! it and `_id` reads the record id.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use super::context::{ColumnRef, Context, ObjectRef, StatusResult, TableRef};
use crate::core::{
    ColumnId, DataType, Domain, Error, RecordRef, Result, Status, TableId, Value, ValueCell,
};
use crate::functions::{FunctionRegistry, ScalarFunction};

struct ColumnDef {
    name: Arc<str>,
    range: Domain,
}

struct TableData {
    name: Arc<str>,
    key_type: Option<DataType>,
    columns: Vec<ColumnDef>,
    column_index: FxHashMap<String, ColumnId>,
    /// Row `i` holds record id `i + 1`
    rows: Vec<Vec<Value>>,
    keys: Vec<Value>,
}

impl TableData {
    fn row_index(&self, id: u32) -> Option<usize> {
        let index = (id as usize).checked_sub(1)?;
        (index < self.rows.len()).then_some(index)
    }
}

/// An in-memory store of tables and records
pub struct MemoryStore {
    tables: Vec<TableData>,
    table_index: FxHashMap<String, TableId>,
    functions: FunctionRegistry,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store with the built-in functions
    pub fn new() -> Self {
        Self::with_functions(FunctionRegistry::new())
    }

    /// Create an empty store with a custom function registry
    pub fn with_functions(functions: FunctionRegistry) -> Self {
        Self {
            tables: Vec::new(),
            table_index: FxHashMap::default(),
            functions,
        }
    }

    /// Register an additional function
    pub fn register_function<F: ScalarFunction + 'static>(&mut self, function: F) {
        self.functions.register(function);
    }

    /// Create a table; `key_type` gives the table a `_key` of that type
    pub fn create_table(&mut self, name: &str, key_type: Option<DataType>) -> Result<TableId> {
        if self.table_index.contains_key(name) {
            return Err(Error::invalid_argument(format!(
                "table '{}' already exists",
                name
            )));
        }
        let id = TableId(self.tables.len() as u32 + 1);
        self.tables.push(TableData {
            name: Arc::from(name),
            key_type,
            columns: Vec::new(),
            column_index: FxHashMap::default(),
            rows: Vec::new(),
            keys: Vec::new(),
        });
        self.table_index.insert(name.to_string(), id);
        Ok(id)
    }

    /// Add a column; existing records get the column's uninitialized value
    pub fn add_column(&mut self, table: TableId, name: &str, range: Domain) -> Result<ColumnId> {
        if name.starts_with('_') {
            return Err(Error::invalid_argument(format!(
                "column name '{}' is reserved",
                name
            )));
        }
        let data = self.table_mut(table)?;
        if data.column_index.contains_key(name) {
            return Err(Error::invalid_argument(format!(
                "column '{}' already exists",
                name
            )));
        }
        let id = ColumnId(data.columns.len() as u32);
        let initial = ValueCell::new(range).into_value();
        for row in &mut data.rows {
            row.push(initial.clone());
        }
        data.columns.push(ColumnDef {
            name: Arc::from(name),
            range,
        });
        data.column_index.insert(name.to_string(), id);
        Ok(id)
    }

    /// Append a record and return its reference
    pub fn add_record(&mut self, table: TableId, key: Option<Value>) -> Result<RecordRef> {
        let data = self.table_mut(table)?;
        let key = match (data.key_type, key) {
            (Some(dt), Some(key)) => key.coerce_to_domain(Domain::Scalar(dt))?,
            (Some(_), None) => {
                return Err(Error::invalid_argument(format!(
                    "table '{}' requires a key",
                    data.name
                )))
            }
            (None, Some(_)) => {
                return Err(Error::invalid_argument(format!(
                    "table '{}' has no key",
                    data.name
                )))
            }
            (None, None) => Value::null_unknown(),
        };
        let row = data
            .columns
            .iter()
            .map(|c| ValueCell::new(c.range).into_value())
            .collect();
        data.rows.push(row);
        data.keys.push(key);
        Ok(RecordRef {
            table,
            id: data.rows.len() as u32,
        })
    }

    /// Set a column value of a record, coercing it into the column range
    pub fn set_value(&mut self, record: RecordRef, column: &str, value: Value) -> Result<()> {
        let data = self.table_mut(record.table)?;
        let column_id = *data
            .column_index
            .get(column)
            .ok_or_else(|| Error::invalid_argument(format!("column '{}' not found", column)))?;
        let range = data.columns[column_id.0 as usize].range;
        let index = data
            .row_index(record.id)
            .ok_or_else(|| Error::invalid_argument(format!("record {} not found", record.id)))?;
        let cell = ValueCell::with_value(range, value)?;
        data.rows[index][column_id.0 as usize] = cell.into_value();
        Ok(())
    }

    /// Append a record and set the given columns
    pub fn insert(
        &mut self,
        table: TableId,
        key: Option<Value>,
        values: &[(&str, Value)],
    ) -> Result<RecordRef> {
        let record = self.add_record(table, key)?;
        for (column, value) in values {
            self.set_value(record, column, value.clone())?;
        }
        Ok(record)
    }

    /// Iterate over all records of a table
    pub fn records(&self, table: TableId) -> impl Iterator<Item = RecordRef> + '_ {
        let count = self
            .table(table)
            .map(|data| data.rows.len() as u32)
            .unwrap_or(0);
        (1..=count).map(move |id| RecordRef { table, id })
    }

    /// Look up a table id by name
    pub fn table_id(&self, name: &str) -> Option<TableId> {
        self.table_index.get(name).copied()
    }

    fn table(&self, table: TableId) -> Option<&TableData> {
        (table.0 as usize)
            .checked_sub(1)
            .and_then(|index| self.tables.get(index))
    }

    fn table_mut(&mut self, table: TableId) -> Result<&mut TableData> {
        (table.0 as usize)
            .checked_sub(1)
            .and_then(|index| self.tables.get_mut(index))
            .ok_or_else(|| Error::invalid_argument(format!("table {} not found", table)))
    }

    fn table_status(&self, table: TableId) -> StatusResult<&TableData> {
        self.table(table)
            .ok_or_else(|| Status::not_found(format!("no such table: {}", table)))
    }
}

impl Context for MemoryStore {
    fn resolve_object(&self, name: &str) -> StatusResult<ObjectRef> {
        if let Some((table_name, column)) = name.split_once('.') {
            let table = self
                .table_id(table_name)
                .ok_or_else(|| Status::not_found(format!("no such table: <{}>", table_name)))?;
            return self.column(table, column).map(ObjectRef::Column);
        }
        if let Some(id) = self.table_id(name) {
            let name = self.table_status(id)?.name.clone();
            return Ok(ObjectRef::Table(TableRef { id, name }));
        }
        if let Some(function) = self.functions.get(name) {
            return Ok(ObjectRef::Function(function));
        }
        Err(Status::not_found(format!("no such object: <{}>", name)))
    }

    fn column(&self, table: TableId, name: &str) -> StatusResult<ColumnRef> {
        let data = self.table_status(table)?;
        let (id, range) = match name {
            "_id" => (ColumnId::ID, Domain::Scalar(DataType::Integer)),
            "_key" => match data.key_type {
                Some(dt) => (ColumnId::KEY, Domain::Scalar(dt)),
                None => {
                    return Err(Status::not_found(format!(
                        "table <{}> has no _key",
                        data.name
                    )))
                }
            },
            _ => {
                let id = *data.column_index.get(name).ok_or_else(|| {
                    Status::not_found(format!("no such column: <{}.{}>", data.name, name))
                })?;
                (id, data.columns[id.0 as usize].range)
            }
        };
        Ok(ColumnRef {
            table,
            id,
            name: Arc::from(format!("{}.{}", data.name, name)),
            range,
        })
    }

    fn get_value(&self, record: RecordRef, column: ColumnId) -> StatusResult<Value> {
        let data = self.table_status(record.table)?;
        if column == ColumnId::ID {
            return Ok(Value::Integer(record.id as i64));
        }
        let range = if column == ColumnId::KEY {
            Domain::Scalar(data.key_type.unwrap_or(DataType::Null))
        } else {
            data.columns
                .get(column.0 as usize)
                .map(|c| c.range)
                .ok_or_else(|| Status::not_found(format!("no such column: {}", column.0)))?
        };
        if record.is_nil() {
            return Ok(Value::Null(range.data_type().unwrap_or(DataType::Null)));
        }
        let index = data.row_index(record.id).ok_or_else(|| {
            Status::not_found(format!("no such record: <{}:{}>", data.name, record.id))
        })?;
        if column == ColumnId::KEY {
            return Ok(data.keys[index].clone());
        }
        Ok(data.rows[index][column.0 as usize].clone())
    }

    fn table_name(&self, table: TableId) -> Option<Arc<str>> {
        self.table(table).map(|data| data.name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> (MemoryStore, TableId) {
        let mut store = MemoryStore::new();
        let users = store.create_table("Users", Some(DataType::Text)).unwrap();
        store
            .add_column(users, "name", Domain::Scalar(DataType::Text))
            .unwrap();
        store
            .add_column(users, "age", Domain::Scalar(DataType::Integer))
            .unwrap();
        store
            .insert(
                users,
                Some(Value::text("alice")),
                &[("name", Value::text("Alice")), ("age", Value::integer(30))],
            )
            .unwrap();
        (store, users)
    }

    #[test]
    fn test_resolve_objects() {
        let (store, users) = users();
        match store.resolve_object("Users").unwrap() {
            ObjectRef::Table(t) => assert_eq!(t.id, users),
            other => panic!("unexpected {:?}", other),
        }
        match store.resolve_object("Users.age").unwrap() {
            ObjectRef::Column(c) => {
                assert_eq!(c.range, Domain::Scalar(DataType::Integer));
                assert_eq!(&*c.name, "Users.age");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            store.resolve_object("lower").unwrap(),
            ObjectRef::Function(_)
        ));
        assert!(store.resolve_object("Nope").is_err());
        assert!(store.resolve_object("Users.nope").is_err());
    }

    #[test]
    fn test_get_values() {
        let (store, users) = users();
        let record = RecordRef { table: users, id: 1 };
        let name = store.column(users, "name").unwrap();
        assert_eq!(
            store.get_value(record, name.id).unwrap(),
            Value::text("Alice")
        );
        assert_eq!(
            store.get_value(record, ColumnId::ID).unwrap(),
            Value::Integer(1)
        );
        assert_eq!(
            store.get_value(record, ColumnId::KEY).unwrap(),
            Value::text("alice")
        );
        // nil record reads NULL
        assert!(store
            .get_value(RecordRef::nil(users), name.id)
            .unwrap()
            .is_null());
        assert!(store
            .get_value(RecordRef { table: users, id: 9 }, name.id)
            .is_err());
    }

    #[test]
    fn test_column_range_coercion() {
        let (mut store, users) = users();
        let record = store
            .add_record(users, Some(Value::text("bob")))
            .unwrap();
        assert!(store
            .set_value(record, "age", Value::text("old"))
            .is_err());
        store.set_value(record, "age", Value::integer(41)).unwrap();
        let age = store.column(users, "age").unwrap();
        assert_eq!(store.get_value(record, age.id).unwrap(), Value::Integer(41));
        assert_eq!(store.records(users).count(), 2);
    }

    #[test]
    fn test_keys_are_checked() {
        let (mut store, users) = users();
        assert!(store.add_record(users, None).is_err());
        let plain = store.create_table("Plain", None).unwrap();
        assert!(store.add_record(plain, Some(Value::integer(1))).is_err());
        assert!(store.column(plain, "_key").is_err());
        assert!(store.create_table("Plain", None).is_err());
        assert!(store.add_column(plain, "_hidden", Domain::Any).is_err());
    }
}
