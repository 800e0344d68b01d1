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

// Variable Binding Table
//
// Positions are dense and assigned in definition order. Names may repeat:
// name lookup finds the latest definition while every position stays
// addressable.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::core::{Domain, Error, Result, Value, ValueCell};

/// Handle to a defined variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VariableHandle(pub(crate) usize);

impl VariableHandle {
    #[inline]
    pub fn position(&self) -> usize {
        self.0
    }
}

/// A named or positional slot
#[derive(Debug, Clone)]
pub struct Variable {
    name: Option<Arc<str>>,
    position: usize,
    cell: ValueCell,
}

impl Variable {
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn domain(&self) -> Domain {
        self.cell.domain()
    }

    /// The last bound value
    pub fn value(&self) -> &Value {
        self.cell.value()
    }
}

/// All variables of an expression
#[derive(Debug, Clone, Default)]
pub struct VariableTable {
    vars: Vec<Variable>,
    by_name: FxHashMap<Arc<str>, usize>,
}

impl VariableTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a variable; table domains start out as the nil record
    pub fn define(&mut self, name: Option<&str>, domain: Domain) -> VariableHandle {
        let position = self.vars.len();
        let name: Option<Arc<str>> = name.map(Arc::from);
        if let Some(name) = &name {
            self.by_name.insert(Arc::clone(name), position);
        }
        self.vars.push(Variable {
            name,
            position,
            cell: ValueCell::new(domain),
        });
        VariableHandle(position)
    }

    pub fn lookup(&self, name: &str) -> Result<VariableHandle> {
        self.by_name
            .get(name)
            .map(|&position| VariableHandle(position))
            .ok_or_else(|| Error::VariableNotFound(name.to_string()))
    }

    pub fn lookup_by_position(&self, offset: usize) -> Result<VariableHandle> {
        if offset < self.vars.len() {
            Ok(VariableHandle(offset))
        } else {
            Err(Error::VariableOutOfRange {
                offset,
                count: self.vars.len(),
            })
        }
    }

    /// Get a variable by handle
    ///
    /// Handles are only minted by this table, so a handle from another
    /// expression with more variables is reported as out of range.
    pub fn get(&self, handle: VariableHandle) -> Result<&Variable> {
        self.vars.get(handle.0).ok_or(Error::VariableOutOfRange {
            offset: handle.0,
            count: self.vars.len(),
        })
    }

    /// Current value at a position
    #[inline]
    pub fn value_at(&self, position: usize) -> Option<&Value> {
        self.vars.get(position).map(|v| v.cell.value())
    }

    /// Bind a value to a position, checked against the variable's domain
    pub fn bind(&mut self, position: usize, value: Value) -> Result<()> {
        let count = self.vars.len();
        let var = self
            .vars
            .get_mut(position)
            .ok_or(Error::VariableOutOfRange {
                offset: position,
                count,
            })?;
        var.cell.set(value)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.vars.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DataType, RecordRef, TableId};

    #[test]
    fn test_define_and_lookup() {
        let mut table = VariableTable::new();
        let record = table.define(Some("record"), Domain::Table(TableId(1)));
        let anon = table.define(None, Domain::Any);

        assert_eq!(record.position(), 0);
        assert_eq!(anon.position(), 1);
        assert_eq!(table.lookup("record").unwrap(), record);
        assert!(table.lookup("missing").unwrap_err().is_not_found());
        assert_eq!(
            table.value_at(0),
            Some(&Value::Record(RecordRef::nil(TableId(1))))
        );
    }

    #[test]
    fn test_duplicate_names_shadow() {
        let mut table = VariableTable::new();
        let first = table.define(Some("x"), Domain::Any);
        let second = table.define(Some("x"), Domain::Scalar(DataType::Integer));

        assert_eq!(table.lookup("x").unwrap(), second);
        assert_eq!(table.lookup_by_position(0).unwrap(), first);
        assert_eq!(table.get(first).unwrap().name(), Some("x"));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_lookup_out_of_range() {
        let table = VariableTable::new();
        assert!(matches!(
            table.lookup_by_position(0),
            Err(Error::VariableOutOfRange {
                offset: 0,
                count: 0
            })
        ));
    }

    #[test]
    fn test_bind_checks_domain() {
        let mut table = VariableTable::new();
        table.define(Some("record"), Domain::Table(TableId(3)));

        table.bind(0, Value::integer(7)).unwrap();
        assert_eq!(table.value_at(0), Some(&Value::record(TableId(3), 7)));

        let err = table.bind(0, Value::text("nope")).unwrap_err();
        assert!(matches!(err, Error::DomainMismatch { .. }));
        // Failed binds keep the previous value
        assert_eq!(table.value_at(0), Some(&Value::record(TableId(3), 7)));
    }
}
