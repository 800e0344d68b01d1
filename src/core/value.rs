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

//! Value type for Querex - runtime values with type information
//!
//! [`Value`] is what the VM pushes, pops and returns. [`ValueCell`] pairs a
//! value with the [`Domain`] it must conform to; cells back variables,
//! constants and the expression result slot.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use super::error::{Error, Result};
use super::types::{DataType, Domain, RecordRef, TableId};

/// A runtime value with type information
///
/// Text uses `Arc<str>` so values pulled from a store can be pushed onto the
/// VM stack without copying.
#[derive(Debug, Clone)]
pub enum Value {
    /// NULL value with optional type hint
    Null(DataType),

    /// Boolean value
    Boolean(bool),

    /// 64-bit signed integer
    Integer(i64),

    /// 64-bit floating point
    Float(f64),

    /// UTF-8 text string (Arc for cheap cloning)
    Text(Arc<str>),

    /// Reference to a record
    Record(RecordRef),
}

impl Value {
    // =========================================================================
    // Constructors
    // =========================================================================

    /// Create a NULL value with a type hint
    pub fn null(data_type: DataType) -> Self {
        Value::Null(data_type)
    }

    /// Create a NULL value with unknown type
    pub fn null_unknown() -> Self {
        Value::Null(DataType::Null)
    }

    /// Create an integer value
    pub fn integer(value: i64) -> Self {
        Value::Integer(value)
    }

    /// Create a float value
    pub fn float(value: f64) -> Self {
        Value::Float(value)
    }

    /// Create a text value
    pub fn text(value: impl AsRef<str>) -> Self {
        Value::Text(Arc::from(value.as_ref()))
    }

    /// Create a text value from Arc<str> (zero-copy)
    pub fn text_arc(value: Arc<str>) -> Self {
        Value::Text(value)
    }

    /// Create a boolean value
    pub fn boolean(value: bool) -> Self {
        Value::Boolean(value)
    }

    /// Create a record reference
    pub fn record(table: TableId, id: u32) -> Self {
        Value::Record(RecordRef { table, id })
    }

    // =========================================================================
    // Type accessors
    // =========================================================================

    /// Returns the data type of this value
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Null(dt) => *dt,
            Value::Boolean(_) => DataType::Boolean,
            Value::Integer(_) => DataType::Integer,
            Value::Float(_) => DataType::Float,
            Value::Text(_) => DataType::Text,
            Value::Record(_) => DataType::Record,
        }
    }

    /// Returns true if this value is NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null(_))
    }

    /// Extract as i64 (floats are truncated, booleans map to 0/1)
    pub fn as_int64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            Value::Float(v) => Some(*v as i64),
            Value::Boolean(b) => Some(*b as i64),
            Value::Record(r) => Some(r.id as i64),
            _ => None,
        }
    }

    /// Extract as f64
    pub fn as_float64(&self) -> Option<f64> {
        match self {
            Value::Integer(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Borrow the text content
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Clone the shared text content
    pub fn as_arc_str(&self) -> Option<Arc<str>> {
        match self {
            Value::Text(s) => Some(Arc::clone(s)),
            _ => None,
        }
    }

    /// Extract a record reference
    pub fn as_record(&self) -> Option<RecordRef> {
        match self {
            Value::Record(r) => Some(*r),
            _ => None,
        }
    }

    /// Truthiness used by logical operators and filters
    ///
    /// NULL is false; numbers are true when non-zero; text when non-empty;
    /// records when not the nil record.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null(_) => false,
            Value::Boolean(b) => *b,
            Value::Integer(v) => *v != 0,
            Value::Float(v) => *v != 0.0,
            Value::Text(s) => !s.is_empty(),
            Value::Record(r) => !r.is_nil(),
        }
    }

    // =========================================================================
    // Comparison
    // =========================================================================

    /// Compare two non-null values for ordering
    ///
    /// Returns None when either side is NULL or the types are incomparable.
    /// Integers and floats compare numerically.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null(_), _) | (_, Value::Null(_)) => None,
            (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => Some(compare_floats(*a, *b)),
            (Value::Integer(a), Value::Float(b)) => Some(compare_floats(*a as f64, *b)),
            (Value::Float(a), Value::Integer(b)) => Some(compare_floats(*a, *b as f64)),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            (Value::Record(a), Value::Record(b)) if a.table == b.table => Some(a.id.cmp(&b.id)),
            _ => None,
        }
    }

    // =========================================================================
    // Domain coercion
    // =========================================================================

    /// Convert this value so it fits `domain`
    ///
    /// NULL fits every domain. Integers widen to floats, integers become
    /// record references of a table domain, and a NULL stored into a table
    /// domain becomes the nil record of that table.
    pub fn coerce_to_domain(self, domain: Domain) -> Result<Value> {
        match domain {
            Domain::Any => Ok(self),
            Domain::Table(table) => match self {
                Value::Null(_) => Ok(Value::Record(RecordRef::nil(table))),
                Value::Record(r) if r.table == table => Ok(self),
                Value::Integer(id) => u32::try_from(id)
                    .map(|id| Value::Record(RecordRef { table, id }))
                    .map_err(|_| Error::invalid_argument(format!("record id out of range: {}", id))),
                other => Err(Error::DomainMismatch {
                    expected: domain,
                    got: other.data_type(),
                }),
            },
            Domain::Scalar(target) => match (self, target) {
                (Value::Null(_), _) => Ok(Value::Null(target)),
                (v, DataType::Null) => Ok(v),
                (Value::Integer(i), DataType::Float) => Ok(Value::Float(i as f64)),
                (v, t) if v.data_type() == t => Ok(v),
                (other, _) => Err(Error::DomainMismatch {
                    expected: domain,
                    got: other.data_type(),
                }),
            },
        }
    }
}

/// Compare two floats, ordering NaN above everything
fn compare_floats(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or_else(|| match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        _ => Ordering::Less,
    })
}

/// Format a float so integral values keep a trailing `.0`
fn format_float(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{:.1}", v)
    } else {
        format!("{}", v)
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null(DataType::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null(_) => write!(f, "NULL"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", format_float(*v)),
            Value::Text(s) => write!(f, "{}", s),
            Value::Record(r) => write!(f, "{}:{}", r.table, r.id),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null(_), Value::Null(_)) => true,
            (Value::Float(a), Value::Float(b)) => (a.is_nan() && b.is_nan()) || a == b,
            (Value::Integer(i), Value::Float(f)) | (Value::Float(f), Value::Integer(i)) => {
                *f == (*i as f64)
            }
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => a == b,
            _ => false,
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(Arc::from(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(Arc::from(v))
    }
}

impl From<Arc<str>> for Value {
    fn from(v: Arc<str>) -> Self {
        Value::Text(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<RecordRef> for Value {
    fn from(v: RecordRef) -> Self {
        Value::Record(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Value::Null(DataType::Null),
        }
    }
}

/// A value together with the domain it must conform to
///
/// A cell always holds either its uninitialized value (NULL of the domain
/// type, or the nil record for table domains) or a value valid for the
/// domain.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueCell {
    value: Value,
    domain: Domain,
}

impl ValueCell {
    /// Create an uninitialized cell for a domain
    pub fn new(domain: Domain) -> Self {
        Self {
            value: Self::initial_value(domain),
            domain,
        }
    }

    /// Create a cell holding `value`, coerced into `domain`
    pub fn with_value(domain: Domain, value: Value) -> Result<Self> {
        Ok(Self {
            value: value.coerce_to_domain(domain)?,
            domain,
        })
    }

    /// Create an unconstrained cell around a value
    pub fn any(value: Value) -> Self {
        Self {
            value,
            domain: Domain::Any,
        }
    }

    fn initial_value(domain: Domain) -> Value {
        match domain {
            Domain::Any => Value::Null(DataType::Null),
            Domain::Scalar(dt) => Value::Null(dt),
            Domain::Table(table) => Value::Record(RecordRef::nil(table)),
        }
    }

    /// Replace the held value; the cell is unchanged on error
    pub fn set(&mut self, value: Value) -> Result<()> {
        self.value = value.coerce_to_domain(self.domain)?;
        Ok(())
    }

    /// Return the cell to its uninitialized value
    pub fn clear(&mut self) {
        self.value = Self::initial_value(self.domain);
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    /// Returns true if the cell holds its uninitialized value
    pub fn is_initial(&self) -> bool {
        self.value == Self::initial_value(self.domain)
    }
}
