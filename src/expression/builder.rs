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

// Expression Builders
//
// Typed helpers that assemble an Expression over one table without writing
// operation records by hand:
//
//   let age = records.column(&store, "age")?;
//   let expr = records.build(&store, Some(age.greater(20) & age.less(30)))?;
//
// Every comparison lowers to
//   Push $0, Push "column", GET_VALUE(2), Push value, OP(2)
// and a builder without conditions produces the always-true `1 OR 1`.

use std::ops::{BitAnd, BitOr};
use std::sync::Arc;

use super::{Expression, VariableHandle};
use crate::core::{Domain, Error, Operator, Result, TableId, Value};
use crate::parser::ParseOptions;
use crate::storage::{ColumnRef, Context};

/// A condition tree built from column comparisons and sub-queries
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `column OP value`
    Binary {
        operator: Operator,
        column: Arc<str>,
        value: Value,
    },
    /// Query text parsed into the expression
    Query { text: String, options: ParseOptions },
    And(Vec<Condition>),
    Or(Vec<Condition>),
}

impl Condition {
    /// A set with no members appends nothing
    pub fn is_empty(&self) -> bool {
        match self {
            Condition::And(members) | Condition::Or(members) => members.is_empty(),
            _ => false,
        }
    }

    fn build(&self, expression: &mut Expression, record: VariableHandle) -> Result<()> {
        match self {
            Condition::Binary {
                operator,
                column,
                value,
            } => {
                expression.append_object(record, Operator::Push, 1)?;
                expression.append_constant(Value::text_arc(Arc::clone(column)), Operator::Push, 1)?;
                expression.append_operation(Operator::GetValue, 2)?;
                expression.append_constant(value.clone(), Operator::Push, 1)?;
                expression.append_operation(*operator, 2)
            }
            Condition::Query { text, options } => expression.parse(text, options),
            Condition::And(members) => Self::build_set(expression, record, Operator::And, members),
            Condition::Or(members) => Self::build_set(expression, record, Operator::Or, members),
        }
    }

    fn build_set(
        expression: &mut Expression,
        record: VariableHandle,
        operator: Operator,
        members: &[Condition],
    ) -> Result<()> {
        if members.is_empty() {
            return Ok(());
        }
        for member in members {
            member.build(expression, record)?;
        }
        let arity = i32::try_from(members.len())
            .map_err(|_| Error::invalid_argument("too many conditions"))?;
        expression.append_operation(operator, arity)
    }
}

impl BitAnd for Condition {
    type Output = Condition;

    fn bitand(self, other: Condition) -> Condition {
        match self {
            Condition::And(mut members) => {
                members.push(other);
                Condition::And(members)
            }
            left => Condition::And(vec![left, other]),
        }
    }
}

impl BitOr for Condition {
    type Output = Condition;

    fn bitor(self, other: Condition) -> Condition {
        match self {
            Condition::Or(mut members) => {
                members.push(other);
                Condition::Or(members)
            }
            left => Condition::Or(vec![left, other]),
        }
    }
}

/// Define the record variable, lower the condition and compile
fn build_expression(
    ctx: &dyn Context,
    name: Option<&str>,
    table: TableId,
    condition: Option<Condition>,
) -> Result<Expression> {
    let mut expression = match name {
        Some(name) => Expression::named(name),
        None => Expression::new(),
    };
    let record = expression.define_variable(None, Domain::Table(table))?;

    match condition {
        Some(condition) if !condition.is_empty() => condition.build(&mut expression, record)?,
        _ => {
            expression.append_constant(1, Operator::Push, 1)?;
            expression.append_constant(1, Operator::Push, 1)?;
            expression.append_operation(Operator::Or, 2)?;
        }
    }

    expression.compile(ctx)?;
    Ok(expression)
}

/// Builds expressions over the records of a table
#[derive(Debug, Clone)]
pub struct RecordExpressionBuilder {
    table: TableId,
    name: Option<String>,
    query: Option<Condition>,
}

impl RecordExpressionBuilder {
    pub fn new(table: TableId) -> Self {
        Self {
            table,
            name: None,
            query: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Query text always ANDed with the built condition
    pub fn with_query(mut self, query: impl Into<String>, options: ParseOptions) -> Self {
        self.query = Some(Self::query_condition(query.into(), options));
        self
    }

    pub fn table(&self) -> TableId {
        self.table
    }

    /// A builder for one column of the table
    pub fn column(&self, ctx: &dyn Context, name: &str) -> Result<ColumnExpressionBuilder> {
        let column = ctx.column(self.table, name).map_err(|status| {
            let table = ctx
                .table_name(self.table)
                .map_or_else(|| self.table.to_string(), |n| n.to_string());
            Error::invalid_argument(format!(
                "unknown column <{:?}> for table <{}>: {}",
                name, table, status.message
            ))
        })?;
        Ok(ColumnExpressionBuilder::new(column))
    }

    /// Sub-query against an optional default column, query grammar unless set
    pub fn match_query(&self, query: impl Into<String>, default_column: Option<&str>) -> Condition {
        let mut options = ParseOptions::default();
        if let Some(column) = default_column {
            options = options.with_default_column(column);
        }
        Self::query_condition(query.into(), options)
    }

    fn query_condition(text: String, options: ParseOptions) -> Condition {
        Condition::Query { text, options }
    }

    /// Build and compile the expression
    pub fn build(&self, ctx: &dyn Context, condition: Option<Condition>) -> Result<Expression> {
        let condition = combine(self.query.clone(), condition);
        build_expression(ctx, self.name.as_deref(), self.table, condition)
    }
}

/// Builds comparisons against one column
#[derive(Debug, Clone)]
pub struct ColumnExpressionBuilder {
    column: ColumnRef,
    local_name: Arc<str>,
    name: Option<String>,
    query: Option<Condition>,
}

impl ColumnExpressionBuilder {
    pub fn new(column: ColumnRef) -> Self {
        let local_name: Arc<str> = match column.name.rsplit_once('.') {
            Some((_, local)) => Arc::from(local),
            None => Arc::clone(&column.name),
        };
        Self {
            column,
            local_name,
            name: None,
            query: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Query text against this column, ANDed with the built condition
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(self.match_query(query));
        self
    }

    /// Column name without the table prefix
    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    pub fn equal(&self, value: impl Into<Value>) -> Condition {
        self.binary(Operator::Equal, value.into())
    }

    pub fn matches(&self, value: impl Into<Value>) -> Condition {
        self.binary(Operator::Match, value.into())
    }

    pub fn less(&self, value: impl Into<Value>) -> Condition {
        self.binary(Operator::Less, value.into())
    }

    pub fn less_equal(&self, value: impl Into<Value>) -> Condition {
        self.binary(Operator::LessEqual, value.into())
    }

    pub fn greater(&self, value: impl Into<Value>) -> Condition {
        self.binary(Operator::Greater, value.into())
    }

    pub fn greater_equal(&self, value: impl Into<Value>) -> Condition {
        self.binary(Operator::GreaterEqual, value.into())
    }

    /// Query text with this column as the default column
    pub fn match_query(&self, query: impl Into<String>) -> Condition {
        Condition::Query {
            text: query.into(),
            options: ParseOptions::default().with_default_column(self.local_name.to_string()),
        }
    }

    /// Build and compile an expression over the column's table
    pub fn build(&self, ctx: &dyn Context, condition: Option<Condition>) -> Result<Expression> {
        let condition = combine(self.query.clone(), condition);
        build_expression(ctx, self.name.as_deref(), self.column.table, condition)
    }

    fn binary(&self, operator: Operator, value: Value) -> Condition {
        Condition::Binary {
            operator,
            column: Arc::clone(&self.local_name),
            value: self.normalize(value),
        }
    }

    /// Integers compared against a reference column name records
    fn normalize(&self, value: Value) -> Value {
        match (self.column.range, value) {
            (Domain::Table(table), Value::Integer(id)) => match u32::try_from(id) {
                Ok(id) => Value::record(table, id),
                Err(_) => Value::Integer(id),
            },
            (_, value) => value,
        }
    }
}

fn combine(query: Option<Condition>, condition: Option<Condition>) -> Option<Condition> {
    match (query, condition) {
        (Some(query), Some(condition)) => Some(query & condition),
        (query, condition) => query.or(condition),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DataType, RecordRef};
    use crate::storage::MemoryStore;

    fn users() -> (MemoryStore, TableId, Vec<RecordRef>) {
        let mut store = MemoryStore::new();
        let users = store.create_table("Users", Some(DataType::Text)).unwrap();
        store
            .add_column(users, "name", Domain::Scalar(DataType::Text))
            .unwrap();
        store
            .add_column(users, "age", Domain::Scalar(DataType::Integer))
            .unwrap();
        store
            .add_column(users, "friend", Domain::Table(users))
            .unwrap();
        let mut records = Vec::new();
        for (key, name, age) in [("alice", "Alice", 30), ("bob", "Bob Groonga", 21), ("carol", "Carol", 45)] {
            records.push(
                store
                    .insert(
                        users,
                        Some(Value::text(key)),
                        &[("name", Value::text(name)), ("age", Value::integer(age))],
                    )
                    .unwrap(),
            );
        }
        store
            .set_value(records[1], "friend", Value::Record(records[0]))
            .unwrap();
        (store, users, records)
    }

    fn matching(store: &MemoryStore, expr: &mut Expression, records: &[RecordRef]) -> Vec<u32> {
        records
            .iter()
            .filter(|r| expr.execute(store, &[Value::Record(**r)]).unwrap().is_truthy())
            .map(|r| r.id)
            .collect()
    }

    #[test]
    fn test_binary_lowering() {
        let (store, users, _) = users();
        let builder = RecordExpressionBuilder::new(users);
        let age = builder.column(&store, "age").unwrap();
        let expr = builder.build(&store, Some(age.greater(20))).unwrap();
        let ops: Vec<String> = expr.operations().iter().map(|op| op.to_string()).collect();
        assert_eq!(ops, vec!["$0", "\"age\"", "GET_VALUE(2)", "20", "GREATER(2)"]);
    }

    #[test]
    fn test_combinators() {
        let (store, users, records) = users();
        let builder = RecordExpressionBuilder::new(users);
        let age = builder.column(&store, "age").unwrap();
        let name = builder.column(&store, "name").unwrap();

        let mut expr = builder
            .build(&store, Some(age.greater_equal(25) & age.less(40)))
            .unwrap();
        assert_eq!(matching(&store, &mut expr, &records), vec![1]);

        let mut expr = builder
            .build(&store, Some(name.matches("groonga") | age.equal(45)))
            .unwrap();
        assert_eq!(matching(&store, &mut expr, &records), vec![2, 3]);

        let set = age.less_equal(30) & age.greater(21) & name.equal("Alice");
        assert!(matches!(&set, Condition::And(members) if members.len() == 3));
    }

    #[test]
    fn test_empty_builder_is_always_true() {
        let (store, users, records) = users();
        let mut expr = RecordExpressionBuilder::new(users)
            .with_name("all")
            .build(&store, None)
            .unwrap();
        let ops: Vec<String> = expr.operations().iter().map(|op| op.to_string()).collect();
        assert_eq!(ops, vec!["1", "1", "OR(2)"]);
        assert_eq!(expr.name(), Some("all"));
        assert_eq!(matching(&store, &mut expr, &records), vec![1, 2, 3]);

        let mut expr = RecordExpressionBuilder::new(users)
            .build(&store, Some(Condition::And(Vec::new())))
            .unwrap();
        assert_eq!(matching(&store, &mut expr, &records), vec![1, 2, 3]);
    }

    #[test]
    fn test_reference_column_normalizes_ids() {
        let (store, users, records) = users();
        let builder = RecordExpressionBuilder::new(users);
        let friend = builder.column(&store, "friend").unwrap();
        let condition = friend.equal(1);
        assert!(matches!(
            &condition,
            Condition::Binary { value: Value::Record(r), .. } if r.id == 1
        ));
        let mut expr = builder.build(&store, Some(condition)).unwrap();
        assert_eq!(matching(&store, &mut expr, &records), vec![2]);
    }

    #[test]
    fn test_query_conditions() {
        let (store, users, records) = users();
        let builder = RecordExpressionBuilder::new(users);
        let name = builder.column(&store, "name").unwrap();
        let age = builder.column(&store, "age").unwrap();

        let mut expr = builder
            .build(&store, Some(name.match_query("bob OR carol")))
            .unwrap();
        assert_eq!(matching(&store, &mut expr, &records), vec![2, 3]);

        let mut expr = RecordExpressionBuilder::new(users)
            .with_query("age:>25", ParseOptions::default())
            .build(&store, Some(age.less(40)))
            .unwrap();
        assert_eq!(matching(&store, &mut expr, &records), vec![1]);

        let mut expr = builder
            .build(&store, Some(builder.match_query("alice", Some("_key"))))
            .unwrap();
        assert_eq!(matching(&store, &mut expr, &records), vec![1]);
    }

    #[test]
    fn test_unknown_column() {
        let (store, users, _) = users();
        let err = RecordExpressionBuilder::new(users)
            .column(&store, "nope")
            .unwrap_err();
        assert_eq!(err.kind(), crate::core::ErrorKind::Argument);
        assert!(err.to_string().contains("for table <Users>"));
    }
}
