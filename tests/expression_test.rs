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

//! Expression Tests
//!
//! End-to-end tests: build or parse an expression, compile it against a
//! memory store and evaluate it for every record of a table.

use querex::{
    DataType, Domain, Error, ErrorKind, Expression, Grammar, MemoryStore, Operator, ParseOptions,
    RecordExpressionBuilder, RecordRef, TableId, Value,
};

struct Fixture {
    store: MemoryStore,
    entries: TableId,
}

impl Fixture {
    fn new() -> Self {
        let mut store = MemoryStore::new();
        let entries = store
            .create_table("Entries", Some(DataType::Text))
            .expect("Failed to create table");
        store
            .add_column(entries, "content", Domain::Scalar(DataType::Text))
            .expect("Failed to add column");
        store
            .add_column(entries, "n_likes", Domain::Scalar(DataType::Integer))
            .expect("Failed to add column");

        let rows = [
            ("The first post!", "Welcome! This is my first post!", 5),
            ("Groonga", "I started to use Groonga. It's very fast!", 10),
            ("Mroonga", "I also started to use Mroonga. It's also very fast!", 15),
            ("Good-bye Senna", "I migrated all Senna system!", 3),
            ("Good-bye Tritonn", "I also migrated all Tritonn system!", 3),
        ];
        for (key, content, likes) in rows {
            store
                .insert(
                    entries,
                    Some(Value::text(key)),
                    &[
                        ("content", Value::text(content)),
                        ("n_likes", Value::integer(likes)),
                    ],
                )
                .expect("Failed to insert record");
        }
        Self { store, entries }
    }

    fn expression(&self) -> Expression {
        let mut expr = Expression::new();
        expr.define_variable(Some("entry"), Domain::Table(self.entries))
            .expect("Failed to define variable");
        expr
    }

    fn select(&self, expr: &mut Expression) -> Vec<u32> {
        let records: Vec<RecordRef> = self.store.records(self.entries).collect();
        records
            .into_iter()
            .filter(|record| {
                expr.execute(&self.store, &[Value::Record(*record)])
                    .expect("Failed to execute")
                    .is_truthy()
            })
            .map(|record| record.id)
            .collect()
    }

    fn query(&self, text: &str, options: &ParseOptions) -> Vec<u32> {
        let mut expr = self.expression();
        expr.parse(text, options).expect("Failed to parse");
        self.select(&mut expr)
    }
}

fn content() -> ParseOptions {
    ParseOptions::default().with_default_column("content")
}

// ============================================================================
// Query grammar
// ============================================================================

#[test]
fn test_query_default_join_is_and() {
    let fx = Fixture::new();
    assert_eq!(fx.query("fast groonga", &content()), vec![2]);
    assert_eq!(fx.query("fast OR senna", &content()), vec![2, 3, 4]);
}

#[test]
fn test_query_default_join_override() {
    let fx = Fixture::new();
    let options = content().with_default_join_operator(Operator::Or);
    assert_eq!(fx.query("groonga senna", &options), vec![2, 4]);
}

#[test]
fn test_query_signs_and_groups() {
    let fx = Fixture::new();
    assert_eq!(fx.query("fast -mroonga", &content()), vec![2]);
    assert_eq!(fx.query("migrated +tritonn", &content()), vec![5]);
    assert_eq!(fx.query("also (fast OR tritonn)", &content()), vec![3, 5]);
    assert_eq!(fx.query("-also", &content()), vec![1, 2, 4]);
}

#[test]
fn test_query_phrases() {
    let fx = Fixture::new();
    assert_eq!(fx.query("\"first post\"", &content()), vec![1]);
    assert_eq!(fx.query("\"post first\"", &content()), Vec::<u32>::new());
}

#[test]
fn test_query_column_clauses() {
    let fx = Fixture::new();
    let none = ParseOptions::default();
    assert_eq!(fx.query("n_likes:>=10", &none), vec![2, 3]);
    assert_eq!(fx.query("n_likes:3", &none), vec![4, 5]);
    assert_eq!(fx.query("_key:^Good", &none), vec![4, 5]);
    assert_eq!(fx.query("content:@migrated n_likes:<=3", &none), vec![4, 5]);
}

#[test]
fn test_query_default_mode() {
    let fx = Fixture::new();
    let options = ParseOptions::default()
        .with_default_column("_key")
        .with_default_mode(Operator::Prefix);
    assert_eq!(fx.query("Good", &options), vec![4, 5]);
}

#[test]
fn test_column_query_grammar_ignores_column_syntax() {
    let fx = Fixture::new();
    let grammar = Grammar::from_option(Some("column-query")).expect("Failed to select grammar");
    assert_eq!(grammar, Grammar::ColumnQuery);

    let options = content().with_grammar(grammar);
    assert_eq!(fx.query("n_likes:>=10", &options), Vec::<u32>::new());
    assert_eq!(fx.query("fast", &options), vec![2, 3]);
}

#[test]
fn test_unknown_grammar() {
    let err = Grammar::from_option(Some("sql")).unwrap_err();
    assert_eq!(err, Error::UnknownGrammar("sql".to_string()));
    assert_eq!(err.kind(), ErrorKind::Construction);
    assert_eq!(Grammar::from_option(None).unwrap(), Grammar::Query);
}

// ============================================================================
// Script grammar
// ============================================================================

#[test]
fn test_script_matches_query() {
    let fx = Fixture::new();
    let script = ParseOptions::default().with_grammar(Grammar::Script);

    assert_eq!(
        fx.query("content @ \"fast\" && n_likes > 10", &script),
        fx.query("fast n_likes:>10", &content())
    );
    assert_eq!(
        fx.query("content @ \"groonga\" || content @ \"senna\"", &script),
        fx.query("groonga OR senna", &content())
    );
    assert_eq!(
        fx.query("content @ \"also\" &! content @ \"fast\"", &script),
        fx.query("also -fast", &content())
    );
}

#[test]
fn test_script_arithmetic_result() {
    let fx = Fixture::new();
    let mut expr = fx.expression();
    expr.parse(
        "n_likes * 2 + 1",
        &ParseOptions::default().with_grammar(Grammar::Script),
    )
    .unwrap();
    let second = RecordRef {
        table: fx.entries,
        id: 2,
    };
    assert_eq!(
        expr.execute(&fx.store, &[Value::Record(second)]).unwrap(),
        Value::Integer(21)
    );
    assert_eq!(expr.range(), Some(Domain::Scalar(DataType::Integer)));
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_parse_error_keeps_completed_clauses() {
    let fx = Fixture::new();
    let mut expr = fx.expression();
    let err = expr.parse("groonga OR", &content()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parse);
    let parse = err.as_parse_error().expect("parse error");
    assert_eq!(parse.message, "'OR' needs a right operand");
    assert_eq!(parse.fragment, "OR");

    // "groonga" stays appended and still evaluates
    assert_eq!(expr.operations().len(), 5);
    assert_eq!(fx.select(&mut expr), vec![2]);
}

#[test]
fn test_compile_error_reports_index() {
    let fx = Fixture::new();
    let mut expr = fx.expression();
    expr.parse("groonga", &content()).unwrap();
    expr.append_object("no_such_column", Operator::Push, 1)
        .unwrap();
    expr.append_operation(Operator::Or, 2).unwrap();

    let err = expr.execute(&fx.store, &[]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Compile);
    assert_eq!(err.operation_index(), Some(5));
}

#[test]
fn test_unknown_column_in_query() {
    let fx = Fixture::new();
    let mut expr = fx.expression();
    expr.parse("title:groonga", &ParseOptions::default())
        .unwrap();
    let err = expr.compile(&fx.store).unwrap_err();
    assert!(matches!(err, Error::UnresolvedName { index: 2, .. }));
}

#[test]
fn test_runtime_type_error() {
    let fx = Fixture::new();
    let mut expr = Expression::new();
    let x = expr.define_variable(Some("x"), Domain::Any).unwrap();
    expr.append_object(x, Operator::Push, 1).unwrap();
    expr.append_operation(Operator::Negate, 1).unwrap();
    let err = expr.execute(&fx.store, &[Value::text("abc")]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Runtime);
    assert_eq!(expr.execute(&fx.store, &[Value::integer(4)]).unwrap(), Value::Integer(-4));
}

// ============================================================================
// Builders
// ============================================================================

#[test]
fn test_builder_conditions() {
    let fx = Fixture::new();
    let builder = RecordExpressionBuilder::new(fx.entries).with_name("popular");
    let likes = builder.column(&fx.store, "n_likes").unwrap();
    let content = builder.column(&fx.store, "content").unwrap();

    let mut expr = builder
        .build(
            &fx.store,
            Some(likes.greater_equal(5) & (content.matches("fast") | content.matches("first"))),
        )
        .unwrap();
    assert_eq!(expr.name(), Some("popular"));
    assert_eq!(fx.select(&mut expr), vec![1, 2, 3]);

    let mut expr = builder
        .build(&fx.store, Some(builder.match_query("system", Some("content"))))
        .unwrap();
    assert_eq!(fx.select(&mut expr), vec![4, 5]);
}

#[test]
fn test_builder_without_condition_matches_everything() {
    let fx = Fixture::new();
    let builder = RecordExpressionBuilder::new(fx.entries);
    let mut expr = builder.build(&fx.store, None).unwrap();
    assert_eq!(fx.select(&mut expr), vec![1, 2, 3, 4, 5]);
}
