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

//! Snippet Tests
//!
//! Keyword highlighting, both through a compiled expression and with a
//! standalone extractor.

use querex::{
    DataType, Domain, ErrorKind, Expression, MemoryStore, ParseOptions, RecordRef, Snippet,
    SnippetOptions, TagPair, Value,
};

fn setup() -> (MemoryStore, Vec<RecordRef>, Expression) {
    let mut store = MemoryStore::new();
    let entries = store
        .create_table("Entries", None)
        .expect("Failed to create table");
    store
        .add_column(entries, "content", Domain::Scalar(DataType::Text))
        .expect("Failed to add column");

    let records = [
        "I started to use Groonga. It's very fast!",
        "I also started to use Mroonga. It's also very fast!",
    ]
    .iter()
    .map(|content| {
        store
            .insert(entries, None, &[("content", Value::text(*content))])
            .expect("Failed to insert record")
    })
    .collect();

    let mut expr = Expression::new();
    expr.define_variable(Some("entry"), Domain::Table(entries))
        .expect("Failed to define variable");
    (store, records, expr)
}

fn content() -> ParseOptions {
    ParseOptions::default().with_default_column("content")
}

// ============================================================================
// Through an expression
// ============================================================================

#[test]
fn test_expression_snippet_tags_by_first_occurrence() {
    let (store, records, mut expr) = setup();
    // "fast" is written first but "groonga" occurs first in the text
    expr.parse("fast groonga", &content()).unwrap();
    assert!(expr
        .execute(&store, &[Value::Record(records[0])])
        .unwrap()
        .is_truthy());

    let tags = vec![TagPair::new("[", "]"), TagPair::new("<", ">")];
    let fragments = expr.snippet(&tags, &SnippetOptions::default()).unwrap();
    assert_eq!(fragments, vec!["I started to use [Groonga]. It's very <fast>!"]);
}

#[test]
fn test_negated_terms_are_not_highlighted() {
    let (store, records, mut expr) = setup();
    expr.parse("fast -groonga", &content()).unwrap();
    assert!(expr
        .execute(&store, &[Value::Record(records[1])])
        .unwrap()
        .is_truthy());

    let tags = vec![TagPair::new("<b>", "</b>")];
    let fragments = expr.snippet(&tags, &SnippetOptions::default()).unwrap();
    assert_eq!(
        fragments,
        vec!["I also started to use Mroonga. It's also very <b>fast</b>!"]
    );
}

#[test]
fn test_tag_entries_must_be_pairs() {
    let err = TagPair::from_entries(&[vec!["<b>", "</b>"], vec!["<i>"]]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Argument);

    let tags = TagPair::from_entries(&[vec!["<b>", "</b>"]]).unwrap();
    assert_eq!(tags, vec![TagPair::from(("<b>", "</b>"))]);
}

// ============================================================================
// Standalone extractor
// ============================================================================

#[test]
fn test_html_escape_leaves_tags_alone() {
    let snippet = Snippet::new(
        ["groonga"],
        vec![TagPair::new("<b>", "</b>")],
        SnippetOptions::default().with_html_escape(true),
    )
    .unwrap();
    assert_eq!(
        snippet.execute("a < b & \"Groonga\""),
        vec!["a &lt; b &amp; &quot;<b>Groonga</b>&quot;"]
    );
}

#[test]
fn test_fragments_in_document_order() {
    let tags = vec![TagPair::new("<1>", "</1>"), TagPair::new("<2>", "</2>")];
    let options = SnippetOptions::default().with_width(5);

    let snippet = Snippet::new(["four", "one"], tags.clone(), options.clone()).unwrap();
    assert_eq!(
        snippet.execute("one two three four"),
        vec!["<1>one</1> t", " <2>four</2>"]
    );

    let snippet = Snippet::new(
        ["four", "one"],
        tags.clone(),
        options.clone().with_skip_leading_spaces(true),
    )
    .unwrap();
    assert_eq!(
        snippet.execute("one two three four"),
        vec!["<1>one</1> t", "<2>four</2>"]
    );

    let snippet = Snippet::new(["four", "one"], tags, options.with_max_results(1)).unwrap();
    assert_eq!(snippet.execute("one two three four"), vec!["<1>one</1> t"]);
}

#[test]
fn test_case_sensitive_matching() {
    let tags = vec![TagPair::new("[", "]")];
    let snippet = Snippet::new(
        ["groonga"],
        tags,
        SnippetOptions::default().with_normalize(false),
    )
    .unwrap();
    assert!(snippet.execute("Groonga").is_empty());
    assert_eq!(snippet.execute("groonga"), vec!["[groonga]"]);
}
