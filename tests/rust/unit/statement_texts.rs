//! Rendering-level assertions over generated statement text.

use std::collections::HashSet;
use std::sync::Arc;

use rowgraph::entity_catalog::AggregatePath;
use rowgraph::sql_generator::{AnsiDialect, SqlGenerator};

use super::order_schema;

fn generator() -> SqlGenerator {
    SqlGenerator::new(order_schema(), Arc::new(AnsiDialect))
}

/// Every `AS <alias>` token in the rendered join-select is unique, even
/// with sibling to-many properties whose elements share column names.
#[test]
fn rendered_statement_has_no_duplicate_alias_tokens() {
    let sql = generator().select_aggregate().unwrap().sql.clone();
    let mut seen = HashSet::new();
    let mut tokens = sql.split_whitespace().peekable();
    while let Some(token) = tokens.next() {
        if token == "AS" {
            if let Some(alias) = tokens.peek() {
                let alias = alias.trim_end_matches(',');
                assert!(
                    seen.insert(alias.to_string()),
                    "duplicate alias token `{alias}` in: {sql}"
                );
            }
        }
    }
    // Sibling collections with identical element columns stay disjoint.
    assert!(seen.contains("lineItems_id"));
    assert!(seen.contains("tags_id"));
}

#[test]
fn statements_are_cached_per_kind() {
    let generator = generator();
    let first = generator.select_aggregate().unwrap();
    let second = generator.select_aggregate().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    let insert = generator.insert().unwrap();
    assert!(!Arc::ptr_eq(&first, &insert));
}

#[test]
fn bind_markers_contain_only_word_characters() {
    let generator = generator();
    for statement in [
        generator.select_aggregate_by_id().unwrap(),
        generator.insert().unwrap(),
        generator.update().unwrap(),
        generator.delete_by_id().unwrap(),
    ] {
        for bind in &statement.binds {
            assert!(
                bind.bind_name.chars().all(|c| c.is_alphanumeric() || c == '_'),
                "bind `{}` is not a safe identifier",
                bind.bind_name
            );
            assert!(statement.sql.contains(&format!(":{}", bind.bind_name)));
        }
    }
}

#[test]
fn join_select_shape() {
    let sql = generator().select_aggregate().unwrap().sql.clone();
    assert!(sql.starts_with("SELECT "));
    assert!(sql.contains("FROM orders"));
    assert!(
        sql.contains("LEFT OUTER JOIN line_item AS lineItems ON lineItems.order_id = orders.id")
    );
    assert!(sql.contains("LEFT OUTER JOIN tag AS tags ON tags.order_id = orders.id"));
    assert!(sql.contains("tags.tag_key AS tags_tag_key"));
    assert!(sql.ends_with("ORDER BY orders.id"));
}

#[test]
fn path_scoped_statements_chain_subselects() {
    let mut schema = order_schema();
    // Push the list one level down: Order -> lineItems -> notes.
    if let rowgraph::entity_catalog::PropertySchema::ToManyList { element, .. } =
        &mut schema.properties[1]
    {
        if let rowgraph::entity_catalog::ElementSchema::Entity(entity) = element {
            entity.properties.push(
                rowgraph::entity_catalog::PropertySchema::ToManyList {
                    name: "notes".into(),
                    reverse_column: "line_item_id".into(),
                    key_column: "note_idx".into(),
                    element: rowgraph::entity_catalog::ElementSchema::Scalar {
                        table: "line_item_note".into(),
                        column: "note".into(),
                    },
                },
            );
        }
    }
    let generator = SqlGenerator::new(schema, Arc::new(AnsiDialect));
    let path = AggregatePath::root().append("lineItems").append("notes");
    let delete = generator.delete_by_path(&path).unwrap();
    assert_eq!(
        delete.sql,
        "DELETE FROM line_item_note WHERE line_item_id IN \
         (SELECT id FROM line_item WHERE order_id = :order_id)"
    );
}
