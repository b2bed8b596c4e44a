//! End-to-end shape checks: the aliases the generator projects are the
//! aliases the extractor decodes, so these tests drive both halves from
//! one plan.

use std::sync::Arc;

use serde_json::{json, Value};

use rowgraph::aggregate_reader::{AggregateExtractor, Row, VecRowSource};
use rowgraph::sql_generator::{AnsiDialect, SqlGenerator};

use super::order_schema;

fn extractor_and_columns() -> (AggregateExtractor, Vec<String>) {
    let generator = SqlGenerator::new(order_schema(), Arc::new(AnsiDialect));
    let plan = generator.aggregate_plan().unwrap();
    let extractor =
        AggregateExtractor::new(plan.reader_spec.clone(), plan.root_id_alias.clone());
    (extractor, plan.aliases.clone())
}

fn row(
    id: i64,
    li: Option<(i64, i64, i64)>,
    tag: Option<(&str, i64, &str)>,
) -> Row {
    let mut row = Row::from_pairs([
        ("id", json!(id)),
        ("status", json!("open")),
        ("lineItems_order_idx", Value::Null),
        ("lineItems_id", Value::Null),
        ("lineItems_qty", Value::Null),
        ("tags_tag_key", Value::Null),
        ("tags_id", Value::Null),
        ("tags_label", Value::Null),
    ]);
    if let Some((idx, li_id, qty)) = li {
        row.set("lineItems_order_idx", json!(idx));
        row.set("lineItems_id", json!(li_id));
        row.set("lineItems_qty", json!(qty));
    }
    if let Some((key, tag_id, label)) = tag {
        row.set("tags_tag_key", json!(key));
        row.set("tags_id", json!(tag_id));
        row.set("tags_label", json!(label));
    }
    row
}

#[test]
fn order_with_line_items_reconstructs() {
    let (extractor, columns) = extractor_and_columns();
    let rows = vec![
        row(1, Some((1, 10, 2)), None),
        row(1, Some((2, 11, 5)), None),
    ];
    let docs = extractor
        .extract(VecRowSource::new(columns, rows))
        .unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(
        docs[0].to_json(),
        json!({
            "id": 1,
            "status": "open",
            "lineItems": [{"id": 10, "qty": 2}, {"id": 11, "qty": 5}]
        })
    );
}

#[test]
fn map_keyed_tags_reconstruct() {
    let (extractor, columns) = extractor_and_columns();
    let rows = vec![
        row(1, None, Some(("a", 1, "x"))),
        row(1, None, Some(("b", 2, "y"))),
    ];
    let docs = extractor
        .extract(VecRowSource::new(columns, rows))
        .unwrap();
    assert_eq!(
        docs[0].get("tags").unwrap().to_json(),
        json!({"a": {"id": 1, "label": "x"}, "b": {"id": 2, "label": "y"}})
    );
}

/// Fan-out across both collections: element counts stay correct per
/// property regardless of the cross-product row count.
#[test]
fn cross_product_collapses_to_correct_counts() {
    let (extractor, columns) = extractor_and_columns();
    let mut rows = Vec::new();
    for li in 1..=2i64 {
        for (key, tag_id, label) in [("a", 1i64, "x"), ("b", 2, "y"), ("c", 3, "z")] {
            rows.push(row(1, Some((li, 9 + li, li)), Some((key, tag_id, label))));
        }
    }
    let docs = extractor
        .extract(VecRowSource::new(columns, rows))
        .unwrap();
    assert_eq!(docs.len(), 1);
    let line_items = docs[0].get("lineItems").unwrap().to_json();
    let tags = docs[0].get("tags").unwrap().to_json();
    assert_eq!(line_items.as_array().unwrap().len(), 2);
    assert_eq!(tags.as_object().unwrap().len(), 3);
}

#[test]
fn consecutive_roots_split_into_documents() {
    let (extractor, columns) = extractor_and_columns();
    let rows = vec![
        row(1, Some((1, 10, 2)), None),
        row(1, Some((2, 11, 5)), None),
        row(1, Some((3, 12, 7)), None),
        row(2, Some((1, 20, 1)), None),
        row(2, Some((2, 21, 2)), None),
        row(2, Some((3, 22, 3)), None),
    ];
    let docs = extractor
        .extract(VecRowSource::new(columns, rows))
        .unwrap();
    assert_eq!(docs.len(), 2);
    assert_eq!(
        docs[0].get("lineItems").unwrap().to_json(),
        json!([{"id": 10, "qty": 2}, {"id": 11, "qty": 5}, {"id": 12, "qty": 7}])
    );
    assert_eq!(docs[1].get("id").unwrap().to_json(), json!(2));
}
