//! Strategy facade tests: routing, strategy equivalence, and the
//! per-level write path, driven through a scripted executor.

use std::sync::Arc;

use serde_json::{json, Value};

use rowgraph::aggregate_reader::{Row, RowDocument, RowValue};
use rowgraph::entity_catalog::{ElementSchema, EntitySchema, IdSchema, PropertySchema};
use rowgraph::sql_generator::{AnsiDialect, MySqlDialect};
use rowgraph::AggregateStore;

use super::scripted::{ScriptedExecutor, ScriptedResponse};

fn order_schema() -> EntitySchema {
    EntitySchema {
        name: "Order".into(),
        table: "orders".into(),
        id: Some(IdSchema {
            property: "id".into(),
            column: "id".into(),
        }),
        properties: vec![
            PropertySchema::Scalar {
                name: "status".into(),
                column: "status".into(),
            },
            PropertySchema::ToManyList {
                name: "lineItems".into(),
                reverse_column: "order_id".into(),
                key_column: "order_idx".into(),
                element: ElementSchema::Entity(EntitySchema {
                    name: "LineItem".into(),
                    table: "line_item".into(),
                    id: Some(IdSchema {
                        property: "id".into(),
                        column: "id".into(),
                    }),
                    properties: vec![PropertySchema::Scalar {
                        name: "qty".into(),
                        column: "qty".into(),
                    }],
                }),
            },
        ],
    }
}

fn aggregate_columns() -> Vec<String> {
    vec![
        "id".into(),
        "status".into(),
        "lineItems_order_idx".into(),
        "lineItems_id".into(),
        "lineItems_qty".into(),
    ]
}

fn aggregate_row(id: i64, idx: i64, li_id: i64, qty: i64) -> Row {
    Row::from_pairs([
        ("id", json!(id)),
        ("status", json!("open")),
        ("lineItems_order_idx", json!(idx)),
        ("lineItems_id", json!(li_id)),
        ("lineItems_qty", json!(qty)),
    ])
}

fn expected_document() -> Value {
    json!({
        "id": 1,
        "status": "open",
        "lineItems": [{"id": 10, "qty": 2}, {"id": 11, "qty": 5}]
    })
}

#[test]
fn single_query_strategy_loads_in_one_round_trip() {
    let store = AggregateStore::new(order_schema(), Arc::new(AnsiDialect));
    assert!(store.generator().single_query_eligible());

    let mut executor = ScriptedExecutor::new(vec![ScriptedResponse {
        expect: "LEFT OUTER JOIN line_item AS lineItems",
        columns: aggregate_columns(),
        rows: vec![aggregate_row(1, 1, 10, 2), aggregate_row(1, 2, 11, 5)],
    }]);
    let document = store
        .find_by_id(&mut executor, &json!(1))
        .unwrap()
        .expect("document");
    executor.expect_drained();
    assert_eq!(executor.queries.len(), 1);
    assert_eq!(document.to_json(), expected_document());
}

#[test]
fn fallback_strategy_produces_equivalent_documents() {
    // MySQL has single-query loading disabled, forcing the per-entity
    // path for the very same schema.
    let store = AggregateStore::new(order_schema(), Arc::new(MySqlDialect));
    assert!(!store.generator().single_query_eligible());

    let mut executor = ScriptedExecutor::new(vec![
        ScriptedResponse {
            expect: "WHERE orders.id = :id",
            columns: vec!["id".into(), "status".into()],
            rows: vec![Row::from_pairs([
                ("id", json!(1)),
                ("status", json!("open")),
            ])],
        },
        ScriptedResponse {
            expect: "FROM line_item AS lineItems",
            columns: vec![
                "lineItems_order_idx".into(),
                "lineItems_id".into(),
                "lineItems_qty".into(),
            ],
            rows: vec![
                Row::from_pairs([
                    ("lineItems_order_idx", json!(1)),
                    ("lineItems_id", json!(10)),
                    ("lineItems_qty", json!(2)),
                ]),
                Row::from_pairs([
                    ("lineItems_order_idx", json!(2)),
                    ("lineItems_id", json!(11)),
                    ("lineItems_qty", json!(5)),
                ]),
            ],
        },
    ]);
    let document = store
        .find_by_id(&mut executor, &json!(1))
        .unwrap()
        .expect("document");
    executor.expect_drained();
    assert_eq!(executor.queries.len(), 2);
    // The collection query is filtered by the parent id.
    let (_, params) = &executor.queries[1];
    assert_eq!(params[0].name, "order_id");
    assert_eq!(params[0].value, json!(1));
    // Document-equivalent to the single-query strategy.
    assert_eq!(document.to_json(), expected_document());
}

#[test]
fn fallback_absent_collection_stays_absent() {
    let store = AggregateStore::new(order_schema(), Arc::new(MySqlDialect));
    let mut executor = ScriptedExecutor::new(vec![
        ScriptedResponse {
            expect: "WHERE orders.id = :id",
            columns: vec!["id".into(), "status".into()],
            rows: vec![Row::from_pairs([
                ("id", json!(7)),
                ("status", json!("empty")),
            ])],
        },
        ScriptedResponse {
            expect: "FROM line_item AS lineItems",
            columns: vec![
                "lineItems_order_idx".into(),
                "lineItems_id".into(),
                "lineItems_qty".into(),
            ],
            rows: vec![],
        },
    ]);
    let document = store
        .find_by_id(&mut executor, &json!(7))
        .unwrap()
        .expect("document");
    assert_eq!(document.to_json(), json!({"id": 7, "status": "empty"}));
}

#[test]
fn insert_aggregate_writes_one_row_per_level() {
    let store = AggregateStore::new(order_schema(), Arc::new(AnsiDialect));
    let mut executor = ScriptedExecutor::default();

    let mut item1 = RowDocument::new();
    item1.insert("id", RowValue::Scalar(json!(10)));
    item1.insert("qty", RowValue::Scalar(json!(2)));
    let mut item2 = RowDocument::new();
    item2.insert("id", RowValue::Scalar(json!(11)));
    item2.insert("qty", RowValue::Scalar(json!(5)));
    let mut document = RowDocument::new();
    document.insert("id", RowValue::Scalar(json!(1)));
    document.insert("status", RowValue::Scalar(json!("open")));
    document.insert(
        "lineItems",
        RowValue::List(vec![RowValue::Document(item1), RowValue::Document(item2)]),
    );

    store.insert_aggregate(&mut executor, &document).unwrap();

    assert_eq!(executor.executed.len(), 3);
    let (root_sql, root_params) = &executor.executed[0];
    assert!(root_sql.starts_with("INSERT INTO orders"));
    assert!(root_params.iter().any(|p| p.name == "status" && p.value == json!("open")));

    for (index, (sql, params)) in executor.executed[1..].iter().enumerate() {
        assert!(sql.starts_with("INSERT INTO line_item"));
        // Back-reference and 1-based qualifier column travel with each row.
        assert!(params.iter().any(|p| p.name == "order_id" && p.value == json!(1)));
        assert!(params
            .iter()
            .any(|p| p.name == "order_idx" && p.value == json!((index + 1) as u64)));
    }
}

#[test]
fn update_aggregate_wipes_then_reinserts_children() {
    let store = AggregateStore::new(order_schema(), Arc::new(AnsiDialect));
    let mut executor = ScriptedExecutor::default();

    let mut item = RowDocument::new();
    item.insert("id", RowValue::Scalar(json!(10)));
    item.insert("qty", RowValue::Scalar(json!(3)));
    let mut document = RowDocument::new();
    document.insert("id", RowValue::Scalar(json!(1)));
    document.insert("status", RowValue::Scalar(json!("shipped")));
    document.insert("lineItems", RowValue::List(vec![RowValue::Document(item)]));

    store.update_aggregate(&mut executor, &document).unwrap();

    let statements: Vec<&str> = executor
        .executed
        .iter()
        .map(|(sql, _)| sql.as_str())
        .collect();
    assert_eq!(statements.len(), 3);
    assert!(statements[0].starts_with("UPDATE orders SET"));
    assert!(statements[1].starts_with("DELETE FROM line_item WHERE order_id = :order_id"));
    assert!(statements[2].starts_with("INSERT INTO line_item"));
}

#[test]
fn delete_by_id_removes_children_first() {
    let store = AggregateStore::new(order_schema(), Arc::new(AnsiDialect));
    let mut executor = ScriptedExecutor::default();
    store.delete_by_id(&mut executor, &json!(1)).unwrap();
    let statements: Vec<&str> = executor
        .executed
        .iter()
        .map(|(sql, _)| sql.as_str())
        .collect();
    assert_eq!(
        statements,
        vec![
            "DELETE FROM line_item WHERE order_id = :order_id",
            "DELETE FROM orders WHERE id = :id",
        ]
    );
}
