mod document_shapes;
mod statement_texts;

use rowgraph::entity_catalog::{ElementSchema, EntitySchema, IdSchema, PropertySchema};

/// Order(id, status) with List<LineItem(id, qty)> and Map<String, Tag(id, label)>.
pub fn order_schema() -> EntitySchema {
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
            PropertySchema::ToManyMap {
                name: "tags".into(),
                reverse_column: "order_id".into(),
                key_column: "tag_key".into(),
                element: ElementSchema::Entity(EntitySchema {
                    name: "Tag".into(),
                    table: "tag".into(),
                    id: Some(IdSchema {
                        property: "id".into(),
                        column: "id".into(),
                    }),
                    properties: vec![PropertySchema::Scalar {
                        name: "label".into(),
                        column: "label".into(),
                    }],
                }),
            },
        ],
    }
}
