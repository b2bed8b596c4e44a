//! Schema-definition round trips: a YAML file must generate the same
//! statements as the equivalent programmatic schema.

use std::io::Write;
use std::sync::Arc;

use rowgraph::entity_catalog::{
    ElementSchema, EntitySchema, IdSchema, PropertySchema, SchemaRegistry,
};
use rowgraph::sql_generator::{AnsiDialect, SqlGenerator};

const ORDER_YAML: &str = r#"
entities:
  - name: Order
    table: orders
    id: { property: id, column: id }
    properties:
      - { name: status, kind: scalar, column: status }
      - name: lineItems
        kind: list
        reverse_column: order_id
        key_column: order_idx
        element:
          entity:
            name: LineItem
            table: line_item
            id: { property: id, column: id }
            properties:
              - { name: qty, kind: scalar, column: qty }
"#;

fn programmatic_schema() -> EntitySchema {
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

#[test]
fn yaml_file_and_programmatic_schema_generate_identical_sql() -> anyhow::Result<()> {
    let mut file = tempfile::NamedTempFile::new()?;
    file.write_all(ORDER_YAML.as_bytes())?;

    let registry = SchemaRegistry::from_yaml_file(file.path())?;
    let from_yaml = SqlGenerator::new(registry.get("Order")?.clone(), Arc::new(AnsiDialect));
    let from_code = SqlGenerator::new(programmatic_schema(), Arc::new(AnsiDialect));

    assert_eq!(
        from_yaml.select_aggregate()?.sql,
        from_code.select_aggregate()?.sql
    );
    assert_eq!(from_yaml.insert()?.sql, from_code.insert()?.sql);
    assert_eq!(
        from_yaml.delete_by_id()?.sql,
        from_code.delete_by_id()?.sql
    );
    Ok(())
}

#[test]
fn loaded_schema_matches_programmatic_definition() {
    let registry = SchemaRegistry::from_yaml_str(ORDER_YAML).unwrap();
    assert_eq!(registry.get("Order").unwrap(), &programmatic_schema());
}
