//! Schema definition loading.
//!
//! Aggregate schemas are defined in YAML and converted into validated
//! [`EntitySchema`] descriptors collected in a [`SchemaRegistry`]:
//!
//! ```yaml
//! entities:
//!   - name: Order                 # Entity name
//!     table: orders               # Root table
//!     id: { property: id, column: id }
//!     properties:
//!       - name: status
//!         kind: scalar
//!         column: status
//!       - name: address
//!         kind: embedded
//!         prefix: addr_           # Member columns: addr_city, addr_zip
//!         entity:
//!           name: Address
//!           table: orders         # Embedded members share the owner table
//!           properties:
//!             - { name: city, kind: scalar, column: city }
//!       - name: lineItems
//!         kind: list
//!         reverse_column: order_id
//!         key_column: order_idx   # 1-based position
//!         element:
//!           entity:
//!             name: LineItem
//!             table: line_item
//!             id: { property: id, column: id }
//!             properties:
//!               - { name: qty, kind: scalar, column: qty }
//! ```
//!
//! Scalar collections name the element table and column directly:
//!
//! ```yaml
//!       - name: tags
//!         kind: map
//!         reverse_column: order_id
//!         key_column: tag_key
//!         element: { table: order_tag, column: tag }
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::entity::{ElementSchema, EntitySchema, IdSchema, PropertySchema};
use super::errors::CatalogError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaDefinition {
    pub entities: Vec<EntityDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityDefinition {
    pub name: String,
    pub table: String,
    #[serde(default)]
    pub id: Option<IdDefinition>,
    #[serde(default)]
    pub properties: Vec<PropertyDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdDefinition {
    pub property: String,
    pub column: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyKindDefinition {
    Scalar,
    Embedded,
    ToOne,
    List,
    Map,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyDefinition {
    pub name: String,
    pub kind: PropertyKindDefinition,
    #[serde(default)]
    pub column: Option<String>,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub reverse_column: Option<String>,
    #[serde(default)]
    pub key_column: Option<String>,
    #[serde(default)]
    pub always_create: bool,
    #[serde(default)]
    pub entity: Option<EntityDefinition>,
    #[serde(default)]
    pub element: Option<ElementDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementDefinition {
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub column: Option<String>,
    #[serde(default)]
    pub entity: Option<EntityDefinition>,
}

/// All entity schemas known to one mapping layer instance, keyed by
/// entity name.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    entities: HashMap<String, EntitySchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, schema: EntitySchema) -> Result<(), CatalogError> {
        schema.validate()?;
        if self.entities.contains_key(&schema.name) {
            return Err(CatalogError::DuplicateEntity(schema.name));
        }
        log::debug!("Registered entity schema `{}`", schema.name);
        self.entities.insert(schema.name.clone(), schema);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&EntitySchema, CatalogError> {
        self.entities
            .get(name)
            .ok_or_else(|| CatalogError::UnknownEntity(name.to_string()))
    }

    pub fn entity_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entities.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, CatalogError> {
        let definition: SchemaDefinition = serde_yaml::from_str(yaml)
            .map_err(|e| CatalogError::ConfigParseError(e.to_string()))?;
        Self::from_definition(definition)
    }

    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| CatalogError::ConfigReadError(e.to_string()))?;
        Self::from_yaml_str(&content)
    }

    pub fn from_definition(definition: SchemaDefinition) -> Result<Self, CatalogError> {
        let mut registry = Self::new();
        for entity in definition.entities {
            let schema = convert_entity(entity)?;
            registry.register(schema)?;
        }
        Ok(registry)
    }
}

fn convert_entity(definition: EntityDefinition) -> Result<EntitySchema, CatalogError> {
    let entity_name = definition.name.clone();
    let mut properties = Vec::with_capacity(definition.properties.len());
    for property in definition.properties {
        properties.push(convert_property(&entity_name, property)?);
    }
    Ok(EntitySchema {
        name: definition.name,
        table: definition.table,
        id: definition.id.map(|id| IdSchema {
            property: id.property,
            column: id.column,
        }),
        properties,
    })
}

fn convert_property(
    entity: &str,
    definition: PropertyDefinition,
) -> Result<PropertySchema, CatalogError> {
    let name = definition.name.clone();
    let missing = |what: &str| CatalogError::InvalidConfig(format!(
        "property `{name}` on `{entity}` (kind {:?}) is missing `{what}`",
        definition.kind
    ));
    match definition.kind {
        PropertyKindDefinition::Scalar => Ok(PropertySchema::Scalar {
            column: definition.column.ok_or_else(|| missing("column"))?,
            name,
        }),
        PropertyKindDefinition::Embedded => Ok(PropertySchema::Embedded {
            prefix: definition.prefix.unwrap_or_default(),
            always_create: definition.always_create,
            entity: convert_entity(definition.entity.ok_or_else(|| missing("entity"))?)?,
            name,
        }),
        PropertyKindDefinition::ToOne => Ok(PropertySchema::ToOne {
            reverse_column: definition
                .reverse_column
                .ok_or_else(|| CatalogError::MissingReverseColumn {
                    entity: entity.to_string(),
                    property: name.clone(),
                })?,
            always_create: definition.always_create,
            entity: convert_entity(definition.entity.ok_or_else(|| missing("entity"))?)?,
            name,
        }),
        PropertyKindDefinition::List | PropertyKindDefinition::Map => {
            let reverse_column =
                definition
                    .reverse_column
                    .ok_or_else(|| CatalogError::MissingReverseColumn {
                        entity: entity.to_string(),
                        property: name.clone(),
                    })?;
            let key_column =
                definition
                    .key_column
                    .ok_or_else(|| CatalogError::MissingKeyColumn {
                        entity: entity.to_string(),
                        property: name.clone(),
                    })?;
            let element = convert_element(
                entity,
                &name,
                definition.element.ok_or_else(|| missing("element"))?,
            )?;
            if matches!(definition.kind, PropertyKindDefinition::List) {
                Ok(PropertySchema::ToManyList {
                    name,
                    reverse_column,
                    key_column,
                    element,
                })
            } else {
                Ok(PropertySchema::ToManyMap {
                    name,
                    reverse_column,
                    key_column,
                    element,
                })
            }
        }
    }
}

fn convert_element(
    entity: &str,
    property: &str,
    definition: ElementDefinition,
) -> Result<ElementSchema, CatalogError> {
    match (definition.entity, definition.column) {
        (Some(element_entity), None) => Ok(ElementSchema::Entity(convert_entity(element_entity)?)),
        (None, Some(column)) => {
            let table = definition.table.ok_or_else(|| {
                CatalogError::InvalidConfig(format!(
                    "scalar element of `{property}` on `{entity}` is missing `table`"
                ))
            })?;
            Ok(ElementSchema::Scalar { table, column })
        }
        _ => Err(CatalogError::AmbiguousElement {
            entity: entity.to_string(),
            property: property.to_string(),
        }),
    }
}
