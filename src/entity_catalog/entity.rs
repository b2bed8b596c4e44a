//! Pre-resolved entity descriptors.
//!
//! The descriptor table replaces any runtime reflection: every question the
//! SQL generator or the row readers could ask about a property (is it a
//! collection, what column does it map to, does the entity declare an id)
//! is answered by these structs, resolved once before statement generation.

use serde::{Deserialize, Serialize};

use super::errors::CatalogError;

/// Declared identifier of an entity: the property name visible in
/// documents and the column it maps to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdSchema {
    pub property: String,
    pub column: String,
}

/// Structural description of one entity (a root or a nested entity owned
/// by a root). Property order is declaration order and is preserved all
/// the way into reconstructed documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySchema {
    pub name: String,
    pub table: String,
    /// Nested entities may legitimately have no id of their own; the
    /// sentinel reverse-column technique covers null detection for them.
    pub id: Option<IdSchema>,
    pub properties: Vec<PropertySchema>,
}

/// One persistent property of an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertySchema {
    /// Plain column value on the entity's own table.
    Scalar { name: String, column: String },

    /// Member columns live in the owner's table under a column prefix.
    /// Never joined.
    Embedded {
        name: String,
        prefix: String,
        /// Materialize an empty document even when every member column
        /// comes back null.
        always_create: bool,
        entity: EntitySchema,
    },

    /// Single owned entity in its own table, holding a back-reference
    /// column pointing at the owner's id.
    ToOne {
        name: String,
        reverse_column: String,
        always_create: bool,
        entity: EntitySchema,
    },

    /// List-valued ownership. `key_column` holds the 1-based position.
    ToManyList {
        name: String,
        reverse_column: String,
        key_column: String,
        element: ElementSchema,
    },

    /// Map-valued ownership. `key_column` holds the map key.
    ToManyMap {
        name: String,
        reverse_column: String,
        key_column: String,
        element: ElementSchema,
    },
}

/// Element of a to-many property: either a single column per row in a
/// dedicated element table, or a nested entity whose columns live in the
/// entity's own table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ElementSchema {
    Scalar { table: String, column: String },
    Entity(EntitySchema),
}

impl ElementSchema {
    pub fn table(&self) -> &str {
        match self {
            ElementSchema::Scalar { table, .. } => table,
            ElementSchema::Entity(entity) => &entity.table,
        }
    }
}

impl EntitySchema {
    pub fn property(&self, name: &str) -> Option<&PropertySchema> {
        self.properties.iter().find(|p| p.name() == name)
    }

    pub fn id_column(&self) -> Option<&str> {
        self.id.as_ref().map(|id| id.column.as_str())
    }

    pub fn id_property(&self) -> Option<&str> {
        self.id.as_ref().map(|id| id.property.as_str())
    }

    /// Structural validation applied after assembly (programmatic or from
    /// a definition file). Catches the configuration errors that would
    /// otherwise surface as malformed SQL much later.
    pub fn validate(&self) -> Result<(), CatalogError> {
        let mut seen = std::collections::HashSet::new();
        if let Some(id) = &self.id {
            seen.insert(id.property.as_str());
        }
        for property in &self.properties {
            if !seen.insert(property.name()) {
                return Err(CatalogError::DuplicateProperty {
                    entity: self.name.clone(),
                    property: property.name().to_string(),
                });
            }
            match property {
                PropertySchema::Scalar { .. } => {}
                PropertySchema::Embedded { entity, .. } => {
                    if entity.id.is_some() {
                        return Err(CatalogError::EmbeddedWithId(entity.name.clone()));
                    }
                    entity.validate()?;
                }
                PropertySchema::ToOne { entity, .. } => entity.validate()?,
                PropertySchema::ToManyList { element, .. }
                | PropertySchema::ToManyMap { element, .. } => {
                    if let ElementSchema::Entity(entity) = element {
                        entity.validate()?;
                    }
                }
            }
        }
        Ok(())
    }
}

impl PropertySchema {
    pub fn name(&self) -> &str {
        match self {
            PropertySchema::Scalar { name, .. }
            | PropertySchema::Embedded { name, .. }
            | PropertySchema::ToOne { name, .. }
            | PropertySchema::ToManyList { name, .. }
            | PropertySchema::ToManyMap { name, .. } => name,
        }
    }

    /// Does this property denote an entity in its own table (joined)?
    pub fn is_entity_valued(&self) -> bool {
        matches!(
            self,
            PropertySchema::ToOne { .. }
                | PropertySchema::ToManyList {
                    element: ElementSchema::Entity(_),
                    ..
                }
                | PropertySchema::ToManyMap {
                    element: ElementSchema::Entity(_),
                    ..
                }
        )
    }

    /// Collection-like properties carry a qualifier (key/index) column.
    pub fn is_qualified(&self) -> bool {
        matches!(
            self,
            PropertySchema::ToManyList { .. } | PropertySchema::ToManyMap { .. }
        )
    }

    pub fn is_multi_valued(&self) -> bool {
        self.is_qualified()
    }
}
