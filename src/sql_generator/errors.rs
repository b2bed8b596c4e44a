use thiserror::Error;

use crate::entity_catalog::CatalogError;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SqlBuildError {
    #[error("Entity `{0}` declares no id column; aggregate statements require one")]
    MissingIdColumn(String),

    #[error("Duplicate column alias `{alias}` in the statement generated for `{entity}`")]
    DuplicateAlias { entity: String, alias: String },

    #[error("Cannot resolve sort property `{property}` on `{entity}` to a column")]
    SortPropertyUnresolvable { entity: String, property: String },

    #[error("Unknown path `{path}` on entity `{entity}`")]
    UnknownPath { entity: String, path: String },

    #[error("Path `{0}` does not denote a to-many property")]
    NotAContainerPath(String),

    #[error("Entity at path `{path}` of `{entity}` declares no id; nested children cannot be reached")]
    MissingIntermediateId { entity: String, path: String },

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}
