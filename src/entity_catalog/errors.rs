use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CatalogError {
    #[error("No entity schema found for `{0}`")]
    UnknownEntity(String),

    #[error("Unknown property `{property}` on entity `{entity}`")]
    UnknownProperty { entity: String, property: String },

    #[error("Duplicate property `{property}` on entity `{entity}`")]
    DuplicateProperty { entity: String, property: String },

    #[error("Duplicate entity definition `{0}`")]
    DuplicateEntity(String),

    #[error("Embedded entity `{0}` must not declare an id column")]
    EmbeddedWithId(String),

    #[error("Property `{property}` on `{entity}` is collection-like and requires a key column")]
    MissingKeyColumn { entity: String, property: String },

    #[error("Property `{property}` on `{entity}` references another table and requires a reverse column")]
    MissingReverseColumn { entity: String, property: String },

    #[error("Property `{property}` on `{entity}` needs exactly one of `column` or `entity` for its element")]
    AmbiguousElement { entity: String, property: String },

    #[error("Failed to read schema file: {0}")]
    ConfigReadError(String),

    #[error("Failed to parse schema definition: {0}")]
    ConfigParseError(String),

    #[error("Invalid schema definition: {0}")]
    InvalidConfig(String),
}
