use thiserror::Error;

use crate::aggregate_reader::ExtractError;
use crate::entity_catalog::CatalogError;
use crate::sql_generator::SqlBuildError;

/// Failure raised by a [`super::executor::QueryExecutor`] implementation.
/// The mapping layer treats the driver as opaque; whatever detail it has
/// is carried as text.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{0}")]
pub struct ExecutorError(pub String);

#[derive(Debug, Error)]
pub enum DataAccessError {
    #[error("SQL generation failed for `{entity}`: {source}")]
    SqlBuild {
        entity: String,
        #[source]
        source: SqlBuildError,
    },

    #[error("Extraction failed for `{entity}`: {source}")]
    Extract {
        entity: String,
        #[source]
        source: ExtractError,
    },

    #[error("Executor failure while running {kind} for `{entity}`: {source}")]
    Executor {
        entity: String,
        kind: &'static str,
        #[source]
        source: ExecutorError,
    },

    #[error("Document for `{entity}` is missing required field `{field}`")]
    MissingField { entity: String, field: String },

    #[error("Entity `{entity}` declares no usable id for {operation}")]
    MissingId {
        entity: String,
        operation: &'static str,
    },

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl DataAccessError {
    pub(crate) fn sql(entity: &str, source: SqlBuildError) -> Self {
        DataAccessError::SqlBuild {
            entity: entity.to_string(),
            source,
        }
    }

    pub(crate) fn extract(entity: &str, source: ExtractError) -> Self {
        DataAccessError::Extract {
            entity: entity.to_string(),
            source,
        }
    }

    pub(crate) fn executor(entity: &str, kind: &'static str, source: ExecutorError) -> Self {
        DataAccessError::Executor {
            entity: entity.to_string(),
            kind,
            source,
        }
    }

    pub(crate) fn missing_field(entity: &str, field: &str) -> Self {
        DataAccessError::MissingField {
            entity: entity.to_string(),
            field: field.to_string(),
        }
    }
}
