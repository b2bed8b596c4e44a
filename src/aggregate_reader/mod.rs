//! Tabular-to-aggregate reconstruction engine.
//!
//! Consumes a forward-only stream of flat, join-shaped rows and rebuilds
//! the nested document each aggregate root denotes: single references,
//! one-to-many collections with positional semantics, and maps. The
//! column aliasing scheme decoded here is exactly the one the SQL
//! generator produces; the shared [`readers::ReaderSpec`] tree keeps the
//! two halves in lockstep.

pub mod document;
pub mod errors;
pub mod extractor;
pub mod readers;
pub mod row_set;

pub use document::{RowDocument, RowValue};
pub use errors::ExtractError;
pub use extractor::AggregateExtractor;
pub use readers::{
    ContainerKind, ContainerReaderSpec, EntityReaderSpec, Reader, ReaderSpec,
};
pub use row_set::{CachingRowSet, Row, RowSource, VecRowSource};
