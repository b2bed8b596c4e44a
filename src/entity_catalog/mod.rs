//! Entity metadata catalog.
//!
//! The catalog is the structural oracle the rest of the crate consults:
//! which properties an entity has, whether a property is a collection, a
//! map, an embedded object or a reference, which table and columns back
//! it, and how paths through the aggregate resolve. Everything here is
//! plain data resolved ahead of statement generation; there is no runtime
//! reflection.

pub mod config;
pub mod entity;
pub mod errors;
pub mod path;

pub use config::{SchemaDefinition, SchemaRegistry};
pub use entity::{ElementSchema, EntitySchema, IdSchema, PropertySchema};
pub use errors::CatalogError;
pub use path::{AggregatePath, PathKind, PathResolver, ResolvedPath};
