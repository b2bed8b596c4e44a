//! Path-to-column naming.
//!
//! Pure functions from aggregate paths to the table aliases, column
//! aliases and bind-parameter names used in generated statements. The row
//! reader dictionary is keyed by these strings, so the functions must be
//! stable: the same logical column always receives the same alias across
//! the root select, eager joins and key/qualifier columns. Injectivity
//! within one statement is enforced where the statement is assembled, not
//! assumed here.

use lazy_static::lazy_static;
use regex::Regex;

use crate::entity_catalog::AggregatePath;

lazy_static! {
    static ref NON_WORD: Regex = Regex::new(r"\W").expect("static pattern");
}

/// Table alias for the entity at `path`. The root keeps its table name;
/// nested tables are addressed by the flattened dot-path.
pub fn table_alias(root_table: &str, path: &AggregatePath) -> String {
    if path.is_root() {
        root_table.to_string()
    } else {
        path.segments().join("_")
    }
}

/// Flat projection alias for a column owned by the entity at `path`.
/// Root columns keep their bare name.
pub fn column_alias(path: &AggregatePath, column: &str) -> String {
    if path.is_root() {
        column.to_string()
    } else {
        format!("{}_{}", path.segments().join("_"), column)
    }
}

/// Alias of the qualifier (list index / map key) column of a to-many
/// path.
pub fn key_column_alias(path: &AggregatePath, key_column: &str) -> String {
    column_alias(path, key_column)
}

/// Bind-parameter name derived from a column name, stripped to word
/// characters so the marker is a safe identifier in any dialect.
pub fn bind_name(column: &str) -> String {
    let stripped = NON_WORD.replace_all(column, "");
    if stripped.is_empty() {
        "p".to_string()
    } else {
        stripped.into_owned()
    }
}
