//! Dialect hooks.
//!
//! Deliberately narrow: identifier quoting, paging clause rendering, and
//! the single-query-loading capability flag. Full dialect abstraction is
//! out of scope; statements are otherwise plain ANSI.

use std::collections::HashSet;

use lazy_static::lazy_static;

lazy_static! {
    /// Identifiers that must be quoted even though they are plain words.
    static ref RESERVED_WORDS: HashSet<&'static str> = [
        "all", "and", "as", "asc", "by", "delete", "desc", "distinct", "from",
        "group", "in", "index", "inner", "insert", "into", "join", "key",
        "left", "limit", "not", "null", "offset", "on", "or", "order",
        "outer", "primary", "right", "select", "set", "table", "update",
        "user", "value", "values", "where",
    ]
    .into_iter()
    .collect();
}

fn is_plain_identifier(ident: &str) -> bool {
    let mut chars = ident.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn needs_quoting(ident: &str) -> bool {
    !is_plain_identifier(ident) || RESERVED_WORDS.contains(ident.to_ascii_lowercase().as_str())
}

pub trait Dialect: Send + Sync {
    fn name(&self) -> &'static str;

    fn quote(&self, ident: &str) -> String {
        if needs_quoting(ident) {
            format!("\"{}\"", ident.replace('"', "\"\""))
        } else {
            ident.to_string()
        }
    }

    /// Whether the single flat join-select strategy may be used at all.
    fn supports_single_query_loading(&self) -> bool;

    fn limit_clause(&self, limit: Option<u64>, offset: Option<u64>) -> String {
        match (limit, offset) {
            (Some(limit), Some(offset)) => format!(" LIMIT {limit} OFFSET {offset}"),
            (Some(limit), None) => format!(" LIMIT {limit}"),
            (None, Some(offset)) => format!(" OFFSET {offset}"),
            (None, None) => String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AnsiDialect;

impl Dialect for AnsiDialect {
    fn name(&self) -> &'static str {
        "ansi"
    }

    fn supports_single_query_loading(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDialect;

impl Dialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn quote(&self, ident: &str) -> String {
        if needs_quoting(ident) {
            format!("`{}`", ident.replace('`', "``"))
        } else {
            ident.to_string()
        }
    }

    // TODO: enable after the generated aliases are checked against
    // MySQL's 64-character identifier limit for deep paths.
    fn supports_single_query_loading(&self) -> bool {
        false
    }
}

/// Resolve a configured dialect name.
pub fn dialect_by_name(name: &str) -> Option<std::sync::Arc<dyn Dialect>> {
    match name.to_ascii_lowercase().as_str() {
        "ansi" => Some(std::sync::Arc::new(AnsiDialect)),
        "mysql" => Some(std::sync::Arc::new(MySqlDialect)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoting_rules() {
        let ansi = AnsiDialect;
        assert_eq!(ansi.quote("line_item"), "line_item");
        assert_eq!(ansi.quote("order"), "\"order\"");
        assert_eq!(ansi.quote("weird col"), "\"weird col\"");
        assert_eq!(ansi.quote("has\"quote"), "\"has\"\"quote\"");
        let mysql = MySqlDialect;
        assert_eq!(mysql.quote("order"), "`order`");
    }

    #[test]
    fn limit_rendering() {
        let ansi = AnsiDialect;
        assert_eq!(ansi.limit_clause(Some(10), Some(5)), " LIMIT 10 OFFSET 5");
        assert_eq!(ansi.limit_clause(None, None), "");
    }
}
