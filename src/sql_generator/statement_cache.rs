//! Memoized statement storage.
//!
//! Statements are generated lazily and cached per statement kind (and
//! path, for path-scoped statements) for reuse across invocations. The
//! cache is `RwLock`-guarded so one generator can be shared across
//! threads; a poisoned lock degrades to the surviving inner state rather
//! than panicking a caller that never touched the poisoning thread.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use super::crud_builder::SqlStatement;
use super::errors::SqlBuildError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    SelectAggregate,
    SelectAggregateById,
    SelectAggregateByIdIn,
    SelectById,
    SelectAll,
    SelectByPath,
    Insert,
    InsertByPath,
    Update,
    DeleteById,
    DeleteAll,
    DeleteByPath,
    DeleteAllByPath,
    ExistsById,
    CountAll,
}

impl StatementKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StatementKind::SelectAggregate => "select-aggregate",
            StatementKind::SelectAggregateById => "select-aggregate-by-id",
            StatementKind::SelectAggregateByIdIn => "select-aggregate-by-id-in",
            StatementKind::SelectById => "select-by-id",
            StatementKind::SelectAll => "select-all",
            StatementKind::SelectByPath => "select-by-path",
            StatementKind::Insert => "insert",
            StatementKind::InsertByPath => "insert-by-path",
            StatementKind::Update => "update",
            StatementKind::DeleteById => "delete-by-id",
            StatementKind::DeleteAll => "delete-all",
            StatementKind::DeleteByPath => "delete-by-path",
            StatementKind::DeleteAllByPath => "delete-all-by-path",
            StatementKind::ExistsById => "exists-by-id",
            StatementKind::CountAll => "count-all",
        }
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    kind: StatementKind,
    path: Option<String>,
}

/// Per-generator statement memo.
#[derive(Debug, Default)]
pub struct StatementCache {
    enabled: bool,
    inner: RwLock<HashMap<CacheKey, Arc<SqlStatement>>>,
}

impl StatementCache {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            inner: RwLock::new(HashMap::new()),
        }
    }

    pub fn get_or_try_build<F>(
        &self,
        kind: StatementKind,
        path: Option<&str>,
        build: F,
    ) -> Result<Arc<SqlStatement>, SqlBuildError>
    where
        F: FnOnce() -> Result<SqlStatement, SqlBuildError>,
    {
        let key = CacheKey {
            kind,
            path: path.map(str::to_string),
        };
        if self.enabled {
            let guard = self
                .inner
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(hit) = guard.get(&key) {
                return Ok(hit.clone());
            }
        }
        let built = Arc::new(build()?);
        if self.enabled {
            let mut guard = self
                .inner
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            // A racing builder may have inserted meanwhile; keep the
            // first so callers observe one canonical Arc.
            return Ok(guard.entry(key).or_insert(built).clone());
        }
        Ok(built)
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_builds_return_the_cached_statement() {
        let cache = StatementCache::new(true);
        let mut calls = 0;
        let mut build = || {
            calls += 1;
            Ok(SqlStatement::without_binds("SELECT 1".into()))
        };
        let first = cache
            .get_or_try_build(StatementKind::SelectAggregate, None, &mut build)
            .unwrap();
        let second = cache
            .get_or_try_build(StatementKind::SelectAggregate, None, &mut build)
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls, 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn disabled_cache_rebuilds() {
        let cache = StatementCache::new(false);
        let build = || Ok(SqlStatement::without_binds("SELECT 1".into()));
        let first = cache
            .get_or_try_build(StatementKind::SelectAggregate, None, build)
            .unwrap();
        let second = cache
            .get_or_try_build(StatementKind::SelectAggregate, None, build)
            .unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(cache.is_empty());
    }

    #[test]
    fn path_scoped_entries_are_distinct() {
        let cache = StatementCache::new(true);
        let build_a = || Ok(SqlStatement::without_binds("A".into()));
        let build_b = || Ok(SqlStatement::without_binds("B".into()));
        cache
            .get_or_try_build(StatementKind::SelectByPath, Some("lineItems"), build_a)
            .unwrap();
        let b = cache
            .get_or_try_build(StatementKind::SelectByPath, Some("tags"), build_b)
            .unwrap();
        assert_eq!(b.sql, "B");
        assert_eq!(cache.len(), 2);
    }
}
