//! SQL statement generation.
//!
//! Produces deterministic SQL text for CRUD plus the single-query
//! join-select, with the path-derived aliasing scheme the row readers
//! decode. One [`SqlGenerator`] serves one entity type; statements and
//! select plans are generated lazily and memoized, so repeated
//! invocations reuse the same text.

pub mod condition_builder;
pub mod crud_builder;
pub mod dialect;
pub mod errors;
pub mod naming;
pub mod select_builder;
pub mod statement_cache;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::entity_catalog::{AggregatePath, EntitySchema, PathKind, PathResolver};

pub use condition_builder::{Direction, Sort};
pub use crud_builder::{BindField, ColumnBind, SqlStatement};
pub use dialect::{AnsiDialect, Dialect, MySqlDialect};
pub use errors::SqlBuildError;
pub use select_builder::{AggregatePlan, PathSelect, SelectBuilder};
pub use statement_cache::{StatementCache, StatementKind};

use condition_builder::order_by_clause;
use crud_builder::CrudBuilder;

pub struct SqlGenerator {
    schema: EntitySchema,
    dialect: Arc<dyn Dialect>,
    cache: StatementCache,
    aggregate_plan: RwLock<Option<Arc<AggregatePlan>>>,
    simple_plan: RwLock<Option<Arc<AggregatePlan>>>,
    path_selects: RwLock<HashMap<String, Arc<PathSelect>>>,
}

impl SqlGenerator {
    pub fn new(schema: EntitySchema, dialect: Arc<dyn Dialect>) -> Self {
        Self::with_cache_enabled(schema, dialect, true)
    }

    pub fn with_cache_enabled(
        schema: EntitySchema,
        dialect: Arc<dyn Dialect>,
        cache_enabled: bool,
    ) -> Self {
        Self {
            schema,
            dialect,
            cache: StatementCache::new(cache_enabled),
            aggregate_plan: RwLock::new(None),
            simple_plan: RwLock::new(None),
            path_selects: RwLock::new(HashMap::new()),
        }
    }

    pub fn schema(&self) -> &EntitySchema {
        &self.schema
    }

    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    /// Whether this entity shape may be loaded through the single flat
    /// join-select. The boundary is deliberate and narrow: a flat root
    /// with direct to-many properties only. To-one references, embedded
    /// objects and collections hanging below the first level all route
    /// through the per-entity fallback.
    pub fn single_query_eligible(&self) -> bool {
        if !self.dialect.supports_single_query_loading() || self.schema.id.is_none() {
            return false;
        }
        PathResolver::resolve(&self.schema)
            .iter()
            .all(|path| match path.kind {
                PathKind::Scalar => true,
                PathKind::Embedded | PathKind::ToOne => false,
                PathKind::ToManyList | PathKind::ToManyMap => path.path.len() == 1,
            })
    }

    /// The full join-everything plan: statement text plus reader spec.
    pub fn aggregate_plan(&self) -> Result<Arc<AggregatePlan>, SqlBuildError> {
        self.plan(&self.aggregate_plan, true)
    }

    /// Root row with embedded members and joined to-one references, no
    /// to-many subtrees; the fallback loading path starts here.
    pub fn simple_plan(&self) -> Result<Arc<AggregatePlan>, SqlBuildError> {
        self.plan(&self.simple_plan, false)
    }

    fn plan(
        &self,
        cell: &RwLock<Option<Arc<AggregatePlan>>>,
        include_to_many: bool,
    ) -> Result<Arc<AggregatePlan>, SqlBuildError> {
        if let Some(plan) = cell
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_ref()
        {
            return Ok(plan.clone());
        }
        let built = Arc::new(
            SelectBuilder::new(&self.schema, self.dialect.as_ref(), include_to_many).build()?,
        );
        let mut guard = cell
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(guard.get_or_insert(built).clone())
    }

    /// Dedicated select for one to-many path, used by the fallback
    /// loading path and memoized per dot-path.
    pub fn path_select(&self, path: &AggregatePath) -> Result<Arc<PathSelect>, SqlBuildError> {
        let key = path.dot_path();
        if let Some(hit) = self
            .path_selects
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&key)
        {
            return Ok(hit.clone());
        }
        let built = Arc::new(
            SelectBuilder::new(&self.schema, self.dialect.as_ref(), true)
                .build_path_select(path)?,
        );
        let mut guard = self
            .path_selects
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(guard.entry(key).or_insert(built).clone())
    }

    pub fn select_aggregate(&self) -> Result<Arc<SqlStatement>, SqlBuildError> {
        self.cache
            .get_or_try_build(StatementKind::SelectAggregate, None, || {
                Ok(SqlStatement::without_binds(self.aggregate_plan()?.sql_all()))
            })
    }

    pub fn select_aggregate_by_id(&self) -> Result<Arc<SqlStatement>, SqlBuildError> {
        self.cache
            .get_or_try_build(StatementKind::SelectAggregateById, None, || {
                let plan = self.aggregate_plan()?;
                Ok(SqlStatement {
                    sql: plan.sql_by_id(),
                    binds: vec![ColumnBind {
                        column: plan.root_id_column.clone(),
                        bind_name: plan.root_id_bind.clone(),
                        field: BindField::Id,
                    }],
                })
            })
    }

    pub fn select_aggregate_by_id_in(&self) -> Result<Arc<SqlStatement>, SqlBuildError> {
        self.cache
            .get_or_try_build(StatementKind::SelectAggregateByIdIn, None, || {
                let plan = self.aggregate_plan()?;
                Ok(SqlStatement {
                    sql: plan.sql_by_id_in(),
                    binds: vec![ColumnBind {
                        column: plan.root_id_column.clone(),
                        bind_name: format!("{}s", plan.root_id_bind),
                        field: BindField::Id,
                    }],
                })
            })
    }

    pub fn select_by_id(&self) -> Result<Arc<SqlStatement>, SqlBuildError> {
        self.cache
            .get_or_try_build(StatementKind::SelectById, None, || {
                let plan = self.simple_plan()?;
                Ok(SqlStatement {
                    sql: plan.sql_by_id(),
                    binds: vec![ColumnBind {
                        column: plan.root_id_column.clone(),
                        bind_name: plan.root_id_bind.clone(),
                        field: BindField::Id,
                    }],
                })
            })
    }

    /// All-roots select over the simple plan. Sorted or paged variants
    /// are rendered per call; the unadorned variant is cached.
    pub fn select_all(
        &self,
        sort: Option<&Sort>,
        limit: Option<u64>,
        offset: Option<u64>,
    ) -> Result<SqlStatement, SqlBuildError> {
        let needs_suffix = sort.map(|s| !s.is_empty()).unwrap_or(false)
            || limit.is_some()
            || offset.is_some();
        if !needs_suffix {
            let cached = self
                .cache
                .get_or_try_build(StatementKind::SelectAll, None, || {
                    Ok(SqlStatement::without_binds(self.simple_plan()?.sql_all()))
                })?;
            return Ok((*cached).clone());
        }
        let plan = self.simple_plan()?;
        let mut sql = match sort {
            Some(sort) if !sort.is_empty() => format!(
                "{}{}",
                plan.base_sql(),
                order_by_clause(&self.schema, self.dialect.as_ref(), sort)?
            ),
            _ => plan.sql_all(),
        };
        sql.push_str(&self.dialect.limit_clause(limit, offset));
        Ok(SqlStatement::without_binds(sql))
    }

    pub fn insert(&self) -> Result<Arc<SqlStatement>, SqlBuildError> {
        self.cache.get_or_try_build(StatementKind::Insert, None, || {
            Ok(CrudBuilder::new(&self.schema, self.dialect.as_ref()).insert())
        })
    }

    pub fn insert_for_path(
        &self,
        path: &AggregatePath,
    ) -> Result<Arc<SqlStatement>, SqlBuildError> {
        self.cache
            .get_or_try_build(StatementKind::InsertByPath, Some(&path.dot_path()), || {
                CrudBuilder::new(&self.schema, self.dialect.as_ref()).insert_for_path(path)
            })
    }

    pub fn update(&self) -> Result<Arc<SqlStatement>, SqlBuildError> {
        self.cache.get_or_try_build(StatementKind::Update, None, || {
            CrudBuilder::new(&self.schema, self.dialect.as_ref()).update()
        })
    }

    pub fn delete_by_id(&self) -> Result<Arc<SqlStatement>, SqlBuildError> {
        self.cache
            .get_or_try_build(StatementKind::DeleteById, None, || {
                CrudBuilder::new(&self.schema, self.dialect.as_ref()).delete_by_id()
            })
    }

    pub fn delete_all(&self) -> Result<Arc<SqlStatement>, SqlBuildError> {
        self.cache
            .get_or_try_build(StatementKind::DeleteAll, None, || {
                Ok(CrudBuilder::new(&self.schema, self.dialect.as_ref()).delete_all())
            })
    }

    pub fn delete_by_path(
        &self,
        path: &AggregatePath,
    ) -> Result<Arc<SqlStatement>, SqlBuildError> {
        self.cache
            .get_or_try_build(StatementKind::DeleteByPath, Some(&path.dot_path()), || {
                CrudBuilder::new(&self.schema, self.dialect.as_ref()).delete_by_path(path)
            })
    }

    pub fn delete_all_by_path(
        &self,
        path: &AggregatePath,
    ) -> Result<Arc<SqlStatement>, SqlBuildError> {
        self.cache
            .get_or_try_build(StatementKind::DeleteAllByPath, Some(&path.dot_path()), || {
                CrudBuilder::new(&self.schema, self.dialect.as_ref()).delete_all_by_path(path)
            })
    }

    pub fn exists_by_id(&self) -> Result<Arc<SqlStatement>, SqlBuildError> {
        self.cache
            .get_or_try_build(StatementKind::ExistsById, None, || {
                CrudBuilder::new(&self.schema, self.dialect.as_ref()).exists_by_id()
            })
    }

    pub fn count_all(&self) -> Result<Arc<SqlStatement>, SqlBuildError> {
        self.cache.get_or_try_build(StatementKind::CountAll, None, || {
            Ok(CrudBuilder::new(&self.schema, self.dialect.as_ref()).count_all())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity_catalog::{ElementSchema, IdSchema, PropertySchema};

    fn order_schema() -> EntitySchema {
        EntitySchema {
            name: "Order".into(),
            table: "orders".into(),
            id: Some(IdSchema {
                property: "id".into(),
                column: "id".into(),
            }),
            properties: vec![
                PropertySchema::Scalar {
                    name: "status".into(),
                    column: "status".into(),
                },
                PropertySchema::ToManyList {
                    name: "lineItems".into(),
                    reverse_column: "order_id".into(),
                    key_column: "order_idx".into(),
                    element: ElementSchema::Entity(EntitySchema {
                        name: "LineItem".into(),
                        table: "line_item".into(),
                        id: Some(IdSchema {
                            property: "id".into(),
                            column: "id".into(),
                        }),
                        properties: vec![PropertySchema::Scalar {
                            name: "qty".into(),
                            column: "qty".into(),
                        }],
                    }),
                },
            ],
        }
    }

    fn generator() -> SqlGenerator {
        SqlGenerator::new(order_schema(), Arc::new(AnsiDialect))
    }

    #[test]
    fn repeated_generation_returns_cached_statement() {
        let generator = generator();
        let first = generator.select_aggregate().unwrap();
        let second = generator.select_aggregate().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn eligibility_boundary() {
        assert!(generator().single_query_eligible());

        // A to-one reference pushes the shape to the fallback path.
        let mut schema = order_schema();
        schema.properties.push(PropertySchema::ToOne {
            name: "customer".into(),
            reverse_column: "order_id".into(),
            always_create: false,
            entity: EntitySchema {
                name: "Customer".into(),
                table: "customer".into(),
                id: Some(IdSchema {
                    property: "id".into(),
                    column: "id".into(),
                }),
                properties: vec![],
            },
        });
        assert!(!SqlGenerator::new(schema, Arc::new(AnsiDialect)).single_query_eligible());

        // A dialect without single-query support disables it outright.
        assert!(
            !SqlGenerator::new(order_schema(), Arc::new(MySqlDialect)).single_query_eligible()
        );
    }

    #[test]
    fn select_all_with_sort_appends_order_by() {
        let generator = generator();
        let sort = Sort::by("status");
        let statement = generator.select_all(Some(&sort), Some(10), None).unwrap();
        assert!(statement
            .sql
            .ends_with(" ORDER BY orders.status ASC LIMIT 10"));
    }

    #[test]
    fn unresolvable_sort_fails_fast() {
        let generator = generator();
        let sort = Sort::by("lineItems.qty");
        assert!(matches!(
            generator.select_all(Some(&sort), None, None).unwrap_err(),
            SqlBuildError::SortPropertyUnresolvable { .. }
        ));
    }
}
