//! Data access strategy facade.
//!
//! A stateless dispatcher: each read evaluates single-query eligibility
//! (entity shape, dialect capability, absence of sort/paging) and routes
//! to the flat join-select loop or the per-entity fallback. Writes are
//! per-level single-table statements and take the same route regardless
//! of read strategy.

use std::sync::Arc;

use serde_json::Value;

use crate::aggregate_reader::{RowDocument, RowSource, RowValue};
use crate::config::MapperConfig;
use crate::entity_catalog::{
    AggregatePath, ElementSchema, EntitySchema, PathKind, PathResolver, PropertySchema,
};
use crate::sql_generator::{BindField, ColumnBind, Dialect, Sort, SqlGenerator};

use super::errors::DataAccessError;
use super::executor::{QueryExecutor, SqlParam};
use super::{per_entity, single_query};

pub struct AggregateStore {
    generator: SqlGenerator,
    config: MapperConfig,
}

impl AggregateStore {
    pub fn new(schema: EntitySchema, dialect: Arc<dyn Dialect>) -> Self {
        Self::with_config(schema, dialect, MapperConfig::default())
    }

    pub fn with_config(
        schema: EntitySchema,
        dialect: Arc<dyn Dialect>,
        config: MapperConfig,
    ) -> Self {
        let generator =
            SqlGenerator::with_cache_enabled(schema, dialect, config.statement_cache_enabled);
        Self { generator, config }
    }

    pub fn generator(&self) -> &SqlGenerator {
        &self.generator
    }

    fn schema(&self) -> &EntitySchema {
        self.generator.schema()
    }

    fn entity(&self) -> &str {
        &self.generator.schema().name
    }

    pub fn find_by_id(
        &self,
        executor: &mut dyn QueryExecutor,
        id: &Value,
    ) -> Result<Option<RowDocument>, DataAccessError> {
        if self.generator.single_query_eligible() {
            single_query::find_by_id(&self.generator, executor, id)
        } else {
            per_entity::find_by_id(&self.generator, executor, id)
        }
    }

    /// Sorted reads always take the fallback path: the flat join-select
    /// orders by root id to keep unit boundaries contiguous, which a
    /// caller-supplied ordering would break.
    pub fn find_all(
        &self,
        executor: &mut dyn QueryExecutor,
        sort: Option<&Sort>,
    ) -> Result<Vec<RowDocument>, DataAccessError> {
        let sorted = sort.map(|s| !s.is_empty()).unwrap_or(false);
        if !sorted && self.generator.single_query_eligible() {
            single_query::find_all(&self.generator, executor)
        } else {
            per_entity::find_all(&self.generator, executor, sort, None, None)
        }
    }

    pub fn find_all_by_id(
        &self,
        executor: &mut dyn QueryExecutor,
        ids: &[Value],
    ) -> Result<Vec<RowDocument>, DataAccessError> {
        let mut documents = Vec::with_capacity(ids.len());
        if self.generator.single_query_eligible() {
            for chunk in ids.chunks(self.config.in_list_chunk_size.max(1)) {
                documents.extend(single_query::find_all_by_id(
                    &self.generator,
                    executor,
                    chunk,
                )?);
            }
        } else {
            for id in ids {
                if let Some(document) = per_entity::find_by_id(&self.generator, executor, id)? {
                    documents.push(document);
                }
            }
        }
        Ok(documents)
    }

    pub fn exists_by_id(
        &self,
        executor: &mut dyn QueryExecutor,
        id: &Value,
    ) -> Result<bool, DataAccessError> {
        let statement = self
            .generator
            .exists_by_id()
            .map_err(|e| DataAccessError::sql(self.entity(), e))?;
        let params = bind_id_params(&statement.binds, id);
        let count = self.read_count(executor, &statement.sql, &params, "exists-by-id")?;
        Ok(count > 0)
    }

    pub fn count(&self, executor: &mut dyn QueryExecutor) -> Result<u64, DataAccessError> {
        let statement = self
            .generator
            .count_all()
            .map_err(|e| DataAccessError::sql(self.entity(), e))?;
        self.read_count(executor, &statement.sql, &[], "count-all")
    }

    fn read_count(
        &self,
        executor: &mut dyn QueryExecutor,
        sql: &str,
        params: &[SqlParam],
        kind: &'static str,
    ) -> Result<u64, DataAccessError> {
        let mut rows = executor
            .query(sql, params)
            .map_err(|e| DataAccessError::executor(self.entity(), kind, e))?;
        let first = rows
            .next_row()
            .map_err(|e| DataAccessError::extract(self.entity(), e))?;
        Ok(first
            .and_then(|row| row.get("cnt").cloned())
            .and_then(|value| value.as_u64())
            .unwrap_or(0))
    }

    /// Insert the root row, then every nested row, parents before
    /// children.
    pub fn insert_aggregate(
        &self,
        executor: &mut dyn QueryExecutor,
        document: &RowDocument,
    ) -> Result<(), DataAccessError> {
        let schema = self.schema();
        let statement = self
            .generator
            .insert()
            .map_err(|e| DataAccessError::sql(self.entity(), e))?;
        let params = self.bind_document(schema, &statement.binds, document, None, None, None)?;
        executor
            .execute(&statement.sql, &params)
            .map_err(|e| DataAccessError::executor(self.entity(), "insert", e))?;
        if !needs_child_rows(schema) {
            return Ok(());
        }
        let root_id = self.required_id(schema, document)?;
        self.insert_children(executor, schema, &AggregatePath::root(), document, &root_id)
    }

    /// Update the root row, wipe nested rows deepest-first, and
    /// re-insert the document's current children.
    pub fn update_aggregate(
        &self,
        executor: &mut dyn QueryExecutor,
        document: &RowDocument,
    ) -> Result<(), DataAccessError> {
        let schema = self.schema();
        let root_id = self.required_id(schema, document)?;
        let statement = self
            .generator
            .update()
            .map_err(|e| DataAccessError::sql(self.entity(), e))?;
        let params = self.bind_document(schema, &statement.binds, document, None, None, None)?;
        executor
            .execute(&statement.sql, &params)
            .map_err(|e| DataAccessError::executor(self.entity(), "update", e))?;
        self.delete_nested_rows(executor, &root_id)?;
        self.insert_children(executor, schema, &AggregatePath::root(), document, &root_id)
    }

    pub fn delete_by_id(
        &self,
        executor: &mut dyn QueryExecutor,
        id: &Value,
    ) -> Result<(), DataAccessError> {
        self.delete_nested_rows(executor, id)?;
        let statement = self
            .generator
            .delete_by_id()
            .map_err(|e| DataAccessError::sql(self.entity(), e))?;
        let params = bind_id_params(&statement.binds, id);
        executor
            .execute(&statement.sql, &params)
            .map_err(|e| DataAccessError::executor(self.entity(), "delete-by-id", e))?;
        Ok(())
    }

    pub fn delete_all(&self, executor: &mut dyn QueryExecutor) -> Result<(), DataAccessError> {
        for path in self.nested_paths_deepest_first() {
            let statement = self
                .generator
                .delete_all_by_path(&path)
                .map_err(|e| DataAccessError::sql(self.entity(), e))?;
            executor
                .execute(&statement.sql, &[])
                .map_err(|e| DataAccessError::executor(self.entity(), "delete-all-by-path", e))?;
        }
        let statement = self
            .generator
            .delete_all()
            .map_err(|e| DataAccessError::sql(self.entity(), e))?;
        executor
            .execute(&statement.sql, &[])
            .map_err(|e| DataAccessError::executor(self.entity(), "delete-all", e))?;
        Ok(())
    }

    fn delete_nested_rows(
        &self,
        executor: &mut dyn QueryExecutor,
        root_id: &Value,
    ) -> Result<(), DataAccessError> {
        for path in self.nested_paths_deepest_first() {
            let statement = self
                .generator
                .delete_by_path(&path)
                .map_err(|e| DataAccessError::sql(self.entity(), e))?;
            let params = bind_id_params(&statement.binds, root_id);
            executor
                .execute(&statement.sql, &params)
                .map_err(|e| DataAccessError::executor(self.entity(), "delete-by-path", e))?;
        }
        Ok(())
    }

    /// Every path with its own table rows, deepest first so children go
    /// before the rows they reference.
    fn nested_paths_deepest_first(&self) -> Vec<AggregatePath> {
        let mut paths: Vec<AggregatePath> = PathResolver::resolve(self.schema())
            .into_iter()
            .filter(|path| {
                matches!(
                    path.kind,
                    PathKind::ToOne | PathKind::ToManyList | PathKind::ToManyMap
                )
            })
            .map(|path| path.path)
            .collect();
        paths.sort_by_key(|path| std::cmp::Reverse(path.len()));
        paths
    }

    fn insert_children(
        &self,
        executor: &mut dyn QueryExecutor,
        entity: &EntitySchema,
        base_path: &AggregatePath,
        document: &RowDocument,
        owner_id: &Value,
    ) -> Result<(), DataAccessError> {
        for property in &entity.properties {
            match property {
                PropertySchema::ToOne {
                    name,
                    entity: child,
                    ..
                } => {
                    let Some(RowValue::Document(child_document)) = document.get(name) else {
                        continue;
                    };
                    let path = base_path.append(name);
                    self.insert_child_row(
                        executor,
                        child,
                        &path,
                        child_document,
                        owner_id,
                        None,
                    )?;
                    self.recurse_into_child(executor, child, &path, child_document)?;
                }
                PropertySchema::ToManyList { name, element, .. } => {
                    let Some(RowValue::List(items)) = document.get(name) else {
                        continue;
                    };
                    let path = base_path.append(name);
                    for (index, item) in items.iter().enumerate() {
                        // Gaps stay gaps: a null slot has no row.
                        if item.is_null() {
                            continue;
                        }
                        let key = Value::from((index + 1) as u64);
                        self.insert_element(executor, element, &path, item, owner_id, &key)?;
                    }
                }
                PropertySchema::ToManyMap { name, element, .. } => {
                    let Some(RowValue::Document(entries)) = document.get(name) else {
                        continue;
                    };
                    let path = base_path.append(name);
                    for (key, item) in entries.iter() {
                        let key = Value::String(key.to_string());
                        self.insert_element(executor, element, &path, item, owner_id, &key)?;
                    }
                }
                PropertySchema::Embedded {
                    name,
                    entity: embedded,
                    ..
                } => {
                    let Some(RowValue::Document(embedded_document)) = document.get(name) else {
                        continue;
                    };
                    let path = base_path.append(name);
                    self.insert_children(executor, embedded, &path, embedded_document, owner_id)?;
                }
                PropertySchema::Scalar { .. } => {}
            }
        }
        Ok(())
    }

    fn insert_element(
        &self,
        executor: &mut dyn QueryExecutor,
        element: &ElementSchema,
        path: &AggregatePath,
        item: &RowValue,
        owner_id: &Value,
        key: &Value,
    ) -> Result<(), DataAccessError> {
        match (element, item) {
            (ElementSchema::Entity(child), RowValue::Document(child_document)) => {
                self.insert_child_row(
                    executor,
                    child,
                    path,
                    child_document,
                    owner_id,
                    Some(key),
                )?;
                self.recurse_into_child(executor, child, path, child_document)
            }
            (ElementSchema::Scalar { .. }, RowValue::Scalar(value)) => {
                let statement = self
                    .generator
                    .insert_for_path(path)
                    .map_err(|e| DataAccessError::sql(self.entity(), e))?;
                let mut params = Vec::with_capacity(statement.binds.len());
                for bind in &statement.binds {
                    let bound = match &bind.field {
                        BindField::Value => value.clone(),
                        BindField::Reverse => owner_id.clone(),
                        BindField::Key => key.clone(),
                        _ => Value::Null,
                    };
                    params.push(SqlParam::new(bind.bind_name.clone(), bound));
                }
                executor
                    .execute(&statement.sql, &params)
                    .map_err(|e| DataAccessError::executor(self.entity(), "insert-by-path", e))?;
                Ok(())
            }
            _ => {
                log::warn!(
                    "Skipping element at `{}`: document shape does not match the schema",
                    path.dot_path()
                );
                Ok(())
            }
        }
    }

    fn insert_child_row(
        &self,
        executor: &mut dyn QueryExecutor,
        child: &EntitySchema,
        path: &AggregatePath,
        child_document: &RowDocument,
        owner_id: &Value,
        key: Option<&Value>,
    ) -> Result<(), DataAccessError> {
        let statement = self
            .generator
            .insert_for_path(path)
            .map_err(|e| DataAccessError::sql(self.entity(), e))?;
        let params = self.bind_document(
            child,
            &statement.binds,
            child_document,
            Some(owner_id),
            key,
            None,
        )?;
        executor
            .execute(&statement.sql, &params)
            .map_err(|e| DataAccessError::executor(self.entity(), "insert-by-path", e))?;
        Ok(())
    }

    fn recurse_into_child(
        &self,
        executor: &mut dyn QueryExecutor,
        child: &EntitySchema,
        path: &AggregatePath,
        child_document: &RowDocument,
    ) -> Result<(), DataAccessError> {
        if !needs_child_rows(child) {
            return Ok(());
        }
        let child_id = self.required_id(child, child_document)?;
        self.insert_children(executor, child, path, child_document, &child_id)
    }

    fn required_id(
        &self,
        entity: &EntitySchema,
        document: &RowDocument,
    ) -> Result<Value, DataAccessError> {
        let property = entity
            .id_property()
            .ok_or_else(|| DataAccessError::MissingId {
                entity: entity.name.clone(),
                operation: "writing nested rows",
            })?;
        match document.get(property) {
            Some(RowValue::Scalar(value)) if !value.is_null() => Ok(value.clone()),
            _ => Err(DataAccessError::missing_field(&entity.name, property)),
        }
    }

    fn bind_document(
        &self,
        entity: &EntitySchema,
        binds: &[ColumnBind],
        document: &RowDocument,
        parent_id: Option<&Value>,
        key: Option<&Value>,
        value: Option<&Value>,
    ) -> Result<Vec<SqlParam>, DataAccessError> {
        let mut params = Vec::with_capacity(binds.len());
        for bind in binds {
            let bound = match &bind.field {
                BindField::Id => entity
                    .id_property()
                    .and_then(|property| document.get(property))
                    .and_then(|v| match v {
                        RowValue::Scalar(v) => Some(v.clone()),
                        _ => None,
                    })
                    .unwrap_or(Value::Null),
                BindField::Property(dotted) => lookup_dotted(document, dotted),
                BindField::Reverse => parent_id
                    .cloned()
                    .ok_or_else(|| DataAccessError::missing_field(&entity.name, &bind.column))?,
                BindField::Key => key
                    .cloned()
                    .ok_or_else(|| DataAccessError::missing_field(&entity.name, &bind.column))?,
                BindField::Value => value.cloned().unwrap_or(Value::Null),
            };
            params.push(SqlParam::new(bind.bind_name.clone(), bound));
        }
        Ok(params)
    }
}

/// Does writing this entity require rows beyond its own table? Embedded
/// members live in the owner's row, so only actual table hops count.
fn needs_child_rows(entity: &EntitySchema) -> bool {
    entity.properties.iter().any(|property| match property {
        PropertySchema::ToOne { .. }
        | PropertySchema::ToManyList { .. }
        | PropertySchema::ToManyMap { .. } => true,
        PropertySchema::Embedded { entity, .. } => needs_child_rows(entity),
        PropertySchema::Scalar { .. } => false,
    })
}

fn bind_id_params(binds: &[ColumnBind], id: &Value) -> Vec<SqlParam> {
    binds
        .iter()
        .map(|bind| {
            let value = match bind.field {
                BindField::Id => id.clone(),
                _ => Value::Null,
            };
            SqlParam::new(bind.bind_name.clone(), value)
        })
        .collect()
}

/// Navigate a dotted property path (`address.city`) through nested
/// documents; anything unresolvable binds as null.
fn lookup_dotted(document: &RowDocument, dotted: &str) -> Value {
    let mut current = document;
    let segments: Vec<&str> = dotted.split('.').collect();
    for (index, segment) in segments.iter().enumerate() {
        match current.get(segment) {
            Some(RowValue::Scalar(value)) if index + 1 == segments.len() => {
                return value.clone();
            }
            Some(RowValue::Document(nested)) if index + 1 < segments.len() => {
                current = nested;
            }
            _ => return Value::Null,
        }
    }
    Value::Null
}
