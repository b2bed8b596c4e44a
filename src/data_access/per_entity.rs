//! Per-entity fallback loading path.
//!
//! Used when an aggregate's shape is outside the single-query boundary.
//! The root query joins embedded members and to-one references inline;
//! each to-many property is loaded lazily per parent through its own
//! single-property result set, driven by the same container accumulation
//! the flat path uses. Output is document-equivalent to the single-query
//! path for every shape both support, at the cost of N+1 queries.

use serde_json::Value;

use crate::aggregate_reader::{
    AggregateExtractor, Reader, ReaderSpec, RowDocument, RowSource, RowValue,
};
use crate::entity_catalog::{AggregatePath, ElementSchema, EntitySchema, PropertySchema};
use crate::sql_generator::{SqlGenerator, Sort};

use super::errors::DataAccessError;
use super::executor::{QueryExecutor, SqlParam};

pub(crate) fn find_by_id(
    generator: &SqlGenerator,
    executor: &mut dyn QueryExecutor,
    id: &Value,
) -> Result<Option<RowDocument>, DataAccessError> {
    let entity = &generator.schema().name;
    let plan = generator
        .simple_plan()
        .map_err(|e| DataAccessError::sql(entity, e))?;
    let statement = generator
        .select_by_id()
        .map_err(|e| DataAccessError::sql(entity, e))?;
    let params = vec![SqlParam::new(plan.root_id_bind.clone(), id.clone())];
    let rows = executor
        .query(&statement.sql, &params)
        .map_err(|e| DataAccessError::executor(entity, "select-by-id", e))?;
    let extractor = AggregateExtractor::new(plan.reader_spec.clone(), plan.root_id_alias.clone());
    let mut document = extractor
        .extract_single(rows)
        .map_err(|e| DataAccessError::extract(entity, e))?;
    if let Some(document) = document.as_mut() {
        load_containers(
            generator,
            executor,
            generator.schema(),
            &AggregatePath::root(),
            None,
            document,
        )?;
    }
    Ok(document)
}

pub(crate) fn find_all(
    generator: &SqlGenerator,
    executor: &mut dyn QueryExecutor,
    sort: Option<&Sort>,
    limit: Option<u64>,
    offset: Option<u64>,
) -> Result<Vec<RowDocument>, DataAccessError> {
    let entity = &generator.schema().name;
    let plan = generator
        .simple_plan()
        .map_err(|e| DataAccessError::sql(entity, e))?;
    let statement = generator
        .select_all(sort, limit, offset)
        .map_err(|e| DataAccessError::sql(entity, e))?;
    let rows = executor
        .query(&statement.sql, &[])
        .map_err(|e| DataAccessError::executor(entity, "select-all", e))?;
    let extractor = AggregateExtractor::new(plan.reader_spec.clone(), plan.root_id_alias.clone());
    let mut documents = extractor
        .extract(rows)
        .map_err(|e| DataAccessError::extract(entity, e))?;
    for document in documents.iter_mut() {
        load_containers(
            generator,
            executor,
            generator.schema(),
            &AggregatePath::root(),
            None,
            document,
        )?;
    }
    Ok(documents)
}

/// Merge each to-many property of `entity` into `document`, then recurse
/// through inline to-one references, embedded members and loaded element
/// documents. `inherited_id` carries the owning entity's id through
/// embedded levels, whose children back-reference the owner's table.
fn load_containers(
    generator: &SqlGenerator,
    executor: &mut dyn QueryExecutor,
    entity: &EntitySchema,
    base_path: &AggregatePath,
    inherited_id: Option<&Value>,
    document: &mut RowDocument,
) -> Result<(), DataAccessError> {
    let own_id = entity
        .id_property()
        .and_then(|property| document.get(property))
        .and_then(|value| match value {
            RowValue::Scalar(v) => Some(v.clone()),
            _ => None,
        });
    let parent_id = own_id.or_else(|| inherited_id.cloned());

    for property in &entity.properties {
        match property {
            PropertySchema::ToManyList { name, element, .. }
            | PropertySchema::ToManyMap { name, element, .. } => {
                let path = base_path.append(name);
                let parent_id =
                    parent_id
                        .as_ref()
                        .ok_or_else(|| DataAccessError::MissingId {
                            entity: entity.name.clone(),
                            operation: "loading a nested collection",
                        })?;
                let select = generator
                    .path_select(&path)
                    .map_err(|e| DataAccessError::sql(&generator.schema().name, e))?;
                let params = vec![SqlParam::new(select.parent_bind.clone(), parent_id.clone())];
                let mut rows = executor
                    .query(&select.sql, &params)
                    .map_err(|e| {
                        DataAccessError::executor(&entity.name, "select-by-path", e)
                    })?;
                let mut reader =
                    Reader::from_spec(&ReaderSpec::Container(select.spec.clone()));
                while let Some(row) = rows
                    .next_row()
                    .map_err(|e| DataAccessError::extract(&entity.name, e))?
                {
                    reader
                        .read(&row)
                        .map_err(|e| DataAccessError::extract(&entity.name, e))?;
                }
                if reader.has_result() {
                    if let Some(mut value) = reader
                        .take_result()
                        .map_err(|e| DataAccessError::extract(&entity.name, e))?
                    {
                        if let ElementSchema::Entity(element_entity) = element {
                            descend_into_elements(
                                generator,
                                executor,
                                element_entity,
                                &path,
                                &mut value,
                            )?;
                        }
                        document.insert(name.clone(), value);
                    }
                }
            }
            PropertySchema::ToOne {
                name,
                entity: child,
                ..
            } => {
                let path = base_path.append(name);
                if let Some(RowValue::Document(child_document)) = document.get_mut(name) {
                    load_containers(generator, executor, child, &path, None, child_document)?;
                }
            }
            PropertySchema::Embedded {
                name,
                entity: embedded,
                ..
            } => {
                let path = base_path.append(name);
                if document.get(name).is_none() && has_containers(embedded) {
                    // The embedded members were all null, but collections
                    // under the embedded object still hang off the
                    // owner's id and may hold rows.
                    let mut fresh = RowDocument::new();
                    load_containers(
                        generator,
                        executor,
                        embedded,
                        &path,
                        parent_id.as_ref(),
                        &mut fresh,
                    )?;
                    if !fresh.is_empty() {
                        document.insert(name.clone(), RowValue::Document(fresh));
                    }
                } else if let Some(RowValue::Document(embedded_document)) = document.get_mut(name)
                {
                    load_containers(
                        generator,
                        executor,
                        embedded,
                        &path,
                        parent_id.as_ref(),
                        embedded_document,
                    )?;
                }
            }
            PropertySchema::Scalar { .. } => {}
        }
    }
    Ok(())
}

fn descend_into_elements(
    generator: &SqlGenerator,
    executor: &mut dyn QueryExecutor,
    element_entity: &EntitySchema,
    path: &AggregatePath,
    value: &mut RowValue,
) -> Result<(), DataAccessError> {
    match value {
        RowValue::List(items) => {
            for item in items.iter_mut() {
                if let RowValue::Document(document) = item {
                    load_containers(generator, executor, element_entity, path, None, document)?;
                }
            }
        }
        RowValue::Document(map) => {
            for (_, item) in map.iter_mut() {
                if let RowValue::Document(document) = item {
                    load_containers(generator, executor, element_entity, path, None, document)?;
                }
            }
        }
        RowValue::Scalar(_) => {}
    }
    Ok(())
}

fn has_containers(entity: &EntitySchema) -> bool {
    entity.properties.iter().any(|property| {
        matches!(
            property,
            PropertySchema::ToManyList { .. } | PropertySchema::ToManyMap { .. }
        ) || matches!(property, PropertySchema::Embedded { entity, .. } if has_containers(entity))
    })
}
