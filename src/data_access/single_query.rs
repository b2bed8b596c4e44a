//! Single-query loading path.
//!
//! One flat join-select per read; the extractor rebuilds every aggregate
//! from the shared row stream.

use serde_json::Value;

use crate::aggregate_reader::{AggregateExtractor, RowDocument};
use crate::sql_generator::SqlGenerator;

use super::errors::DataAccessError;
use super::executor::{QueryExecutor, SqlParam};

pub(crate) fn find_by_id(
    generator: &SqlGenerator,
    executor: &mut dyn QueryExecutor,
    id: &Value,
) -> Result<Option<RowDocument>, DataAccessError> {
    let entity = &generator.schema().name;
    let plan = generator
        .aggregate_plan()
        .map_err(|e| DataAccessError::sql(entity, e))?;
    let statement = generator
        .select_aggregate_by_id()
        .map_err(|e| DataAccessError::sql(entity, e))?;
    let params = vec![SqlParam::new(plan.root_id_bind.clone(), id.clone())];
    let rows = executor
        .query(&statement.sql, &params)
        .map_err(|e| DataAccessError::executor(entity, "select-aggregate-by-id", e))?;
    let extractor = AggregateExtractor::new(plan.reader_spec.clone(), plan.root_id_alias.clone());
    extractor
        .extract_single(rows)
        .map_err(|e| DataAccessError::extract(entity, e))
}

pub(crate) fn find_all(
    generator: &SqlGenerator,
    executor: &mut dyn QueryExecutor,
) -> Result<Vec<RowDocument>, DataAccessError> {
    let entity = &generator.schema().name;
    let plan = generator
        .aggregate_plan()
        .map_err(|e| DataAccessError::sql(entity, e))?;
    let statement = generator
        .select_aggregate()
        .map_err(|e| DataAccessError::sql(entity, e))?;
    let rows = executor
        .query(&statement.sql, &[])
        .map_err(|e| DataAccessError::executor(entity, "select-aggregate", e))?;
    let extractor = AggregateExtractor::new(plan.reader_spec.clone(), plan.root_id_alias.clone());
    extractor
        .extract(rows)
        .map_err(|e| DataAccessError::extract(entity, e))
}

pub(crate) fn find_all_by_id(
    generator: &SqlGenerator,
    executor: &mut dyn QueryExecutor,
    ids: &[Value],
) -> Result<Vec<RowDocument>, DataAccessError> {
    let entity = &generator.schema().name;
    let plan = generator
        .aggregate_plan()
        .map_err(|e| DataAccessError::sql(entity, e))?;
    let statement = generator
        .select_aggregate_by_id_in()
        .map_err(|e| DataAccessError::sql(entity, e))?;
    let params = vec![SqlParam::new(
        format!("{}s", plan.root_id_bind),
        Value::Array(ids.to_vec()),
    )];
    let rows = executor
        .query(&statement.sql, &params)
        .map_err(|e| DataAccessError::executor(entity, "select-aggregate-by-id-in", e))?;
    let extractor = AggregateExtractor::new(plan.reader_spec.clone(), plan.root_id_alias.clone());
    extractor
        .extract(rows)
        .map_err(|e| DataAccessError::extract(entity, e))
}
