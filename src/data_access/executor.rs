//! Driver seam.
//!
//! The mapping layer never talks to a database directly: reads go through
//! [`QueryExecutor::query`], which hands back a row source the
//! reconstruction engine consumes, and writes through
//! [`QueryExecutor::execute`]. Parameters are named; marker names in the
//! statement text match [`SqlParam::name`] one to one.

use serde_json::Value;

use crate::aggregate_reader::RowSource;

use super::errors::ExecutorError;

#[derive(Debug, Clone, PartialEq)]
pub struct SqlParam {
    pub name: String,
    pub value: Value,
}

impl SqlParam {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

pub trait QueryExecutor {
    fn query(
        &mut self,
        sql: &str,
        params: &[SqlParam],
    ) -> Result<Box<dyn RowSource>, ExecutorError>;

    fn execute(&mut self, sql: &str, params: &[SqlParam]) -> Result<u64, ExecutorError>;
}
