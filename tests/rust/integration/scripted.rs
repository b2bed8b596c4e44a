//! In-memory executor driving canned result sets through the real
//! mapping stack.

use std::collections::VecDeque;

use rowgraph::aggregate_reader::{Row, RowSource, VecRowSource};
use rowgraph::data_access::{ExecutorError, QueryExecutor, SqlParam};

pub struct ScriptedResponse {
    /// Fragment the issued SQL must contain; a mismatch fails the test.
    pub expect: &'static str,
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

/// Queue-based fake driver: responses are consumed in call order, and
/// every statement issued is recorded for assertions.
#[derive(Default)]
pub struct ScriptedExecutor {
    responses: VecDeque<ScriptedResponse>,
    pub queries: Vec<(String, Vec<SqlParam>)>,
    pub executed: Vec<(String, Vec<SqlParam>)>,
}

impl ScriptedExecutor {
    pub fn new(responses: Vec<ScriptedResponse>) -> Self {
        Self {
            responses: responses.into(),
            queries: Vec::new(),
            executed: Vec::new(),
        }
    }

    pub fn expect_drained(&self) {
        assert!(
            self.responses.is_empty(),
            "unconsumed scripted responses: {}",
            self.responses.len()
        );
    }
}

impl QueryExecutor for ScriptedExecutor {
    fn query(
        &mut self,
        sql: &str,
        params: &[SqlParam],
    ) -> Result<Box<dyn RowSource>, ExecutorError> {
        self.queries.push((sql.to_string(), params.to_vec()));
        let response = self
            .responses
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected query: {sql}"));
        assert!(
            sql.contains(response.expect),
            "query `{sql}` does not contain expected fragment `{}`",
            response.expect
        );
        Ok(Box::new(VecRowSource::new(response.columns, response.rows)))
    }

    fn execute(&mut self, sql: &str, params: &[SqlParam]) -> Result<u64, ExecutorError> {
        self.executed.push((sql.to_string(), params.to_vec()));
        Ok(1)
    }
}
