//! Forward-only row cursor over driver results.
//!
//! [`RowSource`] is the sole contract with the driver layer: column alias
//! metadata plus one row at a time. [`CachingRowSet`] adds the single-row
//! lookahead the extraction loop needs to inspect the next row's root id
//! before committing to consume it. Only forward movement; peeking never
//! advances.

use std::collections::HashMap;

use serde_json::Value;

use super::errors::ExtractError;

/// One flat result row. A column can be *absent* (not projected in this
/// query shape) or present with a null value; readers treat the two very
/// differently, so `get` distinguishes them.
#[derive(Debug, Clone, Default)]
pub struct Row {
    values: HashMap<String, Value>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v))
                .collect(),
        }
    }

    pub fn set(&mut self, alias: impl Into<String>, value: Value) {
        self.values.insert(alias.into(), value);
    }

    /// `None` means the column is absent from this row's column set;
    /// `Some(Value::Null)` means it is present and null.
    pub fn get(&self, alias: &str) -> Option<&Value> {
        self.values.get(alias)
    }
}

/// Driver seam: forward-only stream of rows plus the projected alias
/// metadata, available before the first row is consumed.
pub trait RowSource {
    fn columns(&self) -> &[String];
    fn next_row(&mut self) -> Result<Option<Row>, ExtractError>;
}

/// In-memory row source backing tests and fixtures.
#[derive(Debug, Clone, Default)]
pub struct VecRowSource {
    columns: Vec<String>,
    rows: std::collections::VecDeque<Row>,
}

impl VecRowSource {
    pub fn new<I: IntoIterator<Item = Row>>(columns: Vec<String>, rows: I) -> Self {
        Self {
            columns,
            rows: rows.into_iter().collect(),
        }
    }
}

impl RowSource for VecRowSource {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn next_row(&mut self) -> Result<Option<Row>, ExtractError> {
        Ok(self.rows.pop_front())
    }
}

impl RowSource for Box<dyn RowSource> {
    fn columns(&self) -> &[String] {
        (**self).columns()
    }

    fn next_row(&mut self) -> Result<Option<Row>, ExtractError> {
        (**self).next_row()
    }
}

/// Thin cursor over a [`RowSource`] with one-row lookahead. Exactly one
/// row is current at a time; `peek` inspects the next row without
/// consuming it.
pub struct CachingRowSet<S: RowSource> {
    source: S,
    current: Option<Row>,
    lookahead: Option<Option<Row>>,
}

impl<S: RowSource> CachingRowSet<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            current: None,
            lookahead: None,
        }
    }

    pub fn columns(&self) -> &[String] {
        self.source.columns()
    }

    /// Move to the next row. Returns false at end of data.
    pub fn advance(&mut self) -> Result<bool, ExtractError> {
        self.current = match self.lookahead.take() {
            Some(buffered) => buffered,
            None => self.source.next_row()?,
        };
        Ok(self.current.is_some())
    }

    pub fn current(&self) -> Option<&Row> {
        self.current.as_ref()
    }

    /// Next row without consuming it.
    pub fn peek_row(&mut self) -> Result<Option<&Row>, ExtractError> {
        if self.lookahead.is_none() {
            self.lookahead = Some(self.source.next_row()?);
        }
        match &self.lookahead {
            Some(row) => Ok(row.as_ref()),
            None => Ok(None),
        }
    }

    /// A named column of the next row, without consuming it. `None` when
    /// the stream is exhausted or the column is absent.
    pub fn peek(&mut self, alias: &str) -> Result<Option<Value>, ExtractError> {
        Ok(self.peek_row()?.and_then(|row| row.get(alias).cloned()))
    }
}
