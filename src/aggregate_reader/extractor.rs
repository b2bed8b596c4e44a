//! Root-level extraction loop.
//!
//! Drives a reader tree over a row stream and splits the stream into
//! aggregate-root units by watching the root id column. The id of the
//! *next* row is inspected through the cursor's lookahead before the row
//! is consumed, so rows belonging to the following root (or trailing
//! null-id rows) never leak into the current unit's containers.

use serde_json::Value;

use super::document::{RowDocument, RowValue};
use super::errors::ExtractError;
use super::readers::{EntityReaderSpec, Reader};
use super::row_set::{CachingRowSet, RowSource};

/// Reconstructs aggregates from a flat result stream. One extractor is
/// cheap and reusable; each `extract` call builds its own reader tree and
/// cursor, so independent invocations never share mutable state.
#[derive(Debug, Clone)]
pub struct AggregateExtractor {
    spec: EntityReaderSpec,
    root_id_alias: String,
}

impl AggregateExtractor {
    pub fn new(spec: EntityReaderSpec, root_id_alias: impl Into<String>) -> Self {
        Self {
            spec,
            root_id_alias: root_id_alias.into(),
        }
    }

    /// Consume the stream to completion and emit one document per
    /// aggregate root. A null root id means end of data; a failure while
    /// reading aborts the whole extraction with no partial documents.
    pub fn extract<S: RowSource>(&self, source: S) -> Result<Vec<RowDocument>, ExtractError> {
        // The root id column must be locatable before any row is
        // consumed; its absence is a configuration error, not a data
        // condition.
        if !source
            .columns()
            .iter()
            .any(|c| c == &self.root_id_alias)
        {
            return Err(ExtractError::RootIdColumnMissing(
                self.root_id_alias.clone(),
            ));
        }

        let mut rows = CachingRowSet::new(source);
        let mut reader = Reader::Entity(super::readers::EntityReader::from_spec(&self.spec));
        let mut documents = Vec::new();
        let mut current_id: Option<Value> = None;

        loop {
            let next_id = match rows.peek(&self.root_id_alias)? {
                Some(value) if !value.is_null() => Some(value),
                _ => None,
            };
            let Some(next_id) = next_id else {
                // End of data (or a trailing null-id row): finalize
                // without consuming anything further.
                break;
            };
            let boundary = current_id.as_ref().is_some_and(|id| *id != next_id);
            if boundary {
                // Root boundary: the unit is complete before the
                // lookahead row is consumed into any container.
                if let Some(document) = Self::finish_unit(&mut reader)? {
                    documents.push(document);
                }
            }
            if boundary || current_id.is_none() {
                current_id = Some(next_id);
            }
            if !rows.advance()? {
                break;
            }
            let Some(row) = rows.current() else { break };
            reader.read(row)?;
        }

        if current_id.is_some() || reader.has_result() {
            if let Some(document) = Self::finish_unit(&mut reader)? {
                documents.push(document);
            }
        }
        log::debug!(
            "Extracted {} aggregate document(s) keyed by `{}`",
            documents.len(),
            self.root_id_alias
        );
        Ok(documents)
    }

    /// Convenience for by-id loads expecting at most one unit.
    pub fn extract_single<S: RowSource>(
        &self,
        source: S,
    ) -> Result<Option<RowDocument>, ExtractError> {
        let mut documents = self.extract(source)?;
        if documents.is_empty() {
            Ok(None)
        } else {
            Ok(Some(documents.remove(0)))
        }
    }

    fn finish_unit(reader: &mut Reader) -> Result<Option<RowDocument>, ExtractError> {
        match reader.take_result()? {
            Some(RowValue::Document(document)) => Ok(Some(document)),
            Some(_) | None => Ok(None),
        }
    }
}
