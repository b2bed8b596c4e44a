//! Per-path reader state machines.
//!
//! A reader tree mirrors the aggregate's structure: one node per
//! projected path, built from the [`ReaderSpec`] the select builder
//! produces, so the readers decode exactly the aliases the statement
//! projects. Every reader accumulates state across `read` calls and obeys
//! the same contract: `has_result` answers "do you currently hold a
//! complete result", `take_result` hands the result over and resets the
//! node for the next group.
//!
//! The tree is owned exclusively by one extraction call and is never
//! shared across threads or overlapping extractions.

use serde::Serialize;
use serde_json::Value;

use super::document::{RowDocument, RowValue};
use super::errors::ExtractError;
use super::row_set::Row;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ContainerKind {
    List,
    Map,
}

/// Construction plan for one reader node. Specs are produced by the SQL
/// generator alongside the statement text; the two share one aliasing
/// source of truth.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ReaderSpec {
    Column { alias: String },
    Entity(EntityReaderSpec),
    Container(ContainerReaderSpec),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityReaderSpec {
    /// Column whose non-null value proves a joined row exists: the id
    /// column alias when the entity declares one, otherwise the sentinel
    /// reverse-column alias. `None` for embedded objects, whose presence
    /// is decided by their member values alone.
    pub indicator_alias: Option<String>,
    /// Materialize an empty document even when nothing was read.
    pub always_create: bool,
    /// `(document field, column alias)` pairs in declaration order.
    pub scalar_fields: Vec<(String, String)>,
    /// Nested readers keyed by property name: embedded and to-one
    /// entities, and to-many containers.
    pub children: Vec<(String, ReaderSpec)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContainerReaderSpec {
    pub kind: ContainerKind,
    /// Qualifier column alias: list index or map key.
    pub key_alias: String,
    pub element: Box<ReaderSpec>,
}

/// Uniform dispatch over the three reader shapes.
#[derive(Debug)]
pub enum Reader {
    Column(SingleColumnReader),
    Entity(EntityReader),
    Container(ContainerReader),
}

impl Reader {
    pub fn from_spec(spec: &ReaderSpec) -> Self {
        match spec {
            ReaderSpec::Column { alias } => Reader::Column(SingleColumnReader::new(alias.clone())),
            ReaderSpec::Entity(spec) => Reader::Entity(EntityReader::from_spec(spec)),
            ReaderSpec::Container(spec) => Reader::Container(ContainerReader::from_spec(spec)),
        }
    }

    pub fn read(&mut self, row: &Row) -> Result<(), ExtractError> {
        match self {
            Reader::Column(r) => {
                r.read(row);
                Ok(())
            }
            Reader::Entity(r) => r.read(row),
            Reader::Container(r) => r.read(row),
        }
    }

    pub fn has_result(&self) -> bool {
        match self {
            Reader::Column(r) => r.has_result(),
            Reader::Entity(r) => r.has_result(),
            Reader::Container(r) => r.has_result(),
        }
    }

    pub fn take_result(&mut self) -> Result<Option<RowValue>, ExtractError> {
        match self {
            Reader::Column(r) => Ok(r.take_result()),
            Reader::Entity(r) => r.take_result(),
            Reader::Container(r) => r.take_result(),
        }
    }

    pub fn reset(&mut self) {
        match self {
            Reader::Column(r) => r.reset(),
            Reader::Entity(r) => r.reset(),
            Reader::Container(r) => r.reset(),
        }
    }
}

/// Accumulates one scalar. A present column overwrites the held value on
/// every row; an absent column leaves it unchanged.
#[derive(Debug)]
pub struct SingleColumnReader {
    alias: String,
    value: Option<Value>,
}

impl SingleColumnReader {
    pub fn new(alias: String) -> Self {
        Self { alias, value: None }
    }

    pub fn read(&mut self, row: &Row) {
        if let Some(value) = row.get(&self.alias) {
            self.value = if value.is_null() {
                None
            } else {
                Some(value.clone())
            };
        }
    }

    pub fn has_result(&self) -> bool {
        self.value.is_some()
    }

    pub fn take_result(&mut self) -> Option<RowValue> {
        self.value.take().map(RowValue::Scalar)
    }

    pub fn reset(&mut self) {
        self.value = None;
    }
}

/// Accumulates one (possibly nested) entity document.
///
/// Scalar and embedded-member columns are captured only from the first
/// row of the current unit: fanned-out join rows repeat ancestor columns,
/// so re-reading them would be wasted work. This relies on the generated
/// join shape keeping those columns functionally dependent on the unit's
/// id; it is an assumption about the statement, not a property of the row
/// stream itself.
#[derive(Debug)]
pub struct EntityReader {
    indicator_alias: Option<String>,
    always_create: bool,
    scalar_fields: Vec<(String, String)>,
    children: Vec<(String, Reader)>,
    captured: bool,
    present: bool,
    doc: RowDocument,
}

impl EntityReader {
    pub fn from_spec(spec: &EntityReaderSpec) -> Self {
        Self {
            indicator_alias: spec.indicator_alias.clone(),
            always_create: spec.always_create,
            scalar_fields: spec.scalar_fields.clone(),
            children: spec
                .children
                .iter()
                .map(|(name, child)| (name.clone(), Reader::from_spec(child)))
                .collect(),
            captured: false,
            present: false,
            doc: RowDocument::new(),
        }
    }

    pub fn read(&mut self, row: &Row) -> Result<(), ExtractError> {
        if !self.captured {
            for (field, alias) in &self.scalar_fields {
                if let Some(value) = row.get(alias) {
                    if !value.is_null() {
                        self.doc.insert(field.clone(), RowValue::Scalar(value.clone()));
                    }
                }
            }
            self.captured = true;
        }
        if let Some(indicator) = &self.indicator_alias {
            if let Some(value) = row.get(indicator) {
                if !value.is_null() {
                    self.present = true;
                }
            }
        }
        // Children decide internally whether the row is relevant to them.
        for (_, child) in &mut self.children {
            child.read(row)?;
        }
        Ok(())
    }

    pub fn has_result(&self) -> bool {
        self.present
            || !self.doc.is_empty()
            || self.children.iter().any(|(_, child)| child.has_result())
            || (self.always_create && self.captured)
    }

    pub fn take_result(&mut self) -> Result<Option<RowValue>, ExtractError> {
        let has = self.has_result();
        let mut doc = std::mem::take(&mut self.doc);
        for (field, child) in &mut self.children {
            if child.has_result() {
                if let Some(value) = child.take_result()? {
                    doc.insert(field.clone(), value);
                }
            } else {
                child.reset();
            }
        }
        self.captured = false;
        self.present = false;
        Ok(has.then_some(RowValue::Document(doc)))
    }

    pub fn reset(&mut self) {
        self.doc = RowDocument::new();
        self.captured = false;
        self.present = false;
        for (_, child) in &mut self.children {
            child.reset();
        }
    }
}

/// Accumulates a list or map by watching the qualifier column for key
/// changes. Repeated keys caused by join fan-out from sibling collections
/// collapse naturally: a later element with the same key overwrites the
/// earlier one when the container is built.
#[derive(Debug)]
pub struct ContainerReader {
    kind: ContainerKind,
    key_alias: String,
    element: Box<Reader>,
    started: bool,
    tracked_key: Option<Value>,
    entries: Vec<(Value, RowValue)>,
}

impl ContainerReader {
    pub fn from_spec(spec: &ContainerReaderSpec) -> Self {
        Self {
            kind: spec.kind,
            key_alias: spec.key_alias.clone(),
            element: Box::new(Reader::from_spec(&spec.element)),
            started: false,
            tracked_key: None,
            entries: Vec::new(),
        }
    }

    pub fn read(&mut self, row: &Row) -> Result<(), ExtractError> {
        // Key column absent: the property is not projected in this query
        // shape at all.
        let Some(key) = row.get(&self.key_alias) else {
            return Ok(());
        };
        if key.is_null() {
            // Left-outer-join sentinel row: no child matched. If an
            // element was accumulating it is complete now; the sentinel
            // row itself must not reach the element reader, or it would
            // consume the next element's first-row capture.
            if self.started {
                self.flush_pending()?;
            }
            return Ok(());
        }
        let key = key.clone();
        self.started = true;
        if let Some(tracked) = &self.tracked_key {
            if *tracked != key {
                self.flush_pending()?;
            }
        }
        self.element.read(row)?;
        self.tracked_key = Some(key);
        Ok(())
    }

    pub fn has_result(&self) -> bool {
        self.started
    }

    pub fn take_result(&mut self) -> Result<Option<RowValue>, ExtractError> {
        let has = self.started;
        self.flush_pending()?;
        let entries = std::mem::take(&mut self.entries);
        self.started = false;
        self.tracked_key = None;
        self.element.reset();
        if !has {
            return Ok(None);
        }
        let value = match self.kind {
            ContainerKind::List => build_list(entries)?,
            ContainerKind::Map => build_map(entries),
        };
        Ok(Some(value))
    }

    pub fn reset(&mut self) {
        self.started = false;
        self.tracked_key = None;
        self.entries.clear();
        self.element.reset();
    }

    fn flush_pending(&mut self) -> Result<(), ExtractError> {
        if let Some(key) = self.tracked_key.take() {
            let value = self.element.take_result()?.unwrap_or_else(RowValue::null);
            self.entries.push((key, value));
        }
        Ok(())
    }
}

/// Indices are 1-based at the source; gaps up to the maximum observed
/// index are padded with explicit nulls to preserve positional semantics.
fn build_list(entries: Vec<(Value, RowValue)>) -> Result<RowValue, ExtractError> {
    let mut keyed = Vec::with_capacity(entries.len());
    let mut max = 0usize;
    for (key, value) in entries {
        let index = key
            .as_u64()
            .filter(|n| *n >= 1)
            .ok_or_else(|| ExtractError::InvalidListIndex(key.to_string()))?
            as usize;
        max = max.max(index);
        keyed.push((index, value));
    }
    let mut list = vec![RowValue::null(); max];
    for (index, value) in keyed {
        list[index - 1] = value;
    }
    Ok(RowValue::List(list))
}

/// Maps rebuild in insertion order; duplicate keys from join fan-out
/// replace in place.
fn build_map(entries: Vec<(Value, RowValue)>) -> RowValue {
    let mut doc = RowDocument::new();
    for (key, value) in entries {
        let field = match key.as_str() {
            Some(s) => s.to_string(),
            None => key.to_string(),
        };
        doc.insert(field, value);
    }
    RowValue::Document(doc)
}
