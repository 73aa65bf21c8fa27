//! Record store contract and batch helpers.
//!
//! The engine never talks HTTP directly. Every job goes through
//! [`RecordStore`], which has two implementations:
//!
//! - [`AirtableStore`]: hosted spreadsheet store over blocking HTTP
//! - [`MemoryStore`]: in-process store with the same batch limit, for tests
//!
//! Writes are limited to [`BATCH_LIMIT`] records per request. Use
//! [`create_all`] / [`update_all`] to chunk larger writes.

pub mod airtable;
pub mod filter;
pub mod memory;

pub use airtable::AirtableStore;
pub use filter::Filter;
pub use memory::MemoryStore;

use crate::error::{CoffeeError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::warn;

/// Maximum records per create/update/destroy request.
pub const BATCH_LIMIT: usize = 10;

pub type Fields = serde_json::Map<String, Value>;

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    #[serde(default)]
    pub fields: Fields,
}

impl Record {
    pub fn text(&self, field: &str) -> Option<&str> {
        match self.fields.get(field) {
            Some(Value::String(s)) if !s.is_empty() => Some(s.as_str()),
            _ => None,
        }
    }

    /// Text or numeric field rendered as a string. Chat ids arrive as either.
    pub fn text_or_number(&self, field: &str) -> Option<String> {
        match self.fields.get(field) {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn flag(&self, field: &str) -> bool {
        matches!(self.fields.get(field), Some(Value::Bool(true)))
    }

    pub fn number(&self, field: &str) -> Option<f64> {
        match self.fields.get(field) {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Linked-record field: an array of record ids. Takes the first element
    /// when only one link is expected.
    pub fn first_link(&self, field: &str) -> Option<String> {
        match self.fields.get(field) {
            Some(Value::Array(items)) => items.first().and_then(Value::as_str).map(String::from),
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            _ => None,
        }
    }

    pub fn date(&self, field: &str) -> Option<NaiveDate> {
        let raw = self.text(field)?;
        let day = raw.get(..10).unwrap_or(raw);
        NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
    }

    pub fn invalid(&self, table: &str, reason: impl Into<String>) -> CoffeeError {
        CoffeeError::InvalidRecord {
            table: table.to_string(),
            id: self.id.clone(),
            reason: reason.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Query
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filter: Option<Filter>,
    /// Restrict returned fields. Empty means all.
    pub fields: Vec<String>,
}

impl Query {
    pub fn filter(filter: Filter) -> Self {
        Self {
            filter: Some(filter),
            fields: Vec::new(),
        }
    }

    pub fn with_fields(mut self, fields: &[&str]) -> Self {
        self.fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }
}

// ---------------------------------------------------------------------------
// RecordStore
// ---------------------------------------------------------------------------

pub trait RecordStore {
    /// All records matching `query`, following pagination to the end.
    fn select(&self, table: &str, query: &Query) -> Result<Vec<Record>>;

    /// Create up to [`BATCH_LIMIT`] records. Returned records are in input order.
    fn create(&self, table: &str, rows: &[Fields]) -> Result<Vec<Record>>;

    /// Patch up to [`BATCH_LIMIT`] records. Only the given fields change.
    fn update(&self, table: &str, rows: &[(String, Fields)]) -> Result<()>;

    fn find(&self, table: &str, id: &str) -> Result<Record>;

    fn destroy(&self, table: &str, ids: &[String]) -> Result<()>;
}

pub(crate) fn check_batch(len: usize) -> Result<()> {
    if len > BATCH_LIMIT {
        return Err(CoffeeError::BatchTooLarge(len));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Batch helpers
// ---------------------------------------------------------------------------

/// A chunk that the store rejected. `offset` indexes into the input slice.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkFailure {
    pub offset: usize,
    pub len: usize,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchOutcome<T> {
    pub written: Vec<T>,
    pub failures: Vec<ChunkFailure>,
}

impl<T> BatchOutcome<T> {
    pub fn failed_count(&self) -> usize {
        self.failures.iter().map(|f| f.len).sum()
    }

    /// Whether the input at `index` fell inside a failed chunk.
    pub fn is_failed(&self, index: usize) -> bool {
        self.failures
            .iter()
            .any(|f| index >= f.offset && index < f.offset + f.len)
    }
}

/// Create `rows` in chunks of [`BATCH_LIMIT`], pausing between chunks.
/// A failed chunk is logged and recorded; later chunks still run.
/// `written` pairs each created record with its input index.
pub fn create_all(
    store: &dyn RecordStore,
    table: &str,
    rows: &[Fields],
    pause: Duration,
) -> BatchOutcome<(usize, Record)> {
    let mut outcome = BatchOutcome {
        written: Vec::new(),
        failures: Vec::new(),
    };
    for (n, chunk) in rows.chunks(BATCH_LIMIT).enumerate() {
        if n > 0 && !pause.is_zero() {
            std::thread::sleep(pause);
        }
        let offset = n * BATCH_LIMIT;
        match store.create(table, chunk) {
            Ok(records) => outcome
                .written
                .extend(records.into_iter().enumerate().map(|(i, r)| (offset + i, r))),
            Err(e) => {
                warn!(table, offset, len = chunk.len(), error = %e, "create chunk failed");
                outcome.failures.push(ChunkFailure {
                    offset,
                    len: chunk.len(),
                    error: e.to_string(),
                });
            }
        }
    }
    outcome
}

/// Patch `rows` in chunks of [`BATCH_LIMIT`]. `written` holds updated ids.
pub fn update_all(
    store: &dyn RecordStore,
    table: &str,
    rows: &[(String, Fields)],
    pause: Duration,
) -> BatchOutcome<String> {
    let mut outcome = BatchOutcome {
        written: Vec::new(),
        failures: Vec::new(),
    };
    for (n, chunk) in rows.chunks(BATCH_LIMIT).enumerate() {
        if n > 0 && !pause.is_zero() {
            std::thread::sleep(pause);
        }
        let offset = n * BATCH_LIMIT;
        match store.update(table, chunk) {
            Ok(()) => outcome
                .written
                .extend(chunk.iter().map(|(id, _)| id.clone())),
            Err(e) => {
                warn!(table, offset, len = chunk.len(), error = %e, "update chunk failed");
                outcome.failures.push(ChunkFailure {
                    offset,
                    len: chunk.len(),
                    error: e.to_string(),
                });
            }
        }
    }
    outcome
}

/// Select records by id, chunking the id list to keep formulas short.
pub fn select_by_ids(store: &dyn RecordStore, table: &str, ids: &[String]) -> Result<Vec<Record>> {
    const IDS_PER_QUERY: usize = 50;
    let mut out = Vec::with_capacity(ids.len());
    for chunk in ids.chunks(IDS_PER_QUERY) {
        let query = Query::filter(Filter::RecordIdIn(chunk.to_vec()));
        out.extend(store.select(table, &query)?);
    }
    Ok(out)
}

/// Build a field map from `(name, value)` pairs.
pub fn fields<I, V>(pairs: I) -> Fields
where
    I: IntoIterator<Item = (&'static str, V)>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.into()))
        .collect()
}
