use super::{check_batch, Fields, Query, Record, RecordStore};
use crate::error::{CoffeeError, Result};
use std::collections::BTreeMap;
use std::sync::Mutex;

#[derive(Default)]
struct Inner {
    tables: BTreeMap<String, Vec<Record>>,
    next_id: u64,
    write_requests: usize,
    fail_writes: Vec<String>,
    fail_selects: Vec<(String, String)>,
}

/// In-process [`RecordStore`]. Tables keep insertion order, which stands in
/// for the hosted store's stable default ordering.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record directly, bypassing batch limits. Returns its id.
    pub fn seed(&self, table: &str, fields: Fields) -> String {
        let mut inner = self.lock();
        let id = next_id(&mut inner);
        inner
            .tables
            .entry(table.to_string())
            .or_default()
            .push(Record {
                id: id.clone(),
                fields,
            });
        id
    }

    /// Snapshot of a table.
    pub fn records(&self, table: &str) -> Vec<Record> {
        self.lock().tables.get(table).cloned().unwrap_or_default()
    }

    /// Number of create/update/destroy requests served so far.
    pub fn write_requests(&self) -> usize {
        self.lock().write_requests
    }

    /// Make every write to `table` fail.
    pub fn fail_writes_to(&self, table: &str) {
        self.lock().fail_writes.push(table.to_string());
    }

    /// Make selects on `table` fail when the rendered formula contains `needle`.
    pub fn fail_selects_matching(&self, table: &str, needle: &str) {
        self.lock()
            .fail_selects
            .push((table.to_string(), needle.to_string()));
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock only means a test thread panicked mid-write.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn next_id(inner: &mut Inner) -> String {
    inner.next_id += 1;
    format!("rec{:06}", inner.next_id)
}

fn injected(table: &str) -> CoffeeError {
    CoffeeError::StoreStatus {
        table: table.to_string(),
        status: 503,
        body: "injected failure".to_string(),
    }
}

impl RecordStore for MemoryStore {
    fn select(&self, table: &str, query: &Query) -> Result<Vec<Record>> {
        let inner = self.lock();
        if let Some(filter) = &query.filter {
            let formula = filter.to_formula();
            if inner
                .fail_selects
                .iter()
                .any(|(t, needle)| t == table && formula.contains(needle.as_str()))
            {
                return Err(injected(table));
            }
        }
        let rows = inner.tables.get(table).map(Vec::as_slice).unwrap_or(&[]);
        Ok(rows
            .iter()
            .filter(|r| query.filter.as_ref().map(|f| f.matches(r)).unwrap_or(true))
            .map(|r| {
                if query.fields.is_empty() {
                    return r.clone();
                }
                Record {
                    id: r.id.clone(),
                    fields: r
                        .fields
                        .iter()
                        .filter(|(k, _)| query.fields.contains(k))
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect(),
                }
            })
            .collect())
    }

    fn create(&self, table: &str, rows: &[Fields]) -> Result<Vec<Record>> {
        check_batch(rows.len())?;
        let mut inner = self.lock();
        inner.write_requests += 1;
        if inner.fail_writes.iter().any(|t| t == table) {
            return Err(injected(table));
        }
        let mut created = Vec::with_capacity(rows.len());
        for fields in rows {
            let record = Record {
                id: next_id(&mut inner),
                fields: fields.clone(),
            };
            created.push(record);
        }
        inner
            .tables
            .entry(table.to_string())
            .or_default()
            .extend(created.iter().cloned());
        Ok(created)
    }

    fn update(&self, table: &str, rows: &[(String, Fields)]) -> Result<()> {
        check_batch(rows.len())?;
        let mut inner = self.lock();
        inner.write_requests += 1;
        if inner.fail_writes.iter().any(|t| t == table) {
            return Err(injected(table));
        }
        let records = inner.tables.entry(table.to_string()).or_default();
        // Validate the whole chunk first; the hosted store rejects it atomically.
        if let Some((missing, _)) = rows
            .iter()
            .find(|(id, _)| !records.iter().any(|r| &r.id == id))
        {
            return Err(CoffeeError::RecordNotFound {
                table: table.to_string(),
                id: missing.clone(),
            });
        }
        for (id, patch) in rows {
            if let Some(record) = records.iter_mut().find(|r| &r.id == id) {
                for (k, v) in patch {
                    record.fields.insert(k.clone(), v.clone());
                }
            }
        }
        Ok(())
    }

    fn find(&self, table: &str, id: &str) -> Result<Record> {
        self.lock()
            .tables
            .get(table)
            .and_then(|rows| rows.iter().find(|r| r.id == id))
            .cloned()
            .ok_or_else(|| CoffeeError::RecordNotFound {
                table: table.to_string(),
                id: id.to_string(),
            })
    }

    fn destroy(&self, table: &str, ids: &[String]) -> Result<()> {
        check_batch(ids.len())?;
        let mut inner = self.lock();
        inner.write_requests += 1;
        if let Some(rows) = inner.tables.get_mut(table) {
            rows.retain(|r| !ids.contains(&r.id));
        }
        Ok(())
    }
}
