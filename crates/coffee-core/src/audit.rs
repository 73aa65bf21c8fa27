//! Append-only notification log.

use crate::error::Result;
use crate::store::{fields, RecordStore};
use crate::types::{DeliveryStatus, JobKind};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::json;

pub mod field {
    pub const SCRIPT: &str = "Script";
    pub const PARTICIPANT: &str = "Participant";
    pub const PAIRING: &str = "Pairing";
    pub const STATUS: &str = "Status";
    pub const MESSAGE: &str = "Message";
    pub const ERROR: &str = "Error";
    pub const TIMESTAMP: &str = "Timestamp";
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationLogEntry {
    pub job: JobKind,
    pub participant_id: String,
    pub pairing_id: Option<String>,
    pub status: DeliveryStatus,
    pub body: String,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

pub trait AuditSink {
    fn record(&self, entry: &NotificationLogEntry) -> Result<()>;
}

/// Writes each entry as one row in the notification log table.
pub struct StoreAuditSink<'a> {
    store: &'a dyn RecordStore,
    table: String,
}

impl<'a> StoreAuditSink<'a> {
    pub fn new(store: &'a dyn RecordStore, table: impl Into<String>) -> Self {
        Self {
            store,
            table: table.into(),
        }
    }
}

impl AuditSink for StoreAuditSink<'_> {
    fn record(&self, entry: &NotificationLogEntry) -> Result<()> {
        let mut row = fields([
            (field::SCRIPT, json!(entry.job.as_str())),
            (field::PARTICIPANT, json!([entry.participant_id])),
            (field::STATUS, json!(entry.status.as_str())),
            (field::MESSAGE, json!(entry.body)),
            (
                field::TIMESTAMP,
                json!(entry.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)),
            ),
        ]);
        if let Some(pairing) = &entry.pairing_id {
            row.insert(field::PAIRING.to_string(), json!([pairing]));
        }
        if let Some(error) = &entry.error {
            row.insert(field::ERROR.to_string(), json!(error));
        }
        self.store.create(&self.table, &[row])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn writes_one_row_per_entry() {
        let store = MemoryStore::new();
        let sink = StoreAuditSink::new(&store, "Notification_Logs");
        sink.record(&NotificationLogEntry {
            job: JobKind::Weekend,
            participant_id: "recA".into(),
            pairing_id: Some("recP".into()),
            status: DeliveryStatus::Failed,
            body: "How did it go?".into(),
            error: Some("blocked".into()),
            timestamp: Utc::now(),
        })
        .unwrap();

        let rows = store.records("Notification_Logs");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].text(field::SCRIPT), Some("weekend"));
        assert_eq!(rows[0].text(field::STATUS), Some("Failed"));
        assert_eq!(rows[0].first_link(field::PAIRING).as_deref(), Some("recP"));
        assert_eq!(rows[0].text(field::ERROR), Some("blocked"));
    }
}
