//! In-process doubles and a seeded fixture shared by the unit tests.

use crate::audit::{AuditSink, NotificationLogEntry};
use crate::config::{PolicyConfig, Tables};
use crate::context::{JobContext, Pacing};
use crate::error::{CoffeeError, Result};
use crate::gateway::{Button, MessageSink};
use crate::pairing::{self, Pairing};
use crate::participant::{field, Participant};
use crate::pool::{self, Pool};
use crate::store::{fields, MemoryStore, RecordStore};
use crate::types::{Language, RunMode, WeekStatus};
use chrono::NaiveDate;
use serde_json::{json, Value};
use std::sync::Mutex;

pub const ADMIN_CHAT: &str = "admin-chat";

// ---------------------------------------------------------------------------
// RecordingSink
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub recipient: String,
    pub text: String,
    pub buttons: Vec<Vec<Button>>,
}

/// Captures every delivered message. Recipients in `failing` are rejected.
#[derive(Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<SentMessage>>,
    failing: Vec<String>,
}

impl RecordingSink {
    pub fn failing_for(recipients: &[&str]) -> Self {
        Self {
            sent: Mutex::default(),
            failing: recipients.iter().map(|r| r.to_string()).collect(),
        }
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    /// Messages delivered to anyone but the admin.
    pub fn sent_to_participants(&self) -> Vec<SentMessage> {
        self.sent()
            .into_iter()
            .filter(|m| m.recipient != ADMIN_CHAT)
            .collect()
    }
}

impl MessageSink for RecordingSink {
    fn send(&self, recipient: &str, text: &str, buttons: &[Vec<Button>]) -> Result<()> {
        if self.failing.iter().any(|r| r == recipient) {
            return Err(CoffeeError::Gateway {
                recipient: recipient.to_string(),
                reason: "Forbidden: bot was blocked by the user".to_string(),
            });
        }
        self.sent.lock().unwrap().push(SentMessage {
            recipient: recipient.to_string(),
            text: text.to_string(),
            buttons: buttons.to_vec(),
        });
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryAudit
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryAudit {
    entries: Mutex<Vec<NotificationLogEntry>>,
    fail: bool,
}

impl MemoryAudit {
    pub fn failing() -> Self {
        Self {
            entries: Mutex::default(),
            fail: true,
        }
    }

    pub fn entries(&self) -> Vec<NotificationLogEntry> {
        self.entries.lock().unwrap().clone()
    }
}

impl AuditSink for MemoryAudit {
    fn record(&self, entry: &NotificationLogEntry) -> Result<()> {
        if self.fail {
            return Err(CoffeeError::StoreStatus {
                table: "Notification_Logs".to_string(),
                status: 500,
                body: "injected failure".to_string(),
            });
        }
        self.entries.lock().unwrap().push(entry.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fixture
// ---------------------------------------------------------------------------

pub struct Fixture {
    pub store: MemoryStore,
    pub sink: RecordingSink,
    pub audit: MemoryAudit,
    pub tables: Tables,
    /// Monday 2024-03-04.
    pub week: NaiveDate,
    pub policy: PolicyConfig,
    pub limit: Option<usize>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_sink(RecordingSink::default())
    }

    pub fn with_sink(sink: RecordingSink) -> Self {
        Self {
            store: MemoryStore::new(),
            sink,
            audit: MemoryAudit::default(),
            tables: Tables::default(),
            week: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            policy: PolicyConfig::default(),
            limit: None,
        }
    }

    /// Seed a consenting, reachable participant. Chat id is `tg-<name>`
    /// lowercased.
    pub fn participant(&self, name: &str, status: WeekStatus, context: &str) -> String {
        self.store.seed(
            &self.tables.participants,
            fields([
                (field::NAME, json!(name)),
                (field::TELEGRAM_ID, json!(chat_id(name))),
                (field::CONSENT, json!(true)),
                (field::LANGUAGE, json!(Language::En.as_str())),
                (field::MATCHING_CONTEXT, json!(context)),
                (field::NEXT_WEEK_STATUS, json!(status.as_str())),
            ]),
        )
    }

    /// Overwrite one field on a participant.
    pub fn set(&self, id: &str, name: &str, value: Value) {
        let mut patch = serde_json::Map::new();
        patch.insert(name.to_string(), value);
        self.store
            .update(&self.tables.participants, &[(id.to_string(), patch)])
            .unwrap();
    }

    /// Seed a pairing for the fixture week.
    pub fn pairing(&self, pool: &Pool, a: &str, b: &str) -> String {
        self.pairing_in(self.week, pool, a, b)
    }

    pub fn pairing_in(&self, week: NaiveDate, pool: &Pool, a: &str, b: &str) -> String {
        self.store.seed(
            &self.tables.pairings,
            Pairing::new_fields(week, pool, a, b),
        )
    }

    /// Overwrite one field on a pairing.
    pub fn set_pairing(&self, id: &str, name: &str, value: Value) {
        let mut patch = serde_json::Map::new();
        patch.insert(name.to_string(), value);
        self.store
            .update(&self.tables.pairings, &[(id.to_string(), patch)])
            .unwrap();
    }

    pub fn community(&self, slug: &str, min_active: u32) -> String {
        self.store.seed(
            &self.tables.communities,
            fields([
                (pool::field::SLUG, json!(slug)),
                (pool::field::STATUS, json!("Active")),
                (pool::field::MIN_ACTIVE, json!(min_active)),
            ]),
        )
    }

    pub fn ctx(&self, mode: RunMode) -> JobContext<'_> {
        JobContext {
            store: &self.store,
            sink: &self.sink,
            audit: &self.audit,
            tables: self.tables.clone(),
            policy: self.policy.clone(),
            pacing: Pacing::default(),
            mode,
            week_start: self.week,
            limit: self.limit,
            admin_chat_id: Some(ADMIN_CHAT.to_string()),
        }
    }

    pub fn participant_record(&self, id: &str) -> Participant {
        let record = self.store.find(&self.tables.participants, id).unwrap();
        Participant::from_record(&record, &self.tables.participants).unwrap()
    }

    /// Every stored pairing, all weeks.
    pub fn pairings(&self) -> Vec<Pairing> {
        self.store
            .records(&self.tables.pairings)
            .iter()
            .map(|r| Pairing::from_record(r, &self.tables.pairings).unwrap())
            .collect()
    }

    pub fn pairing_record(&self, id: &str) -> Pairing {
        let record = self.store.find(&self.tables.pairings, id).unwrap();
        Pairing::from_record(&record, &self.tables.pairings).unwrap()
    }

    pub fn pairings_for_week(&self, week: NaiveDate) -> Vec<Pairing> {
        pairing::for_week(&self.store, &self.tables.pairings, week, None, None).unwrap()
    }
}

pub fn chat_id(name: &str) -> String {
    format!("tg-{}", name.to_lowercase())
}
