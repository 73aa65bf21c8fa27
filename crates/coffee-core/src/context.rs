//! Shared wiring for every job run.

use crate::audit::AuditSink;
use crate::config::{Config, PolicyConfig, Tables};
use crate::dispatch::Dispatcher;
use crate::error::Result;
use crate::gateway::MessageSink;
use crate::participant::Participant;
use crate::store::{select_by_ids, RecordStore};
use crate::types::{JobKind, RunMode};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, warn};

/// Delays that keep bulk work under provider rate limits.
#[derive(Debug, Clone, Copy, Default)]
pub struct Pacing {
    pub write_pause: Duration,
    pub send_pause: Duration,
    pub pool_pause: Duration,
}

impl Pacing {
    pub fn from_config(config: &Config) -> Self {
        Self {
            write_pause: Duration::from_millis(config.store.batch_pause_ms),
            send_pause: Duration::from_millis(config.gateway.send_pause_ms),
            pool_pause: Duration::from_millis(config.pools.pause_ms),
        }
    }
}

pub struct JobContext<'a> {
    pub store: &'a dyn RecordStore,
    pub sink: &'a dyn MessageSink,
    pub audit: &'a dyn AuditSink,
    pub tables: Tables,
    pub policy: PolicyConfig,
    pub pacing: Pacing,
    pub mode: RunMode,
    /// Monday of the week being processed.
    pub week_start: NaiveDate,
    /// Cap on items processed by notification jobs.
    pub limit: Option<usize>,
    pub admin_chat_id: Option<String>,
}

impl<'a> JobContext<'a> {
    pub fn dispatcher(&self, job: JobKind) -> Dispatcher<'a> {
        Dispatcher::new(self.sink, self.audit, job, self.mode, self.pacing.send_pause)
    }

    pub fn writes_enabled(&self) -> bool {
        self.mode.writes_enabled()
    }

    /// Best-effort message to the admin. Never fails the caller; dry runs
    /// and unconfigured admins only log.
    pub fn notify_admin(&self, text: &str) {
        let Some(chat_id) = self.admin_chat_id.as_deref() else {
            info!(message = text, "admin notice (no admin configured)");
            return;
        };
        if self.mode == RunMode::DryRun {
            info!(message = text, "admin notice (dry run)");
            return;
        }
        if let Err(e) = self.sink.send(chat_id, text, &[]) {
            warn!(error = %e, "admin notification failed");
        }
    }

    /// Load participants by id. Malformed or missing records are logged and
    /// left out of the map.
    pub fn participants_by_id(&self, ids: &[String]) -> Result<HashMap<String, Participant>> {
        let table = &self.tables.participants;
        let records = select_by_ids(self.store, table, ids)?;
        let mut out = HashMap::with_capacity(records.len());
        for record in &records {
            match Participant::from_record(record, table) {
                Ok(p) => {
                    out.insert(p.id.clone(), p);
                }
                Err(e) => warn!(error = %e, "skipping malformed participant"),
            }
        }
        Ok(out)
    }

    /// Apply `limit` to a work list, logging when items are held back.
    pub fn take_limited<T>(&self, mut items: Vec<T>, what: &str) -> Vec<T> {
        if let Some(limit) = self.limit {
            if items.len() > limit {
                info!(limit, total = items.len(), what, "limit reached; remaining items deferred");
                items.truncate(limit);
            }
        }
        items
    }
}
