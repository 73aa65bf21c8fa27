//! Notification dispatcher.
//!
//! Every send attempt is followed by exactly one audit write carrying the same
//! outcome. A failed recipient never aborts the batch: the failure is logged,
//! tallied, and the caller moves on.

use crate::audit::{AuditSink, NotificationLogEntry};
use crate::gateway::{Keyboard, MessageSink};
use crate::types::{DeliveryStatus, JobKind, RunMode};
use chrono::Utc;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

/// One message bound for one participant.
#[derive(Debug, Clone)]
pub struct Outgoing {
    pub participant_id: String,
    pub pairing_id: Option<String>,
    pub recipient: Option<String>,
    pub body: String,
    pub buttons: Keyboard,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchTally {
    pub sent: usize,
    pub failed: usize,
    pub dry_run: usize,
    pub audit_failures: usize,
}

impl DispatchTally {
    pub fn attempted(&self) -> usize {
        self.sent + self.failed + self.dry_run
    }
}

pub struct Dispatcher<'a> {
    sink: &'a dyn MessageSink,
    audit: &'a dyn AuditSink,
    job: JobKind,
    mode: RunMode,
    pause: Duration,
    tally: DispatchTally,
}

impl<'a> Dispatcher<'a> {
    pub fn new(
        sink: &'a dyn MessageSink,
        audit: &'a dyn AuditSink,
        job: JobKind,
        mode: RunMode,
        pause: Duration,
    ) -> Self {
        Self {
            sink,
            audit,
            job,
            mode,
            pause,
            tally: DispatchTally::default(),
        }
    }

    pub fn tally(&self) -> DispatchTally {
        self.tally
    }

    pub fn send(&mut self, msg: &Outgoing) -> DeliveryStatus {
        let dry_run = self.mode == RunMode::DryRun;
        if !dry_run && self.tally.attempted() > 0 && !self.pause.is_zero() {
            std::thread::sleep(self.pause);
        }

        let (status, error) = match (&msg.recipient, dry_run) {
            (_, true) => (DeliveryStatus::DryRun, None),
            (None, false) => (
                DeliveryStatus::Failed,
                Some("participant has no messaging address".to_string()),
            ),
            (Some(recipient), false) => {
                match self.sink.send(recipient, &msg.body, &msg.buttons) {
                    Ok(()) => (DeliveryStatus::Sent, None),
                    Err(e) => (DeliveryStatus::Failed, Some(e.to_string())),
                }
            }
        };

        match status {
            DeliveryStatus::Sent => self.tally.sent += 1,
            DeliveryStatus::Failed => {
                self.tally.failed += 1;
                warn!(
                    job = %self.job,
                    participant = %msg.participant_id,
                    error = error.as_deref().unwrap_or(""),
                    "delivery failed"
                );
            }
            DeliveryStatus::DryRun => self.tally.dry_run += 1,
        }
        debug!(job = %self.job, participant = %msg.participant_id, %status, "dispatched");

        let entry = NotificationLogEntry {
            job: self.job,
            participant_id: msg.participant_id.clone(),
            pairing_id: msg.pairing_id.clone(),
            status,
            body: msg.body.clone(),
            error,
            timestamp: Utc::now(),
        };
        if let Err(e) = self.audit.record(&entry) {
            self.tally.audit_failures += 1;
            warn!(job = %self.job, participant = %msg.participant_id, error = %e, "audit write failed");
        }
        status
    }
}
