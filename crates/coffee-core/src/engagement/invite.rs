//! Weekly invitation.
//!
//! A fresh run clears every `Weekend_Notification_Sent` flag in scope, then
//! invites each consenting participant who has not been invited yet. The flag
//! is set after every attempt, delivered or not, so a retried run (`resume`)
//! never sends a participant a second invitation.

use crate::context::JobContext;
use crate::dispatch::{DispatchTally, Outgoing};
use crate::error::Result;
use crate::messages;
use crate::participant::{field, weekend_notification_patch, Participant};
use crate::pool::Pool;
use crate::store::{update_all, Fields, Filter, Query};
use crate::types::JobKind;
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InviteReport {
    pub week_start: NaiveDate,
    pub resumed: bool,
    /// Flags cleared before sending.
    pub reset: usize,
    pub reset_failures: usize,
    pub eligible: usize,
    pub deferred: usize,
    pub latch_failures: usize,
    pub notifications: DispatchTally,
}

fn scoped(mut parts: Vec<Filter>, scope: Option<&Pool>) -> Filter {
    if let Some(pool) = scope {
        parts.push(pool.filter(field::MATCHING_CONTEXT));
    }
    Filter::And(parts)
}

/// Clear the invitation flag for everyone in scope who has it set.
fn reset_flags(ctx: &JobContext<'_>, scope: Option<&Pool>) -> Result<(usize, usize)> {
    let query = Query::filter(scoped(
        vec![Filter::is_true(field::WEEKEND_NOTIFICATION_SENT)],
        scope,
    ))
    .with_fields(&[field::WEEKEND_NOTIFICATION_SENT]);
    let flagged = ctx.store.select(&ctx.tables.participants, &query)?;
    if !ctx.writes_enabled() {
        return Ok((flagged.len(), 0));
    }
    let rows: Vec<(String, Fields)> = flagged
        .into_iter()
        .map(|r| (r.id, weekend_notification_patch(false)))
        .collect();
    let outcome = update_all(
        ctx.store,
        &ctx.tables.participants,
        &rows,
        ctx.pacing.write_pause,
    );
    Ok((outcome.written.len(), outcome.failed_count()))
}

pub fn run(ctx: &JobContext<'_>, scope: Option<&Pool>, resume: bool) -> Result<InviteReport> {
    let (reset, reset_failures) = if resume {
        (0, 0)
    } else {
        reset_flags(ctx, scope)?
    };
    if reset_failures > 0 {
        warn!(failed = reset_failures, "some invitation flags could not be cleared");
    }

    let mut parts = vec![
        Filter::is_true(field::CONSENT),
        Filter::is_false(field::SPAM_OPT_OUT),
    ];
    // Without live writes the reset above is only simulated, so the stored
    // flags are stale unless this is a resumed run.
    if resume || ctx.writes_enabled() {
        parts.push(Filter::is_false(field::WEEKEND_NOTIFICATION_SENT));
    }
    let records = ctx
        .store
        .select(&ctx.tables.participants, &Query::filter(scoped(parts, scope)))?;
    let mut eligible: Vec<Participant> = Vec::with_capacity(records.len());
    for record in &records {
        match Participant::from_record(record, &ctx.tables.participants) {
            Ok(p) => eligible.push(p),
            Err(e) => warn!(error = %e, "skipping malformed participant"),
        }
    }
    let total = eligible.len();
    let batch = ctx.take_limited(eligible, "participants");

    let mut report = InviteReport {
        week_start: ctx.week_start,
        resumed: resume,
        reset,
        reset_failures,
        eligible: total,
        deferred: total - batch.len(),
        latch_failures: 0,
        notifications: DispatchTally::default(),
    };

    let mut dispatcher = ctx.dispatcher(JobKind::Invite);
    for p in &batch {
        dispatcher.send(&Outgoing {
            participant_id: p.id.clone(),
            pairing_id: None,
            recipient: p.chat_id.clone(),
            body: messages::invitation(p.language, p.next_week_status),
            buttons: messages::invitation_keyboard(p.language),
        });
        // Latched per participant so an interrupted run can resume.
        if ctx.writes_enabled() {
            let row = [(p.id.clone(), weekend_notification_patch(true))];
            if let Err(e) = ctx.store.update(&ctx.tables.participants, &row) {
                report.latch_failures += 1;
                warn!(participant = %p.id, error = %e, "could not mark invitation as sent");
            }
        }
    }
    report.notifications = dispatcher.tally();

    info!(
        week = %ctx.week_start,
        resumed = resume,
        reset = report.reset,
        eligible = report.eligible,
        sent = report.notifications.sent,
        failed = report.notifications.failed,
        "weekly invitation finished"
    );
    Ok(report)
}
