//! Weekly engagement jobs.
//!
//! | Job                     | Reads                                  | Latch                       |
//! |-------------------------|----------------------------------------|-----------------------------|
//! | [`midweek::run`]        | this week's pairings, midweek unset    | `Midweek_Checkin`           |
//! | [`weekend::run`]        | this week's pairings, weekend unset    | `Weekend_Checkin`           |
//! | [`sweep::run`]          | last week's pairings                   | none (status fields)        |
//! | [`invite::run`]         | consenting participants                | `Weekend_Notification_Sent` |
//!
//! Latches are only written in live mode. Dry and test runs report what they
//! would have latched.

pub mod invite;
pub mod midweek;
pub mod sweep;
pub mod weekend;

pub use invite::InviteReport;
pub use sweep::SweepReport;

use crate::context::JobContext;
use crate::dispatch::{DispatchTally, Dispatcher, Outgoing};
use crate::error::Result;
use crate::gateway::Keyboard;
use crate::pairing::Pairing;
use crate::participant::Participant;
use crate::store::{update_all, Fields};
use crate::types::{JobKind, Language, Side};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

/// Result of a check-in job (midweek or weekend).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckinReport {
    pub job: JobKind,
    pub week_start: NaiveDate,
    /// Pairings still waiting for this check-in.
    pub pairings_found: usize,
    pub pairings_prompted: usize,
    /// Both sides had already reported; latched without sending.
    pub already_complete: usize,
    /// Held back by `--limit`; picked up by the next run.
    pub deferred: usize,
    pub latched: usize,
    pub latch_failures: usize,
    pub notifications: DispatchTally,
}

impl CheckinReport {
    pub(crate) fn new(job: JobKind, week_start: NaiveDate, found: usize) -> Self {
        Self {
            job,
            week_start,
            pairings_found: found,
            pairings_prompted: 0,
            already_complete: 0,
            deferred: 0,
            latched: 0,
            latch_failures: 0,
            notifications: DispatchTally::default(),
        }
    }
}

/// Everyone referenced by `pairings`, keyed by id.
pub(crate) fn people_in(
    ctx: &JobContext<'_>,
    pairings: &[Pairing],
) -> Result<HashMap<String, Participant>> {
    let ids: BTreeSet<String> = pairings
        .iter()
        .flat_map(|p| [p.participant_1.clone(), p.participant_2.clone()])
        .collect();
    let ids: Vec<String> = ids.into_iter().collect();
    ctx.participants_by_id(&ids)
}

/// Send one side of a pairing its prompt. A participant missing from the
/// store is still audited, as a failed delivery.
pub(crate) fn prompt_side(
    dispatcher: &mut Dispatcher<'_>,
    people: &HashMap<String, Participant>,
    pairing: &Pairing,
    side: Side,
    body: fn(Language, &str) -> String,
    keyboard: fn(Language, &str, Side) -> Keyboard,
) {
    let me_id = pairing.participant(side);
    let me = people.get(me_id);
    let partner_name = people
        .get(pairing.participant(side.other()))
        .map(Participant::display_name)
        .unwrap_or_else(|| "your partner".to_string());
    let lang = me.map(|p| p.language).unwrap_or_default();
    dispatcher.send(&Outgoing {
        participant_id: me_id.to_string(),
        pairing_id: Some(pairing.id.clone()),
        recipient: me.and_then(|p| p.chat_id.clone()),
        body: body(lang, &partner_name),
        buttons: keyboard(lang, &pairing.id, side),
    });
}

/// Apply the same patch to every id in `table`. Returns (written, failed).
pub(crate) fn latch(ctx: &JobContext<'_>, table: &str, ids: &[String], patch: Fields) -> (usize, usize) {
    if !ctx.writes_enabled() || ids.is_empty() {
        return (0, 0);
    }
    let rows: Vec<(String, Fields)> = ids.iter().map(|id| (id.clone(), patch.clone())).collect();
    let outcome = update_all(ctx.store, table, &rows, ctx.pacing.write_pause);
    (outcome.written.len(), outcome.failed_count())
}
