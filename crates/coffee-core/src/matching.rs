//! Single-pool matching job: resolve, pair, persist, announce.

use crate::context::JobContext;
use crate::dispatch::{DispatchTally, Outgoing};
use crate::eligibility::{self, Resolution};
use crate::error::{CoffeeError, Result};
use crate::messages;
use crate::pairer::{self, PairPlan};
use crate::pairing::Pairing;
use crate::participant::{current_week_status_patch, Participant};
use crate::pool::Pool;
use crate::store::{create_all, update_all, Fields};
use crate::types::{JobKind, MatchStatus, Side};
use chrono::NaiveDate;
use rand::RngCore;
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairSummary {
    /// `None` when the run did not persist (dry run / test mode).
    pub pairing_id: Option<String>,
    pub participant_1: String,
    pub participant_2: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolOutcome {
    pub pool: Pool,
    pub week_start: NaiveDate,
    pub candidates: usize,
    pub already_matched: usize,
    /// Fewer than two candidates; nothing was paired.
    pub insufficient: bool,
    pub pairs: Vec<PairSummary>,
    pub pair_write_failures: usize,
    pub status_update_failures: usize,
    pub leftover: Option<String>,
    pub notifications: DispatchTally,
}

impl PoolOutcome {
    fn empty(pool: &Pool, week_start: NaiveDate, candidates: usize, already: usize) -> Self {
        Self {
            pool: pool.clone(),
            week_start,
            candidates,
            already_matched: already,
            insufficient: false,
            pairs: Vec::new(),
            pair_write_failures: 0,
            status_update_failures: 0,
            leftover: None,
            notifications: DispatchTally::default(),
        }
    }
}

pub fn run_pool(ctx: &JobContext<'_>, pool: &Pool, rng: &mut dyn RngCore) -> Result<PoolOutcome> {
    let week = ctx.week_start;
    let resolution = eligibility::resolve(ctx.store, &ctx.tables, pool, week)?;
    let eligibility = match resolution {
        Resolution::Ready(e) => e,
        Resolution::InsufficientCandidates(e) => {
            info!(%pool, %week, candidates = e.candidates.len(), "not enough candidates to pair");
            let mut outcome =
                PoolOutcome::empty(pool, week, e.candidates.len(), e.already_matched.len());
            outcome.insufficient = true;
            return Ok(outcome);
        }
    };
    if ctx.limit.is_some() {
        warn!(%pool, "limit is ignored by matching; every candidate is paired");
    }

    let mut outcome = PoolOutcome::empty(
        pool,
        week,
        eligibility.candidates.len(),
        eligibility.already_matched.len(),
    );
    let plan: PairPlan<Participant> = pairer::pair(eligibility.candidates, rng);
    info!(%pool, %week, pairs = plan.pairs.len(), leftover = plan.leftover.is_some(), "pairing plan ready");

    let slots = persist_pairings(ctx, pool, &plan, &mut outcome)?;

    let mut dispatcher = ctx.dispatcher(JobKind::Match);
    for ((a, b), slot) in plan.pairs.iter().zip(slots) {
        let persisted = match slot {
            Persisted::Written(id) => Some(id),
            Persisted::NotWritten => None,
            Persisted::Failed => continue,
        };
        outcome.pairs.push(PairSummary {
            pairing_id: persisted.clone(),
            participant_1: a.id.clone(),
            participant_2: b.id.clone(),
        });
        for side in Side::both() {
            let (me, partner) = match side {
                Side::First => (a, b),
                Side::Second => (b, a),
            };
            dispatcher.send(&Outgoing {
                participant_id: me.id.clone(),
                pairing_id: persisted.clone(),
                recipient: me.chat_id.clone(),
                body: messages::pairing_intro(me.language, partner),
                buttons: Vec::new(),
            });
        }
    }

    if let Some(left) = &plan.leftover {
        outcome.leftover = Some(left.id.clone());
        if ctx.policy.notify_leftover {
            dispatcher.send(&Outgoing {
                participant_id: left.id.clone(),
                pairing_id: None,
                recipient: left.chat_id.clone(),
                body: messages::leftover_notice(left.language),
                buttons: Vec::new(),
            });
        }
    }

    outcome.notifications = dispatcher.tally();
    info!(
        %pool,
        pairs = outcome.pairs.len(),
        sent = outcome.notifications.sent,
        failed = outcome.notifications.failed,
        "pool matched"
    );
    Ok(outcome)
}

/// Per planned pair: what happened when persisting it.
#[derive(Debug, Clone, PartialEq)]
enum Persisted {
    Written(String),
    /// Writes are disabled for this run mode.
    NotWritten,
    Failed,
}

/// Write pairings and flip both members to Matched. Returns one slot per
/// planned pair, in plan order.
fn persist_pairings(
    ctx: &JobContext<'_>,
    pool: &Pool,
    plan: &PairPlan<Participant>,
    outcome: &mut PoolOutcome,
) -> Result<Vec<Persisted>> {
    if !ctx.writes_enabled() {
        return Ok(vec![Persisted::NotWritten; plan.pairs.len()]);
    }
    if plan.pairs.is_empty() {
        return Ok(Vec::new());
    }

    let rows: Vec<Fields> = plan
        .pairs
        .iter()
        .map(|(a, b)| Pairing::new_fields(ctx.week_start, pool, &a.id, &b.id))
        .collect();
    let created = create_all(ctx.store, &ctx.tables.pairings, &rows, ctx.pacing.write_pause);
    outcome.pair_write_failures = created.failed_count();
    if created.written.is_empty() {
        let reason = created
            .failures
            .first()
            .map(|f| f.error.clone())
            .unwrap_or_default();
        return Err(CoffeeError::NothingPersisted {
            table: ctx.tables.pairings.clone(),
            reason,
        });
    }

    let mut slots = vec![Persisted::Failed; plan.pairs.len()];
    for (index, record) in created.written {
        slots[index] = Persisted::Written(record.id);
    }

    let patches: Vec<(String, Fields)> = plan
        .pairs
        .iter()
        .zip(&slots)
        .filter(|(_, slot)| matches!(slot, Persisted::Written(_)))
        .flat_map(|((a, b), _)| [a.id.clone(), b.id.clone()])
        .map(|id| (id, current_week_status_patch(MatchStatus::Matched)))
        .collect();
    let updated = update_all(
        ctx.store,
        &ctx.tables.participants,
        &patches,
        ctx.pacing.write_pause,
    );
    outcome.status_update_failures = updated.failed_count();
    Ok(slots)
}
