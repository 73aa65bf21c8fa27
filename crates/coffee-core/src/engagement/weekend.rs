//! Weekend feedback: prompt only the sides that have not reported yet.

use super::{latch, people_in, prompt_side, CheckinReport};
use crate::context::JobContext;
use crate::error::Result;
use crate::messages;
use crate::pairing::{self, field, weekend_checkin_patch, Pairing};
use crate::pool::Pool;
use crate::store::Filter;
use crate::types::JobKind;
use tracing::info;

pub fn run(ctx: &JobContext<'_>, scope: Option<&Pool>) -> Result<CheckinReport> {
    let week = ctx.week_start;
    let pending = pairing::for_week(
        ctx.store,
        &ctx.tables.pairings,
        week,
        scope,
        Some(Filter::is_false(field::WEEKEND_CHECKIN)),
    )?;
    let mut report = CheckinReport::new(JobKind::Weekend, week, pending.len());

    let (complete, waiting): (Vec<Pairing>, Vec<Pairing>) = pending
        .into_iter()
        .partition(|p| p.sides_missing_feedback().is_empty());
    report.already_complete = complete.len();
    let waiting_count = waiting.len();
    let batch = ctx.take_limited(waiting, "pairings");
    report.deferred = waiting_count - batch.len();

    if !batch.is_empty() {
        let people = people_in(ctx, &batch)?;
        let mut dispatcher = ctx.dispatcher(JobKind::Weekend);
        for p in &batch {
            for side in p.sides_missing_feedback() {
                prompt_side(
                    &mut dispatcher,
                    &people,
                    p,
                    side,
                    messages::weekend_prompt,
                    messages::weekend_keyboard,
                );
            }
        }
        report.pairings_prompted = batch.len();
        report.notifications = dispatcher.tally();
    }

    let ids: Vec<String> = complete
        .iter()
        .chain(batch.iter())
        .map(|p| p.id.clone())
        .collect();
    let (latched, failed) = latch(ctx, &ctx.tables.pairings, &ids, weekend_checkin_patch());
    report.latched = latched;
    report.latch_failures = failed;

    info!(
        %week,
        prompted = report.pairings_prompted,
        complete = report.already_complete,
        sent = report.notifications.sent,
        failed = report.notifications.failed,
        "weekend feedback finished"
    );
    Ok(report)
}
