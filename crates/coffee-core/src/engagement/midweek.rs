//! Mid-week check-in: ask both sides of every un-checked pairing whether
//! they have connected yet.

use super::{latch, people_in, prompt_side, CheckinReport};
use crate::context::JobContext;
use crate::error::Result;
use crate::messages;
use crate::pairing::{self, field, midweek_checkin_patch};
use crate::pool::Pool;
use crate::store::Filter;
use crate::types::{JobKind, Side};
use tracing::info;

pub fn run(ctx: &JobContext<'_>, scope: Option<&Pool>) -> Result<CheckinReport> {
    let week = ctx.week_start;
    let pending = pairing::for_week(
        ctx.store,
        &ctx.tables.pairings,
        week,
        scope,
        Some(Filter::is_false(field::MIDWEEK_CHECKIN)),
    )?;
    let mut report = CheckinReport::new(JobKind::Midweek, week, pending.len());
    let batch = ctx.take_limited(pending, "pairings");
    report.deferred = report.pairings_found - batch.len();
    if batch.is_empty() {
        info!(%week, "no pairings awaiting the midweek check-in");
        return Ok(report);
    }

    let people = people_in(ctx, &batch)?;
    let mut dispatcher = ctx.dispatcher(JobKind::Midweek);
    for p in &batch {
        for side in Side::both() {
            prompt_side(
                &mut dispatcher,
                &people,
                p,
                side,
                messages::midweek_prompt,
                messages::midweek_keyboard,
            );
        }
    }
    report.pairings_prompted = batch.len();
    report.notifications = dispatcher.tally();

    // Latched whatever the delivery outcome; failures are in the audit log.
    let ids: Vec<String> = batch.iter().map(|p| p.id.clone()).collect();
    let (latched, failed) = latch(ctx, &ctx.tables.pairings, &ids, midweek_checkin_patch());
    report.latched = latched;
    report.latch_failures = failed;

    info!(
        %week,
        prompted = report.pairings_prompted,
        sent = report.notifications.sent,
        failed = report.notifications.failed,
        "midweek check-in finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{chat_id, Fixture, RecordingSink};
    use crate::types::{DeliveryStatus, RunMode, WeekStatus};
    use serde_json::json;

    #[test]
    fn prompts_both_sides_and_latches_despite_failures() {
        let fx = Fixture::with_sink(RecordingSink::failing_for(&[&chat_id("Bo")]));
        let a = fx.participant("Ana", WeekStatus::Active, "global");
        let b = fx.participant("Bo", WeekStatus::Active, "global");
        let p = fx.pairing(&Pool::Global, &a, &b);

        let report = run(&fx.ctx(RunMode::Live), None).unwrap();
        assert_eq!(report.pairings_prompted, 1);
        assert_eq!(report.notifications.sent, 1);
        assert_eq!(report.notifications.failed, 1);
        assert_eq!(report.latched, 1);
        assert!(fx.pairing_record(&p).midweek_checkin);

        let sent = fx.sink.sent();
        assert_eq!(sent[0].recipient, chat_id("Ana"));
        assert!(sent[0].text.contains("Bo"));
        assert_eq!(sent[0].buttons.len(), 3);
        assert!(sent[0].buttons[0][0].callback_data.starts_with(&format!("midweek:{p}:1:")));

        let statuses: Vec<DeliveryStatus> = fx.audit.entries().iter().map(|e| e.status).collect();
        assert_eq!(statuses, [DeliveryStatus::Sent, DeliveryStatus::Failed]);

        // Latched pairings are not prompted again.
        let again = run(&fx.ctx(RunMode::Live), None).unwrap();
        assert_eq!(again.pairings_found, 0);
    }

    #[test]
    fn limit_defers_the_rest_and_scope_narrows_pools() {
        let mut fx = Fixture::new();
        fx.limit = Some(1);
        let ids: Vec<String> = ["A", "B", "C", "D", "E", "F"]
            .iter()
            .map(|n| fx.participant(n, WeekStatus::Active, "community:acme"))
            .collect();
        fx.pairing(&Pool::Community("acme".into()), &ids[0], &ids[1]);
        fx.pairing(&Pool::Community("acme".into()), &ids[2], &ids[3]);
        fx.pairing(&Pool::Global, &ids[4], &ids[5]);

        let acme = Pool::Community("acme".into());
        let report = run(&fx.ctx(RunMode::Live), Some(&acme)).unwrap();
        assert_eq!(report.pairings_found, 2);
        assert_eq!(report.deferred, 1);
        assert_eq!(report.latched, 1);
        assert_eq!(fx.sink.sent().len(), 2);
    }

    #[test]
    fn test_mode_sends_but_does_not_latch() {
        let fx = Fixture::new();
        let a = fx.participant("Ana", WeekStatus::Active, "global");
        let b = fx.participant("Bo", WeekStatus::Active, "global");
        let p = fx.pairing(&Pool::Global, &a, &b);
        fx.set_pairing(&p, "Feedback_1", json!("Scheduled"));

        let report = run(&fx.ctx(RunMode::Test), None).unwrap();
        assert_eq!(report.notifications.sent, 2);
        assert_eq!(report.latched, 0);
        assert!(!fx.pairing_record(&p).midweek_checkin);
    }
}
