//! Activation sweep over last week's pairings.
//!
//! A participant is engaged when they reported feedback on at least one of
//! their pairings, and a non-responder otherwise. Non-responders drop to
//! Passive. Engaged participants keep their status unless
//! `policy.reactivate_engaged` is set. Everyone swept returns to Unmatched.
//!
//! Participants whose record already carries the swept state are left out
//! before `--limit` applies, so repeated limited runs work through the rest.

use crate::context::JobContext;
use crate::error::Result;
use crate::pairing;
use crate::participant::{field, Participant};
use crate::pool::Pool;
use crate::store::{update_all, Fields};
use crate::types::{MatchStatus, Side, WeekStatus};
use crate::week;
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepReport {
    /// Week whose pairings were swept.
    pub swept_week: NaiveDate,
    pub pairings: usize,
    pub engaged: Vec<String>,
    pub non_responders: Vec<String>,
    /// Already in their swept state; not written again.
    pub already_swept: usize,
    pub deferred: usize,
    pub reactivated: bool,
    pub updated: usize,
    pub update_failures: usize,
}

pub fn run(ctx: &JobContext<'_>, scope: Option<&Pool>) -> Result<SweepReport> {
    let swept_week = week::previous_week(ctx.week_start);
    let pairings = pairing::for_week(ctx.store, &ctx.tables.pairings, swept_week, scope, None)?;

    // id -> responded in any pairing
    let mut responded: BTreeMap<String, bool> = BTreeMap::new();
    for p in &pairings {
        for side in Side::both() {
            let entry = responded.entry(p.participant(side).to_string()).or_default();
            *entry |= p.feedback(side).is_some();
        }
    }
    let ids: Vec<String> = responded.keys().cloned().collect();
    let current = ctx.participants_by_id(&ids)?;
    let reactivate = ctx.policy.reactivate_engaged;
    let pending: Vec<(String, bool)> = responded
        .into_iter()
        .filter(|(id, engaged)| {
            !current
                .get(id)
                .is_some_and(|p| is_swept(p, *engaged, reactivate))
        })
        .collect();
    let already_swept = ids.len() - pending.len();
    let total = pending.len();
    let people = ctx.take_limited(pending, "participants");

    let mut report = SweepReport {
        swept_week,
        pairings: pairings.len(),
        engaged: Vec::new(),
        non_responders: Vec::new(),
        already_swept,
        deferred: total - people.len(),
        reactivated: ctx.policy.reactivate_engaged,
        updated: 0,
        update_failures: 0,
    };

    let mut patches: Vec<(String, Fields)> = Vec::with_capacity(people.len());
    for (id, engaged) in people {
        let mut patch = Fields::new();
        patch.insert(
            field::CURRENT_WEEK_STATUS.to_string(),
            json!(MatchStatus::Unmatched.as_str()),
        );
        if !engaged {
            patch.insert(
                field::NEXT_WEEK_STATUS.to_string(),
                json!(WeekStatus::Passive.as_str()),
            );
            report.non_responders.push(id.clone());
        } else {
            if ctx.policy.reactivate_engaged {
                patch.insert(
                    field::NEXT_WEEK_STATUS.to_string(),
                    json!(WeekStatus::Active.as_str()),
                );
            }
            report.engaged.push(id.clone());
        }
        patches.push((id, patch));
    }

    if ctx.writes_enabled() && !patches.is_empty() {
        let outcome = update_all(
            ctx.store,
            &ctx.tables.participants,
            &patches,
            ctx.pacing.write_pause,
        );
        report.updated = outcome.written.len();
        report.update_failures = outcome.failed_count();
        if report.update_failures > 0 {
            warn!(failed = report.update_failures, "some participants were not swept");
        }
    }

    info!(
        week = %swept_week,
        engaged = report.engaged.len(),
        non_responders = report.non_responders.len(),
        updated = report.updated,
        "activation sweep finished"
    );
    Ok(report)
}

fn is_swept(p: &Participant, engaged: bool, reactivate: bool) -> bool {
    let target = match (engaged, reactivate) {
        (false, _) => Some(WeekStatus::Passive),
        (true, true) => Some(WeekStatus::Active),
        (true, false) => None,
    };
    p.current_week_status == MatchStatus::Unmatched
        && target.map_or(true, |t| p.next_week_status == t)
}

/// Participants the sweep would touch, for display.
pub fn describe(ctx: &JobContext<'_>, report: &SweepReport) -> Result<Vec<Participant>> {
    let ids: Vec<String> = report
        .non_responders
        .iter()
        .chain(&report.engaged)
        .cloned()
        .collect();
    let people = ctx.participants_by_id(&ids)?;
    Ok(ids.iter().filter_map(|id| people.get(id).cloned()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fixture;
    use crate::types::RunMode;

    fn last_week_pair(fx: &Fixture) -> (String, String, String) {
        let a = fx.participant("Ana", WeekStatus::Active, "global");
        let b = fx.participant("Bo", WeekStatus::Active, "global");
        fx.set(&a, field::CURRENT_WEEK_STATUS, json!("Matched"));
        fx.set(&b, field::CURRENT_WEEK_STATUS, json!("Matched"));
        let p = fx.pairing_in(week::previous_week(fx.week), &Pool::Global, &a, &b);
        (a, b, p)
    }

    #[test]
    fn silent_pair_goes_passive() {
        let fx = Fixture::new();
        let (a, b, _) = last_week_pair(&fx);
        let report = run(&fx.ctx(RunMode::Live), None).unwrap();
        assert_eq!(report.non_responders.len(), 2);
        for id in [a, b] {
            let p = fx.participant_record(&id);
            assert_eq!(p.next_week_status, WeekStatus::Passive);
            assert_eq!(p.current_week_status, MatchStatus::Unmatched);
        }
    }

    #[test]
    fn engaged_side_keeps_status_unless_policy_reactivates() {
        let fx = Fixture::new();
        let (a, b, p) = last_week_pair(&fx);
        fx.set_pairing(&p, "Feedback_1", json!("Met"));
        fx.set(&a, field::NEXT_WEEK_STATUS, json!("Passive"));

        let report = run(&fx.ctx(RunMode::Live), None).unwrap();
        assert_eq!(report.engaged, vec![a.clone()]);
        assert_eq!(report.non_responders, vec![b.clone()]);
        assert_eq!(fx.participant_record(&a).next_week_status, WeekStatus::Passive);
        assert_eq!(fx.participant_record(&b).next_week_status, WeekStatus::Passive);

        let mut fx2 = Fixture::new();
        fx2.policy.reactivate_engaged = true;
        let (a2, _, p2) = last_week_pair(&fx2);
        fx2.set_pairing(&p2, "Feedback_1", json!("Scheduled"));
        fx2.set(&a2, field::NEXT_WEEK_STATUS, json!("Passive"));
        run(&fx2.ctx(RunMode::Live), None).unwrap();
        assert_eq!(fx2.participant_record(&a2).next_week_status, WeekStatus::Active);
    }

    #[test]
    fn current_week_pairings_are_left_alone() {
        let fx = Fixture::new();
        let a = fx.participant("Ana", WeekStatus::Active, "global");
        let b = fx.participant("Bo", WeekStatus::Active, "global");
        fx.pairing(&Pool::Global, &a, &b);
        let report = run(&fx.ctx(RunMode::Live), None).unwrap();
        assert_eq!(report.pairings, 0);
        assert_eq!(fx.participant_record(&a).next_week_status, WeekStatus::Active);
    }

    #[test]
    fn limited_reruns_work_through_every_participant() {
        let mut fx = Fixture::new();
        fx.limit = Some(1);
        let (a, b, _) = last_week_pair(&fx);

        let first = run(&fx.ctx(RunMode::Live), None).unwrap();
        assert_eq!(first.non_responders.len(), 1);
        assert_eq!(first.deferred, 1);

        let second = run(&fx.ctx(RunMode::Live), None).unwrap();
        assert_eq!(second.already_swept, 1);
        assert_eq!(second.deferred, 0);
        assert_ne!(second.non_responders, first.non_responders);

        let third = run(&fx.ctx(RunMode::Live), None).unwrap();
        assert_eq!(third.already_swept, 2);
        assert!(third.non_responders.is_empty());
        assert_eq!(third.updated, 0);

        for id in [a, b] {
            let p = fx.participant_record(&id);
            assert_eq!(p.next_week_status, WeekStatus::Passive);
            assert_eq!(p.current_week_status, MatchStatus::Unmatched);
        }
    }

    #[test]
    fn dry_run_partitions_without_writing() {
        let fx = Fixture::new();
        let (a, _, _) = last_week_pair(&fx);
        let ctx = fx.ctx(RunMode::DryRun);
        let report = run(&ctx, None).unwrap();
        assert_eq!(report.non_responders.len(), 2);
        assert_eq!(report.updated, 0);
        assert_eq!(fx.participant_record(&a).next_week_status, WeekStatus::Active);
        assert_eq!(describe(&ctx, &report).unwrap().len(), 2);
    }
}
