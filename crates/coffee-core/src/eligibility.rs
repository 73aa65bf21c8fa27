//! Who may be paired in a given pool and week.
//!
//! `candidates = opted_in(pool) − already_matched(pool, week)`. The
//! `already_matched` check is the only guard against double pairing when a
//! run is repeated, so it is computed from the store on every call.

use crate::config::Tables;
use crate::error::Result;
use crate::pairing::{self, Pairing};
use crate::participant::{field, Participant};
use crate::pool::Pool;
use crate::store::{Filter, Query, RecordStore};
use crate::types::WeekStatus;
use chrono::NaiveDate;
use std::collections::BTreeSet;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct Eligibility {
    pub candidates: Vec<Participant>,
    pub already_matched: BTreeSet<String>,
}

#[derive(Debug, Clone)]
pub enum Resolution {
    Ready(Eligibility),
    /// Fewer than two candidates. A normal early exit, not an error.
    InsufficientCandidates(Eligibility),
}

impl Resolution {
    pub fn eligibility(&self) -> &Eligibility {
        match self {
            Resolution::Ready(e) | Resolution::InsufficientCandidates(e) => e,
        }
    }
}

/// Filter for participants who opted in for the coming week in `pool`.
pub fn opt_in_filter(pool: &Pool) -> Filter {
    Filter::And(vec![
        Filter::eq(field::NEXT_WEEK_STATUS, WeekStatus::Active.as_str()),
        Filter::is_true(field::CONSENT),
        pool.filter(field::MATCHING_CONTEXT),
    ])
}

/// Number of opted-in participants in `pool`, before excluding anyone
/// already paired this week.
pub fn count_opt_ins(store: &dyn RecordStore, tables: &Tables, pool: &Pool) -> Result<usize> {
    let query = Query::filter(opt_in_filter(pool)).with_fields(&[field::NEXT_WEEK_STATUS]);
    Ok(store.select(&tables.participants, &query)?.len())
}

/// Ids of everyone already holding a pairing for `week_start` in `pool`.
pub fn already_matched(
    store: &dyn RecordStore,
    tables: &Tables,
    pool: &Pool,
    week_start: NaiveDate,
) -> Result<BTreeSet<String>> {
    let existing = pairing::for_week(store, &tables.pairings, week_start, Some(pool), None)?;
    Ok(existing
        .iter()
        .flat_map(|p: &Pairing| [p.participant_1.clone(), p.participant_2.clone()])
        .collect())
}

pub fn resolve(
    store: &dyn RecordStore,
    tables: &Tables,
    pool: &Pool,
    week_start: NaiveDate,
) -> Result<Resolution> {
    let already_matched = already_matched(store, tables, pool, week_start)?;

    let records = store.select(&tables.participants, &Query::filter(opt_in_filter(pool)))?;
    let mut candidates = Vec::with_capacity(records.len());
    for record in &records {
        if already_matched.contains(&record.id) {
            continue;
        }
        match Participant::from_record(record, &tables.participants) {
            Ok(p) => candidates.push(p),
            Err(e) => warn!(%pool, error = %e, "skipping malformed participant"),
        }
    }
    debug!(
        %pool,
        week = %week_start,
        candidates = candidates.len(),
        already_matched = already_matched.len(),
        "eligibility resolved"
    );

    let eligibility = Eligibility {
        candidates,
        already_matched,
    };
    if eligibility.candidates.len() < 2 {
        Ok(Resolution::InsufficientCandidates(eligibility))
    } else {
        Ok(Resolution::Ready(eligibility))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fixture;
    use crate::types::WeekStatus;

    #[test]
    fn excludes_already_matched_and_non_consenting() {
        let fx = Fixture::new();
        let a = fx.participant("Ana", WeekStatus::Active, "global");
        let b = fx.participant("Bo", WeekStatus::Active, "global");
        let c = fx.participant("Cy", WeekStatus::Active, "global");
        let d = fx.participant("Di", WeekStatus::Active, "global");
        fx.participant("Ed", WeekStatus::Passive, "global");
        let f = fx.participant("Fa", WeekStatus::Active, "global");
        fx.set(&f, "Consent", serde_json::json!(false));
        fx.pairing(&Pool::Global, &a, &b);

        let res = resolve(&fx.store, &fx.tables, &Pool::Global, fx.week).unwrap();
        let Resolution::Ready(e) = res else {
            panic!("expected enough candidates");
        };
        let ids: BTreeSet<String> = e.candidates.iter().map(|p| p.id.clone()).collect();
        assert_eq!(ids, BTreeSet::from([c.clone(), d.clone()]));
        assert!(ids.is_disjoint(&e.already_matched));
        assert_eq!(e.already_matched, BTreeSet::from([a, b]));
    }

    #[test]
    fn pools_do_not_leak_into_each_other() {
        let fx = Fixture::new();
        let a = fx.participant("Ana", WeekStatus::Active, "community:acme");
        fx.participant("Bo", WeekStatus::Active, "community:acme");
        fx.participant("Cy", WeekStatus::Active, "global");
        fx.participant("Di", WeekStatus::Active, "");
        // Paired in global this week, still free in acme.
        fx.pairing(&Pool::Global, &a, "recOther");

        let acme = Pool::Community("acme".into());
        let res = resolve(&fx.store, &fx.tables, &acme, fx.week).unwrap();
        assert_eq!(res.eligibility().candidates.len(), 2);

        let global = resolve(&fx.store, &fx.tables, &Pool::Global, fx.week).unwrap();
        assert_eq!(global.eligibility().candidates.len(), 2);
        assert_eq!(count_opt_ins(&fx.store, &fx.tables, &acme).unwrap(), 2);
    }

    #[test]
    fn one_candidate_is_insufficient() {
        let fx = Fixture::new();
        fx.participant("Ana", WeekStatus::Active, "global");
        let res = resolve(&fx.store, &fx.tables, &Pool::Global, fx.week).unwrap();
        assert!(matches!(res, Resolution::InsufficientCandidates(ref e) if e.candidates.len() == 1));
    }
}
