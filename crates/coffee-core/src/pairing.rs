//! Weekly pairings and their feedback state machine.
//!
//! Status transitions are driven only by reported feedback:
//!
//! ```text
//! Matched ──any side reports Met──────────────▶ Met
//! Matched ──both sides report, neither Met────▶ NoShow
//! ```
//!
//! `midweek_checkin` and `weekend_checkin` are one-way latches: jobs set them
//! to `true` and nothing in the weekly cycle clears them.

use crate::error::{CoffeeError, Result};
use crate::pool::Pool;
use crate::store::{fields, Fields, Filter, Query, Record, RecordStore};
use crate::types::{FeedbackOutcome, PairingStatus, Side};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::json;

pub mod field {
    pub const WEEK_START: &str = "Week_Start";
    pub const POOL: &str = "Pool";
    pub const PARTICIPANT_1: &str = "Participant_1";
    pub const PARTICIPANT_2: &str = "Participant_2";
    pub const STATUS: &str = "Status";
    pub const FEEDBACK_1: &str = "Feedback_1";
    pub const FEEDBACK_2: &str = "Feedback_2";
    pub const MIDWEEK_CHECKIN: &str = "Midweek_Checkin";
    pub const WEEKEND_CHECKIN: &str = "Weekend_Checkin";
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pairing {
    pub id: String,
    pub week_start: NaiveDate,
    pub pool: Pool,
    pub participant_1: String,
    pub participant_2: String,
    pub status: PairingStatus,
    pub feedback_1: Option<FeedbackOutcome>,
    pub feedback_2: Option<FeedbackOutcome>,
    pub midweek_checkin: bool,
    pub weekend_checkin: bool,
}

impl Pairing {
    pub fn from_record(record: &Record, table: &str) -> Result<Self> {
        let week_start = record
            .date(field::WEEK_START)
            .ok_or_else(|| record.invalid(table, "missing or malformed week start"))?;
        let participant_1 = record
            .first_link(field::PARTICIPANT_1)
            .ok_or_else(|| record.invalid(table, "missing participant 1"))?;
        let participant_2 = record
            .first_link(field::PARTICIPANT_2)
            .ok_or_else(|| record.invalid(table, "missing participant 2"))?;
        let pool = Pool::parse(record.text(field::POOL).unwrap_or(""))
            .map_err(|e| record.invalid(table, e.to_string()))?;
        let status = match record.text(field::STATUS) {
            Some(s) => s
                .parse::<PairingStatus>()
                .map_err(|e| record.invalid(table, e.to_string()))?,
            None => PairingStatus::Matched,
        };
        let feedback = |name: &str| -> Result<Option<FeedbackOutcome>> {
            record
                .text(name)
                .map(|s| {
                    s.parse::<FeedbackOutcome>()
                        .map_err(|e| record.invalid(table, e.to_string()))
                })
                .transpose()
        };
        Ok(Self {
            id: record.id.clone(),
            week_start,
            pool,
            participant_1,
            participant_2,
            status,
            feedback_1: feedback(field::FEEDBACK_1)?,
            feedback_2: feedback(field::FEEDBACK_2)?,
            midweek_checkin: record.flag(field::MIDWEEK_CHECKIN),
            weekend_checkin: record.flag(field::WEEKEND_CHECKIN),
        })
    }

    /// Fields for a freshly created pairing.
    pub fn new_fields(week_start: NaiveDate, pool: &Pool, first: &str, second: &str) -> Fields {
        fields([
            (field::WEEK_START, json!(week_start.format("%Y-%m-%d").to_string())),
            (field::POOL, json!(pool.context())),
            (field::PARTICIPANT_1, json!([first])),
            (field::PARTICIPANT_2, json!([second])),
            (field::STATUS, json!(PairingStatus::Matched.as_str())),
            (field::MIDWEEK_CHECKIN, json!(false)),
            (field::WEEKEND_CHECKIN, json!(false)),
        ])
    }

    pub fn participant(&self, side: Side) -> &str {
        match side {
            Side::First => &self.participant_1,
            Side::Second => &self.participant_2,
        }
    }

    pub fn feedback(&self, side: Side) -> Option<FeedbackOutcome> {
        match side {
            Side::First => self.feedback_1,
            Side::Second => self.feedback_2,
        }
    }

    pub fn side_of(&self, participant_id: &str) -> Option<Side> {
        if self.participant_1 == participant_id {
            Some(Side::First)
        } else if self.participant_2 == participant_id {
            Some(Side::Second)
        } else {
            None
        }
    }

    /// Sides that have not reported yet, in slot order.
    pub fn sides_missing_feedback(&self) -> Vec<Side> {
        Side::both()
            .into_iter()
            .filter(|s| self.feedback(*s).is_none())
            .collect()
    }

    pub fn derive_status(&self) -> PairingStatus {
        match (self.feedback_1, self.feedback_2) {
            (Some(FeedbackOutcome::Met), _) | (_, Some(FeedbackOutcome::Met)) => {
                PairingStatus::Met
            }
            (Some(_), Some(_)) => PairingStatus::NoShow,
            _ => PairingStatus::Matched,
        }
    }

    /// Apply one side's report and recompute status. Later reports from the
    /// same side overwrite earlier ones. Returns the patch to persist.
    pub fn record_feedback(&mut self, side: Side, outcome: FeedbackOutcome) -> Fields {
        match side {
            Side::First => self.feedback_1 = Some(outcome),
            Side::Second => self.feedback_2 = Some(outcome),
        }
        self.status = self.derive_status();
        let feedback_field = match side {
            Side::First => field::FEEDBACK_1,
            Side::Second => field::FEEDBACK_2,
        };
        fields([
            (feedback_field, json!(outcome.as_str())),
            (field::STATUS, json!(self.status.as_str())),
        ])
    }
}

pub fn midweek_checkin_patch() -> Fields {
    fields([(field::MIDWEEK_CHECKIN, json!(true))])
}

pub fn weekend_checkin_patch() -> Fields {
    fields([(field::WEEKEND_CHECKIN, json!(true))])
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Pairings for `week_start`, optionally narrowed to a pool and extra filter.
/// Malformed rows are an error: silently dropping one could double-pair.
pub fn for_week(
    store: &dyn RecordStore,
    table: &str,
    week_start: NaiveDate,
    pool: Option<&Pool>,
    extra: Option<Filter>,
) -> Result<Vec<Pairing>> {
    let mut parts = vec![Filter::date_eq(field::WEEK_START, week_start)];
    if let Some(pool) = pool {
        parts.push(pool.filter(field::POOL));
    }
    parts.extend(extra);
    let records = store.select(table, &Query::filter(Filter::And(parts)))?;
    records
        .iter()
        .map(|r| Pairing::from_record(r, table))
        .collect()
}

// ---------------------------------------------------------------------------
// Callback payloads
// ---------------------------------------------------------------------------

/// Button payload `action:pairing_id:side:outcome`, routed by the external
/// callback handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackCallback {
    pub action: String,
    pub pairing_id: String,
    pub side: Side,
    pub outcome: FeedbackOutcome,
}

impl FeedbackCallback {
    pub fn encode(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.action,
            self.pairing_id,
            self.side.index(),
            self.outcome.code()
        )
    }

    pub fn decode(payload: &str) -> Result<Self> {
        let bad = || CoffeeError::InvalidCallback(payload.to_string());
        let parts: Vec<&str> = payload.split(':').collect();
        let [action, pairing_id, side, outcome] = parts.as_slice() else {
            return Err(bad());
        };
        if action.is_empty() || pairing_id.is_empty() {
            return Err(bad());
        }
        let side = side
            .parse::<u8>()
            .ok()
            .and_then(Side::from_index)
            .ok_or_else(bad)?;
        let outcome = FeedbackOutcome::from_code(outcome).ok_or_else(bad)?;
        Ok(Self {
            action: action.to_string(),
            pairing_id: pairing_id.to_string(),
            side,
            outcome,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn pairing() -> Pairing {
        Pairing {
            id: "recP".into(),
            week_start: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            pool: Pool::Global,
            participant_1: "recA".into(),
            participant_2: "recB".into(),
            status: PairingStatus::Matched,
            feedback_1: None,
            feedback_2: None,
            midweek_checkin: false,
            weekend_checkin: false,
        }
    }

    #[test]
    fn met_on_either_side_wins() {
        let mut p = pairing();
        p.record_feedback(Side::Second, FeedbackOutcome::NotMet);
        assert_eq!(p.status, PairingStatus::Matched);
        let patch = p.record_feedback(Side::First, FeedbackOutcome::Met);
        assert_eq!(p.status, PairingStatus::Met);
        assert_eq!(patch.get(field::FEEDBACK_1), Some(&json!("Met")));
        assert_eq!(patch.get(field::STATUS), Some(&json!("Met")));
    }

    #[test]
    fn both_reported_without_meeting_is_no_show() {
        let mut p = pairing();
        p.record_feedback(Side::First, FeedbackOutcome::Scheduled);
        p.record_feedback(Side::Second, FeedbackOutcome::Failed);
        assert_eq!(p.status, PairingStatus::NoShow);
    }

    #[test]
    fn missing_sides_in_slot_order() {
        let mut p = pairing();
        assert_eq!(p.sides_missing_feedback(), vec![Side::First, Side::Second]);
        p.feedback_2 = Some(FeedbackOutcome::Met);
        assert_eq!(p.sides_missing_feedback(), vec![Side::First]);
        assert_eq!(p.side_of("recB"), Some(Side::Second));
        assert_eq!(p.side_of("recZ"), None);
    }

    #[test]
    fn callback_codec() {
        let cb = FeedbackCallback {
            action: "weekend".into(),
            pairing_id: "recP".into(),
            side: Side::Second,
            outcome: FeedbackOutcome::NotMet,
        };
        assert_eq!(cb.encode(), "weekend:recP:2:not_met");
        assert_eq!(FeedbackCallback::decode("weekend:recP:2:not_met").unwrap(), cb);
        assert!(FeedbackCallback::decode("weekend:recP:3:met").is_err());
        assert!(FeedbackCallback::decode("weekend:recP:1").is_err());
        assert!(FeedbackCallback::decode("weekend::1:met").is_err());
    }

    #[test]
    fn for_week_scopes_by_pool() {
        let store = MemoryStore::new();
        let week = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        store.seed(
            "Pairings",
            Pairing::new_fields(week, &Pool::Global, "recA", "recB"),
        );
        store.seed(
            "Pairings",
            Pairing::new_fields(week, &Pool::Community("acme".into()), "recA", "recC"),
        );
        store.seed(
            "Pairings",
            Pairing::new_fields(
                NaiveDate::from_ymd_opt(2024, 2, 26).unwrap(),
                &Pool::Global,
                "recD",
                "recE",
            ),
        );

        let global = for_week(&store, "Pairings", week, Some(&Pool::Global), None).unwrap();
        assert_eq!(global.len(), 1);
        assert_eq!(global[0].participant_2, "recB");

        let all = for_week(&store, "Pairings", week, None, None).unwrap();
        assert_eq!(all.len(), 2);
    }
}
