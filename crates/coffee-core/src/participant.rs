use crate::error::Result;
use crate::pool::Pool;
use crate::store::{fields, Fields, Record};
use crate::types::{Language, MatchStatus, WeekStatus};
use serde::Serialize;
use serde_json::json;

pub mod field {
    pub const NAME: &str = "Name";
    pub const USERNAME: &str = "Username";
    pub const TELEGRAM_ID: &str = "Telegram_ID";
    pub const CONSENT: &str = "Consent";
    pub const LANGUAGE: &str = "Language";
    pub const MATCHING_CONTEXT: &str = "Matching_Context";
    pub const NEXT_WEEK_STATUS: &str = "Next_Week_Status";
    pub const CURRENT_WEEK_STATUS: &str = "Current_Week_Status";
    pub const SPAM_OPT_OUT: &str = "Spam_Opt_Out";
    pub const WEEKEND_NOTIFICATION_SENT: &str = "Weekend_Notification_Sent";
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Participant {
    pub id: String,
    pub name: Option<String>,
    /// Messaging handle without the leading `@`.
    pub username: Option<String>,
    /// Messaging-gateway address. `None` means unreachable.
    pub chat_id: Option<String>,
    pub consent: bool,
    pub language: Language,
    pub pool: Pool,
    pub next_week_status: WeekStatus,
    pub current_week_status: MatchStatus,
    pub spam_opt_out: bool,
    pub weekend_notification_sent: bool,
}

impl Participant {
    pub fn from_record(record: &Record, table: &str) -> Result<Self> {
        let next_week_status: WeekStatus = match record.text(field::NEXT_WEEK_STATUS) {
            Some(s) => s.parse::<WeekStatus>().map_err(|e| record.invalid(table, format!("{e}")))?,
            None => WeekStatus::Passive,
        };
        let current_week_status: MatchStatus = match record.text(field::CURRENT_WEEK_STATUS) {
            Some(s) => s.parse::<MatchStatus>().map_err(|e| record.invalid(table, format!("{e}")))?,
            None => MatchStatus::Unmatched,
        };
        let pool = Pool::parse(record.text(field::MATCHING_CONTEXT).unwrap_or(""))
            .map_err(|e| record.invalid(table, e.to_string()))?;
        Ok(Self {
            id: record.id.clone(),
            name: record.text(field::NAME).map(|s| s.trim().to_string()),
            username: record
                .text(field::USERNAME)
                .map(|s| s.trim().trim_start_matches('@').to_string())
                .filter(|s| !s.is_empty()),
            chat_id: record.text_or_number(field::TELEGRAM_ID),
            consent: record.flag(field::CONSENT),
            language: Language::from_code(record.text(field::LANGUAGE).unwrap_or("")),
            pool,
            next_week_status,
            current_week_status,
            spam_opt_out: record.flag(field::SPAM_OPT_OUT),
            weekend_notification_sent: record.flag(field::WEEKEND_NOTIFICATION_SENT),
        })
    }

    /// Name to show a partner: display name, else handle, else a placeholder.
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .or_else(|| self.username.as_ref().map(|u| format!("@{u}")))
            .unwrap_or_else(|| "a fellow member".to_string())
    }
}

// ---------------------------------------------------------------------------
// Field patches
// ---------------------------------------------------------------------------

pub fn current_week_status_patch(status: MatchStatus) -> Fields {
    fields([(field::CURRENT_WEEK_STATUS, json!(status.as_str()))])
}

pub fn weekend_notification_patch(sent: bool) -> Fields {
    fields([(field::WEEKEND_NOTIFICATION_SENT, json!(sent))])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(v: serde_json::Value) -> Record {
        Record {
            id: "recA".into(),
            fields: v.as_object().cloned().unwrap(),
        }
    }

    #[test]
    fn parses_full_record() {
        let p = Participant::from_record(
            &record(json!({
                "Name": "Ana",
                "Username": "@ana",
                "Telegram_ID": 1001,
                "Consent": true,
                "Language": "ru",
                "Matching_Context": "community:acme",
                "Next_Week_Status": "Active",
                "Current_Week_Status": "Matched",
                "Weekend_Notification_Sent": true
            })),
            "Participants",
        )
        .unwrap();
        assert_eq!(p.username.as_deref(), Some("ana"));
        assert_eq!(p.chat_id.as_deref(), Some("1001"));
        assert_eq!(p.language, Language::Ru);
        assert_eq!(p.pool, Pool::Community("acme".into()));
        assert_eq!(p.next_week_status, WeekStatus::Active);
        assert_eq!(p.current_week_status, MatchStatus::Matched);
        assert!(p.weekend_notification_sent);
        assert!(!p.spam_opt_out);
    }

    #[test]
    fn blank_record_uses_safe_defaults() {
        let p = Participant::from_record(&record(json!({})), "Participants").unwrap();
        assert_eq!(p.pool, Pool::Global);
        assert_eq!(p.next_week_status, WeekStatus::Passive);
        assert!(!p.consent);
        assert!(p.chat_id.is_none());
        assert_eq!(p.display_name(), "a fellow member");
    }

    #[test]
    fn bad_status_is_reported() {
        let err = Participant::from_record(
            &record(json!({"Next_Week_Status": "Maybe"})),
            "Participants",
        )
        .unwrap_err();
        assert!(err.to_string().contains("recA"));
    }
}
