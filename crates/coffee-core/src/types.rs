use crate::error::CoffeeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// WeekStatus
// ---------------------------------------------------------------------------

/// Whether a participant wants to be paired in the upcoming run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WeekStatus {
    Active,
    Passive,
}

impl WeekStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            WeekStatus::Active => "Active",
            WeekStatus::Passive => "Passive",
        }
    }
}

impl fmt::Display for WeekStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WeekStatus {
    type Err = CoffeeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Active" => Ok(WeekStatus::Active),
            "Passive" => Ok(WeekStatus::Passive),
            _ => Err(CoffeeError::InvalidValue {
                kind: "week status",
                value: s.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// MatchStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchStatus {
    Unmatched,
    Matched,
}

impl MatchStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchStatus::Unmatched => "Unmatched",
            MatchStatus::Matched => "Matched",
        }
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchStatus {
    type Err = CoffeeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Unmatched" => Ok(MatchStatus::Unmatched),
            "Matched" => Ok(MatchStatus::Matched),
            _ => Err(CoffeeError::InvalidValue {
                kind: "match status",
                value: s.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// PairingStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PairingStatus {
    Matched,
    Met,
    NoShow,
}

impl PairingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PairingStatus::Matched => "Matched",
            PairingStatus::Met => "Met",
            PairingStatus::NoShow => "NoShow",
        }
    }
}

impl fmt::Display for PairingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PairingStatus {
    type Err = CoffeeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Matched" => Ok(PairingStatus::Matched),
            "Met" => Ok(PairingStatus::Met),
            "NoShow" => Ok(PairingStatus::NoShow),
            _ => Err(CoffeeError::InvalidValue {
                kind: "pairing status",
                value: s.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// FeedbackOutcome
// ---------------------------------------------------------------------------

/// What one side of a pairing reported about the meeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeedbackOutcome {
    Met,
    Scheduled,
    NotMet,
    Failed,
}

impl FeedbackOutcome {
    pub fn all() -> &'static [FeedbackOutcome] {
        &[
            FeedbackOutcome::Met,
            FeedbackOutcome::Scheduled,
            FeedbackOutcome::NotMet,
            FeedbackOutcome::Failed,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FeedbackOutcome::Met => "Met",
            FeedbackOutcome::Scheduled => "Scheduled",
            FeedbackOutcome::NotMet => "NotMet",
            FeedbackOutcome::Failed => "Failed",
        }
    }

    /// Short form used inside button callback payloads.
    pub fn code(self) -> &'static str {
        match self {
            FeedbackOutcome::Met => "met",
            FeedbackOutcome::Scheduled => "scheduled",
            FeedbackOutcome::NotMet => "not_met",
            FeedbackOutcome::Failed => "failed",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        FeedbackOutcome::all()
            .iter()
            .copied()
            .find(|o| o.code() == code)
    }
}

impl fmt::Display for FeedbackOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeedbackOutcome {
    type Err = CoffeeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FeedbackOutcome::all()
            .iter()
            .copied()
            .find(|o| o.as_str() == s)
            .ok_or_else(|| CoffeeError::InvalidValue {
                kind: "feedback outcome",
                value: s.to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// DeliveryStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeliveryStatus {
    Sent,
    Failed,
    #[serde(rename = "Dry-Run")]
    DryRun,
}

impl DeliveryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryStatus::Sent => "Sent",
            DeliveryStatus::Failed => "Failed",
            DeliveryStatus::DryRun => "Dry-Run",
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Language
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Ru,
}

impl Language {
    pub fn as_str(self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Ru => "ru",
        }
    }

    /// Lenient parse: anything unrecognised falls back to English.
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_ascii_lowercase().as_str() {
            "ru" | "rus" | "russian" => Language::Ru,
            _ => Language::En,
        }
    }
}

// ---------------------------------------------------------------------------
// Side
// ---------------------------------------------------------------------------

/// Slot of a participant inside a pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    First,
    Second,
}

impl Side {
    pub fn both() -> [Side; 2] {
        [Side::First, Side::Second]
    }

    pub fn index(self) -> u8 {
        match self {
            Side::First => 1,
            Side::Second => 2,
        }
    }

    pub fn from_index(i: u8) -> Option<Self> {
        match i {
            1 => Some(Side::First),
            2 => Some(Side::Second),
            _ => None,
        }
    }

    pub fn other(self) -> Side {
        match self {
            Side::First => Side::Second,
            Side::Second => Side::First,
        }
    }
}

// ---------------------------------------------------------------------------
// JobKind
// ---------------------------------------------------------------------------

/// Every cron entry point. The string form is the audit log's script name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobKind {
    Match,
    MatchAll,
    Invite,
    Midweek,
    Weekend,
    Sweep,
}

impl JobKind {
    pub fn as_str(self) -> &'static str {
        match self {
            JobKind::Match => "match",
            JobKind::MatchAll => "match-all",
            JobKind::Invite => "invite",
            JobKind::Midweek => "midweek",
            JobKind::Weekend => "weekend",
            JobKind::Sweep => "sweep",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = CoffeeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "match" => Ok(JobKind::Match),
            "match-all" => Ok(JobKind::MatchAll),
            "invite" => Ok(JobKind::Invite),
            "midweek" => Ok(JobKind::Midweek),
            "weekend" => Ok(JobKind::Weekend),
            "sweep" => Ok(JobKind::Sweep),
            _ => Err(CoffeeError::InvalidValue {
                kind: "job",
                value: s.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// RunMode
// ---------------------------------------------------------------------------

/// How side effects are applied during a run.
///
/// - `Live`: store writes and real sends.
/// - `DryRun`: no store mutations, no sends; audit entries marked `Dry-Run`.
/// - `Test`: sends are redirected to the admin; no participant/pairing writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    #[default]
    Live,
    DryRun,
    Test,
}

impl RunMode {
    pub fn as_str(self) -> &'static str {
        match self {
            RunMode::Live => "live",
            RunMode::DryRun => "dry_run",
            RunMode::Test => "test",
        }
    }

    /// Whether participant and pairing records may be mutated.
    pub fn writes_enabled(self) -> bool {
        self == RunMode::Live
    }
}
