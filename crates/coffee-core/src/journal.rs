//! Local run journal backed by redb.
//!
//! Every job run is recorded before it touches the store. A live run refuses
//! to start while an overlapping live run for the same week is still
//! `Running`. Runs overlap when their jobs touch the same records (`match`
//! and `match-all` count as one job) and their scopes intersect, where `all`
//! intersects every pool. A `Running` entry older than the stale threshold
//! is treated as a crashed run: it no longer blocks and is recovered to
//! `Failed` by [`RunJournal::startup_recovery`].
//!
//! # Table design
//!
//! A single `RUNS` table uses a 24-byte composite key:
//! ```text
//! [ started_at_ms: u64 big-endian (8 bytes) | uuid: 16 bytes ]
//! ```
//! so iteration order is start order.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use redb::{Database, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoffeeError, Result};
use crate::types::{JobKind, RunMode};

/// Key: 24-byte composite (started_at_ms big-endian ++ uuid bytes)
/// Value: JSON-encoded RunEntry
const RUNS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("runs");

/// Scope label of a run over every pool.
pub const ALL_SCOPE: &str = "all";

fn run_key(ts: DateTime<Utc>, id: Uuid) -> [u8; 24] {
    let mut key = [0u8; 24];
    let ms = ts.timestamp_millis().max(0) as u64;
    key[..8].copy_from_slice(&ms.to_be_bytes());
    key[8..].copy_from_slice(id.as_bytes());
    key
}

fn db_err(e: impl std::fmt::Display) -> CoffeeError {
    CoffeeError::Journal(e.to_string())
}

// ---------------------------------------------------------------------------
// RunEntry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed { summary: serde_json::Value },
    Failed { reason: String },
}

impl RunStatus {
    pub fn label(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed { .. } => "completed",
            RunStatus::Failed { .. } => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunEntry {
    pub id: Uuid,
    pub job: JobKind,
    pub week_start: NaiveDate,
    /// `all`, `global` or `community:<slug>`.
    pub scope: String,
    pub mode: RunMode,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RunEntry {
    fn conflicts_with(&self, job: JobKind, week: NaiveDate, scope: &str, cutoff: DateTime<Utc>) -> bool {
        self.status == RunStatus::Running
            && self.mode == RunMode::Live
            && same_records(self.job, job)
            && self.week_start == week
            && scopes_overlap(&self.scope, scope)
            && self.updated_at >= cutoff
    }
}

fn same_records(a: JobKind, b: JobKind) -> bool {
    let matching = |j: JobKind| matches!(j, JobKind::Match | JobKind::MatchAll);
    a == b || (matching(a) && matching(b))
}

fn scopes_overlap(a: &str, b: &str) -> bool {
    a == b || a == ALL_SCOPE || b == ALL_SCOPE
}

// ---------------------------------------------------------------------------
// RunJournal
// ---------------------------------------------------------------------------

pub struct RunJournal {
    db: Database,
    stale_after: Duration,
}

impl RunJournal {
    /// Open or create the journal at `path`, creating parent directories.
    pub fn open(path: &Path, stale_after: Duration) -> Result<Self> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }
        let db = Database::create(path).map_err(db_err)?;
        let wt = db.begin_write().map_err(db_err)?;
        wt.open_table(RUNS).map_err(db_err)?;
        wt.commit().map_err(db_err)?;
        Ok(Self { db, stale_after })
    }

    fn cutoff(&self) -> Result<DateTime<Utc>> {
        Ok(Utc::now() - chrono::Duration::from_std(self.stale_after).map_err(db_err)?)
    }

    /// Record the start of a run. Live runs fail with
    /// [`CoffeeError::RunInProgress`] while a fresh overlapping live run for
    /// the same week is still `Running`.
    pub fn begin(&self, job: JobKind, week_start: NaiveDate, scope: &str, mode: RunMode) -> Result<RunEntry> {
        let cutoff = self.cutoff()?;
        let now = Utc::now();
        let entry = RunEntry {
            id: Uuid::new_v4(),
            job,
            week_start,
            scope: scope.to_string(),
            mode,
            status: RunStatus::Running,
            started_at: now,
            updated_at: now,
        };
        let value = serde_json::to_vec(&entry)?;

        // Check and insert inside one write transaction.
        let wt = self.db.begin_write().map_err(db_err)?;
        {
            let mut table = wt.open_table(RUNS).map_err(db_err)?;
            if mode == RunMode::Live {
                for row in table.iter().map_err(db_err)? {
                    let (_, v) = row.map_err(db_err)?;
                    let existing: RunEntry = serde_json::from_slice(v.value())?;
                    if existing.conflicts_with(job, week_start, scope, cutoff) {
                        return Err(CoffeeError::RunInProgress {
                            job: job.to_string(),
                            week: week_start.to_string(),
                            scope: scope.to_string(),
                            run_id: existing.id.to_string(),
                        });
                    }
                }
            }
            let key = run_key(entry.started_at, entry.id);
            table
                .insert(key.as_slice(), value.as_slice())
                .map_err(db_err)?;
        }
        wt.commit().map_err(db_err)?;
        Ok(entry)
    }

    /// Replace the status of run `id`.
    pub fn finish(&self, id: Uuid, status: RunStatus) -> Result<()> {
        let mut entry = self
            .list_all()?
            .into_iter()
            .find(|e| e.id == id)
            .ok_or_else(|| CoffeeError::Journal(format!("run not found: {id}")))?;
        entry.status = status;
        entry.updated_at = Utc::now();
        self.put(&entry)
    }

    fn put(&self, entry: &RunEntry) -> Result<()> {
        let key = run_key(entry.started_at, entry.id);
        let value = serde_json::to_vec(entry)?;
        let wt = self.db.begin_write().map_err(db_err)?;
        {
            let mut table = wt.open_table(RUNS).map_err(db_err)?;
            table
                .insert(key.as_slice(), value.as_slice())
                .map_err(db_err)?;
        }
        wt.commit().map_err(db_err)?;
        Ok(())
    }

    /// Mark every `Running` entry older than the stale threshold as `Failed`.
    /// Returns the number of runs recovered.
    pub fn startup_recovery(&self) -> Result<u32> {
        let cutoff = self.cutoff()?;
        let mut count = 0u32;
        for entry in self.list_all()? {
            if entry.status == RunStatus::Running && entry.updated_at < cutoff {
                self.finish(
                    entry.id,
                    RunStatus::Failed {
                        reason: "interrupted: no completion was recorded".into(),
                    },
                )?;
                count += 1;
            }
        }
        Ok(count)
    }

    /// All runs, newest first.
    pub fn list_all(&self) -> Result<Vec<RunEntry>> {
        let rt = self.db.begin_read().map_err(db_err)?;
        let table = rt.open_table(RUNS).map_err(db_err)?;
        let mut out = Vec::new();
        for row in table.iter().map_err(db_err)? {
            let (_, v) = row.map_err(db_err)?;
            out.push(serde_json::from_slice::<RunEntry>(v.value())?);
        }
        out.reverse();
        Ok(out)
    }
}
