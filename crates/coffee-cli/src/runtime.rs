//! Startup wiring shared by the job commands: config, clients, sink
//! selection and the run journal.

use crate::Globals;
use anyhow::{bail, Context};
use chrono::NaiveDate;
use coffee_core::audit::StoreAuditSink;
use coffee_core::config::Config;
use coffee_core::context::{JobContext, Pacing};
use coffee_core::gateway::{DisabledSink, MessageSink, RedirectSink, TelegramGateway};
use coffee_core::journal::{RunJournal, RunStatus, ALL_SCOPE};
use coffee_core::pool::Pool;
use coffee_core::store::AirtableStore;
use coffee_core::types::{JobKind, RunMode};
use coffee_core::week;
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

pub struct Runtime {
    pub config: Config,
    pub mode: RunMode,
    pub week_start: NaiveDate,
    pub limit: Option<usize>,
    store: AirtableStore,
    sink: Box<dyn MessageSink>,
}

pub fn load_config(g: &Globals) -> anyhow::Result<Config> {
    Config::load(&g.config).with_context(|| format!("failed to load {}", g.config.display()))
}

pub fn open_journal(config: &Config) -> anyhow::Result<RunJournal> {
    let stale_after = Duration::from_secs(config.journal.stale_after_minutes * 60);
    let journal = RunJournal::open(&config.journal.path, stale_after)
        .with_context(|| format!("failed to open run journal {}", config.journal.path.display()))?;
    let recovered = journal.startup_recovery()?;
    if recovered > 0 {
        warn!(recovered, "marked interrupted runs as failed");
    }
    Ok(journal)
}

/// `--community` flag to a pool.
pub fn scope(community: Option<&str>) -> anyhow::Result<Option<Pool>> {
    community
        .map(|slug| Pool::community(slug).context("invalid --community"))
        .transpose()
}

pub fn scope_label(scope: Option<&Pool>) -> String {
    scope.map(Pool::context).unwrap_or_else(|| ALL_SCOPE.to_string())
}

impl Runtime {
    pub fn build(g: &Globals) -> anyhow::Result<Self> {
        let config = load_config(g)?;
        let mode = g.mode();
        let store = AirtableStore::from_config(&config.store).context("record store setup")?;

        let sink: Box<dyn MessageSink> = match mode {
            RunMode::DryRun => Box::new(DisabledSink),
            RunMode::Live => Box::new(
                TelegramGateway::from_config(&config.gateway).context("messaging gateway setup")?,
            ),
            RunMode::Test => {
                let Some(admin) = config.admin_chat_id() else {
                    bail!("--test needs admin.chat_id in the config");
                };
                let gateway =
                    TelegramGateway::from_config(&config.gateway).context("messaging gateway setup")?;
                Box::new(RedirectSink::new(gateway, admin))
            }
        };

        Ok(Self {
            week_start: week::resolve(g.week_start),
            limit: g.limit,
            mode,
            store,
            sink,
            config,
        })
    }

    /// Run `job` inside a journal entry. The entry is completed with the
    /// serialized report, or failed with the error.
    pub fn run_job<T, F>(&self, job: JobKind, scope: &str, f: F) -> anyhow::Result<T>
    where
        T: Serialize,
        F: FnOnce(&JobContext<'_>) -> coffee_core::Result<T>,
    {
        self.run_job_checked(job, scope, f, |_| None)
    }

    /// Like [`Runtime::run_job`], but a report for which `failure` returns a
    /// reason is journaled as failed.
    pub fn run_job_checked<T, F, C>(
        &self,
        job: JobKind,
        scope: &str,
        f: F,
        failure: C,
    ) -> anyhow::Result<T>
    where
        T: Serialize,
        F: FnOnce(&JobContext<'_>) -> coffee_core::Result<T>,
        C: FnOnce(&T) -> Option<String>,
    {
        let journal = open_journal(&self.config)?;
        let entry = journal.begin(job, self.week_start, scope, self.mode)?;
        info!(%job, week = %self.week_start, scope, mode = self.mode.as_str(), run = %entry.id, "run started");

        let audit = StoreAuditSink::new(&self.store, &self.config.store.tables.notification_logs);
        let ctx = JobContext {
            store: &self.store,
            sink: self.sink.as_ref(),
            audit: &audit,
            tables: self.config.store.tables.clone(),
            policy: self.config.policy.clone(),
            pacing: Pacing::from_config(&self.config),
            mode: self.mode,
            week_start: self.week_start,
            limit: self.limit,
            admin_chat_id: self.config.admin_chat_id().map(String::from),
        };

        let result = f(&ctx);
        let status = match &result {
            Ok(report) => match failure(report) {
                Some(reason) => RunStatus::Failed { reason },
                None => RunStatus::Completed {
                    summary: serde_json::to_value(report).unwrap_or_default(),
                },
            },
            Err(e) => RunStatus::Failed {
                reason: e.to_string(),
            },
        };
        if let Err(e) = journal.finish(entry.id, status) {
            warn!(run = %entry.id, error = %e, "could not record run completion");
        }
        if let Err(e) = &result {
            ctx.notify_admin(&format!("⚠️ {job} for week {} failed: {e}", self.week_start));
        }
        result.with_context(|| format!("{job} failed"))
    }
}
