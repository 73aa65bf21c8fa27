//! Weekly multi-pool matching: every active community, then the global pool.
//!
//! Pools are independent. A community below its activity threshold, or with
//! fewer than two candidates left to pair, is skipped. A community whose run
//! fails is reported in `errors`. Neither stops the remaining pools. Only
//! failing to list the communities aborts the run.

use crate::context::JobContext;
use crate::eligibility;
use crate::error::Result;
use crate::matching::{self, PoolOutcome};
use crate::pool::{self, Community, Pool};
use chrono::NaiveDate;
use rand::RngCore;
use serde::Serialize;
use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum PoolResult {
    Skipped { opt_ins: usize, min_active: u32 },
    Matched(PoolOutcome),
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolReport {
    pub pool: Pool,
    pub result: PoolResult,
}

impl PoolResult {
    /// Ran and produced at least one pair.
    pub fn paired(&self) -> bool {
        matches!(self, PoolResult::Matched(o) if !o.insufficient)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolError {
    pub pool: Pool,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub week_start: NaiveDate,
    pub communities_processed: usize,
    /// Communities that produced at least one pair.
    pub communities_matched: usize,
    /// Below threshold, or too few candidates to pair.
    pub communities_skipped: usize,
    pub communities_failed: usize,
    /// The global pool produced at least one pair.
    pub global_matched: bool,
    /// One entry per failed pool, global included.
    pub errors: Vec<PoolError>,
    /// Community pools in store order, followed by the global pool.
    pub pools: Vec<PoolReport>,
}

impl RunReport {
    pub fn global(&self) -> Option<&PoolReport> {
        self.pools.iter().find(|p| p.pool.is_global())
    }

    pub fn total_pairs(&self) -> usize {
        self.pools
            .iter()
            .map(|p| match &p.result {
                PoolResult::Matched(o) => o.pairs.len(),
                _ => 0,
            })
            .sum()
    }

    /// True when no pool failed.
    pub fn succeeded(&self) -> bool {
        self.errors.is_empty()
    }

    fn record(&mut self, pool: Pool, result: PoolResult) {
        if let PoolResult::Failed { error } = &result {
            self.errors.push(PoolError {
                pool: pool.clone(),
                error: error.clone(),
            });
        }
        self.pools.push(PoolReport { pool, result });
    }

    fn summary(&self) -> String {
        let mut lines = vec![format!(
            "☕ Matching for week {}: {} pairs. Communities: {} processed, {} matched, {} skipped, {} failed.",
            self.week_start,
            self.total_pairs(),
            self.communities_processed,
            self.communities_matched,
            self.communities_skipped,
            self.communities_failed,
        )];
        for e in &self.errors {
            lines.push(format!("• {}: {}", e.pool, e.error));
        }
        lines.join("\n")
    }
}

pub fn run_all(ctx: &JobContext<'_>, rng: &mut dyn RngCore) -> Result<RunReport> {
    let communities = pool::fetch_active(ctx.store, &ctx.tables.communities)?;
    info!(week = %ctx.week_start, communities = communities.len(), "starting weekly matching");

    let mut report = RunReport {
        week_start: ctx.week_start,
        communities_processed: 0,
        communities_matched: 0,
        communities_skipped: 0,
        communities_failed: 0,
        global_matched: false,
        errors: Vec::new(),
        pools: Vec::with_capacity(communities.len() + 1),
    };

    for (n, community) in communities.iter().enumerate() {
        if n > 0 {
            pause(ctx);
        }
        let result = run_community(ctx, community, rng);
        report.communities_processed += 1;
        match &result {
            PoolResult::Failed { .. } => report.communities_failed += 1,
            r if r.paired() => report.communities_matched += 1,
            _ => report.communities_skipped += 1,
        }
        report.record(community.pool(), result);
    }

    if !communities.is_empty() {
        pause(ctx);
    }
    let global = match matching::run_pool(ctx, &Pool::Global, rng) {
        Ok(outcome) => PoolResult::Matched(outcome),
        Err(e) => {
            error!(error = %e, "global matching failed");
            ctx.notify_admin(&format!("⚠️ Global matching failed: {e}"));
            PoolResult::Failed {
                error: e.to_string(),
            }
        }
    };
    report.global_matched = global.paired();
    report.record(Pool::Global, global);

    info!(
        pairs = report.total_pairs(),
        matched = report.communities_matched,
        skipped = report.communities_skipped,
        failed = report.communities_failed,
        "weekly matching finished"
    );
    ctx.notify_admin(&report.summary());
    Ok(report)
}

fn run_community(ctx: &JobContext<'_>, community: &Community, rng: &mut dyn RngCore) -> PoolResult {
    match try_community(ctx, community, rng) {
        Ok(result) => result,
        Err(e) => {
            warn!(pool = %community.pool(), error = %e, "community matching failed");
            ctx.notify_admin(&format!("⚠️ Matching failed for {}: {e}", community.name));
            PoolResult::Failed {
                error: e.to_string(),
            }
        }
    }
}

fn try_community(
    ctx: &JobContext<'_>,
    community: &Community,
    rng: &mut dyn RngCore,
) -> Result<PoolResult> {
    let pool = community.pool();
    let opt_ins = eligibility::count_opt_ins(ctx.store, &ctx.tables, &pool)?;
    if opt_ins < community.min_active as usize {
        info!(%pool, opt_ins, min_active = community.min_active, "below activity threshold");
        ctx.notify_admin(&format!(
            "ℹ️ {} skipped this week: {} opted in, {} needed.",
            community.name, opt_ins, community.min_active
        ));
        return Ok(PoolResult::Skipped {
            opt_ins,
            min_active: community.min_active,
        });
    }
    Ok(PoolResult::Matched(matching::run_pool(ctx, &pool, rng)?))
}

fn pause(ctx: &JobContext<'_>) {
    if !ctx.pacing.pool_pause.is_zero() {
        std::thread::sleep(ctx.pacing.pool_pause);
    }
}
