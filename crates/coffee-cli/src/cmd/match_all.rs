use super::{matching::print_outcome, mode_note, rng};
use crate::output::{print_json, print_table};
use crate::runtime::Runtime;
use crate::Globals;
use coffee_core::journal::ALL_SCOPE;
use coffee_core::orchestrator::{self, PoolResult, RunReport};
use coffee_core::types::JobKind;
use coffee_core::CoffeeError;

fn run_failure(report: &RunReport) -> Option<CoffeeError> {
    if report.succeeded() {
        return None;
    }
    let pools: Vec<String> = report.errors.iter().map(|e| e.pool.to_string()).collect();
    Some(CoffeeError::RunFailed {
        pools: pools.join(", "),
    })
}

pub fn run(g: &Globals, seed: Option<u64>) -> anyhow::Result<()> {
    let rt = Runtime::build(g)?;
    let mut rng = rng(seed);
    let report = rt.run_job_checked(
        JobKind::MatchAll,
        ALL_SCOPE,
        |ctx| orchestrator::run_all(ctx, &mut rng),
        |report| run_failure(report).map(|e| e.to_string()),
    )?;

    if g.json {
        print_json(&report)?;
    } else {
        println!("Weekly matching: week of {}{}", report.week_start, mode_note(rt.mode));
        let rows = report
            .pools
            .iter()
            .map(|p| {
                let (result, detail) = match &p.result {
                    PoolResult::Skipped {
                        opt_ins,
                        min_active,
                    } => ("skipped", format!("{opt_ins} opted in, {min_active} needed")),
                    PoolResult::Matched(o) if o.insufficient => {
                        ("skipped", format!("{} candidates, nothing to pair", o.candidates))
                    }
                    PoolResult::Matched(o) => ("matched", format!("{} pairs", o.pairs.len())),
                    PoolResult::Failed { error } => ("failed", error.clone()),
                };
                vec![p.pool.to_string(), result.to_string(), detail]
            })
            .collect();
        print_table(&["POOL", "RESULT", "DETAIL"], rows);
        println!(
            "communities: {} processed, {} matched, {} skipped, {} failed; {} pairs total",
            report.communities_processed,
            report.communities_matched,
            report.communities_skipped,
            report.communities_failed,
            report.total_pairs()
        );
        if let Some(PoolResult::Matched(global)) = report.global().map(|p| &p.result) {
            println!();
            print_outcome(global, rt.mode);
        }
    }

    match run_failure(&report) {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}
