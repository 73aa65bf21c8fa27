use super::{mode_note, rng, tally_line};
use crate::output::{or_dash, print_json, print_table};
use crate::runtime::{self, Runtime};
use crate::Globals;
use coffee_core::matching::{self, PoolOutcome};
use coffee_core::pool::Pool;
use coffee_core::types::{JobKind, RunMode};

pub fn run(g: &Globals, community: Option<&str>, seed: Option<u64>) -> anyhow::Result<()> {
    let pool = runtime::scope(community)?.unwrap_or(Pool::Global);
    let rt = Runtime::build(g)?;
    let mut rng = rng(seed);
    let outcome = rt.run_job(JobKind::Match, &pool.context(), |ctx| {
        matching::run_pool(ctx, &pool, &mut rng)
    })?;

    if g.json {
        print_json(&outcome)?;
    } else {
        print_outcome(&outcome, rt.mode);
    }
    Ok(())
}

pub fn print_outcome(outcome: &PoolOutcome, mode: RunMode) {
    println!(
        "{}: week of {}{}",
        outcome.pool,
        outcome.week_start,
        mode_note(mode)
    );
    println!(
        "candidates: {}, already matched this week: {}",
        outcome.candidates, outcome.already_matched
    );
    if outcome.insufficient {
        println!("not enough candidates to pair");
        return;
    }
    let rows = outcome
        .pairs
        .iter()
        .map(|p| {
            vec![
                or_dash(p.pairing_id.as_deref()),
                p.participant_1.clone(),
                p.participant_2.clone(),
            ]
        })
        .collect();
    print_table(&["PAIRING", "PARTICIPANT 1", "PARTICIPANT 2"], rows);
    if let Some(left) = &outcome.leftover {
        println!("leftover: {left}");
    }
    if outcome.pair_write_failures > 0 || outcome.status_update_failures > 0 {
        println!(
            "write failures: {} pairings, {} status updates",
            outcome.pair_write_failures, outcome.status_update_failures
        );
    }
    println!("{}", tally_line(&outcome.notifications));
}
