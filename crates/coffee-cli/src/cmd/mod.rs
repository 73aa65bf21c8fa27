pub mod checkin;
pub mod config;
pub mod invite;
pub mod match_all;
pub mod matching;
pub mod runs;
pub mod sweep;

use coffee_core::dispatch::DispatchTally;
use coffee_core::types::RunMode;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Seeded when `--seed` is given, otherwise from OS entropy.
pub fn rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    }
}

pub fn mode_note(mode: RunMode) -> &'static str {
    match mode {
        RunMode::Live => "",
        RunMode::DryRun => " (dry run: nothing written or sent)",
        RunMode::Test => " (test mode: messages redirected to admin, no writes)",
    }
}

pub fn tally_line(t: &DispatchTally) -> String {
    let mut line = format!("notifications: {} sent, {} failed", t.sent, t.failed);
    if t.dry_run > 0 {
        line.push_str(&format!(", {} dry-run", t.dry_run));
    }
    if t.audit_failures > 0 {
        line.push_str(&format!(" ({} audit writes failed)", t.audit_failures));
    }
    line
}
