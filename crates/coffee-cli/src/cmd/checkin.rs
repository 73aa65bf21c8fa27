use super::{mode_note, tally_line};
use crate::output::print_json;
use crate::runtime::{self, Runtime};
use crate::Globals;
use coffee_core::engagement::{self, CheckinReport};
use coffee_core::types::JobKind;

pub fn midweek(g: &Globals, community: Option<&str>) -> anyhow::Result<()> {
    let scope = runtime::scope(community)?;
    let rt = Runtime::build(g)?;
    let report = rt.run_job(JobKind::Midweek, &runtime::scope_label(scope.as_ref()), |ctx| {
        engagement::midweek::run(ctx, scope.as_ref())
    })?;
    print(g, &rt, &report)
}

pub fn weekend(g: &Globals, community: Option<&str>) -> anyhow::Result<()> {
    let scope = runtime::scope(community)?;
    let rt = Runtime::build(g)?;
    let report = rt.run_job(JobKind::Weekend, &runtime::scope_label(scope.as_ref()), |ctx| {
        engagement::weekend::run(ctx, scope.as_ref())
    })?;
    print(g, &rt, &report)
}

fn print(g: &Globals, rt: &Runtime, report: &CheckinReport) -> anyhow::Result<()> {
    if g.json {
        return print_json(report);
    }
    println!(
        "{} check-in: week of {}{}",
        report.job,
        report.week_start,
        mode_note(rt.mode)
    );
    println!(
        "pairings pending: {}, prompted: {}, already complete: {}, deferred by limit: {}",
        report.pairings_found, report.pairings_prompted, report.already_complete, report.deferred
    );
    println!("{}", tally_line(&report.notifications));
    println!("latched: {}", report.latched);
    if report.latch_failures > 0 {
        println!("warning: {} pairings could not be latched", report.latch_failures);
    }
    Ok(())
}
