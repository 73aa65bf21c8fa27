use super::{mode_note, tally_line};
use crate::output::print_json;
use crate::runtime::{self, Runtime};
use crate::Globals;
use coffee_core::engagement::invite;
use coffee_core::types::JobKind;

pub fn run(g: &Globals, community: Option<&str>, resume: bool) -> anyhow::Result<()> {
    let scope = runtime::scope(community)?;
    let rt = Runtime::build(g)?;
    let report = rt.run_job(JobKind::Invite, &runtime::scope_label(scope.as_ref()), |ctx| {
        invite::run(ctx, scope.as_ref(), resume)
    })?;

    if g.json {
        return print_json(&report);
    }
    println!(
        "Weekly invitation: week of {}{}",
        report.week_start,
        mode_note(rt.mode)
    );
    if report.resumed {
        println!("resumed: already-invited participants skipped");
    } else {
        println!("sent flags cleared: {}", report.reset);
    }
    if report.reset_failures > 0 {
        println!("flag resets failed: {}", report.reset_failures);
    }
    println!("eligible: {}, deferred by limit: {}", report.eligible, report.deferred);
    println!("{}", tally_line(&report.notifications));
    if report.latch_failures > 0 {
        println!(
            "warning: {} participants could not be marked as invited",
            report.latch_failures
        );
    }
    Ok(())
}
