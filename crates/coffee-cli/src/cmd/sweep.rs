use super::mode_note;
use crate::output::{or_dash, print_json, print_table};
use crate::runtime::{self, Runtime};
use crate::Globals;
use coffee_core::engagement::sweep;
use coffee_core::types::JobKind;

pub fn run(g: &Globals, community: Option<&str>) -> anyhow::Result<()> {
    let scope = runtime::scope(community)?;
    let rt = Runtime::build(g)?;
    let mut people = Vec::new();
    let report = rt.run_job(JobKind::Sweep, &runtime::scope_label(scope.as_ref()), |ctx| {
        let report = sweep::run(ctx, scope.as_ref())?;
        if !g.json {
            people = sweep::describe(ctx, &report)?;
        }
        Ok(report)
    })?;

    if g.json {
        return print_json(&report);
    }
    println!(
        "Activation sweep of week {}{}",
        report.swept_week,
        mode_note(rt.mode)
    );
    let rows = people
        .iter()
        .map(|p| {
            let outcome = if report.non_responders.contains(&p.id) {
                "passive (no feedback)"
            } else if report.reactivated {
                "active (engaged)"
            } else {
                "unchanged (engaged)"
            };
            vec![
                p.id.clone(),
                or_dash(p.name.as_deref()),
                p.pool.to_string(),
                outcome.to_string(),
            ]
        })
        .collect();
    print_table(&["PARTICIPANT", "NAME", "POOL", "NEXT WEEK"], rows);
    println!(
        "pairings: {}, engaged: {}, non-responders: {}, already swept: {}, deferred by limit: {}",
        report.pairings,
        report.engaged.len(),
        report.non_responders.len(),
        report.already_swept,
        report.deferred
    );
    println!("updated: {}, failed: {}", report.updated, report.update_failures);
    Ok(())
}
