use crate::output::{print_json, print_table};
use crate::runtime::{load_config, open_journal};
use crate::Globals;
use coffee_core::journal::RunStatus;

pub fn run(g: &Globals, last: usize) -> anyhow::Result<()> {
    let config = load_config(g)?;
    let journal = open_journal(&config)?;
    let mut runs = journal.list_all()?;
    runs.truncate(last);

    if g.json {
        return print_json(&runs);
    }
    if runs.is_empty() {
        println!("No runs recorded.");
        return Ok(());
    }
    let rows = runs
        .iter()
        .map(|r| {
            let detail = match &r.status {
                RunStatus::Failed { reason } => reason.clone(),
                _ => String::new(),
            };
            vec![
                r.id.to_string()[..8].to_string(),
                r.job.to_string(),
                r.week_start.to_string(),
                r.scope.clone(),
                r.mode.as_str().to_string(),
                r.status.label().to_string(),
                r.started_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                detail,
            ]
        })
        .collect();
    print_table(
        &["RUN", "JOB", "WEEK", "SCOPE", "MODE", "STATUS", "STARTED (UTC)", "DETAIL"],
        rows,
    );
    Ok(())
}
