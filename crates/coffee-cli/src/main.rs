mod cmd;
mod output;
mod runtime;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use cmd::config::ConfigSubcommand;
use coffee_core::types::RunMode;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "coffee",
    about = "Weekly coffee pairing cycle: match, invite, check in, sweep",
    version,
    propagate_version = true
)]
struct Cli {
    #[command(flatten)]
    globals: Globals,

    #[command(subcommand)]
    command: Commands,
}

/// Flags shared by every job.
#[derive(Args, Debug, Clone)]
pub struct Globals {
    /// Config file
    #[arg(long, global = true, env = "COFFEE_CONFIG", default_value = "coffee.yaml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    pub json: bool,

    /// Compute everything, write and send nothing; audit entries are marked Dry-Run
    #[arg(long, global = true, conflicts_with = "test")]
    pub dry_run: bool,

    /// Send every message to the admin instead of participants; no participant or pairing writes
    #[arg(long, global = true)]
    pub test: bool,

    /// Process the week containing this date (YYYY-MM-DD) instead of the current one
    #[arg(long, global = true, value_parser = parse_week)]
    pub week_start: Option<NaiveDate>,

    /// Cap on items processed by notification jobs
    #[arg(long, global = true, visible_alias = "max-notifications", value_name = "N")]
    pub limit: Option<usize>,
}

impl Globals {
    pub fn mode(&self) -> RunMode {
        if self.dry_run {
            RunMode::DryRun
        } else if self.test {
            RunMode::Test
        } else {
            RunMode::Live
        }
    }
}

fn parse_week(s: &str) -> Result<NaiveDate, String> {
    coffee_core::week::parse_week_start(s).map_err(|e| e.to_string())
}

#[derive(Subcommand)]
enum Commands {
    /// Pair one pool for the week
    Match {
        /// Community slug (omit for the global pool)
        #[arg(long)]
        community: Option<String>,
        /// Seed the shuffle for a reproducible rehearsal
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Pair every active community, then the global pool
    MatchAll {
        /// Seed the shuffle for a reproducible rehearsal
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Send the weekly participation invitation
    Invite {
        /// Only participants of this community
        #[arg(long)]
        community: Option<String>,
        /// Continue an interrupted run: keep this week's sent flags
        #[arg(long)]
        resume: bool,
    },

    /// Mid-week "have you connected?" check-in
    Midweek {
        #[arg(long)]
        community: Option<String>,
    },

    /// Weekend feedback request to sides that have not reported
    Weekend {
        #[arg(long)]
        community: Option<String>,
    },

    /// Reclassify last week's participants as Active/Passive
    Sweep {
        #[arg(long)]
        community: Option<String>,
    },

    /// List recorded job runs
    Runs {
        /// Show the N most recent runs
        #[arg(long, default_value = "20", value_name = "N")]
        last: usize,
    },

    /// Inspect and validate the config file
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Runs { .. } | Commands::Config { .. } => tracing::Level::WARN,
        _ => tracing::Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let g = &cli.globals;
    let result = match cli.command {
        Commands::Match { community, seed } => cmd::matching::run(g, community.as_deref(), seed),
        Commands::MatchAll { seed } => cmd::match_all::run(g, seed),
        Commands::Invite { community, resume } => cmd::invite::run(g, community.as_deref(), resume),
        Commands::Midweek { community } => cmd::checkin::midweek(g, community.as_deref()),
        Commands::Weekend { community } => cmd::checkin::weekend(g, community.as_deref()),
        Commands::Sweep { community } => cmd::sweep::run(g, community.as_deref()),
        Commands::Runs { last } => cmd::runs::run(g, last),
        Commands::Config { subcommand } => cmd::config::run(g, subcommand),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
