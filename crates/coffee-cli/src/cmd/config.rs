use crate::output::print_json;
use crate::runtime::load_config;
use crate::Globals;
use clap::Subcommand;
use coffee_core::config::WarnLevel;

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Validate the config for common mistakes
    Validate,

    /// Print the effective config, defaults included
    Show,
}

pub fn run(g: &Globals, subcmd: ConfigSubcommand) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Validate => validate(g),
        ConfigSubcommand::Show => show(g),
    }
}

fn validate(g: &Globals) -> anyhow::Result<()> {
    let config = load_config(g)?;
    let warnings = config.validate();

    if g.json {
        let value = serde_json::json!({
            "warnings": warnings,
        });
        print_json(&value)?;
    } else if warnings.is_empty() {
        println!("Config is valid. No warnings.");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    if warnings.iter().any(|w| w.level == WarnLevel::Error) {
        anyhow::bail!("config validation found errors");
    }
    Ok(())
}

fn show(g: &Globals) -> anyhow::Result<()> {
    let config = load_config(g)?;
    if g.json {
        return print_json(&config);
    }
    print!("{}", serde_yaml::to_string(&config)?);
    Ok(())
}
