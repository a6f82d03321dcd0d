//! CLI parser and dispatch.

mod config_cmd;
mod run;
mod stage;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};

use scorewatch::config::Config;
use scorewatch::pipeline::StageId;

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "scorewatch")]
#[command(about = "Football league, fixture and live event scraper")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

/// Check if JSON log output was requested (for early logging setup).
pub fn is_json_logging() -> bool {
    let args: Vec<String> = std::env::args().collect();
    args.iter().any(|arg| arg == "--log-format=json")
        || args
            .windows(2)
            .any(|pair| pair[0] == "--log-format" && pair[1] == "json")
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline until interrupted (Ctrl-C)
    Run {
        /// Skip the configured startup stages
        #[arg(long)]
        no_prime: bool,
    },

    /// Run one stage now and wait for it to finish
    Stage {
        /// Stage to run
        #[arg(value_enum)]
        stage: StageId,
        /// Also run downstream stages triggered by this one
        #[arg(short, long)]
        follow: bool,
        /// Only scrape leagues from this country (per-league stages)
        #[arg(long)]
        country: Option<String>,
    },

    /// Show the stage graph and schedules
    Stages,

    /// Print the effective configuration as TOML
    Config,
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref()).await?;

    match cli.command {
        Commands::Run { no_prime } => run::cmd_run(&config, !no_prime).await,
        Commands::Stage {
            stage,
            follow,
            country,
        } => stage::cmd_stage(&config, stage, follow, country).await,
        Commands::Stages => stage::cmd_stages(&config),
        Commands::Config => config_cmd::cmd_config_show(&config),
    }
}

async fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config = if let Some(path) = path {
        if !path.exists() {
            anyhow::bail!("Config file not found: {}", path.display());
        }
        Config::load_from_path(path)
            .await
            .with_context(|| format!("Failed to load config from {}", path.display()))?
    } else {
        Config::load().await
    };
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_command_parses_kebab_case_ids() {
        let cli = Cli::try_parse_from(["scorewatch", "stage", "team-stats", "--follow"]).unwrap();
        match cli.command {
            Commands::Stage { stage, follow, .. } => {
                assert_eq!(stage, StageId::TeamStats);
                assert!(follow);
            }
            _ => panic!("expected stage command"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["scorewatch", "run", "-v", "--log-format", "json"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.log_format, LogFormat::Json);
    }

    #[test]
    fn test_unknown_stage_rejected() {
        assert!(Cli::try_parse_from(["scorewatch", "stage", "players"]).is_err());
    }
}
