use crate::config::DEFAULT_CONFIG_FILE;
use crate::engine::DEFAULT_CONCURRENCY;
use crate::github::DEFAULT_API_URL;
use anyhow::Result;
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "teampulse")]
#[command(about = "Per-team weekly commit activity from GitHub")]
#[command(version)]
pub struct Cli {
    #[arg(short, long, action = ArgAction::Count, global = true, help = "Increase log verbosity (-v, -vv)")]
    pub verbose: u8,

    #[clap(flatten)]
    pub common: CommonArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Clone)]
pub struct CommonArgs {
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE, help = "Path to the team configuration file")]
    pub config: PathBuf,

    #[arg(long, global = true, env = "GITHUB_TOKEN", hide_env_values = true, help = "GitHub access token")]
    pub token: Option<String>,

    #[arg(long, global = true, env = "GITHUB_API_URL", default_value = DEFAULT_API_URL, help = "GitHub API base URL")]
    pub api_url: String,

    #[arg(long, global = true, help = "Window start (YYYY-MM-DD, RFC3339, or e.g. \"4 weeks ago\"); overrides --quarter")]
    pub since: Option<String>,

    #[arg(long, global = true, help = "Window end (YYYY-MM-DD, RFC3339, or e.g. \"1 day ago\"); overrides --quarter")]
    pub until: Option<String>,

    #[arg(long, global = true, help = "Calendar quarter, e.g. 2025Q1; overrides START_DATE/END_DATE and the config file")]
    pub quarter: Option<String>,

    #[arg(long, global = true, default_value_t = DEFAULT_CONCURRENCY, help = "Concurrent member/repository fetches")]
    pub concurrency: usize,

    #[arg(long, global = true, default_value_t = 4, help = "Attempts per request before a pair is skipped")]
    pub max_attempts: u32,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch, aggregate, and write the ledger and weekly CSV reports
    Report {
        #[arg(long, default_value = ".", help = "Directory for the CSV reports")]
        out_dir: PathBuf,

        #[arg(long, help = "Output as JSON")]
        json: bool,
    },
    /// Per-team weekly commit counts
    Weekly {
        #[arg(long, help = "Output as JSON")]
        json: bool,

        #[arg(long, help = "Output as NDJSON")]
        ndjson: bool,

        #[arg(long, help = "Only show this team")]
        team: Option<String>,
    },
    /// Commit ledger export
    Export {
        #[arg(long, help = "Output as JSON")]
        json: bool,

        #[arg(long, help = "Output as NDJSON")]
        ndjson: bool,
    },
    /// Classify a repository's branches by head commit age
    Branches {
        #[arg(help = "Repository as owner/name")]
        repository: String,

        #[arg(long, default_value_t = 100, help = "Number of branches to sample")]
        sample_size: u32,
    },
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Report { out_dir, json } => crate::report::exec(self.common, out_dir, json).await,
            Commands::Weekly { json, ndjson, team } => {
                crate::weekly::exec(self.common, json, ndjson, team).await
            }
            Commands::Export { json, ndjson } => crate::export::exec(self.common, json, ndjson).await,
            Commands::Branches {
                repository,
                sample_size,
            } => crate::branches::exec(self.common, repository, sample_size).await,
        }
    }
}
