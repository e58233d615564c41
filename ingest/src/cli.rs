use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::DEFAULT_API_URL;

#[derive(Debug, Parser)]
#[command(about = "Air quality ingestion CLI.")]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch, normalize and store observations for every configured city, once.
    Run(RunArgs),
    Db(DbCommand),
    /// Print the validated city registry as JSON.
    Cities {
        #[arg(long, env = "AIRQ_CITIES_FILE")]
        cities_file: Option<PathBuf>,
    },
}

#[derive(Debug, Args)]
pub struct RunArgs {
    #[arg(long, env = "AIRQ_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,
    /// JSON array of {name, latitude, longitude}. Built-in cities when absent.
    #[arg(long, env = "AIRQ_CITIES_FILE")]
    pub cities_file: Option<PathBuf>,
    /// Comma-separated hourly variables (e.g. pm2_5,ozone)
    #[arg(long = "hourly", env = "AIRQ_HOURLY_VARIABLES", value_delimiter = ',')]
    pub hourly_variables: Vec<String>,
    #[arg(long, env = "AIRQ_HTTP_TIMEOUT_SECS", default_value_t = 30)]
    pub timeout_secs: u64,
    /// Extra attempts for transient fetch failures
    #[arg(long, env = "AIRQ_FETCH_RETRIES", default_value_t = 0)]
    pub retries: u32,
    /// Cities processed at the same time
    #[arg(long, env = "AIRQ_CONCURRENCY", default_value_t = 1)]
    pub concurrency: usize,
    /// Keep everything in memory instead of writing to the store
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Parser)]
pub struct DbCommand {
    #[command(subcommand)]
    pub cmd: DbSubCommand,
}

#[derive(Debug, Subcommand)]
pub enum DbSubCommand {
    Reset,
    Migrate,
}
