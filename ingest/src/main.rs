use anyhow::Context;
use aqi_ingest::cities::CityRegistry;
use aqi_ingest::cli::{Cli, Command, DbSubCommand, RunArgs};
use aqi_ingest::config::{IngestConfig, StoreConfig};
use aqi_ingest::db;
use aqi_ingest::open_meteo::OpenMeteoClient;
use aqi_ingest::pipeline::Pipeline;
use aqi_ingest::retry::Retrying;
use aqi_ingest::store::{MemoryStore, PgStore, Store};
use clap::Parser;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Cli::parse();

    let result = match args.cmd {
        Command::Run(run_args) => run(run_args).await,
        Command::Db(db_cmd) => db_command(db_cmd.cmd).await.map(|_| ExitCode::SUCCESS),
        Command::Cities { cities_file } => print_cities(cities_file).map(|_| ExitCode::SUCCESS),
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            log::error!("{:#}", err);
            ExitCode::from(2)
        }
    }
}

async fn run(args: RunArgs) -> anyhow::Result<ExitCode> {
    let conf = IngestConfig::from_args(&args)?;
    let source = Retrying::new(
        OpenMeteoClient::new(conf.api_url.clone(), &conf.hourly_variables, conf.timeout)
            .context("Failed to create HTTP client")?,
        conf.retry.clone(),
    );

    if args.dry_run {
        log::info!("Dry run: observations are kept in memory only");
        return Ok(execute(source, MemoryStore::new(), conf).await);
    }

    let store_conf = StoreConfig::from_env()?;
    let store = PgStore::connect(&store_conf)
        .await
        .with_context(|| format!("Failed to connect to store at {}", store_conf.describe()))?;
    Ok(execute(source, store, conf).await)
}

async fn execute<S: Store>(
    source: Retrying<OpenMeteoClient>,
    store: S,
    conf: IngestConfig,
) -> ExitCode {
    let summary = Pipeline::new(source, store, conf.cities)
        .with_concurrency(conf.concurrency)
        .run()
        .await;

    if summary.is_success() {
        ExitCode::SUCCESS
    } else {
        log::error!("Failed cities: {}", summary.failed_cities.join(", "));
        ExitCode::FAILURE
    }
}

async fn db_command(cmd: DbSubCommand) -> anyhow::Result<()> {
    let conf = StoreConfig::from_env()?;
    let pool = db::pool(&conf)
        .await
        .with_context(|| format!("Failed to connect to store at {}", conf.describe()))?;

    match cmd {
        DbSubCommand::Migrate => db::migrate(&pool).await?,
        DbSubCommand::Reset => db::reset(&pool).await?,
    }
    Ok(())
}

fn print_cities(cities_file: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let registry = match cities_file {
        Some(path) => CityRegistry::from_file(&path)?,
        None => CityRegistry::default(),
    };
    println!("{}", serde_json::to_string_pretty(registry.cities())?);
    Ok(())
}
