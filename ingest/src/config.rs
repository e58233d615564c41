use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::cities::CityRegistry;
use crate::cli::RunArgs;
use crate::retry::RetryConfig;

pub const DEFAULT_API_URL: &str = "https://air-quality-api.open-meteo.com/v1/air-quality";

/// Hourly variables requested from the API unless overridden.
pub const DEFAULT_HOURLY_VARIABLES: [&str; 6] = [
    "pm2_5",
    "pm10",
    "ozone",
    "carbon_monoxide",
    "nitrogen_dioxide",
    "sulphur_dioxide",
];

const STORE_ENV_PREFIX: &str = "AIRQ_STORE_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing store setting '{0}'. Required env vars: AIRQ_STORE_USER, AIRQ_STORE_PASSWORD")]
    MissingStoreSetting(String),

    #[error("Store setting '{0}' must not be empty")]
    EmptyStoreSetting(&'static str),

    #[error("Invalid store configuration: {0}")]
    Store(#[source] envy::Error),

    #[error("Failed to read cities file '{path}'")]
    CitiesFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse cities file '{path}': {source}")]
    CitiesParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid city '{name}': {reason}")]
    InvalidCity { name: String, reason: String },

    #[error("City '{0}' is configured more than once")]
    DuplicateCity(String),

    #[error("No cities configured")]
    NoCities,

    #[error("No hourly variables configured")]
    NoHourlyVariables,

    #[error("Invalid API URL '{0}'")]
    InvalidApiUrl(String),

    #[error("Concurrency must be at least 1")]
    InvalidConcurrency,

    #[error("HTTP timeout must be at least 1 second")]
    InvalidTimeout,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    5432
}

fn default_database() -> String {
    "air_quality".to_string()
}

fn default_pool_size() -> u32 {
    4
}

/// Connection settings for the observation store, read from `AIRQ_STORE_*`.
#[derive(Clone, Deserialize)]
pub struct StoreConfig {
    pub user: String,
    pub password: String,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

impl StoreConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_iter(std::env::vars())
    }

    /// Same as `from_env` over an explicit set of variables.
    pub fn from_iter<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let conf = envy::prefixed(STORE_ENV_PREFIX)
            .from_iter::<_, StoreConfig>(vars)
            .map_err(|e| match e {
                envy::Error::MissingValue(field) => {
                    ConfigError::MissingStoreSetting(field.to_string())
                }
                other => ConfigError::Store(other),
            })?;

        if conf.user.trim().is_empty() {
            return Err(ConfigError::EmptyStoreSetting("user"));
        }
        if conf.password.is_empty() {
            return Err(ConfigError::EmptyStoreSetting("password"));
        }
        Ok(conf)
    }

    pub fn pg_config(&self) -> tokio_postgres::Config {
        let mut pg = tokio_postgres::Config::new();
        pg.user(&self.user)
            .password(&self.password)
            .host(&self.host)
            .port(self.port)
            .dbname(&self.database)
            .application_name("aqi-ingest");
        pg
    }

    /// Location of the store, safe to log.
    pub fn describe(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.database)
    }
}

// Keeps the password out of debug output.
impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("user", &self.user)
            .field("password", &"***")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("pool_size", &self.pool_size)
            .finish()
    }
}

/// Everything a run needs besides the store, validated up front.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub api_url: reqwest::Url,
    pub hourly_variables: Vec<String>,
    pub cities: CityRegistry,
    pub timeout: Duration,
    pub retry: RetryConfig,
    pub concurrency: usize,
}

impl IngestConfig {
    pub fn from_args(args: &RunArgs) -> Result<Self, ConfigError> {
        let cities = match &args.cities_file {
            Some(path) => CityRegistry::from_file(path)?,
            None => CityRegistry::default(),
        };

        Ok(Self {
            api_url: parse_api_url(&args.api_url)?,
            hourly_variables: hourly_variables(&args.hourly_variables)?,
            cities,
            timeout: match args.timeout_secs {
                0 => return Err(ConfigError::InvalidTimeout),
                secs => Duration::from_secs(secs),
            },
            retry: RetryConfig {
                max_retries: args.retries,
                ..RetryConfig::default()
            },
            concurrency: match args.concurrency {
                0 => return Err(ConfigError::InvalidConcurrency),
                n => n,
            },
        })
    }
}

fn parse_api_url(raw: &str) -> Result<reqwest::Url, ConfigError> {
    let url = reqwest::Url::parse(raw).map_err(|_| ConfigError::InvalidApiUrl(raw.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        _ => Err(ConfigError::InvalidApiUrl(raw.to_string())),
    }
}

fn hourly_variables(requested: &[String]) -> Result<Vec<String>, ConfigError> {
    if requested.is_empty() {
        return Ok(DEFAULT_HOURLY_VARIABLES
            .iter()
            .map(|v| v.to_string())
            .collect());
    }

    let vars: Vec<String> = requested
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(String::from)
        .collect();

    if vars.is_empty() {
        return Err(ConfigError::NoHourlyVariables);
    }
    Ok(vars)
}
