//! Open-Meteo air quality API client.
//!
//! One GET per city, requesting a fixed set of hourly variables; the decoded
//! JSON body is returned verbatim.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::cities::City;
use crate::models::RawPayload;

const USER_AGENT: &str = "AirQualityClient/1.0";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request for {city} failed: {source}")]
    Transport {
        city: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Request for {city} failed with status {status}")]
    HttpStatus {
        city: String,
        status: reqwest::StatusCode,
    },

    #[error("Response for {city} is not valid JSON: {source}")]
    Decode {
        city: String,
        #[source]
        source: reqwest::Error,
    },
}

impl FetchError {
    /// Whether trying again later could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Transport { .. } => true,
            FetchError::HttpStatus { status, .. } => {
                status.is_server_error() || *status == reqwest::StatusCode::TOO_MANY_REQUESTS
            }
            FetchError::Decode { .. } => false,
        }
    }
}

/// Anything that can produce the raw air quality payload for a city.
#[async_trait]
pub trait AirQualitySource: Send + Sync {
    async fn fetch(&self, city: &City) -> Result<RawPayload, FetchError>;
}

pub struct OpenMeteoClient {
    client: reqwest::Client,
    api_url: reqwest::Url,
    hourly: String,
}

impl OpenMeteoClient {
    pub fn new(
        api_url: reqwest::Url,
        hourly_variables: &[String],
        timeout: Duration,
    ) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            api_url,
            hourly: hourly_variables.join(","),
        })
    }

    fn query(&self, city: &City) -> [(&'static str, String); 3] {
        [
            ("latitude", city.latitude.to_string()),
            ("longitude", city.longitude.to_string()),
            ("hourly", self.hourly.clone()),
        ]
    }
}

#[async_trait]
impl AirQualitySource for OpenMeteoClient {
    async fn fetch(&self, city: &City) -> Result<RawPayload, FetchError> {
        log::info!("Fetching air quality data for {}", city.name);

        let response = self
            .client
            .get(self.api_url.clone())
            .query(&self.query(city))
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                city: city.name.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                city: city.name.clone(),
                status,
            });
        }

        let payload: Value = response.json().await.map_err(|source| {
            if source.is_decode() {
                FetchError::Decode {
                    city: city.name.clone(),
                    source,
                }
            } else {
                FetchError::Transport {
                    city: city.name.clone(),
                    source,
                }
            }
        })?;

        log::info!("Raw data fetched for {}", city.name);
        Ok(RawPayload::new(city.name.clone(), payload))
    }
}
