use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;

/// Source tag written on every normalized record.
pub const SOURCE_OPEN_METEO: &str = "open-meteo";

/// API response for one city, kept verbatim for the audit log.
#[derive(Clone, Debug)]
pub struct RawPayload {
    pub city: String,
    pub fetched_at: DateTime<Utc>,
    pub payload: Value,
}

impl RawPayload {
    pub fn new(city: impl Into<String>, payload: Value) -> Self {
        Self {
            city: city.into(),
            fetched_at: Utc::now(),
            payload,
        }
    }
}

/// One hour of readings for one city. Pollutant keys are whatever the API
/// returned besides `time`.
#[derive(Clone, Debug, PartialEq)]
pub struct NormalizedRecord {
    pub city: String,
    pub timestamp: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub elevation: Option<f64>,
    pub source: String,
    pub pollutants: BTreeMap<String, Option<f64>>,
}

/// A single (city, timestamp, pollutant) reading as persisted.
#[derive(Clone, Debug, PartialEq)]
pub struct ObservationDocument {
    pub city: String,
    pub timestamp: String,
    pub pollutant: String,
    pub value: Option<f64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub elevation: Option<f64>,
    pub source: String,
}

/// Deduplication key of an observation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObservationKey {
    pub city: String,
    pub timestamp: String,
    pub pollutant: String,
}

impl ObservationDocument {
    pub fn key(&self) -> ObservationKey {
        ObservationKey {
            city: self.city.clone(),
            timestamp: self.timestamp.clone(),
            pollutant: self.pollutant.clone(),
        }
    }
}
