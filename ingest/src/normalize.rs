//! Flattens the hourly time-series of an API response into one record per
//! timestamp.
//!
//! The `hourly` object holds a `time` array and one array per pollutant,
//! aligned by index. Series shorter than `time` are padded with nulls; a
//! missing `hourly` section or `time` array yields no records.

use chrono::NaiveDateTime;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::cities::City;
use crate::models::{NormalizedRecord, RawPayload, SOURCE_OPEN_METEO};

const TIME_KEY: &str = "time";

const TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S"];
const CANONICAL_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub fn normalize(city: &City, raw: &RawPayload) -> Vec<NormalizedRecord> {
    let payload = &raw.payload;

    let Some(hourly) = payload.get("hourly").and_then(Value::as_object) else {
        log::warn!("No hourly section in payload for {}", city.name);
        return Vec::new();
    };
    let Some(times) = hourly.get(TIME_KEY).and_then(Value::as_array) else {
        log::warn!("No hourly time series in payload for {}", city.name);
        return Vec::new();
    };

    let series = pollutant_series(hourly);
    let latitude = payload.get("latitude").and_then(Value::as_f64);
    let longitude = payload.get("longitude").and_then(Value::as_f64);
    let elevation = payload.get("elevation").and_then(Value::as_f64);

    let mut records = Vec::with_capacity(times.len());
    for (i, time) in times.iter().enumerate() {
        let Some(time) = time.as_str() else {
            log::warn!("Skipping non-string timestamp {} for {}", time, city.name);
            continue;
        };

        let pollutants = series
            .iter()
            .map(|(name, values)| {
                let value = values.get(i).and_then(Value::as_f64);
                (name.to_string(), value)
            })
            .collect();

        records.push(NormalizedRecord {
            city: city.name.clone(),
            timestamp: canonical_timestamp(time),
            latitude,
            longitude,
            elevation,
            source: SOURCE_OPEN_METEO.to_string(),
            pollutants,
        });
    }

    records
}

/// Every non-`time` key of the hourly section. Non-array values count as an
/// empty series.
fn pollutant_series(hourly: &Map<String, Value>) -> BTreeMap<&str, &[Value]> {
    hourly
        .iter()
        .filter(|(key, _)| key.as_str() != TIME_KEY)
        .map(|(key, value)| {
            let values = value.as_array().map(Vec::as_slice).unwrap_or(&[]);
            (key.as_str(), values)
        })
        .collect()
}

/// `2025-01-01T00:00` and `2025-01-01T00:00:00` both become the latter, so
/// the dedup key does not depend on the precision the API chose.
fn canonical_timestamp(raw: &str) -> String {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|ts| ts.format(CANONICAL_FORMAT).to_string())
        .unwrap_or_else(|| raw.to_string())
}
