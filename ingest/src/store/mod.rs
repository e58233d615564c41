//! Persistence of raw payloads and observations.
//!
//! Raw payloads form an append-only audit log. Observations are unique on
//! (city, timestamp, pollutant): the backend enforces it at insert time and
//! reports a conflicting insert as [`InsertOutcome::Duplicate`], which is
//! counted as a skip rather than an error.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use std::ops::{Add, AddAssign};
use thiserror::Error;

use crate::models::{NormalizedRecord, ObservationDocument, RawPayload};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to acquire a store connection: {0}")]
    Pool(#[from] bb8::RunError<tokio_postgres::Error>),

    #[error("Store query failed: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("Failed to apply schema migrations: {0}")]
    Migration(#[from] refinery::Error),

    #[error("Store rejected document: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A document with the same key already exists; nothing was written.
    Duplicate,
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn save_raw_payload(&self, raw: &RawPayload) -> Result<(), StoreError>;

    async fn insert_observation(
        &self,
        doc: &ObservationDocument,
    ) -> Result<InsertOutcome, StoreError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveStats {
    pub inserted: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl SaveStats {
    pub fn total(&self) -> usize {
        self.inserted + self.skipped + self.failed
    }
}

impl Add for SaveStats {
    type Output = SaveStats;

    fn add(self, rhs: SaveStats) -> SaveStats {
        SaveStats {
            inserted: self.inserted + rhs.inserted,
            skipped: self.skipped + rhs.skipped,
            failed: self.failed + rhs.failed,
        }
    }
}

impl AddAssign for SaveStats {
    fn add_assign(&mut self, rhs: SaveStats) {
        *self = *self + rhs;
    }
}

/// One document per pollutant of `record`, sharing its metadata.
pub fn explode(city: &str, record: &NormalizedRecord) -> Vec<ObservationDocument> {
    record
        .pollutants
        .iter()
        .map(|(pollutant, value)| ObservationDocument {
            city: city.to_string(),
            timestamp: record.timestamp.clone(),
            pollutant: pollutant.clone(),
            value: *value,
            latitude: record.latitude,
            longitude: record.longitude,
            elevation: record.elevation,
            source: record.source.clone(),
        })
        .collect()
}

/// Insert every exploded observation individually. Duplicates are skipped,
/// other failures are logged and counted without stopping the batch.
pub async fn save_observations<S>(store: &S, city: &str, records: &[NormalizedRecord]) -> SaveStats
where
    S: Store + ?Sized,
{
    let mut stats = SaveStats::default();

    for record in records {
        for doc in explode(city, record) {
            match store.insert_observation(&doc).await {
                Ok(InsertOutcome::Inserted) => stats.inserted += 1,
                Ok(InsertOutcome::Duplicate) => stats.skipped += 1,
                Err(err) => {
                    log::error!(
                        "Failed to insert {} at {} for {}: {}",
                        doc.pollutant,
                        doc.timestamp,
                        city,
                        err
                    );
                    stats.failed += 1;
                }
            }
        }
    }

    log::info!(
        "Parsed data saved for {}: {} inserted, {} duplicates skipped, {} failed",
        city,
        stats.inserted,
        stats.skipped,
        stats.failed
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn record(timestamp: &str, pollutants: &[(&str, Option<f64>)]) -> NormalizedRecord {
        NormalizedRecord {
            city: "Nairobi".to_string(),
            timestamp: timestamp.to_string(),
            latitude: Some(-1.25),
            longitude: Some(36.75),
            elevation: Some(1671.0),
            source: "open-meteo".to_string(),
            pollutants: pollutants
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    #[test]
    fn test_explode_copies_metadata() {
        let docs = explode(
            "Nairobi",
            &record("2025-01-01T00:00:00", &[("pm2_5", Some(10.0)), ("ozone", None)]),
        );

        assert_eq!(docs.len(), 2);
        for doc in &docs {
            assert_eq!(doc.city, "Nairobi");
            assert_eq!(doc.timestamp, "2025-01-01T00:00:00");
            assert_eq!(doc.latitude, Some(-1.25));
            assert_eq!(doc.longitude, Some(36.75));
            assert_eq!(doc.elevation, Some(1671.0));
            assert_eq!(doc.source, "open-meteo");
        }
        let ozone = docs.iter().find(|d| d.pollutant == "ozone").unwrap();
        assert_eq!(ozone.value, None);
    }

    #[test]
    fn test_explode_without_pollutants() {
        assert!(explode("Nairobi", &record("2025-01-01T00:00:00", &[])).is_empty());
    }

    #[tokio::test]
    async fn test_save_observations_counts_duplicates_as_skipped() {
        let store = MemoryStore::new();
        let records = vec![
            record("2025-01-01T00:00:00", &[("pm2_5", Some(10.0)), ("ozone", Some(30.0))]),
            record("2025-01-01T01:00:00", &[("pm2_5", Some(12.5)), ("ozone", None)]),
        ];

        let first = save_observations(&store, "Nairobi", &records).await;
        assert_eq!(
            first,
            SaveStats {
                inserted: 4,
                skipped: 0,
                failed: 0
            }
        );

        let second = save_observations(&store, "Nairobi", &records).await;
        assert_eq!(
            second,
            SaveStats {
                inserted: 0,
                skipped: 4,
                failed: 0
            }
        );
        assert_eq!(store.observation_count(), 4);
    }

    #[tokio::test]
    async fn test_first_write_wins() {
        let store = MemoryStore::new();
        save_observations(
            &store,
            "Nairobi",
            &[record("2025-01-01T00:00:00", &[("pm2_5", Some(10.0))])],
        )
        .await;
        let stats = save_observations(
            &store,
            "Nairobi",
            &[record("2025-01-01T00:00:00", &[("pm2_5", Some(99.0))])],
        )
        .await;

        assert_eq!(stats.skipped, 1);
        let stored = store.observations();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].value, Some(10.0));
    }

    #[tokio::test]
    async fn test_failures_do_not_abort_batch() {
        let store = MemoryStore::new();
        // An empty pollutant name violates the key constraint.
        let records = vec![record(
            "2025-01-01T00:00:00",
            &[("", Some(1.0)), ("pm10", Some(2.0)), ("pm2_5", Some(3.0))],
        )];

        let stats = save_observations(&store, "Nairobi", &records).await;
        assert_eq!(
            stats,
            SaveStats {
                inserted: 2,
                skipped: 0,
                failed: 1
            }
        );
        assert_eq!(store.observation_count(), 2);
    }

    #[test]
    fn test_save_stats_sum() {
        let total = [
            SaveStats {
                inserted: 3,
                skipped: 1,
                failed: 0,
            },
            SaveStats {
                inserted: 0,
                skipped: 4,
                failed: 2,
            },
        ]
        .into_iter()
        .fold(SaveStats::default(), |acc, s| acc + s);

        assert_eq!(total.inserted, 3);
        assert_eq!(total.skipped, 5);
        assert_eq!(total.failed, 2);
        assert_eq!(total.total(), 10);
    }
}
