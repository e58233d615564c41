//! One ingestion pass over the city registry.
//!
//! Each city goes through fetch, normalize, raw save and observation save.
//! Any failure stays inside that city: it is logged, recorded in the
//! summary, and the run moves on.

use futures::StreamExt;
use std::fmt;
use thiserror::Error;

use crate::cities::{City, CityRegistry};
use crate::normalize::normalize;
use crate::open_meteo::{AirQualitySource, FetchError};
use crate::store::{save_observations, SaveStats, Store, StoreError};

#[derive(Debug, Error)]
pub enum CityError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Failed to save raw payload: {0}")]
    RawPayload(#[from] StoreError),
}

/// Outcome of one successfully processed city.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CityReport {
    pub records: usize,
    pub observations: SaveStats,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub cities_attempted: usize,
    pub failed_cities: Vec<String>,
    pub raw_payloads_stored: usize,
    pub records_normalized: usize,
    pub observations: SaveStats,
}

impl RunSummary {
    /// True when no city failed outright. Skipped duplicates and individual
    /// document failures do not count.
    pub fn is_success(&self) -> bool {
        self.failed_cities.is_empty()
    }

    fn record(&mut self, city: &str, result: Result<CityReport, CityError>) {
        self.cities_attempted += 1;
        match result {
            Ok(report) => {
                self.raw_payloads_stored += 1;
                self.records_normalized += report.records;
                self.observations += report.observations;
            }
            Err(_) => self.failed_cities.push(city.to_string()),
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} cities attempted ({} failed), {} raw payloads and {} records stored; \
             observations: {} inserted, {} skipped, {} failed",
            self.cities_attempted,
            self.failed_cities.len(),
            self.raw_payloads_stored,
            self.records_normalized,
            self.observations.inserted,
            self.observations.skipped,
            self.observations.failed
        )
    }
}

pub struct Pipeline<F, S> {
    source: F,
    store: S,
    registry: CityRegistry,
    concurrency: usize,
}

impl<F, S> Pipeline<F, S>
where
    F: AirQualitySource,
    S: Store,
{
    pub fn new(source: F, store: S, registry: CityRegistry) -> Self {
        Self {
            source,
            store,
            registry,
            concurrency: 1,
        }
    }

    /// Process up to `n` cities at once. Results are still reported in
    /// registry order.
    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn run(&self) -> RunSummary {
        log::info!(
            "Starting air quality ingestion for {} cities",
            self.registry.len()
        );

        let results: Vec<_> = futures::stream::iter(self.registry.cities())
            .map(|city| async move { (city, self.process_city(city).await) })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut summary = RunSummary::default();
        for (city, result) in results {
            if let Err(err) = &result {
                log::error!("Failed for {}: {}", city.name, err);
            }
            summary.record(&city.name, result);
        }

        log::info!("Pipeline completed: {}", summary);
        summary
    }

    async fn process_city(&self, city: &City) -> Result<CityReport, CityError> {
        log::info!("Processing city: {}", city.name);

        let raw = self.source.fetch(city).await?;
        let records = normalize(city, &raw);
        log::info!("Parsed {} records for {}", records.len(), city.name);

        self.store.save_raw_payload(&raw).await?;
        let observations = save_observations(&self.store, &city.name, &records).await;

        log::info!(
            "Done with {}: {} records, {} observations inserted",
            city.name,
            records.len(),
            observations.inserted
        );
        Ok(CityReport {
            records: records.len(),
            observations,
        })
    }
}
