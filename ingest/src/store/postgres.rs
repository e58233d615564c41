use async_trait::async_trait;

use super::{InsertOutcome, Store, StoreError};
use crate::config::StoreConfig;
use crate::db;
use crate::models::{ObservationDocument, RawPayload};
use crate::repos;

/// Postgres-backed store. Raw payloads go to `air_quality_raw` as JSONB,
/// observations to `air_quality_parsed` under a unique key index.
pub struct PgStore {
    pool: db::Pool,
}

impl PgStore {
    /// Connect and make sure the collections and indexes exist.
    pub async fn connect(conf: &StoreConfig) -> Result<Self, StoreError> {
        log::info!("Connecting to store at {}", conf.describe());
        let pool = db::pool(conf).await?;
        db::migrate(&pool).await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl Store for PgStore {
    async fn save_raw_payload(&self, raw: &RawPayload) -> Result<(), StoreError> {
        let client = self.pool.get().await?;
        repos::raw_payloads::create(&client, raw).await?;
        log::info!("Raw payload saved for {}", raw.city);
        Ok(())
    }

    async fn insert_observation(
        &self,
        doc: &ObservationDocument,
    ) -> Result<InsertOutcome, StoreError> {
        let client = self.pool.get().await?;
        let outcome = if repos::observations::insert(&client, doc).await? {
            InsertOutcome::Inserted
        } else {
            InsertOutcome::Duplicate
        };
        Ok(outcome)
    }
}
