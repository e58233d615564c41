use async_trait::async_trait;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::{InsertOutcome, Store, StoreError};
use crate::models::{ObservationDocument, ObservationKey, RawPayload};

/// Process-local store with the same uniqueness rules as the database.
/// Backs `run --dry-run`.
#[derive(Default)]
pub struct MemoryStore {
    raw: Mutex<Vec<RawPayload>>,
    observations: Mutex<HashMap<ObservationKey, ObservationDocument>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raw_payloads(&self) -> Vec<RawPayload> {
        lock(&self.raw).clone()
    }

    /// Stored observations ordered by key.
    pub fn observations(&self) -> Vec<ObservationDocument> {
        let guard = lock(&self.observations);
        let mut docs: Vec<_> = guard.values().cloned().collect();
        docs.sort_by_key(ObservationDocument::key);
        docs
    }

    pub fn observation_count(&self) -> usize {
        lock(&self.observations).len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn save_raw_payload(&self, raw: &RawPayload) -> Result<(), StoreError> {
        lock(&self.raw).push(raw.clone());
        Ok(())
    }

    async fn insert_observation(
        &self,
        doc: &ObservationDocument,
    ) -> Result<InsertOutcome, StoreError> {
        if doc.city.is_empty() || doc.timestamp.is_empty() || doc.pollutant.is_empty() {
            return Err(StoreError::Rejected(format!(
                "empty key component in ({:?}, {:?}, {:?})",
                doc.city, doc.timestamp, doc.pollutant
            )));
        }

        // Check and insert happen under one lock.
        match lock(&self.observations).entry(doc.key()) {
            Entry::Occupied(_) => Ok(InsertOutcome::Duplicate),
            Entry::Vacant(slot) => {
                slot.insert(doc.clone());
                Ok(InsertOutcome::Inserted)
            }
        }
    }
}
