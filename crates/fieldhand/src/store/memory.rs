// ABOUTME: In-process record store backed by a mutex-guarded Vec.
// ABOUTME: Used when embedding the engine without a backend, and as the test double for crawls.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use super::{CustomerRecord, RecordId, RecordStore, StoredRecord};
use crate::error::StoreError;

#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Vec<StoredRecord>>,
    rejected_phones: HashSet<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store with existing records.
    pub fn with_records(records: impl IntoIterator<Item = CustomerRecord>) -> Self {
        let store = Self::new();
        {
            let mut slot = store.lock();
            for record in records {
                let id = RecordId((slot.len() + 1).to_string());
                slot.push(StoredRecord {
                    id,
                    record,
                    created_at: Utc::now(),
                });
            }
        }
        store
    }

    /// Makes inserts with this phone fail, like a backend constraint would.
    pub fn reject_phone(mut self, phone: impl Into<String>) -> Self {
        self.rejected_phones.insert(phone.into());
        self
    }

    pub fn records(&self) -> Vec<CustomerRecord> {
        self.lock().iter().map(|s| s.record.clone()).collect()
    }

    pub fn stored(&self) -> Vec<StoredRecord> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<StoredRecord>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn check_duplicate(&self, phone: &str) -> Result<bool, StoreError> {
        Ok(self.lock().iter().any(|s| s.record.phone == phone))
    }

    async fn insert(&self, record: &CustomerRecord) -> Result<RecordId, StoreError> {
        if self.rejected_phones.contains(&record.phone) {
            return Err(StoreError::Rejected {
                status: 409,
                body: format!("phone {} rejected", record.phone),
            });
        }
        let mut records = self.lock();
        let id = RecordId((records.len() + 1).to_string());
        records.push(StoredRecord {
            id: id.clone(),
            record: record.clone(),
            created_at: Utc::now(),
        });
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_seeded_records_count_as_duplicates() {
        let store = MemoryStore::with_records([CustomerRecord {
            phone: "0555 123 45 67".to_string(),
            ..Default::default()
        }]);
        assert!(store.check_duplicate("0555 123 45 67").await.unwrap());
        // Exact string match only.
        assert!(!store.check_duplicate("05551234567").await.unwrap());
    }

    #[tokio::test]
    async fn test_ids_are_sequential() {
        let store = MemoryStore::new();
        let rec = CustomerRecord::default();
        assert_eq!(store.insert(&rec).await.unwrap(), RecordId("1".to_string()));
        assert_eq!(store.insert(&rec).await.unwrap(), RecordId("2".to_string()));
        assert_eq!(store.stored()[1].id.0, "2");
    }
}
