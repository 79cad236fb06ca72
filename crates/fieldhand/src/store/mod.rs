// ABOUTME: The record store seam: duplicate check by phone, then insert.
// ABOUTME: Defines CustomerRecord and the RecordStore trait with REST, JSON-lines and in-memory adapters.

//! Record storage.
//!
//! The crawl controller only ever talks to a [`RecordStore`]. Every failure a
//! store reports is scoped to the one record being saved; the crawl logs it and
//! moves on.

pub mod jsonl;
pub mod memory;
pub mod rest;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::mapping::{field, ExtractionResult};

pub use jsonl::JsonlStore;
pub use memory::MemoryStore;
pub use rest::RestStore;

/// A row submitted to the record store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub site_config_id: String,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub notes: String,
    pub source_url: String,
}

impl CustomerRecord {
    /// Builds a record from one page's extraction. Missing fields become `""`.
    pub fn from_extraction(
        result: &ExtractionResult,
        site_config_id: impl Into<String>,
        source_url: impl Into<String>,
    ) -> Self {
        Self {
            site_config_id: site_config_id.into(),
            full_name: result.get(field::FULL_NAME).to_string(),
            email: result.get(field::EMAIL).to_string(),
            phone: result.get(field::PHONE).to_string(),
            address: result.get(field::ADDRESS).to_string(),
            notes: result.get(field::NOTES).to_string(),
            source_url: source_url.into(),
        }
    }
}

/// Identifier the store assigned to an inserted record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RecordId {
    fn from(id: String) -> Self {
        RecordId(id)
    }
}

/// A record as kept by a store, with its id and insertion time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: RecordId,
    #[serde(flatten)]
    pub record: CustomerRecord,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Whether a record with exactly this phone string already exists.
    async fn check_duplicate(&self, phone: &str) -> Result<bool, StoreError>;

    async fn insert(&self, record: &CustomerRecord) -> Result<RecordId, StoreError>;
}

#[async_trait]
impl<S: RecordStore + ?Sized> RecordStore for Arc<S> {
    async fn check_duplicate(&self, phone: &str) -> Result<bool, StoreError> {
        (**self).check_duplicate(phone).await
    }

    async fn insert(&self, record: &CustomerRecord) -> Result<RecordId, StoreError> {
        (**self).insert(record).await
    }
}

#[async_trait]
impl<S: RecordStore + ?Sized> RecordStore for Box<S> {
    async fn check_duplicate(&self, phone: &str) -> Result<bool, StoreError> {
        (**self).check_duplicate(phone).await
    }

    async fn insert(&self, record: &CustomerRecord) -> Result<RecordId, StoreError> {
        (**self).insert(record).await
    }
}

/// What happened to one record handed to [`submit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Inserted(RecordId),
    Duplicate,
    Failed(String),
}

/// Runs the duplicate check and, when the phone is new, the insert.
///
/// Store errors are folded into [`SubmitOutcome::Failed`] so the caller can
/// keep going.
pub async fn submit<S: RecordStore + ?Sized>(store: &S, record: &CustomerRecord) -> SubmitOutcome {
    match store.check_duplicate(&record.phone).await {
        Ok(true) => SubmitOutcome::Duplicate,
        Ok(false) => match store.insert(record).await {
            Ok(id) => SubmitOutcome::Inserted(id),
            Err(e) => SubmitOutcome::Failed(e.to_string()),
        },
        Err(e) => SubmitOutcome::Failed(e.to_string()),
    }
}
