// ABOUTME: Append-only JSON-lines record store on the local filesystem.
// ABOUTME: One StoredRecord per line; duplicate checks scan every stored phone.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use tracing::warn;

use super::{CustomerRecord, RecordId, RecordStore, StoredRecord};
use crate::error::StoreError;

#[derive(Debug)]
pub struct JsonlStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlStore {
    /// Uses `path`, which is created on the first insert.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every record in the file. Lines that fail to parse are skipped with a warning.
    pub fn read_all(&self) -> Result<Vec<StoredRecord>, StoreError> {
        read_records(&self.path)
    }
}

/// Reads a JSON-lines record file. A missing file reads as empty.
pub fn read_records(path: &Path) -> Result<Vec<StoredRecord>, StoreError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut records = Vec::new();
    for (n, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<StoredRecord>(line) {
            Ok(record) => records.push(record),
            Err(e) => warn!(path = %path.display(), line = n + 1, error = %e, "skipping unreadable record"),
        }
    }
    Ok(records)
}

#[async_trait]
impl RecordStore for JsonlStore {
    async fn check_duplicate(&self, phone: &str) -> Result<bool, StoreError> {
        Ok(self.read_all()?.iter().any(|s| s.record.phone == phone))
    }

    async fn insert(&self, record: &CustomerRecord) -> Result<RecordId, StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        let id = RecordId((self.read_all()?.len() + 1).to_string());
        let stored = StoredRecord {
            id: id.clone(),
            record: record.clone(),
            created_at: Utc::now(),
        };
        let mut line = serde_json::to_string(&stored)?;
        line.push('\n');

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(id)
    }
}
