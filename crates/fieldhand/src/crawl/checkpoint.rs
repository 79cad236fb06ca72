// ABOUTME: Checkpoint media that carry CrawlState across page navigations.
// ABOUTME: FileCheckpoint writes JSON atomically via temp file and rename; MemoryCheckpoint keeps it in process.

//! Crawl checkpoints.
//!
//! A navigation destroys the page, so the crawl re-reads its state from here
//! after every load. Reads and writes are synchronous and small.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::crawl::state::CrawlState;
use crate::error::CheckpointError;

pub trait CheckpointStore: Send + Sync {
    /// The saved state, or `None` when no crawl is recorded.
    fn load(&self) -> Result<Option<CrawlState>, CheckpointError>;

    fn save(&self, state: &CrawlState) -> Result<(), CheckpointError>;

    fn clear(&self) -> Result<(), CheckpointError>;

    /// Applies `f` to the saved state and writes it back.
    ///
    /// Returns the updated state, or `None` (writing nothing) when no crawl is recorded.
    fn update(
        &self,
        f: &mut dyn FnMut(&mut CrawlState),
    ) -> Result<Option<CrawlState>, CheckpointError> {
        let Some(mut state) = self.load()? else {
            return Ok(None);
        };
        f(&mut state);
        self.save(&state)?;
        Ok(Some(state))
    }
}

impl<C: CheckpointStore + ?Sized> CheckpointStore for Arc<C> {
    fn load(&self) -> Result<Option<CrawlState>, CheckpointError> {
        (**self).load()
    }

    fn save(&self, state: &CrawlState) -> Result<(), CheckpointError> {
        (**self).save(state)
    }

    fn clear(&self) -> Result<(), CheckpointError> {
        (**self).clear()
    }

    fn update(
        &self,
        f: &mut dyn FnMut(&mut CrawlState),
    ) -> Result<Option<CrawlState>, CheckpointError> {
        (**self).update(f)
    }
}

/// JSON checkpoint file.
#[derive(Debug, Clone)]
pub struct FileCheckpoint {
    path: PathBuf,
}

impl FileCheckpoint {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> CheckpointError {
        CheckpointError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl CheckpointStore for FileCheckpoint {
    fn load(&self) -> Result<Option<CrawlState>, CheckpointError> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };
        serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|source| CheckpointError::Decode {
                path: self.path.clone(),
                source,
            })
    }

    fn save(&self, state: &CrawlState) -> Result<(), CheckpointError> {
        let encoded = serde_json::to_vec_pretty(state).map_err(CheckpointError::Encode)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let tmp_path = self.path.with_extension("tmp");
        fs::write(&tmp_path, encoded).map_err(|e| self.io_error(e))?;
        fs::rename(&tmp_path, &self.path).map_err(|e| self.io_error(e))?;
        debug!(path = %self.path.display(), index = state.current_index, "checkpoint saved");
        Ok(())
    }

    fn clear(&self) -> Result<(), CheckpointError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }
}

/// Checkpoint held in memory. Survives page reloads but not the process.
#[derive(Debug, Default)]
pub struct MemoryCheckpoint {
    slot: Mutex<Option<CrawlState>>,
}

impl MemoryCheckpoint {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<CrawlState>> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl CheckpointStore for MemoryCheckpoint {
    fn load(&self) -> Result<Option<CrawlState>, CheckpointError> {
        Ok(self.lock().clone())
    }

    fn save(&self, state: &CrawlState) -> Result<(), CheckpointError> {
        *self.lock() = Some(state.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), CheckpointError> {
        self.lock().take();
        Ok(())
    }

    fn update(
        &self,
        f: &mut dyn FnMut(&mut CrawlState),
    ) -> Result<Option<CrawlState>, CheckpointError> {
        let mut slot = self.lock();
        Ok(slot.as_mut().map(|state| {
            f(state);
            state.clone()
        }))
    }
}
