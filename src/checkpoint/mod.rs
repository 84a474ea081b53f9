//! Checkpoint persistence for resumable iteration.
//!
//! A checkpoint is a small set of named scalars. The engine reads and
//! writes them through the [`StateWriter`]/[`StateReader`] traits so that
//! the storage medium stays pluggable: tests use the in-memory
//! [`MemoryState`], while [`JsonStateFile`] persists to disk.
//!
//! # Atomic writes
//!
//! [`JsonStateFile::persist`] uses the temp-file-plus-rename pattern:
//! 1. Write to `{path}.tmp`
//! 2. Rename to `{path}`
//!
//! This ensures checkpoints are never partially written.

pub mod state;

pub use state::{
    full_name, Cursor, PositionKind, SavedPosition, CURRENT_FILE_INDEX_KEY, CURRENT_POS_KEY,
    OFFSET_KEY,
};

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::CheckpointError;

/// Sink for checkpoint scalars.
pub trait StateWriter {
    /// Store `value` under `name`, replacing any previous value.
    fn write_scalar(&mut self, name: &str, value: i64) -> Result<(), CheckpointError>;

    /// Remove `name` if present.
    ///
    /// Needed so that a field absent from the current cursor does not
    /// linger from an earlier save when a store is reused.
    fn remove_scalar(&mut self, name: &str) -> Result<(), CheckpointError>;
}

/// Source of checkpoint scalars.
pub trait StateReader {
    /// Whether `name` was saved.
    fn contains(&self, name: &str) -> bool;

    /// Read the scalar stored under `name`.
    fn read_scalar(&self, name: &str) -> Result<i64, CheckpointError>;
}

/// In-memory checkpoint store.
///
/// Insertion order is preserved, which keeps serialized checkpoints stable
/// and easy to diff.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryState {
    scalars: IndexMap<String, i64>,
}

impl MemoryState {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored scalars.
    pub fn len(&self) -> usize {
        self.scalars.len()
    }

    /// Whether the store holds no scalars.
    pub fn is_empty(&self) -> bool {
        self.scalars.is_empty()
    }
}

impl StateWriter for MemoryState {
    fn write_scalar(&mut self, name: &str, value: i64) -> Result<(), CheckpointError> {
        self.scalars.insert(name.to_string(), value);
        Ok(())
    }

    fn remove_scalar(&mut self, name: &str) -> Result<(), CheckpointError> {
        self.scalars.shift_remove(name);
        Ok(())
    }
}

impl StateReader for MemoryState {
    fn contains(&self, name: &str) -> bool {
        self.scalars.contains_key(name)
    }

    fn read_scalar(&self, name: &str) -> Result<i64, CheckpointError> {
        self.scalars
            .get(name)
            .copied()
            .ok_or_else(|| CheckpointError::MissingKey {
                name: name.to_string(),
            })
    }
}

/// Checkpoint store persisted as a JSON file.
pub struct JsonStateFile {
    path: PathBuf,
    state: MemoryState,
}

impl JsonStateFile {
    /// Open a store at `path`, loading existing state if the file exists.
    ///
    /// A missing file starts fresh; a file that fails to parse is treated
    /// as absent (with a warning) rather than wedging the session.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CheckpointError> {
        let path = path.into();
        let state = match std::fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<MemoryState>(&bytes) {
                Ok(state) => {
                    debug!(path = %path.display(), scalars = state.len(), "Loaded checkpoint");
                    state
                }
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to parse checkpoint JSON, starting fresh"
                    );
                    MemoryState::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No checkpoint found, starting fresh");
                MemoryState::default()
            }
            Err(source) => {
                return Err(CheckpointError::StoreIo {
                    path: path.display().to_string(),
                    source,
                })
            }
        };
        Ok(Self { path, state })
    }

    /// Write the current state to disk atomically.
    pub fn persist(&self) -> Result<(), CheckpointError> {
        let json = serde_json::to_vec_pretty(&self.state)
            .map_err(|source| CheckpointError::StateSerialize { source })?;

        let tmp = self.path.with_extension("json.tmp");
        let io_err = |source| CheckpointError::StoreIo {
            path: self.path.display().to_string(),
            source,
        };
        std::fs::write(&tmp, json).map_err(io_err)?;
        std::fs::rename(&tmp, &self.path).map_err(io_err)?;

        debug!(path = %self.path.display(), "Saved checkpoint");
        Ok(())
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateWriter for JsonStateFile {
    fn write_scalar(&mut self, name: &str, value: i64) -> Result<(), CheckpointError> {
        self.state.write_scalar(name, value)
    }

    fn remove_scalar(&mut self, name: &str) -> Result<(), CheckpointError> {
        self.state.remove_scalar(name)
    }
}

impl StateReader for JsonStateFile {
    fn contains(&self, name: &str) -> bool {
        self.state.contains(name)
    }

    fn read_scalar(&self, name: &str) -> Result<i64, CheckpointError> {
        self.state.read_scalar(name)
    }
}
