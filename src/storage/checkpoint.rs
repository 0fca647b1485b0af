//! Progress checkpoints
//!
//! A checkpoint is the next identifier (store walk) or input index (purchase
//! join) to attempt. At startup it is resolved from an ordered list of
//! progress sources; during the run it is written after every unit of work.

use crate::storage::traits::{StorageError, StorageResult};
use crate::storage::write_atomic;
use std::path::{Path, PathBuf};

/// Somewhere a resume position can come from, in priority order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressSource {
    /// One past the highest key held by the record store
    StoreMaxKey(Option<i64>),

    /// The marker file written by a previous run
    Marker(PathBuf),

    /// Where to start when nothing else is known
    Floor(i64),

    /// The highest value any of the inner sources produces
    Furthest(Vec<ProgressSource>),
}

impl ProgressSource {
    fn resolve(&self) -> Option<i64> {
        match self {
            Self::StoreMaxKey(max) => max.map(|k| k + 1),
            Self::Marker(path) => match read_marker(path) {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!("Ignoring checkpoint marker {}: {}", path.display(), e);
                    None
                }
            },
            Self::Floor(floor) => Some(*floor),
            Self::Furthest(sources) => sources.iter().filter_map(Self::resolve).max(),
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::StoreMaxKey(_) => "record store".to_string(),
            Self::Marker(path) => format!("marker {}", path.display()),
            Self::Floor(_) => "floor".to_string(),
            Self::Furthest(sources) => {
                let names: Vec<String> = sources.iter().map(Self::describe).collect();
                format!("furthest of {}", names.join(", "))
            }
        }
    }
}

/// Reads a checkpoint marker; a missing file yields `None`
pub fn read_marker(path: &Path) -> StorageResult<Option<i64>> {
    match std::fs::read_to_string(path) {
        Ok(content) => content
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| {
                StorageError::Checkpoint(format!("unreadable value '{}'", content.trim()))
            }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Tracks and persists the checkpoint of one stage
///
/// The value only moves forward; an attempt to save a smaller value is
/// logged and ignored.
#[derive(Debug)]
pub struct CheckpointTracker {
    path: PathBuf,
    current: i64,
}

impl CheckpointTracker {
    /// Resolves the starting checkpoint from `sources`, first match wins
    pub fn load(path: impl Into<PathBuf>, sources: &[ProgressSource]) -> StorageResult<Self> {
        let path = path.into();

        for source in sources {
            if let Some(value) = source.resolve() {
                tracing::info!("Resuming at {} (from {})", value, source.describe());
                return Ok(Self {
                    path,
                    current: value,
                });
            }
        }

        Err(StorageError::Checkpoint(
            "no progress source produced a starting point".to_string(),
        ))
    }

    /// Current checkpoint value
    pub fn value(&self) -> i64 {
        self.current
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records `value` as the next unit to attempt and writes the marker
    ///
    /// The in-memory value advances even when the write fails, so `flush`
    /// at shutdown can still persist it.
    pub fn save(&mut self, value: i64) -> StorageResult<()> {
        if value < self.current {
            tracing::warn!(
                "Refusing to move checkpoint backwards from {} to {}",
                self.current,
                value
            );
            return Ok(());
        }

        self.current = value;
        write_atomic(&self.path, self.current.to_string().as_bytes())
    }

    /// Rewrites the marker with the current value
    pub fn flush(&self) -> StorageResult<()> {
        write_atomic(&self.path, self.current.to_string().as_bytes())
    }
}
