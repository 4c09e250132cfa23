//! Durable byte-offset checkpoint.
//!
//! The checkpoint file holds one decimal integer followed by a newline.
//! Saves go through a sibling temporary file that is synced and renamed over
//! the checkpoint, and the directory is synced after the rename, so a crash
//! or power loss leaves either the old or the new value.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::CheckpointError;

/// Default checkpoint file name.
pub const DEFAULT_CHECKPOINT_PATH: &str = "seek";

/// Loads and saves the producer's resume offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetStore {
    path: PathBuf,
}

impl OffsetStore {
    /// Creates a store for the checkpoint at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Checkpoint path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the saved offset.
    ///
    /// A missing, unreadable or malformed checkpoint yields 0.
    #[must_use]
    pub fn load(&self) -> u64 {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "no usable checkpoint, starting at 0"
                );
                return 0;
            }
        };

        match contents.trim().parse::<u64>() {
            Ok(offset) => {
                debug!(path = %self.path.display(), offset, "loaded checkpoint");
                offset
            }
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    contents = %contents.trim(),
                    error = %e,
                    "malformed checkpoint, starting at 0"
                );
                0
            }
        }
    }

    /// Atomically replaces the saved offset.
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError::Write`] if the temporary file cannot be
    /// written, synced or renamed.
    pub fn save(&self, offset: u64) -> Result<(), CheckpointError> {
        let tmp = self.temp_path();
        let result = write_synced(&tmp, offset).and_then(|()| fs::rename(&tmp, &self.path));
        if let Err(source) = result {
            let _ = fs::remove_file(&tmp);
            return Err(CheckpointError::Write {
                path: self.path.clone(),
                source,
            });
        }
        sync_parent(&self.path).map_err(|source| CheckpointError::Write {
            path: self.path.clone(),
            source,
        })?;
        debug!(path = %self.path.display(), offset, "saved checkpoint");
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

fn write_synced(path: &Path, offset: u64) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    writeln!(file, "{offset}")?;
    file.sync_all()
}

/// Syncs the directory holding `path` so a completed rename is durable.
#[cfg(unix)]
fn sync_parent(path: &Path) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
