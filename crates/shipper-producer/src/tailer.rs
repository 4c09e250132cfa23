//! Follows a growing log file line by line.
//!
//! [`FileTailer`] reads complete lines from a byte offset, waits at end of
//! file for more data, and reopens the path from the start when the file is
//! truncated or replaced by rotation. It is the only writer of the current
//! offset, which it publishes through a [`watch`] channel.

use std::fs::Metadata;
use std::io::SeekFrom;

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::TailConfig;
use crate::error::TailError;

/// One complete line and the offset just past it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TailedLine {
    /// Line text without its terminator.
    pub line: String,
    /// Byte offset immediately after the line's newline.
    pub offset: u64,
}

struct OpenFile {
    reader: BufReader<File>,
    id: Option<u64>,
}

/// Follows a file from a byte offset, surviving truncation and rotation.
pub struct FileTailer {
    config: TailConfig,
    file: Option<OpenFile>,
    /// Offset after the last complete line.
    offset: u64,
    /// Offset to seek to when the file is next opened.
    pending_start: u64,
    /// Bytes of a line whose newline has not arrived yet.
    partial: Vec<u8>,
    offset_tx: watch::Sender<u64>,
}

impl std::fmt::Debug for FileTailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileTailer")
            .field("path", &self.config.path)
            .field("offset", &self.offset)
            .field("open", &self.file.is_some())
            .finish_non_exhaustive()
    }
}

impl FileTailer {
    /// Opens the file described by `config`.
    ///
    /// A start offset beyond the end of the file is treated as a truncation
    /// and reading begins at 0.
    ///
    /// # Errors
    ///
    /// Returns [`TailError::Open`] if the file cannot be opened and
    /// `must_exist` is set. Without `must_exist` a missing file is waited for.
    pub async fn open(config: TailConfig) -> Result<Self, TailError> {
        let (offset_tx, _) = watch::channel(config.start_offset);
        let mut tailer = Self {
            file: None,
            offset: config.start_offset,
            pending_start: config.start_offset,
            partial: Vec::new(),
            offset_tx,
            config,
        };

        match tailer.try_open().await {
            Ok(()) => {}
            Err(e) if tailer.config.must_exist => return Err(e),
            Err(e) => {
                info!(
                    path = %tailer.config.path.display(),
                    error = %e,
                    "log file not available yet, waiting for it"
                );
            }
        }
        Ok(tailer)
    }

    /// Offset after the last complete line returned.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.offset
    }

    /// Subscribes to offset updates.
    #[must_use]
    pub fn offset_watch(&self) -> watch::Receiver<u64> {
        self.offset_tx.subscribe()
    }

    /// Waits for and returns the next complete line.
    ///
    /// Cancel-safe: bytes read before cancellation are kept for the next
    /// call and the offset only moves when a whole line is returned.
    ///
    /// # Errors
    ///
    /// Returns [`TailError::Read`] if reading the open file fails.
    pub async fn next_line(&mut self) -> Result<TailedLine, TailError> {
        loop {
            let Some(open) = self.file.as_mut() else {
                if let Err(e) = self.try_open().await {
                    debug!(error = %e, "log file not openable yet");
                    tokio::time::sleep(self.config.poll_interval).await;
                }
                continue;
            };

            let read = open
                .reader
                .read_until(b'\n', &mut self.partial)
                .await
                .map_err(|source| TailError::Read {
                    path: self.config.path.clone(),
                    source,
                })?;

            if self.partial.last() == Some(&b'\n') {
                return Ok(self.take_line());
            }

            if read == 0 {
                if self.rotated().await {
                    self.reopen_from_start();
                    continue;
                }
                tokio::time::sleep(self.config.poll_interval).await;
            }
        }
    }

    fn take_line(&mut self) -> TailedLine {
        self.offset += self.partial.len() as u64;
        let mut bytes = std::mem::take(&mut self.partial);
        bytes.pop();
        if bytes.last() == Some(&b'\r') {
            bytes.pop();
        }
        self.offset_tx.send_replace(self.offset);
        TailedLine {
            line: String::from_utf8_lossy(&bytes).into_owned(),
            offset: self.offset,
        }
    }

    /// Opens the path and seeks to `pending_start`.
    async fn try_open(&mut self) -> Result<(), TailError> {
        let path = self.config.path.clone();
        let file = File::open(&path).await.map_err(|source| TailError::Open {
            path: path.clone(),
            source,
        })?;

        let metadata = file.metadata().await.map_err(|source| TailError::Open {
            path: path.clone(),
            source,
        })?;

        let mut start = self.pending_start;
        if start > metadata.len() {
            warn!(
                path = %path.display(),
                offset = start,
                len = metadata.len(),
                "offset beyond end of file, file was truncated; reading from start"
            );
            start = 0;
        }

        let mut reader = BufReader::new(file);
        reader
            .seek(SeekFrom::Start(start))
            .await
            .map_err(|source| TailError::Read {
                path: path.clone(),
                source,
            })?;

        info!(path = %path.display(), offset = start, "following log file");
        self.set_offset(start);
        self.file = Some(OpenFile {
            reader,
            id: file_id(&metadata),
        });
        Ok(())
    }

    /// True if the path now names a shorter or different file.
    async fn rotated(&self) -> bool {
        let Some(open) = self.file.as_ref() else {
            return false;
        };
        let Ok(metadata) = tokio::fs::metadata(&self.config.path).await else {
            // Mid-rotation: old file moved away, new one not created yet.
            return false;
        };

        let read_pos = self.offset + self.partial.len() as u64;
        if metadata.len() < read_pos {
            warn!(
                path = %self.config.path.display(),
                len = metadata.len(),
                offset = read_pos,
                "log file truncated, reopening from start"
            );
            return true;
        }
        if open.id.is_some() && file_id(&metadata) != open.id {
            warn!(path = %self.config.path.display(), "log file rotated, reopening from start");
            return true;
        }
        false
    }

    fn reopen_from_start(&mut self) {
        self.file = None;
        self.partial.clear();
        self.pending_start = 0;
        self.set_offset(0);
    }

    fn set_offset(&mut self, offset: u64) {
        self.offset = offset;
        self.pending_start = offset;
        self.offset_tx.send_replace(offset);
    }
}

#[cfg(unix)]
fn file_id(metadata: &Metadata) -> Option<u64> {
    use std::os::unix::fs::MetadataExt;
    Some(metadata.ino())
}

#[cfg(not(unix))]
fn file_id(_metadata: &Metadata) -> Option<u64> {
    None
}
