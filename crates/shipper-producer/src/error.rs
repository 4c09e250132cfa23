//! Error types for the producer.

use std::io;
use std::path::PathBuf;

use shipper_bus::BusError;
use shipper_proto::CodecError;
use thiserror::Error;

/// Errors raised while following the log file.
#[derive(Debug, Error)]
pub enum TailError {
    /// The log file could not be opened.
    #[error("cannot open {path}: {source}")]
    Open {
        /// Path that failed to open.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Reading or seeking the open file failed.
    #[error("cannot read {path}: {source}")]
    Read {
        /// Path being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// Errors raised while persisting the checkpoint.
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// Writing, syncing or renaming the checkpoint file failed.
    #[error("cannot write checkpoint {path}: {source}")]
    Write {
        /// Checkpoint path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// Errors surfaced by the producer pipeline.
#[derive(Debug, Error)]
pub enum ProducerError {
    /// The tailer failed.
    #[error("tail error: {0}")]
    Tail(#[from] TailError),

    /// The checkpoint could not be saved.
    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    /// A bus call failed.
    #[error("bus error: {0}")]
    Bus(#[from] BusError),

    /// An event could not be encoded.
    #[error("encoding error: {0}")]
    Codec(#[from] CodecError),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for producer operations.
pub type Result<T> = std::result::Result<T, ProducerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tail_error_names_the_path() {
        let err = TailError::Open {
            path: PathBuf::from("/var/log/icinga/icinga.log"),
            source: io::Error::new(io::ErrorKind::NotFound, "no such file"),
        };
        assert_eq!(
            err.to_string(),
            "cannot open /var/log/icinga/icinga.log: no such file"
        );
    }

    #[test]
    fn lower_errors_convert() {
        let err: ProducerError = BusError::Closed.into();
        assert!(matches!(err, ProducerError::Bus(BusError::Closed)));

        let err: ProducerError = CodecError::Unrecognized("ProgramMsg".into()).into();
        assert!(err.to_string().starts_with("encoding error"));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ProducerError>();
    }
}
