//! Error types for the playback session and station cache.
//!
//! Cache I/O failures are non-fatal: callers log them and keep the in-memory
//! lists.  `NoActiveStation` is a user-visible no-op.  Nothing here should ever
//! take the process down.

use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to load cache '{key}': {source}")]
    LoadFailed {
        key: String,
        #[source]
        source: BoxError,
    },

    #[error("failed to save cache '{key}': {source}")]
    SaveFailed {
        key: String,
        #[source]
        source: BoxError,
    },

    #[error("index {index} out of range for list of length {len}")]
    IndexOutOfRange { index: usize, len: usize },
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no station selected")]
    NoActiveStation,

    #[error("could not start '{station}': {reason}")]
    StreamAcquisitionFailed { station: String, reason: String },
}
