//! # Chunk Error Types
//!
//! Hard failures of the core. Invalid geometry and unknown ids are not
//! errors; those are reported as `None` by the owning structure.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading chunk payloads or engine config.
#[derive(Error, Debug)]
pub enum ChunkError {
    /// A payload length is not a whole number of records.
    #[error("malformed payload: {len} bytes is not a multiple of the {record_size}-byte record")]
    MalformedPayload {
        /// Length of the rejected payload.
        len: usize,
        /// Record size the payload was expected to be made of.
        record_size: usize,
    },

    /// Engine config text could not be parsed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Engine config file could not be read.
    #[error("failed to read configuration {path}: {source}")]
    ConfigRead {
        /// Path that was read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Result type for chunk operations.
pub type ChunkResult<T> = Result<T, ChunkError>;
