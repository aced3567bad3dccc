//! # Storage Error Types

use cellvox_core::ChunkError;
use thiserror::Error;

/// Errors that can occur while storing or reading chunk records.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Underlying file I/O failed.
    #[error("chunk store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The file does not start with a valid header.
    #[error("invalid chunk file header: {0}")]
    BadHeader(String),

    /// No record starts at the offset.
    #[error("no chunk record at offset {0}")]
    UnknownOffset(u64),

    /// The stored checksum does not match the record.
    #[error("checksum mismatch in chunk record at offset {offset}")]
    ChecksumMismatch {
        /// Offset of the corrupt record.
        offset: u64,
    },

    /// The compressed block could not be decoded.
    #[error("failed to decompress chunk record: {0}")]
    Decompress(String),

    /// The decoded payload was rejected by the chunk.
    #[error(transparent)]
    Chunk(#[from] ChunkError),
}

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;
