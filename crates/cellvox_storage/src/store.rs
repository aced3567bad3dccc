//! # Chunk Store Trait
//!
//! Stores are append-only: a payload is written once and read back by the
//! offset `store` returned. Record framing is shared by every backend.

use lz4_flex::{compress_prepend_size, decompress_size_prepended};

use crate::error::{StoreError, StoreResult};

/// Bytes of `[u32 compressed_len][u32 crc32]` before each block.
pub const RECORD_HEADER_LEN: usize = 8;

/// Append-only storage of chunk payloads.
pub trait ChunkStore {
    /// Appends a payload and returns its offset.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Io` if the backend cannot be written.
    fn store(&mut self, payload: &[u8]) -> StoreResult<u64>;

    /// Reads the payload stored at `offset`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::UnknownOffset` if no record fits at `offset`,
    /// `StoreError::ChecksumMismatch` or `StoreError::Decompress` if the
    /// record is corrupt.
    fn read(&mut self, offset: u64) -> StoreResult<Vec<u8>>;
}

/// Frames `payload` as one compressed record.
#[must_use]
pub fn encode_record(payload: &[u8]) -> Vec<u8> {
    let block = compress_prepend_size(payload);
    let mut record = Vec::with_capacity(RECORD_HEADER_LEN + block.len());
    record.extend_from_slice(&(block.len() as u32).to_le_bytes());
    record.extend_from_slice(&crc32fast::hash(&block).to_le_bytes());
    record.extend_from_slice(&block);
    record
}

/// Splits a record header into `(block_len, crc)`.
#[must_use]
pub fn parse_header(header: [u8; RECORD_HEADER_LEN]) -> (usize, u32) {
    let len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    let crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
    (len as usize, crc)
}

/// Validates and decompresses a block read from `offset`.
///
/// # Errors
///
/// Returns `StoreError::ChecksumMismatch` if `crc` does not match `block`
/// and `StoreError::Decompress` if the block is not valid LZ4.
pub fn decode_block(offset: u64, crc: u32, block: &[u8]) -> StoreResult<Vec<u8>> {
    if crc32fast::hash(block) != crc {
        return Err(StoreError::ChecksumMismatch { offset });
    }
    decompress_size_prepended(block).map_err(|e| StoreError::Decompress(e.to_string()))
}
