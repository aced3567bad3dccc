//! # In-Memory Chunk Store

use crate::error::{StoreError, StoreResult};
use crate::store::{decode_block, encode_record, parse_header, ChunkStore, RECORD_HEADER_LEN};

/// Chunk store backed by a byte vector. Offsets index into it.
#[derive(Debug, Default)]
pub struct MemoryChunkStore {
    data: Vec<u8>,
}

impl MemoryChunkStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total stored bytes including record headers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True if nothing was stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl ChunkStore for MemoryChunkStore {
    fn store(&mut self, payload: &[u8]) -> StoreResult<u64> {
        let offset = self.data.len() as u64;
        self.data.extend_from_slice(&encode_record(payload));
        Ok(offset)
    }

    fn read(&mut self, offset: u64) -> StoreResult<Vec<u8>> {
        let unknown = || StoreError::UnknownOffset(offset);
        let start = usize::try_from(offset).map_err(|_| unknown())?;
        let body = start.checked_add(RECORD_HEADER_LEN).ok_or_else(unknown)?;
        let header: [u8; RECORD_HEADER_LEN] = self
            .data
            .get(start..body)
            .and_then(|h| h.try_into().ok())
            .ok_or_else(unknown)?;
        let (len, crc) = parse_header(header);
        let block = self.data.get(body..body + len).ok_or_else(unknown)?;
        decode_block(offset, crc, block)
    }
}
