//! # Chunk Payloads
//!
//! Capability set shared by every per-chunk payload type (cells, lights).
//! `ChunkSystem` and `ChunkBuffer` are generic over it.

use crate::error::ChunkResult;

/// A per-chunk payload that can be linearized for upload and persistence.
pub trait ChunkPayload {
    /// Size in bytes of one serialized record.
    const RECORD_SIZE: usize;

    /// Two-phase serialization.
    ///
    /// With `None`, only reports the number of bytes required. With
    /// `Some(out)`, writes the payload into the front of `out` (which must
    /// be at least that large) and returns the number of bytes written.
    fn serialize_into(&self, out: Option<&mut [u8]>) -> usize;

    /// Replaces the payload with the records in `bytes`.
    ///
    /// # Errors
    ///
    /// Returns `ChunkError::MalformedPayload` if `bytes` is not a whole
    /// number of records.
    fn deserialize_from(&mut self, bytes: &[u8]) -> ChunkResult<()>;

    /// Flags the payload as changed since it was last packed.
    fn mark_dirty(&mut self);

    /// True if the payload changed since it was last packed.
    fn is_dirty(&self) -> bool;

    /// Clears the changed flag. Only the consumer that packs the payload
    /// should call this.
    fn clear_dirty(&mut self);
}
