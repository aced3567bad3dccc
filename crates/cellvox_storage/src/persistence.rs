//! # Chunk Persistence
//!
//! Saves and loads whole chunk payloads through any `ChunkStore`.

use cellvox_core::ChunkPayload;
use tracing::debug;

use crate::error::StoreResult;
use crate::store::ChunkStore;

/// Serializes `chunk` and appends it to `store`. Returns the record offset.
///
/// # Errors
///
/// Propagates the store's write error.
pub fn save_chunk<S, T>(store: &mut S, chunk: &T) -> StoreResult<u64>
where
    S: ChunkStore + ?Sized,
    T: ChunkPayload,
{
    let mut payload = vec![0u8; chunk.serialize_into(None)];
    chunk.serialize_into(Some(&mut payload));
    let offset = store.store(&payload)?;
    debug!(offset, bytes = payload.len(), "saved chunk");
    Ok(offset)
}

/// Reads the record at `offset` into a new chunk.
///
/// The returned chunk is dirty, so the next packer sync uploads it.
///
/// # Errors
///
/// Propagates read and integrity errors of the store and
/// `StoreError::Chunk` if the payload is not a whole number of records.
pub fn load_chunk<S, T>(store: &mut S, offset: u64) -> StoreResult<T>
where
    S: ChunkStore + ?Sized,
    T: ChunkPayload + Default,
{
    let payload = store.read(offset)?;
    let mut chunk = T::default();
    chunk.deserialize_from(&payload)?;
    Ok(chunk)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::memory::MemoryChunkStore;
    use cellvox_core::{Cell, CellChunk, ChunkError, Light, LightChunk};

    #[test]
    fn test_cell_chunk_round_trip() {
        let mut chunk = CellChunk::new();
        chunk.add(Cell::new([0, 0, 0], [4, 4, 4], 1));
        chunk.add(Cell::new([10, 0, 0], [12, 200, 3], 500));

        let mut store = MemoryChunkStore::new();
        let offset = save_chunk(&mut store, &chunk).unwrap();
        let loaded: CellChunk = load_chunk(&mut store, offset).unwrap();

        assert_eq!(loaded.get_all_cells(), chunk.get_all_cells());
        assert!(loaded.is_dirty());
        assert_eq!(loaded.id_at(11, 100, 1), Some(1));
    }

    #[test]
    fn test_light_chunk_round_trip() {
        let mut lights = LightChunk::new();
        lights.add(Light::new([3, 4, 5], 10, [255, 0, 0], 50));

        let mut store = MemoryChunkStore::new();
        let offset = save_chunk(&mut store, &lights).unwrap();
        let loaded: LightChunk = load_chunk(&mut store, offset).unwrap();
        assert_eq!(loaded.lights(), lights.lights());
    }

    #[test]
    fn test_wrong_payload_type_rejected() {
        let mut lights = LightChunk::new();
        lights.add(Light::new([0, 0, 0], 1, [1, 1, 1], 1));

        let mut store = MemoryChunkStore::new();
        let offset = save_chunk(&mut store, &lights).unwrap();
        // 8 bytes is not a whole number of 9-byte cell records.
        let err = load_chunk::<_, CellChunk>(&mut store, offset).unwrap_err();
        assert!(matches!(err, StoreError::Chunk(ChunkError::MalformedPayload { len: 8, .. })));
    }
}
