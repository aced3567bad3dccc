//! # Cell Chunks
//!
//! A cell chunk owns the cells of one 255x255x255 chunk and indexes them
//! through a 16x16x16 grid of mini chunks.
//!
//! ## Stable Ids
//!
//! A cell id is its slot index in `cells`. Removing a cell overwrites the
//! slot with `Cell::EMPTY` and pushes the id on a LIFO free list, so ids of
//! other cells never move. Mini chunks reference cells by id only.
//!
//! ## Payload
//!
//! Live cells serialize as contiguous 9-byte records in id order, with no
//! header. Loading a payload assigns ids `0..n` in record order.

use bytemuck::{bytes_of, try_cast_slice};
use tracing::{debug, warn};

use crate::cell::{Cell, Face, CELL_RECORD_SIZE};
use crate::error::{ChunkError, ChunkResult};
use crate::math::Vec3;
use crate::mini_chunk::{MiniChunk, MINI_CHUNK_SIZE};
use crate::payload::ChunkPayload;
use crate::raycast::{next_boundary, voxel_ahead, ChunkHit};

/// Stable index of a cell inside its chunk.
pub type CellId = u32;

/// Extent of the local voxel index space (0..256 per axis).
pub const CHUNK_EXTENT: i32 = 256;

/// Mini chunks per axis.
const BUCKETS_PER_AXIS: usize = CHUNK_EXTENT as usize / MINI_CHUNK_SIZE;

/// Total mini chunks per chunk.
const BUCKET_COUNT: usize = BUCKETS_PER_AXIS * BUCKETS_PER_AXIS * BUCKETS_PER_AXIS;

/// Upper bound on boundary crossings inside one chunk.
const MAX_RAY_STEPS: usize = 4 * CHUNK_EXTENT as usize;

/// Row-major bucket index (`x*256 + y*16 + z` in bucket units).
#[inline]
const fn bucket_index(bx: usize, by: usize, bz: usize) -> usize {
    bx * BUCKETS_PER_AXIS * BUCKETS_PER_AXIS + by * BUCKETS_PER_AXIS + bz
}

/// Indices of every bucket a box overlaps. Empty for zero or negative volume.
fn bucket_indices(cell: &Cell) -> impl Iterator<Item = usize> {
    let (p0, p1) = (cell.pos0(), cell.pos1());
    let lo = [0, 1, 2].map(|a| usize::from(p0[a]) / MINI_CHUNK_SIZE);
    let hi = [0, 1, 2].map(|a| usize::from(p1[a]).saturating_sub(1) / MINI_CHUNK_SIZE);
    let live = cell.is_well_formed();

    (lo[0]..=hi[0])
        .filter(move |_| live)
        .flat_map(move |bx| {
            (lo[1]..=hi[1])
                .flat_map(move |by| (lo[2]..=hi[2]).map(move |bz| bucket_index(bx, by, bz)))
        })
}

/// Cells of one chunk plus their spatial index.
#[derive(Clone, Debug)]
pub struct CellChunk {
    /// Cell slots, index = id. Free slots hold `Cell::EMPTY`.
    cells: Vec<Cell>,
    /// Recyclable ids, reused LIFO.
    free_slots: Vec<CellId>,
    /// 16x16x16 buckets in row-major order.
    mini_chunks: Box<[MiniChunk]>,
    /// Set on every mutation, cleared by the packer.
    dirty: bool,
}

impl Default for CellChunk {
    fn default() -> Self {
        Self::new()
    }
}

impl CellChunk {
    /// Creates an empty chunk.
    #[must_use]
    pub fn new() -> Self {
        let mut mini_chunks = Vec::with_capacity(BUCKET_COUNT);
        for bx in 0..BUCKETS_PER_AXIS {
            for by in 0..BUCKETS_PER_AXIS {
                for bz in 0..BUCKETS_PER_AXIS {
                    let base = [bx, by, bz].map(|b| (b * MINI_CHUNK_SIZE) as u8);
                    mini_chunks.push(MiniChunk::new(base));
                }
            }
        }

        Self {
            cells: Vec::new(),
            free_slots: Vec::new(),
            mini_chunks: mini_chunks.into_boxed_slice(),
            dirty: false,
        }
    }

    /// Builds a chunk from a flat record payload.
    ///
    /// # Errors
    ///
    /// Returns `ChunkError::MalformedPayload` if `bytes` is not a whole
    /// number of cell records.
    pub fn from_buffer(bytes: &[u8]) -> ChunkResult<Self> {
        let mut chunk = Self::new();
        chunk.load_from_buffer(bytes)?;
        Ok(chunk)
    }

    /// Number of live cells.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len() - self.free_slots.len()
    }

    /// True if the chunk holds no live cell.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of slots, live or free.
    #[inline]
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.cells.len()
    }

    /// Adds a cell and returns its id.
    ///
    /// Returns `None` without touching the chunk if the cell has zero or
    /// negative volume on some axis.
    pub fn add(&mut self, cell: Cell) -> Option<CellId> {
        if !cell.is_well_formed() {
            return None;
        }

        let id = if let Some(id) = self.free_slots.pop() {
            self.cells[id as usize] = cell;
            id
        } else {
            self.cells.push(cell);
            (self.cells.len() - 1) as CellId
        };

        for b in bucket_indices(&cell) {
            self.mini_chunks[b].add_ref(&cell, id);
        }
        self.dirty = true;
        Some(id)
    }

    /// Replaces the cell at `id`, returning the previous cell.
    ///
    /// A zero or negative volume replacement removes the cell. Returns `None` if `id` is
    /// out of range or names a free slot.
    pub fn set(&mut self, id: CellId, cell: Cell) -> Option<Cell> {
        let old = *self.get(id)?;
        if !cell.is_well_formed() {
            return self.remove(id);
        }

        let mut touched: Vec<usize> = bucket_indices(&old).chain(bucket_indices(&cell)).collect();
        touched.sort_unstable();
        touched.dedup();
        for b in touched {
            self.mini_chunks[b].update_ref(&old, &cell, id);
        }

        self.cells[id as usize] = cell;
        self.dirty = true;
        Some(old)
    }

    /// Removes the cell at `id` and recycles its slot.
    ///
    /// Returns the removed cell, or `None` if `id` is out of range or
    /// already free.
    pub fn remove(&mut self, id: CellId) -> Option<Cell> {
        let old = *self.get(id)?;

        for b in bucket_indices(&old) {
            self.mini_chunks[b].remove_ref(&old, id);
        }
        self.cells[id as usize] = Cell::EMPTY;
        self.free_slots.push(id);
        self.dirty = true;
        Some(old)
    }

    /// Removes every cell.
    pub fn clear(&mut self) {
        self.cells.clear();
        self.free_slots.clear();
        for mini in self.mini_chunks.iter_mut() {
            mini.clear();
        }
        self.dirty = true;
    }

    /// Live cell with the given id.
    #[inline]
    #[must_use]
    pub fn get(&self, id: CellId) -> Option<&Cell> {
        self.cells.get(id as usize).filter(|c| c.is_well_formed())
    }

    /// Id of the first live cell containing voxel `(x, y, z)`.
    #[must_use]
    pub fn id_at(&self, x: i32, y: i32, z: i32) -> Option<CellId> {
        let in_range = |v: i32| (0..CHUNK_EXTENT).contains(&v);
        if !(in_range(x) && in_range(y) && in_range(z)) {
            return None;
        }

        let bucket = &self.mini_chunks[bucket_index(
            x as usize / MINI_CHUNK_SIZE,
            y as usize / MINI_CHUNK_SIZE,
            z as usize / MINI_CHUNK_SIZE,
        )];
        bucket
            .refs()
            .iter()
            .copied()
            .find(|&id| self.cells[id as usize].contains_point(x, y, z))
    }

    /// First live cell containing voxel `(x, y, z)`.
    #[must_use]
    pub fn get_at(&self, x: i32, y: i32, z: i32) -> Option<&Cell> {
        self.id_at(x, y, z).map(|id| &self.cells[id as usize])
    }

    /// Ids of live cells sharing volume with `query` (only its box is used).
    #[must_use]
    pub fn get_ids_in_volume(&self, query: &Cell) -> Vec<CellId> {
        let mut ids: Vec<CellId> = bucket_indices(query)
            .flat_map(|b| self.mini_chunks[b].refs().iter().copied())
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids.retain(|&id| self.cells[id as usize].shares_volume(query));
        ids
    }

    /// Live cells sharing volume with `query`, in id order.
    #[must_use]
    pub fn get_cells_in_volume(&self, query: &Cell) -> Vec<&Cell> {
        self.get_ids_in_volume(query)
            .into_iter()
            .map(|id| &self.cells[id as usize])
            .collect()
    }

    /// Live cells with their ids, in id order.
    pub fn cells(&self) -> impl Iterator<Item = (CellId, &Cell)> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_well_formed())
            .map(|(id, c)| (id as CellId, c))
    }

    /// Copies of every live cell, in id order.
    #[must_use]
    pub fn get_all_cells(&self) -> Vec<Cell> {
        self.cells().map(|(_, c)| *c).collect()
    }

    /// Bucket at bucket coordinates, each in 0..16.
    #[must_use]
    pub fn mini_chunk(&self, bx: usize, by: usize, bz: usize) -> Option<&MiniChunk> {
        if bx < BUCKETS_PER_AXIS && by < BUCKETS_PER_AXIS && bz < BUCKETS_PER_AXIS {
            Some(&self.mini_chunks[bucket_index(bx, by, bz)])
        } else {
            None
        }
    }

    /// All buckets in row-major order.
    #[must_use]
    pub fn mini_chunks(&self) -> &[MiniChunk] {
        &self.mini_chunks
    }

    /// Two-phase linearization of the live cells.
    ///
    /// Returns the payload size; writes it into `out` when given.
    pub fn fill_buffer(&self, out: Option<&mut [u8]>) -> usize {
        let size = self.len() * CELL_RECORD_SIZE;
        if let Some(out) = out {
            debug_assert!(
                out.len() >= size,
                "cell payload needs {size} bytes, buffer has {}",
                out.len()
            );
            for (record, (_, cell)) in out[..size]
                .chunks_exact_mut(CELL_RECORD_SIZE)
                .zip(self.cells())
            {
                record.copy_from_slice(bytes_of(cell));
            }
        }
        size
    }

    /// Replaces every cell with the records in `bytes` and rebuilds the
    /// spatial index. Zero or negative volume records become free slots.
    ///
    /// # Errors
    ///
    /// Returns `ChunkError::MalformedPayload` if `bytes` is not a whole
    /// number of cell records. The chunk is left unchanged in that case.
    pub fn load_from_buffer(&mut self, bytes: &[u8]) -> ChunkResult<()> {
        let records: &[Cell] = try_cast_slice(bytes).map_err(|_| {
            warn!(len = bytes.len(), "rejecting malformed cell payload");
            ChunkError::MalformedPayload {
                len: bytes.len(),
                record_size: CELL_RECORD_SIZE,
            }
        })?;

        self.clear();
        self.cells.extend_from_slice(records);
        self.free_slots = records
            .iter()
            .enumerate()
            .rev()
            .filter(|(_, c)| !c.is_well_formed())
            .map(|(id, _)| id as CellId)
            .collect();
        for &id in &self.free_slots {
            self.cells[id as usize] = Cell::EMPTY;
        }
        for (id, cell) in self.cells.iter().enumerate() {
            for b in bucket_indices(cell) {
                self.mini_chunks[b].add_ref(cell, id as CellId);
            }
        }

        debug!(cells = self.len(), slots = self.cells.len(), "loaded cell chunk");
        self.dirty = true;
        Ok(())
    }

    /// Casts a ray through the chunk at cell granularity.
    ///
    /// `origin` is in chunk-local space. Returns the first live cell the ray
    /// enters before leaving the 0..256 voxel space.
    #[must_use]
    pub fn ray_cast(&self, origin: Vec3, dir: Vec3) -> Option<ChunkHit> {
        if dir.length_squared() == 0.0 {
            return None;
        }

        let mut point = origin;
        let mut entered: Option<Face> = None;
        for _ in 0..MAX_RAY_STEPS {
            let [x, y, z] = voxel_ahead(point, dir);
            if ![x, y, z].iter().all(|v| (0..CHUNK_EXTENT).contains(v)) {
                return None;
            }
            if let Some(id) = self.id_at(x, y, z) {
                return Some(ChunkHit {
                    id,
                    cell: self.cells[id as usize],
                    point,
                    face: entered,
                });
            }
            let (next, crossed) = next_boundary(point, dir, 1.0);
            point = next;
            entered = Some(crossed);
        }
        None
    }
}

impl ChunkPayload for CellChunk {
    const RECORD_SIZE: usize = CELL_RECORD_SIZE;

    fn serialize_into(&self, out: Option<&mut [u8]>) -> usize {
        self.fill_buffer(out)
    }

    fn deserialize_from(&mut self, bytes: &[u8]) -> ChunkResult<()> {
        self.load_from_buffer(bytes)
    }

    fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn clear_dirty(&mut self) {
        self.dirty = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    /// Checks that every bucket references exactly the live cells overlapping it.
    fn assert_index_consistent(chunk: &CellChunk) {
        for mini in chunk.mini_chunks() {
            let mut expected: Vec<CellId> = chunk
                .cells()
                .filter(|(_, c)| mini.within_volume(c))
                .map(|(id, _)| id)
                .collect();
            let mut actual = mini.refs().to_vec();
            expected.sort_unstable();
            actual.sort_unstable();
            assert_eq!(actual, expected, "bucket at {:?}", mini.base());
        }
    }

    fn random_cell(rng: &mut ChaCha8Rng) -> Cell {
        let mut p0 = [0u8; 3];
        let mut p1 = [0u8; 3];
        for a in 0..3 {
            let lo: u8 = rng.gen_range(0..250);
            let hi: u8 = rng.gen_range(lo + 1..=lo.saturating_add(40).min(255));
            p0[a] = lo;
            p1[a] = hi;
        }
        Cell::new(p0, p1, rng.gen_range(0..8))
    }

    #[test]
    fn test_single_cell_scenario() {
        let mut chunk = CellChunk::new();
        let cell = Cell::new([0, 0, 0], [4, 4, 4], 7);
        let id = chunk.add(cell).unwrap();

        assert_eq!(chunk.get_at(2, 2, 2), Some(&cell));
        assert_eq!(chunk.get_at(4, 4, 4), None);

        assert_eq!(chunk.remove(id), Some(cell));
        let reused = chunk.add(Cell::new([8, 8, 8], [9, 9, 9], 1)).unwrap();
        assert_eq!(reused, id);
    }

    #[test]
    fn test_add_rejects_zero_volume() {
        let mut chunk = CellChunk::new();
        assert_eq!(chunk.add(Cell::new([1, 1, 1], [1, 5, 5], 3)), None);
        assert!(chunk.is_empty());
        assert!(!chunk.is_dirty());
    }

    #[test]
    fn test_inverted_box_rejected() {
        let inverted = Cell::new([5, 0, 0], [2, 4, 4], 1);
        let mut chunk = CellChunk::new();
        assert_eq!(chunk.add(inverted), None);
        assert!(chunk.is_empty());
        assert_eq!(chunk.fill_buffer(None), 0);
        assert!(chunk.mini_chunks().iter().all(|m| m.refs().is_empty()));

        let id = chunk.add(Cell::new([0, 0, 0], [2, 2, 2], 1)).unwrap();
        assert!(chunk.set(id, inverted).is_some());
        assert!(chunk.get(id).is_none());
        assert!(chunk.is_empty());

        let loaded = CellChunk::from_buffer(bytes_of(&inverted)).unwrap();
        assert!(loaded.is_empty());
        assert_eq!(loaded.slot_count(), 1);
        assert!(loaded.mini_chunks().iter().all(|m| m.refs().is_empty()));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "cell payload needs")]
    fn test_fill_buffer_short_output() {
        let mut chunk = CellChunk::new();
        chunk.add(Cell::new([0, 0, 0], [1, 1, 1], 1));
        let mut out = [0u8; 4];
        chunk.fill_buffer(Some(&mut out));
    }

    #[test]
    fn test_remove_twice_is_noop() {
        let mut chunk = CellChunk::new();
        let a = chunk.add(Cell::new([0, 0, 0], [1, 1, 1], 1)).unwrap();
        let b = chunk.add(Cell::new([2, 2, 2], [3, 3, 3], 1)).unwrap();

        assert!(chunk.remove(a).is_some());
        assert!(chunk.remove(a).is_none());

        // Only one free slot for `a`: the next two adds get `a` then a new id.
        let first = chunk.add(Cell::new([5, 5, 5], [6, 6, 6], 1)).unwrap();
        let second = chunk.add(Cell::new([7, 7, 7], [8, 8, 8], 1)).unwrap();
        assert_eq!(first, a);
        assert_ne!(second, a);
        assert_ne!(second, b);
    }

    #[test]
    fn test_out_of_range_ids() {
        let mut chunk = CellChunk::new();
        assert!(chunk.get(0).is_none());
        assert!(chunk.remove(12).is_none());
        assert!(chunk.set(12, Cell::new([0, 0, 0], [1, 1, 1], 1)).is_none());
        assert!(chunk.get_at(-1, 0, 0).is_none());
        assert!(chunk.get_at(0, 300, 0).is_none());
    }

    #[test]
    fn test_set_moves_cell_between_buckets() {
        let mut chunk = CellChunk::new();
        let wide = Cell::new([0, 0, 0], [40, 4, 4], 2);
        let id = chunk.add(wide).unwrap();
        assert_index_consistent(&chunk);

        let narrow = Cell::new([33, 0, 0], [40, 4, 4], 2);
        assert_eq!(chunk.set(id, narrow), Some(wide));
        assert_index_consistent(&chunk);
        assert!(chunk.get_at(1, 1, 1).is_none());
        assert_eq!(chunk.get_at(34, 1, 1), Some(&narrow));
        assert!(chunk.mini_chunk(0, 0, 0).unwrap().refs().is_empty());
    }

    #[test]
    fn test_set_zero_volume_removes() {
        let mut chunk = CellChunk::new();
        let id = chunk.add(Cell::new([0, 0, 0], [4, 4, 4], 2)).unwrap();
        assert!(chunk.set(id, Cell::EMPTY).is_some());
        assert!(chunk.get(id).is_none());
        assert!(chunk.set(id, Cell::new([0, 0, 0], [1, 1, 1], 1)).is_none());
    }

    #[test]
    fn test_volume_queries() {
        let mut chunk = CellChunk::new();
        let a = chunk.add(Cell::new([0, 0, 0], [10, 10, 10], 1)).unwrap();
        let b = chunk.add(Cell::new([10, 0, 0], [20, 10, 10], 2)).unwrap();
        let c = chunk.add(Cell::new([100, 100, 100], [120, 120, 120], 3)).unwrap();

        let ids = chunk.get_ids_in_volume(&Cell::new([5, 5, 5], [15, 6, 6], 0));
        assert_eq!(ids, vec![a, b]);

        let touching = chunk.get_ids_in_volume(&Cell::new([20, 0, 0], [30, 10, 10], 0));
        assert!(touching.is_empty());

        let cells = chunk.get_cells_in_volume(&Cell::new([0, 0, 0], [255, 255, 255], 0));
        assert_eq!(cells.len(), 3);
        assert_eq!(chunk.get_ids_in_volume(&Cell::new([110, 110, 110], [111, 111, 111], 0)), vec![c]);
    }

    #[test]
    fn test_random_edits_keep_index_consistent() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut chunk = CellChunk::new();
        let mut live: Vec<CellId> = Vec::new();

        for _ in 0..400 {
            match rng.gen_range(0..3) {
                0 => {
                    if let Some(id) = chunk.add(random_cell(&mut rng)) {
                        live.push(id);
                    }
                }
                1 if !live.is_empty() => {
                    let id = live[rng.gen_range(0..live.len())];
                    chunk.set(id, random_cell(&mut rng));
                }
                _ if !live.is_empty() => {
                    let id = live.swap_remove(rng.gen_range(0..live.len()));
                    chunk.remove(id);
                }
                _ => {}
            }
        }

        assert_eq!(chunk.len(), live.len());
        assert_index_consistent(&chunk);
    }

    #[test]
    fn test_buffer_round_trip() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut chunk = CellChunk::new();
        for _ in 0..64 {
            chunk.add(random_cell(&mut rng));
        }
        chunk.remove(3);
        chunk.remove(17);

        let size = chunk.fill_buffer(None);
        assert_eq!(size, chunk.len() * CELL_RECORD_SIZE);
        let mut bytes = vec![0u8; size];
        assert_eq!(chunk.fill_buffer(Some(&mut bytes)), size);

        let restored = CellChunk::from_buffer(&bytes).unwrap();
        let mut expected = chunk.get_all_cells();
        let mut actual = restored.get_all_cells();
        expected.sort_by_key(|c| bytemuck::bytes_of(c).to_vec());
        actual.sort_by_key(|c| bytemuck::bytes_of(c).to_vec());
        assert_eq!(actual, expected);
        assert_index_consistent(&restored);
    }

    #[test]
    fn test_load_rejects_partial_record() {
        let mut chunk = CellChunk::new();
        chunk.add(Cell::new([0, 0, 0], [1, 1, 1], 1));
        let err = chunk.load_from_buffer(&[0u8; 10]).unwrap_err();
        assert!(matches!(err, ChunkError::MalformedPayload { len: 10, record_size: 9 }));
        assert_eq!(chunk.len(), 1);
    }

    #[test]
    fn test_dirty_flag() {
        let mut chunk = CellChunk::new();
        assert!(!chunk.is_dirty());
        let id = chunk.add(Cell::new([0, 0, 0], [1, 1, 1], 1)).unwrap();
        assert!(chunk.is_dirty());
        chunk.clear_dirty();
        chunk.remove(id);
        assert!(chunk.is_dirty());
    }

    #[test]
    fn test_ray_cast_hits_first_cell() {
        let mut chunk = CellChunk::new();
        let near = chunk.add(Cell::new([10, 0, 0], [12, 4, 4], 1)).unwrap();
        chunk.add(Cell::new([20, 0, 0], [22, 4, 4], 2));

        let hit = chunk.ray_cast(Vec3::new(0.5, 1.5, 1.5), Vec3::X).unwrap();
        assert_eq!(hit.id, near);
        assert_eq!(hit.face, Some(Face::PosX));
        assert!((hit.point.x - 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_ray_cast_negative_direction() {
        let mut chunk = CellChunk::new();
        let id = chunk.add(Cell::new([3, 3, 3], [5, 5, 5], 4)).unwrap();

        let hit = chunk.ray_cast(Vec3::new(4.5, 4.5, 30.5), Vec3::new(0.0, 0.0, -1.0)).unwrap();
        assert_eq!(hit.id, id);
        assert_eq!(hit.face, Some(Face::NegZ));
        assert!((hit.point.z - 5.0).abs() < 1e-4);
    }

    #[test]
    fn test_ray_cast_misses_and_exits() {
        let mut chunk = CellChunk::new();
        chunk.add(Cell::new([10, 10, 10], [12, 12, 12], 1));
        assert!(chunk.ray_cast(Vec3::new(0.5, 0.5, 0.5), Vec3::X).is_none());
        assert!(chunk.ray_cast(Vec3::new(0.5, 0.5, 0.5), Vec3::ZERO).is_none());
    }

    #[test]
    fn test_ray_cast_starting_inside() {
        let mut chunk = CellChunk::new();
        let id = chunk.add(Cell::new([0, 0, 0], [4, 4, 4], 1)).unwrap();
        let hit = chunk.ray_cast(Vec3::new(1.5, 1.5, 1.5), Vec3::Y).unwrap();
        assert_eq!(hit.id, id);
        assert_eq!(hit.face, None);
    }
}
