//! # Mini Chunks
//!
//! A mini chunk is a 16x16x16 spatial bucket of a cell chunk. It keeps the
//! ids of every live cell whose box overlaps the bucket volume. A cell that
//! spans several buckets is referenced by each of them.

use crate::cell::Cell;
use crate::cell_chunk::CellId;

/// Edge length of a mini chunk in voxels.
pub const MINI_CHUNK_SIZE: usize = 16;

/// Spatial bucket holding references to the cells overlapping it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MiniChunk {
    /// Lower corner, a multiple of 16 in 0..=240 per axis.
    base: [u8; 3],
    /// Ids of overlapping cells, unordered.
    refs: Vec<CellId>,
}

impl MiniChunk {
    /// Creates an empty bucket at `base`.
    #[must_use]
    pub const fn new(base: [u8; 3]) -> Self {
        Self { base, refs: Vec::new() }
    }

    /// Lower corner of the bucket.
    #[inline]
    #[must_use]
    pub const fn base(&self) -> [u8; 3] {
        self.base
    }

    /// True if `cell` overlaps `[base, base + 16)` on every axis.
    #[inline]
    #[must_use]
    pub fn within_volume(&self, cell: &Cell) -> bool {
        let (p0, p1) = (cell.pos0(), cell.pos1());
        (0..3).all(|i| {
            let lo = u16::from(self.base[i]);
            let hi = lo + MINI_CHUNK_SIZE as u16;
            u16::from(p0[i]) < hi && u16::from(p1[i]) > lo
        })
    }

    /// Adds a reference to `id` if `cell` overlaps this bucket.
    pub fn add_ref(&mut self, cell: &Cell, id: CellId) {
        if self.within_volume(cell) {
            debug_assert!(!self.refs.contains(&id), "cell {id} referenced twice");
            self.refs.push(id);
        }
    }

    /// Moves the reference to `id` from `old`'s footprint to `new`'s.
    ///
    /// The reference is dropped when the cell no longer overlaps this
    /// bucket and added when it newly does.
    pub fn update_ref(&mut self, old: &Cell, new: &Cell, id: CellId) {
        self.remove_ref(old, id);
        self.add_ref(new, id);
    }

    /// Removes the reference to `id` if `cell` overlaps this bucket.
    pub fn remove_ref(&mut self, cell: &Cell, id: CellId) {
        if self.within_volume(cell) {
            if let Some(index) = self.refs.iter().position(|&r| r == id) {
                self.refs.swap_remove(index);
            }
        }
    }

    /// Referenced cell ids.
    #[inline]
    #[must_use]
    pub fn refs(&self) -> &[CellId] {
        &self.refs
    }

    /// Drops every reference.
    pub fn clear(&mut self) {
        self.refs.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_within_volume_strict() {
        let bucket = MiniChunk::new([16, 0, 0]);
        assert!(bucket.within_volume(&Cell::new([10, 0, 0], [17, 1, 1], 1)));
        assert!(bucket.within_volume(&Cell::new([31, 15, 15], [40, 20, 20], 1)));
        // Touches the lower face only.
        assert!(!bucket.within_volume(&Cell::new([0, 0, 0], [16, 1, 1], 1)));
        // Starts at the upper face.
        assert!(!bucket.within_volume(&Cell::new([32, 0, 0], [40, 1, 1], 1)));
    }

    #[test]
    fn test_add_remove_ref() {
        let mut bucket = MiniChunk::new([0, 0, 0]);
        let inside = Cell::new([0, 0, 0], [4, 4, 4], 1);
        let outside = Cell::new([20, 0, 0], [24, 4, 4], 1);

        bucket.add_ref(&inside, 3);
        bucket.add_ref(&outside, 4);
        assert_eq!(bucket.refs(), &[3]);

        bucket.remove_ref(&outside, 3);
        assert_eq!(bucket.refs(), &[3]);

        bucket.remove_ref(&inside, 3);
        assert!(bucket.refs().is_empty());
    }

    #[test]
    fn test_update_ref_drops_stale_reference() {
        let mut bucket = MiniChunk::new([0, 0, 0]);
        let before = Cell::new([0, 0, 0], [20, 4, 4], 1);
        let after = Cell::new([16, 0, 0], [20, 4, 4], 1);

        bucket.add_ref(&before, 9);
        bucket.update_ref(&before, &after, 9);
        assert!(bucket.refs().is_empty());

        bucket.update_ref(&after, &before, 9);
        assert_eq!(bucket.refs(), &[9]);
    }
}
