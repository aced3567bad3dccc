//! # Edits
//!
//! Box placement and carving on top of the cell chunk contract.
//! `ChunkEdit` works in chunk-local space, `WorldEdit` clips world-space
//! boxes into every chunk they touch.

use tracing::trace;

use crate::cell::{Cell, ALL_FACES};
use crate::cell_chunk::{CellChunk, CellId};
use crate::chunk_system::{ChunkSystem, WorldBox};

/// Edits on a single chunk.
pub struct ChunkEdit;

impl ChunkEdit {
    /// Pieces of `cell` outside `cut`, at most six.
    ///
    /// Slabs are split off along x, then y within the cut's x range, then z
    /// within the cut's x and y ranges. Pieces keep the material and have
    /// every face visible.
    #[must_use]
    pub fn subtract(cell: &Cell, cut: &Cell) -> Vec<Cell> {
        if !cell.shares_volume(cut) {
            return vec![*cell];
        }

        let mut lo = cell.pos0();
        let mut hi = cell.pos1();
        let (c0, c1) = (cut.pos0(), cut.pos1());
        let mut pieces = Vec::with_capacity(6);

        for axis in 0..3 {
            if lo[axis] < c0[axis] {
                let mut piece_hi = hi;
                piece_hi[axis] = c0[axis];
                pieces.push(Cell::with_faces(lo, piece_hi, cell.material(), ALL_FACES));
                lo[axis] = c0[axis];
            }
            if c1[axis] < hi[axis] {
                let mut piece_lo = lo;
                piece_lo[axis] = c1[axis];
                pieces.push(Cell::with_faces(piece_lo, hi, cell.material(), ALL_FACES));
                hi[axis] = c1[axis];
            }
        }
        pieces
    }

    /// Removes the volume of `cut` from every cell it overlaps.
    ///
    /// Remainders are re-added; the first one keeps the original id.
    /// Returns the number of cells touched.
    pub fn carve(chunk: &mut CellChunk, cut: &Cell) -> usize {
        if !cut.is_well_formed() {
            return 0;
        }
        let ids = chunk.get_ids_in_volume(cut);
        for &id in &ids {
            let Some(&cell) = chunk.get(id) else {
                continue;
            };
            let mut pieces = Self::subtract(&cell, cut).into_iter();
            match pieces.next() {
                Some(first) => {
                    chunk.set(id, first);
                }
                None => {
                    chunk.remove(id);
                }
            }
            for piece in pieces {
                chunk.add(piece);
            }
        }
        trace!(touched = ids.len(), "carved cell chunk");
        ids.len()
    }

    /// Replaces whatever occupies the volume of `cell` with `cell`.
    pub fn place(chunk: &mut CellChunk, cell: Cell) -> Option<CellId> {
        if !cell.is_well_formed() {
            return None;
        }
        Self::carve(chunk, &cell);
        chunk.add(cell)
    }
}

/// Edits spanning chunks.
pub struct WorldEdit;

impl WorldEdit {
    /// Fills `region` with `material`, loading empty chunks where needed.
    ///
    /// Returns the number of chunks written.
    pub fn place(system: &mut ChunkSystem<CellChunk>, region: &WorldBox, material: u16) -> usize {
        let mut written = 0;
        for pos in ChunkSystem::<CellChunk>::chunk_positions_at(region) {
            let Some(cell) = local_cell(region, pos.bounds(), material) else {
                continue;
            };
            let chunk = system.get_or_load_with(pos, CellChunk::new);
            if ChunkEdit::place(chunk, cell).is_some() {
                written += 1;
            }
        }
        written
    }

    /// Empties `region` in every loaded chunk it touches.
    ///
    /// Returns the number of cells touched.
    pub fn carve(system: &mut ChunkSystem<CellChunk>, region: &WorldBox) -> usize {
        let mut touched = 0;
        for pos in ChunkSystem::<CellChunk>::chunk_positions_at(region) {
            let Some(cut) = local_cell(region, pos.bounds(), 0) else {
                continue;
            };
            if let Some(chunk) = system.get_mut(pos) {
                touched += ChunkEdit::carve(chunk, &cut);
            }
        }
        touched
    }
}

/// `region` clipped to `chunk` and expressed in chunk-local coordinates.
fn local_cell(region: &WorldBox, chunk: WorldBox, material: u16) -> Option<Cell> {
    let clip = region.intersection(&chunk)?;
    let lo = [0, 1, 2].map(|a| (clip.min[a] - chunk.min[a]) as u8);
    let hi = [0, 1, 2].map(|a| (clip.max[a] - chunk.min[a]) as u8);
    Some(Cell::new(lo, hi, material))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk_system::ChunkPos;

    fn total_volume(chunk: &CellChunk) -> u32 {
        chunk.cells().map(|(_, c)| c.volume()).sum()
    }

    #[test]
    fn test_subtract_center_gives_six_pieces() {
        let cell = Cell::new([0, 0, 0], [9, 9, 9], 2);
        let cut = Cell::new([3, 3, 3], [6, 6, 6], 0);
        let pieces = ChunkEdit::subtract(&cell, &cut);

        assert_eq!(pieces.len(), 6);
        let volume: u32 = pieces.iter().map(Cell::volume).sum();
        assert_eq!(volume, 9 * 9 * 9 - 27);
        for (i, a) in pieces.iter().enumerate() {
            assert!(!a.shares_volume(&cut));
            assert_eq!(a.material(), 2);
            for b in &pieces[i + 1..] {
                assert!(!a.shares_volume(b));
            }
        }
    }

    #[test]
    fn test_subtract_disjoint_and_covering() {
        let cell = Cell::new([0, 0, 0], [2, 2, 2], 1);
        assert_eq!(ChunkEdit::subtract(&cell, &Cell::new([5, 5, 5], [6, 6, 6], 0)), vec![cell]);
        assert!(ChunkEdit::subtract(&cell, &Cell::new([0, 0, 0], [4, 4, 4], 0)).is_empty());
    }

    #[test]
    fn test_carve_keeps_untouched_volume() {
        let mut chunk = CellChunk::new();
        let id = chunk.add(Cell::new([0, 0, 0], [10, 10, 10], 1)).unwrap();
        let touched = ChunkEdit::carve(&mut chunk, &Cell::new([8, 0, 0], [12, 10, 10], 0));

        assert_eq!(touched, 1);
        assert_eq!(chunk.len(), 1);
        assert_eq!(chunk.get(id).unwrap().pos1(), [8, 10, 10]);
        assert!(chunk.get_at(9, 5, 5).is_none());
    }

    #[test]
    fn test_place_replaces_overlap() {
        let mut chunk = CellChunk::new();
        chunk.add(Cell::new([0, 0, 0], [4, 4, 4], 1));
        let id = ChunkEdit::place(&mut chunk, Cell::new([1, 1, 1], [3, 3, 3], 2)).unwrap();

        assert_eq!(chunk.get_at(2, 2, 2).unwrap().material(), 2);
        assert_eq!(chunk.id_at(2, 2, 2), Some(id));
        assert_eq!(chunk.get_at(0, 0, 0).unwrap().material(), 1);
        assert_eq!(total_volume(&chunk), 64);
        assert!(ChunkEdit::place(&mut chunk, Cell::new([1, 1, 1], [1, 3, 3], 2)).is_none());
    }

    #[test]
    fn test_world_place_spans_chunks() {
        let mut system = ChunkSystem::new();
        let region = WorldBox::new([250, 0, 0], [260, 2, 2]);
        assert_eq!(WorldEdit::place(&mut system, &region, 4), 2);
        assert_eq!(system.len(), 2);

        let left = system.get(ChunkPos::from_grid(0, 0, 0)).unwrap();
        let right = system.get(ChunkPos::from_grid(1, 0, 0)).unwrap();
        assert_eq!(left.get_at(254, 1, 1).unwrap().pos0(), [250, 0, 0]);
        assert_eq!(left.get_at(254, 1, 1).unwrap().pos1(), [255, 2, 2]);
        assert_eq!(right.get_at(0, 0, 0).unwrap().pos1(), [5, 2, 2]);
    }

    #[test]
    fn test_world_place_negative_coordinates() {
        let mut system = ChunkSystem::new();
        WorldEdit::place(&mut system, &WorldBox::new([-3, -3, -3], [-1, -1, -1]), 6);
        let chunk = system.get_at([-2, -2, -2]).unwrap();
        let cell = chunk.get_at(253, 253, 253).unwrap();
        assert_eq!(cell.pos0(), [252, 252, 252]);
        assert_eq!(cell.pos1(), [254, 254, 254]);
    }

    #[test]
    fn test_world_carve_skips_unloaded() {
        let mut system = ChunkSystem::new();
        WorldEdit::place(&mut system, &WorldBox::new([0, 0, 0], [10, 10, 10]), 1);
        let touched = WorldEdit::carve(&mut system, &WorldBox::new([-5, 0, 0], [5, 10, 10]));

        assert_eq!(touched, 1);
        assert_eq!(system.len(), 1);
        assert!(system.get_at([2, 2, 2]).unwrap().get_at(2, 2, 2).is_none());
        assert!(system.get_at([7, 2, 2]).unwrap().get_at(7, 2, 2).is_some());
    }
}
