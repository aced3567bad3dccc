//! # Chunk Optimizer
//!
//! Greedy box-merge compaction. A chunk's cells are rasterized into a dense
//! 255x255x255 material grid, then covered again by as few boxes as the
//! greedy scan finds.
//!
//! ## Algorithm
//!
//! 1. Raster-scan x, then y, then z, skipping void and covered voxels.
//! 2. Grow a box from the seed round-robin along +x, +y, +z. A slab is
//!    accepted only if it is uniform seed material, uncovered, inside the
//!    grid, and keeps every face of the box uniformly exposed or hidden.
//! 3. Emit the box with its visible faces, mark it covered, and continue
//!    the scan past its far z edge.
//!
//! Emitted boxes cover exactly the non-void voxels and never overlap. The
//! result is not guaranteed minimal.
//!
//! ## Scratch
//!
//! The grids live in an `OptimizerContext` that is reused across calls.
//! Only the region written by the previous call is reset.

use tracing::debug;

use crate::cell::{Cell, Face};
use crate::cell_chunk::CellChunk;
use crate::config::OptimizerConfig;

/// Material id of empty space in the dense grid.
pub const VOID_MATERIAL: u16 = u16::MAX;

/// Voxels per axis of the dense grid.
const GRID: usize = 255;

/// Total voxels of the dense grid.
const GRID_VOLUME: usize = GRID * GRID * GRID;

#[inline]
const fn grid_index(p: [usize; 3]) -> usize {
    (p[0] * GRID + p[1]) * GRID + p[2]
}

/// Counters of one optimize call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OptimizerStats {
    /// Live cells in the input chunk.
    pub cells_in: usize,
    /// Cells emitted.
    pub cells_out: usize,
    /// Non-void voxels covered.
    pub solid_voxels: usize,
}

/// Reusable dense scratch grids.
pub struct OptimizerContext {
    material: Box<[u16]>,
    covered: Box<[bool]>,
    /// Inclusive-exclusive region written since the last reset.
    dirty: Option<([usize; 3], [usize; 3])>,
}

impl Default for OptimizerContext {
    fn default() -> Self {
        Self::new()
    }
}

impl OptimizerContext {
    /// Allocates both grids, all void.
    #[must_use]
    pub fn new() -> Self {
        Self {
            material: vec![VOID_MATERIAL; GRID_VOLUME].into_boxed_slice(),
            covered: vec![false; GRID_VOLUME].into_boxed_slice(),
            dirty: None,
        }
    }

    /// Material at a grid position. Outside the grid is void.
    #[must_use]
    pub fn material_at(&self, x: usize, y: usize, z: usize) -> u16 {
        if x >= GRID || y >= GRID || z >= GRID {
            return VOID_MATERIAL;
        }
        self.material[grid_index([x, y, z])]
    }

    /// Writes one voxel. Positions outside the grid are ignored.
    pub fn set_voxel(&mut self, x: usize, y: usize, z: usize, material: u16) {
        if x >= GRID || y >= GRID || z >= GRID {
            return;
        }
        self.material[grid_index([x, y, z])] = material;
        self.extend_dirty([x, y, z], [x + 1, y + 1, z + 1]);
    }

    /// Resets the written region to void and uncovered.
    pub fn reset(&mut self) {
        let Some((lo, hi)) = self.dirty.take() else {
            return;
        };
        for x in lo[0]..hi[0] {
            for y in lo[1]..hi[1] {
                let row = grid_index([x, y, lo[2]])..grid_index([x, y, hi[2]]);
                self.material[row.clone()].fill(VOID_MATERIAL);
                self.covered[row].fill(false);
            }
        }
    }

    /// Replaces the grid contents with the cells of `chunk`.
    ///
    /// Later cells overwrite earlier ones where they overlap.
    pub fn rasterize(&mut self, chunk: &CellChunk) {
        self.reset();
        for (_, cell) in chunk.cells() {
            let lo = cell.pos0().map(usize::from);
            let hi = cell.pos1().map(|v| usize::from(v).min(GRID));
            if (0..3).any(|a| lo[a] >= hi[a]) {
                continue;
            }
            let material = cell.material();
            for x in lo[0]..hi[0] {
                for y in lo[1]..hi[1] {
                    let row = grid_index([x, y, lo[2]])..grid_index([x, y, hi[2]]);
                    self.material[row].fill(material);
                }
            }
            self.extend_dirty(lo, hi);
        }
    }

    fn extend_dirty(&mut self, lo: [usize; 3], hi: [usize; 3]) {
        self.dirty = Some(match self.dirty {
            None => (lo, hi),
            Some((a, b)) => (
                [0, 1, 2].map(|i| a[i].min(lo[i])),
                [0, 1, 2].map(|i| b[i].max(hi[i])),
            ),
        });
    }

    #[inline]
    fn is_covered(&self, p: [usize; 3]) -> bool {
        self.covered[grid_index(p)]
    }

    fn fill_covered(&mut self, lo: [usize; 3], hi: [usize; 3], covered: bool) {
        for x in lo[0]..hi[0] {
            for y in lo[1]..hi[1] {
                let row = grid_index([x, y, lo[2]])..grid_index([x, y, hi[2]]);
                self.covered[row].fill(covered);
            }
        }
    }
}

/// Box being grown from a seed voxel.
struct GrowBox {
    lo: [usize; 3],
    hi: [usize; 3],
    material: u16,
    /// Exposure of each face; uniform over the face.
    exposed: u8,
}

/// Greedy box-merge compactor.
#[derive(Clone, Debug, Default)]
pub struct ChunkOptimizer {
    config: OptimizerConfig,
}

impl ChunkOptimizer {
    /// Creates an optimizer.
    #[must_use]
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }

    /// Rasterizes `chunk` into `ctx` and returns an equivalent chunk with
    /// merged cells.
    ///
    /// Cells with `VOID_MATERIAL` are dropped.
    pub fn optimize(
        &self,
        ctx: &mut OptimizerContext,
        chunk: &CellChunk,
    ) -> (CellChunk, OptimizerStats) {
        ctx.rasterize(chunk);
        let (out, mut stats) = self.compact(ctx);
        stats.cells_in = chunk.len();
        debug!(
            cells_in = stats.cells_in,
            cells_out = stats.cells_out,
            solid_voxels = stats.solid_voxels,
            "optimized cell chunk"
        );
        (out, stats)
    }

    /// Covers the current grid of `ctx` with boxes.
    ///
    /// Clears the covered grid first, so it can be called again on the same
    /// contents.
    pub fn compact(&self, ctx: &mut OptimizerContext) -> (CellChunk, OptimizerStats) {
        let mut out = CellChunk::new();
        let mut stats = OptimizerStats::default();
        let Some((lo, hi)) = ctx.dirty else {
            return (out, stats);
        };
        ctx.fill_covered(lo, hi, false);

        for x in lo[0]..hi[0] {
            for y in lo[1]..hi[1] {
                let mut z = lo[2];
                while z < hi[2] {
                    let seed = [x, y, z];
                    let material = ctx.material[grid_index(seed)];
                    if material == VOID_MATERIAL || ctx.is_covered(seed) {
                        z += 1;
                        continue;
                    }

                    let grown = self.grow(ctx, seed, material);
                    let faces = self.visible_faces(ctx, grown.lo, grown.hi);
                    debug_assert_eq!(faces, grown.exposed);

                    ctx.fill_covered(grown.lo, grown.hi, true);
                    let cell = Cell::with_faces(
                        grown.lo.map(|v| v as u8),
                        grown.hi.map(|v| v as u8),
                        material,
                        faces,
                    );
                    stats.solid_voxels += cell.volume() as usize;
                    if out.add(cell).is_some() {
                        stats.cells_out += 1;
                    }
                    z = grown.hi[2];
                }
            }
        }
        (out, stats)
    }

    fn grow(&self, ctx: &OptimizerContext, seed: [usize; 3], material: u16) -> GrowBox {
        let mut grown = GrowBox {
            lo: seed,
            hi: seed.map(|v| v + 1),
            material,
            exposed: self.exposure(ctx, seed),
        };
        loop {
            let mut progressed = false;
            for axis in 0..3 {
                progressed |= self.try_grow(ctx, &mut grown, axis);
            }
            if !progressed {
                return grown;
            }
        }
    }

    /// Extends `grown` by one slab along `+axis` if the slab qualifies.
    fn try_grow(&self, ctx: &OptimizerContext, grown: &mut GrowBox, axis: usize) -> bool {
        let h = grown.hi[axis];
        if h >= GRID {
            return false;
        }
        let (u, v) = ((axis + 1) % 3, (axis + 2) % 3);
        let far = Face::from_axis(axis, true).bit();
        let mut far_exposed = None;

        for i in grown.lo[u]..grown.hi[u] {
            for j in grown.lo[v]..grown.hi[v] {
                let mut p = [0; 3];
                p[axis] = h;
                p[u] = i;
                p[v] = j;

                let idx = grid_index(p);
                if ctx.material[idx] != grown.material || ctx.covered[idx] {
                    return false;
                }

                let mask = self.exposure(ctx, p);
                for (side, coord) in [(u, i), (v, j)] {
                    let near = Face::from_axis(side, false).bit();
                    let high = Face::from_axis(side, true).bit();
                    if coord == grown.lo[side] && mask & near != grown.exposed & near {
                        return false;
                    }
                    if coord + 1 == grown.hi[side] && mask & high != grown.exposed & high {
                        return false;
                    }
                }

                let bit = mask & far;
                match far_exposed {
                    Some(prev) if prev != bit => return false,
                    _ => far_exposed = Some(bit),
                }
            }
        }

        grown.hi[axis] = h + 1;
        grown.exposed = (grown.exposed & !far) | far_exposed.unwrap_or(0);
        true
    }

    fn is_void(&self, ctx: &OptimizerContext, p: [i64; 3]) -> bool {
        if p.iter().any(|&c| c < 0 || c >= GRID as i64) {
            return self.config.border_is_exposed;
        }
        ctx.material[grid_index(p.map(|c| c as usize))] == VOID_MATERIAL
    }

    /// Faces of one voxel that border void.
    fn exposure(&self, ctx: &OptimizerContext, p: [usize; 3]) -> u8 {
        Face::ALL.iter().fold(0, |mask, &face| {
            let offset = face.offset();
            let neighbour = [0, 1, 2].map(|a| p[a] as i64 + i64::from(offset[a]));
            if self.is_void(ctx, neighbour) {
                mask | face.bit()
            } else {
                mask
            }
        })
    }

    /// A face is visible if the one-voxel slab outside it holds any void.
    fn visible_faces(&self, ctx: &OptimizerContext, lo: [usize; 3], hi: [usize; 3]) -> u8 {
        Face::ALL.iter().fold(0, |mask, &face| {
            let axis = face.axis();
            let (u, v) = ((axis + 1) % 3, (axis + 2) % 3);
            let outside = if face.is_positive() {
                hi[axis] as i64
            } else {
                lo[axis] as i64 - 1
            };
            let any_void = (lo[u]..hi[u]).any(|i| {
                (lo[v]..hi[v]).any(|j| {
                    let mut p = [0i64; 3];
                    p[axis] = outside;
                    p[u] = i as i64;
                    p[v] = j as i64;
                    self.is_void(ctx, p)
                })
            });
            if any_void {
                mask | face.bit()
            } else {
                mask
            }
        })
    }
}
