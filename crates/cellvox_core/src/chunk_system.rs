//! # Chunk System
//!
//! Sparse map from chunk-grid positions to loaded chunk payloads.
//!
//! ## Chunk Grid
//!
//! Chunks are 255 units wide. A chunk position is the world position of
//! its lower corner, always a multiple of 255, computed with floor
//! division so that `-1` belongs to the chunk at `-255`.

use std::collections::HashMap;

use tracing::debug;

use crate::math::Vec3;
use crate::payload::ChunkPayload;

/// Chunk edge length in world units.
pub const CHUNK_SIZE: i32 = 255;

/// Lower corner of a chunk, a multiple of `CHUNK_SIZE` on every axis.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkPos {
    x: i32,
    y: i32,
    z: i32,
}

impl ChunkPos {
    /// Chunk containing the integer world position.
    #[inline]
    #[must_use]
    pub const fn containing(world: [i32; 3]) -> Self {
        Self {
            x: world[0].div_euclid(CHUNK_SIZE) * CHUNK_SIZE,
            y: world[1].div_euclid(CHUNK_SIZE) * CHUNK_SIZE,
            z: world[2].div_euclid(CHUNK_SIZE) * CHUNK_SIZE,
        }
    }

    /// Chunk containing a floating-point world position.
    #[must_use]
    pub fn containing_point(world: Vec3) -> Self {
        Self::containing([
            world.x.floor() as i32,
            world.y.floor() as i32,
            world.z.floor() as i32,
        ])
    }

    /// Chunk at grid index `(i, j, k)`, i.e. world corner `(i, j, k) * 255`.
    #[inline]
    #[must_use]
    pub const fn from_grid(i: i32, j: i32, k: i32) -> Self {
        Self {
            x: i * CHUNK_SIZE,
            y: j * CHUNK_SIZE,
            z: k * CHUNK_SIZE,
        }
    }

    /// World position of the lower corner.
    #[inline]
    #[must_use]
    pub const fn to_array(self) -> [i32; 3] {
        [self.x, self.y, self.z]
    }

    /// Grid index of the chunk.
    #[inline]
    #[must_use]
    pub const fn grid(self) -> [i32; 3] {
        [self.x / CHUNK_SIZE, self.y / CHUNK_SIZE, self.z / CHUNK_SIZE]
    }

    /// World-space box covered by the chunk.
    #[must_use]
    pub const fn bounds(self) -> WorldBox {
        WorldBox::new(
            [self.x, self.y, self.z],
            [self.x + CHUNK_SIZE, self.y + CHUNK_SIZE, self.z + CHUNK_SIZE],
        )
    }
}

/// Half-open world-space box `[min, max)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct WorldBox {
    /// Inclusive lower corner.
    pub min: [i32; 3],
    /// Exclusive upper corner.
    pub max: [i32; 3],
}

impl WorldBox {
    /// Creates a box from its corners.
    #[inline]
    #[must_use]
    pub const fn new(min: [i32; 3], max: [i32; 3]) -> Self {
        Self { min, max }
    }

    /// True if some axis has `max <= min`.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.max[0] <= self.min[0] || self.max[1] <= self.min[1] || self.max[2] <= self.min[2]
    }

    /// Overlap of two boxes, `None` if they share no volume.
    #[must_use]
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        let out = Self::new(
            [0, 1, 2].map(|a| self.min[a].max(other.min[a])),
            [0, 1, 2].map(|a| self.max[a].min(other.max[a])),
        );
        (!out.is_empty()).then_some(out)
    }
}

/// Sparse map of loaded chunks keyed by chunk position.
pub struct ChunkSystem<T> {
    mapping: HashMap<ChunkPos, T>,
}

impl<T> Default for ChunkSystem<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ChunkSystem<T> {
    /// Creates an empty system.
    #[must_use]
    pub fn new() -> Self {
        Self { mapping: HashMap::new() }
    }

    /// Chunk position containing a world position.
    #[inline]
    #[must_use]
    pub const fn chunk_pos_of(world: [i32; 3]) -> ChunkPos {
        ChunkPos::containing(world)
    }

    /// Number of loaded chunks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    /// True if no chunk is loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }

    /// Loads `chunk` at `pos`, taking ownership.
    ///
    /// Any chunk already at `pos` is unloaded first and returned.
    pub fn load(&mut self, pos: ChunkPos, chunk: T) -> Option<T> {
        let previous = self.unload(pos);
        debug!(pos = ?pos.to_array(), replaced = previous.is_some(), "loading chunk");
        self.mapping.insert(pos, chunk);
        previous
    }

    /// Removes and returns the chunk at `pos`.
    ///
    /// Callers must not unload a chunk whose packed bytes are still being
    /// transferred.
    pub fn unload(&mut self, pos: ChunkPos) -> Option<T> {
        let removed = self.mapping.remove(&pos);
        if removed.is_some() {
            debug!(pos = ?pos.to_array(), "unloaded chunk");
        }
        removed
    }

    /// Chunk loaded at `pos`.
    #[must_use]
    pub fn get(&self, pos: ChunkPos) -> Option<&T> {
        self.mapping.get(&pos)
    }

    /// Mutable chunk loaded at `pos`.
    pub fn get_mut(&mut self, pos: ChunkPos) -> Option<&mut T> {
        self.mapping.get_mut(&pos)
    }

    /// Chunk at `pos`, loading `make()` first if none is loaded.
    pub fn get_or_load_with(&mut self, pos: ChunkPos, make: impl FnOnce() -> T) -> &mut T {
        self.mapping.entry(pos).or_insert_with(|| {
            debug!(pos = ?pos.to_array(), "loading new chunk");
            make()
        })
    }

    /// Chunk containing a world position.
    #[must_use]
    pub fn get_at(&self, world: [i32; 3]) -> Option<&T> {
        self.get(ChunkPos::containing(world))
    }

    /// Mutable chunk containing a world position.
    pub fn get_at_mut(&mut self, world: [i32; 3]) -> Option<&mut T> {
        self.get_mut(ChunkPos::containing(world))
    }

    /// One entry per chunk intersecting `region`, `None` where unloaded.
    #[must_use]
    pub fn get_all_at(&self, region: &WorldBox) -> Vec<(ChunkPos, Option<&T>)> {
        Self::chunk_positions_at(region)
            .into_iter()
            .map(|pos| (pos, self.mapping.get(&pos)))
            .collect()
    }

    /// Every chunk position intersecting `region`, including partially
    /// covered chunks. Empty for an empty region.
    #[must_use]
    pub fn chunk_positions_at(region: &WorldBox) -> Vec<ChunkPos> {
        if region.is_empty() {
            return Vec::new();
        }

        let start = ChunkPos::containing(region.min).to_array();
        let steps = [0, 1, 2].map(|a| {
            let mut starts = Vec::new();
            let mut c = start[a];
            while c < region.max[a] {
                starts.push(c);
                c += CHUNK_SIZE;
            }
            starts
        });

        let mut out = Vec::with_capacity(steps[0].len() * steps[1].len() * steps[2].len());
        for &x in &steps[0] {
            for &y in &steps[1] {
                for &z in &steps[2] {
                    out.push(ChunkPos { x, y, z });
                }
            }
        }
        out
    }

    /// Loaded chunks with their positions.
    pub fn iter(&self) -> impl Iterator<Item = (ChunkPos, &T)> {
        self.mapping.iter().map(|(p, c)| (*p, c))
    }

    /// Loaded chunks with their positions, mutably.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (ChunkPos, &mut T)> {
        self.mapping.iter_mut().map(|(p, c)| (*p, c))
    }

    /// Positions of every loaded chunk.
    pub fn positions(&self) -> impl Iterator<Item = ChunkPos> + '_ {
        self.mapping.keys().copied()
    }
}

impl<T: ChunkPayload> ChunkSystem<T> {
    /// Positions of loaded chunks whose payload changed since last packed.
    #[must_use]
    pub fn dirty_positions(&self) -> Vec<ChunkPos> {
        let mut out: Vec<ChunkPos> = self
            .mapping
            .iter()
            .filter(|(_, c)| c.is_dirty())
            .map(|(p, _)| *p)
            .collect();
        out.sort_unstable();
        out
    }
}
