//! # Ray Casting
//!
//! DDA-style stepping through a uniform voxel grid. The same stepper walks
//! cells inside a chunk (voxel size 1) and chunks inside the world (voxel
//! size 255).
//!
//! ## Boundary Convention
//!
//! After a step the coordinate on the crossed axis is snapped exactly onto
//! the boundary. A point sitting on a boundary belongs to the voxel the ray
//! is heading into (see `voxel_ahead`).

use crate::cell::{Cell, Face};
use crate::cell_chunk::{CellChunk, CellId};
use crate::chunk_system::{ChunkPos, ChunkSystem, CHUNK_SIZE};
use crate::math::Vec3;

/// Minimum distance advanced per step.
pub const STEP_EPSILON: f32 = 1e-4;

/// Direction components smaller than this never reach a boundary.
const DIR_EPSILON: f32 = 1e-7;

/// Upper bound on chunk crossings of one world ray.
pub const MAX_CHUNK_STEPS: usize = 4096;

/// A cell hit inside one chunk, in chunk-local space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChunkHit {
    /// Id of the hit cell.
    pub id: CellId,
    /// Copy of the hit cell.
    pub cell: Cell,
    /// Point where the ray entered the hit voxel.
    pub point: Vec3,
    /// Boundary crossed to enter the voxel, `None` if the ray started in it.
    pub face: Option<Face>,
}

/// A cell hit in world space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WorldHit {
    /// Chunk holding the hit cell.
    pub chunk: ChunkPos,
    /// Id of the hit cell within its chunk.
    pub id: CellId,
    /// Copy of the hit cell.
    pub cell: Cell,
    /// World-space hit point.
    pub point: Vec3,
    /// Distance from the ray origin.
    pub distance: f32,
    /// Boundary crossed to enter the voxel, `None` if the ray started in it.
    pub face: Option<Face>,
}

/// Advances `point` along `dir` to the next boundary of a grid of
/// `voxel_size` cubes and reports the face crossed.
///
/// Ties between axes go to x, then y, then z. Steps shorter than
/// `STEP_EPSILON` are lengthened to it so repeated calls always progress.
#[must_use]
pub fn next_boundary(point: Vec3, dir: Vec3, voxel_size: f32) -> (Vec3, Face) {
    let mut best_t = f32::INFINITY;
    let mut best_axis = 0;
    let mut best_boundary = point.x;

    for axis in 0..3 {
        let d = dir.axis(axis);
        if d.abs() < DIR_EPSILON {
            continue;
        }
        let p = point.axis(axis);
        let cell = p / voxel_size;
        let boundary = if d > 0.0 {
            (cell.floor() + 1.0) * voxel_size
        } else {
            (cell.ceil() - 1.0) * voxel_size
        };
        let t = (boundary - p) / d;
        if t < best_t {
            best_t = t;
            best_axis = axis;
            best_boundary = boundary;
        }
    }

    if !best_t.is_finite() {
        // No usable direction component: nudge forward and report +X.
        return (point + dir * STEP_EPSILON, Face::PosX);
    }

    let t = best_t.max(STEP_EPSILON);
    let next = (point + dir * t).with_axis(best_axis, best_boundary);
    let positive = dir.axis(best_axis) > 0.0;
    (next, Face::from_axis(best_axis, positive))
}

/// Integer voxel the ray is about to traverse from `point`.
///
/// On a boundary, a negative direction component selects the voxel below.
#[must_use]
pub fn voxel_ahead(point: Vec3, dir: Vec3) -> [i32; 3] {
    [0, 1, 2].map(|axis| {
        let p = point.axis(axis);
        let f = p.floor();
        if p == f && dir.axis(axis) < 0.0 {
            f as i32 - 1
        } else {
            f as i32
        }
    })
}

/// Casts a world-space ray through every loaded chunk it crosses.
///
/// Chunks are walked at chunk granularity; each loaded chunk is cast at cell
/// granularity. Unloaded chunks are skipped. Returns the first hit within
/// `max_distance` of `origin`, giving up after `MAX_CHUNK_STEPS` chunks.
#[must_use]
pub fn cast_world(
    system: &ChunkSystem<CellChunk>,
    origin: Vec3,
    dir: Vec3,
    max_distance: f32,
) -> Option<WorldHit> {
    let dir = dir.normalized();
    if dir == Vec3::ZERO {
        return None;
    }

    let chunk_size = CHUNK_SIZE as f32;
    let mut point = origin;
    let mut crossed: Option<Face> = None;
    for _ in 0..MAX_CHUNK_STEPS {
        if point.distance(origin) > max_distance {
            break;
        }
        let voxel = voxel_ahead(point, dir);
        let pos = ChunkPos::containing(voxel);

        if let Some(chunk) = system.get(pos) {
            let base = Vec3::from_i32(pos.to_array());
            if let Some(hit) = chunk.ray_cast(point - base, dir) {
                let world_point = hit.point + base;
                let distance = world_point.distance(origin);
                if distance > max_distance {
                    return None;
                }
                return Some(WorldHit {
                    chunk: pos,
                    id: hit.id,
                    cell: hit.cell,
                    point: world_point,
                    distance,
                    face: hit.face.or(crossed),
                });
            }
        }

        let (next, face) = next_boundary(point, dir, chunk_size);
        point = next;
        crossed = Some(face);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_boundary_positive() {
        let (p, face) = next_boundary(Vec3::new(0.25, 0.5, 0.5), Vec3::X, 1.0);
        assert_eq!(face, Face::PosX);
        assert_eq!(p.x, 1.0);
        assert!((p.y - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_next_boundary_negative_from_boundary() {
        let (p, face) = next_boundary(Vec3::new(5.0, 0.5, 0.5), Vec3::new(-1.0, 0.0, 0.0), 1.0);
        assert_eq!(face, Face::NegX);
        assert_eq!(p.x, 4.0);
    }

    #[test]
    fn test_next_boundary_picks_nearest_axis() {
        let dir = Vec3::new(1.0, 1.0, 0.0).normalized();
        let (p, face) = next_boundary(Vec3::new(0.9, 0.5, 0.5), dir, 1.0);
        assert_eq!(face, Face::PosX);
        assert_eq!(p.x, 1.0);
        assert!((p.y - 0.6).abs() < 1e-5);
    }

    #[test]
    fn test_next_boundary_tie_prefers_x() {
        let dir = Vec3::new(1.0, 1.0, 1.0).normalized();
        let (_, face) = next_boundary(Vec3::new(0.5, 0.5, 0.5), dir, 1.0);
        assert_eq!(face, Face::PosX);

        let dir = Vec3::new(0.0, -1.0, -1.0).normalized();
        let (_, face) = next_boundary(Vec3::new(0.5, 0.5, 0.5), dir, 1.0);
        assert_eq!(face, Face::NegY);
    }

    #[test]
    fn test_next_boundary_chunk_granularity() {
        let (p, face) = next_boundary(Vec3::new(10.0, 0.0, 0.0), Vec3::Z, 255.0);
        assert_eq!(face, Face::PosZ);
        assert_eq!(p.z, 255.0);

        let (p, _) = next_boundary(Vec3::new(0.0, 0.0, -1.0), Vec3::new(0.0, 0.0, -1.0), 255.0);
        assert_eq!(p.z, -255.0);
    }

    #[test]
    fn test_next_boundary_always_progresses() {
        let dir = Vec3::new(1.0, 1e-9, 0.0);
        let start = Vec3::new(3.0 - 1e-7, 0.0, 0.0);
        let (p, _) = next_boundary(start, dir, 1.0);
        assert!(p.x > start.x);

        let (p, _) = next_boundary(start, Vec3::ZERO, 1.0);
        assert_eq!(p, start);
    }

    #[test]
    fn test_voxel_ahead_on_boundary() {
        let p = Vec3::new(4.0, 2.5, 7.0);
        assert_eq!(voxel_ahead(p, Vec3::new(1.0, 0.0, 1.0)), [4, 2, 7]);
        assert_eq!(voxel_ahead(p, Vec3::new(-1.0, 0.0, -1.0)), [3, 2, 6]);
    }

    #[test]
    fn test_cast_world_crosses_chunks() {
        let mut system = ChunkSystem::new();
        let mut far = CellChunk::new();
        far.add(Cell::new([10, 0, 0], [20, 4, 4], 5));
        let far_pos = ChunkPos::containing([300, 0, 0]);
        system.load(far_pos, far);

        let hit = cast_world(&system, Vec3::new(-100.5, 1.5, 1.5), Vec3::X, 1000.0).unwrap();
        assert_eq!(hit.chunk, far_pos);
        assert_eq!(hit.cell.material(), 5);
        assert!((hit.point.x - 265.0).abs() < 1e-3);
        assert!((hit.distance - 365.5).abs() < 1e-3);
    }

    #[test]
    fn test_cast_world_negative_and_out_of_range() {
        let mut system = ChunkSystem::new();
        let mut chunk = CellChunk::new();
        chunk.add(Cell::new([250, 0, 0], [254, 4, 4], 9));
        system.load(ChunkPos::containing([-1, 0, 0]), chunk);

        let dir = Vec3::new(-1.0, 0.0, 0.0);
        let hit = cast_world(&system, Vec3::new(50.5, 1.5, 1.5), dir, 100.0).unwrap();
        assert!((hit.point.x - -1.0).abs() < 1e-3);
        assert_eq!(hit.face, Some(Face::NegX));

        assert!(cast_world(&system, Vec3::new(50.5, 1.5, 1.5), dir, 10.0).is_none());
        assert!(cast_world(&system, Vec3::new(50.5, 1.5, 1.5), Vec3::X, 1000.0).is_none());
    }

    #[test]
    fn test_cast_world_unbounded_distance_terminates() {
        let system = ChunkSystem::new();
        let origin = Vec3::new(0.5, 0.5, 0.5);
        assert!(cast_world(&system, origin, Vec3::X, f32::INFINITY).is_none());
        assert!(cast_world(&system, origin, Vec3::new(1.0, 1.0, 1.0), f32::MAX).is_none());
    }
}
