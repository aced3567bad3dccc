//! # Light Chunks
//!
//! Point lights of one chunk, packed through the same arena as cells.
//! Each light is an 8-byte record `[x, y, z, radius, r, g, b, intensity]`
//! in chunk-local space.

use bytemuck::{cast_slice, try_cast_slice, Pod, Zeroable};
use tracing::warn;

use crate::error::{ChunkError, ChunkResult};
use crate::payload::ChunkPayload;

/// A point light. Exactly 8 bytes.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct Light {
    /// Chunk-local position.
    pub pos: [u8; 3],
    /// Falloff radius in voxels.
    pub radius: u8,
    /// RGB color.
    pub color: [u8; 3],
    /// Brightness.
    pub intensity: u8,
}

const _: () = assert!(std::mem::size_of::<Light>() == 8);

impl Light {
    /// Creates a light.
    #[must_use]
    pub const fn new(pos: [u8; 3], radius: u8, color: [u8; 3], intensity: u8) -> Self {
        Self { pos, radius, color, intensity }
    }
}

/// Lights of one chunk.
#[derive(Clone, Debug, Default)]
pub struct LightChunk {
    lights: Vec<Light>,
    dirty: bool,
}

impl LightChunk {
    /// Creates an empty light chunk.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a light and returns its index.
    pub fn add(&mut self, light: Light) -> usize {
        self.lights.push(light);
        self.dirty = true;
        self.lights.len() - 1
    }

    /// Removes the light at `index`. The last light takes its place.
    pub fn remove(&mut self, index: usize) -> Option<Light> {
        if index >= self.lights.len() {
            return None;
        }
        self.dirty = true;
        Some(self.lights.swap_remove(index))
    }

    /// All lights.
    #[inline]
    #[must_use]
    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    /// Number of lights.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.lights.len()
    }

    /// True if the chunk has no lights.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }
}

impl ChunkPayload for LightChunk {
    const RECORD_SIZE: usize = std::mem::size_of::<Light>();

    fn serialize_into(&self, out: Option<&mut [u8]>) -> usize {
        let bytes: &[u8] = cast_slice(&self.lights);
        if let Some(out) = out {
            out[..bytes.len()].copy_from_slice(bytes);
        }
        bytes.len()
    }

    fn deserialize_from(&mut self, bytes: &[u8]) -> ChunkResult<()> {
        let lights: &[Light] = try_cast_slice(bytes).map_err(|_| {
            warn!(len = bytes.len(), "rejecting malformed light payload");
            ChunkError::MalformedPayload {
                len: bytes.len(),
                record_size: Self::RECORD_SIZE,
            }
        })?;
        self.lights = lights.to_vec();
        self.dirty = true;
        Ok(())
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
