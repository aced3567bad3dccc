//! # CELLVOX Core
//!
//! Sparse, chunked, mutable voxel volumes built from axis-aligned boxes
//! ("cells") instead of per-voxel storage.
//!
//! ## Core Components
//!
//! - `Cell`: a box in 0..255 chunk-local space, a material and a face mask
//! - `MiniChunk`: 16x16x16 bucket indexing the cells that overlap it
//! - `CellChunk`: stable-id cell storage with slot recycling and queries
//! - `ChunkSystem`: sparse map from 255-aligned chunk positions to chunks
//! - `ChunkBuffer`: first-fit arena packing chunk payloads for upload
//! - `raycast`: DDA boundary stepper plus chunk and world ray casts
//! - `ChunkOptimizer`: greedy box-merge compaction of a chunk
//!
//! ## Example
//!
//! ```rust,ignore
//! use cellvox_core::{Cell, ChunkBuffer, ChunkPos, ChunkSystem, CellChunk};
//!
//! let mut system: ChunkSystem<CellChunk> = ChunkSystem::new();
//! let mut chunk = CellChunk::new();
//! chunk.add(Cell::new([0, 0, 0], [4, 4, 4], 7));
//! system.load(ChunkPos::containing([0, 0, 0]), chunk);
//!
//! let mut arena = ChunkBuffer::default();
//! arena.sync(&mut system);
//! for span in arena.take_uploads() {
//!     // hand arena.bytes()[span.range()] to the upload path
//! }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod cell;
pub mod cell_chunk;
pub mod chunk_buffer;
pub mod chunk_system;
pub mod config;
pub mod edit;
pub mod error;
pub mod light;
pub mod math;
pub mod mini_chunk;
pub mod optimizer;
pub mod payload;
pub mod raycast;

pub use cell::{Cell, Face, ALL_FACES, CELL_RECORD_SIZE};
pub use cell_chunk::{CellChunk, CellId, CHUNK_EXTENT};
pub use chunk_buffer::{BufferEntry, ChunkBuffer, UploadSpan};
pub use chunk_system::{ChunkPos, ChunkSystem, WorldBox, CHUNK_SIZE};
pub use config::{ArenaConfig, EngineConfig, OptimizerConfig, RayConfig};
pub use edit::{ChunkEdit, WorldEdit};
pub use error::{ChunkError, ChunkResult};
pub use light::{Light, LightChunk};
pub use math::Vec3;
pub use mini_chunk::{MiniChunk, MINI_CHUNK_SIZE};
pub use optimizer::{ChunkOptimizer, OptimizerContext, OptimizerStats, VOID_MATERIAL};
pub use payload::ChunkPayload;
pub use raycast::{cast_world, next_boundary, ChunkHit, WorldHit};
