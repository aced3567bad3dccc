//! # CELLVOX Storage
//!
//! Persisted chunk payloads, addressed by the byte offset returned when
//! they were stored.
//!
//! ## Record Format
//!
//! ```text
//! [u32 compressed_len][u32 crc32][lz4 block, uncompressed size prepended]
//! ```
//!
//! All integers are little-endian. The CRC covers the compressed block.
//! `ChunkFile` prefixes the file with `b"CVXF"` and a `u32` version.
//!
//! ## Example
//!
//! ```rust,ignore
//! use cellvox_storage::{load_chunk, save_chunk, ChunkFile};
//!
//! let mut file = ChunkFile::open("world.cvx")?;
//! let offset = save_chunk(&mut file, &chunk)?;
//! let restored: CellChunk = load_chunk(&mut file, offset)?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod error;
pub mod file;
pub mod memory;
pub mod persistence;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use file::ChunkFile;
pub use memory::MemoryChunkStore;
pub use persistence::{load_chunk, save_chunk};
pub use store::ChunkStore;
