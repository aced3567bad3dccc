//! # Chunk File
//!
//! Append-only file of chunk records.
//!
//! ```text
//! [b"CVXF"][u32 version][record][record]...
//! ```
//!
//! Every `store` is flushed and synced before its offset is returned.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::store::{decode_block, encode_record, parse_header, ChunkStore, RECORD_HEADER_LEN};

/// Magic bytes for chunk files.
const FILE_MAGIC: &[u8; 4] = b"CVXF";

/// Current chunk file version.
const FILE_VERSION: u32 = 1;

/// Bytes before the first record.
const FILE_HEADER_LEN: u64 = 8;

/// Chunk store backed by an append-only file.
#[derive(Debug)]
pub struct ChunkFile {
    file: File,
    path: PathBuf,
    /// Length of the valid file contents.
    end: u64,
}

impl ChunkFile {
    /// Opens a chunk file, creating it with a fresh header if missing.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Io` if the file cannot be opened or written and
    /// `StoreError::BadHeader` if an existing file has the wrong magic or
    /// version.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        let len = file.metadata()?.len();
        if len == 0 {
            file.write_all(FILE_MAGIC)?;
            file.write_all(&FILE_VERSION.to_le_bytes())?;
            file.flush()?;
            file.sync_data()?;
            info!(path = %path.display(), "created chunk file");
            return Ok(Self { file, path, end: FILE_HEADER_LEN });
        }

        let mut header = [0u8; FILE_HEADER_LEN as usize];
        if len < FILE_HEADER_LEN {
            return Err(StoreError::BadHeader(format!("file is only {len} bytes")));
        }
        file.read_exact(&mut header)?;
        if &header[..4] != FILE_MAGIC {
            warn!(path = %path.display(), "chunk file magic mismatch");
            return Err(StoreError::BadHeader("invalid magic".to_string()));
        }
        let version = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        if version != FILE_VERSION {
            return Err(StoreError::BadHeader(format!("unsupported version {version}")));
        }

        debug!(path = %path.display(), len, "opened chunk file");
        Ok(Self { file, path, end: len })
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Length of the file in bytes.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.end
    }

    /// True if the file holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.end == FILE_HEADER_LEN
    }
}

impl ChunkStore for ChunkFile {
    fn store(&mut self, payload: &[u8]) -> StoreResult<u64> {
        let record = encode_record(payload);
        let offset = self.end;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(&record)?;
        self.file.flush()?;
        self.file.sync_data()?;
        self.end += record.len() as u64;
        debug!(offset, raw = payload.len(), stored = record.len(), "stored chunk record");
        Ok(offset)
    }

    fn read(&mut self, offset: u64) -> StoreResult<Vec<u8>> {
        let unknown = || StoreError::UnknownOffset(offset);
        let body = offset.checked_add(RECORD_HEADER_LEN as u64).ok_or_else(unknown)?;
        if offset < FILE_HEADER_LEN || body > self.end {
            return Err(unknown());
        }

        let mut header = [0u8; RECORD_HEADER_LEN];
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(&mut header)?;
        let (len, crc) = parse_header(header);
        if body + len as u64 > self.end {
            return Err(unknown());
        }

        let mut block = vec![0u8; len];
        self.file.read_exact(&mut block)?;
        decode_block(offset, crc, &block)
    }
}
