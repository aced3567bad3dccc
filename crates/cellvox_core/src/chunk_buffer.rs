//! # Chunk Buffer (Arena Packer)
//!
//! Linearizes the payloads of many chunks into one contiguous, growable
//! byte region so the renderer can upload it and draw one span per chunk.
//!
//! ## Allocation Policy
//!
//! - Records are kept sorted by offset; zero-size records are pruned.
//! - Placement is first-fit: the first gap between records that is large
//!   enough wins, else the region right after the last record.
//! - Updates free the old region and place the payload again; nothing is
//!   resized in place.
//! - A placement past the end of the backing store grows it to
//!   `(offset + size) * growth_factor`.
//!
//! Allocation and free are O(n) in the number of resident chunks.
//!
//! ## Upload Contract
//!
//! Bytes written since the last `take_uploads` are reported as spans. A
//! span stays valid until the next mutating call on the buffer.

use std::marker::PhantomData;
use std::ops::Range;

use tracing::{debug, trace};

use crate::chunk_system::{ChunkPos, ChunkSystem};
use crate::config::ArenaConfig;
use crate::payload::ChunkPayload;

/// Placement of one chunk's payload in the backing store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BufferEntry {
    /// Byte offset of the payload.
    pub offset: usize,
    /// Payload length in bytes.
    pub byte_size: usize,
    /// Chunk the payload belongs to.
    pub chunk_pos: ChunkPos,
}

impl BufferEntry {
    /// One past the last byte.
    #[inline]
    #[must_use]
    pub const fn end(&self) -> usize {
        self.offset + self.byte_size
    }

    /// Byte range in the backing store.
    #[inline]
    #[must_use]
    pub const fn range(&self) -> Range<usize> {
        self.offset..self.end()
    }
}

/// A byte range of the backing store that must be (re)uploaded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UploadSpan {
    /// Byte offset of the span.
    pub offset: usize,
    /// Length in bytes.
    pub len: usize,
}

impl UploadSpan {
    /// Byte range in the backing store.
    #[inline]
    #[must_use]
    pub const fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.len
    }
}

/// First-fit arena packing chunk payloads of type `T`.
pub struct ChunkBuffer<T> {
    /// Backing store handed to the upload path.
    data: Vec<u8>,
    /// Resident payloads, sorted by offset, never zero-sized.
    entries: Vec<BufferEntry>,
    /// Growth headroom multiplier (>= 1.0).
    growth_factor: f32,
    /// Spans written since the last `take_uploads`.
    pending: Vec<UploadSpan>,
    /// The backing store was reallocated since the last `take_uploads`.
    grown: bool,
    _payload: PhantomData<fn(&T)>,
}

impl<T> Default for ChunkBuffer<T> {
    fn default() -> Self {
        Self::new(&ArenaConfig::default())
    }
}

impl<T> ChunkBuffer<T> {
    /// Creates an arena with the configured initial capacity.
    #[must_use]
    pub fn new(config: &ArenaConfig) -> Self {
        Self {
            data: vec![0; config.initial_capacity],
            entries: Vec::new(),
            growth_factor: config.growth_factor.max(1.0),
            pending: Vec::new(),
            grown: false,
            _payload: PhantomData,
        }
    }

    /// Backing store.
    #[inline]
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Size of the backing store in bytes.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Resident payloads sorted by offset.
    #[inline]
    #[must_use]
    pub fn entries(&self) -> &[BufferEntry] {
        &self.entries
    }

    /// Placement of the payload of `pos`.
    #[must_use]
    pub fn entry(&self, pos: ChunkPos) -> Option<&BufferEntry> {
        self.entries.iter().find(|e| e.chunk_pos == pos)
    }

    /// Payload bytes of `pos`.
    #[must_use]
    pub fn payload(&self, pos: ChunkPos) -> Option<&[u8]> {
        self.entry(pos).map(|e| &self.data[e.range()])
    }

    /// Sum of resident payload sizes.
    #[must_use]
    pub fn used_bytes(&self) -> usize {
        self.entries.iter().map(|e| e.byte_size).sum()
    }

    /// First offset with `size` free bytes.
    ///
    /// Walks the records in offset order and returns the start of the first
    /// large-enough gap, or the end of the last record. The result may lie
    /// past the backing store.
    #[must_use]
    pub fn find_free_region(&self, size: usize) -> usize {
        let mut cursor = 0;
        for entry in &self.entries {
            if entry.offset - cursor >= size {
                return cursor;
            }
            cursor = entry.end();
        }
        cursor
    }

    /// Releases the payload of `pos`. Returns false if it was not resident.
    pub fn free(&mut self, pos: ChunkPos) -> bool {
        let Some(entry) = self.entries.iter_mut().find(|e| e.chunk_pos == pos) else {
            return false;
        };
        entry.byte_size = 0;
        self.prune();
        true
    }

    /// Drops every payload. The backing store keeps its size.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.pending.clear();
    }

    /// Spans to upload since the last call.
    ///
    /// After growth the whole backing store is reported once.
    pub fn take_uploads(&mut self) -> Vec<UploadSpan> {
        if std::mem::take(&mut self.grown) {
            self.pending.clear();
            return vec![UploadSpan { offset: 0, len: self.data.len() }];
        }
        std::mem::take(&mut self.pending)
    }

    fn prune(&mut self) {
        self.entries.retain(|e| e.byte_size > 0);
        self.entries.sort_by_key(|e| e.offset);
    }

    fn ensure_capacity(&mut self, end: usize) {
        if end <= self.data.len() {
            return;
        }
        let target = ((end as f64) * f64::from(self.growth_factor)).ceil() as usize;
        let new_len = target.max(end);
        debug!(from = self.data.len(), to = new_len, "growing chunk arena");
        self.data.resize(new_len, 0);
        self.grown = true;
    }
}

impl<T: ChunkPayload> ChunkBuffer<T> {
    /// Packs the payload of `chunk` for `pos`, replacing any previous one.
    ///
    /// Returns the new placement. An empty payload leaves no record and
    /// yields an entry with `byte_size == 0`.
    pub fn add_or_update(&mut self, chunk: &T, pos: ChunkPos) -> BufferEntry {
        let size = chunk.serialize_into(None);
        self.free(pos);

        let offset = if size == 0 { 0 } else { self.find_free_region(size) };
        let entry = BufferEntry { offset, byte_size: size, chunk_pos: pos };
        if size == 0 {
            return entry;
        }

        self.ensure_capacity(entry.end());
        let written = chunk.serialize_into(Some(&mut self.data[entry.range()]));
        debug_assert_eq!(written, size, "payload size changed between phases");

        let index = self.entries.partition_point(|e| e.offset < offset);
        self.entries.insert(index, entry);
        self.pending.push(UploadSpan { offset, len: size });
        trace!(pos = ?pos.to_array(), offset, size, "packed chunk payload");
        entry
    }

    /// Re-packs every dirty chunk of `system`, clears their dirty flags and
    /// frees payloads of chunks that are no longer loaded.
    ///
    /// Returns the number of chunks packed.
    pub fn sync(&mut self, system: &mut ChunkSystem<T>) -> usize {
        let stale: Vec<ChunkPos> = self
            .entries
            .iter()
            .map(|e| e.chunk_pos)
            .filter(|&p| system.get(p).is_none())
            .collect();
        for pos in stale {
            self.free(pos);
        }

        let dirty = system.dirty_positions();
        for &pos in &dirty {
            if let Some(chunk) = system.get_mut(pos) {
                self.add_or_update(chunk, pos);
                chunk.clear_dirty();
            }
        }
        dirty.len()
    }
}
