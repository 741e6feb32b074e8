//! Accumulation of scanned chunks keyed by filesystem and chunk id.
//!
//! Every copy of a chunk is kept in scan order. Resolving duplicates is the
//! assembler's job, so the store never merges or overwrites entries.

use crate::error::Result;
use crate::scanner::{Chunk, TOMBSTONE_FLAG};
use std::collections::BTreeMap;
use tracing::debug;

/// One recorded copy of a chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkRecord {
    /// Raw status flag from the descriptor
    pub flag: u16,
    /// Payload bytes
    pub payload: Vec<u8>,
    /// Absolute dump offset of the descriptor
    pub offset: u64,
}

impl ChunkRecord {
    /// Returns true if this copy marks the chunk as superseded
    pub fn is_tombstone(&self) -> bool {
        self.flag == TOMBSTONE_FLAG
    }
}

/// All copies of every chunk found in a dump
#[derive(Debug, Clone, Default)]
pub struct ChunkStore {
    filesystems: BTreeMap<u16, BTreeMap<u8, Vec<ChunkRecord>>>,
    records: usize,
}

impl ChunkStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from scanner output, stopping at the first error
    pub fn from_chunks<I>(chunks: I) -> Result<Self>
    where
        I: IntoIterator<Item = Result<Chunk>>,
    {
        let mut store = Self::new();
        for chunk in chunks {
            store.record(chunk?);
        }
        Ok(store)
    }

    /// Appends a chunk copy after any earlier copies of the same key
    pub fn record(&mut self, chunk: Chunk) {
        let entries = self
            .filesystems
            .entry(chunk.filesystem_id)
            .or_default()
            .entry(chunk.chunk_id)
            .or_default();

        if let Some(first) = entries.first() {
            debug!(
                "Duplicate chunk {:#x} of fs {} at {:#09x} (first seen at {:#09x})",
                chunk.chunk_id, chunk.filesystem_id, chunk.offset, first.offset
            );
        }

        entries.push(ChunkRecord {
            flag: chunk.flag,
            payload: chunk.payload,
            offset: chunk.offset,
        });
        self.records += 1;
    }

    /// Filesystem ids in ascending order
    pub fn filesystem_ids(&self) -> impl Iterator<Item = u16> + '_ {
        self.filesystems.keys().copied()
    }

    /// Chunks of a filesystem in ascending chunk id order
    pub fn chunks(&self, filesystem_id: u16) -> impl Iterator<Item = (u8, &[ChunkRecord])> + '_ {
        self.filesystems
            .get(&filesystem_id)
            .into_iter()
            .flat_map(|chunks| chunks.iter().map(|(id, entries)| (*id, entries.as_slice())))
    }

    /// Every recorded copy of one chunk, in scan order
    pub fn entries(&self, filesystem_id: u16, chunk_id: u8) -> &[ChunkRecord] {
        self.filesystems
            .get(&filesystem_id)
            .and_then(|chunks| chunks.get(&chunk_id))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of distinct filesystem ids
    pub fn filesystem_count(&self) -> usize {
        self.filesystems.len()
    }

    /// Total number of recorded copies, duplicates included
    pub fn record_count(&self) -> usize {
        self.records
    }

    /// Returns true if nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.records == 0
    }
}
