//! Region assembly module.
//!
//! This module turns a populated [`ChunkStore`] into [`Region`]s, one per
//! filesystem id, by resolving duplicate chunks and concatenating the
//! survivors in chunk id order.
//!
//! ## Resolution rule
//!
//! Only the first recorded copy of a `(filesystem id, chunk id)` pair is ever
//! inspected. If that copy is a tombstone the chunk is left out, even when a
//! later copy is live.
//!
//! ## Extensibility
//!
//! The [`Classifier`] trait decides which extension a region is written with.

mod classify;

use crate::store::ChunkStore;
use std::fmt;
use tracing::{debug, trace};

pub use classify::{Classifier, Extension, MagicClassifier, PlainClassifier};

/// Length of the device header removed by [`AssemblerConfig::strip_header`]
pub const HEADER_SIZE: usize = 4;

/// Configuration for region assembly
#[derive(Debug, Clone, Default)]
pub struct AssemblerConfig {
    /// Drop the leading [`HEADER_SIZE`] bytes of every region
    pub strip_header: bool,
}

impl AssemblerConfig {
    /// Creates a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether the device header is stripped
    pub fn strip_header(mut self, strip: bool) -> Self {
        self.strip_header = strip;
        self
    }
}

/// A reconstructed file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    /// Filesystem id the region was assembled from
    pub filesystem_id: u16,
    /// Assembled bytes
    pub data: Vec<u8>,
}

impl Region {
    /// Returns the data as a slice
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Returns the assembled length in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the region holds no bytes
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Output file name for this region with the given extension
    pub fn file_name(&self, extension: Extension) -> String {
        format!("region_{:05}.{}", self.filesystem_id, extension)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fs {} ({} bytes)", self.filesystem_id, self.data.len())
    }
}

/// Builds regions from a chunk store
#[derive(Debug, Clone, Default)]
pub struct RegionAssembler {
    config: AssemblerConfig,
}

impl RegionAssembler {
    /// Creates a new assembler with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new assembler with custom configuration
    pub fn with_config(config: AssemblerConfig) -> Self {
        Self { config }
    }

    /// Assembles every non-empty region, in ascending filesystem id order
    pub fn assemble(&self, store: &ChunkStore) -> Vec<Region> {
        let regions: Vec<Region> = store
            .filesystem_ids()
            .filter_map(|id| self.assemble_one(store, id))
            .collect();

        debug!(
            "Assembled {} region(s) from {} filesystem id(s)",
            regions.len(),
            store.filesystem_count()
        );
        regions
    }

    /// Assembles a single filesystem id, returning `None` if it comes out empty
    pub fn assemble_one(&self, store: &ChunkStore, filesystem_id: u16) -> Option<Region> {
        let mut data = Vec::new();

        for (chunk_id, entries) in store.chunks(filesystem_id) {
            let Some(first) = entries.first() else {
                continue;
            };

            if first.is_tombstone() {
                trace!(
                    "fs {} chunk {:#x} is tombstoned at {:#09x}",
                    filesystem_id,
                    chunk_id,
                    first.offset
                );
                continue;
            }

            data.extend_from_slice(&first.payload);
        }

        if self.config.strip_header {
            data.drain(..HEADER_SIZE.min(data.len()));
        }

        if data.is_empty() {
            trace!("fs {} is empty, skipping", filesystem_id);
            return None;
        }

        Some(Region {
            filesystem_id,
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::Chunk;
    use pretty_assertions::assert_eq;

    fn store(chunks: &[(u16, u8, u16, &[u8])]) -> ChunkStore {
        let mut store = ChunkStore::new();
        for (i, (fs, id, flag, payload)) in chunks.iter().enumerate() {
            store.record(Chunk {
                filesystem_id: *fs,
                chunk_id: *id,
                flag: *flag,
                payload: payload.to_vec(),
                offset: i as u64 * 0x10,
            });
        }
        store
    }

    #[test]
    fn test_ascending_concatenation() {
        let store = store(&[(1, 5, 0, b"five"), (1, 1, 0, b"one"), (1, 3, 0, b"three")]);
        let regions = RegionAssembler::new().assemble(&store);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].data, b"onethreefive".to_vec());
    }

    #[test]
    fn test_numeric_chunk_order() {
        let store = store(&[(1, 10, 0, b"ten"), (1, 2, 0, b"two")]);
        let regions = RegionAssembler::new().assemble(&store);
        assert_eq!(regions[0].data, b"twoten".to_vec());
    }

    #[test]
    fn test_first_recorded_wins() {
        let store = store(&[(1, 0, 0, b"old"), (1, 0, 0, b"new"), (1, 0, 1, b"dead")]);
        let regions = RegionAssembler::new().assemble(&store);
        assert_eq!(regions[0].data, b"old".to_vec());
    }

    #[test]
    fn test_tombstone_ignores_later_duplicates() {
        let store = store(&[
            (1, 0, 0, b"zero"),
            (1, 1, 1, b"gone"),
            (1, 2, 0, b"two"),
            (1, 1, 0, b"live"),
            (1, 1, 2, b"other"),
        ]);
        let regions = RegionAssembler::new().assemble(&store);
        assert_eq!(regions[0].data, b"zerotwo".to_vec());
    }

    #[test]
    fn test_non_tombstone_flags_are_included() {
        let store = store(&[(1, 0, 2, b"a"), (1, 1, 0xFFFF, b"b")]);
        let regions = RegionAssembler::new().assemble(&store);
        assert_eq!(regions[0].data, b"ab".to_vec());
    }

    #[test]
    fn test_all_tombstoned_region_is_suppressed() {
        let store = store(&[(1, 0, 1, b"x"), (1, 1, 1, b"y"), (2, 0, 0, b"z")]);
        let regions = RegionAssembler::new().assemble(&store);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].filesystem_id, 2);
    }

    #[test]
    fn test_empty_payloads_are_suppressed() {
        let store = store(&[(0, 0, 0, b""), (0, 1, 0, b"")]);
        assert!(RegionAssembler::new().assemble(&store).is_empty());
    }

    #[test]
    fn test_strip_header() {
        let store = store(&[
            (1, 0, 0, &[0x00, 0x11, 0x22, 0x33, 0xDE, 0xAD, 0xBE, 0xEF]),
            (2, 0, 0, &[0x01, 0x02, 0x03]),
        ]);
        let assembler = RegionAssembler::with_config(AssemblerConfig::new().strip_header(true));
        let regions = assembler.assemble(&store);

        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].data, vec![0xDE, 0xAD, 0xBE, 0xEF]);
    }

    #[test]
    fn test_strip_header_spans_chunks() {
        let store = store(&[(1, 0, 0, b"ab"), (1, 1, 0, b"cdef")]);
        let assembler = RegionAssembler::with_config(AssemblerConfig::new().strip_header(true));
        assert_eq!(assembler.assemble(&store)[0].data, b"ef".to_vec());
    }

    #[test]
    fn test_region_file_name() {
        let region = Region {
            filesystem_id: 1,
            data: vec![1],
        };
        assert_eq!(region.file_name(Extension::Bin), "region_00001.bin");
        let region = Region {
            filesystem_id: 65535,
            data: vec![1],
        };
        assert_eq!(region.file_name(Extension::Jar), "region_65535.jar");
    }
}
