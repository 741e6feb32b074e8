//! Builders for synthetic flash dumps used by the unit tests.

use crate::scanner::{
    ChunkDescriptor, BLOCK_SIZE, DESCRIPTOR_SIZE, DIRECTORY_SENTINEL, PAYLOAD_BASE,
    PAYLOAD_SLOT_SIZE, SENTINEL_OFFSET,
};

/// Builds one erased (0xFF filled) physical block with a chunk directory
pub(crate) struct BlockBuilder {
    block: Vec<u8>,
    entries: usize,
}

impl BlockBuilder {
    pub(crate) fn new() -> Self {
        let mut block = vec![0xFF; BLOCK_SIZE];
        block[SENTINEL_OFFSET..SENTINEL_OFFSET + DIRECTORY_SENTINEL.len()]
            .copy_from_slice(&DIRECTORY_SENTINEL);
        Self { block, entries: 0 }
    }

    /// Appends a descriptor and writes its payload into the given slot
    pub(crate) fn chunk(
        mut self,
        filesystem_id: u16,
        chunk_id: u8,
        flag: u16,
        location: u16,
        payload: &[u8],
    ) -> Self {
        let descriptor = ChunkDescriptor {
            chunk_id,
            filesystem_id,
            flag,
            location,
            size: payload.len() as u32,
        };

        let start = PAYLOAD_BASE - location as usize * PAYLOAD_SLOT_SIZE;
        self.block[start..start + payload.len()].copy_from_slice(payload);
        self.raw_descriptor(descriptor.to_bytes())
    }

    /// Appends a descriptor record verbatim
    pub(crate) fn raw_descriptor(mut self, raw: [u8; DESCRIPTOR_SIZE]) -> Self {
        let pos = self.entries * DESCRIPTOR_SIZE;
        self.block[pos..pos + DESCRIPTOR_SIZE].copy_from_slice(&raw);
        self.entries += 1;
        self
    }

    pub(crate) fn without_sentinel(mut self) -> Self {
        self.block[SENTINEL_OFFSET..SENTINEL_OFFSET + DIRECTORY_SENTINEL.len()].fill(0xFF);
        self
    }

    pub(crate) fn build(self) -> Vec<u8> {
        self.block
    }
}

/// Concatenates blocks into a dump
pub(crate) fn dump(blocks: &[Vec<u8>]) -> Vec<u8> {
    blocks.concat()
}
