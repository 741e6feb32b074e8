//! On-media layout of a chunk directory block.
//!
//! A directory-bearing block looks like this:
//!
//! ```text
//! 0x00000  descriptor 0 (16 bytes)
//! 0x00010  descriptor 1
//! ...      FF FF .. FF  (end-of-directory marker)
//! ...      free space
//! ...      payloads, growing downwards from 0x1FFE0 in 0x80-byte slots
//! 0x1FFF9  55 55 55 FF FF  (directory sentinel)
//! ```
//!
//! Descriptor record:
//!
//! | offset | size | field           |
//! |--------|------|-----------------|
//! | 0x02   | 1    | chunk id        |
//! | 0x03   | 2    | filesystem id   |
//! | 0x06   | 2    | flag            |
//! | 0x08   | 2    | location        |
//! | 0x0C   | 4    | payload size    |
//!
//! All multi-byte fields are little-endian. The remaining bytes are not
//! understood and are ignored.

use std::fmt;
use std::ops::Range;

/// Size of a physical block window
pub const BLOCK_SIZE: usize = 0x20000;

/// Offset of the directory sentinel within a block
pub const SENTINEL_OFFSET: usize = 0x1FFF9;

/// Signature marking a block that carries a chunk directory
pub const DIRECTORY_SENTINEL: [u8; 5] = [0x55, 0x55, 0x55, 0xFF, 0xFF];

/// Size of a single chunk descriptor record
pub const DESCRIPTOR_SIZE: usize = 0x10;

/// Payload offset for `location == 0`
pub const PAYLOAD_BASE: usize = 0x1FFE0;

/// Distance between consecutive payload slots
pub const PAYLOAD_SLOT_SIZE: usize = 0x80;

/// Flag value marking a superseded chunk
pub const TOMBSTONE_FLAG: u16 = 1;

const END_OF_DIRECTORY: [u8; DESCRIPTOR_SIZE] = [0xFF; DESCRIPTOR_SIZE];

/// A decoded 16-byte chunk descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkDescriptor {
    /// Position of the chunk within its file
    pub chunk_id: u8,
    /// File the chunk belongs to
    pub filesystem_id: u16,
    /// Status flag, `1` marks a tombstone
    pub flag: u16,
    /// Payload slot index counted down from the end of the block
    pub location: u16,
    /// Payload length in bytes
    pub size: u32,
}

impl ChunkDescriptor {
    /// Decodes a raw descriptor record
    pub fn from_bytes(raw: &[u8; DESCRIPTOR_SIZE]) -> Self {
        Self {
            chunk_id: raw[0x02],
            filesystem_id: u16::from_le_bytes([raw[0x03], raw[0x04]]),
            flag: u16::from_le_bytes([raw[0x06], raw[0x07]]),
            location: u16::from_le_bytes([raw[0x08], raw[0x09]]),
            size: u32::from_le_bytes([raw[0x0C], raw[0x0D], raw[0x0E], raw[0x0F]]),
        }
    }

    /// Encodes the record with zeroed reserved bytes
    pub fn to_bytes(&self) -> [u8; DESCRIPTOR_SIZE] {
        let mut raw = [0u8; DESCRIPTOR_SIZE];
        raw[0x02] = self.chunk_id;
        raw[0x03..0x05].copy_from_slice(&self.filesystem_id.to_le_bytes());
        raw[0x06..0x08].copy_from_slice(&self.flag.to_le_bytes());
        raw[0x08..0x0A].copy_from_slice(&self.location.to_le_bytes());
        raw[0x0C..0x10].copy_from_slice(&self.size.to_le_bytes());
        raw
    }

    /// Returns true if the record is the end-of-directory marker
    pub fn is_end_marker(raw: &[u8]) -> bool {
        raw == END_OF_DIRECTORY
    }

    /// Returns true if this chunk has been superseded
    pub fn is_tombstone(&self) -> bool {
        self.flag == TOMBSTONE_FLAG
    }

    /// Block-relative start of the payload, or `None` if the location lies
    /// before the start of the block
    pub fn payload_offset(&self) -> Option<usize> {
        (self.location as usize)
            .checked_mul(PAYLOAD_SLOT_SIZE)
            .and_then(|delta| PAYLOAD_BASE.checked_sub(delta))
    }

    /// Block-relative payload range, checked against the block length
    pub fn payload_range(&self, block_len: usize) -> Option<Range<usize>> {
        let start = self.payload_offset()?;
        let end = start.checked_add(self.size as usize)?;
        (end <= block_len).then_some(start..end)
    }
}

impl fmt::Display for ChunkDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "chunk_id={:#x}, fs={}, size={}, flag={}, location={}",
            self.chunk_id, self.filesystem_id, self.size, self.flag, self.location
        )
    }
}

/// Returns true if the block carries the directory sentinel
pub fn has_directory(block: &[u8]) -> bool {
    block.get(SENTINEL_OFFSET..SENTINEL_OFFSET + DIRECTORY_SENTINEL.len())
        == Some(&DIRECTORY_SENTINEL[..])
}

/// Formats raw bytes as space separated uppercase hex
pub fn hex_bytes(raw: &[u8]) -> String {
    raw.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
