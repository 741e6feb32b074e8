//! Block scanning module for finding chunk directories in a flash dump.
//!
//! This module walks a raw dump in fixed-size physical-block windows and
//! yields every chunk described by the directory tables it finds.
//!
//! ## Algorithm Overview
//!
//! 1. Read the dump in [`BLOCK_SIZE`] windows
//! 2. Skip windows that do not carry the [`DIRECTORY_SENTINEL`]
//! 3. Walk 16-byte descriptors from offset 0 until the end marker
//! 4. Slice each descriptor's payload out of the same window
//!
//! A descriptor whose payload falls outside its window abandons the rest of
//! that window's directory. Scanning resumes with the next window.
//!
//! ## Example
//!
//! ```no_run
//! use nandsplice_core::scanner::{BlockScanner, ScannerConfig};
//!
//! let scanner = BlockScanner::open("flash.bin", ScannerConfig::new())?;
//! for chunk in scanner {
//!     let chunk = chunk?;
//!     println!("fs {} chunk {}: {} bytes", chunk.filesystem_id, chunk.chunk_id, chunk.payload.len());
//! }
//! # Ok::<(), nandsplice_core::Error>(())
//! ```

mod descriptor;

use crate::error::{Error, Result};
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;
use tracing::{debug, info, trace, warn};

pub use descriptor::{
    has_directory, hex_bytes, ChunkDescriptor, BLOCK_SIZE, DESCRIPTOR_SIZE, DIRECTORY_SENTINEL,
    PAYLOAD_BASE, PAYLOAD_SLOT_SIZE, SENTINEL_OFFSET, TOMBSTONE_FLAG,
};

/// A chunk extracted from a directory-bearing block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// File the chunk belongs to
    pub filesystem_id: u16,
    /// Position of the chunk within its file
    pub chunk_id: u8,
    /// Raw status flag from the descriptor
    pub flag: u16,
    /// Payload bytes
    pub payload: Vec<u8>,
    /// Absolute dump offset of the descriptor
    pub offset: u64,
}

impl Chunk {
    /// Returns true if this chunk has been superseded
    pub fn is_tombstone(&self) -> bool {
        self.flag == TOMBSTONE_FLAG
    }
}

/// Configuration for the scanner
#[derive(Debug, Clone, Default)]
pub struct ScannerConfig {
    /// Log every descriptor belonging to this filesystem id
    pub trace_filesystem: Option<u16>,
}

impl ScannerConfig {
    /// Creates a new scanner config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the filesystem id whose descriptors are traced
    pub fn trace_filesystem(mut self, id: Option<u16>) -> Self {
        self.trace_filesystem = id;
        self
    }
}

/// Counters collected while scanning
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// Bytes consumed from the dump
    pub bytes_read: u64,
    /// Windows read, including a trailing short one
    pub blocks_read: usize,
    /// Windows carrying the directory sentinel
    pub directory_blocks: usize,
    /// Chunks emitted
    pub chunks: usize,
    /// Windows whose directory was abandoned
    pub malformed_blocks: usize,
}

/// Streaming scanner over a flash dump
///
/// Yields [`Chunk`]s in ascending dump offset order. An I/O error is yielded
/// once and ends the iteration.
#[derive(Debug)]
pub struct BlockScanner<R> {
    reader: R,
    config: ScannerConfig,
    block: Vec<u8>,
    block_offset: u64,
    /// Next descriptor position inside `block`, `None` outside a directory
    cursor: Option<usize>,
    finished: bool,
    stats: ScanStats,
}

impl BlockScanner<File> {
    /// Opens a dump file for scanning
    pub fn open(path: impl AsRef<Path>, config: ScannerConfig) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::file_read(path, e))?;
        Ok(Self::with_config(file, config))
    }
}

impl<R: Read> BlockScanner<R> {
    /// Creates a new scanner with default configuration
    pub fn new(reader: R) -> Self {
        Self::with_config(reader, ScannerConfig::default())
    }

    /// Creates a new scanner with custom configuration
    pub fn with_config(reader: R, config: ScannerConfig) -> Self {
        Self {
            reader,
            config,
            block: Vec::with_capacity(BLOCK_SIZE),
            block_offset: 0,
            cursor: None,
            finished: false,
            stats: ScanStats::default(),
        }
    }

    /// Returns the counters collected so far
    pub fn stats(&self) -> ScanStats {
        self.stats
    }

    /// Fills the window buffer, returning the number of bytes read.
    ///
    /// Fewer than [`BLOCK_SIZE`] bytes means the end of the dump was reached.
    fn read_block(&mut self) -> Result<usize> {
        let start = self.stats.bytes_read;
        self.block.resize(BLOCK_SIZE, 0);

        let mut filled = 0;
        while filled < BLOCK_SIZE {
            match self.reader.read(&mut self.block[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::dump_read(start + filled as u64, e)),
            }
        }

        self.block.truncate(filled);
        Ok(filled)
    }

    /// Advances to the next window, leaving `cursor` set if it holds a directory
    fn advance_block(&mut self) -> Result<bool> {
        let len = self.read_block()?;
        if len == 0 {
            return Ok(false);
        }

        self.block_offset = self.stats.bytes_read;
        self.stats.bytes_read += len as u64;
        self.stats.blocks_read += 1;

        if len < BLOCK_SIZE {
            self.finished = true;
        }

        if has_directory(&self.block) {
            trace!("Directory block at {:#09x}", self.block_offset);
            self.stats.directory_blocks += 1;
            self.cursor = Some(0);
        } else if len < BLOCK_SIZE {
            debug!(
                "Discarding trailing {} byte window at {:#09x}",
                len, self.block_offset
            );
        }

        Ok(true)
    }

    /// Decodes the next chunk from the current directory, if any
    fn next_in_directory(&mut self) -> Option<Chunk> {
        let pos = self.cursor?;
        let end = pos + DESCRIPTOR_SIZE;
        if end > SENTINEL_OFFSET {
            trace!(
                "Directory in block {:#09x} runs into the sentinel",
                self.block_offset
            );
            self.cursor = None;
            return None;
        }

        let mut raw = [0u8; DESCRIPTOR_SIZE];
        raw.copy_from_slice(&self.block[pos..end]);
        if ChunkDescriptor::is_end_marker(&raw) {
            self.cursor = None;
            return None;
        }

        let descriptor = ChunkDescriptor::from_bytes(&raw);
        let offset = self.block_offset + pos as u64;

        if self.config.trace_filesystem == Some(descriptor.filesystem_id) {
            info!("{}", trace_line(offset, &raw, &descriptor));
        }

        let Some(range) = descriptor.payload_range(self.block.len()) else {
            let err = Error::malformed_directory(
                self.block_offset,
                pos,
                format!(
                    "payload at location {} with size {} does not fit in {} byte block",
                    descriptor.location,
                    descriptor.size,
                    self.block.len()
                ),
            );
            warn!("{}; skipping rest of directory", err);
            self.stats.malformed_blocks += 1;
            self.cursor = None;
            return None;
        };

        self.cursor = Some(end);
        self.stats.chunks += 1;
        Some(Chunk {
            filesystem_id: descriptor.filesystem_id,
            chunk_id: descriptor.chunk_id,
            flag: descriptor.flag,
            payload: self.block[range].to_vec(),
            offset,
        })
    }
}

/// Formats a traced descriptor: absolute offset, raw bytes, decoded fields
fn trace_line(offset: u64, raw: &[u8], descriptor: &ChunkDescriptor) -> String {
    format!("{:07X}: {} ({})", offset, hex_bytes(raw), descriptor)
}

impl<R: Read> Iterator for BlockScanner<R> {
    type Item = Result<Chunk>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(chunk) = self.next_in_directory() {
                return Some(Ok(chunk));
            }

            if self.finished {
                return None;
            }

            match self.advance_block() {
                Ok(true) => {}
                Ok(false) => {
                    self.finished = true;
                    debug!(
                        "Scan complete: {} blocks, {} with directories, {} chunks",
                        self.stats.blocks_read, self.stats.directory_blocks, self.stats.chunks
                    );
                    return None;
                }
                Err(e) => {
                    self.finished = true;
                    self.cursor = None;
                    return Some(Err(e));
                }
            }
        }
    }
}
