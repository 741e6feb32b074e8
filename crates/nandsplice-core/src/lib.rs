//! # nandsplice-core
//!
//! A library for reconstructing files from raw flash memory dumps whose
//! blocks carry chunk directory tables.
//!
//! This crate provides the core functionality for:
//! - Scanning a dump for directory-bearing blocks and extracting chunks
//! - Accumulating every copy of every chunk in scan order
//! - Resolving duplicates and tombstones into reconstructed regions
//! - Naming and writing regions, optionally by content type
//! - Splitting interleaved NAND data/OOB dumps
//!
//! ## Architecture
//!
//! Data flows one way through the modules:
//!
//! - [`scanner`]: Block windows to [`Chunk`]s
//! - [`store`]: [`Chunk`]s to a [`ChunkStore`]
//! - [`region`]: [`ChunkStore`] to [`Region`]s
//! - [`output`]: [`Region`]s to files
//! - [`oob`]: Data/spare-area separation for raw chip reads
//! - [`error`]: Error types and handling
//!
//! ## Example
//!
//! ```no_run
//! use nandsplice_core::{reconstruct_file, AssemblerConfig, RegionWriter, ScannerConfig};
//!
//! let result = reconstruct_file("flash.bin", ScannerConfig::new(), AssemblerConfig::new())?;
//!
//! let writer = RegionWriter::new("flash.bin_output").classify(true);
//! for path in writer.write_all(&result.regions)? {
//!     println!("{}", path.display());
//! }
//! # Ok::<(), nandsplice_core::Error>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod error;
pub mod oob;
pub mod output;
pub mod region;
pub mod scanner;
pub mod store;

#[cfg(test)]
mod testutil;

use std::io::Read;
use std::path::Path;
use tracing::debug;

// Re-export primary types for convenience
pub use error::{Error, Result};
pub use oob::{NandLayout, SplitStats};
pub use output::RegionWriter;
pub use region::{
    AssemblerConfig, Classifier, Extension, MagicClassifier, PlainClassifier, Region,
    RegionAssembler,
};
pub use scanner::{BlockScanner, Chunk, ScanStats, ScannerConfig};
pub use store::{ChunkRecord, ChunkStore};

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Outcome of a full scan and assembly
#[derive(Debug, Clone)]
pub struct Reconstruction {
    /// Non-empty regions in ascending filesystem id order
    pub regions: Vec<Region>,
    /// Scanner counters
    pub stats: ScanStats,
    /// Chunk copies recorded, duplicates included
    pub records: usize,
}

/// Scans a dump and assembles its regions
pub fn reconstruct<R: Read>(
    reader: R,
    scanner: ScannerConfig,
    assembler: AssemblerConfig,
) -> Result<Reconstruction> {
    assemble_from(BlockScanner::with_config(reader, scanner), assembler)
}

/// Opens a dump file, scans it and assembles its regions
pub fn reconstruct_file(
    path: impl AsRef<Path>,
    scanner: ScannerConfig,
    assembler: AssemblerConfig,
) -> Result<Reconstruction> {
    assemble_from(BlockScanner::open(path, scanner)?, assembler)
}

fn assemble_from<R: Read>(
    mut scanner: BlockScanner<R>,
    assembler: AssemblerConfig,
) -> Result<Reconstruction> {
    let store = ChunkStore::from_chunks(scanner.by_ref())?;
    let stats = scanner.stats();

    debug!(
        "Recorded {} chunk(s) across {} filesystem id(s)",
        store.record_count(),
        store.filesystem_count()
    );

    let regions = RegionAssembler::with_config(assembler).assemble(&store);
    Ok(Reconstruction {
        regions,
        stats,
        records: store.record_count(),
    })
}
