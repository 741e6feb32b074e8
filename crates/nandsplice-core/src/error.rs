//! Error types for the nandsplice-core library.
//!
//! This module provides error handling using the `thiserror` crate, with
//! separate variants for fatal I/O failures and for the recoverable
//! malformed-directory condition the scanner skips over.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for nandsplice operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for all nandsplice operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Failed to open or read an input file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        /// Path to the file that failed to read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to create or write an output file
    #[error("failed to write file '{path}': {source}")]
    FileWrite {
        /// Path to the file that failed to write
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to create output directory
    #[error("failed to create directory '{path}': {source}")]
    DirectoryCreate {
        /// Path to the directory that failed to create
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Output file exists and overwriting was not requested
    #[error("file already exists: '{path}'")]
    FileExists {
        /// Path of the existing file
        path: PathBuf,
    },

    /// Reading the dump stream failed
    #[error("failed to read dump at offset {offset:#x}: {source}")]
    DumpRead {
        /// Absolute offset of the window being read
        offset: u64,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A chunk descriptor points outside its block
    #[error("malformed chunk directory in block {block_offset:#x} at entry {entry_offset:#x}: {details}")]
    MalformedDirectory {
        /// Absolute offset of the block holding the directory
        block_offset: u64,
        /// Offset of the offending descriptor within the block
        entry_offset: usize,
        /// Detailed description of the issue
        details: String,
    },

    /// A NAND page layout that cannot be used for splitting
    #[error("invalid NAND layout {data_size}+{oob_size}: {details}")]
    InvalidLayout {
        /// Page data size in bytes
        data_size: usize,
        /// Spare area size in bytes
        oob_size: usize,
        /// Detailed description of the issue
        details: String,
    },
}

impl Error {
    /// Creates a new file read error
    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    /// Creates a new file write error
    pub fn file_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileWrite {
            path: path.into(),
            source,
        }
    }

    /// Creates a new directory creation error
    pub fn directory_create(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::DirectoryCreate {
            path: path.into(),
            source,
        }
    }

    /// Creates a new file-exists error
    pub fn file_exists(path: impl Into<PathBuf>) -> Self {
        Self::FileExists { path: path.into() }
    }

    /// Creates a new dump read error
    pub fn dump_read(offset: u64, source: std::io::Error) -> Self {
        Self::DumpRead { offset, source }
    }

    /// Creates a new malformed directory error
    pub fn malformed_directory(
        block_offset: u64,
        entry_offset: usize,
        details: impl Into<String>,
    ) -> Self {
        Self::MalformedDirectory {
            block_offset,
            entry_offset,
            details: details.into(),
        }
    }

    /// Creates a new invalid layout error
    pub fn invalid_layout(data_size: usize, oob_size: usize, details: impl Into<String>) -> Self {
        Self::InvalidLayout {
            data_size,
            oob_size,
            details: details.into(),
        }
    }

    /// Returns true if this is a recoverable error that should be skipped
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::MalformedDirectory { .. })
    }
}
