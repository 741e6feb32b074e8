//! Content classification for naming reconstructed regions.
//!
//! This module provides the [`Classifier`] trait for choosing the file
//! extension a region is written with.

use std::fmt;

/// File extension assigned to a region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Extension {
    /// Java archive
    Jar,
    /// JPEG image
    Jpg,
    /// Melody ringtone
    Mld,
    /// Application descriptor
    Adf,
    /// SMAF audio
    Mmf,
    /// Java application descriptor
    Jad,
    /// Unclassified data
    Bin,
}

impl Extension {
    /// Returns the extension without a leading dot
    pub fn as_str(&self) -> &'static str {
        match self {
            Extension::Jar => "jar",
            Extension::Jpg => "jpg",
            Extension::Mld => "mld",
            Extension::Adf => "adf",
            Extension::Mmf => "mmf",
            Extension::Jad => "jad",
            Extension::Bin => "bin",
        }
    }
}

impl fmt::Display for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trait for choosing an output extension from region contents.
///
/// # Example
///
/// ```
/// use nandsplice_core::{Classifier, Extension};
///
/// struct AlwaysJar;
///
/// impl Classifier for AlwaysJar {
///     fn classify(&self, _data: &[u8]) -> Extension {
///         Extension::Jar
///     }
/// }
///
/// assert_eq!(AlwaysJar.classify(b"anything"), Extension::Jar);
/// ```
pub trait Classifier {
    /// Classify a fully assembled region
    fn classify(&self, data: &[u8]) -> Extension;
}

/// A classifier that names everything `.bin`
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainClassifier;

impl Classifier for PlainClassifier {
    fn classify(&self, _data: &[u8]) -> Extension {
        Extension::Bin
    }
}

/// Magic-number classifier for the content types found on handset flash
#[derive(Debug, Clone, Copy, Default)]
pub struct MagicClassifier;

impl Classifier for MagicClassifier {
    fn classify(&self, data: &[u8]) -> Extension {
        let magic = data.get(..4).unwrap_or(&[]);

        if magic == b"PK\x03\x04" {
            Extension::Jar
        } else if is_jpeg(data) {
            Extension::Jpg
        } else if magic == b"melo" {
            Extension::Mld
        } else if contains(data, b".jam") {
            Extension::Adf
        } else if magic == b"MMMD" {
            Extension::Mmf
        } else if contains(data, b"MIDlet-Name:") {
            Extension::Jad
        } else {
            Extension::Bin
        }
    }
}

fn is_jpeg(data: &[u8]) -> bool {
    let marker = data.get(6..10);
    match data.get(..4) {
        Some([0xFF, 0xD8, 0xFF, 0xE0]) => marker == Some(&b"JFIF"[..]),
        Some([0xFF, 0xD8, 0xFF, 0xE1]) => marker == Some(&b"Exif"[..]),
        Some([0xFF, 0xD8, 0xFF, 0xDB]) | Some([0xFF, 0xD8, 0xFF, 0xEE]) => true,
        _ => false,
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack
        .windows(needle.len())
        .any(|window| window == needle)
}
