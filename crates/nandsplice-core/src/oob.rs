//! Separation of NAND page data from spare-area (OOB) bytes.
//!
//! Raw chip reads often interleave every data page with its spare area:
//!
//! ```text
//! [page 0 data][page 0 oob][page 1 data][page 1 oob] ...
//! ```
//!
//! The block scanner expects the data pages alone, so such a "mixdump" has to
//! be split first.

use crate::error::{Error, Result};
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Page geometry of a NAND chip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NandLayout {
    /// Data bytes per page
    pub data_size: usize,
    /// Spare bytes per page
    pub oob_size: usize,
}

impl NandLayout {
    /// Common page geometries
    pub const KNOWN: [NandLayout; 5] = [
        NandLayout::new(512, 16),
        NandLayout::new(1024, 32),
        NandLayout::new(2048, 64),
        NandLayout::new(4096, 128),
        NandLayout::new(8192, 256),
    ];

    /// Creates a layout
    pub const fn new(data_size: usize, oob_size: usize) -> Self {
        Self {
            data_size,
            oob_size,
        }
    }

    /// Bytes per page including the spare area
    pub fn page_size(&self) -> usize {
        self.data_size + self.oob_size
    }

    /// Returns true if a dump of `len` bytes is a whole number of pages
    pub fn divides(&self, len: u64) -> bool {
        self.page_size() != 0 && len % self.page_size() as u64 == 0
    }

    fn validate(&self) -> Result<()> {
        if self.data_size == 0 || self.oob_size == 0 {
            return Err(Error::invalid_layout(
                self.data_size,
                self.oob_size,
                "page data and spare sizes must be non-zero",
            ));
        }
        Ok(())
    }
}

impl fmt::Display for NandLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Data = {} bytes, OOB = {} bytes",
            self.data_size, self.oob_size
        )
    }
}

/// Counters from a split
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SplitStats {
    /// Pages processed, including a short trailing one
    pub pages: usize,
    /// Bytes written to the data output
    pub data_bytes: u64,
    /// Bytes written to the OOB output
    pub oob_bytes: u64,
}

/// Stream an I/O failure happened on during a split
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Input,
    Data,
    Oob,
}

/// Splits an interleaved stream into data and OOB outputs.
///
/// Stops as soon as either part of a page reads empty. A short trailing part
/// is written as-is.
pub fn split_oob<R, D, O>(
    input: R,
    layout: NandLayout,
    data_out: &mut D,
    oob_out: &mut O,
) -> std::io::Result<SplitStats>
where
    R: Read,
    D: Write,
    O: Write,
{
    split_streams(input, layout, data_out, oob_out).map_err(|(_, e)| e)
}

fn split_streams<R, D, O>(
    mut input: R,
    layout: NandLayout,
    data_out: &mut D,
    oob_out: &mut O,
) -> std::result::Result<SplitStats, (Stream, std::io::Error)>
where
    R: Read,
    D: Write,
    O: Write,
{
    let mut data = vec![0u8; layout.data_size];
    let mut oob = vec![0u8; layout.oob_size];
    let mut stats = SplitStats::default();

    loop {
        let data_len = read_up_to(&mut input, &mut data).map_err(|e| (Stream::Input, e))?;
        if data_len == 0 {
            break;
        }

        let oob_len = read_up_to(&mut input, &mut oob).map_err(|e| (Stream::Input, e))?;
        if oob_len == 0 {
            break;
        }

        data_out
            .write_all(&data[..data_len])
            .map_err(|e| (Stream::Data, e))?;
        oob_out
            .write_all(&oob[..oob_len])
            .map_err(|e| (Stream::Oob, e))?;

        stats.pages += 1;
        stats.data_bytes += data_len as u64;
        stats.oob_bytes += oob_len as u64;
    }

    data_out.flush().map_err(|e| (Stream::Data, e))?;
    oob_out.flush().map_err(|e| (Stream::Oob, e))?;
    Ok(stats)
}

/// Default output paths: `<stem>_separated_<size>.bin` and `.oob` beside the input
pub fn default_outputs(input: &Path, layout: NandLayout) -> (PathBuf, PathBuf) {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("dump");
    let dir = input.parent().unwrap_or_else(|| Path::new(""));
    let base = format!("{}_separated_{}", stem, layout.data_size);
    (
        dir.join(format!("{}.bin", base)),
        dir.join(format!("{}.oob", base)),
    )
}

/// Splits a mixdump file into a data file and an OOB file
pub fn split_oob_file(
    input: &Path,
    layout: NandLayout,
    data_path: &Path,
    oob_path: &Path,
) -> Result<SplitStats> {
    layout.validate()?;
    info!("Splitting {} with layout {}", input.display(), layout);

    let reader = File::open(input).map_err(|e| Error::file_read(input, e))?;
    let mut data_out = BufWriter::new(
        File::create(data_path).map_err(|e| Error::file_write(data_path, e))?,
    );
    let mut oob_out =
        BufWriter::new(File::create(oob_path).map_err(|e| Error::file_write(oob_path, e))?);

    let stats = split_streams(reader, layout, &mut data_out, &mut oob_out).map_err(
        |(stream, e)| match stream {
            Stream::Input => Error::file_read(input, e),
            Stream::Data => Error::file_write(data_path, e),
            Stream::Oob => Error::file_write(oob_path, e),
        },
    )?;

    debug!(
        "Split {} pages: {} data bytes, {} oob bytes",
        stats.pages, stats.data_bytes, stats.oob_bytes
    );
    Ok(stats)
}

/// Reads until `buf` is full or EOF, returning the bytes read
fn read_up_to(input: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match input.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn mixdump(layout: NandLayout, pages: u8) -> Vec<u8> {
        let mut out = Vec::new();
        for page in 0..pages {
            out.extend(std::iter::repeat(page).take(layout.data_size));
            out.extend(std::iter::repeat(0xF0 | page).take(layout.oob_size));
        }
        out
    }

    #[test]
    fn test_split_interleaved() {
        let layout = NandLayout::new(8, 2);
        let (mut data, mut oob) = (Vec::new(), Vec::new());
        let stats = split_oob(Cursor::new(mixdump(layout, 3)), layout, &mut data, &mut oob).unwrap();

        assert_eq!(stats.pages, 3);
        assert_eq!(data, [[0u8; 8], [1; 8], [2; 8]].concat());
        assert_eq!(oob, vec![0xF0, 0xF0, 0xF1, 0xF1, 0xF2, 0xF2]);
    }

    #[test]
    fn test_split_trailing_partial_page() {
        let layout = NandLayout::new(4, 2);
        let mut input = mixdump(layout, 1);
        input.extend_from_slice(&[9, 9, 9, 9, 7]);
        let (mut data, mut oob) = (Vec::new(), Vec::new());
        let stats = split_oob(Cursor::new(input), layout, &mut data, &mut oob).unwrap();

        assert_eq!(stats.pages, 2);
        assert_eq!(data, vec![0, 0, 0, 0, 9, 9, 9, 9]);
        assert_eq!(oob, vec![0xF0, 0xF0, 7]);
    }

    #[test]
    fn test_split_drops_page_without_oob() {
        let layout = NandLayout::new(4, 2);
        let mut input = mixdump(layout, 1);
        input.extend_from_slice(&[9, 9]);
        let (mut data, mut oob) = (Vec::new(), Vec::new());
        let stats = split_oob(Cursor::new(input), layout, &mut data, &mut oob).unwrap();

        assert_eq!(stats.pages, 1);
        assert_eq!(data, vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_divides() {
        let layout = NandLayout::new(2048, 64);
        assert!(layout.divides(2112 * 10));
        assert!(!layout.divides(2048 * 10));
        assert!(layout.divides(0));
        assert!(!NandLayout::new(0, 0).divides(10));
    }

    #[test]
    fn test_default_outputs() {
        let (data, oob) = default_outputs(Path::new("/dumps/phone.raw"), NandLayout::KNOWN[2]);
        assert_eq!(data, PathBuf::from("/dumps/phone_separated_2048.bin"));
        assert_eq!(oob, PathBuf::from("/dumps/phone_separated_2048.oob"));
    }

    #[test]
    fn test_split_file() {
        let temp_dir = TempDir::new().unwrap();
        let layout = NandLayout::KNOWN[0];
        let input = temp_dir.path().join("mix.raw");
        std::fs::write(&input, mixdump(layout, 4)).unwrap();

        let (data_path, oob_path) = default_outputs(&input, layout);
        let stats = split_oob_file(&input, layout, &data_path, &oob_path).unwrap();

        assert_eq!(stats.pages, 4);
        assert_eq!(std::fs::read(&data_path).unwrap().len(), 4 * 512);
        assert_eq!(std::fs::read(&oob_path).unwrap().len(), 4 * 16);
    }

    #[test]
    fn test_split_read_failure_names_input() {
        let temp_dir = TempDir::new().unwrap();
        let (data_path, oob_path) = (temp_dir.path().join("d.bin"), temp_dir.path().join("o.oob"));

        // Opening a directory succeeds, reading from it does not
        let err = split_oob_file(temp_dir.path(), NandLayout::KNOWN[0], &data_path, &oob_path)
            .unwrap_err();
        match err {
            Error::FileRead { path, .. } => assert_eq!(path, temp_dir.path()),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_split_write_failure_names_stream() {
        struct Broken;
        impl Write for Broken {
            fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::other("disk full"))
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let layout = NandLayout::new(4, 2);
        let mut data = Vec::new();
        let (stream, _) =
            split_streams(Cursor::new(mixdump(layout, 1)), layout, &mut data, &mut Broken)
                .unwrap_err();
        assert_eq!(stream, Stream::Oob);

        let mut oob = Vec::new();
        let (stream, _) =
            split_streams(Cursor::new(mixdump(layout, 1)), layout, &mut Broken, &mut oob)
                .unwrap_err();
        assert_eq!(stream, Stream::Data);
    }

    #[test]
    fn test_zero_layout_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let p = temp_dir.path().join("x");
        let err = split_oob_file(&p, NandLayout::new(0, 16), &p, &p).unwrap_err();
        assert!(matches!(err, Error::InvalidLayout { .. }));
    }
}
