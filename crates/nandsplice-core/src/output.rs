//! Writing reconstructed regions to disk.

use crate::error::{Error, Result};
use crate::region::{Classifier, Extension, MagicClassifier, PlainClassifier, Region};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Writes regions as `region_NNNNN.ext` files into one directory
pub struct RegionWriter {
    dir: PathBuf,
    classifier: Box<dyn Classifier>,
    force: bool,
}

impl RegionWriter {
    /// Creates a writer that names every region `.bin`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            classifier: Box::new(PlainClassifier),
            force: false,
        }
    }

    /// Sets whether [`MagicClassifier`] picks the extension
    pub fn classify(self, classify: bool) -> Self {
        if classify {
            self.classifier(MagicClassifier)
        } else {
            self.classifier(PlainClassifier)
        }
    }

    /// Uses a custom classifier for naming
    pub fn classifier(mut self, classifier: impl Classifier + 'static) -> Self {
        self.classifier = Box::new(classifier);
        self
    }

    /// Sets whether existing files are overwritten
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Destination directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Creates the destination directory if it does not exist
    pub fn prepare(&self) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| Error::directory_create(&self.dir, e))
    }

    /// Extension the configured classifier assigns to a region
    pub fn extension(&self, region: &Region) -> Extension {
        self.classifier.classify(region.as_bytes())
    }

    /// Full output path for a region
    pub fn path_for(&self, region: &Region) -> PathBuf {
        self.dir.join(region.file_name(self.extension(region)))
    }

    /// Writes one region, returning the path written
    pub fn write(&self, region: &Region) -> Result<PathBuf> {
        let path = self.path_for(region);

        let mut options = OpenOptions::new();
        options.write(true);
        if self.force {
            options.create(true).truncate(true);
        } else {
            options.create_new(true);
        }

        let mut file = options.open(&path).map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists => Error::file_exists(&path),
            _ => Error::file_write(&path, e),
        })?;
        file.write_all(region.as_bytes())
            .map_err(|e| Error::file_write(&path, e))?;

        debug!("Wrote {} to {}", region, path.display());
        Ok(path)
    }

    /// Creates the directory and writes every region
    pub fn write_all<'a>(
        &self,
        regions: impl IntoIterator<Item = &'a Region>,
    ) -> Result<Vec<PathBuf>> {
        self.prepare()?;
        regions.into_iter().map(|region| self.write(region)).collect()
    }
}

impl std::fmt::Debug for RegionWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegionWriter")
            .field("dir", &self.dir)
            .field("force", &self.force)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn region(id: u16, data: &[u8]) -> Region {
        Region {
            filesystem_id: id,
            data: data.to_vec(),
        }
    }

    #[test]
    fn test_write_creates_directory() {
        let temp_dir = TempDir::new().unwrap();
        let out = temp_dir.path().join("nested").join("out");
        let writer = RegionWriter::new(&out);

        let paths = writer.write_all(&[region(1, &[0xDE, 0xAD, 0xBE, 0xEF])]).unwrap();

        assert_eq!(paths, vec![out.join("region_00001.bin")]);
        assert_eq!(fs::read(&paths[0]).unwrap(), vec![0xDE, 0xAD, 0xBE, 0xEF]);
    }

    #[test]
    fn test_classified_names() {
        let temp_dir = TempDir::new().unwrap();
        let writer = RegionWriter::new(temp_dir.path()).classify(true);

        assert_eq!(
            writer.path_for(&region(12, b"PK\x03\x04")),
            temp_dir.path().join("region_00012.jar")
        );
        assert_eq!(
            writer.path_for(&region(3, b"\x00\x00")),
            temp_dir.path().join("region_00003.bin")
        );

        let plain = RegionWriter::new(temp_dir.path());
        assert_eq!(plain.extension(&region(12, b"PK\x03\x04")), Extension::Bin);
    }

    #[test]
    fn test_existing_file_requires_force() {
        let temp_dir = TempDir::new().unwrap();
        let writer = RegionWriter::new(temp_dir.path());
        writer.write(&region(1, b"one")).unwrap();

        let err = writer.write(&region(1, b"two")).unwrap_err();
        assert!(matches!(err, Error::FileExists { .. }));

        let writer = writer.force(true);
        let path = writer.write(&region(1, b"two")).unwrap();
        assert_eq!(fs::read(path).unwrap(), b"two".to_vec());
    }

    #[test]
    fn test_prepare_fails_on_file_path() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("blocker");
        fs::write(&blocker, b"x").unwrap();

        let err = RegionWriter::new(blocker.join("out")).prepare().unwrap_err();
        assert!(matches!(err, Error::DirectoryCreate { .. }));
    }
}
