use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use ::zip::write::SimpleFileOptions;
use ::zip::{CompressionMethod, ZipArchive, ZipWriter};
use log::{debug, warn};

use super::{
    ensure_all_present, has_content, prepare_new_entries, replace_atomically, should_store,
    skipped_names, Archiver, NewEntry,
};
use crate::error::{Error, Result};
use crate::path_utils::normalize_entry_name;
use crate::types::{ArchiveEntry, ArchiveFormat, Capabilities, MutationCost};

/// ZIP (`.cbz`) backend.
///
/// Surviving members are raw-copied into the replacement container, so
/// mutations never recompress existing pages. New images are stored, every
/// other new member is deflated.
#[derive(Debug, Clone)]
pub struct ZipArchiver {
    path: PathBuf,
}

impl ZipArchiver {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn open(&self) -> Result<ZipArchive<File>> {
        let file = File::open(&self.path).map_err(|e| Error::read(&self.path, e))?;
        ZipArchive::new(file).map_err(|e| Error::read(&self.path, e))
    }

    fn file_options(name: &str) -> SimpleFileOptions {
        let method = if should_store(name) {
            CompressionMethod::Stored
        } else {
            CompressionMethod::Deflated
        };
        SimpleFileOptions::default()
            .compression_method(method)
            .unix_permissions(0o644)
    }

    /// Rebuilds the archive without the `remove` members and with `add` appended.
    fn rebuild(&self, remove: &[&str], add: Vec<NewEntry>) -> Result<()> {
        let skip = skipped_names(remove, &add);
        let mut source = if has_content(&self.path) {
            Some(self.open()?)
        } else {
            None
        };

        replace_atomically(&self.path, |temp| {
            let mut writer = ZipWriter::new(temp);

            if let Some(source) = source.as_mut() {
                for i in 0..source.len() {
                    let file = source.by_index_raw(i).map_err(|e| Error::read(&self.path, e))?;
                    if skip.contains(&normalize_entry_name(file.name())) {
                        continue;
                    }
                    writer
                        .raw_copy_file(file)
                        .map_err(|e| Error::write(&self.path, e))?;
                }
            }

            for (name, data) in &add {
                writer
                    .start_file(name.as_str(), Self::file_options(name))
                    .map_err(|e| Error::write(&self.path, e))?;
                writer
                    .write_all(data)
                    .map_err(|e| Error::write(&self.path, e))?;
            }

            writer.finish().map_err(|e| Error::write(&self.path, e))?;
            Ok(())
        })
    }
}

impl Archiver for ZipArchiver {
    fn path(&self) -> &Path {
        &self.path
    }

    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::Zip
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            write: true,
            remove: true,
            native_remove: true,
            native_test: true,
            mutation: MutationCost::CopyAndReplace,
        }
    }

    fn list_entries(&self) -> Result<Vec<ArchiveEntry>> {
        if !has_content(&self.path) {
            return Ok(Vec::new());
        }
        let mut archive = self.open()?;
        let mut entries = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let file = archive.by_index_raw(i).map_err(|e| Error::read(&self.path, e))?;
            entries.push(ArchiveEntry {
                name: normalize_entry_name(file.name()),
                size: file.size(),
                is_dir: file.is_dir(),
            });
        }
        Ok(entries)
    }

    fn read_entry(&self, name: &str) -> Result<Vec<u8>> {
        if !has_content(&self.path) {
            return Err(Error::EntryNotFound(name.to_string()));
        }
        let wanted = normalize_entry_name(name);
        let mut archive = self.open()?;
        for i in 0..archive.len() {
            let mut file = archive.by_index(i).map_err(|e| Error::read(&self.path, e))?;
            if normalize_entry_name(file.name()) != wanted {
                continue;
            }
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)
                .map_err(|e| Error::read(&self.path, format!("entry '{}': {}", wanted, e)))?;
            return Ok(data);
        }
        Err(Error::EntryNotFound(wanted))
    }

    fn write_entries(&mut self, entries: Vec<NewEntry>) -> Result<()> {
        let entries = prepare_new_entries(&self.path, entries)?;
        debug!("Writing {} entries to {:?}", entries.len(), self.path);
        self.rebuild(&[], entries)
    }

    fn remove_entries(&mut self, names: &[&str]) -> Result<()> {
        ensure_all_present(&self.list_entries()?, names)?;
        debug!("Removing {} entries from {:?}", names.len(), self.path);
        self.rebuild(names, Vec::new())
    }

    fn test_integrity(&self) -> bool {
        let mut archive = match self.open() {
            Ok(archive) => archive,
            Err(e) => {
                warn!("Integrity check failed: {}", e);
                return false;
            }
        };
        for i in 0..archive.len() {
            let result = archive
                .by_index(i)
                .map_err(std::io::Error::from)
                .and_then(|mut file| std::io::copy(&mut file, &mut std::io::sink()));
            if let Err(e) = result {
                warn!("Integrity check failed for {:?} at entry {}: {}", self.path, i, e);
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_lists_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let archiver = ZipArchiver::new(dir.path().join("missing.cbz"));
        assert!(archiver.list_entries().unwrap().is_empty());
    }

    #[test]
    fn write_creates_and_replaces_entries() {
        let dir = tempfile::tempdir().unwrap();
        let mut archiver = ZipArchiver::new(dir.path().join("book.cbz"));
        archiver.write_entry("001.jpg", b"page one").unwrap();
        archiver.write_entry("notes.txt", b"first").unwrap();
        archiver.write_entry("notes.txt", b"second").unwrap();

        let names: Vec<String> = archiver
            .list_entries()
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["001.jpg", "notes.txt"]);
        assert_eq!(archiver.read_entry("notes.txt").unwrap(), b"second");
        assert_eq!(archiver.read_entry("001.jpg").unwrap(), b"page one");
        assert!(archiver.test_integrity());
    }

    #[test]
    fn remove_missing_entry_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.cbz");
        let mut archiver = ZipArchiver::new(&path);
        archiver
            .write_entries(vec![
                ("001.jpg".to_string(), b"a".to_vec()),
                ("002.jpg".to_string(), b"b".to_vec()),
            ])
            .unwrap();
        let before = std::fs::read(&path).unwrap();

        let err = archiver.remove_entries(&["001.jpg", "404.jpg"]).unwrap_err();
        assert!(matches!(err, Error::EntryNotFound(ref n) if n == "404.jpg"));
        assert_eq!(std::fs::read(&path).unwrap(), before);

        archiver.remove_entry("001.jpg").unwrap();
        assert!(!archiver.has_entry("001.jpg").unwrap());
        assert!(archiver.has_entry("002.jpg").unwrap());
    }

    #[test]
    fn truncated_archive_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.cbz");
        let mut archiver = ZipArchiver::new(&path);
        archiver.write_entry("001.jpg", &[7u8; 4096]).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();

        assert!(matches!(
            archiver.list_entries(),
            Err(Error::ArchiveRead { .. })
        ));
        assert!(!archiver.test_integrity());
    }
}
