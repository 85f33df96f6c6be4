use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use sevenz_rust::{Password, SevenZArchiveEntry, SevenZReader, SevenZWriter};

use super::{
    ensure_all_present, has_content, prepare_new_entries, replace_atomically, skipped_names,
    Archiver, NewEntry,
};
use crate::error::{Error, Result};
use crate::path_utils::normalize_entry_name;
use crate::types::{ArchiveEntry, ArchiveFormat, Capabilities, MutationCost};

/// 7z (`.cb7`) backend.
///
/// The format has no in-place update, so every mutation decodes all surviving
/// entries and writes a fresh archive.
#[derive(Debug, Clone)]
pub struct SevenZipArchiver {
    path: PathBuf,
}

/// One decoded member kept across a rebuild.
struct Member {
    name: String,
    is_dir: bool,
    data: Vec<u8>,
}

impl SevenZipArchiver {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn open(&self) -> Result<SevenZReader<std::fs::File>> {
        SevenZReader::open(&self.path, Password::empty()).map_err(|e| Error::read(&self.path, e))
    }

    /// Decodes every entry, handing each one to `visit` until it returns `false`.
    ///
    /// Entry data is always read to the end so the library verifies its CRC.
    fn decode_each<F>(&self, mut visit: F) -> Result<()>
    where
        F: FnMut(String, bool, Vec<u8>) -> bool,
    {
        let mut reader = self.open()?;
        let mut failure: Option<std::io::Error> = None;

        reader
            .for_each_entries(|entry, data| {
                let mut buffer = Vec::with_capacity(entry.size() as usize);
                if let Err(e) = data.read_to_end(&mut buffer) {
                    failure = Some(e);
                    return Ok(false);
                }
                let name = normalize_entry_name(entry.name());
                Ok(visit(name, entry.is_directory(), buffer))
            })
            .map_err(|e| Error::read(&self.path, e))?;

        match failure {
            Some(e) => Err(Error::read(&self.path, e)),
            None => Ok(()),
        }
    }

    fn rebuild(&self, remove: &[&str], add: Vec<NewEntry>) -> Result<()> {
        let skip = skipped_names(remove, &add);
        let mut kept = Vec::new();
        if has_content(&self.path) {
            self.decode_each(|name, is_dir, data| {
                if !skip.contains(&name) {
                    kept.push(Member { name, is_dir, data });
                }
                true
            })?;
        }
        info!(
            "Rebuilding 7z archive {:?} ({} kept, {} added)",
            self.path,
            kept.len(),
            add.len()
        );

        let members = kept.into_iter().chain(add.into_iter().map(|(name, data)| Member {
            name,
            is_dir: false,
            data,
        }));

        replace_atomically(&self.path, |temp| {
            let mut writer = SevenZWriter::new(temp).map_err(|e| Error::write(&self.path, e))?;
            for member in members {
                let mut entry = SevenZArchiveEntry::new();
                entry.name = member.name;
                entry.is_directory = member.is_dir;
                entry.has_stream = !member.is_dir;
                let reader = if member.is_dir {
                    None
                } else {
                    Some(Cursor::new(member.data))
                };
                writer
                    .push_archive_entry(entry, reader)
                    .map_err(|e| Error::write(&self.path, e))?;
            }
            writer.finish().map_err(|e| Error::write(&self.path, e))?;
            Ok(())
        })
    }
}

impl Archiver for SevenZipArchiver {
    fn path(&self) -> &Path {
        &self.path
    }

    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::SevenZip
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            write: true,
            remove: true,
            native_remove: false,
            native_test: true,
            mutation: MutationCost::FullRebuild,
        }
    }

    fn list_entries(&self) -> Result<Vec<ArchiveEntry>> {
        if !has_content(&self.path) {
            return Ok(Vec::new());
        }
        let reader = self.open()?;
        Ok(reader
            .archive()
            .files
            .iter()
            .map(|entry| ArchiveEntry {
                name: normalize_entry_name(entry.name()),
                size: entry.size(),
                is_dir: entry.is_directory(),
            })
            .collect())
    }

    fn read_entry(&self, name: &str) -> Result<Vec<u8>> {
        let wanted = normalize_entry_name(name);
        if !has_content(&self.path) {
            return Err(Error::EntryNotFound(wanted));
        }
        let mut found = None;
        self.decode_each(|entry_name, is_dir, data| {
            if !is_dir && entry_name == wanted {
                found = Some(data);
                return false;
            }
            true
        })?;
        found.ok_or(Error::EntryNotFound(wanted))
    }

    fn write_entries(&mut self, entries: Vec<NewEntry>) -> Result<()> {
        let entries = prepare_new_entries(&self.path, entries)?;
        debug!("Writing {} entries to {:?}", entries.len(), self.path);
        self.rebuild(&[], entries)
    }

    fn remove_entries(&mut self, names: &[&str]) -> Result<()> {
        ensure_all_present(&self.list_entries()?, names)?;
        self.rebuild(names, Vec::new())
    }

    fn test_integrity(&self) -> bool {
        match self.decode_each(|_, _, _| true) {
            Ok(()) => true,
            Err(e) => {
                warn!("Integrity check failed: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_returns_same_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let mut archiver = SevenZipArchiver::new(dir.path().join("book.cb7"));
        let page: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();

        archiver
            .write_entries(vec![
                ("001.png".to_string(), page.clone()),
                ("ComicInfo.xml".to_string(), b"<ComicInfo/>".to_vec()),
            ])
            .unwrap();

        assert_eq!(archiver.read_entry("001.png").unwrap(), page);
        assert_eq!(archiver.read_entry("ComicInfo.xml").unwrap(), b"<ComicInfo/>");
        assert!(archiver.test_integrity());
    }

    #[test]
    fn remove_rebuilds_without_entry() {
        let dir = tempfile::tempdir().unwrap();
        let mut archiver = SevenZipArchiver::new(dir.path().join("book.cb7"));
        archiver
            .write_entries(vec![
                ("001.jpg".to_string(), b"one".to_vec()),
                ("002.jpg".to_string(), b"two".to_vec()),
            ])
            .unwrap();

        archiver.remove_entry("001.jpg").unwrap();
        let names: Vec<String> = archiver
            .list_entries()
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["002.jpg"]);
        assert!(matches!(
            archiver.read_entry("001.jpg"),
            Err(Error::EntryNotFound(_))
        ));
    }

    #[test]
    fn garbage_file_fails_to_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.cb7");
        std::fs::write(&path, b"7z\xbc\xaf\x27\x1c but nothing else").unwrap();
        let archiver = SevenZipArchiver::new(&path);
        assert!(matches!(
            archiver.list_entries(),
            Err(Error::ArchiveRead { .. })
        ));
    }
}
