use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use ::tar::{Archive, Builder, EntryType, Header};
use log::{debug, info, warn};

use super::{
    ensure_all_present, has_content, prepare_new_entries, replace_atomically, skipped_names,
    Archiver, NewEntry,
};
use crate::error::{Error, Result};
use crate::path_utils::normalize_entry_name;
use crate::types::{ArchiveEntry, ArchiveFormat, Capabilities, MutationCost};

/// Tar (`.cbt`) backend.
///
/// Tar has no central index and no native delete: removal and replacement
/// rebuild the archive without the affected members. Original headers (mode,
/// mtime, owner) of surviving members are carried over.
#[derive(Debug, Clone)]
pub struct TarArchiver {
    path: PathBuf,
}

impl TarArchiver {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn open(&self) -> Result<Archive<File>> {
        let file = File::open(&self.path).map_err(|e| Error::read(&self.path, e))?;
        Ok(Archive::new(file))
    }

    /// Walks regular file and directory members in stored order.
    ///
    /// Returns the members of any other kind (links, devices, fifos) that
    /// were passed over, with their entry type.
    fn walk<F>(&self, mut visit: F) -> Result<Vec<(String, EntryType)>>
    where
        F: FnMut(String, &mut ::tar::Entry<'_, File>) -> Result<bool>,
    {
        let mut archive = self.open()?;
        let entries = archive.entries().map_err(|e| Error::read(&self.path, e))?;
        let mut passed_over = Vec::new();
        for entry in entries {
            let mut entry = entry.map_err(|e| Error::read(&self.path, e))?;
            let kind = entry.header().entry_type();
            let name = entry
                .path()
                .map(|p| normalize_entry_name(&p.to_string_lossy()))
                .map_err(|e| Error::read(&self.path, e))?;
            if !(kind.is_file() || kind.is_dir()) {
                passed_over.push((name, kind));
                continue;
            }
            if !visit(name, &mut entry)? {
                break;
            }
        }
        Ok(passed_over)
    }

    fn new_header(size: u64) -> Header {
        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Regular);
        header.set_size(size);
        header.set_mode(0o644);
        header.set_mtime(chrono::Utc::now().timestamp().max(0) as u64);
        header
    }

    fn rebuild(&self, remove: &[&str], add: Vec<NewEntry>) -> Result<()> {
        let skip = skipped_names(remove, &add);
        let mut kept: Vec<(String, Header, Vec<u8>)> = Vec::new();
        if has_content(&self.path) {
            let discarded = self.walk(|name, entry| {
                if skip.contains(&name) {
                    return Ok(true);
                }
                let header = entry.header().clone();
                let mut data = Vec::with_capacity(entry.size() as usize);
                entry
                    .read_to_end(&mut data)
                    .map_err(|e| Error::read(&self.path, e))?;
                kept.push((name, header, data));
                Ok(true)
            })?;
            for (name, kind) in discarded {
                warn!(
                    "Dropping tar member '{}' ({:?}) from {:?}: only files and directories are kept",
                    name, kind, self.path
                );
            }
        }
        info!(
            "Rebuilding tar archive {:?} ({} kept, {} added)",
            self.path,
            kept.len(),
            add.len()
        );

        replace_atomically(&self.path, |temp| {
            let mut builder = Builder::new(temp);
            for (name, mut header, data) in kept {
                builder
                    .append_data(&mut header, &name, data.as_slice())
                    .map_err(|e| Error::write(&self.path, e))?;
            }
            for (name, data) in add {
                let mut header = Self::new_header(data.len() as u64);
                builder
                    .append_data(&mut header, &name, data.as_slice())
                    .map_err(|e| Error::write(&self.path, e))?;
            }
            builder
                .into_inner()
                .map_err(|e| Error::write(&self.path, e))?;
            Ok(())
        })
    }
}

impl Archiver for TarArchiver {
    fn path(&self) -> &Path {
        &self.path
    }

    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::Tar
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            write: true,
            remove: true,
            native_remove: false,
            native_test: false,
            mutation: MutationCost::FullRebuild,
        }
    }

    fn list_entries(&self) -> Result<Vec<ArchiveEntry>> {
        if !has_content(&self.path) {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        self.walk(|name, entry| {
            entries.push(ArchiveEntry {
                name,
                size: entry.size(),
                is_dir: entry.header().entry_type().is_dir(),
            });
            Ok(true)
        })?;
        Ok(entries)
    }

    fn read_entry(&self, name: &str) -> Result<Vec<u8>> {
        let wanted = normalize_entry_name(name);
        if !has_content(&self.path) {
            return Err(Error::EntryNotFound(wanted));
        }
        let mut found = None;
        self.walk(|entry_name, entry| {
            if entry_name != wanted || entry.header().entry_type().is_dir() {
                return Ok(true);
            }
            let mut data = Vec::with_capacity(entry.size() as usize);
            entry
                .read_to_end(&mut data)
                .map_err(|e| Error::read(&self.path, format!("entry '{}': {}", wanted, e)))?;
            found = Some(data);
            Ok(false)
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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_returns_same_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let mut archiver = TarArchiver::new(dir.path().join("book.cbt"));
        archiver.write_entry("pages/001.jpg", b"jpeg bytes").unwrap();
        archiver.write_entry("pages/002.jpg", b"more jpeg").unwrap();

        assert_eq!(archiver.read_entry("pages/001.jpg").unwrap(), b"jpeg bytes");
        assert_eq!(archiver.read_entry("./pages/002.jpg").unwrap(), b"more jpeg");
        assert!(archiver.test_integrity());
        assert!(!archiver.capabilities().native_remove);
    }

    #[test]
    fn remove_is_emulated_by_rebuild() {
        let dir = tempfile::tempdir().unwrap();
        let mut archiver = TarArchiver::new(dir.path().join("book.cbt"));
        archiver
            .write_entries(vec![
                ("001.jpg".to_string(), b"one".to_vec()),
                ("002.jpg".to_string(), b"two".to_vec()),
                ("003.jpg".to_string(), b"three".to_vec()),
            ])
            .unwrap();

        archiver.remove_entries(&["001.jpg", "003.jpg"]).unwrap();
        let names: Vec<String> = archiver
            .list_entries()
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["002.jpg"]);
        assert!(matches!(
            archiver.remove_entry("001.jpg"),
            Err(Error::EntryNotFound(_))
        ));
    }

    #[test]
    fn links_are_passed_over_and_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("links.cbt");
        let mut builder = Builder::new(File::create(&path).unwrap());
        let mut header = Header::new_ustar();
        header.set_size(4);
        header.set_mode(0o644);
        header.set_entry_type(EntryType::Regular);
        builder.append_data(&mut header, "001.jpg", &b"page"[..]).unwrap();
        let mut link = Header::new_ustar();
        link.set_size(0);
        link.set_entry_type(EntryType::Symlink);
        builder.append_link(&mut link, "cover.jpg", "001.jpg").unwrap();
        builder.into_inner().unwrap();

        let mut archiver = TarArchiver::new(&path);
        let passed_over = archiver.walk(|_, _| Ok(true)).unwrap();
        assert_eq!(passed_over, vec![("cover.jpg".to_string(), EntryType::Symlink)]);
        assert_eq!(archiver.list_entries().unwrap().len(), 1);

        archiver.write_entry("ComicInfo.xml", b"<ComicInfo/>").unwrap();
        assert!(archiver.walk(|_, _| Ok(true)).unwrap().is_empty());
        assert_eq!(archiver.read_entry("001.jpg").unwrap(), b"page");
    }

    #[test]
    fn zero_length_file_is_an_empty_archive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.cbt");
        File::create(&path).unwrap();
        let mut archiver = TarArchiver::new(&path);
        assert!(archiver.list_entries().unwrap().is_empty());
        archiver.write_entry("001.jpg", b"page").unwrap();
        assert_eq!(archiver.read_entry("001.jpg").unwrap(), b"page");
    }

    #[test]
    fn long_entry_names_survive_a_rebuild() {
        let dir = tempfile::tempdir().unwrap();
        let mut archiver = TarArchiver::new(dir.path().join("book.cbt"));
        let long_name = format!("{}/001.jpg", "nested-folder".repeat(12));
        archiver.write_entry(&long_name, b"deep").unwrap();
        archiver.write_entry("ComicInfo.xml", b"<ComicInfo/>").unwrap();

        assert_eq!(archiver.read_entry(&long_name).unwrap(), b"deep");
    }
}
