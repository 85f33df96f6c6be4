use std::path::{Path, PathBuf};

use log::warn;
use unrar::Archive;

use super::{ensure_capability, has_content, Archiver, NewEntry};
use crate::error::{Error, Result};
use crate::path_utils::normalize_entry_name;
use crate::types::{ArchiveEntry, ArchiveFormat, Capabilities, MutationCost};

/// RAR (`.cbr`) backend. Read-only: every mutation fails with
/// `UnsupportedOperation` and leaves the file byte-identical.
#[derive(Debug, Clone)]
pub struct RarArchiver {
    path: PathBuf,
}

impl RarArchiver {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Archiver for RarArchiver {
    fn path(&self) -> &Path {
        &self.path
    }

    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::Rar
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            write: false,
            remove: false,
            native_remove: false,
            native_test: true,
            mutation: MutationCost::ReadOnly,
        }
    }

    fn list_entries(&self) -> Result<Vec<ArchiveEntry>> {
        if !has_content(&self.path) {
            return Ok(Vec::new());
        }
        let listing = Archive::new(&self.path)
            .open_for_listing()
            .map_err(|e| Error::read(&self.path, e))?;

        let mut entries = Vec::new();
        for header in listing {
            let header = header.map_err(|e| Error::read(&self.path, e))?;
            entries.push(ArchiveEntry {
                name: normalize_entry_name(&header.filename.to_string_lossy()),
                size: header.unpacked_size,
                is_dir: header.is_directory(),
            });
        }
        Ok(entries)
    }

    fn read_entry(&self, name: &str) -> Result<Vec<u8>> {
        let wanted = normalize_entry_name(name);
        if !has_content(&self.path) {
            return Err(Error::EntryNotFound(wanted));
        }
        let mut archive = Archive::new(&self.path)
            .open_for_processing()
            .map_err(|e| Error::read(&self.path, e))?;

        while let Some(header) = archive
            .read_header()
            .map_err(|e| Error::read(&self.path, e))?
        {
            let entry_name = normalize_entry_name(&header.entry().filename.to_string_lossy());
            archive = if entry_name == wanted {
                let (data, _) = header
                    .read()
                    .map_err(|e| Error::read(&self.path, format!("entry '{}': {}", wanted, e)))?;
                return Ok(data);
            } else {
                header.skip().map_err(|e| Error::read(&self.path, e))?
            };
        }
        Err(Error::EntryNotFound(wanted))
    }

    fn write_entries(&mut self, _entries: Vec<NewEntry>) -> Result<()> {
        ensure_capability(self.format(), self.capabilities().write, "write")
    }

    fn remove_entries(&mut self, _names: &[&str]) -> Result<()> {
        ensure_capability(self.format(), self.capabilities().remove, "remove")
    }

    fn test_integrity(&self) -> bool {
        let mut archive = match Archive::new(&self.path).open_for_processing() {
            Ok(archive) => archive,
            Err(e) => {
                warn!("Integrity check failed for {:?}: {}", self.path, e);
                return false;
            }
        };
        loop {
            archive = match archive.read_header() {
                Ok(Some(header)) => match header.test() {
                    Ok(next) => next,
                    Err(e) => {
                        warn!("Integrity check failed for {:?}: {}", self.path, e);
                        return false;
                    }
                },
                Ok(None) => return true,
                Err(e) => {
                    warn!("Integrity check failed for {:?}: {}", self.path, e);
                    return false;
                }
            };
        }
    }
}
