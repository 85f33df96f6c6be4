//! Archiver module provides the backend trait and one implementation per container format.
//!
//! This module contains the common interface every container backend follows,
//! the shared copy-and-replace machinery used by writable backends, and the
//! factory that picks a backend for a file on disk.

use std::collections::HashSet;
use std::fmt;
use std::fs::{self, File};
use std::path::Path;

use log::debug;

use crate::error::{Error, Result};
use crate::path_utils::normalize_entry_name;
use crate::types::{ArchiveEntry, ArchiveFormat, Capabilities};

pub mod factory;
pub mod rar;
pub mod sevenzip;
pub mod tar;
pub mod zip;

pub use factory::{create, detect_format, select};

/// A new or replacement member: `(entry name, contents)`.
pub type NewEntry = (String, Vec<u8>);

/// Common interface for all container backends.
///
/// The `Archiver` trait defines one capability contract over every supported
/// container. Implementations open the underlying file for the duration of a
/// single call and release it before returning. Every mutation builds a
/// complete replacement container next to the original and swaps it in only
/// once it has been fully written, so callers observe either the old or the
/// new contents, never a partial write.
pub trait Archiver: fmt::Debug + Send {
    /// Path of the container on disk.
    fn path(&self) -> &Path;

    /// Container format handled by this backend.
    fn format(&self) -> ArchiveFormat;

    /// Fixed capability set of this backend.
    fn capabilities(&self) -> Capabilities;

    /// Lists every member of the archive in stored order.
    ///
    /// # Returns
    /// * `Result<Vec<ArchiveEntry>>` - The entries, or `ArchiveRead` if the index cannot be parsed
    fn list_entries(&self) -> Result<Vec<ArchiveEntry>>;

    /// Reads the full contents of one member.
    ///
    /// # Parameters
    /// * `name` - Normalized entry name, as returned by [`Archiver::list_entries`]
    ///
    /// # Returns
    /// * `Result<Vec<u8>>` - The bytes, `EntryNotFound` if absent, `ArchiveRead` on decode/CRC failure
    fn read_entry(&self, name: &str) -> Result<Vec<u8>>;

    /// Adds or replaces several members with a single rebuild.
    fn write_entries(&mut self, entries: Vec<NewEntry>) -> Result<()>;

    /// Removes several members with a single rebuild. Fails with
    /// `EntryNotFound` before touching the file if any name is absent.
    fn remove_entries(&mut self, names: &[&str]) -> Result<()>;

    /// Adds or replaces one member.
    fn write_entry(&mut self, name: &str, data: &[u8]) -> Result<()> {
        self.write_entries(vec![(name.to_string(), data.to_vec())])
    }

    /// Removes one member.
    fn remove_entry(&mut self, name: &str) -> Result<()> {
        self.remove_entries(&[name])
    }

    /// Best-effort corruption check.
    ///
    /// The default implementation reads every entry in full; backends with a
    /// native test pass override it.
    fn test_integrity(&self) -> bool {
        read_every_entry(self)
    }

    /// Whether a member with this exact normalized name exists.
    fn has_entry(&self, name: &str) -> Result<bool> {
        let name = normalize_entry_name(name);
        Ok(self.list_entries()?.iter().any(|e| e.name == name))
    }

    /// Copies every file member of `other` into this archive in one batch write.
    fn copy_from(&mut self, other: &dyn Archiver) -> Result<()> {
        let mut entries = Vec::new();
        for entry in other.list_entries()?.into_iter().filter(|e| !e.is_dir) {
            let data = other.read_entry(&entry.name)?;
            entries.push((entry.name, data));
        }
        self.write_entries(entries)
    }
}

/// Synthesized integrity check: list the archive and decode every file entry.
pub(crate) fn read_every_entry<A: Archiver + ?Sized>(archiver: &A) -> bool {
    let entries = match archiver.list_entries() {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("Integrity check failed for {:?}: {}", archiver.path(), e);
            return false;
        }
    };
    for entry in entries.iter().filter(|e| !e.is_dir) {
        if let Err(e) = archiver.read_entry(&entry.name) {
            log::warn!(
                "Integrity check failed for {:?} at '{}': {}",
                archiver.path(),
                entry.name,
                e
            );
            return false;
        }
    }
    true
}

/// Fails with `UnsupportedOperation` unless the capability flag is set.
pub(crate) fn ensure_capability(
    format: ArchiveFormat,
    allowed: bool,
    operation: &'static str,
) -> Result<()> {
    if allowed {
        Ok(())
    } else {
        Err(Error::UnsupportedOperation { format, operation })
    }
}

/// Normalizes the names of new entries, rejecting empty ones. When the same
/// name appears twice, the last occurrence wins.
pub(crate) fn prepare_new_entries(path: &Path, entries: Vec<NewEntry>) -> Result<Vec<NewEntry>> {
    let mut prepared: Vec<NewEntry> = Vec::with_capacity(entries.len());
    for (name, data) in entries {
        let name = normalize_entry_name(&name);
        if name.is_empty() {
            return Err(Error::write(path, "entry name is empty"));
        }
        prepared.retain(|(existing, _)| *existing != name);
        prepared.push((name, data));
    }
    Ok(prepared)
}

/// Names that the rebuilt container must not carry over from the original:
/// removed entries plus entries that are being replaced.
pub(crate) fn skipped_names(removed: &[&str], added: &[NewEntry]) -> HashSet<String> {
    removed
        .iter()
        .map(|name| normalize_entry_name(name))
        .chain(added.iter().map(|(name, _)| name.clone()))
        .collect()
}

/// Checks that every name in `names` is present in `entries`.
pub(crate) fn ensure_all_present(entries: &[ArchiveEntry], names: &[&str]) -> Result<()> {
    for name in names {
        let name = normalize_entry_name(name);
        if !entries.iter().any(|e| e.name == name) {
            return Err(Error::EntryNotFound(name));
        }
    }
    Ok(())
}

/// Builds a replacement container in a temporary file next to `path` and
/// renames it over the original once `build` has succeeded.
///
/// On any failure the temporary file is deleted and `path` is left untouched.
pub(crate) fn replace_atomically<F>(path: &Path, build: F) -> Result<()>
where
    F: FnOnce(&mut File) -> Result<()>,
{
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = tempfile::Builder::new()
        .prefix(".comicbox-")
        .suffix(".tmp")
        .tempfile_in(directory)
        .map_err(|e| Error::write(path, format!("cannot create temporary file: {}", e)))?;

    build(temp.as_file_mut())?;

    temp.as_file()
        .sync_all()
        .map_err(|e| Error::write(path, e))?;
    if let Ok(metadata) = fs::metadata(path) {
        // keep the original file mode; a failure here is not worth aborting over
        let _ = temp.as_file().set_permissions(metadata.permissions());
    }
    temp.persist(path)
        .map_err(|e| Error::write(path, e.error))?;

    debug!("Replaced {:?} with rebuilt container", path);
    Ok(())
}

/// Whether `path` holds anything to read. A missing or zero-length file is an
/// empty container that the next write creates from scratch.
pub(crate) fn has_content(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false)
}

/// Whether an entry should be stored without compression (already-compressed images).
pub(crate) fn should_store(name: &str) -> bool {
    crate::types::get_file_info(name).is_some()
}
