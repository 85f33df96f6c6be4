//! Core data types and enums shared by the archive and metadata layers.
//!
//! This module defines the small value types used throughout comicbox:
//! - Archive enumeration results (`ArchiveEntry`)
//! - Backend capability descriptors (`Capabilities`, `MutationCost`)
//! - Enumerations for container and metadata formats (`ArchiveFormat`, `MetadataFormat`, `SchemaVersion`)
//! - Image type helpers used to recognise pages (`get_file_info`)

use std::fmt;
use std::path::Path;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default extensions recognised as page images.
pub const DEFAULT_IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "avif", "jxl"];

/// One member of an archive, as returned by enumeration.
///
/// Entries are immutable snapshots: they do not borrow the archive and are
/// produced fresh on every `list_entries` call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ArchiveEntry {
    pub name: String,
    pub size: u64,
    pub is_dir: bool,
}

impl ArchiveEntry {
    pub fn file(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
            is_dir: false,
        }
    }
}

/// How expensive a mutation is for a given backend.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MutationCost {
    /// The container cannot be mutated at all.
    ReadOnly,
    /// Surviving entries are raw-copied into a replacement container.
    CopyAndReplace,
    /// Every surviving entry is decoded and re-encoded: O(archive size) per write.
    FullRebuild,
}

/// Per-backend capability descriptor.
///
/// Callers are expected to check these flags before invoking a mutating
/// operation; a backend fails with [`crate::error::Error::UnsupportedOperation`] instead of
/// pretending to succeed.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Capabilities {
    pub write: bool,
    pub remove: bool,
    /// `false` when removal is emulated by rebuilding the archive without the entry.
    pub native_remove: bool,
    /// `false` when integrity testing is synthesized by reading every entry.
    pub native_test: bool,
    pub mutation: MutationCost,
}

/// The on-disk container format of a comic archive.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ArchiveFormat {
    Zip,
    Rar,
    SevenZip,
    Tar,
}

impl ArchiveFormat {
    /// Maps a file extension (without the dot, any case) to a format.
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "cbz" | "zip" => Some(ArchiveFormat::Zip),
            "cbr" | "rar" => Some(ArchiveFormat::Rar),
            "cb7" | "7z" => Some(ArchiveFormat::SevenZip),
            "cbt" | "tar" => Some(ArchiveFormat::Tar),
            _ => None,
        }
    }

    /// Guesses the format from the extension of `path`.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// The comic-specific extension for this container.
    pub fn comic_extension(&self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "cbz",
            ArchiveFormat::Rar => "cbr",
            ArchiveFormat::SevenZip => "cb7",
            ArchiveFormat::Tar => "cbt",
        }
    }

    pub fn is_writable(&self) -> bool {
        !matches!(self, ArchiveFormat::Rar)
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ArchiveFormat::Zip => "ZIP",
            ArchiveFormat::Rar => "RAR",
            ArchiveFormat::SevenZip => "7Z",
            ArchiveFormat::Tar => "TAR",
        };
        f.write_str(name)
    }
}

/// Schema identity tag for an embedded metadata record.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MetadataFormat {
    ComicInfo,
    MetronInfo,
}

impl MetadataFormat {
    pub const ALL: [MetadataFormat; 2] = [MetadataFormat::ComicInfo, MetadataFormat::MetronInfo];

    /// The well-known archive entry name of this record.
    pub fn filename(&self) -> &'static str {
        match self {
            MetadataFormat::ComicInfo => "ComicInfo.xml",
            MetadataFormat::MetronInfo => "MetronInfo.xml",
        }
    }

    /// Whether `entry_name` (at any directory depth, any case) is this format's entry.
    pub fn matches_entry(&self, entry_name: &str) -> bool {
        let base = entry_name.rsplit(['/', '\\']).next().unwrap_or(entry_name);
        base.eq_ignore_ascii_case(self.filename())
    }
}

impl fmt::Display for MetadataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataFormat::ComicInfo => f.write_str("ComicInfo"),
            MetadataFormat::MetronInfo => f.write_str("MetronInfo"),
        }
    }
}

/// Schema versions the handlers know how to validate.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SchemaVersion {
    ComicInfoV1,
    ComicInfoV2,
    MetronInfoV1,
}

impl SchemaVersion {
    pub fn format(&self) -> MetadataFormat {
        match self {
            SchemaVersion::ComicInfoV1 | SchemaVersion::ComicInfoV2 => MetadataFormat::ComicInfo,
            SchemaVersion::MetronInfoV1 => MetadataFormat::MetronInfo,
        }
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaVersion::ComicInfoV1 => f.write_str("ComicInfo v1"),
            SchemaVersion::ComicInfoV2 => f.write_str("ComicInfo v2"),
            SchemaVersion::MetronInfoV1 => f.write_str("MetronInfo v1"),
        }
    }
}

/// Utility function: Determines file type and MIME type from an entry name
///
/// # Arguments
///
/// * `name` - Archive entry name (or path) to analyze
///
/// # Returns
///
/// * `Some((&str, &str))` - A tuple containing (normalized extension, MIME type)
/// * `None` - The name has no supported image extension
///
/// # Supported formats
///
/// - JPEG/JPG: image/jpeg
/// - PNG: image/png
/// - GIF: image/gif
/// - WebP: image/webp
/// - AVIF: image/avif
/// - JPEG XL: image/jxl
pub fn get_file_info(name: &str) -> Option<(&'static str, &'static str)> {
    let extension = crate::path_utils::entry_extension(name);

    match extension.as_deref() {
        Some("jpg") | Some("jpeg") => Some(("jpg", "image/jpeg")),
        Some("png") => Some(("png", "image/png")),
        Some("gif") => Some(("gif", "image/gif")),
        Some("webp") => Some(("webp", "image/webp")),
        Some("avif") => Some(("avif", "image/avif")),
        Some("jxl") => Some(("jxl", "image/jxl")),
        _ => None,
    }
}
