//! comicbox - Comic Book Archive and Metadata Library
//!
//! This crate reads, tags and converts comic book archives. One capability
//! contract covers four container formats (zip/CBZ, rar/CBR, 7z/CB7 and
//! tar/CBT), chosen by content signature rather than file extension, and two
//! coexisting XML metadata schemas (ComicInfo and MetronInfo) map onto a
//! single [`Metadata`] record.
//!
//! # Getting Started
//!
//! Open an archive as a [`Comic`], walk its pages in natural order, and read
//! or write its metadata:
//!
//! ```rust,no_run
//! use comicbox::prelude::*;
//!
//! fn main() -> comicbox::error::Result<()> {
//!     let mut comic = Comic::open("Saga 001.cbz")?;
//!
//!     // 1. Pages are the image entries, sorted so that 2.jpg comes before 10.jpg
//!     for (index, page) in comic.enumerate_pages()?.iter().enumerate() {
//!         println!("page {}: {}", index, page.name);
//!     }
//!
//!     // 2. Read the MetronInfo record and convert it for ComicInfo readers
//!     let metron = comic.read_metadata(MetadataFormat::MetronInfo)?;
//!     let comicinfo = handler_for(MetadataFormat::ComicInfo).convert(&metron);
//!
//!     // 3. Store it next to the original record
//!     comic.write_metadata(MetadataFormat::ComicInfo, &comicinfo)?;
//!
//!     // 4. Or rebuild everything into another container
//!     comic.convert_format("Saga 001.cbt", ArchiveFormat::Tar)?;
//!     Ok(())
//! }
//! ```
//!
//! Backends can also be used directly through the [`archiver::Archiver`]
//! trait; see [`archiver::select`].

pub mod archiver;
pub mod comic;
pub mod error;
pub mod issue_string;
pub mod metadata;
pub mod path_utils;
pub mod types;

pub use comic::{Comic, ComicOptions, ComicOptionsBuilder, ImageProbe, PageProbe};
pub use issue_string::{IssueString, natural_cmp};
pub use metadata::{Metadata, MetadataHandler, handler_for};

// Re-export error and core types for direct access
pub use types::{
    ArchiveEntry, ArchiveFormat, Capabilities, MetadataFormat, MutationCost, SchemaVersion,
};

/// Prelude module for convenient imports.
///
/// This module re-exports the most commonly used types and traits, allowing you to
/// import everything you need with a single `use comicbox::prelude::*;` statement.
pub mod prelude {
    pub use super::{
        ArchiveEntry, ArchiveFormat, Capabilities, Comic, ComicOptions, ComicOptionsBuilder,
        ImageProbe, IssueString, Metadata, MetadataFormat, MetadataHandler, MutationCost,
        PageProbe, SchemaVersion, error, handler_for, natural_cmp, types,
    };
    pub use crate::archiver::Archiver;
    pub use crate::metadata::{Credit, Page, PageType, Role};
    pub use std::path::{Path, PathBuf};
}
