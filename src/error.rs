//! Custom error types and result handling for comicbox operations.
//!
//! This module defines the error taxonomy used throughout the crate.
//! All operations return a [`Result<T>`] which is a type alias for `std::result::Result<T, Error>`.
//!
use std::path::PathBuf;

use crate::types::{ArchiveFormat, MetadataFormat};

/// Type alias for Results with comicbox errors.
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error type for all comicbox operations.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// I/O errors from the standard library that happen outside container decoding
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    ComicOptionsBuilder(#[from] crate::comic::ComicOptionsBuilderError),
    /// The factory could not classify the file as any supported container
    #[error("Unsupported archive format: {0:?}")]
    UnsupportedFormat(PathBuf),
    /// The container index or an entry could not be decoded
    #[error("Failed to read archive '{path:?}': {reason}")]
    ArchiveRead { path: PathBuf, reason: String },
    /// A new container could not be built or swapped in
    #[error("Failed to write archive '{path:?}': {reason}")]
    ArchiveWrite { path: PathBuf, reason: String },
    /// The backend does not support the requested mutation
    #[error("Operation '{operation}' is not supported by {format} archives")]
    UnsupportedOperation {
        format: ArchiveFormat,
        operation: &'static str,
    },
    /// The named member does not exist in the archive
    #[error("Entry not found: {0}")]
    EntryNotFound(String),
    /// The metadata document is not well-formed XML
    #[error("Malformed {format} document: {reason}")]
    MetadataParse {
        format: MetadataFormat,
        reason: String,
    },
    /// The metadata document is well-formed but violates its schema
    #[error("Invalid {format} document: {detail}")]
    MetadataValidation {
        format: MetadataFormat,
        detail: String,
    },
    /// A page was requested outside of `0..count`
    #[error("Page index {index} is out of range (archive has {count} pages)")]
    PageIndex { index: usize, count: usize },
    /// Error for invalid file or directory paths
    #[error("The given path '{0:?}' is invalid: {1}")]
    InvalidPath(PathBuf, String),
}

impl Error {
    pub(crate) fn read(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::ArchiveRead {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn write(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::ArchiveWrite {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn validation(format: MetadataFormat, detail: impl Into<String>) -> Self {
        Error::MetadataValidation {
            format,
            detail: detail.into(),
        }
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Error {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.to_string().as_ref())
    }
}
