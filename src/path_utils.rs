//! Entry-name and path utilities.
//!
//! Archive members are addressed by path-like strings whose separators and
//! casing depend on the tool that produced the archive. The helpers here give
//! every backend the same view of those names, and validate the filesystem
//! paths the crate writes new archives to.

use crate::error::{Error, Result};

use std::path::{Path, PathBuf};

/// Characters that are rejected in target archive paths.
const INVALID_PATH_CHARS: &[char] = &['<', '>', '"', '|', '?', '*'];

/// Normalizes an entry name to forward slashes without a leading `./` or `/`.
///
/// # Arguments
///
/// * `name` - The raw entry name as stored in the container
///
/// # Returns
///
/// * `String` - The normalized name
pub fn normalize_entry_name(name: &str) -> String {
    let unified = name.replace('\\', "/");
    let mut trimmed = unified.as_str();
    loop {
        if let Some(rest) = trimmed.strip_prefix("./") {
            trimmed = rest;
        } else if let Some(rest) = trimmed.strip_prefix('/') {
            trimmed = rest;
        } else {
            break;
        }
    }
    trimmed.to_string()
}

/// Returns the last component of an entry name.
pub fn entry_file_name(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

/// Returns the lowercased extension of an entry name, if any.
///
/// Names like `.hidden` with no further dot have no extension.
pub fn entry_extension(name: &str) -> Option<String> {
    let file_name = entry_file_name(name);
    let (stem, extension) = file_name.rsplit_once('.')?;
    if stem.is_empty() || extension.is_empty() {
        return None;
    }
    Some(extension.to_ascii_lowercase())
}

/// Checks if an entry is hidden: its file name, or any folder it lives in,
/// starts with a dot. This also covers `__MACOSX` resource forks.
pub fn is_hidden_entry(name: &str) -> bool {
    name.split(['/', '\\'])
        .filter(|part| !part.is_empty())
        .any(|part| part.starts_with('.') || part == "__MACOSX")
}

/// Checks if a target path is usable for a new archive: no reserved
/// characters and a parent directory that exists.
///
/// # Arguments
///
/// * `path` - The path to validate
///
/// # Returns
///
/// * `Result<()>` - Ok if the path is valid, or an error describing the issue
pub fn validate_target_path(path: &Path) -> Result<()> {
    let name = path.to_string_lossy();
    if name.is_empty() {
        return Err(Error::InvalidPath(
            path.to_path_buf(),
            "Path is empty".to_string(),
        ));
    }

    if path
        .file_name()
        .map(|f| f.to_string_lossy().contains(INVALID_PATH_CHARS))
        .unwrap_or(true)
    {
        return Err(Error::InvalidPath(
            path.to_path_buf(),
            "Path contains invalid characters".to_string(),
        ));
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.is_dir() {
            return Err(Error::InvalidPath(
                path.to_path_buf(),
                "Parent directory does not exist".to_string(),
            ));
        }
    }

    Ok(())
}

/// Returns `path` if nothing exists there, otherwise the first free
/// `stem (n).ext` sibling.
pub fn unique_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let extension = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let parent = path.parent().unwrap_or_else(|| Path::new(""));

    let mut counter = 1;
    loop {
        let candidate = parent.join(format!("{} ({}){}", stem, counter, extension));
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_entry_name() {
        assert_eq!(normalize_entry_name("./pages/001.jpg"), "pages/001.jpg");
        assert_eq!(normalize_entry_name("\\pages\\001.jpg"), "pages/001.jpg");
        assert_eq!(normalize_entry_name("ComicInfo.xml"), "ComicInfo.xml");
    }

    #[test]
    fn test_entry_extension() {
        assert_eq!(entry_extension("pages/001.JPG").as_deref(), Some("jpg"));
        assert_eq!(entry_extension("archive.tar.gz").as_deref(), Some("gz"));
        assert_eq!(entry_extension(".hidden"), None);
        assert_eq!(entry_extension("README"), None);
    }

    #[test]
    fn test_is_hidden_entry() {
        assert!(is_hidden_entry(".DS_Store"));
        assert!(is_hidden_entry("__MACOSX/._001.jpg"));
        assert!(is_hidden_entry("pages/.thumb.jpg"));
        assert!(!is_hidden_entry("pages/001.jpg"));
    }

    #[test]
    fn test_validate_target_path_with_invalid_chars() {
        assert!(validate_target_path(Path::new("test<invalid>.cbz")).is_err());
        assert!(validate_target_path(Path::new("")).is_err());
        assert!(validate_target_path(Path::new("missing-dir-xyz/out.cbz")).is_err());
        assert!(validate_target_path(Path::new("out.cbz")).is_ok());
    }
}
