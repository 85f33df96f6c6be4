//! Backend selection by content signature.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use log::debug;

use super::rar::RarArchiver;
use super::sevenzip::SevenZipArchiver;
use super::tar::TarArchiver;
use super::zip::ZipArchiver;
use super::Archiver;
use crate::error::{Error, Result};
use crate::types::ArchiveFormat;

const ZIP_SIGNATURES: &[&[u8]] = &[b"PK\x03\x04", b"PK\x05\x06", b"PK\x07\x08"];
const RAR_SIGNATURES: &[&[u8]] = &[b"Rar!\x1a\x07\x00", b"Rar!\x1a\x07\x01\x00"];
const SEVEN_ZIP_SIGNATURE: &[u8] = b"7z\xbc\xaf\x27\x1c";
const TAR_MAGIC: &[u8] = b"ustar";
const TAR_MAGIC_OFFSET: usize = 257;
const TAR_BLOCK: usize = 512;

/// Files shorter than this cannot carry any supported signature.
const MIN_SIGNATURE_LEN: usize = 6;

/// Detects the container format of `path`.
///
/// The content signature decides. The extension is only consulted when the
/// file is too short to hold a signature (e.g. a freshly created empty file).
///
/// # Returns
/// * `Result<ArchiveFormat>` - The format, or `UnsupportedFormat` if nothing matches
pub fn detect_format(path: &Path) -> Result<ArchiveFormat> {
    let mut head = Vec::with_capacity(TAR_BLOCK);
    File::open(path)?
        .take(TAR_BLOCK as u64)
        .read_to_end(&mut head)?;

    if let Some(format) = sniff(&head) {
        debug!("Detected {} signature in {:?}", format, path);
        return Ok(format);
    }

    if head.len() < MIN_SIGNATURE_LEN {
        if let Some(format) = ArchiveFormat::from_path(path) {
            debug!("Falling back to extension for short file {:?}: {}", path, format);
            return Ok(format);
        }
    }

    Err(Error::UnsupportedFormat(path.to_path_buf()))
}

/// Returns the backend for an existing file, chosen by [`detect_format`].
pub fn select(path: &Path) -> Result<Box<dyn Archiver>> {
    Ok(create(path, detect_format(path)?))
}

/// Returns a backend of the given format for `path`, which need not exist yet.
pub fn create(path: &Path, format: ArchiveFormat) -> Box<dyn Archiver> {
    match format {
        ArchiveFormat::Zip => Box::new(ZipArchiver::new(path)),
        ArchiveFormat::Rar => Box::new(RarArchiver::new(path)),
        ArchiveFormat::SevenZip => Box::new(SevenZipArchiver::new(path)),
        ArchiveFormat::Tar => Box::new(TarArchiver::new(path)),
    }
}

fn sniff(head: &[u8]) -> Option<ArchiveFormat> {
    if ZIP_SIGNATURES.iter().any(|sig| head.starts_with(sig)) {
        return Some(ArchiveFormat::Zip);
    }
    if RAR_SIGNATURES.iter().any(|sig| head.starts_with(sig)) {
        return Some(ArchiveFormat::Rar);
    }
    if head.starts_with(SEVEN_ZIP_SIGNATURE) {
        return Some(ArchiveFormat::SevenZip);
    }
    if head.len() >= TAR_MAGIC_OFFSET + TAR_MAGIC.len()
        && &head[TAR_MAGIC_OFFSET..TAR_MAGIC_OFFSET + TAR_MAGIC.len()] == TAR_MAGIC
    {
        return Some(ArchiveFormat::Tar);
    }
    if has_valid_tar_checksum(head) {
        return Some(ArchiveFormat::Tar);
    }
    None
}

/// Pre-POSIX tar headers carry no magic; accept a first block whose stored
/// checksum (octal, bytes 148..156) matches the sum of the header bytes with
/// the checksum field counted as spaces.
fn has_valid_tar_checksum(head: &[u8]) -> bool {
    if head.len() < TAR_BLOCK || head[0] == 0 {
        return false;
    }
    let field = &head[148..156];
    let digits: String = field
        .iter()
        .map(|&b| b as char)
        .skip_while(|c| *c == ' ')
        .take_while(|c| c.is_digit(8))
        .collect();
    let Ok(stored) = u32::from_str_radix(&digits, 8) else {
        return false;
    };

    let computed: u32 = head[..TAR_BLOCK]
        .iter()
        .enumerate()
        .map(|(i, &b)| if (148..156).contains(&i) { b' ' as u32 } else { b as u32 })
        .sum();
    stored == computed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniffs_signatures() {
        assert_eq!(sniff(b"PK\x03\x04rest"), Some(ArchiveFormat::Zip));
        assert_eq!(sniff(b"PK\x05\x06\0\0"), Some(ArchiveFormat::Zip));
        assert_eq!(sniff(b"Rar!\x1a\x07\x00..."), Some(ArchiveFormat::Rar));
        assert_eq!(sniff(b"Rar!\x1a\x07\x01\x00.."), Some(ArchiveFormat::Rar));
        assert_eq!(sniff(b"7z\xbc\xaf\x27\x1c\x00\x04"), Some(ArchiveFormat::SevenZip));
        assert_eq!(sniff(b"%PDF-1.7 and more"), None);
    }

    #[test]
    fn sniffs_ustar_and_v7_tar() {
        let mut block = vec![0u8; TAR_BLOCK];
        block[..7].copy_from_slice(b"001.jpg");
        block[TAR_MAGIC_OFFSET..TAR_MAGIC_OFFSET + 5].copy_from_slice(TAR_MAGIC);
        assert_eq!(sniff(&block), Some(ArchiveFormat::Tar));

        let mut v7 = vec![0u8; TAR_BLOCK];
        v7[..7].copy_from_slice(b"001.jpg");
        v7[100..107].copy_from_slice(b"0000644");
        let sum: u32 = v7
            .iter()
            .enumerate()
            .map(|(i, &b)| if (148..156).contains(&i) { 32 } else { b as u32 })
            .sum();
        let checksum = format!("{:06o}\0 ", sum);
        v7[148..156].copy_from_slice(checksum.as_bytes());
        assert_eq!(sniff(&v7), Some(ArchiveFormat::Tar));

        v7[0] = b'X';
        assert_eq!(sniff(&v7), None);
    }

    #[test]
    fn content_wins_over_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("actually-zip.cbr");
        std::fs::write(&path, b"PK\x05\x06\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0").unwrap();
        assert_eq!(detect_format(&path).unwrap(), ArchiveFormat::Zip);

        let lying = dir.path().join("notes.cbz");
        std::fs::write(&lying, b"plain text pretending to be a comic").unwrap();
        assert!(matches!(
            detect_format(&lying),
            Err(Error::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn short_files_fall_back_to_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.cb7");
        std::fs::write(&path, b"").unwrap();
        assert_eq!(detect_format(&path).unwrap(), ArchiveFormat::SevenZip);

        let unknown = dir.path().join("empty.bin");
        std::fs::write(&unknown, b"").unwrap();
        assert!(detect_format(&unknown).is_err());
    }
}
