use std::fmt;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info, warn};
use rayon::prelude::*;

use crate::archiver::{self, Archiver, NewEntry};
use crate::error::{Error, Result};
use crate::issue_string::natural_cmp;
use crate::metadata::{handler_for, Metadata};
use crate::path_utils::{entry_extension, is_hidden_entry, unique_path, validate_target_path};
use crate::types::{
    ArchiveEntry, ArchiveFormat, Capabilities, MetadataFormat, SchemaVersion,
    DEFAULT_IMAGE_EXTENSIONS,
};

fn default_image_extensions() -> Vec<String> {
    DEFAULT_IMAGE_EXTENSIONS
        .iter()
        .map(|e| e.to_string())
        .collect()
}

/// Options for opening a [`Comic`], built declaratively using the builder pattern.
///
/// ```rust,no_run
/// # use comicbox::prelude::*;
/// let options = ComicOptions::builder()
///     .probe_page_dimensions(true)
///     .image_extensions(vec!["jpg".to_string(), "png".to_string()])
///     .build()
///     .expect("Invalid options");
/// let comic = Comic::open_with("issue.cbz", options)?;
/// # Ok::<(), comicbox::error::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, derive_builder::Builder)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ComicOptions {
    /// Fill page byte sizes and pixel dimensions when reading metadata.
    ///
    /// Every page is read and its header decoded, so this is off by default.
    #[builder(default = "false")]
    pub probe_page_dimensions: bool,

    /// Replace a page list whose length disagrees with the archive's page
    /// count by the default list (first page `FrontCover`) when reading.
    #[builder(default = "true")]
    pub reset_mismatched_pages: bool,

    /// Lowercase extensions (without the dot) recognised as pages.
    #[builder(default = "default_image_extensions()")]
    pub image_extensions: Vec<String>,
}

impl ComicOptions {
    pub fn builder() -> ComicOptionsBuilder {
        ComicOptionsBuilder::default()
    }

    fn is_page(&self, entry: &ArchiveEntry) -> bool {
        if entry.is_dir || is_hidden_entry(&entry.name) {
            return false;
        }
        entry_extension(&entry.name)
            .map(|ext| {
                self.image_extensions
                    .iter()
                    .any(|known| known.eq_ignore_ascii_case(&ext))
            })
            .unwrap_or(false)
    }
}

impl Default for ComicOptions {
    fn default() -> Self {
        Self {
            probe_page_dimensions: false,
            reset_mismatched_pages: true,
            image_extensions: default_image_extensions(),
        }
    }
}

impl ComicOptionsBuilder {
    fn validate(&self) -> std::result::Result<(), String> {
        if let Some(extensions) = &self.image_extensions {
            if extensions.is_empty() {
                return Err("At least one image extension is required.".to_string());
            }
            if let Some(bad) = extensions
                .iter()
                .find(|e| e.is_empty() || e.starts_with('.') || e.contains(['/', '\\']))
            {
                return Err(format!(
                    "Invalid image extension '{}': give it without the leading dot.",
                    bad
                ));
            }
        }
        Ok(())
    }
}

/// Reads pixel dimensions from encoded page bytes.
pub trait PageProbe: Send + Sync {
    /// `(width, height)`, or `None` when the bytes cannot be decoded.
    fn probe(&self, data: &[u8]) -> Option<(u32, u32)>;
}

/// [`PageProbe`] backed by the `image` crate. Only the image header is decoded.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageProbe;

impl PageProbe for ImageProbe {
    fn probe(&self, data: &[u8]) -> Option<(u32, u32)> {
        image::ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .ok()?
            .into_dimensions()
            .ok()
    }
}

/// An opened comic archive: one backend chosen by content signature, plus the
/// page and metadata view on top of it.
///
/// Pages are the non-hidden image entries sorted in natural order; page `N`
/// always means the `N`-th entry of [`Comic::enumerate_pages`]. Metadata
/// records live in fixed-name entries (`ComicInfo.xml`, `MetronInfo.xml`) and
/// are handled by the matching [`crate::metadata::MetadataHandler`].
///
/// Each call opens the underlying file for its own duration only; mutations
/// rebuild the container and swap it in atomically.
pub struct Comic {
    archiver: Box<dyn Archiver>,
    options: ComicOptions,
    probe: Arc<dyn PageProbe>,
}

impl fmt::Debug for Comic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Comic")
            .field("archiver", &self.archiver)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Comic {
    /// Opens `path` with default options.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, ComicOptions::default())
    }

    /// Opens `path`, detecting the container format from its content.
    ///
    /// # Returns
    /// * `Result<Comic>` - `InvalidPath` if the file does not exist, `UnsupportedFormat`
    ///   if no backend recognises it
    pub fn open_with(path: impl AsRef<Path>, options: ComicOptions) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::InvalidPath(
                path.to_path_buf(),
                "File does not exist".to_string(),
            ));
        }
        let archiver = archiver::select(path)?;
        debug!("Opened {:?} as {}", path, archiver.format());
        Ok(Self::from_archiver(archiver, options))
    }

    /// Wraps an already chosen backend.
    pub fn from_archiver(archiver: Box<dyn Archiver>, options: ComicOptions) -> Self {
        Self {
            archiver,
            options,
            probe: Arc::new(ImageProbe),
        }
    }

    /// Replaces the page-dimension collaborator.
    pub fn with_probe(mut self, probe: impl PageProbe + 'static) -> Self {
        self.probe = Arc::new(probe);
        self
    }

    /// Releases the backend. Dropping the comic has the same effect.
    pub fn close(self) {
        debug!("Closed {:?}", self.archiver.path());
    }

    pub fn path(&self) -> &Path {
        self.archiver.path()
    }

    pub fn format(&self) -> ArchiveFormat {
        self.archiver.format()
    }

    pub fn capabilities(&self) -> Capabilities {
        self.archiver.capabilities()
    }

    pub fn options(&self) -> &ComicOptions {
        &self.options
    }

    pub fn is_writable(&self) -> bool {
        self.capabilities().write
    }

    /// At least one page and a passing integrity check.
    pub fn is_valid_comic(&self) -> bool {
        match self.page_count() {
            Ok(0) => false,
            Ok(_) => self.archiver.test_integrity(),
            Err(e) => {
                warn!("{:?} is not a valid comic: {}", self.path(), e);
                false
            }
        }
    }

    // --- Pages ---

    /// Lists the pages in natural filename order. Page `N` is element `N`.
    pub fn enumerate_pages(&self) -> Result<Vec<ArchiveEntry>> {
        let mut pages: Vec<ArchiveEntry> = self
            .archiver
            .list_entries()?
            .into_iter()
            .filter(|e| self.options.is_page(e))
            .collect();
        pages.sort_by(|a, b| natural_cmp(&a.name, &b.name));
        Ok(pages)
    }

    pub fn page_count(&self) -> Result<usize> {
        Ok(self.enumerate_pages()?.len())
    }

    pub fn page_name(&self, index: usize) -> Result<String> {
        let pages = self.enumerate_pages()?;
        let count = pages.len();
        pages
            .into_iter()
            .nth(index)
            .map(|page| page.name)
            .ok_or(Error::PageIndex { index, count })
    }

    /// Bytes of page `index`.
    pub fn get_page(&self, index: usize) -> Result<Vec<u8>> {
        let name = self.page_name(index)?;
        self.archiver.read_entry(&name)
    }

    /// Removes the pages at `indices` in a single rebuild.
    pub fn remove_pages(&mut self, indices: &[usize]) -> Result<()> {
        let pages = self.enumerate_pages()?;
        let count = pages.len();
        let mut names = Vec::with_capacity(indices.len());
        for &index in indices {
            let page = pages.get(index).ok_or(Error::PageIndex { index, count })?;
            if !names.contains(&page.name.as_str()) {
                names.push(page.name.as_str());
            }
        }
        self.archiver.remove_entries(&names)?;
        info!("Removed {} page(s) from {:?}", names.len(), self.path());
        Ok(())
    }

    // --- Metadata ---

    /// Entry holding `format`'s record: the root-level copy if there is one,
    /// otherwise the first nested one.
    fn metadata_entry(&self, format: MetadataFormat) -> Result<Option<String>> {
        let matching: Vec<ArchiveEntry> = self
            .archiver
            .list_entries()?
            .into_iter()
            .filter(|e| !e.is_dir && format.matches_entry(&e.name))
            .collect();
        let chosen = matching
            .iter()
            .find(|e| !e.name.contains('/'))
            .or_else(|| matching.first());
        Ok(chosen.map(|e| e.name.clone()))
    }

    pub fn has_metadata(&self, format: MetadataFormat) -> Result<bool> {
        Ok(self.metadata_entry(format)?.is_some())
    }

    /// Formats with a record present, in [`MetadataFormat::ALL`] order.
    pub fn metadata_formats(&self) -> Result<Vec<MetadataFormat>> {
        let entries = self.archiver.list_entries()?;
        Ok(MetadataFormat::ALL
            .into_iter()
            .filter(|format| {
                entries
                    .iter()
                    .any(|e| !e.is_dir && format.matches_entry(&e.name))
            })
            .collect())
    }

    /// The stored bytes of `format`'s record.
    pub fn read_raw_metadata(&self, format: MetadataFormat) -> Result<Vec<u8>> {
        let name = self
            .metadata_entry(format)?
            .ok_or_else(|| Error::EntryNotFound(format.filename().to_string()))?;
        debug!("Reading {} from {:?}", name, self.path());
        self.archiver.read_entry(&name)
    }

    /// Parses `format`'s record.
    ///
    /// Applies the page-list reset and the dimension probe configured in
    /// [`ComicOptions`].
    pub fn read_metadata(&self, format: MetadataFormat) -> Result<Metadata> {
        let bytes = self.read_raw_metadata(format)?;
        let mut metadata = handler_for(format).parse(&bytes)?;

        if self.options.reset_mismatched_pages && !metadata.pages.is_empty() {
            let count = self.page_count()?;
            if metadata.pages.len() != count {
                warn!(
                    "{} in {:?} lists {} pages but the archive has {}; using the default page list",
                    format,
                    self.path(),
                    metadata.pages.len(),
                    count
                );
                metadata.set_default_page_list(count);
            }
        }
        if self.options.probe_page_dimensions {
            self.apply_page_info(&mut metadata)?;
        }
        Ok(metadata)
    }

    /// Checks `format`'s record against its schema without building a record.
    pub fn validate_metadata(&self, format: MetadataFormat) -> Result<SchemaVersion> {
        let bytes = self.read_raw_metadata(format)?;
        handler_for(format).validate(&bytes)
    }

    /// Serializes `metadata` as `format` and stores it, replacing any existing
    /// record of that format (whatever the case of its entry name).
    ///
    /// # Returns
    /// * `Result<()>` - `UnsupportedOperation` on read-only backends, `MetadataValidation`
    ///   if the page list does not match the archive
    pub fn write_metadata(&mut self, format: MetadataFormat, metadata: &Metadata) -> Result<()> {
        if !self.is_writable() {
            return Err(Error::UnsupportedOperation {
                format: self.format(),
                operation: "write",
            });
        }
        let count = self.page_count()?;
        metadata.validate_pages(format, count)?;

        let mut record = metadata.clone();
        if record.page_count.is_none() {
            record.page_count = u32::try_from(count).ok();
        }
        let bytes = handler_for(format).serialize(&record)?;
        let name = self
            .metadata_entry(format)?
            .unwrap_or_else(|| format.filename().to_string());

        self.archiver.write_entry(&name, &bytes)?;
        info!("Wrote {} to {:?} as '{}'", format, self.path(), name);
        Ok(())
    }

    /// Removes every entry holding a `format` record.
    pub fn remove_metadata(&mut self, format: MetadataFormat) -> Result<()> {
        if !self.capabilities().remove {
            return Err(Error::UnsupportedOperation {
                format: self.format(),
                operation: "remove",
            });
        }
        let names: Vec<String> = self
            .archiver
            .list_entries()?
            .into_iter()
            .filter(|e| !e.is_dir && format.matches_entry(&e.name))
            .map(|e| e.name)
            .collect();
        if names.is_empty() {
            return Err(Error::EntryNotFound(format.filename().to_string()));
        }
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        self.archiver.remove_entries(&names)?;
        info!("Removed {} from {:?}", format, self.path());
        Ok(())
    }

    /// Fills `page_count`, per-page byte sizes and, where the probe can decode
    /// the page, pixel dimensions.
    ///
    /// ComicInfo-style records without a page list get the default one first.
    /// Undecodable pages keep unknown dimensions.
    pub fn apply_page_info(&self, metadata: &mut Metadata) -> Result<()> {
        let pages = self.enumerate_pages()?;
        metadata.page_count = u32::try_from(pages.len()).ok();
        if metadata.origin == Some(MetadataFormat::MetronInfo) {
            return Ok(());
        }
        if metadata.pages.is_empty() {
            metadata.set_default_page_list(pages.len());
        }

        let mut data = Vec::with_capacity(pages.len());
        for page in &pages {
            data.push(self.archiver.read_entry(&page.name)?);
        }
        let probe = Arc::clone(&self.probe);
        let dimensions: Vec<Option<(u32, u32)>> =
            data.par_iter().map(|bytes| probe.probe(bytes)).collect();

        for page in metadata.pages.iter_mut() {
            let Some(bytes) = data.get(page.index) else {
                continue;
            };
            page.image_size = Some(bytes.len() as u64);
            if let Some((width, height)) = dimensions[page.index] {
                page.width = Some(width);
                page.height = Some(height);
            }
        }
        debug!("Applied page info for {} pages of {:?}", pages.len(), self.path());
        Ok(())
    }

    // --- Conversion ---

    /// Rebuilds every entry into a new `target` archive of format `kind`.
    ///
    /// Pages are written first in page order, then metadata records with their
    /// bytes unchanged, then any other entries in stored order, all in one
    /// batch write.
    ///
    /// # Returns
    /// * `Result<Comic>` - The new comic, `UnsupportedOperation` for read-only
    ///   kinds, `InvalidPath` if `target` already exists
    pub fn convert_format(&self, target: impl AsRef<Path>, kind: ArchiveFormat) -> Result<Comic> {
        let target = target.as_ref();
        if !kind.is_writable() {
            return Err(Error::UnsupportedOperation {
                format: kind,
                operation: "convert",
            });
        }
        if target.exists() {
            return Err(Error::InvalidPath(
                target.to_path_buf(),
                "Target already exists".to_string(),
            ));
        }
        validate_target_path(target)?;

        let entries: Vec<NewEntry> = self
            .conversion_order()?
            .into_iter()
            .map(|name| {
                let data = self.archiver.read_entry(&name)?;
                Ok((name, data))
            })
            .collect::<Result<_>>()?;

        let mut new_archiver = archiver::create(target, kind);
        new_archiver.write_entries(entries)?;
        info!(
            "Converted {:?} ({}) to {:?} ({})",
            self.path(),
            self.format(),
            target,
            kind
        );

        Ok(Self {
            archiver: new_archiver,
            options: self.options.clone(),
            probe: Arc::clone(&self.probe),
        })
    }

    /// Shorthand for [`Comic::convert_format`] to zip.
    pub fn export_as_zip(&self, target: impl AsRef<Path>) -> Result<Comic> {
        self.convert_format(target, ArchiveFormat::Zip)
    }

    fn conversion_order(&self) -> Result<Vec<String>> {
        let pages: Vec<String> = self.enumerate_pages()?.into_iter().map(|p| p.name).collect();
        let (metadata, other): (Vec<ArchiveEntry>, Vec<ArchiveEntry>) = self
            .archiver
            .list_entries()?
            .into_iter()
            .filter(|e| !e.is_dir && !pages.contains(&e.name))
            .partition(|e| MetadataFormat::ALL.iter().any(|f| f.matches_entry(&e.name)));

        Ok(pages
            .into_iter()
            .chain(metadata.into_iter().map(|e| e.name))
            .chain(other.into_iter().map(|e| e.name))
            .collect())
    }

    /// A free path next to this comic for a conversion to `kind`: the same
    /// stem with `kind`'s comic extension, numbered if taken.
    pub fn converted_path(&self, kind: ArchiveFormat) -> PathBuf {
        unique_path(&self.path().with_extension(kind.comic_extension()))
    }
}
