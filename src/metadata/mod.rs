//! Schema-independent comic metadata and the handlers that map it to XML.
//!
//! A [`Metadata`] record is the single in-memory representation shared by the
//! ComicInfo and MetronInfo handlers. Each handler knows how to parse,
//! validate and serialize its own schema, and how to *convert* a record that
//! came from the other schema: vocabularies (roles, age ratings, series
//! formats) are mapped through fixed tables and fields the target schema does
//! not model are cleared.

use std::fmt;

use log::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{MetadataFormat, SchemaVersion};

pub mod comicinfo;
pub mod metroninfo;
pub(crate) mod xml;

pub use comicinfo::ComicInfoHandler;
pub use metroninfo::MetronInfoHandler;

/// Contributor role, covering the union of both schemas' vocabularies.
///
/// Names outside the vocabulary are kept as [`Role::Unknown`] so nothing read
/// from a file is silently lost; they are written as `Other` to MetronInfo and
/// dropped from ComicInfo.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Role {
    Writer,
    Script,
    Story,
    Plot,
    Interviewer,
    Artist,
    Penciller,
    Layouts,
    Breakdowns,
    Illustrator,
    Inker,
    Embellisher,
    Finishes,
    InkAssists,
    Colorist,
    ColorSeparations,
    ColorAssists,
    ColorFlats,
    DigitalArtTechnician,
    GrayTone,
    Letterer,
    Cover,
    Editor,
    ConsultingEditor,
    AssistantEditor,
    AssociateEditor,
    GroupEditor,
    SeniorEditor,
    ManagingEditor,
    CollectionEditor,
    Production,
    Designer,
    LogoDesign,
    Translator,
    SupervisingEditor,
    ExecutiveEditor,
    EditorInChief,
    President,
    Publisher,
    ChiefCreativeOfficer,
    ExecutiveProducer,
    Other,
    Unknown(String),
}

/// (role, canonical name) pairs in MetronInfo vocabulary order.
const ROLE_NAMES: &[(Role, &str)] = &[
    (Role::Writer, "Writer"),
    (Role::Script, "Script"),
    (Role::Story, "Story"),
    (Role::Plot, "Plot"),
    (Role::Interviewer, "Interviewer"),
    (Role::Artist, "Artist"),
    (Role::Penciller, "Penciller"),
    (Role::Layouts, "Layouts"),
    (Role::Breakdowns, "Breakdowns"),
    (Role::Illustrator, "Illustrator"),
    (Role::Inker, "Inker"),
    (Role::Embellisher, "Embellisher"),
    (Role::Finishes, "Finishes"),
    (Role::InkAssists, "Ink Assists"),
    (Role::Colorist, "Colorist"),
    (Role::ColorSeparations, "Color Separations"),
    (Role::ColorAssists, "Color Assists"),
    (Role::ColorFlats, "Color Flats"),
    (Role::DigitalArtTechnician, "Digital Art Technician"),
    (Role::GrayTone, "Gray Tone"),
    (Role::Letterer, "Letterer"),
    (Role::Cover, "Cover"),
    (Role::Editor, "Editor"),
    (Role::ConsultingEditor, "Consulting Editor"),
    (Role::AssistantEditor, "Assistant Editor"),
    (Role::AssociateEditor, "Associate Editor"),
    (Role::GroupEditor, "Group Editor"),
    (Role::SeniorEditor, "Senior Editor"),
    (Role::ManagingEditor, "Managing Editor"),
    (Role::CollectionEditor, "Collection Editor"),
    (Role::Production, "Production"),
    (Role::Designer, "Designer"),
    (Role::LogoDesign, "Logo Design"),
    (Role::Translator, "Translator"),
    (Role::SupervisingEditor, "Supervising Editor"),
    (Role::ExecutiveEditor, "Executive Editor"),
    (Role::EditorInChief, "Editor In Chief"),
    (Role::President, "President"),
    (Role::Publisher, "Publisher"),
    (Role::ChiefCreativeOfficer, "Chief Creative Officer"),
    (Role::ExecutiveProducer, "Executive Producer"),
    (Role::Other, "Other"),
];

/// Spellings seen in the wild that mean a vocabulary role.
const ROLE_SYNONYMS: &[(&str, Role)] = &[
    ("penciler", Role::Penciller),
    ("pencils", Role::Penciller),
    ("inks", Role::Inker),
    ("colourist", Role::Colorist),
    ("colorer", Role::Colorist),
    ("colourer", Role::Colorist),
    ("colors", Role::Colorist),
    ("letters", Role::Letterer),
    ("plotter", Role::Plot),
    ("scripter", Role::Script),
    ("covers", Role::Cover),
    ("cover artist", Role::Cover),
    ("coverartist", Role::Cover),
    ("editor-in-chief", Role::EditorInChief),
];

impl Role {
    /// Looks a role up by name, case-insensitively, accepting common synonyms.
    pub fn from_name(name: &str) -> Role {
        let trimmed = name.trim();
        let folded = trimmed.to_lowercase();
        ROLE_NAMES
            .iter()
            .find(|(_, n)| n.to_lowercase() == folded)
            .map(|(role, _)| role.clone())
            .or_else(|| {
                ROLE_SYNONYMS
                    .iter()
                    .find(|(s, _)| *s == folded)
                    .map(|(_, role)| role.clone())
            })
            .unwrap_or_else(|| Role::Unknown(trimmed.to_string()))
    }

    /// Canonical display name; unknown roles keep their original text.
    pub fn name(&self) -> &str {
        match self {
            Role::Unknown(name) => name,
            role => ROLE_NAMES
                .iter()
                .find(|(r, _)| r == role)
                .map(|(_, n)| *n)
                .unwrap_or("Other"),
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Role::Unknown(_))
    }

    /// A credit that names no role at all, as MetronInfo allows.
    pub fn unspecified() -> Role {
        Role::Unknown(String::new())
    }

    pub fn is_unspecified(&self) -> bool {
        matches!(self, Role::Unknown(name) if name.is_empty())
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One contributor credit. A person with several roles has several credits.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Credit {
    pub person: String,
    pub role: Role,
}

impl Credit {
    pub fn new(person: impl Into<String>, role: Role) -> Self {
        Self {
            person: person.into(),
            role,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PageType {
    FrontCover,
    InnerCover,
    Roundup,
    Story,
    Advertisement,
    Editorial,
    Letters,
    Preview,
    BackCover,
    Other,
    Deleted,
}

impl PageType {
    pub const ALL: [PageType; 11] = [
        PageType::FrontCover,
        PageType::InnerCover,
        PageType::Roundup,
        PageType::Story,
        PageType::Advertisement,
        PageType::Editorial,
        PageType::Letters,
        PageType::Preview,
        PageType::BackCover,
        PageType::Other,
        PageType::Deleted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PageType::FrontCover => "FrontCover",
            PageType::InnerCover => "InnerCover",
            PageType::Roundup => "Roundup",
            PageType::Story => "Story",
            PageType::Advertisement => "Advertisement",
            PageType::Editorial => "Editorial",
            PageType::Letters => "Letters",
            PageType::Preview => "Preview",
            PageType::BackCover => "BackCover",
            PageType::Other => "Other",
            PageType::Deleted => "Deleted",
        }
    }

    pub fn parse(value: &str) -> Option<PageType> {
        PageType::ALL.into_iter().find(|t| t.as_str() == value)
    }
}

/// Per-page information. `index` is the 0-based position in the archive's
/// natural page order.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Page {
    pub index: usize,
    pub page_type: Option<PageType>,
    pub image_size: Option<u64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub double_page: Option<bool>,
    pub key: Option<String>,
    pub bookmark: Option<String>,
}

impl Page {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            ..Default::default()
        }
    }

    pub fn is_cover(&self) -> bool {
        self.page_type == Some(PageType::FrontCover)
    }

    pub fn is_double_page(&self) -> bool {
        self.double_page.unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StoryArc {
    pub name: String,
    /// Position within the arc as stored; ComicInfo allows free text, MetronInfo an integer.
    pub number: Option<String>,
}

/// An identifier of this issue in an external database (MetronInfo `IDS/ID`).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SourceId {
    pub source: String,
    pub id: String,
    pub primary: bool,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Price {
    /// ISO 3166-1 alpha-2 country code.
    pub country: String,
    pub amount: f64,
}

/// Barcode identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Gtin {
    pub isbn: Option<String>,
    pub upc: Option<String>,
}

impl Gtin {
    /// Classifies a single barcode: 10 digits, or 13 digits with a
    /// 978/979 prefix, is an ISBN; anything else is a UPC.
    pub fn from_code(code: &str) -> Gtin {
        let digits: String = code.chars().filter(|c| !matches!(c, '-' | ' ')).collect();
        let is_isbn = digits.len() == 10
            || (digits.len() == 13 && (digits.starts_with("978") || digits.starts_with("979")));
        if is_isbn {
            Gtin {
                isbn: Some(code.trim().to_string()),
                upc: None,
            }
        } else {
            Gtin {
                isbn: None,
                upc: Some(code.trim().to_string()),
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.isbn.is_none() && self.upc.is_none()
    }

    /// The single code written where only one barcode fits.
    pub fn primary_code(&self) -> Option<&str> {
        self.isbn.as_deref().or(self.upc.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Universe {
    pub name: String,
    pub designation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AlternativeName {
    pub name: String,
    pub language: Option<String>,
}

/// ComicInfo tri-state flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum YesNo {
    Unknown,
    Yes,
    No,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Manga {
    Unknown,
    Yes,
    No,
    YesAndRightToLeft,
}

/// Schema-independent metadata record.
///
/// Scalars absent from the source document are `None`; repeated fields are
/// empty. Which schema a field belongs to is noted on the groups below: fields
/// a schema does not model are dropped when serializing to it.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Metadata {
    /// Schema the record was parsed from or last converted for.
    pub origin: Option<MetadataFormat>,

    pub title: Option<String>,
    pub series: Option<String>,
    pub volume: Option<i64>,
    /// Issue number exactly as stored; see [`crate::issue_string::IssueString`] for ordering.
    pub number: Option<String>,
    pub issue_count: Option<i64>,
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub day: Option<u32>,
    pub summary: Option<String>,
    pub notes: Option<String>,
    pub publisher: Option<String>,
    pub imprint: Option<String>,
    pub language: Option<String>,
    pub format: Option<String>,
    pub age_rating: Option<String>,
    pub page_count: Option<u32>,
    pub gtin: Option<Gtin>,

    // ComicInfo only
    pub alternate_series: Option<String>,
    pub alternate_number: Option<String>,
    pub alternate_count: Option<i64>,
    pub series_group: Option<String>,
    pub scan_information: Option<String>,
    pub black_and_white: Option<YesNo>,
    pub manga: Option<Manga>,
    pub community_rating: Option<f64>,
    pub main_character_or_team: Option<String>,
    pub review: Option<String>,

    // MetronInfo only
    pub publisher_id: Option<String>,
    pub series_id: Option<String>,
    pub series_sort_name: Option<String>,
    pub series_start_year: Option<i32>,
    pub volume_count: Option<i64>,
    pub store_date: Option<chrono::NaiveDate>,
    pub last_modified: Option<String>,
    pub ids: Vec<SourceId>,
    pub stories: Vec<String>,
    pub prices: Vec<Price>,
    pub universes: Vec<Universe>,
    pub reprints: Vec<String>,
    pub alternative_names: Vec<AlternativeName>,

    pub credits: Vec<Credit>,
    pub genres: Vec<String>,
    pub tags: Vec<String>,
    pub characters: Vec<String>,
    pub teams: Vec<String>,
    pub locations: Vec<String>,
    pub story_arcs: Vec<StoryArc>,
    /// The first link is the primary one.
    pub web_links: Vec<String>,
    pub pages: Vec<Page>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_credit(&mut self, person: impl Into<String>, role: Role) {
        let credit = Credit::new(person, role);
        if !self.credits.contains(&credit) {
            self.credits.push(credit);
        }
    }

    /// People credited with `role`, in credit order.
    pub fn credited(&self, role: &Role) -> Vec<&str> {
        self.credits
            .iter()
            .filter(|c| &c.role == role)
            .map(|c| c.person.as_str())
            .collect()
    }

    /// The cover date when at least year and month are known; a missing day is the 1st.
    pub fn cover_date(&self) -> Option<chrono::NaiveDate> {
        let (year, month) = (self.year?, self.month?);
        chrono::NaiveDate::from_ymd_opt(year, month, self.day.unwrap_or(1))
            .or_else(|| chrono::NaiveDate::from_ymd_opt(year, month, 1))
    }

    pub fn set_cover_date(&mut self, date: chrono::NaiveDate) {
        use chrono::Datelike;
        self.year = Some(date.year());
        self.month = Some(date.month());
        self.day = Some(date.day());
    }

    /// Index of the first `FrontCover` page, defaulting to the first page.
    pub fn cover_index(&self) -> usize {
        self.pages
            .iter()
            .find(|p| p.is_cover())
            .map(|p| p.index)
            .unwrap_or(0)
    }

    /// Replaces the page list with one entry per archive page, the first
    /// marked as the front cover.
    pub fn set_default_page_list(&mut self, page_count: usize) {
        self.pages = (0..page_count)
            .map(|index| {
                let mut page = Page::new(index);
                if index == 0 {
                    page.page_type = Some(PageType::FrontCover);
                }
                page
            })
            .collect();
    }

    /// Checks the page list against an archive with `page_count` pages.
    ///
    /// An empty list is always valid. Otherwise the indices must be exactly
    /// `0..page_count`, each appearing once.
    pub fn validate_pages(&self, format: MetadataFormat, page_count: usize) -> Result<()> {
        if self.pages.is_empty() {
            return Ok(());
        }
        if self.pages.len() != page_count {
            return Err(Error::validation(
                format,
                format!(
                    "page list has {} entries but the archive has {} pages",
                    self.pages.len(),
                    page_count
                ),
            ));
        }
        let mut seen = vec![false; page_count];
        for page in &self.pages {
            match seen.get_mut(page.index) {
                Some(slot) if !*slot => *slot = true,
                Some(_) => {
                    return Err(Error::validation(
                        format,
                        format!("page index {} appears more than once", page.index),
                    ))
                }
                None => {
                    return Err(Error::validation(
                        format,
                        format!("page index {} is outside 0..{}", page.index, page_count),
                    ))
                }
            }
        }
        Ok(())
    }

    /// Human-readable language name of `language`, for display only.
    pub fn language_name(&self, names: &dyn LanguageNames) -> Option<String> {
        self.language
            .as_deref()
            .and_then(|code| names.display_name(code))
    }

    /// Whether no field carries a value.
    pub fn is_empty(&self) -> bool {
        let blank = Metadata {
            origin: self.origin,
            ..Default::default()
        };
        *self == blank
    }
}

/// Lookup for human-facing language names (e.g. `"en"` → `"English"`).
pub trait LanguageNames {
    fn display_name(&self, code: &str) -> Option<String>;
}

/// Parses, validates, serializes and converts one metadata schema.
pub trait MetadataHandler: Send + Sync {
    fn format(&self) -> MetadataFormat;

    /// Parses and validates `bytes`, reporting which schema version matched.
    ///
    /// Malformed XML fails with `MetadataParse`; well-formed documents that
    /// break the schema fail with `MetadataValidation`.
    fn parse_versioned(&self, bytes: &[u8]) -> Result<(Metadata, SchemaVersion)>;

    /// Serializes `metadata` as a schema-valid UTF-8 document.
    fn serialize(&self, metadata: &Metadata) -> Result<Vec<u8>>;

    /// Maps a record from any schema onto the fields and vocabularies of this one.
    fn convert(&self, metadata: &Metadata) -> Metadata;

    fn parse(&self, bytes: &[u8]) -> Result<Metadata> {
        self.parse_versioned(bytes).map(|(metadata, _)| metadata)
    }

    fn validate(&self, bytes: &[u8]) -> Result<SchemaVersion> {
        self.parse_versioned(bytes).map(|(_, version)| version)
    }
}

static COMIC_INFO: ComicInfoHandler = ComicInfoHandler;
static METRON_INFO: MetronInfoHandler = MetronInfoHandler;

/// Returns the handler for `format`.
pub fn handler_for(format: MetadataFormat) -> &'static dyn MetadataHandler {
    match format {
        MetadataFormat::ComicInfo => &COMIC_INFO,
        MetadataFormat::MetronInfo => &METRON_INFO,
    }
}

/// Resets a field to its default, reporting whether it held a value.
pub(crate) fn clear_field<T: Default + PartialEq>(field: &mut T) -> bool {
    std::mem::take(field) != T::default()
}

/// Logs fields dropped by a conversion.
pub(crate) fn log_dropped(target: MetadataFormat, dropped: &[&str]) {
    if !dropped.is_empty() {
        debug!(
            "Converting to {} drops fields it does not model: {}",
            target,
            dropped.join(", ")
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_lookup_accepts_synonyms_and_keeps_unknowns() {
        assert_eq!(Role::from_name("writer"), Role::Writer);
        assert_eq!(Role::from_name("Editor In Chief"), Role::EditorInChief);
        assert_eq!(Role::from_name("CoverArtist"), Role::Cover);
        assert_eq!(Role::from_name("Colourist"), Role::Colorist);
        assert_eq!(
            Role::from_name("Flatter"),
            Role::Unknown("Flatter".to_string())
        );
        assert_eq!(Role::InkAssists.name(), "Ink Assists");
        assert_eq!(ROLE_NAMES.len(), 42);
    }

    #[test]
    fn default_page_list_marks_cover() {
        let mut md = Metadata::new();
        md.set_default_page_list(3);
        assert_eq!(md.pages.len(), 3);
        assert!(md.pages[0].is_cover());
        assert!(!md.pages[1].is_cover());
        assert_eq!(md.cover_index(), 0);
        assert!(md.validate_pages(MetadataFormat::ComicInfo, 3).is_ok());
    }

    #[test]
    fn page_invariant_violations() {
        let mut md = Metadata::new();
        assert!(md.validate_pages(MetadataFormat::ComicInfo, 5).is_ok());

        md.pages = vec![Page::new(0), Page::new(0)];
        assert!(md.validate_pages(MetadataFormat::ComicInfo, 2).is_err());

        md.pages = vec![Page::new(0), Page::new(2)];
        assert!(md.validate_pages(MetadataFormat::ComicInfo, 2).is_err());

        md.pages = vec![Page::new(1), Page::new(0)];
        assert!(md.validate_pages(MetadataFormat::ComicInfo, 2).is_ok());
        assert!(md.validate_pages(MetadataFormat::ComicInfo, 3).is_err());
    }

    #[test]
    fn cover_date_defaults_day() {
        let mut md = Metadata::new();
        assert_eq!(md.cover_date(), None);
        md.year = Some(2021);
        md.month = Some(2);
        assert_eq!(md.cover_date(), chrono::NaiveDate::from_ymd_opt(2021, 2, 1));
        md.day = Some(30);
        assert_eq!(md.cover_date(), chrono::NaiveDate::from_ymd_opt(2021, 2, 1));
    }

    #[test]
    fn gtin_classification() {
        assert_eq!(
            Gtin::from_code("9781302914622").isbn.as_deref(),
            Some("9781302914622")
        );
        assert_eq!(
            Gtin::from_code("75960620237900511").upc.as_deref(),
            Some("75960620237900511")
        );
    }

    struct English;

    impl LanguageNames for English {
        fn display_name(&self, code: &str) -> Option<String> {
            (code == "en").then(|| "English".to_string())
        }
    }

    #[test]
    fn language_name_uses_collaborator() {
        let mut md = Metadata::new();
        assert_eq!(md.language_name(&English), None);
        md.language = Some("en".to_string());
        assert_eq!(md.language_name(&English).as_deref(), Some("English"));
        assert!(!md.is_empty());
        assert!(Metadata::new().is_empty());
    }
}
