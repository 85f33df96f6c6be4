//! ComicRack `ComicInfo.xml` handler (schema v1 and v2.0).

use lazy_static::lazy_static;
use regex::Regex;

use super::xml::{self, Checker, Element};
use super::{
    clear_field, log_dropped, Gtin, Manga, Metadata, MetadataHandler, Page, PageType, Role, StoryArc, YesNo,
};
use crate::error::Result;
use crate::types::{MetadataFormat, SchemaVersion};

const FORMAT: MetadataFormat = MetadataFormat::ComicInfo;
const ROOT: &str = "ComicInfo";

/// Root children in schema order.
const ELEMENTS: &[&str] = &[
    "Title",
    "Series",
    "Number",
    "Count",
    "Volume",
    "AlternateSeries",
    "AlternateNumber",
    "AlternateCount",
    "Summary",
    "Notes",
    "Year",
    "Month",
    "Day",
    "Writer",
    "Penciller",
    "Inker",
    "Colorist",
    "Letterer",
    "CoverArtist",
    "Editor",
    "Translator",
    "Publisher",
    "Imprint",
    "Genre",
    "Tags",
    "Web",
    "PageCount",
    "LanguageISO",
    "Format",
    "BlackAndWhite",
    "Manga",
    "Characters",
    "Teams",
    "Locations",
    "ScanInformation",
    "StoryArc",
    "StoryArcNumber",
    "SeriesGroup",
    "AgeRating",
    "Pages",
    "CommunityRating",
    "MainCharacterOrTeam",
    "Review",
    "GTIN",
];

/// Elements absent from the v1 schema.
const V2_ELEMENTS: &[&str] = &[
    "Day",
    "Translator",
    "Tags",
    "Characters",
    "Teams",
    "Locations",
    "ScanInformation",
    "StoryArc",
    "StoryArcNumber",
    "SeriesGroup",
    "AgeRating",
    "CommunityRating",
    "MainCharacterOrTeam",
    "Review",
    "GTIN",
];

pub const AGE_RATINGS: &[&str] = &[
    "Unknown",
    "Adults Only 18+",
    "Early Childhood",
    "Everyone",
    "Everyone 10+",
    "G",
    "Kids to Adults",
    "M",
    "MA15+",
    "Mature 17+",
    "PG",
    "R18+",
    "Rating Pending",
    "Teen",
    "X18+",
];

/// MetronInfo rating → ComicInfo rating.
const FROM_METRON_RATINGS: &[(&str, &str)] = &[
    ("unknown", "Unknown"),
    ("everyone", "Everyone"),
    ("teen", "Teen"),
    ("teen plus", "MA15+"),
    ("mature", "Mature 17+"),
    ("explicit", "X18+"),
    ("adult", "Adults Only 18+"),
];

const YES_NO: &[&str] = &["Unknown", "Yes", "No"];
const MANGA: &[&str] = &["Unknown", "Yes", "No", "YesAndRightToLeft"];

/// Credit elements and the vocabulary roles each one collects.
const CREDIT_ELEMENTS: &[(&str, Role, &[Role])] = &[
    (
        "Writer",
        Role::Writer,
        &[Role::Writer, Role::Script, Role::Story, Role::Plot],
    ),
    (
        "Penciller",
        Role::Penciller,
        &[
            Role::Penciller,
            Role::Artist,
            Role::Breakdowns,
            Role::Illustrator,
            Role::Layouts,
        ],
    ),
    (
        "Inker",
        Role::Inker,
        &[
            Role::Inker,
            Role::Artist,
            Role::Embellisher,
            Role::Finishes,
            Role::Illustrator,
            Role::InkAssists,
        ],
    ),
    (
        "Colorist",
        Role::Colorist,
        &[
            Role::Colorist,
            Role::ColorAssists,
            Role::ColorFlats,
            Role::ColorSeparations,
        ],
    ),
    ("Letterer", Role::Letterer, &[Role::Letterer]),
    ("CoverArtist", Role::Cover, &[Role::Cover]),
    (
        "Editor",
        Role::Editor,
        &[
            Role::Editor,
            Role::AssistantEditor,
            Role::AssociateEditor,
            Role::ConsultingEditor,
            Role::EditorInChief,
            Role::ExecutiveEditor,
            Role::GroupEditor,
            Role::SeniorEditor,
            Role::SupervisingEditor,
            Role::ManagingEditor,
            Role::CollectionEditor,
        ],
    ),
    ("Translator", Role::Translator, &[Role::Translator]),
];

lazy_static! {
    /// A quoted item or a run of non-commas.
    static ref LIST_ITEM: Regex = Regex::new(r#"\s*"([^"]*)"\s*(?:,|$)|([^,]+)"#).unwrap();
    static ref CREDIT_SEPARATOR: Regex = Regex::new(r"[,;]").unwrap();
    static ref LINK_SEPARATOR: Regex = Regex::new(r"[\s,]+").unwrap();
}

/// Splits a comma-separated list, honouring `"quoted, items"`.
pub fn split_list(text: &str) -> Vec<String> {
    LIST_ITEM
        .captures_iter(text)
        .filter_map(|c| c.get(1).or_else(|| c.get(2)))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Joins a list with `", "`, quoting items that contain a comma.
pub fn join_list(items: &[String]) -> Option<String> {
    if items.is_empty() {
        return None;
    }
    Some(
        items
            .iter()
            .map(|item| {
                if item.contains(',') {
                    format!("\"{}\"", item.replace('"', ""))
                } else {
                    item.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(", "),
    )
}

/// Splits a positional list, keeping empty slots so items line up with a sibling list.
pub fn split_positions(text: &str) -> Vec<Option<String>> {
    text.split(',')
        .map(|s| Some(s.trim().to_string()).filter(|s| !s.is_empty()))
        .collect()
}

/// Joins a positional list, leaving missing slots empty and dropping trailing ones.
pub fn join_positions(items: &[Option<&str>]) -> Option<String> {
    let len = items.iter().rposition(Option::is_some)? + 1;
    Some(
        items[..len]
            .iter()
            .map(|item| item.map(|s| s.replace(',', "")).unwrap_or_default())
            .collect::<Vec<_>>()
            .join(", "),
    )
}

/// Maps a rating from either vocabulary onto the ComicInfo one.
pub fn comicinfo_age_rating(value: &str) -> Option<&'static str> {
    let folded = value.trim().to_lowercase();
    AGE_RATINGS
        .iter()
        .find(|r| r.to_lowercase() == folded)
        .copied()
        .or_else(|| {
            FROM_METRON_RATINGS
                .iter()
                .find(|(m, _)| *m == folded)
                .map(|(_, c)| *c)
        })
}

/// The ComicInfo credit roles a vocabulary role is written under.
pub fn comicinfo_roles(role: &Role) -> Vec<Role> {
    CREDIT_ELEMENTS
        .iter()
        .filter(|(_, _, accepts)| accepts.contains(role))
        .map(|(_, target, _)| target.clone())
        .collect()
}

/// `ComicInfo.xml` schema handler.
#[derive(Debug, Default, Clone, Copy)]
pub struct ComicInfoHandler;

impl ComicInfoHandler {
    /// Reads Year, Month or Day. `-1` is the schema default and, like any value
    /// up to `unset`, means the part is not set.
    fn date_part(
        checker: &Checker,
        element: Option<&Element>,
        unset: i64,
        max: i64,
    ) -> Result<Option<i64>> {
        let Some(element) = element else {
            return Ok(None);
        };
        let value = checker.int_in(element, -1, max)?;
        Ok(Some(value).filter(|v| *v > unset))
    }

    fn parse_pages(checker: &Checker, pages: &Element) -> Result<Vec<Page>> {
        checker.children(pages, &["Page"], &["Page"])?;
        let mut parsed = Vec::with_capacity(pages.children.len());
        for element in &pages.children {
            let image = checker.required_attribute(element, "Image")?;
            let index = image.trim().parse::<usize>().map_err(|_| {
                checker.fail(format!("Page attribute 'Image' expects an integer, found '{}'", image))
            })?;
            let mut page = Page::new(index);
            if let Some(kind) = element.attribute("Type") {
                page.page_type = Some(PageType::parse(kind).ok_or_else(|| {
                    checker.fail(format!("'{}' is not a valid value for 'Type'", kind))
                })?);
            }
            if let Some(value) = element.attribute("DoublePage") {
                page.double_page = Some(checker.boolean("DoublePage", value)?);
            }
            page.image_size = Self::numeric_attribute(checker, element, "ImageSize")?;
            page.width = Self::numeric_attribute(checker, element, "ImageWidth")?;
            page.height = Self::numeric_attribute(checker, element, "ImageHeight")?;
            page.key = element.attribute("Key").map(str::to_string);
            page.bookmark = element.attribute("Bookmark").map(str::to_string);
            parsed.push(page);
        }
        Ok(parsed)
    }

    /// Integer page attribute; the schema's `-1` default means unknown.
    fn numeric_attribute<T: TryFrom<i64>>(
        checker: &Checker,
        element: &Element,
        key: &str,
    ) -> Result<Option<T>> {
        let Some(raw) = element.attribute(key) else {
            return Ok(None);
        };
        let value = raw.trim().parse::<i64>().map_err(|_| {
            checker.fail(format!("Page attribute '{}' expects an integer, found '{}'", key, raw))
        })?;
        Ok(T::try_from(value).ok())
    }

    fn page_element(page: &Page) -> Element {
        let mut element = Element::new("Page");
        element.set_attribute("Image", page.index.to_string());
        if let Some(kind) = page.page_type {
            element.set_attribute("Type", kind.as_str());
        }
        if let Some(double) = page.double_page {
            element.set_attribute("DoublePage", double.to_string());
        }
        if let Some(size) = page.image_size {
            element.set_attribute("ImageSize", size.to_string());
        }
        if let Some(key) = &page.key {
            element.set_attribute("Key", key.clone());
        }
        if let Some(bookmark) = &page.bookmark {
            element.set_attribute("Bookmark", bookmark.clone());
        }
        if let Some(width) = page.width {
            element.set_attribute("ImageWidth", width.to_string());
        }
        if let Some(height) = page.height {
            element.set_attribute("ImageHeight", height.to_string());
        }
        element
    }

    fn credit_text(metadata: &Metadata, target: &Role) -> Option<String> {
        let mut names: Vec<String> = Vec::new();
        for credit in &metadata.credits {
            if comicinfo_roles(&credit.role).contains(target) {
                let name = credit.person.replace(',', "").trim().to_string();
                if !name.is_empty() && !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        join_list(&names)
    }
}

fn yes_no(value: &str) -> YesNo {
    match value {
        "Yes" => YesNo::Yes,
        "No" => YesNo::No,
        _ => YesNo::Unknown,
    }
}

fn yes_no_str(value: YesNo) -> &'static str {
    match value {
        YesNo::Unknown => "Unknown",
        YesNo::Yes => "Yes",
        YesNo::No => "No",
    }
}

fn manga(value: &str) -> Manga {
    match value {
        "Yes" => Manga::Yes,
        "No" => Manga::No,
        "YesAndRightToLeft" => Manga::YesAndRightToLeft,
        _ => Manga::Unknown,
    }
}

fn manga_str(value: Manga) -> &'static str {
    match value {
        Manga::Unknown => "Unknown",
        Manga::Yes => "Yes",
        Manga::No => "No",
        Manga::YesAndRightToLeft => "YesAndRightToLeft",
    }
}

impl MetadataHandler for ComicInfoHandler {
    fn format(&self) -> MetadataFormat {
        FORMAT
    }

    fn parse_versioned(&self, bytes: &[u8]) -> Result<(Metadata, SchemaVersion)> {
        let root = xml::parse(FORMAT, bytes)?;
        let checker = Checker::new(FORMAT);
        if root.name != ROOT {
            return Err(checker.fail(format!(
                "root element is '{}', expected '{}'",
                root.name, ROOT
            )));
        }
        checker.children(&root, ELEMENTS, &[])?;

        // empty elements carry no value
        let get = |name: &str| root.child(name).filter(|e| !e.text.is_empty());
        let text = |name: &str| get(name).map(|e| e.text.clone());

        let mut md = Metadata::new();
        md.origin = Some(FORMAT);
        md.title = text("Title");
        md.series = text("Series");
        md.number = text("Number");
        md.issue_count = get("Count").map(|e| checker.int(e)).transpose()?;
        md.volume = get("Volume").map(|e| checker.int(e)).transpose()?;
        md.alternate_series = text("AlternateSeries");
        md.alternate_number = text("AlternateNumber");
        md.alternate_count = get("AlternateCount").map(|e| checker.int(e)).transpose()?;
        md.summary = text("Summary");
        md.notes = text("Notes");
        md.year = Self::date_part(&checker, get("Year"), -1, 9999)?.map(|v| v as i32);
        md.month = Self::date_part(&checker, get("Month"), 0, 12)?.map(|v| v as u32);
        md.day = Self::date_part(&checker, get("Day"), 0, 31)?.map(|v| v as u32);

        for child in &root.children {
            let Some((_, role, _)) = CREDIT_ELEMENTS.iter().find(|(n, _, _)| *n == child.name)
            else {
                continue;
            };
            for name in CREDIT_SEPARATOR.split(&child.text) {
                let name = name.trim();
                if !name.is_empty() {
                    md.add_credit(name, role.clone());
                }
            }
        }

        md.publisher = text("Publisher");
        md.imprint = text("Imprint");
        md.genres = get("Genre").map(|e| split_list(&e.text)).unwrap_or_default();
        md.tags = get("Tags").map(|e| split_list(&e.text)).unwrap_or_default();
        md.web_links = get("Web")
            .map(|e| {
                LINK_SEPARATOR
                    .split(&e.text)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        md.page_count = get("PageCount")
            .map(|e| checker.int_in(e, 0, u32::MAX as i64))
            .transpose()?
            .map(|v| v as u32);
        md.language = text("LanguageISO");
        md.format = text("Format");
        md.black_and_white = get("BlackAndWhite")
            .map(|e| checker.one_of(e, YES_NO).map(yes_no))
            .transpose()?;
        md.manga = get("Manga")
            .map(|e| checker.one_of(e, MANGA).map(manga))
            .transpose()?;
        md.characters = get("Characters").map(|e| split_list(&e.text)).unwrap_or_default();
        md.teams = get("Teams").map(|e| split_list(&e.text)).unwrap_or_default();
        md.locations = get("Locations").map(|e| split_list(&e.text)).unwrap_or_default();
        md.scan_information = text("ScanInformation");

        let arc_numbers: Vec<Option<String>> = get("StoryArcNumber")
            .map(|e| split_positions(&e.text))
            .unwrap_or_default();
        md.story_arcs = get("StoryArc")
            .map(|e| split_list(&e.text))
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(i, name)| StoryArc {
                name,
                number: arc_numbers.get(i).cloned().flatten(),
            })
            .collect();

        md.series_group = text("SeriesGroup");
        md.age_rating = get("AgeRating")
            .map(|e| checker.one_of(e, AGE_RATINGS).map(str::to_string))
            .transpose()?;
        if let Some(pages) = root.child("Pages") {
            md.pages = Self::parse_pages(&checker, pages)?;
        }
        md.community_rating = get("CommunityRating")
            .map(|e| {
                let value = checker.decimal(e)?;
                if (0.0..=5.0).contains(&value) {
                    Ok(value)
                } else {
                    Err(checker.fail(format!(
                        "element 'CommunityRating' must be between 0 and 5, found {}",
                        value
                    )))
                }
            })
            .transpose()?;
        md.main_character_or_team = text("MainCharacterOrTeam");
        md.review = text("Review");
        md.gtin = get("GTIN").map(|e| Gtin::from_code(&e.text));

        let version = if root
            .children
            .iter()
            .any(|c| V2_ELEMENTS.contains(&c.name.as_str()))
            || md.manga == Some(Manga::YesAndRightToLeft)
        {
            SchemaVersion::ComicInfoV2
        } else {
            SchemaVersion::ComicInfoV1
        };
        Ok((md, version))
    }

    fn serialize(&self, md: &Metadata) -> Result<Vec<u8>> {
        let mut root = Element::new(ROOT);
        root.set_attribute("xmlns:xsi", "http://www.w3.org/2001/XMLSchema-instance");
        root.set_attribute("xmlns:xsd", "http://www.w3.org/2001/XMLSchema");

        root.push_text("Title", md.title.as_deref());
        root.push_text("Series", md.series.as_deref());
        root.push_text("Number", md.number.as_deref());
        root.push_text("Count", md.issue_count);
        root.push_text("Volume", md.volume);
        root.push_text("AlternateSeries", md.alternate_series.as_deref());
        root.push_text("AlternateNumber", md.alternate_number.as_deref());
        root.push_text("AlternateCount", md.alternate_count);
        root.push_text("Summary", md.summary.as_deref());
        root.push_text("Notes", md.notes.as_deref());
        root.push_text("Year", md.year);
        root.push_text("Month", md.month);
        root.push_text("Day", md.day);
        for (element, role, _) in CREDIT_ELEMENTS {
            root.push_text(element, Self::credit_text(md, role));
        }
        root.push_text("Publisher", md.publisher.as_deref());
        root.push_text("Imprint", md.imprint.as_deref());
        root.push_text("Genre", join_list(&md.genres));
        root.push_text("Tags", join_list(&md.tags));
        if !md.web_links.is_empty() {
            root.push_text("Web", Some(md.web_links.join(" ")));
        }
        root.push_text("PageCount", md.page_count);
        root.push_text("LanguageISO", md.language.as_deref());
        root.push_text("Format", md.format.as_deref());
        root.push_text("BlackAndWhite", md.black_and_white.map(yes_no_str));
        root.push_text("Manga", md.manga.map(manga_str));
        root.push_text("Characters", join_list(&md.characters));
        root.push_text("Teams", join_list(&md.teams));
        root.push_text("Locations", join_list(&md.locations));
        root.push_text("ScanInformation", md.scan_information.as_deref());
        let arc_names: Vec<String> = md.story_arcs.iter().map(|a| a.name.clone()).collect();
        root.push_text("StoryArc", join_list(&arc_names));
        let arc_numbers: Vec<Option<&str>> =
            md.story_arcs.iter().map(|a| a.number.as_deref()).collect();
        root.push_text("StoryArcNumber", join_positions(&arc_numbers));
        root.push_text("SeriesGroup", md.series_group.as_deref());
        root.push_text(
            "AgeRating",
            md.age_rating.as_deref().and_then(comicinfo_age_rating),
        );
        if !md.pages.is_empty() {
            let mut pages = Element::new("Pages");
            for page in &md.pages {
                pages.push(Self::page_element(page));
            }
            root.push(pages);
        }
        root.push_text(
            "CommunityRating",
            md.community_rating
                .filter(|r| (0.0..=5.0).contains(r))
                .map(xml::format_decimal),
        );
        root.push_text("MainCharacterOrTeam", md.main_character_or_team.as_deref());
        root.push_text("Review", md.review.as_deref());
        root.push_text("GTIN", md.gtin.as_ref().and_then(|g| g.primary_code()));

        xml::write(FORMAT, &root)
    }

    fn convert(&self, md: &Metadata) -> Metadata {
        let mut out = md.clone();
        out.origin = Some(FORMAT);

        let mut dropped = Vec::new();
        if out.title.is_none() && !out.stories.is_empty() {
            out.title = Some(out.stories.join("; "));
        }
        macro_rules! clear {
            ($($field:ident),+) => {
                $(
                    if clear_field(&mut out.$field) {
                        dropped.push(stringify!($field));
                    }
                )+
            };
        }
        clear!(
            publisher_id,
            series_id,
            series_sort_name,
            series_start_year,
            volume_count,
            store_date,
            last_modified,
            ids,
            stories,
            prices,
            universes,
            reprints,
            alternative_names
        );

        out.age_rating = md.age_rating.as_deref().and_then(|rating| {
            let mapped = comicinfo_age_rating(rating);
            if mapped.is_none() {
                dropped.push("age_rating");
            }
            mapped.map(str::to_string)
        });
        out.gtin = md
            .gtin
            .as_ref()
            .and_then(|g| g.primary_code())
            .map(Gtin::from_code);

        out.credits.clear();
        for credit in &md.credits {
            let targets = comicinfo_roles(&credit.role);
            if targets.is_empty() {
                dropped.push("credits");
            }
            for role in targets {
                out.add_credit(credit.person.clone(), role);
            }
        }

        dropped.dedup();
        log_dropped(FORMAT, &dropped);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<ComicInfo xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xmlns:xsd="http://www.w3.org/2001/XMLSchema">
  <Title>The Big Day</Title>
  <Series>Aquaman</Series>
  <Number>1</Number>
  <Count>12</Count>
  <Volume>2016</Volume>
  <Summary>Arthur returns.</Summary>
  <Year>2016</Year>
  <Month>8</Month>
  <Day>3</Day>
  <Writer>Dan Abnett</Writer>
  <Penciller>Brad Walker, Scot Eaton</Penciller>
  <Inker>Andrew Hennessy</Inker>
  <CoverArtist>Brad Walker</CoverArtist>
  <Publisher>DC Comics</Publisher>
  <Genre>Super-Hero, Action</Genre>
  <Web>https://metron.cloud/issue/1 https://comicvine.gamespot.com/issue/2</Web>
  <PageCount>3</PageCount>
  <LanguageISO>en</LanguageISO>
  <Format>Series</Format>
  <BlackAndWhite>No</BlackAndWhite>
  <Manga>No</Manga>
  <Characters>Aquaman, Mera</Characters>
  <StoryArc>Rebirth</StoryArc>
  <StoryArcNumber>1</StoryArcNumber>
  <AgeRating>Teen</AgeRating>
  <Pages>
    <Page Image="0" Type="FrontCover" ImageSize="1024" ImageWidth="1988" ImageHeight="3056"/>
    <Page Image="1" DoublePage="true"/>
    <Page Image="2" Type="BackCover"/>
  </Pages>
  <CommunityRating>4.5</CommunityRating>
</ComicInfo>
"#;

    #[test]
    fn parses_sample_document() {
        let (md, version) = ComicInfoHandler.parse_versioned(SAMPLE.as_bytes()).unwrap();
        assert_eq!(version, SchemaVersion::ComicInfoV2);
        assert_eq!(md.origin, Some(MetadataFormat::ComicInfo));
        assert_eq!(md.series.as_deref(), Some("Aquaman"));
        assert_eq!(md.number.as_deref(), Some("1"));
        assert_eq!(md.volume, Some(2016));
        assert_eq!((md.year, md.month, md.day), (Some(2016), Some(8), Some(3)));
        assert_eq!(md.credited(&Role::Penciller), vec!["Brad Walker", "Scot Eaton"]);
        assert_eq!(md.credited(&Role::Cover), vec!["Brad Walker"]);
        assert_eq!(md.genres, vec!["Super-Hero", "Action"]);
        assert_eq!(md.web_links.len(), 2);
        assert_eq!(md.story_arcs[0].number.as_deref(), Some("1"));
        assert_eq!(md.pages.len(), 3);
        assert!(md.pages[0].is_cover());
        assert_eq!(md.pages[0].width, Some(1988));
        assert!(md.pages[1].is_double_page());
        assert_eq!(md.community_rating, Some(4.5));
    }

    #[test]
    fn serialize_round_trips_canonical_document() {
        let md = ComicInfoHandler.parse(SAMPLE.as_bytes()).unwrap();
        let bytes = ComicInfoHandler.serialize(&md).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), SAMPLE);
    }

    #[test]
    fn serialize_normalizes_list_spacing() {
        let doc = br#"<ComicInfo><Series>X</Series><Genre>A,B ,  C</Genre><Web>a,b</Web></ComicInfo>"#;
        let md = ComicInfoHandler.parse(doc).unwrap();
        let text = String::from_utf8(ComicInfoHandler.serialize(&md).unwrap()).unwrap();
        assert!(text.contains("<Genre>A, B, C</Genre>"));
        assert!(text.contains("<Web>a b</Web>"));
    }

    #[test]
    fn quoted_list_items_survive_a_round_trip() {
        let mut md = Metadata::new();
        md.characters = vec!["Robin".to_string(), "Dick Grayson, Jr.".to_string()];
        md.teams = vec!["Teen Titans, West".to_string(), "JLA".to_string()];
        let text = String::from_utf8(ComicInfoHandler.serialize(&md).unwrap()).unwrap();
        assert_eq!(
            join_list(&md.characters).as_deref(),
            Some(r#"Robin, "Dick Grayson, Jr.""#)
        );

        let reread = ComicInfoHandler.parse(text.as_bytes()).unwrap();
        assert_eq!(reread.characters, md.characters);
        assert_eq!(reread.teams, md.teams);
    }

    #[test]
    fn story_arc_numbers_keep_their_positions() {
        let doc = br#"<ComicInfo><StoryArc>A, B, C</StoryArc><StoryArcNumber>Part 2, , 3</StoryArcNumber></ComicInfo>"#;
        let md = ComicInfoHandler.parse(doc).unwrap();
        let numbers: Vec<Option<&str>> = md.story_arcs.iter().map(|a| a.number.as_deref()).collect();
        assert_eq!(numbers, vec![Some("Part 2"), None, Some("3")]);

        let text = String::from_utf8(ComicInfoHandler.serialize(&md).unwrap()).unwrap();
        assert!(text.contains("<StoryArcNumber>Part 2, , 3</StoryArcNumber>"));

        let doc = br#"<ComicInfo><StoryArc>A, B</StoryArc><StoryArcNumber>1</StoryArcNumber></ComicInfo>"#;
        let md = ComicInfoHandler.parse(doc).unwrap();
        let text = String::from_utf8(ComicInfoHandler.serialize(&md).unwrap()).unwrap();
        assert!(text.contains("<StoryArcNumber>1</StoryArcNumber>"));
        assert_eq!(ComicInfoHandler.parse(text.as_bytes()).unwrap(), md);
    }

    #[test]
    fn date_defaults_of_minus_one_mean_unset() {
        let doc = br#"<ComicInfo><Series>X</Series><Year>-1</Year><Month>-1</Month><Day>0</Day></ComicInfo>"#;
        let md = ComicInfoHandler.parse(doc).unwrap();
        assert_eq!((md.year, md.month, md.day), (None, None, None));

        let doc = br#"<ComicInfo><Year>1994</Year><Month>0</Month></ComicInfo>"#;
        let md = ComicInfoHandler.parse(doc).unwrap();
        assert_eq!((md.year, md.month), (Some(1994), None));
    }

    #[test]
    fn v1_documents_are_reported_as_v1() {
        let doc = br#"<ComicInfo><Series>X</Series><Year>1990</Year><Manga>No</Manga></ComicInfo>"#;
        assert_eq!(
            ComicInfoHandler.validate(doc).unwrap(),
            SchemaVersion::ComicInfoV1
        );
    }

    #[test]
    fn schema_violations_are_validation_errors() {
        for doc in [
            &b"<ComicInfo><Month>13</Month></ComicInfo>"[..],
            b"<ComicInfo><Year>-2</Year></ComicInfo>",
            b"<ComicInfo><Day>-5</Day></ComicInfo>",
            b"<ComicInfo><Count>twelve</Count></ComicInfo>",
            b"<ComicInfo><Unknown>x</Unknown></ComicInfo>",
            b"<ComicInfo><Manga>Maybe</Manga></ComicInfo>",
            b"<ComicInfo><AgeRating>PG-13</AgeRating></ComicInfo>",
            b"<ComicInfo><CommunityRating>7</CommunityRating></ComicInfo>",
            b"<ComicInfo><Pages><Page Type=\"Story\"/></Pages></ComicInfo>",
            b"<ComicInfo><Pages><Page Image=\"0\" Type=\"Splash\"/></Pages></ComicInfo>",
            b"<ComicInfo><Series>A</Series><Series>B</Series></ComicInfo>",
            b"<MetronInfo/>",
        ] {
            assert!(
                matches!(
                    ComicInfoHandler.parse(doc),
                    Err(Error::MetadataValidation { .. })
                ),
                "accepted {}",
                String::from_utf8_lossy(doc)
            );
        }
        assert!(matches!(
            ComicInfoHandler.parse(b"<ComicInfo><Series>"),
            Err(Error::MetadataParse { .. })
        ));
    }

    #[test]
    fn convert_maps_roles_and_ratings() {
        let mut md = Metadata::new();
        md.origin = Some(MetadataFormat::MetronInfo);
        md.age_rating = Some("Teen Plus".to_string());
        md.add_credit("Jane", Role::Script);
        md.add_credit("Joe", Role::Artist);
        md.add_credit("Max", Role::Designer);
        md.stories = vec!["Part One".to_string(), "Part Two".to_string()];
        md.ids.push(super::super::SourceId {
            source: "Metron".to_string(),
            id: "1".to_string(),
            primary: true,
        });

        let out = ComicInfoHandler.convert(&md);
        assert_eq!(out.origin, Some(MetadataFormat::ComicInfo));
        assert_eq!(out.age_rating.as_deref(), Some("MA15+"));
        assert_eq!(out.credited(&Role::Writer), vec!["Jane"]);
        assert_eq!(out.credited(&Role::Penciller), vec!["Joe"]);
        assert_eq!(out.credited(&Role::Inker), vec!["Joe"]);
        assert!(out.credits.iter().all(|c| c.person != "Max"));
        assert_eq!(out.title.as_deref(), Some("Part One; Part Two"));
        assert!(out.stories.is_empty());
        assert!(out.ids.is_empty());
    }

    #[test]
    fn list_helpers_handle_quotes() {
        assert_eq!(
            split_list(r#"Batman, "Dick Grayson, Jr.", Robin"#),
            vec!["Batman", "Dick Grayson, Jr.", "Robin"]
        );
        assert_eq!(
            join_list(&["A, B".to_string(), "C".to_string()]).as_deref(),
            Some(r#""A, B", C"#)
        );
        assert_eq!(join_list(&[]), None);
    }
}
