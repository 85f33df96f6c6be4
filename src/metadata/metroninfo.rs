//! Metron `MetronInfo.xml` handler (schema v1).

use super::xml::{self, Checker, Element};
use super::{
    clear_field, log_dropped, AlternativeName, Credit, Gtin, Metadata, MetadataHandler, Price,
    Role, SourceId, StoryArc, Universe,
};
use crate::error::Result;
use crate::types::{MetadataFormat, SchemaVersion};

const FORMAT: MetadataFormat = MetadataFormat::MetronInfo;
const ROOT: &str = "MetronInfo";
const DEFAULT_NAME: &str = "Unknown";

/// Root children in schema order.
const ELEMENTS: &[&str] = &[
    "IDS",
    "Publisher",
    "Series",
    "CollectionTitle",
    "Number",
    "Stories",
    "Summary",
    "Prices",
    "CoverDate",
    "StoreDate",
    "PageCount",
    "Notes",
    "Genres",
    "Tags",
    "Arcs",
    "Characters",
    "Teams",
    "Universes",
    "Locations",
    "Reprints",
    "GTIN",
    "AgeRating",
    "URLs",
    "LastModified",
    "Credits",
];

pub const INFO_SOURCES: &[&str] = &[
    "Anilist",
    "Comic Vine",
    "Grand Comics Database",
    "Kitsu",
    "MangaDex",
    "MangaUpdates",
    "Marvel",
    "Metron",
    "MyAnimeList",
    "League of Comic Geeks",
];

pub const AGE_RATINGS: &[&str] = &[
    "Unknown",
    "Everyone",
    "Teen",
    "Teen Plus",
    "Mature",
    "Explicit",
    "Adult",
];

pub const SERIES_FORMATS: &[&str] = &[
    "Annual",
    "Digital Chapter",
    "Graphic Novel",
    "Hardcover",
    "Limited Series",
    "Omnibus",
    "One-Shot",
    "Single Issue",
    "Trade Paperback",
];

/// ComicInfo rating (lowercased) → MetronInfo rating.
const FROM_COMICINFO_RATINGS: &[(&str, &str)] = &[
    ("rating pending", "Unknown"),
    ("unknown", "Unknown"),
    ("everyone", "Everyone"),
    ("everyone 10+", "Everyone"),
    ("g", "Everyone"),
    ("kids to adults", "Everyone"),
    ("early childhood", "Everyone"),
    ("pg", "Teen"),
    ("teen", "Teen"),
    ("ma15+", "Teen Plus"),
    ("mature 17+", "Mature"),
    ("r18+", "Mature"),
    ("m", "Mature"),
    ("adults only 18+", "Adult"),
    ("x18+", "Explicit"),
];

/// Free-text format tags (lowercased) → MetronInfo series format.
const FORMAT_SYNONYMS: &[(&str, &str)] = &[
    ("annual", "Annual"),
    ("digital chapter", "Digital Chapter"),
    ("digital", "Digital Chapter"),
    ("graphic novel", "Graphic Novel"),
    ("hardcover", "Hardcover"),
    ("hard-cover", "Hardcover"),
    ("limited series", "Limited Series"),
    ("omnibus", "Omnibus"),
    ("1 shot", "One-Shot"),
    ("1-shot", "One-Shot"),
    ("fcbd", "One-Shot"),
    ("one shot", "One-Shot"),
    ("one-shot", "One-Shot"),
    ("preview", "One-Shot"),
    ("single issue", "Single Issue"),
    ("magazine", "Single Issue"),
    ("series", "Single Issue"),
    ("giant", "Single Issue"),
    ("giant size", "Single Issue"),
    ("giant-size", "Single Issue"),
    ("trade paperback", "Trade Paperback"),
    ("tpb", "Trade Paperback"),
    ("trade paper back", "Trade Paperback"),
];

/// Volumes this large are really the series start year.
const VOLUME_YEAR_THRESHOLD: i64 = 1000;

/// A story-arc position as MetronInfo stores it: a positive integer.
fn arc_number(text: &str) -> Option<i64> {
    text.trim().parse::<i64>().ok().filter(|n| *n >= 1)
}

/// Maps a rating from either vocabulary onto the MetronInfo one.
pub fn metron_age_rating(value: &str) -> Option<&'static str> {
    let folded = value.trim().to_lowercase();
    AGE_RATINGS
        .iter()
        .find(|r| r.to_lowercase() == folded)
        .copied()
        .or_else(|| {
            FROM_COMICINFO_RATINGS
                .iter()
                .find(|(c, _)| *c == folded)
                .map(|(_, m)| *m)
        })
}

/// Maps a free-text format tag onto the MetronInfo series format vocabulary.
pub fn metron_series_format(value: &str) -> Option<&'static str> {
    let folded = value.trim().to_lowercase();
    FORMAT_SYNONYMS
        .iter()
        .find(|(s, _)| *s == folded)
        .map(|(_, f)| *f)
}

/// `MetronInfo.xml` schema handler.
#[derive(Debug, Default, Clone, Copy)]
pub struct MetronInfoHandler;

fn texts(checker: &Checker, container: &Element, item: &str) -> Result<Vec<String>> {
    checker.children(container, &[item], &[item])?;
    Ok(container
        .children
        .iter()
        .map(|c| c.text.clone())
        .filter(|t| !t.is_empty())
        .collect())
}

fn non_negative(checker: &Checker, element: &Element) -> Result<i64> {
    checker.int_in(element, 0, i64::MAX)
}

fn is_datetime(value: &str) -> bool {
    chrono::DateTime::parse_from_rfc3339(value).is_ok()
        || chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
}

impl MetronInfoHandler {
    fn parse_ids(checker: &Checker, ids: &Element) -> Result<Vec<SourceId>> {
        checker.children(ids, &["ID"], &["ID"])?;
        ids.children
            .iter()
            .map(|id| {
                let source = checker.required_attribute(id, "source")?;
                if !INFO_SOURCES.contains(&source) {
                    return Err(checker.fail(format!("'{}' is not a valid ID source", source)));
                }
                if id.text.is_empty() {
                    return Err(checker.fail(format!("ID for source '{}' is empty", source)));
                }
                let primary = id
                    .attribute("primary")
                    .map(|p| checker.boolean("primary", p))
                    .transpose()?
                    .unwrap_or(false);
                Ok(SourceId {
                    source: source.to_string(),
                    id: id.text.clone(),
                    primary,
                })
            })
            .collect()
    }

    fn parse_publisher(checker: &Checker, md: &mut Metadata, publisher: &Element) -> Result<()> {
        checker.children(publisher, &["Name", "Imprint"], &[])?;
        let name = checker.required(publisher, "Name")?;
        md.publisher = Some(name.text.clone()).filter(|n| !n.is_empty());
        md.publisher_id = publisher.attribute("id").map(str::to_string);
        md.imprint = publisher.child_text("Imprint").map(str::to_string);
        Ok(())
    }

    fn parse_series(checker: &Checker, md: &mut Metadata, series: &Element) -> Result<()> {
        checker.children(
            series,
            &[
                "Name",
                "SortName",
                "Volume",
                "Format",
                "StartYear",
                "IssueCount",
                "VolumeCount",
                "AlternativeNames",
            ],
            &[],
        )?;
        let name = checker.required(series, "Name")?;
        md.series = Some(name.text.clone()).filter(|n| !n.is_empty());
        md.series_id = series.attribute("id").map(str::to_string);
        md.language = series.attribute("lang").map(str::to_string);
        md.series_sort_name = series.child_text("SortName").map(str::to_string);
        md.volume = series
            .child("Volume")
            .map(|e| non_negative(checker, e))
            .transpose()?;
        md.format = series
            .child("Format")
            .map(|e| checker.one_of(e, SERIES_FORMATS).map(str::to_string))
            .transpose()?;
        md.series_start_year = series
            .child("StartYear")
            .map(|e| checker.int_in(e, 1000, 9999))
            .transpose()?
            .map(|y| y as i32);
        md.issue_count = series
            .child("IssueCount")
            .map(|e| non_negative(checker, e))
            .transpose()?;
        md.volume_count = series
            .child("VolumeCount")
            .map(|e| non_negative(checker, e))
            .transpose()?;
        if let Some(names) = series.child("AlternativeNames") {
            checker.children(names, &["AlternativeName"], &["AlternativeName"])?;
            md.alternative_names = names
                .children
                .iter()
                .filter(|n| !n.text.is_empty())
                .map(|n| AlternativeName {
                    name: n.text.clone(),
                    language: n.attribute("lang").map(str::to_string),
                })
                .collect();
        }
        Ok(())
    }

    fn parse_prices(checker: &Checker, prices: &Element) -> Result<Vec<Price>> {
        checker.children(prices, &["Price"], &["Price"])?;
        prices
            .children
            .iter()
            .map(|price| {
                let country = checker.required_attribute(price, "country")?;
                if country.len() != 2 || !country.chars().all(|c| c.is_ascii_uppercase()) {
                    return Err(checker.fail(format!(
                        "'{}' is not a two-letter country code",
                        country
                    )));
                }
                let amount = checker.decimal(price)?;
                if amount < 0.0 {
                    return Err(checker.fail(format!("price {} is negative", amount)));
                }
                Ok(Price {
                    country: country.to_string(),
                    amount,
                })
            })
            .collect()
    }

    fn parse_arcs(checker: &Checker, arcs: &Element) -> Result<Vec<StoryArc>> {
        checker.children(arcs, &["Arc"], &["Arc"])?;
        arcs.children
            .iter()
            .map(|arc| {
                checker.children(arc, &["Name", "Number"], &[])?;
                let name = checker.required(arc, "Name")?;
                let number = arc
                    .child("Number")
                    .map(|n| checker.int_in(n, 1, i64::MAX))
                    .transpose()?
                    .map(|n| n.to_string());
                Ok(StoryArc {
                    name: name.text.clone(),
                    number,
                })
            })
            .collect()
    }

    fn parse_universes(checker: &Checker, universes: &Element) -> Result<Vec<Universe>> {
        checker.children(universes, &["Universe"], &["Universe"])?;
        universes
            .children
            .iter()
            .map(|universe| {
                checker.children(universe, &["Name", "Designation"], &[])?;
                let name = checker.required(universe, "Name")?;
                Ok(Universe {
                    name: name.text.clone(),
                    designation: universe.child_text("Designation").map(str::to_string),
                })
            })
            .collect()
    }

    fn parse_urls(checker: &Checker, urls: &Element) -> Result<Vec<String>> {
        checker.children(urls, &["URL"], &["URL"])?;
        let mut links = Vec::new();
        for url in urls.children.iter().filter(|u| !u.text.is_empty()) {
            let primary = url
                .attribute("primary")
                .map(|p| checker.boolean("primary", p))
                .transpose()?
                .unwrap_or(false);
            if primary {
                links.insert(0, url.text.clone());
            } else {
                links.push(url.text.clone());
            }
        }
        Ok(links)
    }

    fn parse_credits(checker: &Checker, credits: &Element) -> Result<Vec<Credit>> {
        checker.children(credits, &["Credit"], &["Credit"])?;
        let mut parsed = Vec::new();
        for credit in &credits.children {
            checker.children(credit, &["Creator", "Roles"], &[])?;
            let creator = checker.required(credit, "Creator")?;
            if creator.text.is_empty() {
                return Err(checker.fail("Credit has an empty 'Creator'"));
            }
            let mut roles = Vec::new();
            if let Some(list) = credit.child("Roles") {
                checker.children(list, &["Role"], &["Role"])?;
                for role in &list.children {
                    let parsed_role = Role::from_name(&role.text);
                    if !parsed_role.is_known() || !parsed_role.name().eq_ignore_ascii_case(&role.text)
                    {
                        return Err(checker.fail(format!("'{}' is not a valid role", role.text)));
                    }
                    roles.push(parsed_role);
                }
            }
            if roles.is_empty() {
                roles.push(Role::unspecified());
            }
            for role in roles {
                parsed.push(Credit::new(creator.text.clone(), role));
            }
        }
        Ok(parsed)
    }

    fn credits_element(md: &Metadata) -> Option<Element> {
        if md.credits.is_empty() {
            return None;
        }
        let mut credits = Element::new("Credits");
        let mut index = 0;
        while index < md.credits.len() {
            let person = &md.credits[index].person;
            let mut roles = Element::new("Roles");
            while index < md.credits.len() && &md.credits[index].person == person {
                let role = &md.credits[index].role;
                index += 1;
                if role.is_unspecified() {
                    continue;
                }
                let name = if role.is_known() { role.name() } else { "Other" };
                if !roles.children.iter().any(|r| r.text == name) {
                    roles.push(Element::with_text("Role", name));
                }
            }
            let mut credit = Element::new("Credit");
            credit.push(Element::with_text("Creator", person.clone()));
            if !roles.children.is_empty() {
                credit.push(roles);
            }
            credits.push(credit);
        }
        Some(credits)
    }
}

impl MetadataHandler for MetronInfoHandler {
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

        let mut md = Metadata::new();
        md.origin = Some(FORMAT);

        if let Some(ids) = root.child("IDS") {
            md.ids = Self::parse_ids(&checker, ids)?;
        }
        Self::parse_publisher(&checker, &mut md, checker.required(&root, "Publisher")?)?;
        Self::parse_series(&checker, &mut md, checker.required(&root, "Series")?)?;
        md.title = root.child_text("CollectionTitle").map(str::to_string);
        md.number = root.child_text("Number").map(str::to_string);
        if let Some(stories) = root.child("Stories") {
            md.stories = texts(&checker, stories, "Story")?;
        }
        md.summary = root.child_text("Summary").map(str::to_string);
        if let Some(prices) = root.child("Prices") {
            md.prices = Self::parse_prices(&checker, prices)?;
        }
        if let Some(cover) = root.child("CoverDate") {
            md.set_cover_date(checker.date(cover)?);
        }
        md.store_date = root
            .child("StoreDate")
            .map(|e| checker.date(e))
            .transpose()?;
        md.page_count = root
            .child("PageCount")
            .map(|e| checker.int_in(e, 0, u32::MAX as i64))
            .transpose()?
            .map(|v| v as u32);
        md.notes = root.child_text("Notes").map(str::to_string);
        if let Some(genres) = root.child("Genres") {
            md.genres = texts(&checker, genres, "Genre")?;
        }
        if let Some(tags) = root.child("Tags") {
            md.tags = texts(&checker, tags, "Tag")?;
        }
        if let Some(arcs) = root.child("Arcs") {
            md.story_arcs = Self::parse_arcs(&checker, arcs)?;
        }
        if let Some(characters) = root.child("Characters") {
            md.characters = texts(&checker, characters, "Character")?;
        }
        if let Some(teams) = root.child("Teams") {
            md.teams = texts(&checker, teams, "Team")?;
        }
        if let Some(universes) = root.child("Universes") {
            md.universes = Self::parse_universes(&checker, universes)?;
        }
        if let Some(locations) = root.child("Locations") {
            md.locations = texts(&checker, locations, "Location")?;
        }
        if let Some(reprints) = root.child("Reprints") {
            md.reprints = texts(&checker, reprints, "Reprint")?;
        }
        if let Some(gtin) = root.child("GTIN") {
            checker.children(gtin, &["ISBN", "UPC"], &[])?;
            let parsed = Gtin {
                isbn: gtin.child_text("ISBN").map(str::to_string),
                upc: gtin.child_text("UPC").map(str::to_string),
            };
            md.gtin = Some(parsed).filter(|g| !g.is_empty());
        }
        md.age_rating = root
            .child("AgeRating")
            .map(|e| checker.one_of(e, AGE_RATINGS).map(str::to_string))
            .transpose()?;
        if let Some(urls) = root.child("URLs") {
            md.web_links = Self::parse_urls(&checker, urls)?;
        }
        if let Some(modified) = root.child("LastModified") {
            if !is_datetime(modified.text.trim()) {
                return Err(checker.fail(format!(
                    "element 'LastModified' expects a date-time, found '{}'",
                    modified.text
                )));
            }
            md.last_modified = Some(modified.text.clone());
        }
        if let Some(credits) = root.child("Credits") {
            md.credits = Self::parse_credits(&checker, credits)?;
        }

        Ok((md, SchemaVersion::MetronInfoV1))
    }

    fn serialize(&self, md: &Metadata) -> Result<Vec<u8>> {
        let mut root = Element::new(ROOT);
        root.set_attribute("xmlns:xsi", "http://www.w3.org/2001/XMLSchema-instance");
        root.set_attribute("xsi:noNamespaceSchemaLocation", "MetronInfo.xsd");

        let ids: Vec<&SourceId> = md
            .ids
            .iter()
            .filter(|id| INFO_SOURCES.contains(&id.source.as_str()) && !id.id.is_empty())
            .collect();
        if !ids.is_empty() {
            let mut container = Element::new("IDS");
            for id in ids {
                let mut element = Element::with_text("ID", id.id.clone());
                element.set_attribute("source", id.source.clone());
                if id.primary {
                    element.set_attribute("primary", "true");
                }
                container.push(element);
            }
            root.push(container);
        }

        let mut publisher = Element::new("Publisher");
        if let Some(id) = &md.publisher_id {
            publisher.set_attribute("id", id.clone());
        }
        publisher.push(Element::with_text(
            "Name",
            md.publisher.as_deref().unwrap_or(DEFAULT_NAME),
        ));
        publisher.push_text("Imprint", md.imprint.as_deref());
        root.push(publisher);

        let mut series = Element::new("Series");
        if let Some(id) = &md.series_id {
            series.set_attribute("id", id.clone());
        }
        if let Some(lang) = &md.language {
            series.set_attribute("lang", lang.clone());
        }
        series.push(Element::with_text(
            "Name",
            md.series.as_deref().unwrap_or(DEFAULT_NAME),
        ));
        series.push_text("SortName", md.series_sort_name.as_deref());
        series.push_text("Volume", md.volume);
        series.push_text(
            "Format",
            md.format.as_deref().and_then(|f| {
                SERIES_FORMATS
                    .iter()
                    .find(|known| known.eq_ignore_ascii_case(f))
                    .copied()
                    .or_else(|| metron_series_format(f))
            }),
        );
        series.push_text("StartYear", md.series_start_year.filter(|y| (1000..=9999).contains(y)));
        series.push_text("IssueCount", md.issue_count);
        series.push_text("VolumeCount", md.volume_count);
        if !md.alternative_names.is_empty() {
            let mut names = Element::new("AlternativeNames");
            for alternative in &md.alternative_names {
                let mut element = Element::with_text("AlternativeName", alternative.name.clone());
                if let Some(lang) = &alternative.language {
                    element.set_attribute("lang", lang.clone());
                }
                names.push(element);
            }
            series.push(names);
        }
        root.push(series);

        root.push_text("CollectionTitle", md.title.as_deref());
        root.push_text("Number", md.number.as_deref());
        root.push_list("Stories", "Story", &md.stories);
        root.push_text("Summary", md.summary.as_deref());
        if !md.prices.is_empty() {
            let mut prices = Element::new("Prices");
            for price in &md.prices {
                let mut element = Element::with_text("Price", xml::format_decimal(price.amount));
                element.set_attribute("country", price.country.clone());
                prices.push(element);
            }
            root.push(prices);
        }
        root.push_text(
            "CoverDate",
            md.cover_date().map(|d| d.format("%Y-%m-%d").to_string()),
        );
        root.push_text(
            "StoreDate",
            md.store_date.map(|d| d.format("%Y-%m-%d").to_string()),
        );
        root.push_text("PageCount", md.page_count);
        root.push_text("Notes", md.notes.as_deref());
        root.push_list("Genres", "Genre", &md.genres);
        root.push_list("Tags", "Tag", &md.tags);
        if !md.story_arcs.is_empty() {
            let mut arcs = Element::new("Arcs");
            for arc in &md.story_arcs {
                let mut element = Element::new("Arc");
                element.push(Element::with_text("Name", arc.name.clone()));
                element.push_text("Number", arc.number.as_deref().and_then(arc_number));
                arcs.push(element);
            }
            root.push(arcs);
        }
        root.push_list("Characters", "Character", &md.characters);
        root.push_list("Teams", "Team", &md.teams);
        if !md.universes.is_empty() {
            let mut universes = Element::new("Universes");
            for universe in &md.universes {
                let mut element = Element::new("Universe");
                element.push(Element::with_text("Name", universe.name.clone()));
                element.push_text("Designation", universe.designation.as_deref());
                universes.push(element);
            }
            root.push(universes);
        }
        root.push_list("Locations", "Location", &md.locations);
        root.push_list("Reprints", "Reprint", &md.reprints);
        if let Some(gtin) = md.gtin.as_ref().filter(|g| !g.is_empty()) {
            let mut element = Element::new("GTIN");
            element.push_text("ISBN", gtin.isbn.as_deref());
            element.push_text("UPC", gtin.upc.as_deref());
            root.push(element);
        }
        root.push_text(
            "AgeRating",
            md.age_rating.as_deref().and_then(metron_age_rating),
        );
        if !md.web_links.is_empty() {
            let mut urls = Element::new("URLs");
            for (i, link) in md.web_links.iter().enumerate() {
                let mut element = Element::with_text("URL", link.clone());
                if i == 0 {
                    element.set_attribute("primary", "true");
                }
                urls.push(element);
            }
            root.push(urls);
        }
        root.push_text("LastModified", md.last_modified.as_deref());
        if let Some(credits) = Self::credits_element(md) {
            root.push(credits);
        }

        xml::write(FORMAT, &root)
    }

    fn convert(&self, md: &Metadata) -> Metadata {
        let mut out = md.clone();
        out.origin = Some(FORMAT);

        let mut dropped = Vec::new();
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
            alternate_series,
            alternate_number,
            alternate_count,
            series_group,
            scan_information,
            black_and_white,
            manga,
            community_rating,
            main_character_or_team,
            review,
            pages
        );

        out.age_rating = md.age_rating.as_deref().and_then(|rating| {
            let mapped = metron_age_rating(rating);
            if mapped.is_none() {
                dropped.push("age_rating");
            }
            mapped.map(str::to_string)
        });
        out.format = md.format.as_deref().and_then(|format| {
            let mapped = SERIES_FORMATS
                .iter()
                .find(|known| known.eq_ignore_ascii_case(format))
                .copied()
                .or_else(|| metron_series_format(format));
            if mapped.is_none() {
                dropped.push("format");
            }
            mapped.map(str::to_string)
        });

        if let Some(volume) = out.volume.filter(|v| *v >= VOLUME_YEAR_THRESHOLD) {
            if out.series_start_year.is_none() && volume <= 9999 {
                out.series_start_year = Some(volume as i32);
            }
            out.volume = None;
        }

        for arc in &mut out.story_arcs {
            if let Some(number) = arc.number.take() {
                arc.number = arc_number(&number).map(|n| n.to_string());
                if arc.number.is_none() {
                    dropped.push("story arc number");
                }
            }
        }

        match (out.year, out.month) {
            (Some(_), Some(_)) => {
                out.day = out.cover_date().map(|d| chrono::Datelike::day(&d));
            }
            _ => {
                if out.year.is_some() || out.month.is_some() || out.day.is_some() {
                    dropped.push("partial cover date");
                }
                out.year = None;
                out.month = None;
                out.day = None;
            }
        }

        out.credits.clear();
        for credit in &md.credits {
            let role = if credit.role.is_known() || credit.role.is_unspecified() {
                credit.role.clone()
            } else {
                Role::Other
            };
            out.add_credit(credit.person.clone(), role);
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
    use crate::metadata::{ComicInfoHandler, Manga};

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<MetronInfo xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xsi:noNamespaceSchemaLocation="MetronInfo.xsd">
  <IDS>
    <ID source="Metron" primary="true">290431</ID>
    <ID source="Comic Vine">1234</ID>
  </IDS>
  <Publisher id="12">
    <Name>Marvel</Name>
    <Imprint>Marvel Knights</Imprint>
  </Publisher>
  <Series id="71" lang="en">
    <Name>Spider-Man</Name>
    <SortName>Spider-Man</SortName>
    <Volume>1</Volume>
    <Format>Single Issue</Format>
    <StartYear>1990</StartYear>
    <IssueCount>98</IssueCount>
  </Series>
  <CollectionTitle>Torment</CollectionTitle>
  <Number>1</Number>
  <Stories>
    <Story>Torment Part One</Story>
  </Stories>
  <Summary>Spidey meets the Lizard.</Summary>
  <Prices>
    <Price country="US">1.75</Price>
  </Prices>
  <CoverDate>1990-08-01</CoverDate>
  <StoreDate>1990-06-05</StoreDate>
  <PageCount>36</PageCount>
  <Genres>
    <Genre>Super-Hero</Genre>
  </Genres>
  <Arcs>
    <Arc>
      <Name>Torment</Name>
      <Number>1</Number>
    </Arc>
  </Arcs>
  <Characters>
    <Character>Spider-Man</Character>
    <Character>Lizard</Character>
  </Characters>
  <Universes>
    <Universe>
      <Name>Earth 616</Name>
      <Designation>616</Designation>
    </Universe>
  </Universes>
  <GTIN>
    <UPC>75960609999900111</UPC>
  </GTIN>
  <AgeRating>Teen</AgeRating>
  <URLs>
    <URL primary="true">https://metron.cloud/issue/spider-man-1990-1/</URL>
    <URL>https://comicvine.gamespot.com/spider-man-1/</URL>
  </URLs>
  <LastModified>2024-05-01T12:30:00+00:00</LastModified>
  <Credits>
    <Credit>
      <Creator>Todd McFarlane</Creator>
      <Roles>
        <Role>Writer</Role>
        <Role>Penciller</Role>
        <Role>Inker</Role>
        <Role>Cover</Role>
      </Roles>
    </Credit>
    <Credit>
      <Creator>Bob Sharen</Creator>
      <Roles>
        <Role>Colorist</Role>
      </Roles>
    </Credit>
  </Credits>
</MetronInfo>
"#;

    #[test]
    fn parses_sample_document() {
        let md = MetronInfoHandler.parse(SAMPLE.as_bytes()).unwrap();
        assert_eq!(md.publisher.as_deref(), Some("Marvel"));
        assert_eq!(md.publisher_id.as_deref(), Some("12"));
        assert_eq!(md.series.as_deref(), Some("Spider-Man"));
        assert_eq!(md.language.as_deref(), Some("en"));
        assert_eq!(md.ids.len(), 2);
        assert!(md.ids[0].primary);
        assert_eq!((md.year, md.month, md.day), (Some(1990), Some(8), Some(1)));
        assert_eq!(md.prices[0].amount, 1.75);
        assert_eq!(md.credits.len(), 5);
        assert_eq!(md.credited(&Role::Cover), vec!["Todd McFarlane"]);
        assert_eq!(md.web_links[0], "https://metron.cloud/issue/spider-man-1990-1/");
        assert_eq!(md.universes[0].designation.as_deref(), Some("616"));
    }

    #[test]
    fn serialize_round_trips_canonical_document() {
        let md = MetronInfoHandler.parse(SAMPLE.as_bytes()).unwrap();
        let bytes = MetronInfoHandler.serialize(&md).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), SAMPLE);
    }

    #[test]
    fn required_elements_default_to_unknown() {
        let md = Metadata::new();
        let text = String::from_utf8(MetronInfoHandler.serialize(&md).unwrap()).unwrap();
        assert!(text.contains("<Publisher>\n    <Name>Unknown</Name>\n  </Publisher>"));
        assert!(text.contains("<Series>\n    <Name>Unknown</Name>\n  </Series>"));
        assert!(MetronInfoHandler.parse(text.as_bytes()).is_ok());
    }

    #[test]
    fn schema_violations_are_validation_errors() {
        let base = |body: &str| {
            format!(
                "<MetronInfo><Publisher><Name>P</Name></Publisher><Series><Name>S</Name></Series>{}</MetronInfo>",
                body
            )
        };
        for doc in [
            base("<CoverDate>1990-13-01</CoverDate>"),
            base("<PageCount>many</PageCount>"),
            base("<AgeRating>PG</AgeRating>"),
            base("<IDS><ID source=\"Wikipedia\">1</ID></IDS>"),
            base("<Credits><Credit><Creator>A</Creator><Roles><Role>Flatter</Role></Roles></Credit></Credits>"),
            base("<Prices><Price country=\"usa\">1.00</Price></Prices>"),
            base("<Bogus/>"),
            "<MetronInfo><Series><Name>S</Name></Series></MetronInfo>".to_string(),
        ] {
            assert!(
                matches!(
                    MetronInfoHandler.parse(doc.as_bytes()),
                    Err(Error::MetadataValidation { .. })
                ),
                "accepted {}",
                doc
            );
        }
    }

    #[test]
    fn adjacent_credits_for_one_creator_are_merged() {
        let mut md = Metadata::new();
        md.add_credit("A", Role::Writer);
        md.add_credit("A", Role::Artist);
        md.add_credit("B", Role::Letterer);
        md.add_credit("A", Role::Cover);
        md.add_credit("C", Role::Unknown("Flatter".to_string()));
        let text = String::from_utf8(MetronInfoHandler.serialize(&md).unwrap()).unwrap();
        assert_eq!(text.matches("<Credit>").count(), 4);
        assert!(text.contains("<Role>Other</Role>"));
        assert!(MetronInfoHandler.parse(text.as_bytes()).is_ok());
    }

    #[test]
    fn credits_without_roles_stay_role_less() {
        let doc = "<MetronInfo><Publisher><Name>P</Name></Publisher><Series><Name>S</Name></Series>\
            <Credits><Credit><Creator>A</Creator></Credit></Credits></MetronInfo>";
        let md = MetronInfoHandler.parse(doc.as_bytes()).unwrap();
        assert_eq!(md.credits, vec![Credit::new("A", Role::unspecified())]);

        let text = String::from_utf8(MetronInfoHandler.serialize(&md).unwrap()).unwrap();
        assert!(text.contains("<Creator>A</Creator>"));
        assert!(!text.contains("<Roles>"));
        assert_eq!(MetronInfoHandler.parse(text.as_bytes()).unwrap(), md);
        assert_eq!(MetronInfoHandler.convert(&md).credits, md.credits);
    }

    #[test]
    fn convert_keeps_only_integer_arc_numbers() {
        let mut md = Metadata::new();
        md.story_arcs = vec![
            StoryArc {
                name: "A".to_string(),
                number: Some("Part 2".to_string()),
            },
            StoryArc {
                name: "B".to_string(),
                number: Some(" 3 ".to_string()),
            },
        ];
        let out = MetronInfoHandler.convert(&md);
        assert_eq!(out.story_arcs[0].number, None);
        assert_eq!(out.story_arcs[1].number.as_deref(), Some("3"));
    }

    #[test]
    fn convert_from_comicinfo_maps_vocabularies() {
        let mut md = Metadata::new();
        md.origin = Some(MetadataFormat::ComicInfo);
        md.series = Some("Saga".to_string());
        md.volume = Some(2012);
        md.format = Some("TPB".to_string());
        md.age_rating = Some("Mature 17+".to_string());
        md.manga = Some(Manga::No);
        md.year = Some(2012);
        md.month = Some(3);
        md.set_default_page_list(2);

        let out = MetronInfoHandler.convert(&md);
        assert_eq!(out.format.as_deref(), Some("Trade Paperback"));
        assert_eq!(out.age_rating.as_deref(), Some("Mature"));
        assert_eq!(out.series_start_year, Some(2012));
        assert_eq!(out.volume, None);
        assert_eq!(out.day, Some(1));
        assert!(out.manga.is_none());
        assert!(out.pages.is_empty());
    }

    #[test]
    fn metron_to_comicinfo_and_back_is_idempotent() {
        let original = MetronInfoHandler.parse(SAMPLE.as_bytes()).unwrap();
        let once = MetronInfoHandler.convert(&ComicInfoHandler.convert(&original));
        let twice = MetronInfoHandler.convert(&ComicInfoHandler.convert(&once));
        assert_eq!(once, twice);

        assert_eq!(once.series, original.series);
        assert_eq!(once.number, original.number);
        assert_eq!(once.age_rating, original.age_rating);
        assert_eq!(once.format, original.format);
        assert_eq!(once.cover_date(), original.cover_date());
        assert_eq!(once.credits, original.credits);
        assert_eq!(once.web_links, original.web_links);

        let comicinfo = ComicInfoHandler
            .serialize(&ComicInfoHandler.convert(&original))
            .unwrap();
        let reread = MetronInfoHandler.convert(&ComicInfoHandler.parse(&comicinfo).unwrap());
        assert_eq!(reread.credits.len(), once.credits.len());
        assert!(once.credits.iter().all(|c| reread.credits.contains(c)));
        assert_eq!(reread.age_rating, once.age_rating);
    }
}
