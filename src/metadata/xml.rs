//! Minimal element tree over `quick-xml`, plus the typed value checks both
//! schema handlers validate with.

use std::borrow::Cow;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::{Error, Result};
use crate::types::MetadataFormat;

const UTF8_BOM: &[u8] = b"\xef\xbb\xbf";

/// An element with its attributes, trimmed text and child elements.
#[derive(Debug, Clone, PartialEq, Default)]
pub(crate) struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_text(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.push((key.into(), value.into()));
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Text of the named child, if present and non-empty.
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name)
            .map(|c| c.text.as_str())
            .filter(|t| !t.is_empty())
    }

    pub fn push(&mut self, child: Element) {
        self.children.push(child);
    }

    /// Appends `<name>value</name>` when `value` is present and non-empty.
    pub fn push_text<T: ToString>(&mut self, name: &str, value: Option<T>) {
        if let Some(value) = value {
            let text = value.to_string();
            if !text.is_empty() {
                self.children.push(Element::with_text(name, text));
            }
        }
    }

    /// Appends a container element holding one text child per item, skipping empty lists.
    pub fn push_list(&mut self, container: &str, item: &str, values: &[String]) {
        if values.is_empty() {
            return;
        }
        let mut parent = Element::new(container);
        for value in values {
            parent.push(Element::with_text(item, value.clone()));
        }
        self.children.push(parent);
    }
}

fn parse_error(format: MetadataFormat, reason: impl ToString) -> Error {
    Error::MetadataParse {
        format,
        reason: reason.to_string(),
    }
}

fn utf8<'a>(format: MetadataFormat, bytes: &'a [u8]) -> Result<&'a str> {
    std::str::from_utf8(bytes).map_err(|e| parse_error(format, e))
}

fn start_element(format: MetadataFormat, start: &BytesStart<'_>) -> Result<Element> {
    let mut element = Element::new(utf8(format, start.name().as_ref())?);
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| parse_error(format, e))?;
        let key = utf8(format, attribute.key.as_ref())?.to_string();
        let value = attribute
            .unescape_value()
            .map_err(|e| parse_error(format, e))?
            .into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

/// Parses a complete document into its root element.
///
/// Fails with `MetadataParse` on anything that is not a single well-formed
/// UTF-8 element tree.
pub(crate) fn parse(format: MetadataFormat, bytes: &[u8]) -> Result<Element> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;
    let mut buf = Vec::new();

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| parse_error(format, format!("{} at byte {}", e, reader.buffer_position())))?;
        match event {
            Event::Decl(decl) => {
                if let Some(encoding) = decl.encoding() {
                    let encoding = encoding.map_err(|e| parse_error(format, e))?;
                    let encoding = String::from_utf8_lossy(&encoding).to_ascii_lowercase();
                    if encoding != "utf-8" && encoding != "utf8" {
                        return Err(parse_error(
                            format,
                            format!("unsupported encoding '{}'", encoding),
                        ));
                    }
                }
            }
            Event::Start(start) => {
                if root.is_some() && stack.is_empty() {
                    return Err(parse_error(format, "content after the root element"));
                }
                stack.push(start_element(format, &start)?);
            }
            Event::Empty(start) => {
                let element = start_element(format, &start)?;
                match stack.last_mut() {
                    Some(parent) => parent.push(element),
                    None if root.is_none() => root = Some(element),
                    None => return Err(parse_error(format, "content after the root element")),
                }
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| parse_error(format, "unexpected closing tag"))?;
                match stack.last_mut() {
                    Some(parent) => parent.push(element),
                    None => root = Some(element),
                }
            }
            Event::Text(text) => {
                let text: Cow<'_, str> = text.unescape().map_err(|e| parse_error(format, e))?;
                match stack.last_mut() {
                    Some(current) => current.text.push_str(&text),
                    None if text.trim().is_empty() => {}
                    None => return Err(parse_error(format, "text outside the root element")),
                }
            }
            Event::CData(data) => {
                let text = utf8(format, &data)?;
                match stack.last_mut() {
                    Some(current) => current.text.push_str(text),
                    None => return Err(parse_error(format, "CDATA outside the root element")),
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if let Some(open) = stack.last() {
        return Err(parse_error(
            format,
            format!("element '{}' is never closed", open.name),
        ));
    }
    root.ok_or_else(|| parse_error(format, "document has no root element"))
}

fn write_element<W: std::io::Write>(writer: &mut Writer<W>, element: &Element) -> std::io::Result<()> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children.is_empty() && element.text.is_empty() {
        return writer.write_event(Event::Empty(start)).map_err(to_io);
    }

    writer.write_event(Event::Start(start)).map_err(to_io)?;
    if !element.text.is_empty() {
        writer
            .write_event(Event::Text(BytesText::new(&element.text)))
            .map_err(to_io)?;
    }
    for child in &element.children {
        write_element(writer, child)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(element.name.as_str())))
        .map_err(to_io)
}

fn to_io<E: std::fmt::Display>(e: E) -> std::io::Error {
    std::io::Error::other(e.to_string())
}

/// Serializes `root` with an XML declaration and two-space indentation.
pub(crate) fn write(format: MetadataFormat, root: &Element) -> Result<Vec<u8>> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
        .map_err(|e| Error::validation(format, format!("cannot write declaration: {}", e)))?;
    write_element(&mut writer, root)
        .map_err(|e| Error::validation(format, format!("cannot write document: {}", e)))?;
    let mut bytes = writer.into_inner();
    bytes.push(b'\n');
    Ok(bytes)
}

/// Typed accessors that fail with `MetadataValidation`, naming the element.
pub(crate) struct Checker {
    pub format: MetadataFormat,
}

impl Checker {
    pub fn new(format: MetadataFormat) -> Self {
        Self { format }
    }

    pub fn fail(&self, detail: impl Into<String>) -> Error {
        Error::validation(self.format, detail)
    }

    /// Rejects children outside `allowed` and repeated single-occurrence children.
    pub fn children(&self, element: &Element, allowed: &[&str], repeatable: &[&str]) -> Result<()> {
        for (i, child) in element.children.iter().enumerate() {
            if !allowed.contains(&child.name.as_str()) {
                return Err(self.fail(format!(
                    "unexpected element '{}' in '{}'",
                    child.name, element.name
                )));
            }
            if !repeatable.contains(&child.name.as_str())
                && element.children[..i].iter().any(|c| c.name == child.name)
            {
                return Err(self.fail(format!(
                    "element '{}' appears more than once in '{}'",
                    child.name, element.name
                )));
            }
        }
        Ok(())
    }

    pub fn int(&self, element: &Element) -> Result<i64> {
        element.text.trim().parse::<i64>().map_err(|_| {
            self.fail(format!(
                "element '{}' expects an integer, found '{}'",
                element.name, element.text
            ))
        })
    }

    pub fn int_in(&self, element: &Element, min: i64, max: i64) -> Result<i64> {
        let value = self.int(element)?;
        if value < min || value > max {
            return Err(self.fail(format!(
                "element '{}' must be between {} and {}, found {}",
                element.name, min, max, value
            )));
        }
        Ok(value)
    }

    pub fn decimal(&self, element: &Element) -> Result<f64> {
        element
            .text
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| {
                self.fail(format!(
                    "element '{}' expects a decimal, found '{}'",
                    element.name, element.text
                ))
            })
    }

    pub fn one_of<'a>(&self, element: &'a Element, allowed: &[&str]) -> Result<&'a str> {
        let value = element.text.as_str();
        if allowed.contains(&value) {
            Ok(value)
        } else {
            Err(self.fail(format!(
                "'{}' is not a valid value for '{}'",
                value, element.name
            )))
        }
    }

    /// `xs:boolean`: `true`, `false`, `1` or `0`.
    pub fn boolean(&self, owner: &str, value: &str) -> Result<bool> {
        match value.trim() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            other => Err(self.fail(format!("'{}' expects a boolean, found '{}'", owner, other))),
        }
    }

    pub fn date(&self, element: &Element) -> Result<chrono::NaiveDate> {
        chrono::NaiveDate::parse_from_str(element.text.trim(), "%Y-%m-%d").map_err(|_| {
            self.fail(format!(
                "element '{}' expects a YYYY-MM-DD date, found '{}'",
                element.name, element.text
            ))
        })
    }

    pub fn required<'a>(&self, element: &'a Element, child: &str) -> Result<&'a Element> {
        element.child(child).ok_or_else(|| {
            self.fail(format!(
                "element '{}' requires a '{}' child",
                element.name, child
            ))
        })
    }

    pub fn required_attribute<'a>(&self, element: &'a Element, key: &str) -> Result<&'a str> {
        element.attribute(key).ok_or_else(|| {
            self.fail(format!(
                "element '{}' requires a '{}' attribute",
                element.name, key
            ))
        })
    }
}

/// Formats a decimal in its shortest round-tripping form (`4`, `3.99`).
pub(crate) fn format_decimal(value: f64) -> String {
    format!("{}", value)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FORMAT: MetadataFormat = MetadataFormat::ComicInfo;

    #[test]
    fn parses_nested_elements_and_attributes() {
        let doc = br#"<?xml version="1.0" encoding="utf-8"?>
<Root a="1">
  <Name>Batman &amp; Robin</Name>
  <Pages><Page Image="0" Type="FrontCover"/></Pages>
</Root>"#;
        let root = parse(FORMAT, doc).unwrap();
        assert_eq!(root.name, "Root");
        assert_eq!(root.attribute("a"), Some("1"));
        assert_eq!(root.child_text("Name"), Some("Batman & Robin"));
        let page = root.child("Pages").and_then(|p| p.child("Page")).unwrap();
        assert_eq!(page.attribute("Type"), Some("FrontCover"));
    }

    #[test]
    fn malformed_documents_are_parse_errors() {
        for doc in [
            &b"<Root><Name>x</Root>"[..],
            b"<Root><Name>x</Name>",
            b"",
            b"just text",
            b"<Root/><Other/>",
            b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><Root/>",
            b"<Root>\xff\xfe</Root>",
        ] {
            assert!(
                matches!(parse(FORMAT, doc), Err(Error::MetadataParse { .. })),
                "accepted {:?}",
                String::from_utf8_lossy(doc)
            );
        }
    }

    #[test]
    fn writer_indents_and_escapes() {
        let mut root = Element::new("Root");
        root.push_text("Name", Some("A & B"));
        root.push_text::<&str>("Skipped", None);
        let mut pages = Element::new("Pages");
        let mut page = Element::new("Page");
        page.set_attribute("Image", "0");
        pages.push(page);
        root.push(pages);

        let text = String::from_utf8(write(FORMAT, &root).unwrap()).unwrap();
        assert_eq!(
            text,
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<Root>\n  <Name>A &amp; B</Name>\n  <Pages>\n    <Page Image=\"0\"/>\n  </Pages>\n</Root>\n"
        );
        assert_eq!(parse(FORMAT, text.as_bytes()).unwrap(), root);
    }

    #[test]
    fn checker_reports_element_names() {
        let checker = Checker::new(FORMAT);
        let month = Element::with_text("Month", "13");
        let err = checker.int_in(&month, 1, 12).unwrap_err();
        assert!(err.to_string().contains("Month"));
        assert!(checker.int(&Element::with_text("Count", "ten")).is_err());
        assert_eq!(format_decimal(4.0), "4");
        assert_eq!(format_decimal(3.99), "3.99");
    }
}
