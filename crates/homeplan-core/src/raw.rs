//! Generic XML element tree read with quick-xml events
//!
//! The project export mixes attribute and element encodings and nests the
//! same element names at arbitrary depth, so it is first read into a plain
//! element tree. Every element keeps its children as a sequence, which means
//! the "one child vs. many children" ambiguity never reaches the normalizer.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::inventory::InventoryError;

/// Deepest element nesting accepted by [`RawElement::parse`]. Every later
/// stage recurses once per level, so this also bounds their stack use.
pub const MAX_DEPTH: usize = 512;

/// One XML element with its attributes, trimmed text, and child elements
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: Option<String>,
    pub children: Vec<RawElement>,
}

impl RawElement {
    /// Create an empty element with the given tag name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Parse an XML document and return its document element
    pub fn parse(xml: &str) -> Result<Self, InventoryError> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);
        let mut buf = Vec::new();
        let mut stack: Vec<RawElement> = Vec::new();
        let mut root: Option<RawElement> = None;

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    if stack.len() >= MAX_DEPTH {
                        return Err(InventoryError::MalformedDocument(format!(
                            "elements nested deeper than {MAX_DEPTH} levels"
                        )));
                    }
                    stack.push(Self::from_start(&e)?);
                }
                Ok(Event::Empty(e)) => {
                    let element = Self::from_start(&e)?;
                    attach(&mut stack, &mut root, element);
                }
                Ok(Event::End(_)) => {
                    if let Some(element) = stack.pop() {
                        attach(&mut stack, &mut root, element);
                    }
                }
                Ok(Event::Text(e)) => {
                    if let Some(top) = stack.last_mut() {
                        let text = e
                            .unescape()
                            .map_err(|err| InventoryError::Xml(err.to_string()))?;
                        top.push_text(&text);
                    }
                }
                Ok(Event::CData(e)) => {
                    if let Some(top) = stack.last_mut() {
                        top.push_text(&String::from_utf8_lossy(&e));
                    }
                }
                Ok(Event::Eof) => break,
                Err(err) => {
                    return Err(InventoryError::Xml(format!(
                        "at byte {}: {err}",
                        reader.buffer_position()
                    )))
                }
                _ => {}
            }
            buf.clear();
        }

        if let Some(open) = stack.last() {
            return Err(InventoryError::Xml(format!(
                "unexpected end of document inside <{}>",
                open.name
            )));
        }

        root.ok_or_else(|| InventoryError::MalformedDocument("document has no root element".into()))
    }

    fn from_start(event: &BytesStart<'_>) -> Result<Self, InventoryError> {
        let mut element = Self::new(String::from_utf8_lossy(event.name().as_ref()));
        for attr in event.attributes() {
            let attr = attr.map_err(|err| InventoryError::Xml(err.to_string()))?;
            let value = attr
                .unescape_value()
                .map_err(|err| InventoryError::Xml(err.to_string()))?;
            element.attributes.push((
                String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
                value.trim().to_string(),
            ));
        }
        Ok(element)
    }

    fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        match self.text.as_mut() {
            Some(existing) => existing.push_str(text),
            None => self.text = Some(text.to_string()),
        }
    }

    /// Check the tag name, ignoring ASCII case
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// Trimmed text content, `None` when the element has no text
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }

    /// Attribute value by name (ASCII case-insensitive)
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// First direct child with the given tag name
    pub fn child(&self, name: &str) -> Option<&RawElement> {
        self.children.iter().find(|c| c.is_named(name))
    }

    /// All direct children with the given tag name, in document order
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a RawElement> + 'a {
        self.children.iter().filter(move |c| c.is_named(name))
    }

    /// Breadth-first search for the first element with the given name,
    /// starting with this element itself
    pub fn find_descendant(&self, name: &str) -> Option<&RawElement> {
        let mut queue = std::collections::VecDeque::from([self]);
        while let Some(element) = queue.pop_front() {
            if element.is_named(name) {
                return Some(element);
            }
            queue.extend(element.children.iter());
        }
        None
    }
}

fn attach(stack: &mut [RawElement], root: &mut Option<RawElement>, element: RawElement) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => {
            if root.is_none() {
                *root = Some(element);
            }
        }
    }
}
