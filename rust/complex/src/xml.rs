// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Nested-element writer and reader.
//!
//! Cells serialize against an in-memory [`XmlElement`] tree through
//! [`XmlWriter`] and [`XmlReader`]. Text encoding and decoding of the
//! tree goes through `quick-xml`.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};

use crate::error::{Error, Result};

/// Element with ordered attributes and child elements. Text content is
/// not modeled.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    /// Sets an attribute, replacing a previous value of the same name.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    /// First element named `name` in a depth-first walk, self included.
    pub fn find(&self, name: &str) -> Option<&XmlElement> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(name))
    }

    fn write_to(&self, writer: &mut Writer<Vec<u8>>) -> Result<()> {
        let mut start = BytesStart::new(self.name.as_str());
        for (k, v) in &self.attributes {
            start.push_attribute((k.as_str(), v.as_str()));
        }
        if self.children.is_empty() {
            writer.write_event(Event::Empty(start)).map_err(xml_error)?;
            return Ok(());
        }
        writer.write_event(Event::Start(start)).map_err(xml_error)?;
        for c in &self.children {
            c.write_to(writer)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new(self.name.as_str())))
            .map_err(xml_error)?;
        Ok(())
    }

    /// Indented XML text with a declaration.
    pub fn to_xml_string(&self) -> Result<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 4);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(xml_error)?;
        self.write_to(&mut writer)?;
        String::from_utf8(writer.into_inner()).map_err(|e| Error::Xml(e.to_string()))
    }

    /// Parses the root element of an XML text.
    pub fn parse(text: &str) -> Result<XmlElement> {
        let mut reader = Reader::from_str(text);
        reader.trim_text(true);
        let mut stack: Vec<XmlElement> = Vec::new();
        loop {
            match reader.read_event().map_err(xml_error)? {
                Event::Start(e) => stack.push(element_from(&e)?),
                Event::Empty(e) => {
                    let el = element_from(&e)?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(el),
                        None => return Ok(el),
                    }
                }
                Event::End(_) => {
                    let el = stack
                        .pop()
                        .ok_or_else(|| Error::Xml("unbalanced end tag".to_string()))?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(el),
                        None => return Ok(el),
                    }
                }
                Event::Eof => return Err(Error::Xml("no root element".to_string())),
                _ => {}
            }
        }
    }
}

fn xml_error(e: impl std::fmt::Display) -> Error {
    Error::Xml(e.to_string())
}

fn element_from(start: &BytesStart<'_>) -> Result<XmlElement> {
    let name = std::str::from_utf8(start.name().as_ref())
        .map_err(xml_error)?
        .to_string();
    let mut el = XmlElement::new(name);
    for attr in start.attributes() {
        let attr = attr.map_err(xml_error)?;
        let key = std::str::from_utf8(attr.key.as_ref()).map_err(xml_error)?.to_string();
        let value = attr.unescape_value().map_err(xml_error)?.into_owned();
        el.attributes.push((key, value));
    }
    Ok(el)
}

/// Streaming-style writer building an element tree.
#[derive(Debug, Default)]
pub struct XmlWriter {
    stack: Vec<XmlElement>,
    roots: Vec<XmlElement>,
}

impl XmlWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_start_element(&mut self, name: &str) {
        self.stack.push(XmlElement::new(name));
    }

    /// Adds an attribute to the innermost open element. Ignored when no
    /// element is open.
    pub fn write_attribute(&mut self, name: &str, value: impl Into<String>) {
        if let Some(el) = self.stack.last_mut() {
            el.set_attribute(name, value);
        }
    }

    pub fn write_end_element(&mut self) {
        let Some(el) = self.stack.pop() else {
            return;
        };
        match self.stack.last_mut() {
            Some(parent) => parent.children.push(el),
            None => self.roots.push(el),
        }
    }

    /// Appends an already built element to the innermost open element.
    pub fn write_element(&mut self, el: XmlElement) {
        match self.stack.last_mut() {
            Some(parent) => parent.children.push(el),
            None => self.roots.push(el),
        }
    }

    /// Closed top-level elements. Fails if an element is still open.
    pub fn finish(self) -> Result<Vec<XmlElement>> {
        if let Some(open) = self.stack.last() {
            return Err(Error::Xml(format!("element '{}' not closed", open.name)));
        }
        Ok(self.roots)
    }
}

/// Cursor over the children of an element.
#[derive(Debug)]
pub struct XmlReader<'a> {
    elements: &'a [XmlElement],
    next: usize,
    current: Option<&'a XmlElement>,
}

impl<'a> XmlReader<'a> {
    /// Reads the children of `parent`.
    pub fn new(parent: &'a XmlElement) -> Self {
        Self::over(&parent.children)
    }

    pub fn over(elements: &'a [XmlElement]) -> Self {
        Self {
            elements,
            next: 0,
            current: None,
        }
    }

    /// Moves to the next sibling element. False at the end.
    pub fn read_next_start_element(&mut self) -> bool {
        self.current = self.elements.get(self.next);
        if self.current.is_some() {
            self.next += 1;
        }
        self.current.is_some()
    }

    pub fn current(&self) -> Option<&'a XmlElement> {
        self.current
    }

    pub fn name(&self) -> &'a str {
        self.current.map(|e| e.name.as_str()).unwrap_or("")
    }

    pub fn attribute(&self, name: &str) -> Option<&'a str> {
        self.current.and_then(|e| e.attribute(name))
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    /// Reader over the children of the current element.
    pub fn children(&self) -> XmlReader<'a> {
        match self.current {
            Some(e) => XmlReader::new(e),
            None => XmlReader::over(&[]),
        }
    }

    /// Leaves the current element without reading its children.
    pub fn skip_current_element(&mut self) {
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writer_builds_nested_tree() {
        let mut w = XmlWriter::new();
        w.write_start_element("objects");
        w.write_start_element("vertex");
        w.write_attribute("id", "3");
        w.write_attribute("position", "1 2");
        w.write_end_element();
        w.write_end_element();
        let roots = w.finish().unwrap();
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].children[0].attribute("position"), Some("1 2"));
    }

    #[test]
    fn unclosed_element_is_an_error() {
        let mut w = XmlWriter::new();
        w.write_start_element("objects");
        assert!(w.finish().is_err());
    }

    #[test]
    fn text_round_trip_escapes_attributes() {
        let mut root = XmlElement::new("vec");
        let mut child = XmlElement::new("face");
        child.set_attribute("cycles", "[e1+ e2-] <a & b>");
        root.children.push(child);
        let text = root.to_xml_string().unwrap();
        assert!(text.contains("&lt;a &amp; b&gt;"));
        assert_eq!(XmlElement::parse(&text).unwrap(), root);
    }

    #[test]
    fn reader_walks_siblings() {
        let root = XmlElement::parse(r#"<objects><vertex id="1"/><edge id="2"><x/></edge></objects>"#).unwrap();
        let mut r = XmlReader::new(&root);
        assert!(r.read_next_start_element());
        assert_eq!(r.name(), "vertex");
        assert_eq!(r.attribute("id"), Some("1"));
        assert!(r.read_next_start_element());
        assert_eq!(r.name(), "edge");
        assert!(r.children().read_next_start_element());
        r.skip_current_element();
        assert!(!r.read_next_start_element());
        assert_eq!(root.find("x").map(|e| e.name.as_str()), Some("x"));
    }

    #[test]
    fn malformed_text_fails() {
        assert!(XmlElement::parse("<a><b></a>").is_err());
        assert!(XmlElement::parse("").is_err());
    }
}
