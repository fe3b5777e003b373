//! Owned, mutable XML element tree for package parts.
//!
//! The assembly engine clones fragments across packages and rewrites them in
//! place, so parts are held as fully materialized trees rather than parsed on
//! demand. Parsing and serialization go through quick-xml; qualified names are
//! kept verbatim (including their namespace prefix) and all structural
//! matching is done on the local name.

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::escape::unescape;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum XmlError {
    #[error("XML parse error: {0}")]
    Parse(String),

    #[error("XML write error: {0}")]
    Write(String),

    #[error("document has no root element")]
    NoRoot,

    #[error("UTF-8 conversion error: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

pub type Result<T> = std::result::Result<T, XmlError>;

/// One child slot of an element: either a nested element or a text node.
#[derive(Debug, Clone, PartialEq)]
pub enum XmlChild {
    Element(XmlNode),
    Text(String),
}

/// An XML element with its qualified name, attributes, and children.
///
/// Attribute values and text content are stored unescaped; escaping is applied
/// on serialization. Deep cloning a node (`Clone`) yields a structurally
/// independent copy, which is how fragments acquire new identity when copied
/// between packages.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlNode {
    /// Qualified tag name as it appears in the source (e.g. "w:tbl")
    pub name: String,

    /// Attributes in document order, qualified name -> unescaped value
    pub attrs: Vec<(String, String)>,

    /// Child elements and text nodes in document order
    pub children: Vec<XmlChild>,
}

impl XmlNode {
    /// Create a new element with no attributes or children.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder-style: add an attribute.
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push((name.into(), value.into()));
        self
    }

    /// Builder-style: append a child element.
    pub fn with_child(mut self, child: XmlNode) -> Self {
        self.children.push(XmlChild::Element(child));
        self
    }

    /// Builder-style: append a text node.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(XmlChild::Text(text.into()));
        self
    }

    /// Get the local part of the qualified name ("tbl" for "w:tbl").
    #[inline]
    pub fn local_name(&self) -> &str {
        match self.name.rfind(':') {
            Some(pos) => &self.name[pos + 1..],
            None => &self.name,
        }
    }

    /// Look up an attribute by local name, ignoring any namespace prefix.
    ///
    /// OOXML uses a handful of well-known prefixes (`w:`, `r:`, `wp:`), but a
    /// producing application is free to rebind them, so matching on the local
    /// name is the robust choice.
    pub fn attr(&self, local: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(name, _)| local_of(name) == local)
            .map(|(_, value)| value.as_str())
    }

    /// Set an attribute, replacing an existing one with the same local name.
    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let local = local_of(name);
        if let Some(slot) = self.attrs.iter_mut().find(|(n, _)| local_of(n) == local) {
            slot.1 = value.into();
        } else {
            self.attrs.push((name.to_string(), value.into()));
        }
    }

    /// Remove an attribute by local name. Returns true if one was removed.
    pub fn remove_attr(&mut self, local: &str) -> bool {
        let before = self.attrs.len();
        self.attrs.retain(|(name, _)| local_of(name) != local);
        self.attrs.len() != before
    }

    /// Append a child element.
    pub fn push_child(&mut self, child: XmlNode) {
        self.children.push(XmlChild::Element(child));
    }

    /// Append a text node.
    pub fn push_text(&mut self, text: impl Into<String>) {
        self.children.push(XmlChild::Text(text.into()));
    }

    /// Iterate over direct child elements.
    pub fn child_elements(&self) -> impl Iterator<Item = &XmlNode> {
        self.children.iter().filter_map(|c| match c {
            XmlChild::Element(e) => Some(e),
            XmlChild::Text(_) => None,
        })
    }

    /// Iterate mutably over direct child elements.
    pub fn child_elements_mut(&mut self) -> impl Iterator<Item = &mut XmlNode> {
        self.children.iter_mut().filter_map(|c| match c {
            XmlChild::Element(e) => Some(e),
            XmlChild::Text(_) => None,
        })
    }

    /// Find the first direct child element with the given local name.
    pub fn first_child(&self, local: &str) -> Option<&XmlNode> {
        self.child_elements().find(|e| e.local_name() == local)
    }

    /// Find the first direct child element with the given local name, mutably.
    pub fn first_child_mut(&mut self, local: &str) -> Option<&mut XmlNode> {
        self.child_elements_mut().find(|e| e.local_name() == local)
    }

    /// Collect all descendant elements (excluding self) with the given local
    /// name, in document order.
    pub fn find_descendants(&self, local: &str) -> Vec<&XmlNode> {
        let mut found = Vec::new();
        self.collect_descendants(local, &mut found);
        found
    }

    fn collect_descendants<'a>(&'a self, local: &str, found: &mut Vec<&'a XmlNode>) {
        for child in self.child_elements() {
            if child.local_name() == local {
                found.push(child);
            }
            child.collect_descendants(local, found);
        }
    }

    /// Visit every descendant element (excluding self) mutably, depth-first.
    pub fn for_each_descendant_mut(&mut self, f: &mut impl FnMut(&mut XmlNode)) {
        for child in self.child_elements_mut() {
            f(child);
            child.for_each_descendant_mut(f);
        }
    }

    /// Remove every descendant element matching the predicate, at any depth.
    /// Returns the number of elements removed.
    pub fn remove_descendants(&mut self, pred: &impl Fn(&XmlNode) -> bool) -> usize {
        let mut removed = 0;
        self.children.retain(|c| match c {
            XmlChild::Element(e) if pred(e) => {
                removed += 1;
                false
            }
            _ => true,
        });
        for child in self.child_elements_mut() {
            removed += child.remove_descendants(pred);
        }
        removed
    }

    /// Concatenated text of all descendant text nodes, in document order.
    pub fn collect_text(&self) -> String {
        let mut out = String::new();
        self.append_text(&mut out);
        out
    }

    fn append_text(&self, out: &mut String) {
        for child in &self.children {
            match child {
                XmlChild::Text(t) => out.push_str(t),
                XmlChild::Element(e) => e.append_text(out),
            }
        }
    }

    /// Parse an XML document into its root element.
    ///
    /// Comments, processing instructions, and the XML declaration are
    /// discarded; a fresh declaration is emitted on serialization.
    pub fn parse(bytes: &[u8]) -> Result<XmlNode> {
        let mut reader = Reader::from_reader(bytes);
        let mut buf = Vec::new();
        let mut stack: Vec<XmlNode> = Vec::new();
        let mut root: Option<XmlNode> = None;

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) => {
                    stack.push(node_from_start(e)?);
                }
                Ok(Event::Empty(ref e)) => {
                    let node = node_from_start(e)?;
                    attach(&mut stack, &mut root, node);
                }
                Ok(Event::End(_)) => {
                    let node = stack.pop().ok_or_else(|| {
                        XmlError::Parse("unbalanced end tag".to_string())
                    })?;
                    attach(&mut stack, &mut root, node);
                }
                Ok(Event::Text(ref e)) => {
                    if let Some(parent) = stack.last_mut() {
                        let raw = std::str::from_utf8(e.as_ref())?;
                        let text = unescape(raw)
                            .map_err(|e| XmlError::Parse(e.to_string()))?;
                        parent.children.push(XmlChild::Text(text.into_owned()));
                    }
                }
                Ok(Event::CData(ref e)) => {
                    if let Some(parent) = stack.last_mut() {
                        let text = std::str::from_utf8(e.as_ref())?.to_string();
                        parent.children.push(XmlChild::Text(text));
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => return Err(XmlError::Parse(e.to_string())),
            }
            buf.clear();
        }

        root.ok_or(XmlError::NoRoot)
    }

    /// Serialize this element as a standalone XML document.
    pub fn to_document_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = Writer::new(Vec::new());
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))
            .map_err(|e| XmlError::Write(e.to_string()))?;
        self.write_into(&mut writer)?;
        Ok(writer.into_inner())
    }

    fn write_into(&self, writer: &mut Writer<Vec<u8>>) -> Result<()> {
        let mut start = BytesStart::new(self.name.as_str());
        for (name, value) in &self.attrs {
            start.push_attribute((name.as_str(), value.as_str()));
        }

        if self.children.is_empty() {
            writer
                .write_event(Event::Empty(start))
                .map_err(|e| XmlError::Write(e.to_string()))?;
            return Ok(());
        }

        writer
            .write_event(Event::Start(start))
            .map_err(|e| XmlError::Write(e.to_string()))?;
        for child in &self.children {
            match child {
                XmlChild::Element(e) => e.write_into(writer)?,
                XmlChild::Text(t) => writer
                    .write_event(Event::Text(BytesText::new(t)))
                    .map_err(|e| XmlError::Write(e.to_string()))?,
            }
        }
        writer
            .write_event(Event::End(BytesEnd::new(self.name.as_str())))
            .map_err(|e| XmlError::Write(e.to_string()))?;
        Ok(())
    }
}

/// Local part of a qualified name.
#[inline]
fn local_of(name: &str) -> &str {
    match name.rfind(':') {
        Some(pos) => &name[pos + 1..],
        None => name,
    }
}

fn node_from_start(e: &BytesStart<'_>) -> Result<XmlNode> {
    let name = std::str::from_utf8(e.name().as_ref())?.to_string();
    let mut node = XmlNode::new(name);
    for attr in e.attributes() {
        let attr = attr.map_err(|e| XmlError::Parse(e.to_string()))?;
        let key = std::str::from_utf8(attr.key.as_ref())?.to_string();
        let value = attr
            .unescape_value()
            .map_err(|e| XmlError::Parse(e.to_string()))?
            .into_owned();
        node.attrs.push((key, value));
    }
    Ok(node)
}

fn attach(stack: &mut [XmlNode], root: &mut Option<XmlNode>, node: XmlNode) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(XmlChild::Element(node));
    } else if root.is_none() {
        *root = Some(node);
    }
}
