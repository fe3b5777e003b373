//! Builder and parser for the [Content_Types].xml part.
//!
//! Maps file extensions (Default elements) and individual partnames
//! (Override elements) to content types.

use crate::opc::constants::content_type as ct;
use crate::opc::error::{OpcError, Result};
use crate::opc::packuri::PackUri;
use crate::xml::XmlNode;
use std::collections::HashMap;

/// In-memory form of [Content_Types].xml.
#[derive(Debug, Default)]
pub struct ContentTypes {
    /// Default content types by extension (lowercased)
    defaults: HashMap<String, String>,

    /// Override content types by partname
    overrides: HashMap<String, String>,
}

impl ContentTypes {
    /// Create a map with the standard defaults every package carries.
    pub fn new() -> Self {
        let mut defaults = HashMap::new();
        defaults.insert("rels".to_string(), ct::OPC_RELATIONSHIPS.to_string());
        defaults.insert("xml".to_string(), ct::XML.to_string());
        Self {
            defaults,
            overrides: HashMap::new(),
        }
    }

    /// Parse a [Content_Types].xml part.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let root = XmlNode::parse(bytes)?;
        let mut cti = Self::default();

        for child in root.child_elements() {
            match child.local_name() {
                "Default" => {
                    if let (Some(ext), Some(ctype)) =
                        (child.attr("Extension"), child.attr("ContentType"))
                    {
                        cti.defaults
                            .insert(ext.to_ascii_lowercase(), ctype.to_string());
                    }
                }
                "Override" => {
                    if let (Some(partname), Some(ctype)) =
                        (child.attr("PartName"), child.attr("ContentType"))
                    {
                        cti.overrides
                            .insert(partname.to_string(), ctype.to_string());
                    }
                }
                _ => {}
            }
        }

        Ok(cti)
    }

    /// Look up the content type for a partname.
    ///
    /// Overrides win over extension defaults, per the OPC specification.
    pub fn content_type_for(&self, partname: &PackUri) -> Result<&str> {
        if let Some(ctype) = self.overrides.get(partname.as_str()) {
            return Ok(ctype);
        }
        self.defaults
            .get(&partname.ext().to_ascii_lowercase())
            .map(String::as_str)
            .ok_or_else(|| {
                OpcError::Malformed(format!("no content type for part '{partname}'"))
            })
    }

    /// Register the content type for a part being written.
    ///
    /// Well-known extension/content-type pairs become Default entries;
    /// everything else becomes a partname Override.
    pub fn add(&mut self, partname: &PackUri, content_type: &str) {
        let ext = partname.ext().to_ascii_lowercase();
        if is_default_content_type(&ext, content_type) {
            self.defaults.insert(ext, content_type.to_string());
        } else {
            self.overrides
                .insert(partname.to_string(), content_type.to_string());
        }
    }

    /// Generate the XML for [Content_Types].xml, sorted for deterministic
    /// output.
    pub fn to_xml(&self) -> String {
        let mut xml = String::with_capacity(2048);

        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        xml.push('\n');
        xml.push_str(
            r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
        );
        xml.push('\n');

        let mut exts: Vec<_> = self.defaults.keys().collect();
        exts.sort();
        for ext in exts {
            xml.push_str(&format!(
                r#"  <Default Extension="{}" ContentType="{}"/>"#,
                escape_xml(ext),
                escape_xml(&self.defaults[ext])
            ));
            xml.push('\n');
        }

        let mut partnames: Vec<_> = self.overrides.keys().collect();
        partnames.sort();
        for partname in partnames {
            xml.push_str(&format!(
                r#"  <Override PartName="{}" ContentType="{}"/>"#,
                escape_xml(partname),
                escape_xml(&self.overrides[partname])
            ));
            xml.push('\n');
        }

        xml.push_str("</Types>");
        xml
    }
}

/// Check if an extension/content-type pair is a standard default.
fn is_default_content_type(ext: &str, content_type: &str) -> bool {
    matches!(
        (ext, content_type),
        ("rels", ct::OPC_RELATIONSHIPS)
            | ("xml", ct::XML)
            | ("png", ct::PNG)
            | ("jpg", ct::JPEG)
            | ("jpeg", ct::JPEG)
    )
}

/// Escape XML special characters.
#[inline]
fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
