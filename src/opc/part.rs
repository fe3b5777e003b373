/// Package parts: the fundamental units of content in an OPC package.
///
/// Each part has a unique partname, a content type, relationships to other
/// parts, and either a mutable XML tree (for +xml content types) or raw
/// binary content (media). Keeping XML parts materialized as trees is what
/// lets the assembly passes clone and rewrite structure in place.
use crate::opc::error::Result;
use crate::opc::packuri::PackUri;
use crate::opc::rel::Relationships;
use crate::xml::XmlNode;

/// The content held by a part.
#[derive(Debug, Clone)]
pub enum PartContent {
    /// A parsed XML tree (document, styles, headers, ...)
    Xml(XmlNode),

    /// Raw binary content (embedded media)
    Binary(Vec<u8>),
}

/// A part within an OPC package.
#[derive(Debug, Clone)]
pub struct Part {
    partname: PackUri,
    content_type: String,
    content: PartContent,
    rels: Relationships,
}

impl Part {
    /// Create a part holding an XML tree.
    pub fn new_xml(partname: PackUri, content_type: impl Into<String>, root: XmlNode) -> Self {
        let rels = Relationships::new(partname.base_uri().to_string());
        Self {
            partname,
            content_type: content_type.into(),
            content: PartContent::Xml(root),
            rels,
        }
    }

    /// Create a part holding binary content.
    pub fn new_binary(partname: PackUri, content_type: impl Into<String>, blob: Vec<u8>) -> Self {
        let rels = Relationships::new(partname.base_uri().to_string());
        Self {
            partname,
            content_type: content_type.into(),
            content: PartContent::Binary(blob),
            rels,
        }
    }

    /// Load a part from raw bytes, parsing it when the content type is XML.
    pub fn load(partname: PackUri, content_type: String, blob: Vec<u8>) -> Result<Self> {
        if is_xml_content_type(&content_type) {
            let root = XmlNode::parse(&blob)?;
            Ok(Self::new_xml(partname, content_type, root))
        } else {
            Ok(Self::new_binary(partname, content_type, blob))
        }
    }

    #[inline]
    pub fn partname(&self) -> &PackUri {
        &self.partname
    }

    #[inline]
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// The XML root of this part, if it is an XML part.
    pub fn xml(&self) -> Option<&XmlNode> {
        match &self.content {
            PartContent::Xml(root) => Some(root),
            PartContent::Binary(_) => None,
        }
    }

    /// Mutable access to the XML root of this part.
    pub fn xml_mut(&mut self) -> Option<&mut XmlNode> {
        match &mut self.content {
            PartContent::Xml(root) => Some(root),
            PartContent::Binary(_) => None,
        }
    }

    /// The binary content of this part, if it is a binary part.
    pub fn binary(&self) -> Option<&[u8]> {
        match &self.content {
            PartContent::Binary(blob) => Some(blob),
            PartContent::Xml(_) => None,
        }
    }

    /// Whether this part holds embedded image media.
    #[inline]
    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }

    /// Serialize the part content to the bytes stored in the package.
    pub fn to_blob(&self) -> Result<Vec<u8>> {
        match &self.content {
            PartContent::Xml(root) => Ok(root.to_document_bytes()?),
            PartContent::Binary(blob) => Ok(blob.clone()),
        }
    }

    #[inline]
    pub fn rels(&self) -> &Relationships {
        &self.rels
    }

    #[inline]
    pub fn rels_mut(&mut self) -> &mut Relationships {
        &mut self.rels
    }

    /// Add or reuse a relationship from this part to a target part,
    /// returning the rId.
    pub fn relate_to(&mut self, target: &PackUri, reltype: &str) -> String {
        let target_ref = target.relative_ref(self.partname.base_uri());
        self.rels.get_or_add(reltype, &target_ref)
    }
}

/// Check if a content type represents XML content.
#[inline]
pub fn is_xml_content_type(content_type: &str) -> bool {
    content_type.ends_with("+xml") || content_type.ends_with("/xml")
}
