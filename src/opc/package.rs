/// The in-memory representation of an OPC package.
///
/// A package is a tree of XML parts plus binary media parts plus a
/// relationship graph. The model guarantees the graph and the part table
/// stay consistent across structural mutation: adding a media part also adds
/// its relationship entry, and removing a part removes every relationship
/// that names it.
use crate::opc::constants::{content_type as ct, namespace as ns, relationship_type as rt};
use crate::opc::content_types::ContentTypes;
use crate::opc::error::{OpcError, Result};
use crate::opc::packuri::{CONTENT_TYPES_URI, PACKAGE_URI, PackUri};
use crate::opc::part::Part;
use crate::opc::phys::{PhysReader, PhysWriter};
use crate::opc::rel::Relationships;
use crate::xml::XmlNode;
use std::collections::HashMap;
use std::path::Path;

/// Partname of the main document part created by `create_empty`.
pub const MAIN_DOCUMENT_PARTNAME: &str = "/word/document.xml";

/// An OPC package held fully in memory.
#[derive(Debug)]
pub struct Package {
    /// All parts in the package, indexed by partname
    parts: HashMap<String, Part>,

    /// Package-level relationships
    rels: Relationships,
}

impl Package {
    /// Open an OPC package from a file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let phys = PhysReader::open(path)?;
        Self::unmarshal(phys)
    }

    /// Load an OPC package from an in-memory ZIP archive.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let phys = PhysReader::from_bytes(data)?;
        Self::unmarshal(phys)
    }

    /// Create a minimal WordprocessingML package: a main document part with
    /// an empty body, related from the package level.
    pub fn create_empty() -> Self {
        let document = XmlNode::new("w:document")
            .with_attr("xmlns:w", ns::WML_MAIN)
            .with_attr("xmlns:r", ns::OFC_RELATIONSHIPS)
            .with_attr("xmlns:wp", ns::DML_WORDPROCESSING_DRAWING)
            .with_attr("xmlns:a", ns::DML_MAIN)
            .with_attr("xmlns:pic", ns::DML_PICTURE)
            .with_child(XmlNode::new("w:body"));

        let partname = PackUri::new(MAIN_DOCUMENT_PARTNAME).expect("static partname");
        let part = Part::new_xml(partname.clone(), ct::WML_DOCUMENT_MAIN, document);

        let mut package = Self {
            parts: HashMap::new(),
            rels: Relationships::new(PACKAGE_URI.to_string()),
        };
        package.parts.insert(partname.to_string(), part);
        package
            .rels
            .get_or_add(rt::OFFICE_DOCUMENT, partname.membername());
        package
    }

    /// Deserialize a package from its physical members.
    fn unmarshal(phys: PhysReader) -> Result<Self> {
        let content_types_blob = phys
            .blob_for(&PackUri::new(CONTENT_TYPES_URI).expect("static partname"))
            .ok_or_else(|| OpcError::Malformed("missing [Content_Types].xml".to_string()))?;
        let content_types = ContentTypes::parse(content_types_blob)?;

        let mut parts = HashMap::new();
        for (membername, blob) in phys.iter() {
            if membername == CONTENT_TYPES_URI.trim_start_matches('/')
                || is_rels_member(membername)
            {
                continue;
            }
            let partname = PackUri::new(format!("/{membername}"))
                .map_err(OpcError::InvalidPackUri)?;
            let content_type = content_types.content_type_for(&partname)?.to_string();
            let part = Part::load(partname.clone(), content_type, blob.to_vec())?;
            parts.insert(partname.to_string(), part);
        }

        let package_uri = PackUri::new(PACKAGE_URI).expect("static partname");
        let mut rels = Relationships::new(PACKAGE_URI.to_string());
        load_rels(&phys, &package_uri, &mut rels)?;

        for part in parts.values_mut() {
            let partname = part.partname().clone();
            load_rels(&phys, &partname, part.rels_mut())?;
        }

        Ok(Self { parts, rels })
    }

    /// Get a part by its partname.
    pub fn part(&self, partname: &PackUri) -> Option<&Part> {
        self.parts.get(partname.as_str())
    }

    /// Get a mutable reference to a part by its partname.
    pub fn part_mut(&mut self, partname: &PackUri) -> Option<&mut Part> {
        self.parts.get_mut(partname.as_str())
    }

    /// Check if a part exists in the package.
    pub fn contains_part(&self, partname: &PackUri) -> bool {
        self.parts.contains_key(partname.as_str())
    }

    /// Iterate over all parts in the package.
    pub fn iter_parts(&self) -> impl Iterator<Item = &Part> {
        self.parts.values()
    }

    /// Iterate mutably over all parts in the package.
    pub fn iter_parts_mut(&mut self) -> impl Iterator<Item = &mut Part> {
        self.parts.values_mut()
    }

    /// Get the number of parts in the package.
    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    /// Get a reference to the package-level relationships.
    pub fn rels(&self) -> &Relationships {
        &self.rels
    }

    /// Get a mutable reference to the package-level relationships.
    pub fn rels_mut(&mut self) -> &mut Relationships {
        &mut self.rels
    }

    /// The partname of the main document part, resolved through the
    /// officeDocument package relationship.
    pub fn main_document_partname(&self) -> Result<PackUri> {
        let rel = self
            .rels
            .first_with_reltype(rt::OFFICE_DOCUMENT)
            .ok_or_else(|| {
                OpcError::RelationshipNotFound(rt::OFFICE_DOCUMENT.to_string())
            })?;
        rel.target_partname().ok_or_else(|| {
            OpcError::Malformed("officeDocument relationship is external".to_string())
        })
    }

    /// Get a reference to the main document part.
    pub fn main_document_part(&self) -> Result<&Part> {
        let partname = self.main_document_partname()?;
        self.part(&partname)
            .ok_or_else(|| OpcError::PartNotFound(partname.to_string()))
    }

    /// Get a mutable reference to the main document part.
    pub fn main_document_part_mut(&mut self) -> Result<&mut Part> {
        let partname = self.main_document_partname()?;
        self.parts
            .get_mut(partname.as_str())
            .ok_or_else(|| OpcError::PartNotFound(partname.to_string()))
    }

    /// Add a part to the package, replacing any existing part with the same
    /// partname.
    pub fn add_part(&mut self, part: Part) {
        self.parts.insert(part.partname().to_string(), part);
    }

    /// Remove a part, dropping every relationship entry that names it.
    pub fn remove_part(&mut self, partname: &PackUri) -> Option<Part> {
        let removed = self.parts.remove(partname.as_str())?;
        self.rels.remove_targeting(partname);
        for part in self.parts.values_mut() {
            part.rels_mut().remove_targeting(partname);
        }
        Some(removed)
    }

    /// Add a new media part under /word/media and relate it from the main
    /// document part in one operation.
    ///
    /// Returns the rId minted on the main document part. The part table and
    /// the relationship graph are never left inconsistent with each other.
    pub fn add_media_part(&mut self, blob: Vec<u8>, content_type: &str) -> Result<String> {
        let ext = match content_type {
            ct::PNG => "png",
            ct::JPEG => "jpeg",
            other => {
                return Err(OpcError::Malformed(format!(
                    "non-canonical media content type '{other}'"
                )));
            }
        };

        let partname = self.next_media_partname(ext)?;
        self.add_part(Part::new_binary(partname.clone(), content_type, blob));

        let main = self.main_document_part_mut()?;
        Ok(main.relate_to(&partname, rt::IMAGE))
    }

    /// Find the next free /word/media/imageN partname for the extension.
    fn next_media_partname(&self, ext: &str) -> Result<PackUri> {
        for n in 1u32..=10_000 {
            let candidate = format!("/word/media/image{n}.{ext}");
            if !self.parts.contains_key(&candidate) {
                return PackUri::new(candidate).map_err(OpcError::InvalidPackUri);
            }
        }
        Err(OpcError::Malformed(
            "too many media parts, cannot mint next partname".to_string(),
        ))
    }

    /// Serialize the package to ZIP archive bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut content_types = ContentTypes::new();
        for part in self.parts.values() {
            content_types.add(part.partname(), part.content_type());
        }

        let mut phys = PhysWriter::new();
        let content_types_uri = PackUri::new(CONTENT_TYPES_URI).expect("static partname");
        phys.write(&content_types_uri, content_types.to_xml().as_bytes())?;

        let package_uri = PackUri::new(PACKAGE_URI).expect("static partname");
        let pkg_rels_uri = package_uri.rels_uri().map_err(OpcError::InvalidPackUri)?;
        phys.write(&pkg_rels_uri, self.rels.to_xml().as_bytes())?;

        let mut partnames: Vec<&String> = self.parts.keys().collect();
        partnames.sort();
        for partname in partnames {
            let part = &self.parts[partname];
            phys.write(part.partname(), &part.to_blob()?)?;
            if !part.rels().is_empty() {
                let rels_uri = part
                    .partname()
                    .rels_uri()
                    .map_err(OpcError::InvalidPackUri)?;
                phys.write(&rels_uri, part.rels().to_xml().as_bytes())?;
            }
        }

        phys.finish()
    }

    /// Save the package to a file.
    ///
    /// The archive is written to a temporary sibling path and renamed into
    /// place, so a failed save never leaves a partially-written package
    /// discoverable at the target path.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.to_bytes()?;

        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = std::path::PathBuf::from(tmp);

        std::fs::write(&tmp, &bytes)?;
        match std::fs::rename(&tmp, path) {
            Ok(()) => Ok(()),
            Err(e) => {
                let _ = std::fs::remove_file(&tmp);
                Err(e.into())
            }
        }
    }
}

/// Membernames under any _rels directory hold relationship XML, not parts.
fn is_rels_member(membername: &str) -> bool {
    membername.starts_with("_rels/") || membername.contains("/_rels/")
}

/// Load the .rels member for a source URI into a relationships collection.
fn load_rels(phys: &PhysReader, source: &PackUri, rels: &mut Relationships) -> Result<()> {
    let rels_uri = source.rels_uri().map_err(OpcError::InvalidPackUri)?;
    let Some(blob) = phys.blob_for(&rels_uri) else {
        return Ok(());
    };

    let root = XmlNode::parse(blob)?;
    for child in root.child_elements() {
        if child.local_name() != "Relationship" {
            continue;
        }
        let (Some(r_id), Some(reltype), Some(target)) = (
            child.attr("Id"),
            child.attr("Type"),
            child.attr("Target"),
        ) else {
            return Err(OpcError::Malformed(format!(
                "incomplete relationship in '{rels_uri}'"
            )));
        };
        let is_external = child.attr("TargetMode") == Some("External");
        rels.add_relationship(
            reltype.to_string(),
            target.to_string(),
            r_id.to_string(),
            is_external,
        );
    }
    Ok(())
}
