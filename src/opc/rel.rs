use crate::opc::packuri::PackUri;
/// Relationship-related objects for OPC packages.
///
/// The relationship graph is represented as an explicit adjacency map keyed by
/// relationship ID, so that structural mutation (deleting a part, dropping a
/// reference) is a local map edit with no live pointers to clean up.
use std::collections::HashMap;

/// A single relationship from a source part to a target.
///
/// Identified by an rId. Can be either internal (pointing to another part) or
/// external (pointing to a URL outside the package).
#[derive(Debug, Clone)]
pub struct Relationship {
    /// Relationship ID (e.g., "rId1", "rId2")
    r_id: String,

    /// Relationship type URI
    reltype: String,

    /// Target reference - either a relative part reference or an external URL
    target_ref: String,

    /// Base URI for resolving relative references
    base_uri: String,

    /// Whether this is an external relationship
    is_external: bool,
}

impl Relationship {
    pub fn new(
        r_id: String,
        reltype: String,
        target_ref: String,
        base_uri: String,
        is_external: bool,
    ) -> Self {
        Self {
            r_id,
            reltype,
            target_ref,
            base_uri,
            is_external,
        }
    }

    /// Get the relationship ID.
    #[inline]
    pub fn r_id(&self) -> &str {
        &self.r_id
    }

    /// Get the relationship type.
    #[inline]
    pub fn reltype(&self) -> &str {
        &self.reltype
    }

    /// Get the target reference.
    #[inline]
    pub fn target_ref(&self) -> &str {
        &self.target_ref
    }

    /// Check if this is an external relationship.
    #[inline]
    pub fn is_external(&self) -> bool {
        self.is_external
    }

    /// Get the absolute target partname for internal relationships.
    ///
    /// Returns None for external relationships and unresolvable references.
    pub fn target_partname(&self) -> Option<PackUri> {
        if self.is_external {
            return None;
        }
        PackUri::from_rel_ref(&self.base_uri, &self.target_ref).ok()
    }
}

/// Collection of relationships from a single source (the package itself or
/// one of its parts).
#[derive(Debug, Clone)]
pub struct Relationships {
    /// Base URI for resolving relative references
    base_uri: String,

    /// Map of relationship ID to Relationship
    rels: HashMap<String, Relationship>,
}

impl Relationships {
    /// Create a new empty relationships collection.
    pub fn new(base_uri: String) -> Self {
        Self {
            base_uri,
            rels: HashMap::new(),
        }
    }

    /// Add a relationship with an explicit rId (used when loading a package).
    pub fn add_relationship(
        &mut self,
        reltype: String,
        target_ref: String,
        r_id: String,
        is_external: bool,
    ) {
        let rel = Relationship::new(
            r_id.clone(),
            reltype,
            target_ref,
            self.base_uri.clone(),
            is_external,
        );
        self.rels.insert(r_id, rel);
    }

    /// Get a relationship by its ID.
    #[inline]
    pub fn get(&self, r_id: &str) -> Option<&Relationship> {
        self.rels.get(r_id)
    }

    /// Get or add an internal relationship to a target, returning its rId.
    ///
    /// If a relationship of the given type to the target already exists, its
    /// rId is reused. Otherwise a new one is minted with the next free rId.
    pub fn get_or_add(&mut self, reltype: &str, target_ref: &str) -> String {
        for rel in self.rels.values() {
            if rel.reltype() == reltype && rel.target_ref() == target_ref && !rel.is_external() {
                return rel.r_id().to_string();
            }
        }

        let r_id = self.next_r_id();
        self.add_relationship(
            reltype.to_string(),
            target_ref.to_string(),
            r_id.clone(),
            false,
        );
        r_id
    }

    /// Get the next available relationship ID.
    ///
    /// Generates IDs in the format "rId1", "rId2", etc., filling in gaps if
    /// any exist.
    fn next_r_id(&self) -> String {
        let mut used: Vec<u32> = self
            .rels
            .keys()
            .filter_map(|r_id| r_id.strip_prefix("rId")?.parse::<u32>().ok())
            .collect();
        used.sort_unstable();

        let mut next = 1u32;
        for &num in &used {
            match num.cmp(&next) {
                std::cmp::Ordering::Equal => next += 1,
                std::cmp::Ordering::Greater => break,
                std::cmp::Ordering::Less => {}
            }
        }
        format!("rId{next}")
    }

    /// Get the first relationship of a specific type, if any.
    pub fn first_with_reltype(&self, reltype: &str) -> Option<&Relationship> {
        self.rels.values().find(|rel| rel.reltype() == reltype)
    }

    /// Iterate over all relationships.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Relationship> {
        self.rels.values()
    }

    /// Get the number of relationships in the collection.
    #[inline]
    pub fn len(&self) -> usize {
        self.rels.len()
    }

    /// Check if the collection is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rels.is_empty()
    }

    /// Remove a relationship by its ID.
    pub fn remove(&mut self, r_id: &str) -> Option<Relationship> {
        self.rels.remove(r_id)
    }

    /// Remove every relationship matching the predicate, returning the
    /// removed rIds. Used by output sanitization to drop hyperlink and
    /// external relationships wholesale.
    pub fn remove_matching(&mut self, pred: impl Fn(&Relationship) -> bool) -> Vec<String> {
        let doomed: Vec<String> = self
            .rels
            .values()
            .filter(|rel| pred(rel))
            .map(|rel| rel.r_id().to_string())
            .collect();
        for r_id in &doomed {
            self.rels.remove(r_id);
        }
        doomed
    }

    /// Remove every relationship whose target resolves to the given partname.
    pub fn remove_targeting(&mut self, partname: &PackUri) -> Vec<String> {
        self.remove_matching(|rel| rel.target_partname().as_ref() == Some(partname))
    }

    /// Serialize relationships to the XML format of a .rels part.
    ///
    /// Relationships are sorted by rId for deterministic output.
    pub fn to_xml(&self) -> String {
        let mut xml = String::with_capacity(1024);

        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        xml.push('\n');
        xml.push_str(
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
        );
        xml.push('\n');

        let mut rels: Vec<&Relationship> = self.rels.values().collect();
        rels.sort_by_key(|rel| rel.r_id());

        for rel in rels {
            let target_mode = if rel.is_external() {
                r#" TargetMode="External""#
            } else {
                ""
            };
            xml.push_str(&format!(
                r#"  <Relationship Id="{}" Type="{}" Target="{}"{}/>"#,
                escape_xml(rel.r_id()),
                escape_xml(rel.reltype()),
                escape_xml(rel.target_ref()),
                target_mode
            ));
            xml.push('\n');
        }

        xml.push_str("</Relationships>");
        xml
    }
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opc::constants::relationship_type as rt;

    #[test]
    fn test_next_r_id_fills_gaps() {
        let mut rels = Relationships::new("/word".to_string());
        rels.add_relationship("t".into(), "a.xml".into(), "rId1".into(), false);
        rels.add_relationship("t".into(), "b.xml".into(), "rId3".into(), false);

        assert_eq!(rels.next_r_id(), "rId2");
    }

    #[test]
    fn test_get_or_add_reuses_existing() {
        let mut rels = Relationships::new("/word".to_string());

        let r1 = rels.get_or_add(rt::IMAGE, "media/image1.png");
        let r2 = rels.get_or_add(rt::IMAGE, "media/image1.png");
        assert_eq!(r1, r2);

        let r3 = rels.get_or_add(rt::IMAGE, "media/image2.png");
        assert_ne!(r1, r3);
    }

    #[test]
    fn test_target_partname() {
        let mut rels = Relationships::new("/word".to_string());
        rels.add_relationship(
            rt::IMAGE.to_string(),
            "media/image1.png".to_string(),
            "rId1".to_string(),
            false,
        );

        let partname = rels.get("rId1").unwrap().target_partname().unwrap();
        assert_eq!(partname.as_str(), "/word/media/image1.png");
    }

    #[test]
    fn test_remove_matching_externals() {
        let mut rels = Relationships::new("/word".to_string());
        rels.add_relationship(
            rt::HYPERLINK.to_string(),
            "https://example.com".to_string(),
            "rId1".to_string(),
            true,
        );
        rels.add_relationship(
            rt::IMAGE.to_string(),
            "media/image1.png".to_string(),
            "rId2".to_string(),
            false,
        );

        let removed = rels.remove_matching(|rel| rel.is_external());
        assert_eq!(removed, ["rId1"]);
        assert_eq!(rels.len(), 1);
        assert!(rels.get("rId2").is_some());
    }

    #[test]
    fn test_to_xml_marks_external() {
        let mut rels = Relationships::new("/".to_string());
        rels.add_relationship(
            rt::HYPERLINK.to_string(),
            "https://example.com/?a=1&b=2".to_string(),
            "rId1".to_string(),
            true,
        );

        let xml = rels.to_xml();
        assert!(xml.contains(r#"TargetMode="External""#));
        assert!(xml.contains("&amp;b=2"));
    }
}
