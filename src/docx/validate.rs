//! Structural validation of an assembled package.
//!
//! The checks mirror the normalization rules: anything the normalizer is
//! supposed to have rewritten away is a violation if it survives. Violations
//! are findings, not errors; the finalizer decides what to do with them.

use crate::docx::fragment::body_of;
use crate::opc::error::Result;
use crate::opc::package::Package;
use crate::xml::XmlNode;
use std::fmt;

/// One structural defect found in a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// A drawing still uses floating (anchored) placement.
    AnchoredDrawing { partname: String },
    /// Legacy VML shape or pict markup survived stripping.
    LegacyShape { partname: String },
    /// A blip references a relationship that is absent or does not lead to
    /// an image part in this package.
    DanglingImageRef { partname: String, r_id: String },
    /// The main document body's last child is not `w:sectPr`.
    SectPrNotLast,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::AnchoredDrawing { partname } => {
                write!(f, "anchored drawing in {partname}")
            }
            Violation::LegacyShape { partname } => {
                write!(f, "legacy vector-shape markup in {partname}")
            }
            Violation::DanglingImageRef { partname, r_id } => {
                write!(f, "dangling image reference {r_id} in {partname}")
            }
            Violation::SectPrNotLast => {
                write!(f, "main document body does not end with a section break")
            }
        }
    }
}

/// Run every structural check over the package. An empty vector means the
/// package satisfies all of the assembly engine's output guarantees.
pub fn validate(package: &Package) -> Result<Vec<Violation>> {
    let mut violations = Vec::new();

    for part in package.iter_parts() {
        let Some(root) = part.xml() else { continue };
        let partname = part.partname().to_string();

        for drawing in root.find_descendants("drawing") {
            if drawing.first_child("anchor").is_some() {
                violations.push(Violation::AnchoredDrawing {
                    partname: partname.clone(),
                });
            }
        }
        if has_legacy_markup(root) {
            violations.push(Violation::LegacyShape {
                partname: partname.clone(),
            });
        }
        for blip in root.find_descendants("blip") {
            if let Some(r_id) = dangling_ref(package, part.partname(), blip) {
                violations.push(Violation::DanglingImageRef {
                    partname: partname.clone(),
                    r_id,
                });
            }
        }
    }

    let body = body_of(package)?;
    let last_is_sect_pr = body
        .child_elements()
        .last()
        .is_some_and(|e| e.local_name() == "sectPr");
    if !last_is_sect_pr {
        violations.push(Violation::SectPrNotLast);
    }

    Ok(violations)
}

fn has_legacy_markup(root: &XmlNode) -> bool {
    !root.find_descendants("shape").is_empty()
        || !root.find_descendants("imagedata").is_empty()
        || !root.find_descendants("pict").is_empty()
}

/// Returns the offending rId when the blip's embed reference does not lead
/// to an image part of this package.
fn dangling_ref(
    package: &Package,
    partname: &crate::opc::packuri::PackUri,
    blip: &XmlNode,
) -> Option<String> {
    let r_id = blip.attr("embed").unwrap_or("");
    if r_id.is_empty() {
        return Some("<missing>".to_string());
    }
    let part = package.part(partname)?;
    let resolved = part
        .rels()
        .get(r_id)
        .and_then(|rel| rel.target_partname())
        .and_then(|target| package.part(&target))
        .is_some_and(|target| target.is_image());
    if resolved { None } else { Some(r_id.to_string()) }
}
