//! Output-package finalization.
//!
//! Every assembled package passes through here exactly once before it is
//! written to disk. Finalization fills in the supporting parts mainstream
//! readers expect (styles, settings, document properties), seals the body
//! with a trailing section break, scrubs the relationship graph of anything
//! pointing outside the package, and runs the structural validator with one
//! repair pass. Residual violations are logged and the package is saved
//! anyway; a slightly imperfect document beats no document.

use crate::docx::fragment::body_of_mut;
use crate::docx::normalize::normalize_anchoring;
use crate::docx::validate::validate;
use crate::opc::constants::{content_type as ct, namespace as ns, relationship_type as rt};
use crate::opc::error::{OpcError, Result};
use crate::opc::package::Package;
use crate::opc::packuri::PackUri;
use crate::opc::part::Part;
use crate::xml::{XmlChild, XmlNode};
use chrono::Utc;
use std::path::Path;
use tracing::{debug, info, warn};

const STYLES_PARTNAME: &str = "/word/styles.xml";
const SETTINGS_PARTNAME: &str = "/word/settings.xml";
const APP_PROPS_PARTNAME: &str = "/docProps/app.xml";
const CORE_PROPS_PARTNAME: &str = "/docProps/core.xml";

/// A4 page geometry in twips.
const PAGE_WIDTH: &str = "11906";
const PAGE_HEIGHT: &str = "16838";
const PAGE_MARGIN: &str = "720";

/// Default run font and half-point size.
const DEFAULT_FONT: &str = "Calibri";
const DEFAULT_SZ: &str = "22";

/// Finalize the package and save it to `path`.
///
/// Runs the full pipeline: defaults, section break, header/footer drawing
/// removal, relationship sanitization, then validate with one repair pass.
/// Violations that survive the repair are logged at `warn` and the package
/// is saved regardless.
pub fn finalize_and_save(package: &mut Package, path: &Path) -> Result<()> {
    ensure_defaults(package)?;
    ensure_sect_pr_last(package)?;
    strip_header_footer_drawings(package);
    sanitize_relationships(package);

    let violations = validate(package)?;
    if !violations.is_empty() {
        debug!(count = violations.len(), "repairing package before save");
        normalize_anchoring(body_of_mut(package)?);
        for violation in validate(package)? {
            warn!(%violation, "violation survived repair, saving anyway");
        }
    }

    package.save(path)?;
    info!(path = %path.display(), "package saved");
    Ok(())
}

/// Create the supporting parts a reader expects when the template did not
/// already carry them, and force the Word compatibility mode to 15.
pub fn ensure_defaults(package: &mut Package) -> Result<()> {
    let styles_uri = PackUri::new(STYLES_PARTNAME).map_err(OpcError::InvalidPackUri)?;
    if !package.contains_part(&styles_uri) {
        package.add_part(Part::new_xml(
            styles_uri.clone(),
            ct::WML_STYLES,
            default_styles(),
        ));
    }
    let settings_uri = PackUri::new(SETTINGS_PARTNAME).map_err(OpcError::InvalidPackUri)?;
    if !package.contains_part(&settings_uri) {
        package.add_part(Part::new_xml(
            settings_uri.clone(),
            ct::WML_SETTINGS,
            XmlNode::new("w:settings").with_attr("xmlns:w", ns::WML_MAIN),
        ));
    }
    {
        let main = package.main_document_part_mut()?;
        let base = main.partname().base_uri().to_string();
        let styles_ref = styles_uri.relative_ref(&base);
        let settings_ref = settings_uri.relative_ref(&base);
        main.rels_mut().get_or_add(rt::STYLES, &styles_ref);
        main.rels_mut().get_or_add(rt::SETTINGS, &settings_ref);
    }
    force_compatibility_mode(package, &settings_uri)?;

    let app_uri = PackUri::new(APP_PROPS_PARTNAME).map_err(OpcError::InvalidPackUri)?;
    if !package.contains_part(&app_uri) {
        package.add_part(Part::new_xml(
            app_uri.clone(),
            ct::OFC_EXTENDED_PROPERTIES,
            XmlNode::new("Properties")
                .with_attr("xmlns", ns::OFC_EXTENDED_PROPERTIES)
                .with_child(XmlNode::new("Application").with_text("Microsoft Office Word")),
        ));
    }
    let core_uri = PackUri::new(CORE_PROPS_PARTNAME).map_err(OpcError::InvalidPackUri)?;
    if !package.contains_part(&core_uri) {
        let created = Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
        package.add_part(Part::new_xml(
            core_uri.clone(),
            ct::OPC_CORE_PROPERTIES,
            XmlNode::new("cp:coreProperties")
                .with_attr("xmlns:cp", ns::OPC_CORE_PROPERTIES)
                .with_attr("xmlns:dcterms", ns::DCTERMS)
                .with_attr("xmlns:xsi", ns::XSI)
                .with_child(
                    XmlNode::new("dcterms:created")
                        .with_attr("xsi:type", "dcterms:W3CDTF")
                        .with_text(created),
                ),
        ));
    }
    package
        .rels_mut()
        .get_or_add(rt::EXTENDED_PROPERTIES, app_uri.membername());
    package
        .rels_mut()
        .get_or_add(rt::CORE_PROPERTIES, core_uri.membername());
    Ok(())
}

/// The minimal style part: document-wide run defaults plus a `Normal` style.
fn default_styles() -> XmlNode {
    XmlNode::new("w:styles")
        .with_attr("xmlns:w", ns::WML_MAIN)
        .with_child(
            XmlNode::new("w:docDefaults").with_child(
                XmlNode::new("w:rPrDefault").with_child(
                    XmlNode::new("w:rPr")
                        .with_child(
                            XmlNode::new("w:rFonts")
                                .with_attr("w:ascii", DEFAULT_FONT)
                                .with_attr("w:hAnsi", DEFAULT_FONT)
                                .with_attr("w:eastAsia", DEFAULT_FONT),
                        )
                        .with_child(XmlNode::new("w:sz").with_attr("w:val", DEFAULT_SZ)),
                ),
            ),
        )
        .with_child(
            XmlNode::new("w:style")
                .with_attr("w:type", "paragraph")
                .with_attr("w:styleId", "Normal")
                .with_attr("w:default", "1")
                .with_child(XmlNode::new("w:name").with_attr("w:val", "Normal")),
        )
}

/// Rewrite the settings part so exactly one compatibility-mode setting
/// exists and it says 15.
fn force_compatibility_mode(package: &mut Package, settings_uri: &PackUri) -> Result<()> {
    let Some(settings) = package.part_mut(settings_uri).and_then(|p| p.xml_mut()) else {
        return Ok(());
    };
    if settings.first_child("compat").is_none() {
        settings.push_child(XmlNode::new("w:compat"));
    }
    let Some(compat) = settings.first_child_mut("compat") else {
        return Ok(());
    };
    compat.children.retain(|child| {
        !matches!(child, XmlChild::Element(e)
            if e.local_name() == "compatSetting"
                && e.attr("name") == Some("compatibilityMode"))
    });
    compat.push_child(
        XmlNode::new("w:compatSetting")
            .with_attr("w:name", "compatibilityMode")
            .with_attr("w:uri", ns::MS_WORD_COMPAT)
            .with_attr("w:val", "15"),
    );
    Ok(())
}

/// Make sure the body ends with a section-properties element.
///
/// A `w:sectPr` found anywhere in the body's direct children is moved to the
/// end; absent one entirely, an A4 section with 720-twip margins is created.
pub fn ensure_sect_pr_last(package: &mut Package) -> Result<()> {
    let body = body_of_mut(package)?;
    let position = body
        .children
        .iter()
        .position(|child| matches!(child, XmlChild::Element(e) if e.local_name() == "sectPr"));
    match position {
        Some(i) if i == body.children.len() - 1 => {}
        Some(i) => {
            let sect_pr = body.children.remove(i);
            body.children.push(sect_pr);
        }
        None => body.push_child(default_sect_pr()),
    }
    Ok(())
}

fn default_sect_pr() -> XmlNode {
    XmlNode::new("w:sectPr")
        .with_child(
            XmlNode::new("w:pgSz")
                .with_attr("w:w", PAGE_WIDTH)
                .with_attr("w:h", PAGE_HEIGHT),
        )
        .with_child(
            XmlNode::new("w:pgMar")
                .with_attr("w:top", PAGE_MARGIN)
                .with_attr("w:right", PAGE_MARGIN)
                .with_attr("w:bottom", PAGE_MARGIN)
                .with_attr("w:left", PAGE_MARGIN),
        )
}

/// Delete every drawing and legacy shape inside header and footer parts.
/// Images belong to question fragments; chrome parts carry text only.
pub fn strip_header_footer_drawings(package: &mut Package) {
    for part in package.iter_parts_mut() {
        if !matches!(part.content_type(), ct::WML_HEADER | ct::WML_FOOTER) {
            continue;
        }
        let partname = part.partname().to_string();
        if let Some(root) = part.xml_mut() {
            let removed = root.remove_descendants(&|e| {
                matches!(
                    e.local_name(),
                    "drawing" | "shape" | "imagedata" | "pict"
                )
            });
            if removed > 0 {
                debug!(%partname, removed, "stripped drawings from chrome part");
            }
        }
    }
}

/// Remove hyperlink and external relationships from every part and the
/// package itself, and clear the link attribute of every blip so only
/// embedded references remain.
pub fn sanitize_relationships(package: &mut Package) {
    let is_unwanted =
        |rel: &crate::opc::rel::Relationship| rel.reltype() == rt::HYPERLINK || rel.is_external();

    let dropped = package.rels_mut().remove_matching(is_unwanted).len();
    let mut total = dropped;
    for part in package.iter_parts_mut() {
        total += part.rels_mut().remove_matching(is_unwanted).len();
        if let Some(root) = part.xml_mut() {
            root.for_each_descendant_mut(&mut |element| {
                if element.local_name() == "blip" {
                    element.remove_attr("link");
                }
            });
        }
    }
    if total > 0 {
        debug!(removed = total, "sanitized relationship graph");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::fragment::body_of;

    fn find_part<'a>(package: &'a Package, partname: &str) -> Option<&'a Part> {
        package.part(&PackUri::new(partname).unwrap())
    }

    #[test]
    fn test_defaults_created_once() {
        let mut pkg = Package::create_empty();
        ensure_defaults(&mut pkg).unwrap();

        let styles = find_part(&pkg, STYLES_PARTNAME).unwrap();
        let fonts = styles.xml().unwrap().find_descendants("rFonts");
        assert_eq!(fonts[0].attr("ascii"), Some("Calibri"));

        let app = find_part(&pkg, APP_PROPS_PARTNAME).unwrap();
        assert_eq!(
            app.xml().unwrap().first_child("Application").unwrap().collect_text(),
            "Microsoft Office Word"
        );
        let core = find_part(&pkg, CORE_PROPS_PARTNAME).unwrap();
        assert!(core.xml().unwrap().first_child("created").is_some());

        // Idempotent: a second pass adds no duplicate parts or rels.
        let parts_before = pkg.part_count();
        let pkg_rels_before = pkg.rels().len();
        ensure_defaults(&mut pkg).unwrap();
        assert_eq!(pkg.part_count(), parts_before);
        assert_eq!(pkg.rels().len(), pkg_rels_before);
    }

    #[test]
    fn test_compatibility_mode_forced_to_15() {
        let mut pkg = Package::create_empty();
        pkg.add_part(Part::new_xml(
            PackUri::new(SETTINGS_PARTNAME).unwrap(),
            ct::WML_SETTINGS,
            XmlNode::new("w:settings").with_child(
                XmlNode::new("w:compat").with_child(
                    XmlNode::new("w:compatSetting")
                        .with_attr("w:name", "compatibilityMode")
                        .with_attr("w:val", "12"),
                ),
            ),
        ));
        ensure_defaults(&mut pkg).unwrap();

        let settings = find_part(&pkg, SETTINGS_PARTNAME).unwrap().xml().unwrap();
        let modes: Vec<_> = settings
            .find_descendants("compatSetting")
            .into_iter()
            .filter(|e| e.attr("name") == Some("compatibilityMode"))
            .collect();
        assert_eq!(modes.len(), 1);
        assert_eq!(modes[0].attr("val"), Some("15"));
    }

    #[test]
    fn test_sect_pr_created_when_missing() {
        let mut pkg = Package::create_empty();
        ensure_sect_pr_last(&mut pkg).unwrap();

        let body = body_of(&pkg).unwrap();
        let sect_pr = body.child_elements().last().unwrap();
        assert_eq!(sect_pr.local_name(), "sectPr");
        assert_eq!(sect_pr.first_child("pgSz").unwrap().attr("w"), Some("11906"));
        assert_eq!(sect_pr.first_child("pgMar").unwrap().attr("top"), Some("720"));
    }

    #[test]
    fn test_sect_pr_moved_not_duplicated() {
        let mut pkg = Package::create_empty();
        {
            let body = body_of_mut(&mut pkg).unwrap();
            body.push_child(XmlNode::new("w:sectPr").with_attr("marker", "original"));
            body.push_child(XmlNode::new("w:p"));
        }
        ensure_sect_pr_last(&mut pkg).unwrap();

        let body = body_of(&pkg).unwrap();
        let sect_prs: Vec<_> = body
            .child_elements()
            .filter(|e| e.local_name() == "sectPr")
            .collect();
        assert_eq!(sect_prs.len(), 1);
        assert_eq!(body.child_elements().last().unwrap().attr("marker"), Some("original"));
    }

    #[test]
    fn test_header_drawings_stripped_body_kept() {
        let mut pkg = Package::create_empty();
        pkg.add_part(Part::new_xml(
            PackUri::new("/word/header1.xml").unwrap(),
            ct::WML_HEADER,
            XmlNode::new("w:hdr")
                .with_child(XmlNode::new("w:p").with_child(XmlNode::new("w:drawing")))
                .with_child(XmlNode::new("w:pict")),
        ));
        body_of_mut(&mut pkg)
            .unwrap()
            .push_child(XmlNode::new("w:p").with_child(XmlNode::new("w:drawing")));

        strip_header_footer_drawings(&mut pkg);

        let header = find_part(&pkg, "/word/header1.xml").unwrap().xml().unwrap();
        assert!(header.find_descendants("drawing").is_empty());
        assert!(header.find_descendants("pict").is_empty());
        // Main-document drawings are not chrome and stay.
        assert_eq!(body_of(&pkg).unwrap().find_descendants("drawing").len(), 1);
    }

    #[test]
    fn test_sanitize_drops_hyperlinks_and_externals() {
        let mut pkg = Package::create_empty();
        {
            let main = pkg.main_document_part_mut().unwrap();
            main.rels_mut().add_relationship(
                rt::HYPERLINK.to_string(),
                "https://example.com".to_string(),
                "rId50".to_string(),
                true,
            );
            main.rels_mut().add_relationship(
                rt::IMAGE.to_string(),
                "https://example.com/pic.png".to_string(),
                "rId51".to_string(),
                true,
            );
            if let Some(root) = main.xml_mut() {
                root.push_child(
                    XmlNode::new("a:blip")
                        .with_attr("r:embed", "rId9")
                        .with_attr("r:link", "rId51"),
                );
            }
        }

        sanitize_relationships(&mut pkg);

        let main = pkg.main_document_part().unwrap();
        assert!(main.rels().get("rId50").is_none());
        assert!(main.rels().get("rId51").is_none());
        let blip = &main.xml().unwrap().find_descendants("blip")[0];
        assert_eq!(blip.attr("link"), None);
        assert_eq!(blip.attr("embed"), Some("rId9"));
    }

    #[test]
    fn test_finalize_saves_package() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.docx");
        let mut pkg = Package::create_empty();

        finalize_and_save(&mut pkg, &path).unwrap();

        let reopened = Package::open(&path).unwrap();
        let body = body_of(&reopened).unwrap();
        assert_eq!(body.child_elements().last().unwrap().local_name(), "sectPr");
        assert!(find_part(&reopened, STYLES_PARTNAME).is_some());
        assert!(find_part(&reopened, SETTINGS_PARTNAME).is_some());
    }
}
