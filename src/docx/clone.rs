//! Fragment cloning and media rebasing across package boundaries.
//!
//! Cloning deep-copies a fragment's tree and re-embeds every image it
//! references as a new media part in the target package. A reference's
//! owning part is not always the one that physically stores the
//! relationship, so resolution walks an ordered list of strategies; a
//! reference no strategy can trace is removed rather than left dangling.

use crate::docx::normalize::strip_legacy_shapes;
use crate::media;
use crate::opc::constants::content_type as ct;
use crate::opc::error::Result;
use crate::opc::package::Package;
use crate::opc::packuri::PackUri;
use crate::xml::{XmlChild, XmlNode};
use tracing::{debug, warn};

/// One media-resolution strategy. Strategies are tried in declaration order;
/// each either finds the partname of the image part an rId names inside the
/// source package, or passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaResolver {
    /// The relationship graph of the fragment's immediate container part
    Container,
    /// The relationship graph of the main document part
    MainDocument,
    /// The relationship graphs of header, footer, and chart parts
    RelatedParts,
    /// A package-wide scan of every part's relationship graph
    IdentityScan,
}

impl MediaResolver {
    /// The exact fallback order.
    pub const ORDER: [MediaResolver; 4] = [
        MediaResolver::Container,
        MediaResolver::MainDocument,
        MediaResolver::RelatedParts,
        MediaResolver::IdentityScan,
    ];

    /// Try to resolve `r_id` to an image part using this strategy alone.
    pub fn resolve(
        self,
        package: &Package,
        container: &PackUri,
        r_id: &str,
    ) -> Option<PackUri> {
        match self {
            MediaResolver::Container => image_target(package, container, r_id),
            MediaResolver::MainDocument => {
                let main = package.main_document_partname().ok()?;
                image_target(package, &main, r_id)
            }
            MediaResolver::RelatedParts => {
                package
                    .iter_parts()
                    .filter(|part| {
                        matches!(
                            part.content_type(),
                            ct::WML_HEADER | ct::WML_FOOTER | ct::DML_CHART
                        )
                    })
                    .find_map(|part| image_target(package, part.partname(), r_id))
            }
            MediaResolver::IdentityScan => package
                .iter_parts()
                .find_map(|part| image_target(package, part.partname(), r_id)),
        }
    }
}

/// Resolve `r_id` against the part's relationship graph and check that the
/// target exists in the package and is an image part.
fn image_target(package: &Package, partname: &PackUri, r_id: &str) -> Option<PackUri> {
    let part = package.part(partname)?;
    let target = part.rels().get(r_id)?.target_partname()?;
    package
        .part(&target)
        .filter(|target_part| target_part.is_image())
        .map(|target_part| target_part.partname().clone())
}

/// Resolve an image reference through the full strategy chain.
pub fn resolve_media(package: &Package, container: &PackUri, r_id: &str) -> Option<PackUri> {
    MediaResolver::ORDER
        .iter()
        .find_map(|strategy| strategy.resolve(package, container, r_id))
}

/// Clone a fragment from the source package into the target package.
///
/// The clone is structurally independent of the source. Legacy vector-shape
/// markup is stripped, and every image reference is rebased: the source
/// binary is re-encoded to a canonical raster format, written as a new media
/// part of the target, and the clone's reference is pointed at it. References
/// that cannot be resolved, and media that cannot be decoded, are dropped
/// with a warning; the fragment proceeds without that image.
pub fn clone_fragment(
    source: &Package,
    fragment: &XmlNode,
    target: &mut Package,
) -> Result<XmlNode> {
    let mut clone = fragment.clone();
    strip_legacy_shapes(&mut clone);

    let container = source.main_document_partname()?;
    rebase_blips(&mut clone, source, &container, target)?;
    Ok(clone)
}

/// Walk the tree, rebasing every blip child in place and removing the ones
/// that fail to resolve.
fn rebase_blips(
    node: &mut XmlNode,
    source: &Package,
    container: &PackUri,
    target: &mut Package,
) -> Result<()> {
    let mut i = 0;
    while i < node.children.len() {
        let keep = match &mut node.children[i] {
            XmlChild::Element(child) if child.local_name() == "blip" => {
                rebase_one_blip(child, source, container, target)?
            }
            XmlChild::Element(child) => {
                rebase_blips(child, source, container, target)?;
                true
            }
            XmlChild::Text(_) => true,
        };
        if keep {
            i += 1;
        } else {
            node.children.remove(i);
        }
    }
    Ok(())
}

/// Rebase a single blip. Returns false when the reference must be dropped.
fn rebase_one_blip(
    blip: &mut XmlNode,
    source: &Package,
    container: &PackUri,
    target: &mut Package,
) -> Result<bool> {
    let r_id = blip
        .attr("embed")
        .or_else(|| blip.attr("link"))
        .unwrap_or("")
        .to_string();
    if r_id.is_empty() {
        warn!("dropping image reference with no relationship id");
        return Ok(false);
    }

    let Some(partname) = resolve_media(source, container, &r_id) else {
        warn!(%r_id, "dropping image reference that resolves to no media part");
        return Ok(false);
    };

    let Some(source_part) = source.part(&partname) else {
        return Ok(false);
    };
    let Some(bytes) = source_part.binary() else {
        warn!(%partname, "dropping image reference to a non-binary part");
        return Ok(false);
    };

    let (canonical, content_type) =
        match media::to_canonical(bytes.to_vec(), source_part.content_type()) {
            Ok(result) => result,
            Err(e) => {
                warn!(%partname, error = %e, "dropping undecodable image");
                return Ok(false);
            }
        };

    let new_r_id = target.add_media_part(canonical, content_type)?;
    debug!(%r_id, %new_r_id, %partname, "rebased image reference");

    blip.set_attr("r:embed", new_r_id);
    blip.remove_attr("link");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::fragment::body_of_mut;
    use crate::opc::constants::relationship_type;
    use crate::opc::part::Part;

    /// A fragment with one drawing whose blip carries the given rId.
    fn fragment_with_blip(r_id: &str) -> XmlNode {
        XmlNode::new("w:tbl").with_child(
            XmlNode::new("w:tr").with_child(
                XmlNode::new("w:tc").with_child(
                    XmlNode::new("w:p").with_child(
                        XmlNode::new("w:r").with_child(
                            XmlNode::new("w:drawing").with_child(
                                XmlNode::new("wp:inline").with_child(
                                    XmlNode::new("a:graphic").with_child(
                                        XmlNode::new("a:blip").with_attr("r:embed", r_id),
                                    ),
                                ),
                            ),
                        ),
                    ),
                ),
            ),
        )
    }

    fn source_with_image() -> (Package, String) {
        let mut pkg = Package::create_empty();
        let r_id = pkg
            .add_media_part(png_bytes(), ct::PNG)
            .expect("add media");
        (pkg, r_id)
    }

    fn png_bytes() -> Vec<u8> {
        use image::{DynamicImage, RgbImage};
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(1, 1, image::Rgb([0, 0, 0])));
        let mut out = std::io::Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_clone_rebases_resolved_image() {
        let (source, r_id) = source_with_image();
        let fragment = fragment_with_blip(&r_id);
        let mut target = Package::create_empty();

        let clone = clone_fragment(&source, &fragment, &mut target).unwrap();

        // The target gained exactly one media part plus its relationship.
        assert_eq!(target.part_count(), 2);
        let blips = clone.find_descendants("blip");
        assert_eq!(blips.len(), 1);
        let new_r_id = blips[0].attr("embed").unwrap();
        let main = target.main_document_part().unwrap();
        assert!(main.rels().get(new_r_id).is_some());
    }

    #[test]
    fn test_clone_drops_unresolvable_reference() {
        let (source, _) = source_with_image();
        let fragment = fragment_with_blip("rId999");
        let mut target = Package::create_empty();

        let clone = clone_fragment(&source, &fragment, &mut target).unwrap();

        assert!(clone.find_descendants("blip").is_empty());
        // No media part was created.
        assert_eq!(target.part_count(), 1);
    }

    #[test]
    fn test_clone_strips_legacy_markup() {
        let (source, _) = source_with_image();
        let fragment = XmlNode::new("w:tbl")
            .with_child(XmlNode::new("v:shape"))
            .with_child(XmlNode::new("w:pict").with_child(XmlNode::new("v:imagedata")));
        let mut target = Package::create_empty();

        let clone = clone_fragment(&source, &fragment, &mut target).unwrap();
        assert!(clone.find_descendants("shape").is_empty());
        assert!(clone.find_descendants("pict").is_empty());
        assert!(clone.find_descendants("imagedata").is_empty());
    }

    #[test]
    fn test_resolver_falls_back_to_identity_scan() {
        // Relationship lives on a header part only: the container and
        // main-document strategies must pass, the later ones must hit.
        let mut pkg = Package::create_empty();
        let image_name = PackUri::new("/word/media/image1.png").unwrap();
        pkg.add_part(Part::new_binary(image_name.clone(), ct::PNG, png_bytes()));

        let header_name = PackUri::new("/word/header1.xml").unwrap();
        let mut header = Part::new_xml(header_name.clone(), ct::WML_HEADER, XmlNode::new("w:hdr"));
        let r_id = header.relate_to(&image_name, relationship_type::IMAGE);
        pkg.add_part(header);

        let main = pkg.main_document_partname().unwrap();
        assert_eq!(
            MediaResolver::Container.resolve(&pkg, &main, &r_id),
            None
        );
        assert_eq!(
            MediaResolver::MainDocument.resolve(&pkg, &main, &r_id),
            None
        );
        assert_eq!(
            MediaResolver::RelatedParts.resolve(&pkg, &main, &r_id),
            Some(image_name.clone())
        );
        assert_eq!(
            resolve_media(&pkg, &main, &r_id),
            Some(image_name)
        );
    }

    #[test]
    fn test_resolver_prefers_container() {
        let (pkg, r_id) = source_with_image();
        let main = pkg.main_document_partname().unwrap();
        let hit = MediaResolver::Container.resolve(&pkg, &main, &r_id);
        assert!(hit.is_some());
    }

    #[test]
    fn test_clone_is_independent_of_source() {
        let (source, r_id) = source_with_image();
        let fragment = fragment_with_blip(&r_id);
        let mut target = Package::create_empty();

        let mut clone = clone_fragment(&source, &fragment, &mut target).unwrap();
        clone.set_attr("w:mut", "1");

        // The template fragment is untouched.
        assert_eq!(fragment.attr("mut"), None);
    }

    #[test]
    fn test_body_of_mut_roundtrip() {
        let mut pkg = Package::create_empty();
        body_of_mut(&mut pkg).unwrap().push_child(XmlNode::new("w:p"));
        let body = crate::docx::fragment::body_of(&pkg).unwrap();
        assert_eq!(body.child_elements().count(), 1);
    }
}
