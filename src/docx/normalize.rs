//! Structural normalization of fragment markup.
//!
//! Output packages carry a single, predictable drawing style: every image is
//! inline in its run, every table draws the same border on every edge, and
//! no legacy vector-shape markup survives. Fragments inherit whatever the
//! template author produced, so each rule here rewrites one class of
//! variation down to the canonical form.

use crate::xml::{XmlChild, XmlNode};
use tracing::debug;

/// Border applied to every edge of a normalized table.
const BORDER_VAL: &str = "single";
const BORDER_SZ: &str = "8";
const BORDER_SPACE: &str = "0";
const BORDER_COLOR: &str = "auto";

const BORDER_EDGES: [&str; 6] = [
    "w:top",
    "w:left",
    "w:bottom",
    "w:right",
    "w:insideH",
    "w:insideV",
];

/// Fallback extent (one inch in EMU) for anchors that declare none.
const DEFAULT_EXTENT_EMU: &str = "914400";

/// Rewrite every floating (anchored) drawing in the tree as an inline one.
///
/// The anchor's extent, drawing properties, and graphic payload move into a
/// fresh `wp:inline` with zero text distances; all positioning markup
/// (offsets, wrap mode, z-order) is discarded. A drawing that contains
/// neither an inline nor an anchor carries nothing renderable and is removed
/// outright. Returns the number of drawings rewritten or removed.
pub fn normalize_anchoring(node: &mut XmlNode) -> usize {
    let mut changed = 0;
    let mut i = 0;
    while i < node.children.len() {
        let keep = match &mut node.children[i] {
            XmlChild::Element(child) if child.local_name() == "drawing" => {
                match normalize_drawing(child) {
                    DrawingFate::Untouched => true,
                    DrawingFate::Rewritten => {
                        changed += 1;
                        true
                    }
                    DrawingFate::Opaque => {
                        changed += 1;
                        false
                    }
                }
            }
            XmlChild::Element(child) => {
                changed += normalize_anchoring(child);
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
    changed
}

enum DrawingFate {
    Untouched,
    Rewritten,
    Opaque,
}

fn normalize_drawing(drawing: &mut XmlNode) -> DrawingFate {
    if drawing.first_child("inline").is_some() {
        return DrawingFate::Untouched;
    }
    let Some(anchor) = drawing.first_child("anchor") else {
        debug!("removing drawing with neither inline nor anchor content");
        return DrawingFate::Opaque;
    };
    // An anchor without a graphic payload has nothing to show inline.
    let Some(graphic) = anchor.first_child("graphic") else {
        return DrawingFate::Opaque;
    };

    let extent = match anchor.first_child("extent") {
        Some(extent) => extent.clone(),
        None => XmlNode::new("wp:extent")
            .with_attr("cx", DEFAULT_EXTENT_EMU)
            .with_attr("cy", DEFAULT_EXTENT_EMU),
    };
    let (doc_pr_id, doc_pr_name) = match anchor.first_child("docPr") {
        Some(doc_pr) => (
            doc_pr.attr("id").unwrap_or("1").to_string(),
            doc_pr.attr("name").unwrap_or("Picture").to_string(),
        ),
        None => ("1".to_string(), "Picture".to_string()),
    };

    let inline = XmlNode::new("wp:inline")
        .with_attr("distT", "0")
        .with_attr("distB", "0")
        .with_attr("distL", "0")
        .with_attr("distR", "0")
        .with_child(extent)
        .with_child(
            XmlNode::new("wp:effectExtent")
                .with_attr("l", "0")
                .with_attr("t", "0")
                .with_attr("r", "0")
                .with_attr("b", "0"),
        )
        .with_child(
            XmlNode::new("wp:docPr")
                .with_attr("id", doc_pr_id)
                .with_attr("name", doc_pr_name),
        )
        .with_child(
            XmlNode::new("wp:cNvGraphicFramePr").with_child(
                XmlNode::new("a:graphicFrameLocks").with_attr("noChangeAspect", "1"),
            ),
        )
        .with_child(graphic.clone());

    drawing.children = vec![XmlChild::Element(inline)];
    DrawingFate::Rewritten
}

/// Remove all legacy vector-shape markup (`v:shape`, `v:imagedata`,
/// `w:pict`) from the tree. Returns the number of elements removed.
pub fn strip_legacy_shapes(node: &mut XmlNode) -> usize {
    node.remove_descendants(&|element| {
        matches!(element.local_name(), "shape" | "imagedata" | "pict")
    })
}

/// Force a uniform single border on every edge of a table.
///
/// The table's properties element is created if missing; any existing border
/// set is replaced wholesale so partial or mixed borders cannot leak through
/// from the template.
pub fn ensure_borders(tbl: &mut XmlNode) {
    let mut borders = XmlNode::new("w:tblBorders");
    for edge in BORDER_EDGES {
        borders.push_child(
            XmlNode::new(edge)
                .with_attr("w:val", BORDER_VAL)
                .with_attr("w:sz", BORDER_SZ)
                .with_attr("w:space", BORDER_SPACE)
                .with_attr("w:color", BORDER_COLOR),
        );
    }

    if let Some(props) = tbl.first_child_mut("tblPr") {
        props
            .children
            .retain(|child| !matches!(child, XmlChild::Element(e) if e.local_name() == "tblBorders"));
        props.push_child(borders);
        return;
    }

    // tblPr must be the table's first child.
    let props = XmlNode::new("w:tblPr").with_child(borders);
    tbl.children.insert(0, XmlChild::Element(props));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anchored_drawing() -> XmlNode {
        XmlNode::new("w:drawing").with_child(
            XmlNode::new("wp:anchor")
                .with_attr("behindDoc", "1")
                .with_child(XmlNode::new("wp:positionH"))
                .with_child(XmlNode::new("wp:extent").with_attr("cx", "914400"))
                .with_child(XmlNode::new("wp:effectExtent"))
                .with_child(XmlNode::new("wp:docPr").with_attr("id", "7"))
                .with_child(XmlNode::new("a:graphic").with_child(XmlNode::new("a:blip"))),
        )
    }

    #[test]
    fn test_anchor_becomes_inline() {
        let mut body = XmlNode::new("w:body")
            .with_child(XmlNode::new("w:r").with_child(anchored_drawing()));

        assert_eq!(normalize_anchoring(&mut body), 1);

        assert!(body.find_descendants("anchor").is_empty());
        let inlines = body.find_descendants("inline");
        assert_eq!(inlines.len(), 1);
        let inline = inlines[0];
        assert_eq!(inline.attr("distT"), Some("0"));
        assert_eq!(inline.attr("distR"), Some("0"));
        // Positioning markup is gone, payload survives.
        assert!(inline.first_child("positionH").is_none());
        assert_eq!(
            inline.first_child("extent").unwrap().attr("cx"),
            Some("914400")
        );
        assert_eq!(inline.first_child("docPr").unwrap().attr("id"), Some("7"));
        assert_eq!(
            inline.first_child("effectExtent").unwrap().attr("l"),
            Some("0")
        );
        assert!(
            inline
                .first_child("cNvGraphicFramePr")
                .unwrap()
                .first_child("graphicFrameLocks")
                .is_some()
        );
        assert!(inline.first_child("graphic").is_some());
    }

    #[test]
    fn test_missing_extent_gets_default() {
        let mut body = XmlNode::new("w:body").with_child(
            XmlNode::new("w:drawing").with_child(
                XmlNode::new("wp:anchor").with_child(XmlNode::new("a:graphic")),
            ),
        );
        assert_eq!(normalize_anchoring(&mut body), 1);
        let inline = body.find_descendants("inline")[0];
        assert_eq!(inline.first_child("extent").unwrap().attr("cx"), Some("914400"));
        assert_eq!(inline.first_child("docPr").unwrap().attr("id"), Some("1"));
    }

    #[test]
    fn test_inline_drawing_untouched() {
        let mut body = XmlNode::new("w:body").with_child(
            XmlNode::new("w:drawing")
                .with_child(XmlNode::new("wp:inline").with_child(XmlNode::new("a:graphic"))),
        );
        assert_eq!(normalize_anchoring(&mut body), 0);
        assert_eq!(body.find_descendants("inline").len(), 1);
    }

    #[test]
    fn test_opaque_drawing_removed() {
        let mut body = XmlNode::new("w:body").with_child(
            XmlNode::new("w:r").with_child(
                XmlNode::new("w:drawing").with_child(XmlNode::new("wp:unknownThing")),
            ),
        );
        assert_eq!(normalize_anchoring(&mut body), 1);
        assert!(body.find_descendants("drawing").is_empty());
    }

    #[test]
    fn test_anchor_without_graphic_removed() {
        let mut body = XmlNode::new("w:body").with_child(
            XmlNode::new("w:drawing")
                .with_child(XmlNode::new("wp:anchor").with_child(XmlNode::new("wp:extent"))),
        );
        assert_eq!(normalize_anchoring(&mut body), 1);
        assert!(body.find_descendants("drawing").is_empty());
    }

    #[test]
    fn test_strip_legacy_shapes() {
        let mut tree = XmlNode::new("w:p")
            .with_child(XmlNode::new("w:pict").with_child(XmlNode::new("v:shape")))
            .with_child(XmlNode::new("w:r").with_child(XmlNode::new("v:imagedata")));
        assert_eq!(strip_legacy_shapes(&mut tree), 2);
        assert!(tree.find_descendants("pict").is_empty());
        assert!(tree.find_descendants("imagedata").is_empty());
    }

    #[test]
    fn test_borders_created_when_missing() {
        let mut tbl = XmlNode::new("w:tbl").with_child(XmlNode::new("w:tr"));
        ensure_borders(&mut tbl);

        // tblPr is inserted first.
        let first = tbl.child_elements().next().unwrap();
        assert_eq!(first.local_name(), "tblPr");
        let borders = first.first_child("tblBorders").unwrap();
        assert_eq!(borders.child_elements().count(), 6);
        for edge in borders.child_elements() {
            assert_eq!(edge.attr("val"), Some("single"));
            assert_eq!(edge.attr("sz"), Some("8"));
        }
    }

    #[test]
    fn test_borders_replace_existing() {
        let mut tbl = XmlNode::new("w:tbl").with_child(
            XmlNode::new("w:tblPr").with_child(
                XmlNode::new("w:tblBorders")
                    .with_child(XmlNode::new("w:top").with_attr("w:val", "dashed")),
            ),
        );
        ensure_borders(&mut tbl);

        let props = tbl.first_child("tblPr").unwrap();
        let borders: Vec<_> = props
            .child_elements()
            .filter(|e| e.local_name() == "tblBorders")
            .collect();
        assert_eq!(borders.len(), 1);
        assert_eq!(borders[0].first_child("top").unwrap().attr("val"), Some("single"));
    }
}
