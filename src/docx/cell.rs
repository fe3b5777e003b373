//! Cell text rewriting inside a fragment's table.
//!
//! All metadata relabeling goes through here: serial numbers, subject
//! labels, mark values, set labels, and answer markers. Coordinates come
//! from the layout contracts in [`crate::docx::fragment`]; a coordinate the
//! fragment's actual shape cannot satisfy is a silent no-op, since template
//! authors sometimes trim rows from individual questions.

use crate::docx::fragment::{CellRef, MCQ_LAYOUT};
use crate::xml::{XmlChild, XmlNode};
use tracing::debug;

/// Which run-property set a labeled cell receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    /// `en-US` language tags, Calibri.
    Latin,
    /// `bn-BD` language tags, SutonnyMJ, right-to-left run direction.
    Bengali,
}

impl Script {
    fn run_props(self) -> XmlNode {
        match self {
            Script::Latin => XmlNode::new("w:rPr")
                .with_child(
                    XmlNode::new("w:rFonts")
                        .with_attr("w:ascii", "Calibri")
                        .with_attr("w:hAnsi", "Calibri"),
                )
                .with_child(XmlNode::new("w:lang").with_attr("w:val", "en-US")),
            Script::Bengali => XmlNode::new("w:rPr")
                .with_child(
                    XmlNode::new("w:rFonts")
                        .with_attr("w:ascii", "SutonnyMJ")
                        .with_attr("w:hAnsi", "SutonnyMJ")
                        .with_attr("w:cs", "SutonnyMJ"),
                )
                .with_child(XmlNode::new("w:rtl"))
                .with_child(
                    XmlNode::new("w:lang")
                        .with_attr("w:val", "bn-BD")
                        .with_attr("w:bidi", "bn-BD"),
                ),
        }
    }
}

/// A `w:t` carrying the text, space-preserved when the edges matter.
fn text_element(text: &str) -> XmlNode {
    let mut t = XmlNode::new("w:t").with_text(text);
    if text != text.trim() {
        t.set_attr("xml:space", "preserve");
    }
    t
}

fn make_run(text: &str, props: Option<XmlNode>) -> XmlNode {
    let mut run = XmlNode::new("w:r");
    if let Some(props) = props {
        run.push_child(props);
    }
    run.push_child(text_element(text));
    run
}

fn row_mut(fragment: &mut XmlNode, row: usize) -> Option<&mut XmlNode> {
    fragment
        .child_elements_mut()
        .filter(|e| e.local_name() == "tr")
        .nth(row)
}

fn row_at(fragment: &XmlNode, row: usize) -> Option<&XmlNode> {
    fragment
        .child_elements()
        .filter(|e| e.local_name() == "tr")
        .nth(row)
}

fn cell_mut(fragment: &mut XmlNode, cell: CellRef) -> Option<&mut XmlNode> {
    row_mut(fragment, cell.row)?
        .child_elements_mut()
        .filter(|e| e.local_name() == "tc")
        .nth(cell.col)
}

/// Number of rows in the fragment's table.
pub fn row_count(fragment: &XmlNode) -> usize {
    fragment
        .child_elements()
        .filter(|e| e.local_name() == "tr")
        .count()
}

/// Replace a cell's paragraphs with a single paragraph holding `text`.
/// Cell properties (`w:tcPr`) survive; the run is written bare.
pub fn set_cell_text(fragment: &mut XmlNode, cell: CellRef, text: &str) {
    replace_cell(fragment, cell, text, None);
}

/// Replace a cell's paragraphs with a single paragraph whose run carries the
/// language and font properties of `script`.
pub fn set_labeled_cell_text(fragment: &mut XmlNode, cell: CellRef, text: &str, script: Script) {
    replace_cell(fragment, cell, text, Some(script.run_props()));
}

fn replace_cell(fragment: &mut XmlNode, cell: CellRef, text: &str, props: Option<XmlNode>) {
    let Some(tc) = cell_mut(fragment, cell) else {
        debug!(row = cell.row, col = cell.col, "cell outside fragment shape, skipping");
        return;
    };
    tc.children
        .retain(|child| !matches!(child, XmlChild::Element(e) if e.local_name() == "p"));
    tc.push_child(XmlNode::new("w:p").with_child(make_run(text, props)));
}

/// Append a Latin-script run holding `text` to the last paragraph of each of
/// the first two cells of `row`. Cells with no paragraph get one.
pub fn append_label_to_row(fragment: &mut XmlNode, row: usize, text: &str) {
    let Some(tr) = row_mut(fragment, row) else {
        debug!(row, "label row outside fragment shape, skipping");
        return;
    };
    for tc in tr
        .child_elements_mut()
        .filter(|e| e.local_name() == "tc")
        .take(2)
    {
        let run = make_run(text, Some(Script::Latin.run_props()));
        match tc
            .child_elements_mut()
            .filter(|e| e.local_name() == "p")
            .last()
        {
            Some(paragraph) => paragraph.push_child(run),
            None => tc.push_child(XmlNode::new("w:p").with_child(run)),
        }
    }
}

/// Derive the correct-option marker from the fragment's answer row.
///
/// The answer row's full text is scanned for the first of `a`..`d`
/// (case-insensitive) anywhere in the text; that letter selects the option
/// row, whose first two cells are overwritten with `"Answer"`. Fragments too
/// short to carry options, rows naming no recognizable letter, and letters
/// mapping past the fragment's shape all leave it unmarked. Returns whether
/// a marker was written.
pub fn apply_answer_tag(fragment: &mut XmlNode) -> bool {
    let layout = MCQ_LAYOUT;
    let rows = row_count(fragment);
    if rows < layout.min_rows {
        return false;
    }

    let source_row = layout.answer_source_row.min(rows - 1);
    let text = match row_at(fragment, source_row) {
        Some(tr) => tr.collect_text(),
        None => return false,
    };
    let Some(letter) = text
        .chars()
        .map(|c| c.to_ascii_lowercase())
        .find(|c| ('a'..='d').contains(c))
    else {
        debug!(%text, "answer row names no option letter, leaving fragment unmarked");
        return false;
    };

    let target_row = layout.option_rows[(letter as u8 - b'a') as usize];
    if target_row >= rows {
        return false;
    }
    set_cell_text(fragment, CellRef::new(target_row, 0), "Answer");
    set_cell_text(fragment, CellRef::new(target_row, 1), "Answer");
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: usize, cols: usize) -> XmlNode {
        let mut tbl = XmlNode::new("w:tbl");
        for r in 0..rows {
            let mut tr = XmlNode::new("w:tr");
            for c in 0..cols {
                tr.push_child(
                    XmlNode::new("w:tc")
                        .with_child(XmlNode::new("w:tcPr"))
                        .with_child(XmlNode::new("w:p").with_child(
                            XmlNode::new("w:r").with_child(
                                XmlNode::new("w:t").with_text(format!("r{r}c{c}")),
                            ),
                        )),
                );
            }
            tbl.push_child(tr);
        }
        tbl
    }

    fn cell_text(tbl: &XmlNode, row: usize, col: usize) -> String {
        row_at(tbl, row)
            .unwrap()
            .child_elements()
            .filter(|e| e.local_name() == "tc")
            .nth(col)
            .unwrap()
            .collect_text()
    }

    #[test]
    fn test_set_cell_text_replaces_paragraphs() {
        let mut tbl = table(2, 2);
        set_cell_text(&mut tbl, CellRef::new(1, 0), "17.");
        assert_eq!(cell_text(&tbl, 1, 0), "17.");
        // tcPr survives the rewrite.
        let tc = row_at(&tbl, 1)
            .unwrap()
            .child_elements()
            .find(|e| e.local_name() == "tc")
            .unwrap();
        assert!(tc.first_child("tcPr").is_some());
    }

    #[test]
    fn test_out_of_shape_coordinate_is_noop() {
        let mut tbl = table(2, 2);
        set_cell_text(&mut tbl, CellRef::new(5, 0), "x");
        set_cell_text(&mut tbl, CellRef::new(0, 9), "x");
        assert_eq!(cell_text(&tbl, 0, 0), "r0c0");
    }

    #[test]
    fn test_edge_whitespace_preserved() {
        let mut tbl = table(1, 1);
        set_cell_text(&mut tbl, CellRef::new(0, 0), " [Set-2] ");
        let t = &row_at(&tbl, 0).unwrap().find_descendants("t")[0];
        assert_eq!(t.attr("space"), Some("preserve"));
    }

    #[test]
    fn test_bengali_run_properties() {
        let mut tbl = table(1, 2);
        set_labeled_cell_text(&mut tbl, CellRef::new(0, 0), "পদার্থবিজ্ঞান", Script::Bengali);
        let tr = row_at(&tbl, 0).unwrap();
        let rpr = &tr.find_descendants("rPr")[0];
        assert!(rpr.first_child("rtl").is_some());
        assert_eq!(rpr.first_child("lang").unwrap().attr("val"), Some("bn-BD"));
        assert_eq!(
            rpr.first_child("rFonts").unwrap().attr("cs"),
            Some("SutonnyMJ")
        );
    }

    #[test]
    fn test_latin_run_properties() {
        let mut tbl = table(1, 2);
        set_labeled_cell_text(&mut tbl, CellRef::new(0, 1), "Physics", Script::Latin);
        let tr = row_at(&tbl, 0).unwrap();
        let rpr = &tr.find_descendants("rPr")[0];
        assert!(rpr.first_child("rtl").is_none());
        assert_eq!(rpr.first_child("lang").unwrap().attr("val"), Some("en-US"));
    }

    #[test]
    fn test_append_label_touches_first_two_cells_only() {
        let mut tbl = table(3, 3);
        append_label_to_row(&mut tbl, 1, " [Set-3] ");
        assert_eq!(cell_text(&tbl, 1, 0), "r1c0 [Set-3] ");
        assert_eq!(cell_text(&tbl, 1, 1), "r1c1 [Set-3] ");
        assert_eq!(cell_text(&tbl, 1, 2), "r1c2");
    }

    #[test]
    fn test_append_label_creates_missing_paragraph() {
        let mut tbl = XmlNode::new("w:tbl").with_child(
            XmlNode::new("w:tr").with_child(XmlNode::new("w:tc").with_child(XmlNode::new("w:tcPr"))),
        );
        append_label_to_row(&mut tbl, 0, "L");
        assert_eq!(cell_text(&tbl, 0, 0), "L");
    }

    #[test]
    fn test_answer_tag_letter_in_note() {
        let mut tbl = table(8, 2);
        set_cell_text(&mut tbl, CellRef::new(7, 0), "b) some note");
        assert!(apply_answer_tag(&mut tbl));
        assert_eq!(cell_text(&tbl, 3, 0), "Answer");
        assert_eq!(cell_text(&tbl, 3, 1), "Answer");
        // Other option rows untouched.
        assert_eq!(cell_text(&tbl, 2, 0), "r2c0");
    }

    #[test]
    fn test_answer_tag_uses_last_row_when_short() {
        let mut tbl = table(6, 2);
        set_cell_text(&mut tbl, CellRef::new(5, 0), "D");
        assert!(apply_answer_tag(&mut tbl));
        assert_eq!(cell_text(&tbl, 5, 1), "Answer");
    }

    #[test]
    fn test_answer_tag_skips_short_fragment() {
        let mut tbl = table(4, 2);
        assert!(!apply_answer_tag(&mut tbl));
    }

    #[test]
    fn test_answer_tag_without_letter_is_noop() {
        let mut tbl = table(8, 2);
        set_cell_text(&mut tbl, CellRef::new(7, 0), "1234 !!");
        set_cell_text(&mut tbl, CellRef::new(7, 1), "9999");
        assert!(!apply_answer_tag(&mut tbl));
        assert_eq!(cell_text(&tbl, 2, 0), "r2c0");
    }
}
