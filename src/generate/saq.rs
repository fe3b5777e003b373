//! Short-answer question document generation.
//!
//! SAQ requests carry bilingual subject pairs and an independent list of
//! serial ranges; the fill loop is the cross product of the two. Serial
//! numbers restart from each range's own start, and a positive per-range cap
//! truncates long ranges.

use crate::docx::cell::{Script, append_label_to_row, set_labeled_cell_text};
use crate::docx::clone::clone_fragment;
use crate::docx::fragment::{SAQ_LAYOUT, fragment_at, fragment_count};
use crate::docx::normalize::{ensure_borders, normalize_anchoring};
use crate::error::{GenerateError, Result};
use crate::generate::output::OutputDocument;
use crate::generate::ranges::{parse_labels, parse_ranges};
use crate::generate::{batch_id, effective_sets};
use crate::opc::package::Package;
use std::fs;
use std::path::Path;
use tracing::info;

/// Inputs for one SAQ generation request.
#[derive(Debug, Clone)]
pub struct SaqOptions {
    /// Per-range question cap; `0` means the whole range.
    pub questions_per_range: u32,
    /// Mark value written into every fragment's mark cell.
    pub question_mark: u32,
    /// Comma-separated subject labels in the primary (Bengali) script.
    pub subjects_primary: String,
    /// Comma-separated subject labels in the secondary (Latin) script,
    /// pairwise with `subjects_primary`.
    pub subjects_secondary: String,
    /// Comma-separated `start-end` serial ranges, applied to every subject.
    pub sequences: String,
    pub multi_set: bool,
    pub set_count: u32,
}

/// Generate one SAQ package per effective set and return the file names.
pub fn generate(template_path: &Path, output_dir: &Path, opts: &SaqOptions) -> Result<Vec<String>> {
    let primary = parse_labels(&opts.subjects_primary);
    let secondary = parse_labels(&opts.subjects_secondary);
    if primary.len() != secondary.len() {
        return Err(GenerateError::Config(format!(
            "primary subject list has {} entries but secondary has {}",
            primary.len(),
            secondary.len()
        )));
    }
    let ranges = parse_ranges(&opts.sequences)?;

    let template = Package::open(template_path)?;
    let template_fragments = fragment_count(&template)?;
    if template_fragments == 0 {
        return Err(GenerateError::Config(
            "template contains no question fragments".to_string(),
        ));
    }
    fs::create_dir_all(output_dir)?;

    let batch = batch_id();
    let sets = effective_sets(opts.multi_set, opts.set_count);
    let mut created = Vec::with_capacity(sets as usize);

    for set_index in 1..=sets {
        let mut out = OutputDocument::new();

        for (subject_primary, subject_secondary) in primary.iter().zip(&secondary) {
            for range in &ranges {
                let needed = if opts.questions_per_range > 0 {
                    range.len().min(opts.questions_per_range)
                } else {
                    range.len()
                };
                for offset in 0..needed {
                    let serial = range.start + offset;
                    let source_index = ((serial - 1) as usize) % template_fragments;
                    let fragment = fragment_at(&template, source_index)?;
                    let mut table = clone_fragment(&template, fragment, out.package_mut()?)?;

                    normalize_anchoring(&mut table);
                    ensure_borders(&mut table);
                    set_labeled_cell_text(
                        &mut table,
                        SAQ_LAYOUT.subject_primary,
                        subject_primary,
                        Script::Bengali,
                    );
                    set_labeled_cell_text(
                        &mut table,
                        SAQ_LAYOUT.subject_secondary,
                        subject_secondary,
                        Script::Latin,
                    );
                    set_labeled_cell_text(
                        &mut table,
                        SAQ_LAYOUT.serial,
                        &serial.to_string(),
                        Script::Latin,
                    );
                    set_labeled_cell_text(
                        &mut table,
                        SAQ_LAYOUT.mark,
                        &opts.question_mark.to_string(),
                        Script::Latin,
                    );
                    if sets > 1 {
                        append_label_to_row(
                            &mut table,
                            SAQ_LAYOUT.set_label_row,
                            &format!(" [Set-{set_index}] "),
                        );
                    }
                    out.append_fragment(table)?;
                }
            }
        }

        let name = if sets == 1 {
            format!("SAQ_{batch}.docx")
        } else {
            format!("SAQ_Set{set_index}_{batch}.docx")
        };
        out.finalize_and_save(&output_dir.join(&name))?;
        info!(%name, set_index, "generated SAQ package");
        created.push(name);
    }
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::fragment::{body_of, body_of_mut};
    use crate::xml::XmlNode;
    use std::path::PathBuf;

    fn saq_table() -> XmlNode {
        let mut tbl = XmlNode::new("w:tbl");
        for r in 0..3 {
            let mut tr = XmlNode::new("w:tr");
            for c in 0..2 {
                tr.push_child(XmlNode::new("w:tc").with_child(
                    XmlNode::new("w:p").with_child(
                        XmlNode::new("w:r")
                            .with_child(XmlNode::new("w:t").with_text(format!("{r}.{c}"))),
                    ),
                ));
            }
            tbl.push_child(tr);
        }
        tbl
    }

    fn write_template(dir: &std::path::Path, tables: Vec<XmlNode>) -> PathBuf {
        let mut package = Package::create_empty();
        let body = body_of_mut(&mut package).unwrap();
        for table in tables {
            body.push_child(table);
        }
        let path = dir.join("SaqSample.docx");
        package.save(&path).unwrap();
        path
    }

    fn tables_of(package: &Package) -> Vec<XmlNode> {
        body_of(package)
            .unwrap()
            .find_descendants("tbl")
            .into_iter()
            .cloned()
            .collect()
    }

    fn cell_text(tbl: &XmlNode, row: usize, col: usize) -> String {
        tbl.child_elements()
            .filter(|e| e.local_name() == "tr")
            .nth(row)
            .unwrap()
            .child_elements()
            .filter(|e| e.local_name() == "tc")
            .nth(col)
            .unwrap()
            .collect_text()
    }

    fn opts() -> SaqOptions {
        SaqOptions {
            questions_per_range: 0,
            question_mark: 5,
            subjects_primary: "পদার্থ,রসায়ন".to_string(),
            subjects_secondary: "Physics,Chemistry".to_string(),
            sequences: "1-3".to_string(),
            multi_set: false,
            set_count: 1,
        }
    }

    #[test]
    fn test_fragment_count_is_sum_over_pairs_and_ranges() {
        let dir = tempfile::tempdir().unwrap();
        let template = write_template(dir.path(), vec![saq_table()]);
        let out_dir = dir.path().join("out");

        // 2 subject pairs x (3 + 2) serials.
        let mut o = opts();
        o.sequences = "1-3,10-11".to_string();
        let names = generate(&template, &out_dir, &o).unwrap();
        let package = Package::open(out_dir.join(&names[0])).unwrap();
        assert_eq!(tables_of(&package).len(), 10);
    }

    #[test]
    fn test_cap_truncates_each_range() {
        let dir = tempfile::tempdir().unwrap();
        let template = write_template(dir.path(), vec![saq_table()]);
        let out_dir = dir.path().join("out");

        let mut o = opts();
        o.questions_per_range = 2;
        let names = generate(&template, &out_dir, &o).unwrap();
        let package = Package::open(out_dir.join(&names[0])).unwrap();
        let tables = tables_of(&package);
        // 2 pairs x min(3, 2) serials.
        assert_eq!(tables.len(), 4);
        // Serials restart at the range's start for each pair.
        assert_eq!(cell_text(&tables[0], 1, 0), "1");
        assert_eq!(cell_text(&tables[1], 1, 0), "2");
        assert_eq!(cell_text(&tables[2], 1, 0), "1");
    }

    #[test]
    fn test_bilingual_cells_and_mark() {
        let dir = tempfile::tempdir().unwrap();
        let template = write_template(dir.path(), vec![saq_table()]);
        let out_dir = dir.path().join("out");

        let names = generate(&template, &out_dir, &opts()).unwrap();
        let package = Package::open(out_dir.join(&names[0])).unwrap();
        let tables = tables_of(&package);

        assert_eq!(cell_text(&tables[0], 0, 0), "পদার্থ");
        assert_eq!(cell_text(&tables[0], 0, 1), "Physics");
        assert_eq!(cell_text(&tables[0], 1, 1), "5");
        assert_eq!(cell_text(&tables[3], 0, 1), "Chemistry");

        // Primary subject runs carry complex-script properties.
        let rpr = &tables[0]
            .child_elements()
            .next()
            .unwrap()
            .find_descendants("rPr")[0];
        assert!(rpr.first_child("rtl").is_some());
        assert_eq!(
            rpr.first_child("rFonts").unwrap().attr("cs"),
            Some("SutonnyMJ")
        );
    }

    #[test]
    fn test_single_set_name_has_no_set_index() {
        let dir = tempfile::tempdir().unwrap();
        let template = write_template(dir.path(), vec![saq_table()]);
        let names = generate(&template, &dir.path().join("out"), &opts()).unwrap();
        assert_eq!(names.len(), 1);
        assert!(names[0].starts_with("SAQ_"));
        assert!(!names[0].contains("Set"));
    }

    #[test]
    fn test_multi_set_names_and_labels() {
        let dir = tempfile::tempdir().unwrap();
        let template = write_template(dir.path(), vec![saq_table()]);
        let out_dir = dir.path().join("out");

        let mut o = opts();
        o.multi_set = true;
        o.set_count = 2;
        let names = generate(&template, &out_dir, &o).unwrap();
        assert_eq!(names.len(), 2);
        assert!(names[0].starts_with("SAQ_Set1_"));
        assert!(names[1].starts_with("SAQ_Set2_"));

        for (i, name) in names.iter().enumerate() {
            let package = Package::open(out_dir.join(name)).unwrap();
            for table in tables_of(&package) {
                let question_row = cell_text(&table, 2, 0);
                assert!(question_row.contains(&format!(" [Set-{}] ", i + 1)));
            }
        }
    }

    #[test]
    fn test_mismatched_subject_lists_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let template = write_template(dir.path(), vec![saq_table()]);
        let mut o = opts();
        o.subjects_secondary = "Physics".to_string();
        assert!(matches!(
            generate(&template, &dir.path().join("out"), &o),
            Err(GenerateError::Config(_))
        ));
    }

    #[test]
    fn test_reversed_range_rejected_before_output() {
        let dir = tempfile::tempdir().unwrap();
        let template = write_template(dir.path(), vec![saq_table()]);
        let out_dir = dir.path().join("out");
        let mut o = opts();
        o.sequences = "5-3".to_string();
        assert!(matches!(
            generate(&template, &out_dir, &o),
            Err(GenerateError::Config(_))
        ));
        assert!(!out_dir.exists());
    }
}
