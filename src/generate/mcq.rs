//! Multiple-choice question document generation.

use crate::docx::cell::{append_label_to_row, apply_answer_tag, set_cell_text};
use crate::docx::clone::clone_fragment;
use crate::docx::fragment::{MCQ_LAYOUT, fragment_at, fragment_count};
use crate::docx::normalize::{ensure_borders, normalize_anchoring};
use crate::error::{GenerateError, Result};
use crate::generate::output::OutputDocument;
use crate::generate::ranges::{build_subject_ranges, label_for};
use crate::generate::{batch_id, effective_sets};
use crate::opc::package::Package;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Inputs for one MCQ generation request, pre-validated in shape by the
/// caller but not in content.
#[derive(Debug, Clone)]
pub struct McqOptions {
    /// Number of questions per output package; must be positive.
    pub question_count: u32,
    /// Comma-separated subject labels, zipped against `sequences`.
    pub subjects: String,
    /// Comma-separated `start-end` serial ranges.
    pub sequences: String,
    /// Derive and write the `Answer` marker per fragment.
    pub include_answer_tags: bool,
    pub multi_set: bool,
    pub set_count: u32,
}

/// Generate one MCQ package per effective set and return the file names.
pub fn generate(template_path: &Path, output_dir: &Path, opts: &McqOptions) -> Result<Vec<String>> {
    if opts.question_count == 0 {
        return Err(GenerateError::Config(
            "question count must be positive".to_string(),
        ));
    }
    let subject_ranges = build_subject_ranges(&opts.subjects, &opts.sequences)?;

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

        for q in 1..=opts.question_count {
            let source_index = ((q - 1) as usize) % template_fragments;
            let fragment = fragment_at(&template, source_index)?;
            let mut table = clone_fragment(&template, fragment, out.package_mut()?)?;

            normalize_anchoring(&mut table);
            ensure_borders(&mut table);
            set_cell_text(&mut table, MCQ_LAYOUT.serial, &q.to_string());

            let subject = match label_for(&subject_ranges, q) {
                Some(label) => label,
                None => {
                    debug!(q, "no subject range covers this serial, labeling empty");
                    ""
                }
            };
            set_cell_text(&mut table, MCQ_LAYOUT.subject, subject);

            if opts.include_answer_tags {
                apply_answer_tag(&mut table);
            }
            if sets > 1 {
                append_label_to_row(&mut table, MCQ_LAYOUT.set_label_row, &format!(" [Set-{set_index}] "));
            }
            out.append_fragment(table)?;
        }

        let name = format!("GeneratedQuestions_{batch}_Set{set_index}.docx");
        out.finalize_and_save(&output_dir.join(&name))?;
        info!(%name, set_index, "generated MCQ package");
        created.push(name);
    }
    Ok(created)
}
