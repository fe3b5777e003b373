//! Template fragments and the fragment layout contracts.
//!
//! A fragment is one self-contained table representing exactly one question.
//! Its row/column shape is fixed by agreement with the template author; the
//! layout contracts below are the single place those positional assumptions
//! live, so the one hard assumption of the whole system (the template's
//! shape never changes) is visible and testable in isolation.

use crate::opc::error::{OpcError, Result};
use crate::opc::package::Package;
use crate::xml::XmlNode;

/// A (row, column) coordinate into a fragment's table shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRef {
    pub row: usize,
    pub col: usize,
}

impl CellRef {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

/// Layout contract for MCQ fragments.
///
/// Row 0 holds the serial number and subject, row 1 the question text,
/// rows 2..=5 the four options, and row 7 (or the last row in shorter
/// fragments) the correct-option letter.
#[derive(Debug, Clone, Copy)]
pub struct McqLayout {
    /// Cell overwritten with the question serial number
    pub serial: CellRef,
    /// Cell overwritten with the subject label
    pub subject: CellRef,
    /// Row receiving the per-set label in multi-set mode
    pub set_label_row: usize,
    /// Minimum row count for answer-tag derivation to apply
    pub min_rows: usize,
    /// Row whose text names the correct option
    pub answer_source_row: usize,
    /// Row index per option letter, in 'a'..='d' order
    pub option_rows: [usize; 4],
}

pub const MCQ_LAYOUT: McqLayout = McqLayout {
    serial: CellRef::new(0, 0),
    subject: CellRef::new(0, 1),
    set_label_row: 1,
    min_rows: 6,
    answer_source_row: 7,
    option_rows: [2, 3, 4, 5],
};

/// Layout contract for SAQ fragments.
///
/// Row 0 holds the bilingual subject pair, row 1 the serial number and mark
/// value, row 2 the question text.
#[derive(Debug, Clone, Copy)]
pub struct SaqLayout {
    /// Cell overwritten with the primary (right-to-left-script) subject
    pub subject_primary: CellRef,
    /// Cell overwritten with the secondary (Latin-script) subject
    pub subject_secondary: CellRef,
    /// Cell overwritten with the question serial number
    pub serial: CellRef,
    /// Cell overwritten with the mark value
    pub mark: CellRef,
    /// Row receiving the per-set label in multi-set mode
    pub set_label_row: usize,
}

pub const SAQ_LAYOUT: SaqLayout = SaqLayout {
    subject_primary: CellRef::new(0, 0),
    subject_secondary: CellRef::new(0, 1),
    serial: CellRef::new(1, 0),
    mark: CellRef::new(1, 1),
    set_label_row: 2,
};

/// Count the template fragments (tables) in a package's main document body.
pub fn fragment_count(package: &Package) -> Result<usize> {
    let body = body_of(package)?;
    Ok(body.find_descendants("tbl").len())
}

/// Borrow the template fragment at the given index, in document order.
pub fn fragment_at(package: &Package, index: usize) -> Result<&XmlNode> {
    let body = body_of(package)?;
    let tables = body.find_descendants("tbl");
    tables.get(index).copied().ok_or_else(|| {
        OpcError::Malformed(format!(
            "template has {} fragment(s), index {index} out of range",
            tables.len()
        ))
    })
}

/// The body element of the package's main document part.
pub fn body_of(package: &Package) -> Result<&XmlNode> {
    let main = package.main_document_part()?;
    let root = main
        .xml()
        .ok_or_else(|| OpcError::Malformed("main document part is not XML".to_string()))?;
    root.first_child("body")
        .ok_or_else(|| OpcError::Malformed("main document part has no body".to_string()))
}

/// The body element of the package's main document part, mutably.
pub fn body_of_mut(package: &mut Package) -> Result<&mut XmlNode> {
    let main = package.main_document_part_mut()?;
    let root = main
        .xml_mut()
        .ok_or_else(|| OpcError::Malformed("main document part is not XML".to_string()))?;
    root.first_child_mut("body")
        .ok_or_else(|| OpcError::Malformed("main document part has no body".to_string()))
}
