//! Serial-number range parsing and label lookup.
//!
//! Request inputs carry subjects and serial ranges as comma-separated
//! strings. Both lists are trimmed, empty entries dropped, and zipped into
//! `SubjectRange`s; every malformed token is a configuration error raised
//! before any output package exists. Reversed tokens (`"5-3"`) are rejected
//! outright rather than silently reordered.

use crate::error::{GenerateError, Result};

/// An inclusive, 1-based range of serial numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceRange {
    pub start: u32,
    pub end: u32,
}

impl SequenceRange {
    pub fn contains(&self, q: u32) -> bool {
        (self.start..=self.end).contains(&q)
    }

    /// Number of serials the range covers.
    pub fn len(&self) -> u32 {
        self.end - self.start + 1
    }
}

/// A label bound to a contiguous serial range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectRange {
    pub label: String,
    pub range: SequenceRange,
}

/// Split a comma-separated list into trimmed, non-empty entries.
pub fn parse_labels(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse a comma-separated list of `start-end` tokens.
///
/// Each token must name two positive integers with `start <= end`; anything
/// else is a `Config` error naming the offending token.
pub fn parse_ranges(list: &str) -> Result<Vec<SequenceRange>> {
    let mut ranges = Vec::new();
    for token in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        ranges.push(parse_range_token(token)?);
    }
    Ok(ranges)
}

fn parse_range_token(token: &str) -> Result<SequenceRange> {
    let bad = || GenerateError::Config(format!("invalid range token {token:?}, expected e.g. 1-10"));
    let (start, end) = token.split_once('-').ok_or_else(bad)?;
    let start: u32 = start.trim().parse().map_err(|_| bad())?;
    let end: u32 = end.trim().parse().map_err(|_| bad())?;
    if start == 0 || end == 0 {
        return Err(GenerateError::Config(format!(
            "range token {token:?} must use positive 1-based serial numbers"
        )));
    }
    if end < start {
        return Err(GenerateError::Config(format!(
            "range token {token:?} is reversed (end before start)"
        )));
    }
    Ok(SequenceRange { start, end })
}

/// Zip a label list with a range list into subject ranges.
pub fn build_subject_ranges(labels: &str, ranges: &str) -> Result<Vec<SubjectRange>> {
    let labels = parse_labels(labels);
    let ranges = parse_ranges(ranges)?;
    if labels.len() != ranges.len() {
        return Err(GenerateError::Config(format!(
            "subject list has {} entries but range list has {}",
            labels.len(),
            ranges.len()
        )));
    }
    Ok(labels
        .into_iter()
        .zip(ranges)
        .map(|(label, range)| SubjectRange { label, range })
        .collect())
}

/// Look up the label for serial `q`: first containing range in input order
/// wins; ranges need not be disjoint. `None` when nothing covers `q`.
pub fn label_for(ranges: &[SubjectRange], q: u32) -> Option<&str> {
    ranges
        .iter()
        .find(|sr| sr.range.contains(q))
        .map(|sr| sr.label.as_str())
}
