//! Document assembly: request inputs in, generated file names out.
//!
//! Each generator mode opens the template once, builds every output package
//! for the batch sequentially, and returns the generated file names (not
//! paths); turning names into downloadable artifacts is the caller's job.

pub mod mcq;
pub mod output;
pub mod ranges;
pub mod saq;

pub use mcq::McqOptions;
pub use output::OutputDocument;
pub use ranges::{SequenceRange, SubjectRange};
pub use saq::SaqOptions;

use chrono::Local;

/// Batch identifier shared by every file of one generation call.
fn batch_id() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// How many output packages a request produces.
fn effective_sets(multi_set: bool, set_count: u32) -> u32 {
    if multi_set && set_count > 1 { set_count } else { 1 }
}
