//! Examgen - exam-question document assembly for OOXML packages
//!
//! This library clones question fragments (tables) out of a template
//! WordprocessingML package, relabels each clone with per-question metadata,
//! re-embeds its images, normalizes the markup to a canonical shape, and
//! writes one or more finished `.docx` packages.
//!
//! # Layers
//!
//! - **OPC package model** (`opc`): zip container, content types, parts,
//!   relationship graphs, atomic save.
//! - **Document operations** (`docx`): fragment layout contracts, cloning
//!   with media rebase, anchoring/border normalization, cell rewriting,
//!   validation and finalization.
//! - **Assembly** (`generate`): MCQ and SAQ generator modes driven by plain
//!   request values, returning generated file names.
//!
//! # Example - Generating MCQ packages
//!
//! ```no_run
//! use examgen::generate::{McqOptions, mcq};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let opts = McqOptions {
//!     question_count: 4,
//!     subjects: "phy,chem".to_string(),
//!     sequences: "1-2,3-4".to_string(),
//!     include_answer_tags: true,
//!     multi_set: false,
//!     set_count: 1,
//! };
//! let names = mcq::generate(
//!     Path::new("Question/McqSample.docx"),
//!     Path::new("output"),
//!     &opts,
//! )?;
//! println!("generated: {names:?}");
//! # Ok(())
//! # }
//! ```

pub mod docx;
pub mod error;
pub mod generate;
pub mod media;
pub mod opc;
pub mod xml;

pub use error::{GenerateError, Result};
pub use generate::{McqOptions, SaqOptions};
pub use opc::{OpcError, Package};
