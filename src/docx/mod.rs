//! WordprocessingML-level operations on top of the package model.
//!
//! Everything that understands document markup lives here: fragment layout
//! contracts, cloning with media rebase, structural normalization, cell
//! rewriting, validation, and finalization. The `opc` layer below knows
//! nothing about tables or drawings; the `generate` layer above knows
//! nothing about XML.

pub mod cell;
pub mod clone;
pub mod fragment;
pub mod finalize;
pub mod normalize;
pub mod validate;

pub use cell::Script;
pub use clone::{MediaResolver, clone_fragment};
pub use fragment::{CellRef, MCQ_LAYOUT, McqLayout, SAQ_LAYOUT, SaqLayout};
pub use validate::{Violation, validate};
