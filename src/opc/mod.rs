//! Open Packaging Convention (OPC) package model.
//!
//! In-memory representation of a zip-based compound-document package: a tree
//! of XML parts, a table of binary media parts, and a relationship graph
//! mapping each reference identifier used inside a part to the part it
//! names. Owns load/clone/save semantics for the assembly engine.

pub mod constants;
pub mod content_types;
pub mod error;
pub mod package;
pub mod packuri;
pub mod part;
pub mod phys;
pub mod rel;

pub use error::{OpcError, Result};
pub use package::{MAIN_DOCUMENT_PARTNAME, Package};
pub use packuri::PackUri;
pub use part::{Part, PartContent};
pub use rel::{Relationship, Relationships};
