//! Output-package builder.
//!
//! One `OutputDocument` per generated file. The builder walks a fixed state
//! machine (`Empty -> Filling -> Finalizing -> Saved`): fragments may only be
//! appended before finalization, and finalization consumes the builder so a
//! saved package can never be reopened for more fragments.

use crate::docx::finalize::finalize_and_save;
use crate::error::{GenerateError, Result};
use crate::opc::package::Package;
use crate::xml::XmlNode;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Empty,
    Filling,
    Finalizing,
    Saved,
}

pub struct OutputDocument {
    package: Package,
    state: State,
    fragments: usize,
}

impl OutputDocument {
    /// A fresh output package with an empty body.
    pub fn new() -> Self {
        Self {
            package: Package::create_empty(),
            state: State::Empty,
            fragments: 0,
        }
    }

    pub fn package(&self) -> &Package {
        &self.package
    }

    /// Mutable access to the package, used as the clone target while media
    /// parts are rebased into it. Only legal before finalization.
    pub fn package_mut(&mut self) -> Result<&mut Package> {
        match self.state {
            State::Empty | State::Filling => Ok(&mut self.package),
            _ => Err(GenerateError::InvalidState(
                "package no longer accepts content",
            )),
        }
    }

    pub fn fragment_count(&self) -> usize {
        self.fragments
    }

    /// Append a prepared fragment to the body, followed by one blank
    /// separator paragraph.
    pub fn append_fragment(&mut self, fragment: XmlNode) -> Result<()> {
        match self.state {
            State::Empty | State::Filling => {}
            _ => {
                return Err(GenerateError::InvalidState(
                    "cannot append to a finalized package",
                ));
            }
        }
        let body = crate::docx::fragment::body_of_mut(&mut self.package)?;
        body.push_child(fragment);
        body.push_child(separator_paragraph());
        self.state = State::Filling;
        self.fragments += 1;
        Ok(())
    }

    /// Finalize the package and write it to `path`, consuming the builder.
    pub fn finalize_and_save(mut self, path: &Path) -> Result<()> {
        self.state = State::Finalizing;
        debug!(fragments = self.fragments, path = %path.display(), "finalizing output package");
        finalize_and_save(&mut self.package, path)?;
        self.state = State::Saved;
        Ok(())
    }
}

impl Default for OutputDocument {
    fn default() -> Self {
        Self::new()
    }
}

fn separator_paragraph() -> XmlNode {
    XmlNode::new("w:p").with_child(
        XmlNode::new("w:r").with_child(
            XmlNode::new("w:t")
                .with_attr("xml:space", "preserve")
                .with_text(" "),
        ),
    )
}
