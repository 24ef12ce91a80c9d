//! Contracts for the external task post-processing passes.
//!
//! Unreachable-fact pruning and variable reordering are provided by the
//! translator toolchain, not reimplemented here. The builder invokes them
//! through these traits; [`Passthrough`] stands in when no external passes
//! are wired up.

use vindex_core::{Result, Task};

/// Removes unreachable facts and useless variables, in place.
///
/// Implementations signal [`vindex_core::VindexError::TriviallySolvable`]
/// when no operators are needed at all; the builder treats that as fatal.
pub trait Simplify {
    fn filter_unreachable_facts(&self, task: &mut Task) -> Result<()>;
}

/// Permutes variables and values without changing task semantics.
pub trait ReorderVariables {
    fn apply(&self, task: &mut Task, reorder: bool, filter_unimportant: bool) -> Result<()>;
}

/// Identity implementation of both passes.
#[derive(Debug, Default, Clone, Copy)]
pub struct Passthrough;

impl Simplify for Passthrough {
    fn filter_unreachable_facts(&self, _task: &mut Task) -> Result<()> {
        Ok(())
    }
}

impl ReorderVariables for Passthrough {
    fn apply(&self, _task: &mut Task, _reorder: bool, _filter_unimportant: bool) -> Result<()> {
        Ok(())
    }
}
