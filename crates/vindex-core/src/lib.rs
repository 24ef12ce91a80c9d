//! # Vindex Core
//!
//! Task and plan model for the Vindex plan-justification engine.
//!
//! This crate provides the fundamental building blocks:
//! - [`Task`] - an immutable SAS+ planning task
//! - [`Plan`] - an ordered action sequence with its declared cost
//! - file codecs for the version-3 task format and for plan files
//! - [`VindexError`] - the engine's error taxonomy

pub mod error;
pub mod plan;
pub mod plan_codec;
pub mod sas_codec;
pub mod task;

// Re-exports for convenience
pub use error::{Result, VindexError};
pub use plan::{
    resolve_operators, resolve_operators_with_gaps, CostKind, Plan, PlanStep, SKIP_ACTION_PREFIX,
};
pub use task::{Axiom, Effect, Fact, MutexGroup, Operator, Task, Variables};
