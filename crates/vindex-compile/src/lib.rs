//! # Vindex Compile
//!
//! Builds the action-elimination task for a plan and maps solutions of the
//! derived task back to plans over the original cost function.

pub mod builder;
pub mod reconcile;
pub mod relevance;
pub mod scaling;
pub mod simplify;

pub use builder::{build_elimination_task, EliminationOptions, EliminationTask, Reduction};
pub use reconcile::{reconcile_solution, Reconciliation};
pub use relevance::{find_relevant_facts, prune_domains, IRRELEVANT_FACT_NAME};
pub use scaling::{compute_scaling_factor, CostScalingRecord, COST_RECORD_FILE};
pub use simplify::{Passthrough, ReorderVariables, Simplify};
