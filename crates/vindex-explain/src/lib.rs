//! # Vindex Explain
//!
//! Builds producer/fact/consumer dependency graphs for plans and answers
//! structured queries about why an action was redundant or is still
//! needed.

pub mod chains;
pub mod explain;
pub mod links;

pub use chains::{find_causal_chains, links_by_consumer, CausalChain};
pub use explain::{
    redundant_objects, ConsumerKind, Explainer, Explanation, Production, Requirement,
    RequirementKind, Source,
};
pub use links::{extract_links, CausalLink, PlanLinks, INITIAL_STATE_PRODUCER};
