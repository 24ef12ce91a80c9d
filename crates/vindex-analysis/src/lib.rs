//! # Vindex Analysis
//!
//! Backward achiever-fixpoint classification of plan actions and fusion of
//! necessary-action runs into macro operators.

pub mod achievers;
pub mod macro_ops;
pub mod necessity;

pub use achievers::{Achiever, FactAchievers, INITIAL_STATE};
pub use macro_ops::{
    expand_macro_name, is_macro_name, merge_necessary_streaks, MacroPlan, MACRO_OP_MARKER,
};
pub use necessity::{
    find_necessary_actions, find_unnecessary_actions, virtual_goal_operator, NecessityAnalysis,
};
