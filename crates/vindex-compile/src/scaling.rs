//! Cost scaling for tasks with zero-cost operators.
//!
//! An optimal solver minimizes total cost, but zero-cost actions could be
//! kept for free while skip actions save nothing. Scaling gives every
//! zero-cost operator cost 1 and multiplies every positive cost so that
//! keeping all former zero-cost operators is still cheaper than avoiding a
//! single positive-cost one. The record written here lets reconciliation
//! recover the true costs afterwards.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;
use vindex_core::{Operator, Result};

/// Default file name of the persisted scaling record.
pub const COST_RECORD_FILE: &str = "original-op-costs.txt";

const EPSILON: f64 = 0.001;

/// Side record connecting a scaled task to the original cost function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostScalingRecord {
    pub num_zero_cost_operators: usize,
    pub cost_scaling_factor: u64,
    /// Original cost per operator name; empty when nothing was scaled.
    pub original_costs: HashMap<String, u64>,
}

impl CostScalingRecord {
    /// Scales `ops` in place and returns the record describing the change.
    /// Without zero-cost operators the costs are left untouched and the
    /// record only documents that fact.
    pub fn apply(ops: &mut [Operator]) -> Self {
        let (factor, zero_count) = compute_scaling_factor(ops);
        debug_assert!(factor >= 1);
        let mut original_costs = HashMap::new();
        if zero_count > 0 {
            for op in ops.iter_mut() {
                original_costs.insert(op.name.clone(), op.cost);
                if op.cost == 0 {
                    op.cost = 1;
                } else {
                    op.cost *= factor;
                }
            }
            info!(
                zero_cost_operators = zero_count,
                factor, "scaled operator costs"
            );
        }
        Self {
            num_zero_cost_operators: zero_count,
            cost_scaling_factor: factor,
            original_costs,
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string(self)?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
    }
}

/// Chooses the multiplier `m = ceil(zero_count / min_positive_cost + eps)`,
/// which guarantees `m * min_positive_cost > zero_count`. Without any
/// positive-cost operator the multiplier is 1.
pub fn compute_scaling_factor(ops: &[Operator]) -> (u64, usize) {
    let zero_count = ops.iter().filter(|op| op.cost == 0).count();
    let min_positive = ops.iter().map(|op| op.cost).filter(|&cost| cost > 0).min();
    let factor = match min_positive {
        Some(min) => ((zero_count as f64 / min as f64) + EPSILON).ceil() as u64,
        None => 1,
    };
    (factor, zero_count)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(name: &str, cost: u64) -> Operator {
        Operator::new(name, vec![], vec![], cost)
    }

    #[test]
    fn test_factor_for_two_zero_cost_and_min_three() {
        let ops = vec![op("(a)", 0), op("(b)", 0), op("(c)", 3)];
        let (factor, zero_count) = compute_scaling_factor(&ops);
        assert_eq!(factor, 1);
        assert_eq!(zero_count, 2);
        assert!(factor * 3 > zero_count as u64);
    }

    #[test]
    fn test_factor_exceeds_zero_count_times_min() {
        let ops = vec![op("(a)", 0), op("(b)", 0), op("(c)", 0), op("(d)", 2)];
        let (factor, zero_count) = compute_scaling_factor(&ops);
        assert_eq!(factor, 2);
        assert!(factor * 2 > zero_count as u64);
    }

    #[test]
    fn test_no_positive_costs_yields_factor_one() {
        let ops = vec![op("(a)", 0)];
        assert_eq!(compute_scaling_factor(&ops), (1, 1));
    }

    #[test]
    fn test_apply_rewrites_costs_and_keeps_originals() {
        let mut ops = vec![op("(free)", 0), op("(cheap)", 1), op("(steep)", 4)];
        let record = CostScalingRecord::apply(&mut ops);
        assert_eq!(record.num_zero_cost_operators, 1);
        assert_eq!(record.cost_scaling_factor, 2);
        assert_eq!(ops[0].cost, 1);
        assert_eq!(ops[1].cost, 2);
        assert_eq!(ops[2].cost, 8);
        assert_eq!(record.original_costs["(free)"], 0);
        assert_eq!(record.original_costs["(steep)"], 4);
    }

    #[test]
    fn test_apply_without_zero_costs_is_identity() {
        let mut ops = vec![op("(cheap)", 1), op("(steep)", 4)];
        let record = CostScalingRecord::apply(&mut ops);
        assert_eq!(record.num_zero_cost_operators, 0);
        assert!(record.original_costs.is_empty());
        assert_eq!(ops[0].cost, 1);
        assert_eq!(ops[1].cost, 4);
    }

    #[test]
    fn test_record_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(COST_RECORD_FILE);
        let mut ops = vec![op("(free)", 0), op("(steep)", 4)];
        let record = CostScalingRecord::apply(&mut ops);
        record.save(&path).unwrap();
        assert_eq!(CostScalingRecord::load(&path).unwrap(), record);
    }
}
