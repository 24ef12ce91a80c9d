//! Mapping solutions of the elimination task back to plans over the
//! original cost semantics.

use tracing::info;
use vindex_analysis::{expand_macro_name, is_macro_name};
use vindex_core::{Plan, PlanStep, Result, VindexError};

use crate::scaling::CostScalingRecord;

/// A cleaned solution plan and whether it beats the input plan's cost.
#[derive(Debug)]
pub struct Reconciliation {
    pub cleaned: Plan,
    pub improved: bool,
}

impl Reconciliation {
    /// The cleaned plan when it is strictly cheaper than the input plan;
    /// `None` means the input was already at least as good.
    pub fn into_improvement(self) -> Option<Plan> {
        self.improved.then_some(self.cleaned)
    }
}

/// Cleans a solution of the elimination task: macro operators expand back
/// into their member actions, skip entries are dropped, and the total cost
/// is restated in original costs when a scaling record applies.
pub fn reconcile_solution(
    solution: &Plan,
    original: &Plan,
    scaling: Option<&CostScalingRecord>,
) -> Result<Reconciliation> {
    let mut names = Vec::new();
    for step in &solution.steps {
        match step {
            PlanStep::Skip(_) => {}
            PlanStep::Action(name) if is_macro_name(name) => {
                names.extend(expand_macro_name(name));
            }
            PlanStep::Action(name) => names.push(name.clone()),
        }
    }

    let mut cost = solution.cost;
    if let Some(record) = scaling {
        // With zero zero-cost operators nothing was rescaled and the
        // solver-reported cost is already the true cost.
        if record.num_zero_cost_operators != 0 {
            cost = 0;
            for name in &names {
                cost += *record.original_costs.get(name).ok_or_else(|| {
                    VindexError::MissingOriginalCost { name: name.clone() }
                })?;
            }
        }
    }

    let cleaned = Plan::new(
        names.into_iter().map(PlanStep::Action).collect(),
        cost,
        original.cost_kind,
    );
    info!(
        old_cost = original.cost,
        new_cost = cleaned.cost,
        "reconciled solution plan"
    );
    Ok(Reconciliation {
        improved: cleaned.cost < original.cost,
        cleaned,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use vindex_analysis::MACRO_OP_MARKER;
    use vindex_core::CostKind;

    fn plan(steps: Vec<PlanStep>, cost: u64) -> Plan {
        Plan::new(steps, cost, CostKind::General)
    }

    fn action(name: &str) -> PlanStep {
        PlanStep::Action(name.to_string())
    }

    #[test]
    fn test_skip_entries_are_dropped() {
        let solution = plan(vec![action("(go)"), PlanStep::Skip(1), action("(stop)")], 3);
        let original = plan(vec![action("(go)"), action("(wait)"), action("(stop)")], 5);
        let result = reconcile_solution(&solution, &original, None).unwrap();
        assert!(result.improved);
        let cleaned = result.into_improvement().unwrap();
        assert_eq!(cleaned.steps, vec![action("(go)"), action("(stop)")]);
        assert_eq!(cleaned.cost, 3);
    }

    #[test]
    fn test_macro_names_expand_in_order() {
        let macro_name = format!("({MACRO_OP_MARKER}go{MACRO_OP_MARKER}turn)");
        let solution = plan(vec![action(&macro_name), action("(stop)")], 3);
        let original = plan(vec![action("(go)"), action("(turn)"), action("(stop)")], 5);
        let result = reconcile_solution(&solution, &original, None).unwrap();
        assert_eq!(
            result.cleaned.steps,
            vec![action("(go)"), action("(turn)"), action("(stop)")]
        );
    }

    #[test]
    fn test_scaled_costs_are_restated() {
        let record = CostScalingRecord {
            num_zero_cost_operators: 1,
            cost_scaling_factor: 2,
            original_costs: HashMap::from([
                ("(go)".to_string(), 0),
                ("(stop)".to_string(), 3),
            ]),
        };
        let solution = plan(vec![action("(go)"), action("(stop)")], 7);
        let original = plan(vec![action("(go)"), action("(wait)"), action("(stop)")], 4);
        let result = reconcile_solution(&solution, &original, Some(&record)).unwrap();
        assert_eq!(result.cleaned.cost, 3);
        assert!(result.improved);
    }

    #[test]
    fn test_zero_count_record_keeps_reported_cost() {
        let record = CostScalingRecord {
            num_zero_cost_operators: 0,
            cost_scaling_factor: 1,
            original_costs: HashMap::new(),
        };
        let solution = plan(vec![action("(go)")], 2);
        let original = plan(vec![action("(go)"), action("(wait)")], 4);
        let result = reconcile_solution(&solution, &original, Some(&record)).unwrap();
        assert_eq!(result.cleaned.cost, 2);
    }

    #[test]
    fn test_missing_cost_entry_is_an_error() {
        let record = CostScalingRecord {
            num_zero_cost_operators: 1,
            cost_scaling_factor: 1,
            original_costs: HashMap::new(),
        };
        let solution = plan(vec![action("(go)")], 1);
        let original = plan(vec![action("(go)")], 1);
        assert!(matches!(
            reconcile_solution(&solution, &original, Some(&record)),
            Err(VindexError::MissingOriginalCost { .. })
        ));
    }

    #[test]
    fn test_plan_without_artifacts_is_returned_unchanged() {
        let solution = plan(vec![action("(go)"), action("(stop)")], 5);
        let original = solution.clone();
        let result = reconcile_solution(&solution, &original, None).unwrap();
        assert_eq!(result.cleaned, original);
        assert!(!result.improved);
        assert!(result.into_improvement().is_none());
    }
}
