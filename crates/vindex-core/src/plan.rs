//! Plan model and plan-to-operator resolution.

use serde::{Deserialize, Serialize};

use crate::error::{Result, VindexError};
use crate::task::{Operator, Task};

/// Prefix shared by all synthetic skip operators and plan entries.
pub const SKIP_ACTION_PREFIX: &str = "(skip-action plan-pos-";

/// The unit annotation of a plan file's cost trailer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostKind {
    Unit,
    General,
}

impl CostKind {
    pub fn label(&self) -> &'static str {
        match self {
            CostKind::Unit => "unit cost",
            CostKind::General => "general cost",
        }
    }
}

/// One entry of a plan: either a named action of the task, or a synthetic
/// marker recording that the action at a linear position was elided. Skip
/// markers are never resolved against the operator table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanStep {
    Action(String),
    Skip(usize),
}

impl PlanStep {
    pub fn is_skip(&self) -> bool {
        matches!(self, PlanStep::Skip(_))
    }

    pub fn action_name(&self) -> Option<&str> {
        match self {
            PlanStep::Action(name) => Some(name),
            PlanStep::Skip(_) => None,
        }
    }
}

/// An ordered action sequence with its declared total cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub steps: Vec<PlanStep>,
    pub cost: u64,
    pub cost_kind: CostKind,
}

impl Plan {
    pub fn new(steps: Vec<PlanStep>, cost: u64, cost_kind: CostKind) -> Self {
        Self {
            steps,
            cost,
            cost_kind,
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// A plan is perfectly justified when none of its entries were elided.
    pub fn is_perfectly_justified(&self) -> bool {
        !self.steps.iter().any(PlanStep::is_skip)
    }

    /// 1-based positions of the elided entries.
    pub fn skip_positions(&self) -> Vec<usize> {
        self.steps
            .iter()
            .filter_map(|step| match step {
                PlanStep::Skip(pos) => Some(pos + 1),
                PlanStep::Action(_) => None,
            })
            .collect()
    }
}

/// Resolves plan steps to concrete operator instances.
///
/// Ordered mode yields one owned instance per plan position; unordered mode
/// yields one instance per distinct operator name, in first-occurrence
/// order. Skip markers are rejected here: a plan fed to the analyzer or the
/// task builder must consist of real actions only.
pub fn resolve_operators(task: &Task, plan: &Plan, ordered: bool) -> Result<Vec<Operator>> {
    let slots = resolve_operators_with_gaps(task, plan, ordered)?;
    slots
        .into_iter()
        .enumerate()
        .map(|(index, slot)| {
            slot.ok_or_else(|| VindexError::UnknownOperator {
                name: format!("{SKIP_ACTION_PREFIX}{index})"),
            })
        })
        .collect()
}

/// Like [`resolve_operators`], but skip markers resolve to empty slots so
/// positions keep their original numbering. Used when linking a plan that
/// already went through elimination.
pub fn resolve_operators_with_gaps(
    task: &Task,
    plan: &Plan,
    ordered: bool,
) -> Result<Vec<Option<Operator>>> {
    let index = task.operator_index();
    let mut resolved = Vec::with_capacity(plan.len());
    let mut seen = std::collections::HashSet::new();
    for step in &plan.steps {
        match step {
            PlanStep::Skip(_) => resolved.push(None),
            PlanStep::Action(name) => {
                if !ordered && !seen.insert(name.clone()) {
                    continue;
                }
                let op_index =
                    *index
                        .get(name.as_str())
                        .ok_or_else(|| VindexError::UnknownOperator {
                            name: name.clone(),
                        })?;
                resolved.push(Some(task.operators[op_index].clone()));
            }
        }
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Effect, Fact, Variables};

    fn two_op_task() -> Task {
        Task {
            variables: Variables {
                ranges: vec![3],
                axiom_layers: vec![-1],
                value_names: vec![vec![
                    "Atom level(low)".to_string(),
                    "Atom level(mid)".to_string(),
                    "Atom level(high)".to_string(),
                ]],
            },
            mutexes: vec![],
            init: vec![0],
            goal: vec![Fact::new(0, 2)],
            operators: vec![
                Operator::new("(raise low mid)", vec![], vec![Effect::new(0, Some(0), 1)], 1),
                Operator::new("(raise mid high)", vec![], vec![Effect::new(0, Some(1), 2)], 1),
            ],
            axioms: vec![],
            metric: true,
        }
    }

    fn plan_of(names: &[&str]) -> Plan {
        Plan::new(
            names
                .iter()
                .map(|name| PlanStep::Action(name.to_string()))
                .collect(),
            names.len() as u64,
            CostKind::General,
        )
    }

    #[test]
    fn test_ordered_resolution_clones_per_position() {
        let task = two_op_task();
        let plan = plan_of(&["(raise low mid)", "(raise mid high)", "(raise low mid)"]);
        let ops = resolve_operators(&task, &plan, true).unwrap();
        assert_eq!(ops.len(), 3);
        assert_eq!(ops[0].name, ops[2].name);
    }

    #[test]
    fn test_unordered_resolution_keeps_first_occurrences() {
        let task = two_op_task();
        let plan = plan_of(&["(raise low mid)", "(raise mid high)", "(raise low mid)"]);
        let ops = resolve_operators(&task, &plan, false).unwrap();
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].name, "(raise low mid)");
        assert_eq!(ops[1].name, "(raise mid high)");
    }

    #[test]
    fn test_unknown_operator_is_an_error() {
        let task = two_op_task();
        let plan = plan_of(&["(levitate)"]);
        assert!(matches!(
            resolve_operators(&task, &plan, true),
            Err(VindexError::UnknownOperator { .. })
        ));
    }

    #[test]
    fn test_skip_steps_resolve_to_gaps() {
        let task = two_op_task();
        let plan = Plan::new(
            vec![
                PlanStep::Action("(raise low mid)".to_string()),
                PlanStep::Skip(1),
                PlanStep::Action("(raise mid high)".to_string()),
            ],
            2,
            CostKind::General,
        );
        assert!(resolve_operators(&task, &plan, true).is_err());
        let slots = resolve_operators_with_gaps(&task, &plan, true).unwrap();
        assert!(slots[0].is_some());
        assert!(slots[1].is_none());
        assert!(slots[2].is_some());
        assert_eq!(plan.skip_positions(), vec![2]);
        assert!(!plan.is_perfectly_justified());
    }
}
