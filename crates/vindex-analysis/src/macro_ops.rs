//! Fusion of consecutive trivially necessary actions into macro operators.
//!
//! A maximal run (length >= 2) of necessary actions without conditional
//! effects collapses into one operator that keeps the first condition and
//! the last effect seen per variable. This shrinks the derived task's
//! search space without changing which plans it admits.

use indexmap::IndexMap;
use tracing::debug;
use vindex_core::{Effect, Fact, Operator};

/// Separator embedded in macro-operator names; reconciliation splits on it
/// to recover the member actions.
pub const MACRO_OP_MARKER: &str = "-plan-macro-";

/// Operators after macro fusion, with necessity flags re-indexed to the new
/// sequence. Downstream components index flags by position, so the arrays
/// must match the operator list entry for entry.
#[derive(Debug)]
pub struct MacroPlan {
    pub operators: Vec<Operator>,
    pub necessary: Vec<bool>,
    pub unnecessary: Vec<bool>,
}

/// True for names produced by [`merge_necessary_streaks`].
pub fn is_macro_name(name: &str) -> bool {
    name.strip_prefix('(')
        .is_some_and(|rest| rest.starts_with(MACRO_OP_MARKER))
}

/// Splits a macro-operator name back into its member action names, in
/// original order.
pub fn expand_macro_name(name: &str) -> Vec<String> {
    name.trim_start_matches('(')
        .trim_end_matches(')')
        .split(MACRO_OP_MARKER)
        .filter(|part| !part.is_empty())
        .map(|part| format!("({part})"))
        .collect()
}

struct StreakState {
    prevail: IndexMap<usize, Fact>,
    pre_post: IndexMap<usize, Effect>,
    name: String,
    cost: u64,
}

impl StreakState {
    fn new() -> Self {
        Self {
            prevail: IndexMap::new(),
            pre_post: IndexMap::new(),
            name: String::new(),
            cost: 0,
        }
    }

    fn absorb(&mut self, op: &Operator, use_original_cost: bool) {
        // First condition seen for a variable is the macro's condition.
        for fact in &op.prevail {
            if !self.prevail.contains_key(&fact.var) && !self.pre_post.contains_key(&fact.var) {
                self.prevail.insert(fact.var, *fact);
            }
        }
        // Keep the first precondition and the latest effect per variable.
        for eff in &op.pre_post {
            if let Some(prev) = self.prevail.shift_remove(&eff.var) {
                self.pre_post.insert(
                    eff.var,
                    Effect {
                        var: eff.var,
                        pre: Some(prev.val),
                        post: eff.post,
                        conditions: eff.conditions.clone(),
                    },
                );
            } else if let Some(existing) = self.pre_post.get_mut(&eff.var) {
                existing.post = eff.post;
                existing.conditions = eff.conditions.clone();
            } else {
                self.pre_post.insert(eff.var, eff.clone());
            }
        }
        self.name.push_str(MACRO_OP_MARKER);
        self.name
            .push_str(op.name.trim_start_matches('(').trim_end_matches(')'));
        self.cost += if use_original_cost { op.cost } else { 1 };
    }

    fn emit(&mut self) -> Operator {
        let mut op = Operator::new(
            format!("({})", self.name),
            self.prevail.drain(..).map(|(_, fact)| fact).collect(),
            self.pre_post.drain(..).map(|(_, eff)| eff).collect(),
            self.cost,
        );
        op.is_macro = true;
        self.name.clear();
        self.cost = 0;
        op
    }
}

/// Merges maximal runs of trivially necessary, unconditional actions.
///
/// `necessary` carries one entry per plan position plus the virtual-goal
/// entry, so the run test can look one position ahead. A lone necessary
/// action is passed through unmodified; non-necessary actions are never
/// merged and keep their unnecessity flag.
pub fn merge_necessary_streaks(
    plan_ops: &[Operator],
    necessary: &[bool],
    unnecessary: &[bool],
    use_original_cost: bool,
) -> MacroPlan {
    debug_assert_eq!(necessary.len(), plan_ops.len() + 1);

    let plan_len = plan_ops.len();
    let mut streak = StreakState::new();
    let mut run_length = 0usize;
    let mut operators = Vec::new();
    let mut new_necessary = Vec::new();
    let mut new_unnecessary = Vec::new();

    for (index, op) in plan_ops.iter().enumerate() {
        if necessary[index] && !op.has_conditional_effects() {
            let next_mergeable = necessary[index + 1]
                && !(index + 1 < plan_len && plan_ops[index + 1].has_conditional_effects());
            // A lone necessary action with no mergeable successor passes
            // through untouched once the scan moves past it.
            if run_length < 1 && !next_mergeable {
                run_length = 1;
                continue;
            }
            streak.absorb(op, use_original_cost);
            run_length += 1;
        } else {
            if run_length > 1 {
                operators.push(streak.emit());
                new_necessary.push(true);
                new_unnecessary.push(false);
            }
            if run_length == 1 {
                operators.push(plan_ops[index - 1].clone());
                new_necessary.push(true);
                new_unnecessary.push(false);
            }
            run_length = 0;
            operators.push(op.clone());
            new_necessary.push(false);
            new_unnecessary.push(unnecessary[index]);
        }
    }
    if !streak.pre_post.is_empty() {
        operators.push(streak.emit());
        new_necessary.push(true);
        new_unnecessary.push(false);
    }

    debug!(
        before = plan_len,
        after = operators.len(),
        "macro-operator fusion finished"
    );
    MacroPlan {
        operators,
        necessary: new_necessary,
        unnecessary: new_unnecessary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn op(name: &str, pre_post: Vec<Effect>, cost: u64) -> Operator {
        Operator::new(name, vec![], pre_post, cost)
    }

    #[test]
    fn test_streak_of_two_is_fused() {
        let ops = vec![
            op("(grab crate)", vec![Effect::new(0, Some(0), 1)], 2),
            op(
                "(lift crate)",
                vec![Effect::new(0, Some(1), 2), Effect::new(1, Some(0), 1)],
                3,
            ),
            op("(wander)", vec![Effect::new(2, Some(0), 1)], 1),
        ];
        let necessary = vec![true, true, false, true];
        let unnecessary = vec![false, false, true, false];
        let merged = merge_necessary_streaks(&ops, &necessary, &unnecessary, true);

        assert_eq!(merged.operators.len(), 2);
        let macro_op = &merged.operators[0];
        assert!(macro_op.is_macro);
        assert!(is_macro_name(&macro_op.name));
        assert_eq!(macro_op.cost, 5);
        // First precondition, last effect.
        assert_eq!(
            macro_op.pre_post,
            vec![
                Effect::new(0, Some(0), 2),
                Effect::new(1, Some(0), 1),
            ]
        );
        assert_eq!(merged.necessary, vec![true, false]);
        assert_eq!(merged.unnecessary, vec![false, true]);
        assert_eq!(merged.operators[1].name, "(wander)");
    }

    #[test]
    fn test_unit_costs_count_members() {
        let ops = vec![
            op("(a)", vec![Effect::new(0, Some(0), 1)], 9),
            op("(b)", vec![Effect::new(0, Some(1), 2)], 9),
        ];
        let necessary = vec![true, true, true];
        let merged = merge_necessary_streaks(&ops, &necessary, &[false, false], false);
        assert_eq!(merged.operators.len(), 1);
        assert_eq!(merged.operators[0].cost, 2);
    }

    #[test]
    fn test_lone_necessary_action_passes_through() {
        let ops = vec![
            op("(only)", vec![Effect::new(0, Some(0), 1)], 4),
            op("(idle)", vec![Effect::new(1, Some(0), 1)], 1),
        ];
        let necessary = vec![true, false, true];
        let unnecessary = vec![false, true, false];
        let merged = merge_necessary_streaks(&ops, &necessary, &unnecessary, true);
        assert_eq!(merged.operators.len(), 2);
        assert_eq!(merged.operators[0].name, "(only)");
        assert!(!merged.operators[0].is_macro);
        assert_eq!(merged.necessary, vec![true, false]);
        assert_eq!(merged.unnecessary, vec![false, true]);
    }

    #[test]
    fn test_trailing_streak_is_flushed() {
        let ops = vec![
            op("(idle)", vec![Effect::new(1, Some(0), 1)], 1),
            op("(close)", vec![Effect::new(0, Some(0), 1)], 2),
        ];
        let necessary = vec![false, true, true];
        let unnecessary = vec![false, false, false];
        let merged = merge_necessary_streaks(&ops, &necessary, &unnecessary, true);
        assert_eq!(merged.operators.len(), 2);
        let tail = &merged.operators[1];
        // A trailing run of one still becomes a macro when the scan ends
        // inside it.
        assert!(tail.is_macro);
        assert_eq!(expand_macro_name(&tail.name), vec!["(close)".to_string()]);
        assert_eq!(merged.necessary, vec![false, true]);
    }

    #[test]
    fn test_conditional_effects_break_streaks() {
        let mut conditional = op("(guarded)", vec![Effect::new(0, Some(1), 2)], 1);
        conditional.pre_post[0].conditions.push(Fact::new(1, 0));
        let ops = vec![
            op("(plain)", vec![Effect::new(0, Some(0), 1)], 1),
            conditional,
        ];
        let necessary = vec![true, true, true];
        let unnecessary = vec![false, false, false];
        let merged = merge_necessary_streaks(&ops, &necessary, &unnecessary, true);
        // Neither action is merged; the guarded one loses its necessity
        // flag and will receive a skip operator downstream.
        assert_eq!(merged.operators.len(), 2);
        assert_eq!(merged.operators[0].name, "(plain)");
        assert_eq!(merged.operators[1].name, "(guarded)");
        assert_eq!(merged.necessary, vec![true, false]);
    }

    #[test]
    fn test_expand_macro_name_round_trip() {
        let name = format!("({MACRO_OP_MARKER}grab crate{MACRO_OP_MARKER}lift crate)");
        assert!(is_macro_name(&name));
        assert_eq!(
            expand_macro_name(&name),
            vec!["(grab crate)".to_string(), "(lift crate)".to_string()]
        );
        assert!(!is_macro_name("(grab crate)"));
    }
}
