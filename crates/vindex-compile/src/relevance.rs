//! Relevance marking and domain pruning.
//!
//! A fact is relevant when something can require it: the goal, a condition
//! of a kept operator, or an axiom. All irrelevant values of a variable
//! collapse into a single sentinel value appended to its domain, so the
//! variable itself is never removed but its effective domain shrinks.

use vindex_core::{Operator, Task, Variables};

/// Domain value name standing in for all collapsed irrelevant facts.
pub const IRRELEVANT_FACT_NAME: &str = "Atom irrelevant-fact()";

/// Marks every fact that the goal, the given operators, or the task's
/// axioms can require.
pub fn find_relevant_facts(task: &Task, operators: &[Operator]) -> Vec<Vec<bool>> {
    let mut relevant: Vec<Vec<bool>> = task
        .variables
        .ranges
        .iter()
        .map(|&range| vec![false; range])
        .collect();

    for fact in &task.goal {
        relevant[fact.var][fact.val] = true;
    }
    for op in operators {
        for fact in &op.prevail {
            relevant[fact.var][fact.val] = true;
        }
        for eff in &op.pre_post {
            if let Some(pre) = eff.pre {
                relevant[eff.var][pre] = true;
            }
            for cond in &eff.conditions {
                relevant[cond.var][cond.val] = true;
            }
        }
    }
    for axiom in &task.axioms {
        for cond in &axiom.conditions {
            relevant[cond.var][cond.val] = true;
        }
        if let Some(pre) = axiom.pre {
            relevant[axiom.var][pre] = true;
        }
        relevant[axiom.var][axiom.post] = true;
    }
    relevant
}

/// Builds pruned variable domains: relevant values are renumbered densely,
/// one sentinel value is appended per variable, and, for ordered tasks, a
/// fresh plan-position variable is appended last with `position_values`
/// entries.
///
/// Returns the new variables together with the per-variable value map;
/// `None` marks a value that collapsed into the sentinel.
pub fn prune_domains(
    variables: &Variables,
    relevant: &[Vec<bool>],
    ordered: bool,
    position_values: usize,
) -> (Variables, Vec<Vec<Option<usize>>>) {
    let mut value_map: Vec<Vec<Option<usize>>> = Vec::with_capacity(variables.len());
    let mut ranges = Vec::with_capacity(variables.len() + 1);
    let mut axiom_layers = Vec::with_capacity(variables.len() + 1);
    let mut value_names = Vec::with_capacity(variables.len() + 1);

    for (var, relevant_values) in relevant.iter().enumerate() {
        let mut map = vec![None; relevant_values.len()];
        let mut names = Vec::new();
        for (val, &is_relevant) in relevant_values.iter().enumerate() {
            if is_relevant {
                map[val] = Some(names.len());
                names.push(variables.value_names[var][val].clone());
            }
        }
        names.push(IRRELEVANT_FACT_NAME.to_string());
        ranges.push(names.len());
        axiom_layers.push(variables.axiom_layers[var]);
        value_names.push(names);
        value_map.push(map);
    }

    if ordered {
        ranges.push(position_values);
        axiom_layers.push(-1);
        value_names.push(
            (0..position_values)
                .map(|i| format!("Atom plan-pos-{i}()"))
                .collect(),
        );
    }

    (
        Variables {
            ranges,
            axiom_layers,
            value_names,
        },
        value_map,
    )
}

/// The sentinel value of a pruned variable is always the last one.
pub fn sentinel(variables: &Variables, var: usize) -> usize {
    variables.ranges[var] - 1
}
