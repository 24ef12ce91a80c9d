//! Classification of plan actions as trivially necessary or trivially
//! unnecessary.
//!
//! An action is trivially necessary when removing it provably breaks the
//! unique causal support of some fact a necessary action depends on. This
//! is a conservative certificate: sound, incomplete, and much cheaper than
//! full justification checking. Trivial unnecessity is derived afterwards
//! from the same achiever intervals.

use std::collections::HashSet;
use std::time::Instant;

use tracing::debug;
use vindex_core::{Fact, Operator, Result, Task, VindexError};

use crate::achievers::FactAchievers;

/// Result of the necessity fixpoint over one resolved plan.
///
/// `necessary` has one entry per plan position plus a terminal entry for
/// the virtual goal action, which is necessary by definition.
#[derive(Debug)]
pub struct NecessityAnalysis {
    pub necessary: Vec<bool>,
    reasons: Vec<HashSet<(usize, usize)>>,
    pub achievers: FactAchievers,
}

impl NecessityAnalysis {
    /// Number of trivially necessary plan positions, the virtual goal
    /// excluded.
    pub fn count(&self) -> usize {
        self.necessary[..self.necessary.len() - 1]
            .iter()
            .filter(|&&flag| flag)
            .count()
    }

    /// The `(var, pre_val)` facts that made a position necessary; empty for
    /// positions that are not trivially necessary.
    pub fn reasons(&self, position: usize) -> &HashSet<(usize, usize)> {
        &self.reasons[position]
    }
}

/// The terminal action standing in for the goal: it prevails on every goal
/// fact and changes nothing.
pub fn virtual_goal_operator(task: &Task) -> Operator {
    Operator::new("(virtual-goal)", task.goal.clone(), Vec::new(), 0)
}

/// Finds the trivially necessary actions of `plan_ops`.
///
/// Scans the plan backwards, marking the unique achiever of every needed
/// precondition. With `reach_fixpoint`, each newly marked action also
/// closes the validity windows of competing achievers, and scanning repeats
/// until stable; otherwise a single backward pass is performed.
pub fn find_necessary_actions(
    task: &Task,
    plan_ops: &[Operator],
    reach_fixpoint: bool,
) -> Result<NecessityAnalysis> {
    let start = Instant::now();
    let plan_len = plan_ops.len();
    let goal_op = virtual_goal_operator(task);
    let mut achievers = FactAchievers::seed(task, plan_ops);
    let mut reasons: Vec<HashSet<(usize, usize)>> = vec![HashSet::new(); plan_len + 1];
    let mut necessary = vec![false; plan_len + 1];
    necessary[plan_len] = true;

    loop {
        let mut changed = false;
        for position in (0..=plan_len).rev() {
            if !necessary[position] {
                continue;
            }
            let op = if position == plan_len {
                &goal_op
            } else {
                &plan_ops[position]
            };
            for fact in &op.prevail {
                mark_unique_supporter(
                    *fact,
                    position,
                    plan_ops,
                    &mut achievers,
                    &mut reasons,
                    &mut necessary,
                    reach_fixpoint,
                    &mut changed,
                )?;
            }
            for eff in &op.pre_post {
                // An unconditional effect always needs its precondition; a
                // conditional one only once this effect is the recorded
                // reason the action is necessary.
                if !eff.conditions.is_empty() && !reasons[position].contains(&(eff.var, eff.post)) {
                    continue;
                }
                if let Some(pre) = eff.pre {
                    mark_unique_supporter(
                        Fact::new(eff.var, pre),
                        position,
                        plan_ops,
                        &mut achievers,
                        &mut reasons,
                        &mut necessary,
                        reach_fixpoint,
                        &mut changed,
                    )?;
                }
                for cond in &eff.conditions {
                    mark_unique_supporter(
                        *cond,
                        position,
                        plan_ops,
                        &mut achievers,
                        &mut reasons,
                        &mut necessary,
                        reach_fixpoint,
                        &mut changed,
                    )?;
                }
            }
        }
        if !changed {
            break;
        }
    }

    let analysis = NecessityAnalysis {
        necessary,
        reasons,
        achievers,
    };
    debug!(
        necessary = analysis.count(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "necessity analysis finished"
    );
    Ok(analysis)
}

/// Marks the producer of `fact` necessary when it is the single non-initial
/// supporter at `position`. Zero supporters for a fact a necessary action
/// depends on means the task is malformed.
#[allow(clippy::too_many_arguments)]
fn mark_unique_supporter(
    fact: Fact,
    position: usize,
    plan_ops: &[Operator],
    achievers: &mut FactAchievers,
    reasons: &mut [HashSet<(usize, usize)>],
    necessary: &mut [bool],
    reach_fixpoint: bool,
    changed: &mut bool,
) -> Result<()> {
    let supporters = achievers.supporters(fact.var, fact.val, position);
    if supporters.is_empty() {
        return Err(VindexError::NoAchiever {
            var: fact.var,
            val: fact.val,
            position,
        });
    }
    if supporters.len() > 1 {
        return Ok(());
    }
    let producer = supporters[0];
    if producer < 0 {
        return Ok(());
    }
    let producer = producer as usize;
    if !reasons[producer].insert((fact.var, fact.val)) {
        return Ok(());
    }
    necessary[producer] = true;
    if reach_fixpoint {
        // The producer's effect now holds permanently from its position;
        // competing achievers' windows shrink accordingly.
        for eff in &plan_ops[producer].pre_post {
            if eff.conditions.is_empty() || reasons[producer].contains(&(eff.var, eff.post)) {
                achievers.tighten(eff.var, eff.post, producer);
            }
        }
        *changed = true;
    }
    Ok(())
}

/// Finds the trivially unnecessary actions of `plan_ops`, given the
/// necessity classification and its achiever intervals.
///
/// A non-necessary action is trivially unnecessary when each of its
/// productions is either consumed only by other trivially unnecessary
/// actions, or shadowed by a necessary action that overwrites the variable
/// before every remaining consumer reads it. An action nothing consumes is
/// vacuously unnecessary.
pub fn find_unnecessary_actions(
    task: &Task,
    plan_ops: &[Operator],
    analysis: &NecessityAnalysis,
) -> Vec<bool> {
    let plan_len = plan_ops.len();
    let goal_op = virtual_goal_operator(task);

    // Per producer position, the (consumer, var) pairs its effects may feed.
    let mut consumed_by: Vec<HashSet<(usize, usize)>> = vec![HashSet::new(); plan_len + 1];
    // Per variable, the positions of necessary actions that overwrite it.
    let mut overwritten: Vec<Vec<usize>> = vec![Vec::new(); task.variables.len()];

    let record = |consumed_by: &mut Vec<HashSet<(usize, usize)>>, var: usize, val: usize, position: usize| {
        for achiever in analysis.achievers.of(var, val) {
            if achiever.producer > -1
                && (achiever.producer as usize) < position
                && position <= achiever.valid_until
            {
                consumed_by[achiever.producer as usize].insert((position, var));
            }
        }
    };

    for position in 0..=plan_len {
        let op = if position == plan_len {
            &goal_op
        } else {
            &plan_ops[position]
        };
        for eff in &op.pre_post {
            if analysis.necessary[position] {
                overwritten[eff.var].push(position);
            }
            if let Some(pre) = eff.pre {
                record(&mut consumed_by, eff.var, pre, position);
            }
        }
        for fact in &op.prevail {
            record(&mut consumed_by, fact.var, fact.val, position);
        }
    }

    let mut unnecessary = vec![false; plan_len + 1];
    for position in (0..=plan_len).rev() {
        if analysis.necessary[position] {
            continue;
        }
        let mut is_unnecessary = consumed_by[position]
            .iter()
            .all(|&(consumer, _)| unnecessary[consumer]);
        if !is_unnecessary {
            is_unnecessary = consumed_by[position].iter().all(|&(consumer, var)| {
                overwritten[var]
                    .iter()
                    .any(|&writer| position < writer && writer < consumer)
            });
        }
        unnecessary[position] = is_unnecessary;
    }
    unnecessary
}

#[cfg(test)]
mod tests {
    use super::*;
    use vindex_core::{Effect, Variables};

    fn task(ranges: Vec<usize>, init: Vec<usize>, goal: Vec<Fact>, ops: Vec<Operator>) -> Task {
        let value_names = ranges
            .iter()
            .enumerate()
            .map(|(var, &range)| {
                (0..range)
                    .map(|val| format!("Atom var{var}-is-{val}()"))
                    .collect()
            })
            .collect();
        Task {
            variables: Variables {
                ranges: ranges.clone(),
                axiom_layers: vec![-1; ranges.len()],
                value_names,
            },
            mutexes: vec![],
            init,
            goal,
            operators: ops,
            axioms: vec![],
            metric: true,
        }
    }

    fn op(name: &str, prevail: Vec<Fact>, pre_post: Vec<Effect>) -> Operator {
        Operator::new(name, prevail, pre_post, 1)
    }

    /// A linear chain: every action is the unique achiever of the next
    /// action's precondition, so all of them are necessary in one pass.
    #[test]
    fn test_chain_is_fully_necessary() {
        let ops = vec![
            op("(step-one)", vec![], vec![Effect::new(0, Some(0), 1)]),
            op("(step-two)", vec![], vec![Effect::new(0, Some(1), 2)]),
        ];
        let t = task(vec![3], vec![0], vec![Fact::new(0, 2)], ops.clone());
        let analysis = find_necessary_actions(&t, &ops, false).unwrap();
        assert_eq!(analysis.necessary, vec![true, true, true]);
        assert_eq!(analysis.count(), 2);
        // The second step is needed for the goal fact itself.
        assert!(analysis.reasons(1).contains(&(0, 2)));
    }

    /// With two interchangeable producers nothing is uniquely required.
    #[test]
    fn test_ambiguous_achievers_mark_nothing() {
        let ops = vec![
            op("(toggle-up)", vec![], vec![Effect::new(0, Some(0), 1)]),
            op("(toggle-down)", vec![], vec![Effect::new(0, Some(1), 0)]),
            op("(toggle-up again)", vec![], vec![Effect::new(0, Some(0), 1)]),
        ];
        let t = task(vec![2], vec![0], vec![Fact::new(0, 1)], ops.clone());
        let analysis = find_necessary_actions(&t, &ops, true).unwrap();
        assert_eq!(analysis.necessary, vec![false, false, false, true]);
    }

    /// Window tightening can turn an ambiguous supporter set into a unique
    /// one, but only when the fixpoint loop is allowed to run.
    #[test]
    fn test_fixpoint_discovers_additional_necessity() {
        let ops = vec![
            op("(warm-up)", vec![], vec![Effect::new(0, Some(0), 1)]),
            op(
                "(reset)",
                vec![],
                vec![Effect::new(0, None, 2), Effect::new(2, Some(0), 1)],
            ),
            op("(restore)", vec![], vec![Effect::new(0, Some(2), 1)]),
            op(
                "(certify)",
                vec![Fact::new(2, 1)],
                vec![Effect::new(3, Some(0), 1)],
            ),
            op(
                "(finish)",
                vec![Fact::new(0, 1)],
                vec![Effect::new(1, Some(0), 1)],
            ),
        ];
        let t = task(
            vec![3, 2, 2, 2],
            vec![0, 0, 0, 0],
            vec![Fact::new(1, 1), Fact::new(3, 1)],
            ops.clone(),
        );

        let single_pass = find_necessary_actions(&t, &ops, false).unwrap();
        assert_eq!(
            single_pass.necessary,
            vec![false, true, false, true, true, true]
        );

        let fixpoint = find_necessary_actions(&t, &ops, true).unwrap();
        assert_eq!(
            fixpoint.necessary,
            vec![false, true, true, true, true, true]
        );

        // Soundness: dropping a necessary action breaks the plan.
        let keep: Vec<&Operator> = ops.iter().enumerate().filter(|&(i, _)| i != 2).map(|(_, o)| o).collect();
        assert!(!t.validates(&keep));
        let all: Vec<&Operator> = ops.iter().collect();
        assert!(t.validates(&all));
    }

    /// A goal fact with no producer at all is a malformed task.
    #[test]
    fn test_missing_achiever_is_fatal() {
        let ops = vec![op("(noop)", vec![], vec![Effect::new(0, Some(0), 1)])];
        let mut t = task(vec![3], vec![0], vec![Fact::new(0, 2)], ops.clone());
        t.goal = vec![Fact::new(0, 2)];
        assert!(matches!(
            find_necessary_actions(&t, &ops, true),
            Err(VindexError::NoAchiever { var: 0, val: 2, .. })
        ));
    }

    /// The first action's production is shadowed by a necessary overwriter
    /// before its only consumer reads it, so it is trivially unnecessary.
    #[test]
    fn test_overwritten_producer_is_unnecessary() {
        let ops = vec![
            op("(prime)", vec![], vec![Effect::new(0, Some(0), 1)]),
            op(
                "(charge)",
                vec![],
                vec![Effect::new(0, None, 1), Effect::new(1, Some(0), 1)],
            ),
            op(
                "(launch)",
                vec![Fact::new(0, 1)],
                vec![Effect::new(2, Some(0), 1)],
            ),
        ];
        let t = task(
            vec![2, 2, 2],
            vec![0, 0, 0],
            vec![Fact::new(1, 1), Fact::new(2, 1)],
            ops.clone(),
        );
        let analysis = find_necessary_actions(&t, &ops, true).unwrap();
        assert_eq!(analysis.necessary, vec![false, true, true, true]);
        let unnecessary = find_unnecessary_actions(&t, &ops, &analysis);
        assert_eq!(unnecessary, vec![true, false, false, false]);

        // Soundness: dropping only the unnecessary action keeps the plan valid.
        let keep: Vec<&Operator> = ops[1..].iter().collect();
        assert!(t.validates(&keep));
    }

    /// An action whose effects nothing reads is vacuously unnecessary.
    #[test]
    fn test_unconsumed_producer_is_unnecessary() {
        let ops = vec![
            op("(wave)", vec![], vec![Effect::new(0, Some(0), 1)]),
            op("(work)", vec![], vec![Effect::new(1, Some(0), 1)]),
        ];
        let t = task(vec![2, 2], vec![0, 0], vec![Fact::new(1, 1)], ops.clone());
        let analysis = find_necessary_actions(&t, &ops, true).unwrap();
        assert_eq!(analysis.necessary, vec![false, true, true]);
        let unnecessary = find_unnecessary_actions(&t, &ops, &analysis);
        assert_eq!(unnecessary, vec![true, false, false]);
    }
}
