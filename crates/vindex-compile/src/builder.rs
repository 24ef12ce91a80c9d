//! Action-elimination task construction.
//!
//! Given a task and a valid plan, builds a new SAS+ task whose solutions
//! are exactly the goal-preserving subsequences of the plan: a position
//! counter enforces the original order, paired zero-cost skip operators let
//! the solver elide dispensable actions, and domains are pruned to the
//! facts the kept operators can still require.

use tracing::info;
use vindex_analysis::{
    find_necessary_actions, find_unnecessary_actions, merge_necessary_streaks,
};
use vindex_core::{
    resolve_operators, Effect, Fact, MutexGroup, Operator, Plan, Result, Task, Variables,
    SKIP_ACTION_PREFIX,
};

use crate::relevance::{find_relevant_facts, prune_domains, sentinel};
use crate::scaling::CostScalingRecord;
use crate::simplify::{ReorderVariables, Simplify};

/// Reduction flavor: `MR` minimizes total cost of the kept actions, `MLR`
/// minimizes their number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    MR,
    MLR,
}

/// Knobs of the elimination compilation.
#[derive(Debug, Clone)]
pub struct EliminationOptions {
    /// Keep the original action order via a plan-position variable.
    pub ordered: bool,
    /// Classify actions first and emit skip operators only for positions
    /// that are not trivially necessary.
    pub enhanced: bool,
    /// Iterate the necessity analysis to a fixpoint instead of one pass.
    pub fixpoint: bool,
    /// Additionally drop trivially unnecessary actions altogether.
    pub unnecessary: bool,
    /// Fuse runs of necessary actions into macro operators.
    pub macro_operators: bool,
    /// Require the position counter to reach the end of the plan.
    pub add_position_to_goal: bool,
    pub reduction: Reduction,
    /// Rescale costs so zero-cost actions cannot hide skippable work.
    pub scale_costs: bool,
}

impl Default for EliminationOptions {
    fn default() -> Self {
        Self {
            ordered: false,
            enhanced: false,
            fixpoint: false,
            unnecessary: false,
            macro_operators: false,
            add_position_to_goal: false,
            reduction: Reduction::MR,
            scale_costs: true,
        }
    }
}

/// The compiled task plus the cost-scaling record needed to reconcile its
/// solutions, when scaling was in effect.
#[derive(Debug)]
pub struct EliminationTask {
    pub task: Task,
    pub scaling: Option<CostScalingRecord>,
}

/// Builds the action-elimination task for `plan` over `task`.
///
/// The assembled task is handed to the external simplification and
/// reordering passes before being returned; a task that those passes
/// report as trivially solvable aborts the build.
pub fn build_elimination_task(
    task: &Task,
    plan: &Plan,
    options: &EliminationOptions,
    simplify: &dyn Simplify,
    reorder: &dyn ReorderVariables,
) -> Result<EliminationTask> {
    task.require_no_axioms()?;
    let unique: std::collections::HashSet<&str> = plan
        .steps
        .iter()
        .filter_map(|step| step.action_name())
        .collect();
    info!(
        plan_length = plan.len(),
        unique_operators = unique.len(),
        "building action elimination task"
    );

    let mut plan_ops = resolve_operators(task, plan, options.ordered)?;
    let use_original_costs = options.reduction == Reduction::MR && task.metric;

    let scaling = if options.reduction == Reduction::MR && options.scale_costs {
        Some(CostScalingRecord::apply(&mut plan_ops))
    } else {
        None
    };

    let mut necessary = vec![false; plan_ops.len() + 1];
    let mut unnecessary = vec![false; plan_ops.len() + 1];
    if options.ordered && options.enhanced {
        let analysis = find_necessary_actions(task, &plan_ops, options.fixpoint)?;
        if options.unnecessary {
            unnecessary = find_unnecessary_actions(task, &plan_ops, &analysis);
        }
        necessary = analysis.necessary;
        if options.macro_operators {
            let merged =
                merge_necessary_streaks(&plan_ops, &necessary, &unnecessary, use_original_costs);
            info!(
                without_macros = plan.len(),
                with_macros = merged.operators.len(),
                "fused necessary-action runs"
            );
            plan_ops = merged.operators;
            necessary = merged.necessary;
            unnecessary = merged.unnecessary;
        }
    }

    let relevant = find_relevant_facts(task, &plan_ops);
    let (variables, value_map) =
        prune_domains(&task.variables, &relevant, options.ordered, plan_ops.len() + 1);

    let operators = remap_operators(
        &plan_ops,
        &value_map,
        &variables,
        options.ordered,
        use_original_costs,
        &necessary,
        &unnecessary,
    );
    let init = remap_init(&task.init, &value_map, &variables, options.ordered);
    let mutexes = remap_mutexes(&task.mutexes, &value_map);
    let goal = remap_goal(task, &value_map, options, plan_ops.len());
    let axioms = remap_axioms(task, &value_map, &variables);

    let mut new_task = Task {
        variables,
        mutexes,
        init,
        goal,
        operators,
        axioms,
        metric: true,
    };

    simplify.filter_unreachable_facts(&mut new_task)?;
    reorder.apply(&mut new_task, true, true)?;

    Ok(EliminationTask {
        task: new_task,
        scaling,
    })
}

/// The zero-cost operator that elides position `position` while still
/// advancing the plan counter.
fn skip_operator(order_var: usize, position: usize) -> Operator {
    Operator::new(
        format!("{SKIP_ACTION_PREFIX}{position})"),
        Vec::new(),
        vec![Effect::new(order_var, Some(position), position + 1)],
        0,
    )
}

fn remap_fact(value_map: &[Vec<Option<usize>>], variables: &Variables, fact: Fact) -> Fact {
    Fact::new(
        fact.var,
        value_map[fact.var][fact.val].unwrap_or_else(|| sentinel(variables, fact.var)),
    )
}

fn remap_operators(
    plan_ops: &[Operator],
    value_map: &[Vec<Option<usize>>],
    variables: &Variables,
    ordered: bool,
    use_original_costs: bool,
    necessary: &[bool],
    unnecessary: &[bool],
) -> Vec<Operator> {
    let order_var = variables.len() - 1;
    let mut out = Vec::new();
    for (position, op) in plan_ops.iter().enumerate() {
        if unnecessary[position] {
            // A trivially unnecessary position contributes only its skip
            // operator, keeping the position counter intact.
            out.push(skip_operator(order_var, position));
            continue;
        }

        let prevail = op
            .prevail
            .iter()
            .filter_map(|fact| {
                value_map[fact.var][fact.val].map(|val| Fact::new(fact.var, val))
            })
            .collect();
        let mut pre_post: Vec<Effect> = op
            .pre_post
            .iter()
            .map(|eff| Effect {
                var: eff.var,
                pre: eff.pre.map(|pre| {
                    value_map[eff.var][pre].unwrap_or_else(|| sentinel(variables, eff.var))
                }),
                post: value_map[eff.var][eff.post]
                    .unwrap_or_else(|| sentinel(variables, eff.var)),
                conditions: eff
                    .conditions
                    .iter()
                    .map(|&cond| remap_fact(value_map, variables, cond))
                    .collect(),
            })
            .collect();

        if ordered {
            pre_post.push(Effect::new(order_var, Some(position), position + 1));
            if !necessary[position] {
                out.push(skip_operator(order_var, position));
            }
        }

        let cost = if use_original_costs || op.is_macro {
            op.cost
        } else {
            1
        };
        let mut new_op = Operator::new(op.name.clone(), prevail, pre_post, cost);
        new_op.is_macro = op.is_macro;
        out.push(new_op);
    }
    out
}

fn remap_init(
    init: &[usize],
    value_map: &[Vec<Option<usize>>],
    variables: &Variables,
    ordered: bool,
) -> Vec<usize> {
    let mut out: Vec<usize> = init
        .iter()
        .enumerate()
        .map(|(var, &val)| value_map[var][val].unwrap_or_else(|| sentinel(variables, var)))
        .collect();
    if ordered {
        // The plan counter starts at position 0.
        out.push(0);
    }
    out
}

fn remap_mutexes(mutexes: &[MutexGroup], value_map: &[Vec<Option<usize>>]) -> Vec<MutexGroup> {
    mutexes
        .iter()
        .filter_map(|group| {
            let facts: Vec<Fact> = group
                .facts
                .iter()
                .filter_map(|fact| {
                    value_map[fact.var][fact.val].map(|val| Fact::new(fact.var, val))
                })
                .collect();
            (facts.len() > 1).then_some(MutexGroup { facts })
        })
        .collect()
}

fn remap_goal(
    task: &Task,
    value_map: &[Vec<Option<usize>>],
    options: &EliminationOptions,
    plan_len: usize,
) -> Vec<Fact> {
    let mut goal: Vec<Fact> = task
        .goal
        .iter()
        .filter_map(|fact| value_map[fact.var][fact.val].map(|val| Fact::new(fact.var, val)))
        .collect();
    if options.ordered && options.add_position_to_goal {
        // The position variable was appended after the original variables.
        goal.push(Fact::new(task.variables.len(), plan_len));
    }
    goal
}

fn remap_axioms(
    task: &Task,
    value_map: &[Vec<Option<usize>>],
    variables: &Variables,
) -> Vec<vindex_core::Axiom> {
    task.axioms
        .iter()
        .map(|axiom| vindex_core::Axiom {
            conditions: axiom
                .conditions
                .iter()
                .map(|&cond| remap_fact(value_map, variables, cond))
                .collect(),
            var: axiom.var,
            pre: axiom.pre.map(|pre| {
                value_map[axiom.var][pre].unwrap_or_else(|| sentinel(variables, axiom.var))
            }),
            post: value_map[axiom.var][axiom.post]
                .unwrap_or_else(|| sentinel(variables, axiom.var)),
        })
        .collect()
}
