//! Causal-link extraction.
//!
//! A causal link records which action (or the initial state) produced a
//! fact later required by which action. Links are built over the original
//! task for both the input plan and its justified counterpart; elided plan
//! positions contribute nothing but keep the numbering intact.

use serde::{Deserialize, Serialize};
use vindex_core::{Fact, Operator, Task};

/// Producer index standing for the initial state.
pub const INITIAL_STATE_PRODUCER: usize = 0;

/// Marker in value names identifying negated-fact bookkeeping; such facts
/// are dropped from the externally visible link sets.
const NEGATED_ATOM_MARKER: &str = "NegatedAtom";

/// A finalized causal or prevail link. `producer` 0 is the initial state,
/// plan positions are 1-based, and a consumer of `None` means the fact was
/// never consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CausalLink {
    pub producer: usize,
    pub fact: Fact,
    pub consumer: Option<usize>,
}

/// Causal and prevail links of one plan.
#[derive(Debug, Clone, Default)]
pub struct PlanLinks {
    pub causal: Vec<CausalLink>,
    pub prevail: Vec<CausalLink>,
}

struct OpenLink {
    producers: Vec<usize>,
    var: usize,
    val: i64,
    consumers: Vec<usize>,
}

/// Builds the links of a resolved plan. `plan_ops` holds one slot per plan
/// position; `None` slots are elided positions.
pub fn extract_links(task: &Task, plan_ops: &[Option<Operator>]) -> PlanLinks {
    let mut open: Vec<OpenLink> = task
        .init
        .iter()
        .enumerate()
        .map(|(var, &val)| OpenLink {
            producers: vec![INITIAL_STATE_PRODUCER],
            var,
            val: val as i64,
            consumers: Vec::new(),
        })
        .collect();
    // Prevail matches are resolved against the final producer lists, so
    // only the matched slot and the consumer are recorded during the scan.
    let mut prevail_matches: Vec<(usize, Fact, usize)> = Vec::new();

    for (index, slot) in plan_ops.iter().enumerate() {
        let Some(op) = slot else { continue };
        let step = index + 1;

        let mut preconditions: Vec<(usize, i64)> = op
            .pre_post
            .iter()
            .map(|eff| (eff.var, eff.pre.map_or(-1, |pre| pre as i64)))
            .collect();
        preconditions.extend(op.prevail.iter().map(|fact| (fact.var, fact.val as i64)));

        for &(var, val) in &preconditions {
            let is_prevail = val >= 0 && op.prevail.contains(&Fact::new(var, val as usize));
            for (slot_index, link) in open.iter_mut().enumerate() {
                // A precondition also closes links carrying the negated
                // value of the same variable.
                if link.var == var && (link.val == val || link.val == -val) {
                    if is_prevail {
                        prevail_matches.push((slot_index, Fact::new(var, val as usize), step));
                    } else {
                        link.consumers.push(step);
                    }
                }
            }
        }

        for eff in &op.pre_post {
            let val = eff.post as i64;
            match open.iter().position(|link| link.var == eff.var && link.val == val) {
                Some(slot_index) => open[slot_index].producers.push(step),
                None => open.push(OpenLink {
                    producers: vec![step],
                    var: eff.var,
                    val,
                    consumers: Vec::new(),
                }),
            }
        }
    }

    let mut causal = Vec::new();
    for link in &open {
        let fact = Fact::new(link.var, link.val as usize);
        if task.variables.value_name(fact).contains(NEGATED_ATOM_MARKER) {
            continue;
        }
        for (order, &producer) in link.producers.iter().enumerate() {
            causal.push(CausalLink {
                producer,
                fact,
                consumer: link.consumers.get(order).copied(),
            });
        }
    }

    let mut prevail = Vec::new();
    for &(slot_index, fact, consumer) in &prevail_matches {
        if task.variables.value_name(fact).contains(NEGATED_ATOM_MARKER) {
            continue;
        }
        // The latest producer before the consumer is taken as the causal
        // source; see DESIGN.md for the tie-break discussion.
        let producer = open[slot_index]
            .producers
            .iter()
            .copied()
            .filter(|&producer| producer < consumer)
            .max();
        if let Some(producer) = producer {
            prevail.push(CausalLink {
                producer,
                fact,
                consumer: Some(consumer),
            });
        }
    }

    PlanLinks { causal, prevail }
}
