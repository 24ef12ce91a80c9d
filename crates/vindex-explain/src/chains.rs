//! Causal chains: alternate-producer traces for links that only exist in
//! the justified plan.
//!
//! When a causal link of the justified plan has no counterpart in the
//! unjustified plan, the consumer's dependency used to be satisfied some
//! other way. The chain collects every unjustified-plan position
//! transitively reachable as an alternate producer for the same consumed
//! fact; it is the proof that the dependency survives the removal of the
//! redundant actions.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;
use vindex_core::{Fact, Task};

use crate::links::CausalLink;

/// A justified-plan link together with the unjustified-plan positions that
/// substitute for its producer, in ascending order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CausalChain {
    pub link: CausalLink,
    pub chain: Vec<usize>,
}

/// Groups links by consumer, keeping `(producer, fact)` pairs.
pub fn links_by_consumer(links: &[CausalLink]) -> HashMap<usize, Vec<(usize, Fact)>> {
    let mut by_consumer: HashMap<usize, Vec<(usize, Fact)>> = HashMap::new();
    for link in links {
        if let Some(consumer) = link.consumer {
            by_consumer
                .entry(consumer)
                .or_default()
                .push((link.producer, link.fact));
        }
    }
    by_consumer
}

/// Computes the causal chains of `justified` relative to `unjustified`.
///
/// Link identity is compared through rendered fact names, since the two
/// link sets may stem from differently pruned fact numberings. The
/// traversal is exhaustive depth-first with a visited set; it is not a
/// shortest-path search.
pub fn find_causal_chains(
    task: &Task,
    justified: &[CausalLink],
    unjustified: &[CausalLink],
) -> Vec<CausalChain> {
    let by_consumer = links_by_consumer(unjustified);
    let known: HashSet<(usize, &str, Option<usize>)> = unjustified
        .iter()
        .map(|link| (link.producer, task.variables.value_name(link.fact), link.consumer))
        .collect();

    let mut chains = Vec::new();
    for link in justified {
        let Some(consumer) = link.consumer else { continue };
        let fact_name = task.variables.value_name(link.fact);
        if known.contains(&(link.producer, fact_name, link.consumer)) {
            continue;
        }
        let Some(candidates) = by_consumer.get(&consumer) else {
            continue;
        };
        for &(producer, fact) in candidates {
            if task.variables.value_name(fact) != fact_name {
                continue;
            }
            chains.push(CausalChain {
                link: *link,
                chain: collect_alternate_producers(&by_consumer, producer),
            });
        }
    }
    debug!(chains = chains.len(), "extracted causal chains");
    chains
}

/// Every position transitively reachable from `seed` through the
/// consumer-indexed link dictionary, `seed` included, ascending.
fn collect_alternate_producers(
    by_consumer: &HashMap<usize, Vec<(usize, Fact)>>,
    seed: usize,
) -> Vec<usize> {
    let mut visited = BTreeSet::new();
    visited.insert(seed);
    let mut stack: Vec<usize> = producers_of(by_consumer, seed);
    while let Some(position) = stack.pop() {
        if visited.insert(position) {
            stack.extend(producers_of(by_consumer, position));
        }
    }
    visited.into_iter().collect()
}

fn producers_of(by_consumer: &HashMap<usize, Vec<(usize, Fact)>>, consumer: usize) -> Vec<usize> {
    by_consumer
        .get(&consumer)
        .map(|entries| entries.iter().map(|&(producer, _)| producer).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use vindex_core::Variables;

    fn task_with_names(names: Vec<Vec<&str>>) -> Task {
        Task {
            variables: Variables {
                ranges: names.iter().map(|vals| vals.len()).collect(),
                axiom_layers: vec![-1; names.len()],
                value_names: names
                    .iter()
                    .map(|vals| vals.iter().map(|v| v.to_string()).collect())
                    .collect(),
            },
            mutexes: vec![],
            init: vec![0; names.len()],
            goal: vec![],
            operators: vec![],
            axioms: vec![],
            metric: true,
        }
    }

    fn link(producer: usize, fact: Fact, consumer: Option<usize>) -> CausalLink {
        CausalLink {
            producer,
            fact,
            consumer,
        }
    }

    #[test]
    fn test_matching_links_produce_no_chain() {
        let task = task_with_names(vec![vec!["Atom a()", "Atom b()"]]);
        let links = vec![link(0, Fact::new(0, 0), Some(1))];
        assert!(find_causal_chains(&task, &links, &links).is_empty());
    }

    #[test]
    fn test_divergent_link_traces_alternate_producers() {
        let task = task_with_names(vec![vec!["Atom a()", "Atom b()"]]);
        // Justified plan: the initial state feeds the consumer at step 3.
        let justified = vec![link(0, Fact::new(0, 0), Some(3))];
        // Unjustified plan: step 2 fed the consumer and itself depended on
        // step 1.
        let unjustified = vec![
            link(2, Fact::new(0, 0), Some(3)),
            link(1, Fact::new(0, 1), Some(2)),
            link(0, Fact::new(0, 0), Some(1)),
        ];
        let chains = find_causal_chains(&task, &justified, &unjustified);
        assert_eq!(chains.len(), 1);
        assert_eq!(chains[0].link, justified[0]);
        assert_eq!(chains[0].chain, vec![0, 1, 2]);
    }

    #[test]
    fn test_cycles_are_broken_by_the_visited_set() {
        let task = task_with_names(vec![vec!["Atom a()"]]);
        let justified = vec![link(0, Fact::new(0, 0), Some(2))];
        // An artificial producer cycle between 1 and 2.
        let unjustified = vec![
            link(1, Fact::new(0, 0), Some(2)),
            link(2, Fact::new(0, 0), Some(1)),
        ];
        let chains = find_causal_chains(&task, &justified, &unjustified);
        assert_eq!(chains.len(), 1);
        assert_eq!(chains[0].chain, vec![1, 2]);
    }

    #[test]
    fn test_unconsumed_links_are_ignored() {
        let task = task_with_names(vec![vec!["Atom a()"]]);
        let justified = vec![link(0, Fact::new(0, 0), None)];
        let unjustified = vec![link(1, Fact::new(0, 0), Some(2))];
        assert!(find_causal_chains(&task, &justified, &unjustified).is_empty());
    }
}
