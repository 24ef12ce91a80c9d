//! Structured explanations of why actions are redundant or still needed.
//!
//! The explainer compares an input plan with its justified counterpart and
//! answers per-action queries with structured data; turning the data into
//! prose is left to the caller.

use std::collections::HashMap;

use indexmap::IndexMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use vindex_core::{resolve_operators_with_gaps, Fact, Plan, Result, Task};

use crate::chains::{find_causal_chains, links_by_consumer, CausalChain};
use crate::links::{extract_links, PlanLinks};

/// Where a required fact came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum Source {
    InitialState,
    Action { position: usize, name: String },
}

/// How an action required a fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementKind {
    Precondition,
    Prevail,
}

/// One fact an action depends on in the justified plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    pub fact: String,
    pub kind: RequirementKind,
    #[serde(flatten)]
    pub origin: Source,
    /// The redundant action that supplied this fact in the unjustified
    /// plan, when the dependency was rerouted.
    pub substituted_by: Option<usize>,
}

/// Who consumed a fact a redundant action produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "consumer", rename_all = "snake_case")]
pub enum ConsumerKind {
    Unconsumed,
    Redundant {
        position: usize,
        name: String,
    },
    Relevant {
        position: usize,
        name: String,
        requirements: Vec<Requirement>,
    },
}

/// Facts a redundant action produced, grouped per consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Production {
    pub facts: Vec<String>,
    #[serde(flatten)]
    pub consumed: ConsumerKind,
}

/// The structured answer to an `explain` query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Explanation {
    /// The action could be removed; its productions explain why nothing
    /// breaks.
    Redundant {
        action: usize,
        name: String,
        productions: Vec<Production>,
    },
    /// The action survives; its requirements explain what keeps it in.
    Relevant {
        action: usize,
        name: String,
        requirements: Vec<Requirement>,
    },
}

/// Objects that occur only in redundant actions' argument lists.
pub fn redundant_objects(plan: &Plan, redundant_positions: &[usize]) -> Vec<String> {
    let mut all = Vec::new();
    let mut relevant = Vec::new();
    for (index, step) in plan.steps.iter().enumerate() {
        let Some(name) = step.action_name() else { continue };
        let arguments = name
            .find(' ')
            .map(|space| {
                name[space + 1..]
                    .trim_end_matches(')')
                    .split_whitespace()
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        if !redundant_positions.contains(&(index + 1)) {
            relevant.extend(arguments.iter().cloned());
        }
        all.extend(arguments);
    }
    all.into_iter()
        .filter(|object| !relevant.contains(object))
        .unique()
        .sorted()
        .collect()
}

/// Precomputed link structures for one (plan, justified plan) pair.
pub struct Explainer<'a> {
    task: &'a Task,
    plan: &'a Plan,
    justified: &'a Plan,
    redundant_positions: Vec<usize>,
    chains: Vec<CausalChain>,
    /// Unjustified-plan links keyed by producer.
    produced_by: HashMap<usize, Vec<(Option<usize>, Fact)>>,
    /// Justified-plan links keyed by consumer.
    required_by: HashMap<usize, Vec<(usize, Fact)>>,
    /// Chain seed links keyed by consumer.
    chain_seeds: HashMap<usize, Vec<(usize, Fact)>>,
    /// Justified-plan prevail links keyed by consumer.
    prevail_by: HashMap<usize, Vec<(usize, Fact)>>,
}

impl<'a> Explainer<'a> {
    /// Builds link sets and chains for `plan` and its justified
    /// counterpart. Both plans are resolved against the original task;
    /// `ordered` selects per-position resolution as during compilation.
    pub fn new(task: &'a Task, plan: &'a Plan, justified: &'a Plan, ordered: bool) -> Result<Self> {
        let plan_slots = resolve_operators_with_gaps(task, plan, ordered)?;
        let justified_slots = resolve_operators_with_gaps(task, justified, ordered)?;
        let plan_links = extract_links(task, &plan_slots);
        let justified_links: PlanLinks = extract_links(task, &justified_slots);
        let chains = find_causal_chains(task, &justified_links.causal, &plan_links.causal);

        let mut produced_by: HashMap<usize, Vec<(Option<usize>, Fact)>> = HashMap::new();
        for link in &plan_links.causal {
            produced_by
                .entry(link.producer)
                .or_default()
                .push((link.consumer, link.fact));
        }
        let seed_links: Vec<_> = chains.iter().map(|chain| chain.link).collect();

        Ok(Self {
            task,
            plan,
            justified,
            redundant_positions: justified.skip_positions(),
            produced_by,
            required_by: links_by_consumer(&justified_links.causal),
            chain_seeds: links_by_consumer(&seed_links),
            prevail_by: links_by_consumer(&justified_links.prevail),
            chains,
        })
    }

    /// True when the justified plan elides nothing, i.e. the input plan was
    /// already perfectly justified. A normal outcome, not an error.
    pub fn is_perfectly_justified(&self) -> bool {
        self.justified.is_perfectly_justified()
    }

    /// 1-based positions of the redundant actions.
    pub fn redundant_positions(&self) -> &[usize] {
        &self.redundant_positions
    }

    pub fn chains(&self) -> &[CausalChain] {
        &self.chains
    }

    /// Objects used only by redundant actions.
    pub fn redundant_objects(&self) -> Vec<String> {
        redundant_objects(self.plan, &self.redundant_positions)
    }

    /// Explains one action of the input plan, 1-based. Returns `None` for
    /// positions outside the plan.
    pub fn explain(&self, action_number: usize) -> Option<Explanation> {
        if action_number == 0 || action_number > self.plan.len() {
            return None;
        }
        let name = self.action_name(action_number);
        if self.redundant_positions.contains(&action_number) {
            Some(Explanation::Redundant {
                action: action_number,
                name,
                productions: self.productions_of(action_number),
            })
        } else {
            Some(Explanation::Relevant {
                action: action_number,
                name,
                requirements: self.requirements_of(
                    action_number,
                    self.dependency_links(action_number),
                    true,
                ),
            })
        }
    }

    fn action_name(&self, position: usize) -> String {
        self.plan.steps[position - 1]
            .action_name()
            .unwrap_or_default()
            .to_string()
    }

    /// The justified-plan dependency dictionary used for `action_number`:
    /// chain seeds when they cover the action, all links otherwise.
    fn dependency_links(&self, action_number: usize) -> &HashMap<usize, Vec<(usize, Fact)>> {
        if !self.chain_seeds.is_empty() && self.chain_seeds.contains_key(&action_number) {
            &self.chain_seeds
        } else {
            &self.required_by
        }
    }

    fn productions_of(&self, action_number: usize) -> Vec<Production> {
        let mut grouped: IndexMap<Option<usize>, Vec<String>> = IndexMap::new();
        if let Some(links) = self.produced_by.get(&action_number) {
            for &(consumer, fact) in links {
                grouped
                    .entry(consumer)
                    .or_default()
                    .push(self.task.variables.value_name(fact).to_string());
            }
        }
        grouped
            .into_iter()
            .map(|(consumer, facts)| Production {
                facts,
                consumed: match consumer {
                    None => ConsumerKind::Unconsumed,
                    Some(position) if self.redundant_positions.contains(&position) => {
                        ConsumerKind::Redundant {
                            position,
                            name: self.action_name(position),
                        }
                    }
                    Some(position) => ConsumerKind::Relevant {
                        position,
                        name: self.action_name(position),
                        requirements: self.requirements_of(position, &self.required_by, false),
                    },
                },
            })
            .collect()
    }

    fn requirements_of(
        &self,
        consumer: usize,
        dependency_links: &HashMap<usize, Vec<(usize, Fact)>>,
        with_substitutions: bool,
    ) -> Vec<Requirement> {
        let mut requirements = Vec::new();
        if let Some(links) = dependency_links.get(&consumer) {
            for &(producer, fact) in links {
                let fact_name = self.task.variables.value_name(fact).to_string();
                let substituted_by = (with_substitutions && producer != 0)
                    .then(|| self.substituting_redundant_action(consumer, &fact_name))
                    .flatten();
                requirements.push(Requirement {
                    fact: fact_name,
                    kind: RequirementKind::Precondition,
                    origin: self.source_of(producer),
                    substituted_by,
                });
            }
        }
        if let Some(links) = self.prevail_by.get(&consumer) {
            for &(producer, fact) in links {
                requirements.push(Requirement {
                    fact: self.task.variables.value_name(fact).to_string(),
                    kind: RequirementKind::Prevail,
                    origin: self.source_of(producer),
                    substituted_by: None,
                });
            }
        }
        requirements
    }

    fn source_of(&self, producer: usize) -> Source {
        if producer == 0 {
            Source::InitialState
        } else {
            Source::Action {
                position: producer,
                name: self.action_name(producer),
            }
        }
    }

    /// The last link of the substituting chain: the redundant action that
    /// actually delivered `fact` to `consumer` in the unjustified plan.
    fn substituting_redundant_action(&self, consumer: usize, fact_name: &str) -> Option<usize> {
        self.chains
            .iter()
            .find(|chain| {
                chain.link.consumer == Some(consumer)
                    && self.task.variables.value_name(chain.link.fact) == fact_name
            })
            .and_then(|chain| chain.chain.last().copied())
    }
}
