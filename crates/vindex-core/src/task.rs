//! SAS+ task model.
//!
//! A [`Task`] is immutable after construction: every component of the engine
//! reads it, and the task builder emits fresh instances instead of mutating
//! inputs.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{Result, VindexError};

/// A single `variable = value` fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fact {
    pub var: usize,
    pub val: usize,
}

impl Fact {
    pub fn new(var: usize, val: usize) -> Self {
        Self { var, val }
    }
}

/// One effect of an operator: `var` moves from `pre` (or anything, when
/// `None`) to `post`, provided every gating condition holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Effect {
    pub var: usize,
    /// Required prior value; `None` is a wildcard.
    pub pre: Option<usize>,
    pub post: usize,
    /// Conditions gating this effect; empty for unconditional effects.
    pub conditions: Vec<Fact>,
}

impl Effect {
    pub fn new(var: usize, pre: Option<usize>, post: usize) -> Self {
        Self {
            var,
            pre,
            post,
            conditions: Vec::new(),
        }
    }
}

/// A ground operator of the task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operator {
    /// Operator name, stored with its surrounding parentheses.
    pub name: String,
    /// Conditions the operator requires but does not change.
    pub prevail: Vec<Fact>,
    pub pre_post: Vec<Effect>,
    pub cost: u64,
    /// Set on operators synthesized by fusing a run of plan steps.
    #[serde(default)]
    pub is_macro: bool,
}

impl Operator {
    pub fn new(name: impl Into<String>, prevail: Vec<Fact>, pre_post: Vec<Effect>, cost: u64) -> Self {
        Self {
            name: name.into(),
            prevail,
            pre_post,
            cost,
            is_macro: false,
        }
    }

    pub fn has_conditional_effects(&self) -> bool {
        self.pre_post.iter().any(|eff| !eff.conditions.is_empty())
    }
}

/// Variable metadata, index-aligned across the three arrays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variables {
    /// Domain size per variable.
    pub ranges: Vec<usize>,
    /// `-1` for regular variables, otherwise the axiom layer.
    pub axiom_layers: Vec<i32>,
    /// One label per domain value.
    pub value_names: Vec<Vec<String>>,
}

impl Variables {
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn value_name(&self, fact: Fact) -> &str {
        &self.value_names[fact.var][fact.val]
    }
}

/// A group of facts of which at most one can hold at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutexGroup {
    pub facts: Vec<Fact>,
}

/// A derived-variable rule. Parsed and written for completeness; the
/// elimination pipeline rejects tasks that contain any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Axiom {
    pub conditions: Vec<Fact>,
    pub var: usize,
    pub pre: Option<usize>,
    pub post: usize,
}

/// A complete SAS+ planning task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub variables: Variables,
    pub mutexes: Vec<MutexGroup>,
    /// One value per variable, index-aligned with `variables`.
    pub init: Vec<usize>,
    /// Facts that must hold simultaneously.
    pub goal: Vec<Fact>,
    pub operators: Vec<Operator>,
    pub axioms: Vec<Axiom>,
    /// True when operator costs are meaningful rather than uniform.
    pub metric: bool,
}

impl Task {
    /// Checks the structural invariants: every referenced `(var, val)` pair
    /// is within its variable's domain, the initial state covers every
    /// variable, and operator names are unique.
    pub fn validate(&self) -> Result<()> {
        if self.init.len() != self.variables.len() {
            return Err(VindexError::InvalidTask {
                message: format!(
                    "initial state has {} values for {} variables",
                    self.init.len(),
                    self.variables.len()
                ),
            });
        }
        for (var, &val) in self.init.iter().enumerate() {
            self.check_fact(Fact::new(var, val), "initial state")?;
        }
        for &fact in &self.goal {
            self.check_fact(fact, "goal")?;
        }
        for group in &self.mutexes {
            for &fact in &group.facts {
                self.check_fact(fact, "mutex group")?;
            }
        }
        let mut names = HashSet::new();
        for op in &self.operators {
            if !names.insert(op.name.as_str()) {
                return Err(VindexError::DuplicateOperator {
                    name: op.name.clone(),
                });
            }
            for &fact in &op.prevail {
                self.check_fact(fact, &op.name)?;
            }
            for eff in &op.pre_post {
                if let Some(pre) = eff.pre {
                    self.check_fact(Fact::new(eff.var, pre), &op.name)?;
                }
                self.check_fact(Fact::new(eff.var, eff.post), &op.name)?;
                for &cond in &eff.conditions {
                    self.check_fact(cond, &op.name)?;
                }
            }
        }
        for axiom in &self.axioms {
            for &cond in &axiom.conditions {
                self.check_fact(cond, "axiom")?;
            }
            if let Some(pre) = axiom.pre {
                self.check_fact(Fact::new(axiom.var, pre), "axiom")?;
            }
            self.check_fact(Fact::new(axiom.var, axiom.post), "axiom")?;
        }
        Ok(())
    }

    fn check_fact(&self, fact: Fact, context: &str) -> Result<()> {
        if fact.var >= self.variables.len() || fact.val >= self.variables.ranges[fact.var] {
            return Err(VindexError::InvalidTask {
                message: format!(
                    "fact ({}, {}) referenced by {} is out of range",
                    fact.var, fact.val, context
                ),
            });
        }
        Ok(())
    }

    /// Maps each operator name to its index in `operators`.
    pub fn operator_index(&self) -> HashMap<&str, usize> {
        self.operators
            .iter()
            .enumerate()
            .map(|(index, op)| (op.name.as_str(), index))
            .collect()
    }

    /// The elimination pipeline does not support derived variables.
    pub fn require_no_axioms(&self) -> Result<()> {
        if self.axioms.is_empty() {
            Ok(())
        } else {
            Err(VindexError::AxiomsUnsupported)
        }
    }

    /// Applies `op` to `state` in place. Returns false without touching the
    /// state when a prevail or precondition does not hold.
    pub fn apply(&self, state: &mut [usize], op: &Operator) -> bool {
        for fact in &op.prevail {
            if state[fact.var] != fact.val {
                return false;
            }
        }
        for eff in &op.pre_post {
            if eff.conditions.is_empty() {
                if let Some(pre) = eff.pre {
                    if state[eff.var] != pre {
                        return false;
                    }
                }
            }
        }
        for eff in &op.pre_post {
            let fires = eff.conditions.iter().all(|c| state[c.var] == c.val);
            if fires {
                if let Some(pre) = eff.pre {
                    if !eff.conditions.is_empty() && state[eff.var] != pre {
                        continue;
                    }
                }
                state[eff.var] = eff.post;
            }
        }
        true
    }

    /// Forward-simulates an operator sequence from the initial state and
    /// checks that every step applies and the goal holds at the end.
    pub fn validates(&self, ops: &[&Operator]) -> bool {
        let mut state = self.init.clone();
        for op in ops {
            if !self.apply(&mut state, op) {
                return false;
            }
        }
        self.goal.iter().all(|fact| state[fact.var] == fact.val)
    }
}
