//! Fact-achiever intervals.
//!
//! For every `(var, val)` fact the structure records which plan positions
//! produce it and until which position each production is known to still
//! hold. Intervals start wide open and are tightened as the necessity
//! fixpoint learns that some effect holds permanently from a position on.

use vindex_core::{Operator, Task};

/// Producer index of the initial state.
pub const INITIAL_STATE: isize = -1;

/// One production of a fact: `producer` is a plan position (or
/// [`INITIAL_STATE`]) and `valid_until` the last position (inclusive) at
/// which the produced value may still hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Achiever {
    pub producer: isize,
    pub valid_until: usize,
}

/// Achiever lists indexed by `(var, val)`, producer-ascending.
#[derive(Debug, Clone)]
pub struct FactAchievers {
    slots: Vec<Vec<Vec<Achiever>>>,
}

impl FactAchievers {
    /// Seeds intervals from the initial state and from every operator
    /// effect, conditional or not. All windows initially extend past the
    /// virtual goal position.
    pub fn seed(task: &Task, plan_ops: &[Operator]) -> Self {
        let horizon = plan_ops.len() + 2;
        let mut slots: Vec<Vec<Vec<Achiever>>> = task
            .variables
            .ranges
            .iter()
            .map(|&range| vec![Vec::new(); range])
            .collect();
        for (var, &val) in task.init.iter().enumerate() {
            slots[var][val].push(Achiever {
                producer: INITIAL_STATE,
                valid_until: horizon,
            });
        }
        for (position, op) in plan_ops.iter().enumerate() {
            for eff in &op.pre_post {
                slots[eff.var][eff.post].push(Achiever {
                    producer: position as isize,
                    valid_until: horizon,
                });
            }
        }
        Self { slots }
    }

    /// All recorded achievers of a fact.
    pub fn of(&self, var: usize, val: usize) -> &[Achiever] {
        &self.slots[var][val]
    }

    /// Producers of `(var, val)` whose window covers `position`: strictly
    /// earlier producers whose value may still hold there.
    pub fn supporters(&self, var: usize, val: usize, position: usize) -> Vec<isize> {
        self.slots[var][val]
            .iter()
            .filter(|a| a.producer < position as isize && a.valid_until >= position)
            .map(|a| a.producer)
            .collect()
    }

    /// Records that `(var, keep_val)` holds permanently from `position`:
    /// every earlier achiever of a competing value of `var` cannot remain
    /// valid past it. Lists are producer-ascending, so the scan stops at
    /// the first achiever at or after `position`.
    pub fn tighten(&mut self, var: usize, keep_val: usize, position: usize) {
        for (val, achievers) in self.slots[var].iter_mut().enumerate() {
            if val == keep_val {
                continue;
            }
            for achiever in achievers.iter_mut() {
                if achiever.producer >= position as isize {
                    break;
                }
                achiever.valid_until = achiever.valid_until.min(position);
            }
        }
    }
}
