#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]

use crate::sls::formula::Formula;
use crate::sls::random::Random;
use crate::sls::term::VarId;
use crate::sls::value::Value;
use core::ops::Index;

/// The total mapping from variables to values that the search mutates.
///
/// Every variable holds exactly one value at all times; there is no
/// "unassigned" state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Assignment(Vec<Value>);

impl Index<VarId> for Assignment {
    type Output = Value;

    fn index(&self, index: VarId) -> &Self::Output {
        &self.0[index.index()]
    }
}

impl Assignment {
    /// Every variable at the default value of its sort.
    #[must_use]
    pub fn baseline(formula: &Formula) -> Self {
        Self(
            formula
                .variables()
                .iter()
                .map(|v| formula.default_value(&v.sort))
                .collect(),
        )
    }

    /// Every variable at a fresh random value, drawn in variable order.
    pub fn random(formula: &Formula, rng: &mut Random) -> Self {
        Self(
            formula
                .variables()
                .iter()
                .map(|v| formula.random_value(&v.sort, rng))
                .collect(),
        )
    }

    /// Replaces the whole assignment according to the restart policy.
    pub fn reset(&mut self, formula: &Formula, randomize: bool, rng: &mut Random) {
        *self = if randomize {
            Self::random(formula, rng)
        } else {
            Self::baseline(formula)
        };
    }

    /// Sets `var` and returns its previous value.
    pub fn set(&mut self, var: VarId, value: Value) -> Value {
        std::mem::replace(&mut self.0[var.index()], value)
    }

    #[must_use]
    pub fn get(&self, var: VarId) -> &Value {
        &self[var]
    }

    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
