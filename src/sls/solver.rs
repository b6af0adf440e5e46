#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! The public result surface of a search.

use crate::sls::formula::{AssertionId, Formula};
use crate::sls::term::VarId;
use crate::sls::value::Value;
use std::fmt;

/// Why a search gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Limit {
    Repairs,
    Restarts,
    Memory,
    Cancelled,
    Deadline,
    /// The incremental state disagreed with a recomputation.
    Inconsistent,
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Repairs => "max_repairs reached",
            Self::Restarts => "max_restarts reached",
            Self::Memory => "max_memory exceeded",
            Self::Cancelled => "cancelled",
            Self::Deadline => "deadline passed",
            Self::Inconsistent => "internal inconsistency",
        };
        write!(f, "{s}")
    }
}

/// A satisfying assignment, in variable order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Model(Vec<Value>);

impl Model {
    #[must_use]
    pub const fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    #[must_use]
    pub fn get(&self, var: VarId) -> Option<&Value> {
        self.0.get(var.index())
    }

    /// Looks a value up by variable name.
    #[must_use]
    pub fn value_of(&self, formula: &Formula, name: &str) -> Option<&Value> {
        formula.var_by_name(name).and_then(|v| self.get(v))
    }

    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.0
    }

    /// `name = value` pairs, in variable order.
    pub fn named<'a>(
        &'a self,
        formula: &'a Formula,
    ) -> impl Iterator<Item = (&'a str, &'a Value)> + 'a {
        formula
            .variables()
            .iter()
            .zip(&self.0)
            .map(|(var, value)| (var.name.as_str(), value))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Sat(Model),
    Unknown(Limit),
}

impl Verdict {
    #[must_use]
    pub const fn is_sat(&self) -> bool {
        matches!(self, Self::Sat(_))
    }

    #[must_use]
    pub const fn model(&self) -> Option<&Model> {
        match self {
            Self::Sat(m) => Some(m),
            Self::Unknown(_) => None,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sat(_) => write!(f, "sat"),
            Self::Unknown(limit) => write!(f, "unknown ({limit})"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchStats {
    pub repairs: u64,
    pub moves: u64,
    pub restarts: u32,
    pub random_walks: u64,
    pub repicks: u64,
    pub vns_moves: u64,
    pub smoothings: u64,
    pub rescores: u64,
    pub final_score: u64,
    pub final_unsat: usize,
    /// Violated assertions at the end, when `track_unsat` is set.
    pub unsat_assertions: Vec<AssertionId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOutcome {
    pub verdict: Verdict,
    pub stats: SearchStats,
}

/// Anything that can search a formula for a model.
pub trait Solver {
    fn solve(&mut self) -> SearchOutcome;

    fn stats(&self) -> SearchStats;
}
