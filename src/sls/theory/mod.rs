//! Theory movers: per-sort generators of candidate moves.
//!
//! A mover looks at one variable, the current assignment and (optionally)
//! the assertion being repaired, and appends candidate new values to an
//! output buffer. It never changes the assignment and keeps no state about
//! it; the Move Selector scores the candidates afterwards.

pub mod arith;
pub mod boolean;
pub mod bv;
pub mod datatype;
pub mod string;

use crate::sls::assignment::Assignment;
use crate::sls::config::SearchConfig;
use crate::sls::eval::Evaluator;
use crate::sls::formula::{AssertionId, Formula, Polarity};
use crate::sls::random::Random;
use crate::sls::score::ScoreCache;
use crate::sls::sort::Theory;
use crate::sls::term::{Term, TermId, VarId};
use crate::sls::value::Value;
use rustc_hash::FxHashSet;
use std::fmt::Debug;

use self::arith::ArithMover;
use self::boolean::BoolMover;
use self::bv::BvMover;
use self::datatype::DatatypeMover;
use self::string::StringMover;

/// How a candidate value was derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MoveKind {
    Flip,
    Assign,
    Step,
    BitFlip { bit: u32 },
    Rotate { amount: u32 },
    DoubleFlip { first: u32, second: u32 },
    Constructor { ctor: usize },
    Edit { position: usize },
    Subsequence,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CandidateMove {
    pub var: VarId,
    pub value: Value,
    pub kind: MoveKind,
    /// Predicted change of the local score, filled in by the Move Selector.
    pub delta: f64,
    /// Whether a zero-delta version of this move counts as improving.
    pub plateau: bool,
}

impl CandidateMove {
    #[must_use]
    pub const fn new(var: VarId, value: Value, kind: MoveKind) -> Self {
        Self {
            var,
            value,
            kind,
            delta: 0.0,
            plateau: false,
        }
    }
}

/// Read-only view of the search state handed to movers.
#[derive(Debug, Clone, Copy)]
pub struct MoveContext<'a> {
    pub formula: &'a Formula,
    pub assignment: &'a Assignment,
    pub cache: &'a ScoreCache,
}

impl<'a> MoveContext<'a> {
    #[must_use]
    pub const fn new(
        formula: &'a Formula,
        assignment: &'a Assignment,
        cache: &'a ScoreCache,
    ) -> Self {
        Self {
            formula,
            assignment,
            cache,
        }
    }

    #[must_use]
    pub fn eval(&self) -> Evaluator<'a> {
        Evaluator::new(self.formula, self.assignment.values())
    }

    #[must_use]
    pub fn current(&self, var: VarId) -> &'a Value {
        self.assignment.get(var)
    }

    /// Whether `t` is the variable `var` itself.
    #[must_use]
    pub fn is_var(&self, t: TermId, var: VarId) -> bool {
        matches!(self.formula.term(t), Term::Var(v) if *v == var)
    }

    /// Atoms mentioning `var` whose truth value differs from the one their
    /// assertion wants, paired with the wanted value.
    ///
    /// With `only_target` the atoms come from `target` alone. Otherwise they
    /// come from every violated assertion containing `var`.
    #[must_use]
    pub fn unsatisfied_atoms(
        &self,
        target: Option<AssertionId>,
        var: VarId,
        only_target: bool,
        top_level_only: bool,
    ) -> Vec<(TermId, bool)> {
        let eval = self.eval();
        let sources: Vec<AssertionId> = match target {
            Some(t) if only_target => vec![t],
            _ => self
                .formula
                .occurrences(var)
                .iter()
                .copied()
                .filter(|a| Some(*a) == target || self.cache.is_violated(*a))
                .collect(),
        };
        let mut atoms: Vec<(TermId, bool)> = Vec::new();
        for a in sources {
            for atom in &self.formula.assertion(a).atoms {
                if top_level_only && !atom.top_level {
                    continue;
                }
                if !self.formula.mentions(atom.term, var) {
                    continue;
                }
                let current = eval.truth(atom.term);
                let want = match atom.polarity {
                    Polarity::Positive => true,
                    Polarity::Negative => false,
                    Polarity::Both => !current,
                };
                if current != want && !atoms.contains(&(atom.term, want)) {
                    atoms.push((atom.term, want));
                }
            }
        }
        atoms
    }
}

pub trait TheoryMover: Debug {
    /// Appends candidate moves for `var` to `out`.
    fn propose(
        &self,
        ctx: &MoveContext<'_>,
        target: Option<AssertionId>,
        var: VarId,
        rng: &mut Random,
        out: &mut Vec<CandidateMove>,
    );

    /// Whether zero-delta moves from this mover count as improving.
    fn allows_plateau(&self) -> bool {
        false
    }
}

/// One mover per theory, dispatched on the variable's sort.
#[derive(Debug, Clone)]
pub struct Movers {
    boolean: BoolMover,
    arith: ArithMover,
    bv: BvMover,
    datatype: DatatypeMover,
    string: StringMover,
}

impl Movers {
    #[must_use]
    pub fn new(formula: &Formula, config: &SearchConfig) -> Self {
        Self {
            boolean: BoolMover,
            arith: ArithMover::new(config),
            bv: BvMover::new(config),
            datatype: DatatypeMover::new(formula, config),
            string: StringMover::new(config),
        }
    }

    #[must_use]
    pub fn mover(&self, theory: Theory) -> &dyn TheoryMover {
        match theory {
            Theory::Bool => &self.boolean,
            Theory::Arith => &self.arith,
            Theory::BitVec => &self.bv,
            Theory::Datatype => &self.datatype,
            Theory::String => &self.string,
        }
    }

    /// Proposes moves for `var`, dropping duplicates and no-op moves.
    pub fn propose(
        &self,
        ctx: &MoveContext<'_>,
        target: Option<AssertionId>,
        var: VarId,
        rng: &mut Random,
        out: &mut Vec<CandidateMove>,
    ) {
        let mover = self.mover(ctx.formula.variable(var).sort.theory());
        let start = out.len();
        mover.propose(ctx, target, var, rng, out);

        let current = ctx.current(var);
        let plateau = mover.allows_plateau();
        let proposed: Vec<CandidateMove> = out.drain(start..).collect();
        let mut seen: FxHashSet<Value> = FxHashSet::default();
        for mut candidate in proposed {
            if candidate.value != *current && seen.insert(candidate.value.clone()) {
                candidate.plateau = plateau;
                out.push(candidate);
            }
        }
    }
}
