//! Moves for integer and real variables.
//!
//! With lookahead, every unsatisfied comparison atom that mentions the
//! variable is treated as `g(x) ⋈ 0` with `g` linear in `x`. The slope is
//! estimated by a secant through `x0` and `x0 + 1`, which is exact for
//! linear terms, and the boundary value solving the atom is proposed
//! (rounded the right way for `Int`). Steps of `±1` are always proposed.

use crate::sls::config::SearchConfig;
use crate::sls::formula::{AssertionId, Formula};
use crate::sls::random::Random;
use crate::sls::sort::Sort;
use crate::sls::term::{Term, TermId, VarId};
use crate::sls::theory::{CandidateMove, MoveContext, MoveKind, TheoryMover};
use crate::sls::value::Value;
use num_rational::BigRational;
use num_traits::{One, Signed, Zero};

/// `lhs - rhs ⋈ 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Eq,
    Le,
    Lt,
}

/// Rewrites a numeric comparison atom that should take truth value `want`
/// as `(lhs, rhs, rel)` meaning `lhs - rhs rel 0`. Disequalities are not
/// solvable this way and give `None`.
#[must_use]
pub fn comparison(formula: &Formula, t: TermId, want: bool) -> Option<(TermId, TermId, Relation)> {
    let (rel, a, b) = match formula.term(t) {
        Term::Eq(a, b) if formula.sort_of(*a).is_numeric() => {
            return want.then_some((*a, *b, Relation::Eq));
        }
        Term::Le(a, b) => (Relation::Le, *a, *b),
        Term::Lt(a, b) => (Relation::Lt, *a, *b),
        Term::Ge(a, b) => (Relation::Le, *b, *a),
        Term::Gt(a, b) => (Relation::Lt, *b, *a),
        _ => return None,
    };
    if want {
        return Some((a, b, rel));
    }
    // not (a <= b) is b < a, not (a < b) is b <= a
    let flipped = match rel {
        Relation::Le => Relation::Lt,
        _ => Relation::Le,
    };
    Some((b, a, flipped))
}

/// Values of `x` satisfying `g(x) rel 0` for the line through
/// `(x0, g0)` and `(x0 + 1, g1)`. Empty when the line is flat.
#[must_use]
pub fn solve_linear(
    x0: &BigRational,
    g0: &BigRational,
    g1: &BigRational,
    rel: Relation,
    integral: bool,
) -> Vec<BigRational> {
    let slope = g1 - g0;
    if slope.is_zero() {
        return Vec::new();
    }
    let root = x0 - g0 / &slope;
    let one = BigRational::one();
    let rising = slope.is_positive();
    match (rel, integral) {
        (Relation::Eq, false) => vec![root],
        (Relation::Eq, true) if root.is_integer() => vec![root],
        (Relation::Eq, true) => vec![root.floor(), root.ceil()],
        (Relation::Le, false) => vec![root],
        (Relation::Le, true) if rising => vec![root.floor()],
        (Relation::Le, true) => vec![root.ceil()],
        (Relation::Lt, false) if rising => vec![root - one],
        (Relation::Lt, false) => vec![root + one],
        (Relation::Lt, true) if rising => vec![root.ceil() - one],
        (Relation::Lt, true) => vec![root.floor() + one],
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ArithMover {
    lookahead: bool,
    clausal: bool,
    plateau: bool,
}

impl ArithMover {
    #[must_use]
    pub const fn new(config: &SearchConfig) -> Self {
        Self {
            lookahead: config.arith_use_lookahead,
            clausal: config.arith_use_clausal_lookahead,
            plateau: config.arith_allow_plateau,
        }
    }

    fn lookahead_moves(
        &self,
        ctx: &MoveContext<'_>,
        target: Option<AssertionId>,
        var: VarId,
        x0: &BigRational,
        out: &mut Vec<CandidateMove>,
    ) {
        let integral = ctx.formula.variable(var).sort == Sort::Int;
        let eval = ctx.eval();
        let next = Value::Num(x0 + BigRational::one());
        let ahead = eval.with_override(var, &next);
        for (atom, want) in ctx.unsatisfied_atoms(target, var, self.clausal, false) {
            let Some((lhs, rhs, rel)) = comparison(ctx.formula, atom, want) else {
                continue;
            };
            let g0 = eval.num(lhs) - eval.num(rhs);
            let g1 = ahead.num(lhs) - ahead.num(rhs);
            for x in solve_linear(x0, &g0, &g1, rel, integral) {
                out.push(CandidateMove::new(var, Value::Num(x), MoveKind::Assign));
            }
        }
    }
}

impl TheoryMover for ArithMover {
    fn propose(
        &self,
        ctx: &MoveContext<'_>,
        target: Option<AssertionId>,
        var: VarId,
        _rng: &mut Random,
        out: &mut Vec<CandidateMove>,
    ) {
        let Some(x0) = ctx.current(var).as_num() else {
            return;
        };
        let one = BigRational::one();
        if self.lookahead {
            self.lookahead_moves(ctx, target, var, x0, out);
            out.push(CandidateMove::new(var, Value::Num(x0 + &one), MoveKind::Step));
            out.push(CandidateMove::new(var, Value::Num(x0 - &one), MoveKind::Step));
        } else {
            out.push(CandidateMove::new(var, Value::Num(x0 + &one), MoveKind::Step));
            out.push(CandidateMove::new(var, Value::Num(x0 - &one), MoveKind::Step));
            out.push(CandidateMove::new(var, Value::Num(-x0), MoveKind::Assign));
            out.push(CandidateMove::new(var, Value::zero_num(), MoveKind::Assign));
        }
    }

    fn allows_plateau(&self) -> bool {
        self.plateau
    }
}
