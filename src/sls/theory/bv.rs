//! Moves for bit-vector variables.

use crate::sls::config::SearchConfig;
use crate::sls::eval::Evaluator;
use crate::sls::formula::AssertionId;
use crate::sls::random::Random;
use crate::sls::term::{Term, TermId, VarId};
use crate::sls::theory::{CandidateMove, MoveContext, MoveKind, TheoryMover};
use crate::sls::value::{BvValue, Value};

#[derive(Debug, Clone, Copy)]
pub struct BvMover {
    lookahead: bool,
    top_level_only: bool,
    rotation: bool,
}

/// Multiplicative inverse of an odd `x` modulo `2^64`.
const fn odd_inverse(x: u64) -> u64 {
    // Newton iteration doubles the number of correct low bits each round.
    let mut inv = x;
    let mut i = 0;
    while i < 6 {
        inv = inv.wrapping_mul(2_u64.wrapping_sub(x.wrapping_mul(inv)));
        i += 1;
    }
    inv
}

/// Which of `a`, `b` mentions `var`, if exactly one does: `(inner, other)`.
fn split(
    ctx: &MoveContext<'_>,
    a: TermId,
    b: TermId,
    var: VarId,
) -> Option<(TermId, TermId, bool)> {
    match (ctx.formula.mentions(a, var), ctx.formula.mentions(b, var)) {
        (true, false) => Some((a, b, true)),
        (false, true) => Some((b, a, false)),
        _ => None,
    }
}

/// The value `var` must take for term `t` to evaluate to `want`, found by
/// peeling off invertible operators. `None` if the chain is not invertible.
fn invert(
    ctx: &MoveContext<'_>,
    eval: &Evaluator<'_>,
    t: TermId,
    var: VarId,
    want: BvValue,
) -> Option<BvValue> {
    match ctx.formula.term(t) {
        Term::Var(v) if *v == var => Some(want),
        Term::BvNot(a) => invert(ctx, eval, *a, var, want.with_bits(!want.bits)),
        Term::BvNeg(a) => invert(ctx, eval, *a, var, want.with_bits(want.bits.wrapping_neg())),
        Term::BvAdd(a, b) => {
            let (inner, other, _) = split(ctx, *a, *b, var)?;
            let o = eval.bv(other).bits;
            invert(ctx, eval, inner, var, want.with_bits(want.bits.wrapping_sub(o)))
        }
        Term::BvSub(a, b) => {
            let (inner, other, left) = split(ctx, *a, *b, var)?;
            let o = eval.bv(other).bits;
            let bits = if left {
                want.bits.wrapping_add(o)
            } else {
                o.wrapping_sub(want.bits)
            };
            invert(ctx, eval, inner, var, want.with_bits(bits))
        }
        Term::BvXor(a, b) => {
            let (inner, other, _) = split(ctx, *a, *b, var)?;
            let o = eval.bv(other).bits;
            invert(ctx, eval, inner, var, want.with_bits(want.bits ^ o))
        }
        Term::BvMul(a, b) => {
            let (inner, other, _) = split(ctx, *a, *b, var)?;
            let o = eval.bv(other).bits;
            if o & 1 == 0 {
                return None;
            }
            let bits = want.bits.wrapping_mul(odd_inverse(o));
            invert(ctx, eval, inner, var, want.with_bits(bits))
        }
        _ => None,
    }
}

impl BvMover {
    #[must_use]
    pub const fn new(config: &SearchConfig) -> Self {
        Self {
            lookahead: config.bv_use_lookahead,
            top_level_only: config.bv_use_top_level_assertions,
            rotation: config.bv_allow_rotation,
        }
    }

    /// Boundary values that make an unsigned comparison take `want`, for the
    /// side containing the variable.
    fn comparison_targets(
        strict: bool,
        want: bool,
        var_on_left: bool,
        other: BvValue,
    ) -> Vec<BvValue> {
        let max = BvValue::mask(other.width);
        let o = other.bits;
        let mut targets = Vec::with_capacity(2);
        match (strict, want, var_on_left) {
            // x < o
            (true, true, true) => {
                if o > 0 {
                    targets.push(o - 1);
                }
                targets.push(0);
            }
            // o < x
            (true, true, false) => {
                if o < max {
                    targets.push(o + 1);
                }
                targets.push(max);
            }
            // x >= o
            (true, false, true) => targets.extend([o, max]),
            // o >= x
            (true, false, false) => targets.extend([o, 0]),
            // x <= o
            (false, true, true) => targets.extend([o, 0]),
            // o <= x
            (false, true, false) => targets.extend([o, max]),
            // x > o
            (false, false, true) => {
                if o < max {
                    targets.push(o + 1);
                }
            }
            // o > x
            (false, false, false) => {
                if o > 0 {
                    targets.push(o - 1);
                }
            }
        }
        targets.into_iter().map(|bits| other.with_bits(bits)).collect()
    }

    fn lookahead_moves(
        &self,
        ctx: &MoveContext<'_>,
        target: Option<AssertionId>,
        var: VarId,
        out: &mut Vec<CandidateMove>,
    ) {
        let eval = ctx.eval();
        for (atom, want) in ctx.unsatisfied_atoms(target, var, false, self.top_level_only) {
            let (wanted, inner) = match ctx.formula.term(atom) {
                Term::Eq(a, b) if want && ctx.formula.sort_of(*a).bv_width().is_some() => {
                    let Some((inner, other, _)) = split(ctx, *a, *b, var) else {
                        continue;
                    };
                    (vec![eval.bv(other)], inner)
                }
                Term::BvUlt(a, b) | Term::BvUle(a, b) => {
                    let strict = matches!(ctx.formula.term(atom), Term::BvUlt(..));
                    let Some((inner, other, left)) = split(ctx, *a, *b, var) else {
                        continue;
                    };
                    (Self::comparison_targets(strict, want, left, eval.bv(other)), inner)
                }
                _ => continue,
            };
            for w in wanted {
                if let Some(v) = invert(ctx, &eval, inner, var, w) {
                    out.push(CandidateMove::new(var, Value::Bv(v), MoveKind::Assign));
                }
            }
        }
    }
}

impl TheoryMover for BvMover {
    fn propose(
        &self,
        ctx: &MoveContext<'_>,
        target: Option<AssertionId>,
        var: VarId,
        rng: &mut Random,
        out: &mut Vec<CandidateMove>,
    ) {
        let Some(x) = ctx.current(var).as_bv() else {
            return;
        };
        if self.lookahead {
            self.lookahead_moves(ctx, target, var, out);
            for bits in [x.bits.wrapping_add(1), x.bits.wrapping_sub(1)] {
                out.push(CandidateMove::new(var, Value::Bv(x.with_bits(bits)), MoveKind::Step));
            }
        }
        for bit in 0..x.width {
            out.push(CandidateMove::new(var, Value::Bv(x.flip(bit)), MoveKind::BitFlip { bit }));
        }
        if self.rotation && x.width > 1 {
            let w = x.width;
            let random = 1 + rng.below_u32(w - 1);
            for amount in [1, w - 1, random] {
                out.push(CandidateMove::new(
                    var,
                    Value::Bv(x.rotate_left(amount)),
                    MoveKind::Rotate { amount },
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sls::assignment::Assignment;
    use crate::sls::formula::{FormulaBuilder, FormulaResult};
    use crate::sls::score::ScoreCache;

    #[test]
    fn test_odd_inverse() {
        for x in [1_u64, 3, 5, 0xDEAD_BEEF, u64::MAX] {
            assert_eq!(x.wrapping_mul(odd_inverse(x)), 1);
        }
    }

    #[test]
    fn test_inverts_operator_chain() -> FormulaResult<()> {
        // ((x * 3) + 5) ^ 0x0F = 0x42
        let mut b = FormulaBuilder::new();
        let x = b.bv_var("x", 8)?;
        let three = b.bv(8, 3)?;
        let five = b.bv(8, 5)?;
        let mask = b.bv(8, 0x0F)?;
        let target = b.bv(8, 0x42)?;
        let mul = b.bv_mul(x, three)?;
        let add = b.bv_add(mul, five)?;
        let xor = b.bv_xor(add, mask)?;
        let eq = b.eq(xor, target)?;
        let a = b.assert(eq)?;
        let f = b.build();

        let assignment = Assignment::baseline(&f);
        let cache = ScoreCache::new(&f, &assignment, &[40]);
        let ctx = MoveContext::new(&f, &assignment, &cache);
        let mut out = Vec::new();
        let mover = BvMover::new(&SearchConfig::default());
        mover.propose(&ctx, Some(a), VarId(0), &mut Random::new(0), &mut out);

        let solved = out[0].value.clone();
        assert_eq!(out[0].kind, MoveKind::Assign);
        let values = vec![solved];
        let eval = Evaluator::new(&f, &values);
        assert!(eval.satisfied(a));
        Ok(())
    }

    #[test]
    fn test_comparison_boundaries() -> FormulaResult<()> {
        let mut b = FormulaBuilder::new();
        let x = b.bv_var("x", 4)?;
        let c = b.bv(4, 9)?;
        let gt = b.bv_ult(c, x)?;
        let a = b.assert(gt)?;
        let f = b.build();
        let assignment = Assignment::baseline(&f);
        let cache = ScoreCache::new(&f, &assignment, &[40]);
        let ctx = MoveContext::new(&f, &assignment, &cache);
        let mut out = Vec::new();
        let mover = BvMover::new(&SearchConfig::default());
        mover.propose(&ctx, Some(a), VarId(0), &mut Random::new(0), &mut out);
        assert_eq!(out[0].value, Value::Bv(BvValue::new(4, 10)));
        assert_eq!(out[1].value, Value::Bv(BvValue::new(4, 15)));
        Ok(())
    }

    #[test]
    fn test_nested_atoms_need_top_level_off() -> FormulaResult<()> {
        let mut b = FormulaBuilder::new();
        let x = b.bv_var("x", 4)?;
        let p = b.bool_var("p")?;
        let five = b.bv(4, 5)?;
        let eq = b.eq(x, five)?;
        let or = b.or(&[p, eq])?;
        let a = b.assert(or)?;
        let f = b.build();
        let assignment = Assignment::baseline(&f);
        let cache = ScoreCache::new(&f, &assignment, &[40]);
        let ctx = MoveContext::new(&f, &assignment, &cache);

        let solves = |top_level_only: bool| {
            let config = SearchConfig {
                bv_use_top_level_assertions: top_level_only,
                ..SearchConfig::default()
            };
            let mut out = Vec::new();
            BvMover::new(&config).propose(&ctx, Some(a), VarId(0), &mut Random::new(0), &mut out);
            out.iter()
                .any(|c| c.kind == MoveKind::Assign && c.value == Value::Bv(BvValue::new(4, 5)))
        };
        assert!(!solves(true));
        assert!(solves(false));
        Ok(())
    }

    #[test]
    fn test_flips_and_rotations() -> FormulaResult<()> {
        let mut b = FormulaBuilder::new();
        b.bv_var("x", 4)?;
        let f = b.build();
        let mut assignment = Assignment::baseline(&f);
        assignment.set(VarId(0), Value::Bv(BvValue::new(4, 0b0001)));
        let cache = ScoreCache::new(&f, &assignment, &[]);
        let ctx = MoveContext::new(&f, &assignment, &cache);
        let config = SearchConfig {
            bv_use_lookahead: false,
            ..SearchConfig::default()
        };
        let mut out = Vec::new();
        BvMover::new(&config).propose(&ctx, None, VarId(0), &mut Random::new(0), &mut out);
        assert_eq!(out.len(), 4 + 3);
        assert_eq!(out[4].value, Value::Bv(BvValue::new(4, 0b0010)));
        assert_eq!(out[5].value, Value::Bv(BvValue::new(4, 0b1000)));
        Ok(())
    }
}
