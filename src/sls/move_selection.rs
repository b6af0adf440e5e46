//! Scoring candidate moves and choosing one.
//!
//! The score of a candidate is the weighted change of the local score over
//! the assertions containing its variable, where an assertion's local score
//! is 1 when satisfied and `scale_unsat * degree` otherwise.

use crate::sls::config::SearchConfig;
use crate::sls::eval::Evaluator;
use crate::sls::formula::AssertionId;
use crate::sls::random::Random;
use crate::sls::term::VarId;
use crate::sls::theory::{CandidateMove, MoveContext, MoveKind};
use crate::sls::value::Value;

/// Deltas within this distance of zero count as zero.
pub const IMPROVEMENT_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy)]
pub struct MoveSelector {
    scale_unsat: f64,
    early_prune: bool,
    random_offset: bool,
}

/// Upper bounds on the remaining gain, per position in an occurrence list.
#[derive(Debug, Default)]
struct Headroom {
    var: Option<VarId>,
    suffix: Vec<f64>,
}

impl MoveSelector {
    #[must_use]
    pub const fn new(config: &SearchConfig) -> Self {
        Self {
            scale_unsat: config.scale_unsat,
            early_prune: config.early_prune,
            random_offset: config.random_offset,
        }
    }

    fn new_score(&self, degree: f64) -> f64 {
        if degree >= 1.0 {
            1.0
        } else {
            self.scale_unsat * degree
        }
    }

    /// The largest local score any assignment can reach.
    fn max_score(&self) -> f64 {
        self.scale_unsat.max(1.0)
    }

    fn headroom(&self, ctx: &MoveContext<'_>, weights: &[u32], var: VarId, into: &mut Headroom) {
        if into.var == Some(var) {
            return;
        }
        let occ = ctx.formula.occurrences(var);
        let ceiling = self.max_score();
        into.var = Some(var);
        into.suffix.clear();
        into.suffix.resize(occ.len() + 1, 0.0);
        for (k, a) in occ.iter().enumerate().rev() {
            let old = ctx.cache.local_score(*a, self.scale_unsat);
            let gain = f64::from(weights[a.index()]) * (ceiling - old);
            into.suffix[k] = into.suffix[k + 1] + gain;
        }
    }

    /// The score change of setting `var` to `value`. With a `bound`, gives up
    /// (returning `None`) as soon as the result provably cannot exceed it.
    fn delta(
        &self,
        ctx: &MoveContext<'_>,
        weights: &[u32],
        var: VarId,
        value: &Value,
        bound: Option<f64>,
        headroom: &[f64],
    ) -> Option<f64> {
        let eval = Evaluator::new(ctx.formula, ctx.assignment.values()).with_override(var, value);
        let mut partial = 0.0;
        for (k, &a) in ctx.formula.occurrences(var).iter().enumerate() {
            let old = ctx.cache.local_score(a, self.scale_unsat);
            let new = self.new_score(eval.assertion_degree(a));
            partial += f64::from(weights[a.index()]) * (new - old);
            if let Some(b) = bound {
                if partial + headroom[k + 1] <= b {
                    return None;
                }
            }
        }
        Some(partial)
    }

    /// Scores a single move exactly.
    #[must_use]
    pub fn score(&self, ctx: &MoveContext<'_>, weights: &[u32], var: VarId, value: &Value) -> f64 {
        self.delta(ctx, weights, var, value, None, &[]).unwrap_or(f64::NEG_INFINITY)
    }

    /// Fills in every candidate's delta and returns the index of the best
    /// one. Pruned candidates get `-inf`. Among equal deltas a plateau move
    /// beats a non-plateau one, otherwise ties go to the first candidate in
    /// scan order, which starts at a random offset when `random_offset` is set.
    pub fn select(
        &self,
        ctx: &MoveContext<'_>,
        weights: &[u32],
        candidates: &mut [CandidateMove],
        rng: &mut Random,
    ) -> Option<usize> {
        let n = candidates.len();
        if n == 0 {
            return None;
        }
        let start = if self.random_offset { rng.below(n) } else { 0 };
        let mut headroom = Headroom::default();
        let mut best: Option<(usize, f64, bool)> = None;
        for k in 0..n {
            let i = (start + k) % n;
            let var = candidates[i].var;
            let plateau = candidates[i].plateau;
            let bound = if self.early_prune {
                self.headroom(ctx, weights, var, &mut headroom);
                best.map(|(_, d, p)| if plateau && !p { d - IMPROVEMENT_EPSILON } else { d })
            } else {
                None
            };
            let delta = self.delta(
                ctx,
                weights,
                var,
                &candidates[i].value,
                bound,
                &headroom.suffix,
            );
            candidates[i].delta = delta.unwrap_or(f64::NEG_INFINITY);
            if let Some(d) = delta {
                let wins = best.is_none_or(|(_, b, p)| {
                    d > b || (plateau && !p && d >= b - IMPROVEMENT_EPSILON)
                });
                if wins {
                    best = Some((i, d, plateau));
                }
            }
        }
        best.map(|(i, ..)| i)
    }

    /// Monte-Carlo neighbourhood search: `vns_mc` random two-bit flips per bit
    /// of every bit-vector variable of `target`. Returns the best one found if
    /// it improves.
    #[must_use]
    pub fn vns(
        &self,
        ctx: &MoveContext<'_>,
        weights: &[u32],
        target: AssertionId,
        vns_mc: u32,
        rng: &mut Random,
    ) -> Option<CandidateMove> {
        if vns_mc == 0 {
            return None;
        }
        let mut best: Option<CandidateMove> = None;
        for &var in &ctx.formula.assertion(target).vars {
            let Some(x) = ctx.current(var).as_bv() else {
                continue;
            };
            if x.width < 2 {
                continue;
            }
            for _ in 0..vns_mc.saturating_mul(x.width) {
                let first = rng.below_u32(x.width);
                let second = (first + 1 + rng.below_u32(x.width - 1)) % x.width;
                let value = Value::Bv(x.flip(first).flip(second));
                let delta = self.score(ctx, weights, var, &value);
                if best.as_ref().is_none_or(|b| delta > b.delta) {
                    let kind = MoveKind::DoubleFlip { first, second };
                    let mut c = CandidateMove::new(var, value, kind);
                    c.delta = delta;
                    best = Some(c);
                }
            }
        }
        best.filter(is_improving)
    }
}

/// Whether applying `c` makes progress.
#[must_use]
pub fn is_improving(c: &CandidateMove) -> bool {
    c.delta > IMPROVEMENT_EPSILON || (c.plateau && c.delta >= -IMPROVEMENT_EPSILON)
}
