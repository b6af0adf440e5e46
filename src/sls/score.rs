//! The score cache: per-assertion satisfaction degree and violation flag,
//! the set of violated assertions, and the global weighted score
//! `Σ weight(a) · violated(a)`.
//!
//! The cache is only an optimisation. After any move, refreshing the
//! assertions that mention the moved variable must leave it identical to a
//! rebuild from scratch; `matches_recomputation` checks exactly that.

use crate::sls::assignment::Assignment;
use crate::sls::eval::Evaluator;
use crate::sls::formula::{AssertionId, Formula};
use bit_vec::BitVec;

const NOT_LISTED: usize = usize::MAX;

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreCache {
    degrees: Vec<f64>,
    violated: BitVec,
    unsat: Vec<AssertionId>,
    unsat_pos: Vec<usize>,
    weighted: u64,
}

impl ScoreCache {
    #[must_use]
    pub fn new(formula: &Formula, assignment: &Assignment, weights: &[u32]) -> Self {
        let n = formula.len();
        let mut cache = Self {
            degrees: vec![0.0; n],
            violated: BitVec::from_elem(n, false),
            unsat: Vec::new(),
            unsat_pos: vec![NOT_LISTED; n],
            weighted: 0,
        };
        cache.rebuild(formula, assignment, weights);
        cache
    }

    /// Recomputes every entry from scratch.
    pub fn rebuild(&mut self, formula: &Formula, assignment: &Assignment, weights: &[u32]) {
        self.unsat.clear();
        self.unsat_pos.fill(NOT_LISTED);
        self.violated.clear();
        self.weighted = 0;
        let eval = Evaluator::new(formula, assignment.values());
        for a in formula.assertions() {
            let degree = eval.assertion_degree(a.id);
            self.degrees[a.id.index()] = degree;
            if degree < 1.0 {
                self.mark_violated(a.id);
                self.weighted += u64::from(weights[a.id.index()]);
            }
        }
    }

    /// Re-evaluates the given assertions after a move.
    pub fn refresh(
        &mut self,
        formula: &Formula,
        assignment: &Assignment,
        weights: &[u32],
        assertions: &[AssertionId],
    ) {
        let eval = Evaluator::new(formula, assignment.values());
        for &a in assertions {
            let degree = eval.assertion_degree(a);
            self.degrees[a.index()] = degree;
            let was = self.is_violated(a);
            let now = degree < 1.0;
            let w = u64::from(weights[a.index()]);
            match (was, now) {
                (false, true) => {
                    self.mark_violated(a);
                    self.weighted += w;
                }
                (true, false) => {
                    self.mark_satisfied(a);
                    self.weighted -= w;
                }
                _ => {}
            }
        }
    }

    /// Accounts for a weight change of `a`.
    pub fn reweigh(&mut self, a: AssertionId, old: u32, new: u32) {
        if self.is_violated(a) {
            self.weighted = self.weighted - u64::from(old) + u64::from(new);
        }
    }

    fn mark_violated(&mut self, a: AssertionId) {
        self.violated.set(a.index(), true);
        self.unsat_pos[a.index()] = self.unsat.len();
        self.unsat.push(a);
    }

    fn mark_satisfied(&mut self, a: AssertionId) {
        self.violated.set(a.index(), false);
        let pos = self.unsat_pos[a.index()];
        self.unsat_pos[a.index()] = NOT_LISTED;
        self.unsat.swap_remove(pos);
        if let Some(&moved) = self.unsat.get(pos) {
            self.unsat_pos[moved.index()] = pos;
        }
    }

    #[must_use]
    pub fn degree(&self, a: AssertionId) -> f64 {
        self.degrees[a.index()]
    }

    #[must_use]
    pub fn is_violated(&self, a: AssertionId) -> bool {
        self.violated.get(a.index()).unwrap_or(false)
    }

    /// Score used by move evaluation: 1 when satisfied, otherwise the degree
    /// scaled by `scale_unsat`.
    #[must_use]
    pub fn local_score(&self, a: AssertionId, scale_unsat: f64) -> f64 {
        if self.is_violated(a) {
            scale_unsat * self.degree(a)
        } else {
            1.0
        }
    }

    /// Violated assertions, in cache order.
    #[must_use]
    pub fn unsat(&self) -> &[AssertionId] {
        &self.unsat
    }

    #[must_use]
    pub fn num_unsat(&self) -> usize {
        self.unsat.len()
    }

    #[must_use]
    pub const fn weighted_score(&self) -> u64 {
        self.weighted
    }

    /// Whether this cache equals one rebuilt from scratch.
    #[must_use]
    pub fn matches_recomputation(
        &self,
        formula: &Formula,
        assignment: &Assignment,
        weights: &[u32],
    ) -> bool {
        let fresh = Self::new(formula, assignment, weights);
        let mut ours = self.unsat.clone();
        let mut theirs = fresh.unsat.clone();
        ours.sort_unstable();
        theirs.sort_unstable();
        self.weighted == fresh.weighted
            && self.violated == fresh.violated
            && ours == theirs
            && self
                .degrees
                .iter()
                .zip(&fresh.degrees)
                .all(|(x, y)| x.to_bits() == y.to_bits())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sls::formula::{FormulaBuilder, FormulaResult};
    use crate::sls::term::VarId;
    use crate::sls::value::Value;

    #[test]
    fn test_incremental_matches_rebuild() -> FormulaResult<()> {
        let mut b = FormulaBuilder::new();
        let x = b.int_var("x")?;
        let y = b.int_var("y")?;
        let three = b.int(3);
        let four = b.int(4);
        let e1 = b.eq(x, three)?;
        let e2 = b.eq(y, four)?;
        let s = b.add(&[x, y])?;
        let seven = b.int(7);
        let e3 = b.eq(s, seven)?;
        b.assert(e1)?;
        b.assert(e2)?;
        b.assert(e3)?;
        let f = b.build();
        let weights = vec![40, 41, 42];

        let mut a = Assignment::baseline(&f);
        let mut cache = ScoreCache::new(&f, &a, &weights);
        assert_eq!(cache.num_unsat(), 3);
        assert_eq!(cache.weighted_score(), 123);

        a.set(VarId(0), Value::int(3));
        cache.refresh(&f, &a, &weights, f.occurrences(VarId(0)));
        assert!(cache.matches_recomputation(&f, &a, &weights));
        assert_eq!(cache.weighted_score(), 83);

        a.set(VarId(1), Value::int(4));
        cache.refresh(&f, &a, &weights, f.occurrences(VarId(1)));
        assert!(cache.matches_recomputation(&f, &a, &weights));
        assert_eq!(cache.weighted_score(), 0);
        assert!(cache.unsat().is_empty());
        Ok(())
    }

    #[test]
    fn test_reweigh_only_counts_violated() -> FormulaResult<()> {
        let mut b = FormulaBuilder::new();
        let p = b.bool_var("p")?;
        let np = b.not(p)?;
        b.assert(p)?;
        b.assert(np)?;
        let f = b.build();
        let a = Assignment::baseline(&f);
        let mut cache = ScoreCache::new(&f, &a, &[40, 40]);
        assert_eq!(cache.weighted_score(), 40);
        cache.reweigh(AssertionId(0), 40, 45);
        cache.reweigh(AssertionId(1), 40, 50);
        assert_eq!(cache.weighted_score(), 45);
        assert!(cache.matches_recomputation(&f, &a, &[45, 50]));
        Ok(())
    }
}
