use crate::sls::formula::{Formula, FormulaBuilder, FormulaResult};
use crate::sls::random::Random;
use crate::sls::solver::Model;
use crate::sls::term::{TermId, VarId};
use itertools::Itertools;

/// A CNF instance. Literals are DIMACS style: `v` or `-v` for `1 <= v <= num_vars`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KSat {
    num_vars: usize,
    clauses: Vec<Vec<i32>>,
}

impl KSat {
    #[must_use]
    pub const fn new(num_vars: usize, clauses: Vec<Vec<i32>>) -> Self {
        Self { num_vars, clauses }
    }

    /// `num_clauses` clauses of `k` distinct variables each, with random signs.
    #[must_use]
    pub fn uniform(num_vars: usize, num_clauses: usize, k: usize, seed: u64) -> Self {
        let mut rng = Random::new(seed);
        let clauses = (0..num_clauses)
            .map(|_| random_clause(num_vars, k, &mut rng))
            .collect();
        Self::new(num_vars, clauses)
    }

    /// Like `uniform`, but every clause is satisfied by a hidden assignment
    /// drawn from the same seed.
    #[must_use]
    pub fn planted(num_vars: usize, num_clauses: usize, k: usize, seed: u64) -> Self {
        let mut rng = Random::new(seed);
        let hidden: Vec<bool> = (0..num_vars).map(|_| rng.flip()).collect();
        let clauses = (0..num_clauses)
            .map(|_| loop {
                let clause = random_clause(num_vars, k, &mut rng);
                if clause.iter().any(|&lit| literal_holds(lit, &hidden)) {
                    break clause;
                }
            })
            .collect();
        Self::new(num_vars, clauses)
    }

    #[must_use]
    pub const fn num_vars(&self) -> usize {
        self.num_vars
    }

    #[must_use]
    pub fn clauses(&self) -> &[Vec<i32>] {
        &self.clauses
    }

    /// One boolean variable `x{v}` per DIMACS variable and one `or` per clause.
    ///
    /// # Errors
    /// Only if the builder rejects a term, which the encoding never triggers.
    pub fn to_formula(&self) -> FormulaResult<Formula> {
        let mut b = FormulaBuilder::new();
        let vars: Vec<TermId> = (1..=self.num_vars)
            .map(|v| b.bool_var(&format!("x{v}")))
            .collect::<FormulaResult<_>>()?;
        for clause in &self.clauses {
            let lits = clause
                .iter()
                .map(|&lit| {
                    let var = vars[lit.unsigned_abs() as usize - 1];
                    if lit > 0 { Ok(var) } else { b.not(var) }
                })
                .collect::<FormulaResult<Vec<_>>>()?;
            let or = b.or(&lits)?;
            b.assert(or)?;
        }
        Ok(b.build())
    }

    /// Reads the model of `to_formula` back as DIMACS variable values.
    #[must_use]
    pub fn decode(&self, model: &Model) -> Option<Vec<bool>> {
        (0..self.num_vars)
            .map(|i| model.get(VarId(u32::try_from(i).ok()?))?.as_bool())
            .collect()
    }

    /// Whether every clause has a true literal under `values`.
    #[must_use]
    pub fn verify(&self, values: &[bool]) -> bool {
        values.len() == self.num_vars
            && self
                .clauses
                .iter()
                .all(|clause| clause.iter().any(|&lit| literal_holds(lit, values)))
    }
}

fn literal_holds(lit: i32, values: &[bool]) -> bool {
    let value = values[lit.unsigned_abs() as usize - 1];
    if lit > 0 { value } else { !value }
}

fn random_clause(num_vars: usize, k: usize, rng: &mut Random) -> Vec<i32> {
    let k = k.min(num_vars);
    let mut vars: Vec<usize> = Vec::with_capacity(k);
    while vars.len() < k {
        let v = rng.below(num_vars) + 1;
        if !vars.contains(&v) {
            vars.push(v);
        }
    }
    vars.into_iter()
        .sorted_unstable()
        .map(|v| {
            let lit = i32::try_from(v).unwrap_or(i32::MAX);
            if rng.flip() { lit } else { -lit }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sls::config::SearchConfig;
    use crate::sls::engine::Engine;
    use crate::sls::solver::Verdict;
    use crate::sls::trace::TraceContext;

    #[test]
    fn test_uniform_shape() {
        let ksat = KSat::uniform(20, 50, 3, 7);
        assert_eq!(ksat.clauses().len(), 50);
        for clause in ksat.clauses() {
            assert_eq!(clause.len(), 3);
            assert!(clause.iter().map(|l| l.unsigned_abs()).all_unique());
            assert!(clause.iter().all(|l| (1..=20).contains(&l.unsigned_abs())));
        }
        assert_eq!(ksat, KSat::uniform(20, 50, 3, 7));
    }

    #[test]
    fn test_k_is_capped_by_num_vars() {
        let ksat = KSat::uniform(2, 4, 3, 0);
        assert!(ksat.clauses().iter().all(|c| c.len() == 2));
    }

    #[test]
    fn test_planted_is_solved() {
        let ksat = KSat::planted(30, 120, 3, 11);
        let f = ksat.to_formula().unwrap();
        assert_eq!(f.len(), 120);
        let config = SearchConfig {
            max_repairs: 100_000,
            ..SearchConfig::default()
        };
        let trace = TraceContext::disabled();
        let outcome = Engine::new(&f, config, &trace).run();
        let Verdict::Sat(model) = outcome.verdict else {
            panic!("expected a model, got {}", outcome.verdict);
        };
        assert!(ksat.verify(&ksat.decode(&model).unwrap()));
    }
}
