use crate::sls::formula::{Formula, FormulaBuilder, FormulaResult};
use crate::sls::solver::Model;
use crate::sls::term::{TermId, VarId};
use itertools::Itertools;
use std::fmt;

/// An N-queens instance: one queen per column of an `size x size` board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Queens {
    size: usize,
}

/// The row of the queen in each column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement(Vec<usize>);

impl Placement {
    #[must_use]
    pub const fn new(rows: Vec<usize>) -> Self {
        Self(rows)
    }

    #[must_use]
    pub fn rows(&self) -> &[usize] {
        &self.0
    }

    /// Whether no two queens attack each other.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        let n = self.0.len();
        self.0.iter().all(|&r| r < n)
            && self
                .0
                .iter()
                .enumerate()
                .tuple_combinations()
                .all(|((i, &ri), (j, &rj))| ri != rj && ri.abs_diff(rj) != j - i)
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = self.0.len();
        for row in 0..n {
            let line: String = self.0.iter().map(|&r| if r == row { 'Q' } else { '.' }).collect();
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

impl Queens {
    #[must_use]
    pub const fn new(size: usize) -> Self {
        Self { size }
    }

    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Builds the formula. Variable `q{i}` is the row of the queen in column `i`.
    ///
    /// # Errors
    /// Only if the builder rejects a term, which the encoding never triggers.
    pub fn to_formula(&self) -> FormulaResult<Formula> {
        let mut b = FormulaBuilder::new();
        let n = i64::try_from(self.size).unwrap_or(i64::MAX);
        let zero = b.int(0);
        let last = b.int(n - 1);

        let queens: Vec<TermId> = (0..self.size)
            .map(|i| b.int_var(&format!("q{i}")))
            .collect::<FormulaResult<_>>()?;

        for &q in &queens {
            let lower = b.ge(q, zero)?;
            let upper = b.le(q, last)?;
            b.assert(lower)?;
            b.assert(upper)?;
        }

        for (i, j) in (0..self.size).tuple_combinations() {
            let (qi, qj) = (queens[i], queens[j]);
            let gap = b.int(i64::try_from(j - i).unwrap_or(i64::MAX));

            let same_row = b.eq(qi, qj)?;
            let down = b.sub(qj, qi)?;
            let down = b.eq(down, gap)?;
            let up = b.sub(qi, qj)?;
            let up = b.eq(up, gap)?;

            for attack in [same_row, down, up] {
                let safe = b.not(attack)?;
                b.assert(safe)?;
            }
        }

        Ok(b.build())
    }

    /// Reads the board back out of a model of `to_formula`.
    /// Returns `None` if some queen is off the board.
    #[must_use]
    pub fn decode(&self, model: &Model) -> Option<Placement> {
        (0..self.size)
            .map(|i| {
                let var = VarId(u32::try_from(i).ok()?);
                let row = model.get(var)?.as_i64()?;
                usize::try_from(row).ok().filter(|r| *r < self.size)
            })
            .collect::<Option<Vec<_>>>()
            .map(Placement)
    }
}

impl From<usize> for Queens {
    fn from(size: usize) -> Self {
        Self::new(size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sls::config::SearchConfig;
    use crate::sls::engine::Engine;
    use crate::sls::solver::Verdict;
    use crate::sls::trace::TraceContext;
    use crate::sls::value::Value;

    #[test]
    fn test_encoding_size() {
        let f = Queens::new(4).to_formula().unwrap();
        assert_eq!(f.num_vars(), 4);
        // two bounds per queen, three attacks per pair
        assert_eq!(f.len(), 4 * 2 + 6 * 3);
    }

    #[test]
    fn test_placement_validity() {
        assert!(Placement::new(vec![1, 3, 0, 2]).is_valid());
        assert!(!Placement::new(vec![0, 1, 2, 3]).is_valid());
        assert!(!Placement::new(vec![0, 2, 0, 2]).is_valid());
        assert!(!Placement::new(vec![1, 3, 0, 4]).is_valid());
    }

    #[test]
    fn test_decode() {
        let queens = Queens::new(4);
        let model = Model::new([1, 3, 0, 2].into_iter().map(Value::int).collect());
        let placement = queens.decode(&model).unwrap();
        assert_eq!(placement.rows(), &[1, 3, 0, 2]);
        assert_eq!(placement.to_string(), "..Q.\nQ...\n...Q\n.Q..\n");

        let off_board = Model::new([1, 3, 0, 7].into_iter().map(Value::int).collect());
        assert!(queens.decode(&off_board).is_none());
    }

    #[test]
    fn test_solve_five_queens() {
        let queens = Queens::new(5);
        let f = queens.to_formula().unwrap();
        let config = SearchConfig {
            max_repairs: 200_000,
            ..SearchConfig::default()
        };
        let trace = TraceContext::disabled();
        let outcome = Engine::new(&f, config, &trace).run();
        let Verdict::Sat(model) = outcome.verdict else {
            panic!("expected a model, got {}", outcome.verdict);
        };
        assert!(queens.decode(&model).unwrap().is_valid());
    }
}
