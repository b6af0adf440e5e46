//! PAWS clause weighting.
//!
//! Every assertion starts at weight `paws_init` and never drops below it.
//! After each move the weights are either smoothed (with probability
//! `paws_sp / 1024`) or bumped, which pushes the search towards assertions
//! that stay violated.

use crate::sls::formula::AssertionId;
use crate::sls::random::Random;
use crate::sls::score::ScoreCache;

/// What a weight update did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightUpdate {
    Smoothed,
    Bumped(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paws {
    weights: Vec<u32>,
    floor: u32,
    smooth_probability: u32,
}

impl Paws {
    #[must_use]
    pub fn new(num_assertions: usize, floor: u32, smooth_probability: u32) -> Self {
        Self {
            weights: vec![floor; num_assertions],
            floor,
            smooth_probability,
        }
    }

    #[must_use]
    pub fn weights(&self) -> &[u32] {
        &self.weights
    }

    #[must_use]
    pub fn weight(&self, a: AssertionId) -> u32 {
        self.weights[a.index()]
    }

    #[must_use]
    pub const fn floor(&self) -> u32 {
        self.floor
    }

    /// Smooths or bumps. `bump` lists the assertions to bump; those that are
    /// no longer violated are skipped.
    pub fn update(
        &mut self,
        cache: &mut ScoreCache,
        bump: &[AssertionId],
        rng: &mut Random,
    ) -> WeightUpdate {
        if rng.chance(self.smooth_probability) {
            self.smooth(cache);
            return WeightUpdate::Smoothed;
        }
        let mut bumped = 0;
        for &a in bump {
            if cache.is_violated(a) {
                let old = self.weights[a.index()];
                let new = old.saturating_add(1);
                self.weights[a.index()] = new;
                cache.reweigh(a, old, new);
                bumped += 1;
            }
        }
        WeightUpdate::Bumped(bumped)
    }

    fn smooth(&mut self, cache: &mut ScoreCache) {
        for (i, w) in self.weights.iter_mut().enumerate() {
            let a = AssertionId(u32::try_from(i).unwrap_or(u32::MAX));
            if *w > self.floor && !cache.is_violated(a) {
                cache.reweigh(a, *w, *w - 1);
                *w -= 1;
            }
        }
    }

    /// Shifts every weight down so the smallest equals the floor.
    ///
    /// The caller rebuilds the score cache afterwards.
    pub fn rebase(&mut self) {
        let Some(&min) = self.weights.iter().min() else {
            return;
        };
        let shift = min - self.floor;
        if shift > 0 {
            for w in &mut self.weights {
                *w -= shift;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sls::assignment::Assignment;
    use crate::sls::formula::{FormulaBuilder, FormulaResult};

    fn two_assertions() -> FormulaResult<crate::sls::formula::Formula> {
        let mut b = FormulaBuilder::new();
        let p = b.bool_var("p")?;
        let q = b.bool_var("q")?;
        let nq = b.not(q)?;
        b.assert(p)?;
        b.assert(nq)?;
        Ok(b.build())
    }

    #[test]
    fn test_bump_only_violated() -> FormulaResult<()> {
        let f = two_assertions()?;
        let a = Assignment::baseline(&f);
        let mut paws = Paws::new(f.len(), 40, 0);
        let mut cache = ScoreCache::new(&f, &a, paws.weights());
        let mut rng = Random::new(0);

        let update = paws.update(&mut cache, &[AssertionId(0), AssertionId(1)], &mut rng);
        assert_eq!(update, WeightUpdate::Bumped(1));
        assert_eq!(paws.weights(), &[41, 40]);
        assert_eq!(cache.weighted_score(), 41);
        assert!(cache.matches_recomputation(&f, &a, paws.weights()));
        Ok(())
    }

    #[test]
    fn test_smoothing_respects_floor() -> FormulaResult<()> {
        let f = two_assertions()?;
        let a = Assignment::baseline(&f);
        let mut paws = Paws::new(f.len(), 40, 1024);
        let mut cache = ScoreCache::new(&f, &a, paws.weights());
        let mut rng = Random::new(0);

        for _ in 0..10 {
            assert_eq!(
                paws.update(&mut cache, &[AssertionId(0)], &mut rng),
                WeightUpdate::Smoothed
            );
        }
        assert!(paws.weights().iter().all(|&w| w >= 40));
        assert_eq!(cache.weighted_score(), 40);
        Ok(())
    }

    #[test]
    fn test_smoothing_lowers_satisfied() -> FormulaResult<()> {
        let f = two_assertions()?;
        let a = Assignment::baseline(&f);
        let mut paws = Paws {
            weights: vec![45, 43],
            floor: 40,
            smooth_probability: 1024,
        };
        let mut cache = ScoreCache::new(&f, &a, paws.weights());
        let mut rng = Random::new(0);
        paws.update(&mut cache, &[], &mut rng);
        assert_eq!(paws.weights(), &[45, 42]);
        assert!(cache.matches_recomputation(&f, &a, paws.weights()));
        Ok(())
    }

    #[test]
    fn test_rebase() {
        let mut paws = Paws {
            weights: vec![50, 47, 60],
            floor: 40,
            smooth_probability: 52,
        };
        paws.rebase();
        assert_eq!(paws.weights(), &[43, 40, 53]);
        paws.rebase();
        assert_eq!(paws.weights(), &[43, 40, 53]);
    }
}
