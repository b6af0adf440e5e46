#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! Choosing which violated assertion to repair next.
//!
//! `Uniform` picks uniformly among the violated assertions. `Ucb` treats
//! the choice as a bandit problem: an assertion's value is its current
//! degree plus an exploration bonus that shrinks the more often it has
//! been repaired, plus a small random noise term.

use crate::sls::config::SearchConfig;
use crate::sls::formula::AssertionId;
use crate::sls::random::Random;
use crate::sls::score::ScoreCache;
use ordered_float::OrderedFloat;
use std::cmp::Reverse;
use std::ops::{Index, IndexMut};

/// Noise is `noise * U{0..NOISE_LEVELS}`.
pub const NOISE_LEVELS: u32 = 256;

pub trait AssertionSelection {
    /// A violated assertion other than `exclude` (if another exists).
    fn pick(
        &mut self,
        cache: &ScoreCache,
        rng: &mut Random,
        exclude: Option<AssertionId>,
    ) -> Option<AssertionId>;

    /// Records that `a` was repaired.
    fn touch(&mut self, a: AssertionId);

    /// Decays the statistics at a restart boundary.
    fn forget(&mut self, factor: f64);

    /// Resets the statistics to their initial state.
    fn reinit(&mut self);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Uniform;

impl AssertionSelection for Uniform {
    fn pick(
        &mut self,
        cache: &ScoreCache,
        rng: &mut Random,
        exclude: Option<AssertionId>,
    ) -> Option<AssertionId> {
        let unsat = cache.unsat();
        match exclude {
            Some(ex) if unsat.len() > 1 && cache.is_violated(ex) => {
                let i = rng.below(unsat.len() - 1);
                let candidate = unsat[i];
                Some(if candidate == ex { unsat[unsat.len() - 1] } else { candidate })
            }
            _ => rng.pick(unsat).copied(),
        }
    }

    fn touch(&mut self, _: AssertionId) {}

    fn forget(&mut self, _: f64) {}

    fn reinit(&mut self) {}
}

/// Upper confidence bound selection.
#[derive(Debug, Clone, PartialEq)]
pub struct Ucb {
    touched: Vec<f64>,
    total: f64,
    initial_total: f64,
    constant: f64,
    noise: f64,
    early_prune: bool,
}

impl Index<AssertionId> for Ucb {
    type Output = f64;

    fn index(&self, index: AssertionId) -> &Self::Output {
        &self.touched[index.index()]
    }
}

impl IndexMut<AssertionId> for Ucb {
    fn index_mut(&mut self, index: AssertionId) -> &mut Self::Output {
        &mut self.touched[index.index()]
    }
}

impl Ucb {
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn new(num_assertions: usize, config: &SearchConfig) -> Self {
        let initial_total = if config.walksat_ucb_init {
            num_assertions.max(1) as f64
        } else {
            1.0
        };
        Self {
            touched: vec![1.0; num_assertions],
            total: initial_total,
            initial_total,
            constant: config.walksat_ucb_constant,
            noise: config.walksat_ucb_noise,
            early_prune: config.early_prune,
        }
    }

    #[must_use]
    pub const fn total(&self) -> f64 {
        self.total
    }

    fn exploration(&self, a: AssertionId) -> f64 {
        self.constant * (self.total.ln() / self[a]).sqrt()
    }

    /// The score an assertion with `degree` would get, without noise.
    #[must_use]
    pub fn value(&self, a: AssertionId, degree: f64) -> f64 {
        degree + self.exploration(a)
    }
}

impl AssertionSelection for Ucb {
    fn pick(
        &mut self,
        cache: &ScoreCache,
        rng: &mut Random,
        exclude: Option<AssertionId>,
    ) -> Option<AssertionId> {
        let skip = exclude.filter(|_| cache.num_unsat() > 1);
        // ties go to the lower id
        let mut best: Option<(OrderedFloat<f64>, Reverse<AssertionId>)> = None;
        for &a in cache.unsat() {
            let noise = self.noise * f64::from(rng.below_u32(NOISE_LEVELS));
            if Some(a) == skip {
                continue;
            }
            let bonus = self.exploration(a) + noise;
            if self.early_prune {
                if let Some(b) = best {
                    // degrees never exceed 1
                    if (OrderedFloat(1.0 + bonus), Reverse(a)) < b {
                        continue;
                    }
                }
            }
            let key = (OrderedFloat(cache.degree(a) + bonus), Reverse(a));
            if best.is_none_or(|b| key > b) {
                best = Some(key);
            }
        }
        best.map(|(_, Reverse(a))| a)
    }

    fn touch(&mut self, a: AssertionId) {
        self[a] += 1.0;
        self.total += 1.0;
    }

    fn forget(&mut self, factor: f64) {
        if (factor - 1.0).abs() < f64::EPSILON {
            return;
        }
        for t in &mut self.touched {
            *t = (*t * factor).max(f64::MIN_POSITIVE);
        }
        self.total = (self.total * factor).max(1.0);
    }

    fn reinit(&mut self) {
        self.touched.fill(1.0);
        self.total = self.initial_total;
    }
}

/// The selector picked by the configuration.
#[derive(Debug, Clone)]
pub enum Selector {
    Uniform(Uniform),
    Ucb(Ucb),
}

impl Selector {
    #[must_use]
    pub fn new(num_assertions: usize, config: &SearchConfig) -> Self {
        if config.walksat_ucb {
            Self::Ucb(Ucb::new(num_assertions, config))
        } else {
            Self::Uniform(Uniform)
        }
    }
}

impl AssertionSelection for Selector {
    fn pick(
        &mut self,
        cache: &ScoreCache,
        rng: &mut Random,
        exclude: Option<AssertionId>,
    ) -> Option<AssertionId> {
        match self {
            Self::Uniform(s) => s.pick(cache, rng, exclude),
            Self::Ucb(s) => s.pick(cache, rng, exclude),
        }
    }

    fn touch(&mut self, a: AssertionId) {
        match self {
            Self::Uniform(s) => s.touch(a),
            Self::Ucb(s) => s.touch(a),
        }
    }

    fn forget(&mut self, factor: f64) {
        match self {
            Self::Uniform(s) => s.forget(factor),
            Self::Ucb(s) => s.forget(factor),
        }
    }

    fn reinit(&mut self) {
        match self {
            Self::Uniform(s) => s.reinit(),
            Self::Ucb(s) => s.reinit(),
        }
    }
}
