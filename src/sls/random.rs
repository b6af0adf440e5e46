//! The seeded random source shared by every stochastic decision of a search.
//!
//! A search owns exactly one `Random`. All draws go through it in a fixed
//! order, so two runs with the same seed make the same decisions.

use fastrand::Rng;

/// Probabilities in the configuration are expressed as `n / 1024`.
pub const PROBABILITY_SCALE: u32 = 1024;

#[derive(Debug, Clone)]
pub struct Random(Rng);

impl Random {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self(Rng::with_seed(seed))
    }

    /// Uniform index in `0..n`. Returns 0 when `n == 0`.
    pub fn below(&mut self, n: usize) -> usize {
        if n == 0 { 0 } else { self.0.usize(..n) }
    }

    /// Uniform value in `0..n` as `u32`. Returns 0 when `n == 0`.
    pub fn below_u32(&mut self, n: u32) -> u32 {
        if n == 0 { 0 } else { self.0.u32(..n) }
    }

    /// Returns `true` with probability `numerator / 1024`.
    pub fn chance(&mut self, numerator: u32) -> bool {
        numerator > 0 && self.0.u32(..PROBABILITY_SCALE) < numerator
    }

    pub fn flip(&mut self) -> bool {
        self.0.bool()
    }

    pub fn bits(&mut self) -> u64 {
        self.0.u64(..)
    }

    pub fn int_in(&mut self, lo: i64, hi: i64) -> i64 {
        self.0.i64(lo..=hi)
    }

    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            None
        } else {
            items.get(self.below(items.len()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_stream() {
        let mut a = Random::new(7);
        let mut b = Random::new(7);
        let xs: Vec<usize> = (0..32).map(|_| a.below(1000)).collect();
        let ys: Vec<usize> = (0..32).map(|_| b.below(1000)).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn test_chance_bounds() {
        let mut rng = Random::new(1);
        assert!((0..100).all(|_| !rng.chance(0)));
        assert!((0..100).all(|_| rng.chance(PROBABILITY_SCALE)));
    }

    #[test]
    fn test_below_zero() {
        let mut rng = Random::new(3);
        assert_eq!(rng.below(0), 0);
        assert_eq!(rng.pick::<u8>(&[]), None);
    }
}
