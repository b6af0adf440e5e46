#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! Restart cadence for the local search.
//!
//! Restarts throw away the current assignment (keeping clause weights and
//! UCB statistics, possibly decayed) so the search can leave a region it is
//! stuck in. The interval between restarts follows the Luby sequence scaled
//! by `restart_base`, counted in applied moves.
//!
//! The Luby sequence is `1, 1, 2, 1, 1, 2, 4, 1, 1, 2, 1, 1, 2, 4, 8, ...`.
//! It is optimal (up to a constant factor) for repeating a randomised
//! experiment whose run-time distribution is unknown.

/// The `x`-th element (1-based) of the Luby sequence.
///
/// Finds the subsequence `2^k - 1` that contains `x` and either returns its
/// last element `2^(k-1)` or recurses into the copy of the previous block.
#[must_use]
pub const fn luby(x: u64) -> u64 {
    let mut x = x;
    loop {
        let mut k = 1_u32;
        while (1_u64 << k) - 1 < x {
            k += 1;
        }
        if x == (1_u64 << k) - 1 {
            return 1_u64 << (k - 1);
        }
        x -= (1_u64 << (k - 1)) - 1;
    }
}

/// Counts moves and reports when the next restart is due.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartScheduler {
    /// Unit interval; the `k`-th interval is `base * luby(k)`.
    base: u64,
    /// Restarts performed so far.
    restarts: u32,
    /// Moves left until the next restart.
    restarts_in: u64,
}

impl RestartScheduler {
    #[must_use]
    pub fn new(base: u32) -> Self {
        let base = u64::from(base.max(1));
        Self {
            base,
            restarts: 0,
            restarts_in: base * luby(1),
        }
    }

    /// Records one applied move. Returns `true` when a restart is due, in
    /// which case the counter has already advanced to the next interval.
    pub fn tick(&mut self) -> bool {
        self.restarts_in = self.restarts_in.saturating_sub(1);
        if self.restarts_in == 0 {
            self.restart();
            true
        } else {
            false
        }
    }

    fn restart(&mut self) {
        self.restarts = self.restarts.saturating_add(1);
        self.restarts_in = self
            .base
            .saturating_mul(luby(u64::from(self.restarts) + 1));
    }

    #[must_use]
    pub const fn num_restarts(&self) -> u32 {
        self.restarts
    }

    /// Moves until the next restart.
    #[must_use]
    pub const fn restarts_in(&self) -> u64 {
        self.restarts_in
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_luby_sequence() {
        let expected = [1, 1, 2, 1, 1, 2, 4, 1, 1, 2, 1, 1, 2, 4, 8, 1];
        let actual: Vec<u64> = (1..=16).map(luby).collect();
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_scheduler_intervals() {
        let mut s = RestartScheduler::new(3);
        let mut gaps = Vec::new();
        let mut since = 0;
        for _ in 0..(3 * (1 + 1 + 2 + 1 + 1 + 2 + 4)) {
            since += 1;
            if s.tick() {
                gaps.push(since);
                since = 0;
            }
        }
        assert_eq!(gaps, vec![3, 3, 6, 3, 3, 6, 12]);
        assert_eq!(s.num_restarts(), 7);
    }

    #[test]
    fn test_zero_base_is_clamped() {
        let mut s = RestartScheduler::new(0);
        assert!(s.tick());
        assert!(s.tick());
    }
}
