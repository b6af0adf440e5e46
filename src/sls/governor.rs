//! Resource ceilings checked at the top of every repair step.

use crate::sls::config::SearchConfig;
use crate::sls::solver::Limit;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use memory_stats::memory_stats;
use tikv_jemalloc_ctl::{epoch, stats};
use tracing::warn;

/// Memory is read once per this many checks.
pub const MEMORY_SAMPLE_INTERVAL: u64 = 64;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Cooperative cancellation handle. Clones share one flag.
#[derive(Debug, Clone, Default)]
pub struct Interrupt(Arc<AtomicBool>);

impl Interrupt {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone)]
pub struct Governor {
    max_memory: Option<u64>,
    max_restarts: u32,
    max_repairs: u64,
    interrupt: Option<Interrupt>,
    deadline: Option<Instant>,
    checks: u64,
}

impl Governor {
    #[must_use]
    pub fn new(config: &SearchConfig) -> Self {
        let max_memory = (config.max_memory != u32::MAX)
            .then(|| u64::from(config.max_memory).saturating_mul(BYTES_PER_MB));
        Self {
            max_memory,
            max_restarts: config.max_restarts,
            max_repairs: u64::from(config.max_repairs),
            interrupt: None,
            deadline: None,
            checks: 0,
        }
    }

    #[must_use]
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = Some(interrupt);
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Instant::now().checked_add(timeout);
        self
    }

    /// Returns the first tripped limit, if any.
    pub fn check(&mut self, repairs: u64, restarts: u32) -> Option<Limit> {
        self.checks += 1;
        if self.interrupt.as_ref().is_some_and(Interrupt::is_triggered) {
            return Some(Limit::Cancelled);
        }
        if repairs >= self.max_repairs {
            return Some(Limit::Repairs);
        }
        if restarts >= self.max_restarts {
            return Some(Limit::Restarts);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Some(Limit::Deadline);
        }
        if let Some(max) = self.max_memory {
            if self.checks % MEMORY_SAMPLE_INTERVAL == 1 && memory_in_use() > max {
                return Some(Limit::Memory);
            }
        }
        None
    }
}

/// Resident memory of the process in bytes. Works under any global
/// allocator; falls back to the jemalloc statistics on platforms where the
/// process figure is unavailable.
#[must_use]
pub fn memory_in_use() -> u64 {
    match memory_stats() {
        Some(usage) => usage.physical_mem as u64,
        None => allocated_bytes(),
    }
}

/// Bytes currently allocated through jemalloc, or 0 if the statistics are
/// unavailable. Only meaningful when jemalloc is the global allocator.
#[must_use]
pub fn allocated_bytes() -> u64 {
    if let Err(e) = epoch::advance() {
        warn!("could not refresh allocator statistics: {e}");
        return 0;
    }
    stats::allocated::read().map_or(0, |b| b as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repair_limit() {
        let config = SearchConfig {
            max_repairs: 3,
            ..SearchConfig::default()
        };
        let mut g = Governor::new(&config);
        assert_eq!(g.check(2, 0), None);
        assert_eq!(g.check(3, 0), Some(Limit::Repairs));
    }

    #[test]
    fn test_restart_limit() {
        let config = SearchConfig {
            max_restarts: 1,
            ..SearchConfig::default()
        };
        let mut g = Governor::new(&config);
        assert_eq!(g.check(0, 0), None);
        assert_eq!(g.check(0, 1), Some(Limit::Restarts));
    }

    #[test]
    fn test_interrupt_and_deadline() {
        let interrupt = Interrupt::new();
        let mut g = Governor::new(&SearchConfig::default()).with_interrupt(interrupt.clone());
        assert_eq!(g.check(0, 0), None);
        interrupt.trigger();
        assert_eq!(g.check(0, 0), Some(Limit::Cancelled));

        let mut g = Governor::new(&SearchConfig::default()).with_timeout(Duration::ZERO);
        assert_eq!(g.check(0, 0), Some(Limit::Deadline));
    }

    #[test]
    fn test_memory_limit_without_jemalloc() {
        // the test harness runs on the system allocator
        let held = vec![1u8; 8 * 1024 * 1024];
        assert!(memory_in_use() > 1024 * 1024);

        let config = SearchConfig {
            max_memory: 1,
            ..SearchConfig::default()
        };
        let mut g = Governor::new(&config);
        assert_eq!(g.check(0, 0), Some(Limit::Memory));
        assert_eq!(held.len(), 8 * 1024 * 1024);
    }

    #[test]
    fn test_memory_sampled_periodically() {
        let config = SearchConfig {
            max_memory: 1,
            ..SearchConfig::default()
        };
        let mut g = Governor::new(&config);
        assert_eq!(g.check(0, 0), Some(Limit::Memory));
        for _ in 1..MEMORY_SAMPLE_INTERVAL {
            assert_eq!(g.check(0, 0), None);
        }
        assert_eq!(g.check(0, 0), Some(Limit::Memory));
    }
}
