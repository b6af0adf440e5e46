#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! The search driver.
//!
//! `Engine` owns every piece of mutable search state: the assignment, the
//! score cache, clause weights, selector statistics and the random source.
//! Each call to `step` performs one repair:
//!
//! 1. ask the governor whether a limit has been hit,
//! 2. stop with a model if no assertion is violated,
//! 3. choose a target (walksat) or the whole violated neighbourhood (gsat),
//! 4. collect candidate moves from the theory movers and pick one,
//! 5. apply it, refresh the cache and update weights and UCB statistics,
//! 6. restart when the Luby schedule says so.

use crate::sls::assertion_selection::{AssertionSelection, Selector};
use crate::sls::assignment::Assignment;
use crate::sls::config::SearchConfig;
use crate::sls::eval::Evaluator;
use crate::sls::formula::{AssertionId, Formula};
use crate::sls::governor::{Governor, Interrupt};
use crate::sls::move_selection::{MoveSelector, is_improving};
use crate::sls::random::Random;
use crate::sls::restarter::RestartScheduler;
use crate::sls::score::ScoreCache;
use crate::sls::solver::{Limit, Model, SearchOutcome, SearchStats, Solver, Verdict};
use crate::sls::term::VarId;
use crate::sls::theory::{CandidateMove, MoveContext, Movers};
use crate::sls::trace::TraceContext;
use crate::sls::weights::{Paws, WeightUpdate};
use itertools::Itertools;
use std::time::Duration;
use tracing::{debug, error};

#[derive(Debug)]
pub struct Engine<'a> {
    formula: &'a Formula,
    config: SearchConfig,
    trace: &'a TraceContext,
    rng: Random,
    assignment: Assignment,
    paws: Paws,
    cache: ScoreCache,
    selector: Selector,
    movers: Movers,
    move_selector: MoveSelector,
    restarter: RestartScheduler,
    governor: Governor,
    stats: SearchStats,
    candidates: Vec<CandidateMove>,
}

impl<'a> Engine<'a> {
    /// Sets up the initial assignment and all derived state.
    #[must_use]
    pub fn new(formula: &'a Formula, config: SearchConfig, trace: &'a TraceContext) -> Self {
        let mut rng = Random::new(u64::from(config.random_seed));
        let assignment = if config.restart_init {
            Assignment::random(formula, &mut rng)
        } else {
            Assignment::baseline(formula)
        };
        let paws = Paws::new(formula.len(), config.paws_init, config.paws_sp);
        let cache = ScoreCache::new(formula, &assignment, paws.weights());
        trace.note(format_args!(
            "init: {} assertions, {} variables, {} violated",
            formula.len(),
            formula.num_vars(),
            cache.num_unsat()
        ));
        Self {
            formula,
            selector: Selector::new(formula.len(), &config),
            movers: Movers::new(formula, &config),
            move_selector: MoveSelector::new(&config),
            restarter: RestartScheduler::new(config.restart_base),
            governor: Governor::new(&config),
            config,
            trace,
            rng,
            assignment,
            paws,
            cache,
            stats: SearchStats::default(),
            candidates: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.governor = self.governor.with_interrupt(interrupt);
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.governor = self.governor.with_timeout(timeout);
        self
    }

    #[must_use]
    pub const fn assignment(&self) -> &Assignment {
        &self.assignment
    }

    #[must_use]
    pub const fn selector(&self) -> &Selector {
        &self.selector
    }

    #[must_use]
    pub fn weights(&self) -> &[u32] {
        self.paws.weights()
    }

    #[must_use]
    pub const fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// The global weighted score `Σ weight · violated`.
    #[must_use]
    pub const fn score(&self) -> u64 {
        self.cache.weighted_score()
    }

    #[must_use]
    pub fn num_unsat(&self) -> usize {
        self.cache.num_unsat()
    }

    /// Whether the incremental state agrees with a recomputation from
    /// scratch and every weight is at or above the floor.
    #[must_use]
    pub fn check_consistency(&self) -> bool {
        let floor = self.paws.floor();
        self.cache
            .matches_recomputation(self.formula, &self.assignment, self.paws.weights())
            && self.paws.weights().iter().all(|&w| w >= floor)
    }

    /// Runs until a verdict is reached.
    pub fn run(&mut self) -> SearchOutcome {
        let trace = self.trace;
        let mut scope = trace.scope("search");
        let verdict = loop {
            if let Some(verdict) = self.step() {
                break verdict;
            }
        };
        scope.set(&verdict);
        debug!(
            repairs = self.stats.repairs,
            moves = self.stats.moves,
            restarts = self.stats.restarts,
            "search finished: {verdict}"
        );
        SearchOutcome {
            verdict,
            stats: self.stats.clone(),
        }
    }

    /// Performs one repair step. Returns the verdict once the search is over.
    pub fn step(&mut self) -> Option<Verdict> {
        if let Some(limit) = self
            .governor
            .check(self.stats.repairs, self.restarter.num_restarts())
        {
            return Some(self.give_up(limit));
        }
        if self.cache.num_unsat() == 0 {
            return Some(self.conclude_sat());
        }
        self.stats.repairs += 1;
        if self.config.walksat {
            self.walksat_step();
        } else {
            self.gsat_step();
        }
        None
    }

    fn conclude_sat(&mut self) -> Verdict {
        let eval = Evaluator::new(self.formula, self.assignment.values());
        if let Some(a) = self.formula.assertions().iter().find(|a| !eval.satisfied(a.id)) {
            debug_assert!(false, "assertion {} is violated in a reported model", a.id.0);
            error!(
                assertion = a.id.0,
                "score cache reported sat but the model violates an assertion"
            );
            return self.give_up(Limit::Inconsistent);
        }
        self.finish_stats();
        Verdict::Sat(Model::new(self.assignment.values().to_vec()))
    }

    fn give_up(&mut self, limit: Limit) -> Verdict {
        self.finish_stats();
        if self.config.track_unsat {
            self.stats.unsat_assertions = self.cache.unsat().iter().copied().sorted().collect();
        }
        Verdict::Unknown(limit)
    }

    fn finish_stats(&mut self) {
        self.stats.restarts = self.restarter.num_restarts();
        self.stats.final_score = self.cache.weighted_score();
        self.stats.final_unsat = self.cache.num_unsat();
    }

    /// Refills the candidate buffer with moves for the variables of `target`.
    fn fill_candidates(&mut self, target: AssertionId) {
        self.candidates.clear();
        let ctx = MoveContext::new(self.formula, &self.assignment, &self.cache);
        for &var in &self.formula.assertion(target).vars {
            self.movers
                .propose(&ctx, Some(target), var, &mut self.rng, &mut self.candidates);
        }
    }

    fn random_candidate(&mut self) -> Option<CandidateMove> {
        if self.candidates.is_empty() {
            return None;
        }
        let i = self.rng.below(self.candidates.len());
        Some(self.candidates.swap_remove(i))
    }

    /// The best candidate in the buffer, if it improves.
    fn best_improving(&mut self) -> Option<CandidateMove> {
        let ctx = MoveContext::new(self.formula, &self.assignment, &self.cache);
        let best = self.move_selector.select(
            &ctx,
            self.paws.weights(),
            &mut self.candidates,
            &mut self.rng,
        )?;
        is_improving(&self.candidates[best]).then(|| self.candidates.swap_remove(best))
    }

    fn walksat_step(&mut self) {
        let Some(target) = self.selector.pick(&self.cache, &mut self.rng, None) else {
            return;
        };
        self.fill_candidates(target);
        if let Some((repaired, chosen)) = self.choose_for(target) {
            self.apply(chosen, Some(repaired));
        }
    }

    /// Picks a move for `target`, possibly switching to another violated
    /// assertion in a local minimum. Returns the assertion the move repairs.
    fn choose_for(&mut self, target: AssertionId) -> Option<(AssertionId, CandidateMove)> {
        if self.candidates.is_empty() {
            return None;
        }
        if self.rng.chance(self.config.wp) {
            self.stats.random_walks += 1;
            return self.random_candidate().map(|c| (target, c));
        }
        if let Some(best) = self.best_improving() {
            return Some((target, best));
        }

        // local minimum
        let ctx = MoveContext::new(self.formula, &self.assignment, &self.cache);
        if let Some(c) = self.move_selector.vns(
            &ctx,
            self.paws.weights(),
            target,
            self.config.vns_mc,
            &mut self.rng,
        ) {
            self.stats.vns_moves += 1;
            return Some((target, c));
        }

        let mut buffered = target;
        if self.config.vns_repick {
            if let Some(alt) = self.selector.pick(&self.cache, &mut self.rng, Some(target)) {
                if alt != target {
                    self.fill_candidates(alt);
                    buffered = alt;
                    if let Some(best) = self.best_improving() {
                        self.stats.repicks += 1;
                        return Some((alt, best));
                    }
                }
            }
        }

        let random_target = if self.config.walksat_repick {
            self.selector
                .pick(&self.cache, &mut self.rng, Some(target))
                .unwrap_or(target)
        } else {
            target
        };
        if random_target != target {
            self.stats.repicks += 1;
        }
        if random_target != buffered {
            self.fill_candidates(random_target);
        }
        self.random_candidate().map(|c| (random_target, c))
    }

    fn gsat_step(&mut self) {
        let vars: Vec<VarId> = self
            .cache
            .unsat()
            .iter()
            .flat_map(|a| self.formula.assertion(*a).vars.iter().copied())
            .sorted()
            .dedup()
            .collect();
        self.candidates.clear();
        let ctx = MoveContext::new(self.formula, &self.assignment, &self.cache);
        for var in vars {
            self.movers
                .propose(&ctx, None, var, &mut self.rng, &mut self.candidates);
        }
        if self.candidates.is_empty() {
            return;
        }
        let chosen = if self.rng.chance(self.config.wp) {
            self.stats.random_walks += 1;
            self.random_candidate()
        } else {
            match self.best_improving() {
                Some(best) => Some(best),
                None => self.random_candidate(),
            }
        };
        if let Some(chosen) = chosen {
            self.apply(chosen, None);
        }
    }

    /// Applies a move and updates everything derived from the assignment.
    /// `target` is the repaired assertion in walksat mode.
    fn apply(&mut self, chosen: CandidateMove, target: Option<AssertionId>) {
        let var = chosen.var;
        self.trace
            .record_move(self.stats.repairs, var, &chosen.value, chosen.kind);
        self.assignment.set(var, chosen.value);
        let formula = self.formula;
        let touched = formula.occurrences(var);
        self.cache
            .refresh(formula, &self.assignment, self.paws.weights(), touched);

        let bump: Vec<AssertionId> = match target {
            Some(t) => vec![t],
            None => touched
                .iter()
                .copied()
                .filter(|a| self.cache.is_violated(*a))
                .collect(),
        };
        if self.paws.update(&mut self.cache, &bump, &mut self.rng) == WeightUpdate::Smoothed {
            self.stats.smoothings += 1;
        }
        if let Some(t) = target {
            self.selector.touch(t);
        }
        self.stats.moves += 1;
        debug_assert!(self.check_consistency(), "score cache drifted after a move");

        if self.restarter.tick() {
            self.restart();
        }
    }

    fn restart(&mut self) {
        let trace = self.trace;
        let mut scope = trace.scope("restart");
        if self.config.track_unsat {
            self.trace.note(format_args!(
                "restart with violated assertions {:?}",
                self.cache.unsat().iter().map(|a| a.0).sorted().collect::<Vec<_>>()
            ));
        }
        if self.config.rescore {
            if !self
                .cache
                .matches_recomputation(self.formula, &self.assignment, self.paws.weights())
            {
                debug_assert!(false, "score cache drifted before a restart");
                error!("score cache drifted before a restart");
            }
            self.paws.rebase();
            self.stats.rescores += 1;
        }
        self.selector.forget(self.config.walksat_ucb_forget);
        if self.config.walksat_ucb_init {
            self.selector.reinit();
        }
        self.assignment
            .reset(self.formula, self.config.restart_init, &mut self.rng);
        self.cache
            .rebuild(self.formula, &self.assignment, self.paws.weights());
        self.stats.restarts = self.restarter.num_restarts();
        scope.set(format_args!(
            "#{} ({} violated)",
            self.stats.restarts,
            self.cache.num_unsat()
        ));
    }
}

impl Solver for Engine<'_> {
    fn solve(&mut self) -> SearchOutcome {
        self.run()
    }

    fn stats(&self) -> SearchStats {
        self.stats.clone()
    }
}
