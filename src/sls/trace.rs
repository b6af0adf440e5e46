//! Logging context for a search.
//!
//! Whether the engine narrates its decisions is a property of the
//! `TraceContext` handed to `Engine::new`, not of any global switch. A
//! context can additionally keep a journal of every applied move, which is
//! how two runs are compared for determinism.
//!
//! `ScopeRecorder` is a guard returned by `TraceContext::scope`. It reports
//! the outcome of an operation when it goes out of scope, so early returns
//! are recorded as well.

use crate::sls::term::VarId;
use crate::sls::theory::MoveKind;
use crate::sls::value::Value;
use std::cell::{Cell, RefCell};
use std::fmt::Display;
use std::time::Instant;
use tracing::{debug, trace};

/// One applied move.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveRecord {
    pub repair: u64,
    pub var: VarId,
    pub value: Value,
    pub kind: MoveKind,
}

/// One finished scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeRecord {
    pub op: &'static str,
    pub outcome: String,
}

#[derive(Debug, Default)]
pub struct TraceContext {
    enabled: bool,
    recording: bool,
    moves: RefCell<Vec<MoveRecord>>,
    scopes: RefCell<Vec<ScopeRecord>>,
    depth: Cell<usize>,
}

impl TraceContext {
    /// Emits `debug!` events for engine decisions when `enabled`.
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Like `new(false)`, but keeps a journal of moves and scopes.
    #[must_use]
    pub fn recording() -> Self {
        Self {
            recording: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub const fn is_recording(&self) -> bool {
        self.recording
    }

    pub fn record_move(&self, repair: u64, var: VarId, value: &Value, kind: MoveKind) {
        if self.enabled {
            trace!(repair, var = var.0, %value, ?kind, "move");
        }
        if self.recording {
            self.moves.borrow_mut().push(MoveRecord {
                repair,
                var,
                value: value.clone(),
                kind,
            });
        }
    }

    /// Emits a debug event when enabled.
    pub fn note(&self, message: impl Display) {
        if self.enabled {
            debug!(depth = self.depth.get(), "{message}");
        }
    }

    #[must_use]
    pub fn moves(&self) -> Vec<MoveRecord> {
        self.moves.borrow().clone()
    }

    #[must_use]
    pub fn scopes(&self) -> Vec<ScopeRecord> {
        self.scopes.borrow().clone()
    }

    /// Opens a scope for `op`. The outcome is reported when the guard drops.
    #[must_use]
    pub fn scope(&self, op: &'static str) -> ScopeRecorder<'_> {
        self.depth.set(self.depth.get() + 1);
        ScopeRecorder {
            ctx: self,
            op,
            outcome: None,
            started: Instant::now(),
        }
    }
}

/// Reports the outcome of a scope on drop.
#[derive(Debug)]
pub struct ScopeRecorder<'a> {
    ctx: &'a TraceContext,
    op: &'static str,
    outcome: Option<String>,
    started: Instant,
}

impl ScopeRecorder<'_> {
    /// Sets the outcome reported on drop.
    pub fn set(&mut self, outcome: impl Display) {
        self.outcome = Some(outcome.to_string());
    }

    /// Sets the outcome and passes `value` through.
    pub fn finish<T: Display>(&mut self, value: T) -> T {
        self.set(&value);
        value
    }
}

impl Drop for ScopeRecorder<'_> {
    fn drop(&mut self) {
        let outcome = self.outcome.take().unwrap_or_else(|| "aborted".to_string());
        let ctx = self.ctx;
        ctx.depth.set(ctx.depth.get().saturating_sub(1));
        if ctx.enabled {
            debug!(
                op = self.op,
                elapsed_us = self.started.elapsed().as_micros(),
                "{} -> {outcome}",
                self.op
            );
        }
        if ctx.recording {
            ctx.scopes.borrow_mut().push(ScopeRecord {
                op: self.op,
                outcome,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn early_exit(ctx: &TraceContext, bail: bool) -> Result<u32, String> {
        let mut scope = ctx.scope("early_exit");
        if bail {
            return Err("bail".to_string());
        }
        Ok(scope.finish(7))
    }

    #[test]
    fn test_scope_records_every_exit_path() {
        let ctx = TraceContext::recording();
        assert_eq!(early_exit(&ctx, false), Ok(7));
        assert!(early_exit(&ctx, true).is_err());
        let scopes = ctx.scopes();
        assert_eq!(scopes.len(), 2);
        assert_eq!(scopes[0].outcome, "7");
        assert_eq!(scopes[1].outcome, "aborted");
    }

    #[test]
    fn test_journal_only_when_recording() {
        let quiet = TraceContext::disabled();
        quiet.record_move(1, VarId(0), &Value::Bool(true), MoveKind::Flip);
        assert!(quiet.moves().is_empty());

        let rec = TraceContext::recording();
        rec.record_move(1, VarId(0), &Value::Bool(true), MoveKind::Flip);
        assert_eq!(rec.moves().len(), 1);
        assert_eq!(rec.moves()[0].kind, MoveKind::Flip);
    }
}
