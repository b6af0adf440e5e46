#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! A stochastic local-search engine for quantifier-free constraints.
//!
//! Formulas are built with [`formula::FormulaBuilder`] and searched by
//! [`engine::Engine`], which repairs one violated assertion at a time until
//! every assertion holds or a resource limit is reached. The search never
//! proves unsatisfiability: the only verdicts are `Sat(model)` and
//! `Unknown(limit)`.

pub mod assertion_selection;
pub mod assignment;
pub mod config;
pub mod engine;
pub mod eval;
pub mod formula;
pub mod governor;
pub mod move_selection;
pub mod random;
pub mod restarter;
pub mod score;
pub mod solver;
pub mod sort;
pub mod term;
pub mod theory;
pub mod trace;
pub mod value;
pub mod weights;

pub use config::{SearchConfig, SearchOverrides};
pub use engine::Engine;
pub use formula::{Formula, FormulaBuilder};
pub use solver::{Limit, Model, SearchOutcome, SearchStats, Solver, Verdict};
pub use trace::TraceContext;
