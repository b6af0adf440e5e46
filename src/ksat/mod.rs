#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! Random k-SAT instances over boolean variables.
//!
//! Instances are either uniform (every clause drawn independently) or
//! planted (clauses are redrawn until a hidden assignment satisfies them,
//! so the instance is guaranteed satisfiable).

pub mod generator;
