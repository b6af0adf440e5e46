//! This crate provides a stochastic local-search engine for satisfiability of
//! quantifier-free constraints over booleans, arithmetic, bit-vectors,
//! algebraic datatypes and strings, together with a couple of problem
//! encodings used by the command line and the benchmarks.

/// The `sls` module implements the search engine, from formulas and their
/// evaluation up to the repair loop.
pub mod sls;

/// The `queens` module encodes the N-queens puzzle over integer variables.
pub mod queens;

/// The `ksat` module generates random k-SAT instances over boolean variables.
pub mod ksat;
