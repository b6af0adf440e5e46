#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! This module provides an N-queens encoding over integer variables.
//!
//! Each column gets one integer variable holding the row of its queen. The
//! encoding asserts the row bounds of every queen and, for every pair of
//! columns, that the queens share neither a row nor a diagonal.

/// The `solver` module contains the encoding and the decoding of models back into boards.
pub mod solver;
