//! This crate provides a conflict-driven nogood learning (CDNL) engine for computing the
//! answer sets of ground logic programs.

/// The `asp` module implements the search engine: literals, nogoods, the three-valued
/// assignment, propagation, conflict analysis, branching heuristics, restarts and the
/// search loop that enumerates answer sets.
pub mod asp;
