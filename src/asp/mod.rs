#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
pub mod assignment;
pub mod conflict_analysis;
pub mod error;
pub mod grounding;
pub mod handler;
pub mod heuristic;
pub mod input;
pub mod literal;
pub mod nogood;
pub mod propagation;
pub mod restarter;
pub mod solver;
pub mod stability;
pub mod truth;
