#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! The hook between a candidate model and the stable-model check.
//!
//! When the search reaches a total assignment that violates no nogood, it asks its
//! [`StabilityChecker`] for a [`Verdict`] before reporting an answer set.

use crate::asp::assignment::Assignment;
use crate::asp::literal::Atom;
use crate::asp::truth::ThriceTruth;
use clap::ValueEnum;
use std::fmt::{Debug, Display};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Verdict {
    /// Nothing to change. The candidate is accepted iff it holds no must-be-true atom.
    Stable,
    /// These must-be-true atoms are founded and are upgraded to true.
    Confirm(Vec<Atom>),
    /// These atoms are unfounded; the candidate is rejected.
    Unfounded(Vec<Atom>),
}

pub trait StabilityChecker: Debug {
    fn check(&mut self, assignment: &Assignment) -> Verdict;
}

fn mbt_atoms(assignment: &Assignment) -> Vec<Atom> {
    (1..=assignment.max_atom_id())
        .filter(|&a| assignment.truth(a) == Some(ThriceTruth::MustBeTrue))
        .collect()
}

/// Confirms every must-be-true atom, which accepts every supported model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrustMbt;

impl StabilityChecker for TrustMbt {
    fn check(&mut self, assignment: &Assignment) -> Verdict {
        if assignment.mbt_count() == 0 {
            return Verdict::Stable;
        }
        Verdict::Confirm(mbt_atoms(assignment))
    }
}

/// Accepts only candidates in which propagation has already made every atom definite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RejectMbt;

impl StabilityChecker for RejectMbt {
    fn check(&mut self, assignment: &Assignment) -> Verdict {
        if assignment.mbt_count() == 0 {
            return Verdict::Stable;
        }
        Verdict::Unfounded(mbt_atoms(assignment))
    }
}

impl<C: StabilityChecker + ?Sized> StabilityChecker for Box<C> {
    fn check(&mut self, assignment: &Assignment) -> Verdict {
        (**self).check(assignment)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StabilityImpls {
    TrustMbt(TrustMbt),
    RejectMbt(RejectMbt),
}

impl Default for StabilityImpls {
    fn default() -> Self {
        Self::TrustMbt(TrustMbt)
    }
}

impl StabilityChecker for StabilityImpls {
    fn check(&mut self, assignment: &Assignment) -> Verdict {
        match self {
            Self::TrustMbt(c) => c.check(assignment),
            Self::RejectMbt(c) => c.check(assignment),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Copy, Hash, Default, ValueEnum)]
pub enum StabilityType {
    /// Accept supported models.
    #[default]
    TrustMbt,
    /// Accept only candidates without must-be-true atoms.
    RejectMbt,
}

impl Display for StabilityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TrustMbt => write!(f, "trust-mbt"),
            Self::RejectMbt => write!(f, "reject-mbt"),
        }
    }
}

impl StabilityType {
    #[must_use]
    pub const fn to_impl(self) -> StabilityImpls {
        match self {
            Self::TrustMbt => StabilityImpls::TrustMbt(TrustMbt),
            Self::RejectMbt => StabilityImpls::RejectMbt(RejectMbt),
        }
    }
}
