#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! Where nogoods come from.
//!
//! A [`NoGoodSource`] is asked for nogoods once before the search starts and then every time
//! propagation has made new atoms true or must-be-true. An incremental grounder can use those
//! atoms to instantiate further rules; the search grows its assignment and heuristic to the
//! source's maximum atom id before registering what it returns.

use crate::asp::literal::Atom;
use crate::asp::nogood::NoGood;
use crate::asp::solver::AnswerSet;
use std::fmt::Debug;

pub trait NoGoodSource: Debug {
    /// The largest atom id used by any nogood produced so far.
    fn max_atom_id(&self) -> Atom;

    /// Returns the nogoods that became available given `new_positive` atoms. The first call
    /// receives an empty slice.
    fn ground(&mut self, new_positive: &[Atom]) -> Vec<NoGood>;
}

/// A fixed, fully ground program: everything is handed out on the first call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StaticProgram {
    no_goods: Vec<NoGood>,
    max_atom_id: Atom,
    handed_out: bool,
}

impl StaticProgram {
    #[must_use]
    pub fn new(no_goods: Vec<NoGood>) -> Self {
        let max_atom_id = no_goods
            .iter()
            .flat_map(|ng| ng.iter().map(|l| l.atom()))
            .max()
            .unwrap_or(0);
        Self::with_max_atom_id(no_goods, max_atom_id)
    }

    /// Like [`new`](Self::new), but declares atoms up to `max_atom_id` even if no nogood
    /// mentions them.
    #[must_use]
    pub fn with_max_atom_id(no_goods: Vec<NoGood>, max_atom_id: Atom) -> Self {
        let used = no_goods
            .iter()
            .flat_map(|ng| ng.iter().map(|l| l.atom()))
            .max()
            .unwrap_or(0);
        Self {
            no_goods,
            max_atom_id: max_atom_id.max(used),
            handed_out: false,
        }
    }

    #[must_use]
    pub fn no_goods(&self) -> &[NoGood] {
        &self.no_goods
    }

    /// Checks that `answer_set` violates none of the program's nogoods.
    #[must_use]
    pub fn verify(&self, answer_set: &AnswerSet) -> bool {
        !self.no_goods.iter().any(|ng| answer_set.violates(ng))
    }
}

impl NoGoodSource for StaticProgram {
    fn max_atom_id(&self) -> Atom {
        self.max_atom_id
    }

    fn ground(&mut self, _new_positive: &[Atom]) -> Vec<NoGood> {
        if self.handed_out {
            return Vec::new();
        }
        self.handed_out = true;
        self.no_goods.clone()
    }
}

impl<S: NoGoodSource + ?Sized> NoGoodSource for Box<S> {
    fn max_atom_id(&self) -> Atom {
        (**self).max_atom_id()
    }

    fn ground(&mut self, new_positive: &[Atom]) -> Vec<NoGood> {
        (**self).ground(new_positive)
    }
}
