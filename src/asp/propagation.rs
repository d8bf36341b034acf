#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! Nogood storage and unit propagation.
//!
//! Every stored nogood is registered under each atom it mentions. The assignment trail serves
//! as the propagation queue: each newly assigned atom causes the nogoods in its occurrence list
//! to be examined. A nogood with all literals holding is a conflict; one with a single
//! unassigned literal forces the complement of that literal.

use crate::asp::assignment::Assignment;
use crate::asp::literal::{Atom, Literal};
use crate::asp::nogood::{NoGood, NoGoodId, NoGoodType};
use crate::asp::truth::ThriceTruth;
use itertools::Itertools;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::ops::{Index, IndexMut};
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Occurrences(Vec<SmallVec<[NoGoodId; 6]>>);

impl Occurrences {
    fn grow_for_max_atom_id(&mut self, max_atom_id: Atom) {
        let needed = max_atom_id as usize + 1;
        if needed > self.0.len() {
            self.0.resize(needed, SmallVec::new());
        }
    }

    pub fn add_no_good(&mut self, no_good: &NoGood, id: NoGoodId) {
        for atom in no_good.iter().map(|l| l.atom()).unique() {
            self.grow_for_max_atom_id(atom);
            self[atom].push(id);
        }
    }

    #[must_use]
    pub fn of(&self, atom: Atom) -> &[NoGoodId] {
        self.0.get(atom as usize).map_or(&[], |v| v.as_slice())
    }
}

impl Index<Atom> for Occurrences {
    type Output = SmallVec<[NoGoodId; 6]>;

    fn index(&self, index: Atom) -> &Self::Output {
        &self.0[index as usize]
    }
}

impl IndexMut<Atom> for Occurrences {
    fn index_mut(&mut self, index: Atom) -> &mut Self::Output {
        &mut self.0[index as usize]
    }
}

#[derive(Debug, Clone, Default)]
pub struct NoGoodStore {
    no_goods: Vec<NoGood>,
    index: FxHashMap<NoGood, NoGoodId>,
    occurrences: Occurrences,
    /// Nogoods to examine before continuing along the trail.
    pending: Vec<NoGoodId>,
    /// Next trail position whose occurrences have not been examined.
    queue_head: usize,
    propagations: usize,
    learnt: usize,
}

impl NoGoodStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `no_good` unless an equal one is already present, and schedules it for
    /// examination on the next [`propagate`](Self::propagate) either way.
    ///
    /// # Returns
    ///
    /// The id of the stored nogood and whether it was newly inserted.
    pub fn add(&mut self, no_good: NoGood) -> (NoGoodId, bool) {
        if let Some(&id) = self.index.get(&no_good) {
            self.pending.push(id);
            return (id, false);
        }

        let id = self.no_goods.len();
        if no_good.kind() == NoGoodType::Learnt {
            self.learnt += 1;
        }
        self.occurrences.add_no_good(&no_good, id);
        self.index.insert(no_good.clone(), id);
        self.no_goods.push(no_good);
        self.pending.push(id);
        (id, true)
    }

    #[must_use]
    pub fn get(&self, id: NoGoodId) -> Option<&NoGood> {
        self.no_goods.get(id)
    }

    #[must_use]
    pub fn id_of(&self, no_good: &NoGood) -> Option<NoGoodId> {
        self.index.get(no_good).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.no_goods.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.no_goods.is_empty()
    }

    #[must_use]
    pub const fn num_learnt(&self) -> usize {
        self.learnt
    }

    #[must_use]
    pub const fn num_propagations(&self) -> usize {
        self.propagations
    }

    pub fn iter(&self) -> impl Iterator<Item = &NoGood> {
        self.no_goods.iter()
    }

    #[must_use]
    pub const fn occurrences(&self) -> &Occurrences {
        &self.occurrences
    }

    /// Rewinds the trail queue after the assignment has been cut back.
    pub fn backtrack(&mut self, assignment: &Assignment) {
        self.queue_head = self.queue_head.min(assignment.trail_len());
    }

    /// Propagates to fixpoint.
    ///
    /// # Returns
    ///
    /// The id of a violated nogood, or `None` once no examined nogood is violated and no
    /// further assignment can be derived.
    pub fn propagate(&mut self, assignment: &mut Assignment) -> Option<NoGoodId> {
        loop {
            if let Some(&id) = self.pending.last() {
                self.pending.pop();
                if self.examine(id, assignment) {
                    return Some(id);
                }
                continue;
            }

            if self.queue_head >= assignment.trail_len() {
                return None;
            }

            let atom = assignment.trail_atom(self.queue_head);
            self.queue_head += 1;

            let mut i = 0;
            while let Some(&id) = self.occurrences.of(atom).get(i) {
                i += 1;
                if self.examine(id, assignment) {
                    return Some(id);
                }
            }
        }
    }

    /// Examines one nogood, assigning whatever it forces.
    ///
    /// Returns `true` iff the nogood is violated.
    fn examine(&mut self, id: NoGoodId, assignment: &mut Assignment) -> bool {
        let no_good = &self.no_goods[id];

        if let Some(head) = no_good.head() {
            if no_good.kind() == NoGoodType::Static
                && assignment.truth(head.atom()) == Some(ThriceTruth::MustBeTrue)
                && body_holds_strongly(no_good, assignment)
            {
                assignment.assign(head.atom(), ThriceTruth::True, Some(id));
                self.propagations += 1;
                return false;
            }
        }

        let mut unassigned: Option<Literal> = None;
        for &literal in no_good {
            match assignment.truth(literal.atom()) {
                None if unassigned.is_some() => return false,
                None => unassigned = Some(literal),
                Some(truth) if truth.to_bool() != literal.is_positive() => return false,
                Some(_) => {}
            }
        }

        let Some(literal) = unassigned else {
            return true;
        };

        let truth = if literal.is_positive() {
            ThriceTruth::False
        } else if no_good.kind() == NoGoodType::Static
            && no_good.head() == Some(literal)
            && body_holds_strongly(no_good, assignment)
        {
            ThriceTruth::True
        } else {
            ThriceTruth::MustBeTrue
        };

        trace!(atom = literal.atom(), %truth, no_good = id, "propagated");
        assignment.assign(literal.atom(), truth, Some(id));
        self.propagations += 1;
        false
    }

    /// A full scan for a nogood the assignment violates.
    #[must_use]
    pub fn find_violated(&self, assignment: &Assignment) -> Option<NoGoodId> {
        self.no_goods.iter().position(|ng| assignment.violates(ng))
    }
}

impl Index<NoGoodId> for NoGoodStore {
    type Output = NoGood;

    fn index(&self, index: NoGoodId) -> &Self::Output {
        &self.no_goods[index]
    }
}

/// Every body literal holds with a definite value: positive ones true, negative ones false.
fn body_holds_strongly(no_good: &NoGood, assignment: &Assignment) -> bool {
    no_good.body().iter().all(|l| {
        let strong = if l.is_positive() {
            ThriceTruth::True
        } else {
            ThriceTruth::False
        };
        assignment.truth(l.atom()) == Some(strong)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(a: u32) -> Literal {
        Literal::positive(a)
    }

    fn neg(a: u32) -> Literal {
        Literal::negative(a)
    }

    #[test]
    fn test_add_deduplicates() {
        let mut store = NoGoodStore::new();
        let (a, new_a) = store.add(NoGood::new([pos(1), neg(2)]));
        let (b, new_b) = store.add(NoGood::new([neg(2), pos(1)]));
        assert!(new_a);
        assert!(!new_b);
        assert_eq!(a, b);
        assert_eq!(store.len(), 1);
        assert_eq!(store.occurrences().of(1), &[a]);
        assert_eq!(store.occurrences().of(2), &[a]);
        assert!(store.occurrences().of(9).is_empty());
    }

    #[test]
    fn test_fact_propagates_true() {
        let mut store = NoGoodStore::new();
        let mut assignment = Assignment::new(2);
        let (id, _) = store.add(NoGood::fact(neg(1)));

        assert_eq!(store.propagate(&mut assignment), None);
        assert_eq!(assignment.truth(1), Some(ThriceTruth::True));
        assert_eq!(assignment.get(1).unwrap().implied_by, Some(id));
    }

    #[test]
    fn test_positive_unit_propagates_false() {
        let mut store = NoGoodStore::new();
        let mut assignment = Assignment::new(3);
        store.add(NoGood::new([pos(1), pos(2)]));
        assignment.assign(1, ThriceTruth::True, None);

        assert_eq!(store.propagate(&mut assignment), None);
        assert_eq!(assignment.truth(2), Some(ThriceTruth::False));
    }

    #[test]
    fn test_negative_unit_without_head_propagates_mbt() {
        let mut store = NoGoodStore::new();
        let mut assignment = Assignment::new(3);
        store.add(NoGood::new([pos(1), neg(2)]));
        assignment.assign(1, ThriceTruth::True, None);

        store.propagate(&mut assignment);
        assert_eq!(assignment.truth(2), Some(ThriceTruth::MustBeTrue));
        assert_eq!(assignment.mbt_count(), 1);
    }

    #[test]
    fn test_head_with_strong_body_propagates_true() {
        let mut store = NoGoodStore::new();
        let mut assignment = Assignment::new(3);
        store.add(NoGood::head_first([neg(3), pos(1), neg(2)]));
        assignment.assign(1, ThriceTruth::True, None);
        assignment.assign(2, ThriceTruth::False, None);

        store.propagate(&mut assignment);
        assert_eq!(assignment.truth(3), Some(ThriceTruth::True));
    }

    #[test]
    fn test_head_with_weak_body_propagates_mbt_then_upgrades() {
        let mut store = NoGoodStore::new();
        let mut assignment = Assignment::new(3);
        let (rule, _) = store.add(NoGood::head_first([neg(3), pos(1)]));
        assignment.assign(1, ThriceTruth::MustBeTrue, None);

        store.propagate(&mut assignment);
        assert_eq!(assignment.truth(3), Some(ThriceTruth::MustBeTrue));

        assignment.new_decision_level();
        assignment.assign(1, ThriceTruth::True, None);
        store.propagate(&mut assignment);

        let head = assignment.get(3).unwrap();
        assert_eq!(head.truth, ThriceTruth::True);
        assert_eq!(head.implied_by, Some(rule));
        assert_eq!(head.weak_decision_level(), 0);
        assert_eq!(head.decision_level, 1);
    }

    #[test]
    fn test_support_only_derives_mbt() {
        let mut store = NoGoodStore::new();
        let mut assignment = Assignment::new(2);
        store.add(NoGood::support(neg(1), pos(2)));
        assignment.assign(2, ThriceTruth::True, None);

        store.propagate(&mut assignment);
        assert_eq!(assignment.truth(1), Some(ThriceTruth::MustBeTrue));
    }

    #[test]
    fn test_conflict_detected() {
        let mut store = NoGoodStore::new();
        let mut assignment = Assignment::new(2);
        let (id, _) = store.add(NoGood::new([pos(1), pos(2)]));
        assignment.assign(1, ThriceTruth::True, None);
        assignment.assign(2, ThriceTruth::MustBeTrue, None);

        assert_eq!(store.propagate(&mut assignment), Some(id));
        assert_eq!(store.find_violated(&assignment), Some(id));
    }

    #[test]
    fn test_unsat_nogood_is_always_violated() {
        let mut store = NoGoodStore::new();
        let mut assignment = Assignment::new(0);
        let (id, _) = store.add(NoGood::UNSAT);
        assert_eq!(store.propagate(&mut assignment), Some(id));
    }

    #[test]
    fn test_chain_and_backtrack_requeue() {
        let mut store = NoGoodStore::new();
        let mut assignment = Assignment::new(4);
        store.add(NoGood::new([pos(1), pos(2)]));
        store.add(NoGood::new([neg(2), pos(3)]));
        store.propagate(&mut assignment);

        assignment.new_decision_level();
        assignment.assign(1, ThriceTruth::True, None);
        assert_eq!(store.propagate(&mut assignment), None);
        assert_eq!(assignment.truth(2), Some(ThriceTruth::False));
        assert_eq!(assignment.truth(3), Some(ThriceTruth::False));

        assignment.backtrack();
        store.backtrack(&assignment);
        assert!(!assignment.is_assigned(2));

        assignment.new_decision_level();
        assignment.assign(1, ThriceTruth::True, None);
        assert_eq!(store.propagate(&mut assignment), None);
        assert_eq!(assignment.truth(3), Some(ThriceTruth::False));
    }

    #[test]
    fn test_propagation_reaches_fixpoint() {
        let mut rng = fastrand::Rng::with_seed(5);
        for _ in 0..100 {
            let mut store = NoGoodStore::new();
            let mut assignment = Assignment::new(8);
            for _ in 0..12 {
                let len = rng.usize(1..4);
                store.add(NoGood::new(
                    (0..len).map(|_| Literal::new(rng.u32(1..=8), rng.bool())),
                ));
            }
            if store.propagate(&mut assignment).is_some() {
                continue;
            }
            for ng in store.iter() {
                assert!(!assignment.violates(ng));
                let unassigned = ng.iter().filter(|l| !assignment.is_assigned(l.atom())).count();
                let all_others_hold = ng
                    .iter()
                    .filter(|l| assignment.is_assigned(l.atom()))
                    .all(|&l| assignment.is_violated(l));
                assert!(!(unassigned == 1 && all_others_hold), "unit nogood {ng} left");
            }
        }
    }
}
