#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! The partial three-valued assignment.
//!
//! Every assigned atom has an [`Entry`] recording its truth, the nogood that implied it, the
//! decision level and the propagation number of its current value. Propagation numbers are
//! positions on the trail, so they are strictly increasing in assignment order and reset by
//! themselves when the trail is cut back.
//!
//! An atom that is must-be-true can later be upgraded to true or overridden to false. The
//! earlier must-be-true state is then kept as the entry's [`MbtRecord`]: conflict analysis
//! resolves against it, and backtracking restores it when only the newer value is undone.

use crate::asp::literal::{Atom, Literal};
use crate::asp::nogood::{NoGood, NoGoodId};
use crate::asp::truth::ThriceTruth;
use itertools::Itertools;
use std::fmt::{Display, Formatter};

pub type DecisionLevel = usize;

/// The must-be-true state an entry held before being upgraded or overridden.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MbtRecord {
    pub decision_level: DecisionLevel,
    pub propagation_level: usize,
    pub implied_by: Option<NoGoodId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Entry {
    pub atom: Atom,
    pub truth: ThriceTruth,
    /// `None` for decisions, facts set from outside and external overrides.
    pub implied_by: Option<NoGoodId>,
    pub decision_level: DecisionLevel,
    pub propagation_level: usize,
    pub previous_mbt: Option<MbtRecord>,
}

impl Entry {
    #[must_use]
    pub const fn has_previous_mbt(&self) -> bool {
        self.previous_mbt.is_some()
    }

    /// `+atom` if the entry is true or must-be-true, `-atom` if it is false.
    #[must_use]
    pub fn literal(&self) -> Literal {
        Literal::new(self.atom, self.truth.to_bool())
    }

    /// The decision level of a previous must-be-true value if there is one, otherwise the
    /// level of the current value.
    #[must_use]
    pub const fn weak_decision_level(&self) -> DecisionLevel {
        match self.previous_mbt {
            Some(mbt) => mbt.decision_level,
            None => self.decision_level,
        }
    }

    #[must_use]
    pub const fn propagation_level_respecting_lower_mbt(&self) -> usize {
        match self.previous_mbt {
            Some(mbt) => mbt.propagation_level,
            None => self.propagation_level,
        }
    }

    #[must_use]
    pub const fn implied_by_respecting_lower_mbt(&self) -> Option<NoGoodId> {
        match self.previous_mbt {
            Some(mbt) => mbt.implied_by,
            None => self.implied_by,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Step {
    atom: Atom,
    decision_level: DecisionLevel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    entries: Vec<Option<Entry>>,
    trail: Vec<Step>,
    /// Trail position at which each decision level above 0 starts.
    trail_lim: Vec<usize>,
    new_positive: Vec<Atom>,
    mbt_count: usize,
    assigned_count: usize,
}

impl Default for Assignment {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Assignment {
    /// Creates an assignment for atoms `0..=max_atom_id`, with the reserved atom `0`
    /// already false at level 0.
    #[must_use]
    pub fn new(max_atom_id: Atom) -> Self {
        let mut assignment = Self {
            entries: Vec::new(),
            trail: Vec::new(),
            trail_lim: Vec::new(),
            new_positive: Vec::new(),
            mbt_count: 0,
            assigned_count: 0,
        };
        assignment.grow_for_max_atom_id(max_atom_id);
        assignment.assign(0, ThriceTruth::False, None);
        assignment
    }

    /// Makes room for atoms up to `max_atom_id`. Existing entries and counters are untouched.
    pub fn grow_for_max_atom_id(&mut self, max_atom_id: Atom) {
        let needed = max_atom_id as usize + 1;
        if needed > self.entries.len() {
            self.entries.resize(needed, None);
        }
    }

    #[must_use]
    pub fn max_atom_id(&self) -> Atom {
        Atom::try_from(self.entries.len().saturating_sub(1)).unwrap_or(Atom::MAX)
    }

    #[must_use]
    pub fn get(&self, atom: Atom) -> Option<&Entry> {
        self.entries.get(atom as usize).and_then(Option::as_ref)
    }

    #[must_use]
    pub fn truth(&self, atom: Atom) -> Option<ThriceTruth> {
        self.get(atom).map(|e| e.truth)
    }

    #[must_use]
    pub fn is_assigned(&self, atom: Atom) -> bool {
        self.get(atom).is_some()
    }

    #[must_use]
    pub fn weak_decision_level(&self, atom: Atom) -> Option<DecisionLevel> {
        self.get(atom).map(Entry::weak_decision_level)
    }

    #[must_use]
    pub fn strong_decision_level(&self, atom: Atom) -> Option<DecisionLevel> {
        self.get(atom).map(|e| e.decision_level)
    }

    /// `true` iff at least one literal of `no_good` is unassigned.
    #[must_use]
    pub fn is_undefined(&self, no_good: &NoGood) -> bool {
        no_good.iter().any(|l| !self.is_assigned(l.atom()))
    }

    /// `true` iff the literal holds: it is positive and its atom true or must-be-true, or it
    /// is negative and its atom false. Literals over unassigned atoms never hold.
    #[must_use]
    pub fn is_violated(&self, literal: Literal) -> bool {
        self.truth(literal.atom())
            .is_some_and(|t| t.to_bool() == literal.is_positive())
    }

    /// `true` iff the literal is assigned and does not hold.
    #[must_use]
    pub fn is_unsatisfied(&self, literal: Literal) -> bool {
        self.truth(literal.atom())
            .is_some_and(|t| t.to_bool() != literal.is_positive())
    }

    /// `true` iff the literal is positive and its atom true or must-be-true, or the literal
    /// is negative and its atom not assigned a true value (unassigned counts).
    #[must_use]
    pub fn is_satisfied(&self, literal: Literal) -> bool {
        let assigned_true = self.truth(literal.atom()).is_some_and(ThriceTruth::to_bool);
        assigned_true == literal.is_positive()
    }

    /// `true` iff every literal of `no_good` is assigned and holds.
    #[must_use]
    pub fn violates(&self, no_good: &NoGood) -> bool {
        no_good
            .iter()
            .all(|&l| self.is_assigned(l.atom()) && self.is_violated(l))
    }

    #[must_use]
    pub fn decision_level(&self) -> DecisionLevel {
        self.trail_lim.len()
    }

    pub fn new_decision_level(&mut self) {
        self.trail_lim.push(self.trail.len());
    }

    /// Assigns `truth` to `atom` at the current decision level.
    ///
    /// Returns `false` when nothing changed: the atom already has this value, or it is true
    /// and `truth` is must-be-true. A must-be-true atom may be upgraded to true or overridden
    /// to false; its earlier state is kept as the entry's previous-MBT record.
    ///
    /// # Panics
    ///
    /// If the atom is true or false and `truth` contradicts it. Propagation reports such
    /// cases as conflicts and never calls this.
    pub fn assign(&mut self, atom: Atom, truth: ThriceTruth, implied_by: Option<NoGoodId>) -> bool {
        self.grow_for_max_atom_id(atom);

        let decision_level = self.decision_level();
        let propagation_level = self.trail.len();

        let previous_mbt = match self.entries[atom as usize] {
            None => {
                self.assigned_count += 1;
                if truth.to_bool() {
                    self.new_positive.push(atom);
                }
                None
            }
            Some(entry) => match (entry.truth, truth) {
                (old, new) if old == new => return false,
                (ThriceTruth::True, ThriceTruth::MustBeTrue) => return false,
                (ThriceTruth::MustBeTrue, _) => {
                    self.mbt_count -= 1;
                    Some(MbtRecord {
                        decision_level: entry.decision_level,
                        propagation_level: entry.propagation_level,
                        implied_by: entry.implied_by,
                    })
                }
                (old, new) => panic!("cannot reassign atom {atom} from {old} to {new}"),
            },
        };

        if truth.is_mbt() {
            self.mbt_count += 1;
        }

        self.entries[atom as usize] = Some(Entry {
            atom,
            truth,
            implied_by,
            decision_level,
            propagation_level,
            previous_mbt,
        });
        self.trail.push(Step {
            atom,
            decision_level,
        });
        true
    }

    /// Removes all assignments of the current decision level.
    pub fn backtrack(&mut self) {
        if let Some(level) = self.decision_level().checked_sub(1) {
            self.backtrack_to(level);
        }
    }

    /// Removes every entry above `level`. Entries whose previous must-be-true state lies at
    /// or below `level` fall back to that state instead of being removed.
    pub fn backtrack_to(&mut self, level: DecisionLevel) {
        let Some(&cut) = self.trail_lim.get(level) else {
            return;
        };

        while self.trail.len() > cut {
            let Some(step) = self.trail.pop() else { break };
            debug_assert!(step.decision_level > level);

            let slot = &mut self.entries[step.atom as usize];
            let Some(entry) = *slot else {
                continue;
            };
            if entry.propagation_level != self.trail.len() {
                // an older occurrence of an atom that was already restored or removed
                continue;
            }

            match entry.previous_mbt {
                Some(mbt) if mbt.decision_level <= level => {
                    if !entry.truth.to_bool() {
                        self.new_positive.push(step.atom);
                    }
                    *slot = Some(Entry {
                        atom: step.atom,
                        truth: ThriceTruth::MustBeTrue,
                        implied_by: mbt.implied_by,
                        decision_level: mbt.decision_level,
                        propagation_level: mbt.propagation_level,
                        previous_mbt: None,
                    });
                    self.mbt_count += 1;
                }
                _ => {
                    if entry.truth.is_mbt() {
                        self.mbt_count -= 1;
                    }
                    *slot = None;
                    self.assigned_count -= 1;
                }
            }
        }

        self.trail_lim.truncate(level);

        let entries = &self.entries;
        self.new_positive.retain(|&a| {
            entries[a as usize].is_some_and(|e| e.truth.to_bool())
        });

        debug_assert_eq!(self.mbt_count, self.count_mbt());
    }

    /// Atoms that became true or must-be-true since the last call. Each is returned once.
    pub fn new_positive_assignments(&mut self) -> std::vec::Drain<'_, Atom> {
        self.new_positive.drain(..)
    }

    #[must_use]
    pub fn has_new_positive_assignments(&self) -> bool {
        !self.new_positive.is_empty()
    }

    /// All atoms currently assigned true, ascending.
    #[must_use]
    pub fn true_assignments(&self) -> Vec<Atom> {
        self.entries
            .iter()
            .flatten()
            .filter(|e| e.truth == ThriceTruth::True)
            .map(|e| e.atom)
            .collect()
    }

    /// Number of atoms currently must-be-true. Zero means the assignment holds only true
    /// and false values.
    #[must_use]
    pub const fn mbt_count(&self) -> usize {
        self.mbt_count
    }

    fn count_mbt(&self) -> usize {
        self.entries
            .iter()
            .flatten()
            .filter(|e| e.truth.is_mbt())
            .count()
    }

    #[must_use]
    pub const fn assigned_count(&self) -> usize {
        self.assigned_count
    }

    /// `true` iff every atom up to the maximum atom id is assigned.
    #[must_use]
    pub fn is_total(&self) -> bool {
        self.assigned_count == self.entries.len()
    }

    /// The lowest unassigned atom, if any.
    #[must_use]
    pub fn first_unassigned(&self) -> Option<Atom> {
        self.entries
            .iter()
            .position(Option::is_none)
            .and_then(|i| Atom::try_from(i).ok())
    }

    /// The literal of the first assignment of every decision level, lowest level first.
    #[must_use]
    pub fn decision_literals(&self) -> Vec<Literal> {
        self.trail_lim
            .iter()
            .filter_map(|&i| self.trail.get(i))
            .filter_map(|s| self.get(s.atom))
            .map(Entry::literal)
            .collect()
    }

    /// Number of assignments made so far, which is also the next propagation number.
    #[must_use]
    pub fn trail_len(&self) -> usize {
        self.trail.len()
    }

    #[must_use]
    pub fn trail_atom(&self, index: usize) -> Atom {
        self.trail[index].atom
    }
}

impl Display for Assignment {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let assigned = self
            .entries
            .iter()
            .flatten()
            .skip(1)
            .map(|e| format!("{}={}@{}", e.atom, e.truth, e.decision_level))
            .join(" ");
        write!(f, "[{assigned}]")
    }
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
    fn test_new() {
        let a = Assignment::new(3);
        assert_eq!(a.decision_level(), 0);
        assert_eq!(a.truth(0), Some(ThriceTruth::False));
        assert_eq!(a.mbt_count(), 0);
        assert!(!a.is_assigned(1));
        assert!(!a.is_total());
        assert_eq!(a.first_unassigned(), Some(1));
        assert_eq!(a.max_atom_id(), 3);
    }

    #[test]
    fn test_assign_records_level_and_propagation() {
        let mut a = Assignment::new(3);
        a.assign(1, ThriceTruth::True, Some(4));
        a.new_decision_level();
        a.assign(2, ThriceTruth::False, None);

        let e1 = a.get(1).unwrap();
        assert_eq!(e1.decision_level, 0);
        assert_eq!(e1.implied_by, Some(4));
        let e2 = a.get(2).unwrap();
        assert_eq!(e2.decision_level, 1);
        assert!(e2.propagation_level > e1.propagation_level);
        assert_eq!(a.decision_literals(), vec![neg(2)]);
    }

    #[test]
    fn test_new_positive_assignments_are_returned_once() {
        let mut a = Assignment::new(3);
        a.assign(1, ThriceTruth::True, None);
        a.assign(2, ThriceTruth::False, None);
        a.assign(3, ThriceTruth::MustBeTrue, None);

        let first: Vec<Atom> = a.new_positive_assignments().collect();
        assert_eq!(first, vec![1, 3]);
        assert_eq!(a.new_positive_assignments().count(), 0);
    }

    #[test]
    fn test_upgrade_keeps_weak_level() {
        let mut a = Assignment::new(2);
        a.assign(1, ThriceTruth::MustBeTrue, Some(0));
        assert_eq!(a.mbt_count(), 1);
        a.new_decision_level();
        a.new_decision_level();
        assert!(a.assign(1, ThriceTruth::True, Some(1)));

        let e = a.get(1).unwrap();
        assert_eq!(e.truth, ThriceTruth::True);
        assert_eq!(e.decision_level, 2);
        assert_eq!(e.weak_decision_level(), 0);
        assert_eq!(e.implied_by_respecting_lower_mbt(), Some(0));
        assert_eq!(a.weak_decision_level(1), Some(0));
        assert_eq!(a.strong_decision_level(1), Some(2));
        assert_eq!(a.mbt_count(), 0);

        assert!(!a.assign(1, ThriceTruth::MustBeTrue, None));
    }

    #[test]
    fn test_backtrack_restores_previous_mbt() {
        let mut a = Assignment::new(3);
        a.new_decision_level();
        a.assign(1, ThriceTruth::MustBeTrue, Some(0));
        a.new_decision_level();
        a.assign(2, ThriceTruth::True, None);
        a.assign(1, ThriceTruth::True, Some(1));
        a.new_decision_level();
        a.assign(3, ThriceTruth::MustBeTrue, None);

        a.backtrack_to(1);

        assert_eq!(a.decision_level(), 1);
        assert_eq!(a.truth(1), Some(ThriceTruth::MustBeTrue));
        assert_eq!(a.get(1).unwrap().implied_by, Some(0));
        assert!(!a.get(1).unwrap().has_previous_mbt());
        assert!(!a.is_assigned(2));
        assert!(!a.is_assigned(3));
        assert_eq!(a.mbt_count(), 1);
        assert_eq!(a.trail_len(), 2);

        a.backtrack();
        assert!(!a.is_assigned(1));
        assert_eq!(a.mbt_count(), 0);
        assert_eq!(a.trail_len(), 1);
    }

    #[test]
    fn test_override_to_false_and_back() {
        let mut a = Assignment::new(2);
        a.assign(1, ThriceTruth::MustBeTrue, Some(3));
        let _ = a.new_positive_assignments().count();

        a.new_decision_level();
        assert!(a.assign(1, ThriceTruth::False, None));
        assert_eq!(a.mbt_count(), 0);
        assert_eq!(a.get(1).unwrap().previous_mbt.unwrap().implied_by, Some(3));

        a.backtrack();
        assert_eq!(a.truth(1), Some(ThriceTruth::MustBeTrue));
        assert_eq!(a.mbt_count(), 1);
        let replayed: Vec<Atom> = a.new_positive_assignments().collect();
        assert_eq!(replayed, vec![1]);
    }

    #[test]
    #[should_panic(expected = "cannot reassign")]
    fn test_contradicting_assignment_panics() {
        let mut a = Assignment::new(1);
        a.assign(1, ThriceTruth::True, None);
        a.assign(1, ThriceTruth::False, None);
    }

    #[test]
    fn test_literal_checks() {
        let mut a = Assignment::new(3);
        a.assign(1, ThriceTruth::True, None);
        a.assign(2, ThriceTruth::MustBeTrue, None);
        a.assign(3, ThriceTruth::False, None);

        assert!(a.is_violated(pos(1)));
        assert!(a.is_violated(pos(2)));
        assert!(a.is_violated(neg(3)));
        assert!(a.is_unsatisfied(neg(2)));
        assert!(a.is_unsatisfied(pos(3)));

        assert!(!a.is_violated(pos(4)));
        assert!(!a.is_violated(neg(4)));
        assert!(!a.is_unsatisfied(pos(4)));
        assert!(!a.is_unsatisfied(neg(4)));
        assert!(a.is_satisfied(neg(4)));
        assert!(!a.is_satisfied(pos(4)));
    }

    #[test]
    fn test_violates_is_exact() {
        let mut rng = fastrand::Rng::with_seed(3);
        for _ in 0..300 {
            let mut a = Assignment::new(5);
            for atom in 1..=5 {
                match rng.u8(0..4) {
                    0 => {}
                    1 => {
                        a.assign(atom, ThriceTruth::True, None);
                    }
                    2 => {
                        a.assign(atom, ThriceTruth::False, None);
                    }
                    _ => {
                        a.assign(atom, ThriceTruth::MustBeTrue, None);
                    }
                }
            }
            let ng = NoGood::new((0..rng.usize(1..5)).map(|_| Literal::new(rng.u32(1..=5), rng.bool())));
            let expected = ng
                .iter()
                .all(|&l| a.is_assigned(l.atom()) && a.is_violated(l));
            assert_eq!(a.violates(&ng), expected);
            assert_eq!(a.is_undefined(&ng), ng.iter().any(|l| !a.is_assigned(l.atom())));
        }
    }

    #[test]
    fn test_backtrack_soundness_randomized() {
        let mut rng = fastrand::Rng::with_seed(19);
        for _ in 0..100 {
            let mut a = Assignment::new(12);
            for atom in 1..=12 {
                if rng.bool() {
                    a.new_decision_level();
                }
                let truth = [ThriceTruth::True, ThriceTruth::False, ThriceTruth::MustBeTrue]
                    [rng.usize(0..3)];
                a.assign(atom, truth, None);
                if truth.is_mbt() && rng.bool() {
                    a.new_decision_level();
                    let upgrade = if rng.bool() { ThriceTruth::True } else { ThriceTruth::False };
                    a.assign(atom, upgrade, None);
                }
            }

            let target = rng.usize(0..=a.decision_level());
            a.backtrack_to(target);

            assert_eq!(a.decision_level(), target);
            for atom in 0..=12 {
                if let Some(e) = a.get(atom) {
                    assert!(e.decision_level <= target);
                }
            }
            assert_eq!(a.mbt_count(), a.count_mbt());
        }
    }

    #[test]
    fn test_monotonic_within_level() {
        let mut a = Assignment::new(6);
        a.new_decision_level();
        let mut seen = Vec::new();
        for atom in 1..=6 {
            let truth = if atom % 2 == 0 { ThriceTruth::True } else { ThriceTruth::MustBeTrue };
            a.assign(atom, truth, None);
            seen.push((atom, truth));
            for &(prev, t) in &seen {
                assert_eq!(a.truth(prev), Some(t));
            }
        }
        a.assign(1, ThriceTruth::True, None);
        assert_eq!(a.truth(1), Some(ThriceTruth::True));
    }

    #[test]
    fn test_grow_keeps_entries() {
        let mut a = Assignment::new(2);
        a.assign(1, ThriceTruth::MustBeTrue, Some(0));
        a.new_decision_level();
        a.assign(2, ThriceTruth::True, None);
        let before = (a.get(1).copied(), a.get(2).copied(), a.mbt_count(), a.trail_len());

        a.grow_for_max_atom_id(100);

        assert_eq!(
            before,
            (a.get(1).copied(), a.get(2).copied(), a.mbt_count(), a.trail_len())
        );
        assert_eq!(a.max_atom_id(), 100);
        assert_eq!(a.first_unassigned(), Some(3));
    }
}
