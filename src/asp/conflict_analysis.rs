#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! First-UIP conflict analysis over three-valued assignments.
//!
//! Resolution always continues on the literal that became true most recently at the conflict
//! level. A positive literal over an atom that was must-be-true before being upgraded already
//! held while it was must-be-true, so it is resolved with that earlier justification: its
//! weak decision level, its MBT propagation number and the nogood that derived the MBT value.

use crate::asp::assignment::{Assignment, DecisionLevel};
use crate::asp::literal::{Atom, Literal};
use crate::asp::nogood::{NoGood, NoGoodId};
use crate::asp::propagation::NoGoodStore;
use rustc_hash::FxHashSet;
use smallvec::SmallVec;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConflictAnalysisResult {
    pub learned_no_good: NoGood,
    /// The only literal of the learned nogood at the conflict level.
    pub asserting_literal: Literal,
    pub backjump_level: DecisionLevel,
    pub conflict_level: DecisionLevel,
    /// Every literal that took part in resolution, for heuristics to reward.
    pub blamed: Vec<Literal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Conflict {
    /// The violated nogood holds at decision level 0; the program has no answer set.
    Ground,
    Learned(ConflictAnalysisResult),
}

/// Level, propagation number and implying nogood of the point at which `literal` started to
/// hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Justification {
    decision_level: DecisionLevel,
    propagation_level: usize,
    implied_by: Option<NoGoodId>,
}

fn justification(assignment: &Assignment, literal: Literal) -> Justification {
    let Some(entry) = assignment.get(literal.atom()) else {
        unreachable!("literal {literal} of a violated nogood is unassigned");
    };
    match entry.previous_mbt {
        Some(mbt) if literal.is_positive() => Justification {
            decision_level: mbt.decision_level,
            propagation_level: mbt.propagation_level,
            implied_by: mbt.implied_by,
        },
        _ => Justification {
            decision_level: entry.decision_level,
            propagation_level: entry.propagation_level,
            implied_by: entry.implied_by,
        },
    }
}

/// Analyses the conflict caused by the nogood `violated`, which the assignment must violate.
///
/// # Returns
///
/// [`Conflict::Ground`] when every literal holds at level 0. Otherwise the learned nogood,
/// which contains exactly one literal of the conflict level and is therefore unit once the
/// search backjumps to the returned backjump level.
///
/// # Panics
///
/// If `violated` is not violated by `assignment`.
#[must_use]
pub fn analyse_conflict(
    assignment: &Assignment,
    store: &NoGoodStore,
    violated: NoGoodId,
) -> Conflict {
    let conflicting = &store[violated];
    debug_assert!(assignment.violates(conflicting), "{conflicting} is not violated");

    let conflict_level = conflicting
        .iter()
        .map(|&l| justification(assignment, l).decision_level)
        .max()
        .unwrap_or(0);

    if conflict_level == 0 {
        return Conflict::Ground;
    }

    let mut current: SmallVec<[Literal; 16]> = SmallVec::new();
    let mut seen: FxHashSet<Atom> = FxHashSet::default();
    let mut blamed: Vec<Literal> = Vec::new();

    for &literal in conflicting {
        add(assignment, literal, &mut current, &mut seen);
    }
    blamed.extend(current.iter().copied());

    loop {
        let at_conflict_level: SmallVec<[(usize, Justification); 4]> = current
            .iter()
            .enumerate()
            .map(|(i, &l)| (i, justification(assignment, l)))
            .filter(|(_, j)| j.decision_level == conflict_level)
            .collect();

        if at_conflict_level.len() <= 1 {
            break;
        }

        let Some(&(index, latest)) = at_conflict_level
            .iter()
            .max_by_key(|(_, j)| j.propagation_level)
        else {
            break;
        };

        // only the first assignment of a level can lack a reason, and it is the earliest one
        // there, so it is never the latest while others remain
        let Some(reason) = latest.implied_by else {
            unreachable!(
                "resolving on a decision with {} literals left",
                at_conflict_level.len()
            );
        };

        let resolved = current.swap_remove(index);
        seen.remove(&resolved.atom());

        for &literal in &store[reason] {
            if literal.atom() == resolved.atom() {
                continue;
            }
            if add(assignment, literal, &mut current, &mut seen) {
                blamed.push(literal);
            }
        }
    }

    let Some(asserting_index) = current
        .iter()
        .position(|&l| justification(assignment, l).decision_level == conflict_level)
    else {
        unreachable!("learned nogood has no literal at conflict level {conflict_level}");
    };

    let asserting_literal = current.swap_remove(asserting_index);
    let backjump_level = current
        .iter()
        .map(|&l| justification(assignment, l).decision_level)
        .max()
        .unwrap_or(0);

    debug_assert!(backjump_level < conflict_level);

    Conflict::Learned(ConflictAnalysisResult {
        learned_no_good: NoGood::learnt(asserting_literal, current),
        asserting_literal,
        backjump_level,
        conflict_level,
        blamed,
    })
}

/// Adds `literal` to the working set unless it holds at level 0 or its atom is already there.
fn add(
    assignment: &Assignment,
    literal: Literal,
    current: &mut SmallVec<[Literal; 16]>,
    seen: &mut FxHashSet<Atom>,
) -> bool {
    if justification(assignment, literal).decision_level > 0 && seen.insert(literal.atom()) {
        current.push(literal);
        true
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asp::nogood::NoGoodType;
    use crate::asp::truth::ThriceTruth;

    fn pos(a: u32) -> Literal {
        Literal::positive(a)
    }

    fn neg(a: u32) -> Literal {
        Literal::negative(a)
    }

    fn expect_learned(conflict: Conflict) -> ConflictAnalysisResult {
        match conflict {
            Conflict::Learned(result) => result,
            Conflict::Ground => panic!("expected a learned nogood"),
        }
    }

    #[test]
    fn test_ground_conflict() {
        let mut store = NoGoodStore::new();
        let mut assignment = Assignment::new(2);
        let (id, _) = store.add(NoGood::new([pos(1), pos(2)]));
        assignment.assign(1, ThriceTruth::True, None);
        assignment.assign(2, ThriceTruth::True, None);

        assert_eq!(analyse_conflict(&assignment, &store, id), Conflict::Ground);
    }

    #[test]
    fn test_decision_against_fact_learns_negation() {
        // a is a fact, a and b exclude each other, b is decided true
        let mut store = NoGoodStore::new();
        let mut assignment = Assignment::new(2);
        let (fact, _) = store.add(NoGood::fact(neg(1)));
        let (exclusion, _) = store.add(NoGood::new([pos(1), pos(2)]));
        assignment.assign(1, ThriceTruth::True, Some(fact));
        assignment.new_decision_level();
        assignment.assign(2, ThriceTruth::True, None);

        let result = expect_learned(analyse_conflict(&assignment, &store, exclusion));

        assert_eq!(result.learned_no_good, NoGood::new([pos(2)]));
        assert_eq!(result.learned_no_good.kind(), NoGoodType::Learnt);
        assert_eq!(result.asserting_literal, pos(2));
        assert_eq!(result.backjump_level, 0);
        assert_eq!(result.conflict_level, 1);
    }

    #[test]
    fn test_first_uip() {
        // decision 1 @1, decision 2 @2, 2 => 3, 1 & 3 => 4, conflict {+3, +4}
        let mut store = NoGoodStore::new();
        let mut assignment = Assignment::new(4);
        let (r3, _) = store.add(NoGood::new([pos(2), neg(3)]));
        let (r4, _) = store.add(NoGood::new([pos(1), pos(3), neg(4)]));
        let (conflict, _) = store.add(NoGood::new([pos(3), pos(4)]));

        assignment.new_decision_level();
        assignment.assign(1, ThriceTruth::True, None);
        assignment.new_decision_level();
        assignment.assign(2, ThriceTruth::True, None);
        assignment.assign(3, ThriceTruth::MustBeTrue, Some(r3));
        assignment.assign(4, ThriceTruth::MustBeTrue, Some(r4));

        let result = expect_learned(analyse_conflict(&assignment, &store, conflict));

        assert_eq!(result.asserting_literal, pos(3));
        assert_eq!(result.learned_no_good, NoGood::new([pos(1), pos(3)]));
        assert_eq!(result.backjump_level, 1);
        assert_eq!(result.conflict_level, 2);
        assert!(result.blamed.contains(&pos(4)));
    }

    #[test]
    fn test_negative_asserting_literal_gives_head() {
        let mut store = NoGoodStore::new();
        let mut assignment = Assignment::new(3);
        let (r2, _) = store.add(NoGood::new([neg(1), pos(2)]));
        let (conflict, _) = store.add(NoGood::new([neg(1), neg(2), pos(3)]));

        assignment.new_decision_level();
        assignment.assign(3, ThriceTruth::True, None);
        assignment.new_decision_level();
        assignment.assign(1, ThriceTruth::False, None);
        assignment.assign(2, ThriceTruth::False, Some(r2));

        let result = expect_learned(analyse_conflict(&assignment, &store, conflict));

        assert_eq!(result.asserting_literal, neg(1));
        assert_eq!(result.learned_no_good.head(), Some(neg(1)));
        assert_eq!(result.learned_no_good.body(), &[pos(3)]);
        assert_eq!(result.backjump_level, 1);
    }

    #[test]
    fn test_upgraded_atom_is_resolved_with_mbt_justification() {
        // 1 @1 derives 2 as MBT; 2 is upgraded at level 2 after decision 3.
        // conflict {+2, +3}: +2 counts at level 1 via its MBT reason.
        let mut store = NoGoodStore::new();
        let mut assignment = Assignment::new(3);
        let (mbt_reason, _) = store.add(NoGood::new([pos(1), neg(2)]));
        let (conflict, _) = store.add(NoGood::new([pos(2), pos(3)]));

        assignment.new_decision_level();
        assignment.assign(1, ThriceTruth::True, None);
        assignment.assign(2, ThriceTruth::MustBeTrue, Some(mbt_reason));
        assignment.new_decision_level();
        assignment.assign(3, ThriceTruth::True, None);
        assignment.assign(2, ThriceTruth::True, None);

        let result = expect_learned(analyse_conflict(&assignment, &store, conflict));

        assert_eq!(result.conflict_level, 2);
        assert_eq!(result.asserting_literal, pos(3));
        assert_eq!(result.learned_no_good, NoGood::new([pos(2), pos(3)]));
        assert_eq!(result.backjump_level, 1);
    }

    #[test]
    fn test_level_zero_literals_are_dropped() {
        let mut store = NoGoodStore::new();
        let mut assignment = Assignment::new(3);
        let (conflict, _) = store.add(NoGood::new([pos(1), pos(2), neg(3)]));
        assignment.assign(1, ThriceTruth::True, None);
        assignment.new_decision_level();
        assignment.assign(2, ThriceTruth::True, None);
        assignment.new_decision_level();
        assignment.assign(3, ThriceTruth::False, None);

        let result = expect_learned(analyse_conflict(&assignment, &store, conflict));
        assert_eq!(result.learned_no_good.head(), Some(neg(3)));
        assert_eq!(result.learned_no_good.body(), &[pos(2)]);
        assert_eq!(result.backjump_level, 1);
    }

    #[test]
    fn test_analysis_on_random_propagated_conflicts() {
        let mut rng = fastrand::Rng::with_seed(23);
        let mut analysed = 0;
        for _ in 0..300 {
            let mut store = NoGoodStore::new();
            let mut assignment = Assignment::new(10);
            for _ in 0..25 {
                let len = rng.usize(2..4);
                store.add(NoGood::new(
                    (0..len).map(|_| Literal::new(rng.u32(1..=10), rng.bool())),
                ));
            }
            if store.propagate(&mut assignment).is_some() {
                continue;
            }

            let conflict = loop {
                let Some(atom) = assignment.first_unassigned() else {
                    break None;
                };
                assignment.new_decision_level();
                assignment.assign(atom, ThriceTruth::from_bool(rng.bool()), None);
                if let Some(id) = store.propagate(&mut assignment) {
                    break Some(id);
                }
            };
            let Some(id) = conflict else { continue };

            if let Conflict::Learned(result) = analyse_conflict(&assignment, &store, id) {
                analysed += 1;
                let at_conflict_level = result
                    .learned_no_good
                    .iter()
                    .filter(|&&l| {
                        justification(&assignment, l).decision_level == result.conflict_level
                    })
                    .count();
                assert_eq!(at_conflict_level, 1);
                assert!(result.backjump_level < result.conflict_level);
                assert!(assignment.violates(&result.learned_no_good));
            }
        }
        assert!(analysed > 0);
    }

    fn random_mixed_no_good(rng: &mut fastrand::Rng, atoms: u32) -> NoGood {
        let body: Vec<Literal> = (0..rng.usize(1..3))
            .map(|_| Literal::new(rng.u32(1..=atoms), rng.bool()))
            .collect();
        let head = Literal::negative(rng.u32(1..=atoms));
        match rng.u8(0..3) {
            0 => NoGood::new(body),
            1 => NoGood::head_first(std::iter::once(head).chain(body)),
            _ => NoGood::support(head, body[0]),
        }
    }

    #[test]
    fn test_analysis_with_heads_supports_and_upgrades() {
        let mut rng = fastrand::Rng::with_seed(41);
        let mut analysed = 0;
        for _ in 0..500 {
            let mut store = NoGoodStore::new();
            let mut assignment = Assignment::new(8);
            for _ in 0..rng.usize(8..20) {
                store.add(random_mixed_no_good(&mut rng, 8));
            }
            if store.propagate(&mut assignment).is_some() {
                continue;
            }

            let conflict = loop {
                let Some(atom) = assignment.first_unassigned() else {
                    break None;
                };
                assignment.new_decision_level();
                assignment.assign(atom, ThriceTruth::from_bool(rng.bool()), None);
                if let Some(id) = store.propagate(&mut assignment) {
                    break Some(id);
                }
            };
            let Some(id) = conflict else { continue };

            if let Conflict::Learned(result) = analyse_conflict(&assignment, &store, id) {
                analysed += 1;
                let at_conflict_level: Vec<Literal> = result
                    .learned_no_good
                    .iter()
                    .copied()
                    .filter(|&l| {
                        justification(&assignment, l).decision_level == result.conflict_level
                    })
                    .collect();
                assert_eq!(at_conflict_level, vec![result.asserting_literal]);
                assert_eq!(
                    result.learned_no_good.has_head(),
                    result.asserting_literal.is_negated()
                );
                assert!(result.backjump_level < result.conflict_level);
                assert!(result
                    .learned_no_good
                    .iter()
                    .filter(|&&l| l != result.asserting_literal)
                    .all(|&l| justification(&assignment, l).decision_level
                        <= result.backjump_level));
                assert!(assignment.violates(&result.learned_no_good));
            }
        }
        assert!(analysed > 0);
    }
}
