#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! Branching heuristics: which literal the search decides on next.
//!
//! The search notifies its heuristic about every violated nogood, every completed conflict
//! analysis and every nogood added to the store; in return the heuristic proposes a literal
//! whenever the search has to branch. A heuristic may answer with
//! [`DEFAULT_CHOICE_LITERAL`] when it has no informed choice, in which case the search picks
//! the lowest unassigned atom itself.
//!
//! Strategies:
//! - [`BerkMin`]: prefers the most active free atom of the most recent undefined nogood
//!   among the violated and learned ones.
//! - [`Vsids`]: decaying atom activities kept in a lazily updated max-heap, with saved signs.
//! - [`FixedOrder`]: never informed; the search goes through atoms in ascending order.
//! - [`RandomOrder`]: a uniformly random free atom with a random sign.

use crate::asp::assignment::Assignment;
use crate::asp::conflict_analysis::ConflictAnalysisResult;
use crate::asp::literal::{Atom, DEFAULT_CHOICE_LITERAL, Literal};
use crate::asp::nogood::NoGood;
use bit_vec::BitVec;
use clap::ValueEnum;
use ordered_float::OrderedFloat;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};
use std::fmt::{Debug, Display};

/// Literal selection for the search loop.
pub trait BranchingHeuristic: Debug + Clone {
    /// Called with the nogood that caused a conflict, before it is analysed.
    fn violated_no_good(&mut self, no_good: &NoGood);

    /// Called with the outcome of every conflict analysis that learned a nogood.
    fn analyzed_conflict(&mut self, analysis: &ConflictAnalysisResult);

    /// Called for every nogood added to the store.
    fn new_no_good(&mut self, no_good: &NoGood);

    fn new_no_goods<'a, I: IntoIterator<Item = &'a NoGood>>(&mut self, no_goods: I) {
        for no_good in no_goods {
            self.new_no_good(no_good);
        }
    }

    /// Proposes the next decision literal: its atom is decided, and the literal's polarity is
    /// the truth value it gets.
    ///
    /// # Returns
    ///
    /// A literal over an unassigned atom, or [`DEFAULT_CHOICE_LITERAL`] if there is no
    /// informed choice.
    fn choose_literal(&mut self, assignment: &Assignment) -> Literal;

    fn grow_for_max_atom_id(&mut self, _max_atom_id: Atom) {}
}

const BERKMIN_DECAY_PERIOD: usize = 10;
const BERKMIN_DECAY_FACTOR: f64 = 0.25;
const BERKMIN_STACK_LIMIT: usize = 1 << 12;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BerkMin {
    activity: Vec<f64>,
    /// Positive minus negative occurrences of each atom in the nogoods seen so far.
    sign_balance: Vec<i64>,
    /// Violated and learned nogoods, most recent at the back.
    stack: VecDeque<NoGood>,
    conflicts_since_decay: usize,
}

impl BerkMin {
    #[must_use]
    pub fn new(max_atom_id: Atom) -> Self {
        let mut heuristic = Self::default();
        heuristic.grow_for_max_atom_id(max_atom_id);
        heuristic
    }

    fn ensure(&mut self, atom: Atom) {
        if atom as usize >= self.activity.len() {
            self.grow_for_max_atom_id(atom);
        }
    }

    fn count_signs(&mut self, no_good: &NoGood) {
        for &literal in no_good {
            self.ensure(literal.atom());
            let delta = if literal.is_positive() { 1 } else { -1 };
            self.sign_balance[literal.atom() as usize] += delta;
        }
    }

    fn bump(&mut self, literal: Literal) {
        self.ensure(literal.atom());
        self.activity[literal.atom() as usize] += 1.0;
    }

    fn push(&mut self, no_good: NoGood) {
        if self.stack.len() == BERKMIN_STACK_LIMIT {
            self.stack.pop_front();
        }
        self.stack.push_back(no_good);
    }

    fn decay_if_due(&mut self) {
        self.conflicts_since_decay += 1;
        if self.conflicts_since_decay >= BERKMIN_DECAY_PERIOD {
            self.conflicts_since_decay = 0;
            self.activity.iter_mut().for_each(|a| *a *= BERKMIN_DECAY_FACTOR);
        }
    }

    fn activity(&self, atom: Atom) -> f64 {
        self.activity.get(atom as usize).copied().unwrap_or(0.0)
    }

    /// Choose the sign that does not add to the side the atom mostly occurs with in nogoods.
    fn pick_sign(&self, atom: Atom) -> Literal {
        let balance = self.sign_balance.get(atom as usize).copied().unwrap_or(0);
        Literal::new(atom, balance <= 0)
    }

    fn most_active_free_atom<'a, I: Iterator<Item = &'a Literal>>(
        &self,
        literals: I,
        assignment: &Assignment,
    ) -> Option<Atom> {
        literals
            .map(|l| l.atom())
            .filter(|&a| !assignment.is_assigned(a))
            .max_by(|&a, &b| {
                OrderedFloat(self.activity(a))
                    .cmp(&OrderedFloat(self.activity(b)))
                    .then_with(|| b.cmp(&a))
            })
    }
}

impl BranchingHeuristic for BerkMin {
    fn violated_no_good(&mut self, no_good: &NoGood) {
        for &literal in no_good {
            self.bump(literal);
        }
        self.push(no_good.clone());
    }

    fn analyzed_conflict(&mut self, analysis: &ConflictAnalysisResult) {
        for &literal in &analysis.blamed {
            self.bump(literal);
        }
        self.count_signs(&analysis.learned_no_good);
        self.push(analysis.learned_no_good.clone());
        self.decay_if_due();
    }

    fn new_no_good(&mut self, no_good: &NoGood) {
        self.count_signs(no_good);
    }

    fn choose_literal(&mut self, assignment: &Assignment) -> Literal {
        let from_stack = self
            .stack
            .iter()
            .rev()
            .filter(|ng| assignment.is_undefined(ng))
            .find_map(|ng| self.most_active_free_atom(ng.iter(), assignment));

        let atom = from_stack.or_else(|| {
            (1..self.activity.len())
                .filter_map(|a| Atom::try_from(a).ok())
                .filter(|&a| self.activity(a) > 0.0 && !assignment.is_assigned(a))
                .max_by(|&a, &b| {
                    OrderedFloat(self.activity(a))
                        .cmp(&OrderedFloat(self.activity(b)))
                        .then_with(|| b.cmp(&a))
                })
        });

        atom.map_or(DEFAULT_CHOICE_LITERAL, |a| self.pick_sign(a))
    }

    fn grow_for_max_atom_id(&mut self, max_atom_id: Atom) {
        let needed = max_atom_id as usize + 1;
        if needed > self.activity.len() {
            self.activity.resize(needed, 0.0);
            self.sign_balance.resize(needed, 0);
        }
    }
}

const VSIDS_DECAY: f64 = 0.95;
const VSIDS_RESCALE_LIMIT: f64 = 1e100;

#[derive(Debug, Clone)]
pub struct Vsids {
    activity: Vec<f64>,
    /// May hold stale entries; an entry is live iff its score equals the atom's activity.
    heap: BinaryHeap<(OrderedFloat<f64>, Reverse<Atom>)>,
    increment: f64,
    /// Preferred truth value of every atom.
    signs: BitVec,
}

impl Default for Vsids {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Vsids {
    #[must_use]
    pub fn new(max_atom_id: Atom) -> Self {
        let mut vsids = Self {
            activity: Vec::new(),
            heap: BinaryHeap::new(),
            increment: 1.0,
            signs: BitVec::new(),
        };
        vsids.grow_for_max_atom_id(max_atom_id);
        vsids
    }

    #[must_use]
    pub fn activity(&self, atom: Atom) -> f64 {
        self.activity.get(atom as usize).copied().unwrap_or(0.0)
    }

    fn bump(&mut self, atom: Atom) {
        if atom as usize >= self.activity.len() {
            self.grow_for_max_atom_id(atom);
        }
        let i = atom as usize;
        self.activity[i] += self.increment;

        if self.activity[i] > VSIDS_RESCALE_LIMIT {
            self.activity.iter_mut().for_each(|a| *a *= 1.0 / VSIDS_RESCALE_LIMIT);
            self.increment *= 1.0 / VSIDS_RESCALE_LIMIT;
            self.rebuild_heap();
        } else {
            self.heap.push((OrderedFloat(self.activity[i]), Reverse(atom)));
        }
    }

    fn decay(&mut self) {
        self.increment /= VSIDS_DECAY;
    }

    fn rebuild_heap(&mut self) {
        self.heap = self
            .activity
            .iter()
            .enumerate()
            .skip(1)
            .filter_map(|(i, &a)| Some((OrderedFloat(a), Reverse(Atom::try_from(i).ok()?))))
            .collect();
    }

    fn is_live(&self, score: OrderedFloat<f64>, atom: Atom) -> bool {
        self.activity.get(atom as usize).is_some_and(|&a| OrderedFloat(a) == score)
    }
}

impl BranchingHeuristic for Vsids {
    fn violated_no_good(&mut self, _no_good: &NoGood) {}

    fn analyzed_conflict(&mut self, analysis: &ConflictAnalysisResult) {
        for literal in &analysis.blamed {
            self.bump(literal.atom());
        }
        let asserting = analysis.asserting_literal;
        self.grow_for_max_atom_id(asserting.atom());
        self.signs.set(asserting.atom() as usize, asserting.is_negated());
        self.decay();
    }

    fn new_no_good(&mut self, no_good: &NoGood) {
        if let Some(max) = no_good.iter().map(|l| l.atom()).max() {
            self.grow_for_max_atom_id(max);
        }
    }

    fn choose_literal(&mut self, assignment: &Assignment) -> Literal {
        let mut assigned = Vec::new();
        let mut chosen = None;

        while let Some((score, Reverse(atom))) = self.heap.pop() {
            if !self.is_live(score, atom) {
                continue;
            }
            assigned.push((score, Reverse(atom)));
            if !assignment.is_assigned(atom) {
                chosen = Some(atom);
                break;
            }
        }

        self.heap.extend(assigned);

        if self.heap.len() > 4 * self.activity.len() {
            self.rebuild_heap();
        }

        chosen.map_or(DEFAULT_CHOICE_LITERAL, |atom| {
            Literal::new(atom, self.signs.get(atom as usize).unwrap_or(true))
        })
    }

    fn grow_for_max_atom_id(&mut self, max_atom_id: Atom) {
        let old = self.activity.len();
        let needed = max_atom_id as usize + 1;
        if needed <= old {
            return;
        }
        self.activity.resize(needed, 0.0);
        self.signs.grow(needed - old, true);
        for atom in old.max(1)..needed {
            if let Ok(atom) = Atom::try_from(atom) {
                self.heap.push((OrderedFloat(0.0), Reverse(atom)));
            }
        }
    }
}

/// Never informed: the search decides atoms in ascending order, positive first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FixedOrder;

impl BranchingHeuristic for FixedOrder {
    fn violated_no_good(&mut self, _no_good: &NoGood) {}

    fn analyzed_conflict(&mut self, _analysis: &ConflictAnalysisResult) {}

    fn new_no_good(&mut self, _no_good: &NoGood) {}

    fn choose_literal(&mut self, _assignment: &Assignment) -> Literal {
        DEFAULT_CHOICE_LITERAL
    }
}

#[derive(Debug, Clone)]
pub struct RandomOrder {
    rng: fastrand::Rng,
}

impl Default for RandomOrder {
    fn default() -> Self {
        Self {
            rng: fastrand::Rng::new(),
        }
    }
}

impl RandomOrder {
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: fastrand::Rng::with_seed(seed),
        }
    }
}

impl BranchingHeuristic for RandomOrder {
    fn violated_no_good(&mut self, _no_good: &NoGood) {}

    fn analyzed_conflict(&mut self, _analysis: &ConflictAnalysisResult) {}

    fn new_no_good(&mut self, _no_good: &NoGood) {}

    fn choose_literal(&mut self, assignment: &Assignment) -> Literal {
        let max = assignment.max_atom_id();
        if max == 0 {
            return DEFAULT_CHOICE_LITERAL;
        }
        let start = self.rng.u32(1..=max);
        (start..=max)
            .chain(1..start)
            .find(|&a| !assignment.is_assigned(a))
            .map_or(DEFAULT_CHOICE_LITERAL, |a| Literal::new(a, self.rng.bool()))
    }
}

/// Runtime choice of heuristic.
#[derive(Debug, Clone)]
pub enum HeuristicImpls {
    BerkMin(BerkMin),
    Vsids(Vsids),
    FixedOrder(FixedOrder),
    RandomOrder(RandomOrder),
}

impl Default for HeuristicImpls {
    fn default() -> Self {
        Self::BerkMin(BerkMin::default())
    }
}

impl BranchingHeuristic for HeuristicImpls {
    fn violated_no_good(&mut self, no_good: &NoGood) {
        match self {
            Self::BerkMin(h) => h.violated_no_good(no_good),
            Self::Vsids(h) => h.violated_no_good(no_good),
            Self::FixedOrder(h) => h.violated_no_good(no_good),
            Self::RandomOrder(h) => h.violated_no_good(no_good),
        }
    }

    fn analyzed_conflict(&mut self, analysis: &ConflictAnalysisResult) {
        match self {
            Self::BerkMin(h) => h.analyzed_conflict(analysis),
            Self::Vsids(h) => h.analyzed_conflict(analysis),
            Self::FixedOrder(h) => h.analyzed_conflict(analysis),
            Self::RandomOrder(h) => h.analyzed_conflict(analysis),
        }
    }

    fn new_no_good(&mut self, no_good: &NoGood) {
        match self {
            Self::BerkMin(h) => h.new_no_good(no_good),
            Self::Vsids(h) => h.new_no_good(no_good),
            Self::FixedOrder(h) => h.new_no_good(no_good),
            Self::RandomOrder(h) => h.new_no_good(no_good),
        }
    }

    fn choose_literal(&mut self, assignment: &Assignment) -> Literal {
        match self {
            Self::BerkMin(h) => h.choose_literal(assignment),
            Self::Vsids(h) => h.choose_literal(assignment),
            Self::FixedOrder(h) => h.choose_literal(assignment),
            Self::RandomOrder(h) => h.choose_literal(assignment),
        }
    }

    fn grow_for_max_atom_id(&mut self, max_atom_id: Atom) {
        match self {
            Self::BerkMin(h) => h.grow_for_max_atom_id(max_atom_id),
            Self::Vsids(h) => h.grow_for_max_atom_id(max_atom_id),
            Self::FixedOrder(h) => h.grow_for_max_atom_id(max_atom_id),
            Self::RandomOrder(h) => h.grow_for_max_atom_id(max_atom_id),
        }
    }
}

/// Heuristic selectable from the command line.
#[derive(Debug, Clone, PartialEq, Eq, Copy, Hash, Default, ValueEnum)]
pub enum HeuristicType {
    #[default]
    #[value(name = "berkmin")]
    BerkMin,
    Vsids,
    FixedOrder,
    RandomOrder,
}

impl Display for HeuristicType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BerkMin => write!(f, "berkmin"),
            Self::Vsids => write!(f, "vsids"),
            Self::FixedOrder => write!(f, "fixed-order"),
            Self::RandomOrder => write!(f, "random-order"),
        }
    }
}

impl HeuristicType {
    /// Converts the `HeuristicType` to a concrete `HeuristicImpls` sized for `max_atom_id`.
    #[must_use]
    pub fn to_impl(self, max_atom_id: Atom) -> HeuristicImpls {
        match self {
            Self::BerkMin => HeuristicImpls::BerkMin(BerkMin::new(max_atom_id)),
            Self::Vsids => HeuristicImpls::Vsids(Vsids::new(max_atom_id)),
            Self::FixedOrder => HeuristicImpls::FixedOrder(FixedOrder),
            Self::RandomOrder => HeuristicImpls::RandomOrder(RandomOrder::default()),
        }
    }
}
