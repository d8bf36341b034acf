#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! The CDNL search loop.
//!
//! The solver is a small state machine. Each call to [`Solver::step`] performs one transition:
//!
//! ```text
//! Propagate ──conflict──▶ Conflict ──learned──▶ Propagate
//!     │                       └──level 0──▶ Unsat
//!     ├──total──▶ Satisfied ──stable, no MBT──▶ Accepted ──blocking nogood──▶ Propagate
//!     │               └──confirmed atoms──▶ Propagate
//!     └──open──▶ Decide ──▶ Propagate
//!                  └──stop condition──▶ Stopped
//! ```
//!
//! Answer sets are enumerated by adding, after each accepted candidate, a nogood over its
//! decision literals. Once a candidate has no decisions left to flip the search ends in
//! [`SearchState::Unsat`], which therefore also means "no further answer sets".

use crate::asp::assignment::{Assignment, DecisionLevel};
use crate::asp::conflict_analysis::{Conflict, ConflictAnalysisResult, analyse_conflict};
use crate::asp::grounding::{NoGoodSource, StaticProgram};
use crate::asp::handler::{NeverStop, StopCondition};
use crate::asp::heuristic::{BerkMin, BranchingHeuristic};
use crate::asp::literal::{Atom, DEFAULT_CHOICE_LITERAL, Literal};
use crate::asp::nogood::{NoGood, NoGoodId, NoGoodType};
use crate::asp::propagation::NoGoodStore;
use crate::asp::restarter::{Luby, Restarter};
use crate::asp::stability::{StabilityChecker, TrustMbt, Verdict};
use crate::asp::truth::ThriceTruth;
use itertools::Itertools;
use std::fmt::{Display, Formatter};
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchState {
    Propagate,
    Decide,
    Conflict(NoGoodId),
    /// The assignment is total and violates no nogood; the stability check is next.
    Satisfied,
    /// The current assignment is an answer set.
    Accepted,
    /// No (further) answer set exists.
    Unsat,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct SearchStats {
    pub decisions: usize,
    pub conflicts: usize,
    pub propagations: usize,
    pub restarts: usize,
    pub learned_no_goods: usize,
    pub no_goods: usize,
    pub answer_sets: usize,
    pub rejected_candidates: usize,
}

/// The atoms true in an answer set, ascending.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct AnswerSet(Vec<Atom>);

impl AnswerSet {
    #[must_use]
    pub fn new(mut atoms: Vec<Atom>) -> Self {
        atoms.sort_unstable();
        atoms.dedup();
        Self(atoms)
    }

    #[must_use]
    pub fn atoms(&self) -> &[Atom] {
        &self.0
    }

    #[must_use]
    pub fn contains(&self, atom: Atom) -> bool {
        self.0.binary_search(&atom).is_ok()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `true` if every literal of `no_good` holds when exactly the atoms of this set are true.
    #[must_use]
    pub fn violates(&self, no_good: &NoGood) -> bool {
        no_good
            .iter()
            .all(|l| self.contains(l.atom()) == l.is_positive())
    }

    /// `+a` for every atom in the set and `-a` for every other atom up to `max_atom_id`.
    pub fn literals(&self, max_atom_id: Atom) -> impl Iterator<Item = Literal> + '_ {
        (1..=max_atom_id).map(|a| Literal::new(a, self.contains(a)))
    }
}

impl Display for AnswerSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{ {} }}", self.0.iter().join(" "))
    }
}

#[derive(Debug, Clone)]
pub struct Solver<
    H: BranchingHeuristic = BerkMin,
    R: Restarter = Luby<100>,
    S: NoGoodSource = StaticProgram,
    C: StabilityChecker = TrustMbt,
    T: StopCondition = NeverStop,
> {
    assignment: Assignment,
    store: NoGoodStore,
    heuristic: H,
    restarter: R,
    source: S,
    checker: C,
    stop: T,
    state: SearchState,
    stats: SearchStats,
}

impl<S: NoGoodSource> Solver<BerkMin, Luby<100>, S, TrustMbt, NeverStop> {
    /// A solver with the default heuristic, restart policy and stability check.
    pub fn new(source: S) -> Self {
        let max_atom_id = source.max_atom_id();
        Self::from_parts(
            source,
            BerkMin::new(max_atom_id),
            Luby::new(),
            TrustMbt,
            NeverStop,
        )
    }
}

impl<H, R, S, C, T> Solver<H, R, S, C, T>
where
    H: BranchingHeuristic,
    R: Restarter,
    S: NoGoodSource,
    C: StabilityChecker,
    T: StopCondition,
{
    /// Builds a solver and loads the source's initial nogoods.
    pub fn from_parts(source: S, heuristic: H, restarter: R, checker: C, stop: T) -> Self {
        let mut solver = Self {
            assignment: Assignment::new(source.max_atom_id()),
            store: NoGoodStore::new(),
            heuristic,
            restarter,
            source,
            checker,
            stop,
            state: SearchState::Propagate,
            stats: SearchStats::default(),
        };
        solver.grow_for_max_atom_id(solver.source.max_atom_id());

        let initial = solver.source.ground(&[]);
        solver.add_no_goods(initial);
        solver.stop.started();
        solver
    }

    #[must_use]
    pub const fn state(&self) -> SearchState {
        self.state
    }

    #[must_use]
    pub const fn assignment(&self) -> &Assignment {
        &self.assignment
    }

    #[must_use]
    pub const fn store(&self) -> &NoGoodStore {
        &self.store
    }

    #[must_use]
    pub const fn heuristic(&self) -> &H {
        &self.heuristic
    }

    #[must_use]
    pub fn decision_level(&self) -> DecisionLevel {
        self.assignment.decision_level()
    }

    #[must_use]
    pub fn stats(&self) -> SearchStats {
        SearchStats {
            propagations: self.store.num_propagations(),
            restarts: self.restarter.num_restarts(),
            learned_no_goods: self.store.num_learnt(),
            no_goods: self.store.len(),
            ..self.stats
        }
    }

    /// The true atoms of the current assignment, without the reserved atom `0`.
    #[must_use]
    pub fn answer_set(&self) -> AnswerSet {
        AnswerSet::new(self.assignment.true_assignments())
    }

    fn grow_for_max_atom_id(&mut self, max_atom_id: Atom) {
        self.assignment.grow_for_max_atom_id(max_atom_id);
        self.heuristic.grow_for_max_atom_id(max_atom_id);
    }

    /// Adds a nogood to the search and makes the next step propagate it.
    ///
    /// # Returns
    ///
    /// The id of the stored nogood, which is the id of an equal nogood if one was already
    /// present.
    pub fn add_no_good(&mut self, no_good: NoGood) -> NoGoodId {
        if let Some(max) = no_good.iter().map(|l| l.atom()).max() {
            self.grow_for_max_atom_id(max);
        }
        let (id, inserted) = self.store.add(no_good);
        if inserted {
            self.heuristic.new_no_good(&self.store[id]);
        }
        if matches!(
            self.state,
            SearchState::Decide | SearchState::Satisfied | SearchState::Stopped
        ) {
            self.state = SearchState::Propagate;
        }
        id
    }

    pub fn add_no_goods<I: IntoIterator<Item = NoGood>>(&mut self, no_goods: I) {
        for no_good in no_goods {
            self.add_no_good(no_good);
        }
    }

    /// Upgrades a must-be-true atom to true at the current decision level.
    ///
    /// Returns `false` if the atom is not must-be-true.
    pub fn confirm(&mut self, atom: Atom) -> bool {
        if self.assignment.truth(atom) != Some(ThriceTruth::MustBeTrue) {
            return false;
        }
        self.assignment.assign(atom, ThriceTruth::True, None);
        trace!(atom, level = self.decision_level(), "confirmed");
        if self.state == SearchState::Satisfied {
            self.state = SearchState::Propagate;
        }
        true
    }

    /// Forces an unassigned or must-be-true atom to false on a fresh decision level and
    /// re-enters propagation.
    ///
    /// Pending propagation is run to its fixpoint first, so the current level is complete
    /// before the new one opens.
    ///
    /// Returns `false`, opening no level, if that propagation ends in a conflict, the atom
    /// already has a definite value or the search is not between decisions.
    pub fn force_false(&mut self, atom: Atom) -> bool {
        if self.state == SearchState::Propagate {
            self.propagate();
        }
        let between_decisions = matches!(
            self.state,
            SearchState::Decide | SearchState::Satisfied | SearchState::Stopped
        );
        if !between_decisions
            || matches!(
                self.assignment.truth(atom),
                Some(ThriceTruth::True | ThriceTruth::False)
            )
        {
            return false;
        }

        self.assignment.new_decision_level();
        self.assignment.assign(atom, ThriceTruth::False, None);
        debug!(atom, level = self.decision_level(), "forced false");
        self.state = SearchState::Propagate;
        true
    }

    /// Performs one transition of the search and returns the new state.
    pub fn step(&mut self) -> SearchState {
        match self.state {
            SearchState::Propagate => self.propagate(),
            SearchState::Decide => self.decide(),
            SearchState::Conflict(id) => self.resolve_conflict(id),
            SearchState::Satisfied => self.check_candidate(),
            SearchState::Accepted => self.block_candidate(),
            SearchState::Stopped => self.state = SearchState::Decide,
            SearchState::Unsat => {}
        }
        self.state
    }

    /// Runs the search until the next answer set.
    ///
    /// # Returns
    ///
    /// `None` if there are no further answer sets or the stop condition fired; use
    /// [`state`](Self::state) to tell the two apart.
    pub fn next_answer_set(&mut self) -> Option<AnswerSet> {
        self.stop.started();
        if self.state == SearchState::Accepted {
            self.step();
        }
        loop {
            match self.step() {
                SearchState::Accepted => return Some(self.answer_set()),
                SearchState::Unsat | SearchState::Stopped => return None,
                _ => {}
            }
        }
    }

    /// Iterates over the remaining answer sets.
    pub fn answer_sets(&mut self) -> impl Iterator<Item = AnswerSet> + '_ {
        std::iter::from_fn(move || self.next_answer_set())
    }

    fn backtrack_to(&mut self, level: DecisionLevel) {
        self.assignment.backtrack_to(level);
        self.store.backtrack(&self.assignment);
    }

    fn propagate(&mut self) {
        loop {
            if let Some(violated) = self.store.propagate(&mut self.assignment) {
                self.state = SearchState::Conflict(violated);
                return;
            }

            let new_positive: Vec<Atom> = self.assignment.new_positive_assignments().collect();
            if new_positive.is_empty() {
                break;
            }

            let grounded = self.source.ground(&new_positive);
            if grounded.is_empty() {
                break;
            }
            trace!(count = grounded.len(), "new nogoods from grounding");
            self.grow_for_max_atom_id(self.source.max_atom_id());
            self.add_no_goods(grounded);
        }

        self.state = if self.assignment.is_total() {
            SearchState::Satisfied
        } else {
            SearchState::Decide
        };
    }

    fn decide(&mut self) {
        if self.stop.should_stop() {
            debug!("stop condition reached");
            self.state = SearchState::Stopped;
            return;
        }

        let mut literal = self.heuristic.choose_literal(&self.assignment);
        if literal == DEFAULT_CHOICE_LITERAL || self.assignment.is_assigned(literal.atom()) {
            let Some(atom) = self.assignment.first_unassigned() else {
                self.state = SearchState::Satisfied;
                return;
            };
            literal = Literal::positive(atom);
        }

        self.assignment.new_decision_level();
        self.assignment.assign(
            literal.atom(),
            ThriceTruth::from_bool(literal.is_positive()),
            None,
        );
        self.stats.decisions += 1;
        trace!(%literal, level = self.decision_level(), "decision");
        self.state = SearchState::Propagate;
    }

    fn resolve_conflict(&mut self, violated: NoGoodId) {
        self.stats.conflicts += 1;
        self.heuristic.violated_no_good(&self.store[violated]);

        match analyse_conflict(&self.assignment, &self.store, violated) {
            Conflict::Ground => {
                debug!(no_good = %self.store[violated], "conflict at decision level 0");
                self.state = SearchState::Unsat;
            }
            Conflict::Learned(analysis) => {
                self.learn(analysis);
                if self.restarter.should_restart() {
                    debug!(restarts = self.restarter.num_restarts(), "restart");
                    self.backtrack_to(0);
                }
                self.state = SearchState::Propagate;
            }
        }
    }

    fn learn(&mut self, analysis: ConflictAnalysisResult) {
        debug!(
            learned = %analysis.learned_no_good,
            conflict_level = analysis.conflict_level,
            backjump_level = analysis.backjump_level,
            "conflict analysed"
        );
        self.heuristic.analyzed_conflict(&analysis);
        self.heuristic.new_no_good(&analysis.learned_no_good);
        self.backtrack_to(analysis.backjump_level);
        self.store.add(analysis.learned_no_good);
    }

    fn check_candidate(&mut self) {
        match self.checker.check(&self.assignment) {
            Verdict::Confirm(atoms) => {
                let mut changed = false;
                for atom in atoms {
                    changed |= self.confirm(atom);
                }
                if changed {
                    self.state = SearchState::Propagate;
                    return;
                }
            }
            Verdict::Unfounded(atoms) => {
                debug!(?atoms, "candidate has unfounded atoms");
                self.reject_candidate();
                return;
            }
            Verdict::Stable => {}
        }

        if self.assignment.mbt_count() == 0 {
            self.stats.answer_sets += 1;
            debug!(answer_set = %self.answer_set(), "answer set found");
            self.state = SearchState::Accepted;
        } else {
            debug!(mbt = self.assignment.mbt_count(), "candidate keeps must-be-true atoms");
            self.reject_candidate();
        }
    }

    fn reject_candidate(&mut self) {
        self.stats.rejected_candidates += 1;
        self.block_candidate();
    }

    /// Adds the nogood over the current decision literals, so that the search moves on to
    /// the next candidate.
    fn block_candidate(&mut self) {
        let decisions = self.assignment.decision_literals();
        if decisions.is_empty() {
            debug!("no decisions left to flip");
            self.state = SearchState::Unsat;
            return;
        }
        let blocking = NoGood::new(decisions).with_type(NoGoodType::Internal);
        trace!(%blocking, "blocking candidate");
        self.add_no_good(blocking);
        self.state = SearchState::Propagate;
    }
}
