#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! Nogoods: sets of literals that must never hold all at the same time.
//!
//! A nogood is built once and never mutated. Construction canonicalizes it: every literal
//! except a distinguished head is sorted ascending and deduplicated, so structurally equal
//! nogoods compare equal regardless of the input order, and propagation can rely on a fixed
//! sorted slice.
//!
//! A *head-first* nogood keeps its head at index 0. The head must be negative: a head-first
//! nogood `{-h, b1, .., bn}` is violated exactly when the body holds and `h` is false, so it
//! expresses the rule "body implies h" and drives propagation from bodies to heads.

use crate::asp::literal::Literal;
use itertools::Itertools;
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};
use std::ops::Index;

/// Index of the head literal in a head-first nogood.
pub const HEAD: usize = 0;

/// Position of a nogood in the [`NoGoodStore`](crate::asp::propagation::NoGoodStore).
pub type NoGoodId = usize;

/// Where a nogood came from. Only affects how strongly it propagates; it takes no part in
/// equality, ordering or hashing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum NoGoodType {
    /// Produced by grounding a rule body or a constraint. A head-first static nogood whose
    /// body holds strongly derives its head as `True`.
    #[default]
    Static,
    /// Rule support; only ever derives `MustBeTrue`.
    Support,
    /// Learned by conflict analysis.
    Learnt,
    /// Created by the search itself, e.g. to block an enumerated answer set.
    Internal,
}

#[derive(Debug, Clone)]
pub struct NoGood {
    literals: SmallVec<[Literal; 6]>,
    head: bool,
    kind: NoGoodType,
}

impl NoGood {
    /// The empty nogood, violated by every assignment.
    pub const UNSAT: Self = Self {
        literals: SmallVec::new_const(),
        head: false,
        kind: NoGoodType::Internal,
    };

    /// A plain nogood over `literals`.
    pub fn new<I: IntoIterator<Item = Literal>>(literals: I) -> Self {
        Self::build(literals.into_iter().collect(), false, NoGoodType::Static)
    }

    /// A head-first nogood whose first literal is the head.
    ///
    /// # Panics
    ///
    /// If `literals` is empty or its first literal is not negative. Both indicate a bug in
    /// whoever produced the nogood.
    pub fn head_first<I: IntoIterator<Item = Literal>>(literals: I) -> Self {
        Self::build(literals.into_iter().collect(), true, NoGoodType::Static)
    }

    /// `literal` must hold; it is given in its negative (nogood) form, e.g. `-a` for fact `a`.
    #[must_use]
    pub fn fact(literal: Literal) -> Self {
        Self::head_first([literal])
    }

    /// The body literal implies the head; propagates the head only as must-be-true.
    ///
    /// Both arguments are taken in nogood form, as they appear in the nogood: `-h` for head
    /// `h` and `+b` for a body `b`. Neither is negated here.
    #[must_use]
    pub fn support(head_literal: Literal, body_literal: Literal) -> Self {
        Self::head_first([head_literal, body_literal]).with_type(NoGoodType::Support)
    }

    /// A constraint forbidding that all `pos` literals hold and all `neg` literals fail.
    #[must_use]
    pub fn from_constraint(pos: &[Literal], neg: &[Literal]) -> Self {
        Self::new(pos.iter().copied().chain(neg.iter().map(|l| l.negated())))
    }

    /// The nogood tying a rule body to the literal that represents it: whenever every `pos`
    /// literal holds and every `neg` literal fails, the body literal must hold.
    #[must_use]
    pub fn from_body(pos: &[Literal], neg: &[Literal], body_representing_literal: Literal) -> Self {
        let literals = std::iter::once(body_representing_literal.negated())
            .chain(pos.iter().copied())
            .chain(neg.iter().map(|l| l.negated()));
        Self::head_first(literals)
    }

    /// A learned nogood. It is head-first, with the asserting literal as head, when the
    /// asserting literal is negative, and plain otherwise.
    pub fn learnt<I: IntoIterator<Item = Literal>>(asserting: Literal, rest: I) -> Self {
        let literals: SmallVec<[Literal; 6]> =
            std::iter::once(asserting).chain(rest).collect();
        Self::build(literals, asserting.is_negated(), NoGoodType::Learnt)
    }

    fn build(mut literals: SmallVec<[Literal; 6]>, head: bool, kind: NoGoodType) -> Self {
        if head {
            assert!(!literals.is_empty(), "head-first nogood without literals");
            assert!(literals[HEAD].is_negated(), "head is not negative");
            let head_literal = literals[HEAD];
            let mut body: SmallVec<[Literal; 6]> = literals.drain(1..).collect();
            body.retain(|l| *l != head_literal);
            body.sort_unstable();
            body.dedup();
            literals.extend(body);
        } else {
            literals.sort_unstable();
            literals.dedup();
        }

        debug_assert!(
            literals[usize::from(head)..]
                .iter()
                .tuple_windows()
                .all(|(a, b)| a < b),
            "nogood body not canonical"
        );

        Self {
            literals,
            head,
            kind,
        }
    }

    #[must_use]
    pub const fn with_type(mut self, kind: NoGoodType) -> Self {
        self.kind = kind;
        self
    }

    #[must_use]
    pub const fn kind(&self) -> NoGoodType {
        self.kind
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.literals.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.literals.is_empty()
    }

    #[must_use]
    pub fn literal(&self, index: usize) -> Literal {
        self.literals[index]
    }

    /// Shorthand for the positive literal of the atom at `index`.
    #[must_use]
    pub fn positive_literal(&self, index: usize) -> Literal {
        self.literals[index].positive_literal()
    }

    #[must_use]
    pub const fn has_head(&self) -> bool {
        self.head
    }

    #[must_use]
    pub fn head(&self) -> Option<Literal> {
        if self.head {
            Some(self.literals[HEAD])
        } else {
            None
        }
    }

    /// Every literal except the head.
    #[must_use]
    pub fn body(&self) -> &[Literal] {
        &self.literals[usize::from(self.head)..]
    }

    /// A plain copy of this nogood.
    #[must_use]
    pub fn without_head(&self) -> Self {
        Self::build(self.literals.clone(), false, self.kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Literal> {
        self.literals.iter()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Literal] {
        &self.literals
    }
}

impl Index<usize> for NoGood {
    type Output = Literal;

    fn index(&self, index: usize) -> &Self::Output {
        &self.literals[index]
    }
}

impl<'a> IntoIterator for &'a NoGood {
    type Item = &'a Literal;
    type IntoIter = std::slice::Iter<'a, Literal>;

    fn into_iter(self) -> Self::IntoIter {
        self.literals.iter()
    }
}

impl PartialEq for NoGood {
    fn eq(&self, other: &Self) -> bool {
        self.head == other.head && self.literals == other.literals
    }
}

impl Eq for NoGood {}

impl Hash for NoGood {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.head.hash(state);
        self.literals.hash(state);
    }
}

impl Ord for NoGood {
    /// Head-first nogoods come first, then shorter ones; equal lengths are compared
    /// position by position, the larger literal ordering first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .head
            .cmp(&self.head)
            .then_with(|| self.len().cmp(&other.len()))
            .then_with(|| {
                self.literals
                    .iter()
                    .zip(other.literals.iter())
                    .map(|(a, b)| b.cmp(a))
                    .find(|o| o.is_ne())
                    .unwrap_or(Ordering::Equal)
            })
    }
}

impl PartialOrd for NoGood {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for NoGood {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.head {
            f.write_str("*")?;
        }
        write!(f, "{{ ")?;
        for literal in &self.literals {
            write!(f, "{literal} ")?;
        }
        write!(f, "}}")
    }
}
