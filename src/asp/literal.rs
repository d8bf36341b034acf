#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! Packing of (atom, polarity) pairs into a single signed integer.
//!
//! A literal stores its atom in the upper bits and a "negated" flag in the lowest bit,
//! so that negation, polarity and atom extraction are pure bit arithmetic:
//!
//! * `atom(l)      == l >> 1`
//! * `is_negated(l) == l & 1 == 1`
//! * `negated(l)   == l ^ 1`
//!
//! Sorting literals by their raw value therefore groups both polarities of an atom
//! next to each other, positive first.

use core::ops::{Neg, Not};
use std::fmt::{Display, Formatter};

/// Identifier of a ground propositional atom. Atom `0` is reserved.
pub type Atom = u32;

/// The largest atom id a literal can encode.
pub const MAX_ATOM: Atom = (i32::MAX >> 1) as Atom;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Literal(i32);

/// The literal `(0, positive)`, returned by heuristics that have no informed choice.
pub const DEFAULT_CHOICE_LITERAL: Literal = Literal(0);

impl Literal {
    /// # Panics
    ///
    /// If `atom` is larger than [`MAX_ATOM`].
    #[must_use]
    pub fn new(atom: Atom, polarity: bool) -> Self {
        assert!(atom <= MAX_ATOM, "atom {atom} cannot be encoded as a literal");
        let atom = i32::try_from(atom).unwrap_or(i32::MAX) << 1;
        if polarity { Self(atom) } else { Self(atom | 1) }
    }

    #[must_use]
    pub fn positive(atom: Atom) -> Self {
        Self::new(atom, true)
    }

    #[must_use]
    pub fn negative(atom: Atom) -> Self {
        Self::new(atom, false)
    }

    #[must_use]
    pub const fn atom(self) -> Atom {
        (self.0 >> 1) as Atom
    }

    #[must_use]
    pub const fn is_negated(self) -> bool {
        self.0 & 1 == 1
    }

    #[must_use]
    pub const fn is_positive(self) -> bool {
        !self.is_negated()
    }

    /// The polarity as a truth value: `true` for positive literals.
    #[must_use]
    pub const fn polarity(self) -> bool {
        self.is_positive()
    }

    #[must_use]
    pub const fn negated(self) -> Self {
        Self(self.0 ^ 1)
    }

    /// The positive literal of the same atom.
    #[must_use]
    pub const fn positive_literal(self) -> Self {
        Self(self.0 & !1)
    }

    #[must_use]
    pub const fn raw(self) -> i32 {
        self.0
    }

    #[must_use]
    pub const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    /// Converts from the signed form used by the text format, e.g. `3` or `-3`.
    ///
    /// # Panics
    ///
    /// If `value` is zero, since atom `0` is never written in the text format.
    #[must_use]
    pub fn from_i32(value: i32) -> Self {
        assert_ne!(value, 0, "0 is a terminator, not a literal");
        Self::new(value.unsigned_abs(), value.is_positive())
    }

    /// Converts to the signed form used by the text format.
    #[must_use]
    pub fn to_i32(self) -> i32 {
        let atom = i32::try_from(self.atom()).unwrap_or(i32::MAX);
        if self.is_negated() { -atom } else { atom }
    }
}

/// Atom of a literal, as a free function for call sites that work on raw encodings.
#[must_use]
pub const fn atom_of(literal: Literal) -> Atom {
    literal.atom()
}

#[must_use]
pub const fn negate(literal: Literal) -> Literal {
    literal.negated()
}

impl Neg for Literal {
    type Output = Self;

    fn neg(self) -> Self::Output {
        self.negated()
    }
}

impl Not for Literal {
    type Output = Self;

    fn not(self) -> Self::Output {
        self.negated()
    }
}

impl Neg for &Literal {
    type Output = Literal;

    fn neg(self) -> Self::Output {
        self.negated()
    }
}

impl Not for &Literal {
    type Output = Literal;

    fn not(self) -> Self::Output {
        self.negated()
    }
}

impl Display for Literal {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let sign = if self.is_negated() { '-' } else { '+' };
        write!(f, "{sign}{}", self.atom())
    }
}
