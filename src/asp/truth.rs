#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
use std::fmt::{Display, Formatter};

/// Three-valued truth of an assigned atom.
///
/// `MustBeTrue` is a provisional true: the atom was forced true by propagation but its
/// foundedness has not been confirmed yet. It can later be upgraded to `True` or be
/// overridden to `False`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ThriceTruth {
    True,
    False,
    MustBeTrue,
}

impl ThriceTruth {
    /// `true` for `True` and `MustBeTrue`.
    #[must_use]
    pub const fn to_bool(self) -> bool {
        !matches!(self, Self::False)
    }

    #[must_use]
    pub const fn is_mbt(self) -> bool {
        matches!(self, Self::MustBeTrue)
    }

    #[must_use]
    pub const fn from_bool(value: bool) -> Self {
        if value { Self::True } else { Self::False }
    }
}

impl Display for ThriceTruth {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::True => "T",
            Self::False => "F",
            Self::MustBeTrue => "M",
        };
        f.write_str(s)
    }
}
