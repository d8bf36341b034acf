#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! Recoverable errors of the input layer.

use crate::asp::literal::Atom;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InputError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A `p` line that is not `p asp <max_atom> <nogood_count>`.
    #[error("line {line}: malformed problem line")]
    InvalidHeader { line: usize },

    #[error("line {line}: unknown line kind '{kind}'")]
    UnknownLineKind { line: usize, kind: String },

    #[error("line {line}: '{token}' is not a literal")]
    InvalidToken { line: usize, token: String },

    #[error("line {line}: nogood is not terminated by 0")]
    MissingTerminator { line: usize },

    #[error("line {line}: literal after the terminating 0")]
    TrailingLiterals { line: usize },

    /// Head-first nogoods need a negative first literal.
    #[error("line {line}: head {literal} of a head-first nogood must be negative")]
    PositiveHead { line: usize, literal: i32 },

    #[error("line {line}: head-first nogood without literals")]
    EmptyHeadFirst { line: usize },

    #[error("line {line}: atom {atom} exceeds the declared maximum {max_atom_id}")]
    AtomOutOfRange {
        line: usize,
        atom: Atom,
        max_atom_id: Atom,
    },
}

pub type Result<T> = std::result::Result<T, InputError>;
