#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! A parser for ground nogood programs in a DIMACS-like text format.
//!
//! ```text
//! c a comment
//! p asp <max_atom> <nogood_count>
//! n 1 -2 0        plain nogood {+1, -2}
//! h -3 1 2 0      head-first nogood, the first literal is the (negative) head
//! s -3 1 0        support nogood: head-first, but the head is only derived must-be-true
//! %
//! ```
//!
//! Literals are signed atom ids, every nogood line ends with `0` and a `%` line ends the
//! data. The problem line is optional; without it the largest atom mentioned is the maximum.
//! A nogood count that disagrees with the number of nogoods read is only logged.

use crate::asp::error::{InputError, Result};
use crate::asp::grounding::StaticProgram;
use crate::asp::literal::{Atom, Literal, MAX_ATOM};
use crate::asp::nogood::{NoGood, NoGoodType};
use std::io::{self, BufRead};
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Plain,
    HeadFirst,
    Support,
}

fn parse_header(line: usize, parts: &[&str]) -> Result<(Atom, usize)> {
    match parts {
        ["p", "asp", max_atom, count] => {
            let max_atom = max_atom
                .parse::<Atom>()
                .ok()
                .filter(|&a| a <= MAX_ATOM)
                .ok_or(InputError::InvalidHeader { line })?;
            let count = count
                .parse::<usize>()
                .map_err(|_| InputError::InvalidHeader { line })?;
            Ok((max_atom, count))
        }
        _ => Err(InputError::InvalidHeader { line }),
    }
}

fn parse_literals(line: usize, tokens: &[&str], max_atom_id: Atom) -> Result<Vec<Literal>> {
    let mut literals = Vec::with_capacity(tokens.len());
    let mut terminated = false;

    for &token in tokens {
        if terminated {
            return Err(InputError::TrailingLiterals { line });
        }
        let value = token.parse::<i32>().map_err(|_| InputError::InvalidToken {
            line,
            token: token.to_string(),
        })?;
        if value == 0 {
            terminated = true;
            continue;
        }
        let atom = value.unsigned_abs();
        if atom > max_atom_id {
            return Err(InputError::AtomOutOfRange {
                line,
                atom,
                max_atom_id,
            });
        }
        literals.push(Literal::from_i32(value));
    }

    if terminated {
        Ok(literals)
    } else {
        Err(InputError::MissingTerminator { line })
    }
}

fn build_no_good(line: usize, kind: Kind, literals: Vec<Literal>) -> Result<NoGood> {
    if kind == Kind::Plain {
        return Ok(NoGood::new(literals));
    }
    let Some(&head) = literals.first() else {
        return Err(InputError::EmptyHeadFirst { line });
    };
    if head.is_positive() {
        return Err(InputError::PositiveHead {
            line,
            literal: head.to_i32(),
        });
    }
    let no_good = NoGood::head_first(literals);
    Ok(match kind {
        Kind::Support => no_good.with_type(NoGoodType::Support),
        _ => no_good,
    })
}

/// Parses a ground nogood program from `reader`.
///
/// # Errors
///
/// [`InputError`] for I/O failures and for any malformed line, including positive heads of
/// head-first nogoods and atoms above the declared maximum.
pub fn parse_program<R: BufRead>(reader: R) -> Result<StaticProgram> {
    let mut declared: Option<(Atom, usize)> = None;
    let mut no_goods = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line_number = index + 1;
        let line = line?;
        let parts: Vec<&str> = line.split_whitespace().collect();
        let max_atom_id = declared.map_or(MAX_ATOM, |(max, _)| max);

        let kind = match parts.first() {
            Some(&"%") => break,
            None | Some(&"c") => continue,
            Some(&"p") => {
                declared = Some(parse_header(line_number, &parts)?);
                continue;
            }
            Some(&"n") => Kind::Plain,
            Some(&"h") => Kind::HeadFirst,
            Some(&"s") => Kind::Support,
            Some(other) => {
                return Err(InputError::UnknownLineKind {
                    line: line_number,
                    kind: (*other).to_string(),
                });
            }
        };

        let literals = parse_literals(line_number, &parts[1..], max_atom_id)?;
        no_goods.push(build_no_good(line_number, kind, literals)?);
    }

    match declared {
        Some((max_atom_id, count)) => {
            if count != no_goods.len() {
                warn!(
                    declared = count,
                    found = no_goods.len(),
                    "nogood count in problem line does not match"
                );
            }
            Ok(StaticProgram::with_max_atom_id(no_goods, max_atom_id))
        }
        None => Ok(StaticProgram::new(no_goods)),
    }
}

/// Parses a program from a string.
///
/// # Errors
///
/// See [`parse_program`].
pub fn parse_str(text: &str) -> Result<StaticProgram> {
    parse_program(io::Cursor::new(text))
}

/// Opens and parses the program at `path`.
///
/// # Errors
///
/// See [`parse_program`].
pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<StaticProgram> {
    let file = std::fs::File::open(path)?;
    parse_program(io::BufReader::new(file))
}
