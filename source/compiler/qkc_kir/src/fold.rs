// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Constant folding for the arithmetic the builder emits. Folding keeps values that are known at
//! compile time as literals, so callers can treat every value uniformly as an [`Operand`].


use crate::kir::{Literal, Operand};
use thiserror::Error;

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("constant arithmetic overflowed")]
pub struct Overflow;

/// Folds `lhs + rhs` when both sides are literals of the same type, or when either side is a
/// literal zero. Returns `None` when the addition must be emitted.
#[must_use]
pub fn add(lhs: Operand, rhs: Operand) -> Option<Result<Operand, Overflow>> {
    match (lhs, rhs) {
        (Operand::Literal(Literal::Index(a)), Operand::Literal(Literal::Index(b))) => Some(
            a.checked_add(b)
                .map(|sum| Literal::Index(sum).into())
                .ok_or(Overflow),
        ),
        (Operand::Literal(Literal::Integer(a)), Operand::Literal(Literal::Integer(b))) => Some(
            a.checked_add(b)
                .map(|sum| Literal::Integer(sum).into())
                .ok_or(Overflow),
        ),
        (Operand::Literal(Literal::Index(0) | Literal::Integer(0)), other)
        | (other, Operand::Literal(Literal::Index(0) | Literal::Integer(0)))
            if other.get_type() == lhs.get_type() && other.get_type() == rhs.get_type() =>
        {
            Some(Ok(other))
        }
        _ => None,
    }
}

/// Folds an index to integer conversion of a literal. Indices beyond `i64::MAX` do not fit the
/// allocation width and report an overflow.
#[must_use]
pub fn index_cast(operand: Operand) -> Option<Result<Operand, Overflow>> {
    match operand {
        Operand::Literal(Literal::Index(value)) => Some(
            i64::try_from(value)
                .map(|value| Literal::Integer(value).into())
                .map_err(|_| Overflow),
        ),
        _ => None,
    }
}
