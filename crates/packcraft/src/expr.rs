//! Offset and size expressions of a layout plan.
//!
//! An [Expr] is a folded constant plus an ordered list of dynamic [Term]s. Fixed
//! sizes collapse into the constant, so fully static layouts carry no terms.

use std::fmt;

use crate::{
    capability::{PositionFn, SizeFn},
    errors::ReadError,
};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Expr {
    constant: usize,
    terms: Vec<Term>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Term {
    /// Size of an earlier field, produced by its size function.
    SizeOf { field: String, function: SizeFn },
    /// A position function applied to the buffer and the sequential default.
    Position { function: PositionFn, default: Box<Expr> },
    /// Bytes left in the buffer after `from`.
    Remaining { from: Box<Expr> },
}

impl Expr {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn literal(value: usize) -> Self {
        Self {
            constant: value,
            terms: Vec::new(),
        }
    }

    pub fn term(term: Term) -> Self {
        Self {
            constant: 0,
            terms: vec![term],
        }
    }

    pub fn constant(&self) -> usize {
        self.constant
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    pub fn is_static(&self) -> bool {
        self.terms.is_empty()
    }

    /// Value of the expression when it does not depend on the buffer.
    pub fn as_static(&self) -> Option<usize> {
        self.is_static().then_some(self.constant)
    }

    pub fn plus_constant(mut self, value: usize) -> Self {
        self.constant += value;
        self
    }

    pub fn plus(mut self, other: &Expr) -> Self {
        self.constant += other.constant;
        self.terms.extend(other.terms.iter().cloned());
        self
    }

    /// Evaluates the expression against a concrete buffer.
    pub fn eval(&self, data: &[u8]) -> Result<usize, ReadError> {
        self.terms.iter().try_fold(self.constant, |acc, term| {
            let value = term.eval(data)?;
            acc.checked_add(value).ok_or(ReadError::OutOfBounds {
                start: acc,
                end: usize::MAX,
                len: data.len(),
            })
        })
    }
}

impl Term {
    pub fn eval(&self, data: &[u8]) -> Result<usize, ReadError> {
        match self {
            Term::SizeOf { function, .. } => Ok(function.call(data)),
            Term::Position { function, default } => Ok(function.call(data, default.eval(data)?)),
            Term::Remaining { from } => {
                let from = from.eval(data)?;
                data.len().checked_sub(from).ok_or(ReadError::OutOfBounds {
                    start: from,
                    end: from,
                    len: data.len(),
                })
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.terms.is_empty() {
            return write!(f, "{}", self.constant);
        }

        let mut first = true;
        if self.constant != 0 {
            write!(f, "{}", self.constant)?;
            first = false;
        }
        for term in &self.terms {
            if !first {
                f.write_str(" + ")?;
            }
            write!(f, "{term}")?;
            first = false;
        }
        Ok(())
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::SizeOf { function, .. } => write!(f, "{function}(buf)"),
            Term::Position { function, default } => write!(f, "{function}(buf, {default})"),
            Term::Remaining { from } => write!(f, "len(buf) - ({from})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> SizeFn {
        SizeFn::new("options_size", |data: &[u8]| {
            ((data[0] & 0x0F) as usize * 4).saturating_sub(20)
        })
    }

    #[test]
    fn test_static_folding() {
        let expr = Expr::zero().plus_constant(1).plus(&Expr::literal(2));
        assert_eq!(expr.as_static(), Some(3));
        assert_eq!(expr.to_string(), "3");
    }

    #[test]
    fn test_dynamic_terms() {
        let expr = Expr::literal(20).plus(&Expr::term(Term::SizeOf {
            field: "Options".to_string(),
            function: options(),
        }));

        let mut packet = vec![0u8; 28];
        packet[0] = 0x46;

        assert!(!expr.is_static());
        assert_eq!(expr.as_static(), None);
        assert_eq!(expr.eval(&packet).unwrap(), 24);
        assert_eq!(expr.to_string(), "20 + options_size(buf)");
    }

    #[test]
    fn test_position_receives_default() {
        let function = PositionFn::new("after_padding", |_: &[u8], default| default + 2);
        let expr = Expr::term(Term::Position {
            function,
            default: Box::new(Expr::literal(6)),
        });

        assert_eq!(expr.eval(&[]).unwrap(), 8);
        assert_eq!(expr.to_string(), "after_padding(buf, 6)");
    }

    #[test]
    fn test_remaining() {
        let expr = Expr::term(Term::Remaining {
            from: Box::new(Expr::literal(8)),
        });

        assert_eq!(expr.eval(&[0; 12]).unwrap(), 4);
        assert_eq!(expr.eval(&[0; 8]).unwrap(), 0);
        assert!(expr.eval(&[0; 4]).is_err());
        assert_eq!(expr.to_string(), "len(buf) - (8)");
    }
}
