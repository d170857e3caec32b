//! The evaluator value type.
//!
//! Expressions over a marking produce integers, exact reals, or
//! booleans. Numbers and booleans never coerce into each other; integer
//! arithmetic promotes to `Real` only when exactness demands it.

use crate::error::{EvalError, EvalErrorKind};
use crate::num::Num;
use std::fmt::{self, Display};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Int(i64),
    Real(Num),
    Bool(bool),
}

impl Value {
    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Real(_))
    }

    /// Numeric view of the value; booleans are a type mismatch.
    pub fn as_num(&self) -> Result<Num, EvalError> {
        match self {
            Value::Int(i) => Ok(Num::from_i64(*i)),
            Value::Real(n) => Ok(n.clone()),
            Value::Bool(_) => Err(EvalError::new(EvalErrorKind::TypeMismatch)
                .with_message("expected a number, found a boolean")),
        }
    }

    pub fn as_bool(&self) -> Result<bool, EvalError> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(EvalError::new(EvalErrorKind::TypeMismatch)
                .with_message(format!("expected a boolean, found {other}"))),
        }
    }

    /// Integer view: exact for `Int`, round-to-nearest for `Real`.
    pub fn as_i64_rounded(&self) -> Result<i64, EvalError> {
        use num_traits::ToPrimitive;
        match self {
            Value::Int(i) => Ok(*i),
            Value::Real(n) => n.round().to_i64().ok_or_else(|| {
                EvalError::new(EvalErrorKind::TypeMismatch)
                    .with_message("real value out of integer range")
            }),
            Value::Bool(_) => Err(EvalError::new(EvalErrorKind::TypeMismatch)
                .with_message("expected a number, found a boolean")),
        }
    }

    /// Collapse `Real` values that happen to be whole back to `Int`.
    pub fn normalized(self) -> Value {
        use num_traits::ToPrimitive;
        match self {
            Value::Real(n) if n.is_integer() => match n.as_ratio().numer().to_i64() {
                Some(i) => Value::Int(i),
                None => Value::Real(n),
            },
            other => other,
        }
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<Num> for Value {
    fn from(n: Num) -> Self {
        Value::Real(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{i}"),
            Value::Real(n) => write!(f, "{n}"),
            Value::Bool(b) => write!(f, "{b}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_views() {
        assert_eq!(Value::Int(3).as_num().unwrap(), Num::from_i64(3));
        assert_eq!(Value::Real(Num::ratio(5, 2)).as_i64_rounded().unwrap(), 3);
        assert!(Value::Bool(true).as_num().is_err());
        assert!(Value::Int(1).as_bool().is_err());
    }

    #[test]
    fn normalization() {
        assert_eq!(Value::Real(Num::from_i64(4)).normalized(), Value::Int(4));
        assert_eq!(
            Value::Real(Num::ratio(1, 2)).normalized(),
            Value::Real(Num::ratio(1, 2))
        );
    }
}
