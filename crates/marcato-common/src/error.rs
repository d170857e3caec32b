//! Expression-evaluation errors: a kind plus an optional human message.
//!
//! - **`EvalErrorKind`**: the closed set of ways a guard/weight/rate
//!   expression can fail against a marking
//! - **`EvalError`**: the struct the evaluator passes around
//!
//! New failure modes get a new kind; existing code does not break.

use std::{error::Error, fmt};

/// The ways expression evaluation can fail.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum EvalErrorKind {
    /// Division by a value that is exactly zero (integers) or within the
    /// global tolerance of zero (reals).
    DivisionByZero,
    /// A variable or function name with no binding.
    UndefinedSymbol,
    /// Numeric and boolean values mixed where one kind was required.
    TypeMismatch,
    /// An assignment form reached bindings that cannot be written.
    ReadOnlyBindings,
}

impl fmt::Display for EvalErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::DivisionByZero => "division by zero",
            Self::UndefinedSymbol => "undefined symbol",
            Self::TypeMismatch => "type mismatch",
            Self::ReadOnlyBindings => "read-only bindings",
        })
    }
}

/// The single error value the expression layer passes around.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EvalError {
    pub kind: EvalErrorKind,
    pub message: Option<String>,
}

impl EvalError {
    pub fn new(kind: EvalErrorKind) -> Self {
        Self { kind, message: None }
    }

    /// Attach a human-readable explanation.
    pub fn with_message<S: Into<String>>(mut self, msg: S) -> Self {
        self.message = Some(msg.into());
        self
    }
}

impl From<EvalErrorKind> for EvalError {
    fn from(kind: EvalErrorKind) -> Self {
        Self::new(kind)
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(ref msg) = self.message {
            write!(f, ": {msg}")?;
        }
        Ok(())
    }
}

impl Error for EvalError {}
