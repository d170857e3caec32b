//! Engine-level errors.
//!
//! A transition firing that merely cannot happen is a rejection, not an
//! error: successor evaluators return `Ok(None)` for it. The variants
//! here are the fatal cases where the model or an intermediate structure
//! is inconsistent.

use marcato_common::EvalError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    /// A state class carries a contradictory (empty) clock zone.
    #[error("empty zone after conditioning in state {state}")]
    EmptyZone { state: String },

    /// A vanishing cycle with no tangible exit.
    #[error("timelock detected: vanishing states {states} admit no tangible exit")]
    Timelock { states: String },

    /// A transition carries a feature set the requested analysis cannot
    /// handle; the message lists the validation issues.
    #[error("unsupported model: {0}")]
    Unsupported(String),

    /// A firing would drive a place below zero tokens.
    #[error("negative token count on place '{place}' while firing '{transition}'")]
    NegativeTokens { place: String, transition: String },

    /// `(I − Q)` was singular; the embedded chain is malformed.
    #[error("singular linear system in absorption-probability computation")]
    SingularSystem,

    /// An expression failed to evaluate against a marking.
    #[error("evaluation failed in {context}: {source}")]
    Eval {
        #[source]
        source: EvalError,
        context: String,
    },
}

impl AnalysisError {
    /// Wrap an expression error with the state/operation it occurred in.
    pub fn eval(source: EvalError, context: impl Into<String>) -> Self {
        AnalysisError::Eval { source, context: context.into() }
    }
}
