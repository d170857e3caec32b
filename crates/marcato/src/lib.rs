//! Meta crate that re-exports the marcato building blocks. Downstream
//! users can depend on this crate and opt into layers via feature flags
//! while keeping access to the underlying crates when deeper
//! integration is required.

#[cfg(feature = "common")]
pub use marcato_common as common;

#[cfg(feature = "expr")]
pub use marcato_expr as expr;

#[cfg(feature = "engine")]
pub use marcato_engine as engine;

#[cfg(feature = "common")]
pub use marcato_common::{EvalError, EvalErrorKind, Num, OmegaNum, Value};

#[cfg(feature = "expr")]
pub use marcato_expr::{Bindings, Evaluator, Expr, parse, parse_updates};

#[cfg(feature = "engine")]
pub use marcato_engine::{
    AnalysisConfig, AnalysisError, Ctmc, Dbm, Dtmc, GspnReachability, Marking, PetriNet,
    Stochastic, SuccessionGraph, TangibleReduction, TimedAnalysis, TransitionFeature,
};
