pub mod absorption;
pub mod analysis;
pub mod chain;
pub mod dbm;
pub mod enumerator;
pub mod error;
pub mod expoly;
pub mod graph;
pub mod marking;
pub mod petri;
pub mod reduction;
pub mod state;
pub mod succession;

pub use absorption::AbsorptionProbs;
pub use analysis::{
    AnalysisConfig, GspnReachability, ModelIssue, TimedAnalysis, can_analyze_gspn,
    can_analyze_timed,
};
pub use chain::{ChainDefect, Ctmc, Dtmc, ROW_SUM_TOLERANCE};
pub use dbm::{Dbm, Var};
pub use enumerator::{
    AgeTruncation, Enumerator, GlobalStop, MarkingCondition, Monitor, NeverCancelled, NodeBound,
    Policy, PostProcessor, PreProcessor, StopCriterion,
};
pub use error::AnalysisError;
pub use expoly::{ExpolyTerm, Expolynomial};
pub use graph::{Edge, NodeId, SuccessionGraph};
pub use marking::Marking;
pub use petri::{
    Density, FeatureKind, MarkingBindings, Partition, PetriNet, Place, PlaceId, Stochastic,
    Transition, TransitionFeature, TransitionId,
};
pub use reduction::TangibleReduction;
pub use state::{HasMarking, Regeneration, TimedState};
pub use succession::{
    ClassGraphDisplay, EnabledTransitions, EventsBuilder, GspnSuccessorEvaluator, SpnGraph,
    SpnSuccession, SuccessorEvaluator, TimedSuccession, TimedSuccessorEvaluator, exit_rate,
};

// Re-export common types
pub use marcato_common::{EPSILON, EvalError, EvalErrorKind, Num, OmegaNum, Value};

#[cfg(test)]
mod tests;
