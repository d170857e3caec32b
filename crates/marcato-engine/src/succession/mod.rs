//! Successor evaluation: given a state and a fired transition, produce
//! the successor class or reject the firing.

mod gspn;
mod timed;

pub use gspn::{GspnSuccessorEvaluator, SpnGraph, SpnSuccession, exit_rate};
pub use timed::{ClassGraphDisplay, TimedSuccession, TimedSuccessorEvaluator};

use crate::error::AnalysisError;
use crate::petri::{PetriNet, TransitionId};
use crate::state::HasMarking;
use std::hash::Hash;

/// Produces the candidate events to try from a state.
pub trait EventsBuilder<S> {
    fn events(&self, net: &PetriNet, state: &S) -> Result<Vec<TransitionId>, AnalysisError>;
}

/// The default events builder: the transitions enabled by the state's
/// marking, in declaration order.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnabledTransitions;

impl<S: HasMarking> EventsBuilder<S> for EnabledTransitions {
    fn events(&self, net: &PetriNet, state: &S) -> Result<Vec<TransitionId>, AnalysisError> {
        net.enabled(state.marking())
    }
}

/// Computes the successor of a state under a fired transition.
///
/// `Ok(None)` is a rejection: the firing cannot happen from this class
/// (priority loss, empty conditioning, zero probability). Errors are
/// reserved for inconsistent models.
pub trait SuccessorEvaluator {
    type State: Clone + Eq + Hash;
    type Succession;

    fn successor(
        &self,
        net: &PetriNet,
        state: &Self::State,
        event: TransitionId,
    ) -> Result<Option<(Self::State, Self::Succession)>, AnalysisError>;
}
