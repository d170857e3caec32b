//! Symbolic state classes.

use crate::dbm::Dbm;
use crate::marking::Marking;
use crate::petri::TransitionId;
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Marker that every general timer was freshly enabled when this class
/// was created, so the future is independent of the past. The tag
/// carries the marking of the regeneration epoch.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Regeneration(pub Marking);

/// A timed state class: a marking together with the clock zone of its
/// enabled transitions.
///
/// Node identity is `(marking, zone, regeneration)`. The enabled set is
/// derived from the marking and the newly-enabled set is construction
/// bookkeeping; neither participates in equality or hashing.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone)]
pub struct TimedState {
    pub marking: Marking,
    pub enabled: BTreeSet<TransitionId>,
    pub newly_enabled: BTreeSet<TransitionId>,
    pub zone: Dbm,
    pub regeneration: Option<Regeneration>,
}

impl PartialEq for TimedState {
    fn eq(&self, other: &Self) -> bool {
        self.marking == other.marking
            && self.zone == other.zone
            && self.regeneration == other.regeneration
    }
}

impl Eq for TimedState {}

impl Hash for TimedState {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.marking.hash(state);
        self.zone.hash(state);
        self.regeneration.hash(state);
    }
}

/// Access to the marking of a state, for marking-driven stop criteria
/// and the default enabled-events builder.
pub trait HasMarking {
    fn marking(&self) -> &Marking;
}

impl HasMarking for TimedState {
    fn marking(&self) -> &Marking {
        &self.marking
    }
}

impl HasMarking for Marking {
    fn marking(&self) -> &Marking {
        self
    }
}
