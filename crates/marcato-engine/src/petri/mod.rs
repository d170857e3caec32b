//! The Petri net model: places, transitions, arcs, and firing.
//!
//! Places and transitions live in arenas and are addressed by ids; all
//! arc tables key on ids, never on references. Names are interned on
//! insertion and resolved back only for display and guard bindings.

mod features;

pub use features::{Density, FeatureKind, Partition, Stochastic, TransitionFeature};

use crate::error::AnalysisError;
use crate::marking::Marking;
use marcato_common::{Num, OmegaNum, Value};
use marcato_expr::{Bindings, Evaluator, Expr, Update};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::fmt::{self, Display};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PlaceId(u32);

impl PlaceId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl Display for PlaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransitionId(u32);

impl TransitionId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl Display for TransitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Place {
    name: String,
}

impl Place {
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone)]
pub struct Transition {
    name: String,
    features: SmallVec<[TransitionFeature; 4]>,
}

impl Transition {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn features(&self) -> &[TransitionFeature] {
        &self.features
    }

    /// Insert a feature, replacing any existing feature of the same
    /// kind.
    pub fn add_feature(&mut self, feature: TransitionFeature) {
        self.features.retain(|f| f.kind() != feature.kind());
        self.features.push(feature);
    }

    pub fn remove_feature(&mut self, kind: FeatureKind) {
        self.features.retain(|f| f.kind() != kind);
    }

    pub fn feature(&self, kind: FeatureKind) -> Option<&TransitionFeature> {
        self.features.iter().find(|f| f.kind() == kind)
    }

    pub fn stochastic(&self) -> Option<&Stochastic> {
        match self.feature(FeatureKind::Stochastic) {
            Some(TransitionFeature::Stochastic(s)) => Some(s),
            _ => None,
        }
    }

    pub fn priority(&self) -> Option<i32> {
        match self.feature(FeatureKind::Priority) {
            Some(TransitionFeature::Priority(p)) => Some(*p),
            _ => None,
        }
    }

    /// Priority as a totally ordered rank; absence ranks below every
    /// explicit priority.
    pub fn priority_rank(&self) -> i64 {
        self.priority().map(|p| p as i64).unwrap_or(i64::MIN)
    }

    pub fn enabling_function(&self) -> Option<&Expr> {
        match self.feature(FeatureKind::EnablingFunction) {
            Some(TransitionFeature::EnablingFunction(e)) => Some(e),
            _ => None,
        }
    }

    pub fn post_updater(&self) -> Option<&[Update]> {
        match self.feature(FeatureKind::PostUpdater) {
            Some(TransitionFeature::PostUpdater(u)) => Some(u),
            _ => None,
        }
    }

    /// Static firing-time bounds: the explicit `Timed` feature when
    /// present, the density support otherwise.
    pub fn firing_bounds(&self) -> Option<(Num, OmegaNum)> {
        if let Some(TransitionFeature::Timed { eft, lft }) = self.feature(FeatureKind::Timed) {
            return Some((eft.clone(), lft.clone()));
        }
        self.stochastic().map(|s| s.density.support())
    }
}

/// An arc list per transition; most transitions touch few places.
type ArcList = SmallVec<[(PlaceId, u32); 4]>;

#[derive(Debug, Clone, Default)]
pub struct PetriNet {
    places: Vec<Option<Place>>,
    transitions: Vec<Option<Transition>>,
    place_index: FxHashMap<String, PlaceId>,
    transition_index: FxHashMap<String, TransitionId>,
    pre: Vec<ArcList>,
    post: Vec<ArcList>,
    inhibitors: Vec<ArcList>,
}

impl PetriNet {
    pub fn new() -> Self {
        PetriNet::default()
    }

    /* ===================  structure  =================== */

    /// Add a place, or return the existing id for the name.
    pub fn add_place(&mut self, name: &str) -> PlaceId {
        if let Some(&id) = self.place_index.get(name) {
            return id;
        }
        let id = PlaceId(self.places.len() as u32);
        self.places.push(Some(Place { name: name.to_string() }));
        self.place_index.insert(name.to_string(), id);
        id
    }

    /// Add a transition, or return the existing id for the name.
    pub fn add_transition(&mut self, name: &str) -> TransitionId {
        if let Some(&id) = self.transition_index.get(name) {
            return id;
        }
        let id = TransitionId(self.transitions.len() as u32);
        self.transitions
            .push(Some(Transition { name: name.to_string(), features: SmallVec::new() }));
        self.pre.push(ArcList::new());
        self.post.push(ArcList::new());
        self.inhibitors.push(ArcList::new());
        self.transition_index.insert(name.to_string(), id);
        id
    }

    /// Remove a place and every arc touching it. The id is never
    /// reused.
    pub fn remove_place(&mut self, id: PlaceId) {
        if let Some(place) = self.places.get_mut(id.index()).and_then(Option::take) {
            self.place_index.remove(place.name());
            for arcs in
                self.pre.iter_mut().chain(self.post.iter_mut()).chain(self.inhibitors.iter_mut())
            {
                arcs.retain(|(p, _)| *p != id);
            }
        }
    }

    /// Remove a transition and its arcs. The id is never reused.
    pub fn remove_transition(&mut self, id: TransitionId) {
        if let Some(t) = self.transitions.get_mut(id.index()).and_then(Option::take) {
            self.transition_index.remove(t.name());
            self.pre[id.index()].clear();
            self.post[id.index()].clear();
            self.inhibitors[id.index()].clear();
        }
    }

    pub fn place(&self, id: PlaceId) -> Option<&Place> {
        self.places.get(id.index()).and_then(Option::as_ref)
    }

    pub fn transition(&self, id: TransitionId) -> Option<&Transition> {
        self.transitions.get(id.index()).and_then(Option::as_ref)
    }

    pub fn transition_mut(&mut self, id: TransitionId) -> Option<&mut Transition> {
        self.transitions.get_mut(id.index()).and_then(Option::as_mut)
    }

    pub fn find_place(&self, name: &str) -> Option<PlaceId> {
        self.place_index.get(name).copied()
    }

    pub fn find_transition(&self, name: &str) -> Option<TransitionId> {
        self.transition_index.get(name).copied()
    }

    pub fn place_name(&self, id: PlaceId) -> Option<&str> {
        self.place(id).map(Place::name)
    }

    pub fn transition_name(&self, id: TransitionId) -> Option<&str> {
        self.transition(id).map(Transition::name)
    }

    fn transition_label(&self, id: TransitionId) -> String {
        self.transition_name(id).map(str::to_string).unwrap_or_else(|| id.to_string())
    }

    /// Places in declaration order.
    pub fn places(&self) -> impl Iterator<Item = (PlaceId, &Place)> {
        self.places
            .iter()
            .enumerate()
            .filter_map(|(i, p)| p.as_ref().map(|p| (PlaceId(i as u32), p)))
    }

    /// Transitions in declaration order.
    pub fn transitions(&self) -> impl Iterator<Item = (TransitionId, &Transition)> {
        self.transitions
            .iter()
            .enumerate()
            .filter_map(|(i, t)| t.as_ref().map(|t| (TransitionId(i as u32), t)))
    }

    /// Add a feature to a transition, replacing any same-kind feature.
    pub fn add_feature(&mut self, id: TransitionId, feature: TransitionFeature) {
        if let Some(t) = self.transition_mut(id) {
            t.add_feature(feature);
        }
    }

    /* ===================  arcs  =================== */

    fn set_arc(arcs: &mut ArcList, place: PlaceId, multiplicity: u32) {
        debug_assert!(multiplicity > 0, "arc multiplicity must be positive");
        match arcs.iter_mut().find(|(p, _)| *p == place) {
            Some(entry) => entry.1 = multiplicity,
            None => arcs.push((place, multiplicity)),
        }
    }

    pub fn add_precondition(&mut self, place: PlaceId, transition: TransitionId, mult: u32) {
        Self::set_arc(&mut self.pre[transition.index()], place, mult);
    }

    pub fn add_postcondition(&mut self, transition: TransitionId, place: PlaceId, mult: u32) {
        Self::set_arc(&mut self.post[transition.index()], place, mult);
    }

    pub fn add_inhibitor(&mut self, place: PlaceId, transition: TransitionId, mult: u32) {
        Self::set_arc(&mut self.inhibitors[transition.index()], place, mult);
    }

    pub fn preconditions(&self, t: TransitionId) -> &[(PlaceId, u32)] {
        &self.pre[t.index()]
    }

    pub fn postconditions(&self, t: TransitionId) -> &[(PlaceId, u32)] {
        &self.post[t.index()]
    }

    pub fn inhibitors(&self, t: TransitionId) -> &[(PlaceId, u32)] {
        &self.inhibitors[t.index()]
    }

    /* ===================  semantics  =================== */

    /// Enabling of `t` at `m`: sufficient tokens on every precondition
    /// place, every inhibitor below its threshold, and the enabling
    /// function (if any) true.
    pub fn is_enabled(&self, t: TransitionId, m: &Marking) -> Result<bool, AnalysisError> {
        let Some(transition) = self.transition(t) else { return Ok(false) };
        for &(p, k) in self.preconditions(t) {
            if m.tokens(p) < k {
                return Ok(false);
            }
        }
        for &(p, k) in self.inhibitors(t) {
            if m.tokens(p) >= k {
                return Ok(false);
            }
        }
        if let Some(guard) = transition.enabling_function() {
            let bindings = MarkingBindings { net: self, marking: m };
            let enabled = Evaluator::new(&bindings).eval_bool(guard).map_err(|e| {
                AnalysisError::eval(e, format!("enabling function of '{}'", transition.name()))
            })?;
            return Ok(enabled);
        }
        Ok(true)
    }

    /// Enabled transitions at `m`, in declaration order.
    pub fn enabled(&self, m: &Marking) -> Result<Vec<TransitionId>, AnalysisError> {
        let mut out = Vec::new();
        for (id, _) in self.transitions() {
            if self.is_enabled(id, m)? {
                out.push(id);
            }
        }
        Ok(out)
    }

    /// Fire `t` at `m`: arc effects, then the sequential post-updates.
    pub fn fire(&self, m: &Marking, t: TransitionId) -> Result<Marking, AnalysisError> {
        let mut out = m.clone();
        for &(p, k) in self.preconditions(t) {
            out.remove_tokens(p, k).ok_or_else(|| AnalysisError::NegativeTokens {
                place: self.place_name(p).unwrap_or_default().to_string(),
                transition: self.transition_label(t),
            })?;
        }
        for &(p, k) in self.postconditions(t) {
            out.add_tokens(p, k);
        }
        if let Some(updates) = self.transition(t).and_then(|tr| tr.post_updater()) {
            for update in updates {
                let bindings = MarkingBindings { net: self, marking: &out };
                let value =
                    Evaluator::new(&bindings).eval(&update.expr).map_err(|e| {
                        AnalysisError::eval(
                            e,
                            format!("post-update of '{}'", self.transition_label(t)),
                        )
                    })?;
                let tokens = value.as_i64_rounded().map_err(|e| {
                    AnalysisError::eval(e, format!("post-update of '{}'", self.transition_label(t)))
                })?;
                let place = self.find_place(&update.target).ok_or_else(|| {
                    AnalysisError::eval(
                        marcato_common::EvalError::new(
                            marcato_common::EvalErrorKind::UndefinedSymbol,
                        )
                        .with_message(update.target.clone()),
                        format!("post-update of '{}'", self.transition_label(t)),
                    )
                })?;
                // Non-integers were rounded above; negatives clamp to 0.
                out.set_tokens(place, tokens.clamp(0, u32::MAX as i64) as u32);
            }
        }
        Ok(out)
    }
}

/// Bindings that resolve place names to token counts.
pub struct MarkingBindings<'a> {
    pub net: &'a PetriNet,
    pub marking: &'a Marking,
}

impl Bindings for MarkingBindings<'_> {
    fn value_of(&self, name: &str) -> Option<Value> {
        self.net.find_place(name).map(|p| Value::Int(self.marking.tokens(p) as i64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marcato_expr::parse_updates;

    fn marking(pairs: &[(PlaceId, u32)]) -> Marking {
        pairs.iter().copied().collect()
    }

    #[test]
    fn enabling_with_inhibitors_and_guards() {
        let mut net = PetriNet::new();
        let p0 = net.add_place("p0");
        let p1 = net.add_place("p1");
        let t = net.add_transition("t");
        net.add_precondition(p0, t, 2);
        net.add_inhibitor(p1, t, 1);

        assert!(!net.is_enabled(t, &marking(&[(p0, 1)])).unwrap());
        assert!(net.is_enabled(t, &marking(&[(p0, 2)])).unwrap());
        assert!(!net.is_enabled(t, &marking(&[(p0, 2), (p1, 1)])).unwrap());

        net.add_feature(t, TransitionFeature::EnablingFunction(marcato_expr::parse("p0 > 2").unwrap()));
        assert!(!net.is_enabled(t, &marking(&[(p0, 2)])).unwrap());
        assert!(net.is_enabled(t, &marking(&[(p0, 3)])).unwrap());
    }

    #[test]
    fn guard_over_unknown_place_fails() {
        let mut net = PetriNet::new();
        let p0 = net.add_place("p0");
        let t = net.add_transition("t");
        net.add_precondition(p0, t, 1);
        net.add_feature(t, TransitionFeature::EnablingFunction(marcato_expr::parse("ghost > 0").unwrap()));
        assert!(net.is_enabled(t, &marking(&[(p0, 1)])).is_err());
    }

    #[test]
    fn firing_moves_tokens() {
        let mut net = PetriNet::new();
        let p0 = net.add_place("p0");
        let p1 = net.add_place("p1");
        let t = net.add_transition("t");
        net.add_precondition(p0, t, 1);
        net.add_postcondition(t, p1, 2);

        let m = net.fire(&marking(&[(p0, 1)]), t).unwrap();
        assert_eq!(m, marking(&[(p1, 2)]));

        // Insufficient tokens surfaces as an error, not a wrap-around.
        assert!(matches!(
            net.fire(&marking(&[]), t),
            Err(AnalysisError::NegativeTokens { .. })
        ));
    }

    #[test]
    fn post_updates_run_sequentially_and_clamp() {
        let mut net = PetriNet::new();
        let p0 = net.add_place("p0");
        let p1 = net.add_place("p1");
        let p2 = net.add_place("p2");
        let t = net.add_transition("t");
        net.add_precondition(p0, t, 1);
        net.add_feature(
            t,
            TransitionFeature::PostUpdater(
                parse_updates("p1 := p1 + 3; p2 := p1 - 10; p1 := p1 / 2;").unwrap(),
            ),
        );
        let m = net.fire(&marking(&[(p0, 1), (p1, 1)]), t).unwrap();
        // p1: 1 -> 4, p2: max(4 - 10, 0) = 0, p1: 4 / 2 = 2
        assert_eq!(m.tokens(p1), 2);
        assert_eq!(m.tokens(p2), 0);
        assert_eq!(m.tokens(p0), 0);
    }

    #[test]
    fn feature_bag_replaces_by_kind() {
        let mut net = PetriNet::new();
        let t = net.add_transition("t");
        net.add_feature(t, TransitionFeature::Priority(1));
        net.add_feature(t, TransitionFeature::Priority(7));
        let tr = net.transition(t).unwrap();
        assert_eq!(tr.priority(), Some(7));
        assert_eq!(tr.features().len(), 1);
        assert_eq!(tr.priority_rank(), 7);

        let t2 = net.add_transition("t2");
        assert_eq!(net.transition(t2).unwrap().priority_rank(), i64::MIN);
    }

    #[test]
    fn removal_drops_arcs_and_names() {
        let mut net = PetriNet::new();
        let p0 = net.add_place("p0");
        let p1 = net.add_place("p1");
        let t = net.add_transition("t");
        net.add_precondition(p0, t, 1);
        net.add_postcondition(t, p1, 1);

        net.remove_place(p0);
        assert!(net.find_place("p0").is_none());
        assert!(net.preconditions(t).is_empty());
        assert_eq!(net.places().count(), 1);

        net.remove_transition(t);
        assert!(net.find_transition("t").is_none());
        assert_eq!(net.transitions().count(), 0);
    }

    #[test]
    fn firing_bounds_prefer_timed_feature() {
        let mut net = PetriNet::new();
        let t = net.add_transition("t");
        net.add_feature(t, TransitionFeature::Stochastic(Stochastic::uniform(Num::zero(), Num::from_i64(9))));
        net.add_feature(
            t,
            TransitionFeature::Timed { eft: Num::one(), lft: OmegaNum::from(2) },
        );
        assert_eq!(
            net.transition(t).unwrap().firing_bounds(),
            Some((Num::one(), OmegaNum::from(2)))
        );
    }
}
