//! The timed successor evaluator: advances a state class under a chosen
//! firing through conditioning, ground shift, projection, and
//! newly-enabled insertion.

use crate::dbm::{Dbm, Var};
use crate::error::AnalysisError;
use crate::marking::Marking;
use crate::petri::{PetriNet, TransitionId};
use crate::state::{Regeneration, TimedState};
use crate::succession::SuccessorEvaluator;
use marcato_common::{Num, OmegaNum};
use std::collections::BTreeSet;

/// Payload of a timed succession edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedSuccession {
    pub fired: TransitionId,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TimedSuccessorEvaluator {
    /// Carry the `age` clock through every firing.
    pub include_age: bool,
    /// Reject firings that can only happen on a zero-measure time set.
    pub exclude_zero_prob: bool,
    /// Attach a [`Regeneration`] tag to classes where every general
    /// timer is newly enabled.
    pub mark_regenerations: bool,
}

impl TimedSuccessorEvaluator {
    /// Build the initial state class for `m0`: all enabled transitions
    /// newly enabled with their static firing bounds.
    pub fn initial_state(
        &self,
        net: &PetriNet,
        m0: &Marking,
    ) -> Result<TimedState, AnalysisError> {
        let enabled = net.enabled(m0)?;
        let mut zone = Dbm::new();
        if self.include_age {
            zone.add_age();
        }
        let news = bounds_of(net, &enabled)?;
        zone.add_variables(&news);
        if zone.is_empty() {
            return Err(AnalysisError::EmptyZone { state: format!("{}", m0.display(net)) });
        }
        let enabled: BTreeSet<_> = enabled.into_iter().collect();
        Ok(TimedState {
            marking: m0.clone(),
            newly_enabled: enabled.clone(),
            enabled,
            zone,
            regeneration: self.mark_regenerations.then(|| Regeneration(m0.clone())),
        })
    }

    /// Regeneration test: every enabled timer with memory must have
    /// been enabled by this very firing.
    fn is_regeneration(
        &self,
        net: &PetriNet,
        enabled: &BTreeSet<TransitionId>,
        newly_enabled: &BTreeSet<TransitionId>,
    ) -> bool {
        enabled.iter().all(|&t| {
            let general = match net.transition(t).and_then(|tr| tr.stochastic()) {
                Some(s) => s.is_general(),
                // A timer without a stochastic feature keeps memory.
                None => true,
            };
            !general || newly_enabled.contains(&t)
        })
    }
}

impl SuccessorEvaluator for TimedSuccessorEvaluator {
    type State = TimedState;
    type Succession = TimedSuccession;

    fn successor(
        &self,
        net: &PetriNet,
        state: &TimedState,
        event: TransitionId,
    ) -> Result<Option<(TimedState, TimedSuccession)>, AnalysisError> {
        let v = Var::Transition(event);
        if !state.zone.contains(v) {
            return Ok(None);
        }

        // Priority among transitions forced to fire at the same instant.
        let fired_rank =
            net.transition(event).map(|t| t.priority_rank()).unwrap_or(i64::MIN);
        for w in state.zone.null_delay_set(v) {
            if let Var::Transition(other) = w {
                let rank = net.transition(other).map(|t| t.priority_rank()).unwrap_or(i64::MIN);
                if rank > fired_rank {
                    return Ok(None);
                }
            }
        }

        if self.exclude_zero_prob && fires_with_zero_probability(&state.zone, v) {
            return Ok(None);
        }

        // Condition on the event firing first.
        let mut zone = state.zone.clone();
        let others: Vec<Var> =
            state.enabled.iter().filter(|&&t| t != event).map(|&t| Var::Transition(t)).collect();
        zone.impose_var_lower(v, &others);
        if zone.is_empty() {
            return Ok(None);
        }

        zone.set_new_ground(v);

        // Firing effect on the marking, and the enabling delta.
        let marking = net.fire(&state.marking, event)?;
        let now_enabled = net.enabled(&marking)?;
        let persistent: BTreeSet<TransitionId> = now_enabled
            .iter()
            .copied()
            .filter(|&t| t != event && state.enabled.contains(&t))
            .collect();
        let newly_enabled: BTreeSet<TransitionId> =
            now_enabled.iter().copied().filter(|t| !persistent.contains(t)).collect();

        // The fired variable now names the old ground; it goes away with
        // the disabled set.
        let dead: Vec<Var> = state
            .enabled
            .iter()
            .copied()
            .filter(|t| !persistent.contains(t))
            .map(Var::Transition)
            .collect();
        zone.project_variables(&dead);

        let news = bounds_of(net, &newly_enabled.iter().copied().collect::<Vec<_>>())?;
        zone.add_variables(&news);
        if zone.is_empty() {
            return Err(AnalysisError::EmptyZone {
                state: format!("{}", marking.display(net)),
            });
        }

        let enabled: BTreeSet<TransitionId> = now_enabled.into_iter().collect();
        let regeneration = (self.mark_regenerations
            && self.is_regeneration(net, &enabled, &newly_enabled))
        .then(|| Regeneration(marking.clone()));

        Ok(Some((
            TimedState { marking, enabled, newly_enabled, zone, regeneration },
            TimedSuccession { fired: event },
        )))
    }
}

/// Tabular rendering of a timed class graph, one row per class with
/// its marking and outgoing successions.
pub struct ClassGraphDisplay<'a> {
    pub graph: &'a crate::graph::SuccessionGraph<TimedState, TimedSuccession>,
    pub net: &'a PetriNet,
}

impl std::fmt::Display for ClassGraphDisplay<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (id, state) in self.graph.nodes() {
            write!(f, "{id:<7}{:<24}", format!("{}", state.marking.display(self.net)))?;
            let mut first = true;
            for (target, succession) in self.graph.successors(id) {
                if !first {
                    write!(f, ", ")?;
                }
                first = false;
                match self.net.transition_name(succession.fired) {
                    Some(name) => write!(f, "{name}->{target}")?,
                    None => write!(f, "{}->{target}", succession.fired)?,
                }
            }
            if self.graph.is_local_stop(id) {
                write!(f, "(stop)")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Static firing bounds for a batch of transitions; a transition
/// without bounds cannot take part in timed analysis.
fn bounds_of(
    net: &PetriNet,
    transitions: &[TransitionId],
) -> Result<Vec<(Var, Num, OmegaNum)>, AnalysisError> {
    transitions
        .iter()
        .map(|&t| {
            let tr = net
                .transition(t)
                .ok_or_else(|| AnalysisError::Unsupported(format!("unknown transition {t}")))?;
            let (eft, lft) = tr.firing_bounds().ok_or_else(|| {
                AnalysisError::Unsupported(format!(
                    "transition '{}' has no firing-time bounds",
                    tr.name()
                ))
            })?;
            Ok((Var::Transition(t), eft, lft))
        })
        .collect()
}

/// The optional zero-probability test: some other clock `o` never
/// exceeds the fired one (`o ≤ v` throughout) while `v` can still run
/// past `o`, so firing `v` first forces the exact tie `v = o`. When
/// either clock has positive extent the tie has measure zero under a
/// continuous density.
fn fires_with_zero_probability(zone: &Dbm, v: Var) -> bool {
    let zero = OmegaNum::zero();
    for &o in zone.vars() {
        let Var::Transition(_) = o else { continue };
        if o == v {
            continue;
        }
        // sup(o − v) = 0 and sup(v − o) > 0.
        let (Some(b_vo), Some(b_ov)) = (zone.bound(v, o), zone.bound(o, v)) else { continue };
        if *b_vo != zero || *b_ov <= zero {
            continue;
        }
        let spread = |a: Var, b: Var| -> bool {
            match (zone.bound(a, b), zone.bound(b, a)) {
                (Some(x), Some(y)) => x.try_add(y).map(|s| s > zero).unwrap_or(true),
                _ => false,
            }
        };
        if spread(v, Var::Ground) || spread(o, Var::Ground) {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::petri::{Stochastic, TransitionFeature};

    fn timed(net: &mut PetriNet, name: &str, eft: i64, lft: Option<i64>) -> TransitionId {
        let t = net.add_transition(name);
        net.add_feature(
            t,
            TransitionFeature::Timed {
                eft: Num::from_i64(eft),
                lft: lft.map(OmegaNum::from).unwrap_or(OmegaNum::PosInf),
            },
        );
        t
    }

    /// p0 --t0--> p1, p0 --t1--> p2, both enabled at m0.
    fn race_net() -> (PetriNet, Marking, TransitionId, TransitionId) {
        let mut net = PetriNet::new();
        let p0 = net.add_place("p0");
        let p1 = net.add_place("p1");
        let p2 = net.add_place("p2");
        let t0 = timed(&mut net, "t0", 1, Some(2));
        let t1 = timed(&mut net, "t1", 0, Some(1));
        net.add_precondition(p0, t0, 1);
        net.add_postcondition(t0, p1, 1);
        net.add_precondition(p0, t1, 1);
        net.add_postcondition(t1, p2, 1);
        let m0: Marking = [(p0, 1)].into_iter().collect();
        (net, m0, t0, t1)
    }

    #[test]
    fn initial_class_has_static_bounds() {
        let (net, m0, t0, t1) = race_net();
        let eval = TimedSuccessorEvaluator::default();
        let s = eval.initial_state(&net, &m0).unwrap();
        assert_eq!(s.enabled.len(), 2);
        assert_eq!(s.newly_enabled.len(), 2);
        assert_eq!(s.zone.bound(Var::Ground, Var::Transition(t0)), Some(&OmegaNum::from(2)));
        assert_eq!(s.zone.bound(Var::Transition(t1), Var::Ground), Some(&OmegaNum::zero()));
    }

    #[test]
    fn firing_updates_marking_and_zone() {
        let (net, m0, t0, t1) = race_net();
        let eval = TimedSuccessorEvaluator::default();
        let s = eval.initial_state(&net, &m0).unwrap();

        // t1 can fire first (eft 0 < t0's lft 2).
        let (succ, edge) = eval.successor(&net, &s, t1).unwrap().unwrap();
        assert_eq!(edge.fired, t1);
        assert_eq!(succ.marking.tokens(net.find_place("p2").unwrap()), 1);
        // t0 was disabled by the firing; its clock is gone.
        assert!(!succ.zone.contains(Var::Transition(t0)));
        assert!(succ.enabled.is_empty());
    }

    #[test]
    fn conditioning_rejects_impossible_firings() {
        let mut net = PetriNet::new();
        let p0 = net.add_place("p0");
        let late = timed(&mut net, "late", 3, Some(5));
        let early = timed(&mut net, "early", 0, Some(1));
        net.add_precondition(p0, late, 1);
        net.add_precondition(p0, early, 1);
        let m0: Marking = [(p0, 1)].into_iter().collect();

        let eval = TimedSuccessorEvaluator::default();
        let s = eval.initial_state(&net, &m0).unwrap();
        // `late` cannot beat `early`: conditioning empties the zone.
        assert!(eval.successor(&net, &s, late).unwrap().is_none());
        assert!(eval.successor(&net, &s, early).unwrap().is_some());
    }

    #[test]
    fn null_delay_priority_rejects_lower_priority() {
        let mut net = PetriNet::new();
        let p0 = net.add_place("p0");
        let a = timed(&mut net, "a", 0, Some(0));
        let b = timed(&mut net, "b", 0, Some(0));
        net.add_feature(b, TransitionFeature::Priority(5));
        net.add_precondition(p0, a, 1);
        net.add_precondition(p0, b, 1);
        let m0: Marking = [(p0, 1)].into_iter().collect();

        let eval = TimedSuccessorEvaluator::default();
        let s = eval.initial_state(&net, &m0).unwrap();
        // Both must fire at 0; only the higher priority may.
        assert!(eval.successor(&net, &s, a).unwrap().is_none());
        assert!(eval.successor(&net, &s, b).unwrap().is_some());
    }

    #[test]
    fn persistent_transition_keeps_its_clock() {
        let mut net = PetriNet::new();
        let p0 = net.add_place("p0");
        let p1 = net.add_place("p1");
        let keep = timed(&mut net, "keep", 1, Some(2));
        let fire = timed(&mut net, "fire", 0, Some(1));
        // `keep` consumes p1 which the firing does not touch.
        net.add_precondition(p1, keep, 1);
        net.add_precondition(p0, fire, 1);
        let m0: Marking = [(p0, 1), (p1, 1)].into_iter().collect();

        let eval = TimedSuccessorEvaluator::default();
        let s = eval.initial_state(&net, &m0).unwrap();
        let (succ, _) = eval.successor(&net, &s, fire).unwrap().unwrap();
        assert!(succ.enabled.contains(&keep));
        assert!(succ.newly_enabled.is_empty());
        assert!(succ.zone.contains(Var::Transition(keep)));
        // Persistent bounds tightened by the firing: keep in [0, 2].
        assert_eq!(
            succ.zone.bound(Var::Transition(keep), Var::Ground),
            Some(&OmegaNum::zero())
        );
        assert_eq!(
            succ.zone.bound(Var::Ground, Var::Transition(keep)),
            Some(&OmegaNum::from(2))
        );
    }

    #[test]
    fn age_is_carried_and_never_projected() {
        let (net, m0, _, t1) = race_net();
        let eval = TimedSuccessorEvaluator { include_age: true, ..Default::default() };
        let s = eval.initial_state(&net, &m0).unwrap();
        assert_eq!(s.zone.min_elapsed(), Some(Num::zero()));
        let (succ, _) = eval.successor(&net, &s, t1).unwrap().unwrap();
        assert!(succ.zone.contains(Var::Age));
        // t1 fires within [0, 1]; no time need have passed.
        assert_eq!(succ.zone.min_elapsed(), Some(Num::zero()));
    }

    #[test]
    fn regenerations_are_marked() {
        let mut net = PetriNet::new();
        let p0 = net.add_place("p0");
        let p1 = net.add_place("p1");
        let t0 = net.add_transition("t0");
        net.add_feature(
            t0,
            TransitionFeature::Stochastic(Stochastic::uniform(Num::zero(), Num::one())),
        );
        net.add_precondition(p0, t0, 1);
        net.add_postcondition(t0, p1, 1);
        let t1 = net.add_transition("t1");
        net.add_feature(
            t1,
            TransitionFeature::Stochastic(Stochastic::uniform(Num::zero(), Num::one())),
        );
        net.add_precondition(p1, t1, 1);

        let m0: Marking = [(p0, 1)].into_iter().collect();
        let eval = TimedSuccessorEvaluator { mark_regenerations: true, ..Default::default() };
        let s = eval.initial_state(&net, &m0).unwrap();
        assert!(s.regeneration.is_some());
        let (succ, _) = eval.successor(&net, &s, t0).unwrap().unwrap();
        // t1 is newly enabled and the only general timer: regeneration.
        let reg = succ.regeneration.expect("regeneration tag");
        assert_eq!(reg.0, succ.marking);
    }

    #[test]
    fn zero_probability_ties_are_excluded() {
        let mut net = PetriNet::new();
        let p0 = net.add_place("p0");
        // `spread` can fire anywhere in [1,2]; `point` fires at exactly 1.
        let spread = timed(&mut net, "spread", 1, Some(2));
        let point = timed(&mut net, "point", 1, Some(1));
        net.add_precondition(p0, spread, 1);
        net.add_precondition(p0, point, 1);
        let m0: Marking = [(p0, 1)].into_iter().collect();

        // Firing `spread` first forces the tie spread = point = 1, a
        // zero-measure event; the option prunes it.
        let eval = TimedSuccessorEvaluator { exclude_zero_prob: true, ..Default::default() };
        let s = eval.initial_state(&net, &m0).unwrap();
        assert!(eval.successor(&net, &s, spread).unwrap().is_none());
        assert!(eval.successor(&net, &s, point).unwrap().is_some());

        // Without the option the tie stays explorable.
        let eval = TimedSuccessorEvaluator::default();
        let s = eval.initial_state(&net, &m0).unwrap();
        assert!(eval.successor(&net, &s, spread).unwrap().is_some());
    }
}
