//! The GSPN successor evaluator: races between immediate and
//! exponential transitions, with firing probabilities on the edges.
//!
//! States are keyed by marking alone; the per-state exit rate lives in
//! the [`SpnGraph`] annotation, never in the key.

use crate::error::AnalysisError;
use crate::graph::SuccessionGraph;
use crate::marking::Marking;
use crate::petri::{Density, MarkingBindings, PetriNet, Stochastic, TransitionId};
use crate::succession::SuccessorEvaluator;
use marcato_common::{Num, OmegaNum};
use marcato_expr::{Evaluator, Expr};

/// Payload of a GSPN succession edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpnSuccession {
    pub fired: TransitionId,
    /// Probability of this firing among the race at the source marking.
    pub probability: Num,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct GspnSuccessorEvaluator;

fn eval_num(
    net: &PetriNet,
    m: &Marking,
    expr: &Expr,
    context: &str,
) -> Result<Num, AnalysisError> {
    let bindings = MarkingBindings { net, marking: m };
    Evaluator::new(&bindings)
        .eval_num(expr)
        .map_err(|e| AnalysisError::eval(e, context.to_string()))
}

fn weight(net: &PetriNet, m: &Marking, t: TransitionId, s: &Stochastic) -> Result<Num, AnalysisError> {
    let w = eval_num(net, m, &s.weight, &format!("weight of '{}'", name(net, t)))?;
    if w.is_negative() {
        return Err(AnalysisError::Unsupported(format!(
            "transition '{}' has a negative weight at {}",
            name(net, t),
            m.display(net)
        )));
    }
    Ok(w)
}

fn clock_rate(
    net: &PetriNet,
    m: &Marking,
    t: TransitionId,
    s: &Stochastic,
) -> Result<Num, AnalysisError> {
    let r = eval_num(net, m, &s.clock_rate, &format!("clock rate of '{}'", name(net, t)))?;
    if r.is_negative() {
        return Err(AnalysisError::Unsupported(format!(
            "transition '{}' has a negative clock rate at {}",
            name(net, t),
            m.display(net)
        )));
    }
    Ok(r)
}

fn name(net: &PetriNet, t: TransitionId) -> String {
    net.transition_name(t).map(str::to_string).unwrap_or_else(|| t.to_string())
}

/// The race at a marking: the enabled immediates with positive weight,
/// and the enabled exponentials with their effective rates.
struct Race {
    immediate: Vec<(TransitionId, Num)>,
    exponential: Vec<(TransitionId, Num)>,
}

fn race(net: &PetriNet, m: &Marking) -> Result<Race, AnalysisError> {
    let mut immediate = Vec::new();
    let mut exponential = Vec::new();
    for t in net.enabled(m)? {
        let Some(s) = net.transition(t).and_then(|tr| tr.stochastic()) else { continue };
        if s.is_immediate() {
            let w = weight(net, m, t, s)?;
            if w.is_positive() {
                immediate.push((t, w));
            }
        } else if let Density::Exponential { rate } = &s.density {
            let effective = rate * &clock_rate(net, m, t, s)?;
            if effective.is_positive() {
                exponential.push((t, effective));
            }
        }
    }
    if !immediate.is_empty() {
        // Only the maximum-priority immediates take part in the race.
        let top = immediate
            .iter()
            .map(|(t, _)| net.transition(*t).map(|tr| tr.priority_rank()).unwrap_or(i64::MIN))
            .max()
            .unwrap_or(i64::MIN);
        immediate.retain(|(t, _)| {
            net.transition(*t).map(|tr| tr.priority_rank()).unwrap_or(i64::MIN) == top
        });
    }
    Ok(Race { immediate, exponential })
}

/// Exit rate of a marking: `+∞` when an immediate is enabled, the sum
/// of effective exponential rates otherwise (zero for dead markings).
pub fn exit_rate(net: &PetriNet, m: &Marking) -> Result<OmegaNum, AnalysisError> {
    let r = race(net, m)?;
    if !r.immediate.is_empty() {
        return Ok(OmegaNum::PosInf);
    }
    let mut total = Num::zero();
    for (_, rate) in &r.exponential {
        total = &total + rate;
    }
    Ok(OmegaNum::Finite(total))
}

impl SuccessorEvaluator for GspnSuccessorEvaluator {
    type State = Marking;
    type Succession = SpnSuccession;

    fn successor(
        &self,
        net: &PetriNet,
        state: &Marking,
        event: TransitionId,
    ) -> Result<Option<(Marking, SpnSuccession)>, AnalysisError> {
        let r = race(net, state)?;
        let probability = if !r.immediate.is_empty() {
            let Some((_, w)) = r.immediate.iter().find(|(t, _)| *t == event) else {
                return Ok(None);
            };
            let mut total = Num::zero();
            for (_, wi) in &r.immediate {
                total = &total + wi;
            }
            w.checked_div(&total)
        } else {
            let Some((_, rate)) = r.exponential.iter().find(|(t, _)| *t == event) else {
                return Ok(None);
            };
            let mut total = Num::zero();
            for (_, ri) in &r.exponential {
                total = &total + ri;
            }
            rate.checked_div(&total)
        };
        let Some(probability) = probability else { return Ok(None) };
        if probability.is_zero() {
            return Ok(None);
        }
        let marking = net.fire(state, event)?;
        Ok(Some((marking, SpnSuccession { fired: event, probability })))
    }
}

/// A GSPN succession graph annotated with per-state exit rates: the
/// input of tangible reduction.
#[derive(Debug, Clone)]
pub struct SpnGraph {
    pub graph: SuccessionGraph<Marking, SpnSuccession>,
    /// Indexed by node: `+∞` marks vanishing states, `0` absorbed
    /// ones, a finite positive value tangible ones.
    pub exit_rates: Vec<OmegaNum>,
}

impl SpnGraph {
    /// Annotate an enumerated graph with exit rates.
    pub fn build(
        net: &PetriNet,
        graph: SuccessionGraph<Marking, SpnSuccession>,
    ) -> Result<Self, AnalysisError> {
        let mut exit_rates = Vec::with_capacity(graph.node_count());
        for (id, marking) in graph.nodes() {
            let rate = if graph.is_local_stop(id) {
                // Stop-absorbed states do not race at all.
                OmegaNum::zero()
            } else {
                exit_rate(net, marking)?
            };
            exit_rates.push(rate);
        }
        Ok(SpnGraph { graph, exit_rates })
    }

    /// Vanishing: an immediate race happens here.
    pub fn is_vanishing(&self, node: crate::graph::NodeId) -> bool {
        self.exit_rates[node.index()].is_pos_inf()
    }
}
