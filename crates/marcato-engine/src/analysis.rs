//! Analysis entry points: configuration, model validation, and the
//! timed / GSPN pipelines.

use crate::chain::Ctmc;
use crate::enumerator::{AgeTruncation, Enumerator, MarkingCondition, Monitor, Policy};
use crate::error::AnalysisError;
use crate::graph::SuccessionGraph;
use crate::marking::Marking;
use crate::petri::PetriNet;
use crate::state::TimedState;
use crate::succession::{
    GspnSuccessorEvaluator, SpnGraph, TimedSuccession, TimedSuccessorEvaluator,
};
use marcato_common::Num;
use marcato_expr::{Expr, simplify};
use std::fmt::{self, Display};
use tracing::debug;

/// A validation finding for a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelIssue {
    pub transition: String,
    pub message: String,
}

impl Display for ModelIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transition '{}' {}", self.transition, self.message)
    }
}

/// Configuration shared by the analysis pipelines.
#[derive(Debug, Clone, Default)]
pub struct AnalysisConfig {
    pub policy: Policy,
    /// Marking condition: matching states are kept but not expanded.
    pub stop_condition: Option<Expr>,
    /// Carry the `age` clock (implied by `age_bound`).
    pub include_age: bool,
    /// Tag regeneration classes.
    pub mark_regenerations: bool,
    /// Reject firings possible only on a zero-measure time set.
    pub exclude_zero_prob: bool,
    /// Truncate branches whose minimum reachable age exceeds the bound.
    pub age_bound: Option<Num>,
}

/// Validation for the timed pipeline: every transition needs usable
/// static firing bounds.
pub fn can_analyze_timed(net: &PetriNet) -> Vec<ModelIssue> {
    let mut issues = Vec::new();
    for (_, tr) in net.transitions() {
        match tr.firing_bounds() {
            None => issues.push(ModelIssue {
                transition: tr.name().to_string(),
                message: "has no firing-time bounds".to_string(),
            }),
            Some((eft, lft)) => {
                if eft.is_negative() {
                    issues.push(ModelIssue {
                        transition: tr.name().to_string(),
                        message: "has a negative earliest firing time".to_string(),
                    });
                }
                if lft < marcato_common::OmegaNum::Finite(eft) {
                    issues.push(ModelIssue {
                        transition: tr.name().to_string(),
                        message: "has lft < eft".to_string(),
                    });
                }
            }
        }
    }
    issues
}

/// Validation for the GSPN pipeline: transitions must be stochastic and
/// either exponential or immediate; general timers are flagged, and so
/// are general timers with a non-unit clock rate.
pub fn can_analyze_gspn(net: &PetriNet) -> Vec<ModelIssue> {
    let mut issues = Vec::new();
    for (_, tr) in net.transitions() {
        let Some(s) = tr.stochastic() else {
            issues.push(ModelIssue {
                transition: tr.name().to_string(),
                message: "is not stochastic".to_string(),
            });
            continue;
        };
        if s.is_general() {
            issues.push(ModelIssue {
                transition: tr.name().to_string(),
                message: "is neither EXP nor IMM".to_string(),
            });
            if simplify(&s.clock_rate) != Expr::constant(1) {
                issues.push(ModelIssue {
                    transition: tr.name().to_string(),
                    message: "is general with clock rate != 1".to_string(),
                });
            }
        }
    }
    issues
}

fn reject_on_issues(issues: Vec<ModelIssue>) -> Result<(), AnalysisError> {
    if issues.is_empty() {
        return Ok(());
    }
    let rendered: Vec<String> = issues.iter().map(ModelIssue::to_string).collect();
    Err(AnalysisError::Unsupported(rendered.join("; ")))
}

/// Enumeration of the timed state-class graph.
#[derive(Default)]
pub struct TimedAnalysis<'m> {
    config: AnalysisConfig,
    monitor: Option<&'m dyn Monitor>,
}

impl<'m> TimedAnalysis<'m> {
    pub fn new(config: AnalysisConfig) -> Self {
        TimedAnalysis { config, monitor: None }
    }

    pub fn with_monitor(mut self, monitor: &'m dyn Monitor) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub fn compute(
        &self,
        net: &PetriNet,
        m0: &Marking,
    ) -> Result<SuccessionGraph<TimedState, TimedSuccession>, AnalysisError> {
        reject_on_issues(can_analyze_timed(net))?;
        let evaluator = TimedSuccessorEvaluator {
            include_age: self.config.include_age || self.config.age_bound.is_some(),
            exclude_zero_prob: self.config.exclude_zero_prob,
            mark_regenerations: self.config.mark_regenerations,
        };
        let initial = evaluator.initial_state(net, m0)?;
        let mut enumerator =
            Enumerator::new(net, evaluator).with_policy(self.config.policy);
        if let Some(expr) = &self.config.stop_condition {
            enumerator = enumerator.with_local_stop(MarkingCondition(expr.clone()));
        }
        if let Some(bound) = &self.config.age_bound {
            enumerator = enumerator.with_local_stop(AgeTruncation { bound: bound.clone() });
        }
        if let Some(monitor) = self.monitor {
            enumerator = enumerator.with_monitor(monitor);
        }
        debug!("starting timed state-class enumeration");
        enumerator.enumerate(initial)
    }
}

/// GSPN reachability: enumerate the marking graph, then reduce away the
/// vanishing states.
#[derive(Default)]
pub struct GspnReachability<'m> {
    config: AnalysisConfig,
    monitor: Option<&'m dyn Monitor>,
}

impl<'m> GspnReachability<'m> {
    pub fn new(config: AnalysisConfig) -> Self {
        GspnReachability { config, monitor: None }
    }

    pub fn with_monitor(mut self, monitor: &'m dyn Monitor) -> Self {
        self.monitor = Some(monitor);
        self
    }

    /// The annotated succession graph before reduction.
    pub fn compute_graph(
        &self,
        net: &PetriNet,
        m0: &Marking,
    ) -> Result<SpnGraph, AnalysisError> {
        reject_on_issues(can_analyze_gspn(net))?;
        let mut enumerator =
            Enumerator::new(net, GspnSuccessorEvaluator).with_policy(self.config.policy);
        if let Some(expr) = &self.config.stop_condition {
            enumerator = enumerator.with_local_stop(MarkingCondition(expr.clone()));
        }
        if let Some(monitor) = self.monitor {
            enumerator = enumerator.with_monitor(monitor);
        }
        debug!("starting GSPN reachability enumeration");
        let graph = enumerator.enumerate(m0.clone())?;
        SpnGraph::build(net, graph)
    }

    /// The embedded chain over tangible markings, with exit rates.
    pub fn compute(&self, net: &PetriNet, m0: &Marking) -> Result<Ctmc<Marking>, AnalysisError> {
        let spn = self.compute_graph(net, m0)?;
        let mut reduction = crate::reduction::TangibleReduction::new(&spn);
        if let Some(monitor) = self.monitor {
            reduction = reduction.with_monitor(monitor);
        }
        reduction.compute()
    }
}
