//! Worklist-driven fixed-point construction of the succession graph.

use crate::error::AnalysisError;
use crate::graph::SuccessionGraph;
use crate::petri::{MarkingBindings, PetriNet};
use crate::state::{HasMarking, TimedState};
use crate::succession::{EnabledTransitions, EventsBuilder, SuccessorEvaluator};
use marcato_common::Num;
use marcato_expr::{Evaluator, Expr};
use std::collections::VecDeque;
use tracing::{debug, trace};

/// Which frontier node to expand next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Policy {
    #[default]
    Fifo,
    Lifo,
}

/// Cancellation hook, polled once per worklist iteration. On
/// cancellation the partial graph built so far is returned as-is.
pub trait Monitor {
    fn is_cancelled(&self) -> bool;
}

/// The default monitor: never cancels.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverCancelled;

impl Monitor for NeverCancelled {
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Per-state stop test: a stopped state is kept in the graph, marked,
/// and never expanded.
pub trait StopCriterion<S> {
    fn should_stop(&self, net: &PetriNet, state: &S) -> Result<bool, AnalysisError>;
}

impl<S, F> StopCriterion<S> for F
where
    F: Fn(&PetriNet, &S) -> bool,
{
    fn should_stop(&self, net: &PetriNet, state: &S) -> Result<bool, AnalysisError> {
        Ok(self(net, state))
    }
}

/// Stop on a boolean marking condition.
#[derive(Debug, Clone)]
pub struct MarkingCondition(pub Expr);

impl<S: HasMarking> StopCriterion<S> for MarkingCondition {
    fn should_stop(&self, net: &PetriNet, state: &S) -> Result<bool, AnalysisError> {
        let bindings = MarkingBindings { net, marking: state.marking() };
        Evaluator::new(&bindings)
            .eval_bool(&self.0)
            .map_err(|e| AnalysisError::eval(e, "stop condition".to_string()))
    }
}

/// Truncation for transient analysis: stop expanding once every run
/// reaching the class has consumed more than `bound` time. Requires the
/// `age` clock.
#[derive(Debug, Clone)]
pub struct AgeTruncation {
    pub bound: Num,
}

impl StopCriterion<TimedState> for AgeTruncation {
    fn should_stop(&self, _net: &PetriNet, state: &TimedState) -> Result<bool, AnalysisError> {
        Ok(state.zone.min_elapsed().map(|min| min > self.bound).unwrap_or(false))
    }
}

/// Graph-level stop test, checked before each expansion.
pub trait GlobalStop {
    fn should_stop(&self, nodes: usize, edges: usize) -> bool;
}

/// Cap on the number of states.
#[derive(Debug, Clone, Copy)]
pub struct NodeBound(pub usize);

impl GlobalStop for NodeBound {
    fn should_stop(&self, nodes: usize, _edges: usize) -> bool {
        nodes >= self.0
    }
}

/// Rewrites a successor before deduplication.
pub trait PreProcessor<S> {
    fn process(&self, net: &PetriNet, state: S) -> S;
}

/// Observes a state right after it entered the graph.
pub trait PostProcessor<S> {
    fn process(&self, net: &PetriNet, state: &S);
}

/// The generic worklist analyzer.
pub struct Enumerator<'a, V, B = EnabledTransitions>
where
    V: SuccessorEvaluator,
{
    net: &'a PetriNet,
    evaluator: V,
    events: B,
    policy: Policy,
    monitor: Option<&'a dyn Monitor>,
    local_stop: Vec<Box<dyn StopCriterion<V::State> + 'a>>,
    global_stop: Option<Box<dyn GlobalStop + 'a>>,
    pre: Option<Box<dyn PreProcessor<V::State> + 'a>>,
    post: Option<Box<dyn PostProcessor<V::State> + 'a>>,
}

impl<'a, V> Enumerator<'a, V, EnabledTransitions>
where
    V: SuccessorEvaluator,
{
    pub fn new(net: &'a PetriNet, evaluator: V) -> Self {
        Enumerator {
            net,
            evaluator,
            events: EnabledTransitions,
            policy: Policy::Fifo,
            monitor: None,
            local_stop: Vec::new(),
            global_stop: None,
            pre: None,
            post: None,
        }
    }
}

impl<'a, V, B> Enumerator<'a, V, B>
where
    V: SuccessorEvaluator,
    B: EventsBuilder<V::State>,
{
    pub fn with_events<B2: EventsBuilder<V::State>>(self, events: B2) -> Enumerator<'a, V, B2> {
        Enumerator {
            net: self.net,
            evaluator: self.evaluator,
            events,
            policy: self.policy,
            monitor: self.monitor,
            local_stop: self.local_stop,
            global_stop: self.global_stop,
            pre: self.pre,
            post: self.post,
        }
    }

    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_monitor(mut self, monitor: &'a dyn Monitor) -> Self {
        self.monitor = Some(monitor);
        self
    }

    /// Add a stop criterion; any criterion stopping stops the state.
    pub fn with_local_stop(mut self, stop: impl StopCriterion<V::State> + 'a) -> Self {
        self.local_stop.push(Box::new(stop));
        self
    }

    pub fn with_global_stop(mut self, stop: impl GlobalStop + 'a) -> Self {
        self.global_stop = Some(Box::new(stop));
        self
    }

    pub fn with_pre_processor(mut self, pre: impl PreProcessor<V::State> + 'a) -> Self {
        self.pre = Some(Box::new(pre));
        self
    }

    pub fn with_post_processor(mut self, post: impl PostProcessor<V::State> + 'a) -> Self {
        self.post = Some(Box::new(post));
        self
    }

    fn preprocess(&self, state: V::State) -> V::State {
        match &self.pre {
            Some(p) => p.process(self.net, state),
            None => state,
        }
    }

    fn is_stopped(&self, state: &V::State) -> Result<bool, AnalysisError> {
        for criterion in &self.local_stop {
            if criterion.should_stop(self.net, state)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Run to the fixed point (or cancellation / global stop) from the
    /// given initial state.
    pub fn enumerate(
        &self,
        initial: V::State,
    ) -> Result<SuccessionGraph<V::State, V::Succession>, AnalysisError> {
        let mut graph = SuccessionGraph::new(self.preprocess(initial));
        if let Some(p) = &self.post {
            p.process(self.net, graph.node(graph.root()));
        }
        let mut worklist = VecDeque::new();
        worklist.push_back(graph.root());

        while let Some(node) = match self.policy {
            Policy::Fifo => worklist.pop_front(),
            Policy::Lifo => worklist.pop_back(),
        } {
            if self.monitor.map(|m| m.is_cancelled()).unwrap_or(false) {
                debug!(nodes = graph.node_count(), "enumeration cancelled");
                break;
            }
            if let Some(stop) = &self.global_stop {
                if stop.should_stop(graph.node_count(), graph.edge_count()) {
                    debug!(nodes = graph.node_count(), "global stop reached");
                    break;
                }
            }
            let state = graph.node(node).clone();
            if self.is_stopped(&state)? {
                graph.mark_local_stop(node);
                continue;
            }
            for event in self.events.events(self.net, &state)? {
                let Some((successor, payload)) =
                    self.evaluator.successor(self.net, &state, event)?
                else {
                    continue;
                };
                let successor = self.preprocess(successor);
                let (target, fresh) = graph.insert(successor);
                graph.add_edge(node, target, payload);
                if fresh {
                    if let Some(p) = &self.post {
                        p.process(self.net, graph.node(target));
                    }
                    trace!(%node, %target, "new state class");
                    worklist.push_back(target);
                }
            }
        }
        debug!(nodes = graph.node_count(), edges = graph.edge_count(), "enumeration finished");
        Ok(graph)
    }
}
