//! Tangible reduction: eliminate vanishing states from a GSPN
//! succession graph by absorbing their probability mass into the
//! tangible states they inevitably reach.

use crate::absorption::AbsorptionProbs;
use crate::chain::{Ctmc, Dtmc};
use crate::enumerator::Monitor;
use crate::error::AnalysisError;
use crate::marking::Marking;
use crate::succession::SpnGraph;
use rustc_hash::FxHashMap;
use std::collections::VecDeque;
use tracing::debug;

pub struct TangibleReduction<'a> {
    input: &'a SpnGraph,
    monitor: Option<&'a dyn Monitor>,
}

impl<'a> TangibleReduction<'a> {
    pub fn new(input: &'a SpnGraph) -> Self {
        TangibleReduction { input, monitor: None }
    }

    pub fn with_monitor(mut self, monitor: &'a dyn Monitor) -> Self {
        self.monitor = Some(monitor);
        self
    }

    fn cancelled(&self) -> bool {
        self.monitor.map(|m| m.is_cancelled()).unwrap_or(false)
    }

    /// Build the embedded chain over tangible markings. Cancellation
    /// returns the partial chain assembled so far.
    pub fn compute(&self) -> Result<Ctmc<Marking>, AnalysisError> {
        let g = &self.input.graph;
        let n = g.node_count();
        let ids: Vec<_> = g.nodes().map(|(id, _)| id).collect();
        let vanishing: Vec<bool> = ids.iter().map(|&id| self.input.is_vanishing(id)).collect();

        // Weakly connected components of the vanishing subgraph; each is
        // reduced through one absorption solve.
        let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); n];
        for edge in g.edges() {
            let (i, j) = (edge.from.index(), edge.to.index());
            if vanishing[i] && vanishing[j] {
                adjacency[i].push(j);
                adjacency[j].push(i);
            }
        }
        let mut component_of = vec![usize::MAX; n];
        let mut components: Vec<Vec<usize>> = Vec::new();
        for start in (0..n).filter(|&i| vanishing[i]) {
            if component_of[start] != usize::MAX {
                continue;
            }
            let k = components.len();
            let mut members = Vec::new();
            let mut queue = VecDeque::from([start]);
            component_of[start] = k;
            while let Some(i) = queue.pop_front() {
                members.push(i);
                for &j in &adjacency[i] {
                    if component_of[j] == usize::MAX {
                        component_of[j] = k;
                        queue.push_back(j);
                    }
                }
            }
            components.push(members);
        }

        // Result chain over the tangible markings, in discovery order.
        let mut chain: Dtmc<Marking> = Dtmc::new();
        let mut chain_idx = vec![usize::MAX; n];
        for (id, marking) in g.nodes() {
            if !vanishing[id.index()] {
                chain_idx[id.index()] = chain.add_state(marking.clone());
            }
        }

        // Absorption rows: vanishing node -> [(tangible node, prob)].
        let mut absorb_rows: FxHashMap<usize, Vec<(usize, f64)>> = FxHashMap::default();
        for members in &components {
            if self.cancelled() {
                debug!("reduction cancelled while absorbing vanishing subgraphs");
                return self.finish(chain, &chain_idx);
            }
            let mut embedded: Dtmc<usize> = Dtmc::new();
            for &i in members {
                embedded.add_state(i);
            }
            for &i in members {
                let from = embedded.add_state(i);
                for (to, succession) in g.successors(ids[i]) {
                    let target = embedded.add_state(to.index());
                    embedded.add_probability(from, target, succession.probability.to_f64());
                }
            }
            let absorption = AbsorptionProbs::compute(&embedded)?;
            for bscc in absorption.bsccs() {
                if bscc.len() != 1 || vanishing[bscc[0]] {
                    return Err(AnalysisError::Timelock {
                        states: bscc
                            .iter()
                            .map(|&i| ids[i].to_string())
                            .collect::<Vec<_>>()
                            .join(", "),
                    });
                }
            }
            for &i in members {
                let row = absorption
                    .transient_index(&i)
                    .map(|ti| {
                        absorption
                            .bsccs()
                            .iter()
                            .enumerate()
                            .map(|(k, bscc)| (bscc[0], absorption.prob(ti, k)))
                            .filter(|(_, p)| *p > 0.0)
                            .collect()
                    })
                    .unwrap_or_default();
                absorb_rows.insert(i, row);
            }
        }

        // One pass over the original edges.
        for edge in g.edges() {
            if self.cancelled() {
                debug!("reduction cancelled while emitting edges");
                return self.finish(chain, &chain_idx);
            }
            let (i, j) = (edge.from.index(), edge.to.index());
            if vanishing[i] {
                // Consumed by the embedded chain of its component.
                continue;
            }
            let p = edge.payload.probability.to_f64();
            if vanishing[j] {
                for &(t, q) in &absorb_rows[&j] {
                    chain.add_probability(chain_idx[i], chain_idx[t], p * q);
                }
            } else {
                chain.add_probability(chain_idx[i], chain_idx[j], p);
            }
        }

        // Stop-absorbed states self-loop with probability one.
        for &id in &ids {
            if g.is_local_stop(id) && !vanishing[id.index()] {
                let ci = chain_idx[id.index()];
                chain.add_probability(ci, ci, 1.0);
            }
        }

        // Initial distribution: the root, or what the root resolves to.
        let root = g.root().index();
        if vanishing[root] {
            for &(t, q) in &absorb_rows[&root] {
                chain.add_initial(chain_idx[t], q);
            }
        } else {
            chain.add_initial(chain_idx[root], 1.0);
        }

        debug!(
            tangible = chain.len(),
            vanishing = components.iter().map(Vec::len).sum::<usize>(),
            "tangible reduction finished"
        );
        self.finish(chain, &chain_idx)
    }

    fn finish(
        &self,
        chain: Dtmc<Marking>,
        chain_idx: &[usize],
    ) -> Result<Ctmc<Marking>, AnalysisError> {
        let mut exit_rates = vec![0.0; chain.len()];
        for (graph_idx, &ci) in chain_idx.iter().enumerate() {
            if ci != usize::MAX {
                exit_rates[ci] = self.input.exit_rates[graph_idx].to_f64();
            }
        }
        Ok(Ctmc::from_parts(chain, exit_rates))
    }
}
