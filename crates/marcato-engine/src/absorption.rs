//! Absorption probabilities of a finite DTMC.
//!
//! Partition the states into transient ones and bottom strongly
//! connected components, then solve `(I − Q) · A = R` for the
//! probability of ending up in each BSCC from each transient state.

use crate::chain::Dtmc;
use crate::error::AnalysisError;
use nalgebra::DMatrix;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use rustc_hash::FxHashMap;
use std::hash::Hash;
use tracing::trace;

/// The absorption matrix together with the state partition it was
/// computed over.
#[derive(Debug, Clone)]
pub struct AbsorptionProbs<S> {
    transient: Vec<S>,
    transient_lookup: FxHashMap<S, usize>,
    bsccs: Vec<Vec<S>>,
    probs: DMatrix<f64>,
}

impl<S: Clone + Eq + Hash> AbsorptionProbs<S> {
    /// Compute absorption probabilities for every transient state of
    /// the chain. Fails when `(I − Q)` is singular, which means the
    /// transient part is not actually transient.
    pub fn compute(chain: &Dtmc<S>) -> Result<Self, AnalysisError> {
        let n = chain.len();
        let mut graph: DiGraph<(), ()> = DiGraph::with_capacity(n, n);
        for _ in 0..n {
            graph.add_node(());
        }
        for i in 0..n {
            for &(j, _) in chain.transitions_from(i) {
                graph.add_edge(NodeIndex::new(i), NodeIndex::new(j), ());
            }
        }

        // Bottom SCCs: no edge leaves the component.
        let sccs = tarjan_scc(&graph);
        let mut scc_of = vec![usize::MAX; n];
        for (k, scc) in sccs.iter().enumerate() {
            for node in scc {
                scc_of[node.index()] = k;
            }
        }
        let mut is_bottom = vec![true; sccs.len()];
        for i in 0..n {
            for &(j, _) in chain.transitions_from(i) {
                if scc_of[i] != scc_of[j] {
                    is_bottom[scc_of[i]] = false;
                }
            }
        }

        let mut bsccs = Vec::new();
        let mut bscc_of = vec![usize::MAX; n];
        for (k, scc) in sccs.iter().enumerate() {
            if !is_bottom[k] {
                continue;
            }
            let members: Vec<S> =
                scc.iter().map(|node| chain.state(node.index()).clone()).collect();
            for node in scc {
                bscc_of[node.index()] = bsccs.len();
            }
            bsccs.push(members);
        }

        let transient_states: Vec<usize> =
            (0..n).filter(|&i| bscc_of[i] == usize::MAX).collect();
        let row_of: FxHashMap<usize, usize> =
            transient_states.iter().enumerate().map(|(row, &i)| (i, row)).collect();

        let t = transient_states.len();
        let r = bsccs.len();
        trace!(transient = t, bsccs = r, "absorption partition");

        let mut coeff = DMatrix::<f64>::identity(t, t);
        let mut rhs = DMatrix::<f64>::zeros(t, r);
        for (row, &i) in transient_states.iter().enumerate() {
            for &(j, p) in chain.transitions_from(i) {
                match row_of.get(&j) {
                    Some(&col) => coeff[(row, col)] -= p,
                    None => rhs[(row, bscc_of[j])] += p,
                }
            }
        }

        let probs = if t == 0 {
            DMatrix::zeros(0, r)
        } else {
            coeff.lu().solve(&rhs).ok_or(AnalysisError::SingularSystem)?
        };

        let transient: Vec<S> =
            transient_states.iter().map(|&i| chain.state(i).clone()).collect();
        let transient_lookup =
            transient.iter().enumerate().map(|(row, s)| (s.clone(), row)).collect();
        Ok(AbsorptionProbs { transient, transient_lookup, bsccs, probs })
    }

    /// Row index of a transient state, `None` for states inside a BSCC.
    pub fn transient_index(&self, state: &S) -> Option<usize> {
        self.transient_lookup.get(state).copied()
    }

    pub fn transient_states(&self) -> &[S] {
        &self.transient
    }

    /// The bottom strongly connected components, one set of member
    /// states each.
    pub fn bsccs(&self) -> &[Vec<S>] {
        &self.bsccs
    }

    /// `A[transient][bscc]`: probability of eventual absorption.
    pub fn prob(&self, transient: usize, bscc: usize) -> f64 {
        self.probs[(transient, bscc)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// a → b with 1/2, a → c with 1/2; b and c absorbing.
    #[test]
    fn splits_mass_between_absorbers() {
        let mut d: Dtmc<&str> = Dtmc::new();
        let a = d.add_state("a");
        let b = d.add_state("b");
        let c = d.add_state("c");
        d.add_probability(a, b, 0.5);
        d.add_probability(a, c, 0.5);

        let abs = AbsorptionProbs::compute(&d).unwrap();
        assert_eq!(abs.bsccs().len(), 2);
        assert_eq!(abs.transient_states(), &["a"]);
        let i = abs.transient_index(&"a").unwrap();
        let total: f64 = (0..2).map(|k| abs.prob(i, k)).sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert!((abs.prob(i, 0) - 0.5).abs() < 1e-9);
    }

    /// A transient cycle a ↔ b that leaks into an absorber.
    #[test]
    fn transient_cycles_resolve() {
        let mut d: Dtmc<&str> = Dtmc::new();
        let a = d.add_state("a");
        let b = d.add_state("b");
        let sink = d.add_state("sink");
        d.add_probability(a, b, 1.0);
        d.add_probability(b, a, 0.5);
        d.add_probability(b, sink, 0.5);

        let abs = AbsorptionProbs::compute(&d).unwrap();
        assert_eq!(abs.bsccs().len(), 1);
        let ia = abs.transient_index(&"a").unwrap();
        let ib = abs.transient_index(&"b").unwrap();
        assert!((abs.prob(ia, 0) - 1.0).abs() < 1e-9);
        assert!((abs.prob(ib, 0) - 1.0).abs() < 1e-9);
    }

    /// A closed cycle is its own BSCC, not transient.
    #[test]
    fn closed_cycles_are_bsccs() {
        let mut d: Dtmc<&str> = Dtmc::new();
        let a = d.add_state("a");
        let b = d.add_state("b");
        d.add_probability(a, b, 1.0);
        d.add_probability(b, a, 1.0);

        let abs = AbsorptionProbs::compute(&d).unwrap();
        assert_eq!(abs.bsccs().len(), 1);
        assert_eq!(abs.bsccs()[0].len(), 2);
        assert!(abs.transient_states().is_empty());
        assert_eq!(abs.transient_index(&"a"), None);
    }

    /// Multi-state BSCCs absorb as a unit.
    #[test]
    fn absorption_into_a_cycle() {
        let mut d: Dtmc<&str> = Dtmc::new();
        let start = d.add_state("start");
        let x = d.add_state("x");
        let y = d.add_state("y");
        let z = d.add_state("z");
        d.add_probability(start, x, 0.25);
        d.add_probability(start, z, 0.75);
        d.add_probability(x, y, 1.0);
        d.add_probability(y, x, 1.0);

        let abs = AbsorptionProbs::compute(&d).unwrap();
        assert_eq!(abs.bsccs().len(), 2);
        let i = abs.transient_index(&"start").unwrap();
        let cycle_k = abs
            .bsccs()
            .iter()
            .position(|members| members.contains(&"x"))
            .unwrap();
        assert!((abs.prob(i, cycle_k) - 0.25).abs() < 1e-9);
    }
}
