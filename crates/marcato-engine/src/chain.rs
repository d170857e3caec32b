//! Discrete- and continuous-time Markov chain outputs.

use rustc_hash::FxHashMap;
use std::fmt;
use std::hash::Hash;

/// Tolerance for row-stochasticity checks.
pub const ROW_SUM_TOLERANCE: f64 = 1e-9;

/// A defect found by [`Dtmc::validate`].
#[derive(Debug, Clone, PartialEq)]
pub enum ChainDefect {
    /// A non-absorbing row whose probabilities do not sum to one.
    RowSum { state: usize, sum: f64 },
    /// The initial distribution does not sum to one.
    InitialSum { sum: f64 },
}

impl fmt::Display for ChainDefect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainDefect::RowSum { state, sum } => {
                write!(f, "row {state} sums to {sum}, expected 1")
            }
            ChainDefect::InitialSum { sum } => {
                write!(f, "initial distribution sums to {sum}, expected 1")
            }
        }
    }
}

impl std::error::Error for ChainDefect {}

/// A discrete-time Markov chain over states `S`: an initial
/// distribution and a weighted probability graph. Edges are strictly
/// positive; parallel insertions accumulate.
#[derive(Debug, Clone)]
pub struct Dtmc<S> {
    states: Vec<S>,
    index: FxHashMap<S, usize>,
    initial: Vec<(usize, f64)>,
    edges: Vec<Vec<(usize, f64)>>,
}

impl<S: Clone + Eq + Hash> Default for Dtmc<S> {
    fn default() -> Self {
        Dtmc { states: Vec::new(), index: FxHashMap::default(), initial: Vec::new(), edges: Vec::new() }
    }
}

impl<S: Clone + Eq + Hash> Dtmc<S> {
    pub fn new() -> Self {
        Dtmc::default()
    }

    /// Intern a state, returning its index.
    pub fn add_state(&mut self, state: S) -> usize {
        if let Some(&i) = self.index.get(&state) {
            return i;
        }
        let i = self.states.len();
        self.index.insert(state.clone(), i);
        self.states.push(state);
        self.edges.push(Vec::new());
        i
    }

    pub fn index_of(&self, state: &S) -> Option<usize> {
        self.index.get(state).copied()
    }

    pub fn state(&self, i: usize) -> &S {
        &self.states[i]
    }

    pub fn states(&self) -> &[S] {
        &self.states
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Add initial probability mass to a state.
    pub fn add_initial(&mut self, state: usize, p: f64) {
        if p <= 0.0 {
            return;
        }
        match self.initial.iter_mut().find(|(s, _)| *s == state) {
            Some(entry) => entry.1 += p,
            None => self.initial.push((state, p)),
        }
    }

    /// The initial distribution as `(index, probability)` pairs.
    pub fn initial(&self) -> &[(usize, f64)] {
        &self.initial
    }

    /// Accumulate probability on an edge; non-positive mass is ignored
    /// so the graph never stores zero-weight edges.
    pub fn add_probability(&mut self, from: usize, to: usize, p: f64) {
        if p <= 0.0 {
            return;
        }
        match self.edges[from].iter_mut().find(|(t, _)| *t == to) {
            Some(entry) => entry.1 += p,
            None => self.edges[from].push((to, p)),
        }
    }

    /// Outgoing `(target, probability)` pairs of a state.
    pub fn transitions_from(&self, state: usize) -> &[(usize, f64)] {
        &self.edges[state]
    }

    pub fn probability(&self, from: usize, to: usize) -> f64 {
        self.edges[from].iter().find(|(t, _)| *t == to).map(|(_, p)| *p).unwrap_or(0.0)
    }

    /// Check stochasticity: every non-absorbing row and the initial
    /// distribution sum to one within [`ROW_SUM_TOLERANCE`].
    pub fn validate(&self) -> Result<(), ChainDefect> {
        for (i, row) in self.edges.iter().enumerate() {
            if row.is_empty() {
                continue;
            }
            let sum: f64 = row.iter().map(|(_, p)| p).sum();
            if (sum - 1.0).abs() > ROW_SUM_TOLERANCE {
                return Err(ChainDefect::RowSum { state: i, sum });
            }
        }
        let sum: f64 = self.initial.iter().map(|(_, p)| p).sum();
        if (sum - 1.0).abs() > ROW_SUM_TOLERANCE {
            return Err(ChainDefect::InitialSum { sum });
        }
        Ok(())
    }
}

/// A continuous-time Markov chain: the embedded DTMC plus per-state
/// exit rates.
#[derive(Debug, Clone)]
pub struct Ctmc<S> {
    chain: Dtmc<S>,
    exit_rates: Vec<f64>,
}

impl<S: Clone + Eq + Hash> Ctmc<S> {
    /// Pair a chain with exit rates aligned to its state indices.
    pub fn from_parts(chain: Dtmc<S>, exit_rates: Vec<f64>) -> Self {
        debug_assert_eq!(chain.len(), exit_rates.len());
        Ctmc { chain, exit_rates }
    }

    pub fn dtmc(&self) -> &Dtmc<S> {
        &self.chain
    }

    pub fn exit_rate(&self, state: usize) -> f64 {
        self.exit_rates[state]
    }

    pub fn exit_rates(&self) -> &[f64] {
        &self.exit_rates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_parallel_edges() {
        let mut d: Dtmc<&str> = Dtmc::new();
        let a = d.add_state("a");
        let b = d.add_state("b");
        assert_eq!(d.add_state("a"), a);
        d.add_probability(a, b, 0.25);
        d.add_probability(a, b, 0.75);
        d.add_probability(a, b, 0.0);
        assert_eq!(d.transitions_from(a), &[(b, 1.0)]);
        assert_eq!(d.probability(a, b), 1.0);
        d.add_initial(a, 1.0);
        d.validate().unwrap();
    }

    #[test]
    fn validation_catches_bad_rows() {
        let mut d: Dtmc<&str> = Dtmc::new();
        let a = d.add_state("a");
        let b = d.add_state("b");
        d.add_probability(a, b, 0.5);
        d.add_initial(a, 1.0);
        assert!(matches!(d.validate(), Err(ChainDefect::RowSum { state: 0, .. })));
        // Absorbing rows are exempt.
        d.add_probability(a, a, 0.5);
        d.validate().unwrap();
    }

    #[test]
    fn ctmc_pairs_rates_with_states() {
        let mut d: Dtmc<&str> = Dtmc::new();
        let a = d.add_state("a");
        let b = d.add_state("b");
        d.add_probability(a, b, 1.0);
        d.add_initial(a, 1.0);
        let c = Ctmc::from_parts(d, vec![2.0, 0.0]);
        assert_eq!(c.exit_rate(a), 2.0);
        assert_eq!(c.exit_rate(b), 0.0);
    }
}
