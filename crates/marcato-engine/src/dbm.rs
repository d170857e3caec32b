//! Difference-bound-matrix zones over transition clock variables.
//!
//! A zone constrains the times-to-fire of the enabled transitions. The
//! entry `B[i][j]` is an upper bound on `vars[j] − vars[i]`; the ground
//! variable `t*` is the constant zero, and the optional `age` variable
//! tracks (negated) elapsed time since the initial state.
//!
//! Every operation leaves the zone canonical: closed under triangle
//! tightening, with zero diagonal unless the zone is empty.

use crate::petri::TransitionId;
use marcato_common::{Num, OmegaNum};
use std::fmt::{self, Display};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A clock variable. The order (`Ground < Age < Transition`) fixes the
/// row layout, which makes zone equality independent of insertion
/// order.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Var {
    /// The ground `t*`: the zero of the current time frame.
    Ground,
    /// Elapsed time since the initial state, negated. Never fired,
    /// never projected.
    Age,
    Transition(TransitionId),
}

impl Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Var::Ground => write!(f, "t*"),
            Var::Age => write!(f, "age"),
            Var::Transition(t) => write!(f, "{t}"),
        }
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Dbm {
    vars: Vec<Var>,
    /// Row-major `n × n`; `bounds[i * n + j]` bounds `vars[j] − vars[i]`.
    bounds: Vec<OmegaNum>,
}

impl Dbm {
    /// The zone over the ground alone.
    pub fn new() -> Self {
        Dbm { vars: vec![Var::Ground], bounds: vec![OmegaNum::zero()] }
    }

    pub fn vars(&self) -> &[Var] {
        &self.vars
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn contains(&self, v: Var) -> bool {
        self.index(v).is_some()
    }

    fn index(&self, v: Var) -> Option<usize> {
        self.vars.binary_search(&v).ok()
    }

    fn at(&self, i: usize, j: usize) -> &OmegaNum {
        &self.bounds[i * self.vars.len() + j]
    }

    fn set(&mut self, i: usize, j: usize, b: OmegaNum) {
        let n = self.vars.len();
        self.bounds[i * n + j] = b;
    }

    /// `B[a][b]`: the upper bound on `b − a`. `None` when either
    /// variable is absent.
    pub fn bound(&self, a: Var, b: Var) -> Option<&OmegaNum> {
        Some(self.at(self.index(a)?, self.index(b)?))
    }

    /* ===================  canonical form  =================== */

    /// In-place Floyd–Warshall tightening. Emptiness shows up as a
    /// negative diagonal entry afterwards.
    pub fn canonicalize(&mut self) {
        let n = self.vars.len();
        for k in 0..n {
            for i in 0..n {
                if i == k {
                    continue;
                }
                let b_ik = self.at(i, k).clone();
                if b_ik.is_pos_inf() {
                    continue;
                }
                for j in 0..n {
                    if j == k {
                        continue;
                    }
                    let b_kj = self.at(k, j);
                    if b_kj.is_pos_inf() {
                        continue;
                    }
                    let via = &b_ik + b_kj;
                    if via < *self.at(i, j) {
                        self.set(i, j, via);
                    }
                }
            }
        }
    }

    /// A zone is empty when canonicalization uncovered a negative
    /// cycle.
    pub fn is_empty(&self) -> bool {
        let n = self.vars.len();
        (0..n).any(|i| self.at(i, i) < &OmegaNum::zero())
    }

    /* ===================  zone operations  =================== */

    /// Tighten `B[a][b]` toward `bound` and restore canonical form.
    pub fn tighten(&mut self, a: Var, b: Var, bound: OmegaNum) {
        let (Some(i), Some(j)) = (self.index(a), self.index(b)) else { return };
        if bound < *self.at(i, j) {
            self.set(i, j, bound);
            self.canonicalize();
        }
    }

    /// Condition the zone on `v` firing no later than any of `others`
    /// (`v ≤ w` for every `w`). The zone may come out empty.
    pub fn impose_var_lower(&mut self, v: Var, others: &[Var]) {
        let Some(vi) = self.index(v) else { return };
        let mut touched = false;
        for &w in others {
            if w == v {
                continue;
            }
            let Some(wi) = self.index(w) else { continue };
            // v − w ≤ 0
            if *self.at(wi, vi) > OmegaNum::zero() {
                self.set(wi, vi, OmegaNum::zero());
                touched = true;
            }
        }
        if touched {
            self.canonicalize();
        }
    }

    /// Make `v` the new ground: every variable shifts by `−v`, `v`
    /// becomes `t*`, and the old ground survives as an ordinary
    /// variable under `v`'s name. On a canonical zone this is exactly
    /// the exchange of the two rows and columns.
    pub fn set_new_ground(&mut self, v: Var) {
        let Some(vi) = self.index(v) else { return };
        let Some(gi) = self.index(Var::Ground) else { return };
        if vi == gi {
            return;
        }
        let n = self.vars.len();
        for j in 0..n {
            self.bounds.swap(gi * n + j, vi * n + j);
        }
        for i in 0..n {
            self.bounds.swap(i * n + gi, i * n + vi);
        }
        self.canonicalize();
    }

    /// Eliminate variables. The canonical submatrix over the survivors
    /// is already the exact projection.
    pub fn project_variables(&mut self, dead: &[Var]) {
        let keep: Vec<usize> = (0..self.vars.len())
            .filter(|&i| !dead.contains(&self.vars[i]))
            .collect();
        if keep.len() == self.vars.len() {
            return;
        }
        let n = self.vars.len();
        let mut bounds = Vec::with_capacity(keep.len() * keep.len());
        for &i in &keep {
            for &j in &keep {
                bounds.push(self.bounds[i * n + j].clone());
            }
        }
        self.vars = keep.into_iter().map(|i| self.vars[i]).collect();
        self.bounds = bounds;
    }

    /// Append newly enabled variables with static bounds
    /// `eft ≤ w ≤ lft` against the ground.
    pub fn add_variables(&mut self, news: &[(Var, Num, OmegaNum)]) {
        if news.is_empty() {
            return;
        }
        let mut vars = self.vars.clone();
        for (v, _, _) in news {
            debug_assert!(!vars.contains(v), "variable {v} already in the zone");
            vars.push(*v);
        }
        vars.sort();
        let n = vars.len();
        let old = &self.vars;
        let mut bounds = vec![OmegaNum::PosInf; n * n];
        for (i, vi) in vars.iter().enumerate() {
            for (j, vj) in vars.iter().enumerate() {
                if i == j {
                    bounds[i * n + j] = OmegaNum::zero();
                } else if let (Ok(oi), Ok(oj)) = (old.binary_search(vi), old.binary_search(vj)) {
                    bounds[i * n + j] = self.bounds[oi * old.len() + oj].clone();
                }
            }
        }
        let gi = vars.binary_search(&Var::Ground).unwrap_or(0);
        for (v, eft, lft) in news {
            let wi = vars.binary_search(v).unwrap_or(0);
            bounds[gi * n + wi] = lft.clone();
            bounds[wi * n + gi] = OmegaNum::Finite(-eft.clone());
        }
        self.vars = vars;
        self.bounds = bounds;
        self.canonicalize();
    }

    /// Add the `age` variable, pinned to the ground at time zero.
    pub fn add_age(&mut self) {
        self.add_variables(&[(Var::Age, Num::zero(), OmegaNum::zero())]);
    }

    /// Variables forced to coincide with `v`: zero bound both ways.
    pub fn null_delay_set(&self, v: Var) -> Vec<Var> {
        let Some(vi) = self.index(v) else { return Vec::new() };
        let zero = OmegaNum::zero();
        self.vars
            .iter()
            .enumerate()
            .filter(|&(i, _)| i != vi)
            .filter(|&(i, _)| *self.at(vi, i) == zero && *self.at(i, vi) == zero)
            .map(|(_, &w)| w)
            .collect()
    }

    /// Minimum elapsed time encoded by the `age` variable, if present.
    pub fn min_elapsed(&self) -> Option<Num> {
        match self.bound(Var::Ground, Var::Age)? {
            OmegaNum::Finite(sup_age) => Some(-sup_age.clone()),
            _ => None,
        }
    }
}

impl Default for Dbm {
    fn default() -> Self {
        Dbm::new()
    }
}

impl Display for Dbm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, vi) in self.vars.iter().enumerate() {
            for (j, vj) in self.vars.iter().enumerate() {
                if i == j {
                    continue;
                }
                let b = self.at(i, j);
                if !b.is_pos_inf() {
                    writeln!(f, "{vj} - {vi} <= {b}")?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tid(i: u32) -> TransitionId {
        // Transition ids are opaque outside the net; mint them through
        // a scratch net.
        let mut net = crate::petri::PetriNet::new();
        let mut id = net.add_transition("t0");
        for k in 1..=i {
            id = net.add_transition(&format!("t{k}"));
        }
        id
    }

    fn var(i: u32) -> Var {
        Var::Transition(tid(i))
    }

    fn zone(bounds: &[(u32, i64, i64)]) -> Dbm {
        let mut d = Dbm::new();
        let news: Vec<(Var, Num, OmegaNum)> = bounds
            .iter()
            .map(|&(i, eft, lft)| (var(i), Num::from_i64(eft), OmegaNum::from(lft)))
            .collect();
        d.add_variables(&news);
        d
    }

    #[test]
    fn fresh_zone_is_canonical_and_nonempty() {
        let d = zone(&[(0, 1, 2), (1, 0, 1)]);
        assert!(!d.is_empty());
        // Derived cross bounds come from the triangle through t*.
        assert_eq!(d.bound(var(0), var(1)), Some(&OmegaNum::zero()));
        assert_eq!(d.bound(var(1), var(0)), Some(&OmegaNum::from(2)));
    }

    #[test]
    fn canonicalization_is_idempotent() {
        let mut d = zone(&[(0, 1, 3), (1, 2, 5)]);
        let once = d.clone();
        d.canonicalize();
        assert_eq!(d, once);
    }

    #[test]
    fn contradiction_empties_the_zone() {
        let mut d = zone(&[(0, 3, 5), (1, 0, 1)]);
        // Force v0 to fire first although its eft exceeds v1's lft.
        d.impose_var_lower(var(0), &[var(1)]);
        assert!(d.is_empty());
    }

    #[test]
    fn firing_shift_matches_expected_bounds() {
        // Two newly enabled transitions with (eft,lft) = (1,2) and (0,1).
        let mut d = zone(&[(0, 1, 2), (1, 0, 1)]);
        // Fire the second at exactly t = 0.
        d.tighten(Var::Ground, var(1), OmegaNum::zero());
        d.impose_var_lower(var(1), &[var(0)]);
        assert!(!d.is_empty());
        d.set_new_ground(var(1));
        // The first keeps its (1,2) bounds relative to the new ground.
        assert_eq!(d.bound(Var::Ground, var(0)), Some(&OmegaNum::from(2)));
        assert_eq!(d.bound(var(0), Var::Ground), Some(&OmegaNum::from(-1)));
    }

    #[test]
    fn ground_shift_round_trips() {
        let mut d = zone(&[(0, 1, 2), (1, 0, 1), (2, 0, 4)]);
        d.impose_var_lower(var(1), &[var(0), var(2)]);
        let before = d.clone();
        d.set_new_ground(var(1));
        d.set_new_ground(var(1));
        assert_eq!(d, before);
    }

    #[test]
    fn projection_drops_rows_and_columns() {
        let mut d = zone(&[(0, 1, 2), (1, 0, 1)]);
        d.project_variables(&[var(0)]);
        assert!(!d.contains(var(0)));
        assert!(d.contains(var(1)));
        assert_eq!(d.bound(Var::Ground, var(1)), Some(&OmegaNum::from(1)));
        assert!(!d.is_empty());
    }

    #[test]
    fn null_delay_variables() {
        let mut d = zone(&[(0, 0, 0), (1, 0, 0), (2, 1, 2)]);
        d.canonicalize();
        let nd = d.null_delay_set(var(0));
        assert!(nd.contains(&Var::Ground));
        assert!(nd.contains(&var(1)));
        assert!(!nd.contains(&var(2)));
    }

    #[test]
    fn age_tracks_elapsed_time() {
        let mut d = Dbm::new();
        d.add_age();
        d.add_variables(&[(var(0), Num::from_i64(2), OmegaNum::from(3))]);
        assert_eq!(d.min_elapsed(), Some(Num::zero()));
        // Fire v0: age shifts by −v0 like every other variable.
        d.impose_var_lower(var(0), &[]);
        d.set_new_ground(var(0));
        d.project_variables(&[var(0)]);
        assert_eq!(d.min_elapsed(), Some(Num::from_i64(2)));
        assert!(!d.is_empty());
    }

    #[test]
    fn equality_ignores_insertion_order() {
        let mut a = Dbm::new();
        a.add_variables(&[
            (var(0), Num::zero(), OmegaNum::from(1)),
            (var(1), Num::one(), OmegaNum::from(2)),
        ]);
        let mut b = Dbm::new();
        b.add_variables(&[(var(1), Num::one(), OmegaNum::from(2))]);
        b.add_variables(&[(var(0), Num::zero(), OmegaNum::from(1))]);
        assert_eq!(a, b);
    }
}
