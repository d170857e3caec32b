//! Property tests for the canonical-form invariants of the DBM zone.

use crate::dbm::{Dbm, Var};
use crate::petri::{PetriNet, TransitionId};
use marcato_common::{Num, OmegaNum};
use proptest::prelude::*;

fn transition_ids(count: usize) -> Vec<TransitionId> {
    let mut net = PetriNet::new();
    (0..count).map(|i| net.add_transition(&format!("t{i}"))).collect()
}

/// Build a zone from `(eft, extra, unbounded)` triples:
/// `lft = eft + extra`, or `+∞` when `unbounded` is set.
fn zone_from(entries: &[(u8, u8, bool)]) -> (Dbm, Vec<Var>) {
    let ids = transition_ids(entries.len());
    let mut zone = Dbm::new();
    let news: Vec<(Var, Num, OmegaNum)> = entries
        .iter()
        .zip(&ids)
        .map(|(&(eft, extra, unbounded), &t)| {
            let eft = Num::from_i64(eft as i64);
            let lft = if unbounded {
                OmegaNum::PosInf
            } else {
                OmegaNum::Finite(&eft + &Num::from_i64(extra as i64))
            };
            (Var::Transition(t), eft, lft)
        })
        .collect();
    zone.add_variables(&news);
    let vars: Vec<Var> = ids.into_iter().map(Var::Transition).collect();
    (zone, vars)
}

fn assert_canonical(zone: &Dbm) {
    let zero = OmegaNum::zero();
    for &i in zone.vars() {
        assert_eq!(zone.bound(i, i), Some(&zero), "nonzero diagonal at {i}");
    }
    for &i in zone.vars() {
        for &j in zone.vars() {
            for &k in zone.vars() {
                let direct = zone.bound(i, j).unwrap();
                let via = zone.bound(i, k).unwrap() + zone.bound(k, j).unwrap();
                assert!(
                    *direct <= via,
                    "triangle violated: B[{i}][{j}] = {direct} > {via} via {k}"
                );
            }
        }
    }
}

proptest! {
    #[test]
    fn fresh_zones_are_canonical_and_nonempty(
        entries in prop::collection::vec((0u8..5, 0u8..5, any::<bool>()), 1..5)
    ) {
        let (zone, _) = zone_from(&entries);
        prop_assert!(!zone.is_empty());
        assert_canonical(&zone);
    }

    #[test]
    fn canonicalization_is_idempotent(
        entries in prop::collection::vec((0u8..5, 0u8..5, any::<bool>()), 1..5)
    ) {
        let (mut zone, _) = zone_from(&entries);
        let before = zone.clone();
        zone.canonicalize();
        prop_assert_eq!(before, zone);
    }

    #[test]
    fn conditioning_preserves_canonical_form(
        entries in prop::collection::vec((0u8..5, 0u8..5, any::<bool>()), 2..5),
        chosen in any::<prop::sample::Index>(),
    ) {
        let (mut zone, vars) = zone_from(&entries);
        let v = vars[chosen.index(vars.len())];
        zone.impose_var_lower(v, &vars);
        if !zone.is_empty() {
            assert_canonical(&zone);
        }
    }

    #[test]
    fn ground_shift_round_trips(
        entries in prop::collection::vec((0u8..5, 0u8..5, any::<bool>()), 2..5),
        chosen in any::<prop::sample::Index>(),
    ) {
        let (mut zone, vars) = zone_from(&entries);
        let v = vars[chosen.index(vars.len())];
        zone.impose_var_lower(v, &vars);
        prop_assume!(!zone.is_empty());
        let before = zone.clone();
        zone.set_new_ground(v);
        assert_canonical(&zone);
        zone.set_new_ground(v);
        prop_assert_eq!(before, zone);
    }

    #[test]
    fn projection_keeps_survivor_bounds(
        entries in prop::collection::vec((0u8..5, 0u8..5, any::<bool>()), 2..5),
        dropped in any::<prop::sample::Index>(),
    ) {
        let (mut zone, vars) = zone_from(&entries);
        let dead = vars[dropped.index(vars.len())];
        let before = zone.clone();
        zone.project_variables(&[dead]);
        prop_assert!(!zone.contains(dead));
        assert_canonical(&zone);
        for &a in zone.vars() {
            for &b in zone.vars() {
                prop_assert_eq!(zone.bound(a, b), before.bound(a, b));
            }
        }
    }
}
