//! The number domain with ±∞ adjoined.
//!
//! DBM entries and latest-firing-time bounds live here. Finite values
//! absorb into infinities under addition; the two indeterminate forms
//! (`∞ − ∞` and `0·∞`) have no value and are rejected by the checked
//! operations.

use crate::num::Num;
use std::cmp::Ordering;
use std::fmt::{self, Display};
use std::ops::{Add, Neg};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A `Num` or one of the two infinities.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OmegaNum {
    NegInf,
    Finite(Num),
    PosInf,
}

impl OmegaNum {
    pub fn zero() -> Self {
        OmegaNum::Finite(Num::zero())
    }

    pub fn is_finite(&self) -> bool {
        matches!(self, OmegaNum::Finite(_))
    }

    pub fn is_pos_inf(&self) -> bool {
        matches!(self, OmegaNum::PosInf)
    }

    pub fn is_zero(&self) -> bool {
        matches!(self, OmegaNum::Finite(n) if n.is_zero())
    }

    /// The finite payload, if any.
    pub fn finite(&self) -> Option<&Num> {
        match self {
            OmegaNum::Finite(n) => Some(n),
            _ => None,
        }
    }

    /// Sum, or `None` for the indeterminate `+∞ + −∞`.
    pub fn try_add(&self, rhs: &OmegaNum) -> Option<OmegaNum> {
        use OmegaNum::*;
        match (self, rhs) {
            (PosInf, NegInf) | (NegInf, PosInf) => None,
            (PosInf, _) | (_, PosInf) => Some(PosInf),
            (NegInf, _) | (_, NegInf) => Some(NegInf),
            (Finite(a), Finite(b)) => Some(Finite(a + b)),
        }
    }

    /// Product, or `None` for the indeterminate `0·∞`.
    pub fn try_mul(&self, rhs: &OmegaNum) -> Option<OmegaNum> {
        use OmegaNum::*;
        match (self, rhs) {
            (Finite(a), Finite(b)) => Some(Finite(a * b)),
            (Finite(n), inf) | (inf, Finite(n)) => {
                if n.is_zero() {
                    None
                } else if n.is_negative() == matches!(inf, NegInf) {
                    Some(PosInf)
                } else {
                    Some(NegInf)
                }
            }
            (PosInf, PosInf) | (NegInf, NegInf) => Some(PosInf),
            (PosInf, NegInf) | (NegInf, PosInf) => Some(NegInf),
        }
    }

    pub fn min(self, other: Self) -> Self {
        if self <= other { self } else { other }
    }

    pub fn max(self, other: Self) -> Self {
        if self >= other { self } else { other }
    }

    pub fn to_f64(&self) -> f64 {
        match self {
            OmegaNum::NegInf => f64::NEG_INFINITY,
            OmegaNum::Finite(n) => n.to_f64(),
            OmegaNum::PosInf => f64::INFINITY,
        }
    }
}

impl From<Num> for OmegaNum {
    fn from(n: Num) -> Self {
        OmegaNum::Finite(n)
    }
}

impl From<i64> for OmegaNum {
    fn from(n: i64) -> Self {
        OmegaNum::Finite(Num::from_i64(n))
    }
}

impl PartialOrd for OmegaNum {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OmegaNum {
    fn cmp(&self, other: &Self) -> Ordering {
        use OmegaNum::*;
        match (self, other) {
            (NegInf, NegInf) | (PosInf, PosInf) => Ordering::Equal,
            (NegInf, _) | (_, PosInf) => Ordering::Less,
            (PosInf, _) | (_, NegInf) => Ordering::Greater,
            (Finite(a), Finite(b)) => a.cmp(b),
        }
    }
}

impl<'a> Add<&'a OmegaNum> for &'a OmegaNum {
    type Output = OmegaNum;

    /// Bound addition. The indeterminate `+∞ + −∞` panics; canonical
    /// zones never hold a `NegInf` entry, so the DBM paths cannot reach
    /// it. Use `try_add` where the operands are unconstrained.
    fn add(self, rhs: &'a OmegaNum) -> OmegaNum {
        match self.try_add(rhs) {
            Some(v) => v,
            None => panic!("indeterminate sum of opposite infinities"),
        }
    }
}

impl Add for OmegaNum {
    type Output = OmegaNum;
    fn add(self, rhs: OmegaNum) -> OmegaNum {
        &self + &rhs
    }
}

impl Neg for OmegaNum {
    type Output = OmegaNum;
    fn neg(self) -> OmegaNum {
        match self {
            OmegaNum::NegInf => OmegaNum::PosInf,
            OmegaNum::Finite(n) => OmegaNum::Finite(-n),
            OmegaNum::PosInf => OmegaNum::NegInf,
        }
    }
}

impl Display for OmegaNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OmegaNum::NegInf => write!(f, "-inf"),
            OmegaNum::Finite(n) => write!(f, "{n}"),
            OmegaNum::PosInf => write!(f, "inf"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absorption_and_order() {
        let two = OmegaNum::from(2);
        assert_eq!(two.try_add(&OmegaNum::PosInf), Some(OmegaNum::PosInf));
        assert_eq!(OmegaNum::NegInf.try_add(&two), Some(OmegaNum::NegInf));
        assert!(OmegaNum::NegInf < two);
        assert!(two < OmegaNum::PosInf);
        assert_eq!(OmegaNum::from(1).min(OmegaNum::PosInf), OmegaNum::from(1));
    }

    #[test]
    fn indeterminate_forms_fail() {
        assert_eq!(OmegaNum::PosInf.try_add(&OmegaNum::NegInf), None);
        assert_eq!(OmegaNum::zero().try_mul(&OmegaNum::PosInf), None);
        assert_eq!(OmegaNum::PosInf.try_mul(&OmegaNum::zero()), None);
    }

    #[test]
    fn signed_products() {
        let neg = OmegaNum::from(-3);
        assert_eq!(neg.try_mul(&OmegaNum::PosInf), Some(OmegaNum::NegInf));
        assert_eq!(neg.try_mul(&OmegaNum::NegInf), Some(OmegaNum::PosInf));
        assert_eq!(
            OmegaNum::PosInf.try_mul(&OmegaNum::NegInf),
            Some(OmegaNum::NegInf)
        );
    }
}
