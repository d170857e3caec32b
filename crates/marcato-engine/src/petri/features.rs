//! Transition features: timing, stochastic behavior, priority, guards,
//! and post-firing updates.
//!
//! A transition carries at most one feature of each kind; the bag is a
//! small vector rather than a type-tag map.

use crate::expoly::Expolynomial;
use marcato_common::{Num, OmegaNum};
use marcato_expr::{Expr, Update};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Discriminant of a [`TransitionFeature`]; each transition holds at
/// most one feature per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureKind {
    Timed,
    Stochastic,
    Priority,
    EnablingFunction,
    PostUpdater,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionFeature {
    /// Static earliest/latest firing times. `lft` may be `+∞`.
    Timed { eft: Num, lft: OmegaNum },
    Stochastic(Stochastic),
    /// Higher value wins; a transition without the feature ranks below
    /// every transition that has one.
    Priority(i32),
    /// Boolean marking expression gating enabling.
    EnablingFunction(Expr),
    /// Sequential `place := expr;` assignments applied after the arc
    /// effects of a firing.
    PostUpdater(Vec<Update>),
}

impl TransitionFeature {
    pub fn kind(&self) -> FeatureKind {
        match self {
            TransitionFeature::Timed { .. } => FeatureKind::Timed,
            TransitionFeature::Stochastic(_) => FeatureKind::Stochastic,
            TransitionFeature::Priority(_) => FeatureKind::Priority,
            TransitionFeature::EnablingFunction(_) => FeatureKind::EnablingFunction,
            TransitionFeature::PostUpdater(_) => FeatureKind::PostUpdater,
        }
    }
}

/// The stochastic feature: a firing-time density plus marking-dependent
/// clock rate and weight expressions.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Stochastic {
    pub density: Density,
    pub clock_rate: Expr,
    pub weight: Expr,
}

impl Stochastic {
    fn with_density(density: Density) -> Self {
        Stochastic { density, clock_rate: Expr::constant(1), weight: Expr::constant(1) }
    }

    /// `EXP(rate)`: memoryless firing time, `lft = +∞`.
    pub fn exponential(rate: Num) -> Self {
        Self::with_density(Density::Exponential { rate })
    }

    /// An immediate transition: deterministic zero firing time with a
    /// firing weight.
    pub fn immediate(weight: Expr) -> Self {
        Stochastic { weight, ..Self::with_density(Density::Deterministic { value: Num::zero() }) }
    }

    pub fn uniform(low: Num, high: Num) -> Self {
        Self::with_density(Density::Uniform { low, high })
    }

    pub fn erlang(shape: u32, rate: Num) -> Self {
        Self::with_density(Density::Erlang { shape, rate })
    }

    pub fn deterministic(value: Num) -> Self {
        Self::with_density(Density::Deterministic { value })
    }

    pub fn partitioned(partitions: Vec<Partition>) -> Self {
        Self::with_density(Density::Partitioned(partitions))
    }

    pub fn with_clock_rate(mut self, clock_rate: Expr) -> Self {
        self.clock_rate = clock_rate;
        self
    }

    pub fn with_weight(mut self, weight: Expr) -> Self {
        self.weight = weight;
        self
    }

    /// Immediate means deterministic zero.
    pub fn is_immediate(&self) -> bool {
        matches!(&self.density, Density::Deterministic { value } if value.is_zero())
    }

    pub fn is_exponential(&self) -> bool {
        matches!(self.density, Density::Exponential { .. })
    }

    /// General (GEN): neither immediate nor exponential.
    pub fn is_general(&self) -> bool {
        !self.is_immediate() && !self.is_exponential()
    }
}

/// A firing-time density.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum Density {
    Exponential { rate: Num },
    Erlang { shape: u32, rate: Num },
    Uniform { low: Num, high: Num },
    Deterministic { value: Num },
    Partitioned(Vec<Partition>),
}

/// One piece of a piecewise expolynomial density.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    pub low: Num,
    pub high: OmegaNum,
    pub density: Expolynomial,
}

impl Density {
    /// The support `[eft, lft]` of the density.
    pub fn support(&self) -> (Num, OmegaNum) {
        match self {
            Density::Exponential { .. } | Density::Erlang { .. } => {
                (Num::zero(), OmegaNum::PosInf)
            }
            Density::Uniform { low, high } => (low.clone(), OmegaNum::Finite(high.clone())),
            Density::Deterministic { value } => {
                (value.clone(), OmegaNum::Finite(value.clone()))
            }
            Density::Partitioned(parts) => {
                let low = parts
                    .iter()
                    .map(|p| p.low.clone())
                    .min()
                    .unwrap_or_else(Num::zero);
                let high = parts
                    .iter()
                    .map(|p| p.high.clone())
                    .max()
                    .unwrap_or_else(|| OmegaNum::Finite(Num::zero()));
                (low, high)
            }
        }
    }

    /// Expected firing time.
    pub fn mean_f64(&self) -> f64 {
        match self {
            Density::Exponential { rate } => 1.0 / rate.to_f64(),
            Density::Erlang { shape, rate } => *shape as f64 / rate.to_f64(),
            Density::Uniform { low, high } => (low.to_f64() + high.to_f64()) / 2.0,
            Density::Deterministic { value } => value.to_f64(),
            Density::Partitioned(parts) => parts
                .iter()
                .map(|p| {
                    p.density
                        .multiply_monomial(&Num::one(), 1)
                        .definite_integral(&p.low, &p.high)
                })
                .sum(),
        }
    }

    /// The density as expolynomial pieces, when it has a continuous
    /// representation (Dirac masses have none).
    pub fn expolynomial_partitions(&self) -> Option<Vec<Partition>> {
        match self {
            Density::Exponential { rate } => Some(vec![Partition {
                low: Num::zero(),
                high: OmegaNum::PosInf,
                density: Expolynomial::monomial(rate.clone(), 0, rate.clone()),
            }]),
            Density::Erlang { shape, rate } => {
                // rate^k x^(k-1) e^(-rate x) / (k-1)!
                let k = *shape;
                let mut coeff = rate.pow(k as i32);
                let mut fact = Num::one();
                for i in 2..k {
                    fact = &fact * &Num::from_i64(i as i64);
                }
                if k >= 2 {
                    coeff = &coeff / &fact;
                }
                Some(vec![Partition {
                    low: Num::zero(),
                    high: OmegaNum::PosInf,
                    density: Expolynomial::monomial(coeff, k - 1, rate.clone()),
                }])
            }
            Density::Uniform { low, high } => {
                let width = high - low;
                let density = Expolynomial::constant(
                    Num::one().checked_div(&width).unwrap_or_else(Num::zero),
                );
                Some(vec![Partition {
                    low: low.clone(),
                    high: OmegaNum::Finite(high.clone()),
                    density,
                }])
            }
            Density::Deterministic { .. } => None,
            Density::Partitioned(parts) => Some(parts.clone()),
        }
    }
}
