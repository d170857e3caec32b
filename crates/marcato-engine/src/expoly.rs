//! Expolynomial algebra: sums of `c · x^k · e^(−λx)` terms.
//!
//! Coefficients and rates are exact rationals; the exponential only
//! becomes numeric at evaluation and at definite-integral boundaries.
//! Terms are kept normalized (sorted by rate then power, like terms
//! merged, zero coefficients dropped), so equality is structural.

use marcato_common::{EvalError, EvalErrorKind, Num, OmegaNum};
use std::ops::{Add, Neg, Sub};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One `coeff · x^power · e^(−rate·x)` term.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExpolyTerm {
    pub coeff: Num,
    pub power: u32,
    pub rate: Num,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Expolynomial {
    terms: Vec<ExpolyTerm>,
}

impl Expolynomial {
    pub fn zero() -> Self {
        Expolynomial::default()
    }

    pub fn constant(c: Num) -> Self {
        Expolynomial::from_terms(vec![ExpolyTerm { coeff: c, power: 0, rate: Num::zero() }])
    }

    pub fn one() -> Self {
        Expolynomial::constant(Num::one())
    }

    pub fn monomial(coeff: Num, power: u32, rate: Num) -> Self {
        Expolynomial::from_terms(vec![ExpolyTerm { coeff, power, rate }])
    }

    pub fn from_terms(terms: Vec<ExpolyTerm>) -> Self {
        let mut e = Expolynomial { terms };
        e.normalize();
        e
    }

    pub fn terms(&self) -> &[ExpolyTerm] {
        &self.terms
    }

    pub fn is_zero(&self) -> bool {
        self.terms.is_empty()
    }

    fn normalize(&mut self) {
        self.terms.sort_by(|a, b| (&a.rate, a.power).cmp(&(&b.rate, b.power)));
        let mut merged: Vec<ExpolyTerm> = Vec::with_capacity(self.terms.len());
        for term in self.terms.drain(..) {
            match merged.last_mut() {
                Some(last) if last.rate == term.rate && last.power == term.power => {
                    last.coeff = &last.coeff + &term.coeff;
                }
                _ => merged.push(term),
            }
        }
        merged.retain(|t| !t.coeff.is_zero());
        self.terms = merged;
    }

    pub fn scale(&self, factor: &Num) -> Self {
        Expolynomial::from_terms(
            self.terms
                .iter()
                .map(|t| ExpolyTerm {
                    coeff: &t.coeff * factor,
                    power: t.power,
                    rate: t.rate.clone(),
                })
                .collect(),
        )
    }

    /// Division by a constant; a zero divisor fails.
    pub fn checked_div_scalar(&self, divisor: &Num) -> Result<Self, EvalError> {
        if divisor.is_zero() {
            return Err(EvalError::new(EvalErrorKind::DivisionByZero)
                .with_message("expolynomial divided by zero"));
        }
        Ok(self.scale(&(&Num::one() / divisor)))
    }

    pub fn multiply(&self, other: &Expolynomial) -> Self {
        let mut terms = Vec::with_capacity(self.terms.len() * other.terms.len());
        for a in &self.terms {
            for b in &other.terms {
                terms.push(ExpolyTerm {
                    coeff: &a.coeff * &b.coeff,
                    power: a.power + b.power,
                    rate: &a.rate + &b.rate,
                });
            }
        }
        Expolynomial::from_terms(terms)
    }

    /// Multiply by `coeff · x^power`.
    pub fn multiply_monomial(&self, coeff: &Num, power: u32) -> Self {
        Expolynomial::from_terms(
            self.terms
                .iter()
                .map(|t| ExpolyTerm {
                    coeff: &t.coeff * coeff,
                    power: t.power + power,
                    rate: t.rate.clone(),
                })
                .collect(),
        )
    }

    /// Substitute `x → x + c`, i.e. the result is `f(x + c)`.
    ///
    /// The factor `e^(−λc)` is transcendental, so shifted coefficients
    /// go through `f64` and back.
    pub fn shift(&self, c: &Num) -> Self {
        let mut terms = Vec::new();
        for t in &self.terms {
            let decay = (-(&t.rate * c).to_f64()).exp();
            let decay = Num::from_f64(decay).unwrap_or_else(Num::zero);
            let scaled = &t.coeff * &decay;
            // (x + c)^p expanded binomially.
            for k in 0..=t.power {
                let coeff = &(&scaled * &binomial(t.power, k)) * &c.pow((t.power - k) as i32);
                terms.push(ExpolyTerm { coeff, power: k, rate: t.rate.clone() });
            }
        }
        Expolynomial::from_terms(terms)
    }

    /// Symbolic antiderivative (no integration constant).
    pub fn antiderivative(&self) -> Self {
        let mut terms = Vec::new();
        for t in &self.terms {
            if t.rate.is_zero() {
                // ∫ c x^p dx = c x^(p+1) / (p+1)
                terms.push(ExpolyTerm {
                    coeff: &t.coeff / &Num::from_i64((t.power + 1) as i64),
                    power: t.power + 1,
                    rate: Num::zero(),
                });
            } else {
                // ∫ x^p e^(−λx) dx = −e^(−λx) Σ_{j=0..p} (p!/j!) x^j / λ^(p−j+1)
                let mut falling = Num::one();
                for j in (0..=t.power).rev() {
                    let denom = t.rate.pow((t.power - j + 1) as i32);
                    terms.push(ExpolyTerm {
                        coeff: -&(&(&t.coeff * &falling) / &denom),
                        power: j,
                        rate: t.rate.clone(),
                    });
                    if j > 0 {
                        falling = &falling * &Num::from_i64(j as i64);
                    }
                }
            }
        }
        Expolynomial::from_terms(terms)
    }

    pub fn evaluate_f64(&self, x: f64) -> f64 {
        self.terms
            .iter()
            .map(|t| t.coeff.to_f64() * x.powi(t.power as i32) * (-t.rate.to_f64() * x).exp())
            .sum()
    }

    pub fn evaluate(&self, x: &Num) -> f64 {
        self.evaluate_f64(x.to_f64())
    }

    /// `∫_low^high f(x) dx`, numeric at the boundaries. An unbounded
    /// upper limit uses the term-wise limit of the antiderivative.
    pub fn definite_integral(&self, low: &Num, high: &OmegaNum) -> f64 {
        let anti = self.antiderivative();
        let upper = match high {
            OmegaNum::Finite(h) => anti.evaluate(h),
            OmegaNum::PosInf => anti.limit_at_infinity(),
            OmegaNum::NegInf => {
                debug_assert!(false, "integration to -inf");
                return f64::NAN;
            }
        };
        upper - anti.evaluate(low)
    }

    fn limit_at_infinity(&self) -> f64 {
        let mut limit = 0.0;
        for t in &self.terms {
            if t.rate.is_positive() {
                continue;
            }
            if t.rate.is_negative() || t.power > 0 {
                return if t.coeff.is_negative() { f64::NEG_INFINITY } else { f64::INFINITY };
            }
            limit += t.coeff.to_f64();
        }
        limit
    }
}

fn binomial(n: u32, k: u32) -> Num {
    let k = k.min(n - k);
    let mut out = Num::one();
    for i in 0..k {
        out = &(&out * &Num::from_i64((n - i) as i64)) / &Num::from_i64((i + 1) as i64);
    }
    out
}

impl Add for &Expolynomial {
    type Output = Expolynomial;
    fn add(self, rhs: &Expolynomial) -> Expolynomial {
        let mut terms = self.terms.clone();
        terms.extend(rhs.terms.iter().cloned());
        Expolynomial::from_terms(terms)
    }
}

impl Sub for &Expolynomial {
    type Output = Expolynomial;
    fn sub(self, rhs: &Expolynomial) -> Expolynomial {
        self + &(-rhs)
    }
}

impl Neg for &Expolynomial {
    type Output = Expolynomial;
    fn neg(self) -> Expolynomial {
        self.scale(&-Num::one())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expo(rate: i64) -> Expolynomial {
        // rate · e^(−rate·x), the exponential density
        Expolynomial::monomial(Num::from_i64(rate), 0, Num::from_i64(rate))
    }

    #[test]
    fn normalization_merges_and_drops() {
        let a = Expolynomial::monomial(Num::one(), 1, Num::zero());
        let b = Expolynomial::monomial(-Num::one(), 1, Num::zero());
        assert!((&a + &b).is_zero());
        let c = &a + &a;
        assert_eq!(c.terms().len(), 1);
        assert_eq!(c.terms()[0].coeff, Num::from_i64(2));
    }

    #[test]
    fn polynomial_integration_is_exact() {
        // ∫_0^2 (3x^2 + 1) dx = 8 + 2 = 10
        let p = &Expolynomial::monomial(Num::from_i64(3), 2, Num::zero())
            + &Expolynomial::one();
        let v = p.definite_integral(&Num::zero(), &OmegaNum::from(2));
        assert!((v - 10.0).abs() < 1e-12);
    }

    #[test]
    fn exponential_density_integrates_to_one() {
        let v = expo(2).definite_integral(&Num::zero(), &OmegaNum::PosInf);
        assert!((v - 1.0).abs() < 1e-12);
        // Mean of EXP(2) is 1/2.
        let mean = expo(2)
            .multiply_monomial(&Num::one(), 1)
            .definite_integral(&Num::zero(), &OmegaNum::PosInf);
        assert!((mean - 0.5).abs() < 1e-12);
    }

    #[test]
    fn shift_matches_pointwise_evaluation() {
        // f(x) = (2x + 1) e^(−x)
        let f = &Expolynomial::monomial(Num::from_i64(2), 1, Num::one())
            + &Expolynomial::monomial(Num::one(), 0, Num::one());
        let g = f.shift(&Num::from_i64(3));
        for x in [0.0, 0.5, 1.0, 2.5] {
            assert!((g.evaluate_f64(x) - f.evaluate_f64(x + 3.0)).abs() < 1e-9);
        }
    }

    #[test]
    fn division_by_zero_fails() {
        assert!(Expolynomial::one().checked_div_scalar(&Num::zero()).is_err());
        let halved = Expolynomial::one().checked_div_scalar(&Num::from_i64(2)).unwrap();
        assert_eq!(halved, Expolynomial::constant(Num::ratio(1, 2)));
    }

    #[test]
    fn uniform_mean() {
        // U(1,3): density 1/2 on [1,3]; mean 2.
        let d = Expolynomial::constant(Num::ratio(1, 2));
        let mean =
            d.multiply_monomial(&Num::one(), 1).definite_integral(&Num::one(), &OmegaNum::from(3));
        assert!((mean - 2.0).abs() < 1e-12);
    }

    #[test]
    fn unbounded_divergence() {
        let v = Expolynomial::one().definite_integral(&Num::zero(), &OmegaNum::PosInf);
        assert!(v.is_infinite() && v > 0.0);
    }
}
