//! Arbitrary-precision signed rationals with decimal-string I/O.
//!
//! `Num` is the number domain every exact computation in the engine runs
//! on: firing-time bounds, DBM entries, expolynomial coefficients.
//! Internally a `BigRational`; externally it parses and prints plain
//! decimal notation whenever the denominator allows it.

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Signed, ToPrimitive, Zero};
use std::cmp::Ordering;
use std::fmt::{self, Display};
use std::ops::{Add, Div, Mul, Neg, Sub};
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An exact signed rational number.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Num(BigRational);

/// Error produced when a decimal string cannot be read as a `Num`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseNumError {
    pub input: String,
}

impl Display for ParseNumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid decimal number '{}'", self.input)
    }
}

impl std::error::Error for ParseNumError {}

impl Num {
    pub fn zero() -> Self {
        Num(BigRational::zero())
    }

    pub fn one() -> Self {
        Num(BigRational::one())
    }

    pub fn from_i64(n: i64) -> Self {
        Num(BigRational::from_integer(BigInt::from(n)))
    }

    /// Exact ratio `numer / denom`. Panics if `denom` is zero, like the
    /// underlying rational constructor.
    pub fn ratio(numer: i64, denom: i64) -> Self {
        Num(BigRational::new(BigInt::from(numer), BigInt::from(denom)))
    }

    /// The exact rational value of an `f64` (its binary expansion, not a
    /// re-parse of its decimal rendering). `None` for NaN and infinities.
    pub fn from_f64(x: f64) -> Option<Self> {
        BigRational::from_float(x).map(Num)
    }

    pub fn into_inner(self) -> BigRational {
        self.0
    }

    pub fn as_ratio(&self) -> &BigRational {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_one(&self) -> bool {
        self.0.is_one()
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_negative()
    }

    pub fn is_positive(&self) -> bool {
        self.0.is_positive()
    }

    /// True when the value is a whole number.
    pub fn is_integer(&self) -> bool {
        self.0.is_integer()
    }

    pub fn abs(&self) -> Self {
        Num(self.0.abs())
    }

    pub fn min(self, other: Self) -> Self {
        if self <= other { self } else { other }
    }

    pub fn max(self, other: Self) -> Self {
        if self >= other { self } else { other }
    }

    /// Integer power; negative exponents invert (and panic on zero base,
    /// as exact inversion of zero has no value to return).
    pub fn pow(&self, exp: i32) -> Self {
        Num(self.0.pow(exp))
    }

    /// Division that reports a zero divisor instead of panicking.
    pub fn checked_div(&self, rhs: &Num) -> Option<Num> {
        if rhs.is_zero() {
            None
        } else {
            Some(Num(&self.0 / &rhs.0))
        }
    }

    pub fn to_f64(&self) -> f64 {
        // Ratio::to_f64 is None only for pathological bignum magnitudes;
        // saturate to the IEEE infinity of the matching sign.
        self.0.to_f64().unwrap_or(if self.0.is_negative() {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        })
    }

    /// Nearest integer, ties away from zero.
    pub fn round(&self) -> BigInt {
        self.0.round().to_integer()
    }

    pub fn floor(&self) -> BigInt {
        self.0.floor().to_integer()
    }

    /// Truncation toward zero.
    pub fn trunc(&self) -> BigInt {
        self.0.trunc().to_integer()
    }

    /// Nearest integer, ties to even (the IEEE rounding used by the
    /// real-valued remainder).
    pub fn round_half_even(&self) -> BigInt {
        let floor = self.0.floor();
        let frac = &self.0 - &floor;
        let half = BigRational::new(BigInt::one(), BigInt::from(2u32));
        let fi = floor.to_integer();
        match frac.cmp(&half) {
            Ordering::Less => fi,
            Ordering::Greater => fi + 1,
            Ordering::Equal => {
                if ((&fi) % BigInt::from(2u32)).is_zero() {
                    fi
                } else {
                    fi + 1
                }
            }
        }
    }
}

impl Default for Num {
    fn default() -> Self {
        Num::zero()
    }
}

impl From<i64> for Num {
    fn from(n: i64) -> Self {
        Num::from_i64(n)
    }
}

impl From<u32> for Num {
    fn from(n: u32) -> Self {
        Num::from_i64(n as i64)
    }
}

impl From<BigRational> for Num {
    fn from(r: BigRational) -> Self {
        Num(r)
    }
}

impl From<BigInt> for Num {
    fn from(i: BigInt) -> Self {
        Num(BigRational::from_integer(i))
    }
}

impl PartialOrd for Num {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Num {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

macro_rules! forward_binop {
    ($trait:ident, $method:ident) => {
        impl $trait for Num {
            type Output = Num;
            fn $method(self, rhs: Num) -> Num {
                Num((self.0).$method(rhs.0))
            }
        }
        impl<'a> $trait<&'a Num> for &'a Num {
            type Output = Num;
            fn $method(self, rhs: &'a Num) -> Num {
                Num((&self.0).$method(&rhs.0))
            }
        }
    };
}

forward_binop!(Add, add);
forward_binop!(Sub, sub);
forward_binop!(Mul, mul);

impl Div for Num {
    type Output = Num;
    /// Panics on a zero divisor; use `checked_div` where the divisor is
    /// not known to be nonzero.
    fn div(self, rhs: Num) -> Num {
        Num(self.0 / rhs.0)
    }
}

impl<'a> Div<&'a Num> for &'a Num {
    type Output = Num;
    fn div(self, rhs: &'a Num) -> Num {
        Num(&self.0 / &rhs.0)
    }
}

impl Neg for Num {
    type Output = Num;
    fn neg(self) -> Num {
        Num(-self.0)
    }
}

impl<'a> Neg for &'a Num {
    type Output = Num;
    fn neg(self) -> Num {
        Num(-&self.0)
    }
}

impl FromStr for Num {
    type Err = ParseNumError;

    /// Accepts plain decimal notation: optional sign, digits, optional
    /// fractional part (`3`, `-0.5`, `+1.25`). No exponents.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseNumError { input: s.to_string() };
        let (sign, rest) = match s.as_bytes().first() {
            Some(b'-') => (-1, &s[1..]),
            Some(b'+') => (1, &s[1..]),
            _ => (1, s),
        };
        if rest.is_empty() {
            return Err(err());
        }
        let (int_part, frac_part) = match rest.split_once('.') {
            Some((i, f)) => (i, f),
            None => (rest, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(err());
        }
        if !int_part.bytes().all(|b| b.is_ascii_digit())
            || !frac_part.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(err());
        }
        let digits = format!("{int_part}{frac_part}");
        let numer: BigInt = digits.parse().map_err(|_| err())?;
        let denom = BigInt::from(10u32).pow(frac_part.len() as u32);
        Ok(Num(BigRational::new(numer * sign, denom)))
    }
}

impl Display for Num {
    /// Decimal notation when the denominator is of the form 2^a·5^b,
    /// `p/q` otherwise.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_integer() {
            return write!(f, "{}", self.0.numer());
        }
        let denom = self.0.denom();
        let (two, five) = (BigInt::from(2u32), BigInt::from(5u32));
        let mut rest = denom.clone();
        let mut a = 0u32;
        let mut b = 0u32;
        while (&rest % &two).is_zero() {
            rest /= &two;
            a += 1;
        }
        while (&rest % &five).is_zero() {
            rest /= &five;
            b += 1;
        }
        if !rest.is_one() {
            return write!(f, "{}/{}", self.0.numer(), denom);
        }
        let scale = a.max(b);
        let ten = BigInt::from(10u32);
        let scaled = (self.0.numer() * ten.pow(scale) / denom).abs();
        let digits = scaled.to_string();
        let sign = if self.0.is_negative() { "-" } else { "" };
        let point = scale as usize;
        if digits.len() > point {
            let (int_digits, frac_digits) = digits.split_at(digits.len() - point);
            write!(f, "{sign}{int_digits}.{frac_digits}")
        } else {
            write!(f, "{sign}0.{digits:0>width$}", width = point)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_decimal_strings() {
        assert_eq!("3".parse::<Num>().unwrap(), Num::from_i64(3));
        assert_eq!("-0.5".parse::<Num>().unwrap(), Num::ratio(-1, 2));
        assert_eq!("1.25".parse::<Num>().unwrap(), Num::ratio(5, 4));
        assert!("1.2.3".parse::<Num>().is_err());
        assert!("".parse::<Num>().is_err());
        assert!("abc".parse::<Num>().is_err());
    }

    #[test]
    fn displays_decimals_and_ratios() {
        assert_eq!(Num::ratio(5, 4).to_string(), "1.25");
        assert_eq!(Num::ratio(-1, 2).to_string(), "-0.5");
        assert_eq!(Num::ratio(1, 3).to_string(), "1/3");
        assert_eq!(Num::from_i64(-7).to_string(), "-7");
        assert_eq!(Num::ratio(1, 200).to_string(), "0.005");
    }

    #[test]
    fn exact_arithmetic() {
        let third = Num::ratio(1, 3);
        let sum = &third + &third;
        assert_eq!(&sum + &third, Num::one());
        assert_eq!(Num::ratio(1, 2).checked_div(&Num::zero()), None);
        assert_eq!(
            Num::ratio(3, 2).checked_div(&Num::ratio(1, 2)),
            Some(Num::from_i64(3))
        );
    }

    #[test]
    fn rounding_ties_away_from_zero() {
        assert_eq!(Num::ratio(5, 2).round(), BigInt::from(3));
        assert_eq!(Num::ratio(-5, 2).round(), BigInt::from(-3));
        assert_eq!(Num::ratio(7, 3).round(), BigInt::from(2));
    }
}
