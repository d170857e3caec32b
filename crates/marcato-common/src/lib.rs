pub mod error;
pub mod num;
pub mod omega;
pub mod value;

pub use error::*;
pub use num::*;
pub use omega::*;
pub use value::*;

/// Tolerance for "is zero" / "is one" tests on values that have crossed
/// the `f64` boundary (weights, rates, probabilities).
pub const EPSILON: f64 = 1e-6;
