//! Activation function for compiled networks.
//!
//! Every hidden and output node uses the same steepened logistic curve
//! `σ(x) = 1 / (1 + e^(-4.9x))`. Input nodes pass their values through
//! untouched.

/// Slope of the logistic curve.
pub const SIGMOID_SLOPE: f64 = 4.9;

/// Steepened logistic: `1 / (1 + e^(-4.9x))`.
///
/// NaN propagates. Infinite inputs saturate to `0.0` or `1.0`.
#[inline]
#[must_use]
pub fn steepened_sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-SIGMOID_SLOPE * x).exp())
}
