//! Reference distributions used for confidence bands and test p-values.
//!
//! Thin wrappers around [`statrs`] that encode the conventions of this crate:
//! two-sided normal critical values for confidence bands, and upper-tail
//! chi-squared probabilities for the log-rank family.

use statrs::{
    distribution::{ContinuousCDF as _, Normal},
    function::gamma,
};

/// Quantile of the standard normal distribution.
///
/// # Examples
///
/// ```
/// # use lifespan_stats::distribution::normal_quantile;
/// assert!((normal_quantile(0.975) - 1.959_964).abs() < 1e-6);
/// assert_eq!(normal_quantile(0.5), 0.0);
/// ```
#[must_use]
pub fn normal_quantile(p: f64) -> f64 {
    Normal::new(0.0, 1.0).map_or(f64::NAN, |n| n.inverse_cdf(p))
}

/// Critical value `z` such that a two-sided `1 - alpha` interval is `± z`.
#[must_use]
pub fn two_sided_critical_value(alpha: f64) -> f64 {
    normal_quantile(1.0 - alpha / 2.0)
}

/// Upper-tail probability `P(X >= statistic)` for `X ~ χ²(degrees_of_freedom)`.
///
/// A statistic of zero (or below) has probability one; an infinite statistic
/// has probability zero.
///
/// # Examples
///
/// ```
/// # use lifespan_stats::distribution::chi_squared_sf;
/// assert_eq!(chi_squared_sf(0.0, 1), 1.0);
/// assert!((chi_squared_sf(3.841_459, 1) - 0.05).abs() < 1e-6);
/// assert!((chi_squared_sf(5.991_465, 2) - 0.05).abs() < 1e-6);
/// ```
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn chi_squared_sf(statistic: f64, degrees_of_freedom: usize) -> f64 {
    if statistic.is_nan() {
        return f64::NAN;
    }
    if statistic <= 0.0 {
        return 1.0;
    }
    if statistic.is_infinite() {
        return 0.0;
    }
    gamma::checked_gamma_ur(degrees_of_freedom as f64 / 2.0, statistic / 2.0)
        .map_or(f64::NAN, |p| p.clamp(0.0, 1.0))
}
