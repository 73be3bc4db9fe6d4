//! Estimate curves and pointwise algebra between step curves.
//!
//! An [`EstimateCurve`] bundles everything an estimator produces: the point
//! estimate, its variance, and a pointwise confidence band, all as
//! [`StepCurve`]s on a common timeline.
//!
//! Curves are compared with [`combine`], which aligns two step curves on the
//! union of their timelines (forward fill) before applying the operation.
//!
//! # Examples
//!
//! ```
//! use lifespan_stats::{
//!     curve::{self, CurveOp},
//!     timeline::{StepCurve, Timeline},
//! };
//!
//! let a = StepCurve::new(Timeline::new([1.0, 3.0]).unwrap(), vec![0.8, 0.4], 1.0).unwrap();
//! let b = StepCurve::new(Timeline::new([2.0]).unwrap(), vec![0.5], 1.0).unwrap();
//!
//! let diff = curve::combine(&a, &b, CurveOp::Subtract);
//! assert_eq!(diff.timeline().points(), &[1.0, 2.0, 3.0]);
//! assert_eq!(diff.values(), &[0.8 - 1.0, 0.8 - 0.5, 0.4 - 0.5]);
//! ```

use serde::{Deserialize, Serialize};

use crate::timeline::{StepCurve, Timeline};

/// What an estimate curve measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurveKind {
    /// Survival probability, starting at 1 and non-increasing.
    Survival,
    /// Cumulative hazard, starting at 0 and non-decreasing.
    CumulativeHazard,
}

impl CurveKind {
    /// Value of the curve before the first timeline point.
    #[must_use]
    pub const fn boundary(self) -> f64 {
        match self {
            Self::Survival => 1.0,
            Self::CumulativeHazard => 0.0,
        }
    }
}

/// The output of a fitted estimator.
///
/// Curves are shared behind [`std::sync::Arc`] by the fitters and never
/// modified after construction; refitting an estimator produces a new curve.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EstimateCurve {
    pub label: String,
    pub kind: CurveKind,
    /// Coverage of the confidence band, `1 - alpha`.
    pub confidence_level: f64,
    pub estimate: StepCurve,
    pub variance: StepCurve,
    pub lower: StepCurve,
    pub upper: StepCurve,
}

impl EstimateCurve {
    #[must_use]
    pub fn timeline(&self) -> &Timeline {
        self.estimate.timeline()
    }

    /// Re-expresses all component curves on another timeline.
    #[must_use]
    pub fn reindex(&self, timeline: &Timeline) -> Self {
        Self {
            label: self.label.clone(),
            kind: self.kind,
            confidence_level: self.confidence_level,
            estimate: self.estimate.reindex(timeline),
            variance: self.variance.reindex(timeline),
            lower: self.lower.reindex(timeline),
            upper: self.upper.reindex(timeline),
        }
    }
}

/// A pointwise binary operation on step curves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurveOp {
    /// `a - b`
    Subtract,
    /// `a / b`, NaN where `b` is zero.
    Divide,
}

impl CurveOp {
    #[must_use]
    pub fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            Self::Subtract => a - b,
            // A zero survival tail is a legitimate terminal state, not an error.
            Self::Divide if b == 0.0 => f64::NAN,
            Self::Divide => a / b,
        }
    }
}

/// Applies `op` pointwise after aligning both curves on their union timeline.
///
/// The boundary value of the result is `op` applied to the two boundaries.
#[must_use]
pub fn combine(a: &StepCurve, b: &StepCurve, op: CurveOp) -> StepCurve {
    let timeline = a.timeline().union(b.timeline());
    let a = a.reindex(&timeline);
    let b = b.reindex(&timeline);
    let values = a
        .values()
        .iter()
        .zip(b.values())
        .map(|(&x, &y)| op.apply(x, y))
        .collect();
    StepCurve::from_parts(timeline, values, op.apply(a.boundary(), b.boundary()))
}

/// Pointwise `a - b` on the union timeline.
#[must_use]
pub fn subtract(a: &StepCurve, b: &StepCurve) -> StepCurve {
    combine(a, b, CurveOp::Subtract)
}

/// Pointwise `a / b` on the union timeline, NaN where `b` is zero.
#[must_use]
pub fn divide(a: &StepCurve, b: &StepCurve) -> StepCurve {
    combine(a, b, CurveOp::Divide)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(points: &[f64], values: &[f64], boundary: f64) -> StepCurve {
        StepCurve::new(
            Timeline::new(points.iter().copied()).unwrap(),
            values.to_vec(),
            boundary,
        )
        .unwrap()
    }

    #[test]
    fn test_divide_by_zero_tail_is_nan() {
        let a = step(&[1.0, 2.0], &[0.5, 0.25], 1.0);
        let b = step(&[1.0, 2.0], &[0.5, 0.0], 1.0);
        let ratio = divide(&a, &b);
        assert_eq!(ratio.values()[0], 1.0);
        assert!(ratio.values()[1].is_nan());
        assert_eq!(ratio.boundary(), 1.0);
    }

    #[test]
    fn test_divide_zero_boundaries() {
        let a = step(&[1.0], &[0.5], 0.0);
        let b = step(&[2.0], &[0.25], 0.0);
        let ratio = divide(&a, &b);
        assert!(ratio.boundary().is_nan());
        assert!(ratio.value_at(1.5).is_nan());
        assert_eq!(ratio.value_at(2.0), 2.0);
    }

    #[test]
    fn test_subtract_self_is_zero() {
        let a = step(&[1.0, 2.0, 5.0], &[0.9, 0.5, 0.1], 1.0);
        let diff = subtract(&a, &a);
        assert!(diff.values().iter().all(|&v| v == 0.0));
        assert_eq!(diff.boundary(), 0.0);
    }

    #[test]
    fn test_combine_past_last_point_keeps_last_value() {
        let a = step(&[1.0], &[0.5], 1.0);
        let b = step(&[1.0, 10.0], &[0.8, 0.4], 1.0);
        let diff = subtract(&a, &b);
        assert_eq!(diff.value_at(10.0), 0.5 - 0.4);
    }
}
