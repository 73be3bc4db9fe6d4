//! Timelines and forward-filled step curves.
//!
//! Every estimate in this crate is a right-continuous, piecewise-constant
//! function of time. A [`StepCurve`] stores such a function as its values at
//! the points of a [`Timeline`] plus a boundary value that applies before the
//! first point.
//!
//! # Forward fill
//!
//! Querying a step curve at time `t` returns the value at the greatest
//! timeline point `<= t`:
//!
//! ```text
//! value
//!  1.0 ─────┐                       (boundary before the first point)
//!           └────┐
//!  0.6           │      ┌── ...     (flat after the last point)
//!                └──────┘
//!          t0   t1     t2
//! ```
//!
//! Times after the last point keep the last value. This flat extrapolation is
//! an approximation: it says nothing about the process beyond the data.

use serde::Serialize;

use crate::SurvivalError;

/// A strictly increasing sequence of time points.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Timeline {
    points: Vec<f64>,
}

impl Timeline {
    /// Creates a timeline from arbitrary points, sorting and deduplicating them.
    ///
    /// # Errors
    ///
    /// Returns [`SurvivalError::InvalidParameter`] if any point is NaN.
    ///
    /// # Examples
    ///
    /// ```
    /// # use lifespan_stats::timeline::Timeline;
    /// let timeline = Timeline::new([3.0, 1.0, 2.0, 1.0]).unwrap();
    /// assert_eq!(timeline.points(), &[1.0, 2.0, 3.0]);
    /// assert!(Timeline::new([f64::NAN]).is_err());
    /// ```
    pub fn new<I>(points: I) -> Result<Self, SurvivalError>
    where
        I: IntoIterator<Item = f64>,
    {
        let mut points = points.into_iter().collect::<Vec<_>>();
        if points.iter().any(|p| p.is_nan()) {
            return Err(SurvivalError::invalid_parameter(
                "timeline points must not be NaN",
            ));
        }
        points.sort_by(f64::total_cmp);
        points.dedup_by(|a, b| a == b);
        Ok(Self { points })
    }

    /// Wraps points that are already strictly increasing.
    pub(crate) fn from_sorted(points: Vec<f64>) -> Self {
        debug_assert!(
            points.is_sorted_by(|a, b| a < b),
            "timeline points must be strictly increasing"
        );
        Self { points }
    }

    /// Merges two timelines into one containing the points of both.
    ///
    /// # Examples
    ///
    /// ```
    /// # use lifespan_stats::timeline::Timeline;
    /// let a = Timeline::new([1.0, 3.0]).unwrap();
    /// let b = Timeline::new([2.0, 3.0, 4.0]).unwrap();
    /// assert_eq!(a.union(&b).points(), &[1.0, 2.0, 3.0, 4.0]);
    /// ```
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        let (a, b) = (&self.points, &other.points);
        let mut merged = Vec::with_capacity(a.len() + b.len());
        let (mut i, mut j) = (0, 0);
        while i < a.len() && j < b.len() {
            match a[i].total_cmp(&b[j]) {
                std::cmp::Ordering::Less => {
                    merged.push(a[i]);
                    i += 1;
                }
                std::cmp::Ordering::Greater => {
                    merged.push(b[j]);
                    j += 1;
                }
                std::cmp::Ordering::Equal => {
                    merged.push(a[i]);
                    i += 1;
                    j += 1;
                }
            }
        }
        merged.extend_from_slice(&a[i..]);
        merged.extend_from_slice(&b[j..]);
        merged.dedup_by(|x, y| x == y);
        Self::from_sorted(merged)
    }

    /// Keeps only the points `<= t`.
    #[must_use]
    pub fn truncate_after(&self, t: f64) -> Self {
        let end = self.points.partition_point(|&p| p <= t);
        Self::from_sorted(self.points[..end].to_vec())
    }

    #[must_use]
    pub fn points(&self) -> &[f64] {
        &self.points
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[must_use]
    pub fn first(&self) -> Option<f64> {
        self.points.first().copied()
    }

    #[must_use]
    pub fn last(&self) -> Option<f64> {
        self.points.last().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().copied()
    }

    /// Index of the greatest point `<= t`, or `None` if `t` precedes every point.
    #[must_use]
    pub fn position_at_or_before(&self, t: f64) -> Option<usize> {
        self.points.partition_point(|&p| p <= t).checked_sub(1)
    }
}

/// A right-continuous piecewise-constant function of time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepCurve {
    timeline: Timeline,
    values: Vec<f64>,
    boundary: f64,
}

impl StepCurve {
    /// Creates a step curve from its values at each timeline point.
    ///
    /// `boundary` is the value reported before the first timeline point.
    ///
    /// # Errors
    ///
    /// Returns [`SurvivalError::InvalidParameter`] if the number of values
    /// differs from the number of timeline points.
    pub fn new(timeline: Timeline, values: Vec<f64>, boundary: f64) -> Result<Self, SurvivalError> {
        if timeline.len() != values.len() {
            return Err(SurvivalError::invalid_parameter(format!(
                "{} timeline points but {} values",
                timeline.len(),
                values.len()
            )));
        }
        Ok(Self {
            timeline,
            values,
            boundary,
        })
    }

    pub(crate) fn from_parts(timeline: Timeline, values: Vec<f64>, boundary: f64) -> Self {
        debug_assert_eq!(timeline.len(), values.len());
        Self {
            timeline,
            values,
            boundary,
        }
    }

    /// Value of the curve at time `t` under forward fill.
    ///
    /// Returns the boundary value before the first point and the last value
    /// after the last point. A NaN query yields NaN.
    ///
    /// # Examples
    ///
    /// ```
    /// # use lifespan_stats::timeline::{StepCurve, Timeline};
    /// let timeline = Timeline::new([1.0, 2.0]).unwrap();
    /// let curve = StepCurve::new(timeline, vec![0.8, 0.5], 1.0).unwrap();
    /// assert_eq!(curve.value_at(0.5), 1.0);
    /// assert_eq!(curve.value_at(1.0), 0.8);
    /// assert_eq!(curve.value_at(1.5), 0.8);
    /// assert_eq!(curve.value_at(100.0), 0.5);
    /// ```
    #[must_use]
    pub fn value_at(&self, t: f64) -> f64 {
        if t.is_nan() {
            return f64::NAN;
        }
        self.timeline
            .position_at_or_before(t)
            .map_or(self.boundary, |i| self.values[i])
    }

    /// Values of the curve at each of `times`, in the given order.
    #[must_use]
    pub fn values_at(&self, times: &[f64]) -> Vec<f64> {
        times.iter().map(|&t| self.value_at(t)).collect()
    }

    /// Re-expresses the curve on another timeline using forward fill.
    ///
    /// The boundary value is preserved, so reindexing twice onto the same
    /// timeline is the same as reindexing once.
    ///
    /// # Examples
    ///
    /// ```
    /// # use lifespan_stats::timeline::{StepCurve, Timeline};
    /// let curve = StepCurve::new(Timeline::new([1.0, 2.0]).unwrap(), vec![0.8, 0.5], 1.0).unwrap();
    /// let target = Timeline::new([0.0, 1.5, 3.0]).unwrap();
    /// assert_eq!(curve.reindex(&target).values(), &[1.0, 0.8, 0.5]);
    /// ```
    #[must_use]
    pub fn reindex(&self, target: &Timeline) -> Self {
        let values = target.iter().map(|t| self.value_at(t)).collect();
        Self::from_parts(target.clone(), values, self.boundary)
    }

    /// Applies `f` to every value, including the boundary.
    #[must_use]
    pub fn map<F>(&self, mut f: F) -> Self
    where
        F: FnMut(f64) -> f64,
    {
        Self::from_parts(
            self.timeline.clone(),
            self.values.iter().map(|&v| f(v)).collect(),
            f(self.boundary),
        )
    }

    #[must_use]
    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    #[must_use]
    pub fn boundary(&self) -> f64 {
        self.boundary
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates over `(time, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.timeline.iter().zip(self.values.iter().copied())
    }
}
