//! Non-parametric estimators of survival and cumulative hazard.
//!
//! Both estimators are built in two stages:
//!
//! 1. The observations are aggregated into an [`EventTable`]
//! 2. A running product (Kaplan-Meier) or running sum (Nelson-Aalen) is taken
//!    over the rows of the table, and the result is re-expressed on the
//!    requested timeline
//!
//! # Fitter lifecycle
//!
//! A fitter starts unfitted. Every accessor returns
//! [`SurvivalError::UnfittedEstimator`] until [`Estimator::fit`] succeeds.
//! Fitting again replaces the previous state as a whole; a fit that fails
//! leaves the previous state untouched.
//!
//! Fitted state is held behind [`Arc`], so curves handed out by
//! [`Estimator::curve`] stay valid (and unchanged) after a refit.
//!
//! # Examples
//!
//! ```
//! use lifespan_stats::{
//!     data::SurvivalData,
//!     estimator::{Estimator as _, FitOptions, NelsonAalenFitter},
//! };
//!
//! let data = SurvivalData::new(vec![1.0, 2.0, 2.0, 3.0], vec![true, true, false, true])?;
//! let mut naf = NelsonAalenFitter::new();
//! assert!(naf.predict(1.0).is_err());
//!
//! naf.fit(&data, &FitOptions::default())?;
//! assert!((naf.predict(2.0)? - (1.0 / 4.0 + 1.0 / 3.0)).abs() < 1e-12);
//! # Ok::<(), lifespan_stats::SurvivalError>(())
//! ```

use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};

pub use self::{kaplan_meier::KaplanMeierFitter, nelson_aalen::NelsonAalenFitter};
use crate::{
    SurvivalError,
    curve::{self, CurveKind, EstimateCurve},
    data::SurvivalData,
    distribution,
    event_table::{AggregatedCounts, EventTable},
    timeline::{StepCurve, Timeline},
};

mod kaplan_meier;
mod nelson_aalen;

/// Options shared by all fitters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitOptions {
    /// Label of the fitted curve. Each fitter has its own default.
    pub label: Option<String>,
    /// Significance level of the confidence band, in `(0, 1)`.
    pub alpha: f64,
    /// Time points to report the curve on. Defaults to the distinct times of
    /// the event table.
    pub timeline: Option<Vec<f64>>,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            label: None,
            alpha: 0.05,
            timeline: None,
        }
    }
}

impl FitOptions {
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    #[must_use]
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    #[must_use]
    pub fn with_timeline(mut self, timeline: Vec<f64>) -> Self {
        self.timeline = Some(timeline);
        self
    }
}

/// The state of a successfully fitted estimator.
#[derive(Debug, Clone)]
pub struct FittedEstimate {
    table: Arc<EventTable>,
    curve: Arc<EstimateCurve>,
}

impl FittedEstimate {
    #[must_use]
    pub fn table(&self) -> &Arc<EventTable> {
        &self.table
    }

    #[must_use]
    pub fn curve(&self) -> &Arc<EstimateCurve> {
        &self.curve
    }
}

/// A non-parametric estimator fitted to survival data.
///
/// Implementors provide [`Estimator::fit_table`] and access to their fitted
/// state; everything else is derived.
pub trait Estimator: fmt::Debug {
    /// Fits the estimator to an already-built event table.
    ///
    /// # Errors
    ///
    /// Returns [`SurvivalError::InvalidParameter`] for an `alpha` outside
    /// `(0, 1)` or a timeline containing NaN, and
    /// [`SurvivalError::InvalidObservation`] for an empty table. The previous
    /// state is kept on error.
    fn fit_table(
        &mut self,
        table: EventTable,
        options: &FitOptions,
    ) -> Result<&mut Self, SurvivalError>
    where
        Self: Sized;

    /// Fitted state, or `None` before the first successful fit.
    fn fitted(&self) -> Option<&FittedEstimate>;

    /// Label of the fitted curve, or the default label when unfitted.
    fn label(&self) -> &str;

    /// Fits the estimator to a batch of observations.
    ///
    /// # Errors
    ///
    /// See [`Estimator::fit_table`].
    fn fit(&mut self, data: &SurvivalData, options: &FitOptions) -> Result<&mut Self, SurvivalError>
    where
        Self: Sized,
    {
        self.fit_table(EventTable::from_data(data), options)
    }

    /// Fits the estimator to pre-aggregated counts.
    ///
    /// # Errors
    ///
    /// Returns [`SurvivalError::InconsistentTable`] if the counts are not a
    /// valid event table, otherwise see [`Estimator::fit_table`].
    fn fit_aggregated(
        &mut self,
        counts: &AggregatedCounts,
        options: &FitOptions,
    ) -> Result<&mut Self, SurvivalError>
    where
        Self: Sized,
    {
        let table = EventTable::from_aggregated(counts)?;
        self.fit_table(table, options)
    }

    fn is_fitted(&self) -> bool {
        self.fitted().is_some()
    }

    /// The fitted curve.
    ///
    /// # Errors
    ///
    /// Returns [`SurvivalError::UnfittedEstimator`] before a successful fit.
    fn curve(&self) -> Result<&Arc<EstimateCurve>, SurvivalError> {
        self.fitted()
            .map(FittedEstimate::curve)
            .ok_or_else(|| unfitted(self.label()))
    }

    /// The event table the curve was computed from.
    ///
    /// # Errors
    ///
    /// Returns [`SurvivalError::UnfittedEstimator`] before a successful fit.
    fn event_table(&self) -> Result<&Arc<EventTable>, SurvivalError> {
        self.fitted()
            .map(FittedEstimate::table)
            .ok_or_else(|| unfitted(self.label()))
    }

    /// Point estimate at time `t` under forward fill.
    ///
    /// # Errors
    ///
    /// Returns [`SurvivalError::UnfittedEstimator`] before a successful fit.
    fn predict(&self, t: f64) -> Result<f64, SurvivalError> {
        Ok(self.curve()?.estimate.value_at(t))
    }

    /// Point estimates at each of `times`, in the given order.
    ///
    /// # Errors
    ///
    /// Returns [`SurvivalError::UnfittedEstimator`] before a successful fit.
    fn predict_many(&self, times: &[f64]) -> Result<Vec<f64>, SurvivalError> {
        Ok(self.curve()?.estimate.values_at(times))
    }

    /// Pointwise difference `self - other` of the point estimates.
    ///
    /// # Errors
    ///
    /// Returns [`SurvivalError::UnfittedEstimator`] if either side is unfitted.
    fn subtract(&self, other: &dyn Estimator) -> Result<StepCurve, SurvivalError> {
        Ok(curve::subtract(
            &self.curve()?.estimate,
            &other.curve()?.estimate,
        ))
    }

    /// Pointwise ratio `self / other` of the point estimates, NaN where
    /// `other` is zero.
    ///
    /// # Errors
    ///
    /// Returns [`SurvivalError::UnfittedEstimator`] if either side is unfitted.
    fn divide(&self, other: &dyn Estimator) -> Result<StepCurve, SurvivalError> {
        Ok(curve::divide(
            &self.curve()?.estimate,
            &other.curve()?.estimate,
        ))
    }
}

fn unfitted(label: &str) -> SurvivalError {
    SurvivalError::UnfittedEstimator {
        label: label.to_owned(),
    }
}

/// Per-row output of an estimator on the rows of its event table.
#[derive(Debug, Default)]
struct Components {
    estimate: Vec<f64>,
    variance: Vec<f64>,
    lower: Vec<f64>,
    upper: Vec<f64>,
}

impl Components {
    fn with_capacity(n: usize) -> Self {
        Self {
            estimate: Vec::with_capacity(n),
            variance: Vec::with_capacity(n),
            lower: Vec::with_capacity(n),
            upper: Vec::with_capacity(n),
        }
    }

    fn push(&mut self, estimate: f64, variance: f64, (lower, upper): (f64, f64)) {
        self.estimate.push(estimate);
        self.variance.push(variance);
        self.lower.push(lower);
        self.upper.push(upper);
    }
}

/// Validates the inputs and computes a fitted estimate.
///
/// `compute` receives the table and the two-sided critical value and returns
/// one value per table row.
fn fit_with<F>(
    table: EventTable,
    options: &FitOptions,
    kind: CurveKind,
    default_label: &str,
    compute: F,
) -> Result<FittedEstimate, SurvivalError>
where
    F: FnOnce(&EventTable, f64) -> Components,
{
    crate::check_alpha(options.alpha)?;
    if table.is_empty() {
        return Err(SurvivalError::invalid_observation(
            "cannot fit an estimator on empty data",
        ));
    }
    let target = options
        .timeline
        .as_ref()
        .map(|points| Timeline::new(points.iter().copied()))
        .transpose()?;

    let z = distribution::two_sided_critical_value(options.alpha);
    let components = compute(&table, z);
    let native = table.timeline();
    let boundary = kind.boundary();
    let step = |values| StepCurve::from_parts(native.clone(), values, boundary);
    let mut curve = EstimateCurve {
        label: options
            .label
            .clone()
            .unwrap_or_else(|| default_label.to_owned()),
        kind,
        confidence_level: 1.0 - options.alpha,
        estimate: step(components.estimate),
        variance: StepCurve::from_parts(native.clone(), components.variance, 0.0),
        lower: step(components.lower),
        upper: step(components.upper),
    };
    if let Some(target) = &target {
        curve = curve.reindex(target);
    }

    log::debug!(
        "fitted {:?} curve {:?}: {} subjects, {} events, {} time points",
        kind,
        curve.label,
        table.total_subjects(),
        table.total_observed(),
        curve.timeline().len()
    );

    Ok(FittedEstimate {
        table: Arc::new(table),
        curve: Arc::new(curve),
    })
}
