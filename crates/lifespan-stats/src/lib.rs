//! Non-parametric survival analysis for censored and left-truncated data.
//!
//! This crate provides the estimation and inference engine of the Lifespan
//! project:
//!
//! - **Observations**: Validated batches of `(duration, event, entry)` records
//! - **Event tables**: Per-distinct-time counts of entrances, deaths and censorings
//! - **Timelines**: Ordered time grids and forward-filled step curves
//! - **Estimators**: Kaplan-Meier survival and Nelson-Aalen cumulative hazard
//! - **Curve algebra**: Pointwise difference and ratio of two step curves
//! - **Log-rank tests**: Two-sample, pairwise and multivariate comparisons
//! - **Descriptive statistics**: Summaries of score or p-value collections
//!
//! # Modules
//!
//! - [`data`]: Observation batches and grouping
//! - [`event_table`]: Event table construction, aggregation and expansion
//! - [`timeline`]: Timelines and step curves
//! - [`estimator`]: Kaplan-Meier and Nelson-Aalen fitters
//! - [`curve`]: Estimate curves and curve algebra
//! - [`logrank`]: The log-rank test family
//! - [`distribution`]: Reference distributions used by the estimators and tests
//! - [`descriptive`]: Descriptive statistics
//!
//! # Examples
//!
//! ## Fitting a Kaplan-Meier curve
//!
//! ```
//! use lifespan_stats::{
//!     data::SurvivalData,
//!     estimator::{Estimator as _, FitOptions, KaplanMeierFitter},
//! };
//!
//! let data = SurvivalData::new(vec![5.0, 5.0, 6.0, 6.0, 8.0], vec![true; 5])?;
//! let mut kmf = KaplanMeierFitter::new();
//! kmf.fit(&data, &FitOptions::default())?;
//!
//! assert!((kmf.predict(5.0)? - 0.6).abs() < 1e-12);
//! assert!((kmf.predict(6.5)? - 0.2).abs() < 1e-12);
//! # Ok::<(), lifespan_stats::SurvivalError>(())
//! ```
//!
//! ## Comparing two groups
//!
//! ```
//! use lifespan_stats::{
//!     data::SurvivalData,
//!     logrank::{LogRankOptions, logrank_test},
//! };
//!
//! let a = SurvivalData::new(vec![1.0, 2.0, 3.0, 4.0], vec![true, true, false, true])?;
//! let b = SurvivalData::new(vec![5.0, 6.0, 7.0, 8.0], vec![true, false, true, true])?;
//! let result = logrank_test(&a, &b, &LogRankOptions::default())?;
//!
//! assert_eq!(result.degrees_of_freedom, 1);
//! assert!((0.0..=1.0).contains(&result.p_value));
//! # Ok::<(), lifespan_stats::SurvivalError>(())
//! ```

pub mod curve;
pub mod data;
pub mod descriptive;
pub mod distribution;
pub mod estimator;
pub mod event_table;
pub mod logrank;
pub mod timeline;

mod linalg;

/// Errors reported by the estimation and testing routines.
///
/// Every error is detected eagerly, at the point where the offending input is
/// supplied. Numeric edge cases with a defined outcome (empty risk sets,
/// division by a zero survival value) are not errors.
#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
pub enum SurvivalError {
    /// A duration, entry time or event flag violates the observation invariants.
    #[display("invalid observation: {reason}")]
    InvalidObservation { reason: String },
    /// Manually supplied counts violate the at-risk invariant.
    #[display("inconsistent event table: {reason}")]
    InconsistentTable { reason: String },
    /// A comparison group has no members.
    #[display("degenerate comparison group: {reason}")]
    DegenerateGroup { reason: String },
    /// An estimator was queried before a successful fit.
    #[display("estimator {label:?} has not been fitted")]
    UnfittedEstimator { label: String },
    /// A tuning parameter (alpha, bandwidth, percentile, ...) is out of range.
    #[display("invalid parameter: {reason}")]
    InvalidParameter { reason: String },
}

impl SurvivalError {
    pub(crate) fn invalid_observation(reason: impl Into<String>) -> Self {
        Self::InvalidObservation {
            reason: reason.into(),
        }
    }

    pub(crate) fn inconsistent_table(reason: impl Into<String>) -> Self {
        Self::InconsistentTable {
            reason: reason.into(),
        }
    }

    pub(crate) fn degenerate_group(reason: impl Into<String>) -> Self {
        Self::DegenerateGroup {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_parameter(reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            reason: reason.into(),
        }
    }
}

/// Checks that a significance level lies strictly between 0 and 1.
pub(crate) fn check_alpha(alpha: f64) -> Result<(), SurvivalError> {
    if alpha > 0.0 && alpha < 1.0 {
        Ok(())
    } else {
        Err(SurvivalError::invalid_parameter(format!(
            "alpha must be in (0, 1), got {alpha}"
        )))
    }
}
