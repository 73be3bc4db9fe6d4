use super::{Components, Estimator, FitOptions, FittedEstimate, fit_with};
use crate::{SurvivalError, curve::CurveKind, event_table::EventTable, timeline::StepCurve};

const DEFAULT_LABEL: &str = "NA_estimate";

/// Nelson-Aalen estimator of the cumulative hazard.
///
/// The cumulative hazard is the running sum of `observed / at_risk`, with
/// variance `Σ observed / at_risk²`. The confidence band is computed on the
/// log scale, `H · exp(± z·sqrt(V) / H)`, which keeps the lower bound
/// non-negative.
///
/// # Examples
///
/// ```
/// use lifespan_stats::{
///     data::SurvivalData,
///     estimator::{Estimator as _, FitOptions, NelsonAalenFitter},
/// };
///
/// let data = SurvivalData::all_observed(vec![1.0, 2.0])?;
/// let mut naf = NelsonAalenFitter::new();
/// naf.fit(&data, &FitOptions::default())?;
///
/// assert_eq!(naf.predict(0.5)?, 0.0);
/// assert_eq!(naf.predict(1.0)?, 0.5);
/// assert_eq!(naf.predict(2.0)?, 1.5);
/// # Ok::<(), lifespan_stats::SurvivalError>(())
/// ```
#[derive(Debug, Clone)]
pub struct NelsonAalenFitter {
    label: String,
    fitted: Option<FittedEstimate>,
}

impl Default for NelsonAalenFitter {
    fn default() -> Self {
        Self::new()
    }
}

impl NelsonAalenFitter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            label: DEFAULT_LABEL.to_owned(),
            fitted: None,
        }
    }

    /// Jumps of the cumulative hazard at each fitted time point.
    ///
    /// # Errors
    ///
    /// Returns [`SurvivalError::UnfittedEstimator`] before a successful fit.
    pub fn hazard_increments(&self) -> Result<StepCurve, SurvivalError> {
        let estimate = &self.curve()?.estimate;
        let mut prev = estimate.boundary();
        let increments = estimate
            .values()
            .iter()
            .map(|&h| {
                let jump = h - prev;
                prev = h;
                jump
            })
            .collect();
        Ok(StepCurve::from_parts(
            estimate.timeline().clone(),
            increments,
            0.0,
        ))
    }

    /// Kernel-smoothed hazard rate on the fitted timeline.
    ///
    /// Uses the Epanechnikov kernel `K(x) = 0.75·(1 - x²)` for `|x| < 1`:
    ///
    /// ```text
    /// h(t) = (1 / b) · Σⱼ K((t - tⱼ) / b) · ΔH(tⱼ)
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`SurvivalError::InvalidParameter`] if `bandwidth` is not a
    /// positive finite number and [`SurvivalError::UnfittedEstimator`] before
    /// a successful fit.
    pub fn smoothed_hazard(&self, bandwidth: f64) -> Result<StepCurve, SurvivalError> {
        if !(bandwidth.is_finite() && bandwidth > 0.0) {
            return Err(SurvivalError::invalid_parameter(format!(
                "bandwidth must be a positive finite number, got {bandwidth}"
            )));
        }
        let increments = self.hazard_increments()?;
        let jumps = increments
            .iter()
            .filter(|(_, dh)| *dh != 0.0)
            .collect::<Vec<_>>();
        let smoothed = increments
            .timeline()
            .iter()
            .map(|t| {
                jumps
                    .iter()
                    .map(|&(tj, dh)| epanechnikov((t - tj) / bandwidth) * dh)
                    .sum::<f64>()
                    / bandwidth
            })
            .collect();
        Ok(StepCurve::from_parts(
            increments.timeline().clone(),
            smoothed,
            0.0,
        ))
    }
}

fn epanechnikov(x: f64) -> f64 {
    if x.abs() < 1.0 {
        0.75 * (1.0 - x * x)
    } else {
        0.0
    }
}

impl Estimator for NelsonAalenFitter {
    fn fit_table(
        &mut self,
        table: EventTable,
        options: &FitOptions,
    ) -> Result<&mut Self, SurvivalError> {
        let fitted = fit_with(
            table,
            options,
            CurveKind::CumulativeHazard,
            DEFAULT_LABEL,
            cumulative_hazard,
        )?;
        self.label.clone_from(&fitted.curve().label);
        self.fitted = Some(fitted);
        Ok(self)
    }

    fn fitted(&self) -> Option<&FittedEstimate> {
        self.fitted.as_ref()
    }

    fn label(&self) -> &str {
        &self.label
    }
}

#[expect(clippy::cast_precision_loss)]
fn cumulative_hazard(table: &EventTable, z: f64) -> Components {
    let mut out = Components::with_capacity(table.len());
    let mut hazard = 0.0;
    let mut variance = 0.0;
    for row in table.rows() {
        if row.at_risk > 0 {
            let n = row.at_risk as f64;
            let d = row.observed as f64;
            hazard += d / n;
            variance += d / (n * n);
        }
        out.push(hazard, variance, log_interval(hazard, variance, z));
    }
    out
}

/// Confidence interval `H · exp(± z·sqrt(V) / H)`.
fn log_interval(hazard: f64, variance: f64, z: f64) -> (f64, f64) {
    if hazard <= 0.0 {
        return (0.0, 0.0);
    }
    let spread = z * variance.sqrt() / hazard;
    (hazard * (-spread).exp(), hazard * spread.exp())
}
