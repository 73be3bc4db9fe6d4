use super::{Components, Estimator, FitOptions, FittedEstimate, fit_with};
use crate::{SurvivalError, curve::CurveKind, event_table::EventTable};

const DEFAULT_LABEL: &str = "KM_estimate";

/// Kaplan-Meier (product-limit) estimator of the survival function.
///
/// At each distinct time the survival estimate is multiplied by
/// `1 - observed / at_risk`. The variance uses Greenwood's formula and the
/// confidence band is computed on the `log(-log S)` scale, which keeps both
/// bounds inside `[0, 1]`.
///
/// # Examples
///
/// ```
/// use lifespan_stats::{
///     data::SurvivalData,
///     estimator::{Estimator as _, FitOptions, KaplanMeierFitter},
/// };
///
/// let data = SurvivalData::new(vec![1.0, 2.0, 3.0, 4.0], vec![true, false, true, true])?;
/// let mut kmf = KaplanMeierFitter::new();
/// kmf.fit(&data, &FitOptions::default().with_label("treated"))?;
///
/// assert_eq!(kmf.label(), "treated");
/// assert_eq!(kmf.predict(1.0)?, 0.75);
/// assert_eq!(kmf.predict(2.5)?, 0.75);
/// assert_eq!(kmf.predict(3.0)?, 0.375);
/// assert_eq!(kmf.median_survival_time()?, Some(3.0));
/// # Ok::<(), lifespan_stats::SurvivalError>(())
/// ```
#[derive(Debug, Clone)]
pub struct KaplanMeierFitter {
    label: String,
    fitted: Option<FittedEstimate>,
}

impl Default for KaplanMeierFitter {
    fn default() -> Self {
        Self::new()
    }
}

impl KaplanMeierFitter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            label: DEFAULT_LABEL.to_owned(),
            fitted: None,
        }
    }

    /// Smallest fitted time at which the survival estimate drops to 0.5 or
    /// below, or `None` if it never does.
    ///
    /// # Errors
    ///
    /// Returns [`SurvivalError::UnfittedEstimator`] before a successful fit.
    pub fn median_survival_time(&self) -> Result<Option<f64>, SurvivalError> {
        self.percentile(0.5)
    }

    /// Smallest fitted time at which the survival estimate is `<= p`.
    ///
    /// Returns `None` if the curve never drops that low.
    ///
    /// # Errors
    ///
    /// Returns [`SurvivalError::InvalidParameter`] if `p` is outside `[0, 1]`
    /// and [`SurvivalError::UnfittedEstimator`] before a successful fit.
    pub fn percentile(&self, p: f64) -> Result<Option<f64>, SurvivalError> {
        if !(0.0..=1.0).contains(&p) {
            return Err(SurvivalError::invalid_parameter(format!(
                "percentile must be in [0, 1], got {p}"
            )));
        }
        let curve = self.curve()?;
        Ok(curve
            .estimate
            .iter()
            .find_map(|(t, s)| (s <= p).then_some(t)))
    }

    /// Probability of the event having happened by time `t`, `1 - S(t)`.
    ///
    /// # Errors
    ///
    /// Returns [`SurvivalError::UnfittedEstimator`] before a successful fit.
    pub fn cumulative_density_at(&self, t: f64) -> Result<f64, SurvivalError> {
        Ok(1.0 - self.predict(t)?)
    }

    /// Area under the survival curve on `[0, tau]`.
    ///
    /// This is the expected event-free time up to the horizon `tau`.
    ///
    /// # Errors
    ///
    /// Returns [`SurvivalError::InvalidParameter`] if `tau` is negative or not
    /// finite and [`SurvivalError::UnfittedEstimator`] before a successful fit.
    ///
    /// # Examples
    ///
    /// ```
    /// use lifespan_stats::{
    ///     data::SurvivalData,
    ///     estimator::{Estimator as _, FitOptions, KaplanMeierFitter},
    /// };
    ///
    /// let data = SurvivalData::all_observed(vec![5.0, 5.0, 6.0, 6.0, 8.0])?;
    /// let mut kmf = KaplanMeierFitter::new();
    /// kmf.fit(&data, &FitOptions::default())?;
    ///
    /// // Without censoring the area equals the mean duration.
    /// assert!((kmf.restricted_mean_survival_time(10.0)? - 6.0).abs() < 1e-12);
    /// assert_eq!(kmf.restricted_mean_survival_time(3.0)?, 3.0);
    /// # Ok::<(), lifespan_stats::SurvivalError>(())
    /// ```
    pub fn restricted_mean_survival_time(&self, tau: f64) -> Result<f64, SurvivalError> {
        if !(tau.is_finite() && tau >= 0.0) {
            return Err(SurvivalError::invalid_parameter(format!(
                "horizon must be a finite non-negative number, got {tau}"
            )));
        }
        let estimate = &self.curve()?.estimate;
        let mut area = 0.0;
        let (mut prev_t, mut prev_s) = (0.0, estimate.boundary());
        for (t, s) in estimate.iter() {
            if t >= tau {
                break;
            }
            if t > prev_t {
                area += prev_s * (t - prev_t);
                prev_t = t;
            }
            prev_s = s;
        }
        Ok(area + prev_s * (tau - prev_t))
    }
}

impl Estimator for KaplanMeierFitter {
    fn fit_table(
        &mut self,
        table: EventTable,
        options: &FitOptions,
    ) -> Result<&mut Self, SurvivalError> {
        let fitted = fit_with(
            table,
            options,
            CurveKind::Survival,
            DEFAULT_LABEL,
            product_limit,
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
fn product_limit(table: &EventTable, z: f64) -> Components {
    let mut out = Components::with_capacity(table.len());
    let mut survival = 1.0;
    let mut greenwood = 0.0;
    for row in table.rows() {
        let n = row.at_risk as f64;
        let d = row.observed as f64;
        if row.at_risk > 0 {
            survival *= 1.0 - d / n;
        }
        if row.at_risk > row.observed {
            greenwood += d / (n * (n - d));
        }
        out.push(
            survival,
            survival * survival * greenwood,
            log_log_interval(survival, greenwood, z),
        );
    }
    out
}

/// Confidence interval `exp(-exp(ln(-ln S) ± z·se))`.
fn log_log_interval(survival: f64, greenwood: f64, z: f64) -> (f64, f64) {
    if survival >= 1.0 {
        return (1.0, 1.0);
    }
    if survival <= 0.0 {
        return (0.0, 0.0);
    }
    let log_s = survival.ln();
    let theta = (-log_s).ln();
    let se = greenwood.sqrt() / log_s.abs();
    let lower = (-(theta + z * se).exp()).exp();
    let upper = (-(theta - z * se).exp()).exp();
    (lower, upper)
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::{data::SurvivalData, event_table::AggregatedCounts};

    fn fitted(durations: Vec<f64>, events: Vec<bool>) -> KaplanMeierFitter {
        let data = SurvivalData::new(durations, events).unwrap();
        let mut kmf = KaplanMeierFitter::new();
        kmf.fit(&data, &FitOptions::default()).unwrap();
        kmf
    }

    #[test]
    fn test_all_observed_scenario() {
        let kmf = fitted(vec![5.0, 5.0, 6.0, 6.0, 8.0], vec![true; 5]);
        assert_eq!(kmf.predict(0.0).unwrap(), 1.0);
        assert_abs_diff_eq!(kmf.predict(5.0).unwrap(), 0.6, epsilon = 1e-12);
        assert_abs_diff_eq!(kmf.predict(6.5).unwrap(), 0.2, epsilon = 1e-12);
        assert_eq!(kmf.predict(8.0).unwrap(), 0.0);
        assert_eq!(kmf.predict(100.0).unwrap(), 0.0);
    }

    #[test]
    fn test_greenwood_variance() {
        let kmf = fitted(vec![1.0, 2.0, 3.0, 4.0], vec![true, false, true, true]);
        let curve = kmf.curve().unwrap();
        // S(1) = 3/4, Σ = 1 / (4·3)
        assert_abs_diff_eq!(
            curve.variance.value_at(1.0),
            0.75 * 0.75 / 12.0,
            epsilon = 1e-12
        );
        // S(3) = 3/8, Σ = 1/12 + 1/(2·1)
        assert_abs_diff_eq!(
            curve.variance.value_at(3.0),
            0.375 * 0.375 * (1.0 / 12.0 + 0.5),
            epsilon = 1e-12
        );
        // The final row has at_risk == observed and adds no Greenwood term.
        assert_eq!(curve.variance.value_at(4.0), 0.0);
    }

    #[test]
    fn test_confidence_band_brackets_estimate() {
        let kmf = fitted(
            vec![1.0, 2.0, 2.0, 3.0, 5.0, 7.0, 8.0, 9.0],
            vec![true, true, false, true, true, false, true, false],
        );
        let curve = kmf.curve().unwrap();
        assert_abs_diff_eq!(curve.confidence_level, 0.95);
        for ((s, lo), hi) in curve
            .estimate
            .values()
            .iter()
            .zip(curve.lower.values())
            .zip(curve.upper.values())
        {
            assert!((0.0..=1.0).contains(lo));
            assert!((0.0..=1.0).contains(hi));
            assert!(lo <= s && s <= hi, "{lo} <= {s} <= {hi}");
        }
        assert_eq!(curve.lower.value_at(0.0), 1.0);
        assert_eq!(curve.upper.value_at(0.0), 1.0);
    }

    #[test]
    fn test_band_collapses_at_zero_survival() {
        let kmf = fitted(vec![1.0, 2.0], vec![true, true]);
        let curve = kmf.curve().unwrap();
        assert_eq!(curve.lower.value_at(2.0), 0.0);
        assert_eq!(curve.upper.value_at(2.0), 0.0);
    }

    #[test]
    fn test_wider_band_for_smaller_alpha() {
        let data = SurvivalData::new(vec![1.0, 2.0, 3.0, 4.0, 5.0], vec![true; 5]).unwrap();
        let mut narrow = KaplanMeierFitter::new();
        narrow.fit(&data, &FitOptions::default().with_alpha(0.2)).unwrap();
        let mut wide = KaplanMeierFitter::new();
        wide.fit(&data, &FitOptions::default().with_alpha(0.01)).unwrap();
        let n = narrow.curve().unwrap();
        let w = wide.curve().unwrap();
        assert!(w.lower.value_at(2.0) < n.lower.value_at(2.0));
        assert!(w.upper.value_at(2.0) > n.upper.value_at(2.0));
    }

    #[test]
    fn test_unfitted_accessors() {
        let kmf = KaplanMeierFitter::new();
        assert!(!kmf.is_fitted());
        assert_eq!(kmf.label(), "KM_estimate");
        let err = kmf.predict(1.0).unwrap_err();
        assert_eq!(
            err,
            SurvivalError::UnfittedEstimator {
                label: "KM_estimate".to_owned()
            }
        );
        assert!(kmf.median_survival_time().is_err());
        assert!(kmf.event_table().is_err());
    }

    #[test]
    fn test_failed_fit_keeps_previous_state() {
        let mut kmf = fitted(vec![1.0, 2.0], vec![true, true]);
        let data = SurvivalData::all_observed(vec![3.0]).unwrap();

        let err = kmf.fit(&data, &FitOptions::default().with_alpha(1.5));
        assert!(matches!(err, Err(SurvivalError::InvalidParameter { .. })));
        let empty = SurvivalData::all_observed(vec![]).unwrap();
        assert!(kmf.fit(&empty, &FitOptions::default()).is_err());

        assert_eq!(kmf.predict(1.0).unwrap(), 0.5);
    }

    #[test]
    fn test_custom_timeline() {
        let data = SurvivalData::all_observed(vec![2.0, 4.0]).unwrap();
        let mut kmf = KaplanMeierFitter::new();
        kmf.fit(
            &data,
            &FitOptions::default().with_timeline(vec![3.0, 1.0, 5.0]),
        )
        .unwrap();
        let curve = kmf.curve().unwrap();
        assert_eq!(curve.timeline().points(), &[1.0, 3.0, 5.0]);
        assert_eq!(curve.estimate.values(), &[1.0, 0.5, 0.0]);
    }

    #[test]
    fn test_nan_timeline_is_rejected() {
        let data = SurvivalData::all_observed(vec![2.0]).unwrap();
        let mut kmf = KaplanMeierFitter::new();
        let options = FitOptions::default().with_timeline(vec![f64::NAN]);
        assert!(kmf.fit(&data, &options).is_err());
        assert!(!kmf.is_fitted());
    }

    #[test]
    fn test_zero_at_risk_row_keeps_survival() {
        let counts = AggregatedCounts {
            time: vec![1.0, 2.0, 3.0],
            observed: vec![1, 0, 0],
            censored: vec![1, 2, 0],
            entrance: None,
            at_risk: Some(vec![4, 2, 0]),
        };
        let mut kmf = KaplanMeierFitter::new();
        kmf.fit_aggregated(&counts, &FitOptions::default()).unwrap();
        let curve = kmf.curve().unwrap();
        assert_eq!(curve.estimate.values(), &[0.75, 0.75, 0.75]);
        assert!(curve.variance.values().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_percentile_bounds() {
        let kmf = fitted(vec![1.0, 2.0, 3.0, 4.0], vec![true, true, true, false]);
        // The row at time 0 already satisfies S <= 1.
        assert_eq!(kmf.percentile(1.0).unwrap(), Some(0.0));
        assert_eq!(kmf.percentile(0.8).unwrap(), Some(1.0));
        assert_eq!(kmf.percentile(0.6).unwrap(), Some(2.0));
        // The last subject is censored so survival never reaches 0.
        assert_eq!(kmf.percentile(0.0).unwrap(), None);
        assert!(kmf.percentile(-0.1).is_err());
        assert!(kmf.percentile(f64::NAN).is_err());
    }

    #[test]
    fn test_cumulative_density() {
        let kmf = fitted(vec![1.0, 2.0], vec![true, true]);
        assert_eq!(kmf.cumulative_density_at(0.5).unwrap(), 0.0);
        assert_eq!(kmf.cumulative_density_at(1.0).unwrap(), 0.5);
    }

    #[test]
    fn test_left_truncated_fit() {
        let data = SurvivalData::new(vec![4.0, 6.0, 7.0], vec![true, true, false])
            .unwrap()
            .with_entries(vec![2.0, 2.0, 5.0])
            .unwrap();
        let mut kmf = KaplanMeierFitter::new();
        kmf.fit(&data, &FitOptions::default()).unwrap();
        assert_eq!(kmf.predict(3.0).unwrap(), 1.0);
        assert_abs_diff_eq!(kmf.predict(4.0).unwrap(), 0.5);
        // Subjects 2 and 3 are both at risk at 6.
        assert_abs_diff_eq!(kmf.predict(6.0).unwrap(), 0.25);
    }
}
