//! The model contract used by the cross-validation harness.
//!
//! A [`SurvivalModel`] is an untrained configuration. Training it on a
//! [`Dataset`] produces a [`RiskModel`], which assigns a risk score to every
//! row of another dataset. Higher risk means an earlier expected event.

use std::collections::BTreeMap;

use lifespan_stats::{
    descriptive::DescriptiveStats,
    estimator::{Estimator as _, FitOptions, NelsonAalenFitter},
};

use crate::{CrossValidationError, dataset::Dataset};

/// An untrained survival model.
pub trait SurvivalModel {
    type Trained: RiskModel;

    /// Trains the model on `train`, reading durations and event indicators
    /// from the named columns.
    ///
    /// # Errors
    ///
    /// Returns an error if a column is missing or the model cannot be trained.
    fn fit(
        &self,
        train: &Dataset,
        duration_col: &str,
        event_col: &str,
    ) -> Result<Self::Trained, CrossValidationError>;
}

/// A trained model that scores subjects by risk.
pub trait RiskModel {
    /// Returns one risk score per row of `holdout`.
    ///
    /// # Errors
    ///
    /// Returns an error if a required column is missing.
    fn predict_risk(&self, holdout: &Dataset) -> Result<Vec<f64>, CrossValidationError>;
}

/// A non-parametric reference model.
///
/// Rows are grouped by the value of an optional strata column, and each
/// stratum's cumulative hazard is estimated with Nelson-Aalen. A subject's
/// risk is the cumulative hazard of its stratum at the horizon (by default
/// the median training duration). Strata that
/// were not seen during training fall back to the pooled estimate.
///
/// Without a strata column every subject gets the same risk, which makes this
/// a natural baseline for the concordance index (0.5).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StratifiedHazardModel {
    strata_col: Option<String>,
    horizon: Option<f64>,
}

impl StratifiedHazardModel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Groups subjects by the values of `column`.
    #[must_use]
    pub fn with_strata(mut self, column: impl Into<String>) -> Self {
        self.strata_col = Some(column.into());
        self
    }

    /// Evaluates the cumulative hazard at `horizon` instead of at the median
    /// training duration.
    #[must_use]
    pub fn with_horizon(mut self, horizon: f64) -> Self {
        self.horizon = Some(horizon);
        self
    }
}

/// Strata values keyed by bit pattern, with `-0.0` folded into `0.0`.
fn stratum_key(value: f64) -> u64 {
    let value = if value == 0.0 { 0.0 } else { value };
    value.to_bits()
}

fn hazard_at(
    train: &Dataset,
    duration_col: &str,
    event_col: &str,
    horizon: f64,
) -> Result<f64, CrossValidationError> {
    let data = train.survival_data(duration_col, event_col)?;
    let mut naf = NelsonAalenFitter::new();
    naf.fit(&data, &FitOptions::default())?;
    Ok(naf.predict(horizon)?)
}

impl SurvivalModel for StratifiedHazardModel {
    type Trained = StratifiedHazards;

    fn fit(
        &self,
        train: &Dataset,
        duration_col: &str,
        event_col: &str,
    ) -> Result<Self::Trained, CrossValidationError> {
        let horizon = match self.horizon {
            Some(horizon) => horizon,
            None => DescriptiveStats::new(train.column(duration_col)?.iter().copied())
                .map_or(0.0, |stats| stats.median),
        };
        let pooled = hazard_at(train, duration_col, event_col, horizon)?;

        let mut by_stratum = BTreeMap::new();
        if let Some(strata_col) = &self.strata_col {
            let mut members = BTreeMap::<u64, Vec<usize>>::new();
            for (i, &value) in train.column(strata_col)?.iter().enumerate() {
                members.entry(stratum_key(value)).or_default().push(i);
            }
            for (key, rows) in members {
                let hazard = hazard_at(&train.subset(&rows), duration_col, event_col, horizon)?;
                by_stratum.insert(key, hazard);
            }
        }

        log::trace!(
            "trained stratified hazards on {} rows: {} strata, horizon {horizon}",
            train.rows(),
            by_stratum.len()
        );

        Ok(StratifiedHazards {
            strata_col: self.strata_col.clone(),
            pooled,
            by_stratum,
        })
    }
}

/// A trained [`StratifiedHazardModel`].
#[derive(Debug, Clone, PartialEq)]
pub struct StratifiedHazards {
    strata_col: Option<String>,
    pooled: f64,
    by_stratum: BTreeMap<u64, f64>,
}

impl StratifiedHazards {
    /// Cumulative hazard at the horizon for a stratum value.
    #[must_use]
    pub fn hazard_for(&self, stratum: f64) -> f64 {
        self.by_stratum
            .get(&stratum_key(stratum))
            .copied()
            .unwrap_or(self.pooled)
    }
}

impl RiskModel for StratifiedHazards {
    fn predict_risk(&self, holdout: &Dataset) -> Result<Vec<f64>, CrossValidationError> {
        match &self.strata_col {
            Some(col) => Ok(holdout
                .column(col)?
                .iter()
                .map(|&s| self.hazard_for(s))
                .collect()),
            None => Ok(vec![self.pooled; holdout.rows()]),
        }
    }
}
