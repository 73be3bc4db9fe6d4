//! K-fold cross-validation.
//!
//! # Fold Assignment
//!
//! Row indices are shuffled with a `Pcg64` generator seeded from
//! [`KFoldOptions::seed`] and cut into `k` contiguous folds. The first
//! `rows % k` folds receive one extra row, so fold sizes differ by at most one.
//!
//! # Laziness
//!
//! [`k_fold`] validates its arguments and assigns folds eagerly, but trains
//! nothing. Each call to [`Iterator::next`] on the returned [`KFold`] trains
//! the model on the other `k - 1` folds and scores the held-out one. The
//! iterator yields exactly `k` items and cannot be restarted.

use lifespan_stats::descriptive::DescriptiveStats;
use rand::{SeedableRng as _, seq::SliceRandom as _};
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};

use crate::{
    CrossValidationError,
    concordance,
    dataset::Dataset,
    model::{RiskModel as _, SurvivalModel},
};

/// Scores held-out risk predictions against observed durations and events.
pub type ScoreFn = fn(&[f64], &[bool], &[f64]) -> Result<f64, CrossValidationError>;

/// Options of the cross-validation harness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KFoldOptions {
    /// Seed of the fold assignment.
    pub seed: u64,
}

/// Splits `0..rows` into `folds` shuffled groups of near-equal size.
fn assign_folds(rows: usize, folds: usize, seed: u64) -> Vec<Vec<usize>> {
    let mut indices = (0..rows).collect::<Vec<_>>();
    let mut rng = Pcg64::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let (base, extra) = (rows / folds, rows % folds);
    let mut rest = indices.as_slice();
    (0..folds)
        .map(|fold| {
            let size = base + usize::from(fold < extra);
            let (head, tail) = rest.split_at(size);
            rest = tail;
            head.to_vec()
        })
        .collect()
}

/// Lazy iterator over per-fold scores, created by [`k_fold`] or
/// [`k_fold_with_scorer`].
#[derive(Debug)]
pub struct KFold<'a, M, S = ScoreFn> {
    model: &'a M,
    dataset: &'a Dataset,
    duration_col: &'a str,
    event_col: &'a str,
    folds: Vec<Vec<usize>>,
    next_fold: usize,
    scorer: S,
}

impl<M, S> KFold<'_, M, S>
where
    M: SurvivalModel,
    S: Fn(&[f64], &[bool], &[f64]) -> Result<f64, CrossValidationError>,
{
    /// Row indices of each fold.
    #[must_use]
    pub fn folds(&self) -> &[Vec<usize>] {
        &self.folds
    }

    fn score_fold(&self, fold: usize) -> Result<f64, CrossValidationError> {
        let holdout_rows = &self.folds[fold];
        let train_rows = self
            .folds
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != fold)
            .flat_map(|(_, rows)| rows.iter().copied())
            .collect::<Vec<_>>();
        let train = self.dataset.subset(&train_rows);
        let holdout = self.dataset.subset(holdout_rows);

        let trained = self.model.fit(&train, self.duration_col, self.event_col)?;
        let risks = trained.predict_risk(&holdout)?;
        if risks.len() != holdout.rows() {
            return Err(CrossValidationError::length_mismatch(format!(
                "model returned {} risk scores for {} held-out rows",
                risks.len(),
                holdout.rows()
            )));
        }
        let durations = holdout.column(self.duration_col)?;
        let events = holdout
            .column(self.event_col)?
            .iter()
            .map(|&e| e != 0.0)
            .collect::<Vec<_>>();
        let score = (self.scorer)(durations, &events, &risks)?;

        log::trace!(
            "fold {}/{}: trained on {} rows, scored {} rows: {score:.4}",
            fold + 1,
            self.folds.len(),
            train.rows(),
            holdout.rows()
        );
        Ok(score)
    }
}

impl<M, S> Iterator for KFold<'_, M, S>
where
    M: SurvivalModel,
    S: Fn(&[f64], &[bool], &[f64]) -> Result<f64, CrossValidationError>,
{
    type Item = Result<f64, CrossValidationError>;

    fn next(&mut self) -> Option<Self::Item> {
        let fold = self.next_fold;
        if fold >= self.folds.len() {
            return None;
        }
        self.next_fold += 1;
        Some(self.score_fold(fold))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.folds.len() - self.next_fold;
        (remaining, Some(remaining))
    }
}

impl<M, S> ExactSizeIterator for KFold<'_, M, S>
where
    M: SurvivalModel,
    S: Fn(&[f64], &[bool], &[f64]) -> Result<f64, CrossValidationError>,
{
}

impl<M, S> std::iter::FusedIterator for KFold<'_, M, S>
where
    M: SurvivalModel,
    S: Fn(&[f64], &[bool], &[f64]) -> Result<f64, CrossValidationError>,
{
}

/// K-fold cross-validation scored with the concordance index.
///
/// # Errors
///
/// Returns [`CrossValidationError::InvalidFoldCount`] unless
/// `2 <= folds <= dataset.rows()` and
/// [`CrossValidationError::MissingColumn`] if either column is absent.
/// Errors from training or scoring a fold are yielded by the iterator.
pub fn k_fold<'a, M>(
    model: &'a M,
    dataset: &'a Dataset,
    folds: usize,
    duration_col: &'a str,
    event_col: &'a str,
    options: &KFoldOptions,
) -> Result<KFold<'a, M>, CrossValidationError>
where
    M: SurvivalModel,
{
    k_fold_with_scorer(
        model,
        dataset,
        folds,
        duration_col,
        event_col,
        options,
        concordance::concordance_index as ScoreFn,
    )
}

/// K-fold cross-validation with a custom scoring function.
///
/// `scorer` receives the held-out durations, event indicators and predicted
/// risks, in that order.
///
/// # Errors
///
/// Same as [`k_fold`].
pub fn k_fold_with_scorer<'a, M, S>(
    model: &'a M,
    dataset: &'a Dataset,
    folds: usize,
    duration_col: &'a str,
    event_col: &'a str,
    options: &KFoldOptions,
    scorer: S,
) -> Result<KFold<'a, M, S>, CrossValidationError>
where
    M: SurvivalModel,
    S: Fn(&[f64], &[bool], &[f64]) -> Result<f64, CrossValidationError>,
{
    let rows = dataset.rows();
    if folds < 2 || folds > rows {
        return Err(CrossValidationError::InvalidFoldCount { folds, rows });
    }
    dataset.column(duration_col)?;
    dataset.column(event_col)?;

    log::debug!(
        "{folds}-fold cross-validation over {rows} rows (seed {})",
        options.seed
    );

    Ok(KFold {
        model,
        dataset,
        duration_col,
        event_col,
        folds: assign_folds(rows, folds, options.seed),
        next_fold: 0,
        scorer,
    })
}

/// Per-fold scores together with their summary statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrossValidationSummary {
    pub scores: Vec<f64>,
    /// `None` only if every score is NaN.
    pub stats: Option<DescriptiveStats>,
}

/// Runs [`k_fold`] to completion and summarises the scores.
///
/// # Errors
///
/// Returns the first error raised by argument validation or by any fold.
///
/// # Examples
///
/// ```
/// use lifespan_validation::{
///     cross_validation::{KFoldOptions, k_fold_summary},
///     dataset::Dataset,
///     model::StratifiedHazardModel,
/// };
///
/// let dataset = Dataset::new([
///     ("time", vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]),
///     ("event", vec![1.0; 6]),
/// ])?;
/// let model = StratifiedHazardModel::new();
/// let summary = k_fold_summary(&model, &dataset, 3, "time", "event", &KFoldOptions::default())?;
///
/// // A model without strata ranks everyone equally.
/// assert_eq!(summary.scores, [0.5, 0.5, 0.5]);
/// assert_eq!(summary.stats.unwrap().mean, 0.5);
/// # Ok::<(), lifespan_validation::CrossValidationError>(())
/// ```
pub fn k_fold_summary<M>(
    model: &M,
    dataset: &Dataset,
    folds: usize,
    duration_col: &str,
    event_col: &str,
    options: &KFoldOptions,
) -> Result<CrossValidationSummary, CrossValidationError>
where
    M: SurvivalModel,
{
    let scores = k_fold(model, dataset, folds, duration_col, event_col, options)?
        .collect::<Result<Vec<_>, _>>()?;
    let stats = DescriptiveStats::new(scores.iter().copied());
    Ok(CrossValidationSummary { scores, stats })
}
