//! Cross-validation of survival models.
//!
//! This crate scores survival models on held-out data. A dataset is split into
//! `k` disjoint folds; each fold in turn is held out while a model is trained
//! on the remaining folds, and the trained model's risk predictions on the
//! held-out fold are scored (by default with the concordance index).
//!
//! # How It Works
//!
//! 1. **Fold assignment** - Row indices are shuffled with a seeded `Pcg64` and
//!    split into `k` folds whose sizes differ by at most one
//! 2. **Training** - The model is fitted on every row outside the current fold
//! 3. **Prediction** - The trained model assigns a risk score to each held-out row
//! 4. **Scoring** - Risk scores are compared against the held-out durations and
//!    events
//!
//! Folds are evaluated lazily: [`cross_validation::k_fold`] returns an iterator
//! that trains and scores one fold per call to `next`.
//!
//! # Architecture
//!
//! ```text
//! Dataset (named numeric columns)
//!     ↓ split by
//! KFold (seeded fold assignment)
//!     ↓ trains
//! SurvivalModel → RiskModel
//!     ↓ predicts
//! Risk scores
//!     ↓ scored by
//! Concordance index
//! ```
//!
//! # Example
//!
//! ```
//! use lifespan_validation::{
//!     cross_validation::{KFoldOptions, k_fold},
//!     dataset::Dataset,
//!     model::StratifiedHazardModel,
//! };
//!
//! let dataset = Dataset::new([
//!     ("time", vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]),
//!     ("event", vec![1.0, 1.0, 0.0, 1.0, 1.0, 1.0, 0.0, 1.0]),
//!     ("arm", vec![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0]),
//! ])?;
//! let model = StratifiedHazardModel::new().with_strata("arm");
//! let scores = k_fold(&model, &dataset, 2, "time", "event", &KFoldOptions::default())?
//!     .collect::<Result<Vec<_>, _>>()?;
//! assert_eq!(scores.len(), 2);
//! # Ok::<(), lifespan_validation::CrossValidationError>(())
//! ```
//!
//! # Design Principles
//!
//! ## Model Independence
//!
//! The harness only depends on the [`model::SurvivalModel`] and
//! [`model::RiskModel`] traits. Any model that can be trained on a
//! [`dataset::Dataset`] and produce one risk score per row can be validated.
//!
//! ## Reproducibility
//!
//! Fold assignment is fully determined by [`cross_validation::KFoldOptions::seed`].
//! Running the harness twice with the same seed, model and data produces the
//! same scores.
//!
//! # Current Limitations
//!
//! - **No stratified folds**: Folds are assigned uniformly at random, so a
//!   small fold may contain no events and fail to score
//! - **Sequential**: Folds are evaluated one after another. Folds are
//!   independent, so callers may collect the fold indices and parallelise
//!   training themselves

use lifespan_stats::SurvivalError;

pub mod concordance;
pub mod cross_validation;
pub mod dataset;
pub mod model;

/// Errors reported by the cross-validation harness.
#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum CrossValidationError {
    /// An estimator or data validation error from `lifespan-stats`.
    #[display("{source}")]
    #[from]
    Survival { source: SurvivalError },
    #[display("fold count must be between 2 and the number of rows ({rows}), got {folds}")]
    InvalidFoldCount { folds: usize, rows: usize },
    #[display("dataset has no column named {name:?}")]
    MissingColumn { name: String },
    #[display("length mismatch: {reason}")]
    LengthMismatch { reason: String },
    /// Every pair of subjects was tied or censored before the other's event.
    #[display("no comparable pairs to score")]
    NoComparablePairs,
    /// A model implementation failed to train or predict.
    #[display("model error: {message}")]
    Model { message: String },
}

impl CrossValidationError {
    pub(crate) fn length_mismatch(reason: impl Into<String>) -> Self {
        Self::LengthMismatch {
            reason: reason.into(),
        }
    }

    /// Wraps a message from a model implementation.
    pub fn model(message: impl Into<String>) -> Self {
        Self::Model {
            message: message.into(),
        }
    }
}
