use std::path::PathBuf;

use anyhow::Context as _;
use clap::Args;
use lifespan_stats::descriptive::DescriptiveStats;
use lifespan_validation::{
    cross_validation::{self, CrossValidationSummary, KFoldOptions},
    model::StratifiedHazardModel,
};

use crate::util::{self, Output};

#[derive(Debug, Clone, Args)]
pub(crate) struct CrossValidateArg {
    /// Path to the dataset JSON file (an object of equally long numeric columns)
    dataset: PathBuf,
    /// Column holding durations
    #[arg(long, default_value = "duration")]
    duration_col: String,
    /// Column holding event indicators (non-zero means observed)
    #[arg(long, default_value = "event")]
    event_col: String,
    /// Column whose values define the model strata
    #[arg(long)]
    strata_col: Option<String>,
    /// Time at which the cumulative hazard is read (median duration by default)
    #[arg(long)]
    horizon: Option<f64>,
    /// Number of folds
    #[arg(long, default_value_t = 5)]
    folds: usize,
    /// Seed of the fold assignment
    #[arg(long)]
    seed: Option<u64>,
    /// Cross-validation options JSON file; flags override its fields
    #[arg(long)]
    options: Option<PathBuf>,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

impl CrossValidateArg {
    fn model(&self) -> StratifiedHazardModel {
        let mut model = StratifiedHazardModel::new();
        if let Some(col) = &self.strata_col {
            model = model.with_strata(col.clone());
        }
        if let Some(horizon) = self.horizon {
            model = model.with_horizon(horizon);
        }
        model
    }
}

pub(crate) fn run(arg: &CrossValidateArg) -> anyhow::Result<()> {
    let mut options: KFoldOptions = util::read_options_file(arg.options.as_deref())?;
    if let Some(seed) = arg.seed {
        options.seed = seed;
    }
    let dataset = util::read_dataset_file(&arg.dataset)?;
    let model = arg.model();
    eprintln!(
        "Cross-validating over {} rows with {} folds (seed {})",
        dataset.rows(),
        arg.folds,
        options.seed
    );

    let folds = cross_validation::k_fold(
        &model,
        &dataset,
        arg.folds,
        &arg.duration_col,
        &arg.event_col,
        &options,
    )?;
    let mut scores = Vec::with_capacity(folds.len());
    for (i, score) in folds.enumerate() {
        let score = score.with_context(|| format!("Fold {} failed", i + 1))?;
        eprintln!("  fold {}/{}: concordance {score:.4}", i + 1, arg.folds);
        scores.push(score);
    }

    let stats = DescriptiveStats::new(scores.iter().copied());
    if let Some(stats) = &stats {
        eprintln!(
            "Mean concordance {:.4} (sd {:.4}, range {:.4}..{:.4})",
            stats.mean, stats.std_dev, stats.min, stats.max
        );
    }
    Output::save_json(&CrossValidationSummary { scores, stats }, arg.output.clone())
}
