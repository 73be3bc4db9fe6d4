use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Args, ValueEnum};
use lifespan_stats::{
    curve::EstimateCurve,
    estimator::{Estimator as _, FitOptions, KaplanMeierFitter, NelsonAalenFitter},
};
use serde::Serialize;

use crate::{
    schema::record,
    util::{self, Output},
};

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum EstimatorKind {
    #[default]
    KaplanMeier,
    NelsonAalen,
}

#[derive(Debug, Clone, Args)]
pub(crate) struct FitArg {
    /// Path to the records JSON file
    records: PathBuf,
    /// Estimator to fit
    #[arg(long, value_enum, default_value_t)]
    estimator: EstimatorKind,
    /// Label of the fitted curve
    #[arg(long)]
    label: Option<String>,
    /// Significance level of the confidence band
    #[arg(long)]
    alpha: Option<f64>,
    /// Report the curve at these times instead of the observed ones (comma-separated)
    #[arg(long, value_delimiter = ',')]
    timeline: Option<Vec<f64>>,
    /// Fit options JSON file; flags override its fields
    #[arg(long)]
    options: Option<PathBuf>,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

impl FitArg {
    fn fit_options(&self) -> anyhow::Result<FitOptions> {
        let mut options: FitOptions = util::read_options_file(self.options.as_deref())?;
        if let Some(label) = &self.label {
            options = options.with_label(label.clone());
        }
        if let Some(alpha) = self.alpha {
            options = options.with_alpha(alpha);
        }
        if let Some(timeline) = &self.timeline {
            options = options.with_timeline(timeline.clone());
        }
        Ok(options)
    }
}

#[derive(Debug, Serialize)]
struct FitReport<'a> {
    #[serde(flatten)]
    curve: &'a EstimateCurve,
    /// `Some(None)` when the survival curve never reaches one half.
    #[serde(skip_serializing_if = "Option::is_none")]
    median_survival_time: Option<Option<f64>>,
}

pub(crate) fn run(arg: &FitArg) -> anyhow::Result<()> {
    let options = arg.fit_options()?;
    let records = util::read_records_file(&arg.records)?;
    let data = record::to_survival_data(&records)?;
    eprintln!(
        "Fitting {:?} to {} subjects ({} events)",
        arg.estimator,
        data.len(),
        data.observed_count()
    );

    match arg.estimator {
        EstimatorKind::KaplanMeier => {
            let mut kmf = KaplanMeierFitter::new();
            kmf.fit(&data, &options)
                .context("Failed to fit Kaplan-Meier estimator")?;
            let median = kmf.median_survival_time()?;
            match median {
                Some(median) => eprintln!("Median survival time: {median}"),
                None => eprintln!("Median survival time: not reached"),
            }
            let report = FitReport {
                curve: kmf.curve()?,
                median_survival_time: Some(median),
            };
            Output::save_json(&report, arg.output.clone())?;
        }
        EstimatorKind::NelsonAalen => {
            let mut naf = NelsonAalenFitter::new();
            naf.fit(&data, &options)
                .context("Failed to fit Nelson-Aalen estimator")?;
            let report = FitReport {
                curve: naf.curve()?,
                median_survival_time: None,
            };
            Output::save_json(&report, arg.output.clone())?;
        }
    }
    Ok(())
}
