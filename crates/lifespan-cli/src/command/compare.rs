use std::path::PathBuf;

use clap::{Args, ValueEnum};
use lifespan_stats::logrank::{self, LogRankOptions, TestResult, Weighting};
use serde::Serialize;

use crate::{
    schema::record,
    util::{self, Output},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum WeightingKind {
    LogRank,
    Wilcoxon,
    TaroneWare,
    Peto,
    FlemingHarrington,
}

#[derive(Debug, Clone, Args)]
pub(crate) struct CompareArg {
    /// Path to the records JSON file; every record needs a "group"
    records: PathBuf,
    /// Test every pair of groups instead of all groups jointly
    #[arg(long)]
    pairwise: bool,
    /// Weight function of the test
    #[arg(long, value_enum)]
    weighting: Option<WeightingKind>,
    /// Exponent of S(t-) for Fleming-Harrington weights
    #[arg(long, default_value_t = 1.0)]
    fh_p: f64,
    /// Exponent of 1 - S(t-) for Fleming-Harrington weights
    #[arg(long, default_value_t = 1.0)]
    fh_q: f64,
    /// Ignore times after this point
    #[arg(long)]
    t0: Option<f64>,
    /// Significance level
    #[arg(long)]
    alpha: Option<f64>,
    /// Log-rank options JSON file; flags override its fields
    #[arg(long)]
    options: Option<PathBuf>,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

impl CompareArg {
    fn logrank_options(&self) -> anyhow::Result<LogRankOptions> {
        let mut options: LogRankOptions = util::read_options_file(self.options.as_deref())?;
        if let Some(kind) = self.weighting {
            options.weighting = match kind {
                WeightingKind::LogRank => Weighting::LogRank,
                WeightingKind::Wilcoxon => Weighting::Wilcoxon,
                WeightingKind::TaroneWare => Weighting::TaroneWare,
                WeightingKind::Peto => Weighting::Peto,
                WeightingKind::FlemingHarrington => Weighting::FlemingHarrington {
                    p: self.fh_p,
                    q: self.fh_q,
                },
            };
        }
        if let Some(t0) = self.t0 {
            options.t_0 = Some(t0);
        }
        if let Some(alpha) = self.alpha {
            options.alpha = alpha;
        }
        Ok(options)
    }
}

#[derive(Debug, Serialize)]
struct PairwiseEntry<'a> {
    group_a: &'a str,
    group_b: &'a str,
    #[serde(flatten)]
    result: &'a TestResult,
}

fn describe(result: &TestResult) -> String {
    format!(
        "statistic {:.4} on {} df, p = {:.4}{}",
        result.statistic,
        result.degrees_of_freedom,
        result.p_value,
        if result.is_significant() { " *" } else { "" }
    )
}

pub(crate) fn run(arg: &CompareArg) -> anyhow::Result<()> {
    let options = arg.logrank_options()?;
    let records = util::read_records_file(&arg.records)?;
    let data = record::to_survival_data(&records)?;
    let labels = record::group_labels(&records)?;
    eprintln!(
        "Comparing {} groups over {} subjects ({:?} weights)",
        record::count_groups(&labels),
        data.len(),
        options.weighting
    );

    if arg.pairwise {
        let results = logrank::pairwise_logrank_test(&data, &labels, &options)?;
        let entries = results
            .iter()
            .map(|((a, b), result)| {
                eprintln!("  {a} vs {b}: {}", describe(result));
                PairwiseEntry {
                    group_a: a,
                    group_b: b,
                    result,
                }
            })
            .collect::<Vec<_>>();
        Output::save_json(&entries, arg.output.clone())
    } else {
        let result = logrank::multivariate_logrank_test(&data, &labels, &options)?;
        eprintln!("  all groups: {}", describe(&result));
        Output::save_json(&result, arg.output.clone())
    }
}
