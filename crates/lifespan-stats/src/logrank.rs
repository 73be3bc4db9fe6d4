//! The log-rank family of tests for equality of survival curves.
//!
//! All tests share one accumulation pass: each group's observations are
//! turned into an [`EventTable`], the tables are re-expressed on the union of
//! their timelines, and at every time with at least one death the observed
//! and expected death counts of each group are compared.
//!
//! For `k` groups with at-risk counts `n_g`, deaths `d_g`, `n = Σ n_g` and
//! `d = Σ d_g`:
//!
//! ```text
//! Z_g  = Σ_t w(t) · (d_g - n_g·d/n)
//! V_gh = Σ_t w(t)² · d(n - d) / (n²(n - 1)) · n_g·(δ_gh·n - n_h)
//! χ²   = Zᵀ V⁺ Z                     (first k - 1 groups)
//! ```
//!
//! where `V⁺` is the Moore-Penrose pseudo-inverse. Under the null hypothesis
//! the statistic is chi-squared with `k - 1` degrees of freedom.
//!
//! Times where only one subject is at risk contribute to `Z` but not to `V`.
//! A total variance of zero yields a statistic of 0 and a p-value of 1.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    SurvivalError,
    data::SurvivalData,
    distribution,
    event_table::{EventTable, RiskCounts},
    linalg,
    timeline::Timeline,
};

/// Weight function `w(t)` applied at each death time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Weighting {
    /// `w = 1`, the classic log-rank test.
    #[default]
    LogRank,
    /// `w = n`, the Gehan-Breslow generalised Wilcoxon test.
    Wilcoxon,
    /// `w = sqrt(n)`.
    TaroneWare,
    /// `w = Π (1 - d/(n + 1))` over death times up to and including `t`.
    Peto,
    /// `w = S(t-)^p · (1 - S(t-))^q` with `S` the pooled Kaplan-Meier estimate.
    FlemingHarrington { p: f64, q: f64 },
}

/// Options of the log-rank family.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogRankOptions {
    /// Significance level used by [`TestResult::is_significant`].
    pub alpha: f64,
    /// Only times `<= t_0` take part in the comparison.
    pub t_0: Option<f64>,
    pub weighting: Weighting,
}

impl Default for LogRankOptions {
    fn default() -> Self {
        Self {
            alpha: 0.05,
            t_0: None,
            weighting: Weighting::LogRank,
        }
    }
}

impl LogRankOptions {
    fn validate(&self) -> Result<(), SurvivalError> {
        crate::check_alpha(self.alpha)?;
        if self.t_0.is_some_and(f64::is_nan) {
            return Err(SurvivalError::invalid_parameter("t_0 must not be NaN"));
        }
        if let Weighting::FlemingHarrington { p, q } = self.weighting
            && !(p.is_finite() && p >= 0.0 && q.is_finite() && q >= 0.0)
        {
            return Err(SurvivalError::invalid_parameter(format!(
                "Fleming-Harrington exponents must be finite and non-negative, got p = {p}, q = {q}"
            )));
        }
        Ok(())
    }
}

/// Reference distribution of a test statistic under the null hypothesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NullDistribution {
    #[serde(rename = "chi squared")]
    ChiSquared,
}

/// Outcome of a hypothesis test.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestResult {
    pub test_name: &'static str,
    pub statistic: f64,
    pub p_value: f64,
    pub degrees_of_freedom: usize,
    pub null_distribution: NullDistribution,
    pub alpha: f64,
    pub weighting: Weighting,
}

impl TestResult {
    /// Whether the null hypothesis is rejected at the configured `alpha`.
    #[must_use]
    pub fn is_significant(&self) -> bool {
        self.p_value < self.alpha
    }
}

/// Two-sample log-rank test of `a` against `b`.
///
/// # Errors
///
/// Returns [`SurvivalError::DegenerateGroup`] if either sample is empty and
/// [`SurvivalError::InvalidParameter`] for invalid options.
///
/// # Examples
///
/// ```
/// use lifespan_stats::{
///     data::SurvivalData,
///     logrank::{LogRankOptions, logrank_test},
/// };
///
/// let a = SurvivalData::all_observed(vec![1.0, 2.0, 3.0])?;
/// let b = SurvivalData::all_observed(vec![4.0, 5.0, 6.0])?;
/// let result = logrank_test(&a, &b, &LogRankOptions::default())?;
/// assert!((result.statistic - 1.85_f64.powi(2) / 0.6775).abs() < 1e-9);
/// assert!(result.is_significant());
/// # Ok::<(), lifespan_stats::SurvivalError>(())
/// ```
pub fn logrank_test(
    a: &SurvivalData,
    b: &SurvivalData,
    options: &LogRankOptions,
) -> Result<TestResult, SurvivalError> {
    compare_groups(&[a, b], options, "logrank_test")
}

/// Results of every two-sample comparison between distinct groups.
///
/// Keys are ordered pairs `(a, b)` with `a < b`.
#[derive(Debug, Clone, PartialEq)]
pub struct PairwiseResults<K> {
    results: BTreeMap<(K, K), TestResult>,
}

impl<K> PairwiseResults<K>
where
    K: Ord + Clone,
{
    /// Result of the comparison between `a` and `b`, in either order.
    #[must_use]
    pub fn get(&self, a: &K, b: &K) -> Option<&TestResult> {
        let key = if a <= b {
            (a.clone(), b.clone())
        } else {
            (b.clone(), a.clone())
        };
        self.results.get(&key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&(K, K), &TestResult)> {
        self.results.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Two-sample log-rank tests between every pair of distinct group labels.
///
/// `groups` holds one label per observation in `data`. No correction for
/// multiple comparisons is applied.
///
/// # Errors
///
/// Returns [`SurvivalError::InvalidObservation`] if `groups` and `data`
/// differ in length, [`SurvivalError::DegenerateGroup`] if fewer than two
/// distinct labels are present, and [`SurvivalError::InvalidParameter`] for
/// invalid options.
///
/// # Examples
///
/// ```
/// use lifespan_stats::{
///     data::SurvivalData,
///     logrank::{LogRankOptions, pairwise_logrank_test},
/// };
///
/// let data = SurvivalData::all_observed(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0])?;
/// let groups = ["x", "x", "y", "y", "z", "z"];
/// let results = pairwise_logrank_test(&data, &groups, &LogRankOptions::default())?;
/// assert_eq!(results.len(), 3);
/// assert!(results.get(&"z", &"x").is_some());
/// # Ok::<(), lifespan_stats::SurvivalError>(())
/// ```
pub fn pairwise_logrank_test<K>(
    data: &SurvivalData,
    groups: &[K],
    options: &LogRankOptions,
) -> Result<PairwiseResults<K>, SurvivalError>
where
    K: Ord + Clone + std::fmt::Debug,
{
    options.validate()?;
    let partitioned = distinct_groups(data, groups)?;
    let mut results = BTreeMap::new();
    for (i, (label_a, a)) in partitioned.iter().enumerate() {
        for (label_b, b) in partitioned.iter().skip(i + 1) {
            log::trace!("comparing group {label_a:?} against {label_b:?}");
            let result = compare_groups(&[a, b], options, "pairwise_logrank_test")?;
            results.insert((label_a.clone(), label_b.clone()), result);
        }
    }
    Ok(PairwiseResults { results })
}

/// Joint log-rank test of equality across all groups.
///
/// With `k` distinct labels the statistic has `k - 1` degrees of freedom.
/// For two labels this is identical to [`logrank_test`].
///
/// # Errors
///
/// Same as [`pairwise_logrank_test`].
pub fn multivariate_logrank_test<K>(
    data: &SurvivalData,
    groups: &[K],
    options: &LogRankOptions,
) -> Result<TestResult, SurvivalError>
where
    K: Ord + Clone,
{
    let partitioned = distinct_groups(data, groups)?;
    let samples = partitioned.values().collect::<Vec<_>>();
    compare_groups(&samples, options, "multivariate_logrank_test")
}

fn distinct_groups<K>(
    data: &SurvivalData,
    groups: &[K],
) -> Result<BTreeMap<K, SurvivalData>, SurvivalError>
where
    K: Ord + Clone,
{
    let partitioned = data.partition(groups)?;
    if partitioned.len() < 2 {
        return Err(SurvivalError::degenerate_group(format!(
            "at least two distinct groups are required, got {}",
            partitioned.len()
        )));
    }
    Ok(partitioned)
}

/// Running state of the weight function across death times.
struct Weights {
    weighting: Weighting,
    peto: f64,
    pooled_survival: f64,
}

impl Weights {
    fn new(weighting: Weighting) -> Self {
        Self {
            weighting,
            peto: 1.0,
            pooled_survival: 1.0,
        }
    }

    /// Weight at a time with `n` pooled subjects at risk and `d` deaths.
    ///
    /// Must be called once per time point in increasing order.
    fn next(&mut self, n: f64, d: f64) -> f64 {
        let before = self.pooled_survival;
        if n > 0.0 {
            self.pooled_survival *= 1.0 - d / n;
        }
        self.peto *= 1.0 - d / (n + 1.0);
        match self.weighting {
            Weighting::LogRank => 1.0,
            Weighting::Wilcoxon => n,
            Weighting::TaroneWare => n.sqrt(),
            Weighting::Peto => self.peto,
            Weighting::FlemingHarrington { p, q } => before.powf(p) * (1.0 - before).powf(q),
        }
    }
}

#[expect(clippy::cast_precision_loss)]
fn compare_groups(
    samples: &[&SurvivalData],
    options: &LogRankOptions,
    test_name: &'static str,
) -> Result<TestResult, SurvivalError> {
    options.validate()?;
    if samples.len() < 2 {
        return Err(SurvivalError::degenerate_group(
            "at least two groups are required",
        ));
    }
    if let Some(i) = samples.iter().position(|s| s.is_empty()) {
        return Err(SurvivalError::degenerate_group(format!(
            "group {i} has no observations"
        )));
    }

    let tables = samples
        .iter()
        .map(|s| EventTable::from_data(s))
        .collect::<Vec<_>>();
    let mut timeline = tables
        .iter()
        .fold(Timeline::default(), |acc, t| acc.union(&t.timeline()));
    if let Some(t_0) = options.t_0 {
        timeline = timeline.truncate_after(t_0);
    }
    let counts = tables
        .iter()
        .map(|t| t.counts_on(&timeline))
        .collect::<Vec<Vec<RiskCounts>>>();

    let k = samples.len();
    let mut z = vec![0.0; k];
    let mut v = vec![vec![0.0; k]; k];
    let mut weights = Weights::new(options.weighting);
    for i in 0..timeline.len() {
        let at_risk = counts.iter().map(|c| c[i].at_risk as f64).collect::<Vec<_>>();
        let deaths = counts.iter().map(|c| c[i].observed as f64).collect::<Vec<_>>();
        let n = at_risk.iter().sum::<f64>();
        let d = deaths.iter().sum::<f64>();
        let w = weights.next(n, d);
        if d == 0.0 || n == 0.0 {
            continue;
        }
        for ((z_g, n_g), d_g) in z.iter_mut().zip(&at_risk).zip(&deaths) {
            *z_g += w * (d_g - n_g * d / n);
        }
        if n > 1.0 {
            let scale = w * w * d * (n - d) / (n * n * (n - 1.0));
            for (g, row) in v.iter_mut().enumerate() {
                for (h, v_gh) in row.iter_mut().enumerate() {
                    let diagonal = if g == h { n } else { 0.0 };
                    *v_gh += scale * at_risk[g] * (diagonal - at_risk[h]);
                }
            }
        }
    }

    // The k deviations sum to zero, so one group is redundant.
    let m = k - 1;
    let reduced = v[..m].iter().map(|row| row[..m].to_vec()).collect::<Vec<_>>();
    let statistic = linalg::quadratic_form(&z[..m], &linalg::pseudo_inverse(&reduced)).max(0.0);
    let p_value = distribution::chi_squared_sf(statistic, m);

    log::debug!(
        "{test_name}: {k} groups, {} time points, statistic {statistic:.4}, p = {p_value:.4}",
        timeline.len()
    );

    Ok(TestResult {
        test_name,
        statistic,
        p_value,
        degrees_of_freedom: m,
        null_distribution: NullDistribution::ChiSquared,
        alpha: options.alpha,
        weighting: options.weighting,
    })
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    fn observed(durations: &[f64]) -> SurvivalData {
        SurvivalData::all_observed(durations.to_vec()).unwrap()
    }

    fn separated() -> (SurvivalData, SurvivalData) {
        (observed(&[1.0, 2.0, 3.0]), observed(&[4.0, 5.0, 6.0]))
    }

    #[test]
    fn test_hand_computed_statistic() {
        let (a, b) = separated();
        let result = logrank_test(&a, &b, &LogRankOptions::default()).unwrap();
        // Z = 0.5 + 0.6 + 0.75, V = 0.25 + 0.24 + 0.1875
        assert_abs_diff_eq!(result.statistic, 1.85 * 1.85 / 0.6775, epsilon = 1e-9);
        assert_eq!(result.degrees_of_freedom, 1);
        assert_eq!(result.test_name, "logrank_test");
        assert_abs_diff_eq!(
            result.p_value,
            distribution::chi_squared_sf(result.statistic, 1)
        );
    }

    #[test]
    fn test_symmetric_in_groups() {
        let a = SurvivalData::new(vec![1.0, 3.0, 3.0, 7.0], vec![true, false, true, true]).unwrap();
        let b = SurvivalData::new(vec![2.0, 3.0, 5.0], vec![true, true, false]).unwrap();
        let ab = logrank_test(&a, &b, &LogRankOptions::default()).unwrap();
        let ba = logrank_test(&b, &a, &LogRankOptions::default()).unwrap();
        assert_abs_diff_eq!(ab.statistic, ba.statistic, epsilon = 1e-12);
    }

    #[test]
    fn test_identical_groups() {
        let a = observed(&[1.0, 2.0, 3.0]);
        let result = logrank_test(&a, &a.clone(), &LogRankOptions::default()).unwrap();
        assert_abs_diff_eq!(result.statistic, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(result.p_value, 1.0, epsilon = 1e-9);
        assert!(!result.is_significant());
    }

    #[test]
    fn test_zero_variance() {
        let a = SurvivalData::new(vec![1.0], vec![false]).unwrap();
        let b = SurvivalData::new(vec![2.0], vec![false]).unwrap();
        let result = logrank_test(&a, &b, &LogRankOptions::default()).unwrap();
        assert_eq!(result.statistic, 0.0);
        assert_eq!(result.p_value, 1.0);
    }

    #[test]
    fn test_empty_group_is_degenerate() {
        let a = observed(&[1.0]);
        let empty = observed(&[]);
        let err = logrank_test(&a, &empty, &LogRankOptions::default()).unwrap_err();
        assert!(matches!(err, SurvivalError::DegenerateGroup { .. }));
    }

    #[test]
    fn test_single_label_is_degenerate() {
        let data = observed(&[1.0, 2.0]);
        let err = multivariate_logrank_test(&data, &[0, 0], &LogRankOptions::default())
            .unwrap_err();
        assert!(matches!(err, SurvivalError::DegenerateGroup { .. }));
        assert!(pairwise_logrank_test(&data, &[0, 0], &LogRankOptions::default()).is_err());
    }

    #[test]
    fn test_t_0_restricts_comparison() {
        let (a, b) = separated();
        let options = LogRankOptions {
            t_0: Some(1.0),
            ..LogRankOptions::default()
        };
        let result = logrank_test(&a, &b, &options).unwrap();
        // Only t = 1 remains: Z = 0.5, V = 0.25.
        assert_abs_diff_eq!(result.statistic, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_wilcoxon_weights() {
        let (a, b) = separated();
        let options = LogRankOptions {
            weighting: Weighting::Wilcoxon,
            ..LogRankOptions::default()
        };
        let result = logrank_test(&a, &b, &options).unwrap();
        // Z = 6·0.5 + 5·0.6 + 4·0.75 = 9, V = 36·0.25 + 25·0.24 + 16·0.1875 = 18
        assert_abs_diff_eq!(result.statistic, 4.5, epsilon = 1e-9);
    }

    #[test]
    fn test_fleming_harrington_zero_exponents_is_logrank() {
        let a = SurvivalData::new(vec![1.0, 2.0, 4.0, 4.0], vec![true, false, true, true]).unwrap();
        let b = SurvivalData::new(vec![2.0, 3.0, 3.0, 6.0], vec![true, true, false, true]).unwrap();
        let plain = logrank_test(&a, &b, &LogRankOptions::default()).unwrap();
        let fh = logrank_test(
            &a,
            &b,
            &LogRankOptions {
                weighting: Weighting::FlemingHarrington { p: 0.0, q: 0.0 },
                ..LogRankOptions::default()
            },
        )
        .unwrap();
        assert_abs_diff_eq!(plain.statistic, fh.statistic, epsilon = 1e-12);
    }

    #[test]
    fn test_weighted_variants_are_finite() {
        let (a, b) = separated();
        for weighting in [
            Weighting::TaroneWare,
            Weighting::Peto,
            Weighting::FlemingHarrington { p: 1.0, q: 1.0 },
        ] {
            let options = LogRankOptions {
                weighting,
                ..LogRankOptions::default()
            };
            let result = logrank_test(&a, &b, &options).unwrap();
            assert!(result.statistic.is_finite() && result.statistic > 0.0);
            assert!((0.0..=1.0).contains(&result.p_value));
        }
    }

    #[test]
    fn test_invalid_options() {
        let (a, b) = separated();
        let bad_alpha = LogRankOptions {
            alpha: 0.0,
            ..LogRankOptions::default()
        };
        assert!(logrank_test(&a, &b, &bad_alpha).is_err());
        let bad_t0 = LogRankOptions {
            t_0: Some(f64::NAN),
            ..LogRankOptions::default()
        };
        assert!(logrank_test(&a, &b, &bad_t0).is_err());
        let bad_fh = LogRankOptions {
            weighting: Weighting::FlemingHarrington { p: -1.0, q: 0.0 },
            ..LogRankOptions::default()
        };
        assert!(logrank_test(&a, &b, &bad_fh).is_err());
    }

    #[test]
    fn test_multivariate_two_groups_matches_two_sample() {
        let data = observed(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let groups = ["a", "a", "a", "b", "b", "b"];
        let multi = multivariate_logrank_test(&data, &groups, &LogRankOptions::default()).unwrap();
        let (a, b) = separated();
        let two = logrank_test(&a, &b, &LogRankOptions::default()).unwrap();
        assert_abs_diff_eq!(multi.statistic, two.statistic, epsilon = 1e-9);
        assert_eq!(multi.degrees_of_freedom, 1);
    }

    #[test]
    fn test_multivariate_three_groups() {
        let data = observed(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);
        let groups = [0, 0, 0, 1, 1, 1, 2, 2, 2];
        let result = multivariate_logrank_test(&data, &groups, &LogRankOptions::default()).unwrap();
        assert_eq!(result.degrees_of_freedom, 2);
        assert!(result.is_significant());
    }

    #[test]
    fn test_pairwise_keys_are_ordered() {
        let data = observed(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let groups = ["c", "c", "a", "a", "b", "b"];
        let results = pairwise_logrank_test(&data, &groups, &LogRankOptions::default()).unwrap();
        let keys = results.iter().map(|(k, _)| *k).collect::<Vec<_>>();
        assert_eq!(keys, [("a", "b"), ("a", "c"), ("b", "c")]);
        assert_eq!(results.get(&"c", &"a"), results.get(&"a", &"c"));
    }
}
