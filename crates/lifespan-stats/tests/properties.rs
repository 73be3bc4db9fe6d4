use lifespan_stats::{
    data::SurvivalData,
    estimator::{Estimator as _, FitOptions, KaplanMeierFitter, NelsonAalenFitter},
    event_table::{self, EventTable},
    timeline::Timeline,
};
use proptest::prelude::*;

/// Durations on a coarse grid so that ties are common.
fn records(max_len: usize) -> impl Strategy<Value = Vec<(f64, bool)>> {
    proptest::collection::vec(((0u32..40).prop_map(|d| f64::from(d) / 2.0), any::<bool>()), 1..=max_len)
}

/// Records with a left-truncation entry time no later than the duration.
fn truncated_records(max_len: usize) -> impl Strategy<Value = Vec<(f64, bool, f64)>> {
    proptest::collection::vec(
        ((0u32..40), any::<bool>(), (0u32..=100)).prop_map(|(d, e, frac)| {
            let duration = f64::from(d) / 2.0;
            let entry = (duration * f64::from(frac) / 100.0 * 2.0).floor() / 2.0;
            (duration, e, entry)
        }),
        1..=max_len,
    )
}

fn to_data(records: &[(f64, bool)]) -> SurvivalData {
    SurvivalData::new(
        records.iter().map(|r| r.0).collect(),
        records.iter().map(|r| r.1).collect(),
    )
    .unwrap()
}

fn to_truncated_data(records: &[(f64, bool, f64)]) -> SurvivalData {
    SurvivalData::new(
        records.iter().map(|r| r.0).collect(),
        records.iter().map(|r| r.1).collect(),
    )
    .unwrap()
    .with_entries(records.iter().map(|r| r.2).collect())
    .unwrap()
}

fn check_table(table: &EventTable, subjects: usize) -> Result<(), TestCaseError> {
    let mut remaining = 0usize;
    let mut prev_time = f64::NEG_INFINITY;
    for row in table.rows() {
        prop_assert!(row.time > prev_time);
        prop_assert_eq!(row.removed, row.observed + row.censored);
        prop_assert_eq!(row.at_risk, remaining + row.entrance);
        prop_assert!(row.at_risk >= row.removed);
        remaining = row.at_risk - row.removed;
        prev_time = row.time;
    }
    prop_assert_eq!(remaining, 0);
    prop_assert_eq!(table.total_subjects(), subjects);
    Ok(())
}

proptest! {
    #[test]
    fn expand_recovers_records(records in records(60)) {
        let data = to_data(&records);
        let table = EventTable::from_data(&data);
        let (durations, events) = table.expand();

        let mut expected = records.clone();
        // Within a time, observed subjects come first.
        expected.sort_by(|a, b| a.0.total_cmp(&b.0).then(b.1.cmp(&a.1)));
        let actual = durations.into_iter().zip(events).collect::<Vec<_>>();
        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn table_invariants_hold(records in records(60)) {
        let table = EventTable::from_data(&to_data(&records));
        check_table(&table, records.len())?;
    }

    #[test]
    fn truncated_table_invariants_hold(records in truncated_records(60)) {
        let table = EventTable::from_data(&to_truncated_data(&records));
        check_table(&table, records.len())?;
        let durations = records.iter().map(|r| r.0).collect::<Vec<_>>();
        let events = records.iter().map(|r| r.1).collect::<Vec<_>>();
        let entries = records.iter().map(|r| r.2).collect::<Vec<_>>();
        let rebuilt = event_table::build(&durations, &events, Some(&entries)).unwrap();
        prop_assert_eq!(rebuilt, table);
    }

    #[test]
    fn kaplan_meier_is_monotone_and_bounded(records in truncated_records(60)) {
        let mut kmf = KaplanMeierFitter::new();
        kmf.fit(&to_truncated_data(&records), &FitOptions::default()).unwrap();
        let curve = kmf.curve().unwrap();
        prop_assert_eq!(curve.estimate.boundary(), 1.0);
        let values = curve.estimate.values();
        prop_assert!(values.iter().all(|s| (0.0..=1.0).contains(s)));
        prop_assert!(values.windows(2).all(|w| w[1] <= w[0]));
        for ((s, lo), hi) in values.iter().zip(curve.lower.values()).zip(curve.upper.values()) {
            prop_assert!(lo <= s && s <= hi);
        }
    }

    #[test]
    fn nelson_aalen_is_monotone_and_non_negative(records in truncated_records(60)) {
        let mut naf = NelsonAalenFitter::new();
        naf.fit(&to_truncated_data(&records), &FitOptions::default()).unwrap();
        let curve = naf.curve().unwrap();
        prop_assert_eq!(curve.estimate.boundary(), 0.0);
        let values = curve.estimate.values();
        prop_assert!(values.iter().all(|h| *h >= 0.0));
        prop_assert!(values.windows(2).all(|w| w[1] >= w[0]));
    }

    #[test]
    fn estimates_before_first_time_are_boundary(records in records(30), offset in 0.1f64..10.0) {
        let data = to_data(&records);
        let mut kmf = KaplanMeierFitter::new();
        kmf.fit(&data, &FitOptions::default()).unwrap();
        let mut naf = NelsonAalenFitter::new();
        naf.fit(&data, &FitOptions::default()).unwrap();
        prop_assert_eq!(kmf.predict(-offset).unwrap(), 1.0);
        prop_assert_eq!(naf.predict(-offset).unwrap(), 0.0);
    }

    #[test]
    fn reindex_is_idempotent(
        records in records(30),
        target in proptest::collection::vec(-5.0f64..30.0, 0..20),
    ) {
        let mut kmf = KaplanMeierFitter::new();
        kmf.fit(&to_data(&records), &FitOptions::default()).unwrap();
        let target = Timeline::new(target).unwrap();
        let once = kmf.curve().unwrap().reindex(&target);
        let twice = once.reindex(&target);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn reindexed_values_match_predictions(
        records in records(30),
        target in proptest::collection::vec(-5.0f64..30.0, 1..20),
    ) {
        let mut kmf = KaplanMeierFitter::new();
        kmf.fit(&to_data(&records), &FitOptions::default()).unwrap();
        let timeline = Timeline::new(target).unwrap();
        let mut on_target = KaplanMeierFitter::new();
        on_target
            .fit(&to_data(&records), &FitOptions::default().with_timeline(timeline.points().to_vec()))
            .unwrap();
        let predicted = kmf.predict_many(timeline.points()).unwrap();
        prop_assert_eq!(
            on_target.curve().unwrap().estimate.values(),
            predicted.as_slice()
        );
    }
}
