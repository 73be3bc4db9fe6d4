//! Event tables: per-distinct-time counts of entrances, deaths and censorings.
//!
//! The event table is the canonical intermediate representation behind every
//! estimator and test in this crate. Each row summarises what happens at one
//! distinct time:
//!
//! | column     | meaning                                                  |
//! |------------|----------------------------------------------------------|
//! | `removed`  | subjects leaving the risk set (`observed + censored`)    |
//! | `observed` | deaths                                                   |
//! | `censored` | censorings                                               |
//! | `entrance` | subjects entering the risk set                           |
//! | `at_risk`  | size of the risk set just before removals at this time   |
//!
//! # Tie handling
//!
//! Within a single time, entrances are applied before removals. A subject
//! entering at `t` is therefore at risk for events at `t`, and a subject whose
//! entry equals its duration still contributes to exactly one row.
//!
//! Without explicit entry times every subject enters at time 0, so the table
//! starts with a row at 0 whose `entrance` equals the number of subjects.
//!
//! # Examples
//!
//! ```
//! use lifespan_stats::event_table;
//!
//! let table = event_table::build(&[5.0, 5.0, 6.0, 6.0, 8.0], &[true; 5], None)?;
//! let rows = table.rows();
//! assert_eq!(rows[0].time, 0.0);
//! assert_eq!(rows[0].entrance, 5);
//! assert_eq!((rows[1].time, rows[1].at_risk, rows[1].observed), (5.0, 5, 2));
//! assert_eq!((rows[2].time, rows[2].at_risk, rows[2].observed), (6.0, 3, 2));
//! assert_eq!((rows[3].time, rows[3].at_risk, rows[3].observed), (8.0, 1, 1));
//! # Ok::<(), lifespan_stats::SurvivalError>(())
//! ```

use serde::{Deserialize, Serialize};

use crate::{SurvivalError, data::SurvivalData, timeline::Timeline};

/// Counts at one distinct time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EventRow {
    pub time: f64,
    pub removed: usize,
    pub observed: usize,
    pub censored: usize,
    pub entrance: usize,
    pub at_risk: usize,
}

/// At-risk and death counts of one table re-expressed at an arbitrary time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RiskCounts {
    pub at_risk: usize,
    pub observed: usize,
}

/// Pre-aggregated counts, as read from a published life table.
///
/// `entrance` and `at_risk` are optional. With neither column every subject
/// is assumed to enter at the first time; with one of them the other is
/// derived; with both they must agree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregatedCounts {
    pub time: Vec<f64>,
    pub observed: Vec<usize>,
    pub censored: Vec<usize>,
    #[serde(default)]
    pub entrance: Option<Vec<usize>>,
    #[serde(default)]
    pub at_risk: Option<Vec<usize>>,
}

/// An immutable event table ordered by strictly increasing time.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct EventTable {
    rows: Vec<EventRow>,
}

#[derive(Debug, Clone, Copy)]
enum Mark {
    Entrance,
    Death,
    Censoring,
}

/// Builds an event table from parallel columns of raw observations.
///
/// This is a convenience wrapper around [`SurvivalData`] validation followed
/// by [`EventTable::from_data`].
///
/// # Errors
///
/// Returns [`SurvivalError::InvalidObservation`] for negative durations,
/// `entry > duration`, or columns of different lengths.
pub fn build(
    durations: &[f64],
    events: &[bool],
    entries: Option<&[f64]>,
) -> Result<EventTable, SurvivalError> {
    let mut data = SurvivalData::new(durations.to_vec(), events.to_vec())?;
    if let Some(entries) = entries {
        data = data.with_entries(entries.to_vec())?;
    }
    Ok(EventTable::from_data(&data))
}

impl EventTable {
    /// Builds the event table of a validated batch of observations.
    #[must_use]
    pub fn from_data(data: &SurvivalData) -> Self {
        let mut marks = Vec::with_capacity(data.len() * 2);
        for obs in data.iter() {
            marks.push((obs.entry, Mark::Entrance));
            let mark = if obs.event_observed {
                Mark::Death
            } else {
                Mark::Censoring
            };
            marks.push((obs.duration, mark));
        }
        marks.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut rows = vec![];
        let mut remaining = 0;
        for chunk in marks.chunk_by(|a, b| a.0 == b.0) {
            let (mut entrance, mut observed, mut censored) = (0, 0, 0);
            for (_, mark) in chunk {
                match mark {
                    Mark::Entrance => entrance += 1,
                    Mark::Death => observed += 1,
                    Mark::Censoring => censored += 1,
                }
            }
            // Entrances join the risk set before this time's removals.
            let at_risk = remaining + entrance;
            let removed = observed + censored;
            rows.push(EventRow {
                time: chunk[0].0,
                removed,
                observed,
                censored,
                entrance,
                at_risk,
            });
            remaining = at_risk - removed;
        }
        debug_assert_eq!(remaining, 0);

        Self { rows }
    }

    /// Builds an event table from pre-aggregated counts.
    ///
    /// # Errors
    ///
    /// Returns [`SurvivalError::InconsistentTable`] if columns have different
    /// lengths, times are not strictly increasing non-negative numbers, more
    /// subjects are removed than are at risk, or the supplied `entrance` and
    /// `at_risk` columns disagree.
    ///
    /// # Examples
    ///
    /// ```
    /// use lifespan_stats::event_table::{AggregatedCounts, EventTable};
    ///
    /// let counts = AggregatedCounts {
    ///     time: vec![1.0, 2.0, 3.0],
    ///     observed: vec![1, 1, 0],
    ///     censored: vec![0, 1, 1],
    ///     ..AggregatedCounts::default()
    /// };
    /// let table = EventTable::from_aggregated(&counts).unwrap();
    /// let at_risk: Vec<_> = table.rows().iter().map(|r| r.at_risk).collect();
    /// assert_eq!(at_risk, [4, 3, 1]);
    /// ```
    pub fn from_aggregated(counts: &AggregatedCounts) -> Result<Self, SurvivalError> {
        let n = counts.time.len();
        let check_len = |name: &str, len: usize| {
            if len == n {
                Ok(())
            } else {
                Err(SurvivalError::inconsistent_table(format!(
                    "column `{name}` has {len} rows, expected {n}"
                )))
            }
        };
        check_len("observed", counts.observed.len())?;
        check_len("censored", counts.censored.len())?;
        if let Some(entrance) = &counts.entrance {
            check_len("entrance", entrance.len())?;
        }
        if let Some(at_risk) = &counts.at_risk {
            check_len("at_risk", at_risk.len())?;
        }
        if let Some(t) = counts.time.iter().find(|t| !(t.is_finite() && **t >= 0.0)) {
            return Err(SurvivalError::inconsistent_table(format!(
                "time {t} is not a finite non-negative number"
            )));
        }
        if !counts.time.is_sorted_by(|a, b| a < b) {
            return Err(SurvivalError::inconsistent_table(
                "times must be strictly increasing",
            ));
        }

        let removed = counts
            .observed
            .iter()
            .zip(&counts.censored)
            .map(|(o, c)| o + c)
            .collect::<Vec<_>>();

        let entrance = match (&counts.entrance, &counts.at_risk) {
            (Some(entrance), _) => entrance.clone(),
            (None, Some(at_risk)) => derive_entrance(&counts.time, at_risk, &removed)?,
            (None, None) => {
                let mut entrance = vec![0; n];
                if let Some(first) = entrance.first_mut() {
                    *first = removed.iter().sum();
                }
                entrance
            }
        };

        let mut rows = Vec::with_capacity(n);
        let mut remaining = 0usize;
        for i in 0..n {
            let time = counts.time[i];
            let at_risk = remaining + entrance[i];
            if let Some(supplied) = counts.at_risk.as_ref().map(|a| a[i])
                && supplied != at_risk
            {
                return Err(SurvivalError::inconsistent_table(format!(
                    "at time {time}: supplied at_risk {supplied} disagrees with entrances ({at_risk})"
                )));
            }
            remaining = at_risk.checked_sub(removed[i]).ok_or_else(|| {
                SurvivalError::inconsistent_table(format!(
                    "at time {time}: {} removed but only {at_risk} at risk",
                    removed[i]
                ))
            })?;
            rows.push(EventRow {
                time,
                removed: removed[i],
                observed: counts.observed[i],
                censored: counts.censored[i],
                entrance: entrance[i],
                at_risk,
            });
        }

        Ok(Self { rows })
    }

    /// Expands the table back into one record per removed subject.
    ///
    /// Within each time, observed subjects precede censored ones. Entry times
    /// are not recoverable and are therefore not returned.
    ///
    /// # Examples
    ///
    /// ```
    /// # use lifespan_stats::event_table;
    /// let table = event_table::build(&[2.0, 1.0, 2.0], &[false, true, true], None).unwrap();
    /// let (durations, events) = table.expand();
    /// assert_eq!(durations, [1.0, 2.0, 2.0]);
    /// assert_eq!(events, [true, true, false]);
    /// ```
    #[must_use]
    pub fn expand(&self) -> (Vec<f64>, Vec<bool>) {
        let total = self.rows.iter().map(|r| r.removed).sum();
        let mut durations = Vec::with_capacity(total);
        let mut events = Vec::with_capacity(total);
        for row in &self.rows {
            durations.extend(std::iter::repeat_n(row.time, row.removed));
            events.extend(std::iter::repeat_n(true, row.observed));
            events.extend(std::iter::repeat_n(false, row.censored));
        }
        (durations, events)
    }

    /// Counts of this table expressed on another timeline.
    ///
    /// For each time `t`, `at_risk` is the size of the risk set just before
    /// removals at `t` (all entrances at or before `t`, minus removals strictly
    /// before `t`) and `observed` is the number of deaths exactly at `t`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use lifespan_stats::{event_table, timeline::Timeline};
    /// let table = event_table::build(&[2.0, 4.0], &[true, true], None).unwrap();
    /// let timeline = Timeline::new([1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
    /// let counts = table.counts_on(&timeline);
    /// let at_risk: Vec<_> = counts.iter().map(|c| c.at_risk).collect();
    /// let observed: Vec<_> = counts.iter().map(|c| c.observed).collect();
    /// assert_eq!(at_risk, [2, 2, 1, 1, 0]);
    /// assert_eq!(observed, [0, 1, 0, 1, 0]);
    /// ```
    #[must_use]
    pub fn counts_on(&self, timeline: &Timeline) -> Vec<RiskCounts> {
        let mut idx = 0;
        let mut remaining = 0;
        timeline
            .iter()
            .map(|t| {
                while let Some(row) = self.rows.get(idx).filter(|row| row.time < t) {
                    remaining = remaining + row.entrance - row.removed;
                    idx += 1;
                }
                match self.rows.get(idx) {
                    Some(row) if row.time == t => RiskCounts {
                        at_risk: row.at_risk,
                        observed: row.observed,
                    },
                    _ => RiskCounts {
                        at_risk: remaining,
                        observed: 0,
                    },
                }
            })
            .collect()
    }

    #[must_use]
    pub fn rows(&self) -> &[EventRow] {
        &self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The distinct times of the table.
    #[must_use]
    pub fn timeline(&self) -> Timeline {
        Timeline::from_sorted(self.rows.iter().map(|r| r.time).collect())
    }

    /// Number of subjects that ever entered the risk set.
    #[must_use]
    pub fn total_subjects(&self) -> usize {
        self.rows.iter().map(|r| r.entrance).sum()
    }

    /// Number of observed deaths.
    #[must_use]
    pub fn total_observed(&self) -> usize {
        self.rows.iter().map(|r| r.observed).sum()
    }
}

fn derive_entrance(
    times: &[f64],
    at_risk: &[usize],
    removed: &[usize],
) -> Result<Vec<usize>, SurvivalError> {
    let mut entrance = Vec::with_capacity(at_risk.len());
    let mut remaining = 0usize;
    for ((&time, &n), &r) in times.iter().zip(at_risk).zip(removed) {
        let entered = n.checked_sub(remaining).ok_or_else(|| {
            SurvivalError::inconsistent_table(format!(
                "at time {time}: at_risk {n} is below the {remaining} subjects still at risk"
            ))
        })?;
        entrance.push(entered);
        remaining = n.checked_sub(r).ok_or_else(|| {
            SurvivalError::inconsistent_table(format!(
                "at time {time}: {r} removed but only {n} at risk"
            ))
        })?;
    }
    Ok(entrance)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check_invariants(table: &EventTable) {
        let mut prev: Option<&EventRow> = None;
        for row in table.rows() {
            assert_eq!(row.removed, row.observed + row.censored);
            assert!(row.at_risk >= row.removed);
            match prev {
                Some(p) => {
                    assert!(p.time < row.time);
                    assert_eq!(row.at_risk, p.at_risk - p.removed + row.entrance);
                }
                None => assert_eq!(row.at_risk, row.entrance),
            }
            prev = Some(row);
        }
    }

    #[test]
    fn test_ties_are_aggregated() {
        let table = build(&[3.0, 3.0, 3.0, 1.0], &[true, false, true, false], None).unwrap();
        check_invariants(&table);
        let row = table.rows().iter().find(|r| r.time == 3.0).unwrap();
        assert_eq!(row.observed, 2);
        assert_eq!(row.censored, 1);
        assert_eq!(row.at_risk, 3);
    }

    #[test]
    fn test_zero_row_without_entries() {
        let table = build(&[1.0, 2.0], &[true, true], None).unwrap();
        assert_eq!(table.rows()[0].time, 0.0);
        assert_eq!(table.rows()[0].entrance, 2);
        assert_eq!(table.rows()[0].removed, 0);
        assert_eq!(table.total_subjects(), 2);
    }

    #[test]
    fn test_entrance_counts_before_removal_at_same_time() {
        // Subject B enters at 2 and subject A dies at 2: B is at risk for that death.
        let table = build(&[2.0, 5.0], &[true, true], Some(&[0.0, 2.0])).unwrap();
        check_invariants(&table);
        let row = table.rows().iter().find(|r| r.time == 2.0).unwrap();
        assert_eq!(row.entrance, 1);
        assert_eq!(row.at_risk, 2);
        assert_eq!(row.observed, 1);
    }

    #[test]
    fn test_entry_equal_to_duration() {
        let table = build(&[3.0], &[true], Some(&[3.0])).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows()[0].at_risk, 1);
        assert_eq!(table.rows()[0].observed, 1);
    }

    #[test]
    fn test_left_truncation_first_row() {
        let table = build(
            &[4.0, 6.0, 7.0],
            &[true, true, false],
            Some(&[2.0, 2.0, 5.0]),
        )
        .unwrap();
        check_invariants(&table);
        let first = table.rows()[0];
        assert_eq!(first.time, 2.0);
        assert_eq!(first.at_risk, 2);
    }

    #[test]
    fn test_build_rejects_entry_after_duration() {
        let err = build(&[1.0], &[true], Some(&[2.0])).unwrap_err();
        assert!(matches!(err, SurvivalError::InvalidObservation { .. }));
    }

    #[test]
    fn test_build_rejects_negative_duration() {
        assert!(build(&[-0.5], &[true], None).is_err());
    }

    #[test]
    fn test_empty_input() {
        let table = build(&[], &[], None).unwrap();
        assert!(table.is_empty());
        assert!(table.expand().0.is_empty());
    }

    #[test]
    fn test_aggregated_with_at_risk_derives_entrance() {
        let counts = AggregatedCounts {
            time: vec![1.0, 2.0, 3.0],
            observed: vec![1, 0, 2],
            censored: vec![0, 1, 0],
            entrance: None,
            at_risk: Some(vec![3, 4, 3]),
        };
        let table = EventTable::from_aggregated(&counts).unwrap();
        check_invariants(&table);
        let entrance: Vec<_> = table.rows().iter().map(|r| r.entrance).collect();
        assert_eq!(entrance, [3, 2, 0]);
    }

    #[test]
    fn test_aggregated_removed_exceeds_at_risk() {
        let counts = AggregatedCounts {
            time: vec![1.0, 2.0],
            observed: vec![1, 3],
            censored: vec![0, 0],
            entrance: None,
            at_risk: Some(vec![2, 1]),
        };
        let err = EventTable::from_aggregated(&counts).unwrap_err();
        assert!(matches!(err, SurvivalError::InconsistentTable { .. }));
    }

    #[test]
    fn test_aggregated_entrance_and_at_risk_disagree() {
        let counts = AggregatedCounts {
            time: vec![1.0],
            observed: vec![1],
            censored: vec![0],
            entrance: Some(vec![2]),
            at_risk: Some(vec![3]),
        };
        assert!(EventTable::from_aggregated(&counts).is_err());
    }

    #[test]
    fn test_aggregated_unsorted_times() {
        let counts = AggregatedCounts {
            time: vec![2.0, 1.0],
            observed: vec![1, 1],
            censored: vec![0, 0],
            ..AggregatedCounts::default()
        };
        assert!(EventTable::from_aggregated(&counts).is_err());
    }

    #[test]
    fn test_aggregated_column_length_mismatch() {
        let counts = AggregatedCounts {
            time: vec![1.0, 2.0],
            observed: vec![1],
            censored: vec![0, 0],
            ..AggregatedCounts::default()
        };
        assert!(EventTable::from_aggregated(&counts).is_err());
    }

    #[test]
    fn test_aggregated_matches_raw_build() {
        let raw = build(&[1.0, 2.0, 2.0, 4.0], &[true, true, false, true], None).unwrap();
        let rows = &raw.rows()[1..];
        let counts = AggregatedCounts {
            time: rows.iter().map(|r| r.time).collect(),
            observed: rows.iter().map(|r| r.observed).collect(),
            censored: rows.iter().map(|r| r.censored).collect(),
            ..AggregatedCounts::default()
        };
        let aggregated = EventTable::from_aggregated(&counts).unwrap();
        let at_risk = |t: &EventTable| {
            t.rows()
                .iter()
                .map(|r| (r.time, r.at_risk))
                .collect::<Vec<_>>()
        };
        assert_eq!(at_risk(&aggregated), at_risk(&raw)[1..]);
    }

    #[test]
    fn test_counts_on_with_truncation() {
        let table = build(&[3.0, 6.0], &[true, true], Some(&[0.0, 4.0])).unwrap();
        let timeline = Timeline::new([1.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let at_risk: Vec<_> = table
            .counts_on(&timeline)
            .iter()
            .map(|c| c.at_risk)
            .collect();
        assert_eq!(at_risk, [1, 1, 1, 1, 1]);
    }
}
