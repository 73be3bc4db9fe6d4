//! Validated batches of survival observations.
//!
//! A [`SurvivalData`] holds one record per subject as three parallel columns:
//! durations, event indicators and (optionally) left-truncation entry times.
//! All invariants are checked on construction so downstream code can assume
//! well-formed input.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::SurvivalError;

/// A single subject.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Observation {
    /// Time from origin to event or censoring.
    pub duration: f64,
    /// `true` if the event happened at `duration`, `false` if censored there.
    pub event_observed: bool,
    /// Time at which the subject entered the risk set (0 when not truncated).
    pub entry: f64,
}

/// A validated batch of observations.
///
/// # Invariants
///
/// - All columns have the same length
/// - Durations and entries are finite and non-negative
/// - `entry <= duration` for every subject
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SurvivalData {
    durations: Vec<f64>,
    events: Vec<bool>,
    entries: Option<Vec<f64>>,
}

impl SurvivalData {
    /// Creates a batch of right-censored observations.
    ///
    /// # Examples
    ///
    /// ```
    /// # use lifespan_stats::data::SurvivalData;
    /// let data = SurvivalData::new(vec![3.0, 5.0], vec![true, false]).unwrap();
    /// assert_eq!(data.len(), 2);
    ///
    /// assert!(SurvivalData::new(vec![-1.0], vec![true]).is_err());
    /// assert!(SurvivalData::new(vec![1.0, 2.0], vec![true]).is_err());
    /// ```
    pub fn new(durations: Vec<f64>, events: Vec<bool>) -> Result<Self, SurvivalError> {
        if durations.len() != events.len() {
            return Err(SurvivalError::invalid_observation(format!(
                "{} durations but {} event indicators",
                durations.len(),
                events.len()
            )));
        }
        if let Some((i, d)) = durations
            .iter()
            .enumerate()
            .find(|(_, d)| !(d.is_finite() && **d >= 0.0))
        {
            return Err(SurvivalError::invalid_observation(format!(
                "duration {d} at index {i} is not a finite non-negative number"
            )));
        }
        Ok(Self {
            durations,
            events,
            entries: None,
        })
    }

    /// Creates a batch where every event was observed.
    pub fn all_observed(durations: Vec<f64>) -> Result<Self, SurvivalError> {
        let events = vec![true; durations.len()];
        Self::new(durations, events)
    }

    /// Attaches left-truncation entry times to the batch.
    ///
    /// # Examples
    ///
    /// ```
    /// # use lifespan_stats::data::SurvivalData;
    /// let data = SurvivalData::new(vec![3.0, 5.0], vec![true, false]).unwrap();
    /// assert!(data.clone().with_entries(vec![1.0, 5.0]).is_ok());
    /// assert!(data.with_entries(vec![4.0, 0.0]).is_err()); // entry after duration
    /// ```
    pub fn with_entries(mut self, entries: Vec<f64>) -> Result<Self, SurvivalError> {
        if entries.len() != self.durations.len() {
            return Err(SurvivalError::invalid_observation(format!(
                "{} durations but {} entry times",
                self.durations.len(),
                entries.len()
            )));
        }
        for (i, (&entry, &duration)) in entries.iter().zip(&self.durations).enumerate() {
            if !(entry.is_finite() && entry >= 0.0) {
                return Err(SurvivalError::invalid_observation(format!(
                    "entry {entry} at index {i} is not a finite non-negative number"
                )));
            }
            if entry > duration {
                return Err(SurvivalError::invalid_observation(format!(
                    "entry {entry} exceeds duration {duration} at index {i}"
                )));
            }
        }
        self.entries = Some(entries);
        Ok(self)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.durations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.durations.is_empty()
    }

    #[must_use]
    pub fn durations(&self) -> &[f64] {
        &self.durations
    }

    #[must_use]
    pub fn events(&self) -> &[bool] {
        &self.events
    }

    /// Entry times, if the batch is left-truncated.
    #[must_use]
    pub fn entries(&self) -> Option<&[f64]> {
        self.entries.as_deref()
    }

    /// Number of subjects whose event was observed.
    #[must_use]
    pub fn observed_count(&self) -> usize {
        self.events.iter().filter(|e| **e).count()
    }

    /// Returns the `index`-th observation.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<Observation> {
        Some(Observation {
            duration: *self.durations.get(index)?,
            event_observed: self.events[index],
            entry: self.entries.as_ref().map_or(0.0, |e| e[index]),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = Observation> + '_ {
        (0..self.len()).filter_map(|i| self.get(i))
    }

    /// Returns the observations at `indices`, in that order.
    ///
    /// # Panics
    ///
    /// Panics if any index is out of bounds.
    #[must_use]
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            durations: indices.iter().map(|&i| self.durations[i]).collect(),
            events: indices.iter().map(|&i| self.events[i]).collect(),
            entries: self
                .entries
                .as_ref()
                .map(|e| indices.iter().map(|&i| e[i]).collect()),
        }
    }

    /// Splits the batch by a parallel column of group labels.
    ///
    /// Groups are returned in label order; subjects keep their relative order
    /// within each group.
    ///
    /// # Examples
    ///
    /// ```
    /// # use lifespan_stats::data::SurvivalData;
    /// let data = SurvivalData::all_observed(vec![1.0, 2.0, 3.0]).unwrap();
    /// let groups = data.partition(&["b", "a", "b"]).unwrap();
    /// assert_eq!(groups["a"].durations(), &[2.0]);
    /// assert_eq!(groups["b"].durations(), &[1.0, 3.0]);
    /// ```
    pub fn partition<K>(&self, groups: &[K]) -> Result<BTreeMap<K, Self>, SurvivalError>
    where
        K: Ord + Clone,
    {
        if groups.len() != self.len() {
            return Err(SurvivalError::invalid_observation(format!(
                "{} observations but {} group labels",
                self.len(),
                groups.len()
            )));
        }
        let mut indices = BTreeMap::<K, Vec<usize>>::new();
        for (i, key) in groups.iter().enumerate() {
            indices.entry(key.clone()).or_default().push(i);
        }
        Ok(indices
            .into_iter()
            .map(|(key, idx)| (key, self.select(&idx)))
            .collect())
    }
}
