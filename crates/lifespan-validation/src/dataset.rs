//! Tabular datasets of named numeric columns.

use std::collections::BTreeMap;

use lifespan_stats::data::SurvivalData;
use serde::{Deserialize, Serialize};

use crate::CrossValidationError;

/// A table of equally long, named `f64` columns.
///
/// Serialises as a JSON object mapping column names to arrays:
///
/// ```json
/// { "time": [5.0, 6.0], "event": [1.0, 0.0] }
/// ```
///
/// Boolean columns such as event indicators are stored as `0.0` / `1.0`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, Vec<f64>>", into = "BTreeMap<String, Vec<f64>>")]
pub struct Dataset {
    columns: BTreeMap<String, Vec<f64>>,
    rows: usize,
}

impl Dataset {
    /// Creates a dataset from `(name, values)` pairs.
    ///
    /// # Errors
    ///
    /// Returns [`CrossValidationError::LengthMismatch`] if the columns differ
    /// in length.
    pub fn new<I, S>(columns: I) -> Result<Self, CrossValidationError>
    where
        I: IntoIterator<Item = (S, Vec<f64>)>,
        S: Into<String>,
    {
        columns
            .into_iter()
            .map(|(name, values)| (name.into(), values))
            .collect::<BTreeMap<_, _>>()
            .try_into()
    }

    /// Adds or replaces a column.
    ///
    /// # Errors
    ///
    /// Returns [`CrossValidationError::LengthMismatch`] if the column length
    /// differs from the existing row count.
    pub fn with_column(
        mut self,
        name: impl Into<String>,
        values: Vec<f64>,
    ) -> Result<Self, CrossValidationError> {
        let name = name.into();
        if !self.columns.is_empty() && values.len() != self.rows {
            return Err(CrossValidationError::length_mismatch(format!(
                "column {name:?} has {} rows, dataset has {}",
                values.len(),
                self.rows
            )));
        }
        self.rows = values.len();
        self.columns.insert(name, values);
        Ok(self)
    }

    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// Values of the named column.
    ///
    /// # Errors
    ///
    /// Returns [`CrossValidationError::MissingColumn`] if there is no such column.
    pub fn column(&self, name: &str) -> Result<&[f64], CrossValidationError> {
        self.columns
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| CrossValidationError::MissingColumn {
                name: name.to_owned(),
            })
    }

    /// Returns the rows at `indices`, in that order.
    ///
    /// # Panics
    ///
    /// Panics if any index is out of bounds.
    #[must_use]
    pub fn subset(&self, indices: &[usize]) -> Self {
        let columns = self
            .columns
            .iter()
            .map(|(name, values)| (name.clone(), indices.iter().map(|&i| values[i]).collect()))
            .collect();
        Self {
            columns,
            rows: indices.len(),
        }
    }

    /// Interprets two columns as durations and event indicators.
    ///
    /// Any non-zero event value counts as an observed event.
    ///
    /// # Errors
    ///
    /// Returns [`CrossValidationError::MissingColumn`] for unknown columns and
    /// [`CrossValidationError::Survival`] if the durations are invalid.
    ///
    /// # Examples
    ///
    /// ```
    /// # use lifespan_validation::dataset::Dataset;
    /// let dataset = Dataset::new([("t", vec![3.0, 4.0]), ("e", vec![1.0, 0.0])]).unwrap();
    /// let data = dataset.survival_data("t", "e").unwrap();
    /// assert_eq!(data.events(), &[true, false]);
    /// assert!(dataset.survival_data("t", "missing").is_err());
    /// ```
    pub fn survival_data(
        &self,
        duration_col: &str,
        event_col: &str,
    ) -> Result<SurvivalData, CrossValidationError> {
        let durations = self.column(duration_col)?.to_vec();
        let events = self.column(event_col)?.iter().map(|&e| e != 0.0).collect();
        Ok(SurvivalData::new(durations, events)?)
    }
}

impl TryFrom<BTreeMap<String, Vec<f64>>> for Dataset {
    type Error = CrossValidationError;

    fn try_from(columns: BTreeMap<String, Vec<f64>>) -> Result<Self, Self::Error> {
        let mut lengths = columns.iter().map(|(name, values)| (name, values.len()));
        let rows = lengths.next().map_or(0, |(_, rows)| rows);
        if let Some((name, len)) = lengths.find(|(_, len)| *len != rows) {
            return Err(CrossValidationError::length_mismatch(format!(
                "column {name:?} has {len} rows, expected {rows}"
            )));
        }
        Ok(Self { columns, rows })
    }
}

impl From<Dataset> for BTreeMap<String, Vec<f64>> {
    fn from(dataset: Dataset) -> Self {
        dataset.columns
    }
}
