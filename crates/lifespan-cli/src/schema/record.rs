use std::collections::BTreeSet;

use anyhow::Context as _;
use lifespan_stats::data::SurvivalData;
use serde::{Deserialize, Serialize};

/// One subject of a records file.
///
/// ```json
/// { "duration": 5.0, "event": true, "entry": 1.0, "group": "treatment" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectRecord {
    /// Time from origin to event or censoring
    pub duration: f64,
    /// Whether the event was observed at `duration`
    pub event: bool,
    /// Left-truncation entry time (0 when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<f64>,
    /// Comparison group label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

/// Converts records into a validated observation batch.
///
/// Entry times are only attached when at least one record carries one.
pub fn to_survival_data(records: &[SubjectRecord]) -> anyhow::Result<SurvivalData> {
    let durations = records.iter().map(|r| r.duration).collect();
    let events = records.iter().map(|r| r.event).collect();
    let data = SurvivalData::new(durations, events).context("Invalid survival records")?;
    if records.iter().all(|r| r.entry.is_none()) {
        return Ok(data);
    }
    let entries = records.iter().map(|r| r.entry.unwrap_or(0.0)).collect();
    data.with_entries(entries).context("Invalid entry times")
}

/// Group label of every record.
pub fn group_labels(records: &[SubjectRecord]) -> anyhow::Result<Vec<String>> {
    records
        .iter()
        .enumerate()
        .map(|(i, r)| {
            r.group
                .clone()
                .with_context(|| format!("Record {i} has no \"group\" field"))
        })
        .collect()
}

/// Number of distinct group labels, for progress messages.
pub fn count_groups(labels: &[String]) -> usize {
    labels.iter().collect::<BTreeSet<_>>().len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(duration: f64, event: bool) -> SubjectRecord {
        SubjectRecord {
            duration,
            event,
            entry: None,
            group: None,
        }
    }

    #[test]
    fn test_optional_fields_default_to_none() {
        let parsed: Vec<SubjectRecord> =
            serde_json::from_str(r#"[{"duration": 3.0, "event": false}]"#).unwrap();
        assert_eq!(parsed, [record(3.0, false)]);
        assert_eq!(
            serde_json::to_string(&parsed[0]).unwrap(),
            r#"{"duration":3.0,"event":false}"#
        );
    }

    #[test]
    fn test_entries_are_attached_when_present() {
        let mut records = vec![record(3.0, true), record(4.0, false)];
        assert!(to_survival_data(&records).unwrap().entries().is_none());

        records[1].entry = Some(2.0);
        let data = to_survival_data(&records).unwrap();
        assert_eq!(data.entries(), Some(&[0.0, 2.0][..]));

        records[1].entry = Some(5.0);
        assert!(to_survival_data(&records).is_err());
    }

    #[test]
    fn test_group_labels_are_required() {
        let mut records = vec![record(1.0, true), record(2.0, true)];
        records[0].group = Some("a".to_owned());
        let err = group_labels(&records).unwrap_err();
        assert_eq!(err.to_string(), "Record 1 has no \"group\" field");

        records[1].group = Some("a".to_owned());
        let labels = group_labels(&records).unwrap();
        assert_eq!(count_groups(&labels), 1);
    }
}
