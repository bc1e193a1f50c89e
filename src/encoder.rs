//! Report encoding
//!
//! This module encodes a subject's markers and weekly change assessments into
//! a JSON report. Only the numeric vectors are carried, with producer
//! metadata identifying the run.

use crate::error::ComputeError;
use crate::types::{AssessedChange, BehaviorMarkers, MarkerProducer, MarkerReport, WeeklyChange};
use crate::{MARKERS_VERSION, PRODUCER_NAME};
use chrono::Utc;
use uuid::Uuid;

/// Current report schema version
pub const REPORT_SCHEMA_VERSION: &str = "1.0.0";

/// Encoder for marker reports
pub struct MarkerEncoder {
    instance_id: String,
}

impl Default for MarkerEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkerEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Build a report for one subject.
    ///
    /// `insufficient_data` marks a change series that is only the
    /// insufficient-data sentinel.
    pub fn encode(
        &self,
        subject_id: &str,
        markers: &BehaviorMarkers,
        changes: &[AssessedChange],
        insufficient_data: bool,
    ) -> Result<MarkerReport, ComputeError> {
        let values = markers.to_vec();
        if let Some(pos) = values.iter().position(|v| !v.is_finite()) {
            return Err(ComputeError::EncodingError(format!(
                "marker {pos} is not finite"
            )));
        }

        let change_scores = changes
            .iter()
            .map(|c| WeeklyChange {
                week: c.week,
                score: c.record.score,
                significant: c.record.flag(),
                fence_ratio: c.fence_ratio,
                outlier: c.is_outlier,
            })
            .collect();

        Ok(MarkerReport {
            schema_version: REPORT_SCHEMA_VERSION.to_string(),
            producer: MarkerProducer {
                name: PRODUCER_NAME.to_string(),
                version: MARKERS_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            subject_id: subject_id.to_string(),
            computed_at_utc: Utc::now().to_rfc3339(),
            marker_count: values.len(),
            markers: values,
            change_scores,
            insufficient_data,
        })
    }

    /// Encode to JSON string
    pub fn encode_to_json(
        &self,
        subject_id: &str,
        markers: &BehaviorMarkers,
        changes: &[AssessedChange],
        insufficient_data: bool,
    ) -> Result<String, ComputeError> {
        let report = self.encode(subject_id, markers, changes, insufficient_data)?;
        serde_json::to_string_pretty(&report).map_err(ComputeError::JsonError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChangeScoreRecord, RegularityVector};
    use pretty_assertions::assert_eq;

    fn make_markers() -> BehaviorMarkers {
        BehaviorMarkers {
            day_stats: vec![1.0, 2.0],
            hour_stats: vec![3.0],
            regularity: vec![RegularityVector {
                within_week: 0.1,
                within_weekdays: 0.2,
                between_weeks: 0.3,
            }],
            circadian: vec![0.4],
        }
    }

    fn make_changes() -> Vec<AssessedChange> {
        vec![
            AssessedChange {
                week: 0,
                record: ChangeScoreRecord::new(0.0, false),
                fence_ratio: None,
                is_outlier: false,
            },
            AssessedChange {
                week: 1,
                record: ChangeScoreRecord::new(0.8, true),
                fence_ratio: Some(0.0),
                is_outlier: true,
            },
        ]
    }

    #[test]
    fn test_encode_report() {
        let encoder = MarkerEncoder::with_instance_id("test-instance".to_string());
        let report = encoder
            .encode("subject-7", &make_markers(), &make_changes(), false)
            .unwrap();

        assert_eq!(report.schema_version, REPORT_SCHEMA_VERSION);
        assert_eq!(report.producer.name, PRODUCER_NAME);
        assert_eq!(report.producer.instance_id, "test-instance");
        assert_eq!(report.subject_id, "subject-7");
        assert_eq!(report.marker_count, 7);
        assert_eq!(report.markers, vec![1.0, 2.0, 3.0, 0.1, 0.2, 0.3, 0.4]);
        assert_eq!(report.change_scores.len(), 2);
        assert_eq!(report.change_scores[1].significant, 1);
        assert!(report.change_scores[1].outlier);
        assert!(!report.insufficient_data);
    }

    #[test]
    fn test_encode_to_json() {
        let encoder = MarkerEncoder::new();
        let json = encoder
            .encode_to_json("subject-7", &make_markers(), &make_changes(), false)
            .unwrap();

        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["schema_version"], REPORT_SCHEMA_VERSION);
        assert_eq!(parsed["marker_count"], 7);
        assert_eq!(parsed["change_scores"][0]["fence_ratio"], serde_json::Value::Null);
        assert!(parsed["computed_at_utc"].is_string());
    }

    #[test]
    fn test_non_finite_marker_rejected() {
        let mut markers = make_markers();
        markers.circadian[0] = f64::NAN;
        let result = MarkerEncoder::new().encode("s", &markers, &[], false);
        assert!(matches!(result, Err(ComputeError::EncodingError(_))));
    }
}
