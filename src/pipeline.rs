//! Pipeline orchestration
//!
//! This module provides the public API for Synheart Markers.
//! It turns a subject's day- and hour-level matrices into one marker vector
//! and a weekly change-score series.

use crate::baseline::ChangeHistory;
use crate::change::ChangeDetector;
use crate::circadian::CircadianEngine;
use crate::config::MarkerConfig;
use crate::encoder::MarkerEncoder;
use crate::error::ComputeError;
use crate::features::{
    interquartile_range, kurtosis, mean, mean_crossings, median, signal_energy, skewness,
    std_dev, zero_crossings,
};
use crate::regularity::RegularityEngine;
use crate::types::{
    AssessedChange, BehaviorMarkers, ChangeScoreRecord, DayMatrix, HourMatrix, Matrix,
    MarkerReport, RegularityVector, HOURS_PER_DAY,
};
use tracing::{debug, warn};

/// Summary statistics of every column of a matrix.
///
/// Values are grouped by statistic, each group holding one value per column:
/// mean, median, std, max, min, then zero crossings, mean crossings, IQR,
/// skewness, kurtosis and signal energy. A single-row matrix has no shape,
/// so the last six groups are zero.
pub fn extract_component_features(matrix: &Matrix) -> Result<Vec<f64>, ComputeError> {
    if matrix.rows() == 0 {
        return Err(ComputeError::EmptyInput(
            "expected at least one row of features".to_string(),
        ));
    }

    let columns: Vec<Vec<f64>> = (0..matrix.cols()).map(|c| matrix.column(c)).collect();
    let summaries: Vec<ColumnSummary> = columns.iter().map(|c| ColumnSummary::of(c)).collect();
    let mut out = Vec::with_capacity(11 * matrix.cols());

    let location: [fn(&ColumnSummary) -> f64; 5] =
        [|s| s.mean, |s| s.median, |s| s.std, |s| s.max, |s| s.min];
    for stat in location {
        out.extend(summaries.iter().map(stat));
    }

    if matrix.rows() == 1 {
        out.resize(11 * matrix.cols(), 0.0);
        return Ok(out);
    }

    let shape: [fn(&[f64], &ColumnSummary) -> f64; 6] = [
        |x, s| zero_crossings(x, s.median) as f64,
        |x, s| mean_crossings(x, s.mean) as f64,
        |x, _| interquartile_range(x),
        |x, s| skewness(x, s.mean),
        |x, s| kurtosis(x, s.mean, s.std),
        |x, _| signal_energy(x),
    ];
    for stat in shape {
        out.extend(columns.iter().zip(&summaries).map(|(x, s)| stat(x, s)));
    }
    Ok(out)
}

struct ColumnSummary {
    mean: f64,
    median: f64,
    std: f64,
    max: f64,
    min: f64,
}

impl ColumnSummary {
    fn of(x: &[f64]) -> Self {
        Self {
            mean: mean(x),
            median: median(x),
            std: std_dev(x),
            max: x.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            min: x.iter().copied().fold(f64::INFINITY, f64::min),
        }
    }
}

/// Compute the marker sections for one subject.
///
/// Pipeline stages:
/// 1. Day-level component statistics
/// 2. Hour-level component statistics
/// 3. Regularity of each continuous hour column
/// 4. Circadian strength of each continuous hour column
///
/// A single day of data has no routine to compare, so stages 3 and 4 emit
/// zeros.
pub fn behavior_markers(
    day: &DayMatrix,
    hour: &HourMatrix,
    config: &MarkerConfig,
) -> Result<BehaviorMarkers, ComputeError> {
    if hour.rows() % HOURS_PER_DAY != 0 {
        return Err(ComputeError::DimensionMismatch(format!(
            "expected hour rows to be a multiple of {}, got {}",
            HOURS_PER_DAY,
            hour.rows()
        )));
    }
    check_widths(day, hour, config);

    debug!(days = day.rows(), hours = hour.rows(), "computing component statistics");
    let day_stats = extract_component_features(day)?;
    let hour_stats = extract_component_features(hour)?;

    let continuous = &config.continuous_columns;
    let (regularity, circadian) = if day.rows() == 1 {
        (
            vec![RegularityVector::default(); continuous.len()],
            vec![0.0; continuous.len()],
        )
    } else {
        debug!(columns = ?continuous, "computing routine markers");
        (
            RegularityEngine::from_config(config).compute_columns(hour, continuous)?,
            CircadianEngine::compute_columns(hour, continuous)?,
        )
    };

    Ok(BehaviorMarkers {
        day_stats,
        hour_stats,
        regularity,
        circadian,
    })
}

/// Weekly change records for one subject with a freshly seeded detector
pub fn compute_change_scores(
    day: &DayMatrix,
    hour: &HourMatrix,
    config: &MarkerConfig,
) -> Result<Vec<ChangeScoreRecord>, ComputeError> {
    ChangeDetector::new(config.change.clone()).bcd(day, hour)
}

fn check_widths(day: &DayMatrix, hour: &HourMatrix, config: &MarkerConfig) {
    if day.cols() != config.day_feature_count() {
        warn!(
            expected = config.day_feature_count(),
            actual = day.cols(),
            "unexpected day matrix width"
        );
    }
    if hour.cols() != config.hour_feature_count() {
        warn!(
            expected = config.hour_feature_count(),
            actual = hour.cols(),
            "unexpected hour matrix width"
        );
    }
}

/// Stateful processor for incremental processing with persistent change history.
///
/// Use this when a subject is re-scored as new weeks of data arrive.
pub struct MarkerProcessor {
    config: MarkerConfig,
    detector: ChangeDetector,
    history: ChangeHistory,
    encoder: MarkerEncoder,
}

impl Default for MarkerProcessor {
    fn default() -> Self {
        Self::build(MarkerConfig::default())
    }
}

impl MarkerProcessor {
    /// Create a processor from a validated configuration
    pub fn new(config: MarkerConfig) -> Result<Self, ComputeError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: MarkerConfig) -> Self {
        Self {
            detector: ChangeDetector::new(config.change.clone()),
            history: ChangeHistory::new(config.outlier.history_window)
                .with_quantile_method(config.outlier.quantile_method),
            encoder: MarkerEncoder::new(),
            config,
        }
    }

    pub fn config(&self) -> &MarkerConfig {
        &self.config
    }

    /// Load change history from JSON
    pub fn load_history(&mut self, json: &str) -> Result<(), ComputeError> {
        self.history =
            ChangeHistory::from_json(json).map_err(|e| ComputeError::ParseError(e.to_string()))?;
        Ok(())
    }

    /// Save change history to JSON
    pub fn save_history(&self) -> Result<String, ComputeError> {
        self.history
            .to_json()
            .map_err(|e| ComputeError::EncodingError(e.to_string()))
    }

    /// Markers and weekly change assessments for one subject
    pub fn process(
        &mut self,
        subject_id: &str,
        day: &DayMatrix,
        hour: &HourMatrix,
    ) -> Result<MarkerReport, ComputeError> {
        let markers = behavior_markers(day, hour, &self.config)?;
        let records = self.detector.bcd(day, hour)?;

        // The sentinel is the only outcome below min_days; real weeks can also score 0
        let insufficient = day.rows() < self.config.change.min_days;
        let changes: Vec<AssessedChange> = if insufficient {
            records
                .into_iter()
                .map(|record| AssessedChange {
                    week: 0,
                    record,
                    fence_ratio: None,
                    is_outlier: false,
                })
                .collect()
        } else {
            // Week 0 compares the baseline with itself and never enters the history
            records
                .into_iter()
                .enumerate()
                .map(|(week, record)| {
                    if week == 0 {
                        AssessedChange {
                            week,
                            record,
                            fence_ratio: None,
                            is_outlier: false,
                        }
                    } else {
                        self.history.update_and_assess(week, record)
                    }
                })
                .collect()
        };

        self.encoder
            .encode(subject_id, &markers, &changes, insufficient)
    }

    /// Process and encode to JSON string
    pub fn process_to_json(
        &mut self,
        subject_id: &str,
        day: &DayMatrix,
        hour: &HourMatrix,
    ) -> Result<String, ComputeError> {
        let report = self.process(subject_id, day, hour)?;
        serde_json::to_string_pretty(&report).map_err(ComputeError::JsonError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChangeDetectionConfig;
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::f64::consts::PI;

    const DAYS: usize = 24;

    fn small_config() -> MarkerConfig {
        MarkerConfig {
            continuous_columns: vec![0, 1],
            change: ChangeDetectionConfig {
                permutations: 50,
                seed: Some(5),
                ..ChangeDetectionConfig::default()
            },
            ..MarkerConfig::default()
        }
    }

    fn make_day(days: usize) -> Matrix {
        let rows = (0..days)
            .map(|d| vec![d as f64, (d % 7) as f64, 1.0])
            .collect();
        Matrix::from_rows(rows).unwrap()
    }

    fn make_hour(days: usize) -> Matrix {
        let rows = (0..days * HOURS_PER_DAY)
            .map(|i| {
                let phase = 2.0 * PI * i as f64 / HOURS_PER_DAY as f64;
                vec![1.0 + phase.sin(), (i % 5) as f64 + 1.0]
            })
            .collect();
        Matrix::from_rows(rows).unwrap()
    }

    #[test]
    fn test_component_features_layout() {
        let m = Matrix::from_rows(vec![vec![1.0, 10.0], vec![3.0, 10.0], vec![2.0, 10.0]]).unwrap();
        let f = extract_component_features(&m).unwrap();
        assert_eq!(f.len(), 22);
        assert_eq!(&f[0..2], &[2.0, 10.0]); // means
        assert_eq!(&f[2..4], &[2.0, 10.0]); // medians
        assert_eq!(&f[6..8], &[3.0, 10.0]); // maxes
        assert_eq!(&f[8..10], &[1.0, 10.0]); // mins
        assert_eq!(f[19], -3.0); // constant column kurtosis
        assert_eq!(&f[20..22], &[14.0, 300.0]); // signal energy
    }

    #[test]
    fn test_component_features_single_row() {
        let m = Matrix::from_rows(vec![vec![4.0, 5.0]]).unwrap();
        let f = extract_component_features(&m).unwrap();
        assert_eq!(f.len(), 22);
        assert_eq!(&f[0..2], &[4.0, 5.0]);
        assert!(f[10..].iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_component_features_empty() {
        let m = Matrix::from_vec(0, 3, vec![]).unwrap();
        assert!(matches!(
            extract_component_features(&m),
            Err(ComputeError::EmptyInput(_))
        ));
    }

    #[test]
    fn test_behavior_markers_shape() {
        let config = small_config();
        let markers = behavior_markers(&make_day(DAYS), &make_hour(DAYS), &config).unwrap();
        assert_eq!(markers.day_stats.len(), 33);
        assert_eq!(markers.hour_stats.len(), 22);
        assert_eq!(markers.regularity.len(), 2);
        assert_eq!(markers.circadian.len(), 2);
        assert_eq!(markers.to_vec().len(), 33 + 22 + 6 + 2);
        // The sine column carries the daily cycle
        assert!(markers.circadian[0] > markers.circadian[1]);
    }

    #[test]
    fn test_behavior_markers_single_day() {
        let markers = behavior_markers(&make_day(1), &make_hour(1), &small_config()).unwrap();
        assert_eq!(markers.regularity, vec![RegularityVector::default(); 2]);
        assert_eq!(markers.circadian, vec![0.0, 0.0]);
    }

    #[test]
    fn test_behavior_markers_rejects_partial_day() {
        let hour = make_hour(2).head(30);
        let result = behavior_markers(&make_day(2), &hour, &small_config());
        assert!(matches!(result, Err(ComputeError::DimensionMismatch(_))));
    }

    #[test]
    fn test_processor_report() {
        let mut processor = MarkerProcessor::new(small_config()).unwrap();
        let report = processor
            .process("subject-1", &make_day(21), &make_hour(DAYS))
            .unwrap();

        assert_eq!(report.subject_id, "subject-1");
        assert_eq!(report.marker_count, report.markers.len());
        assert_eq!(report.change_scores.len(), 3);
        assert_eq!(report.change_scores[0].score, 0.0);
        assert_eq!(report.change_scores[0].fence_ratio, None);
        // Week 1 has no earlier comparison week to fence against
        assert_eq!(report.change_scores[1].fence_ratio, None);
        assert!(!report.change_scores[1].outlier);
        assert!(report.change_scores[2].fence_ratio.is_some());
        assert!(!report.insufficient_data);
    }

    #[test]
    fn test_stationary_subject_not_flagged() {
        for seed in 0..5u64 {
            let mut rng = StdRng::seed_from_u64(seed);
            let day_rows = (0..14)
                .map(|_| (0..3).map(|_| rng.gen_range(0.0..1.0)).collect())
                .collect();
            let hour_rows = (0..14 * HOURS_PER_DAY)
                .map(|_| (0..2).map(|_| rng.gen_range(0.0..1.0)).collect())
                .collect();
            let day = Matrix::from_rows(day_rows).unwrap();
            let hour = Matrix::from_rows(hour_rows).unwrap();

            let mut processor = MarkerProcessor::new(small_config()).unwrap();
            let report = processor.process("stationary", &day, &hour).unwrap();

            assert_eq!(report.change_scores.len(), 2);
            assert!(report.change_scores.iter().all(|c| !c.outlier));
            assert!(report.change_scores.iter().all(|c| c.fence_ratio.is_none()));
            // Only the comparison week is stored
            let history = ChangeHistory::from_json(&processor.save_history().unwrap()).unwrap();
            assert_eq!(history.len(), 1);
        }
    }

    #[test]
    fn test_processor_insufficient_days() {
        let mut processor = MarkerProcessor::new(small_config()).unwrap();
        let report = processor
            .process("subject-2", &make_day(5), &make_hour(5))
            .unwrap();
        assert!(report.insufficient_data);
        assert_eq!(report.change_scores.len(), 1);
        assert_eq!(report.change_scores[0].score, 0.0);
        assert_eq!(report.change_scores[0].significant, 0);
        // Sentinels never enter the history
        assert!(processor.save_history().unwrap().contains("\"scores\":[]"));
    }

    #[test]
    fn test_processor_history_round_trip() {
        let mut processor = MarkerProcessor::new(small_config()).unwrap();
        processor
            .process("subject-3", &make_day(14), &make_hour(14))
            .unwrap();
        let saved = processor.save_history().unwrap();

        let mut restored = MarkerProcessor::new(small_config()).unwrap();
        restored.load_history(&saved).unwrap();
        assert_eq!(restored.save_history().unwrap(), saved);
        assert!(restored.load_history("not json").is_err());
    }

    #[test]
    fn test_processor_rejects_invalid_config() {
        let mut config = small_config();
        config.change.permutations = 0;
        assert!(MarkerProcessor::new(config).is_err());
    }

    #[test]
    fn test_compute_change_scores_sentinel() {
        let records = compute_change_scores(&make_day(3), &make_hour(3), &small_config()).unwrap();
        assert_eq!(records, vec![ChangeScoreRecord::insufficient()]);
    }
}
