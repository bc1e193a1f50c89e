//! Marker engine configuration
//!
//! Column positions, taxonomy sizes and test parameters are carried in one
//! immutable value passed to each engine, so differently configured runs
//! (e.g. two activity taxonomies) can proceed side by side.

use crate::error::ComputeError;
use crate::types::DAYS_PER_WEEK;
use chrono::Weekday;
use serde::{Deserialize, Serialize};

/// Default number of permutation draws in change detection
pub const DEFAULT_PERMUTATIONS: usize = 1000;

/// Default Benjamini-Hochberg false discovery rate
pub const DEFAULT_FDR_ALPHA: f64 = 0.05;

/// Default fraction of BH-significant p-values needed to flag a week
pub const DEFAULT_SIGNIFICANCE_CUTOFF: f64 = 0.95;

/// Minimum number of day rows before change detection is attempted
pub const DEFAULT_MIN_DAYS: usize = 8;

/// Default number of prior weekly change scores kept for the outlier test
pub const DEFAULT_HISTORY_WINDOW: usize = 12;

/// How empirical p-values are laid out before scoring
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PValueMode {
    /// One p-value per (permutation, hour) pair, each scanning the full null
    /// distribution for that hour.
    #[default]
    Literal,
    /// One p-value per hour. Same mean, but BH sees m = 24 instead of
    /// permutations x 24, so significance fractions differ on finite samples.
    Compact,
}

/// Quartile estimator used by the Tukey fence
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantileMethod {
    /// Value at `floor(p * (n - 1))` of the sorted sample
    #[default]
    Lower,
    /// Linear interpolation between closest ranks (R-7)
    Linear,
}

/// Permutation change-detection parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangeDetectionConfig {
    pub permutations: usize,
    pub alpha: f64,
    pub significance_cutoff: f64,
    pub min_days: usize,
    pub pvalue_mode: PValueMode,
    /// Fixed seed for reproducible permutation draws; fresh entropy when absent
    pub seed: Option<u64>,
}

impl Default for ChangeDetectionConfig {
    fn default() -> Self {
        Self {
            permutations: DEFAULT_PERMUTATIONS,
            alpha: DEFAULT_FDR_ALPHA,
            significance_cutoff: DEFAULT_SIGNIFICANCE_CUTOFF,
            min_days: DEFAULT_MIN_DAYS,
            pvalue_mode: PValueMode::default(),
            seed: None,
        }
    }
}

/// Weekly outlier test parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlierConfig {
    pub quantile_method: QuantileMethod,
    pub history_window: usize,
}

impl Default for OutlierConfig {
    fn default() -> Self {
        Self {
            quantile_method: QuantileMethod::default(),
            history_window: DEFAULT_HISTORY_WINDOW,
        }
    }
}

/// Full engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerConfig {
    /// Hour-level columns with continuous meaning (rotation, acceleration,
    /// distance) used for regularity and circadian markers
    pub continuous_columns: Vec<usize>,
    /// Weekday of day offset 0 in the day and hour matrices
    pub first_weekday: Weekday,
    /// Number of one-class activity detectors
    pub num_activities: usize,
    /// Primary activity labels
    pub activity_list: Vec<String>,
    /// Number of location types
    pub num_locations: usize,
    pub change: ChangeDetectionConfig,
    pub outlier: OutlierConfig,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            continuous_columns: vec![0, 1, 2],
            first_weekday: Weekday::Tue,
            num_activities: 33,
            activity_list: [
                "Chores",
                "Eat",
                "Entertainment",
                "Errands",
                "Exercise",
                "Hobby",
                "Hygiene",
                "Relax",
                "School",
                "Sleep",
                "Travel",
                "Work",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            num_locations: 4,
            change: ChangeDetectionConfig::default(),
            outlier: OutlierConfig::default(),
        }
    }
}

impl MarkerConfig {
    /// Expected day-matrix width: totals (rotation, acceleration, distance,
    /// missing), per-activity time and first occurrence, per-location time
    /// and first occurrence
    pub fn day_feature_count(&self) -> usize {
        4 + 2 * self.num_activities + 2 * self.activity_list.len() + 2 * self.num_locations
    }

    /// Expected hour-matrix width: totals, per-activity time, per-location time
    pub fn hour_feature_count(&self) -> usize {
        4 + self.num_activities + self.activity_list.len() + self.num_locations
    }

    /// Check parameter ranges
    pub fn validate(&self) -> Result<(), ComputeError> {
        if self.continuous_columns.is_empty() {
            return Err(ComputeError::InvalidConfig(
                "continuous_columns must name at least one column".to_string(),
            ));
        }
        let change = &self.change;
        if change.permutations == 0 {
            return Err(ComputeError::InvalidConfig(
                "permutations must be greater than 0".to_string(),
            ));
        }
        if !(change.alpha > 0.0 && change.alpha < 1.0) {
            return Err(ComputeError::InvalidConfig(format!(
                "alpha must be in (0, 1), got {}",
                change.alpha
            )));
        }
        if !(0.0..=1.0).contains(&change.significance_cutoff) {
            return Err(ComputeError::InvalidConfig(format!(
                "significance_cutoff must be in [0, 1], got {}",
                change.significance_cutoff
            )));
        }
        if change.min_days < DAYS_PER_WEEK {
            return Err(ComputeError::InvalidConfig(format!(
                "min_days must cover at least one week, got {}",
                change.min_days
            )));
        }
        if self.outlier.history_window == 0 {
            return Err(ComputeError::InvalidConfig(
                "history_window must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Load configuration from JSON; missing fields take defaults
    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_widths() {
        let config = MarkerConfig::default();
        assert_eq!(config.day_feature_count(), 102);
        assert_eq!(config.hour_feature_count(), 53);
    }

    #[test]
    fn test_default_is_valid() {
        assert!(MarkerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let config = MarkerConfig::from_json(
            r#"{ "first_weekday": "Mon", "change": { "permutations": 200, "seed": 7 } }"#,
        )
        .unwrap();
        assert_eq!(config.first_weekday, Weekday::Mon);
        assert_eq!(config.change.permutations, 200);
        assert_eq!(config.change.seed, Some(7));
        assert_eq!(config.change.alpha, DEFAULT_FDR_ALPHA);
        assert_eq!(config.continuous_columns, vec![0, 1, 2]);
    }

    #[test]
    fn test_invalid_alpha_rejected() {
        let result = MarkerConfig::from_json(r#"{ "change": { "alpha": 1.5 } }"#);
        assert!(matches!(result, Err(ComputeError::InvalidConfig(_))));
    }

    #[test]
    fn test_min_days_floor() {
        let mut config = MarkerConfig::default();
        config.change.min_days = 6;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_round_trip() {
        let mut config = MarkerConfig::default();
        config.change.pvalue_mode = PValueMode::Compact;
        config.outlier.quantile_method = QuantileMethod::Linear;
        let loaded = MarkerConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(loaded, config);
    }
}
