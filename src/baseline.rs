//! Change-score history
//!
//! This module keeps a rolling window of prior weekly change scores per
//! subject. A new week is judged against the window with the Tukey fence,
//! which turns a raw change score into a relative one.

use crate::change::outlier::upper_fence;
use crate::config::{QuantileMethod, DEFAULT_HISTORY_WINDOW};
use crate::types::{AssessedChange, ChangeScoreRecord};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// One stored weekly score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct WeekScore {
    week: usize,
    score: f64,
}

/// Rolling store of weekly change scores, ordered by week
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeHistory {
    scores: VecDeque<WeekScore>,
    /// Maximum number of weeks retained
    window_size: usize,
    quantile_method: QuantileMethod,
}

impl Default for ChangeHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_WINDOW)
    }
}

impl ChangeHistory {
    /// Create an empty history retaining at most `window_size` weeks
    pub fn new(window_size: usize) -> Self {
        Self {
            scores: VecDeque::with_capacity(window_size),
            window_size,
            quantile_method: QuantileMethod::default(),
        }
    }

    pub fn with_quantile_method(mut self, method: QuantileMethod) -> Self {
        self.quantile_method = method;
        self
    }

    /// Judge a week against the stored weeks that precede it, then store it.
    ///
    /// Storing a week that is already present replaces its score, so scoring
    /// the same weeks again gives the same assessment. Insufficient-data
    /// sentinels should not be passed here.
    pub fn update_and_assess(&mut self, week: usize, record: ChangeScoreRecord) -> AssessedChange {
        let prior: Vec<f64> = self
            .scores
            .iter()
            .filter(|s| s.week < week)
            .map(|s| s.score)
            .collect();

        // Assess against the history as it stood before this week
        let (fence_ratio, is_outlier) = match upper_fence(&prior, self.quantile_method) {
            Ok(fence) => {
                let ratio = if fence == 0.0 { 0.0 } else { record.score / fence };
                (Some(ratio), record.score > fence)
            }
            Err(_) => (None, false),
        };

        let position = self.scores.partition_point(|s| s.week < week);
        if self.scores.get(position).is_some_and(|s| s.week == week) {
            self.scores[position].score = record.score;
        } else {
            self.scores.insert(
                position,
                WeekScore {
                    week,
                    score: record.score,
                },
            );
        }
        while self.scores.len() > self.window_size {
            self.scores.pop_front();
        }

        AssessedChange {
            week,
            record,
            fence_ratio,
            is_outlier,
        }
    }

    /// Stored scores, oldest week first
    pub fn scores(&self) -> Vec<f64> {
        self.scores.iter().map(|s| s.score).collect()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn clear(&mut self) {
        self.scores.clear();
    }

    /// Load history from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize history to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(score: f64) -> ChangeScoreRecord {
        ChangeScoreRecord::new(score, false)
    }

    #[test]
    fn test_first_week_unassessed() {
        let mut history = ChangeHistory::default();
        let assessed = history.update_and_assess(0, record(0.0));
        assert_eq!(assessed.fence_ratio, None);
        assert!(!assessed.is_outlier);
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_outlier_against_prior_weeks() {
        let mut history = ChangeHistory::default();
        for (week, score) in [1.0, 2.0, 3.0, 4.0, 5.0, 6.0].iter().enumerate() {
            history.update_and_assess(week, record(*score));
        }
        // Prior scores 1..6: Q1 = 2, Q3 = 4 (lower quartiles), fence = 7
        let assessed = history.update_and_assess(6, record(100.0));
        assert!(assessed.is_outlier);
        assert!((assessed.fence_ratio.unwrap() - 100.0 / 7.0).abs() < 1e-12);
    }

    #[test]
    fn test_window_rolling() {
        let mut history = ChangeHistory::new(3);
        for week in 0..5 {
            history.update_and_assess(week, record(week as f64));
        }
        assert_eq!(history.scores(), vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_rescoring_replaces_week() {
        let mut history = ChangeHistory::default();
        history.update_and_assess(0, record(0.0));
        let first = history.update_and_assess(1, record(0.4));
        let again = history.update_and_assess(1, record(0.4));
        assert_eq!(first, again);
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_zero_fence_ratio() {
        let mut history = ChangeHistory::default();
        history.update_and_assess(0, record(0.0));
        let assessed = history.update_and_assess(1, record(0.3));
        assert_eq!(assessed.fence_ratio, Some(0.0));
        assert!(assessed.is_outlier);
    }

    #[test]
    fn test_serialization() {
        let mut history = ChangeHistory::new(5).with_quantile_method(QuantileMethod::Linear);
        history.update_and_assess(0, record(0.0));
        history.update_and_assess(1, record(0.6));

        let json = history.to_json().unwrap();
        let loaded = ChangeHistory::from_json(&json).unwrap();
        assert_eq!(loaded.scores(), history.scores());
        assert_eq!(loaded.quantile_method, QuantileMethod::Linear);
    }

    #[test]
    fn test_clear() {
        let mut history = ChangeHistory::default();
        history.update_and_assess(0, record(0.2));
        history.clear();
        assert!(history.is_empty());
    }
}
