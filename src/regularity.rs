//! Routine regularity
//!
//! Measures how self-similar a daily routine is. An hourly feature is
//! rescaled to [-0.5, 0.5], split into days, and compared at three
//! granularities:
//! - Within week: pairs of weekday profiles
//! - Within weekdays: pairs of Monday-Friday profiles
//! - Between weeks: the same weekday across distinct weeks
//!
//! Every comparison uses the regularity index `sum(x_i * y_i) / 24`.

use crate::config::MarkerConfig;
use crate::error::ComputeError;
use crate::normalizer::Normalizer;
use crate::types::{HourMatrix, RegularityVector, DAYS_PER_WEEK, HOURS_PER_DAY};
use chrono::Weekday;

/// Number of working days, Monday through Friday
const WORKDAYS: usize = 5;

/// Regularity index between two aligned day profiles
pub fn regularity_index(x: &[f64], y: &[f64]) -> f64 {
    x.iter().zip(y).map(|(a, b)| a * b).sum::<f64>() / HOURS_PER_DAY as f64
}

/// Regularity engine bound to a weekday reference
#[derive(Debug, Clone, Copy)]
pub struct RegularityEngine {
    first_weekday: Weekday,
}

impl Default for RegularityEngine {
    fn default() -> Self {
        Self::new(MarkerConfig::default().first_weekday)
    }
}

impl RegularityEngine {
    /// Create an engine whose day offset 0 falls on `first_weekday`
    pub fn new(first_weekday: Weekday) -> Self {
        Self { first_weekday }
    }

    pub fn from_config(config: &MarkerConfig) -> Self {
        Self::new(config.first_weekday)
    }

    /// Weekday of a day offset, counted from Monday = 0
    pub fn weekday_index(&self, day_offset: usize) -> usize {
        (self.first_weekday.num_days_from_monday() as usize + day_offset) % DAYS_PER_WEEK
    }

    /// Regularity vector of one hourly series.
    ///
    /// The series length must be a multiple of 24. An empty series yields
    /// all zeros.
    pub fn compute(&self, hourly: &[f64]) -> Result<RegularityVector, ComputeError> {
        if hourly.len() % HOURS_PER_DAY != 0 {
            return Err(ComputeError::DimensionMismatch(format!(
                "expected hourly length to be a multiple of {}, got {}",
                HOURS_PER_DAY,
                hourly.len()
            )));
        }
        if hourly.is_empty() {
            return Ok(RegularityVector::default());
        }

        let normalized = Normalizer::center_unit_range(hourly);
        let days: Vec<&[f64]> = normalized.chunks(HOURS_PER_DAY).collect();
        let profiles = self.weekday_profiles(&days);

        Ok(RegularityVector {
            within_week: mean_pairwise(&profiles),
            within_weekdays: mean_pairwise(&profiles[..WORKDAYS]),
            between_weeks: between_weeks(&days),
        })
    }

    /// Regularity vectors for the given columns of an hour matrix
    pub fn compute_columns(
        &self,
        hour: &HourMatrix,
        columns: &[usize],
    ) -> Result<Vec<RegularityVector>, ComputeError> {
        columns
            .iter()
            .map(|&col| {
                check_column(hour, col)?;
                self.compute(&hour.column(col))
            })
            .collect()
    }

    /// Mean day profile per weekday, indexed Monday = 0. Weekdays with no
    /// days keep an all-zero profile.
    fn weekday_profiles(&self, days: &[&[f64]]) -> Vec<Vec<f64>> {
        let mut sums = vec![vec![0.0; HOURS_PER_DAY]; DAYS_PER_WEEK];
        let mut counts = [0usize; DAYS_PER_WEEK];

        for (offset, day) in days.iter().enumerate() {
            let weekday = self.weekday_index(offset);
            for (acc, v) in sums[weekday].iter_mut().zip(day.iter()) {
                *acc += v;
            }
            counts[weekday] += 1;
        }

        for (profile, &count) in sums.iter_mut().zip(counts.iter()) {
            if count > 0 {
                profile.iter_mut().for_each(|v| *v /= count as f64);
            }
        }
        sums
    }
}

/// Mean regularity over all ordered pairs of distinct profiles
fn mean_pairwise(profiles: &[Vec<f64>]) -> f64 {
    let mut total = 0.0;
    let mut pairs = 0usize;
    for (i, a) in profiles.iter().enumerate() {
        for (j, b) in profiles.iter().enumerate() {
            if i != j {
                total += regularity_index(a, b);
                pairs += 1;
            }
        }
    }
    if pairs == 0 {
        0.0
    } else {
        total / pairs as f64
    }
}

/// Mean regularity of each weekday position against itself in every other
/// complete week. Trailing partial weeks are ignored.
fn between_weeks(days: &[&[f64]]) -> f64 {
    let weeks = days.len() / DAYS_PER_WEEK;
    if weeks < 2 {
        return 0.0;
    }

    let mut total = 0.0;
    let mut pairs = 0usize;
    for position in 0..DAYS_PER_WEEK {
        for a in 0..weeks {
            for b in 0..weeks {
                if a == b {
                    continue;
                }
                total += regularity_index(
                    days[a * DAYS_PER_WEEK + position],
                    days[b * DAYS_PER_WEEK + position],
                );
                pairs += 1;
            }
        }
    }
    total / pairs as f64
}

pub(crate) fn check_column(matrix: &HourMatrix, col: usize) -> Result<(), ComputeError> {
    if col >= matrix.cols() {
        return Err(ComputeError::DimensionMismatch(format!(
            "column {} out of range for matrix with {} columns",
            col,
            matrix.cols()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Matrix;
    use pretty_assertions::assert_eq;

    fn repeating_days(days: usize) -> Vec<f64> {
        (0..days * HOURS_PER_DAY)
            .map(|i| (i % HOURS_PER_DAY) as f64)
            .collect()
    }

    #[test]
    fn test_regularity_index_extremes() {
        assert_eq!(regularity_index(&[1.0; 24], &[1.0; 24]), 1.0);
        assert_eq!(regularity_index(&[0.0; 24], &[0.0; 24]), 0.0);
    }

    #[test]
    fn test_weekday_index() {
        let engine = RegularityEngine::new(Weekday::Tue);
        assert_eq!(engine.weekday_index(0), 1);
        assert_eq!(engine.weekday_index(6), 0);
        assert_eq!(engine.weekday_index(7), 1);
    }

    #[test]
    fn test_identical_days_agree_at_every_granularity() {
        let engine = RegularityEngine::default();
        let ri = engine.compute(&repeating_days(14)).unwrap();

        let profile: Vec<f64> = (0..HOURS_PER_DAY).map(|h| h as f64 / 23.0 - 0.5).collect();
        let expected = regularity_index(&profile, &profile);

        assert!((ri.within_week - expected).abs() < 1e-12);
        assert!((ri.within_weekdays - expected).abs() < 1e-12);
        assert!((ri.between_weeks - expected).abs() < 1e-12);
    }

    #[test]
    fn test_single_week_has_no_between_weeks() {
        let ri = RegularityEngine::default()
            .compute(&repeating_days(7))
            .unwrap();
        assert_eq!(ri.between_weeks, 0.0);
        assert!(ri.within_week > 0.0);
    }

    #[test]
    fn test_constant_series() {
        // Constant input maps to -0.5 everywhere: 24 * 0.25 / 24
        let ri = RegularityEngine::default()
            .compute(&[3.0; 14 * HOURS_PER_DAY])
            .unwrap();
        assert!((ri.within_week - 0.25).abs() < 1e-12);
        assert!((ri.between_weeks - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_missing_weekdays_lower_within_week() {
        // Three days fill three profiles; the four empty ones contribute 0
        let ri = RegularityEngine::default()
            .compute(&repeating_days(3))
            .unwrap();
        let full = RegularityEngine::default()
            .compute(&repeating_days(7))
            .unwrap();
        // 6 of 42 ordered pairs are populated
        assert!((ri.within_week - full.within_week * 6.0 / 42.0).abs() < 1e-12);
    }

    #[test]
    fn test_weekday_reference_shifts_workdays() {
        // Day offset 0 differs from the other six days
        let mut hourly = repeating_days(7);
        for v in hourly.iter_mut().take(HOURS_PER_DAY) {
            *v = 23.0 - *v;
        }
        // Offset 0 on Saturday keeps the odd day out of Monday-Friday
        let weekend = RegularityEngine::new(Weekday::Sat).compute(&hourly).unwrap();
        let workday = RegularityEngine::new(Weekday::Mon).compute(&hourly).unwrap();
        assert!(weekend.within_weekdays > workday.within_weekdays);
        assert!((weekend.within_week - workday.within_week).abs() < 1e-12);
    }

    #[test]
    fn test_ragged_length_rejected() {
        let result = RegularityEngine::default().compute(&[1.0; 50]);
        assert!(matches!(result, Err(ComputeError::DimensionMismatch(_))));
    }

    #[test]
    fn test_empty_series() {
        let ri = RegularityEngine::default().compute(&[]).unwrap();
        assert_eq!(ri, RegularityVector::default());
    }

    #[test]
    fn test_compute_columns() {
        let rows: Vec<Vec<f64>> = repeating_days(14).iter().map(|&v| vec![v, 1.0]).collect();
        let hour = Matrix::from_rows(rows).unwrap();
        let engine = RegularityEngine::default();

        let out = engine.compute_columns(&hour, &[0, 1]).unwrap();
        assert_eq!(out.len(), 2);
        assert!(engine.compute_columns(&hour, &[2]).is_err());
    }
}
