//! Circadian rhythm strength
//!
//! The normalized spectral magnitude of an hourly series at the bin just past
//! the first 23 non-DC frequencies. With whole days of hourly samples this
//! bin tracks the 24-hour cycle when the series spans 24 days.

use crate::error::ComputeError;
use crate::features::spectrum;
use crate::regularity::check_column;
use crate::types::HourMatrix;

/// Position of the circadian bin once the DC component is dropped
pub const CIRCADIAN_BIN: usize = 23;

/// Circadian engine over hourly series
pub struct CircadianEngine;

impl CircadianEngine {
    /// Circadian strength of one hourly series.
    ///
    /// Magnitudes of the DFT without the DC term are normalized to sum 1
    /// (left as-is when they sum to 0) and read at [`CIRCADIAN_BIN`].
    pub fn strength(hourly: &[f64]) -> Result<f64, ComputeError> {
        if hourly.len() <= CIRCADIAN_BIN + 1 {
            return Err(ComputeError::InsufficientSamples(format!(
                "expected more than {} hourly samples for the circadian bin, got {}",
                CIRCADIAN_BIN + 1,
                hourly.len()
            )));
        }

        let magnitudes: Vec<f64> = spectrum(hourly).iter().skip(1).map(|c| c.norm()).collect();
        let total: f64 = magnitudes.iter().sum();
        let value = magnitudes[CIRCADIAN_BIN];
        Ok(if total != 0.0 { value / total } else { value })
    }

    /// Circadian strength for the given columns of an hour matrix
    pub fn compute_columns(hour: &HourMatrix, columns: &[usize]) -> Result<Vec<f64>, ComputeError> {
        columns
            .iter()
            .map(|&col| {
                check_column(hour, col)?;
                Self::strength(&hour.column(col))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Matrix, HOURS_PER_DAY};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::f64::consts::PI;

    const DAYS: usize = 24;

    fn daily_sine() -> Vec<f64> {
        (0..DAYS * HOURS_PER_DAY)
            .map(|i| (2.0 * PI * i as f64 / HOURS_PER_DAY as f64).sin())
            .collect()
    }

    #[test]
    fn test_sine_concentrates_in_circadian_bin() {
        // Energy splits between the bin and its mirror image
        let strength = CircadianEngine::strength(&daily_sine()).unwrap();
        assert!((strength - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_sine_beats_noise() {
        let mut rng = StdRng::seed_from_u64(42);
        let noise: Vec<f64> = (0..DAYS * HOURS_PER_DAY)
            .map(|_| rng.gen_range(-1.0..1.0))
            .collect();

        let sine = CircadianEngine::strength(&daily_sine()).unwrap();
        let noisy = CircadianEngine::strength(&noise).unwrap();
        assert!(sine > 10.0 * noisy);
    }

    #[test]
    fn test_silent_series_is_zero() {
        assert_eq!(CircadianEngine::strength(&[0.0; 48]).unwrap(), 0.0);
    }

    #[test]
    fn test_short_series_rejected() {
        let result = CircadianEngine::strength(&[1.0; 24]);
        assert!(matches!(result, Err(ComputeError::InsufficientSamples(_))));
    }

    #[test]
    fn test_compute_columns() {
        let rows: Vec<Vec<f64>> = daily_sine().iter().map(|&v| vec![v, 0.0]).collect();
        let hour = Matrix::from_rows(rows).unwrap();
        let out = CircadianEngine::compute_columns(&hour, &[0, 1]).unwrap();
        assert!((out[0] - 0.5).abs() < 1e-6);
        assert_eq!(out[1], 0.0);
    }
}
