//! Boxplot outlier test
//!
//! A value is an outlier when it exceeds the upper Tukey fence
//! `Q3 + 1.5 * IQR` of a reference sample.

use crate::config::QuantileMethod;
use crate::error::ComputeError;
use serde::{Deserialize, Serialize};

/// Tukey fence multiplier
const FENCE_MULTIPLIER: f64 = 1.5;

/// Fraction of outlier votes needed to flag a window
const MAJORITY: f64 = 0.5;

/// Quantile `p` in [0, 1] of a non-empty ascending sample
fn quantile(sorted: &[f64], p: f64, method: QuantileMethod) -> f64 {
    let position = p * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    match method {
        QuantileMethod::Lower => sorted[lower],
        QuantileMethod::Linear => {
            let upper = (lower + 1).min(sorted.len() - 1);
            sorted[lower] + (position - lower as f64) * (sorted[upper] - sorted[lower])
        }
    }
}

/// Upper Tukey fence of a reference sample
pub fn upper_fence(sample: &[f64], method: QuantileMethod) -> Result<f64, ComputeError> {
    if sample.is_empty() {
        return Err(ComputeError::EmptyInput(
            "outlier reference sample is empty".to_string(),
        ));
    }
    let mut sorted = sample.to_vec();
    sorted.sort_by(f64::total_cmp);
    let q1 = quantile(&sorted, 0.25, method);
    let q3 = quantile(&sorted, 0.75, method);
    Ok(q3 + FENCE_MULTIPLIER * (q3 - q1))
}

/// Upper fence of `sample` and whether `value` lies strictly above it
pub fn box_outlier_significance(
    value: f64,
    sample: &[f64],
    method: QuantileMethod,
) -> Result<(f64, bool), ComputeError> {
    let fence = upper_fence(sample, method)?;
    Ok((fence, value > fence))
}

/// Aggregate outlier verdict for a window of change scores
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowSignificance {
    /// Mean of score / fence over the window; a zero fence contributes 0
    pub mean_fence_ratio: f64,
    /// At least half of the window lies above the fence
    pub significant: bool,
}

/// Judge a window of change scores against a reference sample of scores
pub fn window_change_significance(
    scores: &[f64],
    reference: &[f64],
    method: QuantileMethod,
) -> Result<WindowSignificance, ComputeError> {
    if scores.is_empty() {
        return Err(ComputeError::EmptyInput(
            "no change scores to assess".to_string(),
        ));
    }
    let fence = upper_fence(reference, method)?;

    let mut ratio_sum = 0.0;
    let mut votes = 0usize;
    for &score in scores {
        if fence != 0.0 {
            ratio_sum += score / fence;
        }
        if score > fence {
            votes += 1;
        }
    }

    let n = scores.len() as f64;
    Ok(WindowSignificance {
        mean_fence_ratio: ratio_sum / n,
        significant: votes as f64 / n >= MAJORITY,
    })
}
