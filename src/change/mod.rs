//! Behavioral change detection
//!
//! Compares the first complete week of hourly behavior (the baseline) against
//! every complete week, baseline included, with a day-permutation test:
//!
//! 1. Each week collapses to a 24 x F profile by summing its seven days.
//! 2. Per hour, the observed distance is the symmetric divergence between the
//!    baseline and candidate profiles, summed over features.
//! 3. The fourteen pooled days are shuffled and split 7/7 many times to build
//!    a null distribution of the same per-hour distance.
//! 4. Empirical p-values give the change score `1 - |mean(p)|`.
//! 5. A Benjamini-Hochberg pass decides significance.

pub mod outlier;
pub mod random;

pub use outlier::{
    box_outlier_significance, upper_fence, window_change_significance, WindowSignificance,
};
pub use random::{counter_rng_seed, PermutationSource, SeededPermutations};

use crate::config::{ChangeDetectionConfig, PValueMode};
use crate::error::ComputeError;
use crate::normalizer::Normalizer;
use crate::types::{ChangeScoreRecord, DayMatrix, HourMatrix, DAYS_PER_WEEK, HOURS_PER_DAY};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::{debug, warn};

/// Per-hour distances for one comparison
type HourlyDistance = [f64; HOURS_PER_DAY];

/// Scalar symmetric Kullback-Leibler term.
///
/// Zero unless both values are nonzero. Pairs of opposite sign have no
/// defined logarithm and also contribute zero.
pub fn divergence(p: f64, q: f64) -> f64 {
    if p == 0.0 || q == 0.0 {
        return 0.0;
    }
    let ratio = p / q;
    if ratio <= 0.0 {
        return 0.0;
    }
    (p - q) * ratio.ln() / 2.0
}

/// Symmetric divergence between two feature vectors, summed term by term
pub fn symmetric_kl(p: &[f64], q: &[f64]) -> f64 {
    p.iter().zip(q).map(|(&a, &b)| divergence(a, b)).sum()
}

/// Fraction of p-values passing their Benjamini-Hochberg rank threshold.
///
/// After sorting ascending, the value at rank `i` (1-based) counts when
/// `p_(i) <= i * alpha / m`. Each rank is judged on its own. The count is
/// divided by `m` and capped at 1.
pub fn benjamini_hochberg_fraction(p_values: &[f64], alpha: f64) -> f64 {
    if p_values.is_empty() {
        return 0.0;
    }
    let mut sorted = p_values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let m = sorted.len() as f64;
    let passing = sorted
        .iter()
        .enumerate()
        .filter(|&(i, &p)| p <= (i + 1) as f64 * alpha / m)
        .count();
    (passing as f64 / m).min(1.0)
}

/// Fraction of a null sample at or above the observed distance
pub fn empirical_p_value(null: &[f64], observed: f64) -> f64 {
    if null.is_empty() {
        return 0.0;
    }
    let greater = null.iter().filter(|&&d| d >= observed).count();
    greater as f64 / null.len() as f64
}

/// Day-permutation change detector
pub struct ChangeDetector<S = SeededPermutations> {
    config: ChangeDetectionConfig,
    source: S,
}

impl ChangeDetector<SeededPermutations> {
    /// Detector drawing from the configured seed, or fresh entropy without one
    pub fn new(config: ChangeDetectionConfig) -> Self {
        let source = match config.seed {
            Some(seed) => SeededPermutations::new(seed),
            None => SeededPermutations::from_entropy(),
        };
        Self { config, source }
    }
}

impl<S: PermutationSource> ChangeDetector<S> {
    /// Detector drawing permutations from `source`
    pub fn with_source(config: ChangeDetectionConfig, source: S) -> Self {
        Self { config, source }
    }

    pub fn config(&self) -> &ChangeDetectionConfig {
        &self.config
    }

    /// Weekly change records for a subject.
    ///
    /// Returns the single insufficient-data record when there are fewer than
    /// `min_days` day rows. Hour rows must come in whole days and cover every
    /// complete week of day rows.
    pub fn bcd(
        &self,
        day: &DayMatrix,
        hour: &HourMatrix,
    ) -> Result<Vec<ChangeScoreRecord>, ComputeError> {
        if hour.rows() % HOURS_PER_DAY != 0 {
            return Err(ComputeError::DimensionMismatch(format!(
                "expected hour rows to be a multiple of {}, got {}",
                HOURS_PER_DAY,
                hour.rows()
            )));
        }
        if day.rows() < self.config.min_days {
            warn!(
                days = day.rows(),
                min_days = self.config.min_days,
                "too few days for change detection"
            );
            return Ok(vec![ChangeScoreRecord::insufficient()]);
        }
        self.check_trend(day, hour)
    }

    /// Compare the baseline week against every complete week of day data
    pub fn check_trend(
        &self,
        day: &DayMatrix,
        hour: &HourMatrix,
    ) -> Result<Vec<ChangeScoreRecord>, ComputeError> {
        let weeks = day.rows() / DAYS_PER_WEEK;
        let hour_days = hour.rows() / HOURS_PER_DAY;
        if hour.cols() == 0 {
            return Err(ComputeError::EmptyInput(
                "hour matrix has no feature columns".to_string(),
            ));
        }
        if weeks == 0 {
            return Err(ComputeError::InsufficientSamples(format!(
                "expected at least {} day rows, got {}",
                DAYS_PER_WEEK,
                day.rows()
            )));
        }
        if hour_days < weeks * DAYS_PER_WEEK {
            return Err(ComputeError::DimensionMismatch(format!(
                "expected at least {} days of hour rows for {} weeks, got {}",
                weeks * DAYS_PER_WEEK,
                weeks,
                hour_days
            )));
        }
        if day.rows() % DAYS_PER_WEEK != 0 {
            warn!(
                dropped_days = day.rows() % DAYS_PER_WEEK,
                "trailing partial week ignored"
            );
        }

        let hour = Normalizer::unit_range_columns(hour);
        let features = hour.cols();
        let week_rows = DAYS_PER_WEEK * HOURS_PER_DAY;
        let baseline = hour.row_block(0, week_rows);

        (0..weeks)
            .map(|week| {
                let candidate = hour.row_block(week * week_rows, (week + 1) * week_rows);
                let record = self.permutation_change(baseline, candidate, features)?;
                debug!(week, score = record.score, significant = record.significant, "week scored");
                Ok(record)
            })
            .collect()
    }

    /// Permutation test between two weeks of hourly data.
    ///
    /// Each week is a flat row-major block of 7 * 24 rows with `features`
    /// columns. Any other length is a `DimensionMismatch`.
    pub fn permutation_change(
        &self,
        baseline: &[f64],
        candidate: &[f64],
        features: usize,
    ) -> Result<ChangeScoreRecord, ComputeError> {
        if features == 0 {
            return Err(ComputeError::DimensionMismatch(
                "expected at least one hour feature".to_string(),
            ));
        }
        let day_len = HOURS_PER_DAY * features;
        let week_len = DAYS_PER_WEEK * day_len;
        if baseline.len() != week_len || candidate.len() != week_len {
            return Err(ComputeError::DimensionMismatch(format!(
                "expected two weeks of {} values ({} features), got {} and {}",
                week_len,
                features,
                baseline.len(),
                candidate.len()
            )));
        }

        let pool: Vec<&[f64]> = baseline
            .chunks(day_len)
            .chain(candidate.chunks(day_len))
            .take(2 * DAYS_PER_WEEK)
            .collect();

        let observed = hourly_distance(
            &collapse(&pool[..DAYS_PER_WEEK], features),
            &collapse(&pool[DAYS_PER_WEEK..], features),
            features,
        );
        debug!(permutations = self.config.permutations, "building null distribution");

        let null = self.null_distribution(&pool, features);
        let p_values = self.p_values(&null, &observed);

        let mean = p_values.iter().sum::<f64>() / p_values.len() as f64;
        let score = 1.0 - mean.abs();
        let fraction = benjamini_hochberg_fraction(&p_values, self.config.alpha);
        debug!(score, fraction, "permutation test decided");

        Ok(ChangeScoreRecord::new(
            score,
            fraction >= self.config.significance_cutoff,
        ))
    }

    /// Per-hour distances for every permutation draw
    fn null_distribution(&self, pool: &[&[f64]], features: usize) -> Vec<HourlyDistance> {
        let draw = |i: usize| {
            let order = self.source.permutation(i, pool.len());
            let (first, second) = order.split_at(DAYS_PER_WEEK);
            let first: Vec<&[f64]> = first.iter().map(|&d| pool[d]).collect();
            let second: Vec<&[f64]> = second.iter().map(|&d| pool[d]).collect();
            hourly_distance(
                &collapse(&first, features),
                &collapse(&second, features),
                features,
            )
        };

        #[cfg(feature = "parallel")]
        let null: Vec<HourlyDistance> = (0..self.config.permutations).into_par_iter().map(draw).collect();
        #[cfg(not(feature = "parallel"))]
        let null: Vec<HourlyDistance> = (0..self.config.permutations).map(draw).collect();

        null
    }

    /// Empirical p-values in the configured layout
    fn p_values(&self, null: &[HourlyDistance], observed: &HourlyDistance) -> Vec<f64> {
        let by_hour: Vec<Vec<f64>> = (0..HOURS_PER_DAY)
            .map(|h| null.iter().map(|d| d[h]).collect())
            .collect();
        let scan = |h: usize| empirical_p_value(&by_hour[h], observed[h]);

        match self.config.pvalue_mode {
            PValueMode::Compact => (0..HOURS_PER_DAY).map(scan).collect(),
            PValueMode::Literal => {
                let row = |_: usize| -> HourlyDistance { std::array::from_fn(scan) };

                #[cfg(feature = "parallel")]
                let rows: Vec<HourlyDistance> = (0..null.len()).into_par_iter().map(row).collect();
                #[cfg(not(feature = "parallel"))]
                let rows: Vec<HourlyDistance> = (0..null.len()).map(row).collect();

                rows.into_iter().flatten().collect()
            }
        }
    }
}

/// Sum days into one 24 x F profile
fn collapse(days: &[&[f64]], features: usize) -> Vec<f64> {
    let mut profile = vec![0.0; HOURS_PER_DAY * features];
    for day in days {
        for (acc, v) in profile.iter_mut().zip(day.iter()) {
            *acc += v;
        }
    }
    profile
}

fn hourly_distance(p: &[f64], q: &[f64], features: usize) -> HourlyDistance {
    std::array::from_fn(|h| {
        let span = h * features..(h + 1) * features;
        symmetric_kl(&p[span.clone()], &q[span])
    })
}
