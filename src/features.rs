//! Statistical feature derivation
//!
//! Pure functions describing a single time series (or a small bundle of
//! synchronized series):
//! - Location and dispersion (mean, median, variance, IQR, absolute deviations)
//! - Shape (central moments, skewness, kurtosis, autocorrelation)
//! - Crossings of the median and mean
//! - Energy and spectral descriptors
//! - Motion descriptors from location traces (heading changes, stops, trajectory)
//!
//! Every division by a quantity that can be zero has a fixed fallback value.
//! These fallbacks are part of the output contract.

use rustfft::{num_complex::Complex, FftPlanner};
use serde::{Deserialize, Serialize};

/// Number of values produced by [`generate_statistical_features`]
pub const STATISTICAL_FEATURE_COUNT: usize = 30;

/// Trajectory angle reported when the latitude range collapses to zero
pub const VERTICAL_TRAJECTORY: f64 = -1.57079633;

/// Floor added to every power-spectrum bin before taking its entropy
const PSD_FLOOR: f64 = 1e-8;

/// Course value emitted by location services when heading is unknown
const UNKNOWN_COURSE: f64 = -1.0;

/// Fixed-order statistical description of one series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatisticalFeatures {
    pub max: f64,
    pub min: f64,
    pub sum: f64,
    pub mean: f64,
    pub median: f64,
    pub mean_absolute_value: f64,
    pub median_absolute_value: f64,
    pub variance: f64,
    pub std_dev: f64,
    pub mean_absolute_deviation: f64,
    pub median_absolute_deviation: f64,
    pub zero_crossings: f64,
    pub mean_crossings: f64,
    pub moments: [f64; 4],
    pub spectral: SpectralFeatures,
    pub interquartile_range: f64,
    pub coefficient_of_variation: f64,
    pub skewness: f64,
    pub kurtosis: f64,
    pub signal_energy: f64,
    pub log_signal_energy: f64,
    pub power: f64,
    pub autocorrelation: f64,
}

/// Descriptors of the discrete Fourier transform of a series
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SpectralFeatures {
    /// Real part of the zero-frequency component
    pub dc: f64,
    /// Entropy of the real-part power spectrum
    pub entropy: f64,
    /// Sum of the real parts of all bins
    pub energy: f64,
    /// Real part of the mean bin
    pub mean: f64,
    /// Variance of the complex bins
    pub variance: f64,
}

impl StatisticalFeatures {
    /// Describe a series; `None` for empty input
    pub fn compute(x: &[f64]) -> Option<Self> {
        if x.is_empty() {
            return None;
        }

        let n = x.len() as f64;
        let sum: f64 = x.iter().sum();
        let mean = sum / n;
        let median = median(x);
        let variance = variance(x, mean);
        let std_dev = variance.sqrt();
        let abs: Vec<f64> = x.iter().map(|v| v.abs()).collect();
        let signal_energy = signal_energy(x);

        let coefficient_of_variation = if mean == 0.0 { 0.0 } else { std_dev / mean };
        let autocorrelation = if x.len() > 1 {
            autocorrelation(x, mean)
        } else {
            0.0
        };

        Some(Self {
            max: x.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            min: x.iter().copied().fold(f64::INFINITY, f64::min),
            sum,
            mean,
            median,
            mean_absolute_value: abs.iter().sum::<f64>() / n,
            median_absolute_value: self::median(&abs),
            variance,
            std_dev,
            mean_absolute_deviation: mean_absolute_deviation(x),
            median_absolute_deviation: median_absolute_deviation(x),
            zero_crossings: zero_crossings(x, median) as f64,
            mean_crossings: mean_crossings(x, mean) as f64,
            moments: moments(x),
            spectral: fft_features(x),
            interquartile_range: interquartile_range(x),
            coefficient_of_variation,
            skewness: skewness(x, mean),
            kurtosis: kurtosis(x, mean, std_dev),
            signal_energy,
            log_signal_energy: log_signal_energy(x),
            power: signal_energy / n,
            autocorrelation,
        })
    }

    /// Flatten in marker order
    pub fn to_vec(&self) -> Vec<f64> {
        let s = &self.spectral;
        vec![
            self.max,
            self.min,
            self.sum,
            self.mean,
            self.median,
            self.mean_absolute_value,
            self.median_absolute_value,
            self.variance,
            self.std_dev,
            self.mean_absolute_deviation,
            self.median_absolute_deviation,
            self.zero_crossings,
            self.mean_crossings,
            self.moments[0],
            self.moments[1],
            self.moments[2],
            self.moments[3],
            s.dc,
            s.entropy,
            s.energy,
            s.mean,
            s.variance,
            self.interquartile_range,
            self.coefficient_of_variation,
            self.skewness,
            self.kurtosis,
            self.signal_energy,
            self.log_signal_energy,
            self.power,
            self.autocorrelation,
        ]
    }
}

/// Generate the fixed-order statistical feature vector for one series.
///
/// Empty input yields an empty vector.
pub fn generate_statistical_features(x: &[f64]) -> Vec<f64> {
    StatisticalFeatures::compute(x)
        .map(|f| f.to_vec())
        .unwrap_or_default()
}

/// Arithmetic mean; 0.0 for empty input
pub fn mean(x: &[f64]) -> f64 {
    if x.is_empty() {
        return 0.0;
    }
    x.iter().sum::<f64>() / x.len() as f64
}

/// Median, averaging the two middle values for even lengths; 0.0 for empty input
pub fn median(x: &[f64]) -> f64 {
    if x.is_empty() {
        return 0.0;
    }
    let sorted = sorted(x);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Population variance around `mean`
pub fn variance(x: &[f64], mean: f64) -> f64 {
    if x.is_empty() {
        return 0.0;
    }
    x.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / x.len() as f64
}

/// Population standard deviation
pub fn std_dev(x: &[f64]) -> f64 {
    variance(x, mean(x)).sqrt()
}

/// Mean of `|x - mean(x)|`
pub fn mean_absolute_deviation(x: &[f64]) -> f64 {
    let m = mean(x);
    let deviations: Vec<f64> = x.iter().map(|v| (v - m).abs()).collect();
    mean(&deviations)
}

/// Median of `|x - mean(x)|`
///
/// Deviations are taken from the mean, not the median.
pub fn median_absolute_deviation(x: &[f64]) -> f64 {
    let m = mean(x);
    let deviations: Vec<f64> = x.iter().map(|v| (v - m).abs()).collect();
    median(&deviations)
}

/// Count crossings of `reference` while traversing the series once.
///
/// A value equal to the reference resets the sign state without counting.
fn crossings(x: &[f64], reference: f64) -> usize {
    let mut state = 0i8;
    let mut count = 0;
    for &v in x {
        if v < reference {
            if state > 0 {
                count += 1;
            }
            state = -1;
        } else if v > reference {
            if state < 0 {
                count += 1;
            }
            state = 1;
        } else {
            state = 0;
        }
    }
    count
}

/// Number of times the series crosses its median
pub fn zero_crossings(x: &[f64], median: f64) -> usize {
    crossings(x, median)
}

/// Number of times the series crosses its mean
pub fn mean_crossings(x: &[f64], mean: f64) -> usize {
    crossings(x, mean)
}

/// First through fourth central moments. The first is identically zero.
pub fn moments(x: &[f64]) -> [f64; 4] {
    if x.is_empty() {
        return [0.0; 4];
    }
    let m = mean(x);
    let n = x.len() as f64;
    let mut out = [0.0; 4];
    for (k, slot) in out.iter_mut().enumerate() {
        if k == 0 {
            continue;
        }
        *slot = x.iter().map(|v| (v - m).powi(k as i32 + 1)).sum::<f64>() / n;
    }
    out
}

/// Discrete Fourier transform of a real series
pub(crate) fn spectrum(x: &[f64]) -> Vec<Complex<f64>> {
    let mut buffer: Vec<Complex<f64>> = x.iter().map(|&v| Complex::new(v, 0.0)).collect();
    if buffer.is_empty() {
        return buffer;
    }
    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(buffer.len());
    fft.process(&mut buffer);
    buffer
}

/// Spectral descriptors of a series.
///
/// Power per bin is `Re(X_k)^2 / n + 1e-8`; entropy is `-sum(p * ln p)` over
/// those values. Energy sums the real parts of the bins.
pub fn fft_features(x: &[f64]) -> SpectralFeatures {
    let bins = spectrum(x);
    if bins.is_empty() {
        return SpectralFeatures::default();
    }
    let n = bins.len() as f64;

    let mut energy = 0.0;
    let mut entropy = 0.0;
    for bin in &bins {
        energy += bin.re;
        let psd = (bin.re * bin.re) / n + PSD_FLOOR;
        entropy -= psd * psd.ln();
    }

    let mean_bin = bins.iter().sum::<Complex<f64>>() / n;
    let variance = bins.iter().map(|b| (b - mean_bin).norm_sqr()).sum::<f64>() / n;

    SpectralFeatures {
        dc: bins[0].re,
        entropy,
        energy,
        mean: mean_bin.re,
        variance,
    }
}

/// Interquartile range from population quartiles.
///
/// Formula: `sorted[floor(3n/4)] - sorted[floor(n/4)]`, no interpolation.
pub fn interquartile_range(x: &[f64]) -> f64 {
    if x.is_empty() {
        return 0.0;
    }
    let sorted = sorted(x);
    let n = sorted.len();
    sorted[(3 * n) / 4] - sorted[n / 4]
}

/// Skewness: third central moment over the 1.5 power of the second.
///
/// Returns 0.0 when the second moment is zero.
pub fn skewness(x: &[f64], mean: f64) -> f64 {
    if x.is_empty() {
        return 0.0;
    }
    let n = x.len() as f64;
    let m3 = x.iter().map(|v| (v - mean).powi(3)).sum::<f64>() / n;
    let m2 = (x.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).powf(1.5);
    if m2 == 0.0 {
        0.0
    } else {
        m3 / m2
    }
}

/// Excess kurtosis: fourth central moment over `std^4`, minus 3.
///
/// Returns -3.0 when `std` is zero.
pub fn kurtosis(x: &[f64], mean: f64, std: f64) -> f64 {
    let denom = std.powi(4);
    if x.is_empty() || denom == 0.0 {
        return -3.0;
    }
    let m4 = x.iter().map(|v| (v - mean).powi(4)).sum::<f64>() / x.len() as f64;
    m4 / denom - 3.0
}

/// Sum of squared values
pub fn signal_energy(x: &[f64]) -> f64 {
    x.iter().map(|v| v * v).sum()
}

/// Sum of `log10(x^2)` over nonzero squares
pub fn log_signal_energy(x: &[f64]) -> f64 {
    x.iter()
        .map(|v| v * v)
        .filter(|sq| *sq != 0.0)
        .map(f64::log10)
        .sum()
}

/// Sum of absolute values across three synchronized axes
pub fn signal_magnitude_area(x: &[f64], y: &[f64], z: &[f64]) -> f64 {
    x.iter()
        .zip(y)
        .zip(z)
        .map(|((a, b), c)| a.abs() + b.abs() + c.abs())
        .sum()
}

/// Pearson correlation of two series given their means; 0.0 if either is constant
pub fn correlation(x: &[f64], y: &[f64], mx: f64, my: f64) -> f64 {
    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (a, b) in x.iter().zip(y) {
        cov += (a - mx) * (b - my);
        var_x += (a - mx).powi(2);
        var_y += (b - my).powi(2);
    }
    let denom = var_x * var_y;
    if denom == 0.0 {
        return 0.0;
    }
    cov / denom.sqrt()
}

/// Lag-1 autocorrelation.
///
/// Formula: `[sum_{i>=1} (x[i-1]-m)(x[i]-m) / (n-1)] / [sum_{i>=1} (x[i]-m)^2 / n]`
///
/// Returns 0.0 for fewer than two samples or zero variance.
pub fn autocorrelation(x: &[f64], mean: f64) -> f64 {
    if x.len() < 2 {
        return 0.0;
    }
    let n = x.len() as f64;
    let mut cov = 0.0;
    let mut var = 0.0;
    for i in 1..x.len() {
        cov += (x[i - 1] - mean) * (x[i] - mean);
        var += (x[i] - mean).powi(2);
    }
    cov /= n - 1.0;
    var /= n;
    if var == 0.0 {
        return 0.0;
    }
    cov / var
}

/// Course changes per unit distance.
///
/// Counts samples whose course differs from the last counted course, skipping
/// the unknown course (-1). Returns 0.0 for zero distance or empty input.
pub fn heading_change_rate(course: &[f64], distance: f64) -> f64 {
    if distance == 0.0 || course.is_empty() {
        return 0.0;
    }
    let mut previous = course[0];
    let mut total = 0usize;
    for &c in course {
        if c != previous && c != UNKNOWN_COURSE {
            total += 1;
            previous = c;
        }
    }
    total as f64 / distance
}

/// Stationary samples per unit distance.
///
/// A sample is stationary when its position equals the previous sample's; the
/// first sample compares against itself. Returns 0.0 for zero distance.
pub fn stop_rate(latitude: &[f64], longitude: &[f64], distance: f64) -> f64 {
    if distance == 0.0 || latitude.is_empty() || longitude.is_empty() {
        return 0.0;
    }
    let mut prev = (latitude[0], longitude[0]);
    let mut total = 0usize;
    for (&lat, &long) in latitude.iter().zip(longitude) {
        if prev == (lat, long) {
            total += 1;
        }
        prev = (lat, long);
    }
    total as f64 / distance
}

/// Overall trajectory angle, `atan(longitude range / latitude range)`.
///
/// Returns [`VERTICAL_TRAJECTORY`] when the latitude range is zero.
pub fn trajectory(latitude: &[f64], longitude: &[f64]) -> f64 {
    let lat_range = range(latitude);
    if lat_range == 0.0 {
        return VERTICAL_TRAJECTORY;
    }
    (range(longitude) / lat_range).atan()
}

fn range(x: &[f64]) -> f64 {
    if x.is_empty() {
        return 0.0;
    }
    let max = x.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = x.iter().copied().fold(f64::INFINITY, f64::min);
    max - min
}

fn sorted(x: &[f64]) -> Vec<f64> {
    let mut out = x.to_vec();
    out.sort_by(f64::total_cmp);
    out
}
