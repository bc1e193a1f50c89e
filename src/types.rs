//! Core data types for Synheart Markers
//!
//! This module defines the matrices consumed by the engines and the records,
//! marker vectors and report payloads they produce.

use crate::error::ComputeError;
use serde::{Deserialize, Serialize};

/// Hours in one day of hour-level data
pub const HOURS_PER_DAY: usize = 24;

/// Days in one week of day-level data
pub const DAYS_PER_WEEK: usize = 7;

/// Dense row-major numeric table.
///
/// Rows are time units (days or hours), columns are named behavior features.
/// Serialized as an array of rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<f64>>", into = "Vec<Vec<f64>>")]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

/// Day-level features: one row per calendar day
pub type DayMatrix = Matrix;

/// Hour-level features: one row per hour, 24 consecutive rows per day
pub type HourMatrix = Matrix;

impl Matrix {
    /// Build a matrix from row vectors. All rows must share one width.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self, ComputeError> {
        let cols = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(rows.len() * cols);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != cols {
                return Err(ComputeError::DimensionMismatch(format!(
                    "expected {} columns in row {}, got {}",
                    cols,
                    i,
                    row.len()
                )));
            }
            data.extend_from_slice(row);
        }
        Ok(Self {
            rows: rows.len(),
            cols,
            data,
        })
    }

    /// Build a matrix from a flat row-major buffer
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self, ComputeError> {
        if rows * cols != data.len() {
            return Err(ComputeError::DimensionMismatch(format!(
                "expected {} values for a {}x{} matrix, got {}",
                rows * cols,
                rows,
                cols,
                data.len()
            )));
        }
        Ok(Self { rows, cols, data })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    /// Contiguous block of rows `start..end`, flattened
    pub fn row_block(&self, start: usize, end: usize) -> &[f64] {
        &self.data[start * self.cols..end * self.cols]
    }

    /// Copy of one column
    pub fn column(&self, col: usize) -> Vec<f64> {
        (0..self.rows).map(|r| self.get(r, col)).collect()
    }

    /// Apply `f` to every value of one column in place
    pub fn map_column<F: FnMut(f64) -> f64>(&mut self, col: usize, mut f: F) {
        for r in 0..self.rows {
            let idx = r * self.cols + col;
            self.data[idx] = f(self.data[idx]);
        }
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &[f64]> {
        // chunks(0) panics, so an empty-width matrix yields no rows
        self.data.chunks(self.cols.max(1)).take(self.rows)
    }

    /// Leading `rows` rows as a new matrix
    pub fn head(&self, rows: usize) -> Self {
        let rows = rows.min(self.rows);
        Self {
            rows,
            cols: self.cols,
            data: self.row_block(0, rows).to_vec(),
        }
    }
}

impl TryFrom<Vec<Vec<f64>>> for Matrix {
    type Error = ComputeError;

    fn try_from(rows: Vec<Vec<f64>>) -> Result<Self, Self::Error> {
        Matrix::from_rows(rows)
    }
}

impl From<Matrix> for Vec<Vec<f64>> {
    fn from(matrix: Matrix) -> Self {
        matrix.iter_rows().map(<[f64]>::to_vec).collect()
    }
}

/// Outcome of comparing one week against the baseline week
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChangeScoreRecord {
    /// Change score, `1 - |mean(p-values)|`
    pub score: f64,
    /// Whether the Benjamini-Hochberg fraction reached the significance cutoff
    pub significant: bool,
}

impl ChangeScoreRecord {
    pub fn new(score: f64, significant: bool) -> Self {
        Self { score, significant }
    }

    /// The reserved `(0, 0)` record meaning "not enough days to test"
    pub fn insufficient() -> Self {
        Self {
            score: 0.0,
            significant: false,
        }
    }

    /// Significance as the 0/1 flag used in marker output
    pub fn flag(&self) -> u8 {
        u8::from(self.significant)
    }

    pub fn as_tuple(&self) -> (f64, u8) {
        (self.score, self.flag())
    }
}

/// Regularity of one feature at three granularities
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RegularityVector {
    /// Mean pairwise regularity among the 7 weekday profiles
    pub within_week: f64,
    /// Mean pairwise regularity among the Monday-Friday profiles
    pub within_weekdays: f64,
    /// Mean regularity of the same weekday across distinct weeks
    pub between_weeks: f64,
}

impl RegularityVector {
    pub fn to_array(&self) -> [f64; 3] {
        [self.within_week, self.within_weekdays, self.between_weeks]
    }
}

/// Marker sections for one subject
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BehaviorMarkers {
    /// Summary statistics over day-level columns
    pub day_stats: Vec<f64>,
    /// Summary statistics over hour-level columns
    pub hour_stats: Vec<f64>,
    /// One regularity vector per continuous column
    pub regularity: Vec<RegularityVector>,
    /// One circadian strength per continuous column
    pub circadian: Vec<f64>,
}

impl BehaviorMarkers {
    /// Flatten into the fixed-order marker vector
    pub fn to_vec(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.len());
        out.extend_from_slice(&self.day_stats);
        out.extend_from_slice(&self.hour_stats);
        for ri in &self.regularity {
            out.extend_from_slice(&ri.to_array());
        }
        out.extend_from_slice(&self.circadian);
        out
    }

    pub fn len(&self) -> usize {
        self.day_stats.len() + self.hour_stats.len() + 3 * self.regularity.len() + self.circadian.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A weekly change record judged against the subject's prior change scores
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AssessedChange {
    /// Zero-based week index (week 0 is the baseline week)
    pub week: usize,
    pub record: ChangeScoreRecord,
    /// Score divided by the Tukey fence of prior scores; `None` without history
    pub fence_ratio: Option<f64>,
    /// Score exceeded the upper fence of prior scores
    pub is_outlier: bool,
}

/// Report producer metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkerProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// One weekly change entry in a report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklyChange {
    pub week: usize,
    pub score: f64,
    pub significant: u8,
    pub fence_ratio: Option<f64>,
    pub outlier: bool,
}

/// Complete marker report for one subject
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkerReport {
    pub schema_version: String,
    pub producer: MarkerProducer,
    pub subject_id: String,
    pub computed_at_utc: String,
    pub marker_count: usize,
    pub markers: Vec<f64>,
    pub change_scores: Vec<WeeklyChange>,
    /// True when change detection returned the insufficient-data sentinel
    pub insufficient_data: bool,
}
