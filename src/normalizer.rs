//! Range normalization
//!
//! This module rescales behavior features before they are compared.
//! - Matrix columns rescaled to 0-1 ahead of change detection
//! - Single series centered on 0 with unit range ahead of regularity scoring

use crate::types::Matrix;

/// Normalizer for day- and hour-level feature tables
pub struct Normalizer;

impl Normalizer {
    /// Rescale every column to [0, 1] by its own min and max.
    ///
    /// Columns with zero range are left untouched.
    pub fn unit_range_columns(matrix: &Matrix) -> Matrix {
        let mut out = matrix.clone();
        for col in 0..matrix.cols() {
            let (min, max) = column_bounds(matrix, col);
            let range = max - min;
            if range > 0.0 {
                out.map_column(col, |v| (v - min) / range);
            }
        }
        out
    }

    /// Rescale a series to [-0.5, 0.5].
    ///
    /// A constant series maps to all -0.5.
    pub fn center_unit_range(series: &[f64]) -> Vec<f64> {
        if series.is_empty() {
            return Vec::new();
        }
        let min = series.iter().copied().fold(f64::INFINITY, f64::min);
        let max = series.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let range = max - min;
        if range == 0.0 {
            return vec![-0.5; series.len()];
        }
        series.iter().map(|v| (v - min) / range - 0.5).collect()
    }
}

fn column_bounds(matrix: &Matrix, col: usize) -> (f64, f64) {
    matrix
        .iter_rows()
        .map(|row| row[col])
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_unit_range_columns() {
        let m = Matrix::from_rows(vec![
            vec![0.0, 5.0, 2.0],
            vec![5.0, 5.0, 4.0],
            vec![10.0, 5.0, 6.0],
        ])
        .unwrap();
        let n = Normalizer::unit_range_columns(&m);
        assert_eq!(n.column(0), vec![0.0, 0.5, 1.0]);
        // constant column untouched
        assert_eq!(n.column(1), vec![5.0, 5.0, 5.0]);
        assert_eq!(n.column(2), vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_center_unit_range() {
        assert_eq!(
            Normalizer::center_unit_range(&[2.0, 4.0, 6.0]),
            vec![-0.5, 0.0, 0.5]
        );
    }

    #[test]
    fn test_center_unit_range_constant() {
        assert_eq!(Normalizer::center_unit_range(&[3.0; 4]), vec![-0.5; 4]);
        assert!(Normalizer::center_unit_range(&[]).is_empty());
    }
}
