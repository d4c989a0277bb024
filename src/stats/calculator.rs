//! Statistics Calculator Module
//! Correlation matrices for heatmaps plus the summaries the static renderer needs.

use rayon::prelude::*;
use statrs::statistics::{Data, OrderStatistics, Statistics};

/// Pairwise correlation of named numeric columns.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    /// Row-major, `values[i][j]` is corr(columns[i], columns[j]). NaN when undefined.
    pub values: Vec<Vec<f64>>,
}

/// Five-number summary used to draw a box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxSummary {
    pub whisker_low: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub whisker_high: f64,
}

/// Equal-width histogram bins.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramBins {
    pub start: f64,
    pub width: f64,
    pub counts: Vec<usize>,
}

/// Handles statistical calculations with multi-threading support.
pub struct StatsCalculator;

impl StatsCalculator {
    /// Pearson correlation over rows where both values are present (pandas `corr()` semantics).
    pub fn pearson(xs: &[Option<f64>], ys: &[Option<f64>]) -> f64 {
        let (a, b): (Vec<f64>, Vec<f64>) = xs
            .iter()
            .zip(ys.iter())
            .filter_map(|(x, y)| match (x, y) {
                (Some(x), Some(y)) if x.is_finite() && y.is_finite() => Some((*x, *y)),
                _ => None,
            })
            .unzip();

        if a.len() < 2 {
            return f64::NAN;
        }

        let cov = a.iter().covariance(b.iter());
        let sd_a = a.iter().std_dev();
        let sd_b = b.iter().std_dev();
        if sd_a == 0.0 || sd_b == 0.0 {
            return f64::NAN;
        }
        (cov / (sd_a * sd_b)).clamp(-1.0, 1.0)
    }

    /// Compute the full correlation matrix, one row per rayon task.
    pub fn correlation_matrix(columns: &[(String, Vec<Option<f64>>)]) -> CorrelationMatrix {
        let values = (0..columns.len())
            .into_par_iter()
            .map(|i| {
                columns
                    .iter()
                    .enumerate()
                    .map(|(j, (_, other))| {
                        let r = Self::pearson(&columns[i].1, other);
                        // self-correlation is exactly 1 whenever it is defined
                        if i == j && r.is_finite() {
                            1.0
                        } else {
                            r
                        }
                    })
                    .collect()
            })
            .collect();

        CorrelationMatrix {
            columns: columns.iter().map(|(name, _)| name.clone()).collect(),
            values,
        }
    }

    /// Quartiles with 1.5 IQR whiskers clamped to observed values.
    pub fn box_summary(values: &[f64]) -> Option<BoxSummary> {
        let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if finite.is_empty() {
            return None;
        }

        let mut data = Data::new(finite.clone());
        let q1 = data.lower_quartile();
        let median = data.median();
        let q3 = data.upper_quartile();
        let iqr = q3 - q1;

        let whisker_low = finite
            .iter()
            .copied()
            .filter(|&v| v >= q1 - 1.5 * iqr)
            .fold(f64::INFINITY, f64::min);
        let whisker_high = finite
            .iter()
            .copied()
            .filter(|&v| v <= q3 + 1.5 * iqr)
            .fold(f64::NEG_INFINITY, f64::max);

        Some(BoxSummary {
            whisker_low: whisker_low.min(q1),
            q1,
            median,
            q3,
            whisker_high: whisker_high.max(q3),
        })
    }

    /// Sturges' rule bin count over the finite values.
    pub fn histogram(values: &[f64]) -> Option<HistogramBins> {
        let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if finite.is_empty() {
            return None;
        }

        let (min, max) = bounds(finite.iter().copied());
        let n_bins = ((finite.len() as f64).log2().ceil() as usize + 1).max(1);
        let span = if max > min { max - min } else { 1.0 };
        let width = span / n_bins as f64;

        let mut counts = vec![0usize; n_bins];
        for v in &finite {
            let idx = (((v - min) / width) as usize).min(n_bins - 1);
            counts[idx] += 1;
        }

        Some(HistogramBins {
            start: min,
            width,
            counts,
        })
    }

    /// Normalised 2-D point density on a `size x size` grid, `grid[row][col]` with row 0 at the bottom.
    pub fn density_grid(points: &[(f64, f64)], size: usize) -> Vec<Vec<f64>> {
        let size = size.max(1);
        let mut grid = vec![vec![0.0; size]; size];
        let finite: Vec<(f64, f64)> = points
            .iter()
            .copied()
            .filter(|(x, y)| x.is_finite() && y.is_finite())
            .collect();
        if finite.is_empty() {
            return grid;
        }

        let (x_min, x_max) = bounds(finite.iter().map(|p| p.0));
        let (y_min, y_max) = bounds(finite.iter().map(|p| p.1));
        let cell = |v: f64, lo: f64, hi: f64| {
            let span = if hi > lo { hi - lo } else { 1.0 };
            (((v - lo) / span * size as f64) as usize).min(size - 1)
        };

        for &(x, y) in &finite {
            grid[cell(y, y_min, y_max)][cell(x, x_min, x_max)] += 1.0;
        }

        let peak = grid
            .iter()
            .flatten()
            .copied()
            .fold(0.0, f64::max);
        if peak > 0.0 {
            grid.iter_mut()
                .flatten()
                .for_each(|v| *v /= peak);
        }
        grid
    }
}

/// Min and max of an iterator of finite values; `(0, 1)` when empty.
pub fn bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (min, max) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if min.is_infinite() {
        (0.0, 1.0)
    } else {
        (min, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn some(values: &[f64]) -> Vec<Option<f64>> {
        values.iter().copied().map(Some).collect()
    }

    #[test]
    fn pearson_perfect_and_inverse() {
        let x = some(&[1.0, 2.0, 3.0, 4.0]);
        let y = some(&[2.0, 4.0, 6.0, 8.0]);
        let z = some(&[4.0, 3.0, 2.0, 1.0]);
        assert_relative_eq!(StatsCalculator::pearson(&x, &y), 1.0, epsilon = 1e-12);
        assert_relative_eq!(StatsCalculator::pearson(&x, &z), -1.0, epsilon = 1e-12);
    }

    #[test]
    fn pearson_skips_incomplete_pairs() {
        let x = vec![Some(1.0), None, Some(2.0), Some(3.0)];
        let y = vec![Some(1.0), Some(100.0), Some(2.0), Some(3.0)];
        assert_relative_eq!(StatsCalculator::pearson(&x, &y), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn constant_or_short_columns_are_nan() {
        assert!(StatsCalculator::pearson(&some(&[1.0, 1.0]), &some(&[1.0, 2.0])).is_nan());
        assert!(StatsCalculator::pearson(&some(&[1.0]), &some(&[1.0])).is_nan());
    }

    #[test]
    fn single_column_matrix_is_one_by_one() {
        let m = StatsCalculator::correlation_matrix(&[("Values".into(), some(&[10.0, 20.0]))]);
        assert_eq!(m.columns, vec!["Values"]);
        assert_eq!(m.values, vec![vec![1.0]]);
    }

    #[test]
    fn diagonal_is_exact_unless_undefined() {
        let cols = vec![
            ("a".to_string(), some(&[0.1, 0.7, 0.3, 0.9])),
            ("flat".to_string(), some(&[2.0, 2.0, 2.0, 2.0])),
        ];
        let m = StatsCalculator::correlation_matrix(&cols);
        assert_eq!(m.values[0][0], 1.0);
        assert!(m.values[1][1].is_nan());
    }

    #[test]
    fn matrix_is_symmetric() {
        let cols = vec![
            ("a".to_string(), some(&[1.0, 2.0, 4.0, 3.0])),
            ("b".to_string(), some(&[3.0, 1.0, 2.0, 5.0])),
            ("c".to_string(), some(&[9.0, 7.0, 1.0, 2.0])),
        ];
        let m = StatsCalculator::correlation_matrix(&cols);
        for i in 0..3 {
            for j in 0..3 {
                assert_relative_eq!(m.values[i][j], m.values[j][i], epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn box_summary_orders_quartiles() {
        let s = StatsCalculator::box_summary(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 100.0]).unwrap();
        assert!(s.whisker_low <= s.q1);
        assert!(s.q1 <= s.median && s.median <= s.q3);
        assert!(s.q3 <= s.whisker_high);
        assert!(s.whisker_high < 100.0);
        assert!(StatsCalculator::box_summary(&[f64::NAN]).is_none());
    }

    #[test]
    fn histogram_counts_every_value() {
        let bins = StatsCalculator::histogram(&[1.0, 2.0, 2.0, 3.0, 10.0]).unwrap();
        assert_eq!(bins.counts.iter().sum::<usize>(), 5);
        assert_relative_eq!(bins.start, 1.0);
    }

    #[test]
    fn density_grid_peaks_at_one() {
        let grid = StatsCalculator::density_grid(&[(0.0, 0.0), (0.0, 0.0), (1.0, 1.0)], 4);
        assert_relative_eq!(grid[0][0], 1.0);
        assert_relative_eq!(grid[3][3], 0.5);
    }
}
