//! Temporal stability of a single subject's embeddings.

use std::fmt;

use super::stats::{dot, l2_normalize, mean, min_value, percentile, std_dev};
use super::EmbeddingSeries;

/// Number of highest-jitter dimensions surfaced for diagnostics.
const TOP_K: usize = 10;

/// Summary of a cosine-similarity sample set.
#[derive(Clone, Copy, Debug)]
pub struct SimilaritySummary {
    pub mean: f32,
    pub std: f32,
    pub min: f32,
    pub p05: f32,
}

impl SimilaritySummary {
    fn from_samples(samples: &[f32]) -> Self {
        Self {
            mean: mean(samples),
            std: std_dev(samples),
            min: min_value(samples),
            p05: percentile(samples, 5.0),
        }
    }
}

/// One dimension's standard deviation across the series.
#[derive(Clone, Copy, Debug)]
pub struct DimensionStd {
    pub index: usize,
    pub std: f32,
}

/// Scalar statistics characterizing how stable a series of embeddings is.
#[derive(Clone, Debug)]
pub struct StabilityReport {
    pub samples: usize,
    pub dims: usize,
    /// `cos(e_i, e_{i+1})` for consecutive frames; close to 1 means stable,
    /// and the min/p05 catch momentary jumps.
    pub adjacent: SimilaritySummary,
    /// `cos(e_i, center)` where the center is the re-normalized mean vector;
    /// spread here indicates overall drift.
    pub center: SimilaritySummary,
    pub mean_variance: f32,
    /// RMS of per-dimension standard deviation (equals sqrt of the mean
    /// per-dimension variance).
    pub rms_std: f32,
    pub p95_std: f32,
    /// Highest-jitter dimensions, descending by standard deviation.
    pub top_dims: Vec<DimensionStd>,
}

/// Evaluate a series. Returns `None` when fewer than two samples exist; no
/// meaningful stability statistic can be formed from one embedding.
pub fn evaluate(series: &EmbeddingSeries) -> Option<StabilityReport> {
    let n = series.len();
    if n < 2 {
        log::info!(
            "stability evaluation skipped: {} sample(s), need at least 2",
            n
        );
        return None;
    }

    // Re-normalize defensively instead of trusting the extractor.
    let rows: Vec<Vec<f32>> = series.rows().iter().map(|row| l2_normalize(row)).collect();
    let dims = rows[0].len();

    let adjacent: Vec<f32> = rows.windows(2).map(|pair| dot(&pair[0], &pair[1])).collect();

    let mut center = vec![0.0f32; dims];
    for row in &rows {
        for (acc, value) in center.iter_mut().zip(row) {
            *acc += value;
        }
    }
    for value in &mut center {
        *value /= n as f32;
    }
    let center = l2_normalize(&center);
    let center_cos: Vec<f32> = rows.iter().map(|row| dot(row, &center)).collect();

    let mut per_dim_var = vec![0.0f32; dims];
    for (d, var) in per_dim_var.iter_mut().enumerate() {
        let column: Vec<f32> = rows.iter().map(|row| row[d]).collect();
        let m = mean(&column);
        *var = column.iter().map(|v| (v - m) * (v - m)).sum::<f32>() / n as f32;
    }
    let per_dim_std: Vec<f32> = per_dim_var.iter().map(|v| v.sqrt()).collect();

    let mean_variance = mean(&per_dim_var);
    let rms_std = mean_variance.sqrt();
    let p95_std = percentile(&per_dim_std, 95.0);

    let mut order: Vec<usize> = (0..dims).collect();
    order.sort_by(|a, b| {
        per_dim_std[*b]
            .partial_cmp(&per_dim_std[*a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let top_dims = order
        .into_iter()
        .take(TOP_K.min(dims))
        .map(|index| DimensionStd {
            index,
            std: per_dim_std[index],
        })
        .collect();

    Some(StabilityReport {
        samples: n,
        dims,
        adjacent: SimilaritySummary::from_samples(&adjacent),
        center: SimilaritySummary::from_samples(&center_cos),
        mean_variance,
        rms_std,
        p95_std,
        top_dims,
    })
}

impl fmt::Display for StabilityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "========== embedding stability ==========")?;
        writeln!(f, "samples N={}, dims D={}", self.samples, self.dims)?;
        writeln!(f, "[adjacent-frame cosine] (closer to 1 is more stable)")?;
        writeln!(
            f,
            "  mean={:.6} std={:.6} min={:.6} p05={:.6}",
            self.adjacent.mean, self.adjacent.std, self.adjacent.min, self.adjacent.p05
        )?;
        writeln!(f, "[cosine to center vector]")?;
        writeln!(
            f,
            "  mean={:.6} std={:.6} min={:.6} p05={:.6}",
            self.center.mean, self.center.std, self.center.min, self.center.p05
        )?;
        writeln!(f, "[per-dimension variance summary]")?;
        writeln!(
            f,
            "  mean_var={:.8} rms_std={:.8} p95_std={:.8}",
            self.mean_variance, self.rms_std, self.p95_std
        )?;
        writeln!(f, "[highest-jitter dimensions]")?;
        for (rank, dim) in self.top_dims.iter().enumerate() {
            writeln!(
                f,
                "  #{:02} dim={:4} std={:.8}",
                rank + 1,
                dim.index,
                dim.std
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series_of(rows: &[Vec<f32>]) -> EmbeddingSeries {
        let mut series = EmbeddingSeries::new();
        for row in rows {
            series.push(row.clone()).unwrap();
        }
        series
    }

    #[test]
    fn fewer_than_two_samples_yields_none() {
        assert!(evaluate(&EmbeddingSeries::new()).is_none());
        assert!(evaluate(&series_of(&[vec![1.0, 0.0]])).is_none());
    }

    #[test]
    fn identical_unit_vectors_are_perfectly_stable() {
        let report = evaluate(&series_of(&[vec![1.0, 0.0], vec![1.0, 0.0]])).unwrap();
        assert_eq!(report.samples, 2);
        assert!((report.adjacent.mean - 1.0).abs() < 1e-6);
        assert!(report.adjacent.std.abs() < 1e-6);
        assert!((report.center.mean - 1.0).abs() < 1e-6);
        assert!(report.mean_variance.abs() < 1e-8);
    }

    #[test]
    fn orthogonal_pair_has_zero_adjacent_cosine() {
        let report = evaluate(&series_of(&[vec![1.0, 0.0], vec![0.0, 1.0]])).unwrap();
        assert!(report.adjacent.mean.abs() < 1e-6);
        // Both rows sit at 45 degrees from the normalized center.
        assert!((report.center.mean - (0.5f32).sqrt()).abs() < 1e-5);
    }

    #[test]
    fn cosines_stay_in_bounds_for_unnormalized_input() {
        // The evaluator re-normalizes, so large-magnitude rows still produce
        // cosines in [-1, 1].
        let report = evaluate(&series_of(&[
            vec![10.0, 0.0, 0.0],
            vec![0.0, -7.0, 0.0],
            vec![3.0, 3.0, 3.0],
        ]))
        .unwrap();
        assert!(report.adjacent.min >= -1.0 - 1e-6);
        assert!(report.adjacent.mean <= 1.0 + 1e-6);
        assert!(report.center.min >= -1.0 - 1e-6);
    }

    #[test]
    fn top_dims_are_capped_and_sorted() {
        let report = evaluate(&series_of(&[
            vec![1.0, 0.0, 0.5, 0.0],
            vec![0.0, 1.0, 0.5, 0.0],
            vec![1.0, 0.0, 0.5, 0.0],
        ]))
        .unwrap();
        assert_eq!(report.top_dims.len(), 4);
        for pair in report.top_dims.windows(2) {
            assert!(pair[0].std >= pair[1].std);
        }
    }
}
