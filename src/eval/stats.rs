//! Scalar statistics over f32 samples.
//!
//! Every function returns a defined value on degenerate input (empty slice,
//! zero-norm vector) instead of faulting; the evaluators rely on that.

/// Denominator floor for defensive re-normalization.
const NORM_EPS: f32 = 1e-12;

pub fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f32>() / values.len() as f32
}

/// Population standard deviation.
pub fn std_dev(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m) * (v - m)).sum::<f32>() / values.len() as f32;
    var.sqrt()
}

pub fn min_value(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().copied().fold(f32::INFINITY, f32::min)
}

pub fn max_value(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().copied().fold(f32::NEG_INFINITY, f32::max)
}

/// Percentile with linear interpolation between ranks.
///
/// `pct` is in `[0, 100]`. An empty input yields 0.0.
pub fn percentile(values: &[f32], pct: f32) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    if sorted.len() == 1 {
        return sorted[0];
    }

    let rank = (pct / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f32;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f32;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Defensive L2 normalization with an epsilon-clamped denominator.
///
/// Embeddings entering the evaluators are normalized again here rather than
/// trusting the extractor; a zero vector passes through unchanged (up to the
/// epsilon) instead of producing NaN.
pub fn l2_normalize(v: &[f32]) -> Vec<f32> {
    let norm = dot(v, v).sqrt().max(NORM_EPS);
    v.iter().map(|x| x / norm).collect()
}
