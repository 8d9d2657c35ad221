//! Discriminability of co-occurring subjects within a frame.
//!
//! Lower pairwise cosine similarity between distinct subjects means better
//! separation. The per-frame maximum matters most: a single high value flags
//! two subjects whose features collide (or one subject boxed twice).

use std::fmt;

use super::stats::{l2_normalize, max_value, mean, min_value, percentile, std_dev};
use super::FrameEmbeddingSet;

/// Six-number summary of the pooled pairwise samples.
#[derive(Clone, Copy, Debug)]
pub struct DistributionSummary {
    pub mean: f32,
    pub std: f32,
    pub min: f32,
    pub p50: f32,
    pub p95: f32,
    pub max: f32,
}

/// Upper-tail summary for per-frame aggregates.
#[derive(Clone, Copy, Debug)]
pub struct PeakSummary {
    pub mean: f32,
    pub p95: f32,
    pub max: f32,
}

impl PeakSummary {
    fn from_samples(samples: &[f32]) -> Self {
        Self {
            mean: mean(samples),
            p95: percentile(samples, 95.0),
            max: max_value(samples),
        }
    }
}

/// Scalar statistics characterizing how separable co-detected subjects are.
#[derive(Clone, Debug)]
pub struct DiscriminabilityReport {
    /// Frames that contributed (at least two embeddings each).
    pub frames_used: usize,
    /// Total pooled pairwise samples across those frames.
    pub pair_samples: usize,
    pub pooled: DistributionSummary,
    pub per_frame_max: PeakSummary,
    pub per_frame_mean: PeakSummary,
}

/// Evaluate per-frame embedding sets.
///
/// Frames with fewer than two embeddings are skipped entirely. Returns `None`
/// when no frame qualifies; the statistics are undefined over an empty set.
pub fn evaluate(frames: &[FrameEmbeddingSet]) -> Option<DiscriminabilityReport> {
    let mut pooled: Vec<f32> = Vec::new();
    let mut per_frame_max: Vec<f32> = Vec::new();
    let mut per_frame_mean: Vec<f32> = Vec::new();
    let mut frames_used = 0usize;

    for set in frames {
        let m = set.len();
        if m < 2 {
            continue;
        }
        frames_used += 1;

        let rows: Vec<Vec<f32>> = set.rows().iter().map(|row| l2_normalize(row)).collect();

        // All M^2 - M ordered off-diagonal entries of the cosine matrix.
        // Each unordered pair is deliberately counted in both directions to
        // stay comparable with the reference statistics.
        let mut sims = Vec::with_capacity(m * m - m);
        for (i, a) in rows.iter().enumerate() {
            for (j, b) in rows.iter().enumerate() {
                if i != j {
                    sims.push(super::stats::dot(a, b));
                }
            }
        }

        per_frame_max.push(max_value(&sims));
        per_frame_mean.push(mean(&sims));
        pooled.extend_from_slice(&sims);
    }

    if frames_used == 0 || pooled.is_empty() {
        log::info!("discriminability evaluation skipped: no frame with 2+ subjects");
        return None;
    }

    Some(DiscriminabilityReport {
        frames_used,
        pair_samples: pooled.len(),
        pooled: DistributionSummary {
            mean: mean(&pooled),
            std: std_dev(&pooled),
            min: min_value(&pooled),
            p50: percentile(&pooled, 50.0),
            p95: percentile(&pooled, 95.0),
            max: max_value(&pooled),
        },
        per_frame_max: PeakSummary::from_samples(&per_frame_max),
        per_frame_mean: PeakSummary::from_samples(&per_frame_mean),
    })
}

impl fmt::Display for DiscriminabilityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "========== multi-subject discriminability ==========")?;
        writeln!(
            f,
            "frames used={}, pairwise samples={}",
            self.frames_used, self.pair_samples
        )?;
        writeln!(f, "[pooled pairwise cosine] (lower is better)")?;
        writeln!(
            f,
            "  mean={:.6} std={:.6} min={:.6} p50={:.6} p95={:.6} max={:.6}",
            self.pooled.mean,
            self.pooled.std,
            self.pooled.min,
            self.pooled.p50,
            self.pooled.p95,
            self.pooled.max
        )?;
        writeln!(f, "[per-frame maximum] (worst confusable pair per frame)")?;
        writeln!(
            f,
            "  mean={:.6} p95={:.6} max={:.6}",
            self.per_frame_max.mean, self.per_frame_max.p95, self.per_frame_max.max
        )?;
        writeln!(f, "[per-frame mean]")?;
        writeln!(
            f,
            "  mean={:.6} p95={:.6}",
            self.per_frame_mean.mean, self.per_frame_mean.p95
        )?;
        Ok(())
    }
}
