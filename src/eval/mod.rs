//! Offline evaluation of embedding quality.
//!
//! Two batch evaluators run after the frame loop ends:
//! - [`stability`] looks at one subject's embeddings over time;
//! - [`discrim`] looks at co-occurring subjects within each frame.
//!
//! Both consume append-only accumulators owned by the pipeline driver.

pub mod discrim;
pub mod stability;
pub mod stats;

pub use discrim::{DiscriminabilityReport, DistributionSummary, PeakSummary};
pub use stability::{DimensionStd, SimilaritySummary, StabilityReport};

use anyhow::{anyhow, Result};

use crate::feature::Embedding;

/// Time-ordered embeddings for a single subject, one per sampled frame.
///
/// Append-only; dimensions are checked at push so the evaluators can assume
/// a rectangular batch.
#[derive(Clone, Debug, Default)]
pub struct EmbeddingSeries {
    rows: Vec<Embedding>,
}

impl EmbeddingSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, embedding: Embedding) -> Result<()> {
        if let Some(first) = self.rows.first() {
            if first.len() != embedding.len() {
                return Err(anyhow!(
                    "embedding dimension mismatch: series holds {}, got {}",
                    first.len(),
                    embedding.len()
                ));
            }
        }
        self.rows.push(embedding);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn dim(&self) -> Option<usize> {
        self.rows.first().map(Vec::len)
    }

    pub fn rows(&self) -> &[Embedding] {
        &self.rows
    }
}

/// Unordered embeddings of the subjects co-detected in one frame.
///
/// Meaningful for the discriminability evaluator only at two or more entries;
/// smaller sets are carried but skipped during evaluation.
#[derive(Clone, Debug, Default)]
pub struct FrameEmbeddingSet {
    rows: Vec<Embedding>,
}

impl FrameEmbeddingSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, embedding: Embedding) -> Result<()> {
        if let Some(first) = self.rows.first() {
            if first.len() != embedding.len() {
                return Err(anyhow!(
                    "embedding dimension mismatch: set holds {}, got {}",
                    first.len(),
                    embedding.len()
                ));
            }
        }
        self.rows.push(embedding);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Embedding] {
        &self.rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn series_rejects_mismatched_dimensions() {
        let mut series = EmbeddingSeries::new();
        series.push(vec![1.0, 0.0]).unwrap();
        assert!(series.push(vec![1.0, 0.0, 0.0]).is_err());
        assert_eq!(series.len(), 1);
        assert_eq!(series.dim(), Some(2));
    }

    #[test]
    fn set_rejects_mismatched_dimensions() {
        let mut set = FrameEmbeddingSet::new();
        set.push(vec![1.0, 0.0]).unwrap();
        set.push(vec![0.0, 1.0]).unwrap();
        assert!(set.push(vec![1.0]).is_err());
        assert_eq!(set.len(), 2);
    }
}
