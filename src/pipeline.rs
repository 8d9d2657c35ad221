//! Frame-by-frame driving loop.
//!
//! Strictly sequential: each frame is fully processed (detection, then
//! feature extraction for every retained box) before the next frame is
//! pulled. The only state crossing iterations is the pair of append-only
//! accumulation buffers consumed by the evaluators after the loop ends.

use anyhow::Result;

use crate::detect::Detector;
use crate::eval::{self, DiscriminabilityReport, EmbeddingSeries, FrameEmbeddingSet, StabilityReport};
use crate::feature::{Embedding, FeatureExtractor};
use crate::frame::Frame;
use crate::ingest::FileSource;

/// Cap on boxes embedded per frame; the pairwise evaluation is O(M^2).
pub const DEFAULT_MAX_PEOPLE_PER_FRAME: usize = 6;

#[derive(Clone, Copy, Debug)]
pub struct PipelineConfig {
    pub max_people_per_frame: usize,
    /// Optional iteration bound; `None` runs until the source is exhausted.
    pub max_frames: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_people_per_frame: DEFAULT_MAX_PEOPLE_PER_FRAME,
            max_frames: None,
        }
    }
}

/// Degenerate cases are skipped silently and counted here, so a long run is
/// never aborted by an occasional box-less or crop-less frame.
#[derive(Clone, Copy, Debug, Default)]
pub struct PipelineCounters {
    pub frames_processed: u64,
    pub frames_without_boxes: u64,
    pub empty_crops: u64,
    pub boxes_detected: u64,
    pub embeddings_extracted: u64,
}

/// Final output of a run: both evaluations plus the skip counters.
#[derive(Debug)]
pub struct PipelineReport {
    pub stability: Option<StabilityReport>,
    pub discriminability: Option<DiscriminabilityReport>,
    pub counters: PipelineCounters,
}

/// Detection + embedding pipeline with accumulation buffers.
pub struct Pipeline {
    detector: Detector,
    extractor: FeatureExtractor,
    config: PipelineConfig,
    series: EmbeddingSeries,
    frame_sets: Vec<FrameEmbeddingSet>,
    counters: PipelineCounters,
}

impl Pipeline {
    pub fn new(detector: Detector, extractor: FeatureExtractor, config: PipelineConfig) -> Self {
        Self {
            detector,
            extractor,
            config,
            series: EmbeddingSeries::new(),
            frame_sets: Vec::new(),
            counters: PipelineCounters::default(),
        }
    }

    pub fn counters(&self) -> &PipelineCounters {
        &self.counters
    }

    /// Process one frame: detect in image space, crop each retained box,
    /// extract embeddings, and append to the accumulation buffers.
    pub fn process_frame(&mut self, frame: &Frame) -> Result<()> {
        self.counters.frames_processed += 1;

        let boxes = self.detector.detect_in_image(frame)?;
        if boxes.is_empty() {
            self.counters.frames_without_boxes += 1;
            return Ok(());
        }
        self.counters.boxes_detected += boxes.len() as u64;

        let mut frame_set = FrameEmbeddingSet::new();
        let mut first: Option<Embedding> = None;
        for bbox in boxes.iter().take(self.config.max_people_per_frame) {
            let Some(crop) = frame.crop(bbox) else {
                self.counters.empty_crops += 1;
                continue;
            };
            let embedding = self.extractor.extract(&crop)?;
            self.counters.embeddings_extracted += 1;

            // The frame's first valid box is its primary subject.
            if first.is_none() {
                first = Some(embedding.clone());
            }
            frame_set.push(embedding)?;
        }

        if let Some(embedding) = first {
            self.series.push(embedding)?;
        }
        if frame_set.len() >= 2 {
            self.frame_sets.push(frame_set);
        }
        Ok(())
    }

    /// Pull frames from a source until it is exhausted or the iteration
    /// bound is reached.
    pub fn run(&mut self, source: &mut FileSource) -> Result<()> {
        while let Some(frame) = source.next_frame()? {
            self.process_frame(&frame)?;
            if let Some(limit) = self.config.max_frames {
                if self.counters.frames_processed >= limit {
                    log::info!("pipeline: stopping at iteration bound {}", limit);
                    break;
                }
            }
        }
        log::info!(
            "pipeline: {} frames processed, {} embeddings, {} frames without boxes",
            self.counters.frames_processed,
            self.counters.embeddings_extracted,
            self.counters.frames_without_boxes
        );
        Ok(())
    }

    /// Run both evaluators over the accumulated buffers.
    pub fn finish(self) -> PipelineReport {
        PipelineReport {
            stability: eval::stability::evaluate(&self.series),
            discriminability: eval::discrim::evaluate(&self.frame_sets),
            counters: self.counters,
        }
    }
}
