//! reid-probe
//!
//! Per-frame visual perception pipeline for probing appearance-embedding
//! quality: a letterbox-preprocessed person detector with greedy NMS, an
//! L2-normalized feature extractor, and offline evaluators that score how
//! stable one subject's embeddings are over time and how separable
//! co-occurring subjects are within a frame.
//!
//! # Module structure
//!
//! - `frame`: dense RGB frame buffer (crop, resize)
//! - `letterbox`: scale-and-pad geometry shared by detector pre/postprocess
//! - `detect`: boxes, IoU, NMS, and the detector itself
//! - `infer`: opaque tensor-in/tensor-out backend boundary
//! - `feature`: embedding extraction
//! - `eval`: stability and discriminability statistics
//! - `ingest`: sampled video frame sources
//! - `pipeline`: the sequential driving loop
//!
//! The inference engine and video decoder are external collaborators behind
//! `infer::InferenceBackend` and `ingest::FileSource`; heavy implementations
//! are feature-gated (`backend-tract`, `ingest-file-ffmpeg`).

pub mod config;
pub mod detect;
pub mod eval;
pub mod feature;
pub mod frame;
pub mod infer;
pub mod ingest;
pub mod letterbox;
pub mod pipeline;

pub use config::{parse_device, ProbeConfig};
pub use detect::{iou, non_max_suppression, BBox, Detector, DetectorConfig};
pub use eval::{
    DiscriminabilityReport, EmbeddingSeries, FrameEmbeddingSet, StabilityReport,
};
pub use feature::{Embedding, ExtractorConfig, FeatureExtractor};
pub use frame::Frame;
#[cfg(feature = "backend-tract")]
pub use infer::TractBackend;
pub use infer::{Device, InferenceBackend, StubBackend, TensorMeta};
pub use ingest::{FileConfig, FileSource};
pub use letterbox::Letterbox;
pub use pipeline::{Pipeline, PipelineConfig, PipelineCounters, PipelineReport};
