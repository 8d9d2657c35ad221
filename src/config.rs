//! Run configuration.
//!
//! Loaded once at startup: defaults, then an optional JSON config file, then
//! environment overrides, then validation. Nothing here is mutated after
//! construction; components receive their settings by value.

use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;

use crate::detect::{DetectorConfig, DEFAULT_CANVAS_SIZE, DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_IOU_THRESHOLD, PERSON_CLASS};
use crate::feature::{ExtractorConfig, DEFAULT_INPUT_HEIGHT, DEFAULT_INPUT_WIDTH};
use crate::infer::Device;
use crate::pipeline::{PipelineConfig, DEFAULT_MAX_PEOPLE_PER_FRAME};

const DEFAULT_TARGET_FPS: u32 = 1;
const DEFAULT_DETECTOR_MODEL: &str = "model/yolo12n.onnx";
const DEFAULT_EXTRACTOR_MODEL: &str = "model/osnet_x1_0.onnx";

#[derive(Debug, Deserialize, Default)]
struct ProbeConfigFile {
    video: Option<VideoConfigFile>,
    detector: Option<DetectorConfigFile>,
    extractor: Option<ExtractorConfigFile>,
    device: Option<String>,
    pipeline: Option<PipelineConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct VideoConfigFile {
    path: Option<String>,
    target_fps: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    model: Option<String>,
    canvas_width: Option<u32>,
    canvas_height: Option<u32>,
    confidence_threshold: Option<f32>,
    iou_threshold: Option<f32>,
    target_class: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct ExtractorConfigFile {
    model: Option<String>,
    input_width: Option<u32>,
    input_height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct PipelineConfigFile {
    max_people_per_frame: Option<usize>,
    max_frames: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub video_path: String,
    pub target_fps: u32,
    pub detector_model: String,
    pub extractor_model: String,
    pub detector: DetectorConfig,
    pub extractor: ExtractorConfig,
    pub device: Device,
    pub pipeline: PipelineConfig,
}

impl ProbeConfig {
    /// Load from the file named by `REID_PROBE_CONFIG` (if set), then apply
    /// environment overrides and validate.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("REID_PROBE_CONFIG").ok();
        Self::load_from(config_path.as_deref().map(Path::new))
    }

    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => read_config_file(path)?,
            None => ProbeConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg)?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ProbeConfigFile) -> Result<Self> {
        let video = file.video.unwrap_or_default();
        let detector_file = file.detector.unwrap_or_default();
        let extractor_file = file.extractor.unwrap_or_default();
        let pipeline_file = file.pipeline.unwrap_or_default();

        let detector = DetectorConfig {
            canvas_width: detector_file.canvas_width.unwrap_or(DEFAULT_CANVAS_SIZE),
            canvas_height: detector_file.canvas_height.unwrap_or(DEFAULT_CANVAS_SIZE),
            confidence_threshold: detector_file
                .confidence_threshold
                .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD),
            iou_threshold: detector_file.iou_threshold.unwrap_or(DEFAULT_IOU_THRESHOLD),
            target_class: detector_file.target_class.unwrap_or(PERSON_CLASS),
        };
        let extractor = ExtractorConfig {
            input_width: extractor_file.input_width.unwrap_or(DEFAULT_INPUT_WIDTH),
            input_height: extractor_file.input_height.unwrap_or(DEFAULT_INPUT_HEIGHT),
            ..ExtractorConfig::default()
        };
        let pipeline = PipelineConfig {
            max_people_per_frame: pipeline_file
                .max_people_per_frame
                .unwrap_or(DEFAULT_MAX_PEOPLE_PER_FRAME),
            max_frames: pipeline_file.max_frames,
        };
        let device = match file.device.as_deref() {
            Some(value) => parse_device(value)?,
            None => Device::Cpu,
        };

        Ok(Self {
            video_path: video.path.unwrap_or_default(),
            target_fps: video.target_fps.unwrap_or(DEFAULT_TARGET_FPS),
            detector_model: detector_file
                .model
                .unwrap_or_else(|| DEFAULT_DETECTOR_MODEL.to_string()),
            extractor_model: extractor_file
                .model
                .unwrap_or_else(|| DEFAULT_EXTRACTOR_MODEL.to_string()),
            detector,
            extractor,
            device,
            pipeline,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("REID_PROBE_VIDEO") {
            if !path.trim().is_empty() {
                self.video_path = path;
            }
        }
        if let Ok(fps) = std::env::var("REID_PROBE_FPS") {
            let fps: u32 = fps
                .parse()
                .map_err(|_| anyhow!("REID_PROBE_FPS must be an integer frame rate"))?;
            self.target_fps = fps;
        }
        if let Ok(device) = std::env::var("REID_PROBE_DEVICE") {
            if !device.trim().is_empty() {
                self.device = parse_device(&device)?;
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.target_fps == 0 {
            return Err(anyhow!("target fps must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.detector.confidence_threshold) {
            return Err(anyhow!("confidence threshold must be in [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.detector.iou_threshold) {
            return Err(anyhow!("IoU threshold must be in [0, 1]"));
        }
        if self.detector.canvas_width == 0 || self.detector.canvas_height == 0 {
            return Err(anyhow!("detector canvas must have non-zero area"));
        }
        if self.extractor.input_width == 0 || self.extractor.input_height == 0 {
            return Err(anyhow!("extractor input must have non-zero area"));
        }
        if self.pipeline.max_people_per_frame == 0 {
            return Err(anyhow!("max people per frame must be at least 1"));
        }
        Ok(())
    }
}

/// Parse a device selector: `cpu`, `cuda`, or `cuda:<index>`.
pub fn parse_device(value: &str) -> Result<Device> {
    let value = value.trim().to_lowercase();
    if value == "cpu" {
        return Ok(Device::Cpu);
    }
    if value == "cuda" {
        return Ok(Device::Cuda { device_index: 0 });
    }
    if let Some(index) = value.strip_prefix("cuda:") {
        let device_index: u32 = index
            .parse()
            .map_err(|_| anyhow!("invalid CUDA device index '{}'", index))?;
        return Ok(Device::Cuda { device_index });
    }
    Err(anyhow!("unknown device '{}', expected cpu or cuda[:N]", value))
}

fn read_config_file(path: &Path) -> Result<ProbeConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
