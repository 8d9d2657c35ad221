//! reid_probe - run the detection + embedding pipeline over a video and
//! report embedding stability and discriminability.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;

use reid_probe::{
    Detector, FeatureExtractor, FileConfig, FileSource, InferenceBackend, Pipeline, ProbeConfig,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Video file path, or stub://name for the synthetic source.
    #[arg(long, env = "REID_PROBE_VIDEO")]
    video: Option<String>,
    /// Sampling rate in frames per second.
    #[arg(long)]
    fps: Option<u32>,
    /// JSON config file.
    #[arg(long, env = "REID_PROBE_CONFIG")]
    config: Option<PathBuf>,
    /// Detector ONNX model path.
    #[arg(long)]
    detector_model: Option<String>,
    /// Extractor ONNX model path.
    #[arg(long)]
    extractor_model: Option<String>,
    /// Inference device: cpu or cuda[:N].
    #[arg(long, env = "REID_PROBE_DEVICE")]
    device: Option<String>,
    /// Stop after this many sampled frames.
    #[arg(long)]
    max_frames: Option<u64>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut cfg = ProbeConfig::load_from(args.config.as_deref())?;
    if let Some(video) = args.video {
        cfg.video_path = video;
    }
    if let Some(fps) = args.fps {
        cfg.target_fps = fps;
    }
    if let Some(model) = args.detector_model {
        cfg.detector_model = model;
    }
    if let Some(model) = args.extractor_model {
        cfg.extractor_model = model;
    }
    if let Some(device) = args.device.as_deref() {
        cfg.device = reid_probe::parse_device(device)?;
    }
    if args.max_frames.is_some() {
        cfg.pipeline.max_frames = args.max_frames;
    }
    cfg.validate()?;

    if cfg.video_path.trim().is_empty() {
        return Err(anyhow!("no video path given (use --video or a config file)"));
    }

    let mut source = FileSource::new(FileConfig {
        path: cfg.video_path.clone(),
        target_fps: cfg.target_fps,
    })?;

    let detector = Detector::new(
        build_backend(
            &cfg.detector_model,
            cfg.detector.canvas_width,
            cfg.detector.canvas_height,
            cfg.device,
        )?,
        cfg.detector,
    )?;
    let extractor = FeatureExtractor::new(
        build_backend(
            &cfg.extractor_model,
            cfg.extractor.input_width,
            cfg.extractor.input_height,
            cfg.device,
        )?,
        cfg.extractor,
    )?;

    let mut pipeline = Pipeline::new(detector, extractor, cfg.pipeline);
    pipeline.run(&mut source)?;

    let stats = source.stats();
    log::info!(
        "source {}: {} frames decoded, {} yielded",
        stats.path,
        stats.frames_decoded,
        stats.frames_yielded
    );

    let report = pipeline.finish();
    match &report.stability {
        Some(stability) => print!("{stability}"),
        None => println!("no stability statistics (fewer than 2 embeddings collected)"),
    }
    println!();
    match &report.discriminability {
        Some(discrim) => print!("{discrim}"),
        None => println!("no discriminability statistics (no frame with 2+ subjects)"),
    }
    println!();
    println!(
        "frames={} no-box-frames={} empty-crops={} embeddings={}",
        report.counters.frames_processed,
        report.counters.frames_without_boxes,
        report.counters.empty_crops,
        report.counters.embeddings_extracted
    );

    Ok(())
}

#[cfg(feature = "backend-tract")]
fn build_backend(
    model: &str,
    input_width: u32,
    input_height: u32,
    device: reid_probe::Device,
) -> Result<Box<dyn InferenceBackend>> {
    Ok(Box::new(reid_probe::TractBackend::new(
        model,
        input_width,
        input_height,
        device,
    )?))
}

#[cfg(not(feature = "backend-tract"))]
fn build_backend(
    _model: &str,
    _input_width: u32,
    _input_height: u32,
    _device: reid_probe::Device,
) -> Result<Box<dyn InferenceBackend>> {
    Err(anyhow!(
        "built without an inference backend; rebuild with --features backend-tract"
    ))
}
