//! Local file frame source.
//!
//! `FileSource` reads frames from a local video file and decimates them to a
//! target sampling rate. `stub://` paths select a deterministic synthetic
//! backend so the pipeline can run without a decoder or a real video.
//!
//! The sequence is one-shot and forward-only: `next_frame` returns `None`
//! once the file is exhausted and the source cannot be rewound.

use anyhow::{anyhow, Result};

use super::sampling_stride;
#[cfg(feature = "ingest-file-ffmpeg")]
use super::file_ffmpeg::FfmpegFileSource;
use crate::frame::Frame;

/// Configuration for a local file source.
#[derive(Clone, Debug)]
pub struct FileConfig {
    /// Local file path (e.g., "/var/lib/probe/video.mp4") or `stub://name`.
    pub path: String,
    /// Target sampling rate in frames per second.
    pub target_fps: u32,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            target_fps: 1,
        }
    }
}

/// Local file frame source.
pub struct FileSource {
    backend: FileBackend,
}

enum FileBackend {
    Synthetic(SyntheticFileSource),
    #[cfg(feature = "ingest-file-ffmpeg")]
    Ffmpeg(FfmpegFileSource),
}

impl FileSource {
    /// Open a source. Unopenable videos, URL schemes, and a zero target rate
    /// are configuration errors surfaced here, not later in the loop.
    pub fn new(config: FileConfig) -> Result<Self> {
        if config.target_fps == 0 {
            return Err(anyhow!("target fps must be at least 1"));
        }
        if !is_local_file_path(&config.path) {
            return Err(anyhow!(
                "file ingestion only supports local paths (no URL schemes)"
            ));
        }
        if config.path.starts_with("stub://") {
            Ok(Self {
                backend: FileBackend::Synthetic(SyntheticFileSource::new(config)),
            })
        } else {
            #[cfg(feature = "ingest-file-ffmpeg")]
            {
                Ok(Self {
                    backend: FileBackend::Ffmpeg(FfmpegFileSource::new(config)?),
                })
            }
            #[cfg(not(feature = "ingest-file-ffmpeg"))]
            {
                Err(anyhow!(
                    "file ingestion requires the ingest-file-ffmpeg feature"
                ))
            }
        }
    }

    /// Next sampled frame, or `None` when the source is exhausted.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        match &mut self.backend {
            FileBackend::Synthetic(source) => source.next_frame(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.next_frame(),
        }
    }

    /// Get frame statistics.
    pub fn stats(&self) -> FileStats {
        match &self.backend {
            FileBackend::Synthetic(source) => source.stats(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.stats(),
        }
    }
}

/// Statistics for a file source.
#[derive(Clone, Debug)]
pub struct FileStats {
    pub frames_decoded: u64,
    pub frames_yielded: u64,
    pub path: String,
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://) for tests
// ----------------------------------------------------------------------------

const SYNTHETIC_WIDTH: u32 = 64;
const SYNTHETIC_HEIGHT: u32 = 48;
const SYNTHETIC_NATIVE_FPS: f64 = 30.0;
/// Ten simulated seconds of footage, so batch runs terminate.
const SYNTHETIC_FRAME_COUNT: u64 = 300;

struct SyntheticFileSource {
    config: FileConfig,
    stride: u64,
    decoded: u64,
    yielded: u64,
    scene_state: u8,
}

impl SyntheticFileSource {
    fn new(config: FileConfig) -> Self {
        let stride = sampling_stride(SYNTHETIC_NATIVE_FPS, config.target_fps);
        log::info!(
            "FileSource: opened {} (synthetic, stride {})",
            config.path,
            stride
        );
        Self {
            config,
            stride,
            decoded: 0,
            yielded: 0,
            scene_state: 0,
        }
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        while self.decoded < SYNTHETIC_FRAME_COUNT {
            let index = self.decoded;
            self.decoded += 1;
            if index % 50 == 0 {
                self.scene_state = self.scene_state.wrapping_add(1);
            }
            if index % self.stride != 0 {
                continue;
            }

            self.yielded += 1;
            let pixel_count = (SYNTHETIC_WIDTH * SYNTHETIC_HEIGHT * 3) as usize;
            let mut pixels = vec![0u8; pixel_count];
            for (i, pixel) in pixels.iter_mut().enumerate() {
                *pixel = ((i as u64 + index + self.scene_state as u64) % 256) as u8;
            }
            return Ok(Some(Frame::new(pixels, SYNTHETIC_WIDTH, SYNTHETIC_HEIGHT)?));
        }
        Ok(None)
    }

    fn stats(&self) -> FileStats {
        FileStats {
            frames_decoded: self.decoded,
            frames_yielded: self.yielded,
            path: self.config.path.clone(),
        }
    }
}

fn is_local_file_path(path: &str) -> bool {
    if path.trim().is_empty() {
        return false;
    }
    if path.starts_with("stub://") {
        return true;
    }
    !path.contains("://")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stub_config(target_fps: u32) -> FileConfig {
        FileConfig {
            path: "stub://camera".to_string(),
            target_fps,
        }
    }

    fn drain(source: &mut FileSource) -> u64 {
        let mut yielded = 0;
        while let Some(frame) = source.next_frame().unwrap() {
            assert_eq!((frame.width, frame.height), (64, 48));
            yielded += 1;
        }
        yielded
    }

    #[test]
    fn construction_rejects_bad_config() {
        assert!(FileSource::new(FileConfig::default()).is_err()); // empty path
        assert!(FileSource::new(FileConfig {
            path: "rtsp://camera/stream".to_string(),
            target_fps: 1,
        })
        .is_err());
        assert!(FileSource::new(FileConfig {
            path: "stub://camera".to_string(),
            target_fps: 0,
        })
        .is_err());
    }

    #[test]
    fn target_at_native_rate_yields_every_frame() {
        let mut source = FileSource::new(stub_config(30)).unwrap();
        assert_eq!(drain(&mut source), 300);
        let stats = source.stats();
        assert_eq!(stats.frames_decoded, 300);
        assert_eq!(stats.frames_yielded, 300);
    }

    #[test]
    fn one_fps_decimates_thirty_to_one() {
        let mut source = FileSource::new(stub_config(1)).unwrap();
        assert_eq!(drain(&mut source), 10);
    }

    #[test]
    fn source_is_exhausted_not_restartable() {
        let mut source = FileSource::new(stub_config(30)).unwrap();
        drain(&mut source);
        assert!(source.next_frame().unwrap().is_none());
        assert!(source.next_frame().unwrap().is_none());
    }
}
