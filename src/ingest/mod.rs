//! Frame ingestion sources.
//!
//! A source yields a lazy, finite, non-restartable sequence of RGB frames
//! sampled from a video at a target rate:
//! - local video files (feature: ingest-file-ffmpeg)
//! - synthetic `stub://` sources (always available, used by tests)
//!
//! Sampling is stride-based: the source's native frame rate divided by the
//! target rate decides how many decoded frames are skipped per yielded frame.

pub mod file;
#[cfg(feature = "ingest-file-ffmpeg")]
pub(crate) mod file_ffmpeg;

pub use file::{FileConfig, FileSource, FileStats};

/// Frame-skip stride for decimating a native frame rate down to a target
/// rate. Truncating division, minimum 1: a target rate at or above the
/// native rate yields every frame.
pub(crate) fn sampling_stride(native_fps: f64, target_fps: u32) -> u64 {
    if target_fps == 0 || native_fps <= 0.0 {
        return 1;
    }
    ((native_fps / target_fps as f64) as u64).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_equal_to_native_yields_every_frame() {
        assert_eq!(sampling_stride(30.0, 30), 1);
    }

    #[test]
    fn target_above_native_still_yields_every_frame() {
        assert_eq!(sampling_stride(24.0, 60), 1);
    }

    #[test]
    fn stride_truncates_like_integer_division() {
        assert_eq!(sampling_stride(30.0, 1), 30);
        assert_eq!(sampling_stride(29.97, 10), 2);
        assert_eq!(sampling_stride(25.0, 10), 2);
    }

    #[test]
    fn degenerate_rates_fall_back_to_stride_one() {
        assert_eq!(sampling_stride(0.0, 10), 1);
        assert_eq!(sampling_stride(-1.0, 10), 1);
        assert_eq!(sampling_stride(30.0, 0), 1);
    }
}
