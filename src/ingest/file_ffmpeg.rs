//! FFmpeg-backed local file decoder.
//!
//! Frames are decoded in-memory, converted to packed RGB24, and decimated to
//! the configured sampling rate before they leave this module.

use anyhow::{Context, Result};
use ffmpeg_next as ffmpeg;

use super::file::{FileConfig, FileStats};
use super::sampling_stride;
use crate::frame::Frame;

pub(crate) struct FfmpegFileSource {
    config: FileConfig,
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    stride: u64,
    decoded: u64,
    yielded: u64,
    eof_sent: bool,
}

impl FfmpegFileSource {
    pub(crate) fn new(config: FileConfig) -> Result<Self> {
        ffmpeg::init().context("initialize ffmpeg")?;
        let input = ffmpeg::format::input(&config.path)
            .with_context(|| format!("failed to open video file '{}'", config.path))?;
        let input_stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| anyhow::anyhow!("file has no video track"))?;
        let stream_index = input_stream.index();

        let rate = input_stream.avg_frame_rate();
        let native_fps = if rate.denominator() > 0 {
            rate.numerator() as f64 / rate.denominator() as f64
        } else {
            0.0
        };
        let stride = sampling_stride(native_fps, config.target_fps);

        let context = ffmpeg::codec::context::Context::from_parameters(input_stream.parameters())
            .context("load video decoder parameters")?;
        let decoder = context
            .decoder()
            .video()
            .context("open ffmpeg video decoder")?;

        let scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::util::format::pixel::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .context("create ffmpeg scaler")?;

        log::info!(
            "FileSource: opened {} (ffmpeg, native {:.2} fps, stride {})",
            config.path,
            native_fps,
            stride
        );

        Ok(Self {
            config,
            input,
            stream_index,
            decoder,
            scaler,
            stride,
            decoded: 0,
            yielded: 0,
            eof_sent: false,
        })
    }

    pub(crate) fn next_frame(&mut self) -> Result<Option<Frame>> {
        let mut decoded = ffmpeg::frame::Video::empty();
        let mut rgb_frame = ffmpeg::frame::Video::empty();

        if !self.eof_sent {
            for (stream, packet) in self.input.packets() {
                if stream.index() != self.stream_index {
                    continue;
                }

                self.decoder
                    .send_packet(&packet)
                    .context("send packet to ffmpeg decoder")?;

                while self.decoder.receive_frame(&mut decoded).is_ok() {
                    if let Some(frame) = sample_frame(
                        self.stride,
                        &mut self.decoded,
                        &mut self.yielded,
                        &mut self.scaler,
                        &decoded,
                        &mut rgb_frame,
                    )? {
                        return Ok(Some(frame));
                    }
                }
            }

            // End of stream: flush frames still buffered inside the decoder.
            self.eof_sent = true;
            self.decoder.send_eof().context("flush ffmpeg decoder")?;
        }

        while self.decoder.receive_frame(&mut decoded).is_ok() {
            if let Some(frame) = sample_frame(
                self.stride,
                &mut self.decoded,
                &mut self.yielded,
                &mut self.scaler,
                &decoded,
                &mut rgb_frame,
            )? {
                return Ok(Some(frame));
            }
        }

        Ok(None)
    }

    pub(crate) fn stats(&self) -> FileStats {
        FileStats {
            frames_decoded: self.decoded,
            frames_yielded: self.yielded,
            path: self.config.path.clone(),
        }
    }
}

/// Apply stride decimation to one decoded frame.
///
/// Takes fields individually so the caller can hold the packet iterator
/// (a mutable borrow of the input context) at the same time.
fn sample_frame(
    stride: u64,
    decoded_count: &mut u64,
    yielded: &mut u64,
    scaler: &mut ffmpeg::software::scaling::Context,
    decoded: &ffmpeg::frame::Video,
    rgb_frame: &mut ffmpeg::frame::Video,
) -> Result<Option<Frame>> {
    let index = *decoded_count;
    *decoded_count += 1;
    if index % stride != 0 {
        return Ok(None);
    }

    scaler
        .run(decoded, rgb_frame)
        .context("scale frame to RGB")?;
    *yielded += 1;
    Ok(Some(frame_from_rgb(rgb_frame)?))
}

fn frame_from_rgb(frame: &ffmpeg::frame::Video) -> Result<Frame> {
    let width = frame.width();
    let height = frame.height();
    let row_bytes = (width as usize) * 3;
    let stride = frame.stride(0);
    let data = frame.data(0);

    if stride == row_bytes {
        return Frame::new(data.to_vec(), width, height);
    }

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let end = start + row_bytes;
        pixels.extend_from_slice(
            data.get(start..end)
                .context("ffmpeg frame row is out of bounds")?,
        );
    }

    Frame::new(pixels, width, height)
}
