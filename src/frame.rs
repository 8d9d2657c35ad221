//! Dense RGB frame buffer.
//!
//! A `Frame` is a packed RGB24 image with explicit dimensions. Frames are
//! produced by the ingestion layer, handed to the pipeline for one iteration,
//! and never retained across iterations.

use anyhow::{anyhow, Result};
use image::{imageops, RgbImage};

pub use image::imageops::FilterType;

use crate::detect::BBox;

/// Packed RGB24 image buffer.
#[derive(Clone, Debug)]
pub struct Frame {
    pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Frame {
    /// Create a frame from packed RGB24 bytes. The buffer length must be
    /// exactly `width * height * 3`.
    pub fn new(pixels: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if pixels.len() != expected {
            return Err(anyhow!(
                "RGB frame length mismatch: expected {}, got {}",
                expected,
                pixels.len()
            ));
        }
        Ok(Self {
            pixels,
            width,
            height,
        })
    }

    /// Frame filled with a single byte value (used for letterbox padding and
    /// synthetic sources).
    pub fn filled(width: u32, height: u32, value: u8) -> Result<Self> {
        let len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        Ok(Self {
            pixels: vec![value; len],
            width,
            height,
        })
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub(crate) fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    /// Zero-area frames are degenerate inputs everywhere downstream.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Crop the sub-rectangle covered by an image-space box.
    ///
    /// Coordinates are clamped to the frame, then truncated to integers the
    /// same way the reference pipeline slices its arrays. Returns `None` when
    /// the clamped region has zero area.
    pub fn crop(&self, bbox: &BBox) -> Option<Frame> {
        let w = self.width as f32;
        let h = self.height as f32;

        let x1 = bbox.x.clamp(0.0, (w - 1.0).max(0.0)) as u32;
        let y1 = bbox.y.clamp(0.0, (h - 1.0).max(0.0)) as u32;
        let x2 = (bbox.x + bbox.w).clamp(0.0, w) as u32;
        let y2 = (bbox.y + bbox.h).clamp(0.0, h) as u32;

        if x2 <= x1 || y2 <= y1 {
            return None;
        }

        let crop_w = x2 - x1;
        let crop_h = y2 - y1;
        let row_bytes = (crop_w as usize) * 3;
        let stride = (self.width as usize) * 3;

        let mut pixels = Vec::with_capacity(row_bytes * crop_h as usize);
        for row in y1..y2 {
            let start = (row as usize) * stride + (x1 as usize) * 3;
            pixels.extend_from_slice(&self.pixels[start..start + row_bytes]);
        }

        Some(Frame {
            pixels,
            width: crop_w,
            height: crop_h,
        })
    }

    /// Resize to the given dimensions with independent x/y scaling.
    pub fn resize(&self, width: u32, height: u32, filter: FilterType) -> Result<Frame> {
        if self.is_empty() || width == 0 || height == 0 {
            return Err(anyhow!("cannot resize an empty frame"));
        }
        let img = RgbImage::from_raw(self.width, self.height, self.pixels.clone())
            .ok_or_else(|| anyhow!("frame buffer does not match its dimensions"))?;
        let resized = imageops::resize(&img, width, height, filter);
        Ok(Frame {
            pixels: resized.into_raw(),
            width,
            height,
        })
    }

    /// Read one pixel as normalized `[0,1]` channels. Caller guarantees the
    /// coordinates are in bounds.
    pub(crate) fn pixel_f32(&self, x: u32, y: u32) -> [f32; 3] {
        let offset = ((y as usize) * (self.width as usize) + x as usize) * 3;
        [
            self.pixels[offset] as f32 / 255.0,
            self.pixels[offset + 1] as f32 / 255.0,
            self.pixels[offset + 2] as f32 / 255.0,
        ]
    }
}
