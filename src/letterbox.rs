//! Letterbox geometry.
//!
//! Maps an arbitrary-size image onto a fixed canvas by aspect-preserving
//! scale plus centered padding, and maps detection boxes back from canvas
//! space to image space. Both the detector preprocess and its postprocess
//! share one `Letterbox` instance so the two directions cannot drift.

use anyhow::{anyhow, Result};

use crate::detect::BBox;
use crate::frame::{FilterType, Frame};

/// Fill value for canvas pixels outside the pasted region.
const PAD_VALUE: u8 = 0;

/// Scale-and-pad transform between one image size and one canvas size.
#[derive(Clone, Copy, Debug)]
pub struct Letterbox {
    scale: f32,
    x_off: u32,
    y_off: u32,
    new_w: u32,
    new_h: u32,
    img_w: u32,
    img_h: u32,
    canvas_w: u32,
    canvas_h: u32,
}

impl Letterbox {
    pub fn new(img_w: u32, img_h: u32, canvas_w: u32, canvas_h: u32) -> Result<Self> {
        if img_w == 0 || img_h == 0 {
            return Err(anyhow!("letterbox source image has zero area"));
        }
        if canvas_w == 0 || canvas_h == 0 {
            return Err(anyhow!("letterbox canvas has zero area"));
        }

        let scale = (canvas_h as f32 / img_h as f32).min(canvas_w as f32 / img_w as f32);
        let new_w = (img_w as f32 * scale).round() as u32;
        let new_h = (img_h as f32 * scale).round() as u32;

        Ok(Self {
            scale,
            x_off: (canvas_w - new_w.min(canvas_w)) / 2,
            y_off: (canvas_h - new_h.min(canvas_h)) / 2,
            new_w,
            new_h,
            img_w,
            img_h,
            canvas_w,
            canvas_h,
        })
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn offsets(&self) -> (u32, u32) {
        (self.x_off, self.y_off)
    }

    /// Resize the frame and paste it centered on a zero-filled canvas.
    pub fn canvas(&self, frame: &Frame) -> Result<Frame> {
        if frame.width != self.img_w || frame.height != self.img_h {
            return Err(anyhow!(
                "frame size {}x{} does not match letterbox source {}x{}",
                frame.width,
                frame.height,
                self.img_w,
                self.img_h
            ));
        }

        let resized = frame.resize(self.new_w, self.new_h, FilterType::Lanczos3)?;
        let mut canvas = Frame::filled(self.canvas_w, self.canvas_h, PAD_VALUE)?;

        let canvas_stride = (self.canvas_w as usize) * 3;
        let row_bytes = (self.new_w as usize) * 3;
        let src = resized.pixels();
        let dst = canvas.pixels_mut();
        for row in 0..self.new_h as usize {
            let dst_start =
                (row + self.y_off as usize) * canvas_stride + (self.x_off as usize) * 3;
            let src_start = row * row_bytes;
            dst[dst_start..dst_start + row_bytes]
                .copy_from_slice(&src[src_start..src_start + row_bytes]);
        }

        Ok(canvas)
    }

    /// Forward point map, image space to canvas space.
    pub fn to_canvas_point(&self, px: f32, py: f32) -> (f32, f32) {
        (
            px * self.scale + self.x_off as f32,
            py * self.scale + self.y_off as f32,
        )
    }

    /// Forward box map, image space to canvas space.
    pub fn to_canvas_box(&self, bbox: &BBox) -> BBox {
        let (x, y) = self.to_canvas_point(bbox.x, bbox.y);
        BBox {
            x,
            y,
            w: bbox.w * self.scale,
            h: bbox.h * self.scale,
            class_index: bbox.class_index,
            confidence: bbox.confidence,
        }
    }

    /// Inverse box map, canvas space to image space.
    ///
    /// Results are clamped into the image so a box can never reference pixels
    /// outside the original frame.
    pub fn to_image_box(&self, bbox: &BBox) -> BBox {
        let img_w = self.img_w as f32;
        let img_h = self.img_h as f32;

        let x = ((bbox.x - self.x_off as f32) / self.scale).clamp(0.0, (img_w - 1.0).max(0.0));
        let y = ((bbox.y - self.y_off as f32) / self.scale).clamp(0.0, (img_h - 1.0).max(0.0));
        let w = (bbox.w / self.scale).clamp(0.0, img_w - x);
        let h = (bbox.h / self.scale).clamp(0.0, img_h - y);

        BBox {
            x,
            y,
            w,
            h,
            class_index: bbox.class_index,
            confidence: bbox.confidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(x: f32, y: f32, w: f32, h: f32) -> BBox {
        BBox {
            x,
            y,
            w,
            h,
            class_index: 0,
            confidence: 0.9,
        }
    }

    #[test]
    fn geometry_for_wide_image() {
        // 1280x720 into 640x640: scale 0.5, 640x360 pasted at y offset 140.
        let lb = Letterbox::new(1280, 720, 640, 640).unwrap();
        assert!((lb.scale() - 0.5).abs() < 1e-6);
        assert_eq!(lb.offsets(), (0, 140));
    }

    #[test]
    fn geometry_for_tall_image() {
        let lb = Letterbox::new(360, 640, 640, 640).unwrap();
        assert!((lb.scale() - 1.0).abs() < 1e-6);
        assert_eq!(lb.offsets(), (140, 0));
    }

    #[test]
    fn zero_area_source_is_rejected() {
        assert!(Letterbox::new(0, 720, 640, 640).is_err());
        assert!(Letterbox::new(1280, 720, 0, 640).is_err());
    }

    #[test]
    fn canvas_pads_outside_with_zero() {
        let frame = Frame::filled(4, 2, 200).unwrap();
        let lb = Letterbox::new(4, 2, 8, 8).unwrap();
        let canvas = lb.canvas(&frame).unwrap();
        assert_eq!((canvas.width, canvas.height), (8, 8));
        // Top row is padding, middle rows carry the pasted image.
        assert_eq!(canvas.pixels()[0], 0);
        let (x_off, y_off) = lb.offsets();
        let offset = ((y_off as usize) * 8 + x_off as usize) * 3;
        assert_eq!(canvas.pixels()[offset], 200);
    }

    #[test]
    fn canvas_rejects_mismatched_frame() {
        let frame = Frame::filled(3, 3, 0).unwrap();
        let lb = Letterbox::new(4, 2, 8, 8).unwrap();
        assert!(lb.canvas(&frame).is_err());
    }

    #[test]
    fn box_round_trip_is_exact_within_tolerance() {
        let sizes = [(1280u32, 720u32), (720, 1280), (333, 517), (640, 640)];
        for (img_w, img_h) in sizes {
            let lb = Letterbox::new(img_w, img_h, 640, 640).unwrap();
            let original = bbox(17.5, 42.25, 120.0, 260.5);
            let mapped = lb.to_canvas_box(&original);
            let back = lb.to_image_box(&mapped);

            assert!((back.x - original.x).abs() < 1e-2, "{img_w}x{img_h}");
            assert!((back.y - original.y).abs() < 1e-2, "{img_w}x{img_h}");
            assert!((back.w - original.w).abs() < 1e-2, "{img_w}x{img_h}");
            assert!((back.h - original.h).abs() < 1e-2, "{img_w}x{img_h}");
        }
    }

    #[test]
    fn inverse_clamps_out_of_range_boxes() {
        let lb = Letterbox::new(100, 100, 640, 640).unwrap();
        // A canvas box reaching past the pasted region clamps into the image.
        let back = lb.to_image_box(&bbox(-50.0, -50.0, 10_000.0, 10_000.0));
        assert!(back.x >= 0.0 && back.y >= 0.0);
        assert!(back.x + back.w <= 100.0 + 1e-3);
        assert!(back.y + back.h <= 100.0 + 1e-3);
    }

    #[test]
    fn forward_point_map_applies_scale_then_offset() {
        let lb = Letterbox::new(1280, 720, 640, 640).unwrap();
        let (cx, cy) = lb.to_canvas_point(100.0, 100.0);
        assert!((cx - 50.0).abs() < 1e-4);
        assert!((cy - 190.0).abs() < 1e-4);
    }
}
