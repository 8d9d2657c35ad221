//! Single-class object detector over an inference backend.

use anyhow::{anyhow, Result};
use ndarray::{Array4, ArrayD};

use crate::detect::{non_max_suppression, BBox};
use crate::frame::Frame;
use crate::infer::InferenceBackend;
use crate::letterbox::Letterbox;

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.25;
pub const DEFAULT_IOU_THRESHOLD: f32 = 0.7;
pub const DEFAULT_CANVAS_SIZE: u32 = 640;
/// COCO class 0 is "person".
pub const PERSON_CLASS: usize = 0;

/// Detector settings, fixed at construction.
#[derive(Clone, Copy, Debug)]
pub struct DetectorConfig {
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub target_class: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            canvas_width: DEFAULT_CANVAS_SIZE,
            canvas_height: DEFAULT_CANVAS_SIZE,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            target_class: PERSON_CLASS,
        }
    }
}

/// Letterbox-preprocessed detector.
///
/// One inference call per frame; the raw `[1, C, N]` head output is decoded
/// into corner-based boxes, filtered to the target class and confidence
/// threshold, and de-duplicated with greedy NMS.
pub struct Detector {
    backend: Box<dyn InferenceBackend>,
    config: DetectorConfig,
    input_name: String,
    output_name: String,
}

impl Detector {
    pub fn new(backend: Box<dyn InferenceBackend>, config: DetectorConfig) -> Result<Self> {
        let input_name = backend
            .inputs()
            .first()
            .map(|meta| meta.name.clone())
            .ok_or_else(|| anyhow!("detector backend declares no inputs"))?;
        let output_name = backend
            .outputs()
            .first()
            .map(|meta| meta.name.clone())
            .ok_or_else(|| anyhow!("detector backend declares no outputs"))?;
        Ok(Self {
            backend,
            config,
            input_name,
            output_name,
        })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Detect boxes in canvas coordinate space.
    pub fn detect(&mut self, frame: &Frame) -> Result<Vec<BBox>> {
        let letterbox = self.letterbox_for(frame)?;
        self.detect_on_canvas(frame, &letterbox)
    }

    /// Detect boxes and remap them into original-image coordinate space.
    pub fn detect_in_image(&mut self, frame: &Frame) -> Result<Vec<BBox>> {
        let letterbox = self.letterbox_for(frame)?;
        let boxes = self.detect_on_canvas(frame, &letterbox)?;
        Ok(boxes
            .iter()
            .map(|bbox| letterbox.to_image_box(bbox))
            .collect())
    }

    fn letterbox_for(&self, frame: &Frame) -> Result<Letterbox> {
        Letterbox::new(
            frame.width,
            frame.height,
            self.config.canvas_width,
            self.config.canvas_height,
        )
    }

    fn detect_on_canvas(&mut self, frame: &Frame, letterbox: &Letterbox) -> Result<Vec<BBox>> {
        let canvas = letterbox.canvas(frame)?;
        let tensor = canvas_tensor(&canvas);

        let outputs = self
            .backend
            .run(&[&self.output_name], &[(&self.input_name, tensor)])?;
        if outputs.len() != 1 {
            return Err(anyhow!(
                "detector backend returned {} tensors, expected exactly 1",
                outputs.len()
            ));
        }

        let candidates = self.decode(&outputs[0])?;
        let kept = non_max_suppression(candidates, self.config.iou_threshold);
        log::debug!(
            "detector: {} boxes after suppression ({}x{} frame)",
            kept.len(),
            frame.width,
            frame.height
        );
        Ok(kept)
    }

    /// Decode a raw `[1, C, N]` head output.
    ///
    /// Per candidate column: 4 center-based geometry values then `C - 4`
    /// class scores. The center-to-corner conversion happens here and only
    /// here; every `BBox` leaving this function is corner-based.
    fn decode(&self, output: &ArrayD<f32>) -> Result<Vec<BBox>> {
        let shape = output.shape();
        if shape.len() != 3 || shape[0] != 1 {
            return Err(anyhow!(
                "detector output has shape {:?}, expected [1, C, N]",
                shape
            ));
        }
        let channels = shape[1];
        if channels < 5 {
            return Err(anyhow!(
                "detector output has {} channels, expected 4 + classes",
                channels
            ));
        }
        let candidates = shape[2];

        let mut boxes = Vec::new();
        for n in 0..candidates {
            let mut class_index = 0;
            let mut confidence = f32::NEG_INFINITY;
            for class in 0..channels - 4 {
                let score = output[[0, 4 + class, n]];
                if score > confidence {
                    confidence = score;
                    class_index = class;
                }
            }
            if class_index != self.config.target_class
                || confidence < self.config.confidence_threshold
            {
                continue;
            }

            let cx = output[[0, 0, n]];
            let cy = output[[0, 1, n]];
            let w = output[[0, 2, n]];
            let h = output[[0, 3, n]];
            boxes.push(BBox {
                x: cx - w / 2.0,
                y: cy - h / 2.0,
                w,
                h,
                class_index,
                confidence,
            });
        }
        Ok(boxes)
    }
}

/// Pack a canvas frame into a `[1, 3, H, W]` tensor scaled to `[0, 1]`.
fn canvas_tensor(canvas: &Frame) -> ArrayD<f32> {
    Array4::from_shape_fn(
        (1, 3, canvas.height as usize, canvas.width as usize),
        |(_, channel, y, x)| canvas.pixel_f32(x as u32, y as u32)[channel],
    )
    .into_dyn()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infer::StubBackend;
    use ndarray::IxDyn;

    const CANVAS: u32 = 8;

    fn small_config() -> DetectorConfig {
        DetectorConfig {
            canvas_width: CANVAS,
            canvas_height: CANVAS,
            ..DetectorConfig::default()
        }
    }

    /// `[1, 6, N]` head output (4 geometry rows + 2 class rows).
    fn head_output(candidates: &[[f32; 6]]) -> ArrayD<f32> {
        let n = candidates.len();
        let mut out = ArrayD::zeros(IxDyn(&[1, 6, n]));
        for (i, candidate) in candidates.iter().enumerate() {
            for (c, value) in candidate.iter().enumerate() {
                out[[0, c, i]] = *value;
            }
        }
        out
    }

    fn detector_with(output: ArrayD<f32>) -> Detector {
        let backend = StubBackend::new("images", "output0").with_response(vec![output]);
        Detector::new(Box::new(backend), small_config()).unwrap()
    }

    #[test]
    fn decode_filters_class_and_confidence() {
        // cx, cy, w, h, person score, other score
        let output = head_output(&[
            [4.0, 4.0, 2.0, 2.0, 0.9, 0.1], // kept
            [4.0, 4.0, 2.0, 2.0, 0.3, 0.8], // wrong class
            [2.0, 2.0, 2.0, 2.0, 0.1, 0.05], // below threshold
        ]);
        let mut detector = detector_with(output);
        let frame = Frame::filled(CANVAS, CANVAS, 128).unwrap();

        let boxes = detector.detect(&frame).unwrap();
        assert_eq!(boxes.len(), 1);
        let kept = &boxes[0];
        assert_eq!(kept.class_index, PERSON_CLASS);
        assert!((kept.x - 3.0).abs() < 1e-6);
        assert!((kept.y - 3.0).abs() < 1e-6);
        assert!((kept.confidence - 0.9).abs() < 1e-6);
    }

    #[test]
    fn nms_runs_on_decoded_boxes() {
        // Two heavily overlapping person candidates; only the stronger stays.
        let output = head_output(&[
            [4.0, 4.0, 4.0, 4.0, 0.9, 0.0],
            [4.2, 4.2, 4.0, 4.0, 0.5, 0.0],
        ]);
        let mut detector = detector_with(output);
        let frame = Frame::filled(CANVAS, CANVAS, 128).unwrap();

        let boxes = detector.detect(&frame).unwrap();
        assert_eq!(boxes.len(), 1);
        assert!((boxes[0].confidence - 0.9).abs() < 1e-6);
    }

    #[test]
    fn empty_result_is_not_an_error() {
        let output = ArrayD::zeros(IxDyn(&[1, 6, 0]));
        let mut detector = detector_with(output);
        let frame = Frame::filled(CANVAS, CANVAS, 128).unwrap();
        assert!(detector.detect(&frame).unwrap().is_empty());
    }

    #[test]
    fn wrong_tensor_count_is_a_contract_violation() {
        let backend = StubBackend::new("images", "output0").with_response(vec![
            ArrayD::zeros(IxDyn(&[1, 6, 1])),
            ArrayD::zeros(IxDyn(&[1, 6, 1])),
        ]);
        let mut detector = Detector::new(Box::new(backend), small_config()).unwrap();
        let frame = Frame::filled(CANVAS, CANVAS, 128).unwrap();
        assert!(detector.detect(&frame).is_err());
    }

    #[test]
    fn wrong_rank_is_a_contract_violation() {
        let mut detector = detector_with(ArrayD::zeros(IxDyn(&[6, 10])));
        let frame = Frame::filled(CANVAS, CANVAS, 128).unwrap();
        assert!(detector.detect(&frame).is_err());
    }

    #[test]
    fn too_few_channels_is_a_contract_violation() {
        let mut detector = detector_with(ArrayD::zeros(IxDyn(&[1, 4, 10])));
        let frame = Frame::filled(CANVAS, CANVAS, 128).unwrap();
        assert!(detector.detect(&frame).is_err());
    }

    #[test]
    fn detect_in_image_remaps_boxes() {
        // 4x8 frame into an 8x8 canvas: scale 1.0, x offset 2.
        let output = head_output(&[[4.0, 4.0, 2.0, 2.0, 0.9, 0.0]]);
        let mut detector = detector_with(output);
        let frame = Frame::filled(4, 8, 128).unwrap();

        let boxes = detector.detect_in_image(&frame).unwrap();
        assert_eq!(boxes.len(), 1);
        // Canvas corner (3, 3) maps back to image (1, 3).
        assert!((boxes[0].x - 1.0).abs() < 1e-5);
        assert!((boxes[0].y - 3.0).abs() < 1e-5);
    }
}
