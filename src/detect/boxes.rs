//! Bounding boxes, IoU, and greedy non-maximum suppression.

/// Axis-aligned detection box.
///
/// `(x, y)` is always the top-left corner; the model's center-based raw
/// geometry is converted exactly once, at the decode boundary in
/// [`super::Detector`]. Coordinates are in canvas space after decode and in
/// image space after a letterbox remap.
#[derive(Clone, Debug, PartialEq)]
pub struct BBox {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    pub class_index: usize,
    pub confidence: f32,
}

impl BBox {
    pub fn area(&self) -> f32 {
        self.w * self.h
    }
}

/// Intersection over union of two corner-based boxes.
///
/// Non-overlapping boxes yield 0.0, and a non-positive union denominator can
/// never divide: the intersection is checked first.
pub fn iou(a: &BBox, b: &BBox) -> f32 {
    let x1 = a.x.max(b.x);
    let y1 = a.y.max(b.y);
    let x2 = (a.x + a.w).min(b.x + b.w);
    let y2 = (a.y + a.h).min(b.y + b.h);

    let iw = x2 - x1;
    let ih = y2 - y1;
    if iw <= 0.0 || ih <= 0.0 {
        return 0.0;
    }

    let intersection = iw * ih;
    let union = a.area() + b.area() - intersection;
    if union <= 0.0 {
        return 0.0;
    }
    intersection / union
}

/// Greedy non-maximum suppression.
///
/// Boxes are sorted by confidence descending; the sort is stable, so equal
/// confidences keep their candidate order. Each box is kept only if its IoU
/// with every already-kept box is at or below the threshold.
pub fn non_max_suppression(mut boxes: Vec<BBox>, iou_threshold: f32) -> Vec<BBox> {
    boxes.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut kept: Vec<BBox> = Vec::with_capacity(boxes.len());
    for candidate in boxes {
        if kept.iter().all(|k| iou(&candidate, k) <= iou_threshold) {
            kept.push(candidate);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(x: f32, y: f32, w: f32, h: f32, confidence: f32) -> BBox {
        BBox {
            x,
            y,
            w,
            h,
            class_index: 0,
            confidence,
        }
    }

    #[test]
    fn iou_of_box_with_itself_is_one() {
        let a = bbox(3.0, 4.0, 10.0, 20.0, 0.9);
        assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn iou_of_disjoint_boxes_is_zero() {
        let a = bbox(0.0, 0.0, 10.0, 10.0, 0.9);
        let b = bbox(20.0, 20.0, 10.0, 10.0, 0.9);
        assert_eq!(iou(&a, &b), 0.0);
    }

    #[test]
    fn iou_of_zero_area_boxes_does_not_divide() {
        let a = bbox(5.0, 5.0, 0.0, 0.0, 0.9);
        let b = bbox(5.0, 5.0, 0.0, 0.0, 0.9);
        assert_eq!(iou(&a, &b), 0.0);
    }

    #[test]
    fn iou_stays_in_unit_interval() {
        let boxes = [
            bbox(0.0, 0.0, 10.0, 10.0, 0.9),
            bbox(1.0, 1.0, 10.0, 10.0, 0.5),
            bbox(5.0, 5.0, 3.0, 8.0, 0.7),
            bbox(-4.0, -4.0, 6.0, 6.0, 0.2),
        ];
        for a in &boxes {
            for b in &boxes {
                let v = iou(a, b);
                assert!((0.0..=1.0).contains(&v), "iou {v} out of range");
            }
        }
    }

    #[test]
    fn overlapping_pair_keeps_higher_confidence() {
        // IoU of these two 10x10 boxes offset by (1,1) is 81/119 > 0.5.
        let boxes = vec![
            bbox(0.0, 0.0, 10.0, 10.0, 0.9),
            bbox(1.0, 1.0, 10.0, 10.0, 0.5),
        ];
        let kept = non_max_suppression(boxes, 0.5);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].confidence, 0.9);
    }

    #[test]
    fn equal_confidence_disjoint_boxes_all_survive_in_order() {
        let boxes = vec![
            bbox(0.0, 0.0, 5.0, 5.0, 0.8),
            bbox(20.0, 0.0, 5.0, 5.0, 0.8),
            bbox(40.0, 0.0, 5.0, 5.0, 0.8),
        ];
        let kept = non_max_suppression(boxes.clone(), 0.5);
        assert_eq!(kept, boxes);
    }

    #[test]
    fn suppression_is_idempotent() {
        let boxes = vec![
            bbox(0.0, 0.0, 10.0, 10.0, 0.9),
            bbox(1.0, 1.0, 10.0, 10.0, 0.5),
            bbox(30.0, 30.0, 10.0, 10.0, 0.7),
            bbox(31.0, 31.0, 10.0, 10.0, 0.6),
        ];
        let once = non_max_suppression(boxes, 0.5);
        let twice = non_max_suppression(once.clone(), 0.5);
        assert_eq!(once, twice);
        // No two survivors overlap beyond the threshold.
        for (i, a) in once.iter().enumerate() {
            for b in once.iter().skip(i + 1) {
                assert!(iou(a, b) <= 0.5);
            }
        }
    }
}
