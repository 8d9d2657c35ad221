mod boxes;
mod detector;

pub use boxes::{iou, non_max_suppression, BBox};
pub use detector::{
    Detector, DetectorConfig, DEFAULT_CANVAS_SIZE, DEFAULT_CONFIDENCE_THRESHOLD,
    DEFAULT_IOU_THRESHOLD, PERSON_CLASS,
};
