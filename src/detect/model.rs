//! Detection result types and non-maximum suppression.

use serde::Serialize;

/// A single detected object in source-image pixel coordinates.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Detection {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    /// Score in `[0, 1]`.
    pub confidence: f32,
    pub class_id: u32,
    pub class_name: String,
}

impl Detection {
    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    pub fn intersection_area(&self, other: &Detection) -> f32 {
        let x1 = self.x1.max(other.x1);
        let y1 = self.y1.max(other.y1);
        let x2 = self.x2.min(other.x2);
        let y2 = self.y2.min(other.y2);

        if x2 > x1 && y2 > y1 {
            (x2 - x1) * (y2 - y1)
        } else {
            0.0
        }
    }

    /// Intersection over union with `other`; zero for degenerate boxes.
    pub fn iou(&self, other: &Detection) -> f32 {
        let intersection = self.intersection_area(other);
        let union = self.area() + other.area() - intersection;

        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }
}

/// Detections produced by one inference call.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DetectionResult {
    pub image_width: u32,
    pub image_height: u32,
    /// Sorted by descending confidence.
    pub detections: Vec<Detection>,
}

impl DetectionResult {
    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Detection> {
        self.detections.iter()
    }
}

/// Greedy class-aware non-maximum suppression.
///
/// Keeps the highest-confidence box and drops every later box of the same
/// class whose IoU with a kept box exceeds `iou_threshold`. At most
/// `max_detections` boxes are returned, sorted by descending confidence.
pub fn non_maximum_suppression(
    mut candidates: Vec<Detection>,
    iou_threshold: f32,
    max_detections: usize,
) -> Vec<Detection> {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<Detection> = Vec::new();
    for candidate in candidates {
        if kept.len() >= max_detections {
            break;
        }

        let suppressed = kept.iter().any(|k| {
            k.class_id == candidate.class_id && k.iou(&candidate) > iou_threshold
        });
        if !suppressed {
            kept.push(candidate);
        }
    }

    kept
}
