//! Bounding box geometry shared by the detectors

use serde::{Deserialize, Serialize};

/// Axis-aligned box in frame pixel coordinates, corners `(x1, y1)`-`(x2, y2)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

/// Integer crop window, already clamped to a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Build from a center point and size (YOLO layout)
    pub fn from_center(cx: f32, cy: f32, w: f32, h: f32) -> Self {
        Self {
            x1: cx - w / 2.0,
            y1: cy - h / 2.0,
            x2: cx + w / 2.0,
            y2: cy + h / 2.0,
        }
    }

    /// Tight box around a set of 2D points
    pub fn enclosing<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = (f32, f32)>,
    {
        let mut iter = points.into_iter();
        let (x, y) = iter.next()?;
        let mut bbox = Self::new(x, y, x, y);
        for (x, y) in iter {
            bbox.x1 = bbox.x1.min(x);
            bbox.y1 = bbox.y1.min(y);
            bbox.x2 = bbox.x2.max(x);
            bbox.y2 = bbox.y2.max(y);
        }
        Some(bbox)
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Multiply both axes, used to map model-space boxes back to the frame
    pub fn scale(&self, sx: f32, sy: f32) -> Self {
        Self {
            x1: self.x1 * sx,
            y1: self.y1 * sy,
            x2: self.x2 * sx,
            y2: self.y2 * sy,
        }
    }

    /// Intersection over union
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);

        let intersection = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            0.0
        } else {
            intersection / union
        }
    }

    /// Truncate to integer pixels and clamp into a `width` x `height` frame.
    ///
    /// Returns `None` when nothing of the box remains inside the frame.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<PixelRect> {
        if !(self.x1.is_finite() && self.y1.is_finite() && self.x2.is_finite() && self.y2.is_finite()) {
            return None;
        }

        let x_min = (self.x1 as i64).clamp(0, width as i64);
        let x_max = (self.x2 as i64).clamp(0, width as i64);
        let y_min = (self.y1 as i64).clamp(0, height as i64);
        let y_max = (self.y2 as i64).clamp(0, height as i64);

        if x_min >= x_max || y_min >= y_max {
            return None;
        }

        Some(PixelRect {
            x: x_min as u32,
            y: y_min as u32,
            width: (x_max - x_min) as u32,
            height: (y_max - y_min) as u32,
        })
    }
}

/// Greedy non-maximum suppression.
///
/// Keeps the highest-scoring candidate and drops every other candidate whose
/// box overlaps it by more than `iou_threshold`, then repeats. Output is in
/// descending score order.
pub fn non_max_suppression<T, F>(mut candidates: Vec<T>, iou_threshold: f32, key: F) -> Vec<T>
where
    F: Fn(&T) -> (BoundingBox, f32),
{
    candidates.sort_by(|a, b| key(b).1.total_cmp(&key(a).1));

    let mut kept: Vec<T> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let (bbox, _) = key(&candidate);
        if kept.iter().all(|k| key(k).0.iou(&bbox) <= iou_threshold) {
            kept.push(candidate);
        }
    }
    kept
}
