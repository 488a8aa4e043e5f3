//! Face mesh landmarks

use camera_capture::{BoundingBox, VideoFrame};
use serde::Serialize;

use crate::EmotionError;

/// One face mesh, points in frame pixel coordinates `(x, y, z)`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaceLandmarks {
    pub points: Vec<[f32; 3]>,
}

impl FaceLandmarks {
    pub fn new(points: Vec<[f32; 3]>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Tight box around the 2D projection of the mesh
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        BoundingBox::enclosing(self.points.iter().map(|p| (p[0], p[1])))
    }

    /// Anchor for the emotion caption
    pub fn anchor(&self) -> Option<(f32, f32)> {
        self.points.first().map(|p| (p[0], p[1]))
    }
}

/// Multi-face landmark detector backend
pub trait LandmarkDetector: Send + Sync {
    fn detect(&self, frame: &VideoFrame) -> Result<Vec<FaceLandmarks>, EmotionError>;
}
