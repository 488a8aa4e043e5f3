//! Student Behavior Detection
//!
//! Classroom behavior detection from a single frame:
//! - YOLO-style detector over ONNX Runtime
//! - Per-class non-maximum suppression
//! - Boxes mapped back to frame pixels for overlays and identity lookup

pub mod config;
pub mod yolo;

pub use config::BehaviorConfig;
pub use yolo::{decode_predictions, YoloBehaviorDetector};

use camera_capture::{BoundingBox, VideoFrame};
use serde::Serialize;
use thiserror::Error;

/// Behavior detection error types
#[derive(Error, Debug)]
pub enum BehaviorError {
    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Invalid frame format")]
    InvalidFrame,
}

/// Detected behavior
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BehaviorDetection {
    /// Behavior label
    pub label: String,

    /// Region in frame pixels
    pub bbox: BoundingBox,

    /// Detection confidence
    pub confidence: f32,
}

/// Behavior classifier port. Stateless between frames.
pub trait BehaviorClassifier: Send + Sync {
    fn classify(&self, frame: &VideoFrame) -> Result<Vec<BehaviorDetection>, BehaviorError>;
}
