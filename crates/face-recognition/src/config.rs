//! Face recognition configuration

use serde::{Deserialize, Serialize};

use crate::matcher::MatcherConfig;

/// Face recognition configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FaceConfig {
    /// Face detection confidence threshold
    pub detector_confidence: f32,

    /// IoU above which overlapping face boxes are merged
    pub nms_iou: f32,

    /// Side length of the square encoder input
    pub encoder_input_size: u32,

    /// Identity matching thresholds
    pub matcher: MatcherConfig,

    /// Model paths
    pub detector_model_path: Option<String>,
    pub encoder_model_path: Option<String>,
}

impl Default for FaceConfig {
    fn default() -> Self {
        Self {
            detector_confidence: 0.7,
            nms_iou: 0.3,
            encoder_input_size: 160,
            matcher: MatcherConfig::default(),
            detector_model_path: None,
            encoder_model_path: None,
        }
    }
}
