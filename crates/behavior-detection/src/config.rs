//! Behavior detection configuration

use serde::{Deserialize, Serialize};

/// Behavior detection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Minimum `objectness * class score` to keep a box
    pub confidence: f32,

    /// Per-class NMS overlap threshold
    pub iou_threshold: f32,

    /// Side length of the square detector input
    pub input_size: u32,

    /// Behavior label per output class, in model order
    pub labels: Vec<String>,

    /// Model path
    pub model_path: Option<String>,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            confidence: 0.25,
            iou_threshold: 0.45,
            input_size: 640,
            labels: Vec::new(),
            model_path: None,
        }
    }
}

impl BehaviorConfig {
    /// Label for an output class index; unnamed classes get `class_<n>`
    pub fn label(&self, class: usize) -> String {
        self.labels
            .get(class)
            .cloned()
            .unwrap_or_else(|| format!("class_{}", class))
    }
}
