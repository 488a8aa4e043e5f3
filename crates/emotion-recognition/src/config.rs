//! Emotion recognition configuration

use serde::{Deserialize, Serialize};

/// Emotion recognition configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmotionConfig {
    /// Side length of the grayscale classifier input
    pub classifier_input_size: u32,

    /// Side length of the face mesh input
    pub mesh_input_size: u32,

    /// Margin added around a detected face before running the mesh (fraction of size)
    pub mesh_margin: f32,

    /// Model paths
    pub mesh_model_path: Option<String>,
    pub classifier_model_path: Option<String>,
}

impl Default for EmotionConfig {
    fn default() -> Self {
        Self {
            classifier_input_size: 48,
            mesh_input_size: 192,
            mesh_margin: 0.25,
            mesh_model_path: None,
            classifier_model_path: None,
        }
    }
}
