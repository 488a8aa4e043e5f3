//! Student Emotion Recognition
//!
//! Per-face emotion classification for the monitoring pipeline:
//! - Multi-face mesh landmark detection
//! - Landmark-bounded face crops, 48x48 grayscale
//! - Seven-way classifier with arg-max selection

pub mod config;
pub mod emotion;
pub mod landmarks;
pub mod onnx;
pub mod preprocess;

pub use config::EmotionConfig;
pub use emotion::Emotion;
pub use landmarks::{FaceLandmarks, LandmarkDetector};
pub use onnx::{EmotionModel, OrtEmotionModel, OrtMeshLandmarker};
pub use preprocess::preprocess_face;

use camera_capture::VideoFrame;
use face_recognition::FaceError;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

/// Emotion recognition error types
#[derive(Error, Debug)]
pub enum EmotionError {
    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Image processing failed: {0}")]
    ImageProcessing(String),

    #[error("Face detection failed: {0}")]
    Face(#[from] FaceError),
}

/// Emotion detected on one face
#[derive(Debug, Clone, Serialize)]
pub struct EmotionDetection {
    pub emotion: Emotion,
    pub confidence: f32,
    pub landmarks: FaceLandmarks,
}

/// Landmark detector + emotion classifier pair.
///
/// Holds no state between frames.
pub struct EmotionClassifier {
    landmarks: Box<dyn LandmarkDetector>,
    model: Box<dyn EmotionModel>,
    input_size: u32,
}

impl EmotionClassifier {
    pub fn new(landmarks: Box<dyn LandmarkDetector>, model: Box<dyn EmotionModel>) -> Self {
        Self::with_input_size(landmarks, model, EmotionConfig::default().classifier_input_size)
    }

    pub fn with_input_size(
        landmarks: Box<dyn LandmarkDetector>,
        model: Box<dyn EmotionModel>,
        input_size: u32,
    ) -> Self {
        Self {
            landmarks,
            model,
            input_size,
        }
    }

    /// Build the ONNX-backed classifier from configuration
    pub fn from_config(
        config: &EmotionConfig,
        detector: Box<dyn face_recognition::FaceDetector>,
    ) -> Result<Self, EmotionError> {
        Ok(Self::with_input_size(
            Box::new(OrtMeshLandmarker::new(config, detector)?),
            Box::new(OrtEmotionModel::new(config)?),
            config.classifier_input_size,
        ))
    }

    /// Classify every face in the frame, in landmark detection order.
    ///
    /// Faces whose crop is degenerate are skipped.
    pub fn classify(&self, frame: &VideoFrame) -> Result<Vec<EmotionDetection>, EmotionError> {
        let faces = self.landmarks.detect(frame)?;
        let mut detections = Vec::with_capacity(faces.len());

        for landmarks in faces {
            let Some(input) = preprocess_face(frame, &landmarks, self.input_size) else {
                continue;
            };

            let scores = self.model.predict(input)?;
            let Some((emotion, confidence)) = Emotion::from_scores(&scores) else {
                return Err(EmotionError::Inference(format!(
                    "expected {} scores, got {}",
                    Emotion::ALL.len(),
                    scores.len()
                )));
            };

            debug!("Face classified as {} ({:.2})", emotion, confidence);
            detections.push(EmotionDetection {
                emotion,
                confidence,
                landmarks,
            });
        }

        Ok(detections)
    }
}
