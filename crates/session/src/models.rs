//! Model bundle, built once at process start

use ab_glyph::FontArc;
use behavior_detection::{BehaviorClassifier, BehaviorConfig, YoloBehaviorDetector};
use emotion_recognition::{EmotionClassifier, EmotionConfig};
use face_recognition::{FaceConfig, FeatureExtractor, IdentityMatcher, OrtFaceDetector, OrtFaceEncoder};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::SessionError;

/// Model configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    pub face: FaceConfig,
    pub emotion: EmotionConfig,
    pub behavior: BehaviorConfig,
    /// TrueType font for overlay captions; captions are skipped without one
    pub caption_font_path: Option<String>,
}

/// Every model a session runs.
///
/// Face detection and encoding are required. The emotion and behavior
/// classifiers are optional; a missing one is simply never run.
pub struct Models {
    pub extractor: FeatureExtractor,
    pub matcher: IdentityMatcher,
    pub emotion: Option<EmotionClassifier>,
    pub behavior: Option<Box<dyn BehaviorClassifier>>,
    /// Font for student-name and emotion captions
    pub caption_font: Option<FontArc>,
}

impl Models {
    pub fn new(extractor: FeatureExtractor, matcher: IdentityMatcher) -> Self {
        Self {
            extractor,
            matcher,
            emotion: None,
            behavior: None,
            caption_font: None,
        }
    }

    pub fn with_emotion(mut self, classifier: EmotionClassifier) -> Self {
        self.emotion = Some(classifier);
        self
    }

    pub fn with_behavior(mut self, classifier: Box<dyn BehaviorClassifier>) -> Self {
        self.behavior = Some(classifier);
        self
    }

    pub fn with_caption_font(mut self, font: FontArc) -> Self {
        self.caption_font = Some(font);
        self
    }

    /// Load the ONNX models named in the configuration
    pub fn load(config: &ModelsConfig) -> Result<Self, SessionError> {
        let extractor = FeatureExtractor::new(
            Box::new(OrtFaceDetector::new(&config.face)?),
            Box::new(OrtFaceEncoder::new(&config.face)?),
        );
        let mut models = Self::new(extractor, IdentityMatcher::new(config.face.matcher.clone()));

        if config.emotion.mesh_model_path.is_some() && config.emotion.classifier_model_path.is_some() {
            let detector = OrtFaceDetector::new(&config.face)?;
            models = models.with_emotion(EmotionClassifier::from_config(&config.emotion, Box::new(detector))?);
        } else {
            warn!("No emotion model paths configured. Emotion classification disabled.");
        }

        if config.behavior.model_path.is_some() {
            models = models.with_behavior(Box::new(YoloBehaviorDetector::new(config.behavior.clone())?));
        } else {
            warn!("No behavior model path configured. Behavior detection disabled.");
        }

        match &config.caption_font_path {
            Some(path) => models = models.with_caption_font(load_font(path)?),
            None => warn!("No caption font configured. Overlay captions disabled."),
        }

        info!(
            "Models ready (emotion: {}, behavior: {})",
            models.emotion.is_some(),
            models.behavior.is_some()
        );
        Ok(models)
    }
}

fn load_font(path: &str) -> Result<FontArc, SessionError> {
    let bytes = std::fs::read(path).map_err(|e| SessionError::Font(format!("{}: {}", path, e)))?;
    FontArc::try_from_vec(bytes).map_err(|e| SessionError::Font(format!("{}: {}", path, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_face_models_required() {
        assert!(matches!(
            Models::load(&ModelsConfig::default()),
            Err(SessionError::Face(_))
        ));
    }

    #[test]
    fn test_unreadable_font_is_an_error() {
        assert!(matches!(load_font("/nonexistent/caption.ttf"), Err(SessionError::Font(_))));

        let path = std::env::temp_dir().join(format!("not-a-font-{}.ttf", std::process::id()));
        std::fs::write(&path, b"plain text").unwrap();
        assert!(matches!(load_font(path.to_str().unwrap()), Err(SessionError::Font(_))));
        std::fs::remove_file(&path).ok();
    }
}
