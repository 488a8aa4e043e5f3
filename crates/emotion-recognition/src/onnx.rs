//! ONNX Runtime backends for the face mesh and the emotion classifier

use camera_capture::VideoFrame;
use face_recognition::FaceDetector;
use ndarray::Array4;
use ort::{GraphOptimizationLevel, Session};
use tracing::{debug, error, info};

use crate::config::EmotionConfig;
use crate::landmarks::{FaceLandmarks, LandmarkDetector};
use crate::EmotionError;

/// Emotion classifier backend: `1 x S x S x 1` grayscale in, one score per category out
pub trait EmotionModel: Send + Sync {
    fn predict(&self, input: Array4<f32>) -> Result<Vec<f32>, EmotionError>;
}

fn load_session(kind: &str, path: &str) -> Result<Session, EmotionError> {
    info!("Loading {} model from {}", kind, path);
    Session::builder()
        .and_then(|builder| builder.with_optimization_level(GraphOptimizationLevel::Level3))
        .and_then(|builder| builder.commit_from_file(path))
        .map_err(|e| {
            error!("Failed to load {} model: {}", kind, e);
            EmotionError::ModelLoad(e.to_string())
        })
}

fn inference_error(e: impl std::fmt::Display) -> EmotionError {
    EmotionError::Inference(e.to_string())
}

/// Seven-way emotion CNN over 48x48 grayscale faces
pub struct OrtEmotionModel {
    session: Session,
}

impl OrtEmotionModel {
    pub fn new(config: &EmotionConfig) -> Result<Self, EmotionError> {
        let path = config
            .classifier_model_path
            .as_deref()
            .ok_or_else(|| EmotionError::ModelLoad("no emotion model path configured".into()))?;

        Ok(Self {
            session: load_session("emotion", path)?,
        })
    }
}

impl EmotionModel for OrtEmotionModel {
    fn predict(&self, input: Array4<f32>) -> Result<Vec<f32>, EmotionError> {
        let outputs = self
            .session
            .run(ort::inputs![input].map_err(inference_error)?)
            .map_err(inference_error)?;

        let scores = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(inference_error)?
            .iter()
            .copied()
            .collect();
        Ok(scores)
    }
}

/// Multi-face mesh: locates faces with a [`FaceDetector`], then runs a
/// single-face mesh model on each (margin-expanded) face crop.
///
/// The mesh model takes `1 x 3 x S x S` RGB in `[0, 1]` and returns
/// `468` (or `478` with irises) points in crop input pixels.
pub struct OrtMeshLandmarker {
    detector: Box<dyn FaceDetector>,
    session: Session,
    input_size: u32,
    margin: f32,
}

impl OrtMeshLandmarker {
    pub fn new(config: &EmotionConfig, detector: Box<dyn FaceDetector>) -> Result<Self, EmotionError> {
        let path = config
            .mesh_model_path
            .as_deref()
            .ok_or_else(|| EmotionError::ModelLoad("no face mesh model path configured".into()))?;

        Ok(Self {
            detector,
            session: load_session("face mesh", path)?,
            input_size: config.mesh_input_size,
            margin: config.mesh_margin,
        })
    }

    fn mesh_tensor(&self, crop: &VideoFrame) -> Result<Array4<f32>, EmotionError> {
        let resized = crop
            .resize_rgb(self.input_size, self.input_size)
            .ok_or_else(|| EmotionError::ImageProcessing("Failed to create image buffer".into()))?;

        let size = self.input_size as usize;
        let mut input = Array4::<f32>::zeros((1, 3, size, size));
        for (x, y, pixel) in resized.enumerate_pixels() {
            for c in 0..3 {
                input[[0, c, y as usize, x as usize]] = pixel[c] as f32 / 255.0;
            }
        }
        Ok(input)
    }
}

impl LandmarkDetector for OrtMeshLandmarker {
    fn detect(&self, frame: &VideoFrame) -> Result<Vec<FaceLandmarks>, EmotionError> {
        let faces = self.detector.detect(frame)?;
        let mut meshes = Vec::with_capacity(faces.len());

        for face in faces {
            let (mx, my) = (face.bbox.width() * self.margin, face.bbox.height() * self.margin);
            let region = camera_capture::BoundingBox::new(
                face.bbox.x1 - mx,
                face.bbox.y1 - my,
                face.bbox.x2 + mx,
                face.bbox.y2 + my,
            );
            let Some(rect) = region.clamp_to(frame.width, frame.height) else {
                continue;
            };
            let Some(crop) = frame.crop(rect) else {
                continue;
            };

            let input = self.mesh_tensor(&crop)?;
            let outputs = self
                .session
                .run(ort::inputs![input].map_err(inference_error)?)
                .map_err(inference_error)?;
            let flat: Vec<f32> = outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(inference_error)?
                .iter()
                .copied()
                .collect();

            // Crop input pixels -> frame pixels
            let sx = rect.width as f32 / self.input_size as f32;
            let sy = rect.height as f32 / self.input_size as f32;
            let points = flat
                .chunks_exact(3)
                .map(|p| [rect.x as f32 + p[0] * sx, rect.y as f32 + p[1] * sy, p[2] * sx])
                .collect();
            meshes.push(FaceLandmarks::new(points));
        }

        debug!("Mesh found {} faces", meshes.len());
        Ok(meshes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_model_path() {
        let config = EmotionConfig::default();
        assert!(matches!(OrtEmotionModel::new(&config), Err(EmotionError::ModelLoad(_))));
    }
}
