//! ONNX Runtime backends for face detection and encoding

use camera_capture::{non_max_suppression, BoundingBox, VideoFrame};
use ndarray::{Array4, Ix3};
use ort::{GraphOptimizationLevel, Session};
use tracing::{debug, error, info};

use crate::config::FaceConfig;
use crate::embedding::Embedding;
use crate::extractor::{FaceBox, FaceDetector, FaceEncoder};
use crate::FaceError;

/// UltraFace (RFB-320) input resolution
const DETECTOR_WIDTH: u32 = 320;
const DETECTOR_HEIGHT: u32 = 240;

fn load_session(kind: &str, path: &str) -> Result<Session, FaceError> {
    info!("Loading {} model from {}", kind, path);
    Session::builder()
        .and_then(|builder| builder.with_optimization_level(GraphOptimizationLevel::Level3))
        .and_then(|builder| builder.commit_from_file(path))
        .map_err(|e| {
            error!("Failed to load {} model: {}", kind, e);
            FaceError::ModelLoad(e.to_string())
        })
}

fn inference_error(e: impl std::fmt::Display) -> FaceError {
    FaceError::Inference(e.to_string())
}

/// Face detector over an UltraFace-style model.
///
/// Expects two outputs: class scores `[1, N, 2]` and corner boxes
/// `[1, N, 4]` in normalized coordinates.
pub struct OrtFaceDetector {
    session: Session,
    confidence_threshold: f32,
    nms_iou: f32,
}

impl OrtFaceDetector {
    pub fn new(config: &FaceConfig) -> Result<Self, FaceError> {
        let path = config
            .detector_model_path
            .as_deref()
            .ok_or_else(|| FaceError::ModelLoad("no face detector model path configured".into()))?;

        Ok(Self {
            session: load_session("face detector", path)?,
            confidence_threshold: config.detector_confidence,
            nms_iou: config.nms_iou,
        })
    }
}

impl FaceDetector for OrtFaceDetector {
    fn detect(&self, frame: &VideoFrame) -> Result<Vec<FaceBox>, FaceError> {
        // 1. Preprocess: resize to 320x240, normalize to roughly -1..1
        let resized = frame
            .resize_rgb(DETECTOR_WIDTH, DETECTOR_HEIGHT)
            .ok_or_else(|| FaceError::ImageProcessing("Failed to create image buffer".into()))?;

        let mut input = Array4::<f32>::zeros((1, 3, DETECTOR_HEIGHT as usize, DETECTOR_WIDTH as usize));
        for (x, y, pixel) in resized.enumerate_pixels() {
            for c in 0..3 {
                input[[0, c, y as usize, x as usize]] = (pixel[c] as f32 - 127.0) / 128.0;
            }
        }

        // 2. Inference
        let outputs = self
            .session
            .run(ort::inputs![input].map_err(inference_error)?)
            .map_err(inference_error)?;

        let scores = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(inference_error)?
            .into_dimensionality::<Ix3>()
            .map_err(inference_error)?;
        let boxes = outputs[1]
            .try_extract_tensor::<f32>()
            .map_err(inference_error)?
            .into_dimensionality::<Ix3>()
            .map_err(inference_error)?;

        // 3. Threshold, map back to frame pixels, suppress overlaps
        let (w, h) = (frame.width as f32, frame.height as f32);
        let candidates: Vec<FaceBox> = (0..scores.shape()[1])
            .filter(|&i| scores[[0, i, 1]] >= self.confidence_threshold)
            .map(|i| FaceBox {
                bbox: BoundingBox::new(
                    boxes[[0, i, 0]] * w,
                    boxes[[0, i, 1]] * h,
                    boxes[[0, i, 2]] * w,
                    boxes[[0, i, 3]] * h,
                ),
                confidence: scores[[0, i, 1]],
            })
            .collect();

        let faces = non_max_suppression(candidates, self.nms_iou, |f| (f.bbox, f.confidence));
        debug!("Detected {} faces", faces.len());
        Ok(faces)
    }
}

/// Face encoder over a FaceNet-style model (`[1, 3, 160, 160]` -> `[1, D]`)
pub struct OrtFaceEncoder {
    session: Session,
    input_size: u32,
}

impl OrtFaceEncoder {
    pub fn new(config: &FaceConfig) -> Result<Self, FaceError> {
        let path = config
            .encoder_model_path
            .as_deref()
            .ok_or_else(|| FaceError::ModelLoad("no face encoder model path configured".into()))?;

        Ok(Self {
            session: load_session("face encoder", path)?,
            input_size: config.encoder_input_size,
        })
    }
}

impl FaceEncoder for OrtFaceEncoder {
    fn input_size(&self) -> u32 {
        self.input_size
    }

    fn encode(&self, input: Array4<f32>) -> Result<Embedding, FaceError> {
        let outputs = self
            .session
            .run(ort::inputs![input].map_err(inference_error)?)
            .map_err(inference_error)?;

        let vector: Vec<f32> = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(inference_error)?
            .iter()
            .copied()
            .collect();

        if vector.is_empty() {
            return Err(FaceError::Inference("encoder returned an empty embedding".into()));
        }
        Ok(Embedding::new(vector))
    }
}
