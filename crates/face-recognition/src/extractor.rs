//! Face detection + encoding into fixed-length embeddings

use camera_capture::{BoundingBox, VideoFrame};
use ndarray::Array4;
use serde::Serialize;
use tracing::debug;

use crate::embedding::Embedding;
use crate::FaceError;

/// Detected face region
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FaceBox {
    pub bbox: BoundingBox,
    pub confidence: f32,
}

/// Face embedding together with the region it was computed from
#[derive(Debug, Clone)]
pub struct FaceEncoding {
    pub embedding: Embedding,
    pub bbox: BoundingBox,
    pub confidence: f32,
}

/// Face detector backend
pub trait FaceDetector: Send + Sync {
    /// Face boxes in frame pixel coordinates, in detection order
    fn detect(&self, frame: &VideoFrame) -> Result<Vec<FaceBox>, FaceError>;
}

/// Face encoder backend
pub trait FaceEncoder: Send + Sync {
    /// Side length of the square RGB input
    fn input_size(&self) -> u32 {
        160
    }

    /// Encode a `1 x 3 x S x S` tensor with values in `[0, 1]`
    fn encode(&self, input: Array4<f32>) -> Result<Embedding, FaceError>;
}

/// Turns frames into one embedding per detected face
pub struct FeatureExtractor {
    detector: Box<dyn FaceDetector>,
    encoder: Box<dyn FaceEncoder>,
}

impl FeatureExtractor {
    pub fn new(detector: Box<dyn FaceDetector>, encoder: Box<dyn FaceEncoder>) -> Self {
        Self { detector, encoder }
    }

    /// Embeddings for every face in the frame, in detection order.
    ///
    /// Faces whose crop is empty after clamping are skipped.
    pub fn extract(&self, frame: &VideoFrame) -> Result<Vec<FaceEncoding>, FaceError> {
        let faces = self.detector.detect(frame)?;
        let mut encodings = Vec::with_capacity(faces.len());

        for face in faces {
            let Some(crop) = frame.crop_box(&face.bbox) else {
                debug!("Skipping degenerate face crop {:?}", face.bbox);
                continue;
            };
            let Some(input) = face_tensor(&crop, self.encoder.input_size()) else {
                debug!("Skipping malformed face crop {:?}", face.bbox);
                continue;
            };

            encodings.push(FaceEncoding {
                embedding: self.encoder.encode(input)?,
                bbox: face.bbox,
                confidence: face.confidence,
            });
        }

        Ok(encodings)
    }

    /// Embedding of the first face found inside `region` of the frame.
    ///
    /// Used by the emotion and behavior paths, which locate a person first and
    /// need an identity for that region only.
    pub fn encode_region(
        &self,
        frame: &VideoFrame,
        region: &BoundingBox,
    ) -> Result<Option<Embedding>, FaceError> {
        let Some(crop) = frame.crop_box(region) else {
            return Ok(None);
        };
        Ok(self.extract(&crop)?.into_iter().next().map(|e| e.embedding))
    }
}

/// Resize to `size` x `size` and lay out as NCHW scaled to `[0, 1]`
pub fn face_tensor(crop: &VideoFrame, size: u32) -> Option<Array4<f32>> {
    let resized = crop.resize_rgb(size, size)?;
    let size = size as usize;

    let mut input = Array4::<f32>::zeros((1, 3, size, size));
    for (x, y, pixel) in resized.enumerate_pixels() {
        for c in 0..3 {
            input[[0, c, y as usize, x as usize]] = pixel[c] as f32 / 255.0;
        }
    }
    Some(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FixedDetector(Vec<FaceBox>);

    impl FaceDetector for FixedDetector {
        fn detect(&self, _frame: &VideoFrame) -> Result<Vec<FaceBox>, FaceError> {
            Ok(self.0.clone())
        }
    }

    /// Encodes to the per-channel mean, and records the input shapes it saw
    #[derive(Default)]
    struct MeanEncoder {
        shapes: Mutex<Vec<Vec<usize>>>,
    }

    impl FaceEncoder for MeanEncoder {
        fn encode(&self, input: Array4<f32>) -> Result<Embedding, FaceError> {
            self.shapes.lock().unwrap().push(input.shape().to_vec());
            let means = (0..3)
                .map(|c| input.index_axis(ndarray::Axis(1), c).mean().unwrap_or(0.0))
                .collect();
            Ok(Embedding::new(means))
        }
    }

    fn face(x1: f32, y1: f32, x2: f32, y2: f32) -> FaceBox {
        FaceBox {
            bbox: BoundingBox::new(x1, y1, x2, y2),
            confidence: 0.9,
        }
    }

    fn two_tone_frame() -> VideoFrame {
        // Left half red, right half blue
        let (w, h) = (40u32, 20u32);
        let mut data = Vec::new();
        for _y in 0..h {
            for x in 0..w {
                if x < w / 2 {
                    data.extend_from_slice(&[255, 0, 0]);
                } else {
                    data.extend_from_slice(&[0, 0, 255]);
                }
            }
        }
        VideoFrame::new(data, w, h, 0, 0)
    }

    #[test]
    fn test_extract_in_detection_order() {
        let detector = FixedDetector(vec![face(25.0, 0.0, 40.0, 20.0), face(0.0, 0.0, 15.0, 20.0)]);
        let extractor = FeatureExtractor::new(Box::new(detector), Box::new(MeanEncoder::default()));

        let encodings = extractor.extract(&two_tone_frame()).unwrap();
        assert_eq!(encodings.len(), 2);
        // First detection is the blue region
        assert!(encodings[0].embedding.as_slice()[2] > 0.99);
        assert!(encodings[1].embedding.as_slice()[0] > 0.99);
    }

    #[test]
    fn test_degenerate_crops_skipped() {
        let detector = FixedDetector(vec![
            face(5.0, 5.0, 5.0, 15.0),
            face(100.0, 100.0, 120.0, 120.0),
            face(0.0, 0.0, 10.0, 10.0),
        ]);
        let extractor = FeatureExtractor::new(Box::new(detector), Box::new(MeanEncoder::default()));

        let encodings = extractor.extract(&two_tone_frame()).unwrap();
        assert_eq!(encodings.len(), 1);
        assert_eq!(encodings[0].bbox, BoundingBox::new(0.0, 0.0, 10.0, 10.0));
    }

    #[test]
    fn test_no_faces() {
        let extractor =
            FeatureExtractor::new(Box::new(FixedDetector(vec![])), Box::new(MeanEncoder::default()));
        assert!(extractor.extract(&two_tone_frame()).unwrap().is_empty());
    }

    #[test]
    fn test_face_tensor_shape_and_scale() {
        let frame = VideoFrame::filled(10, 10, [255, 0, 51]);
        let tensor = face_tensor(&frame, 160).unwrap();
        assert_eq!(tensor.shape(), &[1, 3, 160, 160]);
        assert!((tensor[[0, 0, 80, 80]] - 1.0).abs() < 1e-6);
        assert!((tensor[[0, 2, 0, 0]] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_encode_region_outside_frame() {
        let extractor = FeatureExtractor::new(
            Box::new(FixedDetector(vec![face(0.0, 0.0, 5.0, 5.0)])),
            Box::new(MeanEncoder::default()),
        );
        let region = BoundingBox::new(50.0, 50.0, 60.0, 60.0);
        assert!(extractor.encode_region(&two_tone_frame(), &region).unwrap().is_none());

        let region = BoundingBox::new(0.0, 0.0, 20.0, 20.0);
        assert!(extractor.encode_region(&two_tone_frame(), &region).unwrap().is_some());
    }
}
