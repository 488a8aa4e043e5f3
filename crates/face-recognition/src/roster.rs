//! Known-face roster snapshot

use camera_capture::VideoFrame;
use storage::{RosterSource, StudentId};
use tracing::{info, warn};

use crate::embedding::Embedding;
use crate::extractor::FeatureExtractor;
use crate::FaceError;

/// Enrolled student with a reference embedding
#[derive(Debug, Clone)]
pub struct KnownFace {
    pub student_id: StudentId,
    pub student_name: String,
    pub embedding: Embedding,
}

/// Immutable snapshot of known faces for one session
#[derive(Debug, Clone, Default)]
pub struct Roster {
    faces: Vec<KnownFace>,
}

impl Roster {
    pub fn new(faces: Vec<KnownFace>) -> Self {
        Self { faces }
    }

    /// Encode every student image the source provides.
    ///
    /// Images that fail to decode, or in which no face is found, are logged
    /// and left out of the roster.
    pub fn load(source: &dyn RosterSource, extractor: &FeatureExtractor) -> Result<Self, FaceError> {
        let students = source.students_with_faces()?;
        let mut faces = Vec::with_capacity(students.len());

        for student in students {
            let image = match image::load_from_memory(&student.image) {
                Ok(image) => image.to_rgb8(),
                Err(e) => {
                    warn!("Failed to decode face image for student {}: {}", student.name, e);
                    continue;
                }
            };

            let frame = VideoFrame::from_image(image, 0, 0);
            match extractor.extract(&frame) {
                Ok(encodings) => match encodings.into_iter().next() {
                    Some(encoding) => faces.push(KnownFace {
                        student_id: student.id,
                        student_name: student.name,
                        embedding: encoding.embedding,
                    }),
                    None => warn!("No face found in reference image for student {}", student.name),
                },
                Err(e) => warn!("Failed to encode image for student {}: {}", student.name, e),
            }
        }

        info!("Loaded {} known faces.", faces.len());
        Ok(Self { faces })
    }

    pub fn len(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&KnownFace> {
        self.faces.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &KnownFace> {
        self.faces.iter()
    }

    /// Dimensionality of the first roster embedding; queries are compared against it
    pub fn reference_dim(&self) -> Option<usize> {
        self.faces.first().map(|f| f.embedding.dim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::{FaceBox, FaceDetector, FaceEncoder};
    use camera_capture::BoundingBox;
    use image::{ImageFormat, RgbImage};
    use ndarray::Array4;
    use std::io::Cursor;
    use storage::Repository;

    /// Finds a face only in images wider than 8px, covering the whole image
    struct WideImageDetector;

    impl FaceDetector for WideImageDetector {
        fn detect(&self, frame: &VideoFrame) -> Result<Vec<FaceBox>, FaceError> {
            if frame.width <= 8 {
                return Ok(vec![]);
            }
            Ok(vec![FaceBox {
                bbox: BoundingBox::new(0.0, 0.0, frame.width as f32, frame.height as f32),
                confidence: 1.0,
            }])
        }
    }

    struct RedEncoder;

    impl FaceEncoder for RedEncoder {
        fn encode(&self, input: Array4<f32>) -> Result<Embedding, FaceError> {
            Ok(Embedding::new(vec![input[[0, 0, 0, 0]], 0.0]))
        }
    }

    fn png(width: u32, red: u8) -> Vec<u8> {
        let image = RgbImage::from_pixel(width, 10, image::Rgb([red, 0, 0]));
        let mut bytes = Cursor::new(Vec::new());
        image.write_to(&mut bytes, ImageFormat::Png).unwrap();
        bytes.into_inner()
    }

    #[test]
    fn test_load_skips_undecodable_and_faceless() {
        let repo = Repository::new();
        repo.add_student(StudentId::new("s1"), "Ada", Some(png(20, 255))).unwrap();
        repo.add_student(StudentId::new("s2"), "Brian", Some(b"garbage".to_vec())).unwrap();
        repo.add_student(StudentId::new("s3"), "Chen", Some(png(4, 255))).unwrap();
        repo.add_student(StudentId::new("s4"), "Dana", None).unwrap();

        let extractor = FeatureExtractor::new(Box::new(WideImageDetector), Box::new(RedEncoder));
        let roster = Roster::load(&repo, &extractor).unwrap();

        assert_eq!(roster.len(), 1);
        let known = roster.get(0).unwrap();
        assert_eq!(known.student_id, StudentId::new("s1"));
        assert_eq!(known.embedding.as_slice(), &[1.0, 0.0]);
        assert_eq!(roster.reference_dim(), Some(2));
    }

    #[test]
    fn test_empty_roster() {
        let roster = Roster::default();
        assert!(roster.is_empty());
        assert_eq!(roster.reference_dim(), None);
    }
}
