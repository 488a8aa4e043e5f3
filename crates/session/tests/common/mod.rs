//! Synthetic models, camera and roster shared by the session tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use behavior_detection::{BehaviorClassifier, BehaviorDetection, BehaviorError};
use camera_capture::{BoundingBox, CameraError, FrameSource, VideoFrame};
use emotion_recognition::{Emotion, EmotionClassifier, EmotionError, EmotionModel, FaceLandmarks, LandmarkDetector};
use face_recognition::{Embedding, FaceBox, FaceDetector, FaceEncoder, FaceError, FeatureExtractor, IdentityMatcher};
use image::{ImageFormat, RgbImage};
use ndarray::{Array4, Axis};
use observation::AggregatorConfig;
use session::{Collaborators, ManualClock, Models, SessionController, SessionDetails};
use storage::{
    BehaviorWeightTable, PersistenceSink, RecordId, Repository, SessionRecord, StorageError, StudentId,
};

pub const RED: [u8; 3] = [255, 0, 0];
pub const GREEN: [u8; 3] = [0, 255, 0];
pub const BLUE: [u8; 3] = [0, 0, 255];

/// Finds exactly one face covering the whole frame
pub struct WholeFrameDetector;

impl FaceDetector for WholeFrameDetector {
    fn detect(&self, frame: &VideoFrame) -> Result<Vec<FaceBox>, FaceError> {
        Ok(vec![FaceBox {
            bbox: BoundingBox::new(0.0, 0.0, frame.width as f32, frame.height as f32),
            confidence: 1.0,
        }])
    }
}

/// Embeds a face as its mean RGB color
pub struct MeanColorEncoder;

impl FaceEncoder for MeanColorEncoder {
    fn encode(&self, input: Array4<f32>) -> Result<Embedding, FaceError> {
        let means = (0..3)
            .map(|c| input.index_axis(Axis(1), c).mean().unwrap_or(0.0))
            .collect();
        Ok(Embedding::new(means))
    }
}

/// Reports the same behaviors over the whole frame every tick
pub struct FixedBehavior(pub Vec<String>);

impl FixedBehavior {
    pub fn new(labels: &[&str]) -> Self {
        Self(labels.iter().map(|l| l.to_string()).collect())
    }
}

impl BehaviorClassifier for FixedBehavior {
    fn classify(&self, frame: &VideoFrame) -> Result<Vec<BehaviorDetection>, BehaviorError> {
        Ok(self
            .0
            .iter()
            .map(|label| BehaviorDetection {
                label: label.clone(),
                bbox: BoundingBox::new(0.0, 0.0, frame.width as f32, frame.height as f32),
                confidence: 0.9,
            })
            .collect())
    }
}

pub struct BrokenBehavior;

impl BehaviorClassifier for BrokenBehavior {
    fn classify(&self, _frame: &VideoFrame) -> Result<Vec<BehaviorDetection>, BehaviorError> {
        Err(BehaviorError::Inference("malformed input".into()))
    }
}

/// One mesh spanning the frame
pub struct WholeFrameMesh;

impl LandmarkDetector for WholeFrameMesh {
    fn detect(&self, frame: &VideoFrame) -> Result<Vec<FaceLandmarks>, EmotionError> {
        let (w, h) = (frame.width as f32, frame.height as f32);
        Ok(vec![FaceLandmarks::new(vec![
            [w * 0.5, h * 0.5, 0.0],
            [0.0, 0.0, 0.0],
            [w, h, 0.0],
        ])])
    }
}

pub struct AlwaysEmotion(pub Emotion);

impl EmotionModel for AlwaysEmotion {
    fn predict(&self, _input: Array4<f32>) -> Result<Vec<f32>, EmotionError> {
        let mut scores = vec![0.0; Emotion::ALL.len()];
        if let Some(index) = Emotion::ALL.iter().position(|e| *e == self.0) {
            scores[index] = 1.0;
        }
        Ok(scores)
    }
}

pub fn extractor() -> FeatureExtractor {
    FeatureExtractor::new(Box::new(WholeFrameDetector), Box::new(MeanColorEncoder))
}

pub fn face_models() -> Models {
    Models::new(extractor(), IdentityMatcher::default())
}

pub fn emotion_classifier(emotion: Emotion) -> EmotionClassifier {
    EmotionClassifier::new(Box::new(WholeFrameMesh), Box::new(AlwaysEmotion(emotion)))
}

/// Camera producing a solid-color frame on every read
pub struct SolidCamera {
    color: Arc<std::sync::Mutex<[u8; 3]>>,
    open: bool,
    fail_open: bool,
    /// Reads left that fail with a transient error
    failing_reads: Arc<AtomicUsize>,
    sequence: u32,
}

impl SolidCamera {
    pub fn new(color: [u8; 3]) -> Self {
        Self {
            color: Arc::new(std::sync::Mutex::new(color)),
            open: false,
            fail_open: false,
            failing_reads: Arc::new(AtomicUsize::new(0)),
            sequence: 0,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            fail_open: true,
            ..Self::new([0, 0, 0])
        }
    }

    /// Handle to make the next `n` reads fail
    pub fn failing_reads(&self) -> Arc<AtomicUsize> {
        self.failing_reads.clone()
    }
}

impl FrameSource for SolidCamera {
    fn open(&mut self) -> Result<(), CameraError> {
        if self.fail_open {
            return Err(CameraError::Open("no such device".into()));
        }
        self.open = true;
        Ok(())
    }

    fn read(&mut self) -> Result<VideoFrame, CameraError> {
        if !self.open {
            return Err(CameraError::NotInitialized);
        }
        let pending = self.failing_reads.load(Ordering::SeqCst);
        if pending > 0 {
            self.failing_reads.store(pending - 1, Ordering::SeqCst);
            return Err(CameraError::Read("dropped frame".into()));
        }
        self.sequence += 1;
        let color = *self.color.lock().unwrap();
        let mut frame = VideoFrame::filled(64, 48, color);
        frame.sequence = self.sequence;
        Ok(frame)
    }

    fn release(&mut self) {
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

pub fn png(color: [u8; 3]) -> Vec<u8> {
    let image = RgbImage::from_pixel(32, 32, image::Rgb(color));
    let mut bytes = Cursor::new(Vec::new());
    image.write_to(&mut bytes, ImageFormat::Png).unwrap();
    bytes.into_inner()
}

/// Ada (red), Brian (green) and Chen (blue), with behavior weights
pub fn three_student_repository() -> Arc<Repository> {
    let repo = Repository::new();
    repo.add_student(StudentId::new("s1"), "Ada", Some(png(RED))).unwrap();
    repo.add_student(StudentId::new("s2"), "Brian", Some(png(GREEN))).unwrap();
    repo.add_student(StudentId::new("s3"), "Chen", Some(png(BLUE))).unwrap();
    repo.set_behavior_weight("raising_hand", 20.0).unwrap();
    repo.set_behavior_weight("sleeping", 5.0).unwrap();
    Arc::new(repo)
}

pub fn details() -> SessionDetails {
    SessionDetails {
        class_id: "class-7".into(),
        created_by: "teacher@example.com".into(),
    }
}

pub fn controller(
    repo: Arc<Repository>,
    models: Models,
    camera: SolidCamera,
    clock: &ManualClock,
) -> SessionController {
    controller_with(Collaborators::from_repository(repo), models, camera, clock)
}

pub fn controller_with(
    collaborators: Collaborators,
    models: Models,
    camera: SolidCamera,
    clock: &ManualClock,
) -> SessionController {
    SessionController::new(
        Arc::new(models),
        collaborators,
        Box::new(camera),
        Box::new(clock.clone()),
        details(),
        AggregatorConfig::default(),
    )
}

/// Which sink writes fail
#[derive(Debug, Clone, Copy, Default)]
pub struct SinkFaults {
    pub behaviors: bool,
    pub emotions: bool,
    pub performance: bool,
}

/// Repository-backed sink whose selected writes fail
pub struct FaultySink {
    pub repo: Arc<Repository>,
    pub faults: SinkFaults,
}

fn unavailable() -> StorageError {
    StorageError::DatabaseError("connection refused".into())
}

impl PersistenceSink for FaultySink {
    fn create_record(&self, class_id: &str, created_by: &str) -> Result<SessionRecord, StorageError> {
        self.repo.create_record(class_id, created_by)
    }

    fn append_behaviors(&self, student: &StudentId, record: RecordId, labels: &[String]) -> Result<(), StorageError> {
        if self.faults.behaviors {
            return Err(unavailable());
        }
        self.repo.append_behaviors(student, record, labels)
    }

    fn append_emotions(&self, student: &StudentId, record: RecordId, labels: &[String]) -> Result<(), StorageError> {
        if self.faults.emotions {
            return Err(unavailable());
        }
        self.repo.append_emotions(student, record, labels)
    }

    fn update_performance(&self, record: RecordId, overall_performance: f64) -> Result<(), StorageError> {
        if self.faults.performance {
            return Err(unavailable());
        }
        self.repo.update_performance(record, overall_performance)
    }
}

pub struct BrokenWeights;

impl BehaviorWeightTable for BrokenWeights {
    fn behavior_weights(&self) -> Result<HashMap<String, f64>, StorageError> {
        Err(unavailable())
    }
}

/// Roster from `repo`, writes through a sink with `faults`
pub fn faulty_collaborators(repo: &Arc<Repository>, faults: SinkFaults) -> Collaborators {
    Collaborators {
        roster: repo.clone(),
        sink: Arc::new(FaultySink {
            repo: repo.clone(),
            faults,
        }),
        weights: repo.clone(),
    }
}
