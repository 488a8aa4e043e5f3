//! Student Face Recognition
//!
//! Identity resolution for the monitoring pipeline:
//! - Face detection and embedding extraction (`FeatureExtractor`)
//! - Roster snapshot built from enrolled student images
//! - Nearest-neighbor identity matching with metric fallback

pub mod config;
pub mod embedding;
pub mod extractor;
pub mod matcher;
pub mod onnx;
pub mod roster;

pub use config::FaceConfig;
pub use embedding::Embedding;
pub use extractor::{FaceBox, FaceDetector, FaceEncoder, FaceEncoding, FeatureExtractor};
pub use matcher::{Identity, IdentityMatcher, MatchOutcome, MatcherConfig, Metric};
pub use onnx::{OrtFaceDetector, OrtFaceEncoder};
pub use roster::{KnownFace, Roster};

use thiserror::Error;

/// Face recognition error types
#[derive(Error, Debug)]
pub enum FaceError {
    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Image processing failed: {0}")]
    ImageProcessing(String),

    #[error("Roster source failed: {0}")]
    Roster(#[from] storage::StorageError),
}
