//! Classroom Monitoring Session
//!
//! Orchestrates one monitoring session end to end:
//! - `SessionController` state machine and per-frame tick
//! - Identity fusion across the face, emotion and behavior classifiers
//! - Overlay rendering and frame rate
//! - Blocking tick-loop worker driven over a command channel
//! - Background report suggestions

pub mod clock;
pub mod controller;
pub mod models;
pub mod overlay;
pub mod runner;
pub mod suggestions;

pub use clock::{Clock, ManualClock, SystemClock};
pub use controller::{
    AttendanceEntry, Collaborators, SessionController, SessionDetails, SessionStatus, SessionSummary,
    TickReport,
};
pub use models::{Models, ModelsConfig};
pub use overlay::{Caption, Overlay};
pub use runner::{spawn_session, SessionCommand, SessionHandle};
pub use suggestions::{
    SuggestionBoard, SuggestionError, SuggestionService, SuggestionUpdate, SuggestionWorker, TableSuggestions,
};

use behavior_detection::BehaviorError;
use camera_capture::CameraError;
use emotion_recognition::EmotionError;
use face_recognition::FaceError;
use serde::{Deserialize, Serialize};
use storage::StorageError;
use thiserror::Error;

/// Session error types
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session not started")]
    NotStarted,

    #[error("Session already stopped")]
    AlreadyStopped,

    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Face recognition error: {0}")]
    Face(#[from] FaceError),

    #[error("Emotion recognition error: {0}")]
    Emotion(#[from] EmotionError),

    #[error("Behavior detection error: {0}")]
    Behavior(#[from] BehaviorError),

    #[error("Caption font error: {0}")]
    Font(String),

    #[error("Session worker is not running")]
    WorkerGone,
}

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Running,
    Paused,
    /// Terminal
    Stopped,
}

/// Per-classifier switches, changeable while a session runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Toggles {
    pub face: bool,
    pub emotion: bool,
    pub behavior: bool,
}

impl Default for Toggles {
    fn default() -> Self {
        Self {
            face: true,
            emotion: true,
            behavior: true,
        }
    }
}
