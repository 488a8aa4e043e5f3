//! Observation Aggregation
//!
//! Turns per-frame identified detections into persisted history:
//! - Behavior cool-down windows (`unseen -> pending -> flushed`)
//! - First-sighting emotion history, flushed at session end
//! - Face attendance
//! - Overall performance score from weighted behavior observations

mod aggregator;
mod config;
mod score;

pub use aggregator::{BehaviorWindow, ObservationAggregator, ObservationHistory};
pub use config::AggregatorConfig;
pub use score::{performance_score, MAX_BEHAVIOR_WEIGHT};

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use emotion_recognition::Emotion;
use serde::Serialize;
use storage::StudentId;

/// What was observed about a student
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum ObservationKind {
    Face,
    Emotion(Emotion),
    Behavior(String),
}

/// A detection resolved to a known student.
///
/// `timestamp` is measured from session start.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentifiedObservation {
    pub student_id: StudentId,
    pub student_name: String,
    pub kind: ObservationKind,
    pub timestamp: Duration,
}

/// A behavior window that closed mid-session and must be persisted now
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BehaviorEvent {
    pub student_id: StudentId,
    pub student_name: String,
    pub label: String,
    /// Start of the window
    pub first_seen: Duration,
    /// Re-observation that closed it
    pub observed_at: Duration,
}

/// Everything still held in memory when the session stops
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionFlush {
    /// Emotions per student, in first-seen order
    pub emotions: BTreeMap<StudentId, Vec<Emotion>>,
    /// Behavior windows still pending, in opening order
    pub behaviors: BTreeMap<StudentId, Vec<String>>,
}

impl SessionFlush {
    pub fn is_empty(&self) -> bool {
        self.emotions.is_empty() && self.behaviors.is_empty()
    }

    /// Emotion labels as persisted
    pub fn emotion_labels(&self, student: &StudentId) -> Vec<String> {
        self.emotions
            .get(student)
            .map(|emotions| emotions.iter().map(|e| e.to_string()).collect())
            .unwrap_or_default()
    }

    /// Stop-time score over the windows still pending at stop.
    ///
    /// Windows already closed mid-session were persisted then and do not
    /// count here.
    pub fn overall_performance(&self, weights: &HashMap<String, f64>) -> f64 {
        performance_score(self.behaviors.values().flatten().map(String::as_str), weights)
    }
}
