//! Persisted record types

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Strongly-typed student identifier (opaque string key from the roster)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudentId(String);

impl StudentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StudentId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Session record identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub Uuid);

impl RecordId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Enrolled student with an encoded face image blob
#[derive(Debug, Clone)]
pub struct StudentFace {
    pub id: StudentId,
    pub name: String,
    /// Encoded image (JPEG/PNG); decoded by the caller
    pub image: Vec<u8>,
}

/// One camera-start-to-stop span
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: RecordId,
    pub class_id: String,
    pub started_at: DateTime<Utc>,
    pub created_by: String,
    pub overall_performance: f64,
}

/// Aggregated labels for one student within one record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub student_id: StudentId,
    pub record_id: RecordId,
    pub labels: Vec<String>,
}

/// A record together with its histories, for review
#[derive(Debug, Clone, Serialize)]
pub struct RecordDetails {
    pub record: SessionRecord,
    pub behaviors: Vec<HistoryEntry>,
    pub emotions: Vec<HistoryEntry>,
}

impl RecordDetails {
    /// All behavior labels of the record, flattened across students
    pub fn behavior_labels(&self) -> Vec<String> {
        self.behaviors.iter().flat_map(|e| e.labels.iter().cloned()).collect()
    }

    /// All emotion labels of the record, flattened across students
    pub fn emotion_labels(&self) -> Vec<String> {
        self.emotions.iter().flat_map(|e| e.labels.iter().cloned()).collect()
    }
}
