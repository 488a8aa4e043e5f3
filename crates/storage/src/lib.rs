//! Storage Layer
//!
//! Provides the narrow ports the monitoring core talks to (roster source,
//! behavior weight table, persistence sink) and an in-memory repository
//! implementing all three, seeded from and snapshotted to JSON.

mod model;
mod repository;
mod seed;

pub use model::{HistoryEntry, RecordDetails, RecordId, SessionRecord, StudentFace, StudentId};
pub use repository::Repository;
pub use seed::{SeedBehavior, SeedFile, SeedStudent, Snapshot};

use std::collections::HashMap;
use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Record not found")]
    NotFound,
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Read-only query over enrolled students that have a stored face image
pub trait RosterSource: Send + Sync {
    fn students_with_faces(&self) -> Result<Vec<StudentFace>, StorageError>;
}

/// Read-only behavior label to weight mapping
pub trait BehaviorWeightTable: Send + Sync {
    fn behavior_weights(&self) -> Result<HashMap<String, f64>, StorageError>;
}

/// Write side used by a monitoring session.
///
/// History appends are upserts keyed by `(student, record)`; labels
/// accumulate as a multiset.
pub trait PersistenceSink: Send + Sync {
    fn create_record(&self, class_id: &str, created_by: &str) -> Result<SessionRecord, StorageError>;

    fn append_behaviors(
        &self,
        student: &StudentId,
        record: RecordId,
        labels: &[String],
    ) -> Result<(), StorageError>;

    fn append_emotions(
        &self,
        student: &StudentId,
        record: RecordId,
        labels: &[String],
    ) -> Result<(), StorageError>;

    fn update_performance(&self, record: RecordId, overall_performance: f64) -> Result<(), StorageError>;
}
