//! Repository Implementation

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use tracing::{debug, info};

use crate::model::{HistoryEntry, RecordDetails, RecordId, SessionRecord, StudentFace, StudentId};
use crate::{BehaviorWeightTable, PersistenceSink, RosterSource, StorageError};

/// Enrolled student (face image optional)
#[derive(Debug, Clone)]
struct StudentEntry {
    id: StudentId,
    name: String,
    face_image: Option<Vec<u8>>,
}

/// Repository for data access (in-memory implementation)
pub struct Repository {
    /// Enrolled students
    students: Mutex<Vec<StudentEntry>>,
    /// Behavior label -> weight
    behavior_weights: Mutex<HashMap<String, f64>>,
    /// Session records, in creation order
    records: Mutex<Vec<SessionRecord>>,
    /// Behavior history, one entry per (student, record)
    behavior_history: Mutex<Vec<HistoryEntry>>,
    /// Emotion history, one entry per (student, record)
    emotion_history: Mutex<Vec<HistoryEntry>>,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StorageError> {
    mutex
        .lock()
        .map_err(|e| StorageError::DatabaseError(format!("Lock error: {}", e)))
}

impl Repository {
    /// Create a new in-memory repository
    pub fn new() -> Self {
        info!("Creating in-memory repository");
        Self {
            students: Mutex::new(Vec::new()),
            behavior_weights: Mutex::new(HashMap::new()),
            records: Mutex::new(Vec::new()),
            behavior_history: Mutex::new(Vec::new()),
            emotion_history: Mutex::new(Vec::new()),
        }
    }

    /// Enroll or replace a student
    pub fn add_student(
        &self,
        id: StudentId,
        name: impl Into<String>,
        face_image: Option<Vec<u8>>,
    ) -> Result<(), StorageError> {
        let mut students = lock(&self.students)?;
        let entry = StudentEntry {
            id,
            name: name.into(),
            face_image,
        };
        match students.iter_mut().find(|s| s.id == entry.id) {
            Some(existing) => *existing = entry,
            None => students.push(entry),
        }
        Ok(())
    }

    /// Set the weight of a behavior label
    pub fn set_behavior_weight(&self, behavior: impl Into<String>, weight: f64) -> Result<(), StorageError> {
        lock(&self.behavior_weights)?.insert(behavior.into(), weight);
        Ok(())
    }

    /// Most recent records first
    pub fn get_records(&self, limit: usize) -> Result<Vec<SessionRecord>, StorageError> {
        let records = lock(&self.records)?;
        Ok(records.iter().rev().take(limit).cloned().collect())
    }

    /// A record with its behavior and emotion histories
    pub fn get_record(&self, id: RecordId) -> Result<RecordDetails, StorageError> {
        let record = lock(&self.records)?
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or(StorageError::NotFound)?;

        let behaviors = Self::entries_for(&lock(&self.behavior_history)?, id);
        let emotions = Self::entries_for(&lock(&self.emotion_history)?, id);

        Ok(RecordDetails {
            record,
            behaviors,
            emotions,
        })
    }

    fn entries_for(history: &[HistoryEntry], id: RecordId) -> Vec<HistoryEntry> {
        history.iter().filter(|e| e.record_id == id).cloned().collect()
    }

    fn append(
        history: &Mutex<Vec<HistoryEntry>>,
        student: &StudentId,
        record: RecordId,
        labels: &[String],
    ) -> Result<(), StorageError> {
        let mut history = lock(history)?;
        match history
            .iter_mut()
            .find(|e| &e.student_id == student && e.record_id == record)
        {
            Some(entry) => entry.labels.extend_from_slice(labels),
            None => history.push(HistoryEntry {
                student_id: student.clone(),
                record_id: record,
                labels: labels.to_vec(),
            }),
        }
        Ok(())
    }

    /// Get total record count
    pub fn record_count(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// Get total student count
    pub fn student_count(&self) -> usize {
        self.students.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub(crate) fn all_records(&self) -> Result<Vec<SessionRecord>, StorageError> {
        Ok(lock(&self.records)?.clone())
    }

    pub(crate) fn all_behavior_history(&self) -> Result<Vec<HistoryEntry>, StorageError> {
        Ok(lock(&self.behavior_history)?.clone())
    }

    pub(crate) fn all_emotion_history(&self) -> Result<Vec<HistoryEntry>, StorageError> {
        Ok(lock(&self.emotion_history)?.clone())
    }

    pub(crate) fn restore(
        &self,
        records: Vec<SessionRecord>,
        behaviors: Vec<HistoryEntry>,
        emotions: Vec<HistoryEntry>,
    ) -> Result<(), StorageError> {
        lock(&self.records)?.extend(records);
        lock(&self.behavior_history)?.extend(behaviors);
        lock(&self.emotion_history)?.extend(emotions);
        Ok(())
    }

    /// Clear all session data (for testing)
    pub fn clear(&self) {
        if let Ok(mut records) = self.records.lock() {
            records.clear();
        }
        if let Ok(mut history) = self.behavior_history.lock() {
            history.clear();
        }
        if let Ok(mut history) = self.emotion_history.lock() {
            history.clear();
        }
    }
}

impl Default for Repository {
    fn default() -> Self {
        Self::new()
    }
}

impl RosterSource for Repository {
    fn students_with_faces(&self) -> Result<Vec<StudentFace>, StorageError> {
        let students = lock(&self.students)?;
        Ok(students
            .iter()
            .filter_map(|s| {
                s.face_image.as_ref().map(|image| StudentFace {
                    id: s.id.clone(),
                    name: s.name.clone(),
                    image: image.clone(),
                })
            })
            .collect())
    }
}

impl BehaviorWeightTable for Repository {
    fn behavior_weights(&self) -> Result<HashMap<String, f64>, StorageError> {
        Ok(lock(&self.behavior_weights)?.clone())
    }
}

impl PersistenceSink for Repository {
    fn create_record(&self, class_id: &str, created_by: &str) -> Result<SessionRecord, StorageError> {
        let record = SessionRecord {
            id: RecordId::new(),
            class_id: class_id.to_string(),
            started_at: Utc::now(),
            created_by: created_by.to_string(),
            overall_performance: 0.0,
        };
        lock(&self.records)?.push(record.clone());
        debug!("Created record {} for class {}", record.id, class_id);
        Ok(record)
    }

    fn append_behaviors(
        &self,
        student: &StudentId,
        record: RecordId,
        labels: &[String],
    ) -> Result<(), StorageError> {
        Self::append(&self.behavior_history, student, record, labels)
    }

    fn append_emotions(
        &self,
        student: &StudentId,
        record: RecordId,
        labels: &[String],
    ) -> Result<(), StorageError> {
        Self::append(&self.emotion_history, student, record, labels)
    }

    fn update_performance(&self, record: RecordId, overall_performance: f64) -> Result<(), StorageError> {
        let mut records = lock(&self.records)?;
        let entry = records
            .iter_mut()
            .find(|r| r.id == record)
            .ok_or(StorageError::NotFound)?;
        entry.overall_performance = overall_performance;
        debug!("Record {} overall performance {:.2}", record, overall_performance);
        Ok(())
    }
}
