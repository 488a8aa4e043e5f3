//! JSON seed loading and snapshot persistence for the in-memory repository

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::model::{HistoryEntry, SessionRecord, StudentId};
use crate::{Repository, StorageError};

/// Roster and reference tables loaded at startup
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub students: Vec<SeedStudent>,
    #[serde(default)]
    pub behaviors: Vec<SeedBehavior>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedStudent {
    pub id: String,
    pub name: String,
    /// Face reference image, relative paths resolve against the seed file
    #[serde(default)]
    pub face_image: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedBehavior {
    pub behavior: String,
    pub weight: f64,
}

/// Session data written on shutdown and restored on the next start
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub records: Vec<SessionRecord>,
    pub behavior_history: Vec<HistoryEntry>,
    pub emotion_history: Vec<HistoryEntry>,
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, StorageError> {
    let raw = std::fs::read(path)?;
    serde_json::from_slice(&raw)
        .map_err(|e| StorageError::SerializationError(format!("{}: {}", path.display(), e)))
}

impl Repository {
    /// Build a repository from a seed file.
    ///
    /// Students whose face image cannot be read are still enrolled, just
    /// without a face reference, so they never reach the roster.
    pub fn from_seed_file(path: &Path) -> Result<Self, StorageError> {
        let seed: SeedFile = read_json(path)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let repo = Self::from_seed(seed, base)?;
        info!(
            "Seeded repository from {} ({} students)",
            path.display(),
            repo.student_count()
        );
        Ok(repo)
    }

    /// Build a repository from an in-memory seed, resolving image paths under `base`
    pub fn from_seed(seed: SeedFile, base: &Path) -> Result<Self, StorageError> {
        let repo = Self::new();

        for student in seed.students {
            let face_image = student.face_image.and_then(|rel| {
                let path = if rel.is_absolute() { rel } else { base.join(rel) };
                match std::fs::read(&path) {
                    Ok(bytes) => Some(bytes),
                    Err(e) => {
                        warn!("Failed to read face image for {}: {} ({})", student.name, path.display(), e);
                        None
                    }
                }
            });
            repo.add_student(StudentId::new(student.id), student.name, face_image)?;
        }

        for behavior in seed.behaviors {
            repo.set_behavior_weight(behavior.behavior, behavior.weight)?;
        }

        Ok(repo)
    }

    /// Capture all session data
    pub fn snapshot(&self) -> Result<Snapshot, StorageError> {
        Ok(Snapshot {
            records: self.all_records()?,
            behavior_history: self.all_behavior_history()?,
            emotion_history: self.all_emotion_history()?,
        })
    }

    /// Write all session data as pretty JSON
    pub fn write_snapshot(&self, path: &Path) -> Result<(), StorageError> {
        let snapshot = self.snapshot()?;
        let json = serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;
        std::fs::write(path, json)?;
        info!("Wrote snapshot with {} records to {}", snapshot.records.len(), path.display());
        Ok(())
    }

    /// Append the session data of a previous snapshot; a missing file is not an error
    pub fn load_snapshot(&self, path: &Path) -> Result<usize, StorageError> {
        if !path.exists() {
            return Ok(0);
        }
        let snapshot: Snapshot = read_json(path)?;
        let count = snapshot.records.len();
        self.restore(snapshot.records, snapshot.behavior_history, snapshot.emotion_history)?;
        info!("Restored {} records from {}", count, path.display());
        Ok(count)
    }
}
