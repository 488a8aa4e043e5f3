//! Report suggestions, fetched off the tick loop

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use storage::RecordId;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Suggestion error types
#[derive(Error, Debug)]
pub enum SuggestionError {
    #[error("Suggestion service unavailable: {0}")]
    Unavailable(String),

    #[error("Suggestion request failed: {0}")]
    Request(String),
}

/// Report-suggestion collaborator
pub trait SuggestionService: Send + Sync {
    fn suggest(&self, emotions: &[String], behaviors: &[String]) -> Result<Vec<String>, SuggestionError>;
}

/// What the display surface shows for a record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "lowercase")]
pub enum SuggestionUpdate {
    Pending,
    Ready(Vec<String>),
    Failed(String),
}

/// Runs suggestion fetches on blocking tasks and reports back over a channel
#[derive(Clone)]
pub struct SuggestionWorker {
    service: Arc<dyn SuggestionService>,
    updates: mpsc::Sender<(RecordId, SuggestionUpdate)>,
}

impl SuggestionWorker {
    pub fn new(service: Arc<dyn SuggestionService>, updates: mpsc::Sender<(RecordId, SuggestionUpdate)>) -> Self {
        Self { service, updates }
    }

    /// Post `Pending` right away, then the outcome once the service answers
    pub fn request(&self, record: RecordId, emotions: Vec<String>, behaviors: Vec<String>) -> JoinHandle<()> {
        let service = self.service.clone();
        let updates = self.updates.clone();

        tokio::task::spawn_blocking(move || {
            if updates.blocking_send((record, SuggestionUpdate::Pending)).is_err() {
                return;
            }
            let update = match service.suggest(&emotions, &behaviors) {
                Ok(lines) => {
                    info!("Received {} suggestions for record {}", lines.len(), record);
                    SuggestionUpdate::Ready(lines)
                }
                Err(e) => {
                    warn!("Suggestion fetch for record {} failed: {}", record, e);
                    SuggestionUpdate::Failed(format!("Error fetching suggestions: {}", e))
                }
            };
            if updates.blocking_send((record, update)).is_err() {
                warn!("Suggestion display closed before record {} was delivered", record);
            }
        })
    }
}

/// Display surface: the latest update per record
#[derive(Debug, Default)]
pub struct SuggestionBoard {
    entries: HashMap<RecordId, SuggestionUpdate>,
}

impl SuggestionBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, record: RecordId, update: SuggestionUpdate) {
        self.entries.insert(record, update);
    }

    pub fn get(&self, record: &RecordId) -> Option<&SuggestionUpdate> {
        self.entries.get(record)
    }
}

/// Guidance lines looked up by behavior label
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TableSuggestions {
    pub by_behavior: HashMap<String, String>,
    pub by_emotion: HashMap<String, String>,
}

impl SuggestionService for TableSuggestions {
    fn suggest(&self, emotions: &[String], behaviors: &[String]) -> Result<Vec<String>, SuggestionError> {
        if self.by_behavior.is_empty() && self.by_emotion.is_empty() {
            return Err(SuggestionError::Unavailable("no suggestions configured".into()));
        }

        let mut lines: Vec<String> = Vec::new();
        let found = behaviors
            .iter()
            .filter_map(|b| self.by_behavior.get(b))
            .chain(emotions.iter().filter_map(|e| self.by_emotion.get(e)));
        for line in found {
            if !lines.contains(line) {
                lines.push(line.clone());
            }
        }
        Ok(lines)
    }
}
