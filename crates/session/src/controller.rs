//! Session state machine and per-frame tick

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use camera_capture::{BoundingBox, FrameSource, VideoFrame};
use face_recognition::{Identity, Roster};
use image::RgbImage;
use observation::{AggregatorConfig, BehaviorEvent, IdentifiedObservation, ObservationAggregator, ObservationKind};
use serde::{Deserialize, Serialize};
use storage::{BehaviorWeightTable, PersistenceSink, RecordId, Repository, RosterSource, SessionRecord, StudentId};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::models::Models;
use crate::overlay::{Overlay, GREEN};
use crate::{SessionError, SessionState, Toggles};

/// External collaborators a session reads from and writes to
#[derive(Clone)]
pub struct Collaborators {
    pub roster: Arc<dyn RosterSource>,
    pub sink: Arc<dyn PersistenceSink>,
    pub weights: Arc<dyn BehaviorWeightTable>,
}

impl Collaborators {
    /// All three ports served by one repository
    pub fn from_repository(repository: Arc<Repository>) -> Self {
        Self {
            roster: repository.clone(),
            sink: repository.clone(),
            weights: repository,
        }
    }
}

/// Who is running the session, for which class
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionDetails {
    pub class_id: String,
    pub created_by: String,
}

/// Output of one completed tick
#[derive(Debug, Clone)]
pub struct TickReport {
    pub sequence: u32,
    /// Time since session start
    pub timestamp: Duration,
    pub fps: f32,
    pub observations: Vec<IdentifiedObservation>,
    /// Behavior windows closed (and persisted) during this tick
    pub events: Vec<BehaviorEvent>,
    /// Shapes and captions drawn onto `annotated`
    pub overlay: Overlay,
    pub annotated: Option<RgbImage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttendanceEntry {
    pub student_id: StudentId,
    pub student_name: String,
}

/// Point-in-time view of the session
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub state: SessionState,
    pub record_id: Option<RecordId>,
    pub class_id: String,
    pub toggles: Toggles,
    pub ticks: u64,
    pub fps: f32,
    pub roster_size: usize,
    pub attendance: Vec<AttendanceEntry>,
    pub last_observations: Vec<IdentifiedObservation>,
}

/// Final aggregates written at stop
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub record_id: RecordId,
    pub overall_performance: f64,
    pub attendance: Vec<AttendanceEntry>,
    /// Every persisted behavior window, per student
    pub behaviors: BTreeMap<StudentId, Vec<String>>,
    /// Emotions first seen per student
    pub emotions: BTreeMap<StudentId, Vec<String>>,
}

/// Drives one session over a camera, from `start` to `stop`.
///
/// Owns the camera, the roster snapshot and the aggregator for the whole
/// session. All classifier and persistence faults during a tick are logged
/// and dropped.
pub struct SessionController {
    models: Arc<Models>,
    collaborators: Collaborators,
    camera: Box<dyn FrameSource>,
    clock: Box<dyn Clock>,
    details: SessionDetails,
    state: SessionState,
    toggles: Toggles,
    roster: Roster,
    aggregator: ObservationAggregator,
    record: Option<SessionRecord>,
    started_at: Duration,
    ticks: u64,
    fps: f32,
    last_observations: Vec<IdentifiedObservation>,
    last_frame: Option<RgbImage>,
}

impl SessionController {
    pub fn new(
        models: Arc<Models>,
        collaborators: Collaborators,
        camera: Box<dyn FrameSource>,
        clock: Box<dyn Clock>,
        details: SessionDetails,
        config: AggregatorConfig,
    ) -> Self {
        Self {
            models,
            collaborators,
            camera,
            clock,
            details,
            state: SessionState::Idle,
            toggles: Toggles::default(),
            roster: Roster::default(),
            aggregator: ObservationAggregator::new(config),
            record: None,
            started_at: Duration::ZERO,
            ticks: 0,
            fps: 0.0,
            last_observations: Vec::new(),
            last_frame: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn record(&self) -> Option<&SessionRecord> {
        self.record.as_ref()
    }

    pub fn toggles(&self) -> Toggles {
        self.toggles
    }

    pub fn set_toggles(&mut self, toggles: Toggles) {
        info!("Classifier toggles set to {:?}", toggles);
        self.toggles = toggles;
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Latest annotated frame
    pub fn last_frame(&self) -> Option<&RgbImage> {
        self.last_frame.as_ref()
    }

    /// Start or resume.
    ///
    /// From `Idle` this opens the camera, snapshots the roster and creates
    /// the record; any failure there leaves the session `Idle`. From
    /// `Paused` it resumes with the same record.
    pub fn start(&mut self) -> Result<RecordId, SessionError> {
        match self.state {
            SessionState::Idle => self.begin(),
            SessionState::Paused => {
                self.state = SessionState::Running;
                info!("Session resumed");
                self.record_id()
            }
            SessionState::Running => self.record_id(),
            SessionState::Stopped => Err(SessionError::AlreadyStopped),
        }
    }

    fn begin(&mut self) -> Result<RecordId, SessionError> {
        self.camera.open()?;

        let roster = match Roster::load(self.collaborators.roster.as_ref(), &self.models.extractor) {
            Ok(roster) => roster,
            Err(e) => {
                self.camera.release();
                return Err(e.into());
            }
        };

        let record = match self
            .collaborators
            .sink
            .create_record(&self.details.class_id, &self.details.created_by)
        {
            Ok(record) => record,
            Err(e) => {
                self.camera.release();
                return Err(e.into());
            }
        };

        info!(
            "Session {} started for class '{}' with {} known faces",
            record.id,
            self.details.class_id,
            roster.len()
        );
        let id = record.id;
        self.roster = roster;
        self.record = Some(record);
        self.started_at = self.clock.now();
        self.state = SessionState::Running;
        Ok(id)
    }

    fn record_id(&self) -> Result<RecordId, SessionError> {
        self.record.as_ref().map(|r| r.id).ok_or(SessionError::NotStarted)
    }

    /// Toggle `Running <-> Paused`. No effect otherwise.
    pub fn pause(&mut self) -> SessionState {
        match self.state {
            SessionState::Running => {
                self.state = SessionState::Paused;
                info!("Session paused");
            }
            SessionState::Paused => {
                self.state = SessionState::Running;
                info!("Session resumed");
            }
            SessionState::Idle | SessionState::Stopped => {
                debug!("Pause ignored in {:?}", self.state);
            }
        }
        self.state
    }

    /// Process one frame. Returns `None` when not running or when the
    /// frame could not be acquired.
    pub fn tick(&mut self) -> Option<TickReport> {
        if self.state != SessionState::Running {
            return None;
        }
        let record_id = self.record.as_ref()?.id;

        let tick_start = self.clock.now();
        let frame = match self.camera.read() {
            Ok(frame) => frame,
            Err(e) => {
                if e.is_transient() {
                    debug!("Skipping tick: {}", e);
                } else {
                    warn!("Skipping tick: {}", e);
                }
                metrics::counter!("classroom_frames_skipped_total").increment(1);
                return None;
            }
        };
        let timestamp = tick_start.saturating_sub(self.started_at);

        let mut overlay = Overlay::default();
        let mut observations = Vec::new();
        if self.toggles.face {
            self.face_path(&frame, timestamp, &mut overlay, &mut observations);
        }
        if self.toggles.emotion {
            self.emotion_path(&frame, timestamp, &mut overlay, &mut observations);
        }
        if self.toggles.behavior {
            self.behavior_path(&frame, timestamp, &mut overlay, &mut observations);
        }

        let mut events = Vec::new();
        for observation in &observations {
            let Some(event) = self.aggregator.observe(observation) else {
                continue;
            };
            if let Err(e) = self.collaborators.sink.append_behaviors(
                &event.student_id,
                record_id,
                std::slice::from_ref(&event.label),
            ) {
                warn!("Failed to save behavior {} for student {}: {}", event.label, event.student_id, e);
            }
            metrics::counter!("classroom_behavior_events_total").increment(1);
            events.push(event);
        }

        let annotated = overlay.render(&frame, self.models.caption_font.as_ref());
        let elapsed = self.clock.now().saturating_sub(tick_start).as_secs_f32();
        self.fps = if elapsed > 0.0 { 1.0 / elapsed } else { 0.0 };
        self.ticks += 1;
        metrics::counter!("classroom_ticks_total").increment(1);
        metrics::gauge!("classroom_fps").set(self.fps as f64);
        debug!(
            "Tick {} at {:?}: {} observations, {:.2} fps",
            self.ticks,
            timestamp,
            observations.len(),
            self.fps
        );

        self.last_observations = observations.clone();
        self.last_frame = annotated.clone();
        Some(TickReport {
            sequence: frame.sequence,
            timestamp,
            fps: self.fps,
            observations,
            events,
            overlay,
            annotated,
        })
    }

    fn face_path(
        &self,
        frame: &VideoFrame,
        timestamp: Duration,
        overlay: &mut Overlay,
        observations: &mut Vec<IdentifiedObservation>,
    ) {
        let encodings = match self.models.extractor.extract(frame) {
            Ok(encodings) => encodings,
            Err(e) => {
                classifier_failed("face", &e);
                return;
            }
        };
        debug!("Detected {} faces", encodings.len());

        for encoding in encodings {
            let Some(identity) = self.models.matcher.identify(&encoding.embedding, &self.roster) else {
                continue;
            };
            overlay.faces.push(encoding.bbox);
            overlay.caption(encoding.bbox.x1, encoding.bbox.y1, identity.student_name.clone(), GREEN);
            observations.push(observed(identity, ObservationKind::Face, timestamp));
        }
    }

    fn emotion_path(
        &self,
        frame: &VideoFrame,
        timestamp: Duration,
        overlay: &mut Overlay,
        observations: &mut Vec<IdentifiedObservation>,
    ) {
        let Some(classifier) = &self.models.emotion else {
            return;
        };
        let detections = match classifier.classify(frame) {
            Ok(detections) => detections,
            Err(e) => {
                classifier_failed("emotion", &e);
                return;
            }
        };

        for detection in detections {
            let Some(region) = detection.landmarks.bounding_box() else {
                continue;
            };
            let Some(identity) = self.identify_region(frame, &region) else {
                continue;
            };
            overlay
                .landmarks
                .extend(detection.landmarks.points.iter().map(|p| (p[0], p[1])));
            if let Some((x, y)) = detection.landmarks.anchor() {
                overlay.caption(x, y, format!("Emotion: {}", detection.emotion), GREEN);
            }
            observations.push(observed(identity, ObservationKind::Emotion(detection.emotion), timestamp));
        }
    }

    fn behavior_path(
        &self,
        frame: &VideoFrame,
        timestamp: Duration,
        overlay: &mut Overlay,
        observations: &mut Vec<IdentifiedObservation>,
    ) {
        let Some(classifier) = &self.models.behavior else {
            return;
        };
        let detections = match classifier.classify(frame) {
            Ok(detections) => detections,
            Err(e) => {
                classifier_failed("behavior", &e);
                return;
            }
        };

        for detection in detections {
            let Some(identity) = self.identify_region(frame, &detection.bbox) else {
                continue;
            };
            overlay.behaviors.push(detection.bbox);
            observations.push(observed(identity, ObservationKind::Behavior(detection.label), timestamp));
        }
    }

    /// Fresh embedding of the first face inside `region`, matched against the roster
    fn identify_region(&self, frame: &VideoFrame, region: &BoundingBox) -> Option<Identity> {
        match self.models.extractor.encode_region(frame, region) {
            Ok(Some(embedding)) => self.models.matcher.identify(&embedding, &self.roster),
            Ok(None) => None,
            Err(e) => {
                classifier_failed("face", &e);
                None
            }
        }
    }

    /// Release the camera, persist everything still in memory and write the
    /// final score.
    ///
    /// Persistence failures are logged; the summary is returned regardless.
    pub fn stop(&mut self) -> Result<SessionSummary, SessionError> {
        match self.state {
            SessionState::Idle => return Err(SessionError::NotStarted),
            SessionState::Stopped => return Err(SessionError::AlreadyStopped),
            SessionState::Running | SessionState::Paused => {}
        }
        let record_id = self.record_id()?;

        self.camera.release();
        let sink = self.collaborators.sink.clone();

        let flush = self.aggregator.flush_all();
        for (student, labels) in &flush.behaviors {
            if let Err(e) = sink.append_behaviors(student, record_id, labels) {
                warn!("Failed to save behaviors for student {}: {}", student, e);
            }
        }
        let mut emotions = BTreeMap::new();
        for student in flush.emotions.keys() {
            let labels = flush.emotion_labels(student);
            if let Err(e) = sink.append_emotions(student, record_id, &labels) {
                warn!("Failed to save emotions for student {}: {}", student, e);
            }
            emotions.insert(student.clone(), labels);
        }

        let weights = self.collaborators.weights.behavior_weights().unwrap_or_else(|e| {
            warn!("Failed to load behavior weights, scoring with none: {}", e);
            HashMap::new()
        });
        let overall_performance = flush.overall_performance(&weights);
        if let Err(e) = sink.update_performance(record_id, overall_performance) {
            warn!("Failed to save overall performance: {}", e);
        }
        if let Some(record) = self.record.as_mut() {
            record.overall_performance = overall_performance;
        }

        let mut behaviors: BTreeMap<StudentId, Vec<String>> = BTreeMap::new();
        for (student, label) in self.aggregator.persisted_behaviors() {
            behaviors.entry(student.clone()).or_default().push(label.clone());
        }
        let summary = SessionSummary {
            record_id,
            overall_performance,
            attendance: self.attendance(),
            behaviors,
            emotions,
        };

        self.aggregator.clear();
        self.roster = Roster::default();
        self.state = SessionState::Stopped;
        info!(
            "Session {} stopped after {} ticks, overall performance {:.1}",
            record_id, self.ticks, overall_performance
        );
        Ok(summary)
    }

    fn attendance(&self) -> Vec<AttendanceEntry> {
        self.aggregator
            .attendance()
            .iter()
            .map(|(id, name)| AttendanceEntry {
                student_id: id.clone(),
                student_name: name.clone(),
            })
            .collect()
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            state: self.state,
            record_id: self.record.as_ref().map(|r| r.id),
            class_id: self.details.class_id.clone(),
            toggles: self.toggles,
            ticks: self.ticks,
            fps: self.fps,
            roster_size: self.roster.len(),
            attendance: self.attendance(),
            last_observations: self.last_observations.clone(),
        }
    }
}

fn observed(identity: Identity, kind: ObservationKind, timestamp: Duration) -> IdentifiedObservation {
    IdentifiedObservation {
        student_id: identity.student_id,
        student_name: identity.student_name,
        kind,
        timestamp,
    }
}

fn classifier_failed(classifier: &'static str, error: &dyn std::fmt::Display) {
    warn!("{} classifier failed: {}", classifier, error);
    metrics::counter!("classroom_classifier_failures_total", "classifier" => classifier).increment(1);
}
