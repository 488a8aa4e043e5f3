//! Temporal deduplication of identified observations

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use emotion_recognition::Emotion;
use storage::StudentId;
use tracing::{debug, info};

use crate::config::AggregatorConfig;
use crate::{BehaviorEvent, IdentifiedObservation, ObservationKind, SessionFlush};

/// Per-student in-memory history
#[derive(Debug, Clone, Default)]
pub struct ObservationHistory {
    /// Emotion -> first sighting
    pub emotions: BTreeMap<Emotion, Duration>,
    /// Behavior label -> start of the pending window
    pub behaviors: BTreeMap<String, Duration>,
}

/// State of one `(student, behavior)` pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BehaviorWindow {
    Unseen,
    Pending { since: Duration },
}

/// Session-scoped observation aggregator
pub struct ObservationAggregator {
    config: AggregatorConfig,
    histories: HashMap<StudentId, ObservationHistory>,
    /// Students identified on the face path, with display names
    attendance: BTreeMap<StudentId, String>,
    /// Every behavior window persisted so far, in persist order
    persisted: Vec<(StudentId, String)>,
}

impl ObservationAggregator {
    pub fn new(config: AggregatorConfig) -> Self {
        Self {
            config,
            histories: HashMap::new(),
            attendance: BTreeMap::new(),
            persisted: Vec::new(),
        }
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Feed one identified observation.
    ///
    /// Returns an event when a behavior window closes, which the caller must
    /// persist immediately.
    pub fn observe(&mut self, observation: &IdentifiedObservation) -> Option<BehaviorEvent> {
        let student = &observation.student_id;
        match &observation.kind {
            ObservationKind::Face => {
                if !self.attendance.contains_key(student) {
                    info!("{} is present", observation.student_name);
                    self.attendance
                        .insert(student.clone(), observation.student_name.clone());
                }
                None
            }
            ObservationKind::Emotion(emotion) => {
                self.histories
                    .entry(student.clone())
                    .or_default()
                    .emotions
                    .entry(*emotion)
                    .or_insert(observation.timestamp);
                None
            }
            ObservationKind::Behavior(label) => self.observe_behavior(observation, label),
        }
    }

    fn observe_behavior(&mut self, observation: &IdentifiedObservation, label: &str) -> Option<BehaviorEvent> {
        let cooldown = self.config.cooldown();
        let history = self.histories.entry(observation.student_id.clone()).or_default();

        let Some(&since) = history.behaviors.get(label) else {
            debug!(
                "Opened '{}' window for {} at {:?}",
                label, observation.student_id, observation.timestamp
            );
            history.behaviors.insert(label.to_string(), observation.timestamp);
            return None;
        };

        if observation.timestamp.saturating_sub(since) < cooldown {
            return None;
        }

        history.behaviors.remove(label);
        self.persisted
            .push((observation.student_id.clone(), label.to_string()));
        info!("Behavior '{}' recorded for {}", label, observation.student_name);

        Some(BehaviorEvent {
            student_id: observation.student_id.clone(),
            student_name: observation.student_name.clone(),
            label: label.to_string(),
            first_seen: since,
            observed_at: observation.timestamp,
        })
    }

    pub fn behavior_window(&self, student: &StudentId, label: &str) -> BehaviorWindow {
        self.histories
            .get(student)
            .and_then(|history| history.behaviors.get(label))
            .map_or(BehaviorWindow::Unseen, |&since| BehaviorWindow::Pending { since })
    }

    pub fn history(&self, student: &StudentId) -> Option<&ObservationHistory> {
        self.histories.get(student)
    }

    /// Take all emotion history and every pending behavior window.
    ///
    /// Pending windows count as persisted from here on.
    pub fn flush_all(&mut self) -> SessionFlush {
        let mut flush = SessionFlush::default();

        for (student, history) in self.histories.drain() {
            let mut emotions: Vec<(Duration, Emotion)> =
                history.emotions.into_iter().map(|(e, t)| (t, e)).collect();
            emotions.sort();
            if !emotions.is_empty() {
                flush
                    .emotions
                    .insert(student.clone(), emotions.into_iter().map(|(_, e)| e).collect());
            }

            let mut behaviors: Vec<(Duration, String)> =
                history.behaviors.into_iter().map(|(label, t)| (t, label)).collect();
            behaviors.sort();
            if !behaviors.is_empty() {
                let labels: Vec<String> = behaviors.into_iter().map(|(_, label)| label).collect();
                self.persisted
                    .extend(labels.iter().map(|label| (student.clone(), label.clone())));
                flush.behaviors.insert(student, labels);
            }
        }

        debug!(
            "Flushed {} emotion and {} behavior histories",
            flush.emotions.len(),
            flush.behaviors.len()
        );
        flush
    }

    pub fn persisted_behaviors(&self) -> &[(StudentId, String)] {
        &self.persisted
    }

    /// Students seen on the face path, by id
    pub fn attendance(&self) -> &BTreeMap<StudentId, String> {
        &self.attendance
    }

    /// Drop all session state
    pub fn clear(&mut self) {
        self.histories.clear();
        self.attendance.clear();
        self.persisted.clear();
    }
}

impl Default for ObservationAggregator {
    fn default() -> Self {
        Self::new(AggregatorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    fn behavior(student: &str, label: &str, at: Duration) -> IdentifiedObservation {
        IdentifiedObservation {
            student_id: StudentId::new(student),
            student_name: student.to_uppercase(),
            kind: ObservationKind::Behavior(label.to_string()),
            timestamp: at,
        }
    }

    fn emotion(student: &str, emotion: Emotion, at: Duration) -> IdentifiedObservation {
        IdentifiedObservation {
            student_id: StudentId::new(student),
            student_name: student.to_uppercase(),
            kind: ObservationKind::Emotion(emotion),
            timestamp: at,
        }
    }

    #[test]
    fn test_window_suppresses_within_cooldown() {
        let mut aggregator = ObservationAggregator::default();
        let s1 = StudentId::new("s1");

        assert!(aggregator.observe(&behavior("s1", "X", secs(0))).is_none());
        assert_eq!(aggregator.behavior_window(&s1, "X"), BehaviorWindow::Pending { since: secs(0) });

        assert!(aggregator.observe(&behavior("s1", "X", secs(5))).is_none());
        assert_eq!(aggregator.behavior_window(&s1, "X"), BehaviorWindow::Pending { since: secs(0) });
        assert!(aggregator.persisted_behaviors().is_empty());
    }

    #[test]
    fn test_window_emits_at_cooldown_and_reopens() {
        let mut aggregator = ObservationAggregator::default();
        let s1 = StudentId::new("s1");

        aggregator.observe(&behavior("s1", "X", secs(0)));
        let event = aggregator.observe(&behavior("s1", "X", secs(12))).unwrap();
        assert_eq!(event.label, "X");
        assert_eq!(event.first_seen, secs(0));
        assert_eq!(event.observed_at, secs(12));
        assert_eq!(aggregator.behavior_window(&s1, "X"), BehaviorWindow::Unseen);

        // Next sighting opens a fresh window
        assert!(aggregator.observe(&behavior("s1", "X", secs(13))).is_none());
        assert_eq!(aggregator.behavior_window(&s1, "X"), BehaviorWindow::Pending { since: secs(13) });
    }

    #[test]
    fn test_exact_cooldown_boundary_emits() {
        let mut aggregator = ObservationAggregator::default();
        aggregator.observe(&behavior("s1", "X", secs(0)));
        assert!(aggregator.observe(&behavior("s1", "X", Duration::from_millis(9_999))).is_none());
        assert!(aggregator.observe(&behavior("s1", "X", secs(10))).is_some());
    }

    #[test]
    fn test_windows_are_per_student_and_label() {
        let mut aggregator = ObservationAggregator::default();
        aggregator.observe(&behavior("s1", "X", secs(0)));
        aggregator.observe(&behavior("s1", "Y", secs(8)));
        aggregator.observe(&behavior("s2", "X", secs(9)));

        let event = aggregator.observe(&behavior("s1", "X", secs(11))).unwrap();
        assert_eq!(event.student_id, StudentId::new("s1"));
        assert!(aggregator.observe(&behavior("s1", "Y", secs(11))).is_none());
        assert!(aggregator.observe(&behavior("s2", "X", secs(11))).is_none());
    }

    #[test]
    fn test_flush_collects_emotions_and_pending() {
        let mut aggregator = ObservationAggregator::default();
        aggregator.observe(&emotion("s1", Emotion::Sad, secs(3)));
        aggregator.observe(&emotion("s1", Emotion::Happy, secs(1)));
        aggregator.observe(&emotion("s1", Emotion::Happy, secs(4)));
        aggregator.observe(&behavior("s1", "Y", secs(2)));
        aggregator.observe(&behavior("s1", "X", secs(1)));
        aggregator.observe(&behavior("s2", "X", secs(0)));
        aggregator.observe(&behavior("s2", "X", secs(10)));

        let flush = aggregator.flush_all();
        let s1 = StudentId::new("s1");
        assert_eq!(flush.emotions[&s1], vec![Emotion::Happy, Emotion::Sad]);
        assert_eq!(flush.emotion_labels(&s1), vec!["Happy".to_string(), "Sad".to_string()]);
        assert_eq!(flush.behaviors[&s1], vec!["X".to_string(), "Y".to_string()]);
        // s2's window already closed mid-session
        assert!(!flush.behaviors.contains_key(&StudentId::new("s2")));
        assert_eq!(aggregator.persisted_behaviors().len(), 3);

        // Histories are gone afterwards
        assert!(aggregator.flush_all().is_empty());
    }

    #[test]
    fn test_overall_performance_counts_pending_windows_only() {
        let weights = HashMap::from([
            ("A".to_string(), 10.0),
            ("B".to_string(), 30.0),
            ("C".to_string(), 20.0),
        ]);
        let mut aggregator = ObservationAggregator::default();
        assert_eq!(aggregator.flush_all().overall_performance(&weights), 0.0);

        // C closes mid-session and is left out of the stop-time score
        aggregator.observe(&behavior("s1", "C", secs(0)));
        assert!(aggregator.observe(&behavior("s1", "C", secs(10))).is_some());
        aggregator.observe(&behavior("s1", "A", secs(11)));
        aggregator.observe(&behavior("s2", "B", secs(12)));

        let flush = aggregator.flush_all();
        assert_eq!(flush.overall_performance(&weights), 100.0);
        assert_eq!(aggregator.persisted_behaviors().len(), 3);
    }

    #[test]
    fn test_closed_window_alone_scores_zero() {
        let weights = HashMap::from([("sleeping".to_string(), 5.0)]);
        let mut aggregator = ObservationAggregator::default();
        aggregator.observe(&behavior("s1", "sleeping", secs(0)));
        assert!(aggregator.observe(&behavior("s1", "sleeping", secs(10))).is_some());

        let flush = aggregator.flush_all();
        assert!(flush.behaviors.is_empty());
        assert_eq!(flush.overall_performance(&weights), 0.0);
    }

    #[test]
    fn test_attendance_and_clear() {
        let mut aggregator = ObservationAggregator::default();
        let face = IdentifiedObservation {
            student_id: StudentId::new("s1"),
            student_name: "Ada".into(),
            kind: ObservationKind::Face,
            timestamp: secs(0),
        };
        aggregator.observe(&face);
        aggregator.observe(&face);
        assert_eq!(aggregator.attendance().len(), 1);
        assert_eq!(aggregator.attendance()[&StudentId::new("s1")], "Ada");

        aggregator.observe(&behavior("s1", "X", secs(0)));
        aggregator.clear();
        assert!(aggregator.attendance().is_empty());
        assert!(aggregator.history(&StudentId::new("s1")).is_none());
    }

    proptest! {
        #[test]
        fn every_window_is_persisted_once(gaps in prop::collection::vec(0u64..25, 1..40)) {
            let mut aggregator = ObservationAggregator::default();
            let mut at = 0u64;
            let mut emitted = Vec::new();
            for gap in gaps {
                at += gap;
                if let Some(event) = aggregator.observe(&behavior("s1", "X", secs(at))) {
                    emitted.push(event);
                }
            }
            let pending = aggregator.flush_all().behaviors.values().map(Vec::len).sum::<usize>();

            prop_assert!(pending <= 1);
            prop_assert_eq!(aggregator.persisted_behaviors().len(), emitted.len() + pending);
            for event in &emitted {
                prop_assert!(event.observed_at - event.first_seen >= secs(10));
            }
            for pair in emitted.windows(2) {
                prop_assert!(pair[1].first_seen >= pair[0].observed_at);
            }
        }
    }
}
