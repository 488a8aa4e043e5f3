//! Nearest-neighbor identity matching against the roster

use serde::{Deserialize, Serialize};
use storage::StudentId;
use tracing::debug;

use crate::embedding::{cosine_distance, euclidean_distance, Embedding};
use crate::roster::Roster;

/// Matched student
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub student_id: StudentId,
    pub student_name: String,
}

/// Distance metric selected for a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Metric {
    /// Query and roster share dimensionality
    Euclidean,
    /// Dimensionality differs; cosine over a fixed prefix of the roster vectors
    CosinePrefix,
}

/// Full result of one lookup
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchOutcome {
    pub identity: Option<Identity>,
    pub metric: Metric,
    /// Minimum distance over the roster, if the roster was not empty
    pub distance: Option<f32>,
}

/// Matching thresholds.
///
/// The two branches are tuned independently: face-path and fallback
/// encodings are not on comparable scales.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Accept a Euclidean match strictly below this distance
    pub euclidean_threshold: f32,
    /// Accept a cosine-fallback match strictly below this distance
    pub cosine_threshold: f32,
    /// Number of leading roster components compared in the fallback
    pub cosine_prefix: usize,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            euclidean_threshold: 0.7,
            cosine_threshold: 0.3,
            cosine_prefix: 3,
        }
    }
}

impl MatcherConfig {
    /// Create strict config (fewer, surer matches)
    pub fn strict() -> Self {
        Self {
            euclidean_threshold: 0.55,
            cosine_threshold: 0.2,
            ..Default::default()
        }
    }

    /// Create lenient config (more matches, more false positives)
    pub fn lenient() -> Self {
        Self {
            euclidean_threshold: 0.8,
            cosine_threshold: 0.4,
            ..Default::default()
        }
    }
}

/// Identity matcher
#[derive(Debug, Clone, Default)]
pub struct IdentityMatcher {
    config: MatcherConfig,
}

impl IdentityMatcher {
    pub fn new(config: MatcherConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// Best roster match for `query`, or `None` when unknown
    pub fn identify(&self, query: &Embedding, roster: &Roster) -> Option<Identity> {
        self.evaluate(query, roster).identity
    }

    /// Run the lookup and report the metric and minimum distance used
    pub fn evaluate(&self, query: &Embedding, roster: &Roster) -> MatchOutcome {
        let metric = match roster.reference_dim() {
            Some(dim) if dim != query.dim() => Metric::CosinePrefix,
            _ => Metric::Euclidean,
        };

        let (best, threshold) = match metric {
            Metric::Euclidean => {
                let best = Self::argmin(
                    roster
                        .iter()
                        .map(|known| euclidean_distance(query.as_slice(), known.embedding.as_slice())),
                );
                (best, self.config.euclidean_threshold)
            }
            Metric::CosinePrefix => {
                let prefix = self.config.cosine_prefix;
                let best = Self::argmin(roster.iter().map(|known| {
                    let known = known.embedding.as_slice();
                    cosine_distance(query.as_slice(), &known[..prefix.min(known.len())])
                }));
                (best, self.config.cosine_threshold)
            }
        };

        let Some((index, distance)) = best else {
            return MatchOutcome {
                identity: None,
                metric,
                distance: None,
            };
        };

        let identity = if distance < threshold {
            roster.get(index).map(|known| Identity {
                student_id: known.student_id.clone(),
                student_name: known.student_name.clone(),
            })
        } else {
            None
        };

        debug!(
            "Match {:?}: min distance {:.4} (threshold {}) -> {:?}",
            metric,
            distance,
            threshold,
            identity.as_ref().map(|i| i.student_id.as_str())
        );

        MatchOutcome {
            identity,
            metric,
            distance: Some(distance),
        }
    }

    /// Index and value of the first minimum; NaN distances never win
    fn argmin(distances: impl Iterator<Item = f32>) -> Option<(usize, f32)> {
        let mut best: Option<(usize, f32)> = None;
        for (index, distance) in distances.enumerate() {
            let distance = if distance.is_nan() { f32::INFINITY } else { distance };
            match best {
                Some((_, current)) if distance >= current => {}
                _ => best = Some((index, distance)),
            }
        }
        best
    }
}
