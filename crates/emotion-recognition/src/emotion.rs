//! Emotion categories

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Discrete emotion category, in classifier output order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Emotion {
    Angry,
    Disgust,
    Fear,
    Happy,
    Sad,
    Surprise,
    Neutral,
}

impl Emotion {
    /// All categories, indexed like the classifier output
    pub const ALL: [Emotion; 7] = [
        Emotion::Angry,
        Emotion::Disgust,
        Emotion::Fear,
        Emotion::Happy,
        Emotion::Sad,
        Emotion::Surprise,
        Emotion::Neutral,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Angry => "Angry",
            Emotion::Disgust => "Disgust",
            Emotion::Fear => "Fear",
            Emotion::Happy => "Happy",
            Emotion::Sad => "Sad",
            Emotion::Surprise => "Surprise",
            Emotion::Neutral => "Neutral",
        }
    }

    /// Arg-max over classifier scores; the first maximum wins
    pub fn from_scores(scores: &[f32]) -> Option<(Self, f32)> {
        let mut best: Option<(usize, f32)> = None;
        for (index, &score) in scores.iter().enumerate() {
            match best {
                Some((_, current)) if !(score > current) => {}
                _ if score.is_nan() => {}
                _ => best = Some((index, score)),
            }
        }
        let (index, score) = best?;
        Self::from_index(index).map(|emotion| (emotion, score))
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Emotion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|e| e.as_str().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| format!("unknown emotion: {}", s))
    }
}
