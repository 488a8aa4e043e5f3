//! Camera Capture Library for Classroom Monitoring
//!
//! Provides the frame acquisition port used by the session tick loop:
//! - `FrameSource` trait for camera devices
//! - Decoded RGB `VideoFrame` with crop helpers
//! - Bounding box geometry and non-maximum suppression
//! - `ImageSequenceSource` replaying a directory of still images

pub mod frame;
pub mod geometry;
pub mod source;

pub use frame::VideoFrame;
pub use geometry::{non_max_suppression, BoundingBox, PixelRect};
pub use source::ImageSequenceSource;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Camera error types
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Failed to open camera: {0}")]
    Open(String),

    #[error("Frame read failed: {0}")]
    Read(String),

    #[error("Capture timeout")]
    Timeout,

    #[error("Camera not initialized")]
    NotInitialized,
}

impl CameraError {
    /// Whether the session loop may skip this tick and keep going
    pub fn is_transient(&self) -> bool {
        matches!(self, CameraError::Read(_) | CameraError::Timeout)
    }
}

/// Camera device port.
///
/// A source is owned by exactly one session at a time. `read` failures that
/// are [`CameraError::is_transient`] must not end the session.
pub trait FrameSource: Send {
    /// Acquire the device. Failure here is session-ending.
    fn open(&mut self) -> Result<(), CameraError>;

    /// Grab one decoded frame
    fn read(&mut self) -> Result<VideoFrame, CameraError>;

    /// Release the device; reading afterwards yields `NotInitialized`
    fn release(&mut self);

    fn is_open(&self) -> bool;
}

/// Camera configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Device path or, for image replay, a directory of frames
    pub device: String,
    /// Target FPS
    pub fps: u32,
    /// Restart from the first frame when the sequence ends
    pub loop_playback: bool,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: "frames".to_string(),
            fps: 30,
            loop_playback: true,
        }
    }
}

impl CameraConfig {
    /// Target interval between ticks in milliseconds
    pub fn frame_interval_ms(&self) -> u64 {
        if self.fps == 0 {
            return 0;
        }
        1000 / self.fps as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors() {
        assert!(CameraError::Read("eof".into()).is_transient());
        assert!(CameraError::Timeout.is_transient());
        assert!(!CameraError::Open("busy".into()).is_transient());
        assert!(!CameraError::NotInitialized.is_transient());
    }

    #[test]
    fn test_frame_interval() {
        let config = CameraConfig {
            fps: 25,
            ..Default::default()
        };
        assert_eq!(config.frame_interval_ms(), 40);

        let config = CameraConfig {
            fps: 0,
            ..Default::default()
        };
        assert_eq!(config.frame_interval_ms(), 0);
    }
}
