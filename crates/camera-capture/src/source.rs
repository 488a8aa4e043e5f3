//! Directory-backed frame source replaying still images as a camera feed

use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::{CameraConfig, CameraError, FrameSource, VideoFrame};

/// Supported image extensions.
const FRAME_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp"];

/// Replays the image files of a directory in lexical order.
///
/// Unreadable files surface as transient [`CameraError::Read`] so the session
/// skips that tick instead of ending.
pub struct ImageSequenceSource {
    dir: PathBuf,
    loop_playback: bool,
    files: Vec<PathBuf>,
    cursor: usize,
    sequence: u32,
    opened_at: Option<Instant>,
}

impl ImageSequenceSource {
    pub fn new(dir: impl Into<PathBuf>, loop_playback: bool) -> Self {
        Self {
            dir: dir.into(),
            loop_playback,
            files: Vec::new(),
            cursor: 0,
            sequence: 0,
            opened_at: None,
        }
    }

    pub fn from_config(config: &CameraConfig) -> Self {
        Self::new(&config.device, config.loop_playback)
    }

    /// Number of frames discovered at `open`
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn collect_files(dir: &Path) -> Result<Vec<PathBuf>, CameraError> {
        let entries = std::fs::read_dir(dir)
            .map_err(|e| CameraError::Open(format!("{}: {}", dir.display(), e)))?;

        let mut files: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && is_frame_file(path))
            .collect();
        files.sort();
        Ok(files)
    }
}

impl FrameSource for ImageSequenceSource {
    fn open(&mut self) -> Result<(), CameraError> {
        let files = Self::collect_files(&self.dir)?;
        if files.is_empty() {
            return Err(CameraError::Open(format!(
                "no frames found in {}",
                self.dir.display()
            )));
        }

        info!("Opened image sequence {} ({} frames)", self.dir.display(), files.len());
        self.files = files;
        self.cursor = 0;
        self.sequence = 0;
        self.opened_at = Some(Instant::now());
        Ok(())
    }

    fn read(&mut self) -> Result<VideoFrame, CameraError> {
        let opened_at = self.opened_at.ok_or(CameraError::NotInitialized)?;

        if self.cursor >= self.files.len() {
            if self.loop_playback && !self.files.is_empty() {
                self.cursor = 0;
            } else {
                return Err(CameraError::Read("end of sequence".to_string()));
            }
        }

        let path = &self.files[self.cursor];
        self.cursor += 1;

        let image = image::open(path).map_err(|e| {
            warn!("Failed to decode frame {}: {}", path.display(), e);
            CameraError::Read(e.to_string())
        })?;

        let sequence = self.sequence;
        self.sequence = self.sequence.wrapping_add(1);
        debug!("Read frame {} from {}", sequence, path.display());

        Ok(VideoFrame::from_image(
            image.to_rgb8(),
            opened_at.elapsed().as_nanos() as u64,
            sequence,
        ))
    }

    fn release(&mut self) {
        if self.opened_at.take().is_some() {
            info!("Released image sequence {}", self.dir.display());
        }
    }

    fn is_open(&self) -> bool {
        self.opened_at.is_some()
    }
}

fn is_frame_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .is_some_and(|e| FRAME_EXTENSIONS.contains(&e.as_str()))
}
