//! Video frame types and processing

use image::{imageops, imageops::FilterType, GrayImage, RgbImage};

use crate::geometry::{BoundingBox, PixelRect};

/// Decoded RGB video frame
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// RGB pixel data (width * height * 3)
    pub data: Vec<u8>,
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
    /// Capture timestamp (nanoseconds since the source was opened)
    pub timestamp_ns: u64,
    /// Frame sequence number
    pub sequence: u32,
}

impl VideoFrame {
    /// Create a new video frame from raw RGB data
    pub fn new(data: Vec<u8>, width: u32, height: u32, timestamp_ns: u64, sequence: u32) -> Self {
        Self {
            data,
            width,
            height,
            timestamp_ns,
            sequence,
        }
    }

    /// Take ownership of a decoded image
    pub fn from_image(image: RgbImage, timestamp_ns: u64, sequence: u32) -> Self {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height, timestamp_ns, sequence)
    }

    /// Solid-color frame, mostly useful for tests and warm-up
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take((width * height * 3) as usize)
            .collect();
        Self::new(data, width, height, 0, 0)
    }

    /// Whether the buffer length matches the declared dimensions
    pub fn is_valid(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.data.len() == (self.width as usize) * (self.height as usize) * 3
    }

    /// Borrowing view as an `image` buffer
    pub fn as_image(&self) -> Option<image::ImageBuffer<image::Rgb<u8>, &[u8]>> {
        image::ImageBuffer::from_raw(self.width, self.height, self.data.as_slice())
    }

    /// Owned copy as an `image` buffer
    pub fn to_image(&self) -> Option<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.data.clone())
    }

    /// Get pixel at (x, y)
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y * self.width + x) * 3) as usize;
        self.data.get(idx..idx + 3).map(|p| [p[0], p[1], p[2]])
    }

    /// Crop a pixel window of the frame
    pub fn crop(&self, rect: PixelRect) -> Option<VideoFrame> {
        let PixelRect { x, y, width, height } = rect;
        if width == 0 || height == 0 {
            return None;
        }
        if x.checked_add(width)? > self.width || y.checked_add(height)? > self.height {
            return None;
        }

        let mut cropped = Vec::with_capacity((width * height * 3) as usize);
        for row in y..(y + height) {
            let start = ((row * self.width + x) * 3) as usize;
            let end = start + (width * 3) as usize;
            cropped.extend_from_slice(self.data.get(start..end)?);
        }

        Some(VideoFrame {
            data: cropped,
            width,
            height,
            timestamp_ns: self.timestamp_ns,
            sequence: self.sequence,
        })
    }

    /// Crop a detector box, clamped to the frame.
    ///
    /// Returns `None` for zero-area or fully out-of-bounds boxes.
    pub fn crop_box(&self, bbox: &BoundingBox) -> Option<VideoFrame> {
        let rect = bbox.clamp_to(self.width, self.height)?;
        self.crop(rect)
    }

    /// Resize to a model input resolution (bilinear)
    pub fn resize_rgb(&self, width: u32, height: u32) -> Option<RgbImage> {
        let view = self.as_image()?;
        Some(imageops::resize(&view, width, height, FilterType::Triangle))
    }

    /// Resize then convert to single-channel luma
    pub fn resize_luma(&self, width: u32, height: u32) -> Option<GrayImage> {
        let resized = self.resize_rgb(width, height)?;
        Some(imageops::grayscale(&resized))
    }
}
