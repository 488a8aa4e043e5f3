//! Face crop preprocessing for the emotion classifier

use camera_capture::VideoFrame;
use ndarray::Array4;
use tracing::debug;

use crate::landmarks::FaceLandmarks;

/// Crop the landmark bounding box, resize to `size` x `size`, convert to
/// luma and scale to `[0, 1]`.
///
/// Returns a `1 x size x size x 1` tensor, or `None` when the crop is
/// degenerate after clamping to the frame.
pub fn preprocess_face(frame: &VideoFrame, landmarks: &FaceLandmarks, size: u32) -> Option<Array4<f32>> {
    let bbox = landmarks.bounding_box()?;
    let Some(crop) = frame.crop_box(&bbox) else {
        debug!("Invalid face boundaries: {:?}", bbox);
        return None;
    };

    let gray = crop.resize_luma(size, size)?;
    let size = size as usize;
    let mut input = Array4::<f32>::zeros((1, size, size, 1));
    for (x, y, pixel) in gray.enumerate_pixels() {
        input[[0, y as usize, x as usize, 0]] = pixel[0] as f32 / 255.0;
    }
    Some(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_and_normalization() {
        let frame = VideoFrame::filled(100, 80, [255, 255, 255]);
        let landmarks = FaceLandmarks::new(vec![[10.0, 10.0, 0.0], [60.0, 70.0, 0.0]]);

        let input = preprocess_face(&frame, &landmarks, 48).unwrap();
        assert_eq!(input.shape(), &[1, 48, 48, 1]);
        assert!(input.iter().all(|v| (*v - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_clamps_to_frame() {
        let frame = VideoFrame::filled(50, 50, [0, 0, 0]);
        let landmarks = FaceLandmarks::new(vec![[-20.0, -20.0, 0.0], [30.0, 30.0, 0.0]]);
        let input = preprocess_face(&frame, &landmarks, 48).unwrap();
        assert!(input.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_degenerate_crops() {
        let frame = VideoFrame::filled(50, 50, [10, 10, 10]);
        // Collapsed on one axis
        let flat = FaceLandmarks::new(vec![[10.0, 10.0, 0.0], [10.0, 40.0, 0.0]]);
        assert!(preprocess_face(&frame, &flat, 48).is_none());
        // Entirely outside the frame
        let outside = FaceLandmarks::new(vec![[60.0, 60.0, 0.0], [90.0, 90.0, 0.0]]);
        assert!(preprocess_face(&frame, &outside, 48).is_none());
        assert!(preprocess_face(&frame, &FaceLandmarks::new(vec![]), 48).is_none());
    }
}
