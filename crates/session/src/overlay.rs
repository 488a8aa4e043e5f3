//! Annotated frame rendering

use ab_glyph::{FontArc, PxScale};
use camera_capture::{BoundingBox, VideoFrame};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_cross_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

pub const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
pub const RED: Rgb<u8> = Rgb([255, 0, 0]);

/// Caption height in pixels
const CAPTION_SCALE: f32 = 20.0;
/// Gap between a caption baseline and its anchor
const CAPTION_OFFSET: f32 = 10.0;

/// Text drawn above an anchor point
#[derive(Debug, Clone, PartialEq)]
pub struct Caption {
    pub x: f32,
    pub y: f32,
    pub text: String,
    pub color: Rgb<u8>,
}

/// Shapes collected during one tick
#[derive(Debug, Clone, Default)]
pub struct Overlay {
    /// Identified faces (green)
    pub faces: Vec<BoundingBox>,
    /// Identified behaviors (red)
    pub behaviors: Vec<BoundingBox>,
    /// Emotion mesh points (green crosses)
    pub landmarks: Vec<(f32, f32)>,
    /// Student names and emotion labels
    pub captions: Vec<Caption>,
}

impl Overlay {
    /// Queue `text` just above `(x, y)`, kept inside the frame's top edge
    pub fn caption(&mut self, x: f32, y: f32, text: impl Into<String>, color: Rgb<u8>) {
        self.captions.push(Caption {
            x: x.max(0.0),
            y: (y - CAPTION_OFFSET - CAPTION_SCALE).max(0.0),
            text: text.into(),
            color,
        });
    }

    /// Draw onto a copy of the frame. Captions need a font and are skipped
    /// without one.
    pub fn render(&self, frame: &VideoFrame, font: Option<&FontArc>) -> Option<RgbImage> {
        let mut image = frame.to_image()?;

        for bbox in &self.faces {
            if let Some(rect) = to_rect(bbox) {
                draw_hollow_rect_mut(&mut image, rect, GREEN);
            }
        }
        for bbox in &self.behaviors {
            if let Some(rect) = to_rect(bbox) {
                draw_hollow_rect_mut(&mut image, rect, RED);
            }
        }
        for &(x, y) in &self.landmarks {
            draw_cross_mut(&mut image, GREEN, x as i32, y as i32);
        }
        if let Some(font) = font {
            for caption in &self.captions {
                if !caption.x.is_finite() || !caption.y.is_finite() {
                    continue;
                }
                draw_text_mut(
                    &mut image,
                    caption.color,
                    caption.x as i32,
                    caption.y as i32,
                    PxScale::from(CAPTION_SCALE),
                    font,
                    &caption.text,
                );
            }
        }

        Some(image)
    }
}

fn to_rect(bbox: &BoundingBox) -> Option<Rect> {
    let (width, height) = (bbox.width() as u32, bbox.height() as u32);
    if width == 0 || height == 0 || !bbox.x1.is_finite() || !bbox.y1.is_finite() {
        return None;
    }
    Some(Rect::at(bbox.x1 as i32, bbox.y1 as i32).of_size(width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_colors() {
        let frame = VideoFrame::filled(50, 50, [0, 0, 0]);
        let overlay = Overlay {
            faces: vec![BoundingBox::new(10.0, 10.0, 30.0, 30.0)],
            behaviors: vec![BoundingBox::new(5.0, 35.0, 20.0, 45.0)],
            landmarks: vec![(40.0, 40.0)],
            ..Default::default()
        };

        let image = overlay.render(&frame, None).unwrap();
        assert_eq!(image.get_pixel(10, 10), &GREEN);
        assert_eq!(image.get_pixel(20, 10), &GREEN);
        assert_eq!(image.get_pixel(20, 20), &Rgb([0, 0, 0]));
        assert_eq!(image.get_pixel(5, 35), &RED);
        assert_eq!(image.get_pixel(40, 40), &GREEN);
    }

    #[test]
    fn test_degenerate_boxes_ignored() {
        let frame = VideoFrame::filled(20, 20, [0, 0, 0]);
        let overlay = Overlay {
            faces: vec![BoundingBox::new(5.0, 5.0, 5.0, 15.0), BoundingBox::new(f32::NAN, 0.0, 4.0, 4.0)],
            ..Default::default()
        };
        let image = overlay.render(&frame, None).unwrap();
        assert!(image.pixels().all(|p| *p == Rgb([0, 0, 0])));
    }

    #[test]
    fn test_caption_placement() {
        let mut overlay = Overlay::default();
        overlay.caption(40.0, 100.0, "Ada", GREEN);
        overlay.caption(-3.0, 5.0, "Emotion: Happy", GREEN);

        assert_eq!(overlay.captions[0].x, 40.0);
        assert_eq!(overlay.captions[0].y, 100.0 - CAPTION_OFFSET - CAPTION_SCALE);
        assert_eq!((overlay.captions[1].x, overlay.captions[1].y), (0.0, 0.0));
        assert_eq!(overlay.captions[1].text, "Emotion: Happy");
    }

    #[test]
    fn test_captions_without_font_leave_frame_untouched() {
        let frame = VideoFrame::filled(30, 30, [0, 0, 0]);
        let mut overlay = Overlay::default();
        overlay.caption(5.0, 25.0, "Ada", GREEN);

        let image = overlay.render(&frame, None).unwrap();
        assert!(image.pixels().all(|p| *p == Rgb([0, 0, 0])));
    }
}
