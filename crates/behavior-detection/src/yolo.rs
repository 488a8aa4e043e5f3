//! YOLOv5-style behavior detector

use std::collections::BTreeMap;

use camera_capture::{non_max_suppression, BoundingBox, VideoFrame};
use ndarray::{Array4, ArrayView2, Ix3};
use ort::{GraphOptimizationLevel, Session};
use tracing::{debug, error, info};

use crate::{BehaviorClassifier, BehaviorConfig, BehaviorDetection, BehaviorError};

fn inference_error(e: impl std::fmt::Display) -> BehaviorError {
    BehaviorError::Inference(e.to_string())
}

/// Behavior detector over a YOLOv5 export.
///
/// Input is `1 x 3 x S x S` RGB in `[0, 1]`; output is `[1, N, 5 + C]` rows
/// of `cx, cy, w, h, objectness, class scores...` in input pixels.
pub struct YoloBehaviorDetector {
    session: Session,
    config: BehaviorConfig,
}

impl YoloBehaviorDetector {
    pub fn new(config: BehaviorConfig) -> Result<Self, BehaviorError> {
        let path = config
            .model_path
            .as_deref()
            .ok_or_else(|| BehaviorError::ModelLoad("no behavior model path configured".into()))?;

        info!("Loading behavior model from {}", path);
        let session = Session::builder()
            .and_then(|builder| builder.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|builder| builder.commit_from_file(path))
            .map_err(|e| {
                error!("Failed to load behavior model: {}", e);
                BehaviorError::ModelLoad(e.to_string())
            })?;

        Ok(Self { session, config })
    }
}

impl BehaviorClassifier for YoloBehaviorDetector {
    fn classify(&self, frame: &VideoFrame) -> Result<Vec<BehaviorDetection>, BehaviorError> {
        let size = self.config.input_size;

        // 1. Preprocess: stretch to SxS, scale to 0..1
        let resized = frame.resize_rgb(size, size).ok_or(BehaviorError::InvalidFrame)?;
        let mut input = Array4::<f32>::zeros((1, 3, size as usize, size as usize));
        for (x, y, pixel) in resized.enumerate_pixels() {
            for c in 0..3 {
                input[[0, c, y as usize, x as usize]] = pixel[c] as f32 / 255.0;
            }
        }

        // 2. Inference
        let outputs = self
            .session
            .run(ort::inputs![input].map_err(inference_error)?)
            .map_err(inference_error)?;
        let predictions = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(inference_error)?
            .into_dimensionality::<Ix3>()
            .map_err(inference_error)?;

        // 3. Decode back into frame pixels
        let sx = frame.width as f32 / size as f32;
        let sy = frame.height as f32 / size as f32;
        let detections = decode_predictions(predictions.index_axis(ndarray::Axis(0), 0), &self.config, sx, sy);
        debug!("Detected {} behaviors", detections.len());
        Ok(detections)
    }
}

/// Decode `[N, 5 + C]` YOLO rows into detections.
///
/// Confidence is `objectness * best class score`. Boxes below the configured
/// confidence are dropped, the rest go through NMS per class. The result is
/// ordered by descending confidence.
pub fn decode_predictions(
    rows: ArrayView2<'_, f32>,
    config: &BehaviorConfig,
    sx: f32,
    sy: f32,
) -> Vec<BehaviorDetection> {
    let mut by_class: BTreeMap<usize, Vec<(BoundingBox, f32)>> = BTreeMap::new();

    for row in rows.outer_iter() {
        if row.len() < 6 {
            continue;
        }
        let objectness = row[4];
        let Some((class, score)) = row
            .iter()
            .skip(5)
            .copied()
            .enumerate()
            .fold(None, |best: Option<(usize, f32)>, (i, s)| match best {
                Some((_, b)) if s <= b => best,
                _ => Some((i, s)),
            })
        else {
            continue;
        };

        let confidence = objectness * score;
        if !(confidence >= config.confidence) {
            continue;
        }

        let bbox = BoundingBox::from_center(row[0], row[1], row[2], row[3]).scale(sx, sy);
        by_class.entry(class).or_default().push((bbox, confidence));
    }

    let mut detections: Vec<BehaviorDetection> = by_class
        .into_iter()
        .flat_map(|(class, candidates)| {
            let label = config.label(class);
            non_max_suppression(candidates, config.iou_threshold, |c| *c)
                .into_iter()
                .map(move |(bbox, confidence)| BehaviorDetection {
                    label: label.clone(),
                    bbox,
                    confidence,
                })
        })
        .collect();

    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    detections
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr2, Array2};
    use proptest::prelude::*;

    fn config() -> BehaviorConfig {
        BehaviorConfig {
            labels: vec!["sleeping".into(), "using_phone".into()],
            ..Default::default()
        }
    }

    #[test]
    fn test_decode_scales_and_labels() {
        let rows = arr2(&[[320.0, 320.0, 64.0, 128.0, 0.9, 0.1, 0.8]]);
        let detections = decode_predictions(rows.view(), &config(), 2.0, 0.5);

        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].label, "using_phone");
        assert!((detections[0].confidence - 0.72).abs() < 1e-5);
        assert_eq!(detections[0].bbox, BoundingBox::new(576.0, 128.0, 704.0, 192.0));
    }

    #[test]
    fn test_decode_threshold() {
        // 0.5 * 0.4 = 0.2 < 0.25
        let rows = arr2(&[[100.0, 100.0, 10.0, 10.0, 0.5, 0.4, 0.1]]);
        assert!(decode_predictions(rows.view(), &config(), 1.0, 1.0).is_empty());
    }

    #[test]
    fn test_nms_is_per_class() {
        let rows = arr2(&[
            [100.0, 100.0, 50.0, 50.0, 1.0, 0.9, 0.0],
            [102.0, 101.0, 50.0, 50.0, 1.0, 0.6, 0.0],
            [101.0, 100.0, 50.0, 50.0, 1.0, 0.0, 0.7],
        ]);
        let detections = decode_predictions(rows.view(), &config(), 1.0, 1.0);

        let labels: Vec<&str> = detections.iter().map(|d| d.label.as_str()).collect();
        assert_eq!(labels, vec!["sleeping", "using_phone"]);
    }

    #[test]
    fn test_short_rows_ignored() {
        let rows = Array2::<f32>::zeros((3, 5));
        assert!(decode_predictions(rows.view(), &config(), 1.0, 1.0).is_empty());
    }

    #[test]
    fn test_missing_model_path() {
        assert!(matches!(
            YoloBehaviorDetector::new(BehaviorConfig::default()),
            Err(BehaviorError::ModelLoad(_))
        ));
    }

    proptest! {
        #[test]
        fn decoded_confidences_pass_threshold(values in prop::collection::vec(0.0f32..1.0, 7 * 16)) {
            let rows = Array2::from_shape_vec((16, 7), values).unwrap();
            let config = config();
            let detections = decode_predictions(rows.view(), &config, 1.0, 1.0);

            prop_assert!(detections.len() <= 16);
            prop_assert!(detections.iter().all(|d| d.confidence >= config.confidence));
            prop_assert!(detections.windows(2).all(|w| w[0].confidence >= w[1].confidence));
        }
    }
}
