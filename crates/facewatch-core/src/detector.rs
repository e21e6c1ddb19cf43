//! Face detector via ONNX Runtime.
//!
//! Runs an UltraFace-style single-stage detector that emits
//! pre-decoded, normalized corner boxes plus background/face scores.
//! Two model variants are supported: a fast low-resolution one and a
//! slower, more accurate one.

use crate::resample;
use crate::types::BoundingBox;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const DETECTOR_MEAN: f32 = 127.0;
const DETECTOR_STD: f32 = 128.0;
const DETECTOR_CONFIDENCE_THRESHOLD: f32 = 0.7;
const DETECTOR_NMS_THRESHOLD: f32 = 0.3;

/// Detector accuracy/latency trade-off. Changes input resolution only;
/// the output contract is identical.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorVariant {
    /// 320x240 input. Lower latency, misses small faces.
    Fast,
    /// 640x480 input.
    Accurate,
}

impl DetectorVariant {
    pub fn input_size(&self) -> (usize, usize) {
        match self {
            DetectorVariant::Fast => (320, 240),
            DetectorVariant::Accurate => (640, 480),
        }
    }

    /// Model file name for this variant.
    pub fn model_file(&self) -> &'static str {
        match self {
            DetectorVariant::Fast => "face_det_rfb_320.onnx",
            DetectorVariant::Accurate => "face_det_rfb_640.onnx",
        }
    }
}

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// ONNX face detector.
pub struct FaceDetector {
    session: Session,
    input_width: usize,
    input_height: usize,
}

impl FaceDetector {
    /// Load the detector model for the given variant.
    pub fn load(model_path: &str, variant: DetectorVariant) -> Result<Self, DetectorError> {
        if !Path::new(model_path).exists() {
            return Err(DetectorError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        let (input_width, input_height) = variant.input_size();

        tracing::info!(
            path = model_path,
            ?variant,
            input_width,
            input_height,
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded face detector"
        );

        Ok(Self {
            session,
            input_width,
            input_height,
        })
    }

    /// Detect faces in an RGB frame, returning boxes in frame
    /// coordinates sorted by confidence descending.
    pub fn detect(
        &mut self,
        rgb: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<BoundingBox>, DetectorError> {
        let input = self.preprocess(rgb, width as usize, height as usize);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        // Output 0: scores [1, N, 2] (background, face)
        // Output 1: boxes  [1, N, 4] normalized [x1, y1, x2, y2]
        let (_, scores) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectorError::InferenceFailed(format!("scores: {e}")))?;
        let (_, boxes) = outputs[1]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectorError::InferenceFailed(format!("boxes: {e}")))?;

        let candidates = decode_boxes(
            scores,
            boxes,
            width as f32,
            height as f32,
            DETECTOR_CONFIDENCE_THRESHOLD,
        );

        let mut result = nms(candidates, DETECTOR_NMS_THRESHOLD);
        result.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(result)
    }

    /// Stretch-resize the frame to the model input and normalize to
    /// the detector's input distribution (NCHW RGB).
    fn preprocess(&self, rgb: &[u8], width: usize, height: usize) -> Array4<f32> {
        let resized = resample::resize_rgb(rgb, width, height, self.input_width, self.input_height);

        let mut tensor = Array4::<f32>::zeros((1, 3, self.input_height, self.input_width));
        for y in 0..self.input_height {
            for x in 0..self.input_width {
                let base = (y * self.input_width + x) * 3;
                for c in 0..3 {
                    tensor[[0, c, y, x]] = (resized[base + c] as f32 - DETECTOR_MEAN) / DETECTOR_STD;
                }
            }
        }
        tensor
    }
}

/// Decode normalized corner boxes into frame coordinates, dropping
/// anything below the confidence threshold.
fn decode_boxes(
    scores: &[f32],
    boxes: &[f32],
    frame_w: f32,
    frame_h: f32,
    threshold: f32,
) -> Vec<BoundingBox> {
    let count = scores.len() / 2;
    let mut out = Vec::new();

    for i in 0..count {
        let confidence = scores[i * 2 + 1];
        if confidence <= threshold {
            continue;
        }
        let off = i * 4;
        if off + 3 >= boxes.len() {
            break;
        }
        let x1 = boxes[off] * frame_w;
        let y1 = boxes[off + 1] * frame_h;
        let x2 = boxes[off + 2] * frame_w;
        let y2 = boxes[off + 3] * frame_h;

        out.push(BoundingBox {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
            confidence,
        });
    }

    out
}

/// Greedy non-maximum suppression.
fn nms(mut detections: Vec<BoundingBox>, iou_threshold: f32) -> Vec<BoundingBox> {
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<BoundingBox> = Vec::new();
    let mut suppressed = vec![false; detections.len()];

    for i in 0..detections.len() {
        if suppressed[i] {
            continue;
        }
        keep.push(detections[i].clone());
        for j in (i + 1)..detections.len() {
            if !suppressed[j] && iou(&detections[i], &detections[j]) > iou_threshold {
                suppressed[j] = true;
            }
        }
    }

    keep
}

/// Intersection-over-union of two boxes.
fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let x1 = a.x.max(b.x);
    let y1 = a.y.max(b.y);
    let x2 = (a.x + a.width).min(b.x + b.width);
    let y2 = (a.y + a.height).min(b.y + b.height);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union = a.width * a.height + b.width * b.height - inter;

    if union > 0.0 {
        inter / union
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(x: f32, y: f32, w: f32, h: f32, conf: f32) -> BoundingBox {
        BoundingBox { x, y, width: w, height: h, confidence: conf }
    }

    #[test]
    fn test_iou_identical() {
        let a = bbox(0.0, 0.0, 10.0, 10.0, 1.0);
        assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_iou_disjoint() {
        let a = bbox(0.0, 0.0, 10.0, 10.0, 1.0);
        let b = bbox(100.0, 100.0, 10.0, 10.0, 1.0);
        assert!(iou(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_nms_keeps_best_of_cluster() {
        let dets = vec![
            bbox(0.0, 0.0, 100.0, 100.0, 0.8),
            bbox(2.0, 2.0, 100.0, 100.0, 0.95),
            bbox(300.0, 300.0, 40.0, 40.0, 0.75),
        ];
        let kept = nms(dets, 0.3);
        assert_eq!(kept.len(), 2);
        assert!((kept[0].confidence - 0.95).abs() < 1e-6);
        assert!((kept[1].confidence - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_nms_empty() {
        assert!(nms(vec![], 0.3).is_empty());
    }

    #[test]
    fn test_decode_boxes_threshold_and_scale() {
        // Two candidates: one above threshold, one below.
        let scores = vec![0.1, 0.9, 0.8, 0.2];
        let boxes = vec![
            0.25, 0.25, 0.75, 0.75, // kept
            0.0, 0.0, 1.0, 1.0, // dropped (face score 0.2)
        ];
        let out = decode_boxes(&scores, &boxes, 640.0, 480.0, 0.7);
        assert_eq!(out.len(), 1);
        let b = &out[0];
        assert!((b.x - 160.0).abs() < 1e-4);
        assert!((b.y - 120.0).abs() < 1e-4);
        assert!((b.width - 320.0).abs() < 1e-4);
        assert!((b.height - 240.0).abs() < 1e-4);
    }

    #[test]
    fn test_decode_boxes_truncated_tensor() {
        // Box tensor shorter than the score count must not panic.
        let scores = vec![0.1, 0.9, 0.1, 0.9];
        let boxes = vec![0.0, 0.0, 0.5, 0.5];
        let out = decode_boxes(&scores, &boxes, 100.0, 100.0, 0.5);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_variant_input_sizes() {
        assert_eq!(DetectorVariant::Fast.input_size(), (320, 240));
        assert_eq!(DetectorVariant::Accurate.input_size(), (640, 480));
    }
}
