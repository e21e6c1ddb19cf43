//! Identity descriptor extractor via ONNX Runtime.
//!
//! Produces the 128-dimensional embedding used for one-to-one face
//! verification. The raw embedding is compared by Euclidean distance;
//! it is deliberately NOT length-normalized, matching the training of
//! the dlib-style recognition network and its 0.6 distance threshold.

use crate::resample;
use crate::types::{Descriptor, Landmarks};
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const DESCRIPTOR_INPUT_SIZE: usize = 150;
const DESCRIPTOR_DIM: usize = 128;
const DESCRIPTOR_MEAN: f32 = 127.5;
const DESCRIPTOR_STD: f32 = 127.5;

/// Canonical eye placement for the aligned crop: eye midpoint position
/// and inter-eye distance as fractions of the crop size.
const EYE_MIDPOINT: (f32, f32) = (0.5, 0.38);
const EYE_SPAN: f32 = 0.30;

pub const DESCRIPTOR_MODEL_FILE: &str = "face_descriptor.onnx";

#[derive(Error, Debug)]
pub enum RecognizerError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("degenerate landmarks: eye centers coincide")]
    DegenerateLandmarks,
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// ONNX descriptor network.
pub struct DescriptorExtractor {
    session: Session,
}

impl DescriptorExtractor {
    pub fn load(model_path: &str) -> Result<Self, RecognizerError> {
        if !Path::new(model_path).exists() {
            return Err(RecognizerError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(path = model_path, dim = DESCRIPTOR_DIM, "loaded descriptor network");

        Ok(Self { session })
    }

    /// Extract the identity descriptor for one face. The face is
    /// rotation/scale-aligned from its eye landmarks before inference.
    pub fn extract(
        &mut self,
        rgb: &[u8],
        width: u32,
        height: u32,
        landmarks: &Landmarks,
    ) -> Result<Descriptor, RecognizerError> {
        let aligned = align_face(rgb, width as usize, height as usize, landmarks)?;
        let input = preprocess(&aligned);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| RecognizerError::InferenceFailed(format!("descriptor: {e}")))?;

        if raw.len() != DESCRIPTOR_DIM {
            return Err(RecognizerError::InferenceFailed(format!(
                "expected {DESCRIPTOR_DIM}-dim descriptor, got {}",
                raw.len()
            )));
        }

        Ok(Descriptor { values: raw.to_vec() })
    }
}

/// Similarity-align the face into a canonical 150x150 RGB crop using
/// the two eye centers: rotate so the eyes are level, scale so the
/// inter-eye distance matches [`EYE_SPAN`], place the eye midpoint at
/// [`EYE_MIDPOINT`].
fn align_face(
    rgb: &[u8],
    width: usize,
    height: usize,
    landmarks: &Landmarks,
) -> Result<Vec<u8>, RecognizerError> {
    let left = landmarks.centroid(Landmarks::LEFT_EYE);
    let right = landmarks.centroid(Landmarks::RIGHT_EYE);

    let dx = right.0 - left.0;
    let dy = right.1 - left.1;
    let eye_dist = (dx * dx + dy * dy).sqrt();
    if eye_dist < 1e-3 {
        return Err(RecognizerError::DegenerateLandmarks);
    }

    let size = DESCRIPTOR_INPUT_SIZE;
    let scale = eye_dist / (EYE_SPAN * size as f32);
    let angle = dy.atan2(dx);
    let (sin, cos) = angle.sin_cos();

    let mid = ((left.0 + right.0) / 2.0, (left.1 + right.1) / 2.0);
    let anchor = (EYE_MIDPOINT.0 * size as f32, EYE_MIDPOINT.1 * size as f32);

    // Inverse mapping: for each output pixel, rotate/scale back into
    // the source frame and sample bilinearly.
    let mut out = vec![0u8; size * size * 3];
    for oy in 0..size {
        for ox in 0..size {
            let rx = (ox as f32 - anchor.0) * scale;
            let ry = (oy as f32 - anchor.1) * scale;
            let src_x = mid.0 + rx * cos - ry * sin;
            let src_y = mid.1 + rx * sin + ry * cos;

            let px = resample::bilinear_rgb(rgb, width, height, src_x, src_y);
            let base = (oy * size + ox) * 3;
            for c in 0..3 {
                out[base + c] = px[c].round().clamp(0.0, 255.0) as u8;
            }
        }
    }
    Ok(out)
}

/// Normalize the aligned crop to a NCHW tensor.
fn preprocess(aligned: &[u8]) -> Array4<f32> {
    let size = DESCRIPTOR_INPUT_SIZE;
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
    for y in 0..size {
        for x in 0..size {
            let base = (y * size + x) * 3;
            for c in 0..3 {
                tensor[[0, c, y, x]] = (aligned[base + c] as f32 - DESCRIPTOR_MEAN) / DESCRIPTOR_STD;
            }
        }
    }
    tensor
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Landmarks with eye clusters at the given centers; all other
    /// points collapsed to the left eye (unused by alignment).
    fn eye_landmarks(left: (f32, f32), right: (f32, f32)) -> Landmarks {
        let mut pts = vec![left; 68];
        for p in &mut pts[36..42] {
            *p = left;
        }
        for p in &mut pts[42..48] {
            *p = right;
        }
        Landmarks(pts)
    }

    #[test]
    fn test_align_uniform_frame() {
        let frame = vec![90u8; 64 * 64 * 3];
        let lm = eye_landmarks((20.0, 30.0), (44.0, 30.0));
        let aligned = align_face(&frame, 64, 64, &lm).unwrap();
        assert_eq!(aligned.len(), DESCRIPTOR_INPUT_SIZE * DESCRIPTOR_INPUT_SIZE * 3);
        assert!(aligned.iter().all(|&p| p == 90));
    }

    #[test]
    fn test_align_rejects_coincident_eyes() {
        let frame = vec![0u8; 16 * 16 * 3];
        let lm = eye_landmarks((8.0, 8.0), (8.0, 8.0));
        assert!(matches!(
            align_face(&frame, 16, 16, &lm),
            Err(RecognizerError::DegenerateLandmarks)
        ));
    }

    #[test]
    fn test_align_levels_rotated_eyes() {
        // A bright horizontal stripe through the (tilted) eye line
        // should land level in the aligned crop: the pixel at the
        // canonical left-eye location equals the one at the
        // right-eye location.
        let w = 128usize;
        let h = 128usize;
        let mut frame = vec![0u8; w * h * 3];
        // Diagonal stripe: brighten pixels near the line through the eyes.
        let left = (40.0f32, 50.0f32);
        let right = (88.0f32, 74.0f32);
        let dir = (right.0 - left.0, right.1 - left.1);
        let len = (dir.0 * dir.0 + dir.1 * dir.1).sqrt();
        let n = (-dir.1 / len, dir.0 / len);
        for y in 0..h {
            for x in 0..w {
                let d = (x as f32 - left.0) * n.0 + (y as f32 - left.1) * n.1;
                if d.abs() < 3.0 {
                    let base = (y * w + x) * 3;
                    frame[base] = 255;
                    frame[base + 1] = 255;
                    frame[base + 2] = 255;
                }
            }
        }

        let lm = eye_landmarks(left, right);
        let aligned = align_face(&frame, w, h, &lm).unwrap();

        let size = DESCRIPTOR_INPUT_SIZE;
        let eye_y = (EYE_MIDPOINT.1 * size as f32) as usize;
        let left_x = ((EYE_MIDPOINT.0 - EYE_SPAN / 2.0) * size as f32) as usize;
        let right_x = ((EYE_MIDPOINT.0 + EYE_SPAN / 2.0) * size as f32) as usize;

        // Both canonical eye positions sit on the (now level) stripe.
        assert!(aligned[(eye_y * size + left_x) * 3] > 200);
        assert!(aligned[(eye_y * size + right_x) * 3] > 200);
    }

    #[test]
    fn test_preprocess_normalization() {
        let aligned = vec![255u8; DESCRIPTOR_INPUT_SIZE * DESCRIPTOR_INPUT_SIZE * 3];
        let tensor = preprocess(&aligned);
        let expected = (255.0 - DESCRIPTOR_MEAN) / DESCRIPTOR_STD;
        assert!((tensor[[0, 0, 0, 0]] - expected).abs() < 1e-6);
    }
}
