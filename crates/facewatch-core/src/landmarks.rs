//! 68-point facial landmark regressor via ONNX Runtime.
//!
//! Takes a detected face box, crops an expanded square region and runs
//! a PFLD-style regressor that outputs 136 floats: 68 (x, y) pairs
//! normalized to [0, 1] within the crop.

use crate::resample;
use crate::types::{BoundingBox, Landmarks};
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const LANDMARK_INPUT_SIZE: usize = 112;
const LANDMARK_COUNT: usize = 68;
/// Box expansion factor: landmark models are trained on crops a bit
/// looser than the detector box.
const CROP_EXPANSION: f32 = 1.25;

pub const LANDMARK_MODEL_FILE: &str = "face_landmark_68.onnx";

#[derive(Error, Debug)]
pub enum LandmarkError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Square crop region derived from a face box.
#[derive(Debug, Clone, Copy)]
struct CropRegion {
    x: f32,
    y: f32,
    size: f32,
}

/// ONNX 68-point landmark regressor.
pub struct LandmarkRegressor {
    session: Session,
}

impl LandmarkRegressor {
    pub fn load(model_path: &str) -> Result<Self, LandmarkError> {
        if !Path::new(model_path).exists() {
            return Err(LandmarkError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(path = model_path, "loaded landmark regressor");

        Ok(Self { session })
    }

    /// Predict 68 landmarks for one detected face, in frame coordinates.
    pub fn predict(
        &mut self,
        rgb: &[u8],
        width: u32,
        height: u32,
        face: &BoundingBox,
    ) -> Result<Landmarks, LandmarkError> {
        let region = crop_region(face);
        let crop = resample::crop_resize_rgb(
            rgb,
            width as usize,
            height as usize,
            region.x,
            region.y,
            region.size,
            region.size,
            LANDMARK_INPUT_SIZE,
            LANDMARK_INPUT_SIZE,
        );

        let input = preprocess(&crop);
        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| LandmarkError::InferenceFailed(format!("landmarks: {e}")))?;

        if raw.len() < LANDMARK_COUNT * 2 {
            return Err(LandmarkError::InferenceFailed(format!(
                "expected {} outputs, got {}",
                LANDMARK_COUNT * 2,
                raw.len()
            )));
        }

        Ok(map_points(raw, &region))
    }
}

/// Expand the detector box into the square region the regressor expects.
fn crop_region(face: &BoundingBox) -> CropRegion {
    let cx = face.x + face.width / 2.0;
    let cy = face.y + face.height / 2.0;
    let size = face.width.max(face.height) * CROP_EXPANSION;
    CropRegion {
        x: cx - size / 2.0,
        y: cy - size / 2.0,
        size,
    }
}

/// Map normalized crop-space outputs back to frame coordinates.
fn map_points(raw: &[f32], region: &CropRegion) -> Landmarks {
    let mut points = Vec::with_capacity(LANDMARK_COUNT);
    for i in 0..LANDMARK_COUNT {
        let nx = raw[i * 2];
        let ny = raw[i * 2 + 1];
        points.push((region.x + nx * region.size, region.y + ny * region.size));
    }
    Landmarks(points)
}

/// Normalize the crop to [0, 1] NCHW RGB.
fn preprocess(crop: &[u8]) -> Array4<f32> {
    let size = LANDMARK_INPUT_SIZE;
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
    for y in 0..size {
        for x in 0..size {
            let base = (y * size + x) * 3;
            for c in 0..3 {
                tensor[[0, c, y, x]] = crop[base + c] as f32 / 255.0;
            }
        }
    }
    tensor
}
