//! Facial expression classifier via ONNX Runtime.
//!
//! Runs a 7-way emotion classifier on a grayscale face crop and
//! converts the logits to per-label confidences with softmax. The
//! label order matches [`Expression::ALL`].

use crate::resample;
use crate::types::{BoundingBox, Expression, Expressions};
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const EXPRESSION_INPUT_SIZE: usize = 64;
const EXPRESSION_CLASSES: usize = 7;

pub const EXPRESSION_MODEL_FILE: &str = "face_expression.onnx";

#[derive(Error, Debug)]
pub enum ExpressionError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// ONNX expression classifier.
pub struct ExpressionClassifier {
    session: Session,
}

impl ExpressionClassifier {
    pub fn load(model_path: &str) -> Result<Self, ExpressionError> {
        if !Path::new(model_path).exists() {
            return Err(ExpressionError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(path = model_path, classes = ?Expression::ALL, "loaded expression classifier");

        Ok(Self { session })
    }

    /// Classify the expression of one detected face.
    pub fn classify(
        &mut self,
        rgb: &[u8],
        width: u32,
        height: u32,
        face: &BoundingBox,
    ) -> Result<Expressions, ExpressionError> {
        let input = preprocess(rgb, width as usize, height as usize, face);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, logits) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| ExpressionError::InferenceFailed(format!("expressions: {e}")))?;

        if logits.len() < EXPRESSION_CLASSES {
            return Err(ExpressionError::InferenceFailed(format!(
                "expected {EXPRESSION_CLASSES} logits, got {}",
                logits.len()
            )));
        }

        let mut scores = [0.0f32; EXPRESSION_CLASSES];
        scores.copy_from_slice(&logits[..EXPRESSION_CLASSES]);
        Ok(Expressions::new(softmax(scores)))
    }
}

/// Crop the face box, convert to grayscale and normalize to [0, 1]
/// as a single-channel NCHW tensor.
fn preprocess(rgb: &[u8], width: usize, height: usize, face: &BoundingBox) -> Array4<f32> {
    let crop = resample::crop_resize_rgb(
        rgb,
        width,
        height,
        face.x,
        face.y,
        face.width,
        face.height,
        EXPRESSION_INPUT_SIZE,
        EXPRESSION_INPUT_SIZE,
    );

    let size = EXPRESSION_INPUT_SIZE;
    let mut tensor = Array4::<f32>::zeros((1, 1, size, size));
    for y in 0..size {
        for x in 0..size {
            let base = (y * size + x) * 3;
            let px = [crop[base] as f32, crop[base + 1] as f32, crop[base + 2] as f32];
            tensor[[0, 0, y, x]] = resample::luma(&px) / 255.0;
        }
    }
    tensor
}

fn softmax(logits: [f32; EXPRESSION_CLASSES]) -> [f32; EXPRESSION_CLASSES] {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mut out = [0.0f32; EXPRESSION_CLASSES];
    let mut sum = 0.0f32;
    for (i, &l) in logits.iter().enumerate() {
        out[i] = (l - max).exp();
        sum += out[i];
    }
    for v in out.iter_mut() {
        *v /= sum;
    }
    out
}
