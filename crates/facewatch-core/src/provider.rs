//! The inference capability boundary.
//!
//! Consumers (detection loop, verification loop) only ever see the
//! [`InferenceProvider`] trait, so the core logic never depends on a
//! specific backend. [`OnnxProvider`] is the production implementation
//! composing the four ONNX sessions.

use crate::detector::{DetectorError, DetectorVariant, FaceDetector};
use crate::expressions::{ExpressionClassifier, ExpressionError, EXPRESSION_MODEL_FILE};
use crate::landmarks::{LandmarkError, LandmarkRegressor, LANDMARK_MODEL_FILE};
use crate::recognizer::{DescriptorExtractor, RecognizerError, DESCRIPTOR_MODEL_FILE};
use crate::types::{Detection, DetectionSet, FaceWithDescriptor};
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("detector: {0}")]
    Detector(#[from] DetectorError),
    #[error("landmarks: {0}")]
    Landmarks(#[from] LandmarkError),
    #[error("expressions: {0}")]
    Expressions(#[from] ExpressionError),
    #[error("recognizer: {0}")]
    Recognizer(#[from] RecognizerError),
    #[error("inference session poisoned")]
    Poisoned,
}

/// Black-box inference capability with the two entry points the
/// pipelines consume.
pub trait InferenceProvider: Send + Sync {
    /// Detect every face in the frame with landmarks and expression
    /// scores. An empty vec means "no faces", not an error.
    fn detect_all(&self, rgb: &[u8], width: u32, height: u32)
        -> Result<DetectionSet, InferenceError>;

    /// Detect the single most confident face with landmarks and an
    /// identity descriptor. `None` means no face was found.
    fn detect_single(
        &self,
        rgb: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Option<FaceWithDescriptor>, InferenceError>;
}

/// Production provider backed by ONNX Runtime sessions.
///
/// Sessions need `&mut` to run, so each is behind a `Mutex`; callers
/// invoking from overlapping ticks serialize here. That is within the
/// pipeline's last-result-wins tolerance.
pub struct OnnxProvider {
    detector: Mutex<FaceDetector>,
    landmarks: Mutex<LandmarkRegressor>,
    expressions: Mutex<ExpressionClassifier>,
    recognizer: Mutex<DescriptorExtractor>,
}

impl OnnxProvider {
    /// Load all four models from `model_dir`. Fails fast if any file
    /// is missing or malformed.
    pub fn load(model_dir: &Path, variant: DetectorVariant) -> Result<Self, InferenceError> {
        let path = |file: &str| model_dir.join(file).to_string_lossy().into_owned();

        let detector = FaceDetector::load(&path(variant.model_file()), variant)?;
        let landmarks = LandmarkRegressor::load(&path(LANDMARK_MODEL_FILE))?;
        let expressions = ExpressionClassifier::load(&path(EXPRESSION_MODEL_FILE))?;
        let recognizer = DescriptorExtractor::load(&path(DESCRIPTOR_MODEL_FILE))?;

        tracing::info!(dir = %model_dir.display(), ?variant, "inference provider ready");

        Ok(Self {
            detector: Mutex::new(detector),
            landmarks: Mutex::new(landmarks),
            expressions: Mutex::new(expressions),
            recognizer: Mutex::new(recognizer),
        })
    }
}

impl InferenceProvider for OnnxProvider {
    fn detect_all(
        &self,
        rgb: &[u8],
        width: u32,
        height: u32,
    ) -> Result<DetectionSet, InferenceError> {
        let boxes = self
            .detector
            .lock()
            .map_err(|_| InferenceError::Poisoned)?
            .detect(rgb, width, height)?;

        let mut set = Vec::with_capacity(boxes.len());
        for bbox in boxes {
            let landmarks = self
                .landmarks
                .lock()
                .map_err(|_| InferenceError::Poisoned)?
                .predict(rgb, width, height, &bbox)?;
            let expressions = self
                .expressions
                .lock()
                .map_err(|_| InferenceError::Poisoned)?
                .classify(rgb, width, height, &bbox)?;
            set.push(Detection { bbox, landmarks, expressions });
        }

        tracing::debug!(faces = set.len(), "detect_all complete");
        Ok(set)
    }

    fn detect_single(
        &self,
        rgb: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Option<FaceWithDescriptor>, InferenceError> {
        let boxes = self
            .detector
            .lock()
            .map_err(|_| InferenceError::Poisoned)?
            .detect(rgb, width, height)?;

        // detect() sorts by confidence; take the best face only.
        let Some(bbox) = boxes.into_iter().next() else {
            return Ok(None);
        };

        let landmarks = self
            .landmarks
            .lock()
            .map_err(|_| InferenceError::Poisoned)?
            .predict(rgb, width, height, &bbox)?;
        let descriptor = self
            .recognizer
            .lock()
            .map_err(|_| InferenceError::Poisoned)?
            .extract(rgb, width, height, &landmarks)?;

        Ok(Some(FaceWithDescriptor { bbox, landmarks, descriptor }))
    }
}
