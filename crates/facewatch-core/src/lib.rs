//! facewatch-core — face analysis primitives.
//!
//! Face detection, 68-point landmarks, expression classification and
//! identity descriptors, all running via ONNX Runtime for CPU
//! inference behind the [`InferenceProvider`] boundary.

pub mod detector;
pub mod expressions;
pub mod landmarks;
pub mod provider;
pub mod recognizer;
pub mod resample;
pub mod types;

pub use detector::DetectorVariant;
pub use provider::{InferenceError, InferenceProvider, OnnxProvider};
pub use types::{
    BoundingBox, Descriptor, Detection, DetectionSet, Expression, Expressions,
    FaceWithDescriptor, Landmarks, MatchDecision,
};
