//! The frame source boundary.
//!
//! The loops never talk to V4L2 directly; they pull frames through
//! [`FrameSource`], so tests can substitute synthetic frames and a
//! missing camera degrades to "not ready" instead of wiring errors
//! through every consumer.

use facewatch_hw::{Camera, CameraError, Frame};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("camera: {0}")]
    Camera(#[from] CameraError),
    #[error("no frame available")]
    NoFrame,
}

/// Something that can hand out the current video frame on demand.
pub trait FrameSource: Send + Sync {
    /// Whether the source is attached and producing frames.
    fn ready(&self) -> bool;

    /// Native frame dimensions (width, height).
    fn dimensions(&self) -> (u32, u32);

    /// Grab the current frame.
    fn current_frame(&self) -> Result<Frame, SourceError>;
}

/// Webcam-backed frame source.
pub struct CameraSource {
    camera: Camera,
}

impl CameraSource {
    pub fn open(device_path: &str) -> Result<Self, SourceError> {
        let camera = Camera::open(device_path)?;
        Ok(Self { camera })
    }
}

impl FrameSource for CameraSource {
    fn ready(&self) -> bool {
        true
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.camera.width, self.camera.height)
    }

    fn current_frame(&self) -> Result<Frame, SourceError> {
        Ok(self.camera.capture_frame()?)
    }
}
