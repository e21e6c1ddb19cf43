//! facewatch-hw — webcam capture.
//!
//! V4L2 frame acquisition and pixel format conversion. Frames come out
//! as interleaved RGB8 ready for the inference pipelines.

pub mod camera;
pub mod frame;

pub use camera::{Camera, CameraError, DeviceInfo};
pub use frame::{yuyv_to_rgb, Frame, FrameError};
