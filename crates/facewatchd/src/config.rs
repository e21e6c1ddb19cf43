use facewatch_core::DetectorVariant;
use std::path::PathBuf;
use std::time::Duration;

/// Daemon configuration, loaded from environment variables.
pub struct Config {
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    /// Detector variant for the periodic detection loop.
    pub detector_variant: DetectorVariant,
    /// Detection loop tick period.
    pub detect_interval: Duration,
    /// Per-detection delay step for staggered expression alerts.
    pub alert_stagger: Duration,
    /// Verification loop period.
    pub compare_interval: Duration,
    /// Euclidean distance below which two descriptors match (strict `<`).
    pub match_threshold: f32,
    /// HTTP endpoint receiving captured frames.
    pub upload_url: String,
    /// Reference image for one-to-one verification.
    pub reference_image: PathBuf,
    /// Whether the verification loop runs at all.
    pub auto_compare: bool,
    /// Overlay canvas size (the video's displayed size).
    pub display_width: u32,
    pub display_height: u32,
}

impl Config {
    /// Load configuration from `FACEWATCH_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let model_dir = std::env::var("FACEWATCH_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("models"));

        let detector_variant = match std::env::var("FACEWATCH_DETECTOR").as_deref() {
            Ok("accurate") => DetectorVariant::Accurate,
            _ => DetectorVariant::Fast,
        };

        Self {
            camera_device: std::env::var("FACEWATCH_CAMERA_DEVICE")
                .unwrap_or_else(|_| "/dev/video0".to_string()),
            model_dir,
            detector_variant,
            detect_interval: Duration::from_millis(env_u64("FACEWATCH_DETECT_INTERVAL_MS", 100)),
            alert_stagger: Duration::from_millis(env_u64("FACEWATCH_ALERT_STAGGER_MS", 3000)),
            compare_interval: Duration::from_millis(env_u64("FACEWATCH_COMPARE_INTERVAL_MS", 3000)),
            match_threshold: env_f32("FACEWATCH_MATCH_THRESHOLD", 0.6),
            upload_url: std::env::var("FACEWATCH_UPLOAD_URL")
                .unwrap_or_else(|_| "http://localhost:5000/upload".to_string()),
            reference_image: std::env::var("FACEWATCH_REFERENCE_IMAGE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("image/image1.jpg")),
            auto_compare: std::env::var("FACEWATCH_AUTO_COMPARE")
                .map(|v| v != "0")
                .unwrap_or(true),
            display_width: env_u64("FACEWATCH_DISPLAY_WIDTH", 720) as u32,
            display_height: env_u64("FACEWATCH_DISPLAY_HEIGHT", 560) as u32,
        }
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
