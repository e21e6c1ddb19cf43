//! Still-frame capture and best-effort upload.
//!
//! Capture rasterizes the current frame at native resolution, bakes
//! the overlay in when detections exist, encodes a JPEG and appends it
//! to the session history. The upload is a separate, best-effort step:
//! a failed POST is logged and forgotten, and never touches the
//! already-appended history entry.

use crate::overlay;
use facewatch_core::DetectionSet;
use facewatch_hw::Frame;
use image::RgbImage;
use std::io::Cursor;
use std::time::SystemTime;
use thiserror::Error;

const UPLOAD_FIELD: &str = "image";
const UPLOAD_FILENAME: &str = "capture.jpg";
const JPEG_MIME: &str = "image/jpeg";

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),
    #[error("upload rejected with status {status}")]
    Rejected { status: u16 },
}

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("frame buffer does not match its dimensions")]
    BadFrame,
    #[error("jpeg encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// One captured still. Immutable once appended.
pub struct CapturedImage {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
    pub taken_at: SystemTime,
}

/// Destination for captured stills.
#[allow(async_fn_in_trait)]
pub trait UploadSink: Send + Sync {
    /// Transmit one encoded image; returns the server's JSON
    /// confirmation body.
    async fn upload(&self, bytes: Vec<u8>) -> Result<serde_json::Value, UploadError>;
}

/// Multipart POST to the configured endpoint.
pub struct HttpUploadSink {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpUploadSink {
    pub fn new(endpoint: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
        }
    }
}

impl UploadSink for HttpUploadSink {
    async fn upload(&self, bytes: Vec<u8>) -> Result<serde_json::Value, UploadError> {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(UPLOAD_FILENAME)
            .mime_str(JPEG_MIME)?;
        let form = reqwest::multipart::Form::new().part(UPLOAD_FIELD, part);

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(UploadError::Rejected { status: status.as_u16() });
        }

        Ok(response.json().await?)
    }
}

/// Capture history plus its upload sink. The history only ever grows
/// during a session.
pub struct CaptureService<S: UploadSink> {
    history: Vec<CapturedImage>,
    sink: S,
}

impl<S: UploadSink> CaptureService<S> {
    pub fn new(sink: S) -> Self {
        Self { history: Vec::new(), sink }
    }

    /// Capture a still of `frame`, bake in the overlay for
    /// `detections` (skipped when empty — that is not an error),
    /// append it to the history and fire the upload. Capture and
    /// upload are not atomic: the append stands whatever the upload
    /// outcome.
    pub async fn capture(
        &mut self,
        frame: &Frame,
        detections: &DetectionSet,
    ) -> Result<(), CaptureError> {
        let mut canvas: RgbImage =
            RgbImage::from_raw(frame.width, frame.height, frame.data.clone())
                .ok_or(CaptureError::BadFrame)?;

        if !detections.is_empty() {
            // Detections are reported at the native frame resolution,
            // so source and target sizes coincide here.
            overlay::draw_detections(&mut canvas, detections, frame.width, frame.height);
        }

        let mut bytes = Vec::new();
        canvas.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Jpeg)?;

        self.history.push(CapturedImage {
            bytes: bytes.clone(),
            mime_type: JPEG_MIME,
            taken_at: SystemTime::now(),
        });
        tracing::info!(
            size = bytes.len(),
            total = self.history.len(),
            faces = detections.len(),
            "frame captured"
        );

        match self.sink.upload(bytes).await {
            Ok(confirmation) => tracing::info!(%confirmation, "image saved"),
            Err(e) => tracing::error!(error = %e, "error saving image"),
        }

        Ok(())
    }

    pub fn history(&self) -> &[CapturedImage] {
        &self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facewatch_core::{BoundingBox, Detection, Expression, Expressions, Landmarks};
    use std::sync::Mutex;

    struct RecordingSink {
        uploads: Mutex<Vec<Vec<u8>>>,
    }

    impl RecordingSink {
        fn new() -> Self {
            Self { uploads: Mutex::new(Vec::new()) }
        }
    }

    impl UploadSink for RecordingSink {
        async fn upload(&self, bytes: Vec<u8>) -> Result<serde_json::Value, UploadError> {
            self.uploads.lock().unwrap().push(bytes);
            Ok(serde_json::json!({ "ok": true }))
        }
    }

    struct FailingSink;

    impl UploadSink for FailingSink {
        async fn upload(&self, _bytes: Vec<u8>) -> Result<serde_json::Value, UploadError> {
            Err(UploadError::Rejected { status: 500 })
        }
    }

    fn test_frame() -> Frame {
        Frame {
            data: vec![100u8; 64 * 48 * 3],
            width: 64,
            height: 48,
            timestamp: std::time::Instant::now(),
            sequence: 7,
        }
    }

    fn one_detection() -> Detection {
        Detection {
            bbox: BoundingBox { x: 8.0, y: 8.0, width: 20.0, height: 20.0, confidence: 0.9 },
            landmarks: Landmarks(vec![(12.0, 12.0); 68]),
            expressions: [(Expression::Happy, 0.8)]
                .into_iter()
                .collect::<Expressions>(),
        }
    }

    #[tokio::test]
    async fn test_capture_with_empty_set_still_appends() {
        let mut service = CaptureService::new(RecordingSink::new());
        service
            .capture(&test_frame(), &DetectionSet::new())
            .await
            .unwrap();

        assert_eq!(service.history().len(), 1);
        let entry = &service.history()[0];
        assert_eq!(entry.mime_type, "image/jpeg");
        // JPEG SOI marker.
        assert_eq!(&entry.bytes[..2], &[0xFF, 0xD8]);
    }

    #[tokio::test]
    async fn test_capture_uploads_encoded_bytes() {
        let mut service = CaptureService::new(RecordingSink::new());
        service
            .capture(&test_frame(), &vec![one_detection()])
            .await
            .unwrap();

        let uploads = service.sink.uploads.lock().unwrap();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0], service.history()[0].bytes);
    }

    #[tokio::test]
    async fn test_failed_upload_keeps_history_entry() {
        let mut service = CaptureService::new(FailingSink);
        service
            .capture(&test_frame(), &vec![one_detection()])
            .await
            .unwrap();

        assert_eq!(service.history().len(), 1);
        assert_eq!(&service.history()[0].bytes[..2], &[0xFF, 0xD8]);

        // A second failed capture appends again; nothing is removed.
        service
            .capture(&test_frame(), &DetectionSet::new())
            .await
            .unwrap();
        assert_eq!(service.history().len(), 2);
    }

    #[tokio::test]
    async fn test_capture_rejects_mismatched_frame() {
        let mut service = CaptureService::new(RecordingSink::new());
        let bad = Frame {
            data: vec![0u8; 10],
            width: 64,
            height: 48,
            timestamp: std::time::Instant::now(),
            sequence: 0,
        };
        assert!(matches!(
            service.capture(&bad, &DetectionSet::new()).await,
            Err(CaptureError::BadFrame)
        ));
        assert!(service.history().is_empty());
    }
}
