//! Periodic one-to-one verification against a reference image.
//!
//! Each cycle decodes the reference image from disk, extracts one
//! descriptor per side (reference and live frame) and compares them by
//! Euclidean distance. Any failure along the way — unreadable
//! reference, zero faces on either side, inference error — resolves to
//! [`MatchDecision::NoMatch`]; the loop never stops on error. The
//! reference is re-decoded every cycle so an operator can swap the
//! file without restarting the daemon.

use crate::handle::LoopHandle;
use crate::source::FrameSource;
use facewatch_core::{Descriptor, InferenceError, InferenceProvider, MatchDecision};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("reference image: {0}")]
    Image(#[from] image::ImageError),
    #[error("inference: {0}")]
    Inference(#[from] InferenceError),
    #[error("inference task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// The verification loop state. Publishes one [`MatchDecision`] per
/// completed cycle and exposes an in-progress flag.
pub struct Verifier {
    source: Arc<dyn FrameSource>,
    provider: Arc<dyn InferenceProvider>,
    reference_path: PathBuf,
    threshold: f32,
    loading: Arc<AtomicBool>,
    tx: Arc<watch::Sender<MatchDecision>>,
    rx: watch::Receiver<MatchDecision>,
}

impl Verifier {
    pub fn new(
        source: Arc<dyn FrameSource>,
        provider: Arc<dyn InferenceProvider>,
        reference_path: PathBuf,
        threshold: f32,
    ) -> Self {
        let (tx, rx) = watch::channel(MatchDecision::Unknown);
        Self {
            source,
            provider,
            reference_path,
            threshold,
            loading: Arc::new(AtomicBool::new(false)),
            tx: Arc::new(tx),
            rx,
        }
    }

    /// Whether a comparison cycle is currently in flight.
    pub fn loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    pub fn subscribe(&self) -> watch::Receiver<MatchDecision> {
        self.rx.clone()
    }

    async fn extract_descriptor(
        &self,
        rgb: Vec<u8>,
        width: u32,
        height: u32,
    ) -> Result<Option<Descriptor>, VerifyError> {
        let provider = self.provider.clone();
        let face = tokio::task::spawn_blocking(move || {
            provider.detect_single(&rgb, width, height)
        })
        .await??;
        Ok(face.map(|f| f.descriptor))
    }

    /// One comparison attempt. `Ok(None)` means there was nothing to
    /// compare this cycle (no live frame); errors bubble up to be
    /// logged and collapsed into NoMatch by the caller.
    async fn try_compare(&self) -> Result<Option<MatchDecision>, VerifyError> {
        let reference = image::open(&self.reference_path)?.to_rgb8();
        let (ref_w, ref_h) = reference.dimensions();
        let reference_face = self
            .extract_descriptor(reference.into_raw(), ref_w, ref_h)
            .await?;

        let frame = match self.source.current_frame() {
            Ok(f) => f,
            Err(e) => {
                tracing::debug!(error = %e, "no live frame, comparison skipped");
                return Ok(None);
            }
        };
        let live_face = self
            .extract_descriptor(frame.data, frame.width, frame.height)
            .await?;

        let decision = match (reference_face, live_face) {
            (Some(a), Some(b)) => {
                let distance = a.euclidean_distance(&b);
                tracing::debug!(distance, threshold = self.threshold, "descriptors compared");
                if distance < self.threshold {
                    MatchDecision::Match
                } else {
                    MatchDecision::NoMatch
                }
            }
            // A side with no detectable face cannot match.
            _ => MatchDecision::NoMatch,
        };
        Ok(Some(decision))
    }

    /// Run one full cycle: raise the loading flag, compare, publish,
    /// and always drop the flag again whatever happened.
    pub async fn compare_once(&self) {
        self.loading.store(true, Ordering::SeqCst);

        let decision = match self.try_compare().await {
            Ok(Some(decision)) => Some(decision),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "verification cycle failed");
                Some(MatchDecision::NoMatch)
            }
        };

        if let Some(decision) = decision {
            tracing::info!(?decision, "verification result");
            let _ = self.tx.send(decision);
        }

        self.loading.store(false, Ordering::SeqCst);
    }

    /// Spawn the periodic loop.
    pub fn spawn(self: Arc<Self>, interval: Duration) -> LoopHandle {
        let task = tokio::spawn(async move {
            tracing::info!(?interval, reference = %self.reference_path.display(),
                "verification loop started");
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                self.compare_once().await;
            }
        });
        LoopHandle::new(task)
    }
}
