//! The periodic detection loop.
//!
//! Ticks on a fixed wall-clock interval, pulls the current frame and
//! runs full-frame inference off the runtime threads. The tick never
//! waits for the previous inference: calls may overlap in flight and
//! complete out of order, and whichever finishes last wins the
//! published slot. Inference and acquisition errors skip the update;
//! the loop self-heals on the next tick.

use crate::handle::LoopHandle;
use crate::source::FrameSource;
use facewatch_core::{DetectionSet, InferenceProvider};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Spawns the detection loop and returns its cancel handle plus the
/// receiver for the published DetectionSet. The initial value is the
/// empty set.
pub struct DetectionLoop;

impl DetectionLoop {
    pub fn spawn(
        source: Arc<dyn FrameSource>,
        provider: Arc<dyn InferenceProvider>,
        interval: Duration,
    ) -> (LoopHandle, watch::Receiver<DetectionSet>) {
        let (tx, rx) = watch::channel(DetectionSet::new());
        let tx = Arc::new(tx);

        let task = tokio::spawn(run(source, provider, interval, tx));
        (LoopHandle::new(task), rx)
    }
}

async fn run(
    source: Arc<dyn FrameSource>,
    provider: Arc<dyn InferenceProvider>,
    interval: Duration,
    tx: Arc<watch::Sender<DetectionSet>>,
) {
    tracing::info!(?interval, "detection loop started");
    let mut ticker = tokio::time::interval(interval);

    loop {
        ticker.tick().await;

        if !source.ready() {
            continue;
        }

        let frame = match source.current_frame() {
            Ok(f) => f,
            Err(e) => {
                tracing::debug!(error = %e, "no frame this tick");
                continue;
            }
        };

        // Fire-and-forget: the next tick is scheduled regardless of
        // how long this inference takes.
        let provider = provider.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            let result = tokio::task::spawn_blocking(move || {
                provider.detect_all(&frame.data, frame.width, frame.height)
            })
            .await;

            match result {
                Ok(Ok(set)) => {
                    tracing::debug!(faces = set.len(), "published detection set");
                    let _ = tx.send(set);
                }
                Ok(Err(e)) => tracing::debug!(error = %e, "inference failed, update skipped"),
                Err(e) => tracing::warn!(error = %e, "inference task aborted"),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceError;
    use facewatch_core::{
        BoundingBox, Detection, Expressions, FaceWithDescriptor, InferenceError, Landmarks,
    };
    use facewatch_hw::Frame;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct StubSource {
        ready: AtomicBool,
    }

    impl StubSource {
        fn new(ready: bool) -> Self {
            Self { ready: AtomicBool::new(ready) }
        }
    }

    impl FrameSource for StubSource {
        fn ready(&self) -> bool {
            self.ready.load(Ordering::SeqCst)
        }

        fn dimensions(&self) -> (u32, u32) {
            (8, 8)
        }

        fn current_frame(&self) -> Result<Frame, SourceError> {
            if !self.ready() {
                return Err(SourceError::NoFrame);
            }
            Ok(Frame {
                data: vec![128u8; 8 * 8 * 3],
                width: 8,
                height: 8,
                timestamp: std::time::Instant::now(),
                sequence: 0,
            })
        }
    }

    struct StubProvider {
        calls: AtomicUsize,
        faces: usize,
    }

    impl StubProvider {
        fn new(faces: usize) -> Self {
            Self { calls: AtomicUsize::new(0), faces }
        }
    }

    fn dummy_detection() -> Detection {
        Detection {
            bbox: BoundingBox { x: 1.0, y: 1.0, width: 4.0, height: 4.0, confidence: 0.9 },
            landmarks: Landmarks(vec![(2.0, 2.0); 68]),
            expressions: Expressions::default(),
        }
    }

    impl InferenceProvider for StubProvider {
        fn detect_all(
            &self,
            _rgb: &[u8],
            _width: u32,
            _height: u32,
        ) -> Result<DetectionSet, InferenceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![dummy_detection(); self.faces])
        }

        fn detect_single(
            &self,
            _rgb: &[u8],
            _width: u32,
            _height: u32,
        ) -> Result<Option<FaceWithDescriptor>, InferenceError> {
            Ok(None)
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_loop_publishes_detections() {
        let source = Arc::new(StubSource::new(true));
        let provider = Arc::new(StubProvider::new(2));
        let (handle, mut rx) =
            DetectionLoop::spawn(source, provider.clone(), Duration::from_millis(5));

        rx.changed().await.expect("loop should publish");
        assert_eq!(rx.borrow().len(), 2);
        assert!(provider.calls.load(Ordering::SeqCst) >= 1);
        handle.stop();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_loop_skips_when_not_ready() {
        let source = Arc::new(StubSource::new(false));
        let provider = Arc::new(StubProvider::new(1));
        let (handle, rx) =
            DetectionLoop::spawn(source, provider.clone(), Duration::from_millis(5));

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
        assert!(rx.borrow().is_empty());
        handle.stop();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stop_cancels_ticks() {
        let source = Arc::new(StubSource::new(true));
        let provider = Arc::new(StubProvider::new(0));
        let (handle, _rx) =
            DetectionLoop::spawn(source, provider.clone(), Duration::from_millis(5));

        tokio::time::sleep(Duration::from_millis(30)).await;
        handle.stop();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let calls_after_stop = provider.calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(provider.calls.load(Ordering::SeqCst), calls_after_stop);
    }
}
