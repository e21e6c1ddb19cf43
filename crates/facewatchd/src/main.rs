use anyhow::{Context, Result};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use facewatch_core::OnnxProvider;

mod alert;
mod capture;
mod config;
mod detect_loop;
mod font;
mod handle;
mod overlay;
mod source;
mod verify;

use alert::ExpressionAlarm;
use capture::{CaptureService, HttpUploadSink};
use config::Config;
use detect_loop::DetectionLoop;
use overlay::OverlayRenderer;
use source::{CameraSource, FrameSource};
use verify::Verifier;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("facewatchd starting");

    let config = Config::from_env();

    // Models are required: a daemon without inference has nothing to do.
    let provider = Arc::new(
        OnnxProvider::load(&config.model_dir, config.detector_variant)
            .with_context(|| format!("loading models from {}", config.model_dir.display()))?,
    );
    tracing::info!(
        model_dir = %config.model_dir.display(),
        variant = ?config.detector_variant,
        "models loaded"
    );

    // The camera is not: without one we stay up and idle so the
    // operator can plug a device in and restart, rather than crash-loop.
    let source: Arc<dyn FrameSource> = match CameraSource::open(&config.camera_device) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            tracing::error!(device = %config.camera_device, error = %e,
                "camera unavailable, running without detection");
            for dev in facewatch_hw::Camera::list_devices() {
                tracing::info!(path = %dev.path, name = %dev.name, driver = %dev.driver,
                    "capture device present");
            }
            tokio::signal::ctrl_c().await?;
            tracing::info!("facewatchd shutting down");
            return Ok(());
        }
    };
    let (src_w, src_h) = source.dimensions();
    tracing::info!(device = %config.camera_device, width = src_w, height = src_h, "camera open");

    let mut handles = Vec::new();

    // Detection loop publishing DetectionSets.
    let (detect_handle, detections_rx) =
        DetectionLoop::spawn(source.clone(), provider.clone(), config.detect_interval);
    handles.push(detect_handle);

    // Overlay surface, re-rendered on every published set.
    {
        let mut rx = detections_rx.clone();
        let mut renderer = OverlayRenderer::new(
            (config.display_width, config.display_height),
            (src_w, src_h),
        );
        let task = tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let set = rx.borrow_and_update().clone();
                renderer.render(&set);
            }
        });
        handles.push(handle::LoopHandle::new(task));
    }

    // Expression alerts.
    let (alarm, mut alert_rx) = ExpressionAlarm::new(config.alert_stagger);
    handles.push(alert::spawn_alert_task(detections_rx.clone(), alarm));
    {
        let task = tokio::spawn(async move {
            while alert_rx.changed().await.is_ok() {
                let message = alert_rx.borrow_and_update().clone();
                tracing::warn!(%message, "alert");
            }
        });
        handles.push(handle::LoopHandle::new(task));
    }

    // Capture on SIGUSR1.
    {
        let source = source.clone();
        let detections_rx = detections_rx.clone();
        let upload_url = config.upload_url.clone();
        let task = tokio::spawn(async move {
            let mut service = CaptureService::new(HttpUploadSink::new(upload_url));
            let mut signal = match tokio::signal::unix::signal(
                tokio::signal::unix::SignalKind::user_defined1(),
            ) {
                Ok(s) => s,
                Err(e) => {
                    tracing::error!(error = %e, "cannot listen for SIGUSR1, capture disabled");
                    return;
                }
            };
            while signal.recv().await.is_some() {
                let frame = match source.current_frame() {
                    Ok(f) => f,
                    Err(e) => {
                        tracing::warn!(error = %e, "capture requested but no frame");
                        continue;
                    }
                };
                let set = detections_rx.borrow().clone();
                if let Err(e) = service.capture(&frame, &set).await {
                    tracing::error!(error = %e, "capture failed");
                }
            }
        });
        handles.push(handle::LoopHandle::new(task));
    }

    // Verification loop.
    if config.auto_compare {
        let verifier = Arc::new(Verifier::new(
            source.clone(),
            provider.clone(),
            config.reference_image.clone(),
            config.match_threshold,
        ));
        let mut rx = verifier.subscribe();
        handles.push(verifier.spawn(config.compare_interval));

        let task = tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let decision = *rx.borrow_and_update();
                tracing::info!(?decision, "identity check");
            }
        });
        handles.push(handle::LoopHandle::new(task));
    } else {
        tracing::info!("auto compare disabled");
    }

    tracing::info!("facewatchd ready");

    tokio::signal::ctrl_c().await?;
    for handle in handles {
        handle.stop();
    }
    tracing::info!("facewatchd shutting down");

    Ok(())
}
