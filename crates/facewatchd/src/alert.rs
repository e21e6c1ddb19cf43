//! Expression alert state machine.
//!
//! Consumes published DetectionSets and surfaces a human-readable
//! message, debounced by a single "alerting" flag. When a non-empty
//! set arrives while idle, one delayed evaluation is scheduled per
//! detection, staggered by array index; each evaluation classifies
//! that detection's expressions and may overwrite the published
//! message.
//!
//! Debounce caveat, kept on purpose: every evaluation clears the
//! alerting flag when it finishes, so the flag only excludes new sets
//! until the FIRST evaluation fires (at offset zero), not for the full
//! stagger sequence. This mirrors the behavior of the system this
//! replaces; see DESIGN.md for the open question on whether the flag
//! should instead stay set until the last evaluation.

use crate::handle::LoopHandle;
use facewatch_core::{DetectionSet, Expression, Expressions};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

pub const MSG_THIEF: &str = "There is a thief";
pub const MSG_NEUTRAL: &str = "Someone has a neutral expression";
pub const MSG_HAPPY: &str = "Someone looks happy";

const ALERT_THRESHOLD: f32 = 0.5;

/// First-match classification in fixed priority order: sad, then
/// neutral, then happy. Returns `None` when nothing crosses the
/// threshold.
pub fn classify(expressions: &Expressions) -> Option<&'static str> {
    if expressions.score(Expression::Sad) > ALERT_THRESHOLD {
        Some(MSG_THIEF)
    } else if expressions.score(Expression::Neutral) > ALERT_THRESHOLD {
        Some(MSG_NEUTRAL)
    } else if expressions.score(Expression::Happy) > ALERT_THRESHOLD {
        Some(MSG_HAPPY)
    } else {
        None
    }
}

/// The alarm. Owns the alerting flag and the published message; at
/// most one alert lifecycle is started per non-empty set observed
/// while idle.
pub struct ExpressionAlarm {
    alerting: Arc<AtomicBool>,
    stagger: Duration,
    tx: Arc<watch::Sender<String>>,
}

impl ExpressionAlarm {
    pub fn new(stagger: Duration) -> (Self, watch::Receiver<String>) {
        let (tx, rx) = watch::channel(String::new());
        (
            Self {
                alerting: Arc::new(AtomicBool::new(false)),
                stagger,
                tx: Arc::new(tx),
            },
            rx,
        )
    }

    /// Feed one published DetectionSet into the state machine.
    pub fn observe(&self, set: &DetectionSet) {
        if set.is_empty() || self.alerting.load(Ordering::SeqCst) {
            return;
        }

        self.alerting.store(true, Ordering::SeqCst);

        for (index, detection) in set.iter().enumerate() {
            let expressions = detection.expressions.clone();
            let alerting = self.alerting.clone();
            let tx = self.tx.clone();
            let delay = self.stagger * index as u32;

            tokio::spawn(async move {
                tokio::time::sleep(delay).await;

                // Evaluations always run: the guard was checked against
                // the flag value at scheduling time, which was false.
                if let Some(message) = classify(&expressions) {
                    tracing::info!(index, message, "expression alert");
                    let _ = tx.send(message.to_string());
                }

                // Cleared after every evaluation, not after the last
                // one — the preserved debounce quirk described above.
                alerting.store(false, Ordering::SeqCst);
            });
        }
    }

    pub fn is_alerting(&self) -> bool {
        self.alerting.load(Ordering::SeqCst)
    }
}

/// Wire the alarm to a DetectionSet receiver as a background task.
pub fn spawn_alert_task(
    mut detections: watch::Receiver<DetectionSet>,
    alarm: ExpressionAlarm,
) -> LoopHandle {
    let task = tokio::spawn(async move {
        while detections.changed().await.is_ok() {
            let set = detections.borrow_and_update().clone();
            alarm.observe(&set);
        }
    });
    LoopHandle::new(task)
}
