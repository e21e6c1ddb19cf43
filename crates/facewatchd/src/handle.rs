//! Cancellable handles for the periodic loops.

use tokio::task::JoinHandle;

/// Handle to a spawned loop task. Dropping or stopping the handle
/// aborts the task so no timer ticks leak after teardown.
pub struct LoopHandle {
    task: JoinHandle<()>,
}

impl LoopHandle {
    pub fn new(task: JoinHandle<()>) -> Self {
        Self { task }
    }

    /// Cancel the loop.
    pub fn stop(self) {
        self.task.abort();
    }
}

impl Drop for LoopHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
