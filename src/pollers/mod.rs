//! Background REST pollers
//!
//! The vehicle computer also exposes a plain HTTP API; these tasks poll it
//! on fixed intervals and feed the shared store. Each poller is an
//! independent tokio task owned by a `PollerHandle`; dropping or stopping
//! the handle aborts the task.

mod detections;
mod solar;
mod telemetry;

pub use detections::start_detection_polling;
pub use solar::start_solar_polling;
pub use telemetry::start_telemetry_polling;

use tokio::task::JoinHandle;

/// Owner handle for a running poller task.
pub struct PollerHandle {
    handle: JoinHandle<()>,
}

impl PollerHandle {
    fn new(handle: JoinHandle<()>) -> Self {
        Self { handle }
    }

    pub fn stop(self) {
        self.handle.abort();
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
