//! Compression service seam.
//!
//! A service turns an [`OriginalFile`] into a [`CompressedFile`] and may report
//! progress along the way. Progress travels over a channel so the caller can
//! apply each event to its own state while the call is still running.

use crate::types::*;
use futures_util::future::BoxFuture;
use tokio::sync::mpsc;

/// Sending half of a progress stream. Cheap to clone into blocking tasks.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    tx: mpsc::UnboundedSender<f64>,
}

/// Receiving half of a progress stream, alive for a single compression call.
#[derive(Debug)]
pub struct ProgressEvents {
    rx: mpsc::UnboundedReceiver<f64>,
}

impl ProgressReporter {
    pub fn channel() -> (ProgressReporter, ProgressEvents) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ProgressReporter { tx }, ProgressEvents { rx })
    }

    /// Reports a percentage in `0..=100`. Dropped silently once nobody listens.
    pub fn report(&self, percent: f64) {
        if self.tx.send(percent).is_err() {
            log::debug!("Progress {:.1}% dropped: no subscriber", percent);
        }
    }
}

impl ProgressEvents {
    pub async fn next(&mut self) -> Option<f64> {
        self.rx.recv().await
    }

    /// Next event that is already queued, without waiting.
    pub fn try_next(&mut self) -> Option<f64> {
        self.rx.try_recv().ok()
    }
}

pub trait CompressionService: Send + Sync {
    fn compress<'a>(
        &'a self,
        file: &'a OriginalFile,
        options: &'a CompressionOptions,
        progress: ProgressReporter,
    ) -> BoxFuture<'a, Result<CompressedFile, CompressionError>>;
}
