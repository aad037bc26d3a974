//! The image compressor panel.
//!
//! [`PanelState`] is the state machine: selected file, quality, compressed
//! result with its display handle, progress and the busy flag.
//! [`CompressorPanel`] shares one state behind a mutex and runs each
//! [`CompressionService`] call on its own task, applying every progress event
//! as it arrives. The lock is only ever held for a single transition.

use crate::blob_store::{BlobStore, DisplayHandle};
use crate::service::{CompressionService, ProgressReporter};
use crate::types::*;
use bytes::Bytes;
use futures_util::FutureExt;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub const COMPRESS_LABEL: &str = "Compress Image";
pub const COMPRESSING_LABEL: &str = "Compressing...";

/// Snapshot handed to the compression service when an attempt starts.
#[derive(Debug, Clone)]
pub struct Attempt {
    pub generation: u64,
    pub file: OriginalFile,
    pub options: CompressionOptions,
}

#[derive(Debug, Clone)]
pub struct Download {
    pub filename: &'static str,
    pub mime_type: String,
    pub content: Bytes,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileView {
    pub name: String,
    pub mime_type: String,
    pub size: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResultView {
    pub original_size: String,
    pub compressed_size: String,
    pub original_bytes: u64,
    pub compressed_bytes: u64,
    pub preview_url: String,
    pub download_url: String,
    pub download_filename: String,
}

/// Everything the UI renders, derived from a single consistent state.
#[derive(Debug, Clone, Serialize)]
pub struct PanelView {
    pub quality: Quality,
    pub file: Option<FileView>,
    pub busy: bool,
    pub progress: u8,
    pub can_compress: bool,
    pub compress_label: &'static str,
    pub result: Option<ResultView>,
}

#[derive(Debug)]
pub struct PanelState {
    blobs: BlobStore,
    original: Option<OriginalFile>,
    quality: Quality,
    compressed: Option<CompressedFile>,
    handle: Option<DisplayHandle>,
    progress: u8,
    busy: bool,
    // Bumped on every file selection; results from older generations are stale.
    generation: u64,
}

impl PanelState {
    pub fn new(blobs: BlobStore) -> Self {
        Self {
            blobs,
            original: None,
            quality: Quality::default(),
            compressed: None,
            handle: None,
            progress: 0,
            busy: false,
            generation: 0,
        }
    }

    pub fn quality(&self) -> Quality {
        self.quality
    }

    pub fn compressed(&self) -> Option<&CompressedFile> {
        self.compressed.as_ref()
    }

    pub fn display_handle(&self) -> Option<DisplayHandle> {
        self.handle
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn can_compress(&self) -> bool {
        self.original.is_some() && !self.busy
    }

    pub fn select_file(&mut self, file: OriginalFile) {
        log::info!("Selected {} ({} bytes, {})", file.name, file.size, file.mime_type);
        self.clear_result();
        self.original = Some(file);
        self.generation += 1;
    }

    pub fn set_quality(&mut self, quality: Quality) {
        self.quality = quality;
    }

    pub fn begin_compression(&mut self) -> Result<Attempt, PanelError> {
        let file = match (&self.original, self.busy) {
            (_, true) => return Err(PanelError::AlreadyCompressing),
            (None, false) => return Err(PanelError::NoFileSelected),
            (Some(file), false) => file.clone(),
        };

        self.clear_result();
        self.busy = true;
        self.progress = 0;

        Ok(Attempt {
            generation: self.generation,
            file,
            options: CompressionOptions::for_quality(self.quality),
        })
    }

    /// Applies a progress event: rounded, clamped to `0..=100`, never moving backwards.
    pub fn record_progress(&mut self, generation: u64, percent: f64) {
        if !self.busy || generation != self.generation || percent.is_nan() {
            return;
        }
        let percent = percent.round().clamp(0.0, 100.0) as u8;
        self.progress = self.progress.max(percent);
    }

    pub fn complete(&mut self, generation: u64, result: Result<CompressedFile, CompressionError>) {
        self.busy = false;

        match result {
            Ok(compressed) if generation == self.generation => {
                let handle = self.blobs.create(&compressed);
                log::info!(
                    "Compression finished: {} -> {}",
                    format_megabytes(self.original.as_ref().map_or(0, |f| f.size)),
                    format_megabytes(compressed.size)
                );
                self.compressed = Some(compressed);
                self.handle = Some(handle);
            }
            Ok(_) => {
                log::info!("Discarding compression result for a file that is no longer selected");
            }
            Err(e) => {
                log::error!("Error compressing image: {}", e);
            }
        }
    }

    pub fn download(&self) -> Result<Download, PanelError> {
        match (&self.compressed, &self.handle) {
            (Some(compressed), Some(_)) => Ok(Download {
                filename: DOWNLOAD_FILENAME,
                mime_type: compressed.mime_type.clone(),
                content: compressed.content.clone(),
            }),
            _ => Err(PanelError::NoResult),
        }
    }

    pub fn view(&self) -> PanelView {
        let result = match (&self.original, &self.compressed, &self.handle) {
            (Some(original), Some(compressed), Some(handle)) => Some(ResultView {
                original_size: format_megabytes(original.size),
                compressed_size: format_megabytes(compressed.size),
                original_bytes: original.size,
                compressed_bytes: compressed.size,
                preview_url: handle.url(),
                download_url: "/api/download".to_string(),
                download_filename: DOWNLOAD_FILENAME.to_string(),
            }),
            _ => None,
        };

        PanelView {
            quality: self.quality,
            file: self.original.as_ref().map(|f| FileView {
                name: f.name.clone(),
                mime_type: f.mime_type.clone(),
                size: f.size,
            }),
            busy: self.busy,
            progress: self.progress,
            can_compress: self.can_compress(),
            compress_label: if self.busy { COMPRESSING_LABEL } else { COMPRESS_LABEL },
            result,
        }
    }

    fn clear_result(&mut self) {
        self.compressed = None;
        if let Some(handle) = self.handle.take() {
            self.blobs.release(&handle);
        }
    }
}

/// A panel instance shared between callers, driving one compression at a time.
pub struct CompressorPanel<S> {
    state: Arc<Mutex<PanelState>>,
    blobs: BlobStore,
    service: Arc<S>,
}

impl<S: CompressionService + 'static> CompressorPanel<S> {
    pub fn new(service: S, blobs: BlobStore) -> Self {
        Self {
            state: Arc::new(Mutex::new(PanelState::new(blobs.clone()))),
            blobs,
            service: Arc::new(service),
        }
    }

    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    pub fn with_state<R>(&self, f: impl FnOnce(&PanelState) -> R) -> R {
        f(&lock(&self.state))
    }

    pub fn view(&self) -> PanelView {
        lock(&self.state).view()
    }

    pub fn select_file(&self, file: OriginalFile) -> PanelView {
        let mut state = lock(&self.state);
        state.select_file(file);
        state.view()
    }

    pub fn set_quality(&self, quality: Quality) -> PanelView {
        let mut state = lock(&self.state);
        state.set_quality(quality);
        state.view()
    }

    pub fn download(&self) -> Result<Download, PanelError> {
        lock(&self.state).download()
    }

    /// Starts one compression attempt and waits for it.
    ///
    /// Fails only if compressing is disabled. The attempt runs on its own task,
    /// so dropping this future detaches the caller without cancelling the work;
    /// the panel stays busy until the service resolves. A service failure is
    /// logged and leaves the panel without a result.
    pub async fn compress(&self) -> Result<PanelView, PanelError> {
        let attempt = lock(&self.state).begin_compression()?;
        let task = tokio::spawn(run_attempt(
            Arc::clone(&self.state),
            Arc::clone(&self.service),
            attempt,
        ));

        match task.await {
            Ok(view) => Ok(view),
            Err(e) => {
                log::error!("Compression task did not finish: {}", e);
                Ok(self.view())
            }
        }
    }
}

fn lock(state: &Mutex<PanelState>) -> MutexGuard<'_, PanelState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn record_progress(state: &Mutex<PanelState>, generation: u64, percent: f64) {
    lock(state).record_progress(generation, percent);
}

async fn run_attempt<S: CompressionService>(
    state: Arc<Mutex<PanelState>>,
    service: Arc<S>,
    attempt: Attempt,
) -> PanelView {
    let (reporter, mut events) = ProgressReporter::channel();
    let work = AssertUnwindSafe(service.compress(&attempt.file, &attempt.options, reporter)).catch_unwind();
    tokio::pin!(work);

    let result = loop {
        tokio::select! {
            biased;
            Some(percent) = events.next() => record_progress(&state, attempt.generation, percent),
            outcome = &mut work => {
                break outcome.unwrap_or_else(|_| {
                    Err(CompressionError::Task("compression service panicked".to_string()))
                });
            }
        }
    };

    let mut panel = lock(&state);
    while let Some(percent) = events.try_next() {
        panel.record_progress(attempt.generation, percent);
    }
    panel.complete(attempt.generation, result);
    panel.view()
}
