use crate::types::CompressedFile;
use bytes::Bytes;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use uuid::Uuid;

/// Temporary reference that lets a blob act as a preview source or download target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct DisplayHandle(Uuid);

impl DisplayHandle {
    pub fn id(&self) -> Uuid {
        self.0
    }

    pub fn url(&self) -> String {
        format!("/blob/{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct StoredBlob {
    pub content: Bytes,
    pub mime_type: String,
}

/// Process-wide registry of display handles. Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct BlobStore {
    blobs: Arc<RwLock<HashMap<Uuid, StoredBlob>>>,
}

impl BlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, file: &CompressedFile) -> DisplayHandle {
        let id = Uuid::new_v4();
        self.blobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                id,
                StoredBlob {
                    content: file.content.clone(),
                    mime_type: file.mime_type.clone(),
                },
            );
        log::debug!("Created display handle {} ({} bytes)", id, file.size);
        DisplayHandle(id)
    }

    pub fn get(&self, id: &Uuid) -> Option<StoredBlob> {
        self.blobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Releases a handle. Returns false if it was already gone.
    pub fn release(&self, handle: &DisplayHandle) -> bool {
        let removed = self
            .blobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&handle.0)
            .is_some();
        if removed {
            log::debug!("Released display handle {}", handle.0);
        }
        removed
    }

    /// Number of live handles and their total size in bytes.
    pub fn stats(&self) -> (usize, u64) {
        let blobs = self.blobs.read().unwrap_or_else(PoisonError::into_inner);
        let total_size = blobs.values().map(|b| b.content.len() as u64).sum();
        (blobs.len(), total_size)
    }
}
