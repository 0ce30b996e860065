//! Debounced persistence of the canvas document.
//!
//! Every persisted mutation marks the manager dirty and restarts the
//! debounce window; the document is written once the window elapses without
//! further changes.

use crate::document::CanvasDocument;
use crate::error::CanvasResult;
use crate::model::LoadReport;
use crate::storage::{Storage, StorageResult};
use std::sync::Arc;

#[cfg(not(target_arch = "wasm32"))]
use std::time::{Duration, Instant};

#[cfg(target_arch = "wasm32")]
use web_time::{Duration, Instant};

/// Default quiet period before a pending change is written.
pub const DEFAULT_AUTOSAVE_DEBOUNCE_MS: u64 = 1500;

/// Id used when the host never names the document.
pub const DEFAULT_DOCUMENT_ID: &str = "canvas";

/// Writes the document to a storage backend after a quiet period.
pub struct AutoSaveManager<S: Storage> {
    storage: Arc<S>,
    document_id: String,
    debounce: Duration,
    /// Time of the latest unsaved change.
    last_change: Option<Instant>,
    dirty: bool,
    /// Bytes of the last successful write.
    last_export: Option<Vec<u8>>,
}

impl<S: Storage> AutoSaveManager<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self {
            storage,
            document_id: DEFAULT_DOCUMENT_ID.to_string(),
            debounce: Duration::from_millis(DEFAULT_AUTOSAVE_DEBOUNCE_MS),
            last_change: None,
            dirty: false,
            last_export: None,
        }
    }

    pub fn set_debounce(&mut self, debounce: Duration) {
        self.debounce = debounce;
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    pub fn set_document_id(&mut self, id: impl Into<String>) {
        self.document_id = id.into();
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    /// Record a change at `now`, restarting the debounce window.
    pub fn mark_dirty(&mut self, now: Instant) {
        self.dirty = true;
        self.last_change = Some(now);
    }

    /// Whether there are changes not yet written.
    pub fn is_unsaved(&self) -> bool {
        self.dirty
    }

    /// Bytes of the last successful write.
    pub fn last_export(&self) -> Option<&[u8]> {
        self.last_export.as_deref()
    }

    /// Dirty and quiet for at least the debounce window.
    pub fn should_save(&self, now: Instant) -> bool {
        if !self.dirty {
            return false;
        }
        match self.last_change {
            Some(changed) => now.saturating_duration_since(changed) >= self.debounce,
            None => true,
        }
    }

    /// Save if the debounce window has elapsed. Returns whether a write
    /// happened.
    pub async fn maybe_save(
        &mut self,
        document: &CanvasDocument,
        now: Instant,
    ) -> CanvasResult<bool> {
        if !self.should_save(now) {
            return Ok(false);
        }
        self.save(document).await
    }

    /// Write immediately. Identical bytes are not written again.
    ///
    /// On failure the document stays unsaved and is retried on the next
    /// call.
    pub async fn save(&mut self, document: &CanvasDocument) -> CanvasResult<bool> {
        let bytes = document.export()?;
        if self.last_export.as_deref() == Some(bytes.as_slice()) {
            log::debug!("Document {} unchanged, skipping write", self.document_id);
            self.dirty = false;
            return Ok(false);
        }
        if let Err(e) = self.storage.save(&self.document_id, &bytes).await {
            log::error!("Failed to save document {}: {}", self.document_id, e);
            return Err(e.into());
        }
        log::info!("Saved document {} ({} bytes)", self.document_id, bytes.len());
        self.last_export = Some(bytes);
        self.dirty = false;
        Ok(true)
    }

    /// Replace `document` with the stored one.
    pub async fn load(&mut self, document: &mut CanvasDocument) -> CanvasResult<LoadReport> {
        let bytes = self.storage.load(&self.document_id).await?;
        let report = document.load_bytes(&bytes)?;
        if report.dropped() > 0 || report.repaired > 0 {
            log::warn!(
                "Loaded document {} with {} dropped and {} repaired entities",
                self.document_id,
                report.dropped(),
                report.repaired
            );
        }
        self.last_export = Some(bytes);
        self.dirty = false;
        self.last_change = None;
        Ok(report)
    }

    pub async fn exists(&self) -> StorageResult<bool> {
        self.storage.exists(&self.document_id).await
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }
}
