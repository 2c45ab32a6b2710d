use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{RwLock, broadcast, watch};
use tracing::{info, warn};

use crate::api::{ApiError, DocumentApi};
use crate::models::{Document, UploadFile};
use crate::registry::DocumentRegistry;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadPhase {
    Idle,
    Validating,
    Uploading,
    /// The backend has accepted the file and its analysis is reported as running.
    Analyzing,
    Done,
    Failed(String),
}

impl UploadPhase {
    pub fn progress_text(&self) -> Option<&str> {
        match self {
            UploadPhase::Uploading => Some("Mengunggah PDF..."),
            UploadPhase::Analyzing => Some("Menganalisis dokumen dengan AI..."),
            UploadPhase::Done => Some("Selesai! Dokumen berhasil diunggah dan dianalisis."),
            UploadPhase::Failed(message) => Some(message.as_str()),
            UploadPhase::Idle | UploadPhase::Validating => None,
        }
    }

    fn is_in_flight(&self) -> bool {
        matches!(self, UploadPhase::Validating | UploadPhase::Uploading | UploadPhase::Analyzing)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Pilih file PDF terlebih dahulu!")]
    NoFile,
    #[error("Hanya file PDF yang diperbolehkan.")]
    NotPdf,
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Remote(#[from] ApiError),
    #[error("an upload is already in progress")]
    InProgress,
}

pub fn validate(file: Option<UploadFile>) -> Result<UploadFile, ValidationError> {
    let file = file.ok_or(ValidationError::NoFile)?;
    if !file.is_pdf() {
        return Err(ValidationError::NotPdf);
    }
    Ok(file)
}

const PHASE_EVENTS_CAPACITY: usize = 16;

/// Drives the upload dialog: validate, upload, report progress, hand the result to the registry.
pub struct UploadCoordinator {
    api: Arc<dyn DocumentApi>,
    registry: Arc<RwLock<DocumentRegistry>>,
    /// Current phase, consulted by `close` and `submit`.
    phase: watch::Sender<UploadPhase>,
    /// Every transition in order, for progress display.
    events: broadcast::Sender<UploadPhase>,
    open: AtomicBool,
    close_delay: Duration,
}

impl UploadCoordinator {
    pub fn new(api: Arc<dyn DocumentApi>, registry: Arc<RwLock<DocumentRegistry>>, close_delay: Duration) -> Self {
        let (phase, _) = watch::channel(UploadPhase::Idle);
        let (events, _) = broadcast::channel(PHASE_EVENTS_CAPACITY);
        Self { api, registry, phase, events, open: AtomicBool::new(false), close_delay }
    }

    /// Every phase published after this call, in order. Ends when the coordinator is dropped.
    pub fn subscribe(&self) -> broadcast::Receiver<UploadPhase> {
        self.events.subscribe()
    }

    fn publish(&self, phase: UploadPhase) {
        self.phase.send_replace(phase.clone());
        // No receivers is fine.
        let _ = self.events.send(phase);
    }

    pub fn phase(&self) -> UploadPhase {
        self.phase.borrow().clone()
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    pub fn open_dialog(&self) {
        self.open.store(true, Ordering::Release);
        self.publish(UploadPhase::Idle);
    }

    /// Refused while a request is in flight.
    pub fn close(&self) -> bool {
        if self.phase.borrow().is_in_flight() {
            return false;
        }
        self.open.store(false, Ordering::Release);
        self.publish(UploadPhase::Idle);
        true
    }

    pub async fn submit(&self, file: Option<UploadFile>) -> Result<Document, UploadError> {
        let started = self.phase.send_if_modified(|phase| {
            if phase.is_in_flight() {
                return false;
            }
            *phase = UploadPhase::Validating;
            true
        });
        if !started {
            return Err(UploadError::InProgress);
        }
        let _ = self.events.send(UploadPhase::Validating);

        let file = match validate(file) {
            Ok(file) => file,
            Err(e) => {
                self.publish(UploadPhase::Failed(e.to_string()));
                return Err(e.into());
            }
        };

        self.publish(UploadPhase::Uploading);
        info!(file = %file.file_name, bytes = file.bytes.len(), "upload started");
        let mut doc = match self.api.upload_pdf(&file).await {
            Ok(doc) => doc,
            Err(e) => {
                warn!(error = %e, "upload failed");
                self.publish(UploadPhase::Failed(e.to_string()));
                return Err(e.into());
            }
        };
        if doc.original_name.is_empty() {
            doc.original_name = file.file_name.clone();
        }

        self.publish(UploadPhase::Analyzing);
        self.publish(UploadPhase::Done);
        self.registry.write().await.add(doc.clone());
        info!(id = %doc.id, "upload complete");

        tokio::time::sleep(self.close_delay).await;
        self.close();
        Ok(doc)
    }
}
