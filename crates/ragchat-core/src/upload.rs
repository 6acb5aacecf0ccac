//! Upload lifecycle: validation, phase transitions and progress tracking for
//! the single upload shown to the user.
//!
//! Only one upload is tracked at a time. Starting a new one while a transfer
//! is running is rejected; a finished task is simply replaced.

use std::path::Path;
use std::time::{Duration, Instant};

use bytes::Bytes;
use uuid::Uuid;

use crate::error::{ChatError, TransportError, ValidationError};
use crate::transport::UploadReceipt;

pub const SUCCESS_DISPLAY: Duration = Duration::from_secs(5);

const GENERIC_FAILURE: &str = "Error uploading file. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Text,
}

impl DocumentKind {
    pub fn from_media_type(media_type: &str) -> Option<Self> {
        let essence = media_type.split(';').next().unwrap_or(media_type).trim();
        match essence.to_ascii_lowercase().as_str() {
            "application/pdf" => Some(DocumentKind::Pdf),
            "text/plain" => Some(DocumentKind::Text),
            _ => None,
        }
    }

    pub fn from_filename(filename: &str) -> Option<Self> {
        let ext = Path::new(filename).extension()?.to_str()?;
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(DocumentKind::Pdf),
            "txt" => Some(DocumentKind::Text),
            _ => None,
        }
    }

    pub fn media_type(&self) -> &'static str {
        match self {
            DocumentKind::Pdf => "application/pdf",
            DocumentKind::Text => "text/plain",
        }
    }
}

/// A file about to be sent to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub filename: String,
    pub media_type: Option<String>,
    pub bytes: Bytes,
}

impl UploadFile {
    pub fn new(filename: impl Into<String>, media_type: Option<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            media_type,
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk, guessing its media type from the extension.
    pub async fn from_path(path: &Path) -> Result<Self, ChatError> {
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let media_type = DocumentKind::from_filename(&filename).map(|kind| kind.media_type().to_string());
        let bytes = tokio::fs::read(path).await?;
        Ok(Self::new(filename, media_type, bytes))
    }

    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Accepts the file if either its declared media type or its extension
    /// names a supported kind.
    pub fn kind(&self) -> Option<DocumentKind> {
        self.media_type
            .as_deref()
            .and_then(DocumentKind::from_media_type)
            .or_else(|| DocumentKind::from_filename(&self.filename))
    }

    pub fn validate(&self) -> Result<DocumentKind, ValidationError> {
        let kind = self.kind().ok_or_else(|| ValidationError::UnsupportedType {
            filename: self.filename.clone(),
        })?;
        if self.bytes.is_empty() {
            return Err(ValidationError::EmptyFile {
                filename: self.filename.clone(),
            });
        }
        Ok(kind)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadPhase {
    Pending,
    Transferring,
    Succeeded,
    Failed,
}

impl UploadPhase {
    fn can_advance_to(self, next: UploadPhase) -> bool {
        matches!(
            (self, next),
            (UploadPhase::Pending, UploadPhase::Transferring)
                | (UploadPhase::Transferring, UploadPhase::Succeeded)
                | (UploadPhase::Transferring, UploadPhase::Failed)
        )
    }

    pub fn is_finished(self) -> bool {
        matches!(self, UploadPhase::Succeeded | UploadPhase::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTask {
    pub id: Uuid,
    pub filename: String,
    pub size_bytes: u64,
    pub progress_percent: u8,
    pub phase: UploadPhase,
    pub error_message: Option<String>,
    pub message: Option<String>,
    finished_at: Option<Instant>,
}

impl UploadTask {
    fn advance(&mut self, next: UploadPhase) -> bool {
        if !self.phase.can_advance_to(next) {
            tracing::warn!(task = %self.id, from = ?self.phase, to = ?next, "ignoring invalid upload transition");
            return false;
        }
        self.phase = next;
        true
    }
}

#[derive(Debug)]
pub struct UploadCoordinator {
    task: Option<UploadTask>,
    success_display: Duration,
}

impl Default for UploadCoordinator {
    fn default() -> Self {
        Self::new(SUCCESS_DISPLAY)
    }
}

impl UploadCoordinator {
    pub fn new(success_display: Duration) -> Self {
        Self {
            task: None,
            success_display,
        }
    }

    pub fn current(&self) -> Option<&UploadTask> {
        self.task.as_ref()
    }

    pub fn is_transferring(&self) -> bool {
        matches!(&self.task, Some(task) if task.phase == UploadPhase::Transferring)
    }

    /// Validate the file and begin tracking it. The returned id tags every
    /// later progress and completion report.
    pub fn start(&mut self, file: &UploadFile) -> Result<Uuid, ValidationError> {
        file.validate()?;
        if self.is_transferring() {
            return Err(ValidationError::UploadInProgress);
        }

        let mut task = UploadTask {
            id: Uuid::new_v4(),
            filename: file.filename.clone(),
            size_bytes: file.size_bytes(),
            progress_percent: 0,
            phase: UploadPhase::Pending,
            error_message: None,
            message: None,
            finished_at: None,
        };
        task.advance(UploadPhase::Transferring);

        tracing::info!(task = %task.id, filename = %task.filename, bytes = task.size_bytes, "upload started");
        let id = task.id;
        self.task = Some(task);
        Ok(id)
    }

    /// Returns true when the reported value moved the progress forward.
    pub fn record_progress(&mut self, id: Uuid, percent: u8) -> bool {
        let Some(task) = self.active_task(id) else {
            return false;
        };
        let percent = percent.min(100);
        if percent <= task.progress_percent {
            return false;
        }
        task.progress_percent = percent;
        true
    }

    pub fn finish(
        &mut self,
        id: Uuid,
        outcome: Result<UploadReceipt, TransportError>,
        now: Instant,
    ) -> Option<&UploadTask> {
        let task = self.active_task(id)?;
        match outcome {
            Ok(receipt) => {
                task.advance(UploadPhase::Succeeded);
                task.progress_percent = 100;
                task.message = receipt.message;
                tracing::info!(task = %id, filename = %task.filename, "upload succeeded");
            }
            Err(err) => {
                task.advance(UploadPhase::Failed);
                task.error_message = Some(err.detail().unwrap_or(GENERIC_FAILURE).to_string());
                tracing::warn!(task = %id, filename = %task.filename, error = %err, "upload failed");
            }
        }
        task.finished_at = Some(now);
        self.task.as_ref()
    }

    /// Drop a succeeded task once it has been on screen long enough.
    pub fn expire(&mut self, now: Instant) -> bool {
        let expired = matches!(
            &self.task,
            Some(UploadTask { phase: UploadPhase::Succeeded, finished_at: Some(at), .. })
                if now.saturating_duration_since(*at) >= self.success_display
        );
        if expired {
            self.task = None;
        }
        expired
    }

    /// Dismiss a finished task. A running transfer cannot be dismissed.
    pub fn dismiss(&mut self) -> bool {
        match &self.task {
            Some(task) if task.phase.is_finished() => {
                self.task = None;
                true
            }
            _ => false,
        }
    }

    fn active_task(&mut self, id: Uuid) -> Option<&mut UploadTask> {
        self.task
            .as_mut()
            .filter(|task| task.id == id && task.phase == UploadPhase::Transferring)
    }
}
