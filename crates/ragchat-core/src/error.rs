//! Error types shared by the conversation, upload and transport layers.

/// Input rejected before any network call is made.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("a question is already waiting for an answer")]
    RequestInFlight,
    #[error("unsupported file type for {filename}: only PDF and TXT files can be uploaded")]
    UnsupportedType { filename: String },
    #[error("{filename} is empty")]
    EmptyFile { filename: String },
    #[error("an upload is already in progress")]
    UploadInProgress,
    #[error("{0} is required")]
    MissingField(&'static str),
}

/// Every way a call to the backend can fail, normalized in one place.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("could not reach the backend: {0}")]
    Network(String),
    #[error("the backend did not respond in time")]
    Timeout,
    #[error("backend returned HTTP {status}: {}", .detail.as_deref().unwrap_or("no details"))]
    Status { status: u16, detail: Option<String> },
    #[error("backend rejected the request: {0}")]
    Rejected(String),
    #[error("malformed response from the backend: {0}")]
    Malformed(String),
    #[error("invalid backend URL: {0}")]
    InvalidUrl(String),
}

impl TransportError {
    /// Human-readable detail supplied by the backend itself, if any.
    pub fn detail(&self) -> Option<&str> {
        match self {
            TransportError::Status { detail, .. } => detail.as_deref(),
            TransportError::Rejected(detail) => Some(detail),
            _ => None,
        }
    }

    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return TransportError::Timeout;
        }
        if err.is_decode() {
            return TransportError::Malformed(err.to_string());
        }
        if err.is_builder() {
            return TransportError::InvalidUrl(err.to_string());
        }
        TransportError::Network(err.to_string())
    }
}

/// Errors surfaced by the library as a whole.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        assert_eq!(ValidationError::EmptyMessage.to_string(), "message cannot be empty");
        assert_eq!(
            ValidationError::UnsupportedType { filename: "notes.docx".to_string() }.to_string(),
            "unsupported file type for notes.docx: only PDF and TXT files can be uploaded"
        );
        assert_eq!(
            ValidationError::MissingField("company name").to_string(),
            "company name is required"
        );
    }

    #[test]
    fn test_status_error_with_and_without_detail() {
        let err = TransportError::Status {
            status: 500,
            detail: Some("Error processing your question".to_string()),
        };
        assert_eq!(err.to_string(), "backend returned HTTP 500: Error processing your question");
        assert_eq!(err.detail(), Some("Error processing your question"));

        let err = TransportError::Status { status: 404, detail: None };
        assert_eq!(err.to_string(), "backend returned HTTP 404: no details");
        assert_eq!(err.detail(), None);
    }

    #[test]
    fn test_only_backend_supplied_errors_have_detail() {
        assert_eq!(TransportError::Rejected("Only PDF files are allowed".into()).detail(), Some("Only PDF files are allowed"));
        assert_eq!(TransportError::Timeout.detail(), None);
        assert_eq!(TransportError::Network("refused".into()).detail(), None);
    }

    #[test]
    fn test_chat_error_is_transparent() {
        let err: ChatError = ValidationError::UploadInProgress.into();
        assert_eq!(err.to_string(), "an upload is already in progress");
        let err: ChatError = TransportError::Timeout.into();
        assert!(matches!(err, ChatError::Transport(TransportError::Timeout)));
    }
}
