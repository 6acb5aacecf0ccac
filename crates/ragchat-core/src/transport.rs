//! HTTP boundary to the RAG backend.
//!
//! Every outbound call goes through [`Backend`]. Network failures, timeouts,
//! non-2xx statuses and undecodable bodies are all turned into a
//! [`TransportError`] here and nowhere else.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use reqwest::{multipart, Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::TransportError;
use crate::state::Citation;
use crate::upload::UploadFile;

const UPLOAD_CHUNK_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AskRequest {
    pub question: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AskResponse {
    pub response: String,
    #[serde(default)]
    pub sources: Vec<Citation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadReceipt {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default = "default_success")]
    pub success: bool,
    #[serde(default)]
    pub filename: Option<String>,
}

fn default_success() -> bool {
    true
}

/// One entry of `GET /documents`, as the backend sends it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteDocument {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub last_modified: Option<String>,
}

#[derive(Deserialize)]
struct DocumentListing {
    documents: Vec<RemoteDocument>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self.status.as_str(), "healthy" | "ok" | "online")
    }
}

/// Receives upload progress as a percentage of bytes handed to the transport.
pub trait ProgressSink: Send + Sync {
    fn progress(&self, percent: u8);
}

impl<F> ProgressSink for F
where
    F: Fn(u8) + Send + Sync,
{
    fn progress(&self, percent: u8) {
        self(percent)
    }
}

#[async_trait::async_trait]
pub trait Backend: Send + Sync {
    async fn ask(&self, request: &AskRequest) -> Result<AskResponse, TransportError>;

    async fn upload(
        &self,
        file: &UploadFile,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<UploadReceipt, TransportError>;

    async fn list_documents(&self) -> Result<Vec<RemoteDocument>, TransportError>;

    async fn health(&self) -> Result<HealthStatus, TransportError>;
}

#[derive(Debug, Clone)]
pub struct TransportSettings {
    pub base_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub upload_timeout: Duration,
    pub api_token: Option<String>,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
            upload_timeout: Duration::from_secs(300),
            api_token: None,
        }
    }
}

#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    settings: TransportSettings,
}

impl HttpBackend {
    pub fn new(settings: TransportSettings) -> Result<Self, TransportError> {
        reqwest::Url::parse(&settings.base_url)
            .map_err(|e| TransportError::InvalidUrl(format!("{}: {}", settings.base_url, e)))?;

        let client = Client::builder()
            .connect_timeout(settings.connect_timeout)
            .build()
            .map_err(TransportError::from_reqwest)?;

        Ok(Self { client, settings })
    }

    pub fn base_url(&self) -> &str {
        &self.settings.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.settings.base_url.trim_end_matches('/'), path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.settings.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, TransportError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(TransportError::from_reqwest)?;
        ensure_success(response).await
    }
}

#[async_trait::async_trait]
impl Backend for HttpBackend {
    async fn ask(&self, request: &AskRequest) -> Result<AskResponse, TransportError> {
        tracing::debug!(document_id = ?request.document_id, "asking backend");
        let response = self
            .send(
                self.client
                    .post(self.url("/ask"))
                    .timeout(self.settings.request_timeout)
                    .json(request),
            )
            .await?;
        decode(response).await
    }

    async fn upload(
        &self,
        file: &UploadFile,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<UploadReceipt, TransportError> {
        let total = file.size_bytes();
        tracing::info!(filename = %file.filename, bytes = total, "uploading document");

        let body = reqwest::Body::wrap_stream(progress_stream(file.bytes.clone(), progress));
        let mut part = multipart::Part::stream_with_length(body, total).file_name(file.filename.clone());
        if let Some(media_type) = file.media_type.as_deref() {
            part = part
                .mime_str(media_type)
                .map_err(|e| TransportError::Malformed(format!("invalid media type {}: {}", media_type, e)))?;
        }
        let form = multipart::Form::new().part("file", part);

        let response = self
            .send(
                self.client
                    .post(self.url("/upload"))
                    .timeout(self.settings.upload_timeout)
                    .multipart(form),
            )
            .await?;
        let receipt: UploadReceipt = decode(response).await?;

        if !receipt.success {
            return Err(TransportError::Rejected(
                receipt
                    .message
                    .unwrap_or_else(|| format!("{} was not accepted", file.filename)),
            ));
        }
        Ok(receipt)
    }

    async fn list_documents(&self) -> Result<Vec<RemoteDocument>, TransportError> {
        let response = self
            .send(
                self.client
                    .get(self.url("/documents"))
                    .timeout(self.settings.request_timeout),
            )
            .await?;
        let listing: DocumentListing = decode(response).await?;
        Ok(listing.documents)
    }

    async fn health(&self) -> Result<HealthStatus, TransportError> {
        let response = self
            .send(
                self.client
                    .get(self.url("/health"))
                    .timeout(self.settings.request_timeout),
            )
            .await?;
        decode(response).await
    }
}

/// Splits the payload into chunks and reports a percentage as each one is
/// pulled by the HTTP body.
fn progress_stream(
    payload: Bytes,
    sink: Arc<dyn ProgressSink>,
) -> impl futures_util::Stream<Item = Result<Bytes, std::io::Error>> + Send + Sync + 'static {
    let total = payload.len() as u64;
    let chunks: Vec<Bytes> = (0..payload.len())
        .step_by(UPLOAD_CHUNK_BYTES)
        .map(|start| payload.slice(start..(start + UPLOAD_CHUNK_BYTES).min(payload.len())))
        .collect();

    let mut sent: u64 = 0;
    futures_util::stream::iter(chunks.into_iter().map(move |chunk| {
        sent += chunk.len() as u64;
        sink.progress(percent_of(sent, total));
        Ok(chunk)
    }))
}

pub(crate) fn percent_of(done: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    ((done.min(total) * 100) / total) as u8
}

async fn ensure_success(response: Response) -> Result<Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let detail = error_detail(&body);
    tracing::warn!(status = status.as_u16(), detail = ?detail, "backend returned an error status");
    Err(TransportError::Status {
        status: status.as_u16(),
        detail,
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, TransportError> {
    let bytes = response.bytes().await.map_err(TransportError::from_reqwest)?;
    serde_json::from_slice(&bytes).map_err(|e| TransportError::Malformed(e.to_string()))
}

/// Pulls a readable message out of an error body. FastAPI puts it in
/// `detail`, the upload route in `message`.
fn error_detail(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    let value: serde_json::Value = match serde_json::from_str(trimmed) {
        Ok(value) => value,
        Err(_) => return Some(trimmed.chars().take(200).collect()),
    };
    ["message", "detail", "error"]
        .iter()
        .find_map(|key| match value.get(*key)? {
            serde_json::Value::String(s) if s.is_empty() => None,
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ask_request_omits_missing_document() {
        let request = AskRequest {
            question: "What is the refund policy?".to_string(),
            document_id: None,
        };
        assert_eq!(
            serde_json::to_string(&request).unwrap(),
            r#"{"question":"What is the refund policy?"}"#
        );
    }

    #[test]
    fn test_error_detail_prefers_message_then_detail() {
        assert_eq!(
            error_detail(r#"{"message": "Only PDF files are allowed", "success": false}"#).as_deref(),
            Some("Only PDF files are allowed")
        );
        assert_eq!(
            error_detail(r#"{"detail": "Error processing your question: quota"}"#).as_deref(),
            Some("Error processing your question: quota")
        );
        assert_eq!(error_detail("   "), None);
        assert_eq!(error_detail("Bad Gateway").as_deref(), Some("Bad Gateway"));
    }

    #[test]
    fn test_error_detail_serializes_structured_detail() {
        let detail = error_detail(r#"{"detail": [{"loc": ["body", "question"], "msg": "field required"}]}"#).unwrap();
        assert!(detail.contains("field required"));
    }

    #[test]
    fn test_percent_of() {
        assert_eq!(percent_of(0, 200), 0);
        assert_eq!(percent_of(100, 200), 50);
        assert_eq!(percent_of(250, 200), 100);
        assert_eq!(percent_of(0, 0), 100);
    }

    #[test]
    fn test_upload_receipt_defaults_to_success() {
        let receipt: UploadReceipt = serde_json::from_str("{}").unwrap();
        assert!(receipt.success);
        assert_eq!(receipt.message, None);
    }

    #[test]
    fn test_health_status() {
        assert!(HealthStatus { status: "healthy".into() }.is_healthy());
        assert!(!HealthStatus { status: "degraded".into() }.is_healthy());
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let settings = TransportSettings {
            base_url: "not a url".to_string(),
            ..TransportSettings::default()
        };
        assert!(matches!(HttpBackend::new(settings), Err(TransportError::InvalidUrl(_))));
    }
}
