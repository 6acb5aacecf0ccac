//! Client-side cache of the backend's document list.

use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::TransportError;
use crate::transport::{Backend, RemoteDocument};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentDescriptor {
    /// Server-provided id when the backend sends one, otherwise the filename.
    pub id: String,
    pub name: String,
    pub extension: String,
    pub size_bytes: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

impl DocumentDescriptor {
    pub fn from_remote(remote: RemoteDocument) -> Self {
        let extension = Path::new(&remote.name)
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let last_modified = remote.last_modified.as_deref().and_then(parse_timestamp);
        let id = remote
            .id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| remote.name.clone());

        Self {
            id,
            name: remote.name,
            extension,
            size_bytes: remote.size,
            last_modified,
        }
    }

    pub fn display_size(&self) -> String {
        format_size(self.size_bytes)
    }

    pub fn display_age(&self, now: DateTime<Utc>) -> String {
        match self.last_modified {
            Some(at) => format_age(at, now),
            None => "unknown".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryStatus {
    /// No refresh has completed yet.
    Unloaded,
    Ready,
    /// The last refresh failed. The list is empty until a refresh succeeds.
    Failed(String),
}

#[derive(Debug)]
pub struct DocumentDirectory {
    documents: Vec<DocumentDescriptor>,
    status: DirectoryStatus,
    refreshed_at: Option<DateTime<Utc>>,
}

impl Default for DocumentDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentDirectory {
    pub fn new() -> Self {
        Self {
            documents: Vec::new(),
            status: DirectoryStatus::Unloaded,
            refreshed_at: None,
        }
    }

    pub fn documents(&self) -> &[DocumentDescriptor] {
        &self.documents
    }

    pub fn status(&self) -> &DirectoryStatus {
        &self.status
    }

    pub fn failure(&self) -> Option<&str> {
        match &self.status {
            DirectoryStatus::Failed(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.refreshed_at
    }

    pub fn get(&self, id: &str) -> Option<&DocumentDescriptor> {
        self.documents.iter().find(|doc| doc.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Fetch the list from the backend and replace the cache wholesale.
    pub async fn refresh(&mut self, backend: &dyn Backend) -> Result<usize, TransportError> {
        let outcome = backend.list_documents().await;
        self.apply(outcome)
    }

    /// Replace the cache with a listing outcome. A failure empties the list
    /// and is kept as a recoverable status rather than swallowed.
    pub fn apply(&mut self, outcome: Result<Vec<RemoteDocument>, TransportError>) -> Result<usize, TransportError> {
        match outcome {
            Ok(remote) => {
                self.documents = remote.into_iter().map(DocumentDescriptor::from_remote).collect();
                self.status = DirectoryStatus::Ready;
                self.refreshed_at = Some(Utc::now());
                tracing::debug!(count = self.documents.len(), "document directory refreshed");
                Ok(self.documents.len())
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to fetch document list");
                self.documents.clear();
                self.status = DirectoryStatus::Failed(err.to_string());
                Err(err)
            }
        }
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }
    // Python's isoformat() omits the offset for naive datetimes.
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Human-readable size, 1024-based, one decimal above bytes.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

/// Relative age such as "5 minutes ago"; falls back to a date after a week.
pub fn format_age(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(at);
    let seconds = elapsed.num_seconds();
    if seconds < 60 {
        return "just now".to_string();
    }
    let (count, unit) = if elapsed.num_minutes() < 60 {
        (elapsed.num_minutes(), "minute")
    } else if elapsed.num_hours() < 24 {
        (elapsed.num_hours(), "hour")
    } else if elapsed.num_days() < 7 {
        (elapsed.num_days(), "day")
    } else {
        return at.format("%Y-%m-%d").to_string();
    };
    if count == 1 {
        format!("1 {} ago", unit)
    } else {
        format!("{} {}s ago", count, unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn remote(name: &str, size: u64) -> RemoteDocument {
        RemoteDocument {
            id: None,
            name: name.to_string(),
            size,
            last_modified: Some("2024-03-01T12:00:00Z".to_string()),
        }
    }

    #[test]
    fn test_descriptor_derives_id_and_extension_from_filename() {
        let doc = DocumentDescriptor::from_remote(remote("Policy.PDF", 2_516_582));
        assert_eq!(doc.id, "Policy.PDF");
        assert_eq!(doc.extension, "pdf");
        assert_eq!(doc.display_size(), "2.4 MB");
        assert_eq!(
            doc.last_modified,
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_descriptor_prefers_server_id() {
        let mut doc = remote("policy.pdf", 10);
        doc.id = Some("doc-7f3a".to_string());
        assert_eq!(DocumentDescriptor::from_remote(doc).id, "doc-7f3a");
    }

    #[test]
    fn test_naive_and_malformed_timestamps() {
        assert_eq!(
            parse_timestamp("2024-03-01T12:00:00.123456"),
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap() + Duration::microseconds(123456))
        );
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_apply_replaces_wholesale() {
        let mut directory = DocumentDirectory::new();
        assert_eq!(directory.status(), &DirectoryStatus::Unloaded);

        directory.apply(Ok(vec![remote("a.pdf", 1), remote("b.txt", 2)])).unwrap();
        assert_eq!(directory.len(), 2);

        directory.apply(Ok(vec![remote("c.pdf", 3)])).unwrap();
        assert_eq!(directory.len(), 1);
        assert!(directory.contains("c.pdf"));
        assert!(!directory.contains("a.pdf"));
        assert_eq!(directory.status(), &DirectoryStatus::Ready);
        assert!(directory.refreshed_at().is_some());
    }

    #[test]
    fn test_failure_empties_list_and_is_recoverable() {
        let mut directory = DocumentDirectory::new();
        directory.apply(Ok(vec![remote("a.pdf", 1)])).unwrap();

        let err = directory.apply(Err(TransportError::Timeout)).unwrap_err();
        assert_eq!(err, TransportError::Timeout);
        assert!(directory.is_empty());
        assert_eq!(directory.failure(), Some("the backend did not respond in time"));

        directory.apply(Ok(vec![remote("a.pdf", 1)])).unwrap();
        assert_eq!(directory.failure(), None);
        assert_eq!(directory.len(), 1);
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(5 * 1024 * 1024 * 1024), "5.0 GB");
    }

    #[test]
    fn test_format_age() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
        assert_eq!(format_age(now - Duration::seconds(30), now), "just now");
        assert_eq!(format_age(now - Duration::minutes(1), now), "1 minute ago");
        assert_eq!(format_age(now - Duration::minutes(45), now), "45 minutes ago");
        assert_eq!(format_age(now - Duration::hours(3), now), "3 hours ago");
        assert_eq!(format_age(now - Duration::days(2), now), "2 days ago");
        assert_eq!(format_age(now - Duration::days(30), now), "2024-02-09");
    }
}
