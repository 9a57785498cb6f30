//! Request logic for the file pages, independent of the HTTP layer
//!
//! Every operation resolves to an explicit outcome value. The axum handlers
//! only render these values, so the behaviour here can be exercised without
//! a server.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use super::store::BlobStore;
use crate::error::StoreError;

pub const INDEX_PATH: &str = "/";
pub const FILES_PATH: &str = "/files";

pub const MISSING_FIELDS_MESSAGE: &str = "Both filename and content are required.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashLevel {
    Success,
    Error,
}

impl FlashLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlashLevel::Success => "success",
            FlashLevel::Error => "error",
        }
    }
}

/// One-shot message shown on the page a redirect lands on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flash {
    pub level: FlashLevel,
    pub message: String,
}

impl Flash {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: FlashLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: FlashLevel::Error,
            message: message.into(),
        }
    }
}

/// What a page request resolved to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    Redirect { to: &'static str, flash: Flash },
    Files(Vec<String>),
    File { name: String, content: String },
}

impl PageOutcome {
    fn redirect(to: &'static str, flash: Flash) -> Self {
        PageOutcome::Redirect { to, flash }
    }
}

/// Result of a storage probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthStatus {
    pub timestamp: DateTime<Utc>,
    /// `None` when storage answered
    pub error: Option<String>,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.error.is_none()
    }
}

/// Upload, listing and viewing of stored files
pub struct FileService {
    store: Arc<dyn BlobStore>,
}

impl FileService {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }

    /// Store `file_content` under `filename`, replacing any previous content.
    /// Always redirects to the index page.
    pub async fn upload(&self, filename: Option<&str>, file_content: Option<&str>) -> PageOutcome {
        let (filename, file_content) = match (filename, file_content) {
            (Some(name), Some(content)) if !name.is_empty() && !content.is_empty() => {
                (name, content)
            }
            _ => {
                return PageOutcome::redirect(INDEX_PATH, Flash::error(MISSING_FIELDS_MESSAGE));
            }
        };

        match self.store_file(filename, file_content).await {
            Ok(()) => {
                info!(
                    "Uploaded {} ({} bytes) to container {}",
                    filename,
                    file_content.len(),
                    self.store.container_name()
                );
                PageOutcome::redirect(
                    INDEX_PATH,
                    Flash::success(format!("File {} uploaded successfully!", filename)),
                )
            }
            Err(e) => {
                error!("Failed to upload {}: {}", filename, e);
                PageOutcome::redirect(
                    INDEX_PATH,
                    Flash::error(format!("Error uploading file: {}", e)),
                )
            }
        }
    }

    async fn store_file(&self, filename: &str, file_content: &str) -> Result<(), StoreError> {
        self.store.ensure_container().await?;
        self.store
            .put(filename, Bytes::copy_from_slice(file_content.as_bytes()))
            .await
    }

    /// Names of every stored file. Failures go back to the index page.
    pub async fn list_files(&self) -> PageOutcome {
        match self.store.list().await {
            Ok(names) => PageOutcome::Files(names),
            Err(e) => {
                error!("Failed to list files: {}", e);
                PageOutcome::redirect(INDEX_PATH, Flash::error(format!("Error listing files: {}", e)))
            }
        }
    }

    /// Content of one file as text. Failures go back to the listing.
    pub async fn view_file(&self, filename: &str) -> PageOutcome {
        let content = match self.store.get(filename).await {
            Ok(bytes) => String::from_utf8(bytes.to_vec())
                .map_err(|e| format!("{} is not valid UTF-8 text: {}", filename, e)),
            Err(e) => {
                if e.is_not_found() {
                    warn!("Requested file {} does not exist", filename);
                } else {
                    error!("Failed to read {}: {}", filename, e);
                }
                Err(e.to_string())
            }
        };

        match content {
            Ok(content) => PageOutcome::File {
                name: filename.to_string(),
                content,
            },
            Err(cause) => PageOutcome::redirect(
                FILES_PATH,
                Flash::error(format!("Error viewing file: {}", cause)),
            ),
        }
    }

    /// Probe storage by reading the container properties
    pub async fn health(&self) -> HealthStatus {
        let error = match self.store.describe().await {
            Ok(_) => None,
            Err(e) => {
                warn!("Storage health check failed: {}", e);
                Some(e.to_string())
            }
        };

        HealthStatus {
            timestamp: Utc::now(),
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{MemoryBlobStore, Operation};

    fn service() -> (Arc<MemoryBlobStore>, FileService) {
        let store = Arc::new(MemoryBlobStore::new("files"));
        let service = FileService::new(store.clone());
        (store, service)
    }

    #[tokio::test]
    async fn test_upload_then_view_round_trip() {
        let (_, service) = service();

        let outcome = service.upload(Some("notes.txt"), Some("hello")).await;
        assert_eq!(
            outcome,
            PageOutcome::Redirect {
                to: "/",
                flash: Flash::success("File notes.txt uploaded successfully!"),
            }
        );

        assert_eq!(
            service.view_file("notes.txt").await,
            PageOutcome::File {
                name: "notes.txt".to_string(),
                content: "hello".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_upload_creates_container_lazily() {
        let (store, service) = service();
        assert!(!store.container_exists());

        service.upload(Some("a.txt"), Some("a")).await;
        assert!(store.container_exists());
    }

    #[tokio::test]
    async fn test_upload_missing_fields_never_touches_store() {
        let (store, service) = service();

        for (name, content) in [
            (None, Some("hello")),
            (Some("notes.txt"), None),
            (Some(""), Some("hello")),
            (Some("notes.txt"), Some("")),
            (None, None),
        ] {
            let outcome = service.upload(name, content).await;
            assert_eq!(
                outcome,
                PageOutcome::Redirect {
                    to: "/",
                    flash: Flash::error(MISSING_FIELDS_MESSAGE),
                }
            );
        }

        assert_eq!(store.calls(Operation::EnsureContainer), 0);
        assert_eq!(store.calls(Operation::Put), 0);
    }

    #[tokio::test]
    async fn test_upload_failure_reports_cause() {
        let (store, service) = service();
        store.fail(Operation::Put);

        let outcome = service.upload(Some("a.txt"), Some("a")).await;
        match outcome {
            PageOutcome::Redirect { to, flash } => {
                assert_eq!(to, "/");
                assert_eq!(flash.level, FlashLevel::Error);
                assert!(flash.message.starts_with("Error uploading file: "));
                assert!(flash.message.contains("Put is failing"));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        // no retry
        assert_eq!(store.calls(Operation::Put), 1);
    }

    #[tokio::test]
    async fn test_reupload_overwrites() {
        let (_, service) = service();
        service.upload(Some("a.txt"), Some("first")).await;
        service.upload(Some("a.txt"), Some("second")).await;

        assert_eq!(
            service.view_file("a.txt").await,
            PageOutcome::File {
                name: "a.txt".to_string(),
                content: "second".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_list_files_returns_uploaded_names() {
        let (_, service) = service();
        service.upload(Some("b.txt"), Some("b")).await;
        service.upload(Some("a.txt"), Some("a")).await;

        match service.list_files().await {
            PageOutcome::Files(mut names) => {
                names.sort();
                assert_eq!(names, vec!["a.txt", "b.txt"]);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_list_failure_redirects_to_index() {
        let (store, service) = service();
        store.fail(Operation::List);

        match service.list_files().await {
            PageOutcome::Redirect { to, flash } => {
                assert_eq!(to, INDEX_PATH);
                assert!(flash.message.starts_with("Error listing files: "));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_view_unknown_file_redirects_to_listing() {
        let (_, service) = service();

        assert_eq!(
            service.view_file("ghost.txt").await,
            PageOutcome::Redirect {
                to: FILES_PATH,
                flash: Flash::error("Error viewing file: Blob not found: ghost.txt"),
            }
        );
    }

    #[tokio::test]
    async fn test_view_binary_content_is_an_error() {
        let (store, service) = service();
        store.ensure_container().await.unwrap();
        store
            .put("blob.bin", Bytes::from_static(&[0xff, 0xfe, 0x00]))
            .await
            .unwrap();

        match service.view_file("blob.bin").await {
            PageOutcome::Redirect { to, flash } => {
                assert_eq!(to, FILES_PATH);
                assert!(flash.message.contains("not valid UTF-8"));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_health_tracks_describe() {
        let (store, service) = service();
        store.ensure_container().await.unwrap();

        let healthy = service.health().await;
        assert!(healthy.is_healthy());

        store.fail(Operation::Describe);
        let unhealthy = service.health().await;
        assert!(!unhealthy.is_healthy());
        assert!(unhealthy.error.unwrap().contains("Describe is failing"));
    }
}
