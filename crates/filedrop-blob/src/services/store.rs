//! Blob store contract shared by every backend

use async_stream::try_stream;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use futures::TryStreamExt;

use crate::error::StoreError;

/// Container properties reported by the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerMetadata {
    pub name: String,
    pub etag: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
}

/// One page of a blob listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlobPage {
    pub names: Vec<String>,
    /// Continuation marker, `None` on the last page
    pub next_marker: Option<String>,
}

/// Named-blob storage scoped to a single container.
///
/// Handles are shared between concurrent requests, so implementations keep
/// no request-scoped mutable state.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Name of the container every operation targets
    fn container_name(&self) -> &str;

    /// Create the container when it does not exist yet. Idempotent.
    async fn ensure_container(&self) -> Result<(), StoreError>;

    /// Upload `content` under `name`, replacing any existing blob.
    /// The container must already exist.
    async fn put(&self, name: &str, content: Bytes) -> Result<(), StoreError>;

    /// Fetch a single page of blob names starting at `marker`
    async fn list_page(&self, marker: Option<String>) -> Result<BlobPage, StoreError>;

    /// Download a blob. Missing blobs yield [`StoreError::NotFound`].
    async fn get(&self, name: &str) -> Result<Bytes, StoreError>;

    /// Container properties, used for health probing
    async fn describe(&self) -> Result<ContainerMetadata, StoreError>;

    /// Lazily walk every blob name, fetching pages on demand.
    ///
    /// Each call starts over from the first page. Ordering is whatever the
    /// backend returns.
    fn names(&self) -> BoxStream<'_, Result<String, StoreError>> {
        Box::pin(try_stream! {
            let mut marker = None;
            loop {
                let page = self.list_page(marker.take()).await?;
                for name in page.names {
                    yield name;
                }
                match page.next_marker {
                    Some(next) if !next.is_empty() => marker = Some(next),
                    _ => break,
                }
            }
        })
    }

    /// Collect every blob name
    async fn list(&self) -> Result<Vec<String>, StoreError> {
        self.names().try_collect().await
    }
}
