//! Azure Blob Storage backend
//!
//! Talks to the Blob service REST API directly. Requests carry a bearer
//! token from [`TokenProvider`] and are bounded by the client timeout.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::header::{CONTENT_TYPE, ETAG, LAST_MODIFIED};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::credentials::{AzureCredential, TokenProvider};
use super::store::{BlobPage, BlobStore, ContainerMetadata};
use crate::error::StoreError;

const AZURE_STORAGE_API_VERSION: &str = "2023-11-03";
const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// List Blobs response
#[derive(Debug, Deserialize)]
struct EnumerationResults {
    #[serde(rename = "Blobs", default)]
    blobs: Option<BlobsWrapper>,
    #[serde(rename = "NextMarker", default)]
    next_marker: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BlobsWrapper {
    #[serde(rename = "Blob", default)]
    blob: Vec<BlobItem>,
}

#[derive(Debug, Deserialize)]
struct BlobItem {
    #[serde(rename = "Name")]
    name: String,
}

/// Error body returned by the Blob service
#[derive(Debug, Deserialize)]
struct StorageErrorBody {
    #[serde(rename = "Code")]
    code: Option<String>,
    #[serde(rename = "Message")]
    message: Option<String>,
}

/// Blob store backed by a single Azure Storage container
pub struct AzureBlobStore {
    client: Client,
    tokens: TokenProvider,
    endpoint: String,
    container_name: String,
    timeout_secs: u64,
}

impl AzureBlobStore {
    /// Build the adapter. Fails when the HTTP client cannot be created.
    pub fn new(
        endpoint: &str,
        container_name: &str,
        credential: AzureCredential,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Request(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            "Azure blob store configured for {}/{} (timeout {}s)",
            endpoint,
            container_name,
            timeout.as_secs()
        );

        Ok(Self {
            client,
            tokens: TokenProvider::new(credential, timeout)?,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            container_name: container_name.to_string(),
            timeout_secs: timeout.as_secs(),
        })
    }

    fn container_url(&self) -> String {
        format!("{}/{}", self.endpoint, self.container_name)
    }

    fn blob_url(&self, name: &str) -> String {
        format!("{}/{}", self.container_url(), encode_blob_name(name))
    }

    /// Start an authenticated request with the standard storage headers
    async fn request(&self, method: Method, url: &str) -> Result<RequestBuilder, StoreError> {
        let token = self.tokens.token().await?;

        debug!("Azure storage request: {} {}", method, url);

        Ok(self
            .client
            .request(method, url)
            .bearer_auth(token)
            .header("x-ms-version", AZURE_STORAGE_API_VERSION)
            .header(
                "x-ms-date",
                Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
            ))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, StoreError> {
        let response = request
            .send()
            .await
            .map_err(|e| StoreError::from_reqwest(e, self.timeout_secs))?;

        if response.status().is_success() {
            Ok(response)
        } else {
            Err(backend_error(response).await)
        }
    }

    async fn create_container(&self) -> Result<(), StoreError> {
        let request = self
            .request(Method::PUT, &self.container_url())
            .await?
            .query(&[("restype", "container")])
            .body(Bytes::new());

        match self.send(request).await {
            Ok(_) => {
                info!("Created container {}", self.container_name);
                Ok(())
            }
            // lost a creation race; the container is there either way
            Err(StoreError::Backend { status: 409, ref code, .. })
                if code == "ContainerAlreadyExists" =>
            {
                debug!("Container {} already exists", self.container_name);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl BlobStore for AzureBlobStore {
    fn container_name(&self) -> &str {
        &self.container_name
    }

    async fn ensure_container(&self) -> Result<(), StoreError> {
        match self.describe().await {
            Ok(_) => Ok(()),
            Err(StoreError::Backend { status: 404, .. }) => self.create_container().await,
            Err(e) => Err(e),
        }
    }

    async fn put(&self, name: &str, content: Bytes) -> Result<(), StoreError> {
        debug!("PUT {} ({} bytes)", name, content.len());

        let request = self
            .request(Method::PUT, &self.blob_url(name))
            .await?
            .header("x-ms-blob-type", "BlockBlob")
            .header(CONTENT_TYPE, TEXT_CONTENT_TYPE)
            .body(content);

        self.send(request).await?;
        Ok(())
    }

    async fn list_page(&self, marker: Option<String>) -> Result<BlobPage, StoreError> {
        let mut query = vec![("restype", "container"), ("comp", "list")];
        if let Some(ref m) = marker {
            query.push(("marker", m.as_str()));
        }

        let request = self
            .request(Method::GET, &self.container_url())
            .await?
            .query(&query);

        let body = self
            .send(request)
            .await?
            .text()
            .await
            .map_err(|e| StoreError::from_reqwest(e, self.timeout_secs))?;

        parse_list_page(&body)
    }

    async fn get(&self, name: &str) -> Result<Bytes, StoreError> {
        debug!("GET {}", name);

        let request = self.request(Method::GET, &self.blob_url(name)).await?;

        let response = match self.send(request).await {
            Ok(response) => response,
            Err(StoreError::Backend { status: 404, .. }) => {
                return Err(StoreError::NotFound(name.to_string()))
            }
            Err(e) => return Err(e),
        };

        response
            .bytes()
            .await
            .map_err(|e| StoreError::from_reqwest(e, self.timeout_secs))
    }

    async fn describe(&self) -> Result<ContainerMetadata, StoreError> {
        let request = self
            .request(Method::GET, &self.container_url())
            .await?
            .query(&[("restype", "container")]);

        let response = self.send(request).await?;
        let headers = response.headers();

        let etag = headers
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let last_modified = headers
            .get(LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| DateTime::parse_from_rfc2822(s).ok())
            .map(|d| d.with_timezone(&Utc));

        Ok(ContainerMetadata {
            name: self.container_name.clone(),
            etag,
            last_modified,
        })
    }
}

/// Percent-encode a blob name, keeping `/` as the virtual directory separator
fn encode_blob_name(name: &str) -> String {
    urlencoding::encode(name).replace("%2F", "/")
}

fn parse_list_page(body: &str) -> Result<BlobPage, StoreError> {
    let parsed: EnumerationResults = quick_xml::de::from_str(body.trim_start_matches('\u{feff}'))
        .map_err(|e| StoreError::InvalidResponse(format!("Failed to parse blob listing: {}", e)))?;

    Ok(BlobPage {
        names: parsed
            .blobs
            .map(|w| w.blob.into_iter().map(|b| b.name).collect())
            .unwrap_or_default(),
        next_marker: parsed.next_marker.filter(|m| !m.is_empty()),
    })
}

/// Turn a non-success response into [`StoreError::Backend`]
async fn backend_error(response: Response) -> StoreError {
    let status = response.status();
    let header_code = response
        .headers()
        .get("x-ms-error-code")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    let body = response.text().await.unwrap_or_default();
    let parsed: Option<StorageErrorBody> =
        quick_xml::de::from_str(body.trim_start_matches('\u{feff}')).ok();

    let code = header_code
        .or_else(|| parsed.as_ref().and_then(|p| p.code.clone()))
        .unwrap_or_else(|| status_code_name(status));

    let message = parsed
        .and_then(|p| p.message)
        .map(|m| m.lines().next().unwrap_or_default().to_string())
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown").to_string());

    if status.is_server_error() {
        warn!("Azure storage returned {} ({}): {}", status, code, message);
    }

    StoreError::Backend {
        status: status.as_u16(),
        code,
        message,
    }
}

fn status_code_name(status: StatusCode) -> String {
    status
        .canonical_reason()
        .map(|r| r.replace(' ', ""))
        .unwrap_or_else(|| status.as_u16().to_string())
}
