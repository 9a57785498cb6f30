//! Request and response types for the file handlers

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{FromRequest, Multipart, Request};
use axum::http::header::CONTENT_TYPE;
use axum::Form;
use chrono::{DateTime, Utc};
use filedrop_config::AppConfig;
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;

use crate::services::{FileService, HealthStatus};

/// Application state for file handlers
pub struct FileDropAppState {
    pub file_service: Arc<FileService>,
    pub config: Arc<AppConfig>,
}

/// Fields posted by the upload form. Both are optional so that missing
/// fields reach the validation step instead of being rejected by the extractor.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadForm {
    pub filename: Option<String>,
    pub file_content: Option<String>,
}

/// Reads urlencoded or multipart bodies. An unreadable body yields an empty
/// form, which the upload validation then reports.
impl<S> FromRequest<S> for UploadForm
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("multipart/form-data"));

        if is_multipart {
            return Ok(match Multipart::from_request(req, state).await {
                Ok(multipart) => read_multipart(multipart).await,
                Err(e) => {
                    debug!("Unreadable multipart upload: {}", e);
                    UploadForm::default()
                }
            });
        }

        match Form::<UploadForm>::from_request(req, state).await {
            Ok(Form(form)) => Ok(form),
            Err(e) => {
                debug!("Unreadable upload form: {}", e);
                Ok(UploadForm::default())
            }
        }
    }
}

async fn read_multipart(mut multipart: Multipart) -> UploadForm {
    let mut form = UploadForm::default();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                debug!("Stopped reading multipart upload: {}", e);
                break;
            }
        };

        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "filename" => form.filename = field.text().await.ok(),
            "file_content" => form.file_content = field.text().await.ok(),
            _ => {}
        }
    }

    form
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ServiceState {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServicesStatus {
    pub storage: ServiceState,
    pub application: ServiceState,
}

/// Health probe payload
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = "healthy")]
    pub status: ServiceState,
    #[schema(example = "2025-01-03T12:00:00Z")]
    pub timestamp: DateTime<Utc>,
    /// Storage failure, present only when unhealthy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub services: ServicesStatus,
}

impl From<HealthStatus> for HealthResponse {
    fn from(status: HealthStatus) -> Self {
        let storage = if status.is_healthy() {
            ServiceState::Healthy
        } else {
            ServiceState::Unhealthy
        };

        Self {
            status: storage,
            timestamp: status.timestamp,
            error: status.error,
            services: ServicesStatus {
                storage,
                application: ServiceState::Healthy,
            },
        }
    }
}

/// Deployment metadata
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InfoResponse {
    #[schema(example = "Azure Multi-Region File App")]
    pub application: String,
    #[schema(example = "1.0.0")]
    pub version: String,
    #[schema(example = "eastus2")]
    pub region: String,
    #[schema(example = "prod")]
    pub environment: String,
    pub hostname: String,
    #[schema(example = "https://acct.blob.core.windows.net")]
    pub storage_endpoint: Option<String>,
    #[schema(example = "files")]
    pub container_name: String,
}

impl From<&AppConfig> for InfoResponse {
    fn from(config: &AppConfig) -> Self {
        Self {
            application: config.application_name.clone(),
            version: config.version.clone(),
            region: config.region.clone(),
            environment: config.environment.clone(),
            hostname: config.hostname.clone(),
            storage_endpoint: config.configured_endpoint.clone(),
            container_name: config.container_name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unhealthy_payload_shape() {
        let response = HealthResponse::from(HealthStatus {
            timestamp: Utc::now(),
            error: Some("connection refused".to_string()),
        });

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "unhealthy");
        assert_eq!(json["error"], "connection refused");
        assert_eq!(json["services"]["storage"], "unhealthy");
        assert_eq!(json["services"]["application"], "healthy");
    }

    #[test]
    fn test_healthy_payload_has_no_error() {
        let response = HealthResponse::from(HealthStatus {
            timestamp: Utc::now(),
            error: None,
        });

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "healthy");
        assert!(json.get("error").is_none());
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn test_info_echoes_configured_endpoint() {
        let config = AppConfig::try_from(filedrop_config::AppInputConfig {
            blob_endpoint: Some("https://acct.blob.core.windows.net/".to_string()),
            region: Some("eastus2".to_string()),
            ..Default::default()
        })
        .unwrap();

        let info = InfoResponse::from(&config);
        assert_eq!(
            info.storage_endpoint.as_deref(),
            Some("https://acct.blob.core.windows.net/")
        );
        assert_eq!(info.region, "eastus2");
        assert_eq!(info.container_name, "files");
    }
}
