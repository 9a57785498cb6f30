//! Startup configuration for the filedrop service

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde_derive::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Application name reported by `/info`
pub const APPLICATION_NAME: &str = "Azure Multi-Region File App";
/// Container used when none is configured
pub const DEFAULT_CONTAINER_NAME: &str = "files";
/// Placeholder for informational labels that were not provided
pub const UNKNOWN_LABEL: &str = "unknown";
/// Per-call timeout applied to every storage request
pub const DEFAULT_STORAGE_TIMEOUT_SECS: u64 = 30;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("AZURE_STORAGE_BLOB_ENDPOINT is required for the azure storage backend")]
    MissingBlobEndpoint,

    #[error("Invalid blob endpoint '{endpoint}': {details}")]
    InvalidBlobEndpoint { endpoint: String, details: String },

    #[error("Invalid container name '{name}': {details}")]
    InvalidContainerName { name: String, details: String },

    #[error("Unknown storage backend: {0}")]
    UnknownBackend(String),

    #[error("Storage timeout must be at least one second")]
    InvalidTimeout,
}

/// Where blobs are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Azure Blob Storage account
    #[default]
    Azure,
    /// Process-local store, contents vanish on restart
    Memory,
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageBackend::Azure => write!(f, "azure"),
            StorageBackend::Memory => write!(f, "memory"),
        }
    }
}

impl FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "azure" | "azblob" => Ok(StorageBackend::Azure),
            "memory" | "mem" => Ok(StorageBackend::Memory),
            other => Err(ConfigError::UnknownBackend(other.to_string())),
        }
    }
}

/// User-provided configuration (unset values fall back to defaults)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppInputConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<StorageBackend>,

    /// Base URL of the storage account, e.g. `https://acct.blob.core.windows.net`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blob_endpoint: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_timeout_secs: Option<u64>,
}

/// Resolved configuration, built once at startup and shared read-only afterwards
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub backend: StorageBackend,
    /// Normalized endpoint without a trailing slash; absent for the memory backend
    pub blob_endpoint: Option<String>,
    /// Endpoint as it was configured, reported back by `/info`
    pub configured_endpoint: Option<String>,
    pub container_name: String,
    pub region: String,
    pub environment: String,
    pub storage_timeout_secs: u64,
    pub application_name: String,
    pub version: String,
    pub hostname: String,
}

impl AppConfig {
    pub fn storage_timeout(&self) -> Duration {
        Duration::from_secs(self.storage_timeout_secs)
    }
}

impl TryFrom<AppInputConfig> for AppConfig {
    type Error = ConfigError;

    fn try_from(input: AppInputConfig) -> Result<Self, Self::Error> {
        let backend = input.backend.unwrap_or_default();

        let configured_endpoint = non_empty(input.blob_endpoint);
        let blob_endpoint = match configured_endpoint.as_deref() {
            Some(endpoint) => Some(normalize_endpoint(endpoint)?),
            None if backend == StorageBackend::Azure => {
                return Err(ConfigError::MissingBlobEndpoint)
            }
            None => None,
        };

        let container_name = non_empty(input.container_name)
            .unwrap_or_else(|| DEFAULT_CONTAINER_NAME.to_string());
        validate_container_name(&container_name)?;

        let storage_timeout_secs = input
            .storage_timeout_secs
            .unwrap_or(DEFAULT_STORAGE_TIMEOUT_SECS);
        if storage_timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout);
        }

        let config = AppConfig {
            backend,
            blob_endpoint,
            configured_endpoint,
            container_name,
            region: non_empty(input.region).unwrap_or_else(|| UNKNOWN_LABEL.to_string()),
            environment: non_empty(input.environment).unwrap_or_else(|| UNKNOWN_LABEL.to_string()),
            storage_timeout_secs,
            application_name: APPLICATION_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            hostname: gethostname::gethostname().to_string_lossy().into_owned(),
        };

        debug!(
            "Resolved configuration: backend={}, container={}, region={}, environment={}",
            config.backend, config.container_name, config.region, config.environment
        );

        Ok(config)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn normalize_endpoint(endpoint: &str) -> Result<String, ConfigError> {
    let url = Url::parse(endpoint).map_err(|e| ConfigError::InvalidBlobEndpoint {
        endpoint: endpoint.to_string(),
        details: e.to_string(),
    })?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::InvalidBlobEndpoint {
            endpoint: endpoint.to_string(),
            details: format!("unsupported scheme '{}'", url.scheme()),
        });
    }

    if url.query().is_some() {
        return Err(ConfigError::InvalidBlobEndpoint {
            endpoint: endpoint.to_string(),
            details: "query strings (SAS tokens) are not supported".to_string(),
        });
    }

    Ok(url.as_str().trim_end_matches('/').to_string())
}

/// Azure rules: 3-63 chars of lowercase letters, digits and single hyphens,
/// starting and ending with a letter or digit.
fn validate_container_name(name: &str) -> Result<(), ConfigError> {
    let invalid = |details: &str| ConfigError::InvalidContainerName {
        name: name.to_string(),
        details: details.to_string(),
    };

    if !(3..=63).contains(&name.len()) {
        return Err(invalid("must be between 3 and 63 characters long"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(invalid(
            "only lowercase letters, digits and hyphens are allowed",
        ));
    }
    if name.starts_with('-') || name.ends_with('-') {
        return Err(invalid("must start and end with a letter or digit"));
    }
    if name.contains("--") {
        return Err(invalid("consecutive hyphens are not allowed"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn azure_input() -> AppInputConfig {
        AppInputConfig {
            blob_endpoint: Some("https://acct.blob.core.windows.net/".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults_applied() {
        let config = AppConfig::try_from(azure_input()).unwrap();

        assert_eq!(config.backend, StorageBackend::Azure);
        assert_eq!(
            config.blob_endpoint.as_deref(),
            Some("https://acct.blob.core.windows.net")
        );
        assert_eq!(
            config.configured_endpoint.as_deref(),
            Some("https://acct.blob.core.windows.net/")
        );
        assert_eq!(config.container_name, "files");
        assert_eq!(config.region, "unknown");
        assert_eq!(config.environment, "unknown");
        assert_eq!(config.storage_timeout(), Duration::from_secs(30));
        assert_eq!(config.application_name, APPLICATION_NAME);
        assert!(!config.version.is_empty());
    }

    #[test]
    fn test_explicit_values_kept() {
        let input = AppInputConfig {
            container_name: Some("uploads-eu".to_string()),
            region: Some("westeurope".to_string()),
            environment: Some("prod".to_string()),
            storage_timeout_secs: Some(5),
            ..azure_input()
        };

        let config = AppConfig::try_from(input).unwrap();
        assert_eq!(config.container_name, "uploads-eu");
        assert_eq!(config.region, "westeurope");
        assert_eq!(config.environment, "prod");
        assert_eq!(config.storage_timeout_secs, 5);
    }

    #[test]
    fn test_blank_values_fall_back_to_defaults() {
        let input = AppInputConfig {
            container_name: Some("  ".to_string()),
            region: Some(String::new()),
            ..azure_input()
        };

        let config = AppConfig::try_from(input).unwrap();
        assert_eq!(config.container_name, DEFAULT_CONTAINER_NAME);
        assert_eq!(config.region, UNKNOWN_LABEL);
    }

    #[test]
    fn test_azure_requires_endpoint() {
        let err = AppConfig::try_from(AppInputConfig::default()).unwrap_err();
        assert_eq!(err, ConfigError::MissingBlobEndpoint);

        let blank = AppInputConfig {
            blob_endpoint: Some(" ".to_string()),
            ..Default::default()
        };
        assert_eq!(
            AppConfig::try_from(blank).unwrap_err(),
            ConfigError::MissingBlobEndpoint
        );
    }

    #[test]
    fn test_memory_backend_without_endpoint() {
        let input = AppInputConfig {
            backend: Some(StorageBackend::Memory),
            ..Default::default()
        };

        let config = AppConfig::try_from(input).unwrap();
        assert_eq!(config.backend, StorageBackend::Memory);
        assert!(config.blob_endpoint.is_none());
    }

    #[test]
    fn test_invalid_endpoints_rejected() {
        for endpoint in [
            "not a url",
            "ftp://acct.blob.core.windows.net",
            "https://acct.blob.core.windows.net/?sv=2022&sig=abc",
        ] {
            let input = AppInputConfig {
                blob_endpoint: Some(endpoint.to_string()),
                ..Default::default()
            };
            assert!(
                matches!(
                    AppConfig::try_from(input),
                    Err(ConfigError::InvalidBlobEndpoint { .. })
                ),
                "endpoint {} should be rejected",
                endpoint
            );
        }
    }

    #[test]
    fn test_container_name_rules() {
        for valid in ["files", "abc", "my-files-01"] {
            assert!(validate_container_name(valid).is_ok(), "{}", valid);
        }

        let too_long = "a".repeat(64);
        for invalid in ["ab", too_long.as_str(), "Files", "my_files", "-files", "files-", "my--files"] {
            assert!(validate_container_name(invalid).is_err(), "{}", invalid);
        }
    }

    #[test]
    fn test_storage_backend_parsing() {
        assert_eq!("azure".parse::<StorageBackend>().unwrap(), StorageBackend::Azure);
        assert_eq!(" Memory ".parse::<StorageBackend>().unwrap(), StorageBackend::Memory);
        assert_eq!(
            "s3".parse::<StorageBackend>().unwrap_err(),
            ConfigError::UnknownBackend("s3".to_string())
        );
        assert_eq!(StorageBackend::Memory.to_string(), "memory");
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let input = AppInputConfig {
            storage_timeout_secs: Some(0),
            ..azure_input()
        };
        assert_eq!(
            AppConfig::try_from(input).unwrap_err(),
            ConfigError::InvalidTimeout
        );
    }

    #[test]
    fn test_input_config_serialization_skips_unset() {
        let json = serde_json::to_string(&AppInputConfig::default()).unwrap();
        assert_eq!(json, "{}");
    }
}
