//! Azure credential resolution and access-token caching
//!
//! Credentials are resolved once from the environment, in order:
//! a static bearer token, a service principal (client secret), then an
//! App Service managed identity. Resolution fails immediately when none of
//! them is configured so a misconfigured deployment never starts serving.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::StoreError;

pub const AZURE_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";
const STORAGE_SCOPE: &str = "https://storage.azure.com/.default";
const STORAGE_RESOURCE: &str = "https://storage.azure.com/";
const MANAGED_IDENTITY_API_VERSION: &str = "2019-08-01";

/// Tokens are refreshed this long before they expire
const REFRESH_MARGIN_SECS: i64 = 300;

/// Where access tokens for the storage account come from
#[derive(Clone, PartialEq, Eq)]
pub enum AzureCredential {
    /// Pre-issued bearer token, never refreshed
    Static(String),
    /// Service principal using the OAuth2 client-credentials flow
    ClientSecret {
        authority_host: String,
        tenant_id: String,
        client_id: String,
        client_secret: String,
    },
    /// App Service / Functions managed identity endpoint
    ManagedIdentity {
        endpoint: String,
        header: String,
        client_id: Option<String>,
    },
}

impl std::fmt::Debug for AzureCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.kind())
    }
}

impl AzureCredential {
    /// Resolve a credential from the process environment
    pub fn from_env() -> Result<Self, StoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve a credential using `lookup` to read variables
    pub fn from_lookup<F>(lookup: F) -> Result<Self, StoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = var("AZURE_STORAGE_ACCESS_TOKEN") {
            return Ok(AzureCredential::Static(token));
        }

        if let (Some(tenant_id), Some(client_id), Some(client_secret)) = (
            var("AZURE_TENANT_ID"),
            var("AZURE_CLIENT_ID"),
            var("AZURE_CLIENT_SECRET"),
        ) {
            return Ok(AzureCredential::ClientSecret {
                authority_host: var("AZURE_AUTHORITY_HOST")
                    .map(|h| h.trim_end_matches('/').to_string())
                    .unwrap_or_else(|| AZURE_AUTHORITY_HOST.to_string()),
                tenant_id,
                client_id,
                client_secret,
            });
        }

        if let (Some(endpoint), Some(header)) = (var("IDENTITY_ENDPOINT"), var("IDENTITY_HEADER")) {
            return Ok(AzureCredential::ManagedIdentity {
                endpoint,
                header,
                client_id: var("AZURE_CLIENT_ID"),
            });
        }

        Err(StoreError::Credential(
            "no Azure credential found; set AZURE_TENANT_ID/AZURE_CLIENT_ID/AZURE_CLIENT_SECRET, \
             run with a managed identity (IDENTITY_ENDPOINT/IDENTITY_HEADER), \
             or provide AZURE_STORAGE_ACCESS_TOKEN"
                .to_string(),
        ))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AzureCredential::Static(_) => "static-token",
            AzureCredential::ClientSecret { .. } => "client-secret",
            AzureCredential::ManagedIdentity { .. } => "managed-identity",
        }
    }
}

/// Token response from Azure AD or the managed identity endpoint
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    /// Seconds until expiry (Azure AD v2)
    #[serde(default)]
    expires_in: Option<u64>,
    /// Unix timestamp of expiry, sent as a string (managed identity)
    #[serde(default)]
    expires_on: Option<String>,
}

impl TokenResponse {
    fn expires_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        if let Some(secs) = self.expires_in {
            return now + TimeDelta::seconds(secs as i64);
        }
        self.expires_on
            .as_deref()
            .and_then(|s| s.parse::<i64>().ok())
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
            // Unknown lifetime: treat as short-lived
            .unwrap_or(now + TimeDelta::seconds(REFRESH_MARGIN_SECS + 60))
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

/// Hands out bearer tokens, fetching a new one only when the cached token
/// is about to expire
pub struct TokenProvider {
    client: Client,
    credential: AzureCredential,
    timeout_secs: u64,
    cached: RwLock<Option<CachedToken>>,
}

impl TokenProvider {
    pub fn new(credential: AzureCredential, timeout: Duration) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Request(format!("Failed to create HTTP client: {}", e)))?;

        info!("Using Azure credential: {}", credential.kind());

        Ok(Self {
            client,
            credential,
            timeout_secs: timeout.as_secs(),
            cached: RwLock::new(None),
        })
    }

    /// Bearer token valid for at least the refresh margin
    pub async fn token(&self) -> Result<String, StoreError> {
        if let AzureCredential::Static(token) = &self.credential {
            return Ok(token.clone());
        }

        {
            let cached = self.cached.read().await;
            if let Some(ref t) = *cached {
                if t.expires_at - TimeDelta::seconds(REFRESH_MARGIN_SECS) > Utc::now() {
                    return Ok(t.token.clone());
                }
            }
        }

        let mut cached = self.cached.write().await;
        // another task may have refreshed while we waited for the lock
        if let Some(ref t) = *cached {
            if t.expires_at - TimeDelta::seconds(REFRESH_MARGIN_SECS) > Utc::now() {
                return Ok(t.token.clone());
            }
        }

        let response = self.fetch().await?;
        let fresh = CachedToken {
            expires_at: response.expires_at(Utc::now()),
            token: response.access_token,
        };
        debug!("Acquired storage access token valid until {}", fresh.expires_at);

        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }

    async fn fetch(&self) -> Result<TokenResponse, StoreError> {
        let request = match &self.credential {
            AzureCredential::Static(token) => {
                return Ok(TokenResponse {
                    access_token: token.clone(),
                    expires_in: None,
                    expires_on: None,
                })
            }
            AzureCredential::ClientSecret {
                authority_host,
                tenant_id,
                client_id,
                client_secret,
            } => {
                let token_url = format!("{}/{}/oauth2/v2.0/token", authority_host, tenant_id);
                self.client.post(&token_url).form(&[
                    ("grant_type", "client_credentials"),
                    ("client_id", client_id.as_str()),
                    ("client_secret", client_secret.as_str()),
                    ("scope", STORAGE_SCOPE),
                ])
            }
            AzureCredential::ManagedIdentity {
                endpoint,
                header,
                client_id,
            } => {
                let mut query = vec![
                    ("api-version", MANAGED_IDENTITY_API_VERSION),
                    ("resource", STORAGE_RESOURCE),
                ];
                if let Some(id) = client_id {
                    query.push(("client_id", id.as_str()));
                }
                self.client
                    .get(endpoint)
                    .query(&query)
                    .header("X-IDENTITY-HEADER", header)
            }
        };

        let response = request
            .send()
            .await
            .map_err(|e| StoreError::from_reqwest(e, self.timeout_secs))?;

        if !response.status().is_success() {
            let status = response.status();
            let error = response.text().await.unwrap_or_default();
            return Err(StoreError::Credential(format!(
                "Failed to get access token ({}): {}",
                status, error
            )));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| StoreError::Credential(format!("Failed to parse token response: {}", e)))
    }
}
