mod shutdown;

use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use filedrop_blob::services::AzureCredential;
use filedrop_blob::{app, AzureBlobStore, BlobStore, FileDropAppState, FileService, MemoryBlobStore};
use filedrop_config::{AppConfig, AppInputConfig, StorageBackend};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use shutdown::shutdown_signal;

#[derive(Args)]
pub struct ServeCommand {
    /// Address to bind the server to
    #[arg(long, default_value = "0.0.0.0:5000", env = "FILEDROP_ADDRESS")]
    pub address: String,

    /// Storage backend: azure or memory
    #[arg(long, env = "FILEDROP_STORAGE_BACKEND")]
    pub storage_backend: Option<StorageBackend>,

    /// Blob service endpoint, e.g. https://acct.blob.core.windows.net
    #[arg(long, env = "AZURE_STORAGE_BLOB_ENDPOINT")]
    pub blob_endpoint: Option<String>,

    /// Container holding the uploaded files
    #[arg(long, env = "AZURE_STORAGE_CONTAINER_NAME")]
    pub container_name: Option<String>,

    /// Deployment region reported by /info
    #[arg(long, env = "AZURE_REGION")]
    pub region: Option<String>,

    /// Deployment environment reported by /info
    #[arg(long, env = "AZURE_ENV_NAME")]
    pub environment: Option<String>,

    /// Per-call storage timeout in seconds
    #[arg(long, env = "FILEDROP_STORAGE_TIMEOUT_SECS")]
    pub storage_timeout_secs: Option<u64>,
}

impl ServeCommand {
    fn input_config(&self) -> AppInputConfig {
        AppInputConfig {
            backend: self.storage_backend,
            blob_endpoint: self.blob_endpoint.clone(),
            container_name: self.container_name.clone(),
            region: self.region.clone(),
            environment: self.environment.clone(),
            storage_timeout_secs: self.storage_timeout_secs,
        }
    }

    pub fn execute(self) -> anyhow::Result<()> {
        let config = Arc::new(
            AppConfig::try_from(self.input_config()).context("Invalid configuration")?,
        );
        let store = build_store(&config)?;

        let state = Arc::new(FileDropAppState {
            file_service: Arc::new(FileService::new(store)),
            config: config.clone(),
        });

        info!(
            "Starting {} {} on {} ({} backend, container '{}')",
            config.application_name,
            config.version,
            self.address,
            config.backend,
            config.container_name
        );

        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(async move {
            let router = app(state).layer(TraceLayer::new_for_http());

            let listener = TcpListener::bind(&self.address)
                .await
                .with_context(|| format!("Failed to bind {}", self.address))?;
            info!("FileDrop server listening on {}", self.address);

            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal())
                .await?;

            info!("FileDrop server exited");
            Ok::<(), anyhow::Error>(())
        })
    }
}

/// Construct the store selected by the configuration
fn build_store(config: &AppConfig) -> anyhow::Result<Arc<dyn BlobStore>> {
    match config.backend {
        StorageBackend::Azure => {
            let endpoint = config
                .blob_endpoint
                .as_deref()
                .context("AZURE_STORAGE_BLOB_ENDPOINT is required for the azure storage backend")?;
            let credential =
                AzureCredential::from_env().context("Failed to resolve Azure credentials")?;
            debug!("Using {} credential", credential.kind());

            let store = AzureBlobStore::new(
                endpoint,
                &config.container_name,
                credential,
                config.storage_timeout(),
            )?;
            Ok(Arc::new(store))
        }
        StorageBackend::Memory => {
            warn!("Using in-memory storage, files are lost on restart");
            Ok(Arc::new(MemoryBlobStore::new(config.container_name.clone())))
        }
    }
}
