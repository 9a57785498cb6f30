mod service;

pub use service::{
    AppConfig, AppInputConfig, ConfigError, StorageBackend, APPLICATION_NAME,
    DEFAULT_CONTAINER_NAME, DEFAULT_STORAGE_TIMEOUT_SECS, UNKNOWN_LABEL,
};
