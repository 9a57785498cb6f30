//! Blob store backends and the file page logic built on them

mod azure;
mod credentials;
mod file_service;
mod memory;
mod store;

pub use azure::AzureBlobStore;
pub use credentials::{AzureCredential, TokenProvider, AZURE_AUTHORITY_HOST};
pub use file_service::{
    FileService, Flash, FlashLevel, HealthStatus, PageOutcome, FILES_PATH, INDEX_PATH,
    MISSING_FIELDS_MESSAGE,
};
pub use memory::{MemoryBlobStore, Operation};
pub use store::{BlobPage, BlobStore, ContainerMetadata};
