//! filedrop-blob: text file storage on top of a blob container
//!
//! Provides the blob store contract with Azure and in-memory backends,
//! and the HTTP handlers that upload, list and show stored files.

pub mod error;
pub mod handlers;
pub mod services;

pub use error::StoreError;
pub use handlers::{app, FileDropAppState};
pub use services::{AzureBlobStore, BlobStore, FileService, MemoryBlobStore};
