//! In-process blob store for local runs and tests

use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::Bound;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use tracing::debug;

use super::store::{BlobPage, BlobStore, ContainerMetadata};
use crate::error::StoreError;

/// Azure caps list pages at 5000 entries; mirror that by default
const DEFAULT_PAGE_SIZE: usize = 5000;

/// Store operations, used to inject faults and count calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    EnsureContainer,
    Put,
    List,
    Get,
    Describe,
}

#[derive(Default)]
struct MemoryState {
    container_exists: bool,
    blobs: BTreeMap<String, Bytes>,
    faults: HashSet<Operation>,
    calls: HashMap<Operation, usize>,
}

/// Blob store kept entirely in memory. Contents are lost on restart.
pub struct MemoryBlobStore {
    container_name: String,
    page_size: usize,
    state: Mutex<MemoryState>,
}

impl MemoryBlobStore {
    pub fn new(container_name: impl Into<String>) -> Self {
        Self {
            container_name: container_name.into(),
            page_size: DEFAULT_PAGE_SIZE,
            state: Mutex::new(MemoryState::default()),
        }
    }

    /// Limit how many names a single listing page returns
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Make every subsequent call of `operation` fail
    pub fn fail(&self, operation: Operation) {
        self.lock().faults.insert(operation);
    }

    /// Stop failing `operation`
    pub fn recover(&self, operation: Operation) {
        self.lock().faults.remove(&operation);
    }

    /// How many times `operation` has been invoked
    pub fn calls(&self, operation: Operation) -> usize {
        self.lock().calls.get(&operation).copied().unwrap_or(0)
    }

    pub fn container_exists(&self) -> bool {
        self.lock().container_exists
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record the call and fail it when a fault is injected
    fn enter(&self, operation: Operation) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        let mut state = self.lock();
        *state.calls.entry(operation).or_insert(0) += 1;
        if state.faults.contains(&operation) {
            return Err(StoreError::Injected(format!("{:?} is failing", operation)));
        }
        Ok(state)
    }

    fn container_not_found(&self) -> StoreError {
        StoreError::Backend {
            status: 404,
            code: "ContainerNotFound".to_string(),
            message: format!("The specified container '{}' does not exist.", self.container_name),
        }
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    fn container_name(&self) -> &str {
        &self.container_name
    }

    async fn ensure_container(&self) -> Result<(), StoreError> {
        let mut state = self.enter(Operation::EnsureContainer)?;
        if !state.container_exists {
            debug!("Creating in-memory container {}", self.container_name);
            state.container_exists = true;
        }
        Ok(())
    }

    async fn put(&self, name: &str, content: Bytes) -> Result<(), StoreError> {
        let mut state = self.enter(Operation::Put)?;
        if !state.container_exists {
            return Err(self.container_not_found());
        }
        debug!("PUT {}/{} ({} bytes)", self.container_name, name, content.len());
        state.blobs.insert(name.to_string(), content);
        Ok(())
    }

    async fn list_page(&self, marker: Option<String>) -> Result<BlobPage, StoreError> {
        let state = self.enter(Operation::List)?;
        if !state.container_exists {
            return Err(self.container_not_found());
        }

        let lower = match marker {
            Some(ref m) => Bound::Excluded(m.as_str()),
            None => Bound::Unbounded,
        };

        let mut names: Vec<String> = state
            .blobs
            .range::<str, _>((lower, Bound::Unbounded))
            .map(|(name, _)| name.clone())
            .take(self.page_size + 1)
            .collect();

        let next_marker = if names.len() > self.page_size {
            names.truncate(self.page_size);
            names.last().cloned()
        } else {
            None
        };

        Ok(BlobPage { names, next_marker })
    }

    async fn get(&self, name: &str) -> Result<Bytes, StoreError> {
        let state = self.enter(Operation::Get)?;
        state
            .blobs
            .get(name)
            .filter(|_| state.container_exists)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    async fn describe(&self) -> Result<ContainerMetadata, StoreError> {
        let state = self.enter(Operation::Describe)?;
        if !state.container_exists {
            return Err(self.container_not_found());
        }
        Ok(ContainerMetadata {
            name: self.container_name.clone(),
            etag: None,
            last_modified: Some(Utc::now()),
        })
    }
}
