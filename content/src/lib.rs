//! Content storage collaborator.
//!
//! The pipeline consumes content through this narrow interface; the actual
//! backends (local filesystem service, content-addressed network gateway)
//! live outside the node. Content is addressed by the same digest scheme as
//! message item hashes: sha256 hex for native storage, CIDv0 for the legacy
//! network.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use ccn_types::ItemHash;

/// Why a fetch or store failed. Both variants are transient from the
/// pipeline's point of view: `NotFound` content may still be propagating.
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("content not found: {0}")]
    NotFound(ItemHash),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Fetch and store content by hash.
///
/// Synchronous by design: the admission pipeline runs on blocking workers,
/// mirroring the rest of its store access. Implementations must enforce
/// their own request timeouts and surface expiry as [`ContentError::Backend`].
pub trait ContentStorage: Send + Sync {
    fn fetch(&self, content_ref: &ItemHash) -> Result<Vec<u8>, ContentError>;
    fn store(&self, bytes: &[u8]) -> Result<ItemHash, ContentError>;
}

/// In-memory content store for tests.
#[derive(Default)]
pub struct MemoryContentStorage {
    items: Mutex<HashMap<ItemHash, Vec<u8>>>,
}

impl MemoryContentStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed content under its sha256 hex hash, returning the hash.
    pub fn insert(&self, bytes: &[u8]) -> ItemHash {
        let hash = ItemHash::new(ccn_crypto::sha256_hex(bytes));
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(hash.clone(), bytes.to_vec());
        hash
    }

    /// Remove content, simulating a backend that lost or has not yet
    /// received it.
    pub fn remove(&self, content_ref: &ItemHash) {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(content_ref);
    }
}

impl ContentStorage for MemoryContentStorage {
    fn fetch(&self, content_ref: &ItemHash) -> Result<Vec<u8>, ContentError> {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(content_ref)
            .cloned()
            .ok_or_else(|| ContentError::NotFound(content_ref.clone()))
    }

    fn store(&self, bytes: &[u8]) -> Result<ItemHash, ContentError> {
        Ok(self.insert(bytes))
    }
}

/// HTTP gateway to an external content service.
///
/// `GET {base_url}/{hash}` fetches, `POST {base_url}` stores and returns the
/// hash as the response body. Request timeouts convert to backend errors,
/// which the pipeline classifies as transient.
pub struct HttpContentStorage {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HttpContentStorage {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ContentError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ContentError::Backend(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

impl ContentStorage for HttpContentStorage {
    fn fetch(&self, content_ref: &ItemHash) -> Result<Vec<u8>, ContentError> {
        let url = format!("{}/{}", self.base_url, content_ref);
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| ContentError::Backend(e.to_string()))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ContentError::NotFound(content_ref.clone()));
        }
        if !response.status().is_success() {
            return Err(ContentError::Backend(format!(
                "gateway returned {} for {content_ref}",
                response.status()
            )));
        }
        let bytes = response
            .bytes()
            .map_err(|e| ContentError::Backend(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    fn store(&self, bytes: &[u8]) -> Result<ItemHash, ContentError> {
        let response = self
            .client
            .post(&self.base_url)
            .body(bytes.to_vec())
            .send()
            .map_err(|e| ContentError::Backend(e.to_string()))?;
        if !response.status().is_success() {
            return Err(ContentError::Backend(format!(
                "gateway store returned {}",
                response.status()
            )));
        }
        let hash = response
            .text()
            .map_err(|e| ContentError::Backend(e.to_string()))?;
        let hash = ItemHash::new(hash.trim());
        if !hash.is_valid() {
            return Err(ContentError::Backend(format!(
                "gateway returned malformed hash {hash}"
            )));
        }
        Ok(hash)
    }
}
