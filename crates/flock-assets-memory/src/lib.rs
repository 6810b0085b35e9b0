//! In-memory asset store.
//!
//! Files live in a process-local map keyed by their generated URL. Suitable
//! for tests and single-process development; a real deployment substitutes a
//! hosted file store behind the same trait.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use flock_assets::{AssetError, AssetStore};

/// In-memory asset store. URLs look like `{base_url}/f/{key}`.
pub struct MemoryAssetStore {
    base_url: String,
    files: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryAssetStore {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            files: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of files currently held. Test observability.
    pub async fn len(&self) -> usize {
        self.files.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.files.read().await.is_empty()
    }

    /// Whether a URL is currently stored. Test observability.
    pub async fn contains(&self, url: &str) -> bool {
        self.files.read().await.contains_key(url)
    }
}

impl Default for MemoryAssetStore {
    fn default() -> Self {
        Self::new("https://assets.flock.local")
    }
}

#[async_trait]
impl AssetStore for MemoryAssetStore {
    async fn store(&self, data: &[u8]) -> Result<String, AssetError> {
        let url = format!("{}/f/{}", self.base_url, Uuid::new_v4().simple());
        self.files.write().await.insert(url.clone(), data.to_vec());
        Ok(url)
    }

    async fn delete(&self, url: &str) -> Result<(), AssetError> {
        match self.files.write().await.remove(url) {
            Some(_) => Ok(()),
            None => Err(AssetError::NotFound(url.to_string())),
        }
    }
}
