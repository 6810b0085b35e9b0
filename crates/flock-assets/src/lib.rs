//! Asset storage abstraction for uploaded images.
//!
//! The consensus engine treats file storage as an external collaborator: it
//! receives URLs for stored assets and asks for deletion when a staged upload
//! is discarded. Implementations can be:
//! - Memory (tests, single-process development)
//! - Any hosted file store exposing store/delete by URL

use async_trait::async_trait;
use thiserror::Error;

/// Error type for asset store operations.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("asset not found: {0}")]
    NotFound(String),
    #[error("backend error: {0}")]
    Backend(String),
}

/// External file-storage collaborator.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Persist an uploaded file, returning its public URL.
    async fn store(&self, data: &[u8]) -> Result<String, AssetError>;

    /// Delete a stored file by the URL previously returned from [`store`].
    ///
    /// [`store`]: AssetStore::store
    async fn delete(&self, url: &str) -> Result<(), AssetError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_error_display() {
        let error = AssetError::Backend("connection failed".to_string());
        assert!(error.to_string().contains("backend error"));
        assert!(error.to_string().contains("connection failed"));

        let missing = AssetError::NotFound("https://assets.local/f/x".to_string());
        assert!(missing.to_string().contains("not found"));
    }
}
