use async_trait::async_trait;
use bytes::Bytes;

use crate::error::ApiError;

pub mod memory;
pub mod postgres;
pub mod s3;

/// An object as read back from the object store.
#[derive(Clone, Debug)]
pub struct StoredObject {
    pub bytes: Bytes,
    pub content_type: String,
    /// Content fingerprint, already quoted for use as an HTTP `ETag`.
    pub etag: Option<String>,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> Result<(), ApiError>;
    async fn get(&self, key: &str) -> Result<Option<StoredObject>, ApiError>;
    async fn delete(&self, key: &str) -> Result<(), ApiError>;

    /// Deletes several keys. Backends without a batch call delete one at a
    /// time; a failing key is logged and the rest still go.
    async fn delete_many(&self, keys: &[String]) -> Result<(), ApiError> {
        for key in keys {
            if let Err(err) = self.delete(key).await {
                tracing::warn!("failed to delete object {}: {}", key, err);
            }
        }
        Ok(())
    }
}

/// Key-value store holding one JSON text document per key.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// All keys in the namespace, sorted.
    async fn list_keys(&self) -> Result<Vec<String>, ApiError>;
    async fn get(&self, key: &str) -> Result<Option<String>, ApiError>;
    async fn put(&self, key: &str, value: &str) -> Result<(), ApiError>;
    async fn delete(&self, key: &str) -> Result<(), ApiError>;
}
