use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use crate::{
    error::ApiError,
    storage::{MetadataStore, ObjectStore, StoredObject},
    util::sha256_hex,
};

/// Process-local object store. Contents vanish with the process.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: DashMap<String, StoredObject>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.contains_key(key)
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> Result<(), ApiError> {
        let etag = format!("\"{}\"", sha256_hex(&bytes));
        self.objects.insert(
            key.to_string(),
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
                etag: Some(etag),
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<StoredObject>, ApiError> {
        Ok(self.objects.get(key).map(|entry| entry.value().clone()))
    }

    async fn delete(&self, key: &str) -> Result<(), ApiError> {
        self.objects.remove(key);
        Ok(())
    }
}

/// Process-local metadata store.
#[derive(Default)]
pub struct MemoryMetadataStore {
    entries: DashMap<String, String>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn list_keys(&self) -> Result<Vec<String>, ApiError> {
        let mut keys: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        Ok(keys)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, ApiError> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), ApiError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), ApiError> {
        self.entries.remove(key);
        Ok(())
    }
}
