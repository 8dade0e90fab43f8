use crate::core::storage::ObjectStore;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// In-memory object store keyed by (bucket, key)
#[derive(Clone, Default)]
pub struct MemoryObjectStore {
    inner: Arc<Mutex<HashMap<(String, String), Vec<u8>>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()> {
        let mut objects = self.inner.lock().await;
        debug!("Object PUT {}/{} ({} bytes)", bucket, key, body.len());
        objects.insert((bucket.to_string(), key.to_string()), body);
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let objects = self.inner.lock().await;
        let value = objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned();
        if value.is_some() {
            debug!("Object HIT {}/{}", bucket, key);
        } else {
            debug!("Object MISS {}/{}", bucket, key);
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_overwrite() {
        let store = MemoryObjectStore::new();
        assert!(store.is_empty().await);

        store
            .put_object("bucket", "a.json", b"[1]".to_vec())
            .await
            .unwrap();
        assert_eq!(
            store.get_object("bucket", "a.json").await.unwrap(),
            Some(b"[1]".to_vec())
        );

        // Same key is overwritten
        store
            .put_object("bucket", "a.json", b"[2]".to_vec())
            .await
            .unwrap();
        assert_eq!(
            store.get_object("bucket", "a.json").await.unwrap(),
            Some(b"[2]".to_vec())
        );
        assert_eq!(store.len().await, 1);

        // Buckets are separate namespaces
        assert!(store.get_object("other", "a.json").await.unwrap().is_none());
    }
}
