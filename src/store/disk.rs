use crate::core::storage::ObjectStore;
use anyhow::{Context, Result};
use async_trait::async_trait;
use fjall::{Config, Keyspace, PartitionCreateOptions, PersistMode};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Object store persisted in a fjall keyspace, one partition per bucket.
#[derive(Clone)]
pub struct DiskObjectStore {
    keyspace: Arc<Keyspace>,
}

impl DiskObjectStore {
    pub fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory: {}", path.display()))?;
        let keyspace = Config::new(path.join("objects"))
            .open()
            .with_context(|| format!("Failed to open object store at {}", path.display()))?;
        Ok(Self {
            keyspace: Arc::new(keyspace),
        })
    }
}

#[async_trait]
impl ObjectStore for DiskObjectStore {
    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()> {
        let partition = self
            .keyspace
            .open_partition(bucket, PartitionCreateOptions::default())
            .with_context(|| format!("Failed to open bucket '{bucket}'"))?;
        partition
            .insert(key, body.as_slice())
            .with_context(|| format!("Failed to write object '{key}'"))?;
        self.keyspace
            .persist(PersistMode::SyncAll)
            .context("Failed to flush object store")?;
        debug!("Object PUT {}/{} ({} bytes)", bucket, key, body.len());
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>> {
        if !self.keyspace.partition_exists(bucket) {
            debug!("Object MISS {}/{} (no bucket)", bucket, key);
            return Ok(None);
        }
        let partition = self
            .keyspace
            .open_partition(bucket, PartitionCreateOptions::default())
            .with_context(|| format!("Failed to open bucket '{bucket}'"))?;
        let value = partition
            .get(key)
            .with_context(|| format!("Failed to read object '{key}'"))?
            .map(|slice| slice.to_vec());
        debug!(hit = value.is_some(), "Object GET {}/{}", bucket, key);
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_disk_store_put_get() {
        let dir = tempdir().unwrap();
        let store = DiskObjectStore::open(dir.path()).unwrap();

        assert!(
            store
                .get_object("import-finnhub", "crypto_news__20240101.json")
                .await
                .unwrap()
                .is_none()
        );

        store
            .put_object(
                "import-finnhub",
                "crypto_news__20240101.json",
                b"[]".to_vec(),
            )
            .await
            .unwrap();
        assert_eq!(
            store
                .get_object("import-finnhub", "crypto_news__20240101.json")
                .await
                .unwrap(),
            Some(b"[]".to_vec())
        );
    }

    #[tokio::test]
    async fn test_disk_store_overwrite_and_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = DiskObjectStore::open(dir.path()).unwrap();
            store
                .put_object("bucket", "key", b"first".to_vec())
                .await
                .unwrap();
            store
                .put_object("bucket", "key", b"second".to_vec())
                .await
                .unwrap();
        }

        let reopened = DiskObjectStore::open(dir.path()).unwrap();
        assert_eq!(
            reopened.get_object("bucket", "key").await.unwrap(),
            Some(b"second".to_vec())
        );
        assert!(reopened.get_object("bucket", "other").await.unwrap().is_none());
    }
}
