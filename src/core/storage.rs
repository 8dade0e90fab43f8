//! Object storage abstractions

use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores `body` under `bucket`/`key`, replacing any existing object.
    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()>;

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>>;
}
