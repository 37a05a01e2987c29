use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

/// Fixed key the whole document lives under.
pub const DOCUMENT_KEY: &str = "solar-system-nav";

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn write(&self, key: &str, body: &[u8]) -> Result<()>;
}

#[async_trait]
impl<S: DocumentStore + ?Sized> DocumentStore for Arc<S> {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        (**self).read(key).await
    }

    async fn write(&self, key: &str, body: &[u8]) -> Result<()> {
        (**self).write(key, body).await
    }
}
