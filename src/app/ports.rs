use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;

/// Where a published artifact goes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishRequest {
    pub bucket: String,
    pub key: String,
    pub region: String,
    /// Account that must own the bucket; the upload is rejected otherwise.
    pub expected_owner: Option<String>,
}

impl PublishRequest {
    pub fn uri(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.key)
    }
}

#[async_trait]
pub trait ObjectStorePort: Send + Sync {
    async fn put_object(&self, request: &PublishRequest, body: Vec<u8>) -> Result<()>;
}

/// Opens an object store whose client is bound to one region.
#[async_trait]
pub trait ObjectStoreConnector: Send + Sync {
    async fn connect(&self, region: &str) -> Arc<dyn ObjectStorePort>;
}
