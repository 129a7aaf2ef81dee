use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use std::sync::Arc;
use tracing::debug;

use crate::app::ports::{ObjectStoreConnector, ObjectStorePort, PublishRequest};
use crate::error::{EtlError, Result};

/// S3 adapter. Credentials come from the standard AWS provider chain.
pub struct S3ObjectStore {
    client: Client,
    region: String,
}

impl S3ObjectStore {
    pub async fn connect(region: &str) -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;
        debug!("S3 client configured for {}", region);
        Self {
            client: Client::new(&config),
            region: region.to_string(),
        }
    }
}

#[async_trait]
impl ObjectStorePort for S3ObjectStore {
    async fn put_object(&self, request: &PublishRequest, body: Vec<u8>) -> Result<()> {
        if request.region != self.region {
            return Err(EtlError::Publish {
                bucket: request.bucket.clone(),
                key: request.key.clone(),
                message: format!(
                    "request targets {} but this client is bound to {}",
                    request.region, self.region
                ),
            });
        }
        self.client
            .put_object()
            .bucket(&request.bucket)
            .key(&request.key)
            .body(ByteStream::from(body))
            .set_expected_bucket_owner(request.expected_owner.clone())
            .send()
            .await
            .map_err(|e| EtlError::Publish {
                bucket: request.bucket.clone(),
                key: request.key.clone(),
                message: DisplayErrorContext(&e).to_string(),
            })?;
        Ok(())
    }
}

/// Connects one [`S3ObjectStore`] per region.
#[derive(Debug, Default, Clone, Copy)]
pub struct S3Connector;

#[async_trait]
impl ObjectStoreConnector for S3Connector {
    async fn connect(&self, region: &str) -> Arc<dyn ObjectStorePort> {
        Arc::new(S3ObjectStore::connect(region).await)
    }
}
