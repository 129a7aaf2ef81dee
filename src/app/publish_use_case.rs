use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::app::ports::{ObjectStorePort, PublishRequest};
use crate::error::{EtlError, Result};
use crate::storage::sha256_hex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReceipt {
    pub uri: String,
    pub bytes: usize,
    pub sha256: String,
}

/// Uploads a finished artifact to object storage
pub struct PublishUseCase {
    store: Arc<dyn ObjectStorePort>,
}

impl PublishUseCase {
    pub fn new(store: Arc<dyn ObjectStorePort>) -> Self {
        Self { store }
    }

    pub async fn publish(&self, artifact: &Path, request: &PublishRequest) -> Result<PublishReceipt> {
        let failed = |message: String| EtlError::Publish {
            bucket: request.bucket.clone(),
            key: request.key.clone(),
            message,
        };
        if request.bucket.trim().is_empty() || request.key.trim().is_empty() {
            return Err(failed("bucket and key are both required".to_string()));
        }
        if !artifact.is_file() {
            return Err(failed(format!("artifact {} not found", artifact.display())));
        }
        let body = tokio::fs::read(artifact)
            .await
            .map_err(|e| failed(format!("could not read {}: {}", artifact.display(), e)))?;
        let bytes = body.len();
        let sha256 = sha256_hex(&body);

        info!(
            "☁️ Uploading {} ({} bytes) to {} in {}",
            artifact.display(),
            bytes,
            request.uri(),
            request.region
        );
        self.store.put_object(request, body).await?;
        info!("✅ Uploaded {} to {}", artifact.display(), request.uri());

        Ok(PublishReceipt {
            uri: request.uri(),
            bytes,
            sha256,
        })
    }
}
