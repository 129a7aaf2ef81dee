use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::app::ports::{ObjectStorePort, PublishRequest};
use crate::error::{EtlError, Result};

/// Object store kept in memory, for dry runs and tests.
///
/// When built with [`InMemoryObjectStore::owned_by`], uploads naming a different
/// expected bucket owner are refused the way S3 refuses them.
#[derive(Default)]
pub struct InMemoryObjectStore {
    account_id: Option<String>,
    objects: Mutex<HashMap<(String, String), Vec<u8>>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn owned_by(account_id: impl Into<String>) -> Self {
        Self {
            account_id: Some(account_id.into()),
            objects: Mutex::new(HashMap::new()),
        }
    }

    pub async fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .await
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    pub async fn len(&self) -> usize {
        self.objects.lock().await.len()
    }
}

#[async_trait]
impl ObjectStorePort for InMemoryObjectStore {
    async fn put_object(&self, request: &PublishRequest, body: Vec<u8>) -> Result<()> {
        if let (Some(expected), Some(owner)) = (&request.expected_owner, &self.account_id) {
            if expected != owner {
                return Err(EtlError::Publish {
                    bucket: request.bucket.clone(),
                    key: request.key.clone(),
                    message: "Access Denied: bucket is not owned by the expected account".to_string(),
                });
            }
        }
        self.objects
            .lock()
            .await
            .insert((request.bucket.clone(), request.key.clone()), body);
        Ok(())
    }
}
