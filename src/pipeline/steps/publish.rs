use async_trait::async_trait;
use std::path::PathBuf;

use super::{PipelineStep, StageKind, StepResult};
use crate::app::ports::PublishRequest;
use crate::app::publish_use_case::PublishUseCase;
use crate::error::Result;
use crate::pipeline::context::PipelineContext;

/// Uploads a loaded artifact to object storage
pub struct PublishStep {
    name: String,
    artifact: PathBuf,
    request: PublishRequest,
    publisher: PublishUseCase,
}

impl PublishStep {
    pub fn new(
        name: impl Into<String>,
        artifact: impl Into<PathBuf>,
        request: PublishRequest,
        publisher: PublishUseCase,
    ) -> Self {
        Self {
            name: name.into(),
            artifact: artifact.into(),
            request,
            publisher,
        }
    }
}

#[async_trait]
impl PipelineStep for PublishStep {
    async fn execute(&self, _ctx: &mut PipelineContext) -> Result<StepResult> {
        let receipt = self.publisher.publish(&self.artifact, &self.request).await?;
        println!("✅ Uploaded {} to {}", self.artifact.display(), receipt.uri);
        Ok(
            StepResult::success(1, format!("{} bytes uploaded to {}", receipt.bytes, receipt.uri))
                .with_metadata("sha256", receipt.sha256),
        )
    }

    fn step_name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> StageKind {
        StageKind::Publish
    }
}
