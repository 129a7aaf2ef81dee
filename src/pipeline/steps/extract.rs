use async_trait::async_trait;
use std::path::PathBuf;
use tracing::info;

use super::{PipelineStep, StageKind, StepResult};
use crate::error::Result;
use crate::pipeline::context::PipelineContext;
use crate::storage::copy_verified;

/// Copies one source file into the working volume's input location
pub struct ExtractStep {
    name: String,
    source: PathBuf,
    target: PathBuf,
}

impl ExtractStep {
    pub fn new(name: impl Into<String>, source: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            target: target.into(),
        }
    }
}

#[async_trait]
impl PipelineStep for ExtractStep {
    async fn execute(&self, _ctx: &mut PipelineContext) -> Result<StepResult> {
        info!("📂 Source: {}", self.source.display());
        info!("📦 Target: {}", self.target.display());
        let receipt = copy_verified(&self.source, &self.target)?;
        println!("✅ Uploaded {} to {}", self.source.display(), self.target.display());
        Ok(StepResult::success(
            1,
            format!("copied {} bytes to {}", receipt.bytes, receipt.target.display()),
        )
        .with_metadata("sha256", receipt.sha256))
    }

    fn step_name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> StageKind {
        StageKind::Extract
    }
}
