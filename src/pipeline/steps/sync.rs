use async_trait::async_trait;
use std::path::PathBuf;

use super::{PipelineStep, StageKind, StepResult};
use crate::error::Result;
use crate::pipeline::context::PipelineContext;
use crate::storage::{sync_tree, SyncOutcome};

/// Replaces a durable workspace folder with the contents of a volume folder
pub struct SyncStep {
    name: String,
    source: PathBuf,
    destination: PathBuf,
}

impl SyncStep {
    pub fn new(name: impl Into<String>, source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            destination: destination.into(),
        }
    }
}

#[async_trait]
impl PipelineStep for SyncStep {
    async fn execute(&self, _ctx: &mut PipelineContext) -> Result<StepResult> {
        match sync_tree(&self.source, &self.destination)? {
            SyncOutcome::Synced { files, bytes } => {
                println!(
                    "🎉 Synced {} to {}",
                    self.source.display(),
                    self.destination.display()
                );
                Ok(StepResult::success(
                    files,
                    format!("{} files ({} bytes) copied", files, bytes),
                ))
            }
            SyncOutcome::SourceMissing => {
                println!("❌ Source folder not found: {}", self.source.display());
                Ok(StepResult::skipped(format!(
                    "source {} not found",
                    self.source.display()
                )))
            }
        }
    }

    fn step_name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> StageKind {
        StageKind::Load
    }
}
