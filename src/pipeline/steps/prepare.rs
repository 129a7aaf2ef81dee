use async_trait::async_trait;
use tracing::info;

use super::{PipelineStep, StageKind, StepResult};
use crate::error::Result;
use crate::pipeline::context::PipelineContext;
use crate::storage::{StorageLocation, StoragePreparer};

/// Creates the working volume's storage locations
pub struct PrepareStorageStep {
    name: String,
    locations: Vec<StorageLocation>,
}

impl PrepareStorageStep {
    pub fn new(name: impl Into<String>, locations: Vec<StorageLocation>) -> Self {
        Self {
            name: name.into(),
            locations,
        }
    }
}

#[async_trait]
impl PipelineStep for PrepareStorageStep {
    async fn execute(&self, _ctx: &mut PipelineContext) -> Result<StepResult> {
        info!("📁 Preparing {} storage locations", self.locations.len());
        let prepared = StoragePreparer::prepare(&self.locations)?;
        let paths: Vec<String> = prepared.iter().map(|p| p.display().to_string()).collect();
        println!("✅ Volume and folders ready");
        Ok(
            StepResult::success(prepared.len(), format!("{} storage locations ready", prepared.len()))
                .with_metadata("paths", paths.join(",")),
        )
    }

    fn step_name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> StageKind {
        StageKind::Setup
    }
}
