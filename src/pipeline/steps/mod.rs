use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;

use crate::error::Result;
use crate::pipeline::context::PipelineContext;

/// Common trait for all pipeline steps
#[async_trait]
pub trait PipelineStep: Send + Sync {
    /// Run the step, reading inputs from and registering outputs into `ctx`
    async fn execute(&self, ctx: &mut PipelineContext) -> Result<StepResult>;

    fn step_name(&self) -> &str;

    fn kind(&self) -> StageKind;

    /// Datasets that must be registered before this step can run
    fn inputs(&self) -> Vec<String> {
        Vec::new()
    }

    /// Datasets this step registers
    fn outputs(&self) -> Vec<String> {
        Vec::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    Setup,
    Extract,
    Transform,
    Load,
    Publish,
}

/// What the orchestrator does when a step returns an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop the run and surface the error.
    Abort,
    /// Record the failure and keep going with whatever data is available.
    LogAndContinue,
    /// Record the failure; steps that need its outputs are skipped.
    IsolateStage,
}

impl StageKind {
    pub fn failure_policy(&self) -> FailurePolicy {
        match self {
            StageKind::Setup | StageKind::Load | StageKind::Publish => FailurePolicy::Abort,
            StageKind::Extract => FailurePolicy::LogAndContinue,
            StageKind::Transform => FailurePolicy::IsolateStage,
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StageKind::Setup => "setup",
            StageKind::Extract => "extract",
            StageKind::Transform => "transform",
            StageKind::Load => "load",
            StageKind::Publish => "publish",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Succeeded,
    Failed,
    Skipped,
}

/// Result of executing a pipeline step
#[derive(Debug, Clone)]
pub struct StepResult {
    pub status: StepStatus,
    pub processed_count: usize,
    pub message: String,
    pub metadata: HashMap<String, String>,
}

impl StepResult {
    pub fn success(processed: usize, message: impl Into<String>) -> Self {
        Self {
            status: StepStatus::Succeeded,
            processed_count: processed,
            message: message.into(),
            metadata: HashMap::new(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: StepStatus::Failed,
            processed_count: 0,
            message: message.into(),
            metadata: HashMap::new(),
        }
    }

    pub fn skipped(message: impl Into<String>) -> Self {
        Self {
            status: StepStatus::Skipped,
            processed_count: 0,
            message: message.into(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn succeeded(&self) -> bool {
        self.status == StepStatus::Succeeded
    }
}

pub mod extract;
pub mod load;
pub mod prepare;
pub mod publish;
pub mod read;
pub mod sync;
pub mod transform;

pub use extract::ExtractStep;
pub use load::LoadStep;
pub use prepare::PrepareStorageStep;
pub use publish::PublishStep;
pub use read::{ReadSource, ReadStep};
pub use sync::SyncStep;
pub use transform::{TransformOp, TransformStep, WindowOutput};
