pub mod context;
pub mod orchestrator;
pub mod pipeline_config;
pub mod steps;

pub use context::PipelineContext;
pub use orchestrator::{PipelineExecutionResult, PipelineOrchestrator, StepRecord};
pub use pipeline_config::{PipelineConfig, PipelineStepConfig};
pub use steps::{FailurePolicy, PipelineStep, StageKind, StepResult, StepStatus};
