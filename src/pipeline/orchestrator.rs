use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::context::PipelineContext;
use super::pipeline_config::{check_dataflow, PipelineConfig, PipelineStepConfig};
use super::steps::{
    ExtractStep, FailurePolicy, LoadStep, PipelineStep, PrepareStorageStep, PublishStep,
    ReadSource, ReadStep, StageKind, StepResult, StepStatus, SyncStep, TransformStep,
};
use crate::app::ports::{ObjectStoreConnector, ObjectStorePort, PublishRequest};
use crate::app::publish_use_case::PublishUseCase;
use crate::dataset::WriteOptions;
use crate::error::{EtlError, Result};
use crate::infra::s3_object_store::S3Connector;

/// Runs pipeline steps in order, applying each stage kind's failure policy
pub struct PipelineOrchestrator {
    object_store: Option<Arc<dyn ObjectStorePort>>,
    connector: Arc<dyn ObjectStoreConnector>,
}

impl Default for PipelineOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineOrchestrator {
    pub fn new() -> Self {
        Self {
            object_store: None,
            connector: Arc::new(S3Connector),
        }
    }

    /// Publish every step through `store` instead of connecting per region
    pub fn with_object_store(mut self, store: Arc<dyn ObjectStorePort>) -> Self {
        self.object_store = Some(store);
        self
    }

    /// Open publish stores through `connector`, one per region
    pub fn with_connector(mut self, connector: Arc<dyn ObjectStoreConnector>) -> Self {
        self.connector = connector;
        self
    }

    /// Run a complete pipeline based on configuration
    pub async fn run_pipeline(&self, config: &PipelineConfig) -> Result<PipelineExecutionResult> {
        info!("🚀 Starting pipeline '{}'", config.name);
        if !config.description.is_empty() {
            info!("📋 Pipeline description: {}", config.description);
        }
        let steps = self.build_steps(config).await?;
        self.run_steps(&config.name, steps).await
    }

    /// Validate `config` and turn it into runnable steps
    pub async fn build_steps(&self, config: &PipelineConfig) -> Result<Vec<Box<dyn PipelineStep>>> {
        config.validate()?;
        let stores = self.stores_for(config).await;
        config
            .steps
            .iter()
            .map(|step| self.create_step(step, &stores))
            .collect()
    }

    /// One store per region named by a publish step
    async fn stores_for(&self, config: &PipelineConfig) -> HashMap<String, Arc<dyn ObjectStorePort>> {
        let mut stores: HashMap<String, Arc<dyn ObjectStorePort>> = HashMap::new();
        for step in &config.steps {
            let PipelineStepConfig::Publish { region, .. } = step else {
                continue;
            };
            if stores.contains_key(region) {
                continue;
            }
            let store = match &self.object_store {
                Some(store) => store.clone(),
                None => self.connector.connect(region).await,
            };
            stores.insert(region.clone(), store);
        }
        stores
    }

    /// Create a step instance from configuration
    fn create_step(
        &self,
        config: &PipelineStepConfig,
        stores: &HashMap<String, Arc<dyn ObjectStorePort>>,
    ) -> Result<Box<dyn PipelineStep>> {
        let step: Box<dyn PipelineStep> = match config.clone() {
            PipelineStepConfig::PrepareStorage { name, locations } => {
                Box::new(PrepareStorageStep::new(name, locations))
            }
            PipelineStepConfig::Extract {
                name,
                source,
                target,
            } => Box::new(ExtractStep::new(name, source, target)),
            PipelineStepConfig::ReadCsv {
                name,
                output,
                path,
                options,
            } => Box::new(ReadStep::new(name, output, ReadSource::Csv { path, options })),
            PipelineStepConfig::ReadJson {
                name,
                output,
                path,
                layout,
            } => Box::new(ReadStep::new(name, output, ReadSource::Json { path, layout })),
            PipelineStepConfig::ReadParquet { name, output, path } => {
                Box::new(ReadStep::new(name, output, ReadSource::Parquet { path }))
            }
            PipelineStepConfig::ReadPartitioned {
                name,
                output,
                path,
                format,
            } => Box::new(ReadStep::new(
                name,
                output,
                ReadSource::Partitioned { path, format },
            )),
            PipelineStepConfig::Transform { name, output, op } => {
                Box::new(TransformStep::declared(name, output, op))
            }
            PipelineStepConfig::Load {
                name,
                dataset,
                destination,
                format,
                layout,
                partition_by,
                verify,
            } => {
                let options = WriteOptions {
                    format,
                    layout,
                    partition_by,
                };
                let step = LoadStep::new(name, dataset, destination, options);
                Box::new(if verify { step.verified() } else { step })
            }
            PipelineStepConfig::Sync {
                name,
                source,
                destination,
            } => Box::new(SyncStep::new(name, source, destination)),
            PipelineStepConfig::Publish {
                name,
                artifact,
                bucket,
                key,
                region,
                expected_owner,
            } => {
                let store = stores.get(&region).cloned().ok_or_else(|| {
                    EtlError::config(format!(
                        "Step '{}' has no object store for region {}",
                        name, region
                    ))
                })?;
                let request = PublishRequest {
                    bucket,
                    key,
                    region,
                    expected_owner,
                };
                Box::new(PublishStep::new(
                    name,
                    artifact,
                    request,
                    PublishUseCase::new(store),
                ))
            }
        };
        Ok(step)
    }

    /// Run already-built steps against a fresh context
    pub async fn run_steps(
        &self,
        pipeline_name: &str,
        steps: Vec<Box<dyn PipelineStep>>,
    ) -> Result<PipelineExecutionResult> {
        let mut ctx = PipelineContext::new();
        self.run_steps_in(pipeline_name, steps, &mut ctx).await
    }

    /// Run steps against `ctx`, leaving every registered dataset in it afterwards
    pub async fn run_steps_in(
        &self,
        pipeline_name: &str,
        steps: Vec<Box<dyn PipelineStep>>,
        ctx: &mut PipelineContext,
    ) -> Result<PipelineExecutionResult> {
        check_dataflow(
            steps
                .iter()
                .map(|s| (s.step_name().to_string(), s.inputs(), s.outputs())),
        )?;

        let mut execution_result = PipelineExecutionResult::new(pipeline_name, ctx.run_id());
        let total = steps.len();

        for (step_index, step) in steps.iter().enumerate() {
            let step_name = step.step_name().to_string();
            let kind = step.kind();
            info!("🔄 Executing step {}/{}: {}", step_index + 1, total, step_name);

            let missing: Vec<String> = step
                .inputs()
                .into_iter()
                .filter(|input| !ctx.contains(input))
                .collect();
            if !missing.is_empty() {
                let message = format!("inputs not available: {}", missing.join(", "));
                warn!("⏭️ Skipping step '{}': {}", step_name, message);
                println!("⏭️  Skipped {}: {}", step_name, message);
                counter!("etl_stage_runs_total", "stage" => kind.to_string(), "status" => "skipped")
                    .increment(1);
                execution_result.record(step_name, kind, StepResult::skipped(message));
                continue;
            }

            let started = Instant::now();
            let outcome = step.execute(ctx).await;
            histogram!("etl_stage_duration_seconds", "stage" => kind.to_string())
                .record(started.elapsed().as_secs_f64());

            match outcome {
                Ok(step_result) => {
                    let status = match step_result.status {
                        StepStatus::Succeeded => "succeeded",
                        StepStatus::Failed => "failed",
                        StepStatus::Skipped => "skipped",
                    };
                    counter!("etl_stage_runs_total", "stage" => kind.to_string(), "status" => status)
                        .increment(1);
                    if step_result.succeeded() {
                        info!("✅ Step '{}' completed: {}", step_name, step_result.message);
                    } else {
                        warn!("⚠️ Step '{}' did not complete: {}", step_name, step_result.message);
                    }
                    execution_result.record(step_name, kind, step_result);
                }
                Err(e) => {
                    counter!("etl_stage_runs_total", "stage" => kind.to_string(), "status" => "failed")
                        .increment(1);
                    let failure = StepResult::failure(format!("Step failed: {}", e));
                    match kind.failure_policy() {
                        FailurePolicy::Abort => {
                            error!("❌ Step '{}' failed, stopping pipeline: {}", step_name, e);
                            println!("❌ {} failed: {}", step_name, e);
                            execution_result.record(step_name.clone(), kind, failure);
                            execution_result.complete();
                            return Err(EtlError::Aborted {
                                stage: step_name,
                                source: Box::new(e),
                                result: Box::new(execution_result),
                            });
                        }
                        FailurePolicy::LogAndContinue => {
                            warn!("⚠️ Step '{}' failed, continuing without it: {}", step_name, e);
                            if matches!(e, EtlError::SourceMissing(_)) {
                                info!("💡 Check that the source file exists and the path is correct");
                            }
                            println!("⚠️  {} failed: {}", step_name, e);
                            execution_result.record(step_name, kind, failure);
                        }
                        FailurePolicy::IsolateStage => {
                            error!(
                                "❌ Step '{}' failed; steps that need its output will be skipped: {}",
                                step_name, e
                            );
                            println!("❌ {} failed: {}", step_name, e);
                            execution_result.record(step_name, kind, failure);
                        }
                    }
                }
            }
        }

        execution_result.complete();
        let processed = execution_result.total_processed();
        if execution_result.success {
            info!(
                "🎉 Pipeline '{}' completed{}: {} rows/items processed",
                pipeline_name,
                if execution_result.degraded { " with skipped or failed extract steps" } else { "" },
                processed
            );
        } else {
            error!(
                "💥 Pipeline '{}' finished with failed stages: {} rows/items processed",
                pipeline_name, processed
            );
        }
        Ok(execution_result)
    }
}

#[derive(Debug, Clone)]
pub struct StepRecord {
    pub name: String,
    pub kind: StageKind,
    pub result: StepResult,
}

/// Result of executing a complete pipeline
#[derive(Debug, Clone)]
pub struct PipelineExecutionResult {
    pub pipeline_name: String,
    pub run_id: Uuid,
    /// False when any transform stage failed
    pub success: bool,
    /// True when a step was skipped or an extract step failed
    pub degraded: bool,
    pub steps: Vec<StepRecord>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl PipelineExecutionResult {
    pub fn new(pipeline_name: &str, run_id: Uuid) -> Self {
        Self {
            pipeline_name: pipeline_name.to_string(),
            run_id,
            success: true,
            degraded: false,
            steps: Vec::new(),
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn record(&mut self, name: String, kind: StageKind, result: StepResult) {
        match (result.status, kind.failure_policy()) {
            (StepStatus::Succeeded, _) => {}
            (StepStatus::Skipped, _) | (StepStatus::Failed, FailurePolicy::LogAndContinue) => {
                self.degraded = true
            }
            (StepStatus::Failed, _) => self.success = false,
        }
        self.steps.push(StepRecord { name, kind, result });
    }

    pub fn step(&self, name: &str) -> Option<&StepRecord> {
        self.steps.iter().find(|s| s.name == name)
    }

    pub fn status_of(&self, name: &str) -> Option<StepStatus> {
        self.step(name).map(|s| s.result.status)
    }

    pub fn total_processed(&self) -> usize {
        self.steps.iter().map(|s| s.result.processed_count).sum()
    }

    pub fn complete(&mut self) {
        self.completed_at = Some(Utc::now());
    }

    pub fn duration(&self) -> Option<chrono::Duration> {
        self.completed_at.map(|end| end - self.started_at)
    }
}
