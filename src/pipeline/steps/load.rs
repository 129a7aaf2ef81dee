use async_trait::async_trait;
use metrics::counter;
use std::path::PathBuf;
use tracing::info;

use super::{PipelineStep, StageKind, StepResult};
use crate::dataset::{read_back, write_dataset, WriteOptions};
use crate::error::{EtlError, Result};
use crate::pipeline::context::PipelineContext;

/// Writes a dataset to the working volume
pub struct LoadStep {
    name: String,
    dataset: String,
    destination: PathBuf,
    options: WriteOptions,
    verify: bool,
}

impl LoadStep {
    pub fn new(
        name: impl Into<String>,
        dataset: impl Into<String>,
        destination: impl Into<PathBuf>,
        options: WriteOptions,
    ) -> Self {
        Self {
            name: name.into(),
            dataset: dataset.into(),
            destination: destination.into(),
            options,
            verify: false,
        }
    }

    /// Read the output back after writing and compare row counts.
    pub fn verified(mut self) -> Self {
        self.verify = true;
        self
    }
}

#[async_trait]
impl PipelineStep for LoadStep {
    async fn execute(&self, ctx: &mut PipelineContext) -> Result<StepResult> {
        let dataset = ctx.dataset(&self.dataset)?;
        let report = write_dataset(dataset, &self.destination, &self.options)?;

        if self.verify {
            let written = read_back(&self.dataset, &self.destination, &self.options)?;
            if written.row_count() != report.rows {
                return Err(EtlError::load(
                    &self.destination,
                    format!(
                        "read back {} rows but wrote {}",
                        written.row_count(),
                        report.rows
                    ),
                ));
            }
            info!("🔎 Verified {} rows at {}", report.rows, self.destination.display());
        }

        counter!("etl_rows_written_total", "dataset" => self.dataset.clone())
            .increment(report.rows as u64);
        println!("✅ '{}' written to {}", self.dataset, self.destination.display());
        Ok(StepResult::success(
            report.rows,
            format!("{} rows written to {}", report.rows, self.destination.display()),
        )
        .with_metadata("files", report.files.len().to_string()))
    }

    fn step_name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> StageKind {
        StageKind::Load
    }

    fn inputs(&self) -> Vec<String> {
        vec![self.dataset.clone()]
    }
}
