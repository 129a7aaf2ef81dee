use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{debug, info};

use super::{PipelineStep, StageKind, StepResult};
use crate::dataset::{self, CsvOptions, FileFormat, JsonLayout};
use crate::error::Result;
use crate::pipeline::context::PipelineContext;

#[derive(Debug, Clone)]
pub enum ReadSource {
    Csv { path: PathBuf, options: CsvOptions },
    Json { path: PathBuf, layout: JsonLayout },
    Parquet { path: PathBuf },
    Partitioned { path: PathBuf, format: FileFormat },
}

/// Reads a staged file into a named dataset
pub struct ReadStep {
    name: String,
    output: String,
    source: ReadSource,
}

impl ReadStep {
    pub fn new(name: impl Into<String>, output: impl Into<String>, source: ReadSource) -> Self {
        Self {
            name: name.into(),
            output: output.into(),
            source,
        }
    }
}

#[async_trait]
impl PipelineStep for ReadStep {
    async fn execute(&self, ctx: &mut PipelineContext) -> Result<StepResult> {
        let output = self.output.as_str();
        let ds = match &self.source {
            ReadSource::Csv { path, options } => dataset::read_csv(output, path, options)?,
            ReadSource::Json { path, layout } => dataset::read_json(output, path, *layout)?,
            ReadSource::Parquet { path } => dataset::read_parquet(output, path)?,
            ReadSource::Partitioned { path, format } => {
                dataset::read_partitioned(output, path, *format)?
            }
        };
        let rows = ds.row_count();
        let columns = ds.column_names().join(",");
        info!("📊 Read {} rows into '{}'", rows, output);
        debug!("{}", ds.preview(20));
        ctx.register(ds)?;
        Ok(StepResult::success(rows, format!("'{}' holds {} rows", output, rows))
            .with_metadata("columns", columns))
    }

    fn step_name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> StageKind {
        StageKind::Extract
    }

    fn outputs(&self) -> Vec<String> {
        vec![self.output.clone()]
    }
}
