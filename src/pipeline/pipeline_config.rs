use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

use crate::config::PublishConfig;
use crate::constants;
use crate::dataset::{ColumnType, CsvOptions, FileFormat, JsonLayout, OutputLayout, SchemaSpec};
use crate::error::{EtlError, Result};
use crate::pipeline::steps::{StageKind, TransformOp, WindowOutput};
use crate::storage::{StorageLayout, StorageLocation, StorageRole};
use crate::transform::{Aggregate, Condition, SortKey, WindowFunction, WindowSpec};

/// Configuration for a complete pipeline execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub steps: Vec<PipelineStepConfig>,
}

/// Configuration for individual pipeline steps
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineStepConfig {
    PrepareStorage {
        name: String,
        locations: Vec<StorageLocation>,
    },
    Extract {
        name: String,
        source: PathBuf,
        target: PathBuf,
    },
    ReadCsv {
        name: String,
        output: String,
        path: PathBuf,
        #[serde(default)]
        options: CsvOptions,
    },
    ReadJson {
        name: String,
        output: String,
        path: PathBuf,
        #[serde(default)]
        layout: JsonLayout,
    },
    ReadParquet {
        name: String,
        output: String,
        path: PathBuf,
    },
    ReadPartitioned {
        name: String,
        output: String,
        path: PathBuf,
        format: FileFormat,
    },
    Transform {
        name: String,
        output: String,
        op: TransformOp,
    },
    Load {
        name: String,
        dataset: String,
        destination: PathBuf,
        format: FileFormat,
        #[serde(default)]
        layout: OutputLayout,
        #[serde(default)]
        partition_by: Vec<String>,
        #[serde(default)]
        verify: bool,
    },
    Sync {
        name: String,
        source: PathBuf,
        destination: PathBuf,
    },
    Publish {
        name: String,
        artifact: PathBuf,
        bucket: String,
        key: String,
        #[serde(default = "default_region")]
        region: String,
        #[serde(default)]
        expected_owner: Option<String>,
    },
}

fn default_region() -> String {
    constants::DEFAULT_REGION.to_string()
}

impl PipelineStepConfig {
    pub fn step_name(&self) -> &str {
        match self {
            PipelineStepConfig::PrepareStorage { name, .. }
            | PipelineStepConfig::Extract { name, .. }
            | PipelineStepConfig::ReadCsv { name, .. }
            | PipelineStepConfig::ReadJson { name, .. }
            | PipelineStepConfig::ReadParquet { name, .. }
            | PipelineStepConfig::ReadPartitioned { name, .. }
            | PipelineStepConfig::Transform { name, .. }
            | PipelineStepConfig::Load { name, .. }
            | PipelineStepConfig::Sync { name, .. }
            | PipelineStepConfig::Publish { name, .. } => name,
        }
    }

    pub fn kind(&self) -> StageKind {
        match self {
            PipelineStepConfig::PrepareStorage { .. } => StageKind::Setup,
            PipelineStepConfig::Extract { .. }
            | PipelineStepConfig::ReadCsv { .. }
            | PipelineStepConfig::ReadJson { .. }
            | PipelineStepConfig::ReadParquet { .. }
            | PipelineStepConfig::ReadPartitioned { .. } => StageKind::Extract,
            PipelineStepConfig::Transform { .. } => StageKind::Transform,
            PipelineStepConfig::Load { .. } | PipelineStepConfig::Sync { .. } => StageKind::Load,
            PipelineStepConfig::Publish { .. } => StageKind::Publish,
        }
    }

    /// Datasets this step reads
    pub fn inputs(&self) -> Vec<String> {
        match self {
            PipelineStepConfig::Transform { op, .. } => op.inputs(),
            PipelineStepConfig::Load { dataset, .. } => vec![dataset.clone()],
            _ => Vec::new(),
        }
    }

    /// Datasets this step registers
    pub fn outputs(&self) -> Vec<String> {
        match self {
            PipelineStepConfig::ReadCsv { output, .. }
            | PipelineStepConfig::ReadJson { output, .. }
            | PipelineStepConfig::ReadParquet { output, .. }
            | PipelineStepConfig::ReadPartitioned { output, .. }
            | PipelineStepConfig::Transform { output, .. } => vec![output.clone()],
            _ => Vec::new(),
        }
    }
}

/// Checks step names are unique, every input is produced by an earlier step and
/// no dataset name is produced twice.
pub fn check_dataflow<I>(steps: I) -> Result<()>
where
    I: IntoIterator<Item = (String, Vec<String>, Vec<String>)>,
{
    let mut step_names = HashSet::new();
    let mut produced = HashSet::new();
    let mut count = 0;
    for (name, inputs, outputs) in steps {
        count += 1;
        if !step_names.insert(name.clone()) {
            return Err(EtlError::config(format!("Duplicate step name '{}'", name)));
        }
        for input in &inputs {
            if !produced.contains(input) {
                return Err(EtlError::config(format!(
                    "Step '{}' reads '{}' before any earlier step produces it",
                    name, input
                )));
            }
        }
        for output in outputs {
            if !produced.insert(output.clone()) {
                return Err(EtlError::config(format!(
                    "Step '{}' produces '{}', which an earlier step already produced",
                    name, output
                )));
            }
        }
    }
    if count == 0 {
        return Err(EtlError::config("Pipeline must have at least one step"));
    }
    Ok(())
}

impl PipelineConfig {
    /// Validate the pipeline configuration
    pub fn validate(&self) -> Result<()> {
        check_dataflow(
            self.steps
                .iter()
                .map(|s| (s.step_name().to_string(), s.inputs(), s.outputs())),
        )
    }

    /// The same pipeline with every publish step removed
    pub fn without_publish(&self) -> Self {
        Self {
            steps: self
                .steps
                .iter()
                .filter(|s| !matches!(s, PipelineStepConfig::Publish { .. }))
                .cloned()
                .collect(),
            ..self.clone()
        }
    }

    /// Only create the volume's storage locations
    pub fn prepare_only(layout: &StorageLayout) -> Self {
        Self {
            name: "prepare_only".to_string(),
            description: "Create the working volume folders".to_string(),
            steps: vec![PipelineStepConfig::PrepareStorage {
                name: "prepare_storage".to_string(),
                locations: layout.locations(),
            }],
        }
    }

    /// The flights/JSON demo flow: stage the sample files, read them, derive
    /// reports, write them in several layouts, sync to the workspace and publish.
    pub fn default_etl(layout: &StorageLayout, publish: Option<&PublishConfig>) -> Self {
        let input = layout.volume(StorageRole::Input);
        let output = layout.volume(StorageRole::Output);
        let other = layout.volume(StorageRole::Other);
        let workspace_input = layout.workspace(StorageRole::Input);

        let extract = |name: &str, file: &str| PipelineStepConfig::Extract {
            name: name.to_string(),
            source: workspace_input.join(file),
            target: input.join(file),
        };
        let transform = |name: &str, op: TransformOp| PipelineStepConfig::Transform {
            name: name.to_string(),
            output: name.to_string(),
            op,
        };
        let load = |name: &str, dataset: &str, destination: PathBuf, format: FileFormat| {
            PipelineStepConfig::Load {
                name: name.to_string(),
                dataset: dataset.to_string(),
                destination,
                format,
                layout: OutputLayout::Directory,
                partition_by: Vec::new(),
                verify: false,
            }
        };

        let flights_schema = SchemaSpec::new()
            .column("COUNTRY_1", ColumnType::String)
            .column("COUNTRY_2", ColumnType::String)
            .column("TOTAL_COUNT", ColumnType::Int32);

        let mut steps = vec![
            PipelineStepConfig::PrepareStorage {
                name: "prepare_storage".to_string(),
                locations: layout.locations(),
            },
            extract("extract_flights", "2015-summary.csv"),
            extract("extract_people", "multiline.json"),
            extract("extract_restaurants", "restaurants.json"),
            PipelineStepConfig::ReadCsv {
                name: "read_flights".to_string(),
                output: "flights".to_string(),
                path: input.join("2015-summary.csv"),
                options: CsvOptions::inferred(),
            },
            PipelineStepConfig::ReadCsv {
                name: "read_flights_typed".to_string(),
                output: "flights_typed".to_string(),
                path: input.join("2015-summary.csv"),
                options: CsvOptions::with_schema(flights_schema).header(false),
            },
            PipelineStepConfig::ReadJson {
                name: "read_people".to_string(),
                output: "people".to_string(),
                path: input.join("multiline.json"),
                layout: JsonLayout::Document,
            },
            PipelineStepConfig::ReadJson {
                name: "read_restaurants".to_string(),
                output: "restaurants".to_string(),
                path: input.join("restaurants.json"),
                layout: JsonLayout::Document,
            },
            transform(
                "bad_records",
                TransformOp::Filter {
                    input: "flights_typed".to_string(),
                    conditions: vec![Condition::is_null("TOTAL_COUNT")],
                },
            ),
            transform(
                "route_totals",
                TransformOp::Aggregate {
                    input: "flights".to_string(),
                    group_by: vec!["DEST_COUNTRY_NAME".to_string()],
                    aggregates: vec![
                        Aggregate::count_all().alias("routes"),
                        Aggregate::sum("count").alias("total_flights"),
                        Aggregate::max("count").alias("busiest_route"),
                        Aggregate::avg("count").alias("avg_flights"),
                    ],
                },
            ),
            transform(
                "route_report",
                TransformOp::Sort {
                    input: "route_totals".to_string(),
                    keys: vec![SortKey::desc("total_flights"), SortKey::asc("DEST_COUNTRY_NAME")],
                },
            ),
            transform(
                "ranked_routes",
                TransformOp::Window {
                    input: "flights".to_string(),
                    spec: WindowSpec::ordered_by("count")
                        .partitioned_by(["DEST_COUNTRY_NAME"])
                        .descending(),
                    functions: vec![
                        WindowOutput {
                            function: WindowFunction::RowNumber,
                            column: "row_number".to_string(),
                        },
                        WindowOutput {
                            function: WindowFunction::Rank,
                            column: "rank".to_string(),
                        },
                        WindowOutput {
                            function: WindowFunction::DenseRank,
                            column: "dense_rank".to_string(),
                        },
                        WindowOutput {
                            function: WindowFunction::Ntile(3),
                            column: "ntile".to_string(),
                        },
                    ],
                },
            ),
            transform(
                "restaurant_ids",
                TransformOp::Flatten {
                    input: "restaurants".to_string(),
                    explode: "restaurants".to_string(),
                    alias: "new_restaurant".to_string(),
                    paths: vec!["new_restaurant.restaurant.R.res_id".to_string()],
                },
            ),
            PipelineStepConfig::Load {
                name: "write_flights_parquet".to_string(),
                dataset: "flights".to_string(),
                destination: output.join("parquet_data"),
                format: FileFormat::Parquet,
                layout: OutputLayout::Directory,
                partition_by: Vec::new(),
                verify: true,
            },
            load("write_flights_csv", "flights", output.join("csv_output"), FileFormat::Csv),
            PipelineStepConfig::Load {
                name: "write_flights_partitioned".to_string(),
                dataset: "flights".to_string(),
                destination: output.join("partitioned_csv"),
                format: FileFormat::Csv,
                layout: OutputLayout::Directory,
                partition_by: vec!["DEST_COUNTRY_NAME".to_string()],
                verify: true,
            },
            load(
                "write_ranked_routes",
                "ranked_routes",
                output.join("ranked_routes"),
                FileFormat::Parquet,
            ),
            PipelineStepConfig::Load {
                name: "write_route_report".to_string(),
                dataset: "route_report".to_string(),
                destination: output.join("result.csv"),
                format: FileFormat::Csv,
                layout: OutputLayout::SingleFile,
                partition_by: Vec::new(),
                verify: false,
            },
            load("write_bad_records", "bad_records", other.join("bad_records"), FileFormat::Csv),
            load("write_people", "people", other.join("people"), FileFormat::Parquet),
            load(
                "write_restaurant_ids",
                "restaurant_ids",
                other.join("restaurant_ids"),
                FileFormat::Csv,
            ),
            PipelineStepConfig::Sync {
                name: "sync_output".to_string(),
                source: output.clone(),
                destination: layout.workspace(StorageRole::Output),
            },
            PipelineStepConfig::Sync {
                name: "sync_other".to_string(),
                source: other.clone(),
                destination: layout.workspace(StorageRole::Other),
            },
        ];

        if let Some(publish) = publish {
            steps.push(PipelineStepConfig::Publish {
                name: "publish_result".to_string(),
                artifact: publish.artifact.clone(),
                bucket: publish.bucket.clone(),
                key: publish.key.clone(),
                region: publish.region.clone(),
                expected_owner: publish.expected_owner.clone(),
            });
        }

        Self {
            name: "volume_etl".to_string(),
            description: "Stage sample files, derive flight reports and publish the result".to_string(),
            steps,
        }
    }
}
