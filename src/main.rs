use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use volume_etl::app::ports::PublishRequest;
use volume_etl::app::publish_use_case::PublishUseCase;
use volume_etl::config::EtlConfig;
use volume_etl::constants;
use volume_etl::infra::memory_object_store::InMemoryObjectStore;
use volume_etl::infra::s3_object_store::S3ObjectStore;
use volume_etl::logging;
use volume_etl::EtlError;
use volume_etl::pipeline::{PipelineConfig, PipelineExecutionResult, PipelineOrchestrator, StepStatus};

#[derive(Parser)]
#[command(name = "volume_etl")]
#[command(about = "Stage, transform, load and publish tabular data on a storage volume")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to the TOML configuration (defaults to $ETL_CONFIG or ./etl.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the whole pipeline
    Run {
        /// Leave out publish steps
        #[arg(long)]
        skip_publish: bool,
        /// Publish into an in-memory store instead of S3
        #[arg(long)]
        dry_run_publish: bool,
    },
    /// Create the volume's input, output and other folders
    Prepare,
    /// Check the pipeline definition and list its steps
    Validate,
    /// Upload one file to S3
    Publish {
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        bucket: String,
        #[arg(long)]
        key: String,
        #[arg(long, default_value = constants::DEFAULT_REGION)]
        region: String,
        /// Account expected to own the bucket (defaults to $AWS_ACCOUNT_ID)
        #[arg(long)]
        expected_owner: Option<String>,
    },
}

fn print_summary(result: &PipelineExecutionResult) {
    println!("\n📊 Pipeline Results for {}:", result.pipeline_name);
    for step in &result.steps {
        let marker = match step.result.status {
            StepStatus::Succeeded => "✅",
            StepStatus::Failed => "❌",
            StepStatus::Skipped => "⏭️ ",
        };
        println!("   {} {} [{}]: {}", marker, step.name, step.kind, step.result.message);
    }
    if let Some(duration) = result.duration() {
        println!("   Duration: {} ms", duration.num_milliseconds());
    }
}

/// Runs `pipeline`, printing the steps that ran even when a stage aborts.
async fn run_and_report(
    orchestrator: &PipelineOrchestrator,
    pipeline: &PipelineConfig,
) -> anyhow::Result<PipelineExecutionResult> {
    match orchestrator.run_pipeline(pipeline).await {
        Ok(result) => {
            print_summary(&result);
            Ok(result)
        }
        Err(EtlError::Aborted {
            stage,
            source,
            result,
        }) => {
            print_summary(&result);
            error!("Stage '{}' aborted pipeline '{}': {}", stage, pipeline.name, source);
            anyhow::bail!("stage '{}' aborted the pipeline: {}", stage, source)
        }
        Err(e) => Err(e.into()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let explicit = cli.config.is_some();
    let config_path = cli
        .config
        .clone()
        .or_else(|| std::env::var(constants::CONFIG_PATH_ENV).ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(constants::DEFAULT_CONFIG_PATH));
    let mut config = if explicit {
        EtlConfig::load(&config_path)?
    } else {
        EtlConfig::load_or_default(&config_path)?
    };
    config.apply_env_overrides()?;

    let _guard = logging::init_logging(&config.log_dir);
    if config_path.exists() {
        info!("Loaded configuration from {}", config_path.display());
    } else {
        warn!("Config file {} not found, using built-in defaults", config_path.display());
    }
    info!("Running in {} mode", config.run_mode);
    println!("Running in {} mode", config.run_mode);

    match cli.command {
        Commands::Run {
            skip_publish,
            dry_run_publish,
        } => {
            let mut pipeline = config.pipeline();
            if skip_publish {
                pipeline = pipeline.without_publish();
            }
            let mut orchestrator = PipelineOrchestrator::new();
            if dry_run_publish {
                orchestrator = orchestrator.with_object_store(Arc::new(InMemoryObjectStore::new()));
            }
            println!("🚀 Running pipeline '{}' ({} steps)...", pipeline.name, pipeline.steps.len());
            let result = run_and_report(&orchestrator, &pipeline).await?;
            if !result.success {
                error!("Pipeline '{}' finished with failed stages", pipeline.name);
                anyhow::bail!("pipeline '{}' finished with failed stages", pipeline.name);
            }
        }
        Commands::Prepare => {
            let pipeline = PipelineConfig::prepare_only(&config.layout());
            run_and_report(&PipelineOrchestrator::new(), &pipeline).await?;
        }
        Commands::Validate => {
            let pipeline = config.pipeline();
            pipeline.validate()?;
            println!("✅ Pipeline '{}' is valid ({} steps)", pipeline.name, pipeline.steps.len());
            for (index, step) in pipeline.steps.iter().enumerate() {
                println!(
                    "   {:>2}. {} [{}] reads {:?} writes {:?}",
                    index + 1,
                    step.step_name(),
                    step.kind(),
                    step.inputs(),
                    step.outputs()
                );
            }
        }
        Commands::Publish {
            file,
            bucket,
            key,
            region,
            expected_owner,
        } => {
            let expected_owner = expected_owner.or_else(|| {
                std::env::var(constants::ACCOUNT_ID_ENV)
                    .ok()
                    .filter(|account| !account.trim().is_empty())
            });
            let request = PublishRequest {
                bucket,
                key,
                region,
                expected_owner,
            };
            let store = Arc::new(S3ObjectStore::connect(&request.region).await);
            let receipt = PublishUseCase::new(store).publish(&file, &request).await?;
            println!("✅ Uploaded {} ({} bytes) to {}", file.display(), receipt.bytes, receipt.uri);
        }
    }

    Ok(())
}
