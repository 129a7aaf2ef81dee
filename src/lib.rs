pub mod config;
pub mod constants;
pub mod dataset;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod storage;
pub mod transform;

// Application ports/use cases and their adapters
pub mod app;
pub mod infra;

pub use dataset::{Dataset, FileFormat};
pub use error::{EtlError, Result};
pub use pipeline::{PipelineConfig, PipelineOrchestrator};
