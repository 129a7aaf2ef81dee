use std::path::PathBuf;
use thiserror::Error;

use crate::pipeline::PipelineExecutionResult;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Engine error: {0}")]
    Engine(#[from] polars::prelude::PolarsError),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage location '{path}' could not be prepared: {source}")]
    Setup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Source not found: {0}")]
    SourceMissing(PathBuf),

    #[error("Extraction failed for '{path}': {message}")]
    Extract { path: PathBuf, message: String },

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Unknown dataset: {0}")]
    UnknownDataset(String),

    #[error("Dataset '{0}' was already produced by an earlier stage")]
    DuplicateDataset(String),

    #[error("Load failed for '{path}': {message}")]
    Load { path: PathBuf, message: String },

    #[error("Publish to s3://{bucket}/{key} failed: {message}")]
    Publish {
        bucket: String,
        key: String,
        message: String,
    },

    #[error("Stage '{stage}' aborted the pipeline: {source}")]
    Aborted {
        stage: String,
        #[source]
        source: Box<EtlError>,
        /// Steps recorded up to and including the aborting one
        result: Box<PipelineExecutionResult>,
    },

    #[error("Environment variable error: {0}")]
    Env(#[from] std::env::VarError),
}

impl EtlError {
    pub fn schema(message: impl Into<String>) -> Self {
        EtlError::Schema(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        EtlError::Config(message.into())
    }

    pub fn extract(path: impl Into<PathBuf>, message: impl std::fmt::Display) -> Self {
        EtlError::Extract {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub fn load(path: impl Into<PathBuf>, message: impl std::fmt::Display) -> Self {
        EtlError::Load {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
