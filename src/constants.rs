/// Shared names used across storage, loader and pipeline code

// Storage role directory names (under the volume root)
pub const INPUT_DIR: &str = "input";
pub const OUTPUT_DIR: &str = "output";
pub const OTHER_DIR: &str = "other";

// Volume roots per run mode
pub const LOCAL_VOLUME_ROOT: &str = "volumes/workspace/default/my_elt_data";
pub const DATABRICKS_VOLUME_ROOT: &str = "/Volumes/workspace/default/my_elt_data";
pub const DEFAULT_WORKSPACE_ROOT: &str = "datasets";

// Loader layout
pub const SUCCESS_MARKER: &str = "_SUCCESS";
pub const PART_PREFIX: &str = "part-00000";
pub const HIVE_DEFAULT_PARTITION: &str = "__HIVE_DEFAULT_PARTITION__";

// Reader defaults
pub const INFER_SCHEMA_ROWS: usize = 100;

// Publishing defaults
pub const DEFAULT_REGION: &str = "eu-north-1";

// Environment variables
pub const RUN_MODE_ENV: &str = "RUN_MODE";
pub const CONFIG_PATH_ENV: &str = "ETL_CONFIG";
pub const VOLUME_ROOT_ENV: &str = "ETL_VOLUME_ROOT";
pub const WORKSPACE_ROOT_ENV: &str = "ETL_WORKSPACE_ROOT";
pub const ACCOUNT_ID_ENV: &str = "AWS_ACCOUNT_ID";

pub const DEFAULT_CONFIG_PATH: &str = "etl.toml";
