use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

use super::{Dataset, FileFormat};
use crate::constants::{HIVE_DEFAULT_PARTITION, PART_PREFIX, SUCCESS_MARKER};
use crate::error::{EtlError, Result};

/// Shape of what lands at the destination path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputLayout {
    /// A directory of part files plus a `_SUCCESS` marker.
    #[default]
    Directory,
    /// Exactly one file at the destination path.
    SingleFile,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteOptions {
    pub format: FileFormat,
    #[serde(default)]
    pub layout: OutputLayout,
    #[serde(default)]
    pub partition_by: Vec<String>,
}

impl WriteOptions {
    pub fn new(format: FileFormat) -> Self {
        Self {
            format,
            layout: OutputLayout::Directory,
            partition_by: Vec::new(),
        }
    }

    pub fn single_file(mut self) -> Self {
        self.layout = OutputLayout::SingleFile;
        self
    }

    pub fn partitioned_by<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.partition_by = columns.into_iter().map(Into::into).collect();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteReport {
    pub destination: PathBuf,
    pub files: Vec<PathBuf>,
    pub rows: usize,
}

/// Writes `dataset` to `dest`, replacing whatever was there.
pub fn write_dataset(dataset: &Dataset, dest: &Path, options: &WriteOptions) -> Result<WriteReport> {
    if options.layout == OutputLayout::SingleFile && !options.partition_by.is_empty() {
        return Err(EtlError::config(format!(
            "'{}' cannot be both a single file and partitioned",
            dest.display()
        )));
    }
    clear_destination(dest)?;

    let files = match options.layout {
        OutputLayout::SingleFile => {
            if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(|e| EtlError::load(dest, e))?;
            }
            write_frame(dataset.frame().clone(), dest, options.format)?;
            vec![dest.to_path_buf()]
        }
        OutputLayout::Directory => {
            fs::create_dir_all(dest).map_err(|e| EtlError::load(dest, e))?;
            let files = if options.partition_by.is_empty() {
                let file = dest.join(part_file_name(options.format));
                write_frame(dataset.frame().clone(), &file, options.format)?;
                vec![file]
            } else {
                write_partitions(dataset, dest, options)?
            };
            File::create(dest.join(SUCCESS_MARKER)).map_err(|e| EtlError::load(dest, e))?;
            files
        }
    };

    info!(
        "💾 Wrote {} rows of '{}' to {} ({} files)",
        dataset.row_count(),
        dataset.name(),
        dest.display(),
        files.len()
    );
    Ok(WriteReport {
        destination: dest.to_path_buf(),
        files,
        rows: dataset.row_count(),
    })
}

fn write_partitions(dataset: &Dataset, dest: &Path, options: &WriteOptions) -> Result<Vec<PathBuf>> {
    let keys = &options.partition_by;
    dataset.require_columns(keys)?;
    if keys.len() >= dataset.column_names().len() {
        return Err(EtlError::schema(format!(
            "cannot partition '{}' by every one of its columns",
            dataset.name()
        )));
    }

    let parts = dataset
        .frame()
        .partition_by_stable(keys.iter().map(String::as_str), true)?;
    let mut files = Vec::with_capacity(parts.len());
    for part in parts {
        let mut dir = dest.to_path_buf();
        let mut data = part.clone();
        for key in keys {
            let values = part.column(key.as_str())?.cast(&DataType::String)?;
            let segment = values
                .str()?
                .get(0)
                .filter(|v| !v.is_empty())
                .map(escape_partition_value)
                .unwrap_or_else(|| HIVE_DEFAULT_PARTITION.to_string());
            dir.push(format!("{}={}", key, segment));
            data = data.drop(key.as_str())?;
        }
        fs::create_dir_all(&dir).map_err(|e| EtlError::load(&dir, e))?;
        let file = dir.join(part_file_name(options.format));
        debug!("Writing partition {}", dir.display());
        write_frame(data, &file, options.format)?;
        files.push(file);
    }
    Ok(files)
}

fn write_frame(mut frame: DataFrame, path: &Path, format: FileFormat) -> Result<()> {
    let mut file = File::create(path).map_err(|e| EtlError::load(path, e))?;
    match format {
        FileFormat::Parquet => {
            ParquetWriter::new(&mut file)
                .finish(&mut frame)
                .map_err(|e| EtlError::load(path, e))?;
        }
        FileFormat::Csv => {
            CsvWriter::new(&mut file)
                .include_header(true)
                .finish(&mut frame)
                .map_err(|e| EtlError::load(path, e))?;
        }
    }
    Ok(())
}

fn clear_destination(dest: &Path) -> Result<()> {
    let removed = if dest.is_dir() {
        fs::remove_dir_all(dest)
    } else if dest.exists() {
        fs::remove_file(dest)
    } else {
        return Ok(());
    };
    removed.map_err(|e| EtlError::load(dest, format!("could not clear destination: {}", e)))
}

fn part_file_name(format: FileFormat) -> String {
    format!("{}-{}.{}", PART_PREFIX, Uuid::new_v4(), format.extension())
}

/// Percent-encodes characters that are unsafe in a `key=value` directory name.
pub(crate) fn escape_partition_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        let unsafe_char = c.is_ascii_control()
            || matches!(
                c,
                '"' | '#' | '%' | '\'' | '*' | '/' | ':' | '=' | '?' | '\\' | '{' | '[' | ']' | '^'
            );
        if unsafe_char {
            escaped.push_str(&format!("%{:02X}", c as u32));
        } else {
            escaped.push(c);
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::reader::unescape_partition_value;

    #[test]
    fn escapes_path_separators_and_equals() {
        assert_eq!(escape_partition_value("a/b=c"), "a%2Fb%3Dc");
        assert_eq!(escape_partition_value("United States"), "United States");
        assert_eq!(
            unescape_partition_value(&escape_partition_value("50% off: now?")),
            "50% off: now?"
        );
    }

    #[test]
    fn single_file_cannot_be_partitioned() {
        let dir = tempfile::tempdir().unwrap();
        let ds = Dataset::new("t", df!("a" => [1i64], "b" => ["x"]).unwrap());
        let options = WriteOptions::new(FileFormat::Csv)
            .single_file()
            .partitioned_by(["b"]);
        let err = write_dataset(&ds, &dir.path().join("out.csv"), &options).unwrap_err();
        assert!(matches!(err, EtlError::Config(_)));
    }

    #[test]
    fn partitioning_by_every_column_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let ds = Dataset::new("t", df!("b" => ["x", "y"]).unwrap());
        let options = WriteOptions::new(FileFormat::Csv).partitioned_by(["b"]);
        let err = write_dataset(&ds, &dir.path().join("out"), &options).unwrap_err();
        assert!(matches!(err, EtlError::Schema(_)));
    }
}
