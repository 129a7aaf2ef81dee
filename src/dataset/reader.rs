use polars::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use super::writer::{OutputLayout, WriteOptions};
use super::{concat_frames, null_literal, ColumnType, Dataset, FileFormat, SchemaSpec};
use crate::constants::{HIVE_DEFAULT_PARTITION, INFER_SCHEMA_ROWS, SUCCESS_MARKER};
use crate::error::{EtlError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsvOptions {
    #[serde(default = "default_header")]
    pub header: bool,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    /// When set, columns are mapped positionally onto this schema and values that
    /// do not parse become nulls. Otherwise types are inferred from the first rows.
    #[serde(default)]
    pub schema: Option<SchemaSpec>,
}

fn default_header() -> bool {
    true
}

fn default_delimiter() -> char {
    ','
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            header: default_header(),
            delimiter: default_delimiter(),
            schema: None,
        }
    }
}

impl CsvOptions {
    pub fn inferred() -> Self {
        Self::default()
    }

    pub fn with_schema(schema: SchemaSpec) -> Self {
        Self {
            schema: Some(schema),
            ..Self::default()
        }
    }

    pub fn header(mut self, header: bool) -> Self {
        self.header = header;
        self
    }

    fn separator(&self) -> Result<u8> {
        if self.delimiter.is_ascii() {
            Ok(self.delimiter as u8)
        } else {
            Err(EtlError::config(format!(
                "CSV delimiter '{}' must be a single ASCII character",
                self.delimiter
            )))
        }
    }
}

/// How a JSON source is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JsonLayout {
    /// One document: a single object or an array of objects, possibly spanning many lines.
    #[default]
    Document,
    /// One object per line.
    Lines,
}

fn ensure_source(path: &Path) -> Result<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(EtlError::SourceMissing(path.to_path_buf()))
    }
}

pub fn read_csv(name: &str, path: &Path, options: &CsvOptions) -> Result<Dataset> {
    ensure_source(path)?;
    let separator = options.separator()?;
    let frame = match &options.schema {
        None => CsvReadOptions::default()
            .with_has_header(options.header)
            .with_infer_schema_length(Some(INFER_SCHEMA_ROWS))
            .map_parse_options(|parse| parse.with_separator(separator))
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?,
        Some(schema) => read_csv_permissive(path, options.header, separator, schema)?,
    };
    debug!("Read {} rows from {}", frame.height(), path.display());
    Ok(Dataset::new(name, frame))
}

/// Reads every field as text, then maps columns onto `schema` by position.
/// Unparseable values, missing trailing fields and missing columns become nulls;
/// extra columns are ignored.
fn read_csv_permissive(
    path: &Path,
    header: bool,
    separator: u8,
    schema: &SchemaSpec,
) -> Result<DataFrame> {
    if schema.columns.is_empty() {
        return Err(EtlError::schema("declared schema has no columns"));
    }
    let raw = CsvReadOptions::default()
        .with_has_header(header)
        .with_infer_schema_length(Some(0))
        .map_parse_options(|parse| {
            parse
                .with_separator(separator)
                .with_truncate_ragged_lines(true)
        })
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    let raw_names: Vec<String> = raw
        .get_column_names()
        .iter()
        .map(|n| n.to_string())
        .collect();
    let projection: Vec<Expr> = schema
        .columns
        .iter()
        .enumerate()
        .map(|(position, spec)| {
            let value = match raw_names.get(position) {
                Some(raw_name) => parse_text(col(raw_name.as_str()), spec.data_type),
                None => null_literal().cast(spec.data_type.data_type()),
            };
            value.alias(spec.name.as_str())
        })
        .collect();

    Ok(raw.lazy().select(projection).collect()?)
}

fn parse_text(text: Expr, target: ColumnType) -> Expr {
    match target {
        ColumnType::String => text,
        ColumnType::Boolean => {
            let normalized = text.str().strip_chars(null_literal()).str().to_lowercase();
            when(normalized.clone().eq(lit("true")))
                .then(lit(true))
                .when(normalized.eq(lit("false")))
                .then(lit(false))
                .otherwise(null_literal().cast(DataType::Boolean))
        }
        numeric => text
            .str()
            .strip_chars(null_literal())
            .cast(numeric.data_type()),
    }
}

pub fn read_json(name: &str, path: &Path, layout: JsonLayout) -> Result<Dataset> {
    ensure_source(path)?;
    let bytes = fs::read(path)?;
    let frame = match layout {
        JsonLayout::Lines => JsonReader::new(Cursor::new(bytes))
            .with_json_format(JsonFormat::JsonLines)
            .finish()?,
        JsonLayout::Document => {
            let document: Value = serde_json::from_slice(&bytes)?;
            let records = match document {
                Value::Array(items) => items,
                object @ Value::Object(_) => vec![object],
                _ => {
                    return Err(EtlError::extract(
                        path,
                        "expected a JSON object or an array of objects",
                    ))
                }
            };
            if records.is_empty() {
                return Err(EtlError::extract(path, "JSON document holds no records"));
            }
            let normalized = serde_json::to_vec(&Value::Array(records))?;
            JsonReader::new(Cursor::new(normalized))
                .with_json_format(JsonFormat::Json)
                .finish()?
        }
    };
    debug!("Read {} JSON records from {}", frame.height(), path.display());
    Ok(Dataset::new(name, frame))
}

/// Reads a Parquet file, or every part file of a Parquet output directory.
pub fn read_parquet(name: &str, path: &Path) -> Result<Dataset> {
    ensure_source(path)?;
    if path.is_dir() {
        return read_dataset_dir(name, path, FileFormat::Parquet);
    }
    Ok(Dataset::new(name, read_file(path, FileFormat::Parquet)?))
}

fn read_file(path: &Path, format: FileFormat) -> Result<DataFrame> {
    let frame = match format {
        FileFormat::Parquet => ParquetReader::new(File::open(path)?).finish()?,
        FileFormat::Csv => CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(INFER_SCHEMA_ROWS))
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?,
    };
    Ok(frame)
}

/// Reads one part file of a multi-file output. CSV parts come back untyped so
/// that [`type_parts`] can choose one type per column across all parts.
fn read_part(path: &Path, format: FileFormat) -> Result<DataFrame> {
    match format {
        FileFormat::Parquet => read_file(path, format),
        FileFormat::Csv => Ok(CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?),
    }
}

/// Types the text columns of concatenated CSV parts. A column becomes Int64,
/// Float64 or Boolean only if every non-null value across all parts parses as
/// one; all-null columns stay String. `skip` names columns that are already typed.
fn type_parts(frame: DataFrame, format: FileFormat, skip: &[String]) -> Result<DataFrame> {
    if format != FileFormat::Csv {
        return Ok(frame);
    }
    let mut casts = Vec::new();
    for series in frame.get_columns() {
        let name = series.name().to_string();
        if skip.contains(&name) || series.dtype() != &DataType::String {
            continue;
        }
        if let Some(target) = shared_text_type(series) {
            casts.push(parse_text(col(name.as_str()), target).alias(name.as_str()));
        }
    }
    if casts.is_empty() {
        return Ok(frame);
    }
    Ok(frame.lazy().with_columns(casts).collect()?)
}

fn shared_text_type(series: &Series) -> Option<ColumnType> {
    if series.null_count() == series.len() {
        return None;
    }
    if series.strict_cast(&DataType::Int64).is_ok() {
        return Some(ColumnType::Int64);
    }
    if series.strict_cast(&DataType::Float64).is_ok() {
        return Some(ColumnType::Float64);
    }
    let booleans = series
        .str()
        .map(|values| values.into_iter().flatten().all(|v| v == "true" || v == "false"))
        .unwrap_or(false);
    booleans.then_some(ColumnType::Boolean)
}

/// Hidden files, markers and foreign extensions are not data.
fn is_data_file(path: &Path, format: FileFormat) -> bool {
    let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if file_name.starts_with('_') || file_name.starts_with('.') || file_name == SUCCESS_MARKER {
        return false;
    }
    path.extension().and_then(|e| e.to_str()) == Some(format.extension())
}

fn data_files(dir: &Path, format: FileFormat, recursive: bool) -> Result<Vec<PathBuf>> {
    let walker = WalkDir::new(dir).sort_by_file_name();
    let walker = if recursive { walker } else { walker.max_depth(1) };
    let mut files = Vec::new();
    for entry in walker {
        let entry = entry?;
        if entry.file_type().is_file() && is_data_file(entry.path(), format) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Reads the part files of an unpartitioned output directory.
pub fn read_dataset_dir(name: &str, dir: &Path, format: FileFormat) -> Result<Dataset> {
    ensure_source(dir)?;
    let files = data_files(dir, format, false)?;
    if files.is_empty() {
        return Err(EtlError::extract(
            dir,
            format!("no .{} part files found", format.extension()),
        ));
    }
    let frames = files
        .iter()
        .map(|file| read_part(file, format).map(|frame| frame.lazy()))
        .collect::<Result<Vec<_>>>()?;
    let frame = concat_frames(frames)?;
    Ok(Dataset::new(name, type_parts(frame, format, &[])?))
}

type PartitionValues = Vec<(String, Option<String>)>;

/// Reads a `key=value/...` directory tree, restoring the partition keys as
/// trailing columns. Keys whose values all parse as integers come back as Int64,
/// everything else as String.
pub fn read_partitioned(name: &str, root: &Path, format: FileFormat) -> Result<Dataset> {
    ensure_source(root)?;
    let mut parts: Vec<(PartitionValues, PathBuf)> = Vec::new();
    for file in data_files(root, format, true)? {
        let relative = file
            .strip_prefix(root)
            .map_err(|e| EtlError::extract(&file, e))?;
        let mut values = PartitionValues::new();
        if let Some(parent) = relative.parent() {
            for component in parent.components() {
                let segment = component.as_os_str().to_string_lossy();
                let (key, value) = segment.split_once('=').ok_or_else(|| {
                    EtlError::extract(
                        &file,
                        format!("directory '{}' is not a key=value partition", segment),
                    )
                })?;
                let value = (value != HIVE_DEFAULT_PARTITION).then(|| unescape_partition_value(value));
                values.push((key.to_string(), value));
            }
        }
        parts.push((values, file));
    }

    let Some((first, _)) = parts.first() else {
        return Err(EtlError::extract(
            root,
            format!("no .{} part files found", format.extension()),
        ));
    };
    let keys: Vec<String> = first.iter().map(|(key, _)| key.clone()).collect();
    for (values, file) in &parts {
        let found: Vec<&str> = values.iter().map(|(key, _)| key.as_str()).collect();
        if found != keys.iter().map(String::as_str).collect::<Vec<_>>() {
            return Err(EtlError::extract(
                file,
                format!("inconsistent partition layout: expected keys {:?}", keys),
            ));
        }
    }

    let integer_keys: HashSet<&str> = keys
        .iter()
        .enumerate()
        .filter(|(index, _)| {
            let mut seen = false;
            let all_integers = parts.iter().all(|(values, _)| match &values[*index].1 {
                Some(v) => {
                    seen = true;
                    v.parse::<i64>().is_ok()
                }
                None => true,
            });
            seen && all_integers
        })
        .map(|(_, key)| key.as_str())
        .collect();

    let mut frames = Vec::with_capacity(parts.len());
    for (values, file) in &parts {
        let columns: Vec<Expr> = values
            .iter()
            .map(|(key, value)| {
                partition_literal(value.as_deref(), integer_keys.contains(key.as_str()))
                    .alias(key.as_str())
            })
            .collect();
        frames.push(read_part(file, format)?.lazy().with_columns(columns));
    }
    let frame = concat_frames(frames)?;
    Ok(Dataset::new(name, type_parts(frame, format, &keys)?))
}

fn partition_literal(value: Option<&str>, integer: bool) -> Expr {
    match (value, integer) {
        (Some(v), true) => match v.parse::<i64>() {
            Ok(number) => lit(number),
            Err(_) => null_literal().cast(DataType::Int64),
        },
        (Some(v), false) => lit(v.to_string()),
        (None, true) => null_literal().cast(DataType::Int64),
        (None, false) => null_literal().cast(DataType::String),
    }
}

pub(crate) fn unescape_partition_value(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(high), Some(low)) = (hex_digit(bytes[i + 1]), hex_digit(bytes[i + 2])) {
                decoded.push(high << 4 | low);
                i += 3;
                continue;
            }
        }
        decoded.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&decoded).into_owned()
}

fn hex_digit(byte: u8) -> Option<u8> {
    (byte as char).to_digit(16).map(|d| d as u8)
}

/// Reads back what [`super::write_dataset`] wrote to `dest` with `options`.
pub fn read_back(name: &str, dest: &Path, options: &WriteOptions) -> Result<Dataset> {
    match options.layout {
        OutputLayout::SingleFile => {
            ensure_source(dest)?;
            Ok(Dataset::new(name, read_file(dest, options.format)?))
        }
        OutputLayout::Directory if options.partition_by.is_empty() => {
            read_dataset_dir(name, dest, options.format)
        }
        OutputLayout::Directory => read_partitioned(name, dest, options.format),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unescapes_percent_sequences() {
        assert_eq!(unescape_partition_value("a%2Fb"), "a/b");
        assert_eq!(unescape_partition_value("100%3D1"), "100=1");
        assert_eq!(unescape_partition_value("plain"), "plain");
        assert_eq!(unescape_partition_value("trailing%"), "trailing%");
    }

    #[test]
    fn skips_markers_and_hidden_files() {
        assert!(is_data_file(Path::new("out/part-00000-x.csv"), FileFormat::Csv));
        assert!(!is_data_file(Path::new("out/_SUCCESS"), FileFormat::Csv));
        assert!(!is_data_file(Path::new("out/.part.crc"), FileFormat::Csv));
        assert!(!is_data_file(Path::new("out/part-00000-x.parquet"), FileFormat::Csv));
    }

    #[test]
    fn rejects_non_ascii_delimiter() {
        let options = CsvOptions {
            delimiter: '§',
            ..CsvOptions::default()
        };
        assert!(options.separator().is_err());
    }
}
