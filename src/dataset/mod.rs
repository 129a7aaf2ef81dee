//! Immutable, named tabular datasets backed by polars frames.
//!
//! A [`Dataset`] never changes after it is produced: every transformation in
//! [`crate::transform`] builds a lazy plan over a clone of the frame and collects
//! it into a new Dataset.

pub mod reader;
pub mod writer;

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{EtlError, Result};

pub use reader::{read_back, read_csv, read_dataset_dir, read_json, read_parquet, read_partitioned, CsvOptions, JsonLayout};
pub use writer::{write_dataset, OutputLayout, WriteOptions, WriteReport};

/// On-disk encodings understood by the readers and the loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Parquet,
    Csv,
}

impl FileFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            FileFormat::Parquet => "parquet",
            FileFormat::Csv => "csv",
        }
    }
}

/// Column types that may be declared in an explicit schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    String,
    #[serde(alias = "int", alias = "integer")]
    Int32,
    #[serde(alias = "long", alias = "bigint")]
    Int64,
    #[serde(alias = "float")]
    Float32,
    #[serde(alias = "double")]
    Float64,
    #[serde(alias = "bool")]
    Boolean,
}

impl ColumnType {
    pub fn data_type(&self) -> DataType {
        match self {
            ColumnType::String => DataType::String,
            ColumnType::Int32 => DataType::Int32,
            ColumnType::Int64 => DataType::Int64,
            ColumnType::Float32 => DataType::Float32,
            ColumnType::Float64 => DataType::Float64,
            ColumnType::Boolean => DataType::Boolean,
        }
    }
}

/// A declared column. Every declared column accepts nulls, so no nullability
/// flag is accepted here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnSpec {
    pub name: String,
    pub data_type: ColumnType,
}

/// Declared schema, applied positionally and permissively.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaSpec {
    pub columns: Vec<ColumnSpec>,
}

impl SchemaSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn column(mut self, name: impl Into<String>, data_type: ColumnType) -> Self {
        self.columns.push(ColumnSpec {
            name: name.into(),
            data_type,
        });
        self
    }

    pub fn names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

/// One entry of a Dataset's schema.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
}

#[derive(Debug, Clone)]
pub struct Dataset {
    name: String,
    frame: DataFrame,
}

impl Dataset {
    pub fn new(name: impl Into<String>, frame: DataFrame) -> Self {
        Self {
            name: name.into(),
            frame,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn into_frame(self) -> DataFrame {
        self.frame
    }

    /// Same rows under a different name.
    pub fn named(self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            frame: self.frame,
        }
    }

    pub fn row_count(&self) -> usize {
        self.frame.height()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_names().iter().any(|c| c == name)
    }

    pub fn schema(&self) -> Vec<ColumnDescriptor> {
        self.frame
            .get_columns()
            .iter()
            .map(|column| ColumnDescriptor {
                name: column.name().to_string(),
                data_type: column.dtype().clone(),
                // polars columns are always nullable
                nullable: true,
            })
            .collect()
    }

    pub fn require_columns<S: AsRef<str>>(&self, names: &[S]) -> Result<()> {
        let present = self.column_names();
        let missing: Vec<&str> = names
            .iter()
            .map(|n| n.as_ref())
            .filter(|n| !present.iter().any(|p| p == n))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(EtlError::schema(format!(
                "dataset '{}' has no column(s) {} (available: {})",
                self.name,
                missing.join(", "),
                present.join(", ")
            )))
        }
    }

    pub fn lazy(&self) -> LazyFrame {
        self.frame.clone().lazy()
    }

    /// Collect `plan` into a new Dataset carrying this Dataset's name.
    pub(crate) fn derive(&self, plan: LazyFrame) -> Result<Dataset> {
        Ok(Dataset::new(self.name.clone(), plan.collect()?))
    }

    pub fn preview(&self, rows: usize) -> String {
        format!("{}", self.frame.head(Some(rows)))
    }

    /// True when both datasets hold the same multiset of rows, ignoring row order.
    /// Columns are matched by name.
    pub fn same_rows_unordered(&self, other: &Dataset) -> Result<bool> {
        let mut left_names = self.column_names();
        let mut right_names = other.column_names();
        left_names.sort();
        right_names.sort();
        if left_names != right_names || self.row_count() != other.row_count() {
            return Ok(false);
        }
        let order: Vec<Expr> = self.column_names().iter().map(|c| col(c.as_str())).collect();
        let sort_options = SortMultipleOptions {
            maintain_order: true,
            ..Default::default()
        };
        let left = self
            .lazy()
            .select(&order)
            .sort_by_exprs(&order, sort_options.clone())
            .collect()?;
        let right = other
            .lazy()
            .select(&order)
            .sort_by_exprs(&order, sort_options)
            .collect()?;
        Ok(left.equals_missing(&right))
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} ({} rows)", self.name, self.row_count())?;
        write!(f, "{}", self.frame)
    }
}

pub(crate) fn null_literal() -> Expr {
    Expr::Literal(LiteralValue::Null)
}

/// Vertically concatenate frames, widening column types to a common supertype.
pub(crate) fn concat_frames(frames: Vec<LazyFrame>) -> Result<DataFrame> {
    if frames.is_empty() {
        return Err(EtlError::schema("nothing to concatenate"));
    }
    let args = UnionArgs {
        to_supertypes: true,
        ..Default::default()
    };
    Ok(polars::prelude::concat(frames, args)?.collect()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_reports_names_and_types_in_order() {
        let frame = df!(
            "id" => [1i64, 2],
            "name" => ["Amit", "Neha"]
        )
        .unwrap();
        let ds = Dataset::new("employees", frame);
        let schema = ds.schema();
        assert_eq!(schema.len(), 2);
        assert_eq!(schema[0].name, "id");
        assert_eq!(schema[0].data_type, DataType::Int64);
        assert_eq!(schema[1].data_type, DataType::String);
    }

    #[test]
    fn declared_columns_reject_a_nullability_flag() {
        let parsed: SchemaSpec = toml::from_str(
            r#"columns = [{ name = "TOTAL_COUNT", data_type = "int32" }]"#,
        )
        .unwrap();
        assert_eq!(parsed, SchemaSpec::new().column("TOTAL_COUNT", ColumnType::Int32));

        let strict: std::result::Result<SchemaSpec, _> = toml::from_str(
            r#"columns = [{ name = "TOTAL_COUNT", data_type = "int32", nullable = false }]"#,
        );
        assert!(strict.is_err());
    }

    #[test]
    fn require_columns_names_missing_columns() {
        let ds = Dataset::new("t", df!("a" => [1i64]).unwrap());
        let err = ds.require_columns(&["a", "b"]).unwrap_err();
        assert!(err.to_string().contains("b"));
    }

    #[test]
    fn unordered_comparison_ignores_row_and_column_order() {
        let a = Dataset::new(
            "a",
            df!("x" => [1i64, 2, 3], "y" => ["p", "q", "r"]).unwrap(),
        );
        let b = Dataset::new(
            "b",
            df!("y" => ["r", "p", "q"], "x" => [3i64, 1, 2]).unwrap(),
        );
        assert!(a.same_rows_unordered(&b).unwrap());
    }
}
