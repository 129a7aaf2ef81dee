use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;
use crate::error::{EtlError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateFunction {
    /// Number of rows, nulls included.
    CountAll,
    /// Number of non-null values.
    Count,
    CountDistinct,
    Min,
    Max,
    Avg,
    Sum,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregate {
    pub function: AggregateFunction,
    #[serde(default)]
    pub column: Option<String>,
    #[serde(default)]
    pub alias: Option<String>,
}

impl Aggregate {
    fn over(function: AggregateFunction, column: impl Into<String>) -> Self {
        Self {
            function,
            column: Some(column.into()),
            alias: None,
        }
    }

    pub fn count_all() -> Self {
        Self {
            function: AggregateFunction::CountAll,
            column: None,
            alias: None,
        }
    }

    pub fn count(column: impl Into<String>) -> Self {
        Self::over(AggregateFunction::Count, column)
    }

    pub fn count_distinct(column: impl Into<String>) -> Self {
        Self::over(AggregateFunction::CountDistinct, column)
    }

    pub fn min(column: impl Into<String>) -> Self {
        Self::over(AggregateFunction::Min, column)
    }

    pub fn max(column: impl Into<String>) -> Self {
        Self::over(AggregateFunction::Max, column)
    }

    pub fn avg(column: impl Into<String>) -> Self {
        Self::over(AggregateFunction::Avg, column)
    }

    pub fn sum(column: impl Into<String>) -> Self {
        Self::over(AggregateFunction::Sum, column)
    }

    pub fn alias(mut self, name: impl Into<String>) -> Self {
        self.alias = Some(name.into());
        self
    }

    pub fn output_name(&self) -> String {
        if let Some(alias) = &self.alias {
            return alias.clone();
        }
        let column = self.column.as_deref().unwrap_or("*");
        match self.function {
            AggregateFunction::CountAll => "count".to_string(),
            AggregateFunction::Count => format!("count({})", column),
            AggregateFunction::CountDistinct => format!("count(DISTINCT {})", column),
            AggregateFunction::Min => format!("min({})", column),
            AggregateFunction::Max => format!("max({})", column),
            AggregateFunction::Avg => format!("avg({})", column),
            AggregateFunction::Sum => format!("sum({})", column),
        }
    }

    fn input(&self) -> Result<Expr> {
        self.column
            .as_deref()
            .map(col)
            .ok_or_else(|| EtlError::schema(format!("{:?} needs a column", self.function)))
    }

    pub(crate) fn to_expr(&self) -> Result<Expr> {
        let expr = match self.function {
            AggregateFunction::CountAll => len().cast(DataType::Int64),
            AggregateFunction::Count => self.input()?.count().cast(DataType::Int64),
            AggregateFunction::CountDistinct => self
                .input()?
                .drop_nulls()
                .n_unique()
                .cast(DataType::Int64),
            AggregateFunction::Min => self.input()?.min(),
            AggregateFunction::Max => self.input()?.max(),
            AggregateFunction::Avg => self.input()?.mean(),
            AggregateFunction::Sum => self.input()?.sum(),
        };
        Ok(expr.alias(self.output_name().as_str()))
    }
}

impl Dataset {
    /// One row per distinct key combination, in order of first appearance.
    /// With no keys this is a global aggregate producing exactly one row.
    pub fn group_by<S: AsRef<str>>(&self, keys: &[S], aggregates: &[Aggregate]) -> Result<Dataset> {
        if aggregates.is_empty() {
            return Err(EtlError::schema("group_by needs at least one aggregate"));
        }
        if keys.is_empty() {
            return self.aggregate(aggregates);
        }
        self.require_columns(keys)?;
        self.require_aggregate_inputs(aggregates)?;
        let by: Vec<Expr> = keys.iter().map(|k| col(k.as_ref())).collect();
        let aggs = aggregates
            .iter()
            .map(Aggregate::to_expr)
            .collect::<Result<Vec<_>>>()?;
        self.derive(self.lazy().group_by_stable(by).agg(aggs))
    }

    pub fn aggregate(&self, aggregates: &[Aggregate]) -> Result<Dataset> {
        self.require_aggregate_inputs(aggregates)?;
        let aggs = aggregates
            .iter()
            .map(Aggregate::to_expr)
            .collect::<Result<Vec<_>>>()?;
        self.derive(self.lazy().select(aggs))
    }

    fn require_aggregate_inputs(&self, aggregates: &[Aggregate]) -> Result<()> {
        let inputs: Vec<&str> = aggregates.iter().filter_map(|a| a.column.as_deref()).collect();
        self.require_columns(&inputs)
    }
}
