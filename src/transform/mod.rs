//! Relational operations over [`Dataset`]s.
//!
//! Each operation takes `&self` and returns a new Dataset; inputs are never mutated.
//! Expressions are polars [`Expr`]s, so callers can build predicates with
//! `col`/`lit` directly or from the serializable [`Condition`] form used by
//! pipeline configuration.

pub mod aggregations;
pub mod flatten;
pub mod joins;
pub mod set_ops;
pub mod window;

pub use aggregations::{Aggregate, AggregateFunction};
pub use flatten::path_expr;
pub use joins::JoinKind;
pub use set_ops::UnionMode;
pub use window::{WindowFunction, WindowSpec};

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dataset::{null_literal, Dataset};
use crate::error::{EtlError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub column: String,
    #[serde(default)]
    pub descending: bool,
}

impl SortKey {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: false,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    NotEq,
    Gt,
    GtEq,
    Lt,
    LtEq,
    IsNull,
    IsNotNull,
}

/// `column <op> value`, or a null test when `op` is `is_null`/`is_not_null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub column: String,
    pub op: CompareOp,
    #[serde(default)]
    pub value: Option<Value>,
}

impl Condition {
    pub fn new(column: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            op,
            value: Some(value.into()),
        }
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            op: CompareOp::IsNull,
            value: None,
        }
    }

    pub fn is_not_null(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            op: CompareOp::IsNotNull,
            value: None,
        }
    }

    pub fn to_expr(&self) -> Result<Expr> {
        let target = col(self.column.as_str());
        let value = || -> Result<Expr> {
            let value = self.value.as_ref().ok_or_else(|| {
                EtlError::schema(format!(
                    "condition {:?} on '{}' needs a value",
                    self.op, self.column
                ))
            })?;
            json_literal(value)
        };
        Ok(match self.op {
            CompareOp::IsNull => target.is_null(),
            CompareOp::IsNotNull => target.is_not_null(),
            CompareOp::Eq => target.eq(value()?),
            CompareOp::NotEq => target.neq(value()?),
            CompareOp::Gt => target.gt(value()?),
            CompareOp::GtEq => target.gt_eq(value()?),
            CompareOp::Lt => target.lt(value()?),
            CompareOp::LtEq => target.lt_eq(value()?),
        })
    }
}

/// Conjunction of `conditions`; an empty list keeps every row.
pub fn all_of(conditions: &[Condition]) -> Result<Expr> {
    let mut exprs = conditions.iter().map(Condition::to_expr);
    let Some(first) = exprs.next() else {
        return Ok(lit(true));
    };
    exprs.try_fold(first?, |acc, next| Ok(acc.and(next?)))
}

/// Converts a scalar JSON value into a literal expression.
pub fn json_literal(value: &Value) -> Result<Expr> {
    match value {
        Value::Null => Ok(null_literal()),
        Value::Bool(b) => Ok(lit(*b)),
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => Ok(lit(i)),
            (None, Some(f)) => Ok(lit(f)),
            _ => Err(EtlError::schema(format!("unsupported number literal {}", n))),
        },
        Value::String(s) => Ok(lit(s.clone())),
        other => Err(EtlError::schema(format!(
            "only scalar literals are supported, got {}",
            other
        ))),
    }
}

/// One `WHEN ... THEN ...` arm of a derived column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseBranch {
    pub when: Vec<Condition>,
    pub then: Value,
}

/// First matching branch wins; rows matching none take `otherwise`.
pub fn case_when(branches: Vec<(Expr, Expr)>, otherwise: Expr) -> Expr {
    branches
        .into_iter()
        .rev()
        .fold(otherwise, |acc, (condition, value)| {
            when(condition).then(value).otherwise(acc)
        })
}

impl Dataset {
    pub fn select(&self, exprs: &[Expr]) -> Result<Dataset> {
        self.derive(self.lazy().select(exprs))
    }

    pub fn select_columns<S: AsRef<str>>(&self, names: &[S]) -> Result<Dataset> {
        self.require_columns(names)?;
        let exprs: Vec<Expr> = names.iter().map(|n| col(n.as_ref())).collect();
        self.select(&exprs)
    }

    /// Adds `name`, or replaces it in place when it already exists.
    pub fn with_column(&self, name: &str, expr: Expr) -> Result<Dataset> {
        self.derive(self.lazy().with_column(expr.alias(name)))
    }

    pub fn filter(&self, predicate: Expr) -> Result<Dataset> {
        self.derive(self.lazy().filter(predicate))
    }

    pub fn filter_where(&self, conditions: &[Condition]) -> Result<Dataset> {
        let columns: Vec<&str> = conditions.iter().map(|c| c.column.as_str()).collect();
        self.require_columns(&columns)?;
        self.filter(all_of(conditions)?)
    }

    /// Drops the named columns. Names that do not exist are ignored.
    pub fn drop_columns<S: AsRef<str>>(&self, names: &[S]) -> Result<Dataset> {
        let keep: Vec<Expr> = self
            .column_names()
            .iter()
            .filter(|c| !names.iter().any(|n| n.as_ref() == c.as_str()))
            .map(|c| col(c.as_str()))
            .collect();
        self.select(&keep)
    }

    /// Renames `from` to `to`; a no-op when `from` does not exist.
    pub fn rename_column(&self, from: &str, to: &str) -> Result<Dataset> {
        if !self.has_column(from) {
            return Ok(self.clone());
        }
        if from != to && self.has_column(to) {
            return Err(EtlError::schema(format!(
                "cannot rename '{}' to '{}': column already exists",
                from, to
            )));
        }
        let exprs: Vec<Expr> = self
            .column_names()
            .iter()
            .map(|c| {
                if c == from {
                    col(c.as_str()).alias(to)
                } else {
                    col(c.as_str())
                }
            })
            .collect();
        self.select(&exprs)
    }

    /// Non-strict cast: values that do not convert become null.
    pub fn cast_column(&self, name: &str, data_type: DataType) -> Result<Dataset> {
        self.require_columns(&[name])?;
        self.with_column(name, col(name).cast(data_type))
    }

    pub fn derive_case(
        &self,
        name: &str,
        branches: Vec<(Expr, Expr)>,
        otherwise: Expr,
    ) -> Result<Dataset> {
        self.with_column(name, case_when(branches, otherwise))
    }

    /// Removes fully identical rows, keeping the first occurrence.
    pub fn distinct(&self) -> Result<Dataset> {
        self.derive(self.lazy().unique_stable(None, UniqueKeepStrategy::First))
    }

    /// Keeps the first row for each distinct combination of `subset`.
    pub fn drop_duplicates<S: AsRef<str>>(&self, subset: &[S]) -> Result<Dataset> {
        if subset.is_empty() {
            return self.distinct();
        }
        self.require_columns(subset)?;
        let subset = subset.iter().map(|c| c.as_ref().into()).collect();
        self.derive(
            self.lazy()
                .unique_stable(Some(subset), UniqueKeepStrategy::First),
        )
    }

    /// Stable multi-key sort. Nulls sort first ascending and last descending.
    pub fn sort(&self, keys: &[SortKey]) -> Result<Dataset> {
        if keys.is_empty() {
            return Ok(self.clone());
        }
        let columns: Vec<&str> = keys.iter().map(|k| k.column.as_str()).collect();
        self.require_columns(&columns)?;
        let exprs: Vec<Expr> = columns.iter().map(|c| col(*c)).collect();
        let descending: Vec<bool> = keys.iter().map(|k| k.descending).collect();
        let options = SortMultipleOptions {
            descending: descending.clone(),
            nulls_last: descending,
            maintain_order: true,
            ..Default::default()
        };
        self.derive(self.lazy().sort_by_exprs(exprs, options))
    }
}
