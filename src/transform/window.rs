use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;
use crate::error::{EtlError, Result};

const ROW_NUMBER: &str = "__window_row_number";
const PEER_RANK: &str = "__window_rank";

/// Partitioning and ordering for ranking functions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSpec {
    #[serde(default)]
    pub partition_by: Vec<String>,
    pub order_by: String,
    #[serde(default)]
    pub descending: bool,
}

impl WindowSpec {
    pub fn ordered_by(column: impl Into<String>) -> Self {
        Self {
            partition_by: Vec::new(),
            order_by: column.into(),
            descending: false,
        }
    }

    pub fn partitioned_by<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.partition_by = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn descending(mut self) -> Self {
        self.descending = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowFunction {
    /// 1..n without gaps or ties.
    RowNumber,
    /// Ties share a rank; the next rank skips (1, 2, 2, 4).
    Rank,
    /// Ties share a rank without gaps (1, 2, 2, 3).
    DenseRank,
    /// Buckets 1..=n of near-equal size; earlier buckets take the remainder.
    Ntile(u32),
}

fn over_partition(expr: Expr, partition: &[Expr]) -> Expr {
    if partition.is_empty() {
        expr
    } else {
        expr.over(partition)
    }
}

fn function_expr(function: WindowFunction, partition: &[Expr]) -> Expr {
    match function {
        WindowFunction::RowNumber => col(ROW_NUMBER),
        WindowFunction::Rank => col(PEER_RANK),
        WindowFunction::DenseRank => {
            // a new dense rank starts wherever a row is the first of its peer group
            let starts_group = col(ROW_NUMBER).eq(col(PEER_RANK)).cast(DataType::Int64);
            over_partition(starts_group.cum_sum(false), partition)
        }
        WindowFunction::Ntile(buckets) => {
            let buckets = lit(buckets as i64);
            let size = over_partition(len().cast(DataType::Int64), partition);
            let position = col(ROW_NUMBER) - lit(1i64);
            let base = size.clone().floor_div(buckets.clone());
            let remainder = size % buckets;
            let large = base.clone() + lit(1i64);
            let threshold = remainder.clone() * large.clone();
            let small = when(base.clone().eq(lit(0i64)))
                .then(lit(1i64))
                .otherwise(base);
            when(position.clone().lt(threshold.clone()))
                .then(position.clone().floor_div(large) + lit(1i64))
                .otherwise(remainder + (position - threshold).floor_div(small) + lit(1i64))
        }
    }
}

impl Dataset {
    /// Appends one column per `(function, name)` pair computed over `spec`.
    /// Rows come back grouped by partition and ordered by the order key; null order
    /// keys rank first ascending and last descending. Ties keep their input order.
    pub fn with_windows<S: AsRef<str>>(
        &self,
        spec: &WindowSpec,
        outputs: &[(WindowFunction, S)],
    ) -> Result<Dataset> {
        if outputs.is_empty() {
            return Err(EtlError::schema("window needs at least one function"));
        }
        self.require_columns(&spec.partition_by)?;
        self.require_columns(&[spec.order_by.as_str()])?;
        for (function, _) in outputs {
            if *function == WindowFunction::Ntile(0) {
                return Err(EtlError::schema("ntile needs at least one bucket"));
            }
        }

        let partition: Vec<Expr> = spec.partition_by.iter().map(|c| col(c.as_str())).collect();
        let mut sort_by = partition.clone();
        sort_by.push(col(spec.order_by.as_str()));
        let mut descending = vec![false; partition.len()];
        descending.push(spec.descending);
        let mut nulls_last = vec![false; partition.len()];
        nulls_last.push(spec.descending);
        let sorted = self.lazy().sort_by_exprs(
            sort_by.clone(),
            SortMultipleOptions {
                descending,
                nulls_last,
                maintain_order: true,
                ..Default::default()
            },
        );

        let row_number =
            over_partition(int_range(lit(0), len(), 1, DataType::Int64), &partition) + lit(1i64);
        // peers share the smallest row number of their (partition, order key) group
        let peer_rank = col(ROW_NUMBER).min().over(sort_by);
        let staged = sorted
            .with_column(row_number.alias(ROW_NUMBER))
            .with_column(peer_rank.alias(PEER_RANK));

        let columns: Vec<Expr> = outputs
            .iter()
            .map(|(function, name)| function_expr(*function, &partition).alias(name.as_ref()))
            .collect();

        let original = self.column_names();
        let mut keep: Vec<Expr> = original.iter().map(|c| col(c.as_str())).collect();
        for (_, name) in outputs {
            if !original.iter().any(|c| c == name.as_ref()) {
                keep.push(col(name.as_ref()));
            }
        }
        self.derive(staged.with_columns(columns).select(keep))
    }

    pub fn with_window(&self, spec: &WindowSpec, function: WindowFunction, name: &str) -> Result<Dataset> {
        self.with_windows(spec, &[(function, name)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores() -> Dataset {
        Dataset::new(
            "scores",
            df!(
                "team" => ["a", "a", "a", "a", "a", "b", "b"],
                "points" => [50i64, 40, 40, 30, 20, 7, 9]
            )
            .unwrap(),
        )
    }

    fn ints(ds: &Dataset, column: &str) -> Vec<i64> {
        ds.frame()
            .column(column)
            .unwrap()
            .cast(&DataType::Int64)
            .unwrap()
            .i64()
            .unwrap()
            .into_no_null_iter()
            .collect()
    }

    #[test]
    fn ranks_ties_with_and_without_gaps() {
        let spec = WindowSpec::ordered_by("points").partitioned_by(["team"]).descending();
        let ranked = scores()
            .with_windows(
                &spec,
                &[
                    (WindowFunction::RowNumber, "rn"),
                    (WindowFunction::Rank, "rank"),
                    (WindowFunction::DenseRank, "dense"),
                ],
            )
            .unwrap();
        assert_eq!(ints(&ranked, "points"), vec![50, 40, 40, 30, 20, 9, 7]);
        assert_eq!(ints(&ranked, "rn"), vec![1, 2, 3, 4, 5, 1, 2]);
        assert_eq!(ints(&ranked, "rank"), vec![1, 2, 2, 4, 5, 1, 2]);
        assert_eq!(ints(&ranked, "dense"), vec![1, 2, 2, 3, 4, 1, 2]);
    }

    #[test]
    fn ntile_gives_remainder_to_leading_buckets() {
        let spec = WindowSpec::ordered_by("points").partitioned_by(["team"]).descending();
        let tiled = scores()
            .with_window(&spec, WindowFunction::Ntile(3), "bucket")
            .unwrap();
        // five rows into three buckets: 2, 2, 1; two rows into three buckets: 1, 1
        assert_eq!(ints(&tiled, "bucket"), vec![1, 1, 2, 2, 3, 1, 2]);
    }

    #[test]
    fn window_without_partition_ranks_globally() {
        let ranked = scores()
            .with_window(&WindowSpec::ordered_by("points"), WindowFunction::RowNumber, "rn")
            .unwrap();
        assert_eq!(ints(&ranked, "points"), vec![7, 9, 20, 30, 40, 40, 50]);
        assert_eq!(ints(&ranked, "rn"), vec![1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn zero_buckets_is_rejected() {
        let err = scores()
            .with_window(&WindowSpec::ordered_by("points"), WindowFunction::Ntile(0), "b")
            .unwrap_err();
        assert!(matches!(err, EtlError::Schema(_)));
    }
}
