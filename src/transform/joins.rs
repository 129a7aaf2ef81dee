use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;
use crate::error::{EtlError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    #[serde(alias = "outer", alias = "full_outer")]
    Full,
    Cross,
}

impl Dataset {
    /// Equi-join on `left_on[i] == right_on[i]`. Both key columns are kept; right-side
    /// names that collide with the left get a `_right` suffix. Null keys never match.
    pub fn join<S: AsRef<str>>(
        &self,
        other: &Dataset,
        left_on: &[S],
        right_on: &[S],
        kind: JoinKind,
    ) -> Result<Dataset> {
        let how = match kind {
            JoinKind::Cross => return self.cross_join(other),
            JoinKind::Inner => JoinType::Inner,
            JoinKind::Left => JoinType::Left,
            JoinKind::Right => JoinType::Right,
            JoinKind::Full => JoinType::Full,
        };
        if left_on.is_empty() || left_on.len() != right_on.len() {
            return Err(EtlError::schema(format!(
                "join of '{}' and '{}' needs the same non-zero number of keys on each side ({} vs {})",
                self.name(),
                other.name(),
                left_on.len(),
                right_on.len()
            )));
        }
        self.require_columns(left_on)?;
        other.require_columns(right_on)?;

        let left_keys: Vec<Expr> = left_on.iter().map(|k| col(k.as_ref())).collect();
        let right_keys: Vec<Expr> = right_on.iter().map(|k| col(k.as_ref())).collect();
        let joined = JoinBuilder::new(self.lazy())
            .with(other.lazy())
            .how(how)
            .left_on(left_keys)
            .right_on(right_keys)
            .coalesce(JoinCoalesce::KeepColumns)
            .finish();
        self.derive(joined)
    }

    /// Cartesian product: every left row paired with every right row.
    pub fn cross_join(&self, other: &Dataset) -> Result<Dataset> {
        self.derive(self.lazy().cross_join(other.lazy(), None))
    }
}
