use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::dataset::{concat_frames, Dataset};
use crate::error::{EtlError, Result};

/// Column matching rule for unions. Callers always choose one explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnionMode {
    /// Match columns by position; the left side's names are kept.
    Positional,
    /// Match columns by name; the output follows the left side's column order.
    ByName,
}

impl Dataset {
    /// Appends `other`'s rows, matching columns by position.
    ///
    /// Names on the right are ignored: two inputs holding the same columns in a
    /// different order are concatenated without error and their values land under
    /// the wrong headers. Use [`Dataset::union_by_name`] unless the layouts are known
    /// to agree.
    pub fn union(&self, other: &Dataset) -> Result<Dataset> {
        let left = self.column_names();
        let right = other.column_names();
        if left.len() != right.len() {
            return Err(EtlError::schema(format!(
                "union of '{}' and '{}' needs the same number of columns ({} vs {})",
                self.name(),
                other.name(),
                left.len(),
                right.len()
            )));
        }
        let aligned: Vec<Expr> = right
            .iter()
            .zip(left.iter())
            .map(|(r, l)| col(r.as_str()).alias(l.as_str()))
            .collect();
        let frame = concat_frames(vec![self.lazy(), other.lazy().select(aligned)])?;
        Ok(Dataset::new(self.name(), frame))
    }

    /// Appends `other`'s rows, matching columns by name.
    pub fn union_by_name(&self, other: &Dataset) -> Result<Dataset> {
        let left = self.column_names();
        let right = other.column_names();
        let missing: Vec<&str> = left
            .iter()
            .filter(|c| !right.contains(c))
            .chain(right.iter().filter(|c| !left.contains(c)))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(EtlError::schema(format!(
                "union by name of '{}' and '{}' found unmatched columns: {}",
                self.name(),
                other.name(),
                missing.join(", ")
            )));
        }
        let aligned: Vec<Expr> = left.iter().map(|c| col(c.as_str())).collect();
        let frame = concat_frames(vec![self.lazy(), other.lazy().select(aligned)])?;
        Ok(Dataset::new(self.name(), frame))
    }

    pub fn union_with(&self, other: &Dataset, mode: UnionMode) -> Result<Dataset> {
        match mode {
            UnionMode::Positional => self.union(other),
            UnionMode::ByName => self.union_by_name(other),
        }
    }
}
