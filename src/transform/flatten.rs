use polars::prelude::*;

use crate::dataset::Dataset;
use crate::error::{EtlError, Result};

/// Expression for a dotted path into nested structs, named after its last segment.
/// `"a.b.c"` reads field `c` of struct `b` of struct column `a`.
pub fn path_expr(path: &str) -> Result<Expr> {
    let mut segments = path.split('.');
    let root = segments
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| EtlError::schema(format!("invalid field path '{}'", path)))?;
    let mut expr = col(root);
    let mut last = root;
    for segment in segments {
        if segment.is_empty() {
            return Err(EtlError::schema(format!("invalid field path '{}'", path)));
        }
        expr = expr.struct_().field_by_name(segment);
        last = segment;
    }
    Ok(expr.alias(last))
}

impl Dataset {
    /// One output row per element of list column `column`, the element held in
    /// `alias`. Rows whose list is empty or null produce nothing; null elements
    /// inside a list still produce a row.
    pub fn explode(&self, column: &str, alias: &str) -> Result<Dataset> {
        self.require_columns(&[column])?;
        let is_list = self
            .schema()
            .iter()
            .any(|c| c.name == column && matches!(c.data_type, DataType::List(_)));
        if !is_list {
            return Err(EtlError::schema(format!(
                "column '{}' of '{}' is not an array",
                column,
                self.name()
            )));
        }
        let plan = self
            .lazy()
            .filter(col(column).is_not_null().and(col(column).list().len().gt(lit(0))))
            .with_column(col(column).alias(alias))
            .explode([col(alias)]);
        self.derive(plan)
    }

    /// Projects dotted paths into nested struct columns.
    pub fn select_paths<S: AsRef<str>>(&self, paths: &[S]) -> Result<Dataset> {
        let roots: Vec<&str> = paths
            .iter()
            .filter_map(|p| p.as_ref().split('.').next())
            .collect();
        self.require_columns(&roots)?;
        let exprs = paths
            .iter()
            .map(|p| path_expr(p.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        self.select(&exprs)
    }

    /// Explodes `array_column` into `alias`, drops the array and projects `paths`.
    pub fn flatten<S: AsRef<str>>(&self, array_column: &str, alias: &str, paths: &[S]) -> Result<Dataset> {
        let exploded = self.explode(array_column, alias)?;
        let exploded = if array_column == alias {
            exploded
        } else {
            exploded.drop_columns(&[array_column])?
        };
        exploded.select_paths(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_path_segments() {
        assert!(path_expr("a..b").is_err());
        assert!(path_expr("").is_err());
        assert!(path_expr("a.b").is_ok());
    }

    #[test]
    fn explode_requires_a_list_column() {
        let ds = Dataset::new("t", df!("a" => [1i64]).unwrap());
        let err = ds.explode("a", "item").unwrap_err();
        assert!(matches!(err, EtlError::Schema(_)));
    }
}
