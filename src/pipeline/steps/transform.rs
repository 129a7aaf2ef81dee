use async_trait::async_trait;
use polars::prelude::Expr;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

use super::{PipelineStep, StageKind, StepResult};
use crate::dataset::{ColumnType, Dataset};
use crate::error::{EtlError, Result};
use crate::pipeline::context::PipelineContext;
use crate::transform::{
    all_of, json_literal, Aggregate, CaseBranch, Condition, JoinKind, SortKey, UnionMode,
    WindowFunction, WindowSpec,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowOutput {
    pub function: WindowFunction,
    pub column: String,
}

/// Declarative transformation, as written in pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransformOp {
    Filter {
        input: String,
        conditions: Vec<Condition>,
    },
    DeriveCase {
        input: String,
        column: String,
        branches: Vec<CaseBranch>,
        #[serde(default)]
        otherwise: Value,
    },
    Project {
        input: String,
        columns: Vec<String>,
    },
    Rename {
        input: String,
        from: String,
        to: String,
    },
    Cast {
        input: String,
        column: String,
        data_type: ColumnType,
    },
    WithLiteral {
        input: String,
        column: String,
        value: Value,
    },
    Drop {
        input: String,
        columns: Vec<String>,
    },
    Deduplicate {
        input: String,
        #[serde(default)]
        subset: Vec<String>,
    },
    Sort {
        input: String,
        keys: Vec<SortKey>,
    },
    Aggregate {
        input: String,
        #[serde(default)]
        group_by: Vec<String>,
        aggregates: Vec<Aggregate>,
    },
    Join {
        left: String,
        right: String,
        #[serde(default)]
        left_on: Vec<String>,
        #[serde(default)]
        right_on: Vec<String>,
        how: JoinKind,
    },
    Union {
        left: String,
        right: String,
        mode: UnionMode,
    },
    Window {
        input: String,
        spec: WindowSpec,
        functions: Vec<WindowOutput>,
    },
    Flatten {
        input: String,
        explode: String,
        alias: String,
        paths: Vec<String>,
    },
}

impl TransformOp {
    pub fn inputs(&self) -> Vec<String> {
        match self {
            TransformOp::Join { left, right, .. } | TransformOp::Union { left, right, .. } => {
                vec![left.clone(), right.clone()]
            }
            TransformOp::Filter { input, .. }
            | TransformOp::DeriveCase { input, .. }
            | TransformOp::Project { input, .. }
            | TransformOp::Rename { input, .. }
            | TransformOp::Cast { input, .. }
            | TransformOp::WithLiteral { input, .. }
            | TransformOp::Drop { input, .. }
            | TransformOp::Deduplicate { input, .. }
            | TransformOp::Sort { input, .. }
            | TransformOp::Aggregate { input, .. }
            | TransformOp::Window { input, .. }
            | TransformOp::Flatten { input, .. } => vec![input.clone()],
        }
    }

    /// Applies the operation; `inputs` are in the order given by [`TransformOp::inputs`].
    pub fn apply(&self, inputs: &[&Dataset]) -> Result<Dataset> {
        let first = nth(inputs, 0)?;
        match self {
            TransformOp::Filter { conditions, .. } => first.filter_where(conditions),
            TransformOp::DeriveCase {
                column,
                branches,
                otherwise,
                ..
            } => {
                let arms = branches
                    .iter()
                    .map(|b| -> Result<(Expr, Expr)> { Ok((all_of(&b.when)?, json_literal(&b.then)?)) })
                    .collect::<Result<Vec<_>>>()?;
                first.derive_case(column, arms, json_literal(otherwise)?)
            }
            TransformOp::Project { columns, .. } => first.select_columns(columns),
            TransformOp::Rename { from, to, .. } => first.rename_column(from, to),
            TransformOp::Cast {
                column, data_type, ..
            } => first.cast_column(column, data_type.data_type()),
            TransformOp::WithLiteral { column, value, .. } => {
                first.with_column(column, json_literal(value)?)
            }
            TransformOp::Drop { columns, .. } => first.drop_columns(columns),
            TransformOp::Deduplicate { subset, .. } => first.drop_duplicates(subset),
            TransformOp::Sort { keys, .. } => first.sort(keys),
            TransformOp::Aggregate {
                group_by,
                aggregates,
                ..
            } => first.group_by(group_by, aggregates),
            TransformOp::Join {
                left_on,
                right_on,
                how,
                ..
            } => first.join(nth(inputs, 1)?, left_on, right_on, *how),
            TransformOp::Union { mode, .. } => first.union_with(nth(inputs, 1)?, *mode),
            TransformOp::Window {
                spec, functions, ..
            } => {
                let outputs: Vec<(WindowFunction, &str)> = functions
                    .iter()
                    .map(|f| (f.function, f.column.as_str()))
                    .collect();
                first.with_windows(spec, &outputs)
            }
            TransformOp::Flatten {
                explode,
                alias,
                paths,
                ..
            } => first.flatten(explode, alias, paths),
        }
    }
}

fn nth<'a>(inputs: &[&'a Dataset], index: usize) -> Result<&'a Dataset> {
    inputs
        .get(index)
        .copied()
        .ok_or_else(|| EtlError::schema(format!("transformation expects input #{}", index + 1)))
}

pub type TransformFn = dyn Fn(&[&Dataset]) -> Result<Dataset> + Send + Sync;

enum Operation {
    Declared(TransformOp),
    Custom {
        inputs: Vec<String>,
        apply: Arc<TransformFn>,
    },
}

/// Derives one dataset from datasets registered by earlier steps
pub struct TransformStep {
    name: String,
    output: String,
    operation: Operation,
}

impl TransformStep {
    pub fn declared(name: impl Into<String>, output: impl Into<String>, op: TransformOp) -> Self {
        Self {
            name: name.into(),
            output: output.into(),
            operation: Operation::Declared(op),
        }
    }

    /// A transformation written in code; `apply` receives `inputs` in order.
    pub fn custom<F>(
        name: impl Into<String>,
        inputs: Vec<String>,
        output: impl Into<String>,
        apply: F,
    ) -> Self
    where
        F: Fn(&[&Dataset]) -> Result<Dataset> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            output: output.into(),
            operation: Operation::Custom {
                inputs,
                apply: Arc::new(apply),
            },
        }
    }
}

#[async_trait]
impl PipelineStep for TransformStep {
    async fn execute(&self, ctx: &mut PipelineContext) -> Result<StepResult> {
        let result = {
            let inputs = self
                .inputs()
                .iter()
                .map(|name| ctx.dataset(name))
                .collect::<Result<Vec<_>>>()?;
            match &self.operation {
                Operation::Declared(op) => op.apply(&inputs)?,
                Operation::Custom { apply, .. } => apply(&inputs)?,
            }
        }
        .named(self.output.as_str());

        let rows = result.row_count();
        info!("🔧 '{}' produced {} rows", self.output, rows);
        debug!("{}", result.preview(20));
        ctx.register(result)?;
        Ok(StepResult::success(rows, format!("'{}' holds {} rows", self.output, rows)))
    }

    fn step_name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> StageKind {
        StageKind::Transform
    }

    fn inputs(&self) -> Vec<String> {
        match &self.operation {
            Operation::Declared(op) => op.inputs(),
            Operation::Custom { inputs, .. } => inputs.clone(),
        }
    }

    fn outputs(&self) -> Vec<String> {
        vec![self.output.clone()]
    }
}
