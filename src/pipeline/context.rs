use std::collections::BTreeMap;
use uuid::Uuid;

use crate::dataset::Dataset;
use crate::error::{EtlError, Result};

/// Datasets produced so far in one pipeline run, by name.
///
/// Names are write-once: a second stage registering the same name is an error,
/// so a stage can never observe a dataset changing underneath it.
#[derive(Debug)]
pub struct PipelineContext {
    run_id: Uuid,
    datasets: BTreeMap<String, Dataset>,
}

impl Default for PipelineContext {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineContext {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            datasets: BTreeMap::new(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn register(&mut self, dataset: Dataset) -> Result<()> {
        let name = dataset.name().to_string();
        if self.datasets.contains_key(&name) {
            return Err(EtlError::DuplicateDataset(name));
        }
        self.datasets.insert(name, dataset);
        Ok(())
    }

    pub fn dataset(&self, name: &str) -> Result<&Dataset> {
        self.datasets
            .get(name)
            .ok_or_else(|| EtlError::UnknownDataset(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.datasets.contains_key(name)
    }

    pub fn dataset_names(&self) -> Vec<String> {
        self.datasets.keys().cloned().collect()
    }

    pub fn into_datasets(self) -> BTreeMap<String, Dataset> {
        self.datasets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    #[test]
    fn names_are_write_once() {
        let mut ctx = PipelineContext::new();
        let ds = Dataset::new("flights", df!("a" => [1i64]).unwrap());
        ctx.register(ds.clone()).unwrap();
        assert!(matches!(
            ctx.register(ds),
            Err(EtlError::DuplicateDataset(name)) if name == "flights"
        ));
    }

    #[test]
    fn unknown_names_are_errors() {
        let ctx = PipelineContext::new();
        assert!(matches!(ctx.dataset("nope"), Err(EtlError::UnknownDataset(_))));
    }
}
