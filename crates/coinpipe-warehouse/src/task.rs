//! Workflow task that loads the exported CSV object into the staging table.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use coinpipe_core::{
    ExportError, ObjectLocation, ObjectStore, ResultTable, StorageError, Task, TaskError,
};
use serde_json::Value;
use thiserror::Error;
use tracing::info;

use crate::{LoadReport, Warehouse, WarehouseError};

pub const STAGING_TASK_NAME: &str = "load_csv_to_staging";

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to download staged CSV: {0}")]
    Download(#[from] StorageError),

    #[error("staged CSV is invalid: {0}")]
    Parse(#[from] ExportError),

    #[error("warehouse load failed: {0}")]
    Warehouse(#[from] WarehouseError),
}

impl LoadError {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Download(_) => "load.download",
            Self::Parse(_) => "load.parse",
            Self::Warehouse(_) => "load.warehouse",
        }
    }
}

/// Downloads the CSV artifact, validates it against the schema, and replaces the staging table.
#[derive(Clone)]
pub struct StagingLoadTask {
    store: Arc<dyn ObjectStore>,
    location: ObjectLocation,
    warehouse: Warehouse,
}

impl StagingLoadTask {
    pub fn new(store: Arc<dyn ObjectStore>, location: ObjectLocation, warehouse: Warehouse) -> Self {
        Self {
            store,
            location,
            warehouse,
        }
    }

    pub async fn load(&self) -> Result<LoadReport, LoadError> {
        let bytes = self.store.get(&self.location).await?;
        let text = String::from_utf8(bytes).map_err(ExportError::from)?;
        let table = ResultTable::from_csv(&text)?;
        info!(location = %self.location, rows = table.len(), "downloaded staged CSV");

        Ok(self.warehouse.load_staging(&table)?)
    }
}

impl Task for StagingLoadTask {
    fn name(&self) -> &str {
        STAGING_TASK_NAME
    }

    fn run<'a>(&'a self) -> Pin<Box<dyn Future<Output = Result<Value, TaskError>> + Send + 'a>> {
        Box::pin(async move {
            let report = self
                .load()
                .await
                .map_err(|error| TaskError::new(error.code(), error))?;
            serde_json::to_value(report).map_err(|error| TaskError::new("workflow.output", error))
        })
    }
}
