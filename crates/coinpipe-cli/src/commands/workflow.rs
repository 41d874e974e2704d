use std::sync::Arc;

use coinpipe_core::{FetchJob, PipelineConfig, Workflow};
use coinpipe_warehouse::StagingLoadTask;
use tracing::info;

use crate::cli::WarehouseArgs;
use crate::error::CliError;

use super::{open_warehouse, CommandResult};

pub const WORKFLOW_NAME: &str = "coinmarketcap";

pub async fn run(args: &WarehouseArgs) -> Result<CommandResult, CliError> {
    let config = PipelineConfig::from_env()?;
    let warehouse = open_warehouse(args.home.as_deref())?;

    let job = FetchJob::from_config(&config);
    let load = StagingLoadTask::new(job.object_store(), config.object_location(), warehouse);
    let workflow = Workflow::new(WORKFLOW_NAME)
        .then(Arc::new(job))
        .then(Arc::new(load));

    let report = workflow.run().await;
    info!(
        workflow = WORKFLOW_NAME,
        success = report.is_success(),
        latency_ms = report.latency_ms,
        "workflow finished"
    );
    let failure = report.failed_task().map(|task| CliError::WorkflowFailed {
        task: task.name.clone(),
        message: task.error.clone().unwrap_or_default(),
    });

    let result = CommandResult::ok(serde_json::to_value(&report)?);
    Ok(match failure {
        Some(failure) => result.with_failure(failure),
        None => result,
    })
}
