use std::sync::Arc;

use coinpipe_core::{GcpTokenSource, GcsObjectStore, PipelineConfig, ReqwestHttpClient};
use coinpipe_warehouse::StagingLoadTask;

use crate::cli::WarehouseArgs;
use crate::error::CliError;

use super::{open_warehouse, CommandResult};

pub async fn run(args: &WarehouseArgs) -> Result<CommandResult, CliError> {
    let config = PipelineConfig::from_env()?;
    let warehouse = open_warehouse(args.home.as_deref())?;

    let store = GcsObjectStore::new(
        Arc::new(ReqwestHttpClient::new()),
        Arc::new(GcpTokenSource::new()),
    )
    .with_base_url(config.storage_base_url.clone())
    .with_timeout_ms(config.http_timeout_ms);

    let task = StagingLoadTask::new(Arc::new(store), config.object_location(), warehouse);
    let report = task.load().await?;
    Ok(CommandResult::ok(serde_json::to_value(report)?))
}
