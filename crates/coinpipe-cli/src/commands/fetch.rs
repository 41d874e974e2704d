use coinpipe_core::{FetchJob, PipelineConfig};

use crate::error::CliError;

use super::CommandResult;

pub async fn run() -> Result<CommandResult, CliError> {
    let config = PipelineConfig::from_env()?;
    let report = FetchJob::from_config(&config).run().await?;
    Ok(CommandResult::ok(serde_json::to_value(report)?))
}
