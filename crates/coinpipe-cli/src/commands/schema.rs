use coinpipe_core::{PipelineConfig, COLUMNS, CSV_CONTENT_TYPE};
use coinpipe_warehouse::STAGING_TABLE;
use serde_json::json;

use crate::error::CliError;

use super::CommandResult;

pub fn run() -> Result<CommandResult, CliError> {
    let config = PipelineConfig::from_env()?;
    Ok(CommandResult::ok(json!({
        "columns": COLUMNS,
        "artifact": {
            "location": config.object_location().to_string(),
            "content_type": CSV_CONTENT_TYPE,
        },
        "staging_table": STAGING_TABLE,
    })))
}
