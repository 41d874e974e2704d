mod fetch;
mod load;
mod schema;
mod workflow;

use std::path::Path;

use coinpipe_warehouse::{Warehouse, WarehouseConfig};
use serde_json::Value;

use crate::cli::{Cli, Command};
use crate::error::CliError;

/// Command output plus an optional failure to report after the output is printed.
pub struct CommandResult {
    pub data: Value,
    pub failure: Option<CliError>,
}

impl CommandResult {
    pub fn ok(data: Value) -> Self {
        Self {
            data,
            failure: None,
        }
    }

    pub fn with_failure(mut self, failure: CliError) -> Self {
        self.failure = Some(failure);
        self
    }
}

pub async fn run(cli: &Cli) -> Result<CommandResult, CliError> {
    match cli.command() {
        Command::Fetch => fetch::run().await,
        Command::Workflow(args) => workflow::run(&args).await,
        Command::Load(args) => load::run(&args).await,
        Command::Schema => schema::run(),
    }
}

fn open_warehouse(home: Option<&Path>) -> Result<Warehouse, CliError> {
    let config = match home {
        Some(home) => WarehouseConfig::at_home(home),
        None => WarehouseConfig::default(),
    };
    Ok(Warehouse::open(config)?)
}
