//! CLI argument definitions for coinpipe.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | *(none)* | Same as `fetch` |
//! | `fetch` | Run one fetch cycle and upload the CSV |
//! | `workflow` | Fetch, then load the CSV into the staging table |
//! | `load` | Load the current CSV object into the staging table |
//! | `schema` | Print the output column schema |
//!
//! Pipeline settings come from `COINPIPE_*` environment variables.
//!
//! # Examples
//!
//! ```bash
//! coinpipe
//! coinpipe workflow --home /var/lib/coinpipe --pretty
//! COINPIPE_LOG_FORMAT=json coinpipe fetch
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::logging::LogFormat;

/// Fetch CoinMarketCap listings, export them as CSV to Cloud Storage,
/// and optionally stage them in DuckDB.
#[derive(Debug, Parser)]
#[command(name = "coinpipe", author, version, about = "CoinMarketCap listings pipeline")]
pub struct Cli {
    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Log output format. Falls back to COINPIPE_LOG_FORMAT, then `pretty`.
    #[arg(long, global = true, value_enum)]
    pub log_format: Option<LogFormat>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Fetch)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Run one fetch cycle: credential, fetch, normalize, upload.
    Fetch,

    /// Run the fetch cycle, then load the uploaded CSV into the staging table.
    ///
    /// The load runs only when the fetch succeeded.
    Workflow(WarehouseArgs),

    /// Load the current CSV object into the staging table.
    Load(WarehouseArgs),

    /// Print the declared output columns.
    Schema,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct WarehouseArgs {
    /// Data directory holding `warehouse.duckdb` (default: COINPIPE_HOME or ~/.coinpipe).
    #[arg(long)]
    pub home: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_runs_fetch() {
        let cli = Cli::try_parse_from(["coinpipe"]).expect("parse");
        assert_eq!(cli.command(), Command::Fetch);
        assert!(!cli.pretty);
        assert_eq!(cli.log_format, None);
    }

    #[test]
    fn workflow_accepts_home_and_global_flags() {
        let cli = Cli::try_parse_from([
            "coinpipe",
            "workflow",
            "--home",
            "/tmp/coinpipe",
            "--pretty",
            "--log-format",
            "json",
        ])
        .expect("parse");

        assert_eq!(
            cli.command(),
            Command::Workflow(WarehouseArgs {
                home: Some(PathBuf::from("/tmp/coinpipe"))
            })
        );
        assert!(cli.pretty);
        assert_eq!(cli.log_format, Some(LogFormat::Json));
    }

    #[test]
    fn unknown_subcommand_is_rejected() {
        assert!(Cli::try_parse_from(["coinpipe", "publish"]).is_err());
    }
}
