mod cli;
mod commands;
mod error;
mod logging;

use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use serde_json::Value;

use crate::cli::Cli;
use crate::error::CliError;
use crate::logging::LogFormat;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::from(error.exit_code())
        }
    }
}

async fn run() -> Result<ExitCode, CliError> {
    let cli = Cli::parse();
    logging::init(LogFormat::resolve(cli.log_format))?;

    let result = commands::run(&cli).await?;
    render(&result.data, cli.pretty)?;

    if let Some(failure) = result.failure {
        return Err(failure);
    }
    Ok(ExitCode::SUCCESS)
}

fn render(data: &Value, pretty: bool) -> Result<(), CliError> {
    let text = if pretty {
        serde_json::to_string_pretty(data)?
    } else {
        serde_json::to_string(data)?
    };
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{text}")?;
    Ok(())
}
