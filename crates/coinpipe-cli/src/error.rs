use coinpipe_core::{ConfigError, PipelineError};
use coinpipe_warehouse::{LoadError, WarehouseError};
use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Warehouse(#[from] WarehouseError),

    #[error("workflow task '{task}' failed: {message}")]
    WorkflowFailed { task: String, message: String },

    #[error("failed to initialize logging: {0}")]
    Logging(String),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 2,
            Self::Pipeline(error) => match error {
                PipelineError::Config(_) => 2,
                PipelineError::Credential(_) => 3,
                PipelineError::Fetch(_) => 4,
                PipelineError::Schema(_) => 5,
                PipelineError::Export(_) => 6,
                PipelineError::Upload(_) => 7,
            },
            Self::Load(_) | Self::Warehouse(_) => 8,
            Self::WorkflowFailed { .. } => 9,
            Self::Io(_) => 10,
            Self::Serialization(_) => 11,
            Self::Logging(_) => 12,
        }
    }
}
