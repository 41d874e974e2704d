use thiserror::Error;

use crate::http_client::HttpError;

/// Validation errors for domain value types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("timestamp must be RFC3339: '{value}'")]
    InvalidTimestamp { value: String },
}

/// Failure to read the API credential from the secret store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("secret '{secret_id}' is unavailable: {message}")]
    Unavailable { secret_id: String, message: String },
    #[error("permission denied reading secret '{secret_id}'")]
    PermissionDenied { secret_id: String },
    #[error("secret '{secret_id}' payload could not be decoded: {message}")]
    Undecodable { secret_id: String, message: String },
    #[error("secret '{secret_id}' resolved to an empty credential")]
    Empty { secret_id: String },
    #[error("failed to obtain access token: {0}")]
    Token(String),
}

/// Failure while calling the listings endpoint.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("API credential must not be empty")]
    EmptyCredential,
    #[error("listings transport error: {0}")]
    Transport(#[source] HttpError),
    #[error("listings endpoint returned status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("listings payload is malformed: {0}")]
    MalformedPayload(String),
}

/// Reason a single raw listing failed to decode.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("listing is not a JSON object (found {found})")]
    NotAnObject { found: String },
    #[error("missing required field '{field}'")]
    Missing { field: String },
    #[error("required field '{field}' is null")]
    Null { field: String },
    #[error("field '{field}' expected {expected}, found {found}")]
    Invalid {
        field: String,
        expected: &'static str,
        found: String,
    },
}

impl DecodeError {
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::NotAnObject { .. } => None,
            Self::Missing { field } | Self::Null { field } | Self::Invalid { field, .. } => {
                Some(field.as_str())
            }
        }
    }
}

/// Normalization failure; fails the whole run.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("listing {index}{}: {source}", id_label(.id))]
pub struct SchemaError {
    index: usize,
    id: Option<i64>,
    #[source]
    source: DecodeError,
}

fn id_label(id: &Option<i64>) -> String {
    id.map(|id| format!(" (id {id})")).unwrap_or_default()
}

impl SchemaError {
    pub fn new(index: usize, id: Option<i64>, source: DecodeError) -> Self {
        Self { index, id, source }
    }

    /// Position of the offending listing in the fetched array.
    pub const fn index(&self) -> usize {
        self.index
    }

    pub const fn id(&self) -> Option<i64> {
        self.id
    }

    pub fn decode_error(&self) -> &DecodeError {
        &self.source
    }
}

/// CSV serialization and parsing errors.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error("failed to flush CSV writer: {0}")]
    Flush(String),
    #[error("CSV output is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("CSV header does not match schema: expected '{expected}', found '{found}'")]
    HeaderMismatch { expected: String, found: String },
    #[error("CSV line {line} has {found} fields, expected {expected}")]
    FieldCount {
        line: u64,
        found: usize,
        expected: usize,
    },
    #[error("CSV line {line}, column '{column}': {message}")]
    InvalidValue {
        line: u64,
        column: &'static str,
        message: String,
    },
}

/// Object storage read/write failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("storage transport error: {0}")]
    Transport(#[source] HttpError),
    #[error("storage returned status {status} for {location}: {message}")]
    Status {
        status: u16,
        location: String,
        message: String,
    },
    #[error("object {location} not found")]
    NotFound { location: String },
    #[error("failed to obtain storage access token: {0}")]
    Token(String),
}

/// Invalid runtime configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} has invalid value '{value}': {reason}")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Top-level error for one fetch cycle. Every variant aborts the run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("normalization failed: {0}")]
    Schema(#[from] SchemaError),

    #[error("export failed: {0}")]
    Export(#[from] ExportError),

    #[error("upload failed: {0}")]
    Upload(#[from] StorageError),
}

impl PipelineError {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "pipeline.config",
            Self::Credential(_) => "pipeline.credential",
            Self::Fetch(_) => "pipeline.network",
            Self::Schema(_) => "pipeline.schema",
            Self::Export(_) => "pipeline.export",
            Self::Upload(_) => "pipeline.upload",
        }
    }
}
