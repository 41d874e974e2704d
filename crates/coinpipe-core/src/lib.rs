//! # Coinpipe Core
//!
//! Fetch, normalization, and export stages of the CoinMarketCap listings pipeline.
//!
//! ## Overview
//!
//! One fetch cycle reads the API key from a secret store, calls the
//! `listings/latest` endpoint once, maps every listing onto a fixed
//! 17-column schema, serializes the rows as CSV, and overwrites a single
//! object in Cloud Storage. The cycle is all-or-nothing: any failure before
//! the upload leaves the previously stored object untouched.
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`auth`] | OAuth access tokens for Google Cloud |
//! | [`config`] | Environment-driven pipeline settings |
//! | [`domain`] | Schema, listing decode, normalized rows, timestamps |
//! | [`error`] | Error types per stage |
//! | [`export`] | CSV serialization, parsing, and upload |
//! | [`http_client`] | HTTP client abstraction |
//! | [`normalize`] | Raw listings to [`ResultTable`] |
//! | [`pipeline`] | [`FetchJob`] and [`RunReport`] |
//! | [`secrets`] | Secret Manager and static credential stores |
//! | [`source`] | CoinMarketCap listings client |
//! | [`storage`] | Object store contract, GCS and in-memory stores |
//! | [`workflow`] | Linear task chaining |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use coinpipe_core::{FetchJob, PipelineConfig};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::from_env()?;
//!     let report = FetchJob::from_config(&config).run().await?;
//!     println!("{} rows written to gs://{}/{}", report.row_count, report.bucket, report.object_key);
//!     Ok(())
//! }
//! ```
//!
//! ## Security
//!
//! - The API key is never logged; request debug output omits header values
//! - Google Cloud calls use application-default credentials via `gcp_auth`

pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod export;
pub mod http_client;
pub mod normalize;
pub mod pipeline;
pub mod secrets;
pub mod source;
pub mod storage;
pub mod workflow;

// Auth
pub use auth::{AccessTokenSource, GcpTokenSource, StaticTokenSource};

// Configuration
pub use config::PipelineConfig;

// Domain models
pub use domain::{
    coerce_float, coerce_integer, coerce_text, column_names, Column, ColumnType, ListingRecord,
    NormalizedRow, RawListing, ResultTable, UsdQuote, UtcDateTime, COLUMNS, COLUMN_COUNT,
    QUOTE_CURRENCY,
};

// Error types
pub use error::{
    ConfigError, CredentialError, DecodeError, ExportError, FetchError, PipelineError,
    SchemaError, StorageError, ValidationError,
};

// Export
pub use export::{format_float, parse_csv, to_csv, upload_table};

// HTTP client types
pub use http_client::{
    HttpAuth, HttpClient, HttpError, HttpErrorKind, HttpMethod, HttpRequest, HttpResponse,
    ReqwestHttpClient,
};

// Stages
pub use normalize::normalize;
pub use pipeline::{FetchJob, RunReport};
pub use source::{CoinMarketCapSource, ListingsQuery};

// Collaborators
pub use secrets::{SecretManagerStore, SecretStore, StaticSecretStore};
pub use storage::{
    GcsObjectStore, InMemoryObjectStore, ObjectLocation, ObjectStore, StoredObject,
    CSV_CONTENT_TYPE,
};

// Workflow
pub use workflow::{
    Task, TaskError, TaskReport, TaskStatus, Workflow, WorkflowReport, FETCH_TASK_NAME,
};
