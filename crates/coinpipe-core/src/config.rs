use std::env;
use std::fmt::{Debug, Formatter};

use crate::http_client::DEFAULT_TIMEOUT_MS;
use crate::secrets::SECRET_MANAGER_BASE_URL;
use crate::source::CMC_BASE_URL;
use crate::storage::{ObjectLocation, GCS_BASE_URL};
use crate::ConfigError;

pub const DEFAULT_GCP_PROJECT: &str = "learn-gcloud-462613";
pub const DEFAULT_SECRET_ID: &str = "coinmarketcap_api_key";
pub const DEFAULT_BUCKET: &str = "dev-file-dump";
pub const DEFAULT_OBJECT_KEY: &str = "crypto_prices.csv";

pub const ENV_CMC_BASE_URL: &str = "COINPIPE_CMC_BASE_URL";
pub const ENV_GCP_PROJECT: &str = "COINPIPE_GCP_PROJECT";
pub const ENV_SECRET_ID: &str = "COINPIPE_SECRET_ID";
pub const ENV_CMC_API_KEY: &str = "COINPIPE_CMC_API_KEY";
pub const ENV_BUCKET: &str = "COINPIPE_BUCKET";
pub const ENV_OBJECT_KEY: &str = "COINPIPE_OBJECT_KEY";
pub const ENV_HTTP_TIMEOUT_MS: &str = "COINPIPE_HTTP_TIMEOUT_MS";
pub const ENV_STORAGE_BASE_URL: &str = "COINPIPE_STORAGE_BASE_URL";
pub const ENV_SECRET_MANAGER_BASE_URL: &str = "COINPIPE_SECRET_MANAGER_BASE_URL";

/// Runtime settings for one fetch cycle.
#[derive(Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub cmc_base_url: String,
    pub gcp_project: String,
    pub secret_id: String,
    /// When set, used as the listings API key instead of Secret Manager.
    pub api_key: Option<String>,
    pub bucket: String,
    pub object_key: String,
    pub http_timeout_ms: u64,
    pub storage_base_url: String,
    pub secret_manager_base_url: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cmc_base_url: String::from(CMC_BASE_URL),
            gcp_project: String::from(DEFAULT_GCP_PROJECT),
            secret_id: String::from(DEFAULT_SECRET_ID),
            api_key: None,
            bucket: String::from(DEFAULT_BUCKET),
            object_key: String::from(DEFAULT_OBJECT_KEY),
            http_timeout_ms: DEFAULT_TIMEOUT_MS,
            storage_base_url: String::from(GCS_BASE_URL),
            secret_manager_base_url: String::from(SECRET_MANAGER_BASE_URL),
        }
    }
}

impl PipelineConfig {
    /// Read `COINPIPE_*` variables from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup. Unset or blank values keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };
        let mut config = Self::default();

        if let Some(value) = read(ENV_CMC_BASE_URL) {
            config.cmc_base_url = value;
        }
        if let Some(value) = read(ENV_GCP_PROJECT) {
            config.gcp_project = value;
        }
        if let Some(value) = read(ENV_SECRET_ID) {
            config.secret_id = value;
        }
        config.api_key = read(ENV_CMC_API_KEY);
        if let Some(value) = read(ENV_BUCKET) {
            config.bucket = value;
        }
        if let Some(value) = read(ENV_OBJECT_KEY) {
            config.object_key = value;
        }
        if let Some(value) = read(ENV_HTTP_TIMEOUT_MS) {
            config.http_timeout_ms = parse_timeout(&value)?;
        }
        if let Some(value) = read(ENV_STORAGE_BASE_URL) {
            config.storage_base_url = value;
        }
        if let Some(value) = read(ENV_SECRET_MANAGER_BASE_URL) {
            config.secret_manager_base_url = value;
        }

        Ok(config)
    }

    pub fn object_location(&self) -> ObjectLocation {
        ObjectLocation::new(&self.bucket, &self.object_key)
    }
}

fn parse_timeout(value: &str) -> Result<u64, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidValue {
        name: ENV_HTTP_TIMEOUT_MS,
        value: value.to_owned(),
        reason: reason.to_owned(),
    };

    match value.parse::<u64>() {
        Ok(0) => Err(invalid("must be greater than zero")),
        Ok(timeout_ms) => Ok(timeout_ms),
        Err(_) => Err(invalid("expected a whole number of milliseconds")),
    }
}

impl Debug for PipelineConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("cmc_base_url", &self.cmc_base_url)
            .field("gcp_project", &self.gcp_project)
            .field("secret_id", &self.secret_id)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("bucket", &self.bucket)
            .field("object_key", &self.object_key)
            .field("http_timeout_ms", &self.http_timeout_ms)
            .field("storage_base_url", &self.storage_base_url)
            .field("secret_manager_base_url", &self.secret_manager_base_url)
            .finish()
    }
}
