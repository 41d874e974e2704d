//! One fetch cycle: credential, fetch, normalize, export.
//!
//! Each stage hands its output to the next by return value. Any failure ends
//! the run before the upload, so the stored object is either fully replaced or
//! left untouched.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::auth::{AccessTokenSource, GcpTokenSource};
use crate::config::PipelineConfig;
use crate::export::upload_table;
use crate::http_client::{HttpClient, ReqwestHttpClient};
use crate::normalize::normalize;
use crate::secrets::{SecretManagerStore, SecretStore, StaticSecretStore};
use crate::source::CoinMarketCapSource;
use crate::storage::{GcsObjectStore, ObjectLocation, ObjectStore};
use crate::{CredentialError, PipelineError, UtcDateTime};

/// Summary of a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub row_count: usize,
    pub bucket: String,
    pub object_key: String,
    pub retrieved_at: String,
    pub bytes: usize,
}

/// Owns the collaborators of a fetch cycle.
#[derive(Clone)]
pub struct FetchJob {
    secrets: Arc<dyn SecretStore>,
    secret_id: String,
    source: CoinMarketCapSource,
    store: Arc<dyn ObjectStore>,
    location: ObjectLocation,
}

impl FetchJob {
    pub fn new(
        secrets: Arc<dyn SecretStore>,
        secret_id: impl Into<String>,
        source: CoinMarketCapSource,
        store: Arc<dyn ObjectStore>,
        location: ObjectLocation,
    ) -> Self {
        Self {
            secrets,
            secret_id: secret_id.into(),
            source,
            store,
            location,
        }
    }

    /// Wire production collaborators: reqwest, application-default credentials,
    /// Secret Manager (unless an API key is configured) and Cloud Storage.
    pub fn from_config(config: &PipelineConfig) -> Self {
        let http_client: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new());
        let tokens: Arc<dyn AccessTokenSource> = Arc::new(GcpTokenSource::new());

        let secrets: Arc<dyn SecretStore> = match &config.api_key {
            Some(api_key) => Arc::new(StaticSecretStore::new(api_key.clone())),
            None => Arc::new(
                SecretManagerStore::new(
                    config.gcp_project.clone(),
                    Arc::clone(&http_client),
                    Arc::clone(&tokens),
                )
                .with_base_url(config.secret_manager_base_url.clone())
                .with_timeout_ms(config.http_timeout_ms),
            ),
        };

        let source = CoinMarketCapSource::new(Arc::clone(&http_client))
            .with_base_url(config.cmc_base_url.clone())
            .with_timeout_ms(config.http_timeout_ms);

        let store = Arc::new(
            GcsObjectStore::new(http_client, tokens)
                .with_base_url(config.storage_base_url.clone())
                .with_timeout_ms(config.http_timeout_ms),
        );

        Self::new(
            secrets,
            config.secret_id.clone(),
            source,
            store,
            config.object_location(),
        )
    }

    pub fn location(&self) -> &ObjectLocation {
        &self.location
    }

    pub fn object_store(&self) -> Arc<dyn ObjectStore> {
        Arc::clone(&self.store)
    }

    /// Execute one fetch cycle under a fresh run id.
    pub async fn run(&self) -> Result<RunReport, PipelineError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("fetch_job", %run_id);
        self.run_stages(run_id).instrument(span).await
    }

    async fn run_stages(&self, run_id: Uuid) -> Result<RunReport, PipelineError> {
        info!(secret_id = %self.secret_id, "starting fetch cycle");

        let api_key = self.secrets.access_latest(&self.secret_id).await?;
        if api_key.trim().is_empty() {
            return Err(CredentialError::Empty {
                secret_id: self.secret_id.clone(),
            }
            .into());
        }

        let raw_listings = self.source.fetch_latest(api_key.trim()).await?;
        let retrieved_at = UtcDateTime::now();
        info!(listings = raw_listings.len(), "fetched latest listings");

        let table = normalize(&raw_listings, retrieved_at)?;
        let bytes = upload_table(self.store.as_ref(), &self.location, &table).await?;

        info!(rows = table.len(), bytes, "fetch cycle complete");
        Ok(RunReport {
            run_id,
            row_count: table.len(),
            bucket: self.location.bucket.clone(),
            object_key: self.location.key.clone(),
            retrieved_at: retrieved_at.format_rfc3339(),
            bytes,
        })
    }
}
