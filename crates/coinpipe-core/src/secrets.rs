//! API credential lookup.
//!
//! The listings API key lives in Google Secret Manager. [`SecretManagerStore`]
//! reads the latest version over REST; [`StaticSecretStore`] serves a key that
//! was supplied directly (for example through `COINPIPE_CMC_API_KEY`).

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use base64::Engine;
use serde::Deserialize;

use crate::auth::AccessTokenSource;
use crate::http_client::{HttpAuth, HttpClient, HttpRequest, DEFAULT_TIMEOUT_MS};
use crate::CredentialError;

pub const SECRET_MANAGER_BASE_URL: &str = "https://secretmanager.googleapis.com";

/// Project-scoped secret lookup.
pub trait SecretStore: Send + Sync {
    /// Return the latest version of `secret_id`, UTF-8 decoded.
    fn access_latest<'a>(
        &'a self,
        secret_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, CredentialError>> + Send + 'a>>;
}

/// Google Secret Manager over its v1 REST API.
pub struct SecretManagerStore {
    project_id: String,
    base_url: String,
    http_client: Arc<dyn HttpClient>,
    tokens: Arc<dyn AccessTokenSource>,
    timeout_ms: u64,
}

impl SecretManagerStore {
    pub fn new(
        project_id: impl Into<String>,
        http_client: Arc<dyn HttpClient>,
        tokens: Arc<dyn AccessTokenSource>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            base_url: String::from(SECRET_MANAGER_BASE_URL),
            http_client,
            tokens,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    fn version_url(&self, secret_id: &str) -> String {
        format!(
            "{}/v1/projects/{}/secrets/{}/versions/latest:access",
            self.base_url,
            urlencoding::encode(&self.project_id),
            urlencoding::encode(secret_id)
        )
    }
}

impl SecretStore for SecretManagerStore {
    fn access_latest<'a>(
        &'a self,
        secret_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, CredentialError>> + Send + 'a>> {
        Box::pin(async move {
            let token = self
                .tokens
                .access_token()
                .await
                .map_err(CredentialError::Token)?;

            let request = HttpRequest::get(self.version_url(secret_id))
                .with_auth(&HttpAuth::BearerToken(token))
                .with_timeout_ms(self.timeout_ms);

            let response = self.http_client.execute(request).await.map_err(|error| {
                CredentialError::Unavailable {
                    secret_id: secret_id.to_owned(),
                    message: error.message().to_owned(),
                }
            })?;

            match response.status {
                200..=299 => decode_payload(secret_id, &response.body),
                401 | 403 => Err(CredentialError::PermissionDenied {
                    secret_id: secret_id.to_owned(),
                }),
                status => Err(CredentialError::Unavailable {
                    secret_id: secret_id.to_owned(),
                    message: format!("secret manager returned status {status}"),
                }),
            }
        })
    }
}

#[derive(Debug, Deserialize)]
struct AccessSecretVersionResponse {
    payload: SecretPayload,
}

#[derive(Debug, Deserialize)]
struct SecretPayload {
    data: String,
}

fn decode_payload(secret_id: &str, body: &str) -> Result<String, CredentialError> {
    let undecodable = |message: String| CredentialError::Undecodable {
        secret_id: secret_id.to_owned(),
        message,
    };

    let response: AccessSecretVersionResponse =
        serde_json::from_str(body).map_err(|error| undecodable(error.to_string()))?;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(response.payload.data.as_bytes())
        .map_err(|error| undecodable(error.to_string()))?;

    String::from_utf8(bytes).map_err(|error| undecodable(error.to_string()))
}

/// Serves one credential supplied up front.
#[derive(Clone)]
pub struct StaticSecretStore {
    value: String,
}

impl StaticSecretStore {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

impl SecretStore for StaticSecretStore {
    fn access_latest<'a>(
        &'a self,
        _secret_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, CredentialError>> + Send + 'a>> {
        let value = self.value.clone();
        Box::pin(async move { Ok(value) })
    }
}
