//! OAuth access tokens for Google Cloud REST calls.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::OnceCell;

/// Scope covering Secret Manager and Cloud Storage.
pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// Supplies bearer tokens for Google Cloud APIs.
pub trait AccessTokenSource: Send + Sync {
    fn access_token<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<String, String>> + Send + 'a>>;
}

/// Application-default credentials resolved through `gcp_auth`.
#[derive(Default)]
pub struct GcpTokenSource {
    provider: OnceCell<Arc<dyn gcp_auth::TokenProvider>>,
}

impl GcpTokenSource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AccessTokenSource for GcpTokenSource {
    fn access_token<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<String, String>> + Send + 'a>> {
        Box::pin(async move {
            let provider = self
                .provider
                .get_or_try_init(|| async { gcp_auth::provider().await })
                .await
                .map_err(|error| format!("no Google Cloud credentials found: {error}"))?;

            let token = provider
                .token(&[CLOUD_PLATFORM_SCOPE])
                .await
                .map_err(|error| error.to_string())?;

            Ok(token.as_str().to_owned())
        })
    }
}

/// Fixed token, for emulators and tests.
#[derive(Clone)]
pub struct StaticTokenSource {
    token: String,
}

impl StaticTokenSource {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl AccessTokenSource for StaticTokenSource {
    fn access_token<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<String, String>> + Send + 'a>> {
        let token = self.token.clone();
        Box::pin(async move { Ok(token) })
    }
}
