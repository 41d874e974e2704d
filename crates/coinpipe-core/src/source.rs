//! CoinMarketCap listings endpoint.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error};

use crate::http_client::{HttpAuth, HttpClient, HttpRequest, DEFAULT_TIMEOUT_MS};
use crate::{FetchError, RawListing, QUOTE_CURRENCY};

pub const CMC_BASE_URL: &str = "https://pro-api.coinmarketcap.com";
pub const LISTINGS_LATEST_PATH: &str = "/v1/cryptocurrency/listings/latest";
pub const API_KEY_HEADER: &str = "X-CMC_PRO_API_KEY";

/// Fixed query sent with every listings call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingsQuery {
    pub start: u32,
    pub limit: u32,
    pub convert: String,
}

impl Default for ListingsQuery {
    fn default() -> Self {
        Self {
            start: 1,
            limit: 5000,
            convert: String::from(QUOTE_CURRENCY),
        }
    }
}

/// Single-shot client for `listings/latest`.
#[derive(Clone)]
pub struct CoinMarketCapSource {
    base_url: String,
    query: ListingsQuery,
    http_client: Arc<dyn HttpClient>,
    timeout_ms: u64,
}

impl CoinMarketCapSource {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            base_url: String::from(CMC_BASE_URL),
            query: ListingsQuery::default(),
            http_client,
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

    pub fn query(&self) -> &ListingsQuery {
        &self.query
    }

    /// Perform one GET and return the `data` array in API order.
    pub async fn fetch_latest(&self, api_key: &str) -> Result<Vec<RawListing>, FetchError> {
        if api_key.trim().is_empty() {
            return Err(FetchError::EmptyCredential);
        }

        let request = HttpRequest::get(format!("{}{LISTINGS_LATEST_PATH}", self.base_url))
            .with_query("start", &self.query.start.to_string())
            .with_query("limit", &self.query.limit.to_string())
            .with_query("convert", &self.query.convert)
            .with_header("Accepts", "application/json")
            .with_auth(&HttpAuth::Header {
                name: String::from(API_KEY_HEADER),
                value: api_key.to_owned(),
            })
            .with_timeout_ms(self.timeout_ms);

        debug!(url = %request.url, "requesting latest listings");

        let response = self.http_client.execute(request).await.map_err(|e| {
            error!(kind = ?e.kind(), error = %e, "listings request failed");
            FetchError::Transport(e)
        })?;

        if !response.is_success() {
            let message = upstream_error_message(&response.body)
                .unwrap_or_else(|| String::from("no error message in response"));
            error!(status = response.status, %message, "listings endpoint rejected request");
            return Err(FetchError::Status {
                status: response.status,
                message,
            });
        }

        parse_listings(&response.body)
    }
}

#[derive(Debug, Deserialize)]
struct ListingsEnvelope {
    data: Option<Value>,
    status: Option<ApiStatus>,
}

#[derive(Debug, Deserialize)]
struct ApiStatus {
    error_message: Option<String>,
}

fn parse_listings(body: &str) -> Result<Vec<RawListing>, FetchError> {
    let envelope: ListingsEnvelope = serde_json::from_str(body)
        .map_err(|e| FetchError::MalformedPayload(format!("invalid JSON body: {e}")))?;

    match envelope.data {
        Some(Value::Array(listings)) => Ok(listings),
        Some(_) => Err(FetchError::MalformedPayload(String::from(
            "'data' is not an array",
        ))),
        None => Err(FetchError::MalformedPayload(String::from(
            "response has no 'data' field",
        ))),
    }
}

fn upstream_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ListingsEnvelope>(body)
        .ok()?
        .status?
        .error_message
        .filter(|message| !message.trim().is_empty())
}
