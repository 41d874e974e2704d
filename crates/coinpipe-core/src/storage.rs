//! Object storage for the exported CSV artifact.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;

use crate::auth::AccessTokenSource;
use crate::http_client::{HttpAuth, HttpClient, HttpRequest, DEFAULT_TIMEOUT_MS};
use crate::StorageError;

pub const GCS_BASE_URL: &str = "https://storage.googleapis.com";
pub const CSV_CONTENT_TYPE: &str = "text/csv";

/// Bucket and key of one stored object.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

impl ObjectLocation {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl Display for ObjectLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "gs://{}/{}", self.bucket, self.key)
    }
}

/// Whole-object storage. `put` replaces any prior object at the location in a single write.
pub trait ObjectStore: Send + Sync {
    fn put<'a>(
        &'a self,
        location: &'a ObjectLocation,
        body: Vec<u8>,
        content_type: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), StorageError>> + Send + 'a>>;

    fn get<'a>(
        &'a self,
        location: &'a ObjectLocation,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, StorageError>> + Send + 'a>>;
}

/// Google Cloud Storage through the JSON API (simple media upload and download).
pub struct GcsObjectStore {
    base_url: String,
    http_client: Arc<dyn HttpClient>,
    tokens: Arc<dyn AccessTokenSource>,
    timeout_ms: u64,
}

impl GcsObjectStore {
    pub fn new(http_client: Arc<dyn HttpClient>, tokens: Arc<dyn AccessTokenSource>) -> Self {
        Self {
            base_url: String::from(GCS_BASE_URL),
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

    async fn bearer(&self) -> Result<HttpAuth, StorageError> {
        let token = self
            .tokens
            .access_token()
            .await
            .map_err(StorageError::Token)?;
        Ok(HttpAuth::BearerToken(token))
    }
}

impl ObjectStore for GcsObjectStore {
    fn put<'a>(
        &'a self,
        location: &'a ObjectLocation,
        body: Vec<u8>,
        content_type: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), StorageError>> + Send + 'a>> {
        Box::pin(async move {
            let auth = self.bearer().await?;
            let url = format!(
                "{}/upload/storage/v1/b/{}/o",
                self.base_url,
                urlencoding::encode(&location.bucket)
            );
            let request = HttpRequest::post(url)
                .with_query("uploadType", "media")
                .with_query("name", &location.key)
                .with_header("content-type", content_type)
                .with_auth(&auth)
                .with_body(body)
                .with_timeout_ms(self.timeout_ms);

            let response = self
                .http_client
                .execute(request)
                .await
                .map_err(StorageError::Transport)?;

            if !response.is_success() {
                return Err(StorageError::Status {
                    status: response.status,
                    location: location.to_string(),
                    message: truncate(&response.body),
                });
            }
            Ok(())
        })
    }

    fn get<'a>(
        &'a self,
        location: &'a ObjectLocation,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, StorageError>> + Send + 'a>> {
        Box::pin(async move {
            let auth = self.bearer().await?;
            let url = format!(
                "{}/storage/v1/b/{}/o/{}",
                self.base_url,
                urlencoding::encode(&location.bucket),
                urlencoding::encode(&location.key)
            );
            let request = HttpRequest::get(url)
                .with_query("alt", "media")
                .with_auth(&auth)
                .with_timeout_ms(self.timeout_ms);

            let response = self
                .http_client
                .execute(request)
                .await
                .map_err(StorageError::Transport)?;

            match response.status {
                200..=299 => Ok(response.body.into_bytes()),
                404 => Err(StorageError::NotFound {
                    location: location.to_string(),
                }),
                status => Err(StorageError::Status {
                    status,
                    location: location.to_string(),
                    message: truncate(&response.body),
                }),
            }
        })
    }
}

fn truncate(body: &str) -> String {
    const LIMIT: usize = 256;
    match body.char_indices().nth(LIMIT) {
        Some((index, _)) => format!("{}...", &body[..index]),
        None => body.to_owned(),
    }
}

/// A stored object and its declared content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub content_type: String,
}

/// Process-local store used by tests and local runs.
#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    objects: Mutex<BTreeMap<ObjectLocation, StoredObject>>,
    writes: Mutex<usize>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn object(&self, location: &ObjectLocation) -> Option<StoredObject> {
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(location)
            .cloned()
    }

    /// Number of successful `put` calls.
    pub fn write_count(&self) -> usize {
        *self.writes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn put<'a>(
        &'a self,
        location: &'a ObjectLocation,
        body: Vec<u8>,
        content_type: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), StorageError>> + Send + 'a>> {
        Box::pin(async move {
            self.objects
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(
                    location.clone(),
                    StoredObject {
                        body,
                        content_type: content_type.to_owned(),
                    },
                );
            *self.writes.lock().unwrap_or_else(PoisonError::into_inner) += 1;
            Ok(())
        })
    }

    fn get<'a>(
        &'a self,
        location: &'a ObjectLocation,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, StorageError>> + Send + 'a>> {
        let result = self
            .object(location)
            .map(|object| object.body)
            .ok_or_else(|| StorageError::NotFound {
                location: location.to_string(),
            });
        Box::pin(async move { result })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticTokenSource;
    use crate::http_client::{HttpError, HttpMethod, HttpResponse};

    struct RecordingHttpClient {
        response: Result<HttpResponse, HttpError>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl RecordingHttpClient {
        fn new(response: Result<HttpResponse, HttpError>) -> Self {
            Self {
                response,
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    impl HttpClient for RecordingHttpClient {
        fn execute<'a>(
            &'a self,
            request: HttpRequest,
        ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
            self.requests
                .lock()
                .expect("request store should not be poisoned")
                .push(request);
            let response = self.response.clone();
            Box::pin(async move { response })
        }
    }

    fn gcs(client: Arc<RecordingHttpClient>) -> GcsObjectStore {
        GcsObjectStore::new(client, Arc::new(StaticTokenSource::new("oauth-token")))
    }

    #[tokio::test]
    async fn put_issues_single_media_upload() {
        let client = Arc::new(RecordingHttpClient::new(Ok(HttpResponse::ok_json("{}"))));
        let location = ObjectLocation::new("dev-file-dump", "crypto_prices.csv");

        gcs(client.clone())
            .put(&location, b"id\n1\n".to_vec(), CSV_CONTENT_TYPE)
            .await
            .expect("upload should succeed");

        let requests = client.requests.lock().expect("lock").clone();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(
            request.url,
            "https://storage.googleapis.com/upload/storage/v1/b/dev-file-dump/o?uploadType=media&name=crypto_prices.csv"
        );
        assert_eq!(
            request.headers.get("content-type").map(String::as_str),
            Some("text/csv")
        );
        assert_eq!(request.body.as_deref(), Some(b"id\n1\n".as_slice()));
    }

    #[tokio::test]
    async fn put_surfaces_quota_failure() {
        let client = Arc::new(RecordingHttpClient::new(Ok(HttpResponse::new(
            429,
            "rate limit exceeded",
        ))));
        let location = ObjectLocation::new("dev-file-dump", "crypto_prices.csv");

        let error = gcs(client)
            .put(&location, Vec::new(), CSV_CONTENT_TYPE)
            .await
            .expect_err("must fail");
        assert!(matches!(error, StorageError::Status { status: 429, .. }));
    }

    #[tokio::test]
    async fn get_maps_missing_object_to_not_found() {
        let client = Arc::new(RecordingHttpClient::new(Ok(HttpResponse::new(404, ""))));
        let location = ObjectLocation::new("dev-file-dump", "crypto_prices.csv");

        let error = gcs(client).get(&location).await.expect_err("must fail");
        assert_eq!(
            error,
            StorageError::NotFound {
                location: String::from("gs://dev-file-dump/crypto_prices.csv")
            }
        );
    }

    #[tokio::test]
    async fn in_memory_store_overwrites_prior_object() {
        let store = InMemoryObjectStore::new();
        let location = ObjectLocation::new("bucket", "key.csv");

        store
            .put(&location, b"first".to_vec(), CSV_CONTENT_TYPE)
            .await
            .expect("put");
        store
            .put(&location, b"second".to_vec(), CSV_CONTENT_TYPE)
            .await
            .expect("put");

        assert_eq!(store.get(&location).await.expect("get"), b"second".to_vec());
        assert_eq!(store.write_count(), 2);
    }

    #[tokio::test]
    async fn in_memory_put_is_not_applied_until_polled() {
        let store = InMemoryObjectStore::new();
        let location = ObjectLocation::new("bucket", "key.csv");

        drop(store.put(&location, b"never".to_vec(), CSV_CONTENT_TYPE));

        assert_eq!(store.write_count(), 0);
        assert_eq!(store.object(&location), None);
    }
}
