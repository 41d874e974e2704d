//! Behavior-driven tests for the fetch cycle
//!
//! These tests verify HOW one run moves from credential to stored CSV,
//! and that every failure leaves the stored object untouched.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use coinpipe_core::{
    column_names, CoinMarketCapSource, CredentialError, FetchError, FetchJob, HttpClient,
    HttpError, HttpRequest, HttpResponse, InMemoryObjectStore, ObjectLocation, ObjectStore,
    PipelineError, SecretStore, StaticSecretStore, StorageError, Task, TaskError, TaskStatus,
    UtcDateTime, Workflow, CSV_CONTENT_TYPE,
};
use serde_json::{json, Value};

// =============================================================================
// Fixtures
// =============================================================================

struct ScriptedHttpClient {
    responses: Mutex<VecDeque<Result<HttpResponse, HttpError>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedHttpClient {
    fn new(responses: Vec<Result<HttpResponse, HttpError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn listings(data: Value) -> Arc<Self> {
        let body = json!({"status": {"error_code": 0, "error_message": null}, "data": data});
        Self::new(vec![Ok(HttpResponse::ok_json(body.to_string()))])
    }

    fn request_count(&self) -> usize {
        self.requests.lock().expect("requests lock").len()
    }
}

impl HttpClient for ScriptedHttpClient {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        self.requests.lock().expect("requests lock").push(request);
        let response = self
            .responses
            .lock()
            .expect("responses lock")
            .pop_front()
            .unwrap_or_else(|| Err(HttpError::connect("no scripted response left")));
        Box::pin(async move { response })
    }
}

struct DeniedSecretStore {
    calls: AtomicUsize,
}

impl SecretStore for DeniedSecretStore {
    fn access_latest<'a>(
        &'a self,
        secret_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, CredentialError>> + Send + 'a>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            Err(CredentialError::PermissionDenied {
                secret_id: secret_id.to_owned(),
            })
        })
    }
}

/// Rejects every write the way GCS answers an exhausted quota.
struct RejectingObjectStore {
    attempts: AtomicUsize,
}

impl ObjectStore for RejectingObjectStore {
    fn put<'a>(
        &'a self,
        location: &'a ObjectLocation,
        _body: Vec<u8>,
        _content_type: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), StorageError>> + Send + 'a>> {
        Box::pin(async move {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(StorageError::Status {
                status: 429,
                location: location.to_string(),
                message: String::from("rate limit exceeded"),
            })
        })
    }

    fn get<'a>(
        &'a self,
        location: &'a ObjectLocation,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, StorageError>> + Send + 'a>> {
        Box::pin(async move {
            Err(StorageError::NotFound {
                location: location.to_string(),
            })
        })
    }
}

fn location() -> ObjectLocation {
    ObjectLocation::new("dev-file-dump", "crypto_prices.csv")
}

fn job(
    secrets: Arc<dyn SecretStore>,
    http: Arc<ScriptedHttpClient>,
    store: Arc<InMemoryObjectStore>,
) -> FetchJob {
    FetchJob::new(
        secrets,
        "coinmarketcap_api_key",
        CoinMarketCapSource::new(http),
        store,
        location(),
    )
}

fn api_key() -> Arc<dyn SecretStore> {
    Arc::new(StaticSecretStore::new("cmc-key-123"))
}

fn bitcoin() -> Value {
    json!({
        "id": 1,
        "name": "Bitcoin",
        "symbol": "BTC",
        "slug": "bitcoin",
        "cmc_rank": 1,
        "num_market_pairs": 100,
        "circulating_supply": 19000000,
        "total_supply": 19000000,
        "max_supply": 21000000,
        "quote": {"USD": {
            "price": 65000.5,
            "volume_24h": 30000000000_u64,
            "percent_change_1h": 0.1,
            "percent_change_24h": -1.2,
            "percent_change_7d": 3.4,
            "market_cap": 1235000000000_u64
        }},
        "last_updated": "2025-01-01T00:00:00.000Z"
    })
}

fn stored_csv(store: &InMemoryObjectStore) -> String {
    let object = store.object(&location()).expect("object should be stored");
    String::from_utf8(object.body).expect("utf-8 csv")
}

async fn seed_previous_object(store: &InMemoryObjectStore) {
    store
        .put(&location(), b"previous run".to_vec(), CSV_CONTENT_TYPE)
        .await
        .expect("seed");
}

// =============================================================================
// Fetch cycle: success
// =============================================================================

#[tokio::test]
async fn when_api_returns_bitcoin_the_csv_matches_the_published_layout() {
    // Given: The listings endpoint returns a single Bitcoin listing
    let http = ScriptedHttpClient::listings(json!([bitcoin()]));
    let store = Arc::new(InMemoryObjectStore::new());

    // When: One fetch cycle runs
    let report = job(api_key(), http.clone(), store.clone())
        .run()
        .await
        .expect("run should succeed");

    // Then: Exactly one CSV object with header and one data row is written
    assert_eq!(report.row_count, 1);
    assert_eq!(report.bucket, "dev-file-dump");
    assert_eq!(report.object_key, "crypto_prices.csv");
    assert_eq!(store.write_count(), 1);
    assert_eq!(http.request_count(), 1);

    let object = store.object(&location()).expect("stored");
    assert_eq!(object.content_type, "text/csv");
    assert_eq!(report.bytes, object.body.len());

    let csv = stored_csv(&store);
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(
        lines[0],
        "id,name,symbol,slug,cmc_rank,num_market_pairs,circulating_supply,total_supply,\
max_supply,price_usd,volume_24h_usd,percent_change_1h,percent_change_24h,percent_change_7d,\
market_cap_usd,last_updated,retrieved_timestamp"
    );
    assert_eq!(
        lines[1],
        format!(
            "1,Bitcoin,BTC,bitcoin,1,100,19000000.0,19000000.0,21000000.0,65000.5,\
30000000000.0,0.1,-1.2,3.4,1235000000000.0,2025-01-01T00:00:00Z,{}",
            report.retrieved_at
        )
    );

    // And: The retrieved timestamp is a fresh UTC instant
    let retrieved = UtcDateTime::parse(&report.retrieved_at).expect("rfc3339");
    assert!(retrieved.into_inner().year() >= 2025);
    assert!(report.retrieved_at.ends_with('Z'));
}

#[tokio::test]
async fn when_api_returns_many_listings_rows_keep_api_order_and_share_one_timestamp() {
    // Given: Three listings in a fixed API order
    let mut ethereum = bitcoin();
    ethereum["id"] = json!(1027);
    ethereum["symbol"] = json!("ETH");
    let mut tether = bitcoin();
    tether["id"] = json!(825);
    tether["max_supply"] = Value::Null;
    let http = ScriptedHttpClient::listings(json!([bitcoin(), ethereum, tether]));
    let store = Arc::new(InMemoryObjectStore::new());

    // When: The cycle runs
    job(api_key(), http, store.clone()).run().await.expect("run");

    // Then: Rows appear in API order, all with the same retrieved timestamp
    let csv = stored_csv(&store);
    let rows: Vec<Vec<&str>> = csv.lines().skip(1).map(|line| line.split(',').collect()).collect();
    assert_eq!(rows.len(), 3);
    let ids: Vec<&str> = rows.iter().map(|row| row[0]).collect();
    assert_eq!(ids, vec!["1", "1027", "825"]);

    let timestamps: Vec<&str> = rows.iter().map(|row| row[16]).collect();
    assert!(timestamps.iter().all(|ts| *ts == timestamps[0]));

    // And: The null max_supply becomes an empty field
    assert_eq!(rows[2][8], "");
    assert_eq!(rows[2].len(), column_names().len());
}

#[tokio::test]
async fn when_api_returns_no_listings_a_header_only_csv_is_written() {
    // Given: An empty data array
    let http = ScriptedHttpClient::listings(json!([]));
    let store = Arc::new(InMemoryObjectStore::new());

    // When: The cycle runs
    let report = job(api_key(), http, store.clone()).run().await.expect("run");

    // Then: The object holds only the header
    assert_eq!(report.row_count, 0);
    assert_eq!(stored_csv(&store), format!("{}\n", column_names().join(",")));
}

// =============================================================================
// Fetch cycle: all-or-nothing failures
// =============================================================================

#[tokio::test]
async fn when_a_listing_lacks_id_the_run_fails_and_nothing_is_written() {
    // Given: A previous object and a response where one listing has no id
    let mut broken = bitcoin();
    broken.as_object_mut().expect("object").remove("id");
    let http = ScriptedHttpClient::listings(json!([bitcoin(), broken]));
    let store = Arc::new(InMemoryObjectStore::new());
    seed_previous_object(&store).await;

    // When: The cycle runs
    let error = job(api_key(), http, store.clone())
        .run()
        .await
        .expect_err("missing id must fail");

    // Then: A schema error names the listing, and the old object is intact
    let PipelineError::Schema(schema) = &error else {
        panic!("expected schema error, got {error:?}");
    };
    assert_eq!(schema.index(), 1);
    assert_eq!(schema.decode_error().field(), Some("id"));
    assert_eq!(error.code(), "pipeline.schema");
    assert_eq!(store.write_count(), 1);
    assert_eq!(stored_csv(&store), "previous run");
}

#[tokio::test]
async fn when_transport_fails_the_error_surfaces_and_nothing_is_written() {
    // Given: The network times out
    let http = ScriptedHttpClient::new(vec![Err(HttpError::timeout("request timeout"))]);
    let store = Arc::new(InMemoryObjectStore::new());
    seed_previous_object(&store).await;

    // When: The cycle runs
    let error = job(api_key(), http, store.clone())
        .run()
        .await
        .expect_err("transport failure must fail the run");

    // Then: The fetch failure is reported instead of being swallowed
    assert!(matches!(
        error,
        PipelineError::Fetch(FetchError::Transport(_))
    ));
    assert_eq!(error.code(), "pipeline.network");
    assert_eq!(stored_csv(&store), "previous run");
}

#[tokio::test]
async fn when_the_upload_is_rejected_the_run_fails_as_upload_error() {
    // Given: A valid listing and a store that refuses writes
    let http = ScriptedHttpClient::listings(json!([bitcoin()]));
    let store = Arc::new(RejectingObjectStore {
        attempts: AtomicUsize::new(0),
    });
    let job = FetchJob::new(
        api_key(),
        "coinmarketcap_api_key",
        CoinMarketCapSource::new(http.clone()),
        store.clone(),
        location(),
    );

    // When: The cycle runs
    let error = job.run().await.expect_err("upload failure must fail the run");

    // Then: The storage failure surfaces after exactly one attempt, with no retry
    assert!(matches!(
        error,
        PipelineError::Upload(StorageError::Status { status: 429, .. })
    ));
    assert_eq!(error.code(), "pipeline.upload");
    assert_eq!(store.attempts.load(Ordering::SeqCst), 1);
    assert_eq!(http.request_count(), 1);
}

#[tokio::test]
async fn when_api_rejects_the_key_the_status_is_reported() {
    // Given: The endpoint answers 401 with an error message
    let http = ScriptedHttpClient::new(vec![Ok(HttpResponse::new(
        401,
        r#"{"status":{"error_code":1001,"error_message":"This API Key is invalid."}}"#,
    ))]);
    let store = Arc::new(InMemoryObjectStore::new());

    // When: The cycle runs
    let error = job(api_key(), http, store.clone()).run().await.expect_err("must fail");

    // Then: The status and upstream message are reported, nothing is written
    assert!(error.to_string().contains("401"));
    assert!(error.to_string().contains("This API Key is invalid."));
    assert_eq!(store.write_count(), 0);
}

#[tokio::test]
async fn when_secret_access_is_denied_no_http_call_is_made() {
    // Given: The secret store refuses access
    let secrets = Arc::new(DeniedSecretStore {
        calls: AtomicUsize::new(0),
    });
    let http = ScriptedHttpClient::listings(json!([bitcoin()]));
    let store = Arc::new(InMemoryObjectStore::new());

    // When: The cycle runs
    let error = job(secrets.clone(), http.clone(), store.clone())
        .run()
        .await
        .expect_err("must fail");

    // Then: The run stops before the network is touched
    assert!(matches!(
        error,
        PipelineError::Credential(CredentialError::PermissionDenied { .. })
    ));
    assert_eq!(secrets.calls.load(Ordering::SeqCst), 1);
    assert_eq!(http.request_count(), 0);
    assert_eq!(store.write_count(), 0);
}

#[tokio::test]
async fn when_secret_is_blank_the_run_fails_as_credential_error() {
    // Given: The secret resolves to whitespace
    let http = ScriptedHttpClient::listings(json!([bitcoin()]));
    let store = Arc::new(InMemoryObjectStore::new());

    // When: The cycle runs
    let error = job(Arc::new(StaticSecretStore::new("  ")), http.clone(), store.clone())
        .run()
        .await
        .expect_err("must fail");

    // Then: It is a credential failure and nothing downstream ran
    assert!(matches!(
        error,
        PipelineError::Credential(CredentialError::Empty { .. })
    ));
    assert_eq!(http.request_count(), 0);
    assert_eq!(store.write_count(), 0);
}

// =============================================================================
// Workflow: fetch then downstream
// =============================================================================

struct CountingTask {
    calls: AtomicUsize,
}

impl Task for CountingTask {
    fn name(&self) -> &str {
        "downstream"
    }

    fn run<'a>(&'a self) -> Pin<Box<dyn Future<Output = Result<Value, TaskError>> + Send + 'a>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async { Ok(json!({})) })
    }
}

#[tokio::test]
async fn when_fetch_succeeds_the_downstream_task_runs() {
    // Given: A workflow of fetch followed by a downstream task
    let http = ScriptedHttpClient::listings(json!([bitcoin()]));
    let store = Arc::new(InMemoryObjectStore::new());
    let downstream = Arc::new(CountingTask {
        calls: AtomicUsize::new(0),
    });
    let workflow = Workflow::new("coinmarketcap")
        .then(Arc::new(job(api_key(), http, store)))
        .then(downstream.clone());

    // When: The workflow runs
    let report = workflow.run().await;

    // Then: Both tasks succeed and the fetch output carries the run report
    assert!(report.is_success());
    assert_eq!(downstream.calls.load(Ordering::SeqCst), 1);
    let output = report.tasks[0].output.as_ref().expect("fetch output");
    assert_eq!(output["row_count"], 1);
}

#[tokio::test]
async fn when_fetch_fails_the_downstream_task_is_skipped() {
    // Given: A fetch that will time out
    let http = ScriptedHttpClient::new(vec![Err(HttpError::timeout("request timeout"))]);
    let store = Arc::new(InMemoryObjectStore::new());
    let downstream = Arc::new(CountingTask {
        calls: AtomicUsize::new(0),
    });
    let workflow = Workflow::new("coinmarketcap")
        .then(Arc::new(job(api_key(), http, store)))
        .then(downstream.clone());

    // When: The workflow runs
    let report = workflow.run().await;

    // Then: The fetch is failed, the downstream task never ran
    assert!(!report.is_success());
    assert_eq!(report.tasks[0].status, TaskStatus::Failed);
    assert!(report.tasks[0]
        .error
        .as_deref()
        .is_some_and(|message| message.starts_with("pipeline.network")));
    assert_eq!(report.tasks[1].status, TaskStatus::Skipped);
    assert_eq!(downstream.calls.load(Ordering::SeqCst), 0);
}
