//! In-process store nodes for integration tests.
//!
//! Nodes spawned from the same [`Cluster`] share one document map, the way
//! replicas of a database would. Each node counts the requests it served so
//! tests can see where the executor routed a call.
#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU64, AtomicUsize, Ordering},
    },
    time::Duration,
};

use anyhow::Result;
use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use docstore_client::{ClientConfig, HttpTransport, RequestExecutor};
use nanoid::nanoid;
use serde_json::{Value, json};
use tokio::{net::TcpListener, sync::Mutex};

pub const DATABASE: &str = "Northwind";

pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt().with_env_filter(filter).with_test_writer().try_init();
}

struct Stored {
    body: Value,
    change_vector: String,
}

#[derive(Default)]
struct Store {
    documents: Mutex<HashMap<String, Stored>>,
    version: AtomicU64,
    topology: Mutex<Option<Value>>,
}

/// Handle to a spawned node.
#[derive(Clone)]
pub struct Node {
    pub url: String,
    hits: Arc<AtomicUsize>,
}

impl Node {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Default)]
pub struct Cluster {
    store: Arc<Store>,
}

#[derive(Clone)]
struct NodeState {
    store: Arc<Store>,
    tag: String,
    delay: Duration,
    hits: Arc<AtomicUsize>,
}

impl Cluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns a node that serves documents and topology.
    pub async fn spawn_node(&self, tag: &str) -> Result<Node> {
        self.spawn_slow_node(tag, Duration::ZERO).await
    }

    /// Spawns a node that waits `delay` before handling each request.
    pub async fn spawn_slow_node(&self, tag: &str, delay: Duration) -> Result<Node> {
        let hits = Arc::new(AtomicUsize::new(0));
        let state = NodeState {
            store: Arc::clone(&self.store),
            tag: tag.to_string(),
            delay,
            hits: Arc::clone(&hits),
        };
        let app = Router::new()
            .route(
                "/databases/:database/docs",
                get(get_documents).put(put_document).delete(delete_document),
            )
            .route("/topology", get(get_topology))
            .with_state(state);
        let url = serve(app).await?;
        Ok(Node { url, hits })
    }

    /// Makes `/topology` report `nodes` (url, tag) under `etag`.
    pub async fn set_topology(&self, etag: i64, nodes: &[(&str, &str)]) {
        let nodes: Vec<Value> = nodes
            .iter()
            .map(|(url, tag)| json!({ "Url": url, "ClusterTag": tag, "Database": DATABASE }))
            .collect();
        *self.store.topology.lock().await = Some(json!({ "Etag": etag, "Nodes": nodes }));
    }

    pub async fn document_exists(&self, key: &str) -> bool {
        self.store.documents.lock().await.contains_key(key)
    }
}

/// Spawns a node that answers every request with 503.
pub async fn spawn_unavailable_node() -> Result<Node> {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    let app = Router::new().fallback(move || {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "Error": "DatabaseDisabled", "Message": "node is shutting down" })),
            )
        }
    });
    let url = serve(app).await?;
    Ok(Node { url, hits })
}

/// Url of a port nothing listens on, so connections are refused.
pub async fn dead_url() -> Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(format!("http://{addr}"))
}

pub fn executor<U: AsRef<str>>(urls: &[U]) -> Result<RequestExecutor<HttpTransport>> {
    init_tracing();
    let config = ClientConfig::new(DATABASE, urls.iter().map(|url| url.as_ref()))
        .with_request_timeout(Duration::from_secs(2));
    Ok(RequestExecutor::http(config)?)
}

async fn serve(app: Router) -> Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{addr}"))
}

impl NodeState {
    async fn enter(&self) {
        self.hits.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }

    fn next_change_vector(&self) -> String {
        let version = self.store.version.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{}:{version}-{}", self.tag, nanoid!(10))
    }
}

fn ids(params: &[(String, String)]) -> Vec<&str> {
    params
        .iter()
        .filter(|(name, _)| name == "id")
        .map(|(_, value)| value.as_str())
        .collect()
}

fn header_str<'a>(headers: &'a HeaderMap, name: header::HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn error(status: StatusCode, error: &str, message: String) -> Response {
    (status, Json(json!({ "Error": error, "Message": message }))).into_response()
}

fn with_metadata(key: &str, stored: &Stored) -> Value {
    let mut body = stored.body.clone();
    if let Some(fields) = body.as_object_mut() {
        fields.insert(
            "@metadata".to_string(),
            json!({ "@id": key, "@change-vector": stored.change_vector }),
        );
    }
    body
}

async fn put_document(
    State(node): State<NodeState>,
    Query(params): Query<Vec<(String, String)>>,
    headers: HeaderMap,
    Json(mut body): Json<Value>,
) -> Response {
    node.enter().await;
    let Some(key) = ids(&params).first().map(|key| key.to_string()) else {
        return error(StatusCode::BAD_REQUEST, "BadRequest", "missing id".to_string());
    };

    let mut documents = node.store.documents.lock().await;
    if let Some(expected) = header_str(&headers, header::IF_MATCH) {
        let actual = documents.get(&key).map(|stored| stored.change_vector.clone());
        if actual.as_deref() != Some(expected) {
            return (
                StatusCode::CONFLICT,
                Json(json!({
                    "Error": "ConcurrencyException",
                    "Message": format!("PUT attempted on document '{key}' using a non current change vector"),
                    "ActualChangeVector": actual,
                })),
            )
                .into_response();
        }
    }

    if let Some(fields) = body.as_object_mut() {
        fields.remove("@metadata");
    }
    let change_vector = node.next_change_vector();
    documents.insert(
        key.clone(),
        Stored {
            body,
            change_vector: change_vector.clone(),
        },
    );

    (
        StatusCode::CREATED,
        Json(json!({ "Results": [{ "Id": key, "ChangeVector": change_vector }] })),
    )
        .into_response()
}

// Also serves HEAD: axum routes HEAD to the GET handler and drops the body.
async fn get_documents(
    State(node): State<NodeState>,
    Query(params): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> Response {
    node.enter().await;
    let keys = ids(&params);
    let documents = node.store.documents.lock().await;

    if let [key] = keys.as_slice() {
        let Some(stored) = documents.get(*key) else {
            return StatusCode::NOT_FOUND.into_response();
        };
        if header_str(&headers, header::IF_NONE_MATCH) == Some(stored.change_vector.as_str()) {
            return StatusCode::NOT_MODIFIED.into_response();
        }
        let mut response = Json(json!({ "Results": [with_metadata(key, stored)] })).into_response();
        if let Ok(etag) = HeaderValue::from_str(&format!("\"{}\"", stored.change_vector)) {
            response.headers_mut().insert(header::ETAG, etag);
        }
        return response;
    }

    let results: Vec<Value> = keys
        .iter()
        .map(|key| {
            documents
                .get(*key)
                .map_or(Value::Null, |stored| with_metadata(key, stored))
        })
        .collect();
    Json(json!({ "Results": results })).into_response()
}

async fn delete_document(
    State(node): State<NodeState>,
    Query(params): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> Response {
    node.enter().await;
    let Some(key) = ids(&params).first().map(|key| key.to_string()) else {
        return error(StatusCode::BAD_REQUEST, "BadRequest", "missing id".to_string());
    };

    let mut documents = node.store.documents.lock().await;
    let Some(stored) = documents.get(&key) else {
        return error(
            StatusCode::NOT_FOUND,
            "DocumentDoesNotExist",
            format!("document '{key}' does not exist"),
        );
    };

    if let Some(expected) = header_str(&headers, header::IF_MATCH) {
        if expected != stored.change_vector {
            // Older servers spell the field with a lower-case 'c'.
            return (
                StatusCode::CONFLICT,
                Json(json!({
                    "Error": "ConcurrencyException",
                    "Message": format!(
                        "DELETE attempted on document '{key}' using a non current change vector. Expected: {expected}"
                    ),
                    "ActualchangeVector": stored.change_vector,
                })),
            )
                .into_response();
        }
    }

    documents.remove(&key);
    StatusCode::NO_CONTENT.into_response()
}

async fn get_topology(State(node): State<NodeState>) -> Response {
    node.enter().await;
    match node.store.topology.lock().await.clone() {
        Some(topology) => Json(topology).into_response(),
        None => error(
            StatusCode::NOT_FOUND,
            "DatabaseDoesNotExist",
            "no topology configured".to_string(),
        ),
    }
}
