#![allow(dead_code)]

use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use futures::StreamExt;
use tower::ServiceExt;

use instance_lookup_service::config::ScopeConfig;
use instance_lookup_service::database::{
    DatabaseError, InstanceRow, InstanceSource, LookupQuery, RowStream,
};
use instance_lookup_service::state::AppState;

pub const REQUIRED_SCOPE: &str = "bim:read";

/// One row handed out by the fake store
#[derive(Clone, Debug)]
pub enum FakeRow {
    Payload(&'static str),
    Unreadable,
    FetchError,
}

/// In-memory store recording how it was used
pub struct FakeSource {
    rows: Option<Vec<FakeRow>>,
    calls: AtomicUsize,
    rows_read: Arc<AtomicUsize>,
    last_query: Mutex<Option<LookupQuery>>,
}

impl FakeSource {
    pub fn with_rows(rows: Vec<FakeRow>) -> Arc<Self> {
        Arc::new(Self {
            rows: Some(rows),
            calls: AtomicUsize::new(0),
            rows_read: Arc::new(AtomicUsize::new(0)),
            last_query: Mutex::new(None),
        })
    }

    /// A store whose query call itself fails
    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            rows: None,
            calls: AtomicUsize::new(0),
            rows_read: Arc::new(AtomicUsize::new(0)),
            last_query: Mutex::new(None),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn rows_read(&self) -> usize {
        self.rows_read.load(Ordering::SeqCst)
    }

    pub fn last_query(&self) -> Option<LookupQuery> {
        self.last_query.lock().unwrap().clone()
    }
}

#[async_trait]
impl InstanceSource for FakeSource {
    async fn query_instances<'a>(&'a self, query: &'a LookupQuery) -> Result<RowStream<'a>, DatabaseError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_query.lock().unwrap() = Some(query.clone());

        let rows = self
            .rows
            .clone()
            .ok_or_else(|| DatabaseError::Cancelled("connection refused".to_string()))?;

        let rows_read = Arc::clone(&self.rows_read);
        let stream = futures::stream::iter(rows)
            .inspect(move |_| {
                rows_read.fetch_add(1, Ordering::SeqCst);
            })
            .map(|row| match row {
                FakeRow::Payload(text) => Ok(InstanceRow::new(text)),
                FakeRow::Unreadable => Ok(InstanceRow::unreadable(DatabaseError::Cancelled(
                    "column could not be read".to_string(),
                ))),
                FakeRow::FetchError => Err(DatabaseError::Cancelled("cursor closed".to_string())),
            });
        Ok(stream.boxed())
    }
}

pub fn test_app(source: Arc<FakeSource>) -> Router {
    instance_lookup_service::app(
        AppState::new(source),
        Arc::new(ScopeConfig::with_value(REQUIRED_SCOPE)),
    )
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("response body is JSON")
    }
}

pub async fn send(app: Router, request: Request<Body>) -> TestResponse {
    let response = app.oneshot(request).await.expect("router is infallible");
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body can be read");
    TestResponse { status, headers, body }
}

/// GET `uri`, optionally with a scope header
pub fn get(uri: &str, scopes: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(scopes) = scopes {
        builder = builder.header("X-Authenticated-Scope", scopes);
    }
    builder.body(Body::empty()).unwrap()
}

/// In-memory sink for formatted `tracing` output
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    /// Route events on the current thread into this capture until the guard drops
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let sink = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(move || sink.clone())
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// The built service binary running on a free port
pub struct TestServer {
    pub base_url: String,
    child: Child,
}

impl TestServer {
    pub fn spawn() -> Result<Self> {
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let child = Command::new(env!("CARGO_BIN_EXE_instance-lookup-service"))
            .env("HTTP_LISTEN_ADDRESS", "127.0.0.1")
            .env("HTTP_LISTEN_PORT", port.to_string())
            .env("SCOPE_VALUE", REQUIRED_SCOPE)
            .env_remove("SCOPE_FILE_PATH")
            .env_remove("DATABASE_URL")
            .env("PG_HOST", "127.0.0.1")
            .env("PG_PORT", "1")
            .env("DATABASE_ACQUIRE_TIMEOUT", "2")
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .context("failed to spawn server binary")?;

        Ok(Self { base_url, child })
    }

    pub async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            let url = format!("{}/ping", self.base_url);
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status() == reqwest::StatusCode::NO_CONTENT {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
