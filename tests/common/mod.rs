//! Common test utilities
//!
//! - `FakeProvider` - an axum stand-in for the ImagePig endpoint
//! - `PixeldTest` - a real pixeld server on a random port

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use pixeld::{Config, ProviderConfig, Server};
use reqwest::Client;
use tokio::task::JoinHandle;

pub const TEST_API_KEY: &str = "test-key";

/// How the fake provider answers
#[derive(Debug, Clone)]
pub enum Mode {
    /// PNG-looking payload that embeds the prompt
    Echo,
    /// Non-success status with a JSON error body
    Status(u16),
    /// Success status without `image_data`
    Empty,
    /// Never answers within any reasonable timeout
    Slow,
    /// Answers like `Echo`, but only after the delay
    Delay(Duration),
}

/// Payload the fake provider returns for a prompt in `Mode::Echo`
pub fn echo_payload(prompt: &str) -> String {
    let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    bytes.extend_from_slice(prompt.as_bytes());
    BASE64.encode(bytes)
}

#[derive(Clone)]
struct FakeState {
    mode: Arc<Mutex<Mode>>,
    calls: Arc<AtomicUsize>,
}

/// Fake image generation provider on a random port
pub struct FakeProvider {
    pub addr: SocketAddr,
    state: FakeState,
    _handle: JoinHandle<()>,
}

impl FakeProvider {
    pub async fn start(mode: Mode) -> Result<Self> {
        let state = FakeState {
            mode: Arc::new(Mutex::new(mode)),
            calls: Arc::new(AtomicUsize::new(0)),
        };

        let app = Router::new()
            .route("/flux", post(fake_flux))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Ok(Self {
            addr,
            state,
            _handle: handle,
        })
    }

    pub fn url(&self) -> String {
        format!("http://{}/flux", self.addr)
    }

    pub fn set_mode(&self, mode: Mode) {
        *self.state.mode.lock().unwrap() = mode;
    }

    pub fn calls(&self) -> usize {
        self.state.calls.load(Ordering::SeqCst)
    }
}

async fn fake_flux(
    State(state): State<FakeState>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> impl IntoResponse {
    state.calls.fetch_add(1, Ordering::SeqCst);

    if headers.get("Api-Key").and_then(|v| v.to_str().ok()) != Some(TEST_API_KEY) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({"error": "invalid api key"})),
        );
    }

    let mode = state.mode.lock().unwrap().clone();
    match mode {
        Mode::Echo => {
            let prompt = body["prompt"].as_str().unwrap_or_default();
            (
                StatusCode::OK,
                Json(serde_json::json!({"image_data": echo_payload(prompt)})),
            )
        }
        Mode::Status(code) => (
            StatusCode::from_u16(code).unwrap(),
            Json(serde_json::json!({"error": "upstream failure"})),
        ),
        Mode::Empty => (StatusCode::OK, Json(serde_json::json!({"started_at": "now"}))),
        Mode::Slow => {
            tokio::time::sleep(Duration::from_secs(30)).await;
            (StatusCode::OK, Json(serde_json::json!({})))
        }
        Mode::Delay(delay) => {
            tokio::time::sleep(delay).await;
            let prompt = body["prompt"].as_str().unwrap_or_default();
            (
                StatusCode::OK,
                Json(serde_json::json!({"image_data": echo_payload(prompt)})),
            )
        }
    }
}

/// Test harness that spawns a real pixeld server on a random port
pub struct PixeldTest {
    pub addr: SocketAddr,
    pub client: Client,
    server: Arc<Server>,
    handle: Option<JoinHandle<()>>,
}

impl PixeldTest {
    /// Start a server wired to `provider_url` with the test API key
    pub async fn start(provider_url: &str) -> Result<Self> {
        Self::start_with(provider_url, Some(TEST_API_KEY), None).await
    }

    /// Start a server with full control over credential and database
    pub async fn start_with(
        provider_url: &str,
        api_key: Option<&str>,
        db_path: Option<&Path>,
    ) -> Result<Self> {
        // Find a random available port
        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        let port_addr = listener.local_addr()?;
        drop(listener);

        let config = Config {
            bind_addr: port_addr,
            db_path: db_path.map(|p| p.to_string_lossy().into_owned()),
            store_timeout_secs: 5,
            provider: ProviderConfig {
                url: provider_url.to_string(),
                api_key: api_key.map(String::from),
                timeout_secs: 2,
            },
        };

        let server = Arc::new(Server::new(config).await?);
        let addr = server.bind_addr();
        let server_clone = server.clone();

        let handle = tokio::spawn(async move {
            if let Err(e) = server_clone.run().await {
                eprintln!("Server error: {}", e);
            }
        });

        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;

        // Poll until server is ready (max 2 seconds)
        let mut ready = false;
        for _ in 0..20 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if client
                .get(format!("http://{}/health", addr))
                .send()
                .await
                .is_ok()
            {
                ready = true;
                break;
            }
        }

        if !ready {
            panic!("Server failed to start within 2 seconds");
        }

        Ok(Self {
            addr,
            client,
            server,
            handle: Some(handle),
        })
    }

    /// Get the base URL for the server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> Result<reqwest::Response> {
        Ok(self
            .client
            .get(format!("{}{}", self.base_url(), path))
            .send()
            .await?)
    }

    /// Make a POST request with JSON body
    pub async fn post<T: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<reqwest::Response> {
        Ok(self
            .client
            .post(format!("{}{}", self.base_url(), path))
            .json(body)
            .send()
            .await?)
    }

    /// Generate an image for `prompt`
    pub async fn generate(&self, prompt: &str) -> Result<reqwest::Response> {
        self.post("/generate-content", &serde_json::json!({ "prompt": prompt }))
            .await
    }

    /// Fetch the gallery as JSON
    pub async fn gallery(&self) -> Result<Vec<serde_json::Value>> {
        Ok(self.get("/images").await?.json().await?)
    }

    /// Direct access to the database pool for assertions
    pub fn pool(&self) -> sqlx::SqlitePool {
        self.server.db().pool().clone()
    }

    /// Stop the server and wait for it to close its database
    pub async fn stop(&mut self) {
        self.server.shutdown();
        if let Some(handle) = self.handle.take() {
            handle.await.ok();
        }
    }
}

impl Drop for PixeldTest {
    fn drop(&mut self) {
        self.server.shutdown();
    }
}
