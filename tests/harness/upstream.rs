//! Upstream - stub third-party APIs
//!
//! Serves an OpenAI-compatible `/v1/chat/completions` and an image inference
//! endpoint at `/models/flux`. Behaviour is steered by the request content:
//!
//! - completion: replies `echo: <last message>`; a last message containing
//!   `fail` gets a 500, one containing `silent` gets `content: null`
//! - inference: wrong bearer token gets a 401; prompts containing `stall`
//!   never answer in time, `broken` gets a 503; otherwise PNG bytes

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub const COMPLETION_API_KEY: &str = "test-completion-key";
pub const IMAGE_API_KEY: &str = "test-image-key";
pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nfake-image";

/// Delay applied to every completion so concurrent requests overlap
const COMPLETION_DELAY: Duration = Duration::from_millis(30);

#[derive(Clone, Default)]
struct Recorded {
    completions: Arc<Mutex<Vec<Value>>>,
    inferences: Arc<Mutex<Vec<Value>>>,
}

/// Running stub server
pub struct Upstream {
    pub addr: SocketAddr,
    recorded: Recorded,
    _handle: JoinHandle<()>,
}

impl Upstream {
    /// Start the stub on a random port
    pub async fn start() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let recorded = Recorded::default();

        let app = Router::new()
            .route("/v1/chat/completions", post(completions))
            .route("/models/flux", post(inference))
            .with_state(recorded.clone());

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("Upstream stub error: {}", e);
            }
        });

        Ok(Self {
            addr,
            recorded,
            _handle: handle,
        })
    }

    /// Base URL for the completion API
    pub fn completion_base_url(&self) -> String {
        format!("http://{}/v1", self.addr)
    }

    /// URL of the image inference endpoint
    pub fn image_api_url(&self) -> String {
        format!("http://{}/models/flux", self.addr)
    }

    /// Completion request bodies received so far
    pub fn completions(&self) -> Vec<Value> {
        self.recorded.completions.lock().clone()
    }

    /// Inference request bodies received so far
    pub fn inferences(&self) -> Vec<Value> {
        self.recorded.inferences.lock().clone()
    }
}

fn bearer_matches(headers: &HeaderMap, key: &str) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {}", key))
}

async fn completions(
    State(recorded): State<Recorded>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !bearer_matches(&headers, COMPLETION_API_KEY) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    recorded.completions.lock().push(body.clone());

    tokio::time::sleep(COMPLETION_DELAY).await;

    let last = body["messages"]
        .as_array()
        .and_then(|m| m.last())
        .and_then(|m| m["content"].as_str())
        .unwrap_or_default()
        .to_string();

    if last.contains("fail") {
        return (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded: secret-detail")
            .into_response();
    }
    let content = if last.contains("silent") {
        Value::Null
    } else {
        json!(format!("echo: {}", last))
    };

    Json(json!({
        "id": "cmpl-test",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }]
    }))
    .into_response()
}

async fn inference(
    State(recorded): State<Recorded>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !bearer_matches(&headers, IMAGE_API_KEY) {
        return (StatusCode::UNAUTHORIZED, "invalid token").into_response();
    }
    recorded.inferences.lock().push(body.clone());

    let prompt = body["inputs"].as_str().unwrap_or_default();
    if prompt.contains("stall") {
        tokio::time::sleep(Duration::from_secs(30)).await;
    }
    if prompt.contains("broken") {
        return (StatusCode::SERVICE_UNAVAILABLE, "model loading").into_response();
    }

    ([(header::CONTENT_TYPE, "image/png")], PNG_BYTES).into_response()
}
