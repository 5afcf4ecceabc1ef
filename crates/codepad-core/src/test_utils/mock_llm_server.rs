// src/test_utils/mock_llm_server.rs
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{routing::post, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

/// One scripted answer of the mock `generateContent` endpoint.
#[derive(Debug, Clone)]
pub enum MockReply {
    Text(String),
    Error { status: u16, message: String },
    Raw(Value),
}

impl MockReply {
    pub fn text(text: &str) -> Self {
        MockReply::Text(text.to_string())
    }

    pub fn error(status: u16, message: &str) -> Self {
        MockReply::Error {
            status,
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MockRequest {
    pub model_action: String,
    pub api_key: Option<String>,
    pub body: Value,
}

impl MockRequest {
    pub fn prompt(&self) -> Option<String> {
        self.body["contents"][0]["parts"][0]["text"]
            .as_str()
            .map(str::to_string)
    }
}

#[derive(Deserialize)]
struct KeyQuery {
    key: Option<String>,
}

#[derive(Clone)]
struct MockServerState {
    replies: Arc<Mutex<VecDeque<MockReply>>>,
    requests: Arc<Mutex<Vec<MockRequest>>>,
}

async fn generate_content_handler(
    State(state): State<MockServerState>,
    Path(model_action): Path<String>,
    Query(query): Query<KeyQuery>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    log::debug!("Mock Gemini server received request for {}", model_action);
    state.requests.lock().unwrap().push(MockRequest {
        model_action,
        api_key: query.key,
        body,
    });

    match state.replies.lock().unwrap().pop_front() {
        Some(MockReply::Text(text)) => (
            StatusCode::OK,
            Json(json!({
                "candidates": [{
                    "content": { "role": "model", "parts": [{ "text": text }] },
                    "finishReason": "STOP"
                }]
            })),
        ),
        Some(MockReply::Error { status, message }) => (
            StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            Json(json!({ "error": { "code": status, "message": message } })),
        ),
        Some(MockReply::Raw(value)) => (StatusCode::OK, Json(value)),
        None => {
            log::error!("Mock Gemini server ran out of replies!");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": { "code": 503, "message": "no scripted reply" } })),
            )
        }
    }
}

pub struct MockLLMServer {
    addr: SocketAddr,
    shutdown_tx: tokio::sync::oneshot::Sender<()>,
    pub recorded_requests: Arc<Mutex<Vec<MockRequest>>>,
}

impl MockLLMServer {
    pub async fn start(replies: Vec<MockReply>) -> Self {
        let state = MockServerState {
            replies: Arc::new(Mutex::new(VecDeque::from(replies))),
            requests: Arc::new(Mutex::new(Vec::new())),
        };
        let recorded_requests = state.requests.clone();

        let app = Router::new()
            .route("/models/{model_action}", post(generate_content_handler))
            .with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap_or_else(|e| {
            panic!("Failed to bind mock server to 127.0.0.1:0. Error: {}", e);
        });
        let addr = listener.local_addr().unwrap();
        log::info!("Mock Gemini server listening on {}", addr);

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap_or_else(|e| {
                    log::error!("Mock Gemini server error: {}", e);
                });
        });

        MockLLMServer {
            addr,
            shutdown_tx,
            recorded_requests,
        }
    }

    pub fn address(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub async fn shutdown(self) {
        if self.shutdown_tx.send(()).is_err() {
            log::warn!("Mock Gemini server shutdown signal already sent or receiver dropped.");
        }
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
    }

    pub fn get_requests(&self) -> Vec<MockRequest> {
        self.recorded_requests.lock().unwrap().clone()
    }
}
