//! In-process stand-in for a tenant's ingestion endpoint, used by the
//! forwarder and API tests.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(Clone, Debug)]
pub struct CapturedEvent {
    pub event_type: String,
    pub body: serde_json::Value,
}

#[derive(Clone, Default)]
struct CaptureState {
    calls: Arc<Mutex<Vec<CapturedEvent>>>,
    failing: Arc<Mutex<HashSet<String>>>,
}

/// Records every `POST /api/s/{event_type}` it receives and answers 200,
/// or 503 for event types marked as failing. Failing calls are still
/// recorded so tests can assert that an attempt was made.
pub struct CaptureServer {
    base_url: String,
    state: CaptureState,
}

impl CaptureServer {
    pub async fn spawn() -> Self {
        let state = CaptureState::default();
        let app = Router::new()
            .route("/api/s/{event_type}", post(capture))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        CaptureServer {
            base_url: format!("http://{addr}"),
            state,
        }
    }

    pub fn base_url(&self) -> String {
        self.base_url.clone()
    }

    /// Makes the server answer 503 for the given event type.
    pub fn fail_event_type(&self, event_type: &str) {
        self.state.failing.lock().insert(event_type.to_string());
    }

    pub fn calls(&self) -> Vec<CapturedEvent> {
        self.state.calls.lock().clone()
    }
}

async fn capture(
    State(state): State<CaptureState>,
    Path(event_type): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> StatusCode {
    state.calls.lock().push(CapturedEvent {
        event_type: event_type.clone(),
        body,
    });

    if state.failing.lock().contains(&event_type) {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    }
}
