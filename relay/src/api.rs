//! Inbound HTTP surface.
//!
//! Request bodies are parsed into typed commands with explicit
//! required/optional fields; required-field validation happens here,
//! before any envelope is built or any outbound call is made. Pipeline
//! errors are collapsed into an opaque `Service unavailable` for the
//! client, with the real error kind logged and counted internally.

use crate::envelope::{EventEnvelope, Fields};
use crate::errors::RelayError;
use crate::forwarder::Forwarder;
use crate::metrics_defs::RELAY_REQUESTS;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use registry::TenantRegistry;
use serde::{Deserialize, Serialize};
use shared::counter;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub forwarder: Arc<Forwarder>,
    pub registry: TenantRegistry,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/api/identify", post(identify))
        .route("/api/track", post(track))
        .route("/health", get(health))
        .route("/ready", get(ready))
        .with_state(state)
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct IdentifyRequest {
    pub user_id: Option<String>,
    pub previous_id: Option<String>,
    pub traits: Option<Fields>,
    pub tenant_id: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TrackRequest {
    pub event_name: Option<String>,
    pub properties: Option<Fields>,
    pub tenant_id: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Serialize)]
struct SuccessResponse {
    success: bool,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
}

fn success(endpoint: &'static str) -> Response {
    counter!(RELAY_REQUESTS, "endpoint" => endpoint, "status" => "200").increment(1);
    (StatusCode::OK, Json(SuccessResponse { success: true })).into_response()
}

/// Client fault, never logged as a server error.
fn missing_fields(endpoint: &'static str) -> Response {
    counter!(RELAY_REQUESTS, "endpoint" => endpoint, "status" => "400").increment(1);
    tracing::debug!(endpoint, "request rejected, missing required fields");
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: "Missing required fields",
        }),
    )
        .into_response()
}

/// Opaque 500 for any pipeline failure. The distinct error kinds stay in
/// logs and metrics; no tenant host or registry detail crosses the HTTP
/// boundary.
fn service_unavailable(endpoint: &'static str, tenant_id: &str, err: &RelayError) -> Response {
    counter!(RELAY_REQUESTS, "endpoint" => endpoint, "status" => "500").increment(1);
    tracing::error!(endpoint, tenant_id, kind = err.kind(), %err, "event forwarding failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: "Service unavailable",
        }),
    )
        .into_response()
}

// An empty string counts as missing, same as an absent field.
fn required(field: Option<String>) -> Option<String> {
    field.filter(|value| !value.is_empty())
}

async fn identify(State(state): State<AppState>, Json(req): Json<IdentifyRequest>) -> Response {
    let (Some(user_id), Some(tenant_id)) = (required(req.user_id), required(req.tenant_id)) else {
        return missing_fields("identify");
    };
    let previous_id = required(req.previous_id);

    let envelope = EventEnvelope::identify(&user_id, previous_id.as_deref(), req.traits);
    if let Err(err) = state.forwarder.deliver(&tenant_id, &envelope).await {
        return service_unavailable("identify", &tenant_id, &err);
    }

    // Derived alias, only when the previous id is a different identity.
    // The two deliveries are sequential and non-transactional: if the
    // alias fails here the identify above has already been delivered, and
    // the request still reports failure.
    if let Some(previous_id) = previous_id.filter(|p| *p != user_id) {
        let alias = EventEnvelope::alias(&user_id, &previous_id);
        if let Err(err) = state.forwarder.deliver(&tenant_id, &alias).await {
            return service_unavailable("identify", &tenant_id, &err);
        }
    }

    success("identify")
}

async fn track(State(state): State<AppState>, Json(req): Json<TrackRequest>) -> Response {
    let (Some(event_name), Some(tenant_id)) = (required(req.event_name), required(req.tenant_id))
    else {
        return missing_fields("track");
    };

    let user_id = required(req.user_id);
    let envelope = EventEnvelope::track(event_name, user_id.as_deref(), req.properties);
    if let Err(err) = state.forwarder.deliver(&tenant_id, &envelope).await {
        return service_unavailable("track", &tenant_id, &err);
    }

    success("track")
}

async fn health() -> &'static str {
    "ok\n"
}

async fn ready(State(state): State<AppState>) -> Response {
    if state.registry.is_ready() {
        (StatusCode::OK, "ok\n").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready\n").into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forwarder::ForwarderConfig;
    use crate::testutils::CaptureServer;
    use registry::{InMemoryTenantStore, TenantRow};
    use serde_json::{Value, json};
    use tokio::net::TcpListener;

    struct TestApp {
        base_url: String,
        downstream: CaptureServer,
        client: reqwest::Client,
    }

    impl TestApp {
        /// Capture downstream plus the full gateway app with tenant `t1`
        /// registered, both on ephemeral ports.
        async fn spawn() -> Self {
            let downstream = CaptureServer::spawn().await;

            let store = InMemoryTenantStore::new(vec![TenantRow {
                tenant_id: "t1".into(),
                host: downstream.base_url(),
            }]);
            let registry = TenantRegistry::new(std::sync::Arc::new(store));
            registry.refresh().await.unwrap();

            let forwarder = Forwarder::new(registry.clone(), ForwarderConfig::default());
            let app = app(AppState {
                forwarder: Arc::new(forwarder),
                registry,
            });

            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });

            TestApp {
                base_url: format!("http://{addr}"),
                downstream,
                client: reqwest::Client::new(),
            }
        }

        async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
            let response = self
                .client
                .post(format!("{}{path}", self.base_url))
                .json(&body)
                .send()
                .await
                .unwrap();
            let status = response.status();
            let body = response.json().await.unwrap();
            (StatusCode::from_u16(status.as_u16()).unwrap(), body)
        }
    }

    #[tokio::test]
    async fn identify_with_distinct_previous_id_delivers_identify_then_alias() {
        let app = TestApp::spawn().await;

        let (status, body) = app
            .post(
                "/api/identify",
                json!({"userId": "u1", "previousId": "anon1", "tenantId": "t1"}),
            )
            .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"success": true}));

        let calls = app.downstream.calls();
        assert_eq!(calls.len(), 2);

        assert_eq!(calls[0].event_type, "identify");
        assert_eq!(calls[0].body["userId"], "u1");
        assert_eq!(calls[0].body["traits"]["previous_anonymous_id"], "anon1");
        assert!(calls[0].body["traits"]["identified_at"].is_string());
        assert_eq!(calls[0].body["source"], "backend-icustomer");
        assert!(calls[0].body["sentAt"].is_string());

        assert_eq!(calls[1].event_type, "alias");
        assert_eq!(calls[1].body["userId"], "u1");
        assert_eq!(calls[1].body["previousId"], "anon1");
    }

    #[tokio::test]
    async fn identify_with_matching_previous_id_delivers_single_envelope() {
        let app = TestApp::spawn().await;

        let (status, _) = app
            .post(
                "/api/identify",
                json!({"userId": "u1", "previousId": "u1", "tenantId": "t1"}),
            )
            .await;

        assert_eq!(status, StatusCode::OK);

        let calls = app.downstream.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].event_type, "identify");
    }

    #[tokio::test]
    async fn identify_without_previous_id_delivers_single_envelope() {
        let app = TestApp::spawn().await;

        let (status, _) = app
            .post("/api/identify", json!({"userId": "u1", "tenantId": "t1"}))
            .await;

        assert_eq!(status, StatusCode::OK);
        let calls = app.downstream.calls();
        assert_eq!(calls.len(), 1);
        assert!(
            !calls[0].body["traits"]
                .as_object()
                .unwrap()
                .contains_key("previous_anonymous_id")
        );
    }

    #[tokio::test]
    async fn track_without_user_id_delivers_as_anonymous() {
        let app = TestApp::spawn().await;

        let (status, body) = app
            .post(
                "/api/track",
                json!({"eventName": "page_view", "tenantId": "t1"}),
            )
            .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"success": true}));

        let calls = app.downstream.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].event_type, "track");
        assert_eq!(calls[0].body["event"], "page_view");
        assert_eq!(calls[0].body["userId"], "anonymous");
        assert!(calls[0].body["properties"]["timestamp"].is_string());
    }

    #[tokio::test]
    async fn track_forwards_caller_properties() {
        let app = TestApp::spawn().await;

        let (status, _) = app
            .post(
                "/api/track",
                json!({
                    "eventName": "signup",
                    "userId": "u1",
                    "tenantId": "t1",
                    "properties": {"plan": "free"}
                }),
            )
            .await;

        assert_eq!(status, StatusCode::OK);
        let calls = app.downstream.calls();
        assert_eq!(calls[0].body["userId"], "u1");
        assert_eq!(calls[0].body["properties"]["plan"], "free");
    }

    #[tokio::test]
    async fn missing_required_fields_are_rejected_without_delivery() {
        let app = TestApp::spawn().await;

        let (status, body) = app.post("/api/identify", json!({"tenantId": "t1"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"error": "Missing required fields"}));

        let (status, _) = app.post("/api/identify", json!({"userId": "u1"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = app
            .post("/api/track", json!({"eventName": "page_view"}))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = app.post("/api/track", json!({"tenantId": "t1"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // Empty strings count as missing too.
        let (status, _) = app
            .post("/api/identify", json!({"userId": "", "tenantId": "t1"}))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        assert!(app.downstream.calls().is_empty());
    }

    #[tokio::test]
    async fn unknown_tenant_is_an_opaque_500_without_delivery() {
        let app = TestApp::spawn().await;

        let (status, body) = app
            .post(
                "/api/identify",
                json!({"userId": "u1", "tenantId": "nope"}),
            )
            .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({"error": "Service unavailable"}));
        assert!(app.downstream.calls().is_empty());
    }

    #[tokio::test]
    async fn alias_failure_reports_500_after_identify_was_delivered() {
        let app = TestApp::spawn().await;
        app.downstream.fail_event_type("alias");

        let (status, body) = app
            .post(
                "/api/identify",
                json!({"userId": "u1", "previousId": "anon1", "tenantId": "t1"}),
            )
            .await;

        // The identify is already out; the request still fails as a whole.
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({"error": "Service unavailable"}));

        let calls = app.downstream.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].event_type, "identify");
        assert_eq!(calls[1].event_type, "alias");
    }

    #[tokio::test]
    async fn downstream_failure_is_an_opaque_500() {
        let app = TestApp::spawn().await;
        app.downstream.fail_event_type("track");

        let (status, body) = app
            .post(
                "/api/track",
                json!({"eventName": "page_view", "tenantId": "t1"}),
            )
            .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({"error": "Service unavailable"}));
    }

    #[tokio::test]
    async fn health_and_ready_respond() {
        let app = TestApp::spawn().await;

        let response = app
            .client
            .get(format!("{}/health", app.base_url))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);

        let response = app
            .client
            .get(format!("{}/ready", app.base_url))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);
    }
}
