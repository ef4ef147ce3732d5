//! A local stand-in for the Google OAuth2 token endpoint and the FCM API.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Form, Json, Router};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub const ACCESS_TOKEN: &str = "ya29.test-access-token";
pub const PROJECT_ID: &str = "prayers-test";

/// Device tokens starting with this prefix are answered with `NOT_FOUND`.
pub const UNREGISTERED_PREFIX: &str = "stale-";

/// Device tokens starting with this prefix are answered with `503 UNAVAILABLE`.
pub const UNAVAILABLE_PREFIX: &str = "busy-";

/// A request received by the mock server.
#[derive(Clone, Debug)]
pub struct Request {
    pub path: String,
    pub authorization: Option<String>,
    /// JSON body, or the form fields of a token request.
    pub body: Value,
}

#[derive(Clone, Default)]
pub struct Events(Arc<Mutex<Vec<Request>>>);

impl Events {
    fn push(&self, request: Request) {
        self.0.lock().unwrap().push(request);
    }

    pub fn all(&self) -> Vec<Request> {
        self.0.lock().unwrap().clone()
    }

    pub fn paths(&self) -> Vec<String> {
        self.all().into_iter().map(|r| r.path).collect()
    }
}

#[derive(Clone)]
struct MockState {
    events: Events,
    token_status: StatusCode,
}

pub struct MockServer {
    pub url: String,
    pub events: Events,
}

impl MockServer {
    pub async fn start() -> MockServer {
        MockServer::start_with_token_status(StatusCode::OK).await
    }

    /// Starts a server whose token endpoint answers with `token_status`.
    pub async fn start_with_token_status(token_status: StatusCode) -> MockServer {
        let events = Events::default();
        let state = MockState {
            events: events.clone(),
            token_status,
        };
        let app = Router::new()
            .route("/token", post(token))
            .route("/v1/projects/{project}/messages:send", post(send))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        MockServer {
            url: format!("http://{addr}"),
            events,
        }
    }
}

fn authorization(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .map(|v| v.to_str().unwrap().to_string())
}

async fn token(
    State(state): State<MockState>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    state.events.push(Request {
        path: "/token".to_string(),
        authorization: authorization(&headers),
        body: json!(form),
    });
    if !state.token_status.is_success() {
        return (state.token_status, r#"{"error": "invalid_grant"}"#).into_response();
    }
    Json(json!({
        "access_token": ACCESS_TOKEN,
        "expires_in": 3599,
        "token_type": "Bearer",
    }))
    .into_response()
}

async fn send(
    State(state): State<MockState>,
    Path(project): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let device = body["message"]["token"].as_str().unwrap_or_default().to_string();
    state.events.push(Request {
        path: format!("/v1/projects/{project}/messages:send"),
        authorization: authorization(&headers),
        body,
    });
    if device.starts_with(UNAVAILABLE_PREFIX) {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "error": {
                    "code": 503,
                    "message": "The service is currently unavailable.",
                    "status": "UNAVAILABLE",
                }
            })),
        )
            .into_response();
    }
    if device.starts_with(UNREGISTERED_PREFIX) {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": {
                    "code": 404,
                    "message": "Requested entity was not found.",
                    "status": "NOT_FOUND",
                }
            })),
        )
            .into_response();
    }
    Json(json!({ "name": format!("projects/{project}/messages/{device}") })).into_response()
}
