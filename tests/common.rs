// ABOUTME: Shared test utilities: logging init, scripted authorizers, mock provider server
// ABOUTME: The mock provider stands in for the wearable cloud API over loopback HTTP
//
// SPDX-License-Identifier: MIT OR Apache-2.0
#![allow(dead_code, clippy::unwrap_used, clippy::expect_used, missing_docs)]

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};

use async_trait::async_trait;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{Duration, Utc};
use serde_json::json;

use heartbridge::{Credential, ExternalAuthorizer};

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging once per test process
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let level = match std::env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            _ => tracing::Level::WARN,
        };
        tracing_subscriber::fmt()
            .with_max_level(level)
            .with_test_writer()
            .init();
    });
}

/// A credential expiring comfortably in the future
pub fn valid_credential(access_token: &str) -> Credential {
    Credential {
        access_token: access_token.to_owned(),
        refresh_token: Some("refresh-1".into()),
        expires_at: Utc::now() + Duration::hours(8),
        user_id: Some("U1".into()),
        scope: Some("heartrate profile".into()),
    }
}

/// A credential that expired an hour ago and cannot be refreshed
pub fn expired_credential(access_token: &str) -> Credential {
    Credential {
        access_token: access_token.to_owned(),
        refresh_token: None,
        expires_at: Utc::now() - Duration::hours(1),
        user_id: None,
        scope: None,
    }
}

/// Authorizer that is always dismissed without a redirect
pub struct NullAuthorizer;

#[async_trait]
impl ExternalAuthorizer for NullAuthorizer {
    async fn open(&self, _authorization_url: &str) -> Option<String> {
        None
    }
}

/// Authorizer that returns a pre-scripted redirect and records the URL
/// it was asked to open
#[derive(Default)]
pub struct ScriptedAuthorizer {
    pub redirect: Mutex<Option<String>>,
    pub opened: Mutex<Option<String>>,
}

impl ScriptedAuthorizer {
    pub fn returning(redirect: &str) -> Self {
        Self {
            redirect: Mutex::new(Some(redirect.to_owned())),
            opened: Mutex::new(None),
        }
    }

    pub fn opened_url(&self) -> Option<String> {
        self.opened.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExternalAuthorizer for ScriptedAuthorizer {
    async fn open(&self, authorization_url: &str) -> Option<String> {
        *self.opened.lock().unwrap() = Some(authorization_url.to_owned());
        self.redirect.lock().unwrap().take()
    }
}

/// Mutable behavior of the mock provider
pub struct ProviderState {
    /// Tokens the profile and heart-rate endpoints accept
    pub valid_tokens: Mutex<HashSet<String>>,
    /// JSON document returned by the token endpoint
    pub token_response: Mutex<serde_json::Value>,
    /// Value served by the intraday heart-rate endpoint
    pub heart_rate_value: Mutex<u32>,
    /// Whether tokens issued by the token endpoint become valid
    pub accept_issued_tokens: AtomicBool,
    /// Number of token-endpoint calls observed
    pub token_calls: AtomicUsize,
    /// Number of revoke-endpoint calls observed
    pub revoke_calls: AtomicUsize,
}

impl ProviderState {
    pub fn accept_token(&self, token: &str) {
        self.valid_tokens.lock().unwrap().insert(token.to_owned());
    }

    pub fn reject_token(&self, token: &str) {
        self.valid_tokens.lock().unwrap().remove(token);
    }

    pub fn set_token_response(&self, response: serde_json::Value) {
        *self.token_response.lock().unwrap() = response;
    }
}

/// In-process stand-in for the wearable cloud API
pub struct MockProvider {
    pub base_url: String,
    pub state: Arc<ProviderState>,
}

/// Start the mock provider on an ephemeral loopback port
pub async fn spawn_mock_provider() -> MockProvider {
    let state = Arc::new(ProviderState {
        valid_tokens: Mutex::new(HashSet::new()),
        token_response: Mutex::new(json!({
            "access_token": "FRESH-TOKEN",
            "refresh_token": "FRESH-REFRESH",
            "expires_in": 3600,
            "user_id": "U1",
            "scope": "heartrate profile"
        })),
        heart_rate_value: Mutex::new(72),
        accept_issued_tokens: AtomicBool::new(true),
        token_calls: AtomicUsize::new(0),
        revoke_calls: AtomicUsize::new(0),
    });

    let app = Router::new()
        .route("/oauth2/token", post(token_endpoint))
        .route("/oauth2/revoke", post(revoke_endpoint))
        .route("/1/user/-/profile.json", get(profile_endpoint))
        .route(
            "/1/user/-/activities/heart/date/today/1d/1min.json",
            get(heart_rate_endpoint),
        )
        .with_state(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock provider");
    let addr: SocketAddr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    MockProvider {
        base_url: format!("http://{addr}"),
        state,
    }
}

async fn token_endpoint(
    State(state): State<Arc<ProviderState>>,
) -> (StatusCode, Json<serde_json::Value>) {
    state.token_calls.fetch_add(1, Ordering::SeqCst);
    let response = state.token_response.lock().unwrap().clone();

    if let Some(token) = response.get("access_token").and_then(|t| t.as_str()) {
        if state.accept_issued_tokens.load(Ordering::SeqCst) {
            state.accept_token(token);
        }
        (StatusCode::OK, Json(response))
    } else {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({"errors": [{"errorType": "invalid_grant"}]})),
        )
    }
}

async fn revoke_endpoint(State(state): State<Arc<ProviderState>>) -> StatusCode {
    state.revoke_calls.fetch_add(1, Ordering::SeqCst);
    StatusCode::OK
}

async fn profile_endpoint(
    State(state): State<Arc<ProviderState>>,
    headers: HeaderMap,
) -> (StatusCode, Json<serde_json::Value>) {
    if !bearer_is_valid(&state, &headers) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"errors": [{"errorType": "invalid_token"}]})),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "user": {
                "encodedId": "U1",
                "displayName": "Runner",
                "batteryLevel": 80,
                "deviceModel": "Versa 4"
            }
        })),
    )
}

async fn heart_rate_endpoint(
    State(state): State<Arc<ProviderState>>,
    headers: HeaderMap,
) -> (StatusCode, Json<serde_json::Value>) {
    if !bearer_is_valid(&state, &headers) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"errors": [{"errorType": "invalid_token"}]})),
        );
    }
    let value = *state.heart_rate_value.lock().unwrap();
    (
        StatusCode::OK,
        Json(json!({
            "activities-heart-intraday": {
                "dataset": [
                    {"time": "08:00:00", "value": 68},
                    {"time": "08:01:00", "value": value}
                ]
            }
        })),
    )
}

fn bearer_is_valid(state: &ProviderState, headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .is_some_and(|token| state.valid_tokens.lock().unwrap().contains(token))
}
