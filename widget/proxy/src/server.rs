//! Proxy Server Implementation
//!
//! A single route that relays chat requests to the backend:
//!
//! ```text
//!   browser/TUI ──POST {urls, query, session_id, company_name}──► proxy
//!                                                                  │ + api_key
//!                                                                  ▼
//!   browser/TUI ◄──────────── text/event-stream (unchanged) ───── backend
//! ```
//!
//! The API key never leaves the server. The response body is relayed chunk
//! for chunk without buffering, so reasoning frames reach the client as soon
//! as the backend emits them.

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, error, info};

// =============================================================================
// Errors
// =============================================================================

/// Failures the proxy reports to its caller as JSON
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Anything but POST on the chat route
    #[error("Method not allowed")]
    MethodNotAllowed,

    /// The key variable is unset or empty
    #[error("Server configuration error: OpenAI API key not configured")]
    MissingApiKey,

    /// Body was not a JSON object
    #[error("Invalid request body")]
    InvalidBody,

    /// Backend answered with a non-success status
    #[error("Backend error: {0}")]
    Upstream(u16),

    /// Backend could not be reached
    #[error("Internal server error")]
    Unreachable(#[source] reqwest::Error),
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::MissingApiKey | Self::Unreachable(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::InvalidBody => StatusCode::BAD_REQUEST,
            Self::Upstream(code) => {
                StatusCode::from_u16(*code).unwrap_or(StatusCode::BAD_GATEWAY)
            }
        };

        let body = match &self {
            Self::Unreachable(source) => json!({
                "error": self.to_string(),
                "details": source.to_string(),
            }),
            _ => json!({ "error": self.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}

// =============================================================================
// State and Router
// =============================================================================

/// Shared proxy state
pub struct ProxyState {
    http_client: reqwest::Client,
    upstream_url: String,
    api_key: Option<String>,
}

impl ProxyState {
    /// State forwarding to `upstream_url` with `api_key`
    ///
    /// A missing key does not prevent startup; every request then fails with
    /// a configuration error instead.
    pub fn new(upstream_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            upstream_url: upstream_url.into(),
            api_key: api_key.filter(|k| !k.is_empty()),
        }
    }
}

/// Build the proxy router with permissive CORS
pub fn router(state: Arc<ProxyState>, path: &str) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route(path, post(chat_proxy).fallback(method_not_allowed))
        .with_state(state)
        .layer(cors)
}

async fn method_not_allowed(method: Method) -> ProxyError {
    debug!(%method, "Rejected non-POST request");
    ProxyError::MethodNotAllowed
}

// =============================================================================
// Handler
// =============================================================================

/// Attach the secret key to a request body
///
/// # Errors
///
/// [`ProxyError::InvalidBody`] unless `body` is a JSON object.
pub fn inject_api_key(body: &[u8], api_key: &str) -> Result<Value, ProxyError> {
    let mut value: Value = serde_json::from_slice(body).map_err(|_| ProxyError::InvalidBody)?;
    let object = value.as_object_mut().ok_or(ProxyError::InvalidBody)?;
    object.insert("api_key".to_string(), Value::String(api_key.to_string()));
    Ok(value)
}

async fn chat_proxy(State(state): State<Arc<ProxyState>>, body: Bytes) -> Result<Response, ProxyError> {
    let Some(api_key) = state.api_key.as_deref() else {
        error!("API key is not configured");
        return Err(ProxyError::MissingApiKey);
    };

    let payload = inject_api_key(&body, api_key)?;
    info!(
        upstream = %state.upstream_url,
        query_len = payload.get("query").and_then(serde_json::Value::as_str).map_or(0, str::len),
        "Forwarding chat request"
    );

    let upstream = state
        .http_client
        .post(&state.upstream_url)
        .header(reqwest::header::ACCEPT, "text/event-stream")
        .json(&payload)
        .send()
        .await
        .map_err(|e| {
            error!(error = %e, "Backend unreachable");
            ProxyError::Unreachable(e)
        })?;

    let status = upstream.status();
    if !status.is_success() {
        let detail = upstream.text().await.unwrap_or_default();
        error!(status = status.as_u16(), body = %detail, "Backend returned an error");
        return Err(ProxyError::Upstream(status.as_u16()));
    }

    debug!("Relaying event stream");
    let mut response = Body::from_stream(upstream.bytes_stream()).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/event-stream"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    Ok(response)
}

// =============================================================================
// Tests
// =============================================================================
