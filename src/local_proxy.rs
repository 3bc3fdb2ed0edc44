//! Same-origin proxy for the pay callback.
//!
//! Browsers cannot call the gateway's callback endpoint directly (CORS), so
//! the front end posts the already-signed body here and it is forwarded
//! unchanged. Upstream TLS certificates are verified.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use serde_json::{Value, json};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::error::GatewayError;
use crate::request::{self, CALLBACK_ENDPOINT};
use crate::template::{ApiTemplate, TemplateRegistry};
use crate::transport::TransportFailure;

/// Fields the callback body must carry before it is forwarded
pub const REQUIRED_CALLBACK_FIELDS: [&str; 6] = [
    "channelCode",
    "studentId",
    "checkSum",
    "timestamp",
    "bills",
    "amount",
];

/// Forwards callback bodies to the gateway
#[derive(Clone)]
pub struct CallbackForwarder {
    http_client: reqwest::Client,
    upstream_url: String,
}

impl CallbackForwarder {
    /// `upstream_base` is the gateway base URL; the callback path is appended.
    pub fn new(upstream_base: &str) -> Result<Self, GatewayError> {
        let http_client = reqwest::Client::builder()
            .build()
            .map_err(|e| GatewayError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http_client,
            upstream_url: request::resolve_url(Some(upstream_base), CALLBACK_ENDPOINT),
        })
    }

    pub fn upstream_url(&self) -> &str {
        &self.upstream_url
    }

    /// Post the body upstream and hand back whatever came back.
    pub async fn forward(&self, body: &Value) -> Result<UpstreamReply, GatewayError> {
        let response = self
            .http_client
            .post(&self.upstream_url)
            .json(body)
            .send()
            .await
            .map_err(|e| TransportFailure::from(&e).into_error())?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportFailure::new(None, e.to_string(), true).into_error())?;

        Ok(UpstreamReply {
            status,
            content_type,
            body: body.to_vec(),
        })
    }
}

/// Raw upstream answer, relayed as-is
#[derive(Debug, Clone)]
pub struct UpstreamReply {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl IntoResponse for UpstreamReply {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::BAD_GATEWAY);
        let mut response = (status, self.body).into_response();
        let headers = response.headers_mut();
        match self.content_type.and_then(|ct| HeaderValue::from_str(&ct).ok()) {
            Some(content_type) => {
                headers.insert(header::CONTENT_TYPE, content_type);
            }
            None => {
                headers.remove(header::CONTENT_TYPE);
            }
        }
        response
    }
}

/// Names of required callback fields that are absent, null or blank.
pub fn missing_callback_fields(body: &Value) -> Vec<&'static str> {
    REQUIRED_CALLBACK_FIELDS
        .iter()
        .copied()
        .filter(|name| body.get(name).is_none_or(request::is_blank))
        .collect()
}

/// State shared by the proxy routes
#[derive(Clone)]
pub struct ProxyState {
    pub forwarder: CallbackForwarder,
    pub templates: Arc<TemplateRegistry>,
}

/// Build the proxy application with routes and middleware
pub fn router(state: ProxyState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/payment/callback", post(forward_callback))
        .route("/api/templates", get(list_templates))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn list_templates(State(state): State<ProxyState>) -> Json<Vec<ApiTemplate>> {
    Json(state.templates.all().to_vec())
}

async fn forward_callback(State(state): State<ProxyState>, Json(body): Json<Value>) -> Response {
    let missing = missing_callback_fields(&body);
    if !missing.is_empty() {
        tracing::info!("Rejecting callback, missing fields: {}", missing.join(", "));
        return ProxyError::BadRequest("Missing required fields".to_string()).into_response();
    }

    tracing::info!(
        "Forwarding callback for student {} to {}",
        body["studentId"],
        state.forwarder.upstream_url()
    );

    match state.forwarder.forward(&body).await {
        Ok(reply) => reply.into_response(),
        Err(e) => {
            tracing::error!("Callback forwarding error: {}", e);
            ProxyError::Upstream(e.to_string()).into_response()
        }
    }
}

enum ProxyError {
    BadRequest(String),
    Upstream(String),
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ProxyError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ProxyError::Upstream(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
