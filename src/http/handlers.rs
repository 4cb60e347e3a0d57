//! Axum HTTP handlers for the web server
//!
//! `GET /sse` opens the long-lived event stream; `POST /sse/message` accepts
//! one JSON-RPC request per call, addressed by the session handle the stream
//! announced.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, HeaderName, StatusCode},
    response::{sse::Sse, IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::errors::AppError;
use crate::mcp::rpc::json_rpc_error;
use crate::transport::{ingress, stream::SessionEventStream, MESSAGE_PATH, SSE_PATH};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct DiscoveryResponse {
    pub name: &'static str,
    pub version: &'static str,
    pub sse_endpoint: &'static str,
    pub message_endpoint: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    #[serde(rename = "sessionId")]
    pub session_id: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub async fn discovery() -> Json<DiscoveryResponse> {
    Json(DiscoveryResponse {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        sse_endpoint: SSE_PATH,
        message_endpoint: MESSAGE_PATH,
    })
}

pub async fn open_stream(State(state): State<AppState>) -> impl IntoResponse {
    let session = state.sessions.create();
    info!(
        session = %session.handle(),
        active = state.sessions.len(),
        "stream opened"
    );

    let stream = SessionEventStream::attach(
        session,
        Arc::clone(&state.sessions),
        state.transport.ping_interval,
    );

    (
        [
            (header::CACHE_CONTROL, "no-cache"),
            (HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        Sse::new(stream),
    )
}

pub async fn post_message(
    State(state): State<AppState>,
    Query(query): Query<MessageQuery>,
    body: Bytes,
) -> Response {
    let Some(session) = state.sessions.resolve(&query.session_id) else {
        return AppError::SessionNotFound.into_response();
    };

    let payload: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json_rpc_error(None, -32700, "Parse error")),
            )
                .into_response()
        }
    };

    // Acknowledge now; the reply travels back over the stream.
    ingress::accept(state.clone(), session.handle().to_string(), payload);
    StatusCode::ACCEPTED.into_response()
}
