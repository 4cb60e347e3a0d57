use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

pub mod backend_client;
pub mod config;
pub mod domain;
pub mod errors;
pub mod http;
pub mod logging;
pub mod mcp;
pub mod transport;

use backend_client::HealthDataProvider;
use config::TransportConfig;
use transport::session::SessionRegistry;

#[derive(Clone)]
pub struct AppState {
    pub transport: TransportConfig,
    pub provider: Arc<dyn HealthDataProvider>,
    pub sessions: Arc<SessionRegistry>,
}

impl AppState {
    pub fn new(transport: TransportConfig, provider: Arc<dyn HealthDataProvider>) -> Self {
        Self {
            transport,
            provider,
            sessions: Arc::new(SessionRegistry::new(transport.queue_capacity)),
        }
    }
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(http::handlers::health))
        .route("/.well-known/mcp", get(http::handlers::discovery))
        .route(transport::SSE_PATH, get(http::handlers::open_stream))
        .route(transport::MESSAGE_PATH, post(http::handlers::post_message))
        .layer(middleware::from_fn(logging::request_logging_middleware))
        .with_state(state)
}
