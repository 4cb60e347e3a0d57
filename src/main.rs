use std::sync::Arc;

use healthcare_mcp::{
    backend_client::HttpBackendClient, build_app, config::Config, logging, transport::reaper,
    AppState,
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_logging();

    let config = Config::from_env()?;
    let provider = Arc::new(HttpBackendClient::new(
        config.backend_url.clone(),
        config.request_timeout,
    )?);
    let state = AppState::new(config.transport, provider);
    reaper::spawn(Arc::clone(&state.sessions), state.transport);

    let bind_socket = config.bind_socket()?;
    let app = build_app(state);
    let listener = tokio::net::TcpListener::bind(bind_socket).await?;

    info!(
        bind_addr = %config.bind_addr,
        bind_port = config.bind_port,
        backend_url = %config.backend_url,
        "server starting"
    );

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
