use anyhow::Result;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

mod configuration;
mod downstream;
mod error;
mod routes;
mod state;

use configuration::Settings;
use downstream::DownstreamClient;
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing for logging
    tracing_subscriber::fmt::init();

    let settings = Settings::new()?;

    let state = AppState {
        downstream: DownstreamClient::new(settings.downstream.url.clone())?,
    };

    // Create router with CORS support
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = routes::configure(state).layer(cors);

    let listener = tokio::net::TcpListener::bind(settings.server.socket_addr()).await?;
    info!("listening on {}", listener.local_addr()?);
    info!("forwarding chat queries to {}", settings.downstream.url);

    axum::serve(listener, app).await?;
    Ok(())
}
