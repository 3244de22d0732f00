use axum::{routing::get, Router};

async fn status() -> &'static str {
    "ok"
}

// Configure routes for this module
pub fn routes() -> Router {
    Router::new().route("/status", get(status))
}
