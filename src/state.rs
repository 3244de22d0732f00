use crate::downstream::DownstreamClient;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub downstream: DownstreamClient,
}
