use crate::error::RelayError;
use anyhow::Result;
use axum::http::StatusCode;
use bytes::Bytes;
use futures::{Stream, TryStreamExt};
use reqwest::Client;
use serde_json::{json, Value};
use std::io;

/// Client for the answer backend. The backend takes a single query string
/// and replies with an incrementally produced text body.
#[derive(Clone)]
pub struct DownstreamClient {
    client: Client,
    base_url: String,
}

impl DownstreamClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        // No request timeout: the backend may take arbitrarily long to
        // produce its first chunk, and the caller holds the connection open.
        let client = Client::builder().build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Forward one query to the backend. A non-2xx reply is translated into
    /// a `RelayError` carrying the backend's status and whatever message its
    /// body supplies, so credential failures keep their wording.
    pub async fn ask(&self, query: &str) -> Result<reqwest::Response, RelayError> {
        let url = format!("{}/ask", self.base_url.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .json(&json!({ "query": query }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|body| {
                    body.get("message")
                        .and_then(Value::as_str)
                        .map(String::from)
                })
                .or(if text.is_empty() { None } else { Some(text) });

            return Err(RelayError {
                message,
                status: StatusCode::from_u16(status.as_u16()).ok(),
            });
        }

        Ok(response)
    }
}

/// Adapt an opaque downstream response into an ordered chunk stream. Chunks
/// are forwarded as they arrive and backpressure flows from the caller to
/// the downstream read. A read failure ends the stream with an error rather
/// than silently truncating it.
pub fn into_text_stream(
    response: reqwest::Response,
) -> impl Stream<Item = Result<Bytes, io::Error>> {
    response
        .bytes_stream()
        .map_err(|err| io::Error::new(io::ErrorKind::Other, err))
}
