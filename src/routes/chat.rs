use crate::downstream;
use crate::error::RelayError;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use bytes::Bytes;
use futures::stream::{BoxStream, Stream, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use std::io;

// Types matching the incoming JSON structure. Auxiliary fields are accepted
// but not used.
#[derive(Debug, Deserialize)]
struct ChatRequest {
    messages: Vec<IncomingMessage>,
    #[serde(default)]
    #[serde(rename = "chatSettings")]
    #[allow(dead_code)]
    chat_settings: Option<Value>,
    #[serde(default)]
    #[serde(rename = "customModelId")]
    #[allow(dead_code)]
    custom_model_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IncomingMessage {
    content: String,
}

/// Streamed response whose body reproduces the downstream bytes unchanged.
struct EventStreamResponse {
    stream: BoxStream<'static, Result<Bytes, io::Error>>,
}

impl EventStreamResponse {
    fn new(stream: impl Stream<Item = Result<Bytes, io::Error>> + Send + 'static) -> Self {
        Self {
            stream: stream.boxed(),
        }
    }
}

impl IntoResponse for EventStreamResponse {
    fn into_response(self) -> axum::response::Response {
        let body = Body::from_stream(self.stream);

        http::Response::builder()
            .header("Content-Type", "text/event-stream")
            .header("Cache-Control", "no-cache")
            .header("Connection", "keep-alive")
            .body(body)
            .unwrap()
    }
}

async fn handler(
    State(state): State<AppState>,
    request: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<EventStreamResponse, RelayError> {
    let Json(request) = request?;

    // Only the latest turn is forwarded; earlier turns are context the
    // backend reconstructs on its own.
    let last = request
        .messages
        .last()
        .ok_or_else(|| RelayError::bad_request("messages must not be empty"))?;

    let response = state.downstream.ask(&last.content).await.map_err(|err| {
        tracing::error!("downstream request failed: {}", err);
        err
    })?;

    Ok(EventStreamResponse::new(downstream::into_text_stream(
        response,
    )))
}

// Configure routes for this module
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/chat", post(handler))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downstream::DownstreamClient;
    use http_body_util::BodyExt;
    use serde_json::json;
    use tower::ServiceExt;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn app(downstream_url: &str) -> Router {
        let state = AppState {
            downstream: DownstreamClient::new(downstream_url).unwrap(),
        };
        routes(state)
    }

    async fn post_chat(app: Router, body: String) -> http::Response<Body> {
        app.oneshot(
            http::Request::builder()
                .method("POST")
                .uri("/chat")
                .header("Content-Type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_forwards_last_message_content() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ask"))
            .and(body_json(json!({ "query": "c" })))
            .respond_with(ResponseTemplate::new(200).set_body_string("data: ok\n\n"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let body = json!({
            "messages": [
                { "content": "a" },
                { "content": "b" },
                { "content": "c" }
            ]
        });
        let response = post_chat(app(&mock_server.uri()), body.to_string()).await;
        assert_eq!(response.status(), http::StatusCode::OK);
    }

    #[tokio::test]
    async fn test_streams_downstream_body_verbatim() {
        let downstream_body = "data: hello\n\ndata: world\n\n";
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ask"))
            .respond_with(ResponseTemplate::new(200).set_body_string(downstream_body))
            .mount(&mock_server)
            .await;

        let body = json!({ "messages": [{ "content": "hello" }] });
        let response = post_chat(app(&mock_server.uri()), body.to_string()).await;

        assert_eq!(response.status(), http::StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get("Content-Type")
                .and_then(|v| v.to_str().ok()),
            Some("text/event-stream")
        );

        let collected = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(collected, downstream_body.as_bytes());
    }

    #[tokio::test]
    async fn test_auxiliary_fields_are_ignored() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ask"))
            .and(body_json(json!({ "query": "hello" })))
            .respond_with(ResponseTemplate::new(200).set_body_string("data: ok\n\n"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let body = json!({
            "messages": [{ "content": "hello", "role": "user" }],
            "chatSettings": { "temperature": 0.4 },
            "customModelId": "backstage-docs"
        });
        let response = post_chat(app(&mock_server.uri()), body.to_string()).await;
        assert_eq!(response.status(), http::StatusCode::OK);
    }

    #[tokio::test]
    async fn test_empty_messages_is_rejected() {
        let body = json!({ "messages": [] });
        let response = post_chat(app("http://127.0.0.1:1"), body.to_string()).await;

        assert_eq!(response.status(), http::StatusCode::BAD_REQUEST);
        let collected = response.into_body().collect().await.unwrap().to_bytes();
        let json: Value = serde_json::from_slice(&collected).unwrap();
        assert_eq!(json["message"], "messages must not be empty");
    }

    #[tokio::test]
    async fn test_malformed_body_is_rejected() {
        let response = post_chat(app("http://127.0.0.1:1"), "not json".to_string()).await;

        assert_eq!(response.status(), http::StatusCode::BAD_REQUEST);
        let collected = response.into_body().collect().await.unwrap().to_bytes();
        let json: Value = serde_json::from_slice(&collected).unwrap();
        assert!(json["message"].is_string());
    }

    #[tokio::test]
    async fn test_downstream_credential_failure_is_rewritten() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ask"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(json!({ "message": "Incorrect API key provided" })),
            )
            .mount(&mock_server)
            .await;

        let body = json!({ "messages": [{ "content": "hello" }] });
        let response = post_chat(app(&mock_server.uri()), body.to_string()).await;

        assert_eq!(response.status(), http::StatusCode::UNAUTHORIZED);
        let collected = response.into_body().collect().await.unwrap().to_bytes();
        let json: Value = serde_json::from_slice(&collected).unwrap();
        assert_eq!(
            json["message"],
            "Custom API Key is incorrect. Please fix it in your profile settings."
        );
    }

    #[tokio::test]
    async fn test_unreachable_downstream_is_internal_error() {
        // Nothing listens on this port
        let body = json!({ "messages": [{ "content": "hello" }] });
        let response = post_chat(app("http://127.0.0.1:1"), body.to_string()).await;

        assert_eq!(response.status(), http::StatusCode::INTERNAL_SERVER_ERROR);
        let collected = response.into_body().collect().await.unwrap().to_bytes();
        let json: Value = serde_json::from_slice(&collected).unwrap();
        assert!(json["message"].is_string());
    }
}
