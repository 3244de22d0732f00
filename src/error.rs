use axum::{extract::rejection::JsonRejection, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {env_var}")]
    MissingEnvVar { env_var: String },

    #[error(transparent)]
    Other(#[from] config::ConfigError),
}

/// Convert a dotted settings field name into the environment variable that
/// supplies it, e.g. "downstream.url" -> "RELAY_DOWNSTREAM__URL".
pub fn to_env_var(field: &str) -> String {
    format!("RELAY_{}", field.replace('.', "__").to_uppercase())
}

pub const DEFAULT_ERROR_MESSAGE: &str = "An unexpected error occurred";

const KEY_MISSING_MESSAGE: &str =
    "Custom API Key not found. Please set it in your profile settings.";
const KEY_INCORRECT_MESSAGE: &str =
    "Custom API Key is incorrect. Please fix it in your profile settings.";

/// Boundary error for the chat pipeline. Both fields are optional and are
/// resolved to an effective message and status only when the error is
/// rendered, so intermediate layers can attach whichever half they know.
#[derive(Debug, Default, Error)]
#[error("{}", self.user_message())]
pub struct RelayError {
    pub message: Option<String>,
    pub status: Option<StatusCode>,
}

impl RelayError {
    pub fn new(message: impl Into<String>, status: StatusCode) -> Self {
        Self {
            message: Some(message.into()),
            status: Some(status),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(message, StatusCode::BAD_REQUEST)
    }

    pub fn status_code(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// The user-facing message: the carried message (or the generic default),
    /// with credential failures rewritten to fixed instructions.
    pub fn user_message(&self) -> String {
        let raw = self.message.as_deref().unwrap_or(DEFAULT_ERROR_MESSAGE);
        let lowered = raw.to_lowercase();

        if lowered.contains("api key not found") {
            KEY_MISSING_MESSAGE.to_string()
        } else if lowered.contains("incorrect api key") {
            KEY_INCORRECT_MESSAGE.to_string()
        } else {
            raw.to_string()
        }
    }
}

impl From<reqwest::Error> for RelayError {
    fn from(err: reqwest::Error) -> Self {
        // reqwest is still on http 0.2, so the status code crosses crate
        // versions by value.
        let status = err
            .status()
            .and_then(|s| StatusCode::from_u16(s.as_u16()).ok());
        Self {
            message: Some(err.to_string()),
            status,
        }
    }
}

impl From<JsonRejection> for RelayError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.body_text(), StatusCode::BAD_REQUEST)
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> axum::response::Response {
        let body = Json(json!({ "message": self.user_message() }));
        (self.status_code(), body).into_response()
    }
}
