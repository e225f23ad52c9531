use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Failures of the token endpoint, rendered as `{"error": "..."}`.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Missing required parameters: identity and room")]
    MissingParameters,

    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    #[error("Failed to generate token. Please check LIVEKIT_API_KEY and LIVEKIT_API_SECRET")]
    MissingCredentials,

    #[error("Token generation failed: {0}")]
    Signing(String),
}

impl TokenError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingParameters | Self::InvalidBody(_) => StatusCode::BAD_REQUEST,
            Self::MissingCredentials | Self::Signing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for TokenError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Token request failed");
        } else {
            tracing::debug!(error = %self, "Token request rejected");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<voice_relay::RelayError> for TokenError {
    fn from(err: voice_relay::RelayError) -> Self {
        Self::Signing(err.to_string())
    }
}
