use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use parlors_conversation::ConversationError;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Conversation(#[from] ConversationError),

    #[error("Invalid request body: {0}")]
    InvalidBody(String),
}

impl ServerError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::InvalidBody(_)
            | Self::Conversation(
                ConversationError::BadRequest(_) | ConversationError::MalformedHistory(_),
            ) => StatusCode::BAD_REQUEST,
            Self::Conversation(ConversationError::RemoteUnavailable(_)) => StatusCode::BAD_GATEWAY,
            Self::Conversation(
                ConversationError::TrimmingInfeasible(_)
                | ConversationError::SnapshotUnavailable(_),
            ) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed ({status}): {self}");
        } else {
            warn!("Request rejected ({status}): {self}");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
