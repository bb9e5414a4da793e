//! Hook server errors
//!
//! Action failures are rendered as Kubernetes-style `Status` bodies so the
//! orchestrator side can log them verbatim.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use kubevirt_velero_actions::ActionError;

/// Result type for hook handlers
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the hook endpoints
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No action registered under the requested name
    #[error("no {hook} action named {name}")]
    UnknownAction {
        /// `backup` or `restore`
        hook: &'static str,
        /// Requested action name
        name: String,
    },

    /// The action itself failed
    #[error(transparent)]
    Action(#[from] ActionError),
}

impl Error {
    /// Create an unknown action error
    pub fn unknown_action(hook: &'static str, name: impl Into<String>) -> Self {
        Self::UnknownAction {
            hook,
            name: name.into(),
        }
    }

    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self {
            Error::UnknownAction { .. } => StatusCode::NOT_FOUND,
            Error::Action(ActionError::Rejected { .. } | ActionError::Malformed { .. }) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Error::Action(ActionError::Degraded { .. } | ActionError::Lookup(_)) => {
                StatusCode::BAD_GATEWAY
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();

        let mut body = serde_json::json!({
            "kind": "Status",
            "apiVersion": "v1",
            "status": "Failure",
            "message": message,
            "code": status.as_u16()
        });
        if let Error::Action(ActionError::Degraded { partial, .. }) = self {
            body["partialAdditionalItems"] = serde_json::json!(partial);
        }

        (status, Json(body)).into_response()
    }
}
