pub mod actions;
pub mod assignments;
pub mod documents;
pub mod inventory;
pub mod topology;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::actions::ActionError;
use crate::graph::TopologyError;
use crate::AppState;

/// Error response - {"error": "message"}
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// API error type
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
        }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.into(),
        }
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            message: msg.into(),
        }
    }

    pub fn bad_gateway(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_GATEWAY,
            message: msg.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status().is_server_error() {
            tracing::error!("{} {}", self.status(), self.message);
        }
        (self.status, Json(ErrorResponse::new(self.message))).into_response()
    }
}

impl From<TopologyError> for ApiError {
    fn from(err: TopologyError) -> Self {
        match err {
            TopologyError::IdentifierCollision(_) => Self::conflict(err.to_string()),
            TopologyError::UnknownNode(_) | TopologyError::UnknownLink(_) => Self::not_found(err.to_string()),
            _ => Self::bad_request(err.to_string()),
        }
    }
}

impl From<ActionError> for ApiError {
    fn from(err: ActionError) -> Self {
        match err {
            ActionError::InProgress(_) => Self::conflict(err.to_string()),
            ActionError::Payload(..) => Self::internal(err.to_string()),
            _ => Self::bad_request(err.to_string()),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        // Transport failures talking to a collaborator
        if err.downcast_ref::<reqwest::Error>().is_some() {
            return Self::bad_gateway(err.to_string());
        }
        Self::internal(err.to_string())
    }
}

/// Response helper: return 201 Created with JSON body
pub fn created<T: Serialize>(item: T) -> (StatusCode, Json<T>) {
    (StatusCode::CREATED, Json(item))
}

/// Healthcheck endpoint - returns 200 OK with status
pub async fn healthcheck(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "topology-composer",
        "inventory": state.config.inventory_url,
        "ws_clients": state.ws_hub.client_count(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ActionKind;

    #[test]
    fn test_topology_error_status() {
        let cases = [
            (TopologyError::InvalidIdentifier("a b".into()), StatusCode::BAD_REQUEST),
            (TopologyError::IdentifierCollision("sw1".into()), StatusCode::CONFLICT),
            (TopologyError::SelfLoop("h1".into()), StatusCode::BAD_REQUEST),
            (TopologyError::UnknownNode("h9".into()), StatusCode::NOT_FOUND),
            (TopologyError::UnknownLink("l9".into()), StatusCode::NOT_FOUND),
            (TopologyError::NotAHost("sw1".into()), StatusCode::BAD_REQUEST),
            (TopologyError::MalformedDocument("missing nodes".into()), StatusCode::BAD_REQUEST),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn test_action_error_status() {
        assert_eq!(
            ApiError::from(ActionError::InProgress(ActionKind::CreatePorts)).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(ApiError::from(ActionError::NotConfirmed).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::from(anyhow::anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
