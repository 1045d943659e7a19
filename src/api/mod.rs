//! API layer -- axum routes and error mapping.

mod routes;
pub mod state;

use self::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::detect::EngineError;

/// Build the application router with all API routes.
pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_routes())
        .fallback(fallback)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn fallback() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "not found")
}

/// Error body returned to API callers. Configuration and computation
/// failures name the artifact or shape involved, never filesystem paths.
pub enum ApiError {
    Engine(EngineError),
    /// Body was not JSON, or did not fit the request type.
    Body(JsonRejection),
    /// The evaluation task itself died.
    Task(tokio::task::JoinError),
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        Self::Body(e)
    }
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        Self::Engine(e)
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Task(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let engine_err = match self {
            ApiError::Engine(e) => e,
            ApiError::Body(rejection) => {
                let message = rejection.body_text();
                let field = match &rejection {
                    JsonRejection::JsonDataError(_) => rejected_field(&message),
                    _ => None,
                };
                return (
                    rejection.status(),
                    Json(json!({ "error": message, "field": field })),
                )
                    .into_response();
            }
            ApiError::Task(e) => {
                error!(error = %e, "evaluation task failed");
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "evaluation failed" })),
                )
                    .into_response();
            }
        };

        let (status, body) = match &engine_err {
            EngineError::Validation(e) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({ "error": e.to_string(), "field": e.field }),
            ),
            EngineError::Configuration(e) => {
                error!(error = %e, "detection parameters unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    json!({
                        "error": "detection model unavailable",
                        "artifact": e.artifact(),
                    }),
                )
            }
            EngineError::Computation(e) => {
                error!(error = %e, "detection computation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": e.to_string() }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

/// Field path from a typed-body rejection, e.g. `speed` out of
/// `"...target type: speed: invalid type: string ..."`. Root-level
/// mismatches carry no path.
fn rejected_field(message: &str) -> Option<String> {
    let (_, detail) = message.split_once("target type: ")?;
    let (path, _) = detail.split_once(": ")?;
    let is_path = !path.is_empty()
        && path
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '[' || c == ']');
    is_path.then(|| path.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_field_from_typed_body_error() {
        let msg = "Failed to deserialize the JSON body into the target type: \
                   speed: invalid type: string \"fast\", expected f64 at line 1 column 17";
        assert_eq!(rejected_field(msg).as_deref(), Some("speed"));
    }

    #[test]
    fn test_root_level_error_has_no_field() {
        let msg = "Failed to deserialize the JSON body into the target type: \
                   invalid type: sequence, expected struct FeatureInput at line 1 column 0";
        assert_eq!(rejected_field(msg), None);
    }
}
