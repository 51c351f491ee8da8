use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use orchestrator::OrchestratorError;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug)]
pub enum AppError {
    Orchestration(OrchestratorError),
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            AppError::Orchestration(err) => {
                let status = match &err {
                    OrchestratorError::SagaNotFound(_) => StatusCode::NOT_FOUND,
                    OrchestratorError::InvalidRequest(_) | OrchestratorError::Planning(_) => {
                        StatusCode::BAD_REQUEST
                    }
                    OrchestratorError::SagaExhausted { .. } => StatusCode::BAD_GATEWAY,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                if status.is_server_error() {
                    tracing::error!(error = %err, kind = err.kind(), "Orchestration error");
                }
                (status, err.kind(), err.to_string())
            }
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

impl From<OrchestratorError> for AppError {
    fn from(err: OrchestratorError) -> Self {
        AppError::Orchestration(err)
    }
}
