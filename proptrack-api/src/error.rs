/// HTTP error mapping
///
/// Handlers return `ApiResult<T>`; any [`ServiceError`] converts with `?`
/// into the matching status code and a JSON body:
///
/// ```json
/// { "error": "forbidden", "message": "missing permission: documents.write" }
/// ```
///
/// | Service error | Status |
/// |---|---|
/// | `Denied(MissingContext(Caller))`, `Unauthenticated` | 401 |
/// | `Denied(..)` otherwise | 403 |
/// | `NotFound` | 404 |
/// | `Conflict` | 409 |
/// | `Validation` | 422 |
/// | `Configuration`, `Internal`, `Store` | 500 |
///
/// # Example
///
/// ```
/// use proptrack_api::error::{ApiError, ApiResult};
/// use axum::Json;
/// use serde_json::{json, Value};
///
/// async fn handler() -> ApiResult<Json<Value>> {
///     Err(ApiError::NotFound("document not found".to_string()))
/// }
/// ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use proptrack_shared::auth::authorization::{DenyReason, MissingContext};
use proptrack_shared::services::ServiceError;
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::ValidationErrors;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug)]
pub enum ApiError {
    /// 401
    Unauthorized(String),

    /// 403
    Forbidden(String),

    /// 404
    NotFound(String),

    /// 409, e.g. duplicate slug or email
    Conflict(String),

    /// 422
    ValidationError(Vec<ValidationErrorDetail>),

    /// 500, the deployment is missing seed data; retrying won't help
    Misconfigured(String),

    /// 500
    InternalError(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    pub field: String,
    pub message: String,
}

impl ValidationErrorDetail {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// JSON body of every error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable code, e.g. `"forbidden"`
    pub error: String,

    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::Misconfigured(msg) => write!(f, "Misconfigured: {}", msg),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Misconfigured(_) | ApiError::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let (error_code, message, details) = match self {
            ApiError::Unauthorized(msg) => ("unauthorized", msg, None),
            ApiError::Forbidden(msg) => ("forbidden", msg, None),
            ApiError::NotFound(msg) => ("not_found", msg, None),
            ApiError::Conflict(msg) => ("conflict", msg, None),
            ApiError::ValidationError(errors) => (
                "validation_error",
                "Request validation failed".to_string(),
                Some(errors),
            ),
            ApiError::Misconfigured(msg) => {
                tracing::error!("Configuration error: {}", msg);
                (
                    "configuration_error",
                    "The server is missing required setup data".to_string(),
                    None,
                )
            }
            ApiError::InternalError(msg) => {
                // Details stay in the logs
                tracing::error!("Internal error: {}", msg);
                (
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
            details,
        });

        (status, body).into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Denied(reason @ DenyReason::MissingContext(MissingContext::Caller)) => {
                ApiError::Unauthorized(reason.to_string())
            }
            ServiceError::Denied(reason) => ApiError::Forbidden(reason.to_string()),
            ServiceError::Unauthenticated(msg) => ApiError::Unauthorized(msg),
            ServiceError::NotFound(what) => ApiError::NotFound(format!("{} not found", what)),
            ServiceError::Conflict(msg) => ApiError::Conflict(msg),
            ServiceError::Validation { field, message } => {
                ApiError::ValidationError(vec![ValidationErrorDetail::new(field, message)])
            }
            ServiceError::Configuration(msg) => ApiError::Misconfigured(msg),
            ServiceError::Internal(msg) => ApiError::InternalError(msg),
            ServiceError::Store(err) => ApiError::InternalError(err.to_string()),
        }
    }
}

/// Flattens `validator` field errors into one detail per failed rule
impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        let mut details: Vec<ValidationErrorDetail> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| {
                    ValidationErrorDetail::new(
                        field.to_string(),
                        error
                            .message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| "Validation failed".to_string()),
                    )
                })
            })
            .collect();
        details.sort_by(|a, b| a.field.cmp(&b.field));

        ApiError::ValidationError(details)
    }
}
