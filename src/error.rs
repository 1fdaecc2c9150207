// HTTP API error types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::database::{DatabaseError, PageError};
use crate::services::{ServiceError, TenantError};

/// HTTP API error with its status code and client-facing message
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),
    TenantRequired(String),
    InvalidJson(String),
    HasDependents { message: String, data: Value },

    // 401 Unauthorized
    Unauthorized(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict
    Conflict(String),

    // 413 Payload Too Large
    PayloadTooLarge(String),

    // 500 Internal Server Error; `detail` is only shown when internal errors are exposed
    InternalServerError { message: String, detail: String },

    // 503 Service Unavailable
    ServiceUnavailable(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_)
            | ApiError::TenantRequired(_)
            | ApiError::InvalidJson(_)
            | ApiError::HasDependents { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::InternalServerError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::TenantRequired(msg)
            | ApiError::InvalidJson(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg)
            | ApiError::PayloadTooLarge(msg)
            | ApiError::ServiceUnavailable(msg) => msg,
            ApiError::HasDependents { message, .. } => message,
            ApiError::InternalServerError { message, .. } => message,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::TenantRequired(_) => "TENANT_REQUIRED",
            ApiError::InvalidJson(_) => "INVALID_JSON",
            ApiError::HasDependents { .. } => "HAS_RELATED_DATA",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            ApiError::InternalServerError { .. } => "INTERNAL_SERVER_ERROR",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }

    /// Failure envelope. `expose_internal` swaps the generic 500 message
    /// for the underlying error text.
    pub fn to_json(&self, expose_internal: bool) -> Value {
        let message = match self {
            ApiError::InternalServerError { detail, .. } if expose_internal => detail.as_str(),
            _ => self.message(),
        };
        let mut body = json!({
            "success": false,
            "message": message,
            "code": self.error_code(),
        });
        if let ApiError::HasDependents { data, .. } = self {
            body["data"] = data.clone();
        }
        body
    }
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn invalid_json(message: impl Into<String>) -> Self {
        ApiError::InvalidJson(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn internal(message: impl Into<String>, detail: impl Into<String>) -> Self {
        ApiError::InternalServerError { message: message.into(), detail: detail.into() }
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound(msg) => ApiError::not_found(msg),
            DatabaseError::ConfigMissing(_) | DatabaseError::InvalidDatabaseUrl => {
                tracing::error!("Database configuration error: {}", err);
                ApiError::service_unavailable("Database temporarily unavailable")
            }
            DatabaseError::QueryError(ref msg) => {
                tracing::error!("Database query error: {}", msg);
                ApiError::internal("An error occurred while processing your request", err.to_string())
            }
            DatabaseError::Sqlx(ref sqlx_err) => {
                tracing::error!("SQLx error: {}", sqlx_err);
                ApiError::internal("Database error occurred", sqlx_err.to_string())
            }
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(msg) => ApiError::BadRequest(msg),
            ServiceError::NotFound(msg) => ApiError::NotFound(msg),
            ServiceError::Conflict(msg) => ApiError::Conflict(msg),
            ServiceError::HasDependents { message, data } => ApiError::HasDependents { message, data },
            ServiceError::Database(db) => db.into(),
        }
    }
}

impl From<TenantError> for ApiError {
    fn from(err: TenantError) -> Self {
        match err {
            TenantError::Database(db) => db.into(),
            TenantError::Required => ApiError::TenantRequired(err.to_string()),
            TenantError::InvalidId(_) | TenantError::CompanyNotFound(_) => ApiError::BadRequest(err.to_string()),
        }
    }
}

impl From<PageError> for ApiError {
    fn from(err: PageError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

/// Unmasked failure body of a 500, carried as a response extension so
/// `middleware::errors` can swap it in when the app exposes internal errors.
#[derive(Debug, Clone)]
pub struct InternalErrorDetail(pub Value);

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let mut response = (self.status_code(), Json(self.to_json(false))).into_response();
        if let ApiError::InternalServerError { .. } = self {
            response.extensions_mut().insert(InternalErrorDetail(self.to_json(true)));
        }
        response
    }
}
