use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::database::{Pagination, WindowPagination};
use crate::services::{Listed, Searched};

/// `pagination` block of a success envelope
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum Paging {
    Page(Pagination),
    Window(WindowPagination),
}

/// Success envelope: `{ success: true, data?, message?, pagination? }`
#[derive(Debug)]
pub struct ApiResponse<T: Serialize> {
    pub data: Option<T>,
    pub message: Option<String>,
    pub pagination: Option<Paging>,
    pub status_code: Option<StatusCode>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a successful API response with default 200 status
    pub fn success(data: T) -> Self {
        Self {
            data: Some(data),
            message: None,
            pagination: None,
            status_code: None,
        }
    }

    /// Create an API response with custom status code
    pub fn with_status(data: T, status_code: StatusCode) -> Self {
        Self {
            status_code: Some(status_code),
            ..Self::success(data)
        }
    }

    /// Create a 201 Created response
    pub fn created(data: T) -> Self {
        Self::with_status(data, StatusCode::CREATED)
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl ApiResponse<()> {
    /// `{ success: true, message }` with no `data`
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            data: None,
            message: Some(message.into()),
            pagination: None,
            status_code: None,
        }
    }
}

impl<T: Serialize> From<Listed<T>> for ApiResponse<Vec<T>> {
    fn from(listed: Listed<T>) -> Self {
        Self {
            pagination: Some(Paging::Page(listed.pagination)),
            ..Self::success(listed.rows)
        }
    }
}

impl<T: Serialize> From<Searched<T>> for ApiResponse<Vec<T>> {
    fn from(searched: Searched<T>) -> Self {
        Self {
            pagination: Some(Paging::Window(searched.pagination)),
            ..Self::success(searched.rows)
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = self.status_code.unwrap_or(StatusCode::OK);

        let mut envelope = Map::new();
        envelope.insert("success".into(), Value::Bool(true));

        if let Some(data) = &self.data {
            match serde_json::to_value(data) {
                Ok(value) => {
                    envelope.insert("data".into(), value);
                }
                Err(e) => {
                    tracing::error!("Failed to serialize response data: {}", e);
                    return (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(json!({
                            "success": false,
                            "message": "Failed to serialize response data",
                            "code": "INTERNAL_SERVER_ERROR"
                        })),
                    )
                        .into_response();
                }
            }
        }
        if let Some(message) = self.message {
            envelope.insert("message".into(), Value::String(message));
        }
        if let Some(pagination) = &self.pagination {
            envelope.insert("pagination".into(), json!(pagination));
        }

        (status, Json(Value::Object(envelope))).into_response()
    }
}

pub type ApiResult<T> = Result<ApiResponse<T>, crate::error::ApiError>;
