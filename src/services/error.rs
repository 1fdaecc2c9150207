use serde_json::Value;
use thiserror::Error;

use crate::database::DatabaseError;
use crate::repository::WriteOutcome;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Business-rule failures, mapped to status codes by `ApiError`
#[derive(Debug, Error)]
pub enum ServiceError {
    /// 400
    #[error("{0}")]
    Validation(String),

    /// 404
    #[error("{0}")]
    NotFound(String),

    /// 409
    #[error("{0}")]
    Conflict(String),

    /// 400 with the blocking counts in `data`
    #[error("{message}")]
    HasDependents { message: String, data: Value },

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }
}

impl<T> WriteOutcome<T> {
    /// `Conflict` becomes 409 and `Missing` becomes 404
    pub fn into_result(self) -> ServiceResult<T> {
        match self {
            WriteOutcome::Written(row) => Ok(row),
            WriteOutcome::Conflict(message) => Err(ServiceError::conflict(message)),
            WriteOutcome::Missing(message) => Err(ServiceError::not_found(message)),
        }
    }
}

/// `Option` from a lookup becomes 404 with the given message
pub trait OrNotFound<T> {
    fn or_not_found(self, message: &'static str) -> ServiceResult<T>;
}

impl<T> OrNotFound<T> for Option<T> {
    fn or_not_found(self, message: &'static str) -> ServiceResult<T> {
        self.ok_or_else(|| ServiceError::not_found(message))
    }
}
