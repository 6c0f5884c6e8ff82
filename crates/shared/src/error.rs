use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    NotFound,
    Forbidden,
    InvalidArgument,
    Conflict,
    StoreUnavailable,
    Internal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Failure of a session read or mutation.
///
/// `NotFound`, `Forbidden` and `InvalidArgument` are terminal. `StoreUnavailable` and
/// `Conflict` may be retried by the caller with backoff; the engine never retries them
/// on its own beyond re-running a conditional write.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("conflicting concurrent write: {0}")]
    Conflict(String),
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl SessionError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::Forbidden(_) => ErrorCode::Forbidden,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Conflict(_) => ErrorCode::Conflict,
            Self::StoreUnavailable(_) => ErrorCode::StoreUnavailable,
            Self::Internal(_) => ErrorCode::Internal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_) | Self::Conflict(_))
    }
}

impl From<SessionError> for ApiError {
    fn from(value: SessionError) -> Self {
        let message = match &value {
            SessionError::NotFound(m)
            | SessionError::Forbidden(m)
            | SessionError::InvalidArgument(m)
            | SessionError::Conflict(m)
            | SessionError::StoreUnavailable(m)
            | SessionError::Internal(m) => m.clone(),
        };
        Self {
            code: value.code(),
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_failures_are_retryable() {
        assert!(SessionError::StoreUnavailable("io".into()).is_retryable());
        assert!(SessionError::Conflict("version".into()).is_retryable());
        assert!(!SessionError::forbidden("author only").is_retryable());
        assert!(!SessionError::not_found("board").is_retryable());
        assert!(!SessionError::invalid("empty").is_retryable());
    }

    #[test]
    fn api_error_keeps_code_and_message() {
        let api: ApiError = SessionError::forbidden("only the author may edit").into();
        assert_eq!(api.code, ErrorCode::Forbidden);
        assert_eq!(api.message, "only the author may edit");
        let json = serde_json::to_value(&api).expect("json");
        assert_eq!(json["code"], "forbidden");
    }
}
