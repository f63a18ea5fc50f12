//! API error types and their JSON representation

use crate::auth::AuthError;
use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use syncgate_core::CoreError;
use thiserror::Error;

/// Machine-readable error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    Unauthenticated,
    Forbidden,
    InvalidArgument,
    NotFound,
    StorageUnavailable,
    RateLimited,
    Internal,
}

impl ErrorKind {
    /// Get the HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::InvalidArgument => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::StorageUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether a client should retry with backoff
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageUnavailable | Self::RateLimited)
    }
}

/// API error type
#[derive(Error, Debug)]
#[error("{kind:?}: {message}")]
pub struct ApiError {
    kind: ErrorKind,
    message: String,
    request_id: Option<String>,
}

impl ApiError {
    /// Create a new error
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            request_id: None,
        }
    }

    pub fn unauthenticated() -> Self {
        Self::new(ErrorKind::Unauthenticated, "authentication required")
    }

    pub fn forbidden() -> Self {
        Self::new(ErrorKind::Forbidden, "access denied")
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    pub fn rate_limited() -> Self {
        Self::new(ErrorKind::RateLimited, "please reduce your request rate")
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Attach the request id echoed in the body
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Get the message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Forbidden => Self::forbidden(),
            CoreError::InvalidArgument(msg) => Self::invalid_argument(msg),
            CoreError::NotFound(msg) => Self::new(ErrorKind::NotFound, msg),
            CoreError::StorageUnavailable(msg) => {
                tracing::warn!(error = %msg, "Storage unavailable");
                Self::new(ErrorKind::StorageUnavailable, "storage is temporarily unavailable")
            }
            CoreError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                Self::internal("internal error")
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::ServerMisconfigured => {
                tracing::error!("Request rejected: no credential mechanism is configured")
            }
            other => tracing::debug!(reason = %other, "Request rejected"),
        }
        Self::unauthenticated()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::invalid_argument(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::invalid_argument(rejection.body_text())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody<'a> {
    kind: ErrorKind,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_id: Option<&'a str>,
    retryable: bool,
}

#[derive(Serialize)]
struct ErrorEnvelope<'a> {
    error: ErrorBody<'a>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.kind.status_code();
        let request_id = self
            .request_id
            .clone()
            .or_else(crate::middleware::current_request_id);
        let body = Json(ErrorEnvelope {
            error: ErrorBody {
                kind: self.kind,
                message: &self.message,
                request_id: request_id.as_deref(),
                retryable: self.kind.is_retryable(),
            },
        });

        let mut response = (status, body).into_response();
        if self.kind == ErrorKind::StorageUnavailable {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, header::HeaderValue::from_static("1"));
        }
        response
    }
}
