//! Structured HTTP errors (`application/problem+json`).

use crate::error::{Error, ErrorKind};
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// `error_code` for malformed or missing input.
pub const CODE_VALIDATION: u16 = 1;
/// `error_code` for a missing owner, car or job.
pub const CODE_NOT_FOUND: u16 = 2;
/// `error_code` for persistence failures.
pub const CODE_STORE: u16 = 3;

/// API HTTP error
#[derive(Debug)]
pub struct ApiError {
    /// HTTP status code
    pub http_code: StatusCode,
    /// Error body
    pub body: ErrorBody,
}

/// Error body serialized in JSON responses
#[derive(Debug, Serialize, Deserialize, Default, PartialEq)]
pub struct ErrorBody {
    /// Short error title
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    /// Detailed error description
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub detail: String,
    /// Error code for client handling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<u16>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.body.detail.is_empty() {
            write!(f, "{}: {}", self.body.title, self.body.detail)
        } else {
            write!(f, "{}", self.body.title)
        }
    }
}

impl std::error::Error for ApiError {}

impl ApiError {
    pub fn new(http_code: StatusCode) -> Self {
        Self {
            http_code,
            body: ErrorBody::default(),
        }
    }

    /// Build Bad Request (400) error
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST)
            .title("Bad Request")
            .detail(detail)
            .error_code(CODE_VALIDATION)
    }

    /// Build Not Found (404) error
    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND)
            .title("Not Found")
            .detail(detail)
            .error_code(CODE_NOT_FOUND)
    }

    /// Build Internal Server Error (500)
    pub fn internal(cause: impl fmt::Display) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR)
            .title("Internal Server Error")
            .detail(cause.to_string())
            .error_code(CODE_STORE)
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.body.title = title.into();
        self
    }

    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.body.detail = detail.into();
        self
    }

    pub fn error_code(mut self, code: u16) -> Self {
        self.body.error_code = Some(code);
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::to_string(&self.body).unwrap_or_default();

        (
            self.http_code,
            [(header::CONTENT_TYPE, "application/problem+json")],
            body,
        )
            .into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err.kind() {
            ErrorKind::Validation => ApiError::bad_request(err.to_string()),
            ErrorKind::NotFound => ApiError::not_found(err.to_string()),
            ErrorKind::Store => {
                error!("Request failed on store: {}", err);
                ApiError::internal(err)
            }
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::bad_request(format!("malformed request body: {}", err))
    }
}

/// Type alias for handler results
pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let err = ApiError::from(Error::ValidationError("payment is required".to_string()));
        assert_eq!(err.http_code, StatusCode::BAD_REQUEST);
        assert_eq!(err.body.error_code, Some(CODE_VALIDATION));

        let err = ApiError::from(Error::not_found("job", 4u64));
        assert_eq!(err.http_code, StatusCode::NOT_FOUND);
        assert_eq!(err.body.detail, "Not found: job 4");

        let err = ApiError::from(Error::StoreError("disk full".to_string()));
        assert_eq!(err.http_code, StatusCode::INTERNAL_SERVER_ERROR);

        let err = ApiError::from(Error::VersionMismatch {
            expected: 1,
            found: 2,
        });
        assert_eq!(err.http_code, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_error_body_skips_empty_fields() {
        let body = ErrorBody {
            title: "Not Found".to_string(),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_string(&body).unwrap(),
            r#"{"title":"Not Found"}"#
        );
    }

    #[test]
    fn test_response_is_problem_json() {
        let response = ApiError::not_found("Not found: job 1").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/problem+json"
        );
    }
}
