//! Tagged HTTP errors.
//!
//! # Responsibilities
//! - Carry an HTTP status, a business code and a message
//! - Infer the business code from the status when none is given
//! - Map bind and validation failures to their client-error forms
//!
//! # Design Decisions
//! - Business codes are strings so services can add their own
//! - Errors raised from internal failures are marked unexposed; safe mode
//!   replaces their message before it reaches the client

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::binding::BindError;
use crate::http::validate::ValidationError;

pub const CODE_OK: &str = "OK";
pub const CODE_BAD_REQUEST: &str = "BAD_REQUEST";
pub const CODE_UNAUTHORIZED: &str = "UNAUTHORIZED";
pub const CODE_FORBIDDEN: &str = "FORBIDDEN";
pub const CODE_NOT_FOUND: &str = "NOT_FOUND";
pub const CODE_CONFLICT: &str = "CONFLICT";
pub const CODE_TOO_MANY_REQUESTS: &str = "TOO_MANY_REQUESTS";
pub const CODE_VALIDATION_FAILED: &str = "VALIDATION_FAILED";
pub const CODE_REQUEST_ENTITY_TOO_LARGE: &str = "REQUEST_ENTITY_TOO_LARGE";
pub const CODE_INTERNAL_ERROR: &str = "INTERNAL_ERROR";
/// Code of 4xx statuses without a dedicated one.
pub const CODE_ERROR: &str = "ERROR";

/// Message shown in place of an unexposed server error in safe mode.
pub const MASKED_MESSAGE: &str = "Internal Server Error";

/// Business code for `status` when the error names none.
pub fn infer_code(status: StatusCode) -> &'static str {
    match status {
        StatusCode::BAD_REQUEST => CODE_BAD_REQUEST,
        StatusCode::UNAUTHORIZED => CODE_UNAUTHORIZED,
        StatusCode::FORBIDDEN => CODE_FORBIDDEN,
        StatusCode::NOT_FOUND => CODE_NOT_FOUND,
        StatusCode::CONFLICT => CODE_CONFLICT,
        StatusCode::TOO_MANY_REQUESTS => CODE_TOO_MANY_REQUESTS,
        StatusCode::PAYLOAD_TOO_LARGE => CODE_REQUEST_ENTITY_TOO_LARGE,
        StatusCode::INTERNAL_SERVER_ERROR => CODE_INTERNAL_ERROR,
        status if status.is_client_error() => CODE_ERROR,
        _ => CODE_INTERNAL_ERROR,
    }
}

/// An error the response collaborator can render.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct HttpError {
    status: StatusCode,
    code: String,
    message: String,
    expose: bool,
}

impl HttpError {
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        let code = code.into();
        Self {
            code: if code.is_empty() { infer_code(status).to_string() } else { code },
            status,
            message: message.into(),
            expose: true,
        }
    }

    /// An error whose business code is inferred from `status`.
    pub fn from_status(status: StatusCode, message: impl Into<String>) -> Self {
        Self::new(status, infer_code(status), message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::from_status(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::from_status(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::from_status(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::from_status(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::from_status(StatusCode::CONFLICT, message)
    }

    pub fn too_many_requests(message: impl Into<String>) -> Self {
        Self::from_status(StatusCode::TOO_MANY_REQUESTS, message)
    }

    pub fn payload_too_large() -> Self {
        Self::from_status(StatusCode::PAYLOAD_TOO_LARGE, "Request Entity Too Large")
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, CODE_VALIDATION_FAILED, message)
    }

    /// A server-side failure whose detail is hidden in safe mode.
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            expose: false,
            ..Self::from_status(StatusCode::INTERNAL_SERVER_ERROR, message)
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_exposed(&self) -> bool {
        self.expose
    }

    /// Message to send to the client.
    pub fn public_message(&self, safe_mode: bool) -> &str {
        if safe_mode && !self.expose && self.status.is_server_error() {
            MASKED_MESSAGE
        } else {
            &self.message
        }
    }
}

impl From<BindError> for HttpError {
    fn from(err: BindError) -> Self {
        if err.is_payload_too_large() {
            HttpError::payload_too_large()
        } else {
            HttpError::bad_request(err.to_string())
        }
    }
}

impl From<ValidationError> for HttpError {
    fn from(err: ValidationError) -> Self {
        HttpError::validation(err.to_string())
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        (self.status, self.message).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_inference() {
        assert_eq!(infer_code(StatusCode::NOT_FOUND), CODE_NOT_FOUND);
        assert_eq!(infer_code(StatusCode::PAYLOAD_TOO_LARGE), CODE_REQUEST_ENTITY_TOO_LARGE);
        assert_eq!(infer_code(StatusCode::IM_A_TEAPOT), CODE_ERROR);
        assert_eq!(infer_code(StatusCode::BAD_GATEWAY), CODE_INTERNAL_ERROR);
    }

    #[test]
    fn test_empty_code_is_inferred() {
        let err = HttpError::new(StatusCode::CONFLICT, "", "taken");
        assert_eq!(err.code(), CODE_CONFLICT);
        assert_eq!(HttpError::new(StatusCode::CONFLICT, "USER_EXISTS", "taken").code(), "USER_EXISTS");
    }

    #[test]
    fn test_bind_error_mapping() {
        let too_large = HttpError::from(BindError::PayloadTooLarge { limit: 10 });
        assert_eq!(too_large.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(too_large.code(), CODE_REQUEST_ENTITY_TOO_LARGE);

        let decode = HttpError::from(BindError::decode("json: unknown field \"x\""));
        assert_eq!(decode.status(), StatusCode::BAD_REQUEST);
        assert_eq!(decode.code(), CODE_BAD_REQUEST);
        assert_eq!(decode.message(), "json: unknown field \"x\"");
    }

    #[test]
    fn test_validation_mapping() {
        let err = HttpError::from(ValidationError::new("name is required"));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), CODE_VALIDATION_FAILED);
    }

    #[test]
    fn test_safe_mode_masks_internal_only() {
        let internal = HttpError::internal("db password rejected");
        assert_eq!(internal.public_message(true), MASKED_MESSAGE);
        assert_eq!(internal.public_message(false), "db password rejected");

        let explicit = HttpError::from_status(StatusCode::SERVICE_UNAVAILABLE, "maintenance");
        assert_eq!(explicit.public_message(true), "maintenance");
    }
}
