use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::error::RegistrationError;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

impl RegistrationError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RegistrationError::ValidationError(_)
            | RegistrationError::DuplicateError(_)
            | RegistrationError::ChecksumMismatchError
            | RegistrationError::DecodeError(_) => StatusCode::BAD_REQUEST,
            RegistrationError::NotFoundError(_) => StatusCode::NOT_FOUND,
            RegistrationError::TimeoutError { .. } => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short label sent as the `error` field.
    pub fn title(&self) -> &'static str {
        match self {
            RegistrationError::ValidationError(_) => "Invalid request",
            RegistrationError::DuplicateError(_) => "Already registered",
            RegistrationError::ChecksumMismatchError => "Invalid checksum",
            RegistrationError::DecodeError(_) => "Invalid callback payload",
            RegistrationError::NotFoundError(_) => "Registration data not found",
            RegistrationError::UpstreamError { .. } => "Upstream service failed",
            RegistrationError::TimeoutError { .. } => "Upstream service timed out",
            _ => "Server error",
        }
    }
}

impl IntoResponse for RegistrationError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody {
            error: self.title(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Unwraps a JSON body, turning extractor rejections into validation errors.
pub fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, RegistrationError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| RegistrationError::ValidationError(rejection.body_text()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::registration::DuplicateField;
    use std::time::Duration;

    #[test]
    fn test_status_classes() {
        assert_eq!(
            RegistrationError::DuplicateError(DuplicateField::Phone).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            RegistrationError::ChecksumMismatchError.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            RegistrationError::NotFoundError("ORDER_1".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            RegistrationError::upstream("mail", "boom").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            RegistrationError::TimeoutError {
                service: "mail",
                timeout: Duration::from_secs(1)
            }
            .status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
    }

    #[test]
    fn test_duplicate_message_names_field() {
        let err = RegistrationError::DuplicateError(DuplicateField::Phone);
        assert_eq!(err.title(), "Already registered");
        assert_eq!(err.to_string(), "Phone number is already registered");
    }
}
