//! Error types and HTTP error mapping for the advisory proxy

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Main error type for the advisory proxy
#[derive(Error, Debug)]
pub enum AdvisoryError {
    /// Missing or invalid configuration, most notably the upstream API key
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Client supplied a location that does not match "State, Country"
    #[error("Invalid input: {message}")]
    Validation { message: String },

    /// Any failure talking to the upstream completion API
    #[error("Upstream error: {message}")]
    Upstream {
        message: String,
        status: Option<u16>,
    },

    /// Request body the JSON extractor refused for reasons other than its
    /// content, e.g. an oversized body or a wrong content type
    #[error("Rejected request: {message}")]
    Rejected { status: StatusCode, message: String },
}

/// JSON body returned for every non-2xx response
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl AdvisoryError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a new upstream error without an HTTP status
    pub fn upstream<S: Into<String>>(message: S) -> Self {
        Self::Upstream {
            message: message.into(),
            status: None,
        }
    }

    /// Create a new upstream error for a non-success provider status
    pub fn upstream_status<S: Into<String>>(status: u16, message: S) -> Self {
        Self::Upstream {
            message: message.into(),
            status: Some(status),
        }
    }

    /// Create a new rejection carrying the extractor's status
    pub fn rejected<S: Into<String>>(status: StatusCode, message: S) -> Self {
        Self::Rejected {
            status,
            message: message.into(),
        }
    }

    /// HTTP status the error is surfaced with
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            AdvisoryError::Validation { .. } => StatusCode::BAD_REQUEST,
            AdvisoryError::Upstream { .. } => StatusCode::SERVICE_UNAVAILABLE,
            AdvisoryError::Rejected { status, .. } => *status,
            AdvisoryError::Config { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            AdvisoryError::Config { message }
            | AdvisoryError::Validation { message }
            | AdvisoryError::Upstream { message, .. }
            | AdvisoryError::Rejected { message, .. } => message.clone(),
        }
    }
}

impl IntoResponse for AdvisoryError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), "{self}");
        }
        let body = ErrorBody {
            error: self.user_message(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let config_err = AdvisoryError::config("missing API key");
        assert!(matches!(config_err, AdvisoryError::Config { .. }));

        let upstream_err = AdvisoryError::upstream_status(502, "bad gateway");
        assert!(matches!(
            upstream_err,
            AdvisoryError::Upstream {
                status: Some(502),
                ..
            }
        ));

        let validation_err = AdvisoryError::validation("no comma");
        assert!(matches!(validation_err, AdvisoryError::Validation { .. }));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AdvisoryError::validation("x").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AdvisoryError::upstream("x").status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AdvisoryError::config("x").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AdvisoryError::rejected(StatusCode::PAYLOAD_TOO_LARGE, "x").status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
    }

    #[test]
    fn test_user_messages() {
        let validation_err = AdvisoryError::validation("Location is required");
        assert_eq!(validation_err.user_message(), "Location is required");

        let upstream_err = AdvisoryError::upstream("Error from Perplexity API: Status 500");
        assert!(upstream_err.user_message().contains("Status 500"));

        let rejected = AdvisoryError::rejected(StatusCode::UNSUPPORTED_MEDIA_TYPE, "no json");
        assert_eq!(rejected.user_message(), "no json");
    }
}
