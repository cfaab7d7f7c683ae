use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Main Error Type
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppError {
    pub code: ErrorCode,
    pub message: String,
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    // Convenience constructors
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigurationError, message)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {}

// ============================================================================
// Error Codes
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCode {
    // Client errors (4xx)
    BadRequest,

    // Server errors (5xx)
    Internal,
    ConfigurationError,
}

impl ErrorCode {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::BadRequest => 400,
            Self::Internal => 500,
            Self::ConfigurationError => 500,
        }
    }

    pub fn is_server_error(&self) -> bool {
        self.http_status() >= 500
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::BadRequest => "BAD_REQUEST",
            Self::Internal => "INTERNAL_ERROR",
            Self::ConfigurationError => "CONFIGURATION_ERROR",
        };
        write!(f, "{}", s)
    }
}

// ============================================================================
// Result Type Alias
// ============================================================================

pub type Result<T> = std::result::Result<T, AppError>;

// ============================================================================
// Error Response for HTTP
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: AppError,
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error: AppError) -> Self {
        Self {
            error,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

// ============================================================================
// Error Conversion Implementations
// ============================================================================

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        Self::internal(format!("HTTP client error: {}", err))
    }
}

// ============================================================================
// HTTP Response Conversion
// ============================================================================

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;
        use axum::Json;

        log_error(&self);

        let status = StatusCode::from_u16(self.code.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let response = ErrorResponse::new(self);

        (status, Json(response)).into_response()
    }
}

// ============================================================================
// Helpers
// ============================================================================

pub fn log_error(error: &AppError) {
    if error.code.is_server_error() {
        log::error!("{}", error);
    } else {
        log::warn!("{}", error);
    }
}

// ============================================================================
// Tests
// ============================================================================
