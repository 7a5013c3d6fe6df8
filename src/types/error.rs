//! Error types for Madang
//!
//! Every rejection the core makes is a local decision surfaced through
//! [`MadangError`]. Nothing here is retried automatically.

use hyper::StatusCode;

/// Main error type for Madang operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum MadangError {
    /// Language gate failures and malformed text fields
    #[error("Validation failed: {reason}")]
    Validation { reason: String, hint: Option<String> },

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {message}")]
    Forbidden { message: String, hint: Option<String> },

    #[error("Not found: {0}")]
    NotFound(String),

    /// Duplicate content or duplicate unique name
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Rate limited: retry after {retry_after_secs}s")]
    RateLimited { message: String, retry_after_secs: u64 },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MadangError {
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
            hint: None,
        }
    }

    pub fn forbidden(message: impl Into<String>, hint: Option<&str>) -> Self {
        Self::Forbidden {
            message: message.into(),
            hint: hint.map(str::to_string),
        }
    }

    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Database(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing message (without the variant prefix)
    pub fn message(&self) -> String {
        match self {
            Self::Validation { reason, .. } => reason.clone(),
            Self::Forbidden { message, .. } => message.clone(),
            Self::RateLimited { message, .. } => message.clone(),
            Self::BadRequest(m)
            | Self::Unauthorized(m)
            | Self::NotFound(m)
            | Self::Conflict(m) => m.clone(),
            // Store and internal failures are not echoed to clients
            Self::Database(_) | Self::Internal(_) => "서버 오류가 발생했습니다.".to_string(),
        }
    }

    /// Optional follow-up hint for the client
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::Validation { hint, .. } | Self::Forbidden { hint, .. } => hint.clone(),
            Self::RateLimited { retry_after_secs, .. } => {
                Some(format!("{}초 후에 다시 시도해주세요.", retry_after_secs))
            }
            Self::Unauthorized(_) => {
                Some("Authorization: Bearer YOUR_API_KEY 헤더를 포함해주세요.".to_string())
            }
            _ => None,
        }
    }

    /// Seconds until the caller may retry, for rate-limit rejections
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after_secs, .. } => Some(*retry_after_secs),
            _ => None,
        }
    }
}

impl From<std::io::Error> for MadangError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for MadangError {
    fn from(err: serde_json::Error) -> Self {
        Self::BadRequest(format!("JSON error: {}", err))
    }
}

impl From<hyper::Error> for MadangError {
    fn from(err: hyper::Error) -> Self {
        Self::Internal(format!("HTTP error: {}", err))
    }
}

impl From<mongodb::error::Error> for MadangError {
    fn from(err: mongodb::error::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<bson::ser::Error> for MadangError {
    fn from(err: bson::ser::Error) -> Self {
        Self::Database(format!("BSON encode failed: {}", err))
    }
}

impl From<bson::de::Error> for MadangError {
    fn from(err: bson::de::Error) -> Self {
        Self::Database(format!("BSON decode failed: {}", err))
    }
}

/// Result type alias for Madang operations
pub type Result<T> = std::result::Result<T, MadangError>;
