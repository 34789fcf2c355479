use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Errors returned by every storefront API call.
///
/// `Clone` because a single refresh failure is delivered to every call that
/// was waiting on it.
#[derive(Error, Debug, Clone)]
pub enum ApiError {
    #[error("Unauthorized - session may be expired")]
    Unauthorized { message: Option<String> },

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request ({status}): {message}")]
    BadRequest { status: StatusCode, message: String },

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error ({status}): {message}")]
    ServerError { status: StatusCode, message: String },

    #[error("Unexpected status {status}: {message}")]
    Unexpected { status: StatusCode, message: String },

    #[error("Request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid request configuration: {0}")]
    InvalidRequest(String),

    #[error("Session refresh failed: {0}")]
    RefreshFailed(Box<ApiError>),

    #[error("Session refresh was abandoned before it settled")]
    RefreshAbandoned,
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Shape of the JSON error bodies the storefront backend sends.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Pull the human readable message out of an error body.
    fn server_message(body: &str) -> Option<String> {
        if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
            if let Some(message) = parsed.message.or(parsed.error) {
                return Some(message);
            }
        }
        let trimmed = body.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self::truncate_body(trimmed))
        }
    }

    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let message = Self::server_message(body);
        let text = message.clone().unwrap_or_default();
        match status.as_u16() {
            401 => ApiError::Unauthorized { message },
            403 => ApiError::AccessDenied(text),
            404 => ApiError::NotFound(text),
            400 | 409 | 422 => ApiError::BadRequest { status, message: text },
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError { status, message: text },
            _ => ApiError::Unexpected { status, message: text },
        }
    }

    /// HTTP status behind this error, when the server produced one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Unauthorized { .. } => Some(StatusCode::UNAUTHORIZED),
            ApiError::AccessDenied(_) => Some(StatusCode::FORBIDDEN),
            ApiError::NotFound(_) => Some(StatusCode::NOT_FOUND),
            ApiError::RateLimited => Some(StatusCode::TOO_MANY_REQUESTS),
            ApiError::BadRequest { status, .. }
            | ApiError::ServerError { status, .. }
            | ApiError::Unexpected { status, .. } => Some(*status),
            ApiError::RefreshFailed(inner) => inner.status(),
            ApiError::Timeout
            | ApiError::Network(_)
            | ApiError::InvalidResponse(_)
            | ApiError::InvalidRequest(_)
            | ApiError::RefreshAbandoned => None,
        }
    }

    /// Server supplied message, if any.
    pub fn message(&self) -> Option<&str> {
        match self {
            ApiError::Unauthorized { message } => message.as_deref(),
            ApiError::AccessDenied(message) | ApiError::NotFound(message) => {
                Some(message.as_str()).filter(|m| !m.is_empty())
            }
            ApiError::BadRequest { message, .. }
            | ApiError::ServerError { message, .. }
            | ApiError::Unexpected { message, .. } => {
                Some(message.as_str()).filter(|m| !m.is_empty())
            }
            ApiError::RefreshFailed(inner) => inner.message(),
            _ => None,
        }
    }

    /// True for the credential-expired condition that starts a refresh cycle.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else if err.is_decode() {
            ApiError::InvalidResponse(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_maps_unauthorized() {
        let err = ApiError::from_status(StatusCode::UNAUTHORIZED, r#"{"message":"jwt expired"}"#);
        assert!(err.is_unauthorized());
        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
        assert_eq!(err.message(), Some("jwt expired"));
    }

    #[test]
    fn test_from_status_other_codes() {
        assert!(matches!(
            ApiError::from_status(StatusCode::FORBIDDEN, "nope"),
            ApiError::AccessDenied(_)
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::NOT_FOUND, ""),
            ApiError::NotFound(_)
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::UNPROCESSABLE_ENTITY, r#"{"error":"bad email"}"#),
            ApiError::BadRequest { .. }
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::TOO_MANY_REQUESTS, ""),
            ApiError::RateLimited
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::BAD_GATEWAY, "upstream"),
            ApiError::ServerError { .. }
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::IM_A_TEAPOT, ""),
            ApiError::Unexpected { .. }
        ));
    }

    #[test]
    fn test_message_falls_back_to_error_field_and_text() {
        let err = ApiError::from_status(StatusCode::CONFLICT, r#"{"error":"already in cart"}"#);
        assert_eq!(err.message(), Some("already in cart"));

        let err = ApiError::from_status(StatusCode::INTERNAL_SERVER_ERROR, "  plain text  ");
        assert_eq!(err.message(), Some("plain text"));

        let err = ApiError::from_status(StatusCode::NOT_FOUND, "");
        assert_eq!(err.message(), None);
    }

    #[test]
    fn test_truncate_body() {
        let long = "x".repeat(MAX_ERROR_BODY_LENGTH + 20);
        let truncated = ApiError::truncate_body(&long);
        assert!(truncated.starts_with(&"x".repeat(MAX_ERROR_BODY_LENGTH)));
        assert!(truncated.contains("truncated, 520 total bytes"));

        // Never split a multi-byte character
        let accented = "é".repeat(MAX_ERROR_BODY_LENGTH);
        let truncated = ApiError::truncate_body(&accented);
        assert!(truncated.contains("truncated"));
    }

    #[test]
    fn test_refresh_failed_delegates_status_and_message() {
        let inner = ApiError::from_status(StatusCode::UNAUTHORIZED, r#"{"message":"refresh token revoked"}"#);
        let err = ApiError::RefreshFailed(Box::new(inner));
        assert!(!err.is_unauthorized());
        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
        assert_eq!(err.message(), Some("refresh token revoked"));
    }
}
