//! API error types

use std::time::Duration;

/// Fallback message when neither the server nor the status line says anything useful.
pub const GENERIC_CONNECTION_ERROR: &str = "Connection error";

/// Errors that can occur while talking to the data endpoint.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// HTTP error response from the API.
    #[error("HTTP {status}: {message}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Message extracted from the response body, if any.
        message: String,
        /// Canonical status text (e.g. "Not Found").
        status_text: Option<String>,
    },

    /// Network error during API call.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Request timed out and was cancelled locally.
    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    /// Invalid URL provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Failed to parse API response.
    #[error("Response parse error: {message}")]
    Parse {
        /// Description of the parse error.
        message: String,
        /// Raw response body, if available.
        body: Option<String>,
    },
}

impl ApiError {
    /// Creates a new HTTP error.
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
            status_text: reqwest::StatusCode::from_u16(status)
                .ok()
                .and_then(|code| code.canonical_reason())
                .map(str::to_string),
        }
    }

    /// Creates a new parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            body: None,
        }
    }

    /// Creates a new parse error with the raw response body.
    pub fn parse_with_body(message: impl Into<String>, body: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            body: Some(body.into()),
        }
    }

    /// Returns the HTTP status code if this is an HTTP error.
    ///
    /// Non-HTTP failures report `0`, the status a browser gives aborted requests.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Http { status, .. } => *status,
            Self::Network(e) => e.status().map(|s| s.as_u16()).unwrap_or(0),
            _ => 0,
        }
    }

    /// Returns `true` if this is a 401 response.
    pub fn is_unauthorized(&self) -> bool {
        self.status_code() == 401
    }

    /// Best available human-readable message.
    ///
    /// Prefers the server-provided message, then the HTTP status text, then a
    /// generic connection error string.
    pub fn display_message(&self) -> String {
        match self {
            Self::Http {
                message,
                status_text,
                ..
            } => {
                if !message.trim().is_empty() {
                    message.clone()
                } else if let Some(text) = status_text {
                    text.clone()
                } else {
                    GENERIC_CONNECTION_ERROR.to_string()
                }
            }
            Self::Timeout(_) => "Timed out".to_string(),
            Self::Parse { message, .. } | Self::InvalidUrl(message) => message.clone(),
            Self::Network(_) => GENERIC_CONNECTION_ERROR.to_string(),
        }
    }
}

/// Extracts a server-provided message from an error body.
///
/// Understands the usual ASP.NET shapes (`ExceptionMessage`, `Message`) and
/// OAuth error responses (`error_description`, `error`). Falls back to the raw
/// body when it is short plain text.
pub(crate) fn server_message(body: &str) -> String {
    if let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["ExceptionMessage", "Message", "message", "error_description", "error"] {
            if let Some(serde_json::Value::String(s)) = map.get(key) {
                return s.clone();
            }
        }
        return String::new();
    }

    let trimmed = body.trim();
    if trimmed.starts_with('<') || trimmed.len() > 512 {
        String::new()
    } else {
        trimmed.to_string()
    }
}
