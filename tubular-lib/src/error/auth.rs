//! Authentication error types

/// Errors that can occur during authentication flows.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Invalid username or password.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// The refresh token was rejected; the session has been signed out.
    #[error("Token refresh failed: {message}")]
    RefreshFailed { message: String },

    /// A request required authentication but no usable token exists.
    #[error("Not authenticated")]
    NotAuthenticated,

    /// No authentication data has been stored.
    #[error("No authentication data exists")]
    NoStoredData,

    /// The stored token has already expired.
    #[error("Authentication token has already expired")]
    Expired,

    /// Network error during authentication.
    #[error("Network error during auth: {0}")]
    Network(#[from] reqwest::Error),

    /// Failed to parse authentication response.
    #[error("Auth response parse error: {0}")]
    Parse(String),
}
