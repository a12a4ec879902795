//! Web API settings shared by the HTTP data service and the session.

use std::time::Duration;

/// Default timeout for requests that do not carry their own.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(17_000);

/// Web API settings.
///
/// URLs may be absolute or relative to the data service's server address.
///
/// # Example
///
/// ```
/// use tubular_lib::service::WebApiConfig;
///
/// let config = WebApiConfig::default()
///     .with_base_url("/api")
///     .with_token_url("/api/token")
///     .with_refresh_tokens(true);
/// assert!(config.require_authentication);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct WebApiConfig {
    /// Requests under this prefix get the bearer header.
    pub base_url: String,
    /// Password grant endpoint. Never receives a bearer header.
    pub token_url: String,
    /// Refresh grant endpoint.
    pub refresh_token_url: String,
    pub enable_refresh_tokens: bool,
    pub require_authentication: bool,
    pub default_timeout: Duration,
    /// Append `noCache=<epoch ms>` to GET requests.
    pub no_cache: bool,
}

impl Default for WebApiConfig {
    fn default() -> Self {
        Self {
            base_url: "/api".to_string(),
            token_url: "/api/token".to_string(),
            refresh_token_url: "/api/token".to_string(),
            enable_refresh_tokens: false,
            require_authentication: true,
            default_timeout: DEFAULT_REQUEST_TIMEOUT,
            no_cache: true,
        }
    }
}

impl WebApiConfig {
    /// Sets the API base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Sets the token URL.
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    /// Sets the refresh token URL.
    pub fn with_refresh_token_url(mut self, url: impl Into<String>) -> Self {
        self.refresh_token_url = url.into();
        self
    }

    /// Enables or disables the refresh-token flow.
    pub fn with_refresh_tokens(mut self, enabled: bool) -> Self {
        self.enable_refresh_tokens = enabled;
        self
    }

    /// Sets whether API requests need a signed-in session.
    pub fn with_authentication(mut self, required: bool) -> Self {
        self.require_authentication = required;
        self
    }

    /// Sets the default request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Enables or disables GET cache busting.
    pub fn with_no_cache(mut self, enabled: bool) -> Self {
        self.no_cache = enabled;
        self
    }

    /// Settings for an open endpoint: no authentication, no refresh.
    pub fn anonymous() -> Self {
        Self::default().with_authentication(false)
    }
}
