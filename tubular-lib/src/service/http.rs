//! HTTP data service with bearer authentication.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde_json::Map;
use serde_json::Value;
use url::Url;

use super::DataService;
use super::WebApiConfig;
use crate::api::DataRequest;
use crate::api::Method;
use crate::api::Payload;
use crate::api::append_query;
use crate::api::url_with_key;
use crate::auth::SessionContext;
use crate::auth::SessionEvent;
use crate::auth::UserData;
use crate::auth::exchange::TokenExchange;
use crate::error::ApiError;
use crate::error::AuthError;
use crate::error::ConfigError;
use crate::error::server_message;

/// Data service talking JSON over HTTP.
///
/// Relative request URLs are resolved against the server address. Requests
/// under [`WebApiConfig::base_url`] carry the session's bearer token; a 401
/// triggers at most one refresh-and-replay when refresh tokens are enabled.
///
/// Cheap to clone (uses `Arc` internally).
///
/// # Example
///
/// ```no_run
/// use tubular_lib::auth::SessionContext;
/// use tubular_lib::service::{HttpDataService, WebApiConfig};
///
/// let service = HttpDataService::builder()
///     .server("https://orders.example.com")
///     .session(SessionContext::in_memory())
///     .config(WebApiConfig::default().with_refresh_tokens(true))
///     .build()?;
/// # Ok::<(), tubular_lib::error::ConfigError>(())
/// ```
#[derive(Clone)]
pub struct HttpDataService {
    inner: Arc<HttpDataServiceInner>,
}

struct HttpDataServiceInner {
    server: Url,
    base_url: String,
    token_url: String,
    refresh_token_url: String,
    config: WebApiConfig,
    session: SessionContext,
    http_client: Client,
}

impl std::fmt::Debug for HttpDataService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpDataService")
            .field("server", &self.inner.server.as_str())
            .field("base_url", &self.inner.base_url)
            .finish_non_exhaustive()
    }
}

impl HttpDataService {
    /// Creates a new builder for constructing a service.
    pub fn builder() -> HttpDataServiceBuilder<Missing, Missing> {
        HttpDataServiceBuilder::new()
    }

    pub fn session(&self) -> &SessionContext {
        &self.inner.session
    }

    pub fn config(&self) -> &WebApiConfig {
        &self.inner.config
    }

    /// Resolves a possibly relative URL against the server address.
    pub fn resolve(&self, url: &str) -> Result<Url, ApiError> {
        self.inner
            .server
            .join(url)
            .map_err(|e| ApiError::InvalidUrl(format!("{url}: {e}")))
    }

    fn is_api_url(&self, url: &str) -> bool {
        url.starts_with(&self.inner.base_url) && url != self.inner.token_url
    }

    fn refresh_allowed(&self, url: &str) -> bool {
        let config = &self.inner.config;
        self.is_api_url(url)
            && config.enable_refresh_tokens
            && config.require_authentication
            && self.inner.session.refresh_token().is_some()
    }

    fn exchange(&self) -> TokenExchange<'_> {
        TokenExchange {
            http_client: &self.inner.http_client,
            token_url: &self.inner.token_url,
            refresh_token_url: &self.inner.refresh_token_url,
        }
    }

    /// Signs in with the password grant.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<UserData, AuthError> {
        let session = &self.inner.session;
        session.remove_authentication();

        let token = self.exchange().password(username, password).await?;
        session.init_auth(&token, Some(username));
        log::info!("Signed in as '{}'", session.user_data().username);
        session.notify(SessionEvent::SignedIn {
            username: session.user_data().username,
        });

        Ok(session.user_data())
    }

    /// Refreshes the session token. Concurrent callers share one exchange.
    ///
    /// `stale_token` is the token the caller saw rejected; if another task has
    /// already replaced it, no new exchange is made.
    async fn refresh_session(&self, stale_token: Option<&str>) -> Result<(), AuthError> {
        let session = &self.inner.session;
        let _guard = session.refresh_lock().lock().await;

        if session.bearer_token().as_deref() != stale_token && !session.is_bearer_token_expired() {
            return Ok(());
        }

        let refresh_token = session.refresh_token().ok_or(AuthError::NotAuthenticated)?;
        match self.exchange().refresh(&refresh_token).await {
            Ok(token) => {
                session.init_auth(&token, None);
                session.notify(SessionEvent::TokenRefreshed);
                log::debug!("Bearer token refreshed");
                Ok(())
            }
            Err(e) => {
                log::warn!("Token refresh failed: {}", e);
                session.sign_out();
                Err(e)
            }
        }
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        payload: Option<&Payload>,
        token: Option<&str>,
    ) -> Result<Option<Value>, ApiError> {
        let mut request = self.inner.http_client.request(method.into(), url);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(payload) = payload {
            request = request.json(payload);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ApiError::http(status.as_u16(), server_message(&body)));
        }

        if body.trim().is_empty() {
            return Ok(Some(Value::Null));
        }

        Ok(Some(serde_json::from_str(&body).unwrap_or(Value::String(body))))
    }

    async fn dispatch(&self, request: &DataRequest, url: &str) -> Result<Option<Value>, ApiError> {
        let config = &self.inner.config;
        let session = &self.inner.session;

        let wants_token =
            self.is_api_url(url) && config.require_authentication && request.require_authentication;
        let token = if wants_token {
            session.bearer_token()
        } else {
            None
        };

        // Skip the round trip when the token is known to be stale.
        let skip_to_refresh = token.is_some()
            && config.enable_refresh_tokens
            && session.refresh_token().is_some()
            && session.is_bearer_token_expired();

        let first = if skip_to_refresh {
            Err(ApiError::http(401, "expired token"))
        } else {
            self.send(request.method, url, request.payload.as_ref(), token.as_deref())
                .await
        };

        match first {
            Err(e) if e.is_unauthorized() && self.refresh_allowed(url) => {
                if let Err(auth) = self.refresh_session(token.as_deref()).await {
                    return Err(ApiError::http(401, auth.to_string()));
                }
                let token = session.bearer_token();
                let replay = self
                    .send(request.method, url, request.payload.as_ref(), token.as_deref())
                    .await;
                if replay.as_ref().is_err_and(ApiError::is_unauthorized) {
                    session.sign_out();
                }
                replay
            }
            Err(e) if e.is_unauthorized() => {
                session.sign_out();
                Err(e)
            }
            other => other,
        }
    }

    fn request_url(&self, request: &DataRequest) -> Result<String, ApiError> {
        let mut url = self.resolve(&request.url)?.to_string();
        if self.inner.config.no_cache
            && request.method == Method::Get
            && !url.contains(".htm")
            && !url.contains("blob:")
        {
            url = append_query(&url, "noCache", &Utc::now().timestamp_millis().to_string());
        }
        Ok(url)
    }

    /// GET a URL.
    pub async fn get(&self, url: &str) -> Result<Option<Value>, ApiError> {
        self.retrieve(DataRequest::get(url)).await
    }

    /// GET `<url><key>`, keeping the query string of `url` and adding the
    /// timezone offset.
    pub async fn get_by_key(&self, url: &str, key: &str) -> Result<Option<Value>, ApiError> {
        self.retrieve(DataRequest::get(url_with_key(url, key))).await
    }

    /// POST a JSON body.
    pub async fn post(&self, url: &str, data: Map<String, Value>) -> Result<Option<Value>, ApiError> {
        self.retrieve(DataRequest::new(url, Method::Post).with_payload(Payload::Record(data)))
            .await
    }

    /// PUT a JSON body.
    pub async fn put(&self, url: &str, data: Map<String, Value>) -> Result<Option<Value>, ApiError> {
        self.retrieve(DataRequest::new(url, Method::Put).with_payload(Payload::Record(data)))
            .await
    }

    /// DELETE a URL.
    pub async fn delete(&self, url: &str) -> Result<Option<Value>, ApiError> {
        self.retrieve(DataRequest::new(url, Method::Delete)).await
    }
}

#[async_trait]
impl DataService for HttpDataService {
    async fn retrieve(&self, request: DataRequest) -> Result<Option<Value>, ApiError> {
        let config = &self.inner.config;

        if !config.enable_refresh_tokens
            && config.require_authentication
            && !self.inner.session.is_authenticated()
        {
            log::debug!("Not authenticated, skipping {} {}", request.method.as_str(), request.url);
            return Ok(None);
        }

        let url = self.request_url(&request)?;
        let timeout = request.timeout.unwrap_or(config.default_timeout);
        log::debug!("{} {} (timeout {:?})", request.method.as_str(), url, timeout);

        match tokio::time::timeout(timeout, self.dispatch(&request, &url)).await {
            Ok(result) => result,
            Err(_) => {
                log::warn!("{} {} timed out", request.method.as_str(), url);
                Err(ApiError::Timeout(timeout))
            }
        }
    }
}

// =============================================================================
// Typestate Builder
// =============================================================================

/// Marker type for missing required builder fields.
pub struct Missing;

/// Marker type for set builder fields.
pub struct Set<T>(T);

/// Builder for constructing an [`HttpDataService`].
///
/// Uses the typestate pattern to ensure required fields are set at compile time.
///
/// # Required Fields
///
/// - `server` - Address relative URLs are resolved against
/// - `session` - The [`SessionContext`] holding tokens
pub struct HttpDataServiceBuilder<Server, Session> {
    server: Server,
    session: Session,
    config: WebApiConfig,
    connect_timeout: Option<Duration>,
    http_client: Option<Client>,
}

impl HttpDataServiceBuilder<Missing, Missing> {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            server: Missing,
            session: Missing,
            config: WebApiConfig::default(),
            connect_timeout: None,
            http_client: None,
        }
    }
}

impl Default for HttpDataServiceBuilder<Missing, Missing> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> HttpDataServiceBuilder<Missing, S> {
    /// Sets the server address, e.g. `https://orders.example.com`.
    pub fn server(self, url: impl Into<String>) -> HttpDataServiceBuilder<Set<String>, S> {
        HttpDataServiceBuilder {
            server: Set(url.into()),
            session: self.session,
            config: self.config,
            connect_timeout: self.connect_timeout,
            http_client: self.http_client,
        }
    }
}

impl<U> HttpDataServiceBuilder<U, Missing> {
    /// Sets the session whose tokens authenticate requests.
    pub fn session(self, session: SessionContext) -> HttpDataServiceBuilder<U, Set<SessionContext>> {
        HttpDataServiceBuilder {
            server: self.server,
            session: Set(session),
            config: self.config,
            connect_timeout: self.connect_timeout,
            http_client: self.http_client,
        }
    }
}

impl<U, S> HttpDataServiceBuilder<U, S> {
    /// Sets the Web API settings.
    pub fn config(mut self, config: WebApiConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Sets a custom HTTP client.
    pub fn http_client(mut self, client: Client) -> Self {
        self.http_client = Some(client);
        self
    }
}

impl HttpDataServiceBuilder<Set<String>, Set<SessionContext>> {
    /// Builds the [`HttpDataService`].
    ///
    /// Fails if the server address or one of the configured URLs is invalid.
    pub fn build(self) -> Result<HttpDataService, ConfigError> {
        let mut server_text = self.server.0;
        if !server_text.ends_with('/') {
            server_text.push('/');
        }
        let server =
            Url::parse(&server_text).map_err(|e| ConfigError::InvalidUrl(format!("{server_text}: {e}")))?;

        let resolve = |url: &str| {
            server
                .join(url)
                .map(String::from)
                .map_err(|e| ConfigError::InvalidUrl(format!("{url}: {e}")))
        };
        let base_url = resolve(&self.config.base_url)?;
        let token_url = resolve(&self.config.token_url)?;
        let refresh_token_url = resolve(&self.config.refresh_token_url)?;

        let http_client = self.http_client.unwrap_or_else(|| {
            let mut builder = Client::builder();
            if let Some(timeout) = self.connect_timeout {
                builder = builder.connect_timeout(timeout);
            }
            builder.build().unwrap_or_default()
        });

        Ok(HttpDataService {
            inner: Arc::new(HttpDataServiceInner {
                server,
                base_url,
                token_url,
                refresh_token_url,
                config: self.config,
                session: self.session.0,
                http_client,
            }),
        })
    }
}
