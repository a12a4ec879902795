//! Grid configuration.

use std::sync::Arc;
use std::time::Duration;

use crate::api::DataRequest;
use crate::api::Method;

/// Default grid name, also the storage key prefix.
pub const DEFAULT_GRID_NAME: &str = "tbgrid";
/// Default and fallback page size.
pub const DEFAULT_PAGE_SIZE: i64 = 20;
/// Page sizes below this reset to [`DEFAULT_PAGE_SIZE`].
pub const MIN_PAGE_SIZE: i64 = 10;
/// Default timeout of grid requests.
pub const DEFAULT_GRID_TIMEOUT: Duration = Duration::from_millis(20_000);

/// Hook run right before a page request is dispatched.
pub type BeforeFetchHook = Arc<dyn Fn(&DataRequest) + Send + Sync>;

/// Configuration for a [`GridController`](super::GridController).
///
/// # Example
///
/// ```
/// use tubular_lib::grid::GridOptions;
///
/// let options = GridOptions::new("orders")
///     .with_server_url("/api/orders/paged")
///     .with_save_url("/api/orders")
///     .with_page_size(50);
/// assert!(options.save_page);
/// ```
#[derive(Clone)]
pub struct GridOptions {
    /// Grid name. Prefixes every stored key.
    pub name: String,
    pub server_url: String,
    pub server_save_url: Option<String>,
    /// Falls back to the save URL when unset.
    pub server_delete_url: Option<String>,
    pub request_method: Method,
    /// Method for saving new rows.
    pub server_save_method: Method,
    pub request_timeout: Duration,
    pub require_authentication: bool,
    pub page_size: i64,
    pub save_page: bool,
    pub save_page_size: bool,
    pub save_search: bool,
    pub before_fetch: Option<BeforeFetchHook>,
}

impl std::fmt::Debug for GridOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GridOptions")
            .field("name", &self.name)
            .field("server_url", &self.server_url)
            .field("server_save_url", &self.server_save_url)
            .field("server_delete_url", &self.server_delete_url)
            .field("request_method", &self.request_method)
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

impl Default for GridOptions {
    fn default() -> Self {
        Self {
            name: DEFAULT_GRID_NAME.to_string(),
            server_url: String::new(),
            server_save_url: None,
            server_delete_url: None,
            request_method: Method::Post,
            server_save_method: Method::Post,
            request_timeout: DEFAULT_GRID_TIMEOUT,
            require_authentication: true,
            page_size: DEFAULT_PAGE_SIZE,
            save_page: true,
            save_page_size: true,
            save_search: true,
            before_fetch: None,
        }
    }
}

impl GridOptions {
    /// Default options for a named grid. An empty name falls back to the default.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            name: if name.is_empty() {
                DEFAULT_GRID_NAME.to_string()
            } else {
                name
            },
            ..Self::default()
        }
    }

    pub fn with_server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = url.into();
        self
    }

    pub fn with_save_url(mut self, url: impl Into<String>) -> Self {
        self.server_save_url = Some(url.into());
        self
    }

    pub fn with_delete_url(mut self, url: impl Into<String>) -> Self {
        self.server_delete_url = Some(url.into());
        self
    }

    pub fn with_request_method(mut self, method: Method) -> Self {
        self.request_method = method;
        self
    }

    pub fn with_save_method(mut self, method: Method) -> Self {
        self.server_save_method = method;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_authentication(mut self, required: bool) -> Self {
        self.require_authentication = required;
        self
    }

    pub fn with_page_size(mut self, page_size: i64) -> Self {
        self.page_size = page_size;
        self
    }

    /// Turns persistence of page, page size and search on or off together.
    pub fn with_persistence(mut self, enabled: bool) -> Self {
        self.save_page = enabled;
        self.save_page_size = enabled;
        self.save_search = enabled;
        self
    }

    pub fn with_save_page(mut self, enabled: bool) -> Self {
        self.save_page = enabled;
        self
    }

    pub fn with_save_page_size(mut self, enabled: bool) -> Self {
        self.save_page_size = enabled;
        self
    }

    pub fn with_save_search(mut self, enabled: bool) -> Self {
        self.save_search = enabled;
        self
    }

    /// Sets the pre-fetch hook.
    pub fn with_before_fetch(mut self, hook: impl Fn(&DataRequest) + Send + Sync + 'static) -> Self {
        self.before_fetch = Some(Arc::new(hook));
        self
    }

    /// URL used for deletions: the delete URL, else the save URL.
    pub fn delete_url(&self) -> Option<&str> {
        self.server_delete_url
            .as_deref()
            .or(self.server_save_url.as_deref())
            .filter(|url| !url.is_empty())
    }
}
