//! Data services: how grids, forms and rows reach their endpoints.

mod config;
mod http;

pub use config::WebApiConfig;
pub use http::HttpDataService;
pub use http::HttpDataServiceBuilder;
pub use http::Missing;
pub use http::Set;

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use crate::api::DataRequest;
use crate::error::ApiError;

/// Name under which the default service is registered.
pub const DEFAULT_SERVICE: &str = "tubularHttp";

/// Executes data requests on behalf of grids, forms and rows.
///
/// `Ok(None)` is an empty result: the request was not sent because it needs
/// authentication the session cannot provide.
#[async_trait]
pub trait DataService: Send + Sync {
    async fn retrieve(&self, request: DataRequest) -> Result<Option<Value>, ApiError>;
}

#[async_trait]
impl<T: DataService + ?Sized> DataService for Arc<T> {
    async fn retrieve(&self, request: DataRequest) -> Result<Option<Value>, ApiError> {
        (**self).retrieve(request).await
    }
}

/// Named data services, so markup-style configuration can pick one by name.
///
/// Unknown or empty names resolve to the default service.
#[derive(Clone)]
pub struct DataServiceRegistry {
    default: Arc<dyn DataService>,
    services: Arc<DashMap<String, Arc<dyn DataService>>>,
}

impl DataServiceRegistry {
    pub fn new(default: Arc<dyn DataService>) -> Self {
        Self {
            default,
            services: Arc::new(DashMap::new()),
        }
    }

    /// Registers (or replaces) a service under a name.
    pub fn register(&self, name: impl Into<String>, service: Arc<dyn DataService>) {
        self.services.insert(name.into(), service);
    }

    /// Resolves a service by name.
    pub fn get(&self, name: Option<&str>) -> Arc<dyn DataService> {
        match name {
            None | Some("") | Some(DEFAULT_SERVICE) => self.default.clone(),
            Some(name) => self
                .services
                .get(name)
                .map(|entry| entry.value().clone())
                .unwrap_or_else(|| {
                    log::warn!("Data service '{}' is not registered, using default", name);
                    self.default.clone()
                }),
        }
    }
}
