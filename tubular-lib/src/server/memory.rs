//! A [`DataService`] that serves grid data from memory.

use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Map;
use serde_json::Value;

use super::GridDataSource;
use crate::api::DataRequest;
use crate::api::Method;
use crate::api::Payload;
use crate::error::ApiError;
use crate::service::DataService;

/// Serves [`GridDataSource`]s by route, like a small REST backend.
///
/// | Request                              | Answer                        |
/// |--------------------------------------|-------------------------------|
/// | grid payload to `<route>`            | a page                        |
/// | `GET <route>`                        | an empty record template      |
/// | `GET <route>/<key>`                  | the record                    |
/// | `POST <route>` with a record         | the stored record             |
/// | `PUT <route>` with `{Old, New}`      | the updated record            |
/// | `DELETE <route>/<key>`               | the removed record            |
///
/// Query strings are ignored. Unknown routes and keys answer 404.
#[derive(Debug, Default)]
pub struct InMemoryDataService {
    sources: DashMap<String, GridDataSource>,
    latency: Option<Duration>,
    requests: AtomicUsize,
}

impl InMemoryDataService {
    pub fn new() -> Self {
        Self::default()
    }

    /// A service with a single route whose columns are inferred from `records`.
    pub fn from_records(route: &str, records: Vec<Value>) -> Self {
        Self::new().with_source(route, GridDataSource::infer(route, records))
    }

    /// Adds a route (builder pattern).
    pub fn with_source(self, route: &str, source: GridDataSource) -> Self {
        self.insert(route, source);
        self
    }

    /// Delays every answer, to simulate a slow network.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn insert(&self, route: &str, source: GridDataSource) {
        self.sources.insert(normalize_route(route).to_string(), source);
    }

    /// Snapshot of a route's data.
    pub fn source(&self, route: &str) -> Option<GridDataSource> {
        self.sources.get(normalize_route(route)).map(|s| s.clone())
    }

    /// Number of requests received so far.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    fn not_found(url: &str) -> ApiError {
        ApiError::http(404, format!("No resource at '{url}'"))
    }

    fn handle(&self, request: &DataRequest) -> Result<Value, ApiError> {
        let path = normalize_route(&request.url);
        let (route, key) = if self.sources.contains_key(path) {
            (path, None)
        } else {
            let (route, key) = path
                .rsplit_once('/')
                .ok_or_else(|| Self::not_found(&request.url))?;
            (route, Some(key))
        };

        let mut source = self
            .sources
            .get_mut(route)
            .ok_or_else(|| Self::not_found(&request.url))?;

        match (&request.payload, key, request.method) {
            (Some(Payload::Grid(grid)), None, _) => {
                serde_json::to_value(source.answer(grid)).map_err(|e| ApiError::parse(e.to_string()))
            }
            (None, None, Method::Get) => {
                let template: Map<String, Value> = source
                    .columns
                    .iter()
                    .map(|c| (c.name().to_string(), Value::Null))
                    .collect();
                Ok(Value::Object(template))
            }
            (None, Some(key), Method::Get) => source
                .find(key)
                .cloned()
                .ok_or_else(|| Self::not_found(&request.url)),
            (Some(Payload::Record(record)), None, Method::Post | Method::Put) => {
                let record = Value::Object(record.clone());
                source.records.push(record.clone());
                Ok(record)
            }
            (Some(Payload::Update(update)), None, _) => {
                let old_key = source.key_of(&Value::Object(update.old.clone()));
                let index = source
                    .position(&old_key)
                    .ok_or_else(|| Self::not_found(&request.url))?;

                if let Some(Value::Object(stored)) = source.records.get_mut(index) {
                    for (name, value) in &update.new {
                        stored.insert(name.clone(), value.clone());
                    }
                }
                Ok(source.records[index].clone())
            }
            (None, Some(key), Method::Delete) => {
                let index = source
                    .position(key)
                    .ok_or_else(|| Self::not_found(&request.url))?;
                Ok(source.records.remove(index))
            }
            _ => Err(ApiError::http(405, "Method not allowed")),
        }
    }
}

fn normalize_route(url: &str) -> &str {
    let path = url.split_once('?').map_or(url, |(path, _)| path);
    path.trim_matches('/')
}

#[async_trait]
impl DataService for InMemoryDataService {
    async fn retrieve(&self, request: DataRequest) -> Result<Option<Value>, ApiError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        log::debug!("In-memory {} {}", request.method.as_str(), request.url);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        self.handle(&request).map(Some)
    }
}
