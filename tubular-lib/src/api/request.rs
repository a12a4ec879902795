//! Data requests sent through a [`DataService`](crate::service::DataService).

use std::time::Duration;

use chrono::Local;
use chrono::Offset;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::model::Column;
use crate::model::Search;

/// HTTP method of a data request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    #[default]
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }

    /// Parses a method name, case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "GET" => Some(Self::Get),
            "POST" => Some(Self::Post),
            "PUT" => Some(Self::Put),
            "DELETE" => Some(Self::Delete),
            _ => None,
        }
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// A single call against a data endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct DataRequest {
    pub url: String,
    pub method: Method,
    /// `None` lets the data service apply its own default.
    pub timeout: Option<Duration>,
    pub require_authentication: bool,
    pub payload: Option<Payload>,
}

impl DataRequest {
    /// Creates a request with no payload that requires authentication.
    pub fn new(url: impl Into<String>, method: Method) -> Self {
        Self {
            url: url.into(),
            method,
            timeout: None,
            require_authentication: true,
            payload: None,
        }
    }

    /// Shorthand for a GET request.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(url, Method::Get)
    }

    /// Sets the timeout (builder pattern).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets whether a bearer token is required (builder pattern).
    pub fn with_authentication(mut self, required: bool) -> Self {
        self.require_authentication = required;
        self
    }

    /// Sets the payload (builder pattern).
    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Returns the grid payload, if this is a grid page request.
    pub fn grid_payload(&self) -> Option<&GridDataRequest> {
        match &self.payload {
            Some(Payload::Grid(grid)) => Some(grid),
            _ => None,
        }
    }
}

/// Body of a data request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    /// A page request from a grid.
    Grid(GridDataRequest),
    /// An update of an existing row.
    Update(UpdatePayload),
    /// A plain record, used for inserts.
    Record(Map<String, Value>),
}

/// Page request sent by a grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GridDataRequest {
    /// Number of completed fetches of the requesting grid.
    pub count: u64,
    pub columns: Vec<Column>,
    pub skip: i64,
    /// Page size. `-1` asks for every record.
    pub take: i64,
    pub search: Search,
    pub timezone_offset: i32,
}

impl GridDataRequest {
    /// Returns `true` if this request asks for the whole data set.
    pub fn is_full(&self) -> bool {
        self.take < 0
    }
}

/// Body of a row update: the row before and after editing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UpdatePayload {
    pub old: Map<String, Value>,
    pub new: Map<String, Value>,
    pub timezone_offset: i32,
}

/// Local timezone offset in minutes as `UTC - local`.
///
/// Positive west of UTC, so UTC-6 yields `360`.
pub fn timezone_offset() -> i32 {
    -Local::now().offset().fix().local_minus_utc() / 60
}

/// Appends `timezoneOffset=<minutes>` to a URL's query.
pub fn add_timezone_to_url(url: &str) -> String {
    append_query(url, "timezoneOffset", &timezone_offset().to_string())
}

/// Appends `name=value` to a URL, using `?` or `&` as needed.
pub fn append_query(url: &str, name: &str, value: &str) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}{name}={value}")
}

/// Builds `<url><key>?<query>` with the timezone offset in the query.
pub fn url_with_key(url: &str, key: &str) -> String {
    let with_offset = add_timezone_to_url(url);
    match with_offset.split_once('?') {
        Some((base, query)) => format!("{base}{key}?{query}"),
        None => format!("{with_offset}{key}"),
    }
}
