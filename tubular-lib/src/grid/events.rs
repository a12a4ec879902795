//! Grid notifications.

use serde_json::Value;

use crate::api::DataRequest;
use crate::error::ApiError;

/// Failure detail carried by [`GridEvent::ConnectionError`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionError {
    /// HTTP status, or `0` when no response was received.
    pub status: u16,
    pub message: String,
}

impl ConnectionError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<&ApiError> for ConnectionError {
    fn from(error: &ApiError) -> Self {
        Self::new(error.status_code(), error.display_message())
    }
}

impl std::fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.status == 0 {
            f.write_str(&self.message)
        } else {
            write!(f, "{} ({})", self.message, self.status)
        }
    }
}

/// Notifications a grid sends to its collaborators.
#[derive(Debug, Clone, PartialEq)]
pub enum GridEvent {
    /// The grid announced itself to its container.
    GreetParent { name: String },
    /// A page request is about to be dispatched.
    BeforeRequest(DataRequest),
    ConnectionError(ConnectionError),
    /// A page was applied; the controller state reflects it.
    DataLoaded { name: String },
    /// A row deletion succeeded with this response body.
    RemoveSuccess(Option<Value>),
    SortChanged,
}
