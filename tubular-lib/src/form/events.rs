//! Form notifications and save results.

use serde_json::Map;
use serde_json::Value;

use crate::grid::ConnectionError;

/// Notifications a form sends to its collaborators.
#[derive(Debug, Clone, PartialEq)]
pub enum FormEvent {
    /// Field definitions are final and the form announced itself.
    GreetParent { name: String },
    /// A save was requested but the model had nothing to send.
    SavingNoChanges,
    /// The endpoint accepted the model and answered with this body.
    SuccessfulSave(Option<Value>),
    ConnectionError(ConnectionError),
    /// The edit was abandoned; carries the model as it was.
    Cancel(Map<String, Value>),
}

/// Result of [`FormController::save`](super::FormController::save).
#[derive(Debug, Clone, PartialEq)]
pub enum FormSaveOutcome {
    /// At least one field failed validation; nothing was sent.
    Invalid,
    NoChanges,
    Saved(Option<Value>),
}
