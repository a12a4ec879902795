//! Free-text search state.

use serde::Deserialize;
use serde::Serialize;

use super::FilterOperator;

/// Grid-wide free-text search.
///
/// The operator is `Auto` whenever there is text to search for and `None`
/// otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Search {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub operator: FilterOperator,
}

impl Search {
    /// An empty search.
    pub fn none() -> Self {
        Self::default()
    }

    /// Builds a search from user input, picking the matching operator.
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        let operator = if text.is_empty() {
            FilterOperator::None
        } else {
            FilterOperator::Auto
        };
        Self { text, operator }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}
