//! Column filter model.

use serde::Deserialize;
use serde::Serialize;

use super::DataType;

/// Comparison applied by a column filter or the free-text search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FilterOperator {
    #[default]
    None,
    Equals,
    NotEquals,
    Contains,
    NotContains,
    StartsWith,
    NotStartsWith,
    EndsWith,
    NotEndsWith,
    Between,
    Gte,
    Gt,
    Lte,
    Lt,
    Multiple,
    Auto,
}

const STRING_OPERATORS: &[FilterOperator] = &[
    FilterOperator::None,
    FilterOperator::Equals,
    FilterOperator::NotEquals,
    FilterOperator::Contains,
    FilterOperator::NotContains,
    FilterOperator::StartsWith,
    FilterOperator::NotStartsWith,
    FilterOperator::EndsWith,
    FilterOperator::NotEndsWith,
];

const NUMERIC_OPERATORS: &[FilterOperator] = &[
    FilterOperator::None,
    FilterOperator::Equals,
    FilterOperator::Between,
    FilterOperator::Gte,
    FilterOperator::Gt,
    FilterOperator::Lte,
    FilterOperator::Lt,
];

const DATE_OPERATORS: &[FilterOperator] = &[
    FilterOperator::None,
    FilterOperator::Equals,
    FilterOperator::NotEquals,
    FilterOperator::Between,
    FilterOperator::Gte,
    FilterOperator::Gt,
    FilterOperator::Lte,
    FilterOperator::Lt,
];

const BOOLEAN_OPERATORS: &[FilterOperator] = &[
    FilterOperator::None,
    FilterOperator::Equals,
    FilterOperator::NotEquals,
];

impl FilterOperator {
    /// Operators a filter UI should offer for the given data type.
    pub fn for_data_type(data_type: DataType) -> &'static [FilterOperator] {
        match data_type {
            DataType::String => STRING_OPERATORS,
            DataType::Numeric => NUMERIC_OPERATORS,
            DataType::Date | DataType::DateTime | DataType::DateTimeUtc => DATE_OPERATORS,
            DataType::Boolean => BOOLEAN_OPERATORS,
        }
    }
}

/// A filter attached to a single column.
///
/// Serialized with the PascalCase names the grid endpoint expects.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Filter {
    /// Filter value. `None` means no active filter.
    #[serde(default)]
    pub text: Option<String>,
    /// Extra operands (upper bound for `Between`, accepted values for `Multiple`).
    #[serde(default)]
    pub argument: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub operator: FilterOperator,
    /// Endpoint providing the option list for `Multiple` filters.
    #[serde(default)]
    pub options_url: Option<String>,
    #[serde(default)]
    pub has_filter: bool,
    /// Name of the owning column.
    #[serde(default)]
    pub name: String,
}

impl Filter {
    /// Creates an empty filter for a column, using `Contains` as the operator.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            text: None,
            argument: None,
            operator: FilterOperator::Contains,
            options_url: None,
            has_filter: false,
            name: name.into(),
        }
    }

    /// Creates an empty filter with the default operator for the data type.
    ///
    /// Numeric, boolean and date columns cannot do substring matching, so they
    /// start on `Equals`.
    pub fn for_data_type(name: impl Into<String>, data_type: DataType) -> Self {
        let mut filter = Self::new(name);
        if data_type != DataType::String {
            filter.operator = FilterOperator::Equals;
        }
        filter
    }

    /// Sets the options URL (builder pattern).
    pub fn with_options_url(mut self, url: impl Into<String>) -> Self {
        self.options_url = Some(url.into());
        self
    }

    /// Returns `true` if this filter currently restricts results.
    pub fn is_active(&self) -> bool {
        self.text.is_some()
    }

    /// Activates the filter with a value and operator.
    pub fn apply(
        &mut self,
        text: impl Into<String>,
        argument: Option<Vec<serde_json::Value>>,
        operator: FilterOperator,
    ) {
        self.text = Some(text.into());
        self.argument = argument;
        self.operator = operator;
        self.has_filter = true;
    }

    /// Resets the filter. `Multiple` filters keep their operator.
    pub fn clear(&mut self) {
        if self.operator != FilterOperator::Multiple {
            self.operator = FilterOperator::None;
        }
        self.text = None;
        self.argument = Some(Vec::new());
        self.has_filter = false;
    }
}
