//! Grid column model.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use super::Filter;
use super::value::parse_date;

/// Sort direction of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SortDirection {
    #[default]
    None,
    Ascending,
    Descending,
}

impl SortDirection {
    /// Next direction in the `None → Ascending → Descending → None` cycle.
    pub fn next(self) -> Self {
        match self {
            Self::None => Self::Ascending,
            Self::Ascending => Self::Descending,
            Self::Descending => Self::None,
        }
    }

    /// Parses markup-style values such as `asc`, `ASCENDING` or `desc`.
    ///
    /// Anything unrecognised is `None`.
    pub fn parse_loose(value: &str) -> Self {
        let lower = value.to_ascii_lowercase();
        if lower.starts_with("asc") {
            Self::Ascending
        } else if lower.starts_with("desc") {
            Self::Descending
        } else {
            Self::None
        }
    }
}

/// Data type of a column's values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    #[default]
    String,
    Numeric,
    Date,
    #[serde(rename = "datetime")]
    DateTime,
    #[serde(rename = "datetimeutc")]
    DateTimeUtc,
    Boolean,
}

impl DataType {
    /// Returns `true` for the three date-like types.
    pub fn is_date(self) -> bool {
        matches!(self, Self::Date | Self::DateTime | Self::DateTimeUtc)
    }
}

/// Aggregation computed by the server over the filtered rows of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Aggregate {
    #[default]
    #[serde(alias = "none")]
    None,
    #[serde(alias = "sum")]
    Sum,
    #[serde(alias = "average")]
    Average,
    #[serde(alias = "count")]
    Count,
    #[serde(alias = "distinctcount")]
    DistinctCount,
    #[serde(alias = "max")]
    Max,
    #[serde(alias = "min")]
    Min,
}

static CAMEL_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("([a-z])([A-Z])").expect("static regex"));

/// Turns `FirstName` into `First Name`.
pub fn label_from_name(name: &str) -> String {
    CAMEL_BOUNDARY.replace_all(name, "$1 $2").into_owned()
}

/// A displayable, sortable and filterable field of a grid.
///
/// The name is fixed at construction; everything else may change through the
/// owning grid's sort, filter and visibility operations.
///
/// # Example
///
/// ```
/// use tubular_lib::model::{Column, DataType, SortDirection};
///
/// let id = Column::new("OrderId").key().data_type(DataType::Numeric);
/// let customer = Column::new("CustomerName")
///     .searchable()
///     .sorted(1, SortDirection::Ascending);
///
/// assert_eq!(customer.label, "Customer Name");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Column {
    name: String,
    #[serde(default)]
    pub label: String,
    #[serde(default = "default_true")]
    pub sortable: bool,
    #[serde(default = "default_sort_order")]
    pub sort_order: i32,
    #[serde(default)]
    pub sort_direction: SortDirection,
    #[serde(default)]
    pub is_key: bool,
    #[serde(default)]
    pub searchable: bool,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default)]
    pub data_type: DataType,
    #[serde(default)]
    pub filter: Option<Filter>,
    #[serde(default)]
    pub aggregate: Aggregate,
}

fn default_true() -> bool {
    true
}

fn default_sort_order() -> i32 {
    -1
}

impl Column {
    /// Creates a column with default settings.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            label: label_from_name(&name),
            name,
            sortable: true,
            sort_order: -1,
            sort_direction: SortDirection::None,
            is_key: false,
            searchable: false,
            visible: true,
            data_type: DataType::String,
            filter: None,
            aggregate: Aggregate::None,
        }
    }

    /// Returns the column name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sets the label (builder pattern).
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Sets whether the column can be sorted (builder pattern).
    pub fn sortable(mut self, sortable: bool) -> Self {
        self.sortable = sortable;
        self
    }

    /// Sets the initial sort (builder pattern).
    pub fn sorted(mut self, order: i32, direction: SortDirection) -> Self {
        self.sort_order = order;
        self.sort_direction = direction;
        self
    }

    /// Marks the column as part of the row key (builder pattern).
    pub fn key(mut self) -> Self {
        self.is_key = true;
        self
    }

    /// Includes the column in free-text search (builder pattern).
    pub fn searchable(mut self) -> Self {
        self.searchable = true;
        self
    }

    /// Sets visibility (builder pattern).
    pub fn visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    /// Sets the data type (builder pattern).
    pub fn data_type(mut self, data_type: DataType) -> Self {
        self.data_type = data_type;
        self
    }

    /// Attaches a filter (builder pattern). The filter is renamed to this column.
    pub fn with_filter(mut self, mut filter: Filter) -> Self {
        filter.name = self.name.clone();
        self.filter = Some(filter);
        self
    }

    /// Sets the aggregate function (builder pattern).
    pub fn aggregate(mut self, aggregate: Aggregate) -> Self {
        self.aggregate = aggregate;
        self
    }

    /// Returns `true` if the column has a filter with a value.
    pub fn has_active_filter(&self) -> bool {
        self.filter.as_ref().is_some_and(Filter::is_active)
    }

    /// Returns `true` if the column takes part in the current sort.
    pub fn is_sorted(&self) -> bool {
        self.sort_order > 0 && self.sort_direction != SortDirection::None
    }

    /// Clears the sort state.
    pub fn clear_sort(&mut self) {
        self.sort_order = -1;
        self.sort_direction = SortDirection::None;
    }

    /// Builds a column set from the shape of a sample record.
    ///
    /// `$`-prefixed and null fields are skipped. The first column becomes the
    /// key and the default ascending sort.
    pub fn infer_from_record(record: &Map<String, Value>) -> Vec<Column> {
        let mut columns: Vec<Column> = record
            .iter()
            .filter(|(name, value)| !name.starts_with('$') && !value.is_null())
            .map(|(name, value)| {
                let data_type = infer_data_type(value);
                let mut column = Column::new(name.as_str()).data_type(data_type);
                column.searchable = data_type == DataType::String;
                column
            })
            .collect();

        if let Some(first) = columns.first_mut() {
            first.is_key = true;
            first.sort_order = 1;
            first.sort_direction = SortDirection::Ascending;
        }

        columns
    }
}

fn infer_data_type(value: &Value) -> DataType {
    match value {
        Value::Number(_) => DataType::Numeric,
        Value::Bool(_) => DataType::Boolean,
        Value::String(s) => {
            if s.parse::<f64>().is_ok_and(|n| n.to_string() == *s) {
                DataType::Numeric
            } else if parse_date(s).is_some() {
                DataType::Date
            } else if s.eq_ignore_ascii_case("true") || s.eq_ignore_ascii_case("false") {
                DataType::Boolean
            } else {
                DataType::String
            }
        }
        _ => DataType::String,
    }
}
