//! Answering grid requests over an in-memory record set.

use std::cmp::Ordering;
use std::collections::HashSet;

use serde_json::Map;
use serde_json::Value;

use crate::api::GridDataRequest;
use crate::api::GridDataResponse;
use crate::grid::div_ceil;
use crate::model::Aggregate;
use crate::model::Column;
use crate::model::DataType;
use crate::model::Filter;
use crate::model::FilterOperator;
use crate::model::Search;
use crate::model::SortDirection;
use crate::model::value::as_number;
use crate::model::value::display_text;
use crate::model::value::key_text;
use crate::model::value::parse_date;

/// A named record set that can answer grid page requests.
///
/// Records are JSON objects read by column name, or positional arrays read by
/// the source's column order.
#[derive(Debug, Clone, Default)]
pub struct GridDataSource {
    pub name: String,
    pub columns: Vec<Column>,
    pub records: Vec<Value>,
}

impl GridDataSource {
    pub fn new(name: impl Into<String>, columns: Vec<Column>, records: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            columns,
            records,
        }
    }

    /// Builds a source whose columns are inferred from the first object record.
    pub fn infer(name: impl Into<String>, records: Vec<Value>) -> Self {
        let columns = records
            .iter()
            .find_map(Value::as_object)
            .map(Column::infer_from_record)
            .unwrap_or_default();
        Self::new(name, columns, records)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn field<'a>(&self, record: &'a Value, name: &str) -> Option<&'a Value> {
        let value = match record {
            Value::Object(object) => object.get(name),
            Value::Array(items) => {
                let index = self.columns.iter().position(|c| c.name() == name)?;
                items.get(index)
            }
            _ => None,
        };
        value.filter(|v| !v.is_null())
    }

    /// Comma-joined key column values of a record.
    pub fn key_of(&self, record: &Value) -> String {
        self.columns
            .iter()
            .filter(|c| c.is_key)
            .map(|c| self.field(record, c.name()).map(key_text).unwrap_or_default())
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn find(&self, key: &str) -> Option<&Value> {
        self.records.iter().find(|r| self.key_of(r) == key)
    }

    pub(crate) fn position(&self, key: &str) -> Option<usize> {
        self.records.iter().position(|r| self.key_of(r) == key)
    }

    /// Answers a page request.
    ///
    /// The request's columns carry the live sort, filter and aggregate state;
    /// when it has none the source's own columns are used.
    pub fn answer(&self, request: &GridDataRequest) -> GridDataResponse {
        let columns = if request.columns.is_empty() {
            &self.columns
        } else {
            &request.columns
        };

        let mut filtered: Vec<&Value> = self
            .records
            .iter()
            .filter(|r| self.matches_search(r, columns, &request.search))
            .filter(|r| self.matches_filters(r, columns))
            .collect();

        self.sort(&mut filtered, columns);

        let total = self.records.len() as i64;
        let filtered_count = filtered.len() as i64;
        let aggregation_payload = self.aggregate(&filtered, columns);

        let (payload, current_page, total_pages) = if request.take < 0 {
            (filtered, 1, 1)
        } else {
            let take = request.take.max(1);
            let skip = request.skip.clamp(0, filtered_count);
            let page: Vec<&Value> = filtered
                .into_iter()
                .skip(skip as usize)
                .take(take as usize)
                .collect();
            (page, skip / take + 1, div_ceil(filtered_count, take))
        };

        GridDataResponse {
            payload: payload.into_iter().cloned().collect(),
            aggregation_payload,
            current_page,
            total_pages,
            total_record_count: total,
            filtered_record_count: filtered_count,
        }
    }

    fn matches_search(&self, record: &Value, columns: &[Column], search: &Search) -> bool {
        if search.text.is_empty() || search.operator == FilterOperator::None {
            return true;
        }
        let needle = search.text.to_lowercase();
        columns.iter().filter(|c| c.searchable).any(|c| {
            self.field(record, c.name())
                .is_some_and(|v| display_text(v).to_lowercase().contains(&needle))
        })
    }

    fn matches_filters(&self, record: &Value, columns: &[Column]) -> bool {
        columns.iter().all(|column| match &column.filter {
            Some(filter) if filter.is_active() => {
                let value = self.field(record, column.name()).unwrap_or(&Value::Null);
                matches_filter(value, filter, column.data_type)
            }
            _ => true,
        })
    }

    fn sort(&self, records: &mut [&Value], columns: &[Column]) {
        let mut sorted: Vec<&Column> = columns.iter().filter(|c| c.is_sorted()).collect();
        sorted.sort_by_key(|c| c.sort_order);
        if sorted.is_empty() {
            return;
        }

        records.sort_by(|a, b| {
            sorted
                .iter()
                .map(|column| {
                    let left = self.field(a, column.name());
                    let right = self.field(b, column.name());
                    let ordering = compare_optional(left, right, column.data_type);
                    match column.sort_direction {
                        SortDirection::Descending => ordering.reverse(),
                        _ => ordering,
                    }
                })
                .find(|o| o.is_ne())
                .unwrap_or(Ordering::Equal)
        });
    }

    fn aggregate(&self, records: &[&Value], columns: &[Column]) -> Option<Value> {
        let mut payload = Map::new();

        for column in columns.iter().filter(|c| c.aggregate != Aggregate::None) {
            let values: Vec<&Value> = records
                .iter()
                .filter_map(|r| self.field(r, column.name()))
                .collect();
            let numbers = || values.iter().filter_map(|v| as_number(v));

            let result = match column.aggregate {
                Aggregate::Sum => Value::from(numbers().sum::<f64>()),
                Aggregate::Average => {
                    let count = numbers().count();
                    if count == 0 {
                        Value::from(0.0)
                    } else {
                        Value::from(numbers().sum::<f64>() / count as f64)
                    }
                }
                Aggregate::Count => Value::from(values.len()),
                Aggregate::DistinctCount => {
                    let distinct: HashSet<String> = values.iter().map(|v| display_text(v)).collect();
                    Value::from(distinct.len())
                }
                Aggregate::Max => extreme(&values, column.data_type, Ordering::Greater),
                Aggregate::Min => extreme(&values, column.data_type, Ordering::Less),
                Aggregate::None => continue,
            };
            payload.insert(column.name().to_string(), result);
        }

        (!payload.is_empty()).then_some(Value::Object(payload))
    }
}

fn extreme(values: &[&Value], data_type: DataType, wanted: Ordering) -> Value {
    values
        .iter()
        .copied()
        .reduce(|best, v| {
            if compare_values(v, best, data_type) == wanted {
                v
            } else {
                best
            }
        })
        .cloned()
        .unwrap_or(Value::Null)
}

fn compare_optional(left: Option<&Value>, right: Option<&Value>, data_type: DataType) -> Ordering {
    match (left, right) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(l), Some(r)) => compare_values(l, r, data_type),
    }
}

/// Orders two values as the column's data type dictates, falling back to
/// case-insensitive text order.
fn compare_values(left: &Value, right: &Value, data_type: DataType) -> Ordering {
    let typed = match data_type {
        DataType::Numeric | DataType::Boolean => {
            as_number(left).zip(as_number(right)).and_then(|(l, r)| l.partial_cmp(&r))
        }
        DataType::Date | DataType::DateTime | DataType::DateTimeUtc => parse_date(&display_text(left))
            .zip(parse_date(&display_text(right)))
            .map(|(l, r)| l.cmp(&r)),
        DataType::String => None,
    };

    typed.unwrap_or_else(|| {
        display_text(left)
            .to_lowercase()
            .cmp(&display_text(right).to_lowercase())
    })
}

fn compare_to_text(value: &Value, text: &str, data_type: DataType) -> Ordering {
    compare_values(value, &Value::String(text.to_string()), data_type)
}

fn matches_filter(value: &Value, filter: &Filter, data_type: DataType) -> bool {
    let Some(text) = filter.text.as_deref() else {
        return true;
    };
    let haystack = display_text(value).to_lowercase();
    let needle = text.to_lowercase();

    match filter.operator {
        FilterOperator::None => true,
        FilterOperator::Equals => !value.is_null() && compare_to_text(value, text, data_type).is_eq(),
        FilterOperator::NotEquals => value.is_null() || compare_to_text(value, text, data_type).is_ne(),
        FilterOperator::Contains | FilterOperator::Auto => haystack.contains(&needle),
        FilterOperator::NotContains => !haystack.contains(&needle),
        FilterOperator::StartsWith => haystack.starts_with(&needle),
        FilterOperator::NotStartsWith => !haystack.starts_with(&needle),
        FilterOperator::EndsWith => haystack.ends_with(&needle),
        FilterOperator::NotEndsWith => !haystack.ends_with(&needle),
        FilterOperator::Gte => !value.is_null() && compare_to_text(value, text, data_type).is_ge(),
        FilterOperator::Gt => !value.is_null() && compare_to_text(value, text, data_type).is_gt(),
        FilterOperator::Lte => !value.is_null() && compare_to_text(value, text, data_type).is_le(),
        FilterOperator::Lt => !value.is_null() && compare_to_text(value, text, data_type).is_lt(),
        FilterOperator::Between => {
            let upper = filter.argument.as_ref().and_then(|a| a.first());
            !value.is_null()
                && compare_to_text(value, text, data_type).is_ge()
                && upper.is_none_or(|upper| compare_values(value, upper, data_type).is_le())
        }
        FilterOperator::Multiple => match filter.argument.as_deref() {
            Some(accepted) if !accepted.is_empty() => accepted
                .iter()
                .any(|a| display_text(a).to_lowercase() == haystack),
            _ => true,
        },
    }
}
