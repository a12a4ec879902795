//! Grid page responses.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

/// A page of records answered by a grid endpoint.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GridDataResponse {
    /// Raw records, either JSON objects or positional arrays.
    pub payload: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation_payload: Option<Value>,
    #[serde(default)]
    pub current_page: i64,
    #[serde(default)]
    pub total_pages: i64,
    #[serde(default)]
    pub total_record_count: i64,
    #[serde(default)]
    pub filtered_record_count: i64,
}

impl GridDataResponse {
    /// Reads a response body. Returns `None` when `Payload` is missing or not an array.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        if !object.get("Payload").is_some_and(Value::is_array) {
            return None;
        }
        Self::deserialize(value).ok()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_from_value() {
        let body = json!({
            "Payload": [[1, "Acme"]],
            "CurrentPage": 1,
            "TotalPages": 3,
            "TotalRecordCount": 50,
            "FilteredRecordCount": 45,
            "AggregationPayload": {"Amount": 10.5}
        });
        let response = GridDataResponse::from_value(&body).unwrap();
        assert_eq!(response.payload.len(), 1);
        assert_eq!(response.total_pages, 3);
        assert_eq!(response.filtered_record_count, 45);
        assert_eq!(response.aggregation_payload, Some(json!({"Amount": 10.5})));
    }

    #[test]
    fn test_missing_payload_is_invalid() {
        assert!(GridDataResponse::from_value(&json!({"CurrentPage": 1})).is_none());
        assert!(GridDataResponse::from_value(&json!({"Payload": "nope"})).is_none());
        assert!(GridDataResponse::from_value(&json!([1, 2])).is_none());
    }
}
