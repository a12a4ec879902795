//! Row model: one record with change tracking.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Map;
use serde_json::Value;

use super::Column;
use super::value::key_text;
use super::value::normalize_date;
use crate::api::DataRequest;
use crate::api::Method;
use crate::api::Payload;
use crate::api::UpdatePayload;
use crate::api::add_timezone_to_url;
use crate::api::timezone_offset;
use crate::error::ConfigError;
use crate::error::Error;
use crate::grid::GridController;
use crate::service::DataService;
use crate::validation::FieldState;

/// Where and how a row persists itself.
#[derive(Clone)]
pub struct RowBinding {
    pub service: Arc<dyn DataService>,
    pub save_url: Option<String>,
    /// Method used for new rows. Existing rows always use PUT.
    pub save_method: Method,
    pub timeout: Duration,
    pub require_authentication: bool,
}

impl std::fmt::Debug for RowBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowBinding")
            .field("save_url", &self.save_url)
            .field("save_method", &self.save_method)
            .field("timeout", &self.timeout)
            .field("require_authentication", &self.require_authentication)
            .finish_non_exhaustive()
    }
}

/// Result of [`Row::save`].
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    /// The row is neither new nor changed; nothing was sent.
    NoChanges,
    /// The endpoint accepted the row and answered with this body.
    Saved(Option<Value>),
}

/// A single record of a grid or form.
///
/// Values change only through [`set`](Row::set) and
/// [`add_field`](Row::add_field), which keep `has_changes` current.
#[derive(Debug, Clone, Default)]
pub struct Row {
    key: String,
    fields: Vec<String>,
    values: HashMap<String, Value>,
    /// Baseline for change detection. `None` marks a field added without one.
    original: HashMap<String, Option<Value>>,
    has_changes: bool,
    is_editing: bool,
    pub is_new: bool,
    pub selected: bool,
    pub state: HashMap<String, FieldState>,
    binding: Option<RowBinding>,
}

impl Row {
    /// Builds a row from a raw record.
    ///
    /// Object records are read by column name and keep their extra fields;
    /// array records are read by column position.
    pub fn from_record(record: &Value, columns: &[Column]) -> Self {
        let mut row = Row::default();

        if let Value::Object(object) = record {
            for (name, value) in object {
                if !name.starts_with('$') {
                    row.track(name, value.clone());
                }
            }
        }

        let mut key = String::new();
        for (index, column) in columns.iter().enumerate() {
            let raw = match record {
                Value::Array(items) => items.get(index).cloned(),
                Value::Object(object) => object.get(column.name()).cloned(),
                _ => None,
            }
            .unwrap_or(Value::Null);

            let value = if column.data_type.is_date() {
                normalize_date(raw)
            } else {
                raw
            };

            if column.is_key {
                key.push_str(&key_text(&value));
                key.push(',');
            }

            row.track(column.name(), value);
        }

        key.pop();
        row.key = key;
        row
    }

    /// Builds a new (unsaved) row.
    pub fn new_record(record: &Value, columns: &[Column]) -> Self {
        let mut row = Self::from_record(record, columns);
        row.is_new = true;
        row
    }

    /// Attaches persistence settings (builder pattern).
    pub fn with_binding(mut self, binding: RowBinding) -> Self {
        self.binding = Some(binding);
        self
    }

    pub fn bind(&mut self, binding: RowBinding) {
        self.binding = Some(binding);
    }

    pub fn binding(&self) -> Option<&RowBinding> {
        self.binding.as_ref()
    }

    fn track(&mut self, name: &str, value: Value) {
        if !self.values.contains_key(name) {
            self.fields.push(name.to_string());
        }
        self.original.insert(name.to_string(), Some(value.clone()));
        self.values.insert(name.to_string(), value);
    }

    /// Comma-joined values of the key columns.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Field names in insertion order.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn has_changes(&self) -> bool {
        self.has_changes
    }

    pub fn is_editing(&self) -> bool {
        self.is_editing
    }

    /// Enters or leaves edit mode without saving.
    pub fn set_editing(&mut self, editing: bool) {
        self.is_editing = editing;
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    /// Baseline value of a tracked field.
    pub fn original(&self, field: &str) -> Option<&Value> {
        self.original.get(field).and_then(Option::as_ref)
    }

    /// Sets a field value and recomputes `has_changes`.
    ///
    /// Unknown fields are added without a baseline.
    pub fn set(&mut self, field: &str, value: Value) {
        if !self.values.contains_key(field) {
            self.add_field(field, value, true);
            return;
        }
        self.values.insert(field.to_string(), value);
        self.recompute_changes();
    }

    /// Adds a field. With `ignore_original` the field has no baseline and the
    /// row is marked changed.
    pub fn add_field(&mut self, field: &str, value: Value, ignore_original: bool) {
        if !self.values.contains_key(field) {
            self.fields.push(field.to_string());
        }
        self.values.insert(field.to_string(), value.clone());
        self.original
            .insert(field.to_string(), (!ignore_original).then_some(value));

        if ignore_original {
            self.has_changes = true;
        } else {
            self.recompute_changes();
        }
    }

    fn recompute_changes(&mut self) {
        self.has_changes = self.fields.iter().any(|field| {
            let baseline = self.original.get(field).and_then(Option::as_ref);
            baseline != self.values.get(field)
        });
    }

    /// Restores every field with a baseline and leaves edit mode.
    pub fn revert_changes(&mut self) {
        for (field, baseline) in &self.original {
            if let Some(value) = baseline {
                self.values.insert(field.clone(), value.clone());
            }
        }
        self.has_changes = false;
        self.is_editing = false;
    }

    /// Makes the current values the new baseline.
    pub fn reset_original(&mut self) {
        for field in &self.fields {
            let value = self.values.get(field).cloned().unwrap_or(Value::Null);
            self.original.insert(field.clone(), Some(value));
        }
        self.has_changes = false;
    }

    /// Current values as a plain record, in field order.
    pub fn to_record(&self) -> Map<String, Value> {
        self.fields
            .iter()
            .map(|field| {
                let value = self.values.get(field).cloned().unwrap_or(Value::Null);
                (field.clone(), value)
            })
            .collect()
    }

    /// Baseline values as a plain record. Fields without a baseline are left out.
    pub fn original_record(&self) -> Map<String, Value> {
        self.fields
            .iter()
            .filter_map(|field| {
                let value = self.original.get(field)?.as_ref()?;
                Some((field.clone(), value.clone()))
            })
            .collect()
    }

    /// Returns `true` when no field has validation errors.
    pub fn is_valid(&self) -> bool {
        self.state.values().all(FieldState::is_valid)
    }

    /// Persists the row.
    ///
    /// New rows are sent as a plain record with the configured save method.
    /// Existing rows are sent with PUT as `{Old, New, TimezoneOffset}`.
    pub async fn save(&mut self, force_update: bool) -> Result<SaveOutcome, Error> {
        let binding = self.binding.as_ref().ok_or(ConfigError::MissingDataService)?;
        let save_url = binding
            .save_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .ok_or(ConfigError::MissingSaveUrl)?;

        if !force_update && !self.is_new && !self.has_changes {
            return Ok(SaveOutcome::NoChanges);
        }

        let request = if self.is_new {
            DataRequest::new(add_timezone_to_url(save_url), binding.save_method)
                .with_payload(Payload::Record(self.to_record()))
        } else {
            DataRequest::new(save_url, Method::Put).with_payload(Payload::Update(UpdatePayload {
                old: self.original_record(),
                new: self.to_record(),
                timezone_offset: timezone_offset(),
            }))
        }
        .with_timeout(binding.timeout)
        .with_authentication(binding.require_authentication);

        log::debug!("Saving row '{}' via {} {}", self.key, request.method.as_str(), request.url);
        let service = binding.service.clone();
        let response = service.retrieve(request).await?;

        self.reset_original();
        Ok(SaveOutcome::Saved(response))
    }

    /// Toggles edit mode, saving first when leaving it with pending changes.
    pub async fn edit(&mut self) -> Result<Option<SaveOutcome>, Error> {
        let outcome = if self.is_editing && self.has_changes {
            Some(self.save(false).await?)
        } else {
            None
        };
        self.is_editing = !self.is_editing;
        Ok(outcome)
    }

    /// Deletes the row through its grid. See [`GridController::delete_row`].
    pub async fn delete(&self, grid: &GridController) -> Result<bool, ConfigError> {
        grid.delete_row(self).await
    }
}
