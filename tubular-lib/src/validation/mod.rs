//! Field validation for editors.
//!
//! Validation never fails with an error. Each field gets a [`FieldState`]
//! holding at most one human-readable message, stored on the row.

mod rules;

pub use rules::FieldRule;

use serde_json::Value;

use crate::model::DataType;
use crate::model::Row;

/// Validation result of one field.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FieldState {
    pub errors: Vec<String>,
}

impl FieldState {
    pub fn valid() -> Self {
        Self::default()
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            errors: vec![message.into()],
        }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Editor definition for a single field: its rules, label and default value.
///
/// # Example
///
/// ```
/// use tubular_lib::validation::{FieldRule, FieldValidator};
///
/// let email = FieldValidator::new("Email")
///     .required()
///     .rule(FieldRule::regex(r"^[^@]+@[^@]+$").unwrap());
/// assert_eq!(email.label, "Email");
/// ```
#[derive(Debug, Clone)]
pub struct FieldValidator {
    name: String,
    pub label: String,
    pub data_type: DataType,
    /// Value the field is reset to when a form is cancelled or cleared.
    pub default_value: Value,
    rules: Vec<FieldRule>,
}

impl FieldValidator {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            label: crate::model::label_from_name(&name),
            name,
            data_type: DataType::String,
            default_value: Value::Null,
            rules: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rules(&self) -> &[FieldRule] {
        &self.rules
    }

    /// Sets the label (builder pattern).
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Sets the data type (builder pattern).
    pub fn data_type(mut self, data_type: DataType) -> Self {
        self.data_type = data_type;
        self
    }

    /// Sets the default value (builder pattern).
    pub fn default_value(mut self, value: Value) -> Self {
        self.default_value = value;
        self
    }

    /// Shorthand for adding [`FieldRule::Required`].
    pub fn required(self) -> Self {
        self.rule(FieldRule::Required)
    }

    /// Adds a rule (builder pattern).
    pub fn rule(mut self, rule: FieldRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Returns `true` if the field must have a value.
    pub fn is_required(&self) -> bool {
        self.rules.iter().any(|r| matches!(r, FieldRule::Required))
    }

    /// Checks the field's current value on `row`.
    ///
    /// `Required` is checked first; the remaining rules run in the order they
    /// were added, and the first failure wins.
    pub fn check(&self, row: &Row) -> FieldState {
        let value = row.get(&self.name).unwrap_or(&Value::Null);

        if self.is_required() && is_missing(value) {
            return FieldState::invalid(rules::REQUIRED_MESSAGE);
        }

        self.rules
            .iter()
            .filter(|rule| !matches!(rule, FieldRule::Required))
            .find_map(|rule| rule.check(value, row))
            .map(FieldState::invalid)
            .unwrap_or_default()
    }

    /// Checks the field and records the result in the row's state.
    ///
    /// Returns `true` when the field is valid.
    pub fn validate(&self, row: &mut Row) -> bool {
        let state = self.check(row);
        let valid = state.is_valid();
        row.state.insert(self.name.clone(), state);
        valid
    }
}

/// Validates every field and returns `true` when all of them pass.
pub fn validate_all(validators: &[FieldValidator], row: &mut Row) -> bool {
    validators
        .iter()
        .fold(true, |valid, validator| validator.validate(row) && valid)
}

pub(crate) fn is_missing(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}
