//! Validation rules and their messages.

use chrono::NaiveDateTime;
use regex::Regex;
use serde_json::Value;

use super::is_missing;
use crate::error::ConfigError;
use crate::model::Row;
use crate::model::value::as_number;
use crate::model::value::parse_date;

pub(crate) const REQUIRED_MESSAGE: &str = "The field is required.";
const REGEX_MESSAGE: &str = "The field doesn't match the regular expression.";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// A single validation rule of a field editor.
#[derive(Debug, Clone)]
pub enum FieldRule {
    Required,
    /// Unanchored pattern match with an optional custom message.
    Regex {
        pattern: Regex,
        message: Option<String>,
    },
    /// Value must equal another field of the same row.
    Match { field: String, label: String },
    MinChars(usize),
    MaxChars(usize),
    MinNumber(f64),
    MaxNumber(f64),
    MinDate(NaiveDateTime),
    MaxDate(NaiveDateTime),
}

impl FieldRule {
    /// Builds a regex rule with the default message.
    pub fn regex(pattern: &str) -> Result<Self, ConfigError> {
        Self::regex_with_message(pattern, None)
    }

    /// Builds a regex rule with an optional custom message.
    pub fn regex_with_message(
        pattern: &str,
        message: Option<String>,
    ) -> Result<Self, ConfigError> {
        let compiled = Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self::Regex {
            pattern: compiled,
            message,
        })
    }

    /// Builds a match rule, labelling the other field from its name.
    pub fn matches(field: impl Into<String>) -> Self {
        let field = field.into();
        Self::Match {
            label: crate::model::label_from_name(&field),
            field,
        }
    }

    /// Returns the failure message, or `None` if `value` passes.
    ///
    /// Empty values pass every rule except `Required` and `Match`.
    pub(crate) fn check(&self, value: &Value, row: &Row) -> Option<String> {
        match self {
            Self::Required => is_missing(value).then(|| REQUIRED_MESSAGE.to_string()),
            Self::Regex { pattern, message } => {
                let text = value.as_str().filter(|s| !s.is_empty())?;
                (!pattern.is_match(text))
                    .then(|| message.clone().unwrap_or_else(|| REGEX_MESSAGE.to_string()))
            }
            Self::Match { field, label } => {
                let other = row.get(field).unwrap_or(&Value::Null);
                (value != other).then(|| format!("The field needs to match the {label} field."))
            }
            Self::MinChars(min) => {
                let text = value.as_str().filter(|s| !s.is_empty())?;
                (text.chars().count() < *min)
                    .then(|| format!("The field needs to be minimum {min} chars."))
            }
            Self::MaxChars(max) => {
                let text = value.as_str().filter(|s| !s.is_empty())?;
                (text.chars().count() > *max)
                    .then(|| format!("The field needs to be maximum {max} chars."))
            }
            Self::MinNumber(min) => {
                let number = as_number(value)?;
                (number < *min).then(|| format!("The minimum number is {min}."))
            }
            Self::MaxNumber(max) => {
                let number = as_number(value)?;
                (number > *max).then(|| format!("The maximum number is {max}."))
            }
            Self::MinDate(min) => {
                let date = value.as_str().and_then(parse_date)?;
                (date < *min)
                    .then(|| format!("The minimum date is {}.", min.format(DATE_FORMAT)))
            }
            Self::MaxDate(max) => {
                let date = value.as_str().and_then(parse_date)?;
                (date > *max)
                    .then(|| format!("The maximum date is {}.", max.format(DATE_FORMAT)))
            }
        }
    }
}
