//! Configuration error types
//!
//! These are programming errors in the composing layer. They are returned at
//! the call site and never retried.

/// Fatal configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A column was added after the grid sealed its definitions.
    #[error("Cannot define more columns. Column definitions have been sealed")]
    ColumnsSealed,

    /// A column with the same name is already registered.
    #[error("Column '{0}' is already defined")]
    DuplicateColumn(String),

    /// A field was added after the form sealed its definitions.
    #[error("Cannot define more fields. Field definitions have been sealed")]
    FieldsSealed,

    /// A row tried to persist itself without a data service.
    #[error("Define DataService to your model.")]
    MissingDataService,

    /// A row tried to persist itself without a save URL.
    #[error("Define a Save URL.")]
    MissingSaveUrl,

    /// A row deletion was requested without a delete (or save) URL.
    #[error("Define a Delete URL.")]
    MissingDeleteUrl,

    /// A URL could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// A validation pattern is not a valid regular expression.
    #[error("Invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    /// An operation referenced a column that does not exist.
    #[error("Unknown column '{0}'")]
    UnknownColumn(String),
}
