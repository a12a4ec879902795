//! Form controller: one record, its fields and their validation.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::time::Duration;

use serde_json::Map;
use serde_json::Value;
use tokio::sync::broadcast;

use super::FormEvent;
use super::FormSaveOutcome;
use crate::api::DataRequest;
use crate::api::Method;
use crate::api::add_timezone_to_url;
use crate::api::url_with_key;
use crate::error::ApiError;
use crate::error::ConfigError;
use crate::error::Error;
use crate::grid::ConnectionError;
use crate::grid::DEFAULT_GRID_TIMEOUT;
use crate::model::Column;
use crate::model::Row;
use crate::model::RowBinding;
use crate::model::SaveOutcome;
use crate::service::DataService;
use crate::validation::FieldValidator;
use crate::validation::validate_all;

/// Default form name.
pub const DEFAULT_FORM_NAME: &str = "tbform";

/// Configuration for a [`FormController`].
#[derive(Debug, Clone)]
pub struct FormOptions {
    pub name: String,
    /// Endpoint the record is loaded from.
    pub server_url: Option<String>,
    pub server_save_url: Option<String>,
    /// Method for saving new records. Existing records use PUT.
    pub server_save_method: Method,
    /// Key of the record to load. Appended to the server URL.
    pub model_key: Option<String>,
    pub request_timeout: Duration,
    pub require_authentication: bool,
}

impl Default for FormOptions {
    fn default() -> Self {
        Self {
            name: DEFAULT_FORM_NAME.to_string(),
            server_url: None,
            server_save_url: None,
            server_save_method: Method::Post,
            model_key: None,
            request_timeout: DEFAULT_GRID_TIMEOUT,
            require_authentication: true,
        }
    }
}

impl FormOptions {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = Some(url.into());
        self
    }

    pub fn with_save_url(mut self, url: impl Into<String>) -> Self {
        self.server_save_url = Some(url.into());
        self
    }

    pub fn with_save_method(mut self, method: Method) -> Self {
        self.server_save_method = method;
        self
    }

    pub fn with_model_key(mut self, key: impl Into<String>) -> Self {
        self.model_key = Some(key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_authentication(mut self, required: bool) -> Self {
        self.require_authentication = required;
        self
    }
}

struct FormState {
    model: Row,
    fields: Vec<FieldValidator>,
    sealed: bool,
}

/// Headless form bound to a single [`Row`].
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use serde_json::json;
/// use tubular_lib::form::{FormController, FormOptions};
/// use tubular_lib::server::InMemoryDataService;
/// use tubular_lib::validation::FieldValidator;
///
/// # async fn run() -> Result<(), tubular_lib::error::Error> {
/// let service = Arc::new(InMemoryDataService::from_records("orders", vec![]));
/// let form = FormController::new(
///     FormOptions::new("order").with_save_url("/orders"),
///     service,
/// );
/// form.add_field(FieldValidator::new("CustomerName").required())?;
/// form.finish_definition().await;
///
/// form.set_value("CustomerName", json!("Acme"));
/// form.create().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct FormController {
    inner: Arc<FormInner>,
}

struct FormInner {
    options: FormOptions,
    service: Arc<dyn DataService>,
    state: Mutex<FormState>,
    events: broadcast::Sender<FormEvent>,
}

impl std::fmt::Debug for FormController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormController")
            .field("name", &self.inner.options.name)
            .finish_non_exhaustive()
    }
}

impl FormController {
    pub fn new(options: FormOptions, service: Arc<dyn DataService>) -> Self {
        let (events, _) = broadcast::channel(32);
        Self {
            inner: Arc::new(FormInner {
                options,
                service,
                state: Mutex::new(FormState {
                    model: Row::default(),
                    fields: Vec::new(),
                    sealed: false,
                }),
                events,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.options.name
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FormEvent> {
        self.inner.events.subscribe()
    }

    fn emit(&self, event: FormEvent) {
        let _ = self.inner.events.send(event);
    }

    fn emit_connection_error(&self, error: &ApiError) {
        log::warn!("Form '{}': {}", self.name(), error);
        self.emit(FormEvent::ConnectionError(ConnectionError::from(error)));
    }

    fn lock(&self) -> MutexGuard<'_, FormState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a field.
    pub fn add_field(&self, field: FieldValidator) -> Result<(), ConfigError> {
        let mut state = self.lock();
        if state.sealed {
            return Err(ConfigError::FieldsSealed);
        }
        state.fields.push(field);
        Ok(())
    }

    pub fn fields(&self) -> Vec<FieldValidator> {
        self.lock().fields.clone()
    }

    /// Seals the field definitions, announces the form and loads the record.
    pub async fn finish_definition(&self) {
        self.lock().sealed = true;
        self.emit(FormEvent::GreetParent {
            name: self.name().to_string(),
        });
        // Load failures were already reported as connection errors.
        let _ = self.retrieve_data().await;
    }

    /// Snapshot of the current record.
    pub fn model(&self) -> Row {
        self.lock().model.clone()
    }

    pub fn value(&self, field: &str) -> Option<Value> {
        self.lock().model.get(field).cloned()
    }

    pub fn set_value(&self, field: &str, value: Value) {
        self.lock().model.set(field, value);
    }

    /// Replaces the record with a copy of `record`, bound to this form.
    pub fn set_model(&self, record: &Value) {
        let row = Row::from_record(record, &self.field_columns());
        self.lock().model = row.with_binding(self.row_binding());
    }

    fn field_columns(&self) -> Vec<Column> {
        self.lock()
            .fields
            .iter()
            .map(|f| Column::new(f.name()).data_type(f.data_type))
            .collect()
    }

    fn row_binding(&self) -> RowBinding {
        let options = &self.inner.options;
        RowBinding {
            service: self.inner.service.clone(),
            save_url: options.server_save_url.clone(),
            save_method: options.server_save_method,
            timeout: options.request_timeout,
            require_authentication: options.require_authentication,
        }
    }

    fn default_record(&self) -> Value {
        let record: Map<String, Value> = self
            .lock()
            .fields
            .iter()
            .map(|f| (f.name().to_string(), f.default_value.clone()))
            .collect();
        Value::Object(record)
    }

    /// Loads the record.
    ///
    /// With a model key the record is fetched by key. Without one, the server
    /// URL answers with a template for a new record. Without a server URL the
    /// form starts from the fields' default values.
    pub async fn retrieve_data(&self) -> Result<(), ApiError> {
        let options = &self.inner.options;
        let Some(server_url) = options.server_url.as_deref().filter(|u| !u.is_empty()) else {
            let record = self.default_record();
            let row = Row::from_record(&record, &self.field_columns());
            self.lock().model = row.with_binding(self.row_binding());
            return Ok(());
        };

        let key = options.model_key.as_deref().filter(|k| !k.is_empty());
        let url = match key {
            Some(key) => url_with_key(server_url, key),
            None => add_timezone_to_url(server_url),
        };
        let request = DataRequest::get(url)
            .with_timeout(options.request_timeout)
            .with_authentication(options.require_authentication);

        let data = match self.inner.service.retrieve(request).await {
            Ok(data) => data.unwrap_or(Value::Null),
            Err(e) => {
                self.emit_connection_error(&e);
                return Err(e);
            }
        };

        let mut row = Row::from_record(&data, &self.field_columns()).with_binding(self.row_binding());
        row.is_new = key.is_none();
        self.lock().model = row;
        Ok(())
    }

    /// Validates every field against the current record.
    pub fn validate(&self) -> bool {
        let mut state = self.lock();
        let FormState { model, fields, .. } = &mut *state;
        validate_all(fields, model)
    }

    /// Validates and saves the record.
    ///
    /// Unless `keep_data` is set, fields return to their defaults after a
    /// successful save.
    pub async fn save(&self, force_update: bool, keep_data: bool) -> Result<FormSaveOutcome, Error> {
        if !self.validate() {
            return Ok(FormSaveOutcome::Invalid);
        }

        let mut model = self.model();
        let result = model.save(force_update).await;

        match result {
            Ok(SaveOutcome::NoChanges) => {
                self.emit(FormEvent::SavingNoChanges);
                Ok(FormSaveOutcome::NoChanges)
            }
            Ok(SaveOutcome::Saved(data)) => {
                log::info!("Form '{}' saved", self.name());
                self.lock().model = model;
                self.emit(FormEvent::SuccessfulSave(data.clone()));
                if !keep_data {
                    self.clear();
                }
                Ok(FormSaveOutcome::Saved(data))
            }
            Err(Error::Api(e)) => {
                self.emit_connection_error(&e);
                Err(Error::Api(e))
            }
            Err(e) => Err(e),
        }
    }

    /// Saves the record as a new one.
    pub async fn create(&self) -> Result<FormSaveOutcome, Error> {
        self.lock().model.is_new = true;
        self.save(false, false).await
    }

    /// Abandons the edit and resets the fields.
    pub fn cancel(&self) {
        let record = self.lock().model.to_record();
        self.emit(FormEvent::Cancel(record));
        self.clear();
    }

    /// Sets every field back to its default value.
    pub fn clear(&self) {
        let mut state = self.lock();
        let FormState { model, fields, .. } = &mut *state;
        for field in fields.iter() {
            model.set(field.name(), field.default_value.clone());
        }
    }
}
