//! Grid controller: request lifecycle and state persistence.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::broadcast;

use super::ConnectionError;
use super::DEFAULT_PAGE_SIZE;
use super::FetchOutcome;
use super::GridEvent;
use super::GridOptions;
use super::GridState;
use super::MIN_PAGE_SIZE;
use super::PagerInfo;
use crate::api::DataRequest;
use crate::api::GridDataRequest;
use crate::api::GridDataResponse;
use crate::api::Method;
use crate::api::Payload;
use crate::api::timezone_offset;
use crate::error::ApiError;
use crate::error::ConfigError;
use crate::model::Column;
use crate::model::Row;
use crate::model::RowBinding;
use crate::model::Search;
use crate::service::DataService;
use crate::storage::StateStore;

pub(crate) const PAGE_KEY: &str = "page";
pub(crate) const PAGE_SIZE_KEY: &str = "pageSize";
pub(crate) const SEARCH_KEY: &str = "search";
pub(crate) const COLUMNS_KEY: &str = "columns";
pub(crate) const ROWS_KEY: &str = "rows";

/// Headless grid: columns, paging, sorting, filtering, selection and the
/// request/response lifecycle against a [`DataService`].
///
/// Cheap to clone; clones drive the same grid. State lives behind a mutex
/// that is never held across an `.await`.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use tubular_lib::grid::{GridController, GridOptions};
/// use tubular_lib::model::Column;
/// use tubular_lib::server::InMemoryDataService;
/// use tubular_lib::storage::StateStore;
///
/// # async fn run() -> Result<(), tubular_lib::error::Error> {
/// let service = Arc::new(InMemoryDataService::from_records("orders", vec![]));
/// let grid = GridController::new(
///     GridOptions::new("orders").with_server_url("/orders"),
///     service,
///     StateStore::in_memory(),
/// );
///
/// grid.begin_registration()?;
/// grid.add_column(Column::new("OrderId").key())?;
/// grid.add_column(Column::new("CustomerName").searchable())?;
/// grid.seal_registration();
///
/// grid.retrieve_data().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct GridController {
    inner: Arc<GridInner>,
}

struct GridInner {
    options: GridOptions,
    service: Arc<dyn DataService>,
    store: StateStore,
    state: Mutex<GridState>,
    events: broadcast::Sender<GridEvent>,
}

impl std::fmt::Debug for GridController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GridController")
            .field("name", &self.inner.options.name)
            .finish_non_exhaustive()
    }
}

/// Clears the in-flight flag when the request completes or is dropped.
struct InFlight<'a>(&'a GridController);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.lock().in_flight = false;
    }
}

impl GridController {
    /// Creates a grid, restoring page, search and selection from `store`
    /// according to the save flags.
    pub fn new(options: GridOptions, service: Arc<dyn DataService>, store: StateStore) -> Self {
        let (events, _) = broadcast::channel(64);

        let grid = Self {
            inner: Arc::new(GridInner {
                state: Mutex::new(GridState::new(
                    options.server_url.clone(),
                    1,
                    options.page_size,
                    Search::none(),
                )),
                options,
                service,
                store,
                events,
            }),
        };
        grid.restore();
        grid
    }

    fn restore(&self) {
        let options = &self.inner.options;
        let current_page = if options.save_page {
            self.load::<i64>(PAGE_KEY).filter(|p| *p >= 1).unwrap_or(1)
        } else {
            1
        };
        let search = if options.save_search {
            Search::from_text(self.load::<String>(SEARCH_KEY).unwrap_or_default())
        } else {
            Search::none()
        };
        let selected = self.load::<Vec<String>>(ROWS_KEY).unwrap_or_default();

        let mut state = self.lock();
        state.current_page = current_page;
        state.requested_page = current_page;
        state.search = search;
        state.selected_keys = selected;
    }

    pub fn name(&self) -> &str {
        &self.inner.options.name
    }

    pub fn options(&self) -> &GridOptions {
        &self.inner.options
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GridEvent> {
        self.inner.events.subscribe()
    }

    pub(crate) fn emit(&self, event: GridEvent) {
        // No receivers is fine.
        let _ = self.inner.events.send(event);
    }

    pub(crate) fn emit_connection_error(&self, error: ConnectionError) {
        log::warn!("Grid '{}': {}", self.name(), error);
        self.emit(GridEvent::ConnectionError(error));
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, GridState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the whole state.
    pub fn state(&self) -> GridState {
        self.lock().clone()
    }

    pub fn rows(&self) -> Vec<Row> {
        self.lock().rows.clone()
    }

    pub fn columns(&self) -> Vec<Column> {
        self.lock().columns.clone()
    }

    pub fn is_in_flight(&self) -> bool {
        self.lock().in_flight
    }

    pub fn pager_info(&self) -> PagerInfo {
        self.lock().pager_info()
    }

    // =========================================================================
    // Local state store
    // =========================================================================

    pub(crate) fn store_key(&self, suffix: &str) -> String {
        format!("{}_{}", self.name(), suffix)
    }

    pub(crate) fn load<T: DeserializeOwned>(&self, suffix: &str) -> Option<T> {
        let key = self.store_key(suffix);
        match self.inner.store.get(&key) {
            Ok(value) => value,
            Err(e) => {
                log::warn!("Failed to read {}: {}", key, e);
                None
            }
        }
    }

    pub(crate) fn persist<T: Serialize + ?Sized>(&self, suffix: &str, value: &T) {
        let key = self.store_key(suffix);
        if let Err(e) = self.inner.store.set(&key, value) {
            log::warn!("Failed to write {}: {}", key, e);
        }
    }

    pub(crate) fn forget(&self, suffix: &str) {
        let key = self.store_key(suffix);
        if let Err(e) = self.inner.store.remove(&key) {
            log::warn!("Failed to remove {}: {}", key, e);
        }
    }

    // =========================================================================
    // Requests
    // =========================================================================

    fn page_request(&self, state: &GridState, skip: i64) -> DataRequest {
        let options = &self.inner.options;
        DataRequest::new(state.server_url.clone(), options.request_method)
            .with_timeout(options.request_timeout)
            .with_authentication(options.require_authentication)
            .with_payload(Payload::Grid(GridDataRequest {
                count: state.request_counter,
                columns: state.columns.clone(),
                skip,
                take: state.page_size,
                search: state.search.clone(),
                timezone_offset: timezone_offset(),
            }))
    }

    /// Builds the page request for the given offset from the current state.
    pub fn get_request_object(&self, skip: i64) -> DataRequest {
        let state = self.lock();
        self.page_request(&state, skip)
    }

    /// Builds the export request: every record, no search.
    pub fn full_request_object(&self) -> DataRequest {
        let mut request = self.get_request_object(0);
        if let Some(Payload::Grid(grid)) = request.payload.as_mut() {
            grid.take = -1;
            grid.search = Search::none();
        }
        request
    }

    /// Persistence settings handed to every row this grid creates.
    pub fn row_binding(&self) -> RowBinding {
        let options = &self.inner.options;
        RowBinding {
            service: self.inner.service.clone(),
            save_url: options.server_save_url.clone(),
            save_method: options.server_save_method,
            timeout: options.request_timeout,
            require_authentication: options.require_authentication,
        }
    }

    /// Fetches the requested page.
    ///
    /// Returns [`FetchOutcome::Skipped`] without touching the network when
    /// there is no URL or another request of this grid is pending.
    pub async fn retrieve_data(&self) -> FetchOutcome {
        let request = {
            let mut state = self.lock();
            if state.server_url.is_empty() || state.in_flight {
                return FetchOutcome::Skipped;
            }
            state.in_flight = true;
            state.can_save_state = true;

            self.verify_columns_locked(&mut state);

            if self.inner.options.save_page_size {
                if let Some(size) = self.load::<i64>(PAGE_SIZE_KEY) {
                    state.page_size = size;
                }
            }
            if state.page_size < MIN_PAGE_SIZE {
                state.page_size = DEFAULT_PAGE_SIZE;
            }

            let pages = div_ceil(state.total_record_count, state.page_size).max(1);
            if state.requested_page > pages {
                state.requested_page = pages;
            }
            state.requested_page = state.requested_page.max(1);

            let skip = (state.requested_page - 1).saturating_mul(state.page_size).max(0);
            self.page_request(&state, skip)
        };
        let _in_flight = InFlight(self);

        if let Some(hook) = &self.inner.options.before_fetch {
            hook(&request);
        }
        self.emit(GridEvent::BeforeRequest(request.clone()));
        log::debug!("Grid '{}' requesting {}", self.name(), request.url);

        match self.inner.service.retrieve(request).await {
            Ok(data) => {
                if self.process_payload(data) {
                    FetchOutcome::Loaded
                } else {
                    FetchOutcome::Failed
                }
            }
            Err(e) => {
                {
                    let mut state = self.lock();
                    state.requested_page = state.current_page;
                }
                self.emit_connection_error(ConnectionError::from(&e));
                FetchOutcome::Failed
            }
        }
    }

    /// Applies a response body to the grid.
    ///
    /// Returns `true` when a page was applied. Empty or malformed bodies emit
    /// exactly one connection error.
    pub fn process_payload(&self, data: Option<Value>) -> bool {
        let mut state = self.lock();
        state.request_counter += 1;

        let Some(data) = data.filter(|v| !v.is_null()) else {
            drop(state);
            self.emit_connection_error(ConnectionError::new(0, "Data is empty"));
            return false;
        };

        let Some(response) = GridDataResponse::from_value(&data) else {
            drop(state);
            self.emit_connection_error(ConnectionError::new(
                0,
                format!("tubularGrid({}): response is invalid.", self.name()),
            ));
            return false;
        };

        let binding = self.row_binding();
        let rows: Vec<Row> = response
            .payload
            .iter()
            .map(|record| {
                let mut row = Row::from_record(record, &state.columns).with_binding(binding.clone());
                row.selected = state.selected_keys.iter().any(|k| k == row.key());
                row
            })
            .collect();

        state.rows = rows;
        state.raw_rows = response.payload;
        state.aggregation_payload = response.aggregation_payload;
        state.current_page = response.current_page;
        state.total_pages = response.total_pages;
        state.total_record_count = response.total_record_count;
        state.filtered_record_count = response.filtered_record_count;
        state.is_empty = state.filtered_record_count == 0;
        state.requested_page = state.current_page;
        let current_page = state.current_page;
        drop(state);

        if self.inner.options.save_page {
            self.persist(PAGE_KEY, &current_page);
        }

        self.emit(GridEvent::DataLoaded {
            name: self.name().to_string(),
        });
        true
    }

    /// Re-fetches when columns are sealed and a first fetch has completed.
    async fn refresh_if_loaded(&self) -> FetchOutcome {
        let ready = {
            let state = self.lock();
            state.is_sealed() && state.request_counter > 0
        };
        if ready {
            self.retrieve_data().await
        } else {
            FetchOutcome::Skipped
        }
    }

    // =========================================================================
    // Paging and search
    // =========================================================================

    /// Changes the page size, persisting it when enabled.
    pub async fn set_page_size(&self, page_size: i64) -> FetchOutcome {
        self.lock().page_size = page_size;
        if self.inner.options.save_page_size {
            self.persist(PAGE_SIZE_KEY, &page_size);
        }
        self.refresh_if_loaded().await
    }

    /// Requests a page.
    pub async fn go_to_page(&self, page: i64) -> FetchOutcome {
        {
            let mut state = self.lock();
            if state.requested_page == page {
                return FetchOutcome::Skipped;
            }
            state.requested_page = page;
        }
        self.refresh_if_loaded().await
    }

    /// Points the grid at another endpoint.
    pub async fn set_server_url(&self, url: impl Into<String>) -> FetchOutcome {
        let url = url.into();
        let changed = {
            let mut state = self.lock();
            let changed = state.server_url != url;
            state.server_url = url;
            changed && state.is_sealed() && !state.in_flight
        };
        if changed {
            self.retrieve_data().await
        } else {
            FetchOutcome::Skipped
        }
    }

    /// Sets the free-text search and goes back to the first page.
    pub async fn set_search(&self, text: impl Into<String>) -> FetchOutcome {
        let search = Search::from_text(text);
        {
            let mut state = self.lock();
            state.search = search.clone();
            state.requested_page = 1;
        }
        if self.inner.options.save_search {
            if search.is_empty() {
                self.forget(SEARCH_KEY);
            } else {
                self.persist(SEARCH_KEY, &search.text);
            }
        }
        self.retrieve_data().await
    }

    // =========================================================================
    // Rows
    // =========================================================================

    /// Creates an unsaved row in edit mode, bound to this grid's save settings.
    pub fn new_row(&self, data: Option<Value>) -> Row {
        let columns = self.columns();
        let data = data.unwrap_or_else(|| Value::Object(Default::default()));
        let mut row = Row::new_record(&data, &columns).with_binding(self.row_binding());
        row.set_editing(true);
        row
    }

    /// Fresh copy of the `index`-th record of the current page, for editing
    /// outside the grid.
    pub fn edit_copy(&self, index: usize) -> Option<Row> {
        let state = self.lock();
        let record = state.raw_rows.get(index)?;
        Some(Row::from_record(record, &state.columns).with_binding(self.row_binding()))
    }

    /// Deletes a row on the server, then reloads.
    ///
    /// Issues `DELETE <deleteUrl>/<key>`, keeping the delete URL's query
    /// string. Returns `true` when the server accepted the deletion; failures
    /// are reported as a connection error. Nothing is sent, and `false` is
    /// returned, while another request of this grid is pending.
    pub async fn delete_row(&self, row: &Row) -> Result<bool, ConfigError> {
        let options = &self.inner.options;
        let delete_url = options.delete_url().ok_or(ConfigError::MissingDeleteUrl)?;
        let url = match delete_url.split_once('?') {
            Some((base, query)) => format!("{base}/{}?{query}", row.key()),
            None => format!("{delete_url}/{}", row.key()),
        };

        let request = DataRequest::new(url, Method::Delete)
            .with_timeout(options.request_timeout)
            .with_authentication(options.require_authentication);

        {
            let mut state = self.lock();
            if state.in_flight {
                log::warn!(
                    "Grid '{}' is busy, not removing row '{}'",
                    self.name(),
                    row.key()
                );
                return Ok(false);
            }
            state.in_flight = true;
        }
        let result = {
            let _in_flight = InFlight(self);
            self.inner.service.retrieve(request).await
        };

        let removed = match result {
            Ok(data) => {
                log::debug!("Grid '{}' removed row '{}'", self.name(), row.key());
                self.emit(GridEvent::RemoveSuccess(data));
                true
            }
            Err(e) => {
                self.emit_connection_error(ConnectionError::from(&e));
                false
            }
        };

        self.retrieve_data().await;
        Ok(removed)
    }

    /// Fetches every record, ignoring paging and search.
    ///
    /// Failures are also reported as a connection error.
    pub async fn get_full_data_source(&self) -> Result<Vec<Value>, ApiError> {
        let request = self.full_request_object();
        let result = match self.inner.service.retrieve(request).await {
            Ok(Some(data)) => GridDataResponse::from_value(&data)
                .map(|response| response.payload)
                .ok_or_else(|| {
                    ApiError::parse(format!("tubularGrid({}): response is invalid.", self.name()))
                }),
            Ok(None) => Err(ApiError::parse("Data is empty")),
            Err(e) => Err(e),
        };

        if let Err(e) = &result {
            self.emit_connection_error(ConnectionError::from(e));
        }
        result
    }
}

pub(crate) fn div_ceil(a: i64, b: i64) -> i64 {
    if b <= 0 {
        return 0;
    }
    a.div_euclid(b) + i64::from(a.rem_euclid(b) != 0)
}
