//! Grid state and pager arithmetic.

use serde_json::Value;

use crate::model::Column;
use crate::model::Row;
use crate::model::Search;

/// Column registration phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegistrationPhase {
    /// No registration has started.
    #[default]
    Idle,
    Registering,
    /// Column definitions are final.
    Sealed,
}

/// Result of [`GridController::retrieve_data`](super::GridController::retrieve_data).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Nothing was requested: no URL, a request in flight, or a no-op change.
    Skipped,
    /// A page was applied.
    Loaded,
    /// The request or its payload failed; a connection error was emitted.
    Failed,
}

/// Everything a grid knows. Snapshots are returned by value.
#[derive(Debug, Clone)]
pub struct GridState {
    pub server_url: String,
    pub current_page: i64,
    pub requested_page: i64,
    pub page_size: i64,
    pub total_record_count: i64,
    pub filtered_record_count: i64,
    pub total_pages: i64,
    pub search: Search,
    pub columns: Vec<Column>,
    /// Selected row keys, in selection order.
    pub selected_keys: Vec<String>,
    /// Completed fetches, successful or not.
    pub request_counter: u64,
    /// `true` while a request of this grid is pending.
    pub in_flight: bool,
    pub is_empty: bool,
    pub rows: Vec<Row>,
    /// Records of the current page as received.
    pub raw_rows: Vec<Value>,
    pub aggregation_payload: Option<Value>,
    pub can_save_state: bool,
    pub registration: RegistrationPhase,
}

impl GridState {
    pub(crate) fn new(server_url: String, current_page: i64, page_size: i64, search: Search) -> Self {
        Self {
            server_url,
            current_page,
            requested_page: current_page,
            page_size,
            total_record_count: 0,
            filtered_record_count: 0,
            total_pages: 0,
            search,
            columns: Vec::new(),
            selected_keys: Vec::new(),
            request_counter: 0,
            in_flight: false,
            is_empty: false,
            rows: Vec::new(),
            raw_rows: Vec::new(),
            aggregation_payload: None,
            can_save_state: false,
            registration: RegistrationPhase::Idle,
        }
    }

    pub fn is_sealed(&self) -> bool {
        self.registration == RegistrationPhase::Sealed
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name() == name)
    }

    pub(crate) fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name() == name)
    }

    /// Number of visible columns.
    pub fn visible_column_count(&self) -> usize {
        self.columns.iter().filter(|c| c.visible).count()
    }

    pub fn pager_info(&self) -> PagerInfo {
        PagerInfo::compute(
            self.current_page,
            self.page_size,
            self.total_record_count,
            self.filtered_record_count,
        )
    }
}

/// "Showing X to Y of Z" numbers of a pager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagerInfo {
    /// One-based index of the first record shown, `0` when nothing is shown.
    pub first: i64,
    /// One-based index of the last record shown.
    pub last: i64,
    pub filtered_record_count: i64,
    pub total_record_count: i64,
    /// `true` when a search or filter hides records.
    pub is_filtered: bool,
}

impl PagerInfo {
    pub fn compute(
        current_page: i64,
        page_size: i64,
        total_record_count: i64,
        filtered_record_count: i64,
    ) -> Self {
        let mut last = page_size
            .saturating_mul(current_page)
            .min(filtered_record_count)
            .max(0);
        let mut first = (current_page - 1).saturating_mul(page_size).saturating_add(1);

        if first < 0 || total_record_count == 0 {
            first = 0;
        }

        if page_size > filtered_record_count {
            first = filtered_record_count.min(1);
            last = filtered_record_count;
        }

        Self {
            first,
            last,
            filtered_record_count,
            total_record_count,
            is_filtered: total_record_count != filtered_record_count,
        }
    }
}
