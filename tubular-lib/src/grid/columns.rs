//! Column registration, layout persistence, sorting and filtering.

use serde_json::Value;

use super::COLUMNS_KEY;
use super::FetchOutcome;
use super::GridController;
use super::GridEvent;
use super::GridState;
use super::RegistrationPhase;
use crate::error::ConfigError;
use crate::model::Column;
use crate::model::Filter;
use crate::model::FilterOperator;
use crate::model::SortDirection;

impl GridController {
    /// Opens column registration and announces the grid to its container.
    pub fn begin_registration(&self) -> Result<(), ConfigError> {
        {
            let mut state = self.lock();
            if state.is_sealed() {
                return Err(ConfigError::ColumnsSealed);
            }
            state.registration = RegistrationPhase::Registering;
        }
        self.emit(GridEvent::GreetParent {
            name: self.name().to_string(),
        });
        Ok(())
    }

    /// Registers a column. Empty names are ignored.
    pub fn add_column(&self, column: Column) -> Result<(), ConfigError> {
        let mut state = self.lock();
        if state.is_sealed() {
            return Err(ConfigError::ColumnsSealed);
        }
        if column.name().is_empty() {
            return Ok(());
        }
        if state.column(column.name()).is_some() {
            return Err(ConfigError::DuplicateColumn(column.name().to_string()));
        }
        if state.registration == RegistrationPhase::Idle {
            state.registration = RegistrationPhase::Registering;
        }
        state.columns.push(column);
        Ok(())
    }

    /// Closes column registration. Calling it again has no effect.
    pub fn seal_registration(&self) {
        self.lock().registration = RegistrationPhase::Sealed;
    }

    pub fn is_sealed(&self) -> bool {
        self.lock().is_sealed()
    }

    /// Reconciles live columns with the stored layout.
    pub fn verify_columns(&self) {
        let mut state = self.lock();
        self.verify_columns_locked(&mut state);
    }

    pub(crate) fn verify_columns_locked(&self, state: &mut GridState) {
        let Some(stored) = self.load::<Vec<Column>>(COLUMNS_KEY) else {
            self.save_columns_locked(state);
            return;
        };

        let first_fetch = state.request_counter < 1;
        for saved in &stored {
            let Some(column) = state.column_mut(saved.name()) else {
                continue;
            };

            column.visible = saved.visible;

            if first_fetch {
                column.sort_order = saved.sort_order;
                column.sort_direction = saved.sort_direction;
            }

            let stored_filter = saved
                .filter
                .as_ref()
                .filter(|f| f.text.is_some() && f.operator != FilterOperator::None);
            if let Some(filter) = stored_filter {
                if !column.has_active_filter() {
                    column.filter = Some(filter.clone());
                }
            }
        }
    }

    fn save_columns_locked(&self, state: &GridState) {
        if state.is_sealed() && state.can_save_state {
            self.persist(COLUMNS_KEY, &state.columns);
        }
    }

    /// Persists the current column layout once the grid may save state.
    pub fn save_columns(&self) {
        let state = self.lock();
        self.save_columns_locked(&state);
    }

    /// Cycles the sort direction of a column and re-fetches.
    ///
    /// Without `multiple`, every other column loses its sort.
    pub async fn sort_column(&self, name: &str, multiple: bool) -> FetchOutcome {
        {
            let mut state = self.lock();
            let Some(column) = state.column_mut(name).filter(|c| c.sortable) else {
                return FetchOutcome::Skipped;
            };

            let direction = column.sort_direction.next();
            if direction == SortDirection::None {
                column.clear_sort();
            } else {
                column.sort_order = i32::MAX;
                column.sort_direction = direction;
            }

            if !multiple {
                for other in state.columns.iter_mut().filter(|c| c.name() != name) {
                    other.clear_sort();
                }
            }

            rerank_sorts(&mut state.columns);
            self.save_columns_locked(&state);
        }

        self.emit(GridEvent::SortChanged);
        self.retrieve_data().await
    }

    /// Activates a column filter, goes back to the first page and re-fetches.
    pub async fn apply_filter(
        &self,
        name: &str,
        text: impl Into<String>,
        argument: Option<Vec<Value>>,
        operator: FilterOperator,
    ) -> Result<FetchOutcome, ConfigError> {
        {
            let mut state = self.lock();
            let column = state
                .column_mut(name)
                .ok_or_else(|| ConfigError::UnknownColumn(name.to_string()))?;
            let data_type = column.data_type;
            column
                .filter
                .get_or_insert_with(|| Filter::for_data_type(name, data_type))
                .apply(text, argument, operator);
            state.requested_page = 1;
            self.save_columns_locked(&state);
        }
        Ok(self.retrieve_data().await)
    }

    /// Clears a column filter and re-fetches.
    pub async fn clear_filter(&self, name: &str) -> Result<FetchOutcome, ConfigError> {
        {
            let mut state = self.lock();
            let column = state
                .column_mut(name)
                .ok_or_else(|| ConfigError::UnknownColumn(name.to_string()))?;
            if let Some(filter) = column.filter.as_mut() {
                filter.clear();
            }
            state.requested_page = 1;
            self.save_columns_locked(&state);
        }
        Ok(self.retrieve_data().await)
    }

    /// Shows or hides a column.
    pub fn set_column_visible(&self, name: &str, visible: bool) -> Result<(), ConfigError> {
        let mut state = self.lock();
        let column = state
            .column_mut(name)
            .ok_or_else(|| ConfigError::UnknownColumn(name.to_string()))?;
        column.visible = visible;
        self.save_columns_locked(&state);
        Ok(())
    }

    pub fn visible_column_count(&self) -> usize {
        self.lock().visible_column_count()
    }
}

/// Renumbers sorted columns `1..=n` by their current order.
///
/// The sort is stable, so ties keep registration order.
fn rerank_sorts(columns: &mut [Column]) {
    let mut sorted: Vec<usize> = (0..columns.len())
        .filter(|&i| columns[i].sort_order > 0)
        .collect();
    sorted.sort_by_key(|&i| columns[i].sort_order);

    for (rank, index) in sorted.into_iter().enumerate() {
        columns[index].sort_order = rank as i32 + 1;
    }
}
