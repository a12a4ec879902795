//! Row selection, persisted across pages and sessions.

use super::GridController;
use super::ROWS_KEY;
use crate::model::Row;

impl GridController {
    /// Toggles the selection of a row and returns its new state.
    ///
    /// The row and the matching row of the current page are both updated.
    pub fn change_selection(&self, row: &mut Row) -> bool {
        let keys = {
            let mut state = self.lock();
            let key = row.key().to_string();
            let position = state.selected_keys.iter().position(|k| *k == key);
            let selected = match position {
                Some(index) => {
                    state.selected_keys.remove(index);
                    false
                }
                None => {
                    state.selected_keys.push(key.clone());
                    true
                }
            };

            row.selected = selected;
            for live in state.rows.iter_mut().filter(|r| r.key() == key) {
                live.selected = selected;
            }
            state.selected_keys.clone()
        };

        self.persist(ROWS_KEY, &keys);
        row.selected
    }

    /// Deselects every row, on every page.
    pub fn clear_selection(&self) {
        {
            let mut state = self.lock();
            state.selected_keys.clear();
            for row in &mut state.rows {
                row.selected = false;
            }
        }
        self.forget(ROWS_KEY);
    }

    pub fn is_empty_selection(&self) -> bool {
        self.lock().selected_keys.is_empty()
    }

    /// Keys of the selected rows, in selection order.
    pub fn selected_keys(&self) -> Vec<String> {
        self.lock().selected_keys.clone()
    }

    /// Selected rows of the current page.
    pub fn selected_rows(&self) -> Vec<Row> {
        self.lock()
            .rows
            .iter()
            .filter(|r| r.selected)
            .cloned()
            .collect()
    }
}
