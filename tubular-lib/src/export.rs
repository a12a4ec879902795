//! CSV export of grid data.
//!
//! Output starts with a UTF-8 BOM so spreadsheet applications pick the right
//! encoding. Only visible columns are written, headed by their labels.

use std::io::Write;

use serde_json::Value;

use crate::error::Error;
use crate::grid::GridController;
use crate::model::Column;
use crate::model::value::display_text;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Writes `records` as CSV. Array records are read by column position,
/// object records by column name.
pub fn write_csv<W: Write>(mut writer: W, columns: &[Column], records: &[Value]) -> Result<(), Error> {
    writer.write_all(UTF8_BOM).map_err(csv::Error::from)?;

    let mut csv = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer);

    let visible: Vec<(usize, &Column)> = columns
        .iter()
        .enumerate()
        .filter(|(_, c)| c.visible)
        .collect();

    if !visible.is_empty() {
        csv.write_record(visible.iter().map(|(_, c)| c.label.as_str()))?;
    }

    for record in records {
        let fields = visible.iter().map(|(index, column)| {
            let value = match record {
                Value::Array(items) => items.get(*index),
                Value::Object(object) => object.get(column.name()),
                _ => None,
            };
            value.map(display_text).unwrap_or_default()
        });
        csv.write_record(fields)?;
    }

    csv.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// CSV bytes for `records`.
pub fn to_csv(columns: &[Column], records: &[Value]) -> Result<Vec<u8>, Error> {
    let mut buffer = Vec::new();
    write_csv(&mut buffer, columns, records)?;
    Ok(buffer)
}

/// Exports the page the grid currently shows.
pub fn export_current(grid: &GridController) -> Result<Vec<u8>, Error> {
    let state = grid.state();
    to_csv(&state.columns, &state.raw_rows)
}

/// Exports every record of the grid's endpoint, ignoring paging and search.
pub async fn export_all(grid: &GridController) -> Result<Vec<u8>, Error> {
    let records = grid.get_full_data_source().await?;
    to_csv(&grid.columns(), &records)
}
