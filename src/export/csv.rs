//! CSV encoding.
//!
//! Columns follow the select order. A record that is a bare value (the
//! single-select form) fills the only column.

use std::io::Write;

use csv::Writer;
use serde_json::Value;

/// Writes `records` as CSV rows, preceded by a header row when `header` is set.
pub(crate) fn write_csv_rows<W: Write>(
    writer: W,
    columns: &[String],
    records: &[Value],
    header: bool,
) -> Result<(), csv::Error> {
    let mut writer = Writer::from_writer(writer);
    if header {
        writer.write_record(columns)?;
    }
    for record in records {
        writer.write_record(row(columns, record))?;
    }
    writer.flush()?;
    Ok(())
}

fn row(columns: &[String], record: &Value) -> Vec<String> {
    match record {
        Value::Object(fields) if columns.len() > 1 => columns
            .iter()
            .map(|column| fields.get(column).map(cell).unwrap_or_default())
            .collect(),
        single => vec![cell(single)],
    }
}

/// Text of one cell: strings raw, null empty, anything else as JSON.
pub(crate) fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
