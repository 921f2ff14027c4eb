use std::io::Write;

use clap::ValueEnum;
use serde::Serialize;
use serde_json::Value;

use crate::CliError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Json,
    Csv,
}

/// Write query rows to `out` in the requested format.
pub fn write_rows<T: Serialize, W: Write>(rows: &[T], format: Format, mut out: W) -> Result<(), CliError> {
    match format {
        Format::Json => {
            serde_json::to_writer_pretty(&mut out, rows)?;
            writeln!(out)?;
        }
        Format::Csv => write_csv(rows, out)?,
    }
    Ok(())
}

/// One record per row. Columns follow the field order of the first row; lists are joined
/// with `;` and maps rendered as `key=value` pairs.
fn write_csv<T: Serialize, W: Write>(rows: &[T], out: W) -> Result<(), CliError> {
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(out);

    let values = rows
        .iter()
        .map(serde_json::to_value)
        .collect::<Result<Vec<_>, _>>()?;

    let Some(Value::Object(first)) = values.first() else {
        writer.flush()?;
        return Ok(());
    };
    let columns: Vec<String> = first.keys().cloned().collect();
    writer.write_record(&columns)?;

    for value in &values {
        let record: Vec<String> = columns
            .iter()
            .map(|column| value.get(column).map(cell).unwrap_or_default())
            .collect();
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Array(items) => items.iter().map(cell).collect::<Vec<_>>().join(";"),
        Value::Object(map) => map
            .iter()
            .map(|(key, value)| format!("{key}={}", cell(value)))
            .collect::<Vec<_>>()
            .join(";"),
        other => other.to_string(),
    }
}
