pub mod csv_out;
pub mod json;
pub mod minimal;
pub mod table;

use crate::OutputFormat;
use serde_json::Value;

/// Dispatch output to the appropriate formatter.
pub fn format_output(format: &OutputFormat, value: &Value) {
    match format {
        OutputFormat::Json => json::print_json(value),
        OutputFormat::Table => table::print_table(value),
        OutputFormat::Csv => csv_out::print_csv(value),
        OutputFormat::Minimal => minimal::print_minimal(value),
    }
}

/// A sensitivity grid laid out as rows: the header is the terminal-growth
/// axis, each row starts with its discount rate. Undefined cells are "n/a".
pub(crate) fn grid_rows(result: &Value) -> Option<(Vec<String>, Vec<Vec<String>>)> {
    let rates = result.get("discount_rates")?.as_array()?;
    let growths = result.get("terminal_growth_rates")?.as_array()?;
    let cells = result.get("cells")?.as_array()?;

    let mut header = vec!["wacc \\ g".to_string()];
    header.extend(growths.iter().map(scalar));

    let rows = rates
        .iter()
        .zip(cells)
        .map(|(rate, row)| {
            let mut line = vec![scalar(rate)];
            if let Some(row) = row.as_array() {
                line.extend(row.iter().map(|c| match c {
                    Value::Null => "n/a".to_string(),
                    other => scalar(other),
                }));
            }
            line
        })
        .collect();
    Some((header, rows))
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
