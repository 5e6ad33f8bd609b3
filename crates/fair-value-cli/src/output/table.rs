use serde_json::{Map, Value};
use tabled::{builder::Builder, Table};

/// Render an envelope as tables: a grid result becomes a WACC × g matrix,
/// any other result a field/value listing followed by display lines,
/// warnings and methodology.
pub fn print_table(value: &Value) {
    print!("{}", render(value));
}

fn render(value: &Value) -> String {
    let Value::Object(envelope) = value else {
        return format!("{}\n", cell(value));
    };
    let Some(result) = envelope.get("result") else {
        return format!("{}\n", field_table(envelope));
    };

    let mut out = match (super::grid_rows(result), result) {
        (Some((header, rows)), _) => {
            let mut builder = Builder::default();
            builder.push_record(header);
            rows.into_iter().for_each(|row| builder.push_record(row));
            format!("{}\n", Table::from(builder))
        }
        (None, Value::Object(fields)) => format!("{}\n", field_table(fields)),
        (None, _) => format!("{}\n", field_table(envelope)),
    };

    if let Some(Value::Object(display)) = envelope.get("display") {
        out.push('\n');
        for (label, text) in display {
            out.push_str(&format!("{label}: {}\n", cell(text)));
        }
    }

    let notes: Vec<&str> = envelope
        .get("warnings")
        .and_then(Value::as_array)
        .map(|ws| ws.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    if !notes.is_empty() {
        out.push_str("\nWarnings:\n");
        for note in notes {
            out.push_str(&format!("  - {note}\n"));
        }
    }

    if let Some(method) = envelope.get("methodology").and_then(Value::as_str) {
        out.push_str(&format!("\nMethodology: {method}\n"));
    }
    out
}

fn field_table(fields: &Map<String, Value>) -> Table {
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for (name, val) in fields {
        builder.push_record([name.clone(), cell(val)]);
    }
    Table::from(builder)
}

/// Nested lists collapse to a comma-separated line; nested objects stay JSON.
fn cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(cell).collect::<Vec<_>>().join(", "),
        Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
        other => other.to_string(),
    }
}
