use serde_json::Value;
use std::io;

/// Write output as CSV to stdout, stopping at the first failed write.
pub fn print_csv(value: &Value) {
    let mut wtr = csv::Writer::from_writer(io::stdout().lock());
    let written = write_csv(&mut wtr, value).and_then(|()| wtr.flush().map_err(csv::Error::from));
    if let Err(e) = written {
        eprintln!("CSV output error: {e}");
    }
}

/// A grid result is written as its matrix; any other object result as
/// field,value pairs. Envelopes without a result fall back to their own keys.
fn write_csv<W: io::Write>(wtr: &mut csv::Writer<W>, value: &Value) -> csv::Result<()> {
    let Value::Object(envelope) = value else {
        return wtr.write_record([field(value)]);
    };
    let result = envelope.get("result");

    if let Some((header, rows)) = result.and_then(super::grid_rows) {
        wtr.write_record(&header)?;
        for row in &rows {
            wtr.write_record(row)?;
        }
        return Ok(());
    }

    let fields = match result {
        Some(Value::Object(fields)) => fields,
        _ => envelope,
    };
    wtr.write_record(["field", "value"])?;
    for (name, val) in fields {
        wtr.write_record([name.clone(), field(val)])?;
    }
    Ok(())
}

fn field(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Array(_) | Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn csv_text(value: &Value) -> String {
        let mut wtr = csv::Writer::from_writer(vec![]);
        write_csv(&mut wtr, value).unwrap();
        String::from_utf8(wtr.into_inner().unwrap()).unwrap()
    }

    #[test]
    fn test_grid_written_as_matrix() {
        let text = csv_text(&json!({
            "result": {
                "discount_rates": ["0.02", "0.12"],
                "terminal_growth_rates": ["0.02", "0.03"],
                "cells": [[null, null], ["12500000", "13100000"]],
            }
        }));
        assert_eq!(
            text,
            "wacc \\ g,0.02,0.03\n0.02,n/a,n/a\n0.12,12500000,13100000\n"
        );
    }

    #[test]
    fn test_result_written_as_field_value() {
        let text = csv_text(&json!({
            "result": { "fair_value": "19977272.73", "note": null },
            "warnings": ["ignored"],
        }));
        assert_eq!(text, "field,value\nfair_value,19977272.73\nnote,\n");
    }

    struct Broken;

    impl io::Write for Broken {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }
        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }
    }

    #[test]
    fn test_write_failure_is_reported() {
        // Capacity 1 forces every record straight through to the sink.
        let mut wtr = csv::WriterBuilder::new()
            .buffer_capacity(1)
            .from_writer(Broken);
        let value = json!({ "result": { "a": "1", "b": "2" } });
        assert!(write_csv(&mut wtr, &value).is_err());
    }
}
