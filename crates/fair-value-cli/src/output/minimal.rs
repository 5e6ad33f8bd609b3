use serde_json::Value;

/// Result fields that answer each command, most specific first.
const HEADLINE_KEYS: [&str; 7] = [
    "value",
    "equity_value",
    "revenue_premium_pct",
    "base_case_value",
    "trend",
    "favorable",
    "weighted_favorable_share",
];

/// Print just the headline value of a command.
///
/// Uses the pre-formatted `display` string for the headline field when the
/// command supplied one, otherwise the raw value; falls back to the first
/// result field.
pub fn print_minimal(value: &Value) {
    println!("{}", headline(value));
}

fn headline(value: &Value) -> String {
    let result = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);
    let display = value.get("display");

    let Value::Object(map) = result else {
        return scalar(result);
    };

    for key in HEADLINE_KEYS {
        match map.get(key) {
            Some(Value::Null) | None => continue,
            Some(val) => {
                let shown = display.and_then(|d| d.get(key)).unwrap_or(val);
                return scalar(shown);
            }
        }
    }

    match map.iter().next() {
        Some((key, val)) => format!("{}: {}", key, scalar(val)),
        None => String::new(),
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
