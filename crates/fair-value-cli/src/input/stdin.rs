use serde_json::Value;
use std::io::{self, Read};

/// Read piped JSON (or YAML) from stdin.
/// Returns None if stdin is a TTY (interactive) or empty.
pub fn read_stdin() -> Result<Option<Value>, Box<dyn std::error::Error>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }

    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;
    parse_piped(&buffer)
}

fn parse_piped(buffer: &str) -> Result<Option<Value>, Box<dyn std::error::Error>> {
    let trimmed = buffer.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    // JSON first; YAML is a superset but gives worse errors for bad JSON.
    match serde_json::from_str(trimmed) {
        Ok(value) => Ok(Some(value)),
        Err(json_err) if trimmed.starts_with('{') || trimmed.starts_with('[') => {
            Err(format!("Failed to parse stdin as JSON: {}", json_err).into())
        }
        Err(_) => {
            let value: Value = serde_yaml::from_str(trimmed)
                .map_err(|e| format!("Failed to parse stdin as YAML: {}", e))?;
            Ok(Some(value))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_input_is_none() {
        assert!(parse_piped("  \n").unwrap().is_none());
    }

    #[test]
    fn test_json_and_yaml_accepted() {
        let json = parse_piped(r#"{"entity_id": "harbor"}"#).unwrap().unwrap();
        assert_eq!(json["entity_id"], "harbor");

        let yaml = parse_piped("entity_id: harbor\nwacc: '0.15'\n").unwrap().unwrap();
        assert_eq!(yaml["entity_id"], "harbor");
        assert_eq!(yaml["wacc"], "0.15");
    }

    #[test]
    fn test_broken_json_reports_json_error() {
        let err = parse_piped(r#"{"entity_id": "#).unwrap_err();
        assert!(err.to_string().contains("JSON"));
    }
}
