//! Table and JSON output formatting for CLI commands.

use serde::Serialize;
use serde_json::Value;
use tabled::{Table, Tabled};

/// Output format selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// JSON output
    Json,
}

fn to_json<T: Serialize + ?Sized>(value: &T, empty: &str) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| empty.to_string())
}

/// Print a list of rows in the selected format
pub fn print_list<T: Serialize + Tabled>(rows: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table if rows.is_empty() => println!("Nothing to show."),
        OutputFormat::Table => println!("{}", Table::new(rows)),
        OutputFormat::Json => println!("{}", to_json(rows, "[]")),
    }
}

/// Print one record. Tables show it as `key: value` lines with nested
/// fields joined by dots.
pub fn print_item<T: Serialize>(item: &T, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!("{}", to_json(item, "{}")),
        OutputFormat::Table => match serde_json::to_value(item) {
            Ok(value) => {
                let mut lines = Vec::new();
                flatten("", &value, &mut lines);
                for (key, value) in lines {
                    print_kv(&key, &value);
                }
            }
            Err(e) => print_error(&format!("Cannot display result: {}", e)),
        },
    }
}

fn flatten(prefix: &str, value: &Value, out: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => {
            for (key, inner) in map {
                let key = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten(&key, inner, out);
            }
        }
        Value::String(s) => out.push((prefix.to_string(), s.clone())),
        Value::Null => out.push((prefix.to_string(), "-".to_string())),
        other => out.push((prefix.to_string(), other.to_string())),
    }
}

/// Print a success message
pub fn print_success(msg: &str) {
    println!("✓ {}", msg);
}

/// Print a warning message
pub fn print_warning(msg: &str) {
    println!("⚠ {}", msg);
}

/// Print an error message
pub fn print_error(msg: &str) {
    eprintln!("✗ {}", msg);
}

/// Print a key-value pair
pub fn print_kv(key: &str, value: &str) {
    println!("  {:<28} {}", format!("{}:", key), value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flatten_nested_record() {
        let mut lines = Vec::new();
        flatten(
            "",
            &json!({"path": "a.dxf", "stub": true, "meta": {"rev": "A", "hash": null}}),
            &mut lines,
        );
        assert!(lines.contains(&("path".to_string(), "a.dxf".to_string())));
        assert!(lines.contains(&("stub".to_string(), "true".to_string())));
        assert!(lines.contains(&("meta.rev".to_string(), "A".to_string())));
        assert!(lines.contains(&("meta.hash".to_string(), "-".to_string())));
    }

    #[test]
    fn test_flatten_scalar_root() {
        let mut lines = Vec::new();
        flatten("", &json!("C:/hot/a.igs"), &mut lines);
        assert_eq!(lines, vec![(String::new(), "C:/hot/a.igs".to_string())]);
    }
}
