use serde_json::Value;

use crate::store::Document;

/// Shown in place of missing text fields.
pub const PLACEHOLDER: &str = "-";

pub fn text(doc: &Document, field: &str) -> String {
    match doc.data.get(field) {
        Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => PLACEHOLDER.to_string(),
    }
}

pub fn number(doc: &Document, field: &str) -> f64 {
    match doc.data.get(field) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

pub fn integer(doc: &Document, field: &str) -> i64 {
    match doc.data.get(field) {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        Some(Value::Array(items)) => items.len() as i64,
        _ => 0,
    }
}

pub fn flag(doc: &Document, field: &str) -> bool {
    match doc.data.get(field) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s == "true",
        _ => false,
    }
}
