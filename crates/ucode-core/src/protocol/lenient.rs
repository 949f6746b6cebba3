//! Field deserializers that never fail on shape.
//!
//! Backend payloads are loosely typed: a field may be missing, `null`, a
//! string, or occasionally a number. These helpers normalize all of that so
//! dispatch only ever sees empty strings or `None` for absent content.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

fn scalar_to_string(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

/// Deserialize any JSON value into a `String`; `null` becomes empty.
pub fn string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(scalar_to_string).unwrap_or_default())
}

/// Deserialize any JSON value into `Option<String>`; `null` and `""` become `None`.
pub fn opt_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(scalar_to_string).filter(|s| !s.is_empty()))
}

/// Deserialize a JSON array of strings; non-arrays become `None` and
/// non-string elements are skipped.
pub fn opt_string_list<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Vec<String>>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => Some(
            items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s),
                    _ => None,
                })
                .collect(),
        ),
        _ => None,
    })
}

/// Deserialize an integer that may arrive as a number or numeric string.
pub fn opt_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}
