//! Mapping between SQLite values and JSON.

use rusqlite::types::{Value as SqlValue, ValueRef};
use serde_json::{Number, Value};

/// Map a SQLite column value into JSON.
///
/// SQLite types map to the JSON types null, integer, float, and string.
/// SQLite has no bespoke JSON type, so text having a leading / trailing
/// pair of '{','}' or '[',']' is parsed as a JSON document, falling back to
/// a regular JSON string if that fails. Blobs are base64-encoded, and
/// non-finite reals become their string representation.
pub fn value_ref_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Text(s) => {
            if matches!(
                (s.first(), s.last()),
                (Some(b'{'), Some(b'}')) | (Some(b'['), Some(b']'))
            ) {
                if let Ok(v) = serde_json::from_slice(s) {
                    return v;
                }
            }
            Value::String(String::from_utf8_lossy(s).into_owned())
        }
        ValueRef::Blob(b) => Value::String(base64::encode(b)),
        ValueRef::Integer(i) => Value::Number(Number::from(i)),
        ValueRef::Real(f) => match Number::from_f64(f) {
            Some(n) => Value::Number(n),
            None => Value::String(format!("{f}")),
        },
        ValueRef::Null => Value::Null,
    }
}

/// Map a JSON bind parameter into a SQLite value.
/// Arrays and objects bind as their JSON text.
pub fn bind_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(*b as i64),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        Value::Array(_) | Value::Object(_) => SqlValue::Text(value.to_string()),
    }
}

/// Map a result row into a [`crate::Row`] keyed on `columns`.
pub fn row_to_json(columns: &[String], row: &rusqlite::Row<'_>) -> rusqlite::Result<crate::Row> {
    columns
        .iter()
        .enumerate()
        .map(|(index, name)| Ok((name.clone(), value_ref_to_json(row.get_ref(index)?))))
        .collect()
}
